#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

mod ballot;
mod decryption;
mod encryption;
mod error;
mod keygen;
mod mix;
mod secret_share;
mod serde_hex;
mod tally;
mod transform;
mod util;

pub use ballot::*;
pub use decryption::*;
pub use encryption::*;
pub use error::*;
pub use keygen::*;
pub use mix::*;
pub use secret_share::*;
pub use serde_hex::*;
pub use tally::*;
pub use transform::*;
pub use zero_test::*;

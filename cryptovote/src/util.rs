use crate::Error;
use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};

/// Draw a uniformly random element of `Z*_modulus`.
pub(crate) fn random_unit<R: Rng + CryptoRng>(rng: &mut R, modulus: &BigUint) -> BigUint {
    loop {
        let candidate = rng.gen_biguint_range(&BigUint::one(), modulus);
        if candidate.gcd(modulus).is_one() {
            return candidate;
        }
    }
}

pub(crate) fn factorial(n: usize) -> BigUint {
    (1..=n).fold(BigUint::one(), |acc, k| acc * BigUint::from(k))
}

/// `a - b mod modulus` for operands already reduced mod `modulus`.
pub(crate) fn mod_sub(a: &BigUint, b: &BigUint, modulus: &BigUint) -> BigUint {
    (a + modulus - (b % modulus)) % modulus
}

/// Recover `i mod n^s` from `a = (1 + n)^i mod n^(s+1)`.
///
/// This is the Damgard-Jurik extraction: `i` is lifted one power of `n` at a
/// time, using `L(x) = (x - 1) / n` on `a mod n^(j+1)` and removing the binomial
/// terms of the already-known low digits.
pub(crate) fn dlog(a: &BigUint, n: &BigUint, s: u32) -> Result<BigUint, Error> {
    let mut i = BigUint::zero();

    for j in 1..=s {
        let n_j = n.pow(j);
        let n_j1 = &n_j * n;

        let reduced = a % &n_j1;
        if reduced.is_zero() {
            return Err(Error::DomainError(
                "combined decryption is not a unit".to_string(),
            ));
        }

        let mut t1 = ((reduced - 1u32) / n) % &n_j;
        let mut t2 = i.clone();
        let mut k_factorial = BigUint::one();
        let mut n_power = BigUint::one();

        for k in 2..=j {
            i = mod_sub(&i, &BigUint::one(), &n_j);
            t2 = (t2 * &i) % &n_j;
            k_factorial *= k;
            n_power *= n;

            let k_inverse = k_factorial.modinv(&n_j).ok_or_else(|| {
                Error::DomainError(format!("{}! is not invertible mod n^{}", k, j))
            })?;
            let term = (&t2 * &n_power % &n_j) * k_inverse % &n_j;
            t1 = mod_sub(&t1, &term, &n_j);
        }

        i = t1;
    }

    Ok(i)
}

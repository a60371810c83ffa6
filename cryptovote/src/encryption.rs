use crate::util::random_unit;
use crate::*;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};

/// An encrypted integer of `Z_{n^s}`: an element of `Z*_{n^(s+1)}`.
///
/// The product of two ciphertexts decrypts to the sum of their plaintexts and
/// raising a ciphertext to a public power decrypts to the scalar product.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ciphertext(#[serde(with = "BigUintHex")] BigUint);

impl Ciphertext {
    /// Wrap a raw group element, e.g. one received from the transport layer.
    pub fn from_biguint(value: BigUint) -> Self {
        Ciphertext(value)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    /// Check that this is a unit of `Z_{n^(s+1)}`.
    pub fn validate(&self, pk: &PublicKey) -> Result<(), Error> {
        if self.0.is_zero() || &self.0 >= pk.n_s1() {
            return Err(Error::DomainError(
                "ciphertext outside of [1, n^(s+1))".to_string(),
            ));
        }
        if !self.0.gcd(pk.n()).is_one() {
            return Err(Error::DomainError(
                "ciphertext is not a unit mod n^(s+1)".to_string(),
            ));
        }
        Ok(())
    }
}

impl PublicKey {
    /// Encrypt `plaintext`, which must lie in `[0, n^s)`.
    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        plaintext: &BigUint,
    ) -> Result<Ciphertext, Error> {
        if plaintext >= self.n_s() {
            return Err(Error::DomainError(
                "plaintext outside of [0, n^s)".to_string(),
            ));
        }

        let blinding = random_unit(rng, self.n()).modpow(self.n_s(), self.n_s1());
        let encoded = self.g().modpow(plaintext, self.n_s1());

        Ok(Ciphertext(encoded * blinding % self.n_s1()))
    }

    pub fn encrypt_u64<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        plaintext: u64,
    ) -> Result<Ciphertext, Error> {
        self.encrypt(rng, &BigUint::from(plaintext))
    }

    /// A fresh encryption of zero.
    pub fn encrypt_zero<R: Rng + CryptoRng>(&self, rng: &mut R) -> Ciphertext {
        let blinding = random_unit(rng, self.n()).modpow(self.n_s(), self.n_s1());
        Ciphertext(blinding)
    }

    /// Homomorphic addition: decrypts to `(p1 + p2) mod n^s`.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext(&a.0 * &b.0 % self.n_s1())
    }

    /// Homomorphic negation: decrypts to `-p mod n^s`.
    pub fn negate(&self, c: &Ciphertext) -> Result<Ciphertext, Error> {
        c.0.modinv(self.n_s1())
            .map(Ciphertext)
            .ok_or_else(|| Error::DomainError("ciphertext is not invertible".to_string()))
    }

    /// Homomorphic subtraction: decrypts to `(p1 - p2) mod n^s`.
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, Error> {
        Ok(self.add(a, &self.negate(b)?))
    }

    /// Homomorphic scalar multiplication: decrypts to `(p * k) mod n^s`.
    pub fn scalar_mul(&self, c: &Ciphertext, k: &BigUint) -> Ciphertext {
        let k = k % self.n_s();
        Ciphertext(c.0.modpow(&k, self.n_s1()))
    }

    /// Add a public constant without fresh randomness.
    pub fn add_plaintext(&self, c: &Ciphertext, k: &BigUint) -> Ciphertext {
        let k = k % self.n_s();
        Ciphertext(&c.0 * self.g().modpow(&k, self.n_s1()) % self.n_s1())
    }

    /// Subtract a public constant without fresh randomness.
    pub fn sub_plaintext(&self, c: &Ciphertext, k: &BigUint) -> Ciphertext {
        let negated = (self.n_s() - (k % self.n_s())) % self.n_s();
        self.add_plaintext(c, &negated)
    }

    /// Multiply in a fresh encryption of zero. The result is distributed like
    /// a fresh encryption of the same plaintext.
    pub fn rerandomize<R: Rng + CryptoRng>(&self, rng: &mut R, c: &Ciphertext) -> Ciphertext {
        self.add(c, &self.encrypt_zero(rng))
    }
}

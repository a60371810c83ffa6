use crate::util::factorial;
use crate::*;
use digest::Digest;
use num_bigint::BigUint;
use num_integer::Integer;
use num_prime::RandPrime;
use num_traits::One;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use std::convert::TryFrom;

/// Smallest accepted size, in bits, of each of the two safe primes.
pub const MIN_PRIME_BITS: usize = 32;

/// Smallest accepted size, in bits, of the plaintext space `n^s`.
///
/// Ranks, weights, blinding scalars and the differences compared during
/// re-ranking all live in `Z_{n^s}` and must stay far from wrapping around.
pub const MIN_PLAINTEXT_BITS: u64 = 128;

/// Largest number of key shares. `num_shares!` appears in every partial
/// decryption exponent.
pub const MAX_SHARES: usize = 255;

/// Parameters for a threshold key generation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeygenParams {
    /// Size of each of the two safe primes `p` and `q`
    pub bit_length: usize,

    /// Plaintext space is `Z_{n^s}`, ciphertexts live mod `n^(s+1)`
    pub s: u32,

    /// Minimum number of authorities needed to decrypt
    pub threshold: usize,

    /// Number of key shares dealt
    pub num_shares: usize,
}

impl Default for KeygenParams {
    fn default() -> Self {
        KeygenParams {
            bit_length: 512,
            s: 2,
            threshold: 3,
            num_shares: 5,
        }
    }
}

impl KeygenParams {
    pub fn validate(&self) -> Result<(), Error> {
        if self.threshold == 0 {
            return Err(Error::ParameterError(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.threshold > self.num_shares {
            return Err(Error::ParameterError(format!(
                "threshold {} exceeds number of shares {}",
                self.threshold, self.num_shares
            )));
        }
        if self.num_shares > MAX_SHARES {
            return Err(Error::ParameterError(format!(
                "at most {} shares are supported",
                MAX_SHARES
            )));
        }
        if self.s == 0 {
            return Err(Error::ParameterError("s must be at least 1".to_string()));
        }
        if self.bit_length < MIN_PRIME_BITS {
            return Err(Error::ParameterError(format!(
                "primes of {} bits are too small, need at least {}",
                self.bit_length, MIN_PRIME_BITS
            )));
        }

        // n has at least 2 * bit_length - 2 bits
        let plaintext_bits = (2 * self.bit_length as u64 - 2) * self.s as u64;
        if plaintext_bits < MIN_PLAINTEXT_BITS {
            return Err(Error::ParameterError(format!(
                "plaintext space of {} bits is too small for s = {}, need at least {}",
                plaintext_bits, self.s, MIN_PLAINTEXT_BITS
            )));
        }

        Ok(())
    }
}

/// The election's public encryption key.
///
/// Holds the modulus base `n`, the exponent parameter `s` and the sharing
/// parameters needed to combine partial decryptions. Safe to publish.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawPublicKey", into = "RawPublicKey")]
pub struct PublicKey {
    n: BigUint,
    s: u32,
    threshold: usize,
    num_shares: usize,

    // Derived from the above
    n_s: BigUint,
    n_s1: BigUint,
    g: BigUint,
    delta: BigUint,
}

#[derive(Serialize, Deserialize, Clone)]
struct RawPublicKey {
    #[serde(with = "BigUintHex")]
    n: BigUint,
    s: u32,
    threshold: usize,
    num_shares: usize,
}

impl TryFrom<RawPublicKey> for PublicKey {
    type Error = Error;

    fn try_from(raw: RawPublicKey) -> Result<Self, Error> {
        PublicKey::new(raw.n, raw.s, raw.threshold, raw.num_shares)
    }
}

impl From<PublicKey> for RawPublicKey {
    fn from(pk: PublicKey) -> Self {
        RawPublicKey {
            n: pk.n,
            s: pk.s,
            threshold: pk.threshold,
            num_shares: pk.num_shares,
        }
    }
}

impl PublicKey {
    pub fn new(n: BigUint, s: u32, threshold: usize, num_shares: usize) -> Result<Self, Error> {
        if n <= BigUint::one() {
            return Err(Error::ParameterError("modulus must exceed 1".to_string()));
        }
        if s == 0 {
            return Err(Error::ParameterError("s must be at least 1".to_string()));
        }
        if threshold == 0 || threshold > num_shares || num_shares > MAX_SHARES {
            return Err(Error::ParameterError(format!(
                "invalid threshold {} for {} shares",
                threshold, num_shares
            )));
        }

        let n_s = n.pow(s);
        let n_s1 = &n_s * &n;
        let g = &n + 1u32;
        let delta = factorial(num_shares);

        // combine() divides by 4 * delta^2 mod n^s
        if !(&delta * &delta * 4u32).gcd(&n).is_one() {
            return Err(Error::ParameterError(
                "modulus shares a factor with the share count factorial".to_string(),
            ));
        }

        Ok(PublicKey {
            n,
            s,
            threshold,
            num_shares,
            n_s,
            n_s1,
            g,
            delta,
        })
    }

    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn s(&self) -> u32 {
        self.s
    }

    /// The plaintext modulus `n^s`
    pub fn n_s(&self) -> &BigUint {
        &self.n_s
    }

    /// The ciphertext modulus `n^(s+1)`
    pub fn n_s1(&self) -> &BigUint {
        &self.n_s1
    }

    /// The generator `n + 1`
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn num_shares(&self) -> usize {
        self.num_shares
    }

    /// `num_shares!`, which keeps every Lagrange coefficient integral
    pub fn delta(&self) -> &BigUint {
        &self.delta
    }

    /// SHA-256 digest of the public parameters
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"cryptovote_public_key");
        hasher.update(&self.n.to_bytes_be());
        hasher.update(&self.s.to_be_bytes());
        hasher.update(&(self.threshold as u64).to_be_bytes());
        hasher.update(&(self.num_shares as u64).to_be_bytes());

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&hasher.finalize());
        fingerprint
    }
}

/// Generate a threshold Damgard-Jurik key.
///
/// Returns the public key and one private key share per authority. The private
/// exponent `d` (with `d = 0 mod m` and `d = 1 mod n^s`) is dealt with
/// `split()` and dropped; it is never reconstructed afterwards.
pub fn keygen<R: Rng + CryptoRng>(
    rng: &mut R,
    params: &KeygenParams,
) -> Result<(PublicKey, Vec<PrivateKeyShare>), Error> {
    params.validate()?;

    debug!(
        "generating {}-bit safe primes for s = {}, {}-of-{} sharing",
        params.bit_length, params.s, params.threshold, params.num_shares
    );

    let p: BigUint = rng.gen_safe_prime(params.bit_length);
    let mut q: BigUint = rng.gen_safe_prime(params.bit_length);
    while p == q {
        q = rng.gen_safe_prime(params.bit_length);
    }

    let n = &p * &q;
    let p_sub = (&p - 1u32) / 2u32;
    let q_sub = (&q - 1u32) / 2u32;
    let m = p_sub * q_sub;

    let public_key = PublicKey::new(n, params.s, params.threshold, params.num_shares)?;
    if public_key.n_s().bits() < MIN_PLAINTEXT_BITS {
        return Err(Error::ParameterError(format!(
            "generated plaintext space has only {} bits",
            public_key.n_s().bits()
        )));
    }

    // d = 0 mod m, d = 1 mod n^s
    let m_inverse = m.modinv(public_key.n_s()).ok_or_else(|| {
        Error::ParameterError("m is not invertible mod n^s".to_string())
    })?;
    let d = &m * m_inverse;

    let share_modulus = public_key.n_s() * &m;
    let shares = split(rng, &d, params.threshold, params.num_shares, &share_modulus)?
        .into_iter()
        .map(|(index, value)| PrivateKeyShare::new(index, value, public_key.clone()))
        .collect();

    debug!("dealt {} key shares", params.num_shares);

    Ok((public_key, shares))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn keygen_param_validation() {
        assert!(KeygenParams::default().validate().is_ok());

        let bad = KeygenParams {
            threshold: 6,
            num_shares: 5,
            ..KeygenParams::default()
        };
        assert!(matches!(bad.validate(), Err(Error::ParameterError(_))));

        let bad = KeygenParams {
            threshold: 0,
            ..KeygenParams::default()
        };
        assert!(matches!(bad.validate(), Err(Error::ParameterError(_))));

        let bad = KeygenParams {
            s: 0,
            ..KeygenParams::default()
        };
        assert!(matches!(bad.validate(), Err(Error::ParameterError(_))));

        // (2 * 32 - 2) * 2 = 124 bits of plaintext space is not enough
        let bad = KeygenParams {
            bit_length: 32,
            s: 2,
            threshold: 2,
            num_shares: 3,
        };
        assert!(matches!(bad.validate(), Err(Error::ParameterError(_))));

        let ok = KeygenParams {
            bit_length: 32,
            s: 3,
            threshold: 2,
            num_shares: 3,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn keygen_rejects_threshold_above_shares() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let params = KeygenParams {
            bit_length: 64,
            s: 2,
            threshold: 4,
            num_shares: 3,
        };
        assert!(matches!(
            keygen(&mut rng, &params),
            Err(Error::ParameterError(_))
        ));
    }

    #[test]
    fn keygen_produces_indexed_shares() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let params = KeygenParams {
            bit_length: 64,
            s: 2,
            threshold: 2,
            num_shares: 4,
        };
        let (pk, shares) = keygen(&mut rng, &params).unwrap();

        assert_eq!(shares.len(), 4);
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.index(), i + 1);
            assert_eq!(share.threshold(), 2);
            assert_eq!(share.public_key(), &pk);
        }

        assert_eq!(pk.n_s1(), &(pk.n_s() * pk.n()));
        assert_eq!(pk.g(), &(pk.n() + 1u32));
        assert_eq!(pk.delta(), &BigUint::from(24u32));
        assert!(pk.n_s().bits() >= MIN_PLAINTEXT_BITS);
    }

    #[test]
    fn public_key_serializes_without_derived_fields() {
        let pk = PublicKey::new(BigUint::from(1019u32 * 1031u32), 3, 2, 3).unwrap();
        let json = serde_json::to_value(&pk).unwrap();
        assert_eq!(json["s"], 3);
        assert!(json.get("n_s").is_none());

        let back: PublicKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, pk);
        assert_eq!(back.fingerprint(), pk.fingerprint());

        let other = PublicKey::new(BigUint::from(1019u32 * 1031u32), 2, 2, 3).unwrap();
        assert_ne!(other.fingerprint(), pk.fingerprint());
    }

    #[test]
    fn public_key_rejects_bad_threshold_on_deserialize() {
        let json = serde_json::json!({ "n": "0fff", "s": 1, "threshold": 4, "num_shares": 3 });
        assert!(serde_json::from_value::<PublicKey>(json).is_err());
    }
}

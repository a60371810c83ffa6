use crate::util::dlog;
use crate::*;
use digest::Digest;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use sha2::Sha256;
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

/// One authority's share of the private decryption exponent.
///
/// Exactly one authority holds each share. A share alone decrypts nothing.
#[derive(Clone)]
pub struct PrivateKeyShare {
    index: usize,
    threshold: usize,
    value: BigUint,
    public_key: PublicKey,
}

impl fmt::Debug for PrivateKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKeyShare")
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl PrivateKeyShare {
    pub(crate) fn new(index: usize, value: BigUint, public_key: PublicKey) -> Self {
        PrivateKeyShare {
            index,
            threshold: public_key.threshold(),
            value,
            public_key,
        }
    }

    /// Share index, in `1..=num_shares`
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Apply this share to a ciphertext: `c^(2 * delta * s_i) mod n^(s+1)`.
    pub fn partial_decrypt(&self, ciphertext: &Ciphertext) -> PartialDecryption {
        let pk = &self.public_key;
        let exponent = pk.delta() * &self.value * 2u32;
        let value = ciphertext.as_biguint().modpow(&exponent, pk.n_s1());

        trace!("authority {} produced a partial decryption", self.index);

        PartialDecryption {
            index: self.index,
            value,
            key: pk.fingerprint(),
            ciphertext: ciphertext_digest(ciphertext),
        }
    }
}

/// The result of one authority applying its share to a ciphertext.
///
/// Meaningless alone; `combine()` interpolates `threshold` of them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartialDecryption {
    pub index: usize,

    #[serde(with = "BigUintHex")]
    pub value: BigUint,

    /// Fingerprint of the public key the share belongs to
    #[serde(with = "hex")]
    pub key: [u8; 32],

    /// Digest of the ciphertext that was decrypted
    #[serde(with = "hex")]
    pub ciphertext: [u8; 32],
}

fn ciphertext_digest(ciphertext: &Ciphertext) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"cryptovote_ciphertext");
    hasher.update(&ciphertext.as_biguint().to_bytes_be());

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Combine partial decryptions of one ciphertext into its plaintext.
///
/// Lagrange interpolation happens in the exponent, so the private exponent is
/// never materialized: `c' = prod c_i^(2 * lambda_i) = (1 + n)^(4 * delta^2 * x)`.
pub fn combine(pk: &PublicKey, partials: &[PartialDecryption]) -> Result<BigUint, Error> {
    let fingerprint = pk.fingerprint();

    if let Some(first) = partials.first() {
        for partial in partials {
            if partial.key != fingerprint {
                return Err(Error::ConsistencyError(format!(
                    "partial decryption {} was made under a different public key",
                    partial.index
                )));
            }
            if partial.ciphertext != first.ciphertext {
                return Err(Error::ConsistencyError(format!(
                    "partial decryptions {} and {} are for different ciphertexts",
                    first.index, partial.index
                )));
            }
        }
    }

    let mut seen = BTreeSet::new();
    for partial in partials {
        if partial.index == 0 || partial.index > pk.num_shares() {
            return Err(Error::ConsistencyError(format!(
                "share index {} is out of range",
                partial.index
            )));
        }
        if !seen.insert(partial.index) {
            return Err(Error::ConsistencyError(format!(
                "duplicate share index {}",
                partial.index
            )));
        }
    }

    if partials.len() < pk.threshold() {
        return Err(Error::ThresholdError {
            required: pk.threshold(),
            supplied: partials.len(),
        });
    }

    let indices: Vec<usize> = partials.iter().map(|p| p.index).collect();
    let n_s1 = pk.n_s1();

    let mut combined = BigUint::one();
    for partial in partials {
        let lambda = lagrange_coefficient(pk.delta(), partial.index, &indices) * BigInt::from(2);
        let (sign, magnitude) = lambda.into_parts();

        let base = if sign == Sign::Minus {
            partial.value.modinv(n_s1).ok_or_else(|| {
                Error::DomainError(format!(
                    "partial decryption {} is not invertible",
                    partial.index
                ))
            })?
        } else {
            partial.value.clone()
        };

        combined = combined * base.modpow(&magnitude, n_s1) % n_s1;
    }

    let scaled = dlog(&combined, pk.n(), pk.s())?;

    let four_delta_squared = pk.delta() * pk.delta() * 4u32;
    let inverse = four_delta_squared.modinv(pk.n_s()).ok_or_else(|| {
        Error::DomainError("4 * delta^2 is not invertible mod n^s".to_string())
    })?;

    Ok(scaled * inverse % pk.n_s())
}

/// A quorum of key shares, threaded explicitly through every call that needs
/// to decrypt.
///
/// Missing or dishonest authorities are simulated by leaving their shares out.
#[derive(Debug, Clone, Copy)]
pub struct Quorum<'a> {
    shares: &'a [PrivateKeyShare],
}

impl<'a> Quorum<'a> {
    pub fn new(shares: &'a [PrivateKeyShare]) -> Self {
        Quorum { shares }
    }

    pub fn shares(&self) -> &'a [PrivateKeyShare] {
        self.shares
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Every member's partial decryption of `ciphertext`.
    pub fn partial_decrypt(&self, ciphertext: &Ciphertext) -> Vec<PartialDecryption> {
        #[cfg(not(feature = "parallel"))]
        let iter = self.shares.iter();
        #[cfg(feature = "parallel")]
        let iter = self.shares.par_iter();

        iter.map(|share| share.partial_decrypt(ciphertext)).collect()
    }

    pub fn threshold_decrypt(
        &self,
        pk: &PublicKey,
        ciphertext: &Ciphertext,
    ) -> Result<BigUint, Error> {
        threshold_decrypt(pk, self, ciphertext)
    }
}

/// `combine()` over the partial decryptions of every quorum member.
pub fn threshold_decrypt(
    pk: &PublicKey,
    quorum: &Quorum,
    ciphertext: &Ciphertext,
) -> Result<BigUint, Error> {
    let partials = quorum.partial_decrypt(ciphertext);
    combine(pk, &partials)
}

/// An authority that can be asked for a partial decryption.
///
/// Remote authorities may fail to answer; they report that with
/// `Error::AuthorityUnavailable` so the caller can move on to another one.
/// `timeout` is what is left of the quorum deadline. An implementation that
/// blocks must give up once it has passed.
pub trait DecryptionAuthority {
    fn index(&self) -> usize;

    fn request_partial_decryption(
        &self,
        ciphertext: &Ciphertext,
        timeout: Duration,
    ) -> Result<PartialDecryption, Error>;
}

impl DecryptionAuthority for PrivateKeyShare {
    fn index(&self) -> usize {
        self.index
    }

    fn request_partial_decryption(
        &self,
        ciphertext: &Ciphertext,
        _timeout: Duration,
    ) -> Result<PartialDecryption, Error> {
        Ok(self.partial_decrypt(ciphertext))
    }
}

/// Ask authorities in turn until `threshold` partial decryptions are
/// collected.
///
/// Unavailable authorities are skipped. Each request is handed the time left
/// before the deadline, and an answer arriving after it is discarded. Fails
/// with `QuorumTimeout` once `timeout` has elapsed, or `ThresholdError` when
/// every authority was asked.
pub fn collect_partials<A: DecryptionAuthority>(
    pk: &PublicKey,
    authorities: &[A],
    ciphertext: &Ciphertext,
    timeout: Duration,
) -> Result<Vec<PartialDecryption>, Error> {
    let deadline = Instant::now() + timeout;
    let required = pk.threshold();
    let mut partials = Vec::with_capacity(required);

    for authority in authorities {
        if partials.len() >= required {
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::from_secs(0) {
            return Err(Error::QuorumTimeout {
                required,
                collected: partials.len(),
            });
        }

        match authority.request_partial_decryption(ciphertext, remaining) {
            Ok(_) if Instant::now() >= deadline => {
                return Err(Error::QuorumTimeout {
                    required,
                    collected: partials.len(),
                });
            }
            Ok(partial) => partials.push(partial),
            Err(Error::AuthorityUnavailable(index)) => {
                warn!("authority {} did not answer, trying the next one", index);
            }
            Err(e) => return Err(e),
        }
    }

    if partials.len() < required {
        return Err(Error::ThresholdError {
            required,
            supplied: partials.len(),
        });
    }

    Ok(partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::cell::RefCell;

    fn setup(seed: u64, threshold: usize, num_shares: usize) -> (PublicKey, Vec<PrivateKeyShare>, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let params = KeygenParams {
            bit_length: 64,
            s: 2,
            threshold,
            num_shares,
        };
        let (pk, shares) = keygen(&mut rng, &params).unwrap();
        (pk, shares, rng)
    }

    // All subsets of `0..n` of the given size
    fn subsets(n: usize, size: usize) -> Vec<Vec<usize>> {
        (0u32..(1 << n))
            .filter(|mask| mask.count_ones() as usize == size)
            .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
            .collect()
    }

    #[test]
    fn every_quorum_recovers_plaintext() {
        let (pk, shares, mut rng) = setup(20, 3, 5);
        let plaintext = BigUint::from(31_337u32);
        let c = pk.encrypt(&mut rng, &plaintext).unwrap();

        for size in 3..=5 {
            for subset in subsets(5, size) {
                let chosen: Vec<PrivateKeyShare> =
                    subset.iter().map(|&i| shares[i].clone()).collect();
                assert_eq!(
                    Quorum::new(&chosen).threshold_decrypt(&pk, &c).unwrap(),
                    plaintext
                );
            }
        }
    }

    #[test]
    fn small_quorums_fail_with_threshold_error() {
        let (pk, shares, mut rng) = setup(21, 3, 5);
        let c = pk.encrypt_u64(&mut rng, 9).unwrap();

        for size in 0..3 {
            for subset in subsets(5, size) {
                let chosen: Vec<PrivateKeyShare> =
                    subset.iter().map(|&i| shares[i].clone()).collect();
                match threshold_decrypt(&pk, &Quorum::new(&chosen), &c) {
                    Err(Error::ThresholdError { required, supplied }) => {
                        assert_eq!(required, 3);
                        assert_eq!(supplied, size);
                    }
                    other => panic!("expected threshold error, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn combine_rejects_duplicate_indices() {
        let (pk, shares, mut rng) = setup(22, 2, 3);
        let c = pk.encrypt_u64(&mut rng, 9).unwrap();

        let partial = shares[0].partial_decrypt(&c);
        let partials = vec![partial.clone(), partial];
        assert!(matches!(
            combine(&pk, &partials),
            Err(Error::ConsistencyError(_))
        ));
    }

    #[test]
    fn combine_rejects_mixed_ciphertexts() {
        let (pk, shares, mut rng) = setup(23, 2, 3);
        let c1 = pk.encrypt_u64(&mut rng, 9).unwrap();
        let c2 = pk.encrypt_u64(&mut rng, 9).unwrap();

        let partials = vec![shares[0].partial_decrypt(&c1), shares[1].partial_decrypt(&c2)];
        assert!(matches!(
            combine(&pk, &partials),
            Err(Error::ConsistencyError(_))
        ));
    }

    #[test]
    fn combine_rejects_foreign_key() {
        let (pk, shares, mut rng) = setup(24, 2, 3);
        let (other_pk, _other_shares, _) = setup(25, 2, 3);
        let c = pk.encrypt_u64(&mut rng, 9).unwrap();

        let partials = vec![shares[0].partial_decrypt(&c), shares[1].partial_decrypt(&c)];
        assert!(combine(&pk, &partials).is_ok());
        assert!(matches!(
            combine(&other_pk, &partials),
            Err(Error::ConsistencyError(_))
        ));
    }

    #[test]
    fn share_debug_is_redacted() {
        let (_pk, shares, _rng) = setup(26, 1, 1);
        let debug = format!("{:?}", shares[0]);
        assert!(debug.contains("redacted"));
        assert!(debug.contains("index: 1"));
    }

    #[test]
    fn partial_decryption_serializes_as_hex() {
        let (pk, shares, mut rng) = setup(27, 1, 2);
        let c = pk.encrypt_u64(&mut rng, 5).unwrap();
        let partial = shares[1].partial_decrypt(&c);

        let json = serde_json::to_string(&partial).unwrap();
        let back: PartialDecryption = serde_json::from_str(&json).unwrap();
        assert_eq!(back, partial);
        assert_eq!(combine(&pk, &[back]).unwrap(), BigUint::from(5u32));
    }

    struct Flaky {
        share: PrivateKeyShare,
        online: bool,
        delay: Duration,
        timeouts: RefCell<Vec<Duration>>,
    }

    impl Flaky {
        fn new(share: &PrivateKeyShare, online: bool) -> Self {
            Flaky {
                share: share.clone(),
                online,
                delay: Duration::from_secs(0),
                timeouts: RefCell::new(vec![]),
            }
        }
    }

    impl DecryptionAuthority for Flaky {
        fn index(&self) -> usize {
            self.share.index()
        }

        fn request_partial_decryption(
            &self,
            ciphertext: &Ciphertext,
            timeout: Duration,
        ) -> Result<PartialDecryption, Error> {
            self.timeouts.borrow_mut().push(timeout);
            std::thread::sleep(self.delay);
            if self.online {
                Ok(self.share.partial_decrypt(ciphertext))
            } else {
                Err(Error::AuthorityUnavailable(self.index()))
            }
        }
    }

    #[test]
    fn collect_partials_skips_unavailable_authorities() {
        let (pk, shares, mut rng) = setup(28, 2, 4);
        let c = pk.encrypt_u64(&mut rng, 77).unwrap();

        let authorities: Vec<Flaky> = shares
            .iter()
            .enumerate()
            .map(|(i, share)| Flaky::new(share, i % 2 == 1))
            .collect();

        let partials = collect_partials(&pk, &authorities, &c, Duration::from_secs(60)).unwrap();
        assert_eq!(partials.len(), 2);
        assert_eq!(partials[0].index, 2);
        assert_eq!(partials[1].index, 4);
        assert_eq!(combine(&pk, &partials).unwrap(), BigUint::from(77u32));
    }

    #[test]
    fn collect_partials_reports_liveness_failures() {
        let (pk, shares, mut rng) = setup(29, 3, 4);
        let c = pk.encrypt_u64(&mut rng, 1).unwrap();

        let authorities: Vec<Flaky> = shares
            .iter()
            .enumerate()
            .map(|(i, share)| Flaky::new(share, i < 2))
            .collect();

        let err = collect_partials(&pk, &authorities, &c, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, Error::ThresholdError { required: 3, supplied: 2 }));

        let err = collect_partials(&pk, &shares, &c, Duration::from_secs(0)).unwrap_err();
        assert!(err.is_liveness_failure());
        assert!(matches!(err, Error::QuorumTimeout { collected: 0, .. }));
    }

    #[test]
    fn collect_partials_hands_authorities_the_time_left() {
        let (pk, shares, mut rng) = setup(30, 2, 3);
        let c = pk.encrypt_u64(&mut rng, 4).unwrap();
        let timeout = Duration::from_secs(60);

        let mut authorities: Vec<Flaky> = shares.iter().map(|share| Flaky::new(share, true)).collect();
        authorities[0].delay = Duration::from_millis(20);

        collect_partials(&pk, &authorities, &c, timeout).unwrap();
        let first = authorities[0].timeouts.borrow()[0];
        let second = authorities[1].timeouts.borrow()[0];
        assert!(first <= timeout);
        assert!(second < first);
        assert!(authorities[2].timeouts.borrow().is_empty());
    }

    #[test]
    fn collect_partials_discards_late_answers() {
        let (pk, shares, mut rng) = setup(31, 1, 2);
        let c = pk.encrypt_u64(&mut rng, 4).unwrap();

        let mut slow = Flaky::new(&shares[0], true);
        slow.delay = Duration::from_millis(50);
        let authorities = vec![slow, Flaky::new(&shares[1], true)];

        let err = collect_partials(&pk, &authorities, &c, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::QuorumTimeout { required: 1, collected: 0 }));
        assert!(authorities[1].timeouts.borrow().is_empty());
    }
}

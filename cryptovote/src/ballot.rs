use crate::*;
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use std::collections::BTreeSet;

/// Plaintext candidate identifier
pub type CandidateId = u64;

/// A voter's ranking as submitted: plaintext candidate ids paired 1:1 with
/// encrypted ranks (lower is more preferred), and one encrypted weight.
///
/// Candidates are listed in strictly ascending id order, which is the
/// ballot's own indexing and not preference order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidateOrderBallot {
    pub candidates: Vec<CandidateId>,
    pub preferences: Vec<Ciphertext>,
    pub weight: Ciphertext,
}

/// Same candidates and ranks as a `CandidateOrderBallot`, with one encrypted
/// weight per candidate: the ballot weight for the current first preference,
/// zero everywhere else.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FirstPreferenceBallot {
    pub candidates: Vec<CandidateId>,
    pub preferences: Vec<Ciphertext>,
    pub weights: Vec<Ciphertext>,
}

/// A ballot with hidden candidate identities, ranks re-derived after
/// elimination, and an encrypted eliminated indicator per position.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidateEliminationBallot {
    pub candidates: Vec<Ciphertext>,
    pub preferences: Vec<Ciphertext>,
    pub eliminated: Vec<Ciphertext>,
    pub weight: Ciphertext,
}

/// Any of the three ballot representations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Ballot {
    CandidateOrder(CandidateOrderBallot),
    FirstPreference(FirstPreferenceBallot),
    CandidateElimination(CandidateEliminationBallot),
}

fn check_len(expected: usize, found: usize) -> Result<(), Error> {
    if expected != found {
        return Err(Error::LengthMismatch { expected, found });
    }
    Ok(())
}

fn check_not_empty(len: usize) -> Result<(), Error> {
    if len == 0 {
        return Err(Error::InvariantViolation(
            "ballot has no candidates".to_string(),
        ));
    }
    Ok(())
}

fn check_distinct(candidates: &[CandidateId]) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    for candidate in candidates {
        if !seen.insert(candidate) {
            return Err(Error::InvariantViolation(format!(
                "candidate {} appears more than once",
                candidate
            )));
        }
    }
    Ok(())
}

fn check_ascending(candidates: &[CandidateId]) -> Result<(), Error> {
    for pair in candidates.windows(2) {
        if pair[0] == pair[1] {
            return Err(Error::InvariantViolation(format!(
                "candidate {} appears more than once",
                pair[0]
            )));
        }
        if pair[0] > pair[1] {
            return Err(Error::InvariantViolation(format!(
                "candidate {} is listed after candidate {}",
                pair[1], pair[0]
            )));
        }
    }
    Ok(())
}

fn validate_all<'a, I>(pk: &PublicKey, ciphertexts: I) -> Result<(), Error>
where
    I: IntoIterator<Item = &'a Ciphertext>,
{
    ciphertexts.into_iter().try_for_each(|c| c.validate(pk))
}

fn remix_column<R: Rng + CryptoRng>(
    pk: &PublicKey,
    rng: &mut R,
    permutation: &Permutation,
    column: &[Ciphertext],
) -> Result<Vec<Ciphertext>, Error> {
    Ok(permutation
        .apply(column)?
        .iter()
        .map(|c| pk.rerandomize(rng, c))
        .collect())
}

impl CandidateOrderBallot {
    pub fn new(
        candidates: Vec<CandidateId>,
        preferences: Vec<Ciphertext>,
        weight: Ciphertext,
    ) -> Result<Self, Error> {
        check_len(candidates.len(), preferences.len())?;
        check_not_empty(candidates.len())?;
        check_ascending(&candidates)?;

        Ok(CandidateOrderBallot {
            candidates,
            preferences,
            weight,
        })
    }

    /// Encrypt a plaintext ranking, as the submission layer does client-side.
    ///
    /// `ranks[i]` is the rank of `candidates[i]`. Pairs are reordered by
    /// ascending candidate id before encryption.
    pub fn encrypt<R: Rng + CryptoRng>(
        pk: &PublicKey,
        rng: &mut R,
        candidates: &[CandidateId],
        ranks: &[u64],
        weight: u64,
    ) -> Result<Self, Error> {
        check_len(candidates.len(), ranks.len())?;

        let mut pairs: Vec<(CandidateId, u64)> =
            candidates.iter().copied().zip(ranks.iter().copied()).collect();
        pairs.sort_by_key(|&(candidate, _)| candidate);

        let preferences = pairs
            .iter()
            .map(|&(_, rank)| pk.encrypt_u64(rng, rank))
            .collect::<Result<Vec<_>, Error>>()?;
        let candidates = pairs.into_iter().map(|(candidate, _)| candidate).collect();
        let weight = pk.encrypt_u64(rng, weight)?;

        CandidateOrderBallot::new(candidates, preferences, weight)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn validate(&self, pk: &PublicKey) -> Result<(), Error> {
        check_len(self.candidates.len(), self.preferences.len())?;
        check_not_empty(self.len())?;
        check_ascending(&self.candidates)?;
        validate_all(pk, self.preferences.iter().chain(Some(&self.weight)))
    }

    /// Multiply the ballot weight by a public factor, e.g. an integer-encoded
    /// surplus transfer value.
    pub fn scale_weight(&self, pk: &PublicKey, factor: &BigUint) -> CandidateOrderBallot {
        CandidateOrderBallot {
            candidates: self.candidates.clone(),
            preferences: self.preferences.clone(),
            weight: pk.scalar_mul(&self.weight, factor),
        }
    }
}

impl FirstPreferenceBallot {
    pub fn new(
        candidates: Vec<CandidateId>,
        preferences: Vec<Ciphertext>,
        weights: Vec<Ciphertext>,
    ) -> Result<Self, Error> {
        check_len(candidates.len(), preferences.len())?;
        check_len(candidates.len(), weights.len())?;
        check_not_empty(candidates.len())?;
        check_distinct(&candidates)?;

        Ok(FirstPreferenceBallot {
            candidates,
            preferences,
            weights,
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn validate(&self, pk: &PublicKey) -> Result<(), Error> {
        check_len(self.candidates.len(), self.preferences.len())?;
        check_len(self.candidates.len(), self.weights.len())?;
        check_not_empty(self.len())?;
        check_distinct(&self.candidates)?;
        validate_all(pk, self.preferences.iter().chain(self.weights.iter()))
    }
}

impl CandidateEliminationBallot {
    pub fn new(
        candidates: Vec<Ciphertext>,
        preferences: Vec<Ciphertext>,
        eliminated: Vec<Ciphertext>,
        weight: Ciphertext,
    ) -> Result<Self, Error> {
        check_len(candidates.len(), preferences.len())?;
        check_len(candidates.len(), eliminated.len())?;
        check_not_empty(candidates.len())?;

        Ok(CandidateEliminationBallot {
            candidates,
            preferences,
            eliminated,
            weight,
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn validate(&self, pk: &PublicKey) -> Result<(), Error> {
        check_len(self.candidates.len(), self.preferences.len())?;
        check_len(self.candidates.len(), self.eliminated.len())?;
        check_not_empty(self.len())?;
        validate_all(
            pk,
            self.candidates
                .iter()
                .chain(self.preferences.iter())
                .chain(self.eliminated.iter())
                .chain(Some(&self.weight)),
        )
    }

    /// Move positions as a unit and re-randomize every ciphertext.
    pub fn remix<R: Rng + CryptoRng>(
        &self,
        pk: &PublicKey,
        rng: &mut R,
        permutation: &Permutation,
    ) -> Result<CandidateEliminationBallot, Error> {
        let candidates = remix_column(pk, rng, permutation, &self.candidates)?;
        let preferences = remix_column(pk, rng, permutation, &self.preferences)?;
        let eliminated = remix_column(pk, rng, permutation, &self.eliminated)?;
        let weight = pk.rerandomize(rng, &self.weight);

        CandidateEliminationBallot::new(candidates, preferences, eliminated, weight)
    }
}

impl Ballot {
    pub fn num_candidates(&self) -> usize {
        match self {
            Ballot::CandidateOrder(b) => b.len(),
            Ballot::FirstPreference(b) => b.len(),
            Ballot::CandidateElimination(b) => b.len(),
        }
    }

    pub fn validate(&self, pk: &PublicKey) -> Result<(), Error> {
        match self {
            Ballot::CandidateOrder(b) => b.validate(pk),
            Ballot::FirstPreference(b) => b.validate(pk),
            Ballot::CandidateElimination(b) => b.validate(pk),
        }
    }

    /// Name of the representation, as used in the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            Ballot::CandidateOrder(_) => "candidate_order",
            Ballot::FirstPreference(_) => "first_preference",
            Ballot::CandidateElimination(_) => "candidate_elimination",
        }
    }
}

impl From<CandidateOrderBallot> for Ballot {
    fn from(ballot: CandidateOrderBallot) -> Self {
        Ballot::CandidateOrder(ballot)
    }
}

impl From<FirstPreferenceBallot> for Ballot {
    fn from(ballot: FirstPreferenceBallot) -> Self {
        Ballot::FirstPreference(ballot)
    }
}

impl From<CandidateEliminationBallot> for Ballot {
    fn from(ballot: CandidateEliminationBallot) -> Self {
        Ballot::CandidateElimination(ballot)
    }
}

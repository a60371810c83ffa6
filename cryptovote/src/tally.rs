use crate::*;
use indexmap::IndexMap;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, Rng};
use std::collections::BTreeSet;

/// Outcome of one counting round.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// The ballot pool after the round: mixed, re-ranked around the
    /// elimination set, candidates in ascending id order
    pub ballots: Vec<CandidateOrderBallot>,

    /// First-preference totals of the continuing candidates
    pub totals: IndexMap<CandidateId, BigUint>,

    /// Weight held by ballots that rank no continuing candidate
    pub exhausted: BigUint,
}

/// Sum the weight column of every candidate across a set of first-preference
/// ballots, decrypting only the per-candidate sums.
///
/// Every ballot must list the same candidates. Totals keep the candidate order
/// of the first ballot.
pub fn first_preference_totals(
    pk: &PublicKey,
    quorum: &Quorum,
    ballots: &[FirstPreferenceBallot],
) -> Result<IndexMap<CandidateId, BigUint>, Error> {
    let first = match ballots.first() {
        Some(first) => first,
        None => return Ok(IndexMap::new()),
    };
    let expected: BTreeSet<CandidateId> = first.candidates.iter().copied().collect();

    let mut sums: IndexMap<CandidateId, Ciphertext> = IndexMap::with_capacity(first.len());
    for ballot in ballots {
        ballot.validate(pk)?;

        let candidates: BTreeSet<CandidateId> = ballot.candidates.iter().copied().collect();
        if candidates != expected {
            return Err(Error::InvariantViolation(
                "ballots in a tally must list the same candidates".to_string(),
            ));
        }

        for (candidate, weight) in ballot.candidates.iter().zip(ballot.weights.iter()) {
            let sum = match sums.get(candidate) {
                Some(sum) => pk.add(sum, weight),
                None => weight.clone(),
            };
            sums.insert(*candidate, sum);
        }
    }

    // Keep the first ballot's order
    let mut totals = IndexMap::with_capacity(sums.len());
    for candidate in &first.candidates {
        if let Some(sum) = sums.get(candidate) {
            totals.insert(*candidate, quorum.threshold_decrypt(pk, sum)?);
        }
    }

    debug!(
        "tallied {} ballots over {} candidates",
        ballots.len(),
        totals.len()
    );

    Ok(totals)
}

/// Run one counting round over a pool of order ballots.
///
/// Each ballot is converted to an elimination ballot, the pool is mixed, the
/// ballots are restored to order ballots and their first preferences are
/// tallied.
pub fn count_round<R: Rng + CryptoRng>(
    pk: &PublicKey,
    quorum: &Quorum,
    rng: &mut R,
    ballots: &[CandidateOrderBallot],
    eliminated: &BTreeSet<CandidateId>,
) -> Result<RoundResult, Error> {
    debug!(
        "counting round over {} ballots, {} candidates eliminated",
        ballots.len(),
        eliminated.len()
    );

    let elimination = ballots
        .iter()
        .map(|ballot| candidate_order_to_candidate_elimination(pk, quorum, rng, ballot, eliminated))
        .collect::<Result<Vec<_>, Error>>()?;

    let pool = mix_ballots(pk, rng, &elimination)?;

    let restored = pool
        .iter()
        .map(|ballot| candidate_elimination_to_candidate_order(pk, quorum, rng, ballot))
        .collect::<Result<Vec<_>, Error>>()?;

    let first_preferences = restored
        .iter()
        .map(|ballot| candidate_order_to_first_preference(pk, quorum, rng, ballot))
        .collect::<Result<Vec<_>, Error>>()?;

    let mut totals = first_preference_totals(pk, quorum, &first_preferences)?;

    let mut exhausted = BigUint::zero();
    for candidate in eliminated {
        if let Some(total) = totals.shift_remove(candidate) {
            exhausted += total;
        }
    }

    Ok(RoundResult {
        ballots: restored,
        totals,
        exhausted,
    })
}

use crate::*;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rand::{CryptoRng, Rng};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Find the candidate currently ranked first and move the ballot weight onto it.
///
/// Every preference is blind-tested against rank 1. The matching position gets
/// a re-randomized copy of the ballot weight, every other position a freshly
/// constructed encryption of zero. Candidates and preferences pass through.
pub fn candidate_order_to_first_preference<R: Rng + CryptoRng>(
    pk: &PublicKey,
    quorum: &Quorum,
    rng: &mut R,
    ballot: &CandidateOrderBallot,
) -> Result<FirstPreferenceBallot, Error> {
    ballot.validate(pk)?;

    // Test anonymous slots so the quorum cannot tell which candidate matched
    let slots = Permutation::random(rng, ballot.len());
    let mut first = None;
    for slot in 0..slots.len() {
        let position = slots.source(slot);
        let rank_minus_one = pk.sub_plaintext(&ballot.preferences[position], &BigUint::from(1u32));
        if is_zero(pk, quorum, rng, &rank_minus_one)? {
            if first.is_some() {
                return Err(Error::InvariantViolation(
                    "ballot ranks more than one candidate first".to_string(),
                ));
            }
            first = Some(position);
        }
    }

    let first = first.ok_or_else(|| {
        Error::InvariantViolation("ballot ranks no candidate first".to_string())
    })?;

    let weights = (0..ballot.len())
        .map(|position| {
            if position == first {
                pk.rerandomize(rng, &ballot.weight)
            } else {
                pk.encrypt_zero(rng)
            }
        })
        .collect();

    FirstPreferenceBallot::new(ballot.candidates.clone(), ballot.preferences.clone(), weights)
}

/// Hide candidate identities and re-rank the ballot around an elimination set.
///
/// Continuing candidates get dense ranks `1..=k'` in their original order.
/// Eliminated candidates follow with ranks `k'+1..=k`, also in their original
/// order, and carry an encrypted indicator of 1. Positions are jointly shuffled
/// before the ballot is returned.
pub fn candidate_order_to_candidate_elimination<R: Rng + CryptoRng>(
    pk: &PublicKey,
    quorum: &Quorum,
    rng: &mut R,
    ballot: &CandidateOrderBallot,
    eliminated: &BTreeSet<CandidateId>,
) -> Result<CandidateEliminationBallot, Error> {
    ballot.validate(pk)?;

    let (removed, live): (Vec<usize>, Vec<usize>) =
        (0..ballot.len()).partition(|&i| eliminated.contains(&ballot.candidates[i]));

    let span = ballot.len() as u64 - 1;
    let ranks = rerank_groups(pk, quorum, rng, &ballot.preferences, &live, &removed, span)?;

    let mut candidates = Vec::with_capacity(ballot.len());
    let mut preferences = Vec::with_capacity(ballot.len());
    let mut indicators = Vec::with_capacity(ballot.len());
    for position in 0..ballot.len() {
        let is_eliminated = eliminated.contains(&ballot.candidates[position]);
        candidates.push(pk.encrypt_u64(rng, ballot.candidates[position])?);
        preferences.push(pk.encrypt_u64(rng, ranks[position])?);
        indicators.push(pk.encrypt_u64(rng, is_eliminated as u64)?);
    }

    let (candidates, preferences, indicators) =
        shuffle(rng, &(candidates, preferences, indicators))?;

    debug!(
        "elimination ballot built: {} live, {} eliminated",
        live.len(),
        removed.len()
    );

    CandidateEliminationBallot::new(
        candidates,
        preferences,
        indicators,
        pk.rerandomize(rng, &ballot.weight),
    )
}

/// Restore plaintext candidate ids from an elimination ballot.
///
/// Candidate ids and eliminated indicators are decrypted; ranks and the
/// weight never are. Encoded ranks already place continuing candidates
/// before eliminated ones, so they are kept and only re-randomized.
/// Candidates are listed in ascending id order.
pub fn candidate_elimination_to_candidate_order<R: Rng + CryptoRng>(
    pk: &PublicKey,
    quorum: &Quorum,
    rng: &mut R,
    ballot: &CandidateEliminationBallot,
) -> Result<CandidateOrderBallot, Error> {
    ballot.validate(pk)?;

    let mut ids = Vec::with_capacity(ballot.len());
    for position in 0..ballot.len() {
        ids.push(decrypt_small(pk, quorum, &ballot.candidates[position], "candidate id")?);

        let indicator = decrypt_small(pk, quorum, &ballot.eliminated[position], "eliminated indicator")?;
        if indicator > 1 {
            return Err(Error::InvariantViolation(format!(
                "eliminated indicator must be 0 or 1, found {}",
                indicator
            )));
        }
    }

    let mut order: Vec<usize> = (0..ballot.len()).collect();
    order.sort_by_key(|&position| ids[position]);

    let candidates = order.iter().map(|&position| ids[position]).collect();
    let preferences = order
        .iter()
        .map(|&position| pk.rerandomize(rng, &ballot.preferences[position]))
        .collect();

    trace!("restored order ballot of {} candidates", ballot.len());

    CandidateOrderBallot::new(candidates, preferences, pk.rerandomize(rng, &ballot.weight))
}

/// Dense ranks for `live` positions followed by dense ranks for `removed`
/// positions, offset by the number of live ones. Indexed by position.
fn rerank_groups<R: Rng + CryptoRng>(
    pk: &PublicKey,
    quorum: &Quorum,
    rng: &mut R,
    preferences: &[Ciphertext],
    live: &[usize],
    removed: &[usize],
    span: u64,
) -> Result<Vec<u64>, Error> {
    let mut ranks = vec![0; preferences.len()];

    let live_prefs: Vec<Ciphertext> = live.iter().map(|&i| preferences[i].clone()).collect();
    for (&position, rank) in live.iter().zip(dense_ranks(pk, quorum, rng, &live_prefs, span)?) {
        ranks[position] = rank;
    }

    let offset = live.len() as u64;
    let removed_prefs: Vec<Ciphertext> = removed.iter().map(|&i| preferences[i].clone()).collect();
    for (&position, rank) in removed
        .iter()
        .zip(dense_ranks(pk, quorum, rng, &removed_prefs, span)?)
    {
        ranks[position] = offset + rank;
    }

    Ok(ranks)
}

/// Oblivious counting sort: the rank of each entry is one plus the number of
/// entries with a strictly smaller encrypted value.
///
/// Comparisons run on a secretly permuted copy so the quorum only ever sees
/// anonymous slots. Equal values, or differences outside `span`, mean the
/// input was not a ranking.
fn dense_ranks<R: Rng + CryptoRng>(
    pk: &PublicKey,
    quorum: &Quorum,
    rng: &mut R,
    preferences: &[Ciphertext],
    span: u64,
) -> Result<Vec<u64>, Error> {
    let slots = Permutation::random(rng, preferences.len());
    let shuffled = slots.apply(preferences)?;

    let mut smaller = vec![0u64; shuffled.len()];
    for a in 0..shuffled.len() {
        for b in (a + 1)..shuffled.len() {
            match compare_bounded(pk, quorum, rng, &shuffled[a], &shuffled[b], span)? {
                Some(Ordering::Less) => smaller[b] += 1,
                Some(Ordering::Greater) => smaller[a] += 1,
                Some(Ordering::Equal) => {
                    return Err(Error::InvariantViolation(
                        "two candidates share the same rank".to_string(),
                    ))
                }
                None => {
                    return Err(Error::InvariantViolation(format!(
                        "ranks differ by more than {}",
                        span
                    )))
                }
            }
        }
    }

    let mut ranks = vec![0; preferences.len()];
    for (slot, count) in smaller.into_iter().enumerate() {
        ranks[slots.source(slot)] = count + 1;
    }
    Ok(ranks)
}

fn decrypt_small(
    pk: &PublicKey,
    quorum: &Quorum,
    ciphertext: &Ciphertext,
    what: &str,
) -> Result<u64, Error> {
    quorum
        .threshold_decrypt(pk, ciphertext)?
        .to_u64()
        .ok_or_else(|| Error::InvariantViolation(format!("{} does not fit in 64 bits", what)))
}

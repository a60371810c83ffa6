use crate::*;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};

/// A permutation of `0..len`: output position `i` takes input position
/// `self.source(i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation(Vec<usize>);

impl Permutation {
    pub fn identity(len: usize) -> Self {
        Permutation((0..len).collect())
    }

    /// A uniformly random permutation
    pub fn random<R: Rng + CryptoRng>(rng: &mut R, len: usize) -> Self {
        let mut sources: Vec<usize> = (0..len).collect();
        sources.shuffle(rng);
        Permutation(sources)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Input position that lands on output position `position`
    pub fn source(&self, position: usize) -> usize {
        self.0[position]
    }

    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, Error> {
        if items.len() != self.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                found: items.len(),
            });
        }
        Ok(self.0.iter().map(|&source| items[source].clone()).collect())
    }

    pub fn inverse(&self) -> Permutation {
        let mut inverse = vec![0; self.len()];
        for (position, &source) in self.0.iter().enumerate() {
            inverse[source] = position;
        }
        Permutation(inverse)
    }
}

/// Sequences that are shuffled together, possibly of different item types.
///
/// Implemented for `Vec<Vec<T>>` and for tuples of two to four `Vec`s.
pub trait CorrelatedSequences: Sized {
    /// Length shared by every sequence
    fn common_len(&self) -> Result<usize, Error>;

    /// Apply one permutation to every sequence
    fn permute(&self, permutation: &Permutation) -> Result<Self, Error>;
}

fn check_common_len<I: IntoIterator<Item = usize>>(lens: I) -> Result<usize, Error> {
    let mut lens = lens.into_iter();
    let expected = lens.next().unwrap_or(0);
    for found in lens {
        if found != expected {
            return Err(Error::LengthMismatch { expected, found });
        }
    }
    Ok(expected)
}

impl<T: Clone> CorrelatedSequences for Vec<Vec<T>> {
    fn common_len(&self) -> Result<usize, Error> {
        check_common_len(self.iter().map(|s| s.len()))
    }

    fn permute(&self, permutation: &Permutation) -> Result<Self, Error> {
        self.iter().map(|s| permutation.apply(s)).collect()
    }
}

macro_rules! impl_correlated_tuple {
    ($($item:ident $idx:tt),+) => {
        impl<$($item: Clone),+> CorrelatedSequences for ($(Vec<$item>,)+) {
            fn common_len(&self) -> Result<usize, Error> {
                check_common_len(vec![$(self.$idx.len()),+])
            }

            fn permute(&self, permutation: &Permutation) -> Result<Self, Error> {
                Ok(($(permutation.apply(&self.$idx)?,)+))
            }
        }
    };
}

impl_correlated_tuple!(A 0, B 1);
impl_correlated_tuple!(A 0, B 1, C 2);
impl_correlated_tuple!(A 0, B 1, C 2, D 3);

/// Correlated oblivious shuffle.
///
/// Draws one uniformly random permutation and applies it to every sequence, so
/// the tuple `(seq_1[i], ..., seq_k[i])` reappears together at a single new
/// index. All sequences must have the same length.
pub fn shuffle<R: Rng + CryptoRng, S: CorrelatedSequences>(
    rng: &mut R,
    sequences: &S,
) -> Result<S, Error> {
    let len = sequences.common_len()?;
    let permutation = Permutation::random(rng, len);
    sequences.permute(&permutation)
}

/// One step of a mix cascade over a pool of elimination ballots.
///
/// Ballot order is shuffled, positions inside every ballot are shuffled as a
/// unit, and every ciphertext is re-randomized. Steps by different parties
/// compose by feeding one's output to the next.
pub fn mix_ballots<R: Rng + CryptoRng>(
    pk: &PublicKey,
    rng: &mut R,
    ballots: &[CandidateEliminationBallot],
) -> Result<Vec<CandidateEliminationBallot>, Error> {
    let order = Permutation::random(rng, ballots.len());

    let mixed = order
        .apply(ballots)?
        .iter()
        .map(|ballot| {
            let positions = Permutation::random(rng, ballot.len());
            ballot.remix(pk, rng, &positions)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    debug!("mixed a pool of {} ballots", mixed.len());

    Ok(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn shuffle_keeps_sequences_correlated() {
        let mut rng = ChaCha20Rng::seed_from_u64(50);
        let numbers: Vec<u64> = (0..7).collect();
        let offsets: Vec<u64> = (10..17).collect();

        // it is a random function so we must test it more than once
        let mut moved = false;
        for _ in 0..5 {
            let result = shuffle(&mut rng, &vec![numbers.clone(), offsets.clone()]).unwrap();
            assert_eq!(result.len(), 2);

            for (output, input) in result.iter().zip([&numbers, &offsets].iter()) {
                assert_eq!(output.len(), input.len());
                let mut sorted = output.clone();
                sorted.sort();
                assert_eq!(&sorted, *input);
            }

            let expected: Vec<u64> = result[0].iter().map(|i| i + 10).collect();
            assert_eq!(result[1], expected);

            moved |= result[0] != numbers;
        }
        assert!(moved);
    }

    #[test]
    fn one_permutation_correlates_different_types() {
        let mut rng = ChaCha20Rng::seed_from_u64(51);
        let numbers: Vec<u64> = (0..7).collect();
        let offsets: Vec<u64> = (10..17).collect();
        let names: Vec<String> = (0..7).map(|i| i.to_string()).collect();

        for _ in 0..5 {
            let permutation = Permutation::random(&mut rng, 7);
            let numbers_out = permutation.apply(&numbers).unwrap();
            let offsets_out = permutation.apply(&offsets).unwrap();
            let names_out = permutation.apply(&names).unwrap();

            for i in 0..7 {
                assert_eq!(offsets_out[i], numbers_out[i] + 10);
                assert_eq!(names_out[i], numbers_out[i].to_string());
            }

            assert_eq!(permutation.inverse().apply(&numbers_out).unwrap(), numbers);
        }
    }

    #[test]
    fn shuffle_mixes_integers_and_strings() {
        let mut rng = ChaCha20Rng::seed_from_u64(54);
        let numbers: Vec<u64> = (0..7).collect();
        let offsets: Vec<i64> = (10..17).collect();
        let names: Vec<String> = (0..7).map(|i| format!("candidate-{}", i)).collect();

        let mut moved = false;
        for _ in 0..5 {
            let (numbers_out, offsets_out, names_out) =
                shuffle(&mut rng, &(numbers.clone(), offsets.clone(), names.clone())).unwrap();
            assert_eq!(numbers_out.len(), 7);

            for i in 0..7 {
                assert_eq!(offsets_out[i], numbers_out[i] as i64 + 10);
                assert_eq!(names_out[i], format!("candidate-{}", numbers_out[i]));
            }

            let mut sorted = names_out.clone();
            sorted.sort();
            assert_eq!(sorted, names);

            moved |= numbers_out != numbers;
        }
        assert!(moved);
    }

    #[test]
    fn shuffle_rejects_unequal_lengths() {
        let mut rng = ChaCha20Rng::seed_from_u64(52);
        let result = shuffle(&mut rng, &vec![vec![1, 2, 3], vec![1, 2]]);
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { expected: 3, found: 2 })
        ));

        let names: Vec<String> = vec!["a".to_string(), "b".to_string()];
        let result = shuffle(&mut rng, &(vec![1u8, 2, 3], names));
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { expected: 3, found: 2 })
        ));

        let permutation = Permutation::identity(3);
        assert!(permutation.apply(&[1, 2]).is_err());
        assert!(shuffle(&mut rng, &Vec::<Vec<u8>>::new()).unwrap().is_empty());
    }

    #[test]
    fn mix_ballots_preserves_ballot_contents() {
        let mut rng = ChaCha20Rng::seed_from_u64(53);
        let params = KeygenParams {
            bit_length: 64,
            s: 2,
            threshold: 2,
            num_shares: 3,
        };
        let (pk, shares) = keygen(&mut rng, &params).unwrap();
        let quorum = Quorum::new(&shares);

        let mut pool = Vec::new();
        for voter in 0..4u64 {
            let encrypt = |rng: &mut ChaCha20Rng, values: &[u64]| -> Vec<Ciphertext> {
                values.iter().map(|v| pk.encrypt_u64(rng, *v).unwrap()).collect()
            };
            let candidates = encrypt(&mut rng, &[1, 2, 3]);
            let preferences = encrypt(&mut rng, &[voter + 1, voter + 2, voter + 3]);
            let eliminated = encrypt(&mut rng, &[0, 1, 0]);
            let weight = pk.encrypt_u64(&mut rng, 100 + voter).unwrap();
            pool.push(CandidateEliminationBallot::new(candidates, preferences, eliminated, weight).unwrap());
        }

        let mixed = mix_ballots(&pk, &mut rng, &pool).unwrap();
        assert_eq!(mixed.len(), pool.len());

        let decrypt = |c: &Ciphertext| -> u64 {
            let value = quorum.threshold_decrypt(&pk, c).unwrap();
            value.to_u64_digits().first().copied().unwrap_or(0)
        };

        let mut weights = Vec::new();
        for ballot in &mixed {
            assert!(pool.iter().all(|original| original.weight != ballot.weight));

            let weight = decrypt(&ballot.weight);
            let voter = weight - 100;
            weights.push(weight);

            // every position still carries its own (candidate, rank, eliminated) tuple
            for i in 0..3 {
                let candidate = decrypt(&ballot.candidates[i]);
                assert_eq!(decrypt(&ballot.preferences[i]), voter + candidate);
                assert_eq!(decrypt(&ballot.eliminated[i]), (candidate == 2) as u64);
            }
        }

        weights.sort();
        assert_eq!(weights, vec![100, 101, 102, 103]);
    }
}

use cryptovote::*;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Environment variable overriding the prime size of every key generation
pub const KEY_BITS_VAR: &str = "CRYPTOVOTE_KEY_BITS";

/// An election to count, as read from a JSON file.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ElectionConfig {
    /// Key generation parameters, defaults when absent
    #[serde(default)]
    pub keygen: Option<KeygenParams>,

    pub candidates: Vec<CandidateId>,

    pub ballots: Vec<BallotConfig>,

    #[serde(default = "default_seats")]
    pub seats: usize,
}

/// One voter's plaintext ranking, encrypted before counting starts.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BallotConfig {
    /// Rank of each candidate, in the order of `ElectionConfig::candidates`
    pub ranks: Vec<u64>,

    #[serde(default = "default_weight")]
    pub weight: u64,
}

fn default_seats() -> usize {
    1
}

fn default_weight() -> u64 {
    1
}

impl ElectionConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let config: ElectionConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.candidates.is_empty() {
            return Err(Error::ParameterError("no candidates".to_string()));
        }
        let distinct: BTreeSet<&CandidateId> = self.candidates.iter().collect();
        if distinct.len() != self.candidates.len() {
            return Err(Error::ParameterError(
                "candidate ids must be distinct".to_string(),
            ));
        }
        if self.seats == 0 || self.seats > self.candidates.len() {
            return Err(Error::ParameterError(format!(
                "cannot fill {} seats from {} candidates",
                self.seats,
                self.candidates.len()
            )));
        }

        let expected: Vec<u64> = (1..=self.candidates.len() as u64).collect();
        for (i, ballot) in self.ballots.iter().enumerate() {
            let mut ranks = ballot.ranks.clone();
            ranks.sort_unstable();
            if ranks != expected {
                return Err(Error::ParameterError(format!(
                    "ballot {} must rank every candidate exactly once",
                    i
                )));
            }
        }

        Ok(())
    }

    /// Key generation parameters with the environment override applied.
    pub fn keygen_params(&self) -> Result<KeygenParams, Error> {
        let mut params = self.keygen.unwrap_or_default();
        if let Some(bits) = env_key_bits()? {
            params.bit_length = bits;
        }
        params.validate()?;
        Ok(params)
    }
}

/// Prime size from `CRYPTOVOTE_KEY_BITS`, if set
pub fn env_key_bits() -> Result<Option<usize>, Error> {
    match std::env::var(KEY_BITS_VAR) {
        Ok(bits) => bits.parse().map(Some).map_err(|_| {
            Error::ParameterError(format!("{} must be a number, found {}", KEY_BITS_VAR, bits))
        }),
        Err(_) => Ok(None),
    }
}

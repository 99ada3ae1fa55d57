//! Reservation code generation
//!
//! Codes have the shape `PREFIX-XXXXXXXX`, the body drawn uniformly from `[A-Z0-9]`.
//! Candidates are checked against the store before use, and the store's unique code index
//! rejects any collision that slips in between the check and the write.
//!
//! The search is bounded: `max_attempts` candidates at `code_length`, then
//! `fallback_attempts` at `fallback_code_length`. Running out is a real, reportable outcome.

use crate::{
    config::ReservationConfig,
    storage::Store,
    types::ReservationCode,
    Result,
};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Reservation code generator
pub struct ReservationCodeGenerator {
    config: ReservationConfig,
    rng: Mutex<StdRng>,
}

impl ReservationCodeGenerator {
    /// Generator seeded from OS entropy
    pub fn new(config: ReservationConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator
    pub fn with_seed(config: ReservationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Total candidates the generator will try for one registration
    pub fn budget(&self) -> u32 {
        self.config
            .max_attempts
            .saturating_add(self.config.fallback_attempts)
    }

    /// Fresh candidate of `length` random characters, not checked for uniqueness
    pub fn candidate(&self, length: usize) -> ReservationCode {
        let mut rng = self.rng.lock();
        let body: String = (0..length)
            .map(|_| {
                let index = rng.gen_range(0..ReservationCode::ALPHABET.len());
                char::from(ReservationCode::ALPHABET[index])
            })
            .collect();
        ReservationCode::from_parts(&self.config.prefix, &body)
    }

    /// Start a bounded search for one registration
    pub fn attempts(&self) -> CodeAttempts<'_> {
        CodeAttempts {
            generator: self,
            tried: 0,
        }
    }

    /// First candidate not already assigned, or `None` once the budget is spent
    pub fn generate(&self, store: &dyn Store) -> Result<Option<ReservationCode>> {
        self.attempts().next_unique(store)
    }
}

/// One registration's share of the attempt budget.
///
/// Candidates rejected by the store at write time are retried from the same budget.
pub struct CodeAttempts<'a> {
    generator: &'a ReservationCodeGenerator,
    tried: u32,
}

impl CodeAttempts<'_> {
    /// Candidates drawn so far
    pub fn tried(&self) -> u32 {
        self.tried
    }

    /// Next candidate that the store does not know, or `None` when the budget is spent
    pub fn next_unique(&mut self, store: &dyn Store) -> Result<Option<ReservationCode>> {
        let config = &self.generator.config;

        while self.tried < self.generator.budget() {
            let length = if self.tried < config.max_attempts {
                config.code_length
            } else {
                config.fallback_code_length
            };
            self.tried += 1;

            let code = self.generator.candidate(length);
            if !store.code_exists(&code)? {
                return Ok(Some(code));
            }
            tracing::debug!(code = %code, attempt = self.tried, "Reservation code collision");
        }

        Ok(None)
    }
}

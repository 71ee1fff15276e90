//! Synthetic identifier generation.

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default upper bound (exclusive) for the random suffix.
///
/// A 5 x 50 test hands out several hundred ids per prefix across all clients,
/// which keeps cross-client collisions around one in several thousand tests.
pub const DEFAULT_ID_RANGE: u64 = 1_000_000_000;

/// Redraws allowed before a repeated value is accepted.
const MAX_REDRAWS: usize = 32;

/// Issued values remembered per generator. The set is reset when full.
const MAX_TRACKED: usize = 1 << 20;

/// An opaque token naming a test entity, e.g. `team-48213`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Produces `prefix-N` identifiers with `N` drawn uniformly from `[0, range)`.
///
/// Each virtual client owns its own generator, so no state is shared across
/// clients. Within one generator a value already handed out is redrawn, which
/// keeps a client's stream distinct until the range is nearly exhausted.
///
/// Memory grows with the ids handed out (iterations x seeds for a client) up
/// to `MAX_TRACKED` values. Once half the range has been issued redraws stop,
/// since most of them would repeat anyway.
pub struct IdGenerator {
    rng: StdRng,
    range: u64,
    issued: HashSet<String>,
    tracking_limit: usize,
}

impl IdGenerator {
    /// Generator seeded from OS entropy.
    pub fn new(range: u64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            range: range.max(1),
            issued: HashSet::new(),
            tracking_limit: MAX_TRACKED,
        }
    }

    /// Deterministic generator, for reproducible runs.
    pub fn from_seed(seed: u64, range: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            range: range.max(1),
            issued: HashSet::new(),
            tracking_limit: MAX_TRACKED,
        }
    }

    /// Generator for one virtual client. With a base seed each client gets
    /// its own derived stream.
    pub fn for_client(base_seed: Option<u64>, client_index: usize, range: u64) -> Self {
        match base_seed {
            Some(seed) => Self::from_seed(seed.wrapping_add(client_index as u64), range),
            None => Self::new(range),
        }
    }

    pub fn range(&self) -> u64 {
        self.range
    }

    pub fn generate(&mut self, prefix: &str) -> Identifier {
        let mut value = self.draw(prefix);
        if !self.is_saturated() {
            for _ in 0..MAX_REDRAWS {
                if !self.issued.contains(&value) {
                    break;
                }
                value = self.draw(prefix);
            }
        }
        if self.issued.len() >= self.tracking_limit {
            self.issued.clear();
        }
        self.issued.insert(value.clone());
        Identifier(value)
    }

    /// True once half the range has been handed out.
    fn is_saturated(&self) -> bool {
        self.issued.len() as u64 >= self.range / 2
    }

    fn draw(&mut self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.rng.gen_range(0..self.range))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_format() {
        let mut gen = IdGenerator::default();
        let id = gen.generate("team");
        let (prefix, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(prefix, "team");
        let n: u64 = suffix.parse().unwrap();
        assert!(n < DEFAULT_ID_RANGE);
    }

    #[test]
    fn test_suffix_stays_in_range() {
        let mut gen = IdGenerator::from_seed(7, 10);
        for _ in 0..1000 {
            let id = gen.generate("u");
            let n: u64 = id.as_str()["u-".len()..].parse().unwrap();
            assert!(n < 10);
        }
    }

    #[test]
    fn test_seeded_generators_are_reproducible() {
        let mut a = IdGenerator::from_seed(42, DEFAULT_ID_RANGE);
        let mut b = IdGenerator::from_seed(42, DEFAULT_ID_RANGE);
        for _ in 0..100 {
            assert_eq!(a.generate("pr"), b.generate("pr"));
        }
    }

    #[test]
    fn test_zero_range_is_clamped() {
        let mut gen = IdGenerator::new(0);
        assert_eq!(gen.range(), 1);
        assert_eq!(gen.generate("x").as_str(), "x-0");
    }

    #[test]
    fn test_distinct_across_ten_thousand_draws() {
        let mut gen = IdGenerator::default();
        let ids: HashSet<_> = (0..10_000).map(|_| gen.generate("team")).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_default_range_keeps_clients_apart() {
        // Shipped 5 x 50 profile, three user ids per run
        let mut seen = HashSet::new();
        for client in 0..5 {
            let mut gen = IdGenerator::for_client(Some(2024), client, DEFAULT_ID_RANGE);
            for _ in 0..150 {
                assert!(seen.insert(gen.generate("u")));
            }
        }
        assert_eq!(seen.len(), 750);
    }

    #[test]
    fn test_tracked_values_are_bounded() {
        let mut gen = IdGenerator::from_seed(11, DEFAULT_ID_RANGE);
        gen.tracking_limit = 8;
        for _ in 0..100 {
            gen.generate("team");
            assert!(gen.issued.len() <= 8);
        }
    }

    #[test]
    fn test_saturated_range_skips_redraws() {
        let mut gen = IdGenerator::from_seed(5, 4);
        assert!(!gen.is_saturated());
        gen.generate("pr");
        gen.generate("pr");
        assert!(gen.is_saturated());
        let id = gen.generate("pr");
        let n: u64 = id.as_str()["pr-".len()..].parse().unwrap();
        assert!(n < 4);
    }

    #[test]
    fn test_exhausted_range_still_generates() {
        let mut gen = IdGenerator::from_seed(3, 2);
        let ids: Vec<_> = (0..5).map(|_| gen.generate("pr")).collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.iter().all(|id| id.as_str() == "pr-0" || id.as_str() == "pr-1"));
    }
}

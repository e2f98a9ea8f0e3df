use tracing::warn;

use super::FailedOperationCache;
use crate::operation::OperationToken;

/// Default size of the token space, tokens are drawn from `[0, DEFAULT_TOKEN_SPACE)`
pub const DEFAULT_TOKEN_SPACE: u32 = 100_000;

/// Re-samples after which a warning about cache occupancy is logged
const RESAMPLE_WARNING_THRESHOLD: usize = 32;

/// Draws retry tokens uniformly at random and re-samples on collision with a live entry.
///
/// Generation only terminates while the cache holds fewer entries than the token space.
/// Nothing here bounds occupancy: the TTL sweep is what keeps the cache far below
/// capacity, and as the cache approaches saturation the number of re-samples grows
/// without bound.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    space: u32,
}

impl TokenGenerator {
    /// Create a generator over `[0, space)`. A zero space is treated as one.
    pub fn new(space: u32) -> Self {
        Self {
            space: space.max(1),
        }
    }

    pub fn space(&self) -> u32 {
        self.space
    }

    /// Pick a token not currently present in `cache`. Reads the cache, never mutates it.
    pub fn generate(&self, cache: &FailedOperationCache) -> OperationToken {
        let mut resamples = 0usize;
        loop {
            let candidate = OperationToken::new(fastrand::u32(0..self.space));
            if !cache.contains(candidate) {
                return candidate;
            }

            resamples += 1;
            if resamples == RESAMPLE_WARNING_THRESHOLD {
                warn!(
                    occupied = cache.len(),
                    space = self.space,
                    "Token generation keeps colliding, failed-operation cache is close to saturation"
                );
            }
        }
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_SPACE)
    }
}

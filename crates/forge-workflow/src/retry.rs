//! The engine's single retry policy: `min(2^attempt, 60s)`, applied only
//! to transient errors. Helpers, by contrast, never retry on their own —
//! see `forge_core::ForgeError::is_transient`.

use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// `attempt` counts completed, failed tries (the first retry is
/// `backoff_for(1)`).
pub(crate) fn backoff_for(attempt: u32) -> Duration {
    let uncapped = 2u64.saturating_pow(attempt);
    Duration::from_secs(uncapped).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_the_cap() {
        assert_eq!(backoff_for(1), Duration::from_secs(2));
        assert_eq!(backoff_for(2), Duration::from_secs(4));
        assert_eq!(backoff_for(5), Duration::from_secs(32));
    }

    #[test]
    fn backoff_is_capped_at_sixty_seconds() {
        assert_eq!(backoff_for(6), Duration::from_secs(60));
        assert_eq!(backoff_for(20), Duration::from_secs(60));
    }
}

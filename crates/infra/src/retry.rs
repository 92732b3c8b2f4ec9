//! Three-tier retry/backoff policy for contended counter updates.
//!
//! A losing writer first retries immediately, then with a constant delay,
//! then with exponential backoff; each tier has its own attempt budget.
//! The policy is a pure state machine; sleeping happens at the call site.

use std::time::Duration;

/// Backoff tier. Only ever escalates forward within one increment call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackoffTier {
    /// Retry without waiting.
    Immediate,
    /// Retry after a fixed delay.
    ConstantDelay,
    /// Retry after a doubling delay; the last line of defense.
    Exponential,
}

impl BackoffTier {
    /// The tier after this one, or `None` from the final tier.
    pub fn next(self) -> Option<BackoffTier> {
        match self {
            BackoffTier::Immediate => Some(BackoffTier::ConstantDelay),
            BackoffTier::ConstantDelay => Some(BackoffTier::Exponential),
            BackoffTier::Exponential => None,
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt budget granted to each tier.
    pub attempts_per_tier: u32,
    /// Delay entering the delayed tiers.
    pub base_delay: Duration,
    /// Cap on the doubling delay in the exponential tier. Uncapped doubling
    /// against a stalled backing store pushes single sleeps into minutes.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_tier: 15,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts_per_tier: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            // A zero budget would escalate through every tier on the first
            // conflict.
            attempts_per_tier: attempts_per_tier.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// State for a fresh increment call.
    pub fn initial_state(&self) -> RetryState {
        RetryState {
            tier: BackoffTier::Immediate,
            attempts_remaining: self.attempts_per_tier.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Next state after a failed write attempt, or `None` when the policy
    /// is exhausted.
    ///
    /// A failure that consumes the tier's last attempt escalates to the next
    /// tier with a full budget and the base delay; from the exponential tier
    /// there is nowhere left to go. Within the exponential tier the delay
    /// doubles (capped) before each wait.
    pub fn after_failure(&self, state: RetryState) -> Option<RetryState> {
        if state.attempts_remaining <= 1 {
            let tier = state.tier.next()?;
            return Some(RetryState {
                tier,
                attempts_remaining: self.attempts_per_tier.max(1),
                delay: self.base_delay,
            });
        }

        let delay = match state.tier {
            BackoffTier::Immediate => Duration::ZERO,
            BackoffTier::ConstantDelay => state.delay,
            BackoffTier::Exponential => (state.delay * 2).min(self.max_delay),
        };

        Some(RetryState {
            tier: state.tier,
            attempts_remaining: state.attempts_remaining - 1,
            delay,
        })
    }
}

/// Ephemeral per-increment retry state. Never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub tier: BackoffTier,
    pub attempts_remaining: u32,
    pub delay: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(25), Duration::from_secs(30))
    }

    #[test]
    fn escalates_through_tiers_deterministically() {
        let policy = policy(15);
        let mut state = policy.initial_state();

        // 15 immediate attempts, no waiting.
        for _ in 0..14 {
            state = policy.after_failure(state).unwrap();
            assert_eq!(state.tier, BackoffTier::Immediate);
            assert_eq!(state.delay, Duration::ZERO);
        }

        // The 15th failure consumes the tier.
        state = policy.after_failure(state).unwrap();
        assert_eq!(state.tier, BackoffTier::ConstantDelay);
        assert_eq!(state.attempts_remaining, 15);
        assert_eq!(state.delay, Duration::from_millis(25));

        // Constant tier never changes the delay.
        for _ in 0..14 {
            state = policy.after_failure(state).unwrap();
            assert_eq!(state.delay, Duration::from_millis(25));
        }
        state = policy.after_failure(state).unwrap();
        assert_eq!(state.tier, BackoffTier::Exponential);
        assert_eq!(state.attempts_remaining, 15);
        assert_eq!(state.delay, Duration::from_millis(25));

        // Exponential doubles before each wait.
        state = policy.after_failure(state).unwrap();
        assert_eq!(state.delay, Duration::from_millis(50));
        state = policy.after_failure(state).unwrap();
        assert_eq!(state.delay, Duration::from_millis(100));
    }

    #[test]
    fn exhausts_after_three_full_tiers() {
        let policy = policy(4);
        let mut state = policy.initial_state();

        let mut failures = 0;
        while let Some(next) = policy.after_failure(state) {
            state = next;
            failures += 1;
        }

        // 4 per tier, 3 tiers; the final failure finds nowhere to escalate.
        assert_eq!(failures, 3 * 4 - 1);
        assert_eq!(state.tier, BackoffTier::Exponential);
        assert_eq!(state.attempts_remaining, 1);
    }

    #[test]
    fn exponential_delay_is_capped() {
        let policy = RetryPolicy::new(40, Duration::from_millis(25), Duration::from_millis(200));
        let mut state = RetryState {
            tier: BackoffTier::Exponential,
            attempts_remaining: 40,
            delay: Duration::from_millis(25),
        };

        for _ in 0..10 {
            state = policy.after_failure(state).unwrap();
            assert!(state.delay <= Duration::from_millis(200));
        }
        assert_eq!(state.delay, Duration::from_millis(200));
    }

    #[test]
    fn zero_budget_is_clamped_to_one() {
        let policy = policy(0);
        let state = policy.initial_state();
        assert_eq!(state.attempts_remaining, 1);

        // First failure escalates straight to the constant tier.
        let state = policy.after_failure(state).unwrap();
        assert_eq!(state.tier, BackoffTier::ConstantDelay);
    }

    proptest! {
        /// Property: for any per-tier budget, the total number of granted
        /// retries before exhaustion is exactly three budgets minus the
        /// terminal failure.
        #[test]
        fn total_retry_count_is_three_budgets(attempts in 1u32..50) {
            let policy = policy(attempts);
            let mut state = policy.initial_state();
            let mut granted = 0u32;

            while let Some(next) = policy.after_failure(state) {
                state = next;
                granted += 1;
                prop_assert!(granted <= 3 * attempts);
            }

            prop_assert_eq!(granted, 3 * attempts - 1);
        }

        /// Property: the tier never regresses across any failure sequence.
        #[test]
        fn tier_only_escalates(attempts in 1u32..20) {
            let policy = policy(attempts);
            let mut state = policy.initial_state();

            while let Some(next) = policy.after_failure(state) {
                prop_assert!(next.tier >= state.tier);
                state = next;
            }
        }
    }
}

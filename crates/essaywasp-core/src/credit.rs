//! Credit gate for session creation.
//!
//! A pure predicate: the balance itself is owned and decremented by the
//! account service, never by this crate.

/// Credits consumed by one essay session.
pub const SESSION_COST: u32 = 10;

/// Whether a balance is enough to start a new session.
pub fn can_start_session(balance: u32) -> bool {
    balance >= SESSION_COST
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundary_is_inclusive() {
        assert!(!can_start_session(9));
        assert!(can_start_session(10));
        assert!(can_start_session(15));
        assert!(!can_start_session(0));
    }

    proptest! {
        #[test]
        fn below_cost_is_rejected(balance in 0u32..SESSION_COST) {
            prop_assert!(!can_start_session(balance));
        }

        #[test]
        fn at_or_above_cost_is_accepted(balance in SESSION_COST..=u32::MAX) {
            prop_assert!(can_start_session(balance));
        }
    }
}

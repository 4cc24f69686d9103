//! Auto-fire: the bridge between structural enablement and scheduler
//! state.
//!
//! Every transition gets this wiring unconditionally — it is "the sole
//! bridge turning structural enablement into scheduler state", not an
//! optional plugin a caller can omit. It is kept as a free function
//! rather than a boxed [`crate::observer::TransitionObserver`] because it
//! must call back into the scheduler that `Net` owns; routing it through
//! a trait object stored inside the same arena `Net` is mutating would
//! require an observer to borrow `Net` while `Net` is mid-dispatch, which
//! the borrow checker rightly refuses. User-supplied transition observers
//! stay fully dynamic because they only ever touch their own state,
//! never the net's.

/// The two edges a `disabled_arc_count` can cross.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Crossing {
    /// `disabled_arc_count` went from some positive value down to zero.
    GotEnabled,
    /// `disabled_arc_count` went from zero up to some positive value.
    GotDisabled,
}

/// Classifies a count change into a crossing, if any. A count that moves
/// between two nonzero values, or stays at the same value, is not a
/// crossing and produces no `gotEnabled`/`gotDisabled` event.
pub(crate) fn detect(before: u32, after: u32) -> Option<Crossing> {
    match (before, after) {
        (b, 0) if b > 0 => Some(Crossing::GotEnabled),
        (0, a) if a > 0 => Some(Crossing::GotDisabled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_to_zero_is_got_enabled() {
        assert_eq!(detect(2, 0), Some(Crossing::GotEnabled));
        assert_eq!(detect(1, 0), Some(Crossing::GotEnabled));
    }

    #[test]
    fn zero_to_positive_is_got_disabled() {
        assert_eq!(detect(0, 1), Some(Crossing::GotDisabled));
        assert_eq!(detect(0, 3), Some(Crossing::GotDisabled));
    }

    #[test]
    fn movement_between_nonzero_values_is_not_a_crossing() {
        assert_eq!(detect(3, 1), None);
        assert_eq!(detect(1, 2), None);
    }

    #[test]
    fn staying_put_is_not_a_crossing() {
        assert_eq!(detect(0, 0), None);
        assert_eq!(detect(2, 2), None);
    }
}

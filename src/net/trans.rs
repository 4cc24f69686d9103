//! Transitions and the five arc kinds.

use crate::net::place::PlaceId;
use crate::net::token::TokenTypeId;
use crate::observer::TransObserverHandle;

/// Reference to a transition, assigned densely in creation order.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct TransId(pub(crate) u32);

impl TransId {
    /// Returns the dense index backing this id.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference to an arc, assigned densely in creation order across the
/// whole net (not per-transition).
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct ArcId(pub(crate) u32);

impl ArcId {
    /// Returns the dense index backing this id.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A transition's firing discipline.
pub enum TransKind {
    /// Priority-ordered, weighted, fires at the current virtual time.
    Immediate {
        /// Higher values preempt lower ones; must be `> 0`.
        priority: i32,
        /// Relative likelihood within its priority bucket; must be `> 0`.
        weight: f64,
    },
    /// Fires after a sampled delay; priority is implicitly 0.
    Timed {
        /// Nullary duration sampler; must return a finite, non-negative value.
        sampler: Box<dyn FnMut() -> f64>,
    },
}

impl std::fmt::Debug for TransKind {
    /// Hand-written: `Timed`'s sampler is a boxed closure, which carries
    /// no `Debug` impl.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransKind::Immediate { priority, weight } => f
                .debug_struct("Immediate")
                .field("priority", priority)
                .field("weight", weight)
                .finish(),
            TransKind::Timed { .. } => f.debug_struct("Timed").finish_non_exhaustive(),
        }
    }
}

impl TransKind {
    /// Whether this is an immediate transition.
    #[inline]
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        matches!(self, TransKind::Immediate { .. })
    }
}

/// A transition: its arcs, firing discipline, and the observers attached
/// to it.
pub struct Transition {
    pub(crate) name: String,
    pub(crate) id: TransId,
    pub(crate) kind: TransKind,
    /// Arcs owned by this transition, in the order they were added; `fire`
    /// invokes each one's flow in this order.
    pub(crate) arcs: Vec<ArcId>,
    /// Number of this transition's presence-observer arcs whose local
    /// condition is currently false. `enabled ≡ disabled_arc_count == 0`.
    pub(crate) disabled_arc_count: u32,
    pub(crate) observers: Vec<TransObserverHandle>,
}

impl Transition {
    pub(crate) fn new(name: String, id: TransId, kind: TransKind) -> Self {
        Self {
            name,
            id,
            kind,
            arcs: Vec::new(),
            disabled_arc_count: 0,
            observers: Vec::new(),
        }
    }

    /// Whether the transition is currently enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.disabled_arc_count == 0
    }

    /// The transition's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One of the five arc shapes, each owned by exactly one transition.
#[derive(Copy, Clone, Debug)]
pub enum ArcKind {
    /// Presence observer; non-consumer; flow is a no-op.
    Test(PlaceId),
    /// Inverse presence observer (requires the place empty); non-consumer;
    /// flow is a no-op.
    Inhibitor(PlaceId),
    /// Presence observer and token consumer; flow pops and deletes a token.
    Destructor(PlaceId),
    /// Token placer; flow creates a fresh token and pushes it.
    Constructor(PlaceId, TokenTypeId),
    /// Presence observer (on the input side) and token placer; flow moves
    /// one token from input to output atomically.
    Transfer(PlaceId, PlaceId),
}

impl ArcKind {
    /// `true` for arcs whose local enabledness gates their transition.
    #[inline]
    #[must_use]
    pub fn is_presence_observer(&self) -> bool {
        !matches!(self, ArcKind::Constructor(..))
    }

    /// `true` for arcs whose flow removes a token from a place.
    #[inline]
    #[must_use]
    pub fn is_consumer(&self) -> bool {
        matches!(self, ArcKind::Destructor(_) | ArcKind::Transfer(..))
    }

    /// The place this arc observes for local enabledness, if any.
    #[inline]
    #[must_use]
    pub fn observed_place(&self) -> Option<PlaceId> {
        match self {
            ArcKind::Test(p) | ArcKind::Inhibitor(p) | ArcKind::Destructor(p) => Some(*p),
            ArcKind::Transfer(input, _) => Some(*input),
            ArcKind::Constructor(..) => None,
        }
    }

    /// Human-readable tag used in diagnostics.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            ArcKind::Test(_) => "Test",
            ArcKind::Inhibitor(_) => "Inhibitor",
            ArcKind::Destructor(_) => "Destructor",
            ArcKind::Constructor(..) => "Constructor",
            ArcKind::Transfer(..) => "Transfer",
        }
    }
}

/// An arc: its kind, owning transition, and cached local-enabledness bit.
pub struct ArcEntry {
    pub(crate) id: ArcId,
    pub(crate) trans: TransId,
    pub(crate) kind: ArcKind,
    /// Cached evaluation of this arc's presence condition against its
    /// place, maintained incrementally by the place's push/pop hooks.
    pub(crate) locally_enabled: bool,
}

impl ArcEntry {
    /// Evaluates whether this arc's local condition holds, given whether
    /// its observed place is currently empty.
    #[must_use]
    pub(crate) fn evaluate(kind: &ArcKind, place_empty: bool) -> bool {
        match kind {
            ArcKind::Inhibitor(_) => place_empty,
            ArcKind::Test(_) | ArcKind::Destructor(_) | ArcKind::Transfer(..) => !place_empty,
            ArcKind::Constructor(..) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inhibitor_is_locally_enabled_when_place_empty() {
        assert!(ArcEntry::evaluate(&ArcKind::Inhibitor(PlaceId(0)), true));
        assert!(!ArcEntry::evaluate(&ArcKind::Inhibitor(PlaceId(0)), false));
    }

    #[test]
    fn destructor_is_locally_enabled_when_place_nonempty() {
        assert!(!ArcEntry::evaluate(&ArcKind::Destructor(PlaceId(0)), true));
        assert!(ArcEntry::evaluate(&ArcKind::Destructor(PlaceId(0)), false));
    }

    #[test]
    fn constructor_is_not_a_presence_observer() {
        let arc = ArcKind::Constructor(PlaceId(0), TokenTypeId(0));
        assert!(!arc.is_presence_observer());
        assert!(!arc.is_consumer());
    }

    #[test]
    fn transfer_observes_its_input_place() {
        let arc = ArcKind::Transfer(PlaceId(2), PlaceId(5));
        assert_eq!(arc.observed_place(), Some(PlaceId(2)));
        assert!(arc.is_consumer());
    }

    #[test]
    fn transition_enabled_iff_zero_disabled_arcs() {
        let mut t = Transition::new(
            "t".into(),
            TransId(0),
            TransKind::Immediate {
                priority: 1,
                weight: 1.0,
            },
        );
        assert!(t.is_enabled());
        t.disabled_arc_count = 1;
        assert!(!t.is_enabled());
    }
}

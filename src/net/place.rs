//! Places, the token policy, and the construction-time status FSM.

use crate::error::{SimError, TransKindTag};
use crate::net::token::{Token, TokenTypeId};
use crate::observer::PlaceObserverHandle;

/// Reference to a place, assigned densely in creation order.
///
/// Uses the newtype-over-index pattern for place references, minus
/// the compile-time net-type parameter: this net is built at runtime from
/// names, not from Rust types.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct PlaceId(pub(crate) u32);

impl PlaceId {
    /// Returns the dense index backing this id.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordering a place dequeues its tokens in.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Policy {
    /// Oldest token first.
    Fifo,
    /// Newest token first.
    Lifo,
}

/// Construction-time status of a place, enforced by the status FSM below.
///
/// Runtime never transitions a place's status; it is fixed the moment the
/// net finishes being built.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PlaceStatus {
    /// No timed-consumer arc has touched this place yet.
    Undefined,
    /// Exactly one timed-consumer arc feeds this place; safe for the
    /// scheduler's "no re-sampling on stale enablement" rule.
    Stable,
    /// One or more immediate-consumer arcs feed this place; no timed arc may.
    Transient,
}

impl PlaceStatus {
    /// Applies one incoming-arc observation to the FSM, returning the new
    /// status or `InvalidStructure` if the combination is illegal.
    ///
    /// `consumer` is true for arcs that remove a token on flow (Destructor,
    /// Transfer-in); false for pure presence observers (Test, Inhibitor).
    pub(crate) fn transition(
        self,
        trans_kind: TransKindTag,
        consumer: bool,
        place: &str,
        trans: &str,
        arc_kind: &'static str,
    ) -> Result<PlaceStatus, SimError> {
        use PlaceStatus::{Stable, Transient, Undefined};
        use TransKindTag::{Immediate, Timed};
        let outcome = match (self, trans_kind, consumer) {
            (Undefined, Timed, true) => Some(Stable),
            (Undefined, Timed, false) => None,
            (Undefined, Immediate, true) => Some(Transient),
            (Undefined, Immediate, false) => Some(Undefined),
            (Stable, Timed, _) => None,
            (Stable, Immediate, true) => None,
            (Stable, Immediate, false) => Some(Stable),
            (Transient, Timed, _) => None,
            (Transient, Immediate, _) => Some(Transient),
        };
        outcome.ok_or_else(|| SimError::InvalidStructure {
            place: place.to_string(),
            trans: trans.to_string(),
            arc_kind,
            trans_kind,
        })
    }
}

/// A place in the net: an ordered container of same-typed tokens.
pub struct Place {
    pub(crate) name: String,
    pub(crate) id: PlaceId,
    pub(crate) token_type: TokenTypeId,
    pub(crate) policy: Policy,
    pub(crate) tokens: std::collections::VecDeque<Token>,
    pub(crate) status: PlaceStatus,
    /// Indices into the net's arc arena of the presence-observer arcs
    /// incident on this place, computed once at `start()`.
    pub(crate) presence_observers: Vec<crate::net::trans::ArcId>,
    /// Place-observers attached by plugins at registration time.
    pub(crate) observers: Vec<PlaceObserverHandle>,
}

impl std::fmt::Debug for Place {
    /// Hand-written: `PlaceObserverHandle` is `Box<dyn PlaceObserver>`, and
    /// the trait carries no `Debug` supertrait (a plugin's observer may
    /// close over state, such as a meter's collector, that isn't `Debug`
    /// either), so `observers` cannot appear in a derived impl.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Place")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("token_type", &self.token_type)
            .field("policy", &self.policy)
            .field("tokens", &self.tokens)
            .field("status", &self.status)
            .field("presence_observers", &self.presence_observers)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Place {
    pub(crate) fn new(name: String, id: PlaceId, token_type: TokenTypeId, policy: Policy) -> Self {
        Self {
            name,
            id,
            token_type,
            policy,
            tokens: std::collections::VecDeque::new(),
            status: PlaceStatus::Undefined,
            presence_observers: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Number of tokens currently resident.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the place holds no tokens.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Side-effect-free peek at the next token to be popped, for tests.
    #[must_use]
    pub fn peek(&self) -> Option<&Token> {
        match self.policy {
            Policy::Fifo => self.tokens.front(),
            Policy::Lifo => self.tokens.back(),
        }
    }

    /// Appends a token, per `Policy`, ready to be pushed.
    pub(crate) fn enqueue(&mut self, token: Token) {
        self.tokens.push_back(token);
    }

    /// Removes the next token per `Policy`.
    pub(crate) fn dequeue(&mut self) -> Option<Token> {
        match self.policy {
            Policy::Fifo => self.tokens.pop_front(),
            Policy::Lifo => self.tokens.pop_back(),
        }
    }
}

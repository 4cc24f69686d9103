//! Tokens: identity, type, and the observers attached at construction.

use crate::observer::TokenObserverHandle;

/// Reference to a token type, assigned densely in creation order.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct TokenTypeId(pub(crate) u32);

impl TokenTypeId {
    /// Returns the dense index backing this id.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A unit of flow: a monotonically-assigned identity, a type, and the
/// observers the plugins attached at its construction.
///
/// `visits` is the "visited-places-so-far" counter,
/// incremented on every arrival regardless of which meters are
/// subscribed.
pub struct Token {
    id: u64,
    token_type: TokenTypeId,
    visits: u64,
    pub(crate) observers: Vec<TokenObserverHandle>,
}

impl std::fmt::Debug for Token {
    /// Hand-written: `TokenObserverHandle` is `Box<dyn TokenObserver>`, and
    /// the trait carries no `Debug` supertrait, so `observers` cannot
    /// appear in a derived impl.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("token_type", &self.token_type)
            .field("visits", &self.visits)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Token {
    pub(crate) fn new(id: u64, token_type: TokenTypeId) -> Self {
        Self {
            id,
            token_type,
            visits: 0,
            observers: Vec::new(),
        }
    }

    /// The token's 64-bit identity, assigned once at construction and
    /// never reused even after destruction.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The token's type.
    #[inline]
    #[must_use]
    pub fn token_type(&self) -> TokenTypeId {
        self.token_type
    }

    /// Number of places this token has arrived at over its lifetime.
    #[inline]
    #[must_use]
    pub fn visits(&self) -> u64 {
        self.visits
    }

    pub(crate) fn record_visit(&mut self) {
        self.visits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_has_no_visits() {
        let t = Token::new(0, TokenTypeId(0));
        assert_eq!(t.visits(), 0);
        assert_eq!(t.id(), 0);
    }

    #[test]
    fn record_visit_increments() {
        let mut t = Token::new(7, TokenTypeId(1));
        t.record_visit();
        t.record_visit();
        assert_eq!(t.visits(), 2);
        assert_eq!(t.id(), 7);
    }
}

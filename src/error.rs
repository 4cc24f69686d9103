//! Error kinds surfaced by the simulation core.

use thiserror::Error;

/// The namespace a name lookup failed against.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Namespace {
    /// Token types.
    Type,
    /// Places.
    Place,
    /// Transitions.
    Transition,
    /// Arcs.
    Arc,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Namespace::Type => "type",
            Namespace::Place => "place",
            Namespace::Transition => "transition",
            Namespace::Arc => "arc",
        };
        f.write_str(s)
    }
}

/// Transition kind, for `InvalidStructure` diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TransKindTag {
    /// A priority-ordered, weighted transition firing at the current virtual time.
    Immediate,
    /// A transition firing after a sampled delay.
    Timed,
}

impl std::fmt::Display for TransKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransKindTag::Immediate => "immediate",
            TransKindTag::Timed => "timed",
        };
        f.write_str(s)
    }
}

/// Errors raised by net construction and simulation.
#[derive(Error, Debug)]
pub enum SimError {
    /// An `add_*` call would have violated the place-status FSM.
    #[error(
        "place `{place}` cannot accept a {arc_kind} arc from/to a {trans_kind} transition `{trans}`: would leave the place FSM in an invalid state"
    )]
    InvalidStructure {
        /// The place at the centre of the violation.
        place: String,
        /// The transition targeted by the arc.
        trans: String,
        /// The arc kind attempted.
        arc_kind: &'static str,
        /// Whether the transition is immediate or timed.
        trans_kind: TransKindTag,
    },

    /// A name collided within its namespace.
    #[error("duplicate {namespace} name: `{name}`")]
    DuplicateName {
        /// Namespace the collision occurred in.
        namespace: Namespace,
        /// The colliding name.
        name: String,
    },

    /// A name lookup missed.
    #[error("unknown {namespace} name: `{name}`")]
    UnknownName {
        /// Namespace searched.
        namespace: Namespace,
        /// The name that was not found.
        name: String,
    },

    /// A token of the wrong type was pushed to a place.
    #[error("place `{place}` holds tokens of type `{expected}`, got `{found}`")]
    InvalidTokenType {
        /// The place that rejected the token.
        place: String,
        /// The place's declared token type.
        expected: String,
        /// The token's actual type.
        found: String,
    },

    /// The scheduler has no immediate and no timed transition to fire.
    ///
    /// The simulation driver treats this as a normal halt, not a failure.
    #[error("no transition is enabled")]
    NoEnabledTransition,

    /// A firing-time sampler returned a non-finite or negative duration.
    #[error("transition `{trans}` sampler returned an invalid duration: {value}")]
    BadSample {
        /// The timed transition whose sampler misbehaved.
        trans: String,
        /// The offending value.
        value: f64,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifying_fields() {
        let err = SimError::DuplicateName {
            namespace: Namespace::Place,
            name: "buffer".into(),
        };
        assert!(err.to_string().contains("buffer"));
        assert!(err.to_string().contains("place"));
    }

    #[test]
    fn no_enabled_transition_is_not_panicking_to_construct() {
        let err = SimError::NoEnabledTransition;
        assert_eq!(err.to_string(), "no transition is enabled");
    }
}

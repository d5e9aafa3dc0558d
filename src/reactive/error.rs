//! Error type for contract violations detected by the reactive kernel.

/// Errors surfaced by fallible writes ([`Sink::try_set`](super::Sink::try_set)).
///
/// Every variant is a programmer error: the kernel never retries and never
/// recovers from them. The panicking [`Sink::set`](super::Sink::set) turns
/// them into a fail-fast panic carrying this type's `Display` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// A filtered view was written with a sequence whose length differs from
    /// the number of source elements that satisfy the predicate.
    #[error("filtered write has {actual} elements but the source has {expected} matching elements")]
    FilterLengthMismatch { expected: usize, actual: usize },
    /// A property view was written while its parent had a different shape.
    #[error("property view write does not fit the parent value: {expected}")]
    ShapeMismatch { expected: String },
    /// The derived value was built without an inverse.
    #[error("derived value is read-only")]
    ReadOnly,
    /// A forward function re-entered its own recomputation.
    #[error("cycle detected: derived value depends on itself")]
    Cycle,
}

impl ReactiveError {
    /// Shorthand for a [`ReactiveError::ShapeMismatch`].
    pub fn shape(expected: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_mismatch_message() {
        let err = ReactiveError::FilterLengthMismatch {
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "filtered write has 1 elements but the source has 2 matching elements"
        );
    }

    #[test]
    fn shape_helper() {
        let err = ReactiveError::shape("index 3 within length 2");
        assert_eq!(
            err,
            ReactiveError::ShapeMismatch {
                expected: "index 3 within length 2".into()
            }
        );
        assert!(err.to_string().contains("index 3"));
    }
}

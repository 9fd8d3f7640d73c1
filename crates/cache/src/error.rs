//! Cache shape errors.

/// A patch expected a shape the cached value does not have.
///
/// Never fatal: callers abandon the surgical patch and invalidate the entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
	/// The entry holds a shape the operation cannot work on.
	#[error("cannot {operation} on a {found} entry")]
	Unsupported { operation: &'static str, found: &'static str },
	/// The entry holds resources of another kind.
	#[error("expected {expected} items, found {found}")]
	KindMismatch { expected: &'static str, found: &'static str },
	/// Entry content violates an invariant the patch relies on.
	#[error("corrupt entry: {0}")]
	Corrupt(String),
}

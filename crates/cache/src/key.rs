//! Cache keys and invalidation tags.

use std::borrow::Cow;
use std::fmt;

use tracker_model::QueryArgs;

/// Opaque invalidation label attached to cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Cow<'static, str>);

impl Tag {
	pub const fn from_static(label: &'static str) -> Self {
		Self(Cow::Borrowed(label))
	}

	pub fn new(label: impl Into<String>) -> Self {
		Self(Cow::Owned(label.into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identity of one cached query: endpoint name plus canonical arguments.
///
/// For windowed queries the arguments exclude pagination parameters; pages of
/// one window share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
	pub endpoint: Cow<'static, str>,
	pub args: QueryArgs,
}

impl QueryKey {
	pub fn new(endpoint: impl Into<Cow<'static, str>>, args: QueryArgs) -> Self {
		Self {
			endpoint: endpoint.into(),
			args,
		}
	}

	/// Key of a windowed query: pagination parameters are dropped.
	pub fn windowed(endpoint: impl Into<Cow<'static, str>>, args: &QueryArgs) -> Self {
		Self::new(endpoint, args.without_pagination())
	}
}

impl fmt::Display for QueryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}({})", self.endpoint, self.args)
	}
}

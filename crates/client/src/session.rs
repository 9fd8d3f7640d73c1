use parking_lot::RwLock;

/// Per-session credentials attached to outgoing requests.
#[derive(Debug, Default)]
pub struct Session {
	csrf_token: RwLock<Option<String>>,
}

impl Session {
	pub fn new(csrf_token: Option<String>) -> Self {
		Self {
			csrf_token: RwLock::new(csrf_token),
		}
	}

	pub fn csrf_token(&self) -> Option<String> {
		self.csrf_token.read().clone()
	}

	/// Replaces the token, e.g. after the server rotated it.
	pub fn set_csrf_token(&self, token: Option<String>) {
		*self.csrf_token.write() = token;
	}
}

use std::time::Duration;

/// Exponential reconnect delay: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
	pub base: Duration,
	pub max: Duration,
}

impl Default for Backoff {
	fn default() -> Self {
		Self {
			base: Duration::from_millis(500),
			max: Duration::from_secs(30),
		}
	}
}

impl Backoff {
	pub fn new(base: Duration, max: Duration) -> Self {
		Self { base, max }
	}

	pub fn delay(&self, attempt: u32) -> Duration {
		let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
		self.base.saturating_mul(factor).min(self.max)
	}
}

//! Push channel errors.

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The socket could not be opened.
	#[error("connect to {url} failed: {message}")]
	Connect { url: String, message: String },
	/// The open socket failed while receiving.
	#[error("transport error: {0}")]
	Transport(String),
	/// A frame was not valid event JSON.
	#[error("undecodable frame: {0}")]
	Decode(#[from] serde_json::Error),
}

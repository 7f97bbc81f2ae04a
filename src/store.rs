//! Storage contracts and built-in store implementations for persisted session tokens.
//!
//! Stores are deliberately dumb key/value surfaces: they never validate or decode what they
//! hold. Failures are reported as [`StoreError`] and the session manager decides how to
//! degrade (an unreadable store means a signed-out user, never a crash).

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Storage key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "ssa_access_token";
/// Storage key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "ssa_refresh_token";

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token stores.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists the token pair, replacing whatever was stored before.
	fn save(&self, tokens: StoredTokens) -> StoreFuture<'_, ()>;

	/// Loads the persisted token pair; missing keys load as `None`.
	fn load(&self) -> StoreFuture<'_, StoredTokens>;

	/// Removes both tokens.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Token pair as persisted under [`ACCESS_TOKEN_KEY`] and [`REFRESH_TOKEN_KEY`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
	/// Persisted access token.
	#[serde(rename = "ssa_access_token", default, skip_serializing_if = "Option::is_none")]
	pub access: Option<TokenSecret>,
	/// Persisted refresh token.
	#[serde(rename = "ssa_refresh_token", default, skip_serializing_if = "Option::is_none")]
	pub refresh: Option<TokenSecret>,
}
impl StoredTokens {
	/// Returns `true` when neither token is stored.
	pub fn is_empty(&self) -> bool {
		self.access.is_none() && self.refresh.is_none()
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

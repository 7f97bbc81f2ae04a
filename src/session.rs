//! Session snapshots and the manager that owns them.
//!
//! A [`Session`] is immutable once built. The [`SessionManager`] keeps the current snapshot
//! behind a single cell and replaces it wholesale on login, refresh, and logout, so readers
//! never observe an access token paired with a stale refresh token or stale claims.

mod manager;
mod metrics;

pub use manager::SessionManager;
pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{self, ActorId, Claims, TokenSecret},
	store::StoredTokens,
};

/// Immutable view of the signed-in user's tokens and decoded claims.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	claims: Option<Claims>,
}
impl Session {
	/// Builds a snapshot, decoding claims from the access token.
	///
	/// An access token whose payload cannot be decoded yields a session without claims; the
	/// raw token is kept so the server can still be the judge of its validity.
	pub fn from_tokens(access: Option<TokenSecret>, refresh: Option<TokenSecret>) -> Self {
		let claims = access.as_ref().and_then(|token| auth::decode(token.expose()));

		Self { access_token: access, refresh_token: refresh, claims }
	}

	/// Builds a snapshot from an auth envelope, keeping `fallback_refresh` when the envelope
	/// does not rotate the refresh token.
	pub fn from_envelope(envelope: TokenEnvelope, fallback_refresh: Option<TokenSecret>) -> Self {
		let refresh = envelope
			.refresh_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.or(fallback_refresh);

		Self::from_tokens(Some(TokenSecret::new(envelope.access_token)), refresh)
	}

	/// Current access token.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Current refresh token.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Decoded claims; present iff the access token is present and decodable.
	pub fn claims(&self) -> Option<&Claims> {
		self.claims.as_ref()
	}

	/// Expiry of the access token in seconds since the Unix epoch.
	pub fn expires_at_epoch_seconds(&self) -> Option<i64> {
		self.claims.as_ref().and_then(|claims| claims.expires_at_epoch_seconds)
	}

	/// Returns `true` when an access token is held.
	pub fn is_authenticated(&self) -> bool {
		self.access_token.is_some()
	}

	/// UI-only role hint taken from the claims.
	pub fn is_manager(&self) -> bool {
		self.claims.as_ref().is_some_and(|claims| claims.is_manager)
	}

	/// Subject of the access token, when it is a valid actor identifier.
	pub fn subject_id(&self) -> Option<ActorId> {
		self.claims.as_ref().and_then(Claims::actor_id)
	}

	/// Returns `true` when the claims say the access token has expired at `now`.
	///
	/// Tokens without decodable claims are never considered expired here.
	pub fn access_expired_at(&self, now: OffsetDateTime) -> bool {
		self.claims.as_ref().is_some_and(|claims| claims.is_expired_at(now))
	}

	/// Returns `true` when the two snapshots hold the same access token.
	pub(crate) fn same_access_token(&self, other: &Session) -> bool {
		self.access_token == other.access_token
	}

	/// Converts the snapshot into the persisted token pair.
	pub fn to_stored(&self) -> StoredTokens {
		StoredTokens { access: self.access_token.clone(), refresh: self.refresh_token.clone() }
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("subject_id", &self.claims.as_ref().map(|c| c.subject_id.as_str()))
			.field("expires_at_epoch_seconds", &self.expires_at_epoch_seconds())
			.finish()
	}
}

/// Body returned by `/auth/login` and `/auth/refresh`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
	/// Newly issued access token.
	#[serde(alias = "access_token")]
	pub access_token: String,
	/// Token type; always `bearer` in practice.
	#[serde(default, alias = "token_type")]
	pub token_type: Option<String>,
	/// Access token lifetime in seconds.
	#[serde(default, alias = "expires_in")]
	pub expires_in: Option<i64>,
	/// Rotated refresh token, when the server issues one.
	#[serde(default, alias = "refresh_token")]
	pub refresh_token: Option<String>,
}
impl Debug for TokenEnvelope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEnvelope")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("has_refresh_token", &self.refresh_token.is_some())
			.finish_non_exhaustive()
	}
}

/// Result of swapping in a refreshed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareAndSwapOutcome {
	/// The expected refresh token matched and the session was replaced.
	Updated,
	/// Another writer rotated the session first; it was left untouched.
	RefreshMismatch,
	/// The session was cleared (logout) while the refresh was in flight.
	Missing,
}

//! Access-token claim decoding.
//!
//! The payload segment is read without verifying the signature: the server re-checks every
//! request, so the client only uses claims for identity display and role-gated affordances.
//! Expiry is interpreted by the session manager, not here.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
// self
use crate::{_prelude::*, auth::ActorId};

/// Identity and role fields embedded in an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Employee identifier the token was issued to.
	#[serde(rename = "sub")]
	pub subject_id: String,
	/// Whether the employee may run manager-only report operations.
	#[serde(default)]
	pub is_manager: bool,
	/// Email address of the employee.
	#[serde(default)]
	pub email: String,
	/// Expiry as seconds since the Unix epoch; tokens without `exp` never expire client-side.
	#[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
	pub expires_at_epoch_seconds: Option<i64>,
}
impl Claims {
	/// Subject as an [`ActorId`], when it is a valid identifier.
	pub fn actor_id(&self) -> Option<ActorId> {
		ActorId::new(&self.subject_id).ok()
	}

	/// Expiry instant, when `exp` is present and representable.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at_epoch_seconds
			.and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
	}

	/// Returns `true` once `now` has reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at_epoch_seconds.is_some_and(|exp| now.unix_timestamp() >= exp)
	}

	/// Seconds remaining until expiry; negative once expired.
	pub fn seconds_until_expiry(&self, now: OffsetDateTime) -> Option<i64> {
		self.expires_at_epoch_seconds.map(|exp| exp.saturating_sub(now.unix_timestamp()))
	}
}

/// Decodes the payload segment of `token`, returning `None` for anything malformed.
pub fn decode(token: &str) -> Option<Claims> {
	let mut segments = token.split('.');
	let payload = match (segments.next(), segments.next()) {
		(Some(_header), Some(payload)) if !payload.is_empty() => payload.trim_end_matches('='),
		_ => return None,
	};
	let bytes = URL_SAFE_NO_PAD.decode(payload).or_else(|_| STANDARD_NO_PAD.decode(payload)).ok()?;

	serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::encode_test_token;

	#[test]
	fn decodes_encoded_test_token() {
		let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
		let token = encode_test_token(&serde_json::json!({
			"sub": "u1",
			"is_manager": true,
			"email": "a@b.com",
			"exp": exp,
		}));
		let claims = decode(&token).expect("Well-formed token should decode.");

		assert_eq!(claims.subject_id, "u1");
		assert!(claims.is_manager);
		assert_eq!(claims.email, "a@b.com");
		assert_eq!(claims.expires_at_epoch_seconds, Some(exp));
		assert_eq!(claims.actor_id().map(String::from), Some("u1".to_owned()));
	}

	#[test]
	fn malformed_tokens_decode_to_none() {
		assert_eq!(decode(""), None);
		assert_eq!(decode("not-a-token"), None);
		assert_eq!(decode("header..signature"), None);
		assert_eq!(decode("header.!!!.signature"), None);

		let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("plain text"));

		assert_eq!(decode(&not_json), None);

		let missing_sub = encode_test_token(&serde_json::json!({ "exp": 1_700_000_000 }));

		assert_eq!(decode(&missing_sub), None);
	}

	#[test]
	fn tokens_without_expiry_never_lapse() {
		let token = encode_test_token(&serde_json::json!({ "sub": "u1", "is_manager": true }));
		let claims = decode(&token).expect("A token without exp should still decode.");

		assert_eq!(claims.expires_at_epoch_seconds, None);
		assert_eq!(claims.expires_at(), None);
		assert!(!claims.is_expired_at(OffsetDateTime::now_utc()));
		assert_eq!(claims.seconds_until_expiry(OffsetDateTime::now_utc()), None);
	}

	#[test]
	fn padded_payload_segments_are_accepted() {
		let padded = format!(
			"h.{}.s",
			base64::engine::general_purpose::URL_SAFE
				.encode(br#"{"sub":"u2","exp":1700000000}"#)
		);
		let claims = decode(&padded).expect("Padded payload should decode.");

		assert_eq!(claims.subject_id, "u2");
		assert!(!claims.is_manager);
		assert_eq!(claims.email, "");
	}

	#[test]
	fn expiry_helpers_compare_against_now() {
		let claims = Claims {
			subject_id: "u1".into(),
			is_manager: false,
			email: "u1@example.com".into(),
			expires_at_epoch_seconds: Some(1_700_000_000),
		};
		let before = OffsetDateTime::from_unix_timestamp(1_699_999_940)
			.expect("Fixture timestamp should be valid.");
		let at = OffsetDateTime::from_unix_timestamp(1_700_000_000)
			.expect("Fixture timestamp should be valid.");

		assert!(!claims.is_expired_at(before));
		assert!(claims.is_expired_at(at));
		assert_eq!(claims.seconds_until_expiry(before), Some(60));
		assert_eq!(claims.expires_at(), Some(at));
	}
}

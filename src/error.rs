//! Client-level error types shared by the transport, session, and operation layers.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Detail used when a non-2xx response carries no interpretable body.
pub const GENERIC_DETAIL: &str = "Request failed";
/// Detail surfaced for failures that never produced an HTTP response.
pub const NETWORK_DETAIL: &str = "Network request failed";

/// Canonical client error exposed by public APIs.
///
/// Every variant maps onto the `{status, detail}` pair the server contract uses, via
/// [`Error::status`] and [`Error::detail`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Server answered with a non-2xx status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// A 401 survived the single refresh attempt, or no refresh was possible.
	#[error("Session expired: {detail}.")]
	AuthExpired {
		/// Server- or client-supplied reason string.
		detail: String,
	},
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A 2xx body did not match the expected shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
}
impl Error {
	/// HTTP status associated with the failure; `0` when no response was received.
	pub fn status(&self) -> u16 {
		match self {
			Self::Api(e) => e.status,
			Self::AuthExpired { .. } => 401,
			Self::Decode(DecodeError::Json { status, .. }) => *status,
			_ => 0,
		}
	}

	/// Human-readable detail suitable for display.
	pub fn detail(&self) -> String {
		match self {
			Self::Api(e) => e.detail.clone(),
			Self::AuthExpired { detail } => detail.clone(),
			Self::Transport(_) => NETWORK_DETAIL.into(),
			other => other.to_string(),
		}
	}

	/// Returns `true` for 409 responses (identical idempotency key still being processed).
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Api(e) if e.status == 409)
	}

	/// Returns `true` when the caller must sign in again.
	pub fn is_auth_expired(&self) -> bool {
		matches!(self, Self::AuthExpired { .. })
	}

	/// Retry-After hint carried by the failing response, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Api(e) => e.retry_after,
			_ => None,
		}
	}

	/// Flattens the error into the wire-level `{status, detail}` pair.
	pub fn to_api_error(&self) -> ApiError {
		ApiError::new(self.status(), self.detail())
	}
}

/// Non-2xx response surfaced as `{status, detail}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Request failed with status {status}: {detail}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Server-supplied detail, or [`GENERIC_DETAIL`] when the body was not JSON.
	pub detail: String,
	/// Retry-After hint from the response headers.
	#[serde(skip)]
	pub retry_after: Option<Duration>,
}
impl ApiError {
	/// Creates an error without a retry hint.
	pub fn new(status: u16, detail: impl Into<String>) -> Self {
		Self { status, detail: detail.into(), retry_after: None }
	}

	/// Interprets an error body: the JSON `detail` field when present, the serialized JSON
	/// body otherwise, and [`GENERIC_DETAIL`] for anything that is not JSON.
	pub fn from_body(status: u16, body: &[u8]) -> Self {
		let detail = match serde_json::from_slice::<serde_json::Value>(body) {
			Ok(serde_json::Value::Object(map)) => {
				let explicit = match map.get("detail") {
					Some(serde_json::Value::String(detail)) if !detail.is_empty() =>
						Some(detail.to_owned()),
					Some(detail) if !detail.is_null() && !detail.is_string() =>
						Some(detail.to_string()),
					_ => None,
				};

				explicit.unwrap_or_else(|| serde_json::Value::Object(map).to_string())
			},
			Ok(serde_json::Value::Null) | Err(_) => GENERIC_DETAIL.into(),
			Ok(other) => other.to_string(),
		};

		Self::new(status, detail)
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}
}

/// Configuration and request-construction failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http/https.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// API prefix must be an absolute path.
	#[error("API prefix must start with `/`: {prefix}.")]
	InvalidPrefix {
		/// Offending prefix.
		prefix: String,
	},
	/// Request path could not be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Proactive refresh interval must be positive.
	#[error("The proactive refresh interval must be positive.")]
	NonPositiveRefreshInterval,
	/// Retry policy failed validation.
	#[error("Retry policy is invalid: {reason}.")]
	InvalidRetryPolicy {
		/// Validation failure description.
		reason: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
	/// Background refresh requires a running Tokio runtime.
	#[error("No Tokio runtime is available to host the refresh task.")]
	MissingRuntime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the payroll API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the payroll API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Successful responses whose bodies could not be mapped onto client entities.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Body was not valid JSON for the expected type.
	#[error("Response from {endpoint} did not match the expected shape.")]
	Json {
		/// Request path that produced the body.
		endpoint: String,
		/// HTTP status of the response.
		status: u16,
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A required field was missing or invalid after wire normalization.
	#[error("Response field `{field}` is missing or invalid.")]
	Field {
		/// Field name in the internal entity.
		field: &'static str,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn error_body_prefers_detail_field() {
		let err = ApiError::from_body(422, br#"{"detail":"month must be between 1 and 12"}"#);

		assert_eq!(err.status, 422);
		assert_eq!(err.detail, "month must be between 1 and 12");
	}

	#[test]
	fn error_body_without_detail_serializes_payload() {
		let err = ApiError::from_body(400, br#"{"error":"bad"}"#);

		assert_eq!(err.detail, r#"{"error":"bad"}"#);

		let structured = ApiError::from_body(422, br#"{"detail":[{"loc":["query","year"]}]}"#);

		assert_eq!(structured.detail, r#"[{"loc":["query","year"]}]"#);
	}

	#[test]
	fn non_json_error_body_falls_back_to_generic_detail() {
		assert_eq!(ApiError::from_body(502, b"<html>Bad gateway</html>").detail, GENERIC_DETAIL);
		assert_eq!(ApiError::from_body(500, b"").detail, GENERIC_DETAIL);
	}

	#[test]
	fn status_and_detail_cover_every_variant() {
		let conflict = Error::from(ApiError::new(409, "in progress"));

		assert!(conflict.is_conflict());
		assert_eq!(conflict.status(), 409);

		let expired = Error::AuthExpired { detail: "Token expired".into() };

		assert!(expired.is_auth_expired());
		assert_eq!(expired.to_api_error(), ApiError::new(401, "Token expired"));

		let network = Error::from(TransportError::Io(std::io::Error::other("reset")));

		assert_eq!(network.status(), 0);
		assert_eq!(network.detail(), NETWORK_DETAIL);
	}

	#[test]
	fn retry_hint_only_travels_with_api_errors() {
		let hinted = Error::from(
			ApiError::new(409, "busy").with_retry_after(Some(Duration::seconds(3))),
		);

		assert_eq!(hinted.retry_after(), Some(Duration::seconds(3)));
		assert_eq!(Error::AuthExpired { detail: "x".into() }.retry_after(), None);
	}
}

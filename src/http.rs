//! Transport primitives for payroll API calls.
//!
//! [`ApiHttpClient`] is the client's only dependency on an HTTP stack: it executes one
//! fully-built [`HttpRequest`] and hands back the raw [`HttpResponse`]. Session handling,
//! refresh-and-replay, and status interpretation all live above this seam so tests can swap
//! in scripted transports.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ApiError, DecodeError},
};

/// Boxed future returned by [`ApiHttpClient::execute`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing payroll API requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// session manager, its background refresh task, and every operation coordinator. Transport
/// failures (DNS, TCP, TLS) are reported as [`crate::error::TransportError`]; any HTTP status,
/// including non-2xx, must come back as an `Ok` response.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and collects the full response.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// HTTP verbs used by the payroll API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical upper-case verb.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
#[cfg(feature = "reqwest")]
impl From<Method> for reqwest::Method {
	fn from(method: Method) -> Self {
		match method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}

/// Fully resolved request handed to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute target URL, including the query string.
	pub url: Url,
	/// Header name/value pairs in send order.
	pub headers: Vec<(String, String)>,
	/// Raw body bytes.
	pub body: Option<Vec<u8>>,
}
impl HttpRequest {
	/// Returns the first header value matching `name` case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}
}

/// Raw response collected by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers keyed by lower-cased name.
	pub headers: HashMap<String, String>,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response with the given status and body and no headers.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HashMap::new(), body: body.into() }
	}

	/// Creates a response whose body is `value` serialized as JSON.
	pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
		Self::new(status, value.to_string())
			.with_header("content-type", "application/json")
	}

	/// Adds a header, normalizing the name to lower case.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns a header value by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Parses the `Retry-After` header as either delta-seconds or an HTTP date.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(self.header("retry-after")?)
	}

	/// Passes 2xx responses through and turns everything else into [`ApiError`].
	pub fn into_result(self) -> Result<Self> {
		if self.is_success() {
			return Ok(self);
		}

		let retry_after = self.retry_after();

		Err(ApiError::from_body(self.status, &self.body).with_retry_after(retry_after).into())
	}

	/// Deserializes the body as `T`; an empty body is read as JSON `null`.
	pub fn json<T>(&self, endpoint: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let decoded = if self.body.iter().all(u8::is_ascii_whitespace) {
			serde_path_to_error::deserialize(serde_json::Value::Null)
		} else {
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&self.body))
		};

		decoded.map_err(|source| {
			DecodeError::Json { endpoint: endpoint.to_owned(), status: self.status, source }.into()
		})
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let HttpRequest { method, url, headers, body } = request;
			let mut builder = client.request(method.into(), url);

			for (name, value) in headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(crate::error::TransportError::from)?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
				})
				.collect();
			let body =
				response.bytes().await.map_err(crate::error::TransportError::from)?.to_vec();

			Ok(HttpResponse { status, headers, body })
		})
	}
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn non_success_responses_become_api_errors() {
		let err = HttpResponse::json_body(409, &serde_json::json!({ "detail": "in progress" }))
			.with_header("Retry-After", "3")
			.into_result()
			.expect_err("409 should be surfaced as an error.");

		assert!(err.is_conflict());
		assert_eq!(err.detail(), "in progress");
		assert_eq!(err.retry_after(), Some(Duration::seconds(3)));
	}

	#[test]
	fn retry_after_accepts_http_dates() {
		let future = OffsetDateTime::now_utc() + Duration::minutes(5);
		let formatted = future.format(&Rfc2822).expect("Fixture date should format.");
		let hint = parse_retry_after(&formatted).expect("Future HTTP date should yield a hint.");

		assert!(hint > Duration::minutes(4));
		assert_eq!(parse_retry_after("Mon, 01 Jan 2001 00:00:00 +0000"), None);
		assert_eq!(parse_retry_after("soon"), None);
	}

	#[test]
	fn json_reports_path_of_mismatched_field() {
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Shape {
			#[serde(rename = "fileId")]
			file_id: u64,
			path: String,
			archived: bool,
		}

		let response = HttpResponse::new(200, r#"{"fileId":7,"path":"x","archived":"nope"}"#);
		let err = response.json::<Shape>("/reports").expect_err("Invalid field should fail.");

		match err {
			Error::Decode(DecodeError::Json { endpoint, status, source }) => {
				assert_eq!(endpoint, "/reports");
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "archived");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn empty_body_decodes_as_null() {
		let unit: Option<serde_json::Value> =
			HttpResponse::new(204, Vec::new()).json("/employees/1").expect("Empty body is null.");

		assert_eq!(unit, None);
	}

	#[test]
	fn headers_are_case_insensitive() {
		let response = HttpResponse::new(200, "").with_header("Content-Disposition", "inline");
		let request = HttpRequest {
			method: Method::Get,
			url: Url::parse("http://localhost/api").expect("Fixture URL should parse."),
			headers: vec![("Idempotency-Key".into(), "k".into())],
			body: None,
		};

		assert_eq!(response.header("content-disposition"), Some("inline"));
		assert_eq!(request.header("idempotency-key"), Some("k"));
		assert_eq!(Method::Delete.to_string(), "DELETE");
	}
}

//! Authenticated request layer and the typed payroll endpoints built on it.
//!
//! [`ApiClient::send`] is where bearer injection and the single 401 refresh-and-replay live.
//! Endpoint modules only describe requests and map wire shapes onto entities; loose server
//! payloads never leave this module tree.

pub mod employees;
pub mod generation;
pub mod records;
pub mod reports;

pub use employees::*;
pub use generation::*;
pub use records::*;
pub use reports::*;

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::{ApiError, ConfigError},
	http::{ApiHttpClient, HttpRequest, HttpResponse, Method},
	obs::{self, CallKind, CallOutcome, CallSpan},
	session::{Session, SessionManager},
	store::TokenStore,
};

/// Client type backed by the default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient>;

/// Request description relative to the API prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
	/// HTTP verb.
	pub method: Method,
	/// Route, normalized by [`ClientConfig::resolve`].
	pub path: String,
	/// Query pairs appended in order.
	pub query: Vec<(String, String)>,
	/// Extra headers; `Authorization` is added by the client.
	pub headers: Vec<(String, String)>,
	/// Raw body bytes.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without query, headers, or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), headers: Vec::new(), body: None }
	}

	/// `GET path`.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// `POST path`.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// `PUT path`.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// `DELETE path`.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query pair.
	pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((name.into(), value.to_string()));

		self
	}

	/// Appends a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Serializes `body` as JSON and marks the request accordingly.
	pub fn json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(ConfigError::from)?);

		Ok(self.header("Content-Type", "application/json"))
	}

	fn to_http(&self, config: &ClientConfig, session: &Session) -> Result<HttpRequest> {
		let mut url = config.resolve(&self.path)?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		let mut headers = self.headers.clone();

		if let Some(token) = session.access_token() {
			headers.push(("Authorization".into(), token.bearer_header()));
		}

		Ok(HttpRequest { method: self.method, url, headers, body: self.body.clone() })
	}
}

/// Authenticated payroll API client.
///
/// Cloning is cheap; clones share the session manager and transport.
pub struct ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	session: SessionManager<C>,
}
impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Builds a client around an existing session manager.
	pub fn from_session(session: SessionManager<C>) -> Self {
		Self { session }
	}

	/// Session manager driving authentication for this client.
	pub fn session(&self) -> &SessionManager<C> {
		&self.session
	}

	/// Configuration shared with the session manager.
	pub fn config(&self) -> &ClientConfig {
		self.session.config()
	}

	/// Sends `request` and deserializes a 2xx body as `T`.
	///
	/// A `204 No Content` is read as JSON `null`, so `T = ()` or `Option<_>` accept it.
	pub async fn request<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let path = request.path.clone();

		self.send(request).await?.json(&path)
	}

	/// Sends `request` with the bearer token and returns the raw 2xx response.
	///
	/// A lapsed access token is refreshed before sending. A 401 triggers at most one refresh
	/// and one replay; when that is impossible or fails, [`Error::AuthExpired`] is returned.
	pub async fn send(&self, request: ApiRequest) -> Result<HttpResponse> {
		const KIND: CallKind = CallKind::Request;

		let span = CallSpan::new(KIND, "send");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.send_once_with_replay(request)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	async fn send_once_with_replay(&self, request: ApiRequest) -> Result<HttpResponse> {
		let config = self.config();
		let session = self.session.ensure_fresh().await?;
		let response =
			self.session.http_client().execute(request.to_http(config, &session)?).await?;

		if response.status != 401 {
			return response.into_result();
		}
		if session.refresh_token().is_none() {
			return Err(auth_expired(&response));
		}

		tracing::debug!(path = %request.path, "Request rejected with 401; refreshing once.");

		let refreshed = match self.session.refresh_after_rejection(&session).await {
			Ok(refreshed) => refreshed,
			Err(e) => {
				tracing::debug!(error = %e, "Refresh after 401 failed.");

				return Err(Error::AuthExpired { detail: e.detail() });
			},
		};
		let replayed =
			self.session.http_client().execute(request.to_http(config, &refreshed)?).await?;

		if replayed.status == 401 {
			return Err(auth_expired(&replayed));
		}

		replayed.into_result()
	}
}
impl<C> ApiClient<C>
where
	C: ApiHttpClient,
{
	/// Builds a client over a custom transport.
	pub fn with_http_client(
		config: ClientConfig,
		store: Arc<dyn TokenStore>,
		http_client: C,
	) -> Self {
		Self::from_session(SessionManager::new(config, store, Arc::new(http_client)))
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient> {
	/// Builds a client over a default reqwest transport.
	pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Self {
		Self::with_http_client(config, store, ReqwestHttpClient::default())
	}
}
impl<C> Clone for ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self { session: self.session.clone() }
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient").field("session", &self.session).finish()
	}
}

fn auth_expired(response: &HttpResponse) -> Error {
	Error::AuthExpired { detail: ApiError::from_body(response.status, &response.body).detail }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::test_config, auth::TokenSecret};

	#[test]
	fn to_http_attaches_bearer_and_query() {
		let config = test_config("http://localhost:8000");
		let session = Session::from_tokens(Some(TokenSecret::new("a1")), None);
		let request = ApiRequest::post("/reports_generation/createAggregatedEmployeeData")
			.query("managerId", "m 1")
			.query("month", 3)
			.header("Idempotency-Key", "k1")
			.to_http(&config, &session)
			.expect("Request should resolve.");

		assert_eq!(
			request.url.as_str(),
			"http://localhost:8000/api/reports_generation/createAggregatedEmployeeData?managerId=m+1&month=3"
		);
		assert_eq!(request.header("authorization"), Some("Bearer a1"));
		assert_eq!(request.header("idempotency-key"), Some("k1"));
		assert_eq!(request.header("content-type"), None);
	}

	#[test]
	fn json_body_sets_content_type() {
		let request = ApiRequest::put("/employees/1")
			.json(&serde_json::json!({ "firstName": "Ana" }))
			.expect("Body should serialize.")
			.to_http(&test_config("http://localhost:8000"), &Session::default())
			.expect("Request should resolve.");

		assert_eq!(request.header("content-type"), Some("application/json"));
		assert_eq!(request.header("authorization"), None);
		assert_eq!(request.body.as_deref(), Some(br#"{"firstName":"Ana"}"#.as_slice()));
	}
}

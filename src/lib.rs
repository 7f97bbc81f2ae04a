//! Session-aware payroll API client: bearer tokens that refresh themselves behind a singleflight
//! guard, and report operations that retry under idempotency keys without duplicating the
//! expensive work (PDF rendering, email delivery) happening on the server.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod idempotency;
pub mod obs;
pub mod operation;
pub mod session;
pub mod store;

#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers shared by unit and integration tests.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use tokio::sync::Notify;
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
	use crate::{
		api::ApiClient,
		config::{ClientConfig, RetryPolicy},
		http::{ApiHttpClient, HttpFuture, HttpRequest, HttpResponse},
		store::{MemoryStore, TokenStore},
	};

	/// Reqwest-backed client type used by integration tests.
	#[cfg(feature = "reqwest")]
	pub type ReqwestTestClient = ApiClient<ReqwestHttpClient>;

	/// Builds an unsigned JWT-shaped token whose payload is `claims` serialized as JSON.
	pub fn encode_test_token(claims: &serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.signature")
	}

	/// Builds a token for `subject` that expires `ttl` from now.
	pub fn test_token(subject: &str, is_manager: bool, ttl: Duration) -> String {
		let exp = (OffsetDateTime::now_utc() + ttl).unix_timestamp();

		encode_test_token(&serde_json::json!({
			"sub": subject,
			"is_manager": is_manager,
			"email": format!("{subject}@example.com"),
			"exp": exp,
		}))
	}

	/// Retry policy with millisecond delays so conflict loops finish quickly under test.
	pub fn fast_retry_policy() -> RetryPolicy {
		RetryPolicy {
			initial_delay: Duration::milliseconds(5),
			multiplier: 2,
			max_delay: Duration::milliseconds(20),
			max_retries: Some(5),
		}
	}

	/// Client configuration pointing at `base_url` with the fast retry policy.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder()
			.base_url(Url::parse(base_url).expect("Test base URL should parse."))
			.retry_policy(fast_retry_policy())
			.build()
			.expect("Test client configuration should be valid.")
	}

	/// Transport that replays queued responses in order and records every request.
	///
	/// An empty queue answers `500`. With a gate installed, each call waits for one
	/// [`Notify::notify_one`] before responding.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		responses: Mutex<VecDeque<HttpResponse>>,
		requests: Mutex<Vec<HttpRequest>>,
		gate: Option<Arc<Notify>>,
	}
	impl ScriptedTransport {
		/// Holds every response until the returned gate is notified.
		pub fn gated() -> (Self, Arc<Notify>) {
			let gate = Arc::new(Notify::new());

			(Self { gate: Some(gate.clone()), ..Default::default() }, gate)
		}

		/// Queues a response.
		pub fn push(&self, response: HttpResponse) -> &Self {
			self.responses.lock().push_back(response);

			self
		}

		/// Queues a JSON response.
		pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
			self.push(HttpResponse::json_body(status, &body))
		}

		/// Requests seen so far.
		pub fn requests(&self) -> Vec<HttpRequest> {
			self.requests.lock().clone()
		}

		/// Number of requests seen so far.
		pub fn request_count(&self) -> usize {
			self.requests.lock().len()
		}
	}
	impl ApiHttpClient for ScriptedTransport {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			self.requests.lock().push(request);

			let response = self.responses.lock().pop_front().unwrap_or_else(|| {
				HttpResponse::json_body(500, &serde_json::json!({ "detail": "unscripted" }))
			});
			let gate = self.gate.clone();

			Box::pin(async move {
				if let Some(gate) = gate {
					gate.notified().await;
				}

				Ok(response)
			})
		}
	}

	/// Constructs an [`ApiClient`] over the provided transport backed by an in-memory store.
	pub fn build_test_client<C>(base_url: &str, http_client: C) -> (ApiClient<C>, Arc<MemoryStore>)
	where
		C: ApiHttpClient,
	{
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let client = ApiClient::with_http_client(test_config(base_url), store, http_client);

		(client, store_backend)
	}

	/// Constructs a reqwest-backed [`ApiClient`] for `httpmock` servers.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(base_url: &str) -> (ReqwestTestClient, Arc<MemoryStore>) {
		build_test_client(base_url, ReqwestHttpClient::default())
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

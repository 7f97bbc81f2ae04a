//! Session manager: login, logout, singleflight refresh, and the proactive refresh task.

// std
use std::sync::{
	Weak,
	atomic::{AtomicBool, Ordering},
};
// crates.io
use tokio::{
	runtime::Handle,
	task::JoinHandle,
	time::{Instant, MissedTickBehavior, interval_at},
};
// self
use crate::{
	_prelude::*,
	auth::{Claims, TokenSecret},
	config::ClientConfig,
	error::ConfigError,
	http::{ApiHttpClient, HttpRequest, Method},
	obs::{self, CallKind, CallOutcome, CallSpan},
	session::{CompareAndSwapOutcome, RefreshMetrics, Session, TokenEnvelope},
	store::{StoredTokens, TokenStore},
};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Serialize)]
struct LoginRequest<'a> {
	email: &'a str,
	password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
	refresh_token: &'a str,
}

/// Owns the current [`Session`] and every transition applied to it.
///
/// Cloning is cheap and every clone observes the same session. The proactive refresh task
/// only holds a weak reference, so it stops once the last clone is dropped.
pub struct SessionManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	inner: Arc<SessionInner<C>>,
}
impl<C> SessionManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a signed-out manager; call [`SessionManager::bootstrap`] to load persisted
	/// tokens.
	pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>, http_client: Arc<C>) -> Self {
		Self {
			inner: Arc::new(SessionInner {
				http_client,
				config,
				store,
				session: RwLock::new(Arc::new(Session::default())),
				loaded: AtomicBool::new(false),
				refresh_guard: AsyncMutex::new(()),
				persist_guard: AsyncMutex::new(()),
				refresh_task: Mutex::new(None),
				metrics: RefreshMetrics::default(),
			}),
		}
	}

	/// Current session snapshot.
	pub fn snapshot(&self) -> Arc<Session> {
		self.inner.session.read().clone()
	}

	/// Returns `true` once [`SessionManager::bootstrap`] has completed.
	pub fn is_loaded(&self) -> bool {
		self.inner.loaded.load(Ordering::Acquire)
	}

	/// Decoded claims of the current access token.
	pub fn claims(&self) -> Option<Claims> {
		self.snapshot().claims().cloned()
	}

	/// UI-only role hint; the server enforces the real check.
	pub fn is_manager(&self) -> bool {
		self.snapshot().is_manager()
	}

	/// Seconds until the current access token expires; negative once expired.
	pub fn seconds_until_expiry(&self) -> Option<i64> {
		self.snapshot()
			.claims()
			.and_then(|claims| claims.seconds_until_expiry(OffsetDateTime::now_utc()))
	}

	/// Refresh counters for this manager.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Configuration the manager was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Returns `true` while a proactive refresh task is armed.
	pub fn is_refresh_armed(&self) -> bool {
		self.inner.refresh_task.lock().as_ref().is_some_and(|task| !task.is_finished())
	}

	/// Loads persisted tokens and decodes their claims without touching the network.
	///
	/// Storage failures degrade to a signed-out session. An access token whose claims cannot
	/// be decoded is dropped, while a refresh token stored next to it is kept.
	pub async fn bootstrap(&self) -> Arc<Session> {
		let stored = match self.inner.store.load().await {
			Ok(stored) => stored,
			Err(e) => {
				tracing::warn!(error = %e, "Token store is unavailable; starting signed out.");

				StoredTokens::default()
			},
		};
		let mut session = Session::from_tokens(stored.access, stored.refresh);

		if session.is_authenticated() && session.claims().is_none() {
			tracing::warn!("Persisted access token could not be decoded; discarding it.");

			session = Session::from_tokens(None, session.refresh_token().cloned());
		}

		let session = Arc::new(session);

		self.inner.replace(session.clone());
		self.inner.loaded.store(true, Ordering::Release);

		if session.is_authenticated() && session.refresh_token().is_some() {
			self.arm_or_warn();
		}

		session
	}

	/// Exchanges credentials at `/auth/login` and installs the resulting session.
	///
	/// Server failures (for example `401 Invalid credentials`) are returned untouched and leave
	/// the current session in place.
	pub async fn login(&self, email: &str, password: &str) -> Result<Arc<Session>> {
		const KIND: CallKind = CallKind::Login;

		let span = CallSpan::new(KIND, "login");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let envelope =
					self.inner.exchange(LOGIN_PATH, &LoginRequest { email, password }).await?;
				let session = Arc::new(Session::from_envelope(envelope, None));
				let _persisting = self.inner.persist_guard.lock().await;

				self.inner.replace(session.clone());
				self.inner.persist(&session).await;

				if session.refresh_token().is_some() {
					self.arm_or_warn();
				} else {
					self.inner.disarm();
				}

				Ok(session)
			})
			.await;

		record(KIND, &result);

		result
	}

	/// Cancels the proactive refresh task, clears the in-memory session, then clears the
	/// store.
	///
	/// Waits for an in-flight login or refresh save to land first, so the store is empty once
	/// this returns. The in-memory session is signed out even when clearing the store fails.
	pub async fn logout(&self) -> Result<()> {
		self.inner.disarm();

		let _persisting = self.inner.persist_guard.lock().await;

		self.inner.replace(Arc::new(Session::default()));

		self.inner.store.clear().await?;

		Ok(())
	}

	/// Rotates the session at `/auth/refresh`, serialized with every other refresh.
	pub async fn refresh(&self) -> Result<Arc<Session>> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refresh");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.inner.refresh_guard.lock().await;
				let current = self.snapshot();

				self.refresh_locked(current).await
			})
			.await;

		record(KIND, &result);

		result
	}

	/// Spawns (or re-spawns) the recurring refresh task on the current Tokio runtime.
	///
	/// Each tick calls [`SessionManager::refresh`]; failures are logged and the current
	/// session is kept.
	pub fn arm_proactive_refresh(&self) -> Result<(), ConfigError> {
		let handle = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let period = self.inner.config.refresh_interval.unsigned_abs();
		let weak = Arc::downgrade(&self.inner);
		let task = handle.spawn(proactive_refresh_loop(weak, period));

		if let Some(previous) = self.inner.refresh_task.lock().replace(task) {
			previous.abort();
		}

		Ok(())
	}

	/// Refreshes after the server rejected a request made with `rejected`.
	///
	/// Callers that queued behind an in-flight refresh reuse its result instead of rotating
	/// the tokens a second time.
	pub(crate) async fn refresh_after_rejection(&self, rejected: &Session) -> Result<Arc<Session>> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refresh_after_rejection");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.inner.refresh_guard.lock().await;
				let current = self.snapshot();

				if current.is_authenticated() && !current.same_access_token(rejected) {
					self.inner.metrics.record_coalesced();
					tracing::debug!("Reusing session refreshed by a concurrent caller.");

					return Ok(current);
				}

				self.refresh_locked(current).await
			})
			.await;

		record(KIND, &result);

		result
	}

	/// Returns a session whose access token is not known to be expired, refreshing first when
	/// the claims say it has lapsed.
	///
	/// A failed refresh is reported as [`Error::AuthExpired`] carrying the server's detail.
	pub(crate) async fn ensure_fresh(&self) -> Result<Arc<Session>> {
		let current = self.snapshot();

		if !current.access_expired_at(OffsetDateTime::now_utc()) {
			return Ok(current);
		}
		if current.refresh_token().is_none() {
			return Err(Error::AuthExpired { detail: "Access token expired".into() });
		}

		self.refresh_after_rejection(&current).await.map_err(|e| {
			tracing::debug!(error = %e, "Refresh of a lapsed access token failed.");

			Error::AuthExpired { detail: e.detail() }
		})
	}

	/// Transport shared by the session and every request made through it.
	pub fn http_client(&self) -> &C {
		&self.inner.http_client
	}

	async fn refresh_locked(&self, current: Arc<Session>) -> Result<Arc<Session>> {
		let metrics = &self.inner.metrics;

		metrics.record_attempt();

		let Some(expected) = current.refresh_token().cloned() else {
			metrics.record_failure();

			return Err(Error::AuthExpired { detail: "No refresh token available".into() });
		};
		let envelope = self
			.inner
			.exchange(REFRESH_PATH, &RefreshRequest { refresh_token: expected.expose() })
			.await
			.inspect_err(|_| metrics.record_failure())?;
		let next = Arc::new(Session::from_envelope(envelope, Some(expected.clone())));
		let _persisting = self.inner.persist_guard.lock().await;

		match self.inner.compare_and_replace(&expected, next.clone()) {
			CompareAndSwapOutcome::Updated => {
				self.inner.persist(&next).await;
				metrics.record_success();

				Ok(next)
			},
			CompareAndSwapOutcome::RefreshMismatch => {
				metrics.record_success();

				Ok(self.snapshot())
			},
			CompareAndSwapOutcome::Missing => {
				metrics.record_failure();

				Err(Error::AuthExpired { detail: "Signed out during refresh".into() })
			},
		}
	}

	fn arm_or_warn(&self) {
		if let Err(e) = self.arm_proactive_refresh() {
			tracing::warn!(error = %e, "Proactive refresh is not armed.");
		}
	}
}
impl<C> Clone for SessionManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<C> Debug for SessionManager<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionManager")
			.field("session", &self.snapshot())
			.field("loaded", &self.is_loaded())
			.field("metrics", &self.inner.metrics)
			.finish_non_exhaustive()
	}
}

struct SessionInner<C>
where
	C: ?Sized + ApiHttpClient,
{
	http_client: Arc<C>,
	config: ClientConfig,
	store: Arc<dyn TokenStore>,
	session: RwLock<Arc<Session>>,
	loaded: AtomicBool,
	refresh_guard: AsyncMutex<()>,
	/// Serializes "install and save" against logout so a cleared store stays cleared.
	persist_guard: AsyncMutex<()>,
	refresh_task: Mutex<Option<JoinHandle<()>>>,
	metrics: RefreshMetrics,
}
impl<C> SessionInner<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn replace(&self, session: Arc<Session>) {
		*self.session.write() = session;
	}

	fn compare_and_replace(
		&self,
		expected: &TokenSecret,
		next: Arc<Session>,
	) -> CompareAndSwapOutcome {
		let mut slot = self.session.write();

		match slot.refresh_token() {
			None => CompareAndSwapOutcome::Missing,
			Some(current) if current != expected => CompareAndSwapOutcome::RefreshMismatch,
			Some(_) => {
				*slot = next;

				CompareAndSwapOutcome::Updated
			},
		}
	}

	async fn persist(&self, session: &Session) {
		if let Err(e) = self.store.save(session.to_stored()).await {
			tracing::warn!(error = %e, "Failed to persist session tokens.");
		}
	}

	fn disarm(&self) {
		if let Some(task) = self.refresh_task.lock().take() {
			task.abort();
		}
	}

	/// Sends an unauthenticated JSON POST to an auth endpoint.
	async fn exchange<B>(&self, path: &str, body: &B) -> Result<TokenEnvelope>
	where
		B: Serialize,
	{
		let url = self.config.resolve(path)?;
		let body = serde_json::to_vec(body).map_err(ConfigError::from)?;
		let request = HttpRequest {
			method: Method::Post,
			url,
			headers: vec![("Content-Type".into(), "application/json".into())],
			body: Some(body),
		};

		self.http_client.execute(request).await?.into_result()?.json(path)
	}
}
impl<C> Drop for SessionInner<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn drop(&mut self) {
		self.disarm();
	}
}

async fn proactive_refresh_loop<C>(weak: Weak<SessionInner<C>>, period: std::time::Duration)
where
	C: ?Sized + ApiHttpClient,
{
	let mut ticker = interval_at(Instant::now() + period, period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		ticker.tick().await;

		let Some(inner) = weak.upgrade() else { break };
		let manager = SessionManager { inner };

		match manager.refresh().await {
			Ok(_) => tracing::debug!("Proactive refresh rotated the session."),
			Err(e) => tracing::warn!(error = %e, "Proactive refresh failed; keeping the session."),
		}
	}
}

fn record<T>(kind: CallKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
		Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
	}
}

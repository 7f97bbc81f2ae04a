//! Single-operation coordinator with conflict retry and cancellation.

// std
use std::{
	pin::pin,
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use tokio::{
	runtime::Handle,
	sync::{Notify, watch},
	task::JoinHandle,
	time,
};
// self
use crate::{
	_prelude::*,
	api::{ApiClient, GenerationStatus},
	error::ConfigError,
	http::ApiHttpClient,
	idempotency::{IdempotencyKey, OperationKind, ReportPeriod},
	obs::{self, CallKind, CallOutcome, CallSpan},
	operation::{
		CoordinatorSettings, OperationParams, OperationSnapshot, OperationState, SuccessKind,
	},
};

const STILL_RUNNING_DETAIL: &str = "The server is still processing this request; try again later";
const CANCELLED_MESSAGE: &str = "Cancelled";

/// Drives one [`OperationKind`] for one `(actor, period)` tuple.
///
/// At most one request chain runs at a time; [`OperationCoordinator::start`] while a chain is
/// running returns the current snapshot without contacting the server. Dropping the
/// coordinator cancels any running chain.
pub struct OperationCoordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	inner: Arc<CoordinatorInner<C>>,
}
impl<C> OperationCoordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates an idle coordinator.
	pub fn new(
		client: ApiClient<C>,
		kind: OperationKind,
		params: OperationParams,
		settings: CoordinatorSettings,
	) -> Self {
		let slot = Slot {
			state: OperationState::Idle,
			message: None,
			key: None,
			params,
			run: None,
		};
		let (state_tx, _) = watch::channel(slot.snapshot(kind));

		Self {
			inner: Arc::new(CoordinatorInner {
				client,
				kind,
				settings,
				slot: Mutex::new(slot),
				state_tx,
			}),
		}
	}

	/// Operation kind this coordinator drives.
	pub fn kind(&self) -> OperationKind {
		self.inner.kind
	}

	/// Current snapshot.
	pub fn snapshot(&self) -> OperationSnapshot {
		self.inner.slot.lock().snapshot(self.inner.kind)
	}

	/// Current state.
	pub fn state(&self) -> OperationState {
		self.inner.slot.lock().state.clone()
	}

	/// Key bound to the pending or last completed work.
	pub fn key(&self) -> Option<IdempotencyKey> {
		self.inner.slot.lock().key.clone()
	}

	/// Parameters currently targeted.
	pub fn params(&self) -> OperationParams {
		self.inner.slot.lock().params.clone()
	}

	/// Receiver that observes every snapshot change.
	pub fn subscribe(&self) -> watch::Receiver<OperationSnapshot> {
		self.inner.state_tx.subscribe()
	}

	/// Runs the operation to a terminal state and returns the resulting snapshot.
	///
	/// The key is reused when one is bound to the current parameters, so a repeat after
	/// success is answered by the server as `cached`.
	pub async fn start(&self) -> OperationSnapshot {
		self.inner.start().await
	}

	/// Runs [`OperationCoordinator::start`] on the current Tokio runtime.
	pub fn spawn_start(&self) -> Result<JoinHandle<OperationSnapshot>, ConfigError> {
		let handle = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let inner = self.inner.clone();

		Ok(handle.spawn(async move { inner.start().await }))
	}

	/// Retargets the coordinator.
	///
	/// When nothing is running and the parameters differ, the state resets to
	/// [`OperationState::Idle`] and the key is discarded. A running chain is left alone; its key
	/// stays bound to the old parameters and the coordinator resets once it settles.
	pub fn set_params(&self, params: OperationParams) {
		self.inner.update(|slot| {
			if slot.params == params {
				return;
			}
			if !slot.state.is_in_progress() {
				slot.clear();
			}

			slot.params = params;
		});
	}

	/// Retargets the coordinator to another period for the same actor.
	pub fn set_period(&self, period: ReportPeriod) {
		let actor = self.params().actor;

		self.set_params(OperationParams::new(actor, period));
	}

	/// Returns to [`OperationState::Idle`] and discards the key, unless a chain is running.
	///
	/// Returns `false` when a chain is running.
	pub fn reset(&self) -> bool {
		let mut reset = false;

		self.inner.update(|slot| {
			if !slot.state.is_in_progress() {
				slot.clear();

				reset = true;
			}
		});

		reset
	}

	/// Discards the key and starts a new logical operation.
	pub async fn restart(&self) -> OperationSnapshot {
		if !self.reset() {
			return self.snapshot();
		}

		self.start().await
	}

	/// Stops the running chain, if any, and returns to [`OperationState::Idle`].
	///
	/// The key is kept so a later start reattaches to whatever the server already did.
	pub fn cancel(&self) {
		self.inner.cancel();
	}
}
impl<C> Drop for OperationCoordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn drop(&mut self) {
		self.inner.cancel();
	}
}
impl<C> Debug for OperationCoordinator<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OperationCoordinator")
			.field("snapshot", &self.snapshot())
			.field("settings", &self.inner.settings)
			.finish()
	}
}

struct CoordinatorInner<C>
where
	C: ?Sized + ApiHttpClient,
{
	client: ApiClient<C>,
	kind: OperationKind,
	settings: CoordinatorSettings,
	slot: Mutex<Slot>,
	state_tx: watch::Sender<OperationSnapshot>,
}
impl<C> CoordinatorInner<C>
where
	C: ?Sized + ApiHttpClient,
{
	async fn start(&self) -> OperationSnapshot {
		let Some((key, run)) = self.begin() else {
			tracing::debug!(kind = %self.kind, "Operation already in progress; ignoring start.");

			return self.slot.lock().snapshot(self.kind);
		};
		let span = CallSpan::new(CallKind::Operation, self.kind.as_str());

		obs::record_call_outcome(CallKind::Operation, CallOutcome::Attempt);

		let settled = span.instrument(self.drive(&key, &run)).await;

		let outcome = match &settled {
			Settled::Succeeded(..) => CallOutcome::Success,
			Settled::Failed(_) | Settled::Cancelled => CallOutcome::Failure,
		};

		obs::record_call_outcome(CallKind::Operation, outcome);

		self.finish(&key, &run, settled)
	}

	/// Moves to `InProgress`, returning the key and run signal, or `None` when already running.
	fn begin(&self) -> Option<(IdempotencyKey, Arc<RunSignal>)> {
		let mut slot = self.slot.lock();

		if slot.state.is_in_progress() {
			return None;
		}

		let OperationParams { actor, period } = slot.params.clone();
		let key = match slot.key.take() {
			Some(key) if key.matches(self.kind, &actor, period) => key,
			_ => self.settings.keys.make_key(self.kind, &actor, period),
		};
		let run = Arc::new(RunSignal::default());

		slot.state = OperationState::InProgress;
		slot.message = Some("Submitting request".into());
		slot.key = Some(key.clone());
		slot.run = Some(run.clone());

		self.state_tx.send_replace(slot.snapshot(self.kind));

		Some((key, run))
	}

	async fn drive(&self, key: &IdempotencyKey, run: &RunSignal) -> Settled {
		let policy = self.settings.retry_policy;
		let mut retry = 0;

		loop {
			let attempt = self.client.run_generation(
				self.kind,
				key.actor(),
				key.period(),
				self.settings.options,
				Some(key),
			);
			let result = tokio::select! {
				biased;
				_ = run.cancelled() => return Settled::Cancelled,
				result = attempt => result,
			};
			let hint = match result {
				Ok(outcome) => match outcome.status {
					Some(GenerationStatus::InProgress) => None,
					Some(GenerationStatus::Error) => return Settled::Failed(outcome.message),
					Some(GenerationStatus::Cached) =>
						return Settled::Succeeded(SuccessKind::Cached, outcome.message),
					_ if self.kind.is_send() =>
						return Settled::Succeeded(SuccessKind::Sent, outcome.message),
					_ => return Settled::Succeeded(SuccessKind::Created, outcome.message),
				},
				Err(e) if e.is_conflict() => e.retry_after(),
				Err(e) => return Settled::Failed(e.detail()),
			};

			if !policy.allows(retry) {
				return Settled::Failed(STILL_RUNNING_DETAIL.into());
			}

			let delay = policy.delay_for(retry, hint);

			retry += 1;

			tracing::debug!(
				kind = %self.kind,
				retry,
				delay_ms = delay.whole_milliseconds(),
				"Identical request in flight; retrying with the same key."
			);
			self.update(|slot| {
				if slot.is_current(run) {
					slot.message = Some(format!(
						"Already in progress on the server; retry {retry} in {:.1}s",
						delay.as_seconds_f64()
					));
				}
			});

			tokio::select! {
				biased;
				_ = run.cancelled() => return Settled::Cancelled,
				_ = time::sleep(delay.unsigned_abs()) => {},
			}
		}
	}

	fn finish(
		&self,
		key: &IdempotencyKey,
		run: &Arc<RunSignal>,
		settled: Settled,
	) -> OperationSnapshot {
		let mut slot = self.slot.lock();

		if !slot.is_current(run) {
			// Cancelled; `cancel` already published the idle state.
			return slot.snapshot(self.kind);
		}

		slot.run = None;

		let stale = !key.matches(self.kind, &slot.params.actor, slot.params.period);

		match settled {
			Settled::Succeeded(kind, message) => {
				slot.state = OperationState::Succeeded(kind);
				slot.message = Some(message);
			},
			Settled::Failed(detail) => {
				slot.message = Some(detail.clone());
				slot.state = OperationState::Failed(detail);
			},
			Settled::Cancelled => {
				slot.state = OperationState::Idle;
				slot.message = Some(CANCELLED_MESSAGE.into());
			},
		}

		let outcome = slot.snapshot(self.kind);

		if stale {
			slot.clear();
		}

		self.state_tx.send_replace(slot.snapshot(self.kind));

		outcome
	}

	fn cancel(&self) {
		self.update(|slot| {
			if let Some(run) = slot.run.take() {
				run.cancel();

				slot.state = OperationState::Idle;
				slot.message = Some(CANCELLED_MESSAGE.into());
			}
		});
	}

	/// Applies `f` under the lock and publishes the result.
	fn update<F>(&self, f: F)
	where
		F: FnOnce(&mut Slot),
	{
		let mut slot = self.slot.lock();

		f(&mut slot);

		self.state_tx.send_replace(slot.snapshot(self.kind));
	}
}

struct Slot {
	state: OperationState,
	message: Option<String>,
	key: Option<IdempotencyKey>,
	params: OperationParams,
	run: Option<Arc<RunSignal>>,
}
impl Slot {
	fn snapshot(&self, kind: OperationKind) -> OperationSnapshot {
		OperationSnapshot {
			kind,
			state: self.state.clone(),
			message: self.message.clone(),
			key: self.key.clone(),
			params: self.params.clone(),
		}
	}

	fn is_current(&self, run: &RunSignal) -> bool {
		self.run.as_deref().is_some_and(|current| std::ptr::eq(current, run))
	}

	fn clear(&mut self) {
		self.state = OperationState::Idle;
		self.message = None;
		self.key = None;
	}
}

#[derive(Debug, Default)]
struct RunSignal {
	cancelled: AtomicBool,
	notify: Notify,
}
impl RunSignal {
	fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
		self.notify.notify_waiters();
	}

	async fn cancelled(&self) {
		let mut notified = pin!(self.notify.notified());

		notified.as_mut().enable();

		if self.cancelled.load(Ordering::Acquire) {
			return;
		}

		notified.await;
	}
}

enum Settled {
	Succeeded(SuccessKind, String),
	Failed(String),
	Cancelled,
}

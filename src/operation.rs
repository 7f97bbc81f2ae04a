//! Idempotent report operations and their client-side state machine.
//!
//! An [`OperationCoordinator`] drives one operation kind for one `(actor, period)` tuple:
//! it mints or reuses the idempotency key, submits the request, and treats a 409 as "the same
//! work is already running" by retrying with the same key under bounded backoff.
//! [`ReportOperations`] groups one coordinator per kind behind a shared period.

mod board;
mod coordinator;

pub use board::*;
pub use coordinator::*;

// self
use crate::{
	_prelude::*,
	api::GenerationOptions,
	auth::ActorId,
	config::{ClientConfig, RetryPolicy},
	idempotency::{IdempotencyKey, KeyFactory, OperationKind, RandomKeyFactory, ReportPeriod},
};

/// How a successful operation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SuccessKind {
	/// Files were produced.
	Created,
	/// Emails were delivered.
	Sent,
	/// The server replayed an earlier result for the same key.
	Cached,
}
impl SuccessKind {
	/// Stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::Sent => "sent",
			Self::Cached => "cached",
		}
	}
}
impl Display for SuccessKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Client-side state of one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum OperationState {
	/// Nothing running; no outcome for the current parameters.
	#[default]
	Idle,
	/// A request (or its conflict retries) is running.
	InProgress,
	/// The server accepted the work.
	Succeeded(SuccessKind),
	/// The operation failed with a displayable detail.
	Failed(String),
}
impl OperationState {
	/// Returns `true` while a request is running.
	pub fn is_in_progress(&self) -> bool {
		matches!(self, Self::InProgress)
	}
}
impl Display for OperationState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Idle => f.write_str("idle"),
			Self::InProgress => f.write_str("in progress"),
			Self::Succeeded(kind) => write!(f, "succeeded ({kind})"),
			Self::Failed(detail) => write!(f, "failed: {detail}"),
		}
	}
}

/// Parameters identifying one logical unit of work for a given kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationParams {
	/// Manager the report is generated for.
	pub actor: ActorId,
	/// Reporting period.
	pub period: ReportPeriod,
}
impl OperationParams {
	/// Bundles an actor and a period.
	pub fn new(actor: ActorId, period: ReportPeriod) -> Self {
		Self { actor, period }
	}
}

/// Observable view of a coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationSnapshot {
	/// Operation kind.
	pub kind: OperationKind,
	/// Current state.
	pub state: OperationState,
	/// Short human-readable status of the latest attempt.
	pub message: Option<String>,
	/// Key bound to the pending or last completed work, if any.
	pub key: Option<IdempotencyKey>,
	/// Parameters the coordinator currently targets.
	pub params: OperationParams,
}

/// Knobs shared by coordinators.
#[derive(Clone)]
pub struct CoordinatorSettings {
	/// Query flags sent with every request.
	pub options: GenerationOptions,
	/// Backoff applied while the server reports a conflict.
	pub retry_policy: RetryPolicy,
	/// Source of idempotency keys.
	pub keys: Arc<dyn KeyFactory>,
}
impl CoordinatorSettings {
	/// Default options and random keys, with the retry policy from `config`.
	pub fn from_config(config: &ClientConfig) -> Self {
		Self { retry_policy: config.retry_policy, ..Default::default() }
	}

	/// Overrides the query flags.
	pub fn with_options(mut self, options: GenerationOptions) -> Self {
		self.options = options;

		self
	}

	/// Overrides the key source.
	pub fn with_keys(mut self, keys: Arc<dyn KeyFactory>) -> Self {
		self.keys = keys;

		self
	}
}
impl Default for CoordinatorSettings {
	fn default() -> Self {
		Self {
			options: GenerationOptions::default(),
			retry_policy: RetryPolicy::default(),
			keys: Arc::new(RandomKeyFactory),
		}
	}
}
impl Debug for CoordinatorSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CoordinatorSettings")
			.field("options", &self.options)
			.field("retry_policy", &self.retry_policy)
			.finish_non_exhaustive()
	}
}

//! All report operations for one manager behind a shared period.

// self
use crate::{
	_prelude::*,
	api::ApiClient,
	http::ApiHttpClient,
	idempotency::{OperationKind, ReportPeriod},
	operation::{
		CoordinatorSettings, OperationCoordinator, OperationParams, OperationSnapshot,
		OperationState,
	},
};

/// Entries kept in the activity log.
pub const ACTIVITY_CAPACITY: usize = 100;

/// One [`OperationCoordinator`] per [`OperationKind`], all targeting the same parameters,
/// plus a short activity log.
pub struct ReportOperations<C>
where
	C: ?Sized + ApiHttpClient,
{
	coordinators: Vec<OperationCoordinator<C>>,
	activity: Mutex<VecDeque<String>>,
}
impl<C> ReportOperations<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates idle coordinators for every kind.
	pub fn new(
		client: ApiClient<C>,
		params: OperationParams,
		settings: CoordinatorSettings,
	) -> Self {
		let coordinators = OperationKind::ALL
			.into_iter()
			.map(|kind| {
				OperationCoordinator::new(client.clone(), kind, params.clone(), settings.clone())
			})
			.collect();

		Self { coordinators, activity: Mutex::new(VecDeque::with_capacity(ACTIVITY_CAPACITY)) }
	}

	/// Targets the signed-in manager for `period`.
	pub fn for_signed_in(
		client: ApiClient<C>,
		period: ReportPeriod,
		settings: CoordinatorSettings,
	) -> Result<Self> {
		let Some(actor) = client.session().snapshot().subject_id() else {
			return Err(Error::AuthExpired { detail: "Not signed in".into() });
		};

		Ok(Self::new(client, OperationParams::new(actor, period), settings))
	}

	/// Coordinator driving `kind`.
	pub fn coordinator(&self, kind: OperationKind) -> &OperationCoordinator<C> {
		let index = OperationKind::ALL.iter().position(|k| *k == kind).unwrap_or_default();

		&self.coordinators[index]
	}

	/// Current state of `kind`.
	pub fn state(&self, kind: OperationKind) -> OperationState {
		self.coordinator(kind).state()
	}

	/// Snapshots of every coordinator, in [`OperationKind::ALL`] order.
	pub fn snapshots(&self) -> Vec<OperationSnapshot> {
		self.coordinators.iter().map(OperationCoordinator::snapshot).collect()
	}

	/// Returns `true` while any operation is running.
	pub fn is_any_in_progress(&self) -> bool {
		self.coordinators.iter().any(|c| c.state().is_in_progress())
	}

	/// Retargets every coordinator to `period`.
	pub fn set_period(&self, period: ReportPeriod) {
		self.coordinators.iter().for_each(|c| c.set_period(period));
	}

	/// Retargets every coordinator.
	pub fn set_params(&self, params: OperationParams) {
		self.coordinators.iter().for_each(|c| c.set_params(params.clone()));
	}

	/// Runs `kind` and records the outcome in the activity log.
	pub async fn start(&self, kind: OperationKind) -> OperationSnapshot {
		let coordinator = self.coordinator(kind);

		if coordinator.state().is_in_progress() {
			self.log(format!("{}: already in progress", kind.label()));

			return coordinator.snapshot();
		}

		let snapshot = coordinator.start().await;

		self.log(describe(&snapshot));

		snapshot
	}

	/// Cancels `kind` if it is running.
	pub fn cancel(&self, kind: OperationKind) {
		let coordinator = self.coordinator(kind);

		if coordinator.state().is_in_progress() {
			coordinator.cancel();
			self.log(format!("{}: cancelled", kind.label()));
		}
	}

	/// Activity log, most recent first.
	pub fn activity(&self) -> Vec<String> {
		self.activity.lock().iter().cloned().collect()
	}

	fn log(&self, entry: String) {
		let mut activity = self.activity.lock();

		activity.push_front(entry);
		activity.truncate(ACTIVITY_CAPACITY);
	}
}
impl<C> Debug for ReportOperations<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReportOperations")
			.field("coordinators", &self.coordinators)
			.field("activity", &self.activity.lock().len())
			.finish()
	}
}

fn describe(snapshot: &OperationSnapshot) -> String {
	let label = snapshot.kind.label();

	match &snapshot.state {
		OperationState::Succeeded(kind) => match snapshot.message.as_deref() {
			Some(message) => format!("{label} success: {kind} ({message})"),
			None => format!("{label} success: {kind}"),
		},
		OperationState::Failed(detail) => format!("{label} failed: {detail}"),
		OperationState::Idle => match snapshot.message.as_deref() {
			Some(message) => format!("{label}: {message}"),
			None => format!("{label}: idle"),
		},
		OperationState::InProgress => format!("{label}: in progress"),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedTransport, build_test_client, fast_retry_policy},
		auth::ActorId,
	};

	fn board(transport: ScriptedTransport) -> ReportOperations<ScriptedTransport> {
		let (client, _) = build_test_client("http://localhost:8000", transport);
		let params = OperationParams::new(
			ActorId::new("m1").expect("Fixture actor should be valid."),
			ReportPeriod::new(2025, 3).expect("Fixture period should be valid."),
		);
		let settings =
			CoordinatorSettings { retry_policy: fast_retry_policy(), ..Default::default() };

		ReportOperations::new(client, params, settings)
	}

	#[tokio::test]
	async fn activity_is_most_recent_first() {
		let transport = ScriptedTransport::default();

		transport
			.push_json(200, serde_json::json!({ "status": "created", "message": "CSV ready" }))
			.push_json(404, serde_json::json!({ "detail": "No employees for manager" }));

		let board = board(transport);

		board.start(OperationKind::CreateCsv).await;
		board.start(OperationKind::CreatePdf).await;

		assert_eq!(
			board.activity(),
			[
				"Create PDFs failed: No employees for manager".to_owned(),
				"Create CSV success: created (CSV ready)".to_owned(),
			]
		);
		assert!(!board.is_any_in_progress());
	}

	#[tokio::test]
	async fn set_period_resets_every_settled_coordinator() {
		let transport = ScriptedTransport::default();

		transport.push_json(200, serde_json::json!({ "status": "sent" }));

		let board = board(transport);

		board.start(OperationKind::SendCsv).await;
		board.set_period(ReportPeriod::new(2025, 4).expect("Period should be valid."));

		for snapshot in board.snapshots() {
			assert_eq!(snapshot.state, OperationState::Idle);
			assert_eq!(snapshot.key, None);
			assert_eq!(snapshot.params.period.month(), 4);
		}
	}

	#[test]
	fn coordinators_follow_kind_order() {
		let board = board(ScriptedTransport::default());

		for kind in OperationKind::ALL {
			assert_eq!(board.coordinator(kind).kind(), kind);
		}
	}

	#[test]
	fn signed_out_client_cannot_build_a_board() {
		let (client, _) = build_test_client("http://localhost:8000", ScriptedTransport::default());
		let err = ReportOperations::for_signed_in(
			client,
			ReportPeriod::new(2025, 3).expect("Period should be valid."),
			CoordinatorSettings::default(),
		)
		.expect_err("A board needs a signed-in manager.");

		assert!(err.is_auth_expired());
	}
}

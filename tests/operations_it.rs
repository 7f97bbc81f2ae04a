// crates.io
use serde_json::json;
use tokio::sync::Notify;
// self
use slipsalary_client::{
	_preludet::*,
	api::{ApiClient, IDEMPOTENCY_KEY_HEADER},
	auth::{ActorId, TokenSecret},
	config::RetryPolicy,
	http::{ApiHttpClient, HttpFuture, HttpRequest, HttpResponse},
	idempotency::{OperationKind, ReportPeriod},
	operation::{
		CoordinatorSettings, OperationCoordinator, OperationParams, OperationState,
		ReportOperations, SuccessKind,
	},
	store::{StoredTokens, TokenStore},
};

/// In-process payroll server that honours idempotency keys the way the real one does.
///
/// A new key answers 409 `busy_for` times before the work completes; a completed key is
/// answered with the stored body and `status: cached`.
#[derive(Default)]
struct FakeBackend {
	busy_for: u32,
	gate: Option<Arc<Notify>>,
	ledger: Mutex<HashMap<String, Ledger>>,
	requests: Mutex<Vec<HttpRequest>>,
	files_created: Mutex<u32>,
}
impl FakeBackend {
	fn busy_for(busy_for: u32) -> Self {
		Self { busy_for, ..Default::default() }
	}

	fn gated() -> (Self, Arc<Notify>) {
		let gate = Arc::new(Notify::new());

		(Self { gate: Some(gate.clone()), ..Default::default() }, gate)
	}

	fn files_created(&self) -> u32 {
		*self.files_created.lock()
	}

	fn requests(&self) -> Vec<HttpRequest> {
		self.requests.lock().clone()
	}

	fn handle(&self, request: &HttpRequest) -> HttpResponse {
		if request.header("authorization").is_none_or(|value| !value.starts_with("Bearer ")) {
			return HttpResponse::json_body(401, &json!({ "detail": "Not authenticated" }));
		}

		let Some(key) = request.header(IDEMPOTENCY_KEY_HEADER).map(str::to_owned) else {
			return self.perform(request);
		};
		let mut ledger = self.ledger.lock();
		let entry = ledger.entry(key).or_insert(Ledger::Busy(self.busy_for));

		match entry {
			Ledger::Busy(0) => {
				let body = self.perform(request);

				*entry = Ledger::Done(body.body.clone());

				body
			},
			Ledger::Busy(remaining) => {
				*remaining -= 1;

				let detail = "Request with this idempotency key is still being processed";

				HttpResponse::json_body(409, &json!({ "detail": detail }))
					.with_header("Retry-After", "0")
			},
			Ledger::Done(body) => {
				let mut cached: serde_json::Value =
					serde_json::from_slice(body).expect("Stored body should be JSON.");

				cached["status"] = json!("cached");

				HttpResponse::json_body(200, &cached)
			},
		}
	}

	fn perform(&self, request: &HttpRequest) -> HttpResponse {
		let file = {
			let mut files = self.files_created.lock();

			*files += 1;

			*files
		};
		let body = if request.url.path().contains("send") {
			json!({ "recipientCount": 3, "status": "sent" })
		} else {
			json!({
				"fileId": format!("f{file}"),
				"path": format!("/reports/f{file}.csv"),
				"status": "created",
			})
		};

		HttpResponse::json_body(200, &body)
	}
}
impl ApiHttpClient for FakeBackend {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		self.requests.lock().push(request.clone());

		let gate = self.gate.clone();

		Box::pin(async move {
			if let Some(gate) = gate {
				gate.notified().await;
			}

			Ok(self.handle(&request))
		})
	}
}

enum Ledger {
	Busy(u32),
	Done(Vec<u8>),
}

fn march() -> OperationParams {
	OperationParams::new(
		ActorId::new("7f3c").expect("Fixture actor should be valid."),
		ReportPeriod::new(2025, 3).expect("Fixture period should be valid."),
	)
}

async fn signed_in(backend: FakeBackend) -> ApiClient<FakeBackend> {
	let (client, store) = build_test_client("http://localhost:8000", backend);

	store
		.save(StoredTokens {
			access: Some(TokenSecret::new(test_token("7f3c", true, Duration::hours(1)))),
			refresh: None,
		})
		.await
		.expect("Seeding the memory store should succeed.");
	client.session().bootstrap().await;

	client
}

fn settings(policy: RetryPolicy) -> CoordinatorSettings {
	CoordinatorSettings { retry_policy: policy, ..Default::default() }
}

fn backend(client: &ApiClient<FakeBackend>) -> &FakeBackend {
	client.session().http_client()
}

#[tokio::test]
async fn repeating_a_key_is_answered_from_cache() {
	let client = signed_in(FakeBackend::default()).await;
	let coordinator = OperationCoordinator::new(
		client.clone(),
		OperationKind::CreateCsv,
		march(),
		settings(fast_retry_policy()),
	);
	let first = coordinator.start().await;
	let second = coordinator.start().await;

	assert_eq!(first.state, OperationState::Succeeded(SuccessKind::Created));
	assert_eq!(second.state, OperationState::Succeeded(SuccessKind::Cached));
	assert_eq!(first.key, second.key);
	assert_eq!(backend(&client).files_created(), 1);

	let restarted = coordinator.restart().await;

	assert_eq!(restarted.state, OperationState::Succeeded(SuccessKind::Created));
	assert_ne!(restarted.key, first.key);
	assert_eq!(backend(&client).files_created(), 2);
}

#[tokio::test]
async fn conflicts_resolve_under_one_key() {
	let client = signed_in(FakeBackend::busy_for(2)).await;
	let coordinator = OperationCoordinator::new(
		client.clone(),
		OperationKind::SendPdf,
		march(),
		settings(fast_retry_policy()),
	);
	let snapshot = coordinator.start().await;
	let requests = backend(&client).requests();
	let key = snapshot.key.expect("A settled coordinator should keep its key.");

	assert_eq!(snapshot.state, OperationState::Succeeded(SuccessKind::Sent));
	assert_eq!(requests.len(), 3);
	assert!(requests.iter().all(|r| r.header(IDEMPOTENCY_KEY_HEADER) == Some(key.as_str())));
	assert!(key.as_str().starts_with("pdf-7f3c-2025-03-"));
	assert_eq!(backend(&client).files_created(), 1);
}

#[tokio::test]
async fn persistent_conflicts_give_up_after_the_retry_budget() {
	let client = signed_in(FakeBackend::busy_for(u32::MAX)).await;
	let policy = RetryPolicy { max_retries: Some(3), ..fast_retry_policy() };
	let coordinator = OperationCoordinator::new(
		client.clone(),
		OperationKind::CreatePdf,
		march(),
		settings(policy),
	);
	let snapshot = coordinator.start().await;

	assert!(matches!(snapshot.state, OperationState::Failed(_)));
	assert!(snapshot.key.is_some());
	assert_eq!(backend(&client).requests().len(), 4);
	assert_eq!(backend(&client).files_created(), 0);
}

#[tokio::test]
async fn start_while_running_sends_nothing() {
	let (backend_impl, gate) = FakeBackend::gated();
	let client = signed_in(backend_impl).await;
	let coordinator = OperationCoordinator::new(
		client.clone(),
		OperationKind::SendCsv,
		march(),
		settings(fast_retry_policy()),
	);
	let mut updates = coordinator.subscribe();
	let running = coordinator.spawn_start().expect("Runtime should be available.");

	updates
		.wait_for(|snapshot| snapshot.state.is_in_progress())
		.await
		.expect("Coordinator should report progress.");

	let repeated = coordinator.start().await;

	assert_eq!(repeated.state, OperationState::InProgress);

	gate.notify_one();

	let settled = running.await.expect("Coordinator task should not panic.");

	assert_eq!(settled.state, OperationState::Succeeded(SuccessKind::Sent));
	assert_eq!(backend(&client).requests().len(), 1);
}

#[tokio::test]
async fn period_change_mid_flight_settles_then_resets() {
	let (backend_impl, gate) = FakeBackend::gated();
	let client = signed_in(backend_impl).await;
	let coordinator = OperationCoordinator::new(
		client.clone(),
		OperationKind::CreateCsv,
		march(),
		settings(fast_retry_policy()),
	);
	let mut updates = coordinator.subscribe();
	let running = coordinator.spawn_start().expect("Runtime should be available.");

	updates
		.wait_for(|snapshot| snapshot.state.is_in_progress())
		.await
		.expect("Coordinator should report progress.");

	let april = ReportPeriod::new(2025, 4).expect("Period should be valid.");

	coordinator.set_period(april);

	assert_eq!(coordinator.state(), OperationState::InProgress);
	assert_eq!(coordinator.params().period, april);

	gate.notify_one();

	let settled = running.await.expect("Coordinator task should not panic.");
	let request = &backend(&client).requests()[0];

	assert_eq!(settled.state, OperationState::Succeeded(SuccessKind::Created));
	assert!(request.url.query().is_some_and(|query| query.contains("month=3")));
	assert_eq!(coordinator.state(), OperationState::Idle);
	assert_eq!(coordinator.key(), None);
}

#[tokio::test]
async fn board_logs_every_outcome() {
	let client = signed_in(FakeBackend::default()).await;
	let board = ReportOperations::for_signed_in(
		client.clone(),
		ReportPeriod::new(2025, 3).expect("Period should be valid."),
		settings(fast_retry_policy()),
	)
	.expect("A signed-in manager should get a board.");

	board.start(OperationKind::CreateCsv).await;
	board.start(OperationKind::CreateCsv).await;
	board.start(OperationKind::SendCsvLive).await;

	let activity = board.activity();

	assert_eq!(activity.len(), 3);
	assert_eq!(activity[0], "Send CSV (live) success: sent (3 recipient(s))");
	assert_eq!(activity[1], "Create CSV success: cached (file f1 at /reports/f1.csv)");
	assert_eq!(activity[2], "Create CSV success: created (file f1 at /reports/f1.csv)");
	assert_eq!(backend(&client).files_created(), 2);
}

// self
use slipsalary_client::{
	_preludet::*,
	error::{NETWORK_DETAIL, TransportError},
	http::{ApiHttpClient, HttpFuture, HttpRequest, HttpResponse},
};

#[derive(Debug)]
enum FakeTransportFailure {
	Reset,
}
impl Display for FakeTransportFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Reset => write!(f, "Connection reset by peer."),
		}
	}
}
impl StdError for FakeTransportFailure {}

#[derive(Default)]
struct UnreachableTransport {
	calls: Mutex<u32>,
}
impl ApiHttpClient for UnreachableTransport {
	fn execute(&self, _request: HttpRequest) -> HttpFuture<'_> {
		*self.calls.lock() += 1;

		Box::pin(async { Err(TransportError::network(FakeTransportFailure::Reset).into()) })
	}
}

#[tokio::test]
async fn network_failures_surface_as_status_zero() {
	let (client, _) = build_test_client("http://localhost:8000", UnreachableTransport::default());
	let err = client.list_employees().await.expect_err("An unreachable server should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
	assert_eq!(err.status(), 0);
	assert_eq!(err.detail(), NETWORK_DETAIL);
	assert_eq!(*client.session().http_client().calls.lock(), 1);

	let source = StdError::source(&err).expect("Transport errors should expose their cause.");

	assert_eq!(source.to_string(), "Connection reset by peer.");
}

#[tokio::test]
async fn retry_after_hints_travel_with_conflicts() {
	let transport = ScriptedTransport::default();

	let detail = "Request with this idempotency key is still being processed";

	transport.push(
		HttpResponse::json_body(409, &serde_json::json!({ "detail": detail }))
			.with_header("Retry-After", "7"),
	);

	let (client, _) = build_test_client("http://localhost:8000", transport);
	let err = client.list_months().await.expect_err("A conflict should fail the request.");

	assert!(err.is_conflict());
	assert_eq!(err.retry_after(), Some(Duration::seconds(7)));
	assert_eq!(err.detail(), detail);
}

//! Signs in against a mocked payroll API with the default reqwest transport, then creates and
//! sends the monthly CSV through the idempotent operation board.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use slipsalary_client::{
	api::ApiClient,
	config::ClientConfig,
	idempotency::{OperationKind, ReportPeriod},
	operation::{CoordinatorSettings, ReportOperations},
	store::{MemoryStore, TokenStore},
};

// `{"sub":"7f3c","is_manager":true,"email":"ana@example.com","exp":4102444800}`, unsigned.
const DEMO_TOKEN: &str = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiI3ZjNjIiwiaXNfbWFuYWdlciI6dHJ1ZSwiZW1haWwiOiJhbmFAZXhhbXBsZS5jb20iLCJleHAiOjQxMDI0NDQ4MDB9.demo";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(200).json_body(json!({
				"accessToken": DEMO_TOKEN,
				"refreshToken": "demo-refresh",
				"tokenType": "bearer",
			}));
		})
		.await;
	let create_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/reports_generation/createAggregatedEmployeeData")
				.query_param("managerId", "7f3c")
				.query_param("year", "2025")
				.query_param("month", "3");
			then.status(200).json_body(json!({
				"fileId": "f1",
				"path": "/reports/team-2025-03.csv",
				"status": "created",
			}));
		})
		.await;
	let send_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/reports_generation/sendAggregatedEmployeeData");
			then.status(200).json_body(json!({ "recipientCount": 1, "status": "sent" }));
		})
		.await;
	let config = ClientConfig::builder().base_url(Url::parse(&server.base_url())?).build()?;
	let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());
	let client = ApiClient::new(config, store);
	let session = client.session().login("ana@example.com", "demo-password").await?;

	println!(
		"Signed in as {} (manager: {}).",
		session.claims().map_or("unknown", |claims| claims.email.as_str()),
		session.is_manager()
	);

	let board = ReportOperations::for_signed_in(
		client.clone(),
		ReportPeriod::new(2025, 3)?,
		CoordinatorSettings::from_config(client.config()),
	)?;

	for kind in [OperationKind::CreateCsv, OperationKind::SendCsv] {
		let snapshot = board.start(kind).await;

		println!("{} -> {} with key {:?}.", kind.label(), snapshot.state, snapshot.key);
	}
	for entry in board.activity() {
		println!("activity: {entry}");
	}

	client.session().logout().await?;

	login_mock.assert_async().await;
	create_mock.assert_async().await;
	send_mock.assert_async().await;

	Ok(())
}

//! Report generation and delivery endpoints under `/reports_generation`.
//!
//! Every call accepts an optional [`IdempotencyKey`]; when present it is sent as the
//! `Idempotency-Key` header so the server can answer repeats with `cached` instead of
//! rendering or mailing again.

// self
use crate::{
	_prelude::*,
	api::{ApiClient, ApiRequest},
	auth::ActorId,
	http::ApiHttpClient,
	idempotency::{IdempotencyKey, OperationKind, ReportPeriod},
};

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// `status` reported by generation endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
	/// Files were produced by this request.
	Created,
	/// Emails were delivered by this request.
	Sent,
	/// The key was seen before; the stored result is returned without redoing the work.
	Cached,
	/// Another request with the same key is still running.
	InProgress,
	/// The server recorded a failure for this key.
	Error,
	/// A value this client does not know.
	#[serde(other)]
	Unknown,
}
impl GenerationStatus {
	/// Wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::Sent => "sent",
			Self::Cached => "cached",
			Self::InProgress => "in_progress",
			Self::Error => "error",
			Self::Unknown => "unknown",
		}
	}
}
impl Display for GenerationStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-kind flags sent as query parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenerationOptions {
	/// `includeBonuses` for CSV creation.
	pub include_bonuses: bool,
	/// `overwriteExisting` for PDF creation.
	pub overwrite_existing: bool,
	/// `regenerateMissing` for PDF delivery.
	pub regenerate_missing: bool,
}
impl Default for GenerationOptions {
	fn default() -> Self {
		Self { include_bonuses: true, overwrite_existing: false, regenerate_missing: false }
	}
}

/// Body of `createAggregatedEmployeeData`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAggregatedResponse {
	/// Identifier of the CSV report file.
	#[serde(alias = "file_id")]
	pub file_id: String,
	/// Server-side path of the CSV.
	pub path: String,
	/// Whether the CSV was archived.
	pub archived: bool,
	/// Idempotency status.
	pub status: Option<GenerationStatus>,
	/// Whether the response was served under an idempotency key.
	pub idempotent: Option<bool>,
	/// Optional server message.
	pub message: Option<String>,
}

/// Body of `sendAggregatedEmployeeData` and its live variant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendAggregatedResponse {
	/// Legacy delivery flag.
	pub sent: Option<bool>,
	/// Legacy recipient count.
	#[serde(alias = "recipient_count")]
	pub recipient_count: Option<u32>,
	/// Idempotency status.
	pub status: Option<GenerationStatus>,
	/// Identifier of the delivered CSV.
	#[serde(alias = "file_id")]
	pub file_id: Option<String>,
	/// Whether the CSV was archived after delivery.
	pub archived: Option<bool>,
	/// Archive location.
	#[serde(alias = "archive_path")]
	pub archive_path: Option<String>,
	/// Whether the response was served under an idempotency key.
	pub idempotent: Option<bool>,
	/// Optional server message.
	pub message: Option<String>,
}

/// Body of `createPdfForEmployees`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePdfResponse {
	/// PDFs rendered by this request.
	#[serde(alias = "generated_count")]
	pub generated_count: u32,
	/// PDFs left untouched because they already existed.
	#[serde(alias = "skipped_count")]
	pub skipped_count: u32,
	/// Reporting month.
	pub month: u8,
	/// Reporting year.
	pub year: i32,
	/// Idempotency status.
	pub status: Option<GenerationStatus>,
	/// Whether the response was served under an idempotency key.
	pub idempotent: Option<bool>,
	/// Optional server message.
	pub message: Option<String>,
}

/// Body of `sendPdfToEmployees` and its live variant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendPdfResponse {
	/// Legacy count of delivered PDFs.
	#[serde(alias = "sent_count")]
	pub sent_count: Option<u32>,
	/// Legacy count of employees without a PDF.
	#[serde(alias = "missing_count")]
	pub missing_count: Option<u32>,
	/// Idempotency status.
	pub status: Option<GenerationStatus>,
	/// Identifier of the archive ZIP.
	#[serde(alias = "archive_zip_id")]
	pub archive_zip_id: Option<String>,
	/// Location of the archive ZIP.
	#[serde(alias = "archive_zip_path")]
	pub archive_zip_path: Option<String>,
	/// Number of PDFs moved into the archive.
	#[serde(alias = "archived_pdfs")]
	pub archived_pdfs: Option<u32>,
	/// Whether the response was served under an idempotency key.
	pub idempotent: Option<bool>,
	/// Optional server message.
	pub message: Option<String>,
}

/// Typed body of any generation endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationPayload {
	/// CSV creation.
	CreateAggregated(CreateAggregatedResponse),
	/// CSV delivery.
	SendAggregated(SendAggregatedResponse),
	/// PDF creation.
	CreatePdf(CreatePdfResponse),
	/// PDF delivery.
	SendPdf(SendPdfResponse),
}
impl GenerationPayload {
	/// `status` field of the body, when sent.
	pub fn status(&self) -> Option<GenerationStatus> {
		match self {
			Self::CreateAggregated(body) => body.status,
			Self::SendAggregated(body) => body.status,
			Self::CreatePdf(body) => body.status,
			Self::SendPdf(body) => body.status,
		}
	}

	/// `message` field of the body, when sent.
	pub fn message(&self) -> Option<&str> {
		match self {
			Self::CreateAggregated(body) => body.message.as_deref(),
			Self::SendAggregated(body) => body.message.as_deref(),
			Self::CreatePdf(body) => body.message.as_deref(),
			Self::SendPdf(body) => body.message.as_deref(),
		}
	}

	/// One-line summary of what the server did.
	pub fn summary(&self) -> String {
		match self {
			Self::CreateAggregated(body) => format!("file {} at {}", body.file_id, body.path),
			Self::SendAggregated(body) => match (body.recipient_count, &body.archive_path) {
				(Some(count), _) => format!("{count} recipient(s)"),
				(None, Some(path)) => format!("archived at {path}"),
				(None, None) => "delivered".into(),
			},
			Self::CreatePdf(body) => format!(
				"{} generated, {} skipped for {}-{:02}",
				body.generated_count, body.skipped_count, body.year, body.month
			),
			Self::SendPdf(body) => match (body.sent_count, body.missing_count) {
				(Some(sent), Some(missing)) => format!("{sent} sent, {missing} missing"),
				(Some(sent), None) => format!("{sent} sent"),
				_ => body
					.archived_pdfs
					.map_or_else(|| "delivered".into(), |count| format!("{count} archived")),
			},
		}
	}
}

/// Result of one generation call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationOutcome {
	/// Operation that ran.
	pub kind: OperationKind,
	/// Reported status, when the server sent one.
	pub status: Option<GenerationStatus>,
	/// Server message, falling back to [`GenerationPayload::summary`].
	pub message: String,
	/// Typed body.
	pub payload: GenerationPayload,
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// `POST /reports_generation/createAggregatedEmployeeData`.
	pub async fn create_aggregated_employee_data(
		&self,
		actor: &ActorId,
		period: ReportPeriod,
		include_bonuses: bool,
		key: Option<&IdempotencyKey>,
	) -> Result<CreateAggregatedResponse> {
		let options = GenerationOptions { include_bonuses, ..Default::default() };

		self.request(generation_request(OperationKind::CreateCsv, actor, period, options, key))
			.await
	}

	/// `POST /reports_generation/sendAggregatedEmployeeData`, or the `...Live` variant.
	pub async fn send_aggregated_employee_data(
		&self,
		actor: &ActorId,
		period: ReportPeriod,
		live: bool,
		key: Option<&IdempotencyKey>,
	) -> Result<SendAggregatedResponse> {
		let kind = if live { OperationKind::SendCsvLive } else { OperationKind::SendCsv };

		self.request(generation_request(kind, actor, period, GenerationOptions::default(), key))
			.await
	}

	/// `POST /reports_generation/createPdfForEmployees`.
	pub async fn create_pdf_for_employees(
		&self,
		actor: &ActorId,
		period: ReportPeriod,
		overwrite_existing: bool,
		key: Option<&IdempotencyKey>,
	) -> Result<CreatePdfResponse> {
		let options = GenerationOptions { overwrite_existing, ..Default::default() };

		self.request(generation_request(OperationKind::CreatePdf, actor, period, options, key))
			.await
	}

	/// `POST /reports_generation/sendPdfToEmployees`, or the `...Live` variant.
	pub async fn send_pdf_to_employees(
		&self,
		actor: &ActorId,
		period: ReportPeriod,
		regenerate_missing: bool,
		live: bool,
		key: Option<&IdempotencyKey>,
	) -> Result<SendPdfResponse> {
		let kind = if live { OperationKind::SendPdfLive } else { OperationKind::SendPdf };
		let options = GenerationOptions { regenerate_missing, ..Default::default() };

		self.request(generation_request(kind, actor, period, options, key)).await
	}

	/// Runs any generation endpoint and returns its typed outcome.
	pub async fn run_generation(
		&self,
		kind: OperationKind,
		actor: &ActorId,
		period: ReportPeriod,
		options: GenerationOptions,
		key: Option<&IdempotencyKey>,
	) -> Result<GenerationOutcome> {
		let request = generation_request(kind, actor, period, options, key);
		let payload = match kind {
			OperationKind::CreateCsv =>
				GenerationPayload::CreateAggregated(self.request(request).await?),
			OperationKind::SendCsv | OperationKind::SendCsvLive =>
				GenerationPayload::SendAggregated(self.request(request).await?),
			OperationKind::CreatePdf => GenerationPayload::CreatePdf(self.request(request).await?),
			OperationKind::SendPdf | OperationKind::SendPdfLive =>
				GenerationPayload::SendPdf(self.request(request).await?),
		};
		let message = payload
			.message()
			.filter(|message| !message.is_empty())
			.map_or_else(|| payload.summary(), str::to_owned);

		Ok(GenerationOutcome { kind, status: payload.status(), message, payload })
	}
}

/// Builds the request for `kind`, including only the flag the endpoint understands.
pub fn generation_request(
	kind: OperationKind,
	actor: &ActorId,
	period: ReportPeriod,
	options: GenerationOptions,
	key: Option<&IdempotencyKey>,
) -> ApiRequest {
	let mut request = ApiRequest::post(kind.endpoint())
		.query("managerId", actor)
		.query("year", period.year())
		.query("month", period.month());

	request = match kind {
		OperationKind::CreateCsv => request.query("includeBonuses", options.include_bonuses),
		OperationKind::CreatePdf => request.query("overwriteExisting", options.overwrite_existing),
		OperationKind::SendPdf | OperationKind::SendPdfLive =>
			request.query("regenerateMissing", options.regenerate_missing),
		OperationKind::SendCsv | OperationKind::SendCsvLive => request,
	};

	match key {
		Some(key) => request.header(IDEMPOTENCY_KEY_HEADER, key.as_str()),
		None => request,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::idempotency::{KeyFactory, RandomKeyFactory};

	fn fixture() -> (ActorId, ReportPeriod) {
		(
			ActorId::new("m1").expect("Fixture actor should be valid."),
			ReportPeriod::new(2025, 3).expect("Fixture period should be valid."),
		)
	}

	#[test]
	fn requests_carry_kind_specific_flags_and_key() {
		let (actor, period) = fixture();
		let key = RandomKeyFactory.make_key(OperationKind::CreatePdf, &actor, period);
		let request = generation_request(
			OperationKind::CreatePdf,
			&actor,
			period,
			GenerationOptions::default(),
			Some(&key),
		);

		assert_eq!(request.path, "/reports_generation/createPdfForEmployees");
		assert_eq!(
			request.query,
			[
				("managerId".to_owned(), "m1".to_owned()),
				("year".to_owned(), "2025".to_owned()),
				("month".to_owned(), "3".to_owned()),
				("overwriteExisting".to_owned(), "false".to_owned()),
			]
		);
		assert_eq!(request.headers, [(IDEMPOTENCY_KEY_HEADER.to_owned(), key.to_string())]);

		let csv = generation_request(
			OperationKind::SendCsvLive,
			&actor,
			period,
			GenerationOptions::default(),
			None,
		);

		assert_eq!(csv.query.len(), 3);
		assert!(csv.headers.is_empty());
	}

	#[test]
	fn unknown_status_values_do_not_fail_decoding() {
		let body: CreateAggregatedResponse = serde_json::from_value(serde_json::json!({
			"fileId": "f1",
			"path": "/reports/f1.csv",
			"archived": false,
			"status": "queued",
		}))
		.expect("Unknown status should decode.");

		assert_eq!(body.status, Some(GenerationStatus::Unknown));

		let legacy: SendPdfResponse =
			serde_json::from_value(serde_json::json!({ "sentCount": 4, "missingCount": 1 }))
				.expect("Legacy body should decode.");

		assert_eq!(legacy.status, None);
		assert_eq!(GenerationPayload::SendPdf(legacy).summary(), "4 sent, 1 missing");
	}

	#[test]
	fn default_options_match_server_defaults() {
		let options = GenerationOptions::default();

		assert!(options.include_bonuses);
		assert!(!options.overwrite_existing);
		assert!(!options.regenerate_missing);
	}
}

//! Report file listing and downloads.

// self
use crate::{
	_prelude::*,
	api::{ApiClient, ApiRequest},
	auth::ReportId,
	http::ApiHttpClient,
};

/// Kind of file a report holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
	/// Aggregated CSV.
	Csv,
	/// PDF payslip or archive.
	Pdf,
}

/// Server-owned report file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFile {
	/// Report identifier.
	pub id: ReportId,
	/// Server-side storage path.
	pub path: String,
	/// File kind.
	#[serde(rename = "type")]
	pub report_type: ReportType,
	/// Manager the report belongs to.
	#[serde(default, alias = "manager_id")]
	pub manager_id: Option<String>,
	/// Reporting year.
	#[serde(default)]
	pub year: Option<i32>,
	/// Reporting month.
	#[serde(default)]
	pub month: Option<u8>,
	/// Whether the file was moved to the archive.
	#[serde(default)]
	pub archived: Option<bool>,
	/// Server creation timestamp, verbatim.
	#[serde(default, alias = "created_at")]
	pub created_at: Option<String>,
	/// Server update timestamp, verbatim.
	#[serde(default, alias = "updated_at")]
	pub updated_at: Option<String>,
}

/// Downloaded report body.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportDownload {
	/// Filename from `Content-Disposition`, or `report-<id>` when absent.
	pub filename: String,
	/// `Content-Type` of the body, when sent.
	pub content_type: Option<String>,
	/// Raw file bytes.
	pub bytes: Vec<u8>,
}
impl Debug for ReportDownload {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReportDownload")
			.field("filename", &self.filename)
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// `GET /reports`.
	pub async fn list_reports(&self) -> Result<Vec<ReportFile>> {
		self.request(ApiRequest::get("/reports")).await
	}

	/// `GET /reports/{id}/download`.
	pub async fn download_report(&self, id: &ReportId) -> Result<ReportDownload> {
		let response = self.send(ApiRequest::get(format!("/reports/{id}/download"))).await?;
		let filename = response
			.header("content-disposition")
			.and_then(disposition_filename)
			.unwrap_or_else(|| format!("report-{id}"));
		let content_type = response.header("content-type").map(str::to_owned);

		Ok(ReportDownload { filename, content_type, bytes: response.body })
	}
}

/// Extracts the filename from a `Content-Disposition` value, preferring the RFC 5987
/// `filename*=` form.
fn disposition_filename(header: &str) -> Option<String> {
	let params = header.split(';').skip(1).filter_map(|param| param.split_once('='));
	let mut plain = None;

	for (name, value) in params {
		let value = value.trim();

		match name.trim().to_ascii_lowercase().as_str() {
			"filename*" => {
				// charset'language'percent-encoded
				let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);

				if let Some(decoded) =
					percent_decode(encoded.trim_matches('"')).filter(|d| !d.is_empty())
				{
					return Some(decoded);
				}
			},
			"filename" if plain.is_none() => {
				let unquoted = value.trim_matches('"');

				if !unquoted.is_empty() {
					plain = Some(unquoted.to_owned());
				}
			},
			_ => {},
		}
	}

	plain
}

fn percent_decode(raw: &str) -> Option<String> {
	let mut out = Vec::with_capacity(raw.len());
	let mut bytes = raw.bytes();

	while let Some(byte) = bytes.next() {
		if byte == b'%' {
			let hi = (bytes.next()? as char).to_digit(16)?;
			let lo = (bytes.next()? as char).to_digit(16)?;

			out.push((hi * 16 + lo) as u8);
		} else {
			out.push(byte);
		}
	}

	String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn filename_star_takes_precedence() {
		assert_eq!(
			disposition_filename(
				"attachment; filename=\"fallback.pdf\"; filename*=UTF-8''fluturas%20mar%C8%9Bie.pdf"
			),
			Some("fluturas marție.pdf".to_owned())
		);
		assert_eq!(
			disposition_filename("attachment; filename=\"team-2025-03.csv\""),
			Some("team-2025-03.csv".to_owned())
		);
		assert_eq!(disposition_filename("attachment"), None);
		assert_eq!(disposition_filename("attachment; filename=\"\""), None);
	}

	#[test]
	fn broken_encoding_falls_back_to_plain_filename() {
		assert_eq!(
			disposition_filename("attachment; filename*=UTF-8''bad%zz; filename=plain.csv"),
			Some("plain.csv".to_owned())
		);
	}

	#[test]
	fn report_file_accepts_loose_payloads() {
		let file: ReportFile = serde_json::from_value(serde_json::json!({
			"id": "r1",
			"path": "/data/reports/r1.csv",
			"type": "csv",
			"manager_id": "m1",
			"year": 2025,
			"month": 3,
		}))
		.expect("Report file should deserialize.");

		assert_eq!(file.report_type, ReportType::Csv);
		assert_eq!(file.manager_id.as_deref(), Some("m1"));
		assert_eq!(file.archived, None);
	}
}

//! Idempotency keys for report operations.
//!
//! A key names one logical unit of work: operation kind, acting manager, reporting period,
//! and a random nonce minted once and reused across every retry of that work. Keys are not a
//! security boundary; they only let the server recognize a repeated request.

// std
use std::{
	process,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use rand::{Rng, SeedableRng, TryRngCore, rngs::{OsRng, SmallRng}};
use uuid::{Builder, Uuid};
// self
use crate::{_prelude::*, auth::ActorId};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Report operations that run under an idempotency key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
	/// Build the aggregated CSV for the manager's team.
	CreateCsv,
	/// Email the aggregated CSV to the manager.
	SendCsv,
	/// Email the aggregated CSV through the live mail provider.
	SendCsvLive,
	/// Render per-employee PDF payslips.
	CreatePdf,
	/// Email the PDFs to employees.
	SendPdf,
	/// Email the PDFs through the live mail provider.
	SendPdfLive,
}
impl OperationKind {
	/// Every kind, in display order.
	pub const ALL: [Self; 6] = [
		Self::CreateCsv,
		Self::SendCsv,
		Self::SendCsvLive,
		Self::CreatePdf,
		Self::SendPdf,
		Self::SendPdfLive,
	];

	/// Label used as the first segment of the idempotency key.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::CreateCsv => "create_csv",
			Self::SendCsv => "csv",
			Self::SendCsvLive => "csv_live",
			Self::CreatePdf => "create_pdfs",
			Self::SendPdf => "pdf",
			Self::SendPdfLive => "pdf_live",
		}
	}

	/// Human-readable name used in activity messages.
	pub const fn label(self) -> &'static str {
		match self {
			Self::CreateCsv => "Create CSV",
			Self::SendCsv => "Send CSV",
			Self::SendCsvLive => "Send CSV (live)",
			Self::CreatePdf => "Create PDFs",
			Self::SendPdf => "Send PDFs",
			Self::SendPdfLive => "Send PDFs (live)",
		}
	}

	/// Route under `/reports_generation` that performs the operation.
	pub const fn endpoint(self) -> &'static str {
		match self {
			Self::CreateCsv => "/reports_generation/createAggregatedEmployeeData",
			Self::SendCsv => "/reports_generation/sendAggregatedEmployeeData",
			Self::SendCsvLive => "/reports_generation/sendAggregatedEmployeeDataLive",
			Self::CreatePdf => "/reports_generation/createPdfForEmployees",
			Self::SendPdf => "/reports_generation/sendPdfToEmployees",
			Self::SendPdfLive => "/reports_generation/sendPdfToEmployeesLive",
		}
	}

	/// Returns `true` for kinds that deliver email rather than produce files.
	pub const fn is_send(self) -> bool {
		!matches!(self, Self::CreateCsv | Self::CreatePdf)
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reporting period rejected by [`ReportPeriod::new`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PeriodError {
	/// Month outside `1..=12`.
	#[error("Month must be between 1 and 12, got {month}.")]
	Month {
		/// Offending month.
		month: u8,
	},
	/// Year outside the four-digit range.
	#[error("Year must have four digits, got {year}.")]
	Year {
		/// Offending year.
		year: i32,
	},
}

/// Calendar month a report covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportPeriod {
	year: i32,
	month: u8,
}
impl ReportPeriod {
	/// Validates and builds a period.
	pub fn new(year: i32, month: u8) -> Result<Self, PeriodError> {
		if !(1..=12).contains(&month) {
			return Err(PeriodError::Month { month });
		}
		if !(1000..=9999).contains(&year) {
			return Err(PeriodError::Year { year });
		}

		Ok(Self { year, month })
	}

	/// Calendar year.
	pub fn year(&self) -> i32 {
		self.year
	}

	/// Calendar month, `1..=12`.
	pub fn month(&self) -> u8 {
		self.month
	}
}
impl Display for ReportPeriod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}-{:02}", self.year, self.month)
	}
}

/// Key sent in the `Idempotency-Key` header, formatted `<op>-<actor>-<year>-<MM>-<uuid>`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
	kind: OperationKind,
	actor: ActorId,
	period: ReportPeriod,
	nonce: Uuid,
	rendered: String,
}
impl IdempotencyKey {
	/// Builds a key from its parts.
	pub fn new(kind: OperationKind, actor: ActorId, period: ReportPeriod, nonce: Uuid) -> Self {
		let rendered = format!("{kind}-{actor}-{period}-{nonce}");

		Self { kind, actor, period, nonce, rendered }
	}

	/// Header value.
	pub fn as_str(&self) -> &str {
		&self.rendered
	}

	/// Operation the key was minted for.
	pub fn kind(&self) -> OperationKind {
		self.kind
	}

	/// Actor the key was minted for.
	pub fn actor(&self) -> &ActorId {
		&self.actor
	}

	/// Period the key was minted for.
	pub fn period(&self) -> ReportPeriod {
		self.period
	}

	/// Random part shared by every retry of the same work.
	pub fn nonce(&self) -> Uuid {
		self.nonce
	}

	/// Returns `true` when the key was minted for exactly these parameters.
	pub fn matches(&self, kind: OperationKind, actor: &ActorId, period: ReportPeriod) -> bool {
		self.kind == kind && &self.actor == actor && self.period == period
	}
}
impl AsRef<str> for IdempotencyKey {
	fn as_ref(&self) -> &str {
		&self.rendered
	}
}
impl Debug for IdempotencyKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("IdempotencyKey").field(&self.rendered).finish()
	}
}
impl Display for IdempotencyKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.rendered)
	}
}

/// Source of idempotency keys.
pub trait KeyFactory
where
	Self: Send + Sync,
{
	/// Mints a key for a new logical unit of work.
	fn make_key(&self, kind: OperationKind, actor: &ActorId, period: ReportPeriod)
	-> IdempotencyKey;
}

/// Mints keys with random v4 UUID nonces.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomKeyFactory;
impl KeyFactory for RandomKeyFactory {
	fn make_key(
		&self,
		kind: OperationKind,
		actor: &ActorId,
		period: ReportPeriod,
	) -> IdempotencyKey {
		IdempotencyKey::new(kind, actor.clone(), period, random_nonce())
	}
}

/// Draws a v4 UUID from the OS CSPRNG.
///
/// If the OS source is unavailable, falls back to a small non-cryptographic generator seeded
/// from the clock, the process id, and a process-wide counter. Two keys from the fallback are
/// still distinct within a process, which is all the server needs.
pub fn random_nonce() -> Uuid {
	let mut bytes = [0_u8; 16];

	if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
		tracing::warn!(error = %e, "OS randomness unavailable; using fallback nonce generator.");

		let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() as u64;
		let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
		let seed = nanos ^ count.rotate_left(32) ^ u64::from(process::id());

		SmallRng::seed_from_u64(seed).fill(&mut bytes);
	}

	Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn actor() -> ActorId {
		ActorId::new("mgr-1").expect("Fixture actor should be valid.")
	}

	#[test]
	fn key_follows_wire_format() {
		let period = ReportPeriod::new(2025, 3).expect("Fixture period should be valid.");
		let nonce = Uuid::parse_str("0b6f7c43-9a4e-4f0a-8c55-3a8e2d9f1b20")
			.expect("Fixture UUID should parse.");
		let key = IdempotencyKey::new(OperationKind::SendPdfLive, actor(), period, nonce);

		assert_eq!(key.as_str(), "pdf_live-mgr-1-2025-03-0b6f7c43-9a4e-4f0a-8c55-3a8e2d9f1b20");
		assert!(key.matches(OperationKind::SendPdfLive, &actor(), period));
		assert!(!key.matches(
			OperationKind::SendPdfLive,
			&actor(),
			ReportPeriod::new(2025, 4).expect("Fixture period should be valid.")
		));
	}

	#[test]
	fn random_factory_mints_distinct_v4_nonces() {
		let period = ReportPeriod::new(2024, 12).expect("Fixture period should be valid.");
		let first = RandomKeyFactory.make_key(OperationKind::CreateCsv, &actor(), period);
		let second = RandomKeyFactory.make_key(OperationKind::CreateCsv, &actor(), period);

		assert_ne!(first, second);
		assert_eq!(first.nonce().get_version_num(), 4);
		assert!(first.as_str().starts_with("create_csv-mgr-1-2024-12-"));
	}

	#[test]
	fn period_validation() {
		assert_eq!(ReportPeriod::new(2025, 0), Err(PeriodError::Month { month: 0 }));
		assert_eq!(ReportPeriod::new(2025, 13), Err(PeriodError::Month { month: 13 }));
		assert_eq!(ReportPeriod::new(99, 5), Err(PeriodError::Year { year: 99 }));
		assert_eq!(
			ReportPeriod::new(2025, 7).map(|period| period.to_string()),
			Ok("2025-07".to_owned())
		);
	}

	#[test]
	fn kinds_map_to_labels_and_routes() {
		let labels: Vec<_> = OperationKind::ALL.iter().map(|kind| kind.as_str()).collect();

		assert_eq!(labels, ["create_csv", "csv", "csv_live", "create_pdfs", "pdf", "pdf_live"]);
		assert!(!OperationKind::CreatePdf.is_send());
		assert!(OperationKind::SendCsvLive.is_send());
		assert!(OperationKind::SendPdfLive.endpoint().ends_with("sendPdfToEmployeesLive"));
	}
}

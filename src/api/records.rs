//! Read-only payroll records: salary components, vacations, working months, and the server's
//! idempotency key ledger.

// self
use crate::{
	_prelude::*,
	api::{ApiClient, ApiRequest},
	http::ApiHttpClient,
};

/// Kind of salary component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
	/// One-off bonus.
	Bonus,
	/// Positive or negative correction.
	Adjustment,
}

/// Bonus or adjustment applied to an employee for one month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryComponent {
	/// Component identifier.
	pub id: String,
	/// Employee the component applies to.
	#[serde(alias = "employee_id")]
	pub employee_id: String,
	/// Calendar year.
	pub year: i32,
	/// Calendar month.
	pub month: u8,
	/// Component kind.
	#[serde(rename = "type")]
	pub component_type: ComponentType,
	/// Signed amount.
	pub amount: f64,
	/// Server creation timestamp, verbatim.
	#[serde(default, alias = "created_at")]
	pub created_at: Option<String>,
	/// Server update timestamp, verbatim.
	#[serde(default, alias = "updated_at")]
	pub updated_at: Option<String>,
}

/// Vacation days taken by an employee in one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vacation {
	/// Vacation identifier.
	pub id: String,
	/// Employee on vacation.
	#[serde(alias = "employee_id")]
	pub employee_id: String,
	/// Calendar year.
	pub year: i32,
	/// Calendar month.
	pub month: u8,
	/// Days taken.
	#[serde(alias = "days_taken")]
	pub days_taken: u32,
	/// Server creation timestamp, verbatim.
	#[serde(default, alias = "created_at")]
	pub created_at: Option<String>,
	/// Server update timestamp, verbatim.
	#[serde(default, alias = "updated_at")]
	pub updated_at: Option<String>,
}

/// Working-day calendar for one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthInfo {
	/// Record identifier.
	pub id: String,
	/// Calendar year.
	pub year: i32,
	/// Calendar month, `1..=12`.
	pub month: u8,
	/// Working days in the month.
	#[serde(alias = "working_days")]
	pub working_days: u32,
	/// Server creation timestamp, verbatim.
	#[serde(default, alias = "created_at")]
	pub created_at: Option<String>,
	/// Server update timestamp, verbatim.
	#[serde(default, alias = "updated_at")]
	pub updated_at: Option<String>,
}

/// Idempotency key the server has recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyKeyRecord {
	/// Record identifier.
	pub id: String,
	/// Key as sent in the `Idempotency-Key` header.
	pub key: String,
	/// Optional description stored with the key.
	#[serde(default)]
	pub description: Option<String>,
	/// Server creation timestamp, verbatim.
	#[serde(default, alias = "created_at")]
	pub created_at: Option<String>,
	/// Server update timestamp, verbatim.
	#[serde(default, alias = "updated_at")]
	pub updated_at: Option<String>,
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// `GET /salary_components`.
	pub async fn list_salary_components(&self) -> Result<Vec<SalaryComponent>> {
		self.request(ApiRequest::get("/salary_components")).await
	}

	/// `GET /vacations`.
	pub async fn list_vacations(&self) -> Result<Vec<Vacation>> {
		self.request(ApiRequest::get("/vacations")).await
	}

	/// `GET /months`.
	pub async fn list_months(&self) -> Result<Vec<MonthInfo>> {
		self.request(ApiRequest::get("/months")).await
	}

	/// `GET /idempotency_keys`.
	pub async fn list_idempotency_keys(&self) -> Result<Vec<IdempotencyKeyRecord>> {
		self.request(ApiRequest::get("/idempotency_keys")).await
	}
}

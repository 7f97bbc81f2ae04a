//! Employee endpoints.

// self
use crate::{
	_prelude::*,
	api::{ApiClient, ApiRequest},
	auth::{ActorId, EmployeeId},
	error::DecodeError,
	http::ApiHttpClient,
};

/// Employee record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
	/// Employee identifier.
	pub id: EmployeeId,
	/// Given name.
	pub first_name: String,
	/// Family name.
	pub last_name: String,
	/// Work email.
	pub email: String,
	/// National identification number.
	pub cnp: String,
	/// Monthly base salary.
	pub base_salary: f64,
	/// Whether the employee is currently employed.
	pub is_active: bool,
	/// Whether the employee manages a team.
	pub is_manager: bool,
	/// Manager of this employee, if any.
	pub manager_id: Option<EmployeeId>,
	/// Server creation timestamp, verbatim.
	pub created_at: Option<String>,
	/// Server update timestamp, verbatim.
	pub updated_at: Option<String>,
}
impl Employee {
	/// `first last`.
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}
impl TryFrom<EmployeeWire> for Employee {
	type Error = DecodeError;

	fn try_from(wire: EmployeeWire) -> Result<Self, Self::Error> {
		let id = wire
			.id
			.as_deref()
			.and_then(|id| EmployeeId::new(id).ok())
			.ok_or(DecodeError::Field { field: "id" })?;
		let base_salary = match wire.base_salary {
			Some(serde_json::Value::Number(n)) => n.as_f64(),
			Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
			_ => None,
		}
		.ok_or(DecodeError::Field { field: "base_salary" })?;
		let manager_id = match wire.manager_id.as_deref().filter(|id| !id.is_empty()) {
			Some(raw) =>
				Some(EmployeeId::new(raw).map_err(|_| DecodeError::Field { field: "manager_id" })?),
			None => None,
		};

		Ok(Self {
			id,
			first_name: wire.first_name,
			last_name: wire.last_name,
			email: wire.email,
			cnp: wire.cnp,
			base_salary,
			is_active: wire.is_active.unwrap_or(true),
			is_manager: wire.is_manager,
			manager_id,
			created_at: wire.created_at,
			updated_at: wire.updated_at,
		})
	}
}

/// Employee as the server sends it: camelCase or snake_case keys, salary as number or string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeWire {
	#[serde(default)]
	id: Option<String>,
	#[serde(default, alias = "first_name")]
	first_name: String,
	#[serde(default, alias = "last_name")]
	last_name: String,
	#[serde(default)]
	email: String,
	#[serde(default)]
	cnp: String,
	#[serde(default, alias = "base_salary")]
	base_salary: Option<serde_json::Value>,
	#[serde(default, alias = "is_active")]
	is_active: Option<bool>,
	#[serde(default, alias = "is_manager")]
	is_manager: bool,
	#[serde(default, alias = "manager_id")]
	manager_id: Option<String>,
	#[serde(default, alias = "created_at")]
	created_at: Option<String>,
	#[serde(default, alias = "updated_at")]
	updated_at: Option<String>,
}

/// Create/update payload; unset fields are omitted so updates stay partial.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDraft {
	/// Given name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
	/// Family name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
	/// Work email.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// National identification number.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cnp: Option<String>,
	/// Monthly base salary.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub base_salary: Option<f64>,
	/// Employment flag.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub is_active: Option<bool>,
	/// Manager flag.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub is_manager: Option<bool>,
	/// Manager assignment.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub manager_id: Option<EmployeeId>,
}

/// Body returned by `DELETE /employees/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EmployeeDeletion {
	/// Whether a record was removed.
	#[serde(default)]
	pub deleted: bool,
	/// Identifier of the removed record.
	pub id: String,
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// `GET /employees`.
	pub async fn list_employees(&self) -> Result<Vec<Employee>> {
		self.employees(ApiRequest::get("/employees")).await
	}

	/// `GET /employees/{id}`.
	pub async fn get_employee(&self, id: &EmployeeId) -> Result<Employee> {
		self.employee(ApiRequest::get(format!("/employees/{id}"))).await
	}

	/// `GET /employees/manager/{managerId}`: the manager's direct reports.
	pub async fn list_employees_for_manager(&self, manager: &ActorId) -> Result<Vec<Employee>> {
		self.employees(ApiRequest::get(format!("/employees/manager/{manager}"))).await
	}

	/// `POST /employees`.
	pub async fn create_employee(&self, draft: &EmployeeDraft) -> Result<Employee> {
		self.employee(ApiRequest::post("/employees").json(draft)?).await
	}

	/// `PUT /employees/{id}` with only the fields set on `draft`.
	pub async fn update_employee(
		&self,
		id: &EmployeeId,
		draft: &EmployeeDraft,
	) -> Result<Employee> {
		self.employee(ApiRequest::put(format!("/employees/{id}")).json(draft)?).await
	}

	/// `DELETE /employees/{id}`.
	pub async fn delete_employee(&self, id: &EmployeeId) -> Result<EmployeeDeletion> {
		self.request(ApiRequest::delete(format!("/employees/{id}"))).await
	}

	async fn employee(&self, request: ApiRequest) -> Result<Employee> {
		let wire: EmployeeWire = self.request(request).await?;

		Ok(Employee::try_from(wire)?)
	}

	async fn employees(&self, request: ApiRequest) -> Result<Vec<Employee>> {
		let wire: Vec<EmployeeWire> = self.request(request).await?;

		Ok(wire.into_iter().map(Employee::try_from).collect::<Result<_, _>>()?)
	}
}

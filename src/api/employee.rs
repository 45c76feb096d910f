use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{bad_request, db_error, is_duplicate, not_found};
use crate::{
    auth::auth::AuthUser,
    model::employee::{Employee, EmployeeStatus, Gender},
    utils::db_utils::{build_update_sql, execute_update},
    utils::pagination::Pagination,
};

/// Columns HR and admins may edit on any profile.
const STAFF_EDITABLE: &[&str] = &[
    "name",
    "email",
    "phone",
    "designation",
    "dob",
    "gender",
    "qualification",
    "address",
    "project",
];
/// Columns an employee may edit on their own profile.
const SELF_EDITABLE: &[&str] = &[
    "name",
    "phone",
    "dob",
    "gender",
    "qualification",
    "address",
    "project",
];
/// NOT NULL columns; an update may change them but never blank them.
const REQUIRED: &[&str] = &["name", "email", "designation"];

const EMPLOYEE_COLUMNS: &str = "id, staff_id, name, email, phone, designation, \
    dob, gender, qualification, address, project, status, created_at";

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    /// `Not Verified`, `Verified` or `Disabled`
    #[schema(example = "Verified")]
    pub status: Option<String>,
    #[schema(example = "Developer")]
    pub designation: Option<String>,
    /// Matches name, email or staff id
    pub search: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 20)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Body accepted by the update endpoints; only listed keys are written.
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct UpdateEmployee {
    #[schema(example = "Asha Rao")]
    pub name: Option<String>,
    #[schema(example = "asha.rao@company.com")]
    pub email: Option<String>,
    #[schema(example = "+919900112233")]
    pub phone: Option<String>,
    #[schema(example = "Developer")]
    pub designation: Option<String>,
    #[schema(value_type = Option<String>, format = "date", example = "1996-04-12")]
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[schema(example = "B.Tech")]
    pub qualification: Option<String>,
    #[schema(example = "12 MG Road, Bengaluru")]
    pub address: Option<String>,
    #[schema(example = "Payroll revamp")]
    pub project: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusPayload {
    pub status: EmployeeStatus,
}

/// A verified employee keeps their staff id and cannot drop back to
/// `Not Verified`; disabling is always allowed.
pub fn check_status_change(
    current: EmployeeStatus,
    next: EmployeeStatus,
) -> Result<(), &'static str> {
    match (current, next) {
        (EmployeeStatus::Verified, EmployeeStatus::NotVerified) => {
            Err("A verified employee cannot be marked not verified")
        }
        _ => Ok(()),
    }
}

/// Field-level checks on an update body before it becomes SQL. Unknown keys
/// and non-object bodies are left to `build_update_sql`.
pub fn check_profile_values(body: &Value, today: NaiveDate) -> Result<(), String> {
    let Some(obj) = body.as_object() else {
        return Ok(());
    };

    for column in REQUIRED {
        match obj.get(*column) {
            None => {}
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(_) => return Err(format!("{} must not be empty", column)),
        }
    }

    // phone is unique; clearing it means null, not ""
    if matches!(obj.get("phone"), Some(Value::String(s)) if s.trim().is_empty()) {
        return Err("phone must not be blank; send null to clear it".to_string());
    }

    match obj.get("gender") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.trim().parse::<Gender>().is_ok() => {}
        Some(_) => return Err("gender must be Male, Female or Other".to_string()),
    }

    match obj.get("dob") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            Ok(dob) if dob <= today => {}
            Ok(_) => return Err("dob cannot be in the future".to_string()),
            Err(_) => return Err("dob must be a date (YYYY-MM-DD)".to_string()),
        },
        Some(_) => return Err("dob must be a date (YYYY-MM-DD)".to_string()),
    }

    Ok(())
}

async fn find_employee(pool: &MySqlPool, employee_id: u64) -> Result<Option<Employee>, sqlx::Error> {
    let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
    sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await
}

/// List employees (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let paging = Pagination::new(query.page, query.per_page, 20);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let Ok(status) = status.parse::<EmployeeStatus>() else {
            return Ok(bad_request(format!("Unknown status '{}'", status)));
        };
        conditions.push("status = ?");
        bindings.push(status.to_string());
    }

    if let Some(designation) = query.designation.as_deref().filter(|d| !d.is_empty()) {
        conditions.push("designation = ?");
        bindings.push(designation.to_string());
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(name LIKE ? OR email LIKE ? OR staff_id LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count employees"))?;

    // ---------- data query ----------
    let data_sql = format!(
        r#"
        SELECT {}
        FROM employees {}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        EMPLOYEE_COLUMNS, where_clause
    );
    debug!(page = paging.page, per_page = paging.per_page, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(paging.limit()).bind(paging.offset());

    let employees = data_query
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch employees"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get Employee by ID (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    match find_employee(pool.get_ref(), path.into_inner())
        .await
        .map_err(|e| db_error(e, "Failed to fetch employee"))?
    {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(not_found("Employee not found")),
    }
}

/// Own employee profile
#[utoipa::path(
    get,
    path = "/api/employees/me",
    responses(
        (status = 200, body = Employee),
        (status = 403, description = "No employee profile")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    match find_employee(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Failed to fetch own profile"))?
    {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(not_found("Employee not found")),
    }
}

async fn apply_update(
    pool: &MySqlPool,
    employee_id: u64,
    body: &Value,
    allowed: &[&str],
) -> actix_web::Result<HttpResponse> {
    if let Err(message) = check_profile_values(body, Local::now().date_naive()) {
        return Ok(bad_request(message));
    }
    let update = build_update_sql("employees", body, allowed, "id", employee_id)?;

    match execute_update(pool, update).await {
        Ok(0) => Ok(not_found("Employee not found")),
        Ok(_) => {
            info!(employee_id, "Employee updated");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Employee updated successfully"
            })))
        }
        Err(e) if is_duplicate(&e) => Ok(HttpResponse::Conflict().json(json!({
            "message": "Email or phone already in use"
        }))),
        Err(e) => Err(db_error(e, "Failed to update employee")),
    }
}

/// Update Employee (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Empty payload, blank required field or field not editable"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 409, description = "Email or phone already in use"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    apply_update(pool.get_ref(), path.into_inner(), &body, STAFF_EDITABLE).await
}

/// Update own profile (name, phone and personal details)
#[utoipa::path(
    put,
    path = "/api/employees/me",
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Empty payload, invalid value or field not editable"),
        (status = 409, description = "Phone already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    apply_update(pool.get_ref(), employee_id, &body, SELF_EDITABLE).await
}

/// Verify, disable or re-enable an employee (Admin)
///
/// Verification assigns a staff id the first time.
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}/status",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = StatusPayload,
    responses(
        (status = 200, body = Employee),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(admin = %auth.username))]
pub async fn set_employee_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<StatusPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let Some(employee) = find_employee(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Failed to fetch employee"))?
    else {
        return Ok(not_found("Employee not found"));
    };

    if let Err(message) = check_status_change(employee.status, payload.status) {
        return Ok(bad_request(message));
    }

    let staff_id = (payload.status == EmployeeStatus::Verified)
        .then(|| Employee::staff_id_for(employee_id));

    sqlx::query("UPDATE employees SET status = ?, staff_id = COALESCE(staff_id, ?) WHERE id = ?")
        .bind(payload.status.as_ref())
        .bind(staff_id)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to update employee status"))?;

    info!(employee_id, from = %employee.status, to = %payload.status, "Employee status changed");

    match find_employee(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Failed to fetch employee"))?
    {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(not_found("Employee not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_cannot_be_unverified() {
        use EmployeeStatus::*;

        assert!(check_status_change(NotVerified, Verified).is_ok());
        assert!(check_status_change(Verified, Disabled).is_ok());
        assert!(check_status_change(Disabled, Verified).is_ok());
        assert!(check_status_change(Verified, NotVerified).is_err());
    }

    #[test]
    fn employees_cannot_touch_designation_or_email() {
        let body = json!({ "designation": "Manager" });
        assert!(build_update_sql("employees", &body, SELF_EDITABLE, "id", 7).is_err());
        assert!(build_update_sql("employees", &body, STAFF_EDITABLE, "id", 7).is_ok());

        let body = json!({ "status": "Verified" });
        assert!(build_update_sql("employees", &body, STAFF_EDITABLE, "id", 7).is_err());

        let body = json!({ "qualification": "MBA", "project": "Atlas" });
        assert!(build_update_sql("employees", &body, SELF_EDITABLE, "id", 7).is_ok());
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 10).unwrap()
    }

    #[test]
    fn required_columns_cannot_be_blanked() {
        for body in [
            json!({ "name": null }),
            json!({ "name": "   " }),
            json!({ "email": "" }),
            json!({ "designation": 5 }),
            json!({ "phone": " " }),
        ] {
            assert!(check_profile_values(&body, today()).is_err(), "{body}");
        }

        assert!(check_profile_values(&json!({ "name": "Asha" }), today()).is_ok());
        // optional columns may still be cleared
        let clear = json!({ "phone": null, "project": null });
        assert!(check_profile_values(&clear, today()).is_ok());
    }

    #[test]
    fn profile_values_are_checked() {
        let ok = json!({ "gender": "Female", "dob": "1996-04-12" });
        assert!(check_profile_values(&ok, today()).is_ok());

        assert!(check_profile_values(&json!({ "gender": "Robot" }), today()).is_err());
        assert!(check_profile_values(&json!({ "dob": "2030-01-01" }), today()).is_err());
        assert!(check_profile_values(&json!({ "dob": "12/04/1996" }), today()).is_err());
        assert!(check_profile_values(&json!({ "dob": 19960412 }), today()).is_err());
    }
}

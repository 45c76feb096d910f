use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use super::{bad_request, db_error, not_found};
use crate::auth::auth::AuthUser;
use crate::model::employee::EmployeeStatus;
use crate::model::payslip::Payslip;
use crate::model::role::Role;
use crate::payslip::calculator::{self, PayslipInput, PayslipResult};
use crate::payslip::month::YearMonth;
use crate::payslip::service::{PayslipError, PayslipPreview, prepare_payslip};
use crate::payslip::source::MySqlAttendanceSource;
use crate::utils::pagination::Pagination;

#[derive(Deserialize, ToSchema)]
pub struct PayslipRequest {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = "2025-09", value_type = String)]
    pub month: YearMonth,
    /// Monthly base amount
    #[schema(example = 9000.0)]
    pub amount: f64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayslipQuery {
    #[schema(example = 7)]
    pub employee_id: Option<u64>,
    #[schema(example = "2025-09")]
    pub month: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct PayslipListResponse {
    pub data: Vec<Payslip>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

const PAYSLIP_SELECT: &str = r#"
    SELECT p.id, p.employee_id, e.staff_id, e.name AS employee_name, p.month, p.amount,
           p.present_count, p.credited_hours, p.amount_received, p.deduction_amount,
           p.created_at
    FROM payslips p
    JOIN employees e ON e.id = p.employee_id
"#;

fn payslip_error(e: PayslipError) -> actix_web::Result<HttpResponse> {
    match e {
        PayslipError::InvalidAmount => Ok(bad_request(e.to_string())),
        PayslipError::Source(_) => {
            error!(error = %e, "Payslip calculation failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

async fn employee_status(
    pool: &MySqlPool,
    employee_id: u64,
) -> Result<Option<EmployeeStatus>, sqlx::Error> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    Ok(status.and_then(|s| match s.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            warn!(employee_id, status = %s, "Unknown employee status");
            None
        }
    }))
}

/// Run the calculator over posted data (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/payslips/calculate",
    request_body = PayslipInput,
    responses(
        (status = 200, body = PayslipResult),
        (status = 400, description = "Base amount too large"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn calculate_payslip(
    auth: AuthUser,
    input: web::Json<PayslipInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if input
        .base_amount
        .is_some_and(|amount| amount > calculator::MAX_BASE_AMOUNT)
    {
        return Ok(bad_request(format!(
            "base_amount must not exceed {}",
            calculator::MAX_BASE_AMOUNT
        )));
    }
    Ok(HttpResponse::Ok().json(calculator::calculate(&input)))
}

/// Calculate an employee's payslip from recorded attendance without saving it (Admin)
#[utoipa::path(
    post,
    path = "/api/payslips/preview",
    request_body = PayslipRequest,
    responses(
        (status = 200, body = PayslipPreview),
        (status = 400, description = "Amount must be positive"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
#[instrument(skip(auth, pool, payload), fields(employee_id = payload.employee_id, month = %payload.month))]
pub async fn preview_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PayslipRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    if employee_status(pool.get_ref(), payload.employee_id)
        .await
        .map_err(|e| db_error(e, "Employee lookup failed"))?
        .is_none()
    {
        return Ok(not_found("Employee not found"));
    }

    let source = MySqlAttendanceSource::new(pool.get_ref());
    match prepare_payslip(&source, payload.employee_id, payload.month, payload.amount).await {
        Ok(preview) => Ok(HttpResponse::Ok().json(preview)),
        Err(e) => payslip_error(e),
    }
}

/// Calculate and archive an employee's payslip for a month (Admin)
///
/// Generating the same month twice replaces the earlier payslip.
#[utoipa::path(
    post,
    path = "/api/payslips",
    request_body = PayslipRequest,
    responses(
        (status = 201, body = Payslip),
        (status = 400, description = "Employee not verified, invalid amount or nothing to pay"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
#[instrument(skip(auth, pool, payload), fields(employee_id = payload.employee_id, month = %payload.month))]
pub async fn generate_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PayslipRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    match employee_status(pool.get_ref(), payload.employee_id)
        .await
        .map_err(|e| db_error(e, "Employee lookup failed"))?
    {
        None => return Ok(not_found("Employee not found")),
        Some(EmployeeStatus::Verified) => {}
        Some(_) => {
            return Ok(bad_request(
                "Payslips can only be generated for verified employees",
            ));
        }
    }

    let source = MySqlAttendanceSource::new(pool.get_ref());
    let preview =
        match prepare_payslip(&source, payload.employee_id, payload.month, payload.amount).await {
            Ok(preview) => preview,
            Err(e) => return payslip_error(e),
        };

    if preview.result.amount_received == 0.0 {
        return Ok(bad_request("Amount received is zero; nothing to pay"));
    }

    sqlx::query(
        r#"
        INSERT INTO payslips
            (employee_id, month, amount, present_count, credited_hours, amount_received, deduction_amount)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            amount = VALUES(amount),
            present_count = VALUES(present_count),
            credited_hours = VALUES(credited_hours),
            amount_received = VALUES(amount_received),
            deduction_amount = VALUES(deduction_amount),
            created_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(preview.employee_id)
    .bind(preview.month.to_string())
    .bind(preview.amount)
    .bind(preview.present_count)
    .bind(preview.result.breakdown.total_credited_hours)
    .bind(preview.result.amount_received)
    .bind(preview.result.deduction_amount)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to store payslip"))?;

    let payslip = find_payslip(pool.get_ref(), preview.employee_id, preview.month)
        .await
        .map_err(|e| db_error(e, "Failed to read back payslip"))?;

    info!(
        amount_received = preview.result.amount_received,
        deduction_amount = preview.result.deduction_amount,
        "Payslip generated"
    );

    Ok(match payslip {
        Some(p) => HttpResponse::Created().json(p),
        None => HttpResponse::Created().json(preview),
    })
}

async fn find_payslip(
    pool: &MySqlPool,
    employee_id: u64,
    month: YearMonth,
) -> Result<Option<Payslip>, sqlx::Error> {
    let sql = format!("{} WHERE p.employee_id = ? AND p.month = ?", PAYSLIP_SELECT);
    sqlx::query_as::<_, Payslip>(&sql)
        .bind(employee_id)
        .bind(month.to_string())
        .fetch_optional(pool)
        .await
}

/// List archived payslips (Admin)
#[utoipa::path(
    get,
    path = "/api/payslips",
    params(PayslipQuery),
    responses(
        (status = 200, body = PayslipListResponse),
        (status = 400, description = "Invalid month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn list_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayslipQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let paging = Pagination::new(query.page, query.per_page, 10);

    let month = match query.month.as_deref().filter(|m| !m.is_empty()) {
        Some(raw) => match raw.parse::<YearMonth>() {
            Ok(m) => Some(m),
            Err(e) => return Ok(bad_request(e.to_string())),
        },
        None => None,
    };

    let mut conditions = Vec::new();
    if query.employee_id.is_some() {
        conditions.push("p.employee_id = ?");
    }
    if month.is_some() {
        conditions.push("p.month = ?");
    }
    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM payslips p{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(id) = query.employee_id {
        count_q = count_q.bind(id);
    }
    if let Some(m) = month {
        count_q = count_q.bind(m.to_string());
    }
    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count payslips"))?;

    let data_sql = format!(
        "{}{} ORDER BY p.month DESC, p.employee_id LIMIT ? OFFSET ?",
        PAYSLIP_SELECT, where_sql
    );
    let mut data_q = sqlx::query_as::<_, Payslip>(&data_sql);
    if let Some(id) = query.employee_id {
        data_q = data_q.bind(id);
    }
    if let Some(m) = month {
        data_q = data_q.bind(m.to_string());
    }
    let data = data_q
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch payslips"))?;

    Ok(HttpResponse::Ok().json(PayslipListResponse {
        data,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Own payslips, newest month first
#[utoipa::path(
    get,
    path = "/api/payslips/me",
    responses((status = 200, body = [Payslip])),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn my_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let sql = format!("{} WHERE p.employee_id = ? ORDER BY p.month DESC", PAYSLIP_SELECT);
    let payslips = sqlx::query_as::<_, Payslip>(&sql)
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch own payslips"))?;

    Ok(HttpResponse::Ok().json(payslips))
}

/// Admins may read any payslip; everyone else only their own.
fn may_read_payslip(auth: &AuthUser, employee_id: u64) -> bool {
    auth.role == Role::Admin || (auth.is_employee() && auth.employee_id == Some(employee_id))
}

/// One archived payslip
#[utoipa::path(
    get,
    path = "/api/payslips/{employee_id}/{month}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("month" = String, Path, description = "Month (YYYY-MM)")
    ),
    responses(
        (status = 200, body = Payslip),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payslip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, String)>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, raw_month) = path.into_inner();

    if !may_read_payslip(&auth, employee_id) {
        return Err(actix_web::error::ErrorForbidden("Not your payslip"));
    }

    let month = match raw_month.parse::<YearMonth>() {
        Ok(m) => m,
        Err(e) => return Ok(bad_request(e.to_string())),
    };

    match find_payslip(pool.get_ref(), employee_id, month)
        .await
        .map_err(|e| db_error(e, "Failed to fetch payslip"))?
    {
        Some(p) => Ok(HttpResponse::Ok().json(p)),
        None => Ok(not_found("Payslip not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "someone".into(),
            role,
            employee_id,
        }
    }

    #[test]
    fn payslip_visibility() {
        assert!(may_read_payslip(&user(Role::Admin, None), 7));
        assert!(may_read_payslip(&user(Role::Employee, Some(7)), 7));
        assert!(!may_read_payslip(&user(Role::Employee, Some(8)), 7));
        assert!(!may_read_payslip(&user(Role::Hr, Some(7)), 7));
    }

    #[test]
    fn invalid_amount_is_a_client_error() {
        let resp = payslip_error(PayslipError::InvalidAmount).unwrap();
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        let err = payslip_error(PayslipError::Source(anyhow::anyhow!("db down"))).unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn calculate_endpoint_runs_the_calculator() {
        use crate::auth::jwt::{TokenSubject, generate_access_token};
        use crate::config::Config;
        use actix_web::{App, test};

        let config = Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/hr".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .route("/payslips/calculate", web::post().to(calculate_payslip)),
        )
        .await;

        let hr = TokenSubject {
            user_id: 2,
            username: "hr".into(),
            role: Role::Hr.id(),
            employee_id: None,
        };
        let token = generate_access_token(&hr, "test-secret", 60).unwrap();

        let req = test::TestRequest::post()
            .uri("/payslips/calculate")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(serde_json::json!({
                "base_amount": 2800.0,
                "period_month": "2026-02",
                "attendance_days": [],
                "holiday_dates": []
            }))
            .to_request();

        let resp: PayslipResult = test::call_and_read_body_json(&app, req).await;
        // four Sundays of 9 hours at 2800 / 28 / 9 per hour
        assert_eq!(resp.amount_received, 400.0);
        assert_eq!(resp.deduction_amount, 2400.0);

        let req = test::TestRequest::post()
            .uri("/payslips/calculate")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(serde_json::json!({
                "base_amount": 1e307,
                "period_month": "2026-02"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn calculate_endpoint_is_closed_to_employees() {
        use crate::auth::jwt::{TokenSubject, generate_access_token};
        use crate::config::Config;
        use actix_web::{App, test};

        let config = Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/hr".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .route("/payslips/calculate", web::post().to(calculate_payslip)),
        )
        .await;

        let employee = TokenSubject {
            user_id: 3,
            username: "asha".into(),
            role: Role::Employee.id(),
            employee_id: Some(7),
        };
        let token = generate_access_token(&employee, "test-secret", 60).unwrap();

        let req = test::TestRequest::post()
            .uri("/payslips/calculate")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(serde_json::json!({
                "base_amount": 9000.0,
                "period_month": "2025-09"
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }
}

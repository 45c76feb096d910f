use actix_web::{HttpResponse, Responder, web};
use chrono::Local;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use super::db_error;
use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceStatus;
use crate::model::employee::EmployeeStatus;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardCounts {
    #[schema(example = 42)]
    pub total_employees: i64,
    #[schema(example = 35)]
    pub present_today: i64,
    #[schema(example = 7)]
    pub absent_today: i64,
    #[schema(example = 14)]
    pub total_holidays: i64,
}

/// Headline numbers for the admin landing page (HR/Admin)
///
/// Absent is every verified employee without a present record today.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, body = DashboardCounts),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (total_employees, present_today, total_holidays) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM employees WHERE status = ?) AS total_employees,
            (SELECT COUNT(*)
               FROM attendance a
               JOIN employees e ON e.id = a.employee_id
              WHERE a.date = ? AND a.status = ? AND e.status = ?) AS present_today,
            (SELECT COUNT(*) FROM holidays) AS total_holidays
        "#,
    )
    .bind(EmployeeStatus::Verified.as_ref())
    .bind(Local::now().date_naive())
    .bind(AttendanceStatus::Present.as_ref())
    .bind(EmployeeStatus::Verified.as_ref())
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to load dashboard counts"))?;

    Ok(HttpResponse::Ok().json(DashboardCounts {
        total_employees,
        present_today,
        absent_today: (total_employees - present_today).max(0),
        total_holidays,
    }))
}

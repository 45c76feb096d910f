use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use super::{bad_request, db_error};
use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceStatus;
use crate::model::employee::EmployeeStatus;
use crate::payslip::month::YearMonth;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct MonthlyQuery {
    /// Month as YYYY-MM (defaults to the current month)
    #[schema(example = "2025-09")]
    pub month: Option<String>,
    #[schema(example = "Developer")]
    pub designation: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct ReportEmployee {
    pub id: u64,
    pub staff_id: Option<String>,
    pub name: String,
    pub designation: String,
}

#[derive(Debug, FromRow)]
pub struct PresentDay {
    pub employee_id: u64,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyRow {
    pub employee_id: u64,
    pub staff_id: Option<String>,
    pub name: String,
    pub designation: String,
    /// One entry per calendar day, `"P"` when present
    #[schema(value_type = Vec<Option<String>>, example = json!(["P", null, "P"]))]
    pub days: Vec<Option<&'static str>>,
    pub total_present: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyReport {
    #[schema(value_type = String, example = "2025-09")]
    pub month: YearMonth,
    pub days_in_month: u32,
    pub rows: Vec<MonthlyRow>,
}

/// Lays present days out as one grid row per employee.
pub fn build_monthly_rows(
    month: YearMonth,
    employees: Vec<ReportEmployee>,
    present: &[PresentDay],
) -> Vec<MonthlyRow> {
    let days_in_month = month.days_in_month() as usize;

    let mut by_employee: HashMap<u64, Vec<Option<&'static str>>> = HashMap::new();
    for day in present.iter().filter(|d| month.contains(d.date)) {
        let grid = by_employee
            .entry(day.employee_id)
            .or_insert_with(|| vec![None; days_in_month]);
        grid[day.date.day0() as usize] = Some("P");
    }

    employees
        .into_iter()
        .map(|e| {
            let days = by_employee
                .remove(&e.id)
                .unwrap_or_else(|| vec![None; days_in_month]);
            let total_present = days.iter().filter(|d| d.is_some()).count() as u32;
            MonthlyRow {
                employee_id: e.id,
                staff_id: e.staff_id,
                name: e.name,
                designation: e.designation,
                days,
                total_present,
            }
        })
        .collect()
}

/// Month grid of present days for every verified employee
#[utoipa::path(
    get,
    path = "/api/attendance/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, body = MonthlyReport),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthlyQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let month = match query.month.as_deref() {
        Some(raw) => match raw.parse::<YearMonth>() {
            Ok(m) => m,
            Err(e) => {
                return Ok(bad_request(e.to_string()));
            }
        },
        None => YearMonth::of(Local::now().date_naive()),
    };

    let designation = query.designation.as_deref().filter(|d| !d.is_empty());

    let mut employee_sql = String::from(
        "SELECT id, staff_id, name, designation FROM employees WHERE status = ?",
    );
    if designation.is_some() {
        employee_sql.push_str(" AND designation = ?");
    }
    employee_sql.push_str(" ORDER BY name");

    let mut employee_q = sqlx::query_as::<_, ReportEmployee>(&employee_sql)
        .bind(EmployeeStatus::Verified.as_ref());
    if let Some(d) = designation {
        employee_q = employee_q.bind(d);
    }

    let employees = employee_q
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch employees for monthly report"))?;

    let present = sqlx::query_as::<_, PresentDay>(
        r#"
        SELECT employee_id, date
        FROM attendance
        WHERE status = ?
        AND date BETWEEN ? AND ?
        "#,
    )
    .bind(AttendanceStatus::Present.as_ref())
    .bind(month.first_day())
    .bind(month.last_day())
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to fetch attendance for monthly report"))?;

    debug!(
        %month,
        employees = employees.len(),
        present = present.len(),
        "Building monthly report"
    );

    Ok(HttpResponse::Ok().json(MonthlyReport {
        month,
        days_in_month: month.days_in_month(),
        rows: build_monthly_rows(month, employees, &present),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: u64, name: &str) -> ReportEmployee {
        ReportEmployee {
            id,
            staff_id: Some(format!("EMPID0{id:03}")),
            name: name.into(),
            designation: "Developer".into(),
        }
    }

    fn present(employee_id: u64, day: u32) -> PresentDay {
        PresentDay {
            employee_id,
            date: NaiveDate::from_ymd_opt(2025, 9, day).unwrap(),
        }
    }

    #[test]
    fn marks_present_days_per_employee() {
        let month = YearMonth::new(2025, 9).unwrap();
        let rows = build_monthly_rows(
            month,
            vec![employee(1, "Asha"), employee(2, "Ravi")],
            &[present(1, 1), present(1, 30), present(2, 15)],
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].days.len(), 30);
        assert_eq!(rows[0].days[0], Some("P"));
        assert_eq!(rows[0].days[29], Some("P"));
        assert_eq!(rows[0].days[1], None);
        assert_eq!(rows[0].total_present, 2);
        assert_eq!(rows[1].days[14], Some("P"));
        assert_eq!(rows[1].total_present, 1);
    }

    #[test]
    fn employees_without_attendance_get_empty_rows() {
        let month = YearMonth::new(2026, 2).unwrap();
        let rows = build_monthly_rows(month, vec![employee(9, "Meera")], &[present(9, 3)]);

        // the September record does not belong to February
        assert_eq!(rows[0].days.len(), 28);
        assert!(rows[0].days.iter().all(Option::is_none));
        assert_eq!(rows[0].total_present, 0);
    }

    #[actix_web::test]
    async fn malformed_month_is_rejected() {
        use crate::auth::jwt::{TokenSubject, generate_access_token};
        use crate::config::Config;
        use crate::model::role::Role;
        use actix_web::{App, http::StatusCode, test};
        use sqlx::mysql::MySqlPoolOptions;

        let config = Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/hr".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap();
        // never connects; the month is checked first
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://localhost/hr")
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .route("/attendance/monthly", web::get().to(monthly_report)),
        )
        .await;

        let hr = TokenSubject {
            user_id: 2,
            username: "hr".into(),
            role: Role::Hr.id(),
            employee_id: None,
        };
        let token = generate_access_token(&hr, "test-secret", 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/attendance/monthly?month=2025-13")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

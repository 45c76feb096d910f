use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlPool};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{bad_request, db_error, is_duplicate, not_found};
use crate::auth::auth::AuthUser;
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::employee::EmployeeStatus;
use crate::payslip::calculator::STANDARD_DAY_HOURS;
use crate::payslip::duration::{format_duration, format_hours_minutes};
use crate::payslip::month::YearMonth;
use crate::utils::pagination::Pagination;

#[derive(Deserialize, ToSchema)]
pub struct LocationPayload {
    /// Resolved address shown to admins
    #[schema(example = "12 MG Road, Bengaluru")]
    pub location: String,
    #[schema(example = 12.9716)]
    pub latitude: Option<f64>,
    #[schema(example = 77.5946)]
    pub longitude: Option<f64>,
}

impl LocationPayload {
    fn validate(&self) -> Result<(), &'static str> {
        if self.location.trim().is_empty() {
            return Err("location is required");
        }
        match (self.latitude, self.longitude) {
            (None, None) => Ok(()),
            (Some(lat), Some(lng))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
            {
                Ok(())
            }
            _ => Err("latitude and longitude must both be given and within range"),
        }
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct MyAttendanceQuery {
    /// Month as YYYY-MM (defaults to the current month)
    #[schema(example = "2025-09")]
    pub month: Option<String>,
    /// Any day of the Monday-start week to show; wins over `month`
    #[schema(example = "2025-09-10", value_type = Option<String>, format = "date")]
    #[param(value_type = Option<String>)]
    pub week_of: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct CorrectionRequest {
    #[schema(example = "Forgot to check out, left at 18:00")]
    pub comment: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct DailyQuery {
    /// Day to show (defaults to today, never in the future)
    #[schema(example = "2025-09-10", value_type = Option<String>, format = "date")]
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    #[schema(example = "Developer")]
    pub designation: Option<String>,
    /// Matches name, email or staff id
    pub search: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 5)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct DailyAttendanceRow {
    pub employee_id: u64,
    pub staff_id: Option<String>,
    pub name: String,
    pub designation: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_at: Option<NaiveDateTime>,
    pub check_in_location: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_at: Option<NaiveDateTime>,
    pub check_out_location: Option<String>,
    pub duration: Option<String>,
    pub status: Option<String>,
    pub request_comment: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyAttendanceResponse {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub data: Vec<DailyAttendanceRow>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct ApproveAttendance {
    #[schema(example = 8)]
    pub hours: Option<u32>,
    #[schema(example = 30)]
    pub minutes: Option<u32>,
}

impl ApproveAttendance {
    fn validate(&self) -> Result<(), &'static str> {
        if self.hours.is_some_and(|h| h > 24) {
            return Err("hours must be between 0 and 24");
        }
        if self.minutes.is_some_and(|m| m >= 60) {
            return Err("minutes must be between 0 and 59");
        }
        if self.hours == Some(24) && self.minutes.is_some_and(|m| m > 0) {
            return Err("a day cannot exceed 24 hours");
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Monday..=Sunday week containing `day`.
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day - TimeDelta::days(i64::from(day.weekday().num_days_from_monday()));
    (start, start + TimeDelta::days(6))
}

/// Elapsed time between check-in and check-out; `None` when the clock went
/// backwards.
pub fn worked_time(check_in: NaiveDateTime, check_out: NaiveDateTime) -> Option<TimeDelta> {
    let elapsed = check_out - check_in;
    (elapsed >= TimeDelta::zero()).then_some(elapsed)
}

/// Duration stored when an admin marks a day present: the one they typed,
/// else whatever check-out recorded, else a full standard day.
pub fn approved_duration(request: &ApproveAttendance, existing: Option<String>) -> String {
    match (request.hours, request.minutes) {
        (None, None) => existing
            .unwrap_or_else(|| format_hours_minutes(STANDARD_DAY_HOURS as u32, 0)),
        (hours, minutes) => format_hours_minutes(hours.unwrap_or(0), minutes.unwrap_or(0)),
    }
}

async fn find_day(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE employee_id = ? AND date = ?")
        .bind(employee_id)
        .bind(date)
        .fetch_optional(pool)
        .await
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = LocationPayload,
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LocationPayload>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    if let Err(message) = payload.validate() {
        return Ok(bad_request(message));
    }

    let now = Local::now().naive_local();

    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (employee_id, date, check_in_at, check_in_location, check_in_latitude, check_in_longitude, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .bind(now)
    .bind(payload.location.trim())
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(AttendanceStatus::Unmarked.as_ref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(employee_id, "Checked in");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Checked in successfully"
            })))
        }

        Err(e) => {
            // Duplicate check-in for same day
            // one row per employee per day
            if is_duplicate(&e) {
                return Ok(bad_request("Already checked in today"));
            }

            Err(db_error(e, "Check-in failed"))
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    request_body = LocationPayload,
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "duration": "8 hours and 12 minutes"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LocationPayload>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    if let Err(message) = payload.validate() {
        return Ok(bad_request(message));
    }

    let now = Local::now().naive_local();

    let record = find_day(pool.get_ref(), employee_id, now.date())
        .await
        .map_err(|e| db_error(e, "Check-out lookup failed"))?;

    let (id, check_in_at) = match record {
        Some(Attendance {
            id,
            check_in_at: Some(check_in_at),
            check_out_at: None,
            ..
        }) => (id, check_in_at),
        Some(Attendance {
            check_out_at: Some(_),
            ..
        }) => {
            return Ok(bad_request("Already checked out today"));
        }
        _ => {
            return Ok(bad_request("No active check-in found for today"));
        }
    };

    let Some(elapsed) = worked_time(check_in_at, now) else {
        return Ok(bad_request("Check-out time cannot be earlier than check-in time"));
    };
    let duration = format_duration(elapsed);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out_at = ?, check_out_location = ?, check_out_latitude = ?,
            check_out_longitude = ?, duration = ?, status = ?
        WHERE id = ?
        AND check_out_at IS NULL
        "#,
    )
    .bind(now)
    .bind(payload.location.trim())
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(&duration)
    .bind(AttendanceStatus::Present.as_ref())
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Check-out failed"))?;

    if result.rows_affected() == 0 {
        return Ok(bad_request("Already checked out today"));
    }

    info!(employee_id, %duration, "Checked out");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Checked out successfully",
        "duration": duration
    })))
}

/// Own attendance for a month or a week, oldest first
#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(MyAttendanceQuery),
    responses(
        (status = 200, body = [Attendance]),
        (status = 400, description = "Invalid month")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyAttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let (from, to) = match (&query.week_of, &query.month) {
        (Some(day), _) => week_bounds(*day),
        (None, Some(month)) => match month.parse::<YearMonth>() {
            Ok(m) => (m.first_day(), m.last_day()),
            Err(e) => {
                return Ok(bad_request(e.to_string()));
            }
        },
        (None, None) => {
            let m = YearMonth::of(today());
            (m.first_day(), m.last_day())
        }
    };

    let records = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT *
        FROM attendance
        WHERE employee_id = ?
        AND date BETWEEN ? AND ?
        ORDER BY date
        "#,
    )
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to fetch own attendance"))?;

    Ok(HttpResponse::Ok().json(records))
}

/// Attach a correction request to one of the caller's own days
#[utoipa::path(
    post,
    path = "/api/attendance/me/{date}/request",
    params(("date" = String, Path, description = "Day of the record (YYYY-MM-DD)")),
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "Request saved"),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "No attendance recorded for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn request_correction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<NaiveDate>,
    payload: web::Json<CorrectionRequest>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let date = path.into_inner();

    let comment = payload.comment.trim();
    if comment.is_empty() {
        return Ok(bad_request("comment must not be empty"));
    }

    let result = sqlx::query(
        "UPDATE attendance SET request_comment = ? WHERE employee_id = ? AND date = ?",
    )
    .bind(comment)
    .bind(employee_id)
    .bind(date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to save correction request"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("No attendance recorded for that day"));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Your request has been submitted"
    })))
}

/// Every verified employee with their attendance for one day
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, body = DailyAttendanceResponse),
        (status = 400, description = "Date in the future"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn daily_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DailyQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = query.date.unwrap_or_else(today);
    if date > today() {
        return Ok(bad_request("date cannot be in the future"));
    }

    let paging = Pagination::new(query.page, query.per_page, 5);

    let mut where_sql = String::from(" WHERE e.status = ?");
    let mut args = vec![EmployeeStatus::Verified.to_string()];

    if let Some(designation) = query.designation.as_deref().filter(|d| !d.is_empty()) {
        where_sql.push_str(" AND e.designation = ?");
        args.push(designation.to_string());
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        where_sql.push_str(" AND (e.name LIKE ? OR e.email LIKE ? OR e.staff_id LIKE ?)");
        let pattern = format!("%{}%", search);
        for _ in 0..3 {
            args.push(pattern.clone());
        }
    }

    let count_sql = format!("SELECT COUNT(*) FROM employees e{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(arg.as_str());
    }

    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count employees"))?;

    let data_sql = format!(
        r#"
        SELECT e.id AS employee_id, e.staff_id, e.name, e.designation,
               a.check_in_at, a.check_in_location, a.check_out_at, a.check_out_location,
               a.duration, a.status, a.request_comment
        FROM employees e
        LEFT JOIN attendance a ON a.employee_id = e.id AND a.date = ?
        {}
        ORDER BY e.created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, DailyAttendanceRow>(&data_sql).bind(date);
    for arg in args {
        data_q = data_q.bind(arg);
    }

    let data = data_q
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch daily attendance"))?;

    Ok(HttpResponse::Ok().json(DailyAttendanceResponse {
        date,
        data,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

async fn employee_exists(pool: &MySqlPool, employee_id: u64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, u64>("SELECT id FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map(|row| row.is_some())
}

async fn review_day(
    pool: &MySqlPool,
    reviewer: u64,
    employee_id: u64,
    date: NaiveDate,
    status: AttendanceStatus,
    duration: Option<String>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, duration, status, reviewed_by)
        VALUES (?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            duration = VALUES(duration),
            status = VALUES(status),
            reviewed_by = VALUES(reviewed_by)
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(duration)
    .bind(status.as_ref())
    .bind(reviewer)
    .execute(pool)
    .await
    .map(|_| ())
}

fn reject_future(date: NaiveDate) -> Option<HttpResponse> {
    (date > today()).then(|| {
        bad_request("Cannot review a day in the future")
    })
}

/// Mark a day present (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/{employee_id}/{date}/approve",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Day to approve (YYYY-MM-DD)")
    ),
    request_body(content = Option<ApproveAttendance>, description = "Optional worked time override"),
    responses(
        (status = 200, description = "Attendance approved", body = Object, example = json!({
            "message": "Attendance approved",
            "duration": "9 hours and 0 minutes"
        })),
        (status = 400, description = "Day in the future or worked time out of range"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool, payload), fields(reviewer = auth.user_id))]
pub async fn approve_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, NaiveDate)>,
    payload: Option<web::Json<ApproveAttendance>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (employee_id, date) = path.into_inner();
    if let Some(resp) = reject_future(date) {
        return Ok(resp);
    }

    let request = payload.map(|p| p.into_inner()).unwrap_or_default();
    if let Err(message) = request.validate() {
        return Ok(bad_request(message));
    }

    if !employee_exists(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Employee lookup failed"))?
    {
        return Ok(not_found("Employee not found"));
    }

    let existing = find_day(pool.get_ref(), employee_id, date)
        .await
        .map_err(|e| db_error(e, "Attendance lookup failed"))?
        .and_then(|a| a.duration);

    let duration = approved_duration(&request, existing);

    review_day(
        pool.get_ref(),
        auth.user_id,
        employee_id,
        date,
        AttendanceStatus::Present,
        Some(duration.clone()),
    )
    .await
    .map_err(|e| db_error(e, "Approve attendance failed"))?;

    info!(employee_id, %date, %duration, "Attendance approved");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance approved",
        "duration": duration
    })))
}

/// Mark a day absent (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/{employee_id}/{date}/reject",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Day to reject (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Attendance rejected", body = Object, example = json!({
            "message": "Attendance rejected"
        })),
        (status = 400, description = "Day in the future or worked time out of range"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool), fields(reviewer = auth.user_id))]
pub async fn reject_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, NaiveDate)>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (employee_id, date) = path.into_inner();
    if let Some(resp) = reject_future(date) {
        return Ok(resp);
    }

    if !employee_exists(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Employee lookup failed"))?
    {
        return Ok(not_found("Employee not found"));
    }

    review_day(
        pool.get_ref(),
        auth.user_id,
        employee_id,
        date,
        AttendanceStatus::Absent,
        None,
    )
    .await
    .map_err(|e| db_error(e, "Reject attendance failed"))?;

    info!(employee_id, %date, "Attendance rejected");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance rejected"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2025-09-10 is a Wednesday
        assert_eq!(
            week_bounds(date(2025, 9, 10)),
            (date(2025, 9, 8), date(2025, 9, 14))
        );
        // Sunday belongs to the week that started six days earlier
        assert_eq!(
            week_bounds(date(2025, 9, 14)),
            (date(2025, 9, 8), date(2025, 9, 14))
        );
    }

    #[test]
    fn worked_time_refuses_negative_spans() {
        let check_in = date(2025, 9, 10).and_hms_opt(9, 0, 0).unwrap();
        let check_out = date(2025, 9, 10).and_hms_opt(17, 45, 0).unwrap();
        let elapsed = worked_time(check_in, check_out).unwrap();
        assert_eq!(format_duration(elapsed), "8 hours and 45 minutes");
        assert!(worked_time(check_out, check_in).is_none());
    }

    #[test]
    fn approval_duration_precedence() {
        let typed = ApproveAttendance {
            hours: Some(7),
            minutes: Some(15),
        };
        assert_eq!(
            approved_duration(&typed, Some("3 hours and 0 minutes".into())),
            "7 hours and 15 minutes"
        );

        let minutes_only = ApproveAttendance {
            hours: None,
            minutes: Some(30),
        };
        assert_eq!(approved_duration(&minutes_only, None), "0 hours and 30 minutes");

        let empty = ApproveAttendance::default();
        assert_eq!(
            approved_duration(&empty, Some("3 hours and 0 minutes".into())),
            "3 hours and 0 minutes"
        );
        assert_eq!(approved_duration(&empty, None), "9 hours and 0 minutes");
    }

    #[test]
    fn approval_rejects_out_of_range_time() {
        let huge = ApproveAttendance {
            hours: Some(100_000_000),
            minutes: Some(0),
        };
        assert!(huge.validate().is_err());

        let too_many_minutes = ApproveAttendance {
            hours: Some(8),
            minutes: Some(60),
        };
        assert!(too_many_minutes.validate().is_err());

        let past_midnight = ApproveAttendance {
            hours: Some(24),
            minutes: Some(1),
        };
        assert!(past_midnight.validate().is_err());

        let full_day = ApproveAttendance {
            hours: Some(24),
            minutes: None,
        };
        assert!(full_day.validate().is_ok());
        assert!(ApproveAttendance::default().validate().is_ok());
    }

    #[test]
    fn location_validation() {
        let ok = LocationPayload {
            location: "Office".into(),
            latitude: Some(12.9),
            longitude: Some(77.5),
        };
        assert!(ok.validate().is_ok());

        let half = LocationPayload {
            location: "Office".into(),
            latitude: Some(12.9),
            longitude: None,
        };
        assert!(half.validate().is_err());

        let blank = LocationPayload {
            location: "  ".into(),
            latitude: None,
            longitude: None,
        };
        assert!(blank.validate().is_err());

        let off_map = LocationPayload {
            location: "Office".into(),
            latitude: Some(120.0),
            longitude: Some(0.0),
        };
        assert!(off_map.validate().is_err());
    }
}

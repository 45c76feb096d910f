use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{bad_request, db_error, is_duplicate, not_found};
use crate::auth::auth::AuthUser;
use crate::model::holiday::{Holiday, sanitize_festival, weekday_name};
use crate::payslip::month::YearMonth;
use crate::utils::holiday_cache;
use crate::utils::pagination::Pagination;

#[derive(Deserialize, ToSchema)]
pub struct HolidayPayload {
    #[schema(example = "2025-10-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Gandhi Jayanti")]
    pub festival: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HolidayQuery {
    /// Case-insensitive match on the festival name
    #[schema(example = "diwali")]
    pub search: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct HolidayListResponse {
    pub data: Vec<Holiday>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 14)]
    pub total: i64,
}

fn festival_or_400(raw: &str) -> Result<String, HttpResponse> {
    sanitize_festival(raw).ok_or_else(|| bad_request("festival must contain letters"))
}

fn duplicate_date() -> HttpResponse {
    HttpResponse::Conflict().json(serde_json::json!({
        "message": "A holiday already exists on that date"
    }))
}

/// List holidays ordered by date
#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses((status = 200, body = HolidayListResponse)),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> actix_web::Result<impl Responder> {
    let paging = Pagination::new(query.page, query.per_page, 10);

    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));

    let where_sql = if pattern.is_some() {
        " WHERE LOWER(festival) LIKE ?"
    } else {
        ""
    };

    let count_sql = format!("SELECT COUNT(*) FROM holidays{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(p) = &pattern {
        count_q = count_q.bind(p.as_str());
    }
    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count holidays"))?;

    let data_sql = format!(
        "SELECT id, date, day, festival FROM holidays{} ORDER BY date LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, Holiday>(&data_sql);
    if let Some(p) = &pattern {
        data_q = data_q.bind(p.as_str());
    }
    let data = data_q
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch holidays"))?;

    Ok(HttpResponse::Ok().json(HolidayListResponse {
        data,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Add a holiday (Admin)
#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = HolidayPayload,
    responses(
        (status = 201, body = Holiday),
        (status = 400, description = "Festival name has no letters"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Date already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
#[instrument(skip(auth, pool, payload), fields(date = %payload.date))]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HolidayPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let festival = match festival_or_400(&payload.festival) {
        Ok(f) => f,
        Err(resp) => return Ok(resp),
    };
    let day = weekday_name(payload.date);

    let result = sqlx::query("INSERT INTO holidays (date, day, festival) VALUES (?, ?, ?)")
        .bind(payload.date)
        .bind(day)
        .bind(&festival)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(r) => {
            holiday_cache::invalidate(&[YearMonth::of(payload.date)]).await;
            info!(%festival, "Holiday created");
            Ok(HttpResponse::Created().json(Holiday {
                id: r.last_insert_id(),
                date: payload.date,
                day: day.to_string(),
                festival,
            }))
        }
        Err(e) if is_duplicate(&e) => Ok(duplicate_date()),
        Err(e) => Err(db_error(e, "Failed to create holiday")),
    }
}

async fn find_holiday(pool: &MySqlPool, id: u64) -> Result<Option<Holiday>, sqlx::Error> {
    sqlx::query_as::<_, Holiday>("SELECT id, date, day, festival FROM holidays WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Move or rename a holiday (Admin)
#[utoipa::path(
    put,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    request_body = HolidayPayload,
    responses(
        (status = 200, body = Holiday),
        (status = 400, description = "Festival name has no letters"),
        (status = 404, description = "Holiday not found"),
        (status = 409, description = "Date already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
#[instrument(skip(auth, pool, payload))]
pub async fn update_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<HolidayPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let holiday_id = path.into_inner();

    let festival = match festival_or_400(&payload.festival) {
        Ok(f) => f,
        Err(resp) => return Ok(resp),
    };

    let Some(existing) = find_holiday(pool.get_ref(), holiday_id)
        .await
        .map_err(|e| db_error(e, "Failed to fetch holiday"))?
    else {
        return Ok(not_found("Holiday not found"));
    };

    let day = weekday_name(payload.date);

    let result = sqlx::query("UPDATE holidays SET date = ?, day = ?, festival = ? WHERE id = ?")
        .bind(payload.date)
        .bind(day)
        .bind(&festival)
        .bind(holiday_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            holiday_cache::invalidate(&holiday_cache::affected_months(
                existing.date,
                payload.date,
            ))
            .await;
            info!(%festival, "Holiday updated");
            Ok(HttpResponse::Ok().json(Holiday {
                id: holiday_id,
                date: payload.date,
                day: day.to_string(),
                festival,
            }))
        }
        Err(e) if is_duplicate(&e) => Ok(duplicate_date()),
        Err(e) => Err(db_error(e, "Failed to update holiday")),
    }
}

/// Remove a holiday (Admin)
#[utoipa::path(
    delete,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 204, description = "Holiday deleted"),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let holiday_id = path.into_inner();

    let Some(existing) = find_holiday(pool.get_ref(), holiday_id)
        .await
        .map_err(|e| db_error(e, "Failed to fetch holiday"))?
    else {
        return Ok(not_found("Holiday not found"));
    };

    sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(holiday_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to delete holiday"))?;

    holiday_cache::invalidate(&[YearMonth::of(existing.date)]).await;
    info!(holiday_id, date = %existing.date, "Holiday deleted");

    Ok(HttpResponse::NoContent().finish())
}

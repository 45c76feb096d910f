pub mod attendance;
pub mod dashboard;
pub mod employee;
pub mod holiday;
pub mod payslip;
pub mod report;

use actix_web::HttpResponse;
use tracing::error;

/// Logs a storage failure and hides it behind a plain 500.
pub(crate) fn db_error(e: sqlx::Error, what: &'static str) -> actix_web::Error {
    error!(error = %e, "{}", what);
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

/// Unique key violation only. MySQL shares SQLSTATE 23000 between these,
/// foreign key failures and NOT NULL violations, so the error kind decides.
pub(crate) fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "message": message.into() }))
}

pub(crate) fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "message": message }))
}

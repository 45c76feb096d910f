use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::payslip::month::YearMonth;

/// Archived payslip, one per employee per month.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payslip {
    pub id: u64,
    pub employee_id: u64,
    #[sqlx(default)]
    pub staff_id: Option<String>,
    #[sqlx(default)]
    pub employee_name: Option<String>,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String, example = "2025-09")]
    pub month: YearMonth,
    #[schema(example = 9000.0)]
    pub amount: f64,
    #[schema(example = 20)]
    pub present_count: u32,
    #[schema(example = 216.0)]
    pub credited_hours: f64,
    #[schema(example = 7200.0)]
    pub amount_received: f64,
    #[schema(example = 1800.0)]
    pub deduction_amount: f64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

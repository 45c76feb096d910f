use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::payslip::calculator::AttendanceDay;
use crate::payslip::duration::WorkedDuration;

/// Daily attendance marker. A check-in leaves the day `unmarked` until the
/// matching check-out (or an admin decision) settles it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Unmarked,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "2025-09-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_at: Option<NaiveDateTime>,
    pub check_in_location: Option<String>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_at: Option<NaiveDateTime>,
    pub check_out_location: Option<String>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    #[schema(example = "8 hours and 30 minutes")]
    pub duration: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub request_comment: Option<String>,
}

impl From<&Attendance> for AttendanceDay {
    fn from(record: &Attendance) -> Self {
        AttendanceDay {
            date: record.date,
            status: record.status,
            worked_duration: record.duration.clone().map(WorkedDuration::Text),
        }
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Account state managed by admins. Only verified employees may sign in,
/// record attendance or receive payslips.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum EmployeeStatus {
    #[serde(rename = "Not Verified")]
    #[strum(serialize = "Not Verified")]
    NotVerified,
    Verified,
    Disabled,
}

impl TryFrom<String> for EmployeeStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Values accepted for the profile's `gender` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr,
)]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "staff_id": "EMPID0007",
        "name": "Asha Rao",
        "email": "asha.rao@company.com",
        "phone": "+919900112233",
        "designation": "Developer",
        "dob": "1996-04-12",
        "gender": "Female",
        "qualification": "B.Tech",
        "address": "12 MG Road, Bengaluru",
        "project": "Payroll revamp",
        "status": "Verified",
        "created_at": "2025-08-01T10:00:00"
    })
)]
pub struct Employee {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = "EMPID0007", nullable = true)]
    pub staff_id: Option<String>,

    #[schema(example = "Asha Rao")]
    pub name: String,

    #[schema(example = "asha.rao@company.com")]
    pub email: String,

    #[schema(example = "+919900112233", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Developer")]
    pub designation: String,

    #[schema(value_type = Option<String>, format = "date", example = "1996-04-12")]
    pub dob: Option<NaiveDate>,

    #[schema(example = "Female", nullable = true)]
    pub gender: Option<String>,

    #[schema(example = "B.Tech", nullable = true)]
    pub qualification: Option<String>,

    #[schema(example = "12 MG Road, Bengaluru", nullable = true)]
    pub address: Option<String>,

    #[schema(example = "Payroll revamp", nullable = true)]
    pub project: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: EmployeeStatus,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl Employee {
    pub fn staff_id_for(id: u64) -> String {
        format!("EMPID0{:03}", id)
    }
}

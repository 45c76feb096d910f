use sqlx::FromRow;

/// Login row joined with the linked employee's status.
#[derive(Debug, FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    pub employee_status: Option<String>,
}

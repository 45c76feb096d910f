use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::MySqlPool;

use super::calculator::AttendanceDay;
use super::month::YearMonth;
use crate::model::attendance::Attendance;
use crate::utils::holiday_cache;

/// Read access to everything the payslip calculation needs.
#[allow(async_fn_in_trait)]
pub trait AttendanceSource {
    async fn fetch_attendance(&self, employee_id: u64, month: YearMonth)
    -> Result<Vec<AttendanceDay>>;

    async fn fetch_holidays(&self, month: YearMonth) -> Result<Vec<NaiveDate>>;
}

pub struct MySqlAttendanceSource<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MySqlAttendanceSource<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }
}

impl AttendanceSource for MySqlAttendanceSource<'_> {
    async fn fetch_attendance(
        &self,
        employee_id: u64,
        month: YearMonth,
    ) -> Result<Vec<AttendanceDay>> {
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
        .bind(month.first_day())
        .bind(month.last_day())
        .fetch_all(self.pool)
        .await
        .with_context(|| format!("loading attendance of employee {employee_id} for {month}"))?;

        Ok(records.iter().map(AttendanceDay::from).collect())
    }

    async fn fetch_holidays(&self, month: YearMonth) -> Result<Vec<NaiveDate>> {
        let dates = holiday_cache::holidays_in(self.pool, month).await?;
        Ok(dates.as_ref().clone())
    }
}

/// Fixed data set for exercising the assembly logic without a database.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryAttendanceSource {
    pub attendance: std::collections::HashMap<u64, Vec<AttendanceDay>>,
    pub holidays: Vec<NaiveDate>,
}

#[cfg(test)]
impl AttendanceSource for InMemoryAttendanceSource {
    async fn fetch_attendance(
        &self,
        employee_id: u64,
        _month: YearMonth,
    ) -> Result<Vec<AttendanceDay>> {
        Ok(self
            .attendance
            .get(&employee_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_holidays(&self, _month: YearMonth) -> Result<Vec<NaiveDate>> {
        Ok(self.holidays.clone())
    }
}

use derive_more::Display;
use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::calculator::{self, AttendanceDay, PayslipInput, PayslipResult};
use super::month::YearMonth;
use super::source::AttendanceSource;
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Display)]
pub enum PayslipError {
    #[display(
        fmt = "amount must be a positive number no larger than {}",
        calculator::MAX_BASE_AMOUNT
    )]
    InvalidAmount,
    #[display(fmt = "failed to load payslip inputs: {}", _0)]
    Source(anyhow::Error),
}

impl std::error::Error for PayslipError {}

/// A calculated but not yet archived payslip.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayslipPreview {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(value_type = String, example = "2025-09")]
    pub month: YearMonth,
    #[schema(example = 9000.0)]
    pub amount: f64,
    #[schema(example = 20)]
    pub present_count: u32,
    #[serde(flatten)]
    pub result: PayslipResult,
}

/// Gathers one employee's month from `source` and runs the calculator.
///
/// Records dated outside `month` are dropped here, before the calculator
/// sees them.
#[instrument(skip(source, month), fields(month = %month))]
pub async fn prepare_payslip<S: AttendanceSource>(
    source: &S,
    employee_id: u64,
    month: YearMonth,
    amount: f64,
) -> Result<PayslipPreview, PayslipError> {
    if !amount.is_finite() || amount <= 0.0 || amount > calculator::MAX_BASE_AMOUNT {
        return Err(PayslipError::InvalidAmount);
    }

    let attendance_days: Vec<AttendanceDay> = source
        .fetch_attendance(employee_id, month)
        .await
        .map_err(PayslipError::Source)?
        .into_iter()
        .filter(|day| month.contains(day.date))
        .collect();

    let holiday_dates = source
        .fetch_holidays(month)
        .await
        .map_err(PayslipError::Source)?;

    let present_count = attendance_days
        .iter()
        .filter(|day| day.status == AttendanceStatus::Present)
        .count() as u32;

    let input = PayslipInput {
        base_amount: Some(amount),
        period_month: month,
        attendance_days,
        holiday_dates,
    };
    let result = calculator::calculate(&input);

    debug!(
        present_count,
        credited_hours = result.breakdown.total_credited_hours,
        amount_received = result.amount_received,
        "Payslip calculated"
    );

    Ok(PayslipPreview {
        employee_id,
        month,
        amount,
        present_count,
        result,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::payslip::source::InMemoryAttendanceSource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn source() -> InMemoryAttendanceSource {
        let mut source = InMemoryAttendanceSource::default();
        source.attendance.insert(
            7,
            vec![
                AttendanceDay::present(date(2025, 9, 1), "9 hours and 0 minutes"),
                AttendanceDay::present(date(2025, 9, 2), "10 hours and 15 minutes"),
                AttendanceDay::present(date(2025, 9, 3), "4 hours and 30 minutes"),
                AttendanceDay {
                    date: date(2025, 9, 4),
                    status: AttendanceStatus::Absent,
                    worked_duration: None,
                },
                // stray record from the previous month
                AttendanceDay::present(date(2025, 8, 29), "9 hours and 0 minutes"),
            ],
        );
        source.holidays = vec![date(2025, 9, 5)];
        source
    }

    #[actix_web::test]
    async fn assembles_month_from_source() {
        let month = YearMonth::new(2025, 9).unwrap();
        let preview = prepare_payslip(&source(), 7, month, 9000.0).await.unwrap();

        assert_eq!(preview.present_count, 3);
        let breakdown = &preview.result.breakdown;
        assert_eq!(breakdown.worked_hours, 22.5);
        assert_eq!(breakdown.sunday_hours, 36.0);
        assert_eq!(breakdown.holiday_hours, 9.0);
        // 67.5 hours at 9000 / 30 / 9 per hour
        assert_eq!(preview.result.amount_received, 2250.0);
        assert_eq!(preview.result.deduction_amount, 6750.0);
    }

    #[actix_web::test]
    async fn unknown_employee_still_gets_rest_day_credit() {
        let month = YearMonth::new(2026, 2).unwrap();
        let preview = prepare_payslip(&InMemoryAttendanceSource::default(), 99, month, 2800.0)
            .await
            .unwrap();
        assert_eq!(preview.present_count, 0);
        assert_eq!(preview.result.breakdown.total_credited_hours, 36.0);
    }

    #[actix_web::test]
    async fn rejects_non_positive_amounts() {
        let month = YearMonth::new(2025, 9).unwrap();
        for amount in [0.0, -10.0, f64::INFINITY, 1e307] {
            let err = prepare_payslip(&source(), 7, month, amount).await.unwrap_err();
            assert!(matches!(err, PayslipError::InvalidAmount));
        }
    }

    #[actix_web::test]
    async fn same_inputs_same_preview() {
        let month = YearMonth::new(2025, 9).unwrap();
        let first = prepare_payslip(&source(), 7, month, 1234.5).await.unwrap();
        let second = prepare_payslip(&source(), 7, month, 1234.5).await.unwrap();
        assert_eq!(first.result, second.result);
    }
}

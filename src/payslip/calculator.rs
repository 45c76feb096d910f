use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::duration::WorkedDuration;
use super::month::YearMonth;
use crate::model::attendance::AttendanceStatus;

/// Hours credited for a full day, and the cap on hours credited for any
/// single attendance record.
pub const STANDARD_DAY_HOURS: f64 = 9.0;

/// Largest monthly base amount the endpoints accept.
pub const MAX_BASE_AMOUNT: f64 = 1e12;

/// One day of an employee's attendance as the calculator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceDay {
    #[schema(example = "2025-09-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    #[schema(value_type = Option<Object>, example = "8 hours and 30 minutes")]
    pub worked_duration: Option<WorkedDuration>,
}

impl AttendanceDay {
    #[cfg(test)]
    pub fn present(date: NaiveDate, worked: impl Into<WorkedDuration>) -> Self {
        Self {
            date,
            status: AttendanceStatus::Present,
            worked_duration: Some(worked.into()),
        }
    }

    /// Hours this record earns on its own, capped at a standard day.
    pub fn credited_hours(&self) -> f64 {
        if self.status != AttendanceStatus::Present {
            return 0.0;
        }
        self.worked_duration
            .as_ref()
            .map(|d| d.hours().min(STANDARD_DAY_HOURS))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayslipInput {
    #[schema(example = 9000.0)]
    pub base_amount: Option<f64>,
    #[schema(example = "2025-09", value_type = String)]
    pub period_month: YearMonth,
    #[serde(default)]
    pub attendance_days: Vec<AttendanceDay>,
    #[serde(default)]
    #[schema(value_type = Vec<String>, example = json!(["2025-09-05"]))]
    pub holiday_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayslipResult {
    #[schema(example = 7200.0)]
    pub amount_received: f64,
    #[schema(example = 1800.0)]
    pub deduction_amount: f64,
    pub breakdown: CreditBreakdown,
}

/// Where the credited hours came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreditBreakdown {
    pub days_in_month: u32,
    pub worked_hours: f64,
    pub sunday_hours: f64,
    pub holiday_hours: f64,
    pub total_credited_hours: f64,
    pub hourly_rate: f64,
}

impl PayslipResult {
    fn zero(days_in_month: u32) -> Self {
        Self {
            amount_received: 0.0,
            deduction_amount: 0.0,
            breakdown: CreditBreakdown {
                days_in_month,
                ..Default::default()
            },
        }
    }
}

/// Pro-rates `base_amount` over the month by credited hours.
///
/// Present days earn their worked hours (capped at nine). Every Sunday and
/// every holiday inside the month earns a flat nine hours on top of whatever
/// was worked that day. The calculator trusts its caller to have restricted
/// `attendance_days` to the month.
pub fn calculate(input: &PayslipInput) -> PayslipResult {
    let days_in_month = input.period_month.days_in_month();

    let base_amount = match input.base_amount {
        Some(amount) if amount.is_finite() && amount > 0.0 => amount,
        _ => return PayslipResult::zero(days_in_month),
    };

    let worked_hours: f64 = input
        .attendance_days
        .iter()
        .map(AttendanceDay::credited_hours)
        .sum();

    let sunday_hours = input.period_month.sundays().count() as f64 * STANDARD_DAY_HOURS;

    let holidays: BTreeSet<NaiveDate> = input
        .holiday_dates
        .iter()
        .copied()
        .filter(|d| input.period_month.contains(*d))
        .collect();
    let holiday_hours = holidays.len() as f64 * STANDARD_DAY_HOURS;

    let total_credited_hours = worked_hours + sunday_hours + holiday_hours;

    let per_day_amount = base_amount / f64::from(days_in_month);
    let hourly_rate = per_day_amount / STANDARD_DAY_HOURS;

    let amount_received = round2(hourly_rate * total_credited_hours);
    let deduction_amount = round2(base_amount - amount_received);

    PayslipResult {
        amount_received,
        deduction_amount,
        breakdown: CreditBreakdown {
            days_in_month,
            worked_hours,
            sunday_hours,
            holiday_hours,
            total_credited_hours,
            hourly_rate,
        },
    }
}

/// Rounds half away from zero to cents. Magnitudes too large to scale have
/// no cents to round and come back unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(amount: f64, month: &str, days: Vec<AttendanceDay>) -> PayslipInput {
        PayslipInput {
            base_amount: Some(amount),
            period_month: month.parse().unwrap(),
            attendance_days: days,
            holiday_dates: vec![],
        }
    }

    /// Twenty nine-hour weekdays of September 2025 (four Sundays).
    fn september_weekdays() -> Vec<AttendanceDay> {
        YearMonth::new(2025, 9)
            .unwrap()
            .days()
            .filter(|d| chrono::Datelike::weekday(d) != chrono::Weekday::Sun)
            .take(20)
            .map(|d| AttendanceDay::present(d, 9.0))
            .collect()
    }

    #[test]
    fn full_scenario() {
        let result = calculate(&input(9000.0, "2025-09", september_weekdays()));
        assert_eq!(result.breakdown.total_credited_hours, 216.0);
        assert_eq!(result.amount_received, 7200.0);
        assert_eq!(result.deduction_amount, 1800.0);
    }

    #[test]
    fn caps_worked_hours_per_day() {
        let days = vec![AttendanceDay::present(date(2025, 9, 2), 14.0)];
        let result = calculate(&input(9000.0, "2025-09", days));
        assert_eq!(result.breakdown.worked_hours, 9.0);
    }

    #[test]
    fn sundays_are_credited_without_attendance() {
        let result = calculate(&input(2800.0, "2026-02", vec![]));
        assert_eq!(result.breakdown.sunday_hours, 36.0);
        assert_eq!(result.breakdown.total_credited_hours, 36.0);
        // 2800 / 28 / 9 * 36 = 400
        assert_eq!(result.amount_received, 400.0);
        assert_eq!(result.deduction_amount, 2400.0);
    }

    #[test]
    fn huge_amounts_stay_finite_and_balanced() {
        let base = 1e307;
        let r = calculate(&input(base, "2025-09", vec![]));
        assert!(r.amount_received.is_finite());
        assert!(r.deduction_amount.is_finite());
        assert!((r.amount_received + r.deduction_amount - base).abs() <= base * 1e-12);

        assert_eq!(round2(f64::MAX), f64::MAX);
        assert_eq!(round2(-2.5), -2.5);
    }

    #[test]
    fn zero_or_missing_amount_yields_zero() {
        let days = september_weekdays();
        let zero = calculate(&input(0.0, "2025-09", days.clone()));
        assert_eq!((zero.amount_received, zero.deduction_amount), (0.0, 0.0));

        let mut missing = input(1.0, "2025-09", days);
        missing.base_amount = None;
        let missing = calculate(&missing);
        assert_eq!((missing.amount_received, missing.deduction_amount), (0.0, 0.0));
    }

    #[test]
    fn malformed_duration_contributes_nothing() {
        let days = vec![
            AttendanceDay::present(date(2025, 9, 1), "8 hours and 0 minutes"),
            AttendanceDay::present(date(2025, 9, 2), "eight hours"),
        ];
        let result = calculate(&input(9000.0, "2025-09", days));
        assert_eq!(result.breakdown.worked_hours, 8.0);
    }

    #[test]
    fn only_present_days_count() {
        let days = vec![
            AttendanceDay {
                date: date(2025, 9, 1),
                status: AttendanceStatus::Absent,
                worked_duration: Some(WorkedDuration::Hours(9.0)),
            },
            AttendanceDay {
                date: date(2025, 9, 2),
                status: AttendanceStatus::Unmarked,
                worked_duration: None,
            },
            AttendanceDay {
                date: date(2025, 9, 3),
                status: AttendanceStatus::Present,
                worked_duration: None,
            },
        ];
        let result = calculate(&input(9000.0, "2025-09", days));
        assert_eq!(result.breakdown.worked_hours, 0.0);
    }

    #[test]
    fn holidays_stack_and_respect_the_month() {
        let mut payload = input(
            9000.0,
            "2025-09",
            vec![AttendanceDay::present(date(2025, 9, 7), 4.0)],
        );
        payload.holiday_dates = vec![
            date(2025, 9, 7),  // also a Sunday
            date(2025, 9, 15),
            date(2025, 9, 15), // duplicate
            date(2025, 10, 2), // next month
        ];
        let result = calculate(&payload);
        assert_eq!(result.breakdown.holiday_hours, 18.0);
        assert_eq!(result.breakdown.sunday_hours, 36.0);
        assert_eq!(result.breakdown.worked_hours, 4.0);
        assert_eq!(result.breakdown.total_credited_hours, 58.0);
    }

    #[test]
    fn is_deterministic() {
        let payload = input(12345.67, "2024-02", september_weekdays());
        assert_eq!(calculate(&payload), calculate(&payload));
    }

    #[test]
    fn received_plus_deduction_conserves_base() {
        for (amount, worked) in [(12345.67, 3.3), (999.99, 7.77), (50000.0, 8.9), (1.0, 0.5)] {
            for month in ["2024-02", "2025-04", "2025-12"] {
                let ym: YearMonth = month.parse().unwrap();
                let days = ym.days().map(|d| AttendanceDay::present(d, worked)).collect();
                let result = calculate(&input(amount, month, days));
                let total = result.amount_received + result.deduction_amount;
                assert!(
                    (total - amount).abs() <= 0.01,
                    "{amount} in {month}: {total}"
                );
            }
        }
    }
}

use crate::api::attendance::{
    ApproveAttendance, CorrectionRequest, DailyAttendanceResponse, DailyAttendanceRow, DailyQuery,
    LocationPayload, MyAttendanceQuery,
};
use crate::api::dashboard::DashboardCounts;
use crate::api::employee::{EmployeeListResponse, EmployeeQuery, StatusPayload, UpdateEmployee};
use crate::api::holiday::{HolidayListResponse, HolidayPayload, HolidayQuery};
use crate::api::payslip::{PayslipListResponse, PayslipQuery, PayslipRequest};
use crate::api::report::{MonthlyQuery, MonthlyReport, MonthlyRow};
use crate::auth::handlers::LoginResponse;
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::employee::{Employee, EmployeeStatus, Gender};
use crate::model::holiday::Holiday;
use crate::model::payslip::Payslip;
use crate::models::{LoginReqDto, RegisterReq};
use crate::payslip::calculator::{AttendanceDay, CreditBreakdown, PayslipInput, PayslipResult};
use crate::payslip::service::PayslipPreview;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Operations API",
        version = "1.0.0",
        description = r#"
## HR Operations

Attendance, holidays and pro-rated payslips for a small organisation.

### Key Features
- **Attendance**
  - Geotagged check-in and check-out, weekly and monthly history
  - Daily overview with admin approve/reject and correction requests
  - Monthly present-day report
- **Holidays**
  - Company holiday calendar
- **Payslips**
  - Monthly base amount pro-rated by credited hours
  - Worked hours capped at 9 per day; every Sunday and holiday credits 9 hours
- **Employees**
  - Self registration, admin verification, profile management

### Security
All `/api` endpoints require a **JWT Bearer** access token.
Roles are **Admin**, **HR** and **Employee**.

### Response Format
- JSON bodies; errors carry a `message`
- Pagination (`page`, `per_page`) on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,
        crate::api::attendance::request_correction,
        crate::api::attendance::daily_attendance,
        crate::api::attendance::approve_attendance,
        crate::api::attendance::reject_attendance,
        crate::api::report::monthly_report,

        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::get_my_profile,
        crate::api::employee::update_employee,
        crate::api::employee::update_my_profile,
        crate::api::employee::set_employee_status,

        crate::api::holiday::list_holidays,
        crate::api::holiday::create_holiday,
        crate::api::holiday::update_holiday,
        crate::api::holiday::delete_holiday,

        crate::api::payslip::calculate_payslip,
        crate::api::payslip::preview_payslip,
        crate::api::payslip::generate_payslip,
        crate::api::payslip::list_payslips,
        crate::api::payslip::my_payslips,
        crate::api::payslip::get_payslip,

        crate::api::dashboard::dashboard
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            Attendance,
            AttendanceStatus,
            LocationPayload,
            MyAttendanceQuery,
            CorrectionRequest,
            DailyQuery,
            DailyAttendanceRow,
            DailyAttendanceResponse,
            ApproveAttendance,
            MonthlyQuery,
            MonthlyRow,
            MonthlyReport,
            Employee,
            EmployeeStatus,
            Gender,
            EmployeeQuery,
            EmployeeListResponse,
            UpdateEmployee,
            StatusPayload,
            Holiday,
            HolidayPayload,
            HolidayQuery,
            HolidayListResponse,
            AttendanceDay,
            PayslipInput,
            PayslipResult,
            CreditBreakdown,
            PayslipRequest,
            PayslipPreview,
            Payslip,
            PayslipQuery,
            PayslipListResponse,
            DashboardCounts
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Holiday", description = "Holiday calendar APIs"),
        (name = "Payslip", description = "Payslip calculation and archive APIs"),
        (name = "Dashboard", description = "Admin overview"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_area_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/api/attendance/check-in",
            "/api/attendance/monthly",
            "/api/holidays/{holiday_id}",
            "/api/payslips/calculate",
            "/api/dashboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

pub mod attendance;
pub mod employee;
pub mod holiday;
pub mod payslip;
pub mod role;
pub mod user;

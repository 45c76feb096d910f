pub mod calculator;
pub mod duration;
pub mod month;
pub mod service;
pub mod source;

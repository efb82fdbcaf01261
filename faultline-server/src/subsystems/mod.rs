pub mod capture;
pub mod retention;
pub mod throttle;

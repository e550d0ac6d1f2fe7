pub mod capture;
pub mod configuration;
pub mod error_handling;

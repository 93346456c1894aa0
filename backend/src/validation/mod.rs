//! Input validation for auth request payloads.

pub mod rules;

pub use validator::Validate;

pub mod advisory_service;
pub mod prompt;

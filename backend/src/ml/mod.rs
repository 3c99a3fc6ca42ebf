pub mod ml_service;

//! Helpers for tests that run against a real SQLite database and a scripted payment gateway.
pub mod fake_gateway;
pub mod prepare_env;
pub mod seed;

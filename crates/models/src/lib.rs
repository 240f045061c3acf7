//! Relational entities backing the sqlite storage driver.

pub mod errors;
pub mod db;
pub mod channel_config;

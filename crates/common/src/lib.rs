//! Shared runtime helpers: logging bootstrap and filesystem preparation
//! used by the storage drivers and the operator binary.

pub mod env;
pub mod utils;

//! Route handlers for the REST API.

pub mod branches;
pub mod health;
pub mod operations;

//! HTTP inbound adapter exposing REST endpoints.

pub mod accounts;
pub mod error;
pub mod health;
pub mod posts;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod users;

pub use error::ApiResult;

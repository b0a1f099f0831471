//! Outbound adapters (driven side).

pub mod host;
pub mod http;
pub mod openssl;
pub mod sqlite;

//! Fleet reservation engine: vehicles, bookings and the policy around them,
//! persisted through an append-only WAL and served over a REST API.

pub mod access;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod http;
pub mod labels;
pub mod limits;
pub mod model;
pub mod observability;
pub mod reports;
pub mod wal;

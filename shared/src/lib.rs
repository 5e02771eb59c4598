//! Plumbing shared by the sportswire crates: the hyper accept loop, the
//! health/readiness service and metric definition helpers.

pub mod admin_service;
pub mod http;
pub mod metrics_defs;

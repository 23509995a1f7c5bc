//! Leave management service for the HRM system: leave requests, approvals,
//! per-year balances and reporting, scoped per organization.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;
pub mod utils;

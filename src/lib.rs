//! CivicLink - role-based client for the civic issue tracking API
//!
//! Citizens report and edit their own issues, dispatchers triage every
//! issue, administrators see statistics and manage user roles. This library
//! crate holds the client core and exposes it for integration testing.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod session;
pub mod util;
pub mod views;

//! Data models for the staff vote application.
//!
//! Field names match the roster spreadsheet columns and the web client's JSON.

mod admin;
mod employee;
mod vote;

pub use admin::*;
pub use employee::*;
pub use vote::*;

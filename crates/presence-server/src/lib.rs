//! # presence-server
//!
//! Host process for the presence engine: radio tasks, periodic maintenance
//! and a read-only HTTP API.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod maintenance;
pub mod state;

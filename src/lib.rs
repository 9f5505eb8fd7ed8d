//! parley - a command-line client for a streaming chat backend
//!
//! This library exposes modules for use in integration tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod cookie;
pub mod error;
pub mod models;
pub mod session;
pub mod sse;
pub mod state;
pub mod storage;

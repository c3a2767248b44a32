//! `docqa-server` exposes the docqa query service over HTTP and ships the
//! `docqa-index` binary that builds the index it serves.

pub mod cli;
pub mod server;
pub mod telemetry;

pub use server::{AppState, ServerConfig, app_router, bind, run_server, serve};

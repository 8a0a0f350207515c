// KexNet: HTTP transport, configuration and process setup for KexTrust
//
// Crate root: module declarations and public re-exports.

pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod server;
pub mod telemetry;

pub use client::{Directory, HttpExchange};
pub use error::{NetError, Result};
pub use server::{agent_router, authority_router, serve};

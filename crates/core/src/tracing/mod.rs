//! Logging setup shared by hearth binaries and test harnesses

pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod init;

pub use config::{InstrumentationConfig, LogFormat};
#[cfg(not(target_arch = "wasm32"))]
pub use init::{init_default, init_dev, init_tracing};

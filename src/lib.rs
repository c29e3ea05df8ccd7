pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod init;
pub mod mcp;
pub mod services;

pub use error::BridgeError;

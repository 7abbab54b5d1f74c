//! Infrastructure layer - HTTP transport, operation store, logging and services

pub mod http;
pub mod logging;
pub mod operation;
pub mod services;

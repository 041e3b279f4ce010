//! # API gRPC
//!
//! gRPC server implementation for MedCheck.
//!
//! Handles:
//! - gRPC service setup and authentication
//! - Service implementations using `medcheck-core` for audit operations
//! - gRPC-specific concerns (interceptors, tonic integration)
//!
//! Uses `api-shared` for common types and utilities.

#![warn(rust_2018_idioms)]

pub use service::{pb, AuthInterceptor, MedCheckService};

pub mod service;

//! Oracle Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Standard service trait the bot process implements
//! - Common domain types (UserId, RequestContext)
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::{RequestContext, UserId};
pub use error::{OracleError, Result};
pub use service::{DependencyStatus, HealthStatus, MicroserviceRuntime, OracleService, ReadinessStatus};

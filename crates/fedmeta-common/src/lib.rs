//! fedmeta Common - Shared types and utilities
//!
//! This crate provides the entity model, error definitions, configuration,
//! the store-agnostic expression tree and the error sink used across all
//! fedmeta components.

pub mod config;
pub mod error;
pub mod expr;
pub mod sink;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use expr::{Collection, CompareOp, EntityField, EntityFields, Expr, FieldRef};
pub use sink::{CollectingErrorSink, ErrorReport, ErrorSink, TracingErrorSink};
pub use types::*;

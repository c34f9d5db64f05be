//! fedmeta Registry - remote policy and service registry integration
//!
//! This crate provides:
//! - [`RegistryClient`]: transport to a remote service registry
//! - [`PolicyAdapter`]: access-control and workflow narrowing of entity
//!   collections, with per-record failure isolation for listings
//! - [`FixedPolicyAdapter`]: fixed allow/deny decision when no registry
//!   is configured

pub mod adapter;
pub mod arp;
pub mod client;
pub mod error;
pub mod fixed;
pub mod keyvalue;

pub use adapter::{PolicyAdapter, RegistryPolicyAdapter, build_policy_adapter};
pub use arp::AttributeReleasePolicy;
pub use client::{RegistryClient, RemoteListing, RestRegistryClient};
pub use error::{RegistryError, RegistryResult};
pub use fixed::FixedPolicyAdapter;
pub use keyvalue::KeyValueMapper;

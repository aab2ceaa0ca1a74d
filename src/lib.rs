//! ostack - resource and proxy SDK for OpenStack-style clouds
//!
//! Resources are serde types describing a REST entity; proxies expose
//! typed CRUD calls per service; a [`Connection`] bundles them.
//!
//! # Module Structure
//!
//! - [`cloud`] - HTTP transport, authentication and sessions
//! - [`resource`] - Generic resource machinery (fields, verbs, paging, waits)
//! - [`proxy`] - Generic service proxy
//! - [`services`] - Compute, network, block storage, identity, image and object store
//! - [`connection`] - Top-level facade
//! - [`config`] - `clouds.yaml` and environment loading

pub mod cloud;
pub mod config;
pub mod connection;
pub mod error;
pub mod proxy;
pub mod resource;
pub mod services;

pub use connection::Connection;
pub use error::{Error, Result};

//! Cloud API plumbing
//!
//! This module provides the transport layer shared by every service:
//! authentication, the HTTP client, and the endpoint-aware session.
//!
//! # Module Structure
//!
//! - [`auth`] - Token sources and token caching
//! - [`http`] - HTTP utilities for REST API calls
//! - [`session`] - Session combining credentials, HTTP and endpoints
//!
//! # Example
//!
//! ```no_run
//! use ostack::cloud::session::{ServiceType, Session};
//! use reqwest::Method;
//!
//! async fn example() -> ostack::Result<()> {
//!     let session = Session::builder()
//!         .endpoint(ServiceType::Compute, "https://compute.example.com/v2.1")
//!         .token("gAAAA...")
//!         .build()?;
//!     let response = session
//!         .request(ServiceType::Compute, Method::GET, "/servers", Default::default())
//!         .await?;
//!     println!("{}", response.json()?);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod http;
pub mod session;

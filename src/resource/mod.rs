//! Resource abstraction layer
//!
//! Every REST entity is a plain serde struct implementing [`Resource`]. The
//! trait's associated constants describe where the entity lives and how it
//! travels over the wire; the generic functions in this module do the rest.
//!
//! # Architecture
//!
//! - [`field`] - Header, URI and query parameter descriptors
//! - [`base`] - The `Resource` trait and the CRUD verbs built on it
//! - [`pager`] - Pagination over collection endpoints
//! - [`wait`] - Status polling
//!
//! # Example
//!
//! ```no_run
//! use ostack::cloud::session::Session;
//! use ostack::resource::{self, Query, UriParams};
//! use ostack::services::compute::Server;
//!
//! async fn list_active(session: &Session) -> ostack::Result<Vec<Server>> {
//!     let query = Query::new().filter("status", "ACTIVE");
//!     resource::list::<Server>(session, &query, &UriParams::new()).await
//! }
//! ```

pub mod base;
pub mod field;
pub mod pager;
pub mod wait;

pub use base::{
    commit, create, delete, fetch, find, get_one_match, head, refresh, uri_params_of,
    Capabilities, CommitMethod, CreateMethod, Resource,
};
pub use field::{Coercion, HeaderField, Query, QueryParameters, UriParams};
pub use pager::{list, Pager};
pub use wait::{wait_for_attribute, wait_for_delete, wait_for_status, DEFAULT_INTERVAL, DEFAULT_WAIT};

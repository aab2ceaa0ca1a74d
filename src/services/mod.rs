//! Per-service resources and proxies
//!
//! | Module | Resources |
//! |---|---|
//! | [`compute`] | `Server`, `Flavor`, `ServerInterface` |
//! | [`network`] | `Network`, `Subnet`, `Port` |
//! | [`block_storage`] | `Volume`, `Snapshot` |
//! | [`identity`] | `Project`, `User` |
//! | [`image`] | `Image` |
//! | [`object_store`] | `Container`, `Object` |

pub mod block_storage;
pub mod compute;
pub mod identity;
pub mod image;
pub mod network;
pub mod object_store;

pub use block_storage::BlockStorageProxy;
pub use compute::ComputeProxy;
pub use identity::IdentityProxy;
pub use image::ImageProxy;
pub use network::NetworkProxy;
pub use object_store::ObjectStoreProxy;

//! Connection
//!
//! Entry point of the SDK: one session, one proxy per service.

use crate::cloud::session::Session;
use crate::config::CloudConfig;
use crate::error::Result;
use crate::services::{
    BlockStorageProxy, ComputeProxy, IdentityProxy, ImageProxy, NetworkProxy, ObjectStoreProxy,
};

/// Handle on a cloud
///
/// ```no_run
/// # async fn example() -> ostack::Result<()> {
/// let conn = ostack::Connection::from_config(Some("devstack"))?;
/// for server in conn.compute().servers(&Default::default()).await? {
///     println!("{:?} {:?}", server.name, server.status);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Connection {
    session: Session,
    compute: ComputeProxy,
    network: NetworkProxy,
    block_storage: BlockStorageProxy,
    identity: IdentityProxy,
    image: ImageProxy,
    object_store: ObjectStoreProxy,
}

impl Connection {
    pub fn new(session: Session) -> Self {
        Self {
            compute: ComputeProxy::new(session.clone()),
            network: NetworkProxy::new(session.clone()),
            block_storage: BlockStorageProxy::new(session.clone()),
            identity: IdentityProxy::new(session.clone()),
            image: ImageProxy::new(session.clone()),
            object_store: ObjectStoreProxy::new(session.clone()),
            session,
        }
    }

    /// Connect using `clouds.yaml` and the environment
    pub fn from_config(cloud: Option<&str>) -> Result<Self> {
        let config = CloudConfig::load(cloud)?;
        tracing::info!(
            "Connecting to cloud {} in region {}",
            config.name.as_deref().unwrap_or("(environment)"),
            config.region_name.as_deref().unwrap_or("(default)")
        );
        Ok(Self::new(config.session()?))
    }

    /// Connect using `OS_*` environment variables only
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(CloudConfig::from_env()?.session()?))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn compute(&self) -> &ComputeProxy {
        &self.compute
    }

    pub fn network(&self) -> &NetworkProxy {
        &self.network
    }

    pub fn block_storage(&self) -> &BlockStorageProxy {
        &self.block_storage
    }

    pub fn identity(&self) -> &IdentityProxy {
        &self.identity
    }

    pub fn image(&self) -> &ImageProxy {
        &self.image
    }

    pub fn object_store(&self) -> &ObjectStoreProxy {
        &self.object_store
    }
}

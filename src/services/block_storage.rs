//! Block storage service: volumes and snapshots

use crate::cloud::session::{ServiceType, Session};
use crate::error::Result;
use crate::proxy::Proxy;
use crate::resource::{Query, QueryParameters, Resource, UriParams, DEFAULT_INTERVAL, DEFAULT_WAIT};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;

const VOLUME_FAILURES: &[&str] = &["error", "error_extending", "error_restoring"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Volume {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    /// Size in GiB
    pub size: Option<u64>,
    pub volume_type: Option<String>,
    pub availability_zone: Option<String>,
    /// Reported as the string `"true"`/`"false"`
    pub bootable: Option<Value>,
    pub encrypted: Option<bool>,
    pub multiattach: Option<bool>,
    pub attachments: Option<Vec<Value>>,
    pub metadata: Option<HashMap<String, String>>,
    pub snapshot_id: Option<String>,
    #[serde(rename = "source_volid")]
    pub source_volume_id: Option<String>,
    /// Image to create the volume from (request only)
    #[serde(rename = "imageRef")]
    pub image_id: Option<String>,
    #[serde(rename = "os-vol-tenant-attr:tenant_id")]
    pub project_id: Option<String>,
    #[serde(rename = "os-vol-host-attr:host")]
    pub host: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Resource for Volume {
    const KIND: &'static str = "Volume";
    const SERVICE: ServiceType = ServiceType::BlockStorage;
    const BASE_PATH: &'static str = "/volumes";
    const LIST_PATH: Option<&'static str> = Some("/volumes/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("volume");
    const RESOURCES_KEY: Option<&'static str> = Some("volumes");

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["name", "status", "project_id", "bootable", "sort"])
            .with_mapping("all_projects", "all_tenants")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Snapshot {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub size: Option<u64>,
    pub volume_id: Option<String>,
    /// Snapshot an attached volume (request only)
    pub force: Option<bool>,
    pub metadata: Option<HashMap<String, String>>,
    #[serde(rename = "os-extended-snapshot-attributes:progress")]
    pub progress: Option<String>,
    #[serde(rename = "os-extended-snapshot-attributes:project_id")]
    pub project_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Resource for Snapshot {
    const KIND: &'static str = "Snapshot";
    const SERVICE: ServiceType = ServiceType::BlockStorage;
    const BASE_PATH: &'static str = "/snapshots";
    const LIST_PATH: Option<&'static str> = Some("/snapshots/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("snapshot");
    const RESOURCES_KEY: Option<&'static str> = Some("snapshots");

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["name", "status", "volume_id", "project_id"])
            .with_mapping("all_projects", "all_tenants")
    }
}

/// Block storage service proxy
#[derive(Debug, Clone)]
pub struct BlockStorageProxy {
    proxy: Proxy,
}

impl Deref for BlockStorageProxy {
    type Target = Proxy;

    fn deref(&self) -> &Proxy {
        &self.proxy
    }
}

impl BlockStorageProxy {
    /// Proxy for the block storage service
    pub fn new(session: Session) -> Self {
        Self {
            proxy: Proxy::new(session, ServiceType::BlockStorage),
        }
    }

    /// Create a volume
    pub async fn create_volume(&self, volume: &Volume) -> Result<Volume> {
        self.proxy.create(volume).await
    }

    /// Get a volume by id
    pub async fn get_volume(&self, id: &str) -> Result<Volume> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a volume by name or id
    pub async fn find_volume(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Volume>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// List volumes
    pub async fn volumes(&self, query: &Query) -> Result<Vec<Volume>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a volume
    pub async fn update_volume<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Volume> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a volume
    pub async fn delete_volume(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Volume>(id, &UriParams::new(), ignore_missing)
            .await
    }

    /// Grow a volume to `new_size` GiB
    pub async fn extend_volume(&self, id: &str, new_size: u64) -> Result<()> {
        let path = format!("/volumes/{}/action", urlencoding::encode(id));
        self.proxy
            .post_json(&path, json!({"os-extend": {"new_size": new_size}}))
            .await?;
        Ok(())
    }

    /// Wait for a volume to become `available`; `None` waits the default time
    pub async fn wait_for_volume(&self, volume: &Volume, wait: Option<Duration>) -> Result<Volume> {
        self.proxy
            .wait_for_status(
                volume,
                "available",
                VOLUME_FAILURES,
                DEFAULT_INTERVAL,
                wait.or(Some(DEFAULT_WAIT)),
            )
            .await
    }

    /// Create a snapshot
    pub async fn create_snapshot(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        self.proxy.create(snapshot).await
    }

    /// Get a snapshot by id
    pub async fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a snapshot by name or id
    pub async fn find_snapshot(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Snapshot>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// List snapshots
    pub async fn snapshots(&self, query: &Query) -> Result<Vec<Snapshot>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a snapshot
    pub async fn update_snapshot<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Snapshot> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a snapshot
    pub async fn delete_snapshot(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Snapshot>(id, &UriParams::new(), ignore_missing)
            .await
    }

    /// Wait for a snapshot to become `available`; `None` waits the default time
    pub async fn wait_for_snapshot(&self, snapshot: &Snapshot, wait: Option<Duration>) -> Result<Snapshot> {
        self.proxy
            .wait_for_status(
                snapshot,
                "available",
                &["error"],
                DEFAULT_INTERVAL,
                wait.or(Some(DEFAULT_WAIT)),
            )
            .await
    }
}

//! Image service
//!
//! Images are sent and received without a JSON envelope, page through a
//! top-level `next` link and are updated with JSON-Patch documents.

use crate::cloud::http::RequestOptions;
use crate::cloud::session::{ServiceType, Session};
use crate::error::Result;
use crate::proxy::Proxy;
use crate::resource::{
    CommitMethod, Query, QueryParameters, Resource, UriParams, DEFAULT_INTERVAL, DEFAULT_WAIT,
};
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Image {
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub visibility: Option<String>,
    pub container_format: Option<String>,
    pub disk_format: Option<String>,
    pub min_disk: Option<u64>,
    pub min_ram: Option<u64>,
    pub size: Option<u64>,
    pub virtual_size: Option<u64>,
    pub checksum: Option<String>,
    pub os_hash_algo: Option<String>,
    pub os_hash_value: Option<String>,
    pub owner: Option<String>,
    pub protected: Option<bool>,
    pub os_hidden: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub file: Option<String>,
    pub schema: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Free-form image properties (`hw_disk_bus`, `os_distro`, ...)
    #[serde(flatten)]
    pub properties: HashMap<String, Value>,
}

impl Resource for Image {
    const KIND: &'static str = "Image";
    const SERVICE: ServiceType = ServiceType::Image;
    const BASE_PATH: &'static str = "/images";
    const RESOURCES_KEY: Option<&'static str> = Some("images");
    const COMMIT_METHOD: CommitMethod = CommitMethod::JsonPatch;

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
        QueryParameters::new(&[
            "name",
            "visibility",
            "status",
            "owner",
            "member_status",
            "tag",
            "protected",
            "os_hidden",
            "container_format",
            "disk_format",
            "size_min",
            "size_max",
            "sort",
            "sort_key",
            "sort_dir",
        ])
    }
}

fn file_path(id: &str) -> String {
    format!("/images/{}/file", urlencoding::encode(id))
}

/// Image service proxy
#[derive(Debug, Clone)]
pub struct ImageProxy {
    proxy: Proxy,
}

impl Deref for ImageProxy {
    type Target = Proxy;

    fn deref(&self) -> &Proxy {
        &self.proxy
    }
}

impl ImageProxy {
    /// Proxy for the image service
    pub fn new(session: Session) -> Self {
        Self {
            proxy: Proxy::new(session, ServiceType::Image),
        }
    }

    /// Register image metadata; data is sent separately with [`Self::upload_image`]
    pub async fn create_image(&self, image: &Image) -> Result<Image> {
        self.proxy.create(image).await
    }

    /// Get an image by id
    pub async fn get_image(&self, id: &str) -> Result<Image> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find an image by name or id
    pub async fn find_image(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Image>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// List images
    pub async fn images(&self, query: &Query) -> Result<Vec<Image>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update an image
    pub async fn update_image<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Image> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Drop custom properties from an image
    pub async fn remove_image_properties(&self, id: &str, keys: &[&str]) -> Result<Image> {
        let changes: Map<String, Value> = keys
            .iter()
            .map(|key| (key.to_string(), Value::Null))
            .collect();
        self.proxy.update_attrs(id, changes, &UriParams::new()).await
    }

    /// Delete an image
    pub async fn delete_image(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Image>(id, &UriParams::new(), ignore_missing)
            .await
    }

    /// Upload image data
    pub async fn upload_image(&self, id: &str, data: Vec<u8>) -> Result<()> {
        let opts = RequestOptions::new().raw(data, "application/octet-stream");
        self.proxy.request(Method::PUT, &file_path(id), opts).await?;
        Ok(())
    }

    /// Download image data
    pub async fn download_image(&self, id: &str) -> Result<Vec<u8>> {
        let opts = RequestOptions::new().header(ACCEPT.as_str(), "*/*")?;
        let response = self.proxy.request(Method::GET, &file_path(id), opts).await?;
        Ok(response.body)
    }

    /// Wait for an image to become `active`, failing when it is `killed`
    pub async fn wait_for_image(&self, image: &Image, wait: Option<Duration>) -> Result<Image> {
        self.proxy
            .wait_for_status(
                image,
                "active",
                &["killed"],
                DEFAULT_INTERVAL,
                wait.or(Some(DEFAULT_WAIT)),
            )
            .await
    }
}

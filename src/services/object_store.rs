//! Object store service: containers and objects
//!
//! Containers and objects are identified by name, created with `PUT`,
//! updated with `POST` and carry their attributes in headers rather than
//! JSON bodies. Listings are JSON and page by name marker.

use crate::cloud::http::RequestOptions;
use crate::cloud::session::{ServiceType, Session};
use crate::error::Result;
use crate::proxy::Proxy;
use crate::resource::base::{header_options, translate};
use crate::resource::{
    Capabilities, CommitMethod, CreateMethod, HeaderField, Query, QueryParameters, Resource,
    UriParams,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::HashMap;
use std::ops::Deref;

const OBJECT_STORE_CAPABILITIES: Capabilities = Capabilities {
    create: true,
    fetch: false,
    list: true,
    commit: true,
    delete: true,
    head: true,
    paginated: true,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Container {
    pub name: Option<String>,
    #[serde(alias = "count")]
    pub object_count: Option<u64>,
    #[serde(alias = "bytes")]
    pub bytes_used: Option<u64>,
    pub last_modified: Option<String>,
    /// ACL such as `.r:*,.rlistings`
    pub read_acl: Option<String>,
    pub write_acl: Option<String>,
    pub versions_location: Option<String>,
    pub sync_to: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Resource for Container {
    const KIND: &'static str = "Container";
    const SERVICE: ServiceType = ServiceType::ObjectStore;
    const BASE_PATH: &'static str = "/";
    const CAPABILITIES: Capabilities = OBJECT_STORE_CAPABILITIES;
    const CREATE_METHOD: CreateMethod = CreateMethod::Put;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Post;
    const HAS_BODY: bool = false;
    const ID_ATTR: &'static str = "name";
    const HEADER_FIELDS: &'static [HeaderField] = &[
        HeaderField::int("object_count", "x-container-object-count").read_only(),
        HeaderField::int("bytes_used", "x-container-bytes-used").read_only(),
        HeaderField::string("read_acl", "x-container-read"),
        HeaderField::string("write_acl", "x-container-write"),
        HeaderField::string("versions_location", "x-versions-location"),
        HeaderField::string("sync_to", "x-container-sync-to"),
    ];
    const METADATA_PREFIX: Option<&'static str> = Some("x-container-meta-");
    const COUNT_HEADER: Option<&'static str> = Some("x-account-container-count");

    fn id(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["prefix", "delimiter", "end_marker"])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Object {
    pub container: Option<String>,
    pub name: Option<String>,
    pub content_type: Option<String>,
    #[serde(alias = "bytes")]
    pub content_length: Option<u64>,
    #[serde(alias = "hash")]
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Seconds until the object expires
    pub delete_after: Option<u64>,
    /// Unix time at which the object expires
    pub delete_at: Option<u64>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Resource for Object {
    const KIND: &'static str = "Object";
    const SERVICE: ServiceType = ServiceType::ObjectStore;
    const BASE_PATH: &'static str = "/{container}";
    const CAPABILITIES: Capabilities = OBJECT_STORE_CAPABILITIES;
    const CREATE_METHOD: CreateMethod = CreateMethod::Put;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Post;
    const HAS_BODY: bool = false;
    const ID_ATTR: &'static str = "name";
    const HEADER_FIELDS: &'static [HeaderField] = &[
        HeaderField::string("content_type", "content-type"),
        HeaderField::int("content_length", "content-length").read_only(),
        HeaderField::string("etag", "etag").read_only(),
        HeaderField::string("last_modified", "last-modified").read_only(),
        HeaderField::int("delete_after", "x-delete-after"),
        HeaderField::int("delete_at", "x-delete-at"),
    ];
    const METADATA_PREFIX: Option<&'static str> = Some("x-object-meta-");
    const COUNT_HEADER: Option<&'static str> = Some("x-container-object-count");

    fn id(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["prefix", "delimiter", "end_marker", "path"])
    }
}

fn container_uri(container: &str) -> UriParams {
    UriParams::new().with("container", container)
}

fn object_path(container: &str, name: &str) -> String {
    format!(
        "/{}/{}",
        urlencoding::encode(container),
        urlencoding::encode(name)
    )
}

/// Object store service proxy
#[derive(Debug, Clone)]
pub struct ObjectStoreProxy {
    proxy: Proxy,
}

impl Deref for ObjectStoreProxy {
    type Target = Proxy;

    fn deref(&self) -> &Proxy {
        &self.proxy
    }
}

impl ObjectStoreProxy {
    /// Proxy for the object store service
    pub fn new(session: Session) -> Self {
        Self {
            proxy: Proxy::new(session, ServiceType::ObjectStore),
        }
    }

    /// Create a container
    pub async fn create_container(&self, container: &Container) -> Result<Container> {
        self.proxy.create(container).await
    }

    /// Container attributes and metadata, read from a `HEAD` request
    pub async fn get_container_metadata(&self, name: &str) -> Result<Container> {
        self.proxy.head(name, &UriParams::new()).await
    }

    /// Find a container by name
    pub async fn find_container(&self, name: &str, ignore_missing: bool) -> Result<Option<Container>> {
        let query = Query::new().filter("prefix", name);
        self.proxy
            .find(name, &UriParams::new(), &query, ignore_missing)
            .await
    }

    /// List containers of the account
    pub async fn containers(&self, query: &Query) -> Result<Vec<Container>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Set ACLs or metadata; metadata keys not given are left untouched
    pub async fn update_container<T: Serialize + ?Sized>(&self, name: &str, changes: &T) -> Result<Container> {
        self.proxy.update(name, changes, &UriParams::new()).await
    }

    /// Delete a container
    pub async fn delete_container(&self, name: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Container>(name, &UriParams::new(), ignore_missing)
            .await
    }

    /// Store `data` as `container/name`, with the header attributes of `object`
    pub async fn upload_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        object: &Object,
    ) -> Result<Object> {
        let object = Object {
            container: Some(container.to_string()),
            name: Some(name.to_string()),
            ..object.clone()
        };

        let mut opts = header_options(&object)?;
        opts.headers.remove(CONTENT_TYPE);
        let content_type = object
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let opts = opts.raw(data, &content_type);

        let response = self
            .proxy
            .request(Method::PUT, &object_path(container, name), opts)
            .await?;

        let mut known = Map::new();
        known.insert("name".to_string(), name.into());
        let mut stored: Object = translate(&response, false, known, &container_uri(container))?;
        // Content headers of a PUT response describe the response, not the object
        stored.content_type = Some(content_type);
        stored.content_length = None;
        stored.metadata = object.metadata.or(stored.metadata);
        Ok(stored)
    }

    /// Download an object's data
    pub async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let opts = RequestOptions::new().header(ACCEPT.as_str(), "*/*")?;
        let response = self
            .proxy
            .request(Method::GET, &object_path(container, name), opts)
            .await?;
        Ok(response.body)
    }

    /// Get an object's attributes and metadata with `HEAD`
    pub async fn get_object_metadata(&self, container: &str, name: &str) -> Result<Object> {
        self.proxy.head(name, &container_uri(container)).await
    }

    /// Find an object in a container by name
    pub async fn find_object(
        &self,
        container: &str,
        name: &str,
        ignore_missing: bool,
    ) -> Result<Option<Object>> {
        let query = Query::new().filter("prefix", name);
        self.proxy
            .find(name, &container_uri(container), &query, ignore_missing)
            .await
    }

    /// List objects in a container
    pub async fn objects(&self, container: &str, query: &Query) -> Result<Vec<Object>> {
        self.proxy.list(query, &container_uri(container)).await
    }

    /// Update an object
    pub async fn update_object<T: Serialize + ?Sized>(
        &self,
        container: &str,
        name: &str,
        changes: &T,
    ) -> Result<Object> {
        self.proxy.update(name, changes, &container_uri(container)).await
    }

    /// Delete an object
    pub async fn delete_object(&self, container: &str, name: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Object>(name, &container_uri(container), ignore_missing)
            .await
    }
}

//! Compute service: servers, flavors and server interfaces

use crate::cloud::session::{ServiceType, Session};
use crate::error::Result;
use crate::proxy::Proxy;
use crate::resource::{
    Capabilities, Query, QueryParameters, Resource, UriParams, DEFAULT_INTERVAL, DEFAULT_WAIT,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;

/// A virtual machine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Server {
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    /// Flavor to boot with (request only)
    #[serde(rename = "flavorRef")]
    pub flavor_ref: Option<String>,
    /// Image to boot from (request only)
    #[serde(rename = "imageRef")]
    pub image_ref: Option<String>,
    /// Flavor as reported by the server
    pub flavor: Option<Value>,
    /// Image as reported by the server; an empty string when booted from volume
    pub image: Option<Value>,
    pub networks: Option<Value>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub addresses: Option<HashMap<String, Vec<Value>>>,
    pub security_groups: Option<Vec<Value>>,
    #[serde(rename = "OS-EXT-AZ:availability_zone")]
    pub availability_zone: Option<String>,
    #[serde(rename = "OS-EXT-STS:task_state")]
    pub task_state: Option<String>,
    #[serde(rename = "OS-EXT-STS:vm_state")]
    pub vm_state: Option<String>,
    #[serde(rename = "OS-EXT-STS:power_state")]
    pub power_state: Option<i64>,
    #[serde(rename = "hostId")]
    pub host_id: Option<String>,
    #[serde(rename = "accessIPv4")]
    pub access_ipv4: Option<String>,
    #[serde(rename = "accessIPv6")]
    pub access_ipv6: Option<String>,
    #[serde(rename = "tenant_id")]
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(rename = "adminPass")]
    pub admin_password: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl Resource for Server {
    const KIND: &'static str = "Server";
    const SERVICE: ServiceType = ServiceType::Compute;
    const BASE_PATH: &'static str = "/servers";
    const LIST_PATH: Option<&'static str> = Some("/servers/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("server");
    const RESOURCES_KEY: Option<&'static str> = Some("servers");

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
            "status",
            "image",
            "flavor",
            "host",
            "ip",
            "project_id",
            "user_id",
            "tags",
            "sort_key",
            "sort_dir",
        ])
        .with_mapping("changes_since", "changes-since")
        .with_mapping("all_projects", "all_tenants")
    }
}

/// Hardware profile a server boots with
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Flavor {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ram: Option<u64>,
    pub vcpus: Option<u64>,
    pub disk: Option<u64>,
    /// Megabytes, or an empty string when unset
    pub swap: Option<Value>,
    pub rxtx_factor: Option<f64>,
    #[serde(rename = "OS-FLV-EXT-DATA:ephemeral")]
    pub ephemeral: Option<u64>,
    #[serde(rename = "os-flavor-access:is_public")]
    pub is_public: Option<bool>,
    #[serde(rename = "OS-FLV-DISABLED:disabled")]
    pub is_disabled: Option<bool>,
}

impl Resource for Flavor {
    const KIND: &'static str = "Flavor";
    const SERVICE: ServiceType = ServiceType::Compute;
    const BASE_PATH: &'static str = "/flavors";
    const LIST_PATH: Option<&'static str> = Some("/flavors/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("flavor");
    const RESOURCES_KEY: Option<&'static str> = Some("flavors");

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    // No server-side name filter: find() lists and matches locally
    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["is_public", "sort_key", "sort_dir"])
            .with_mapping("min_disk", "minDisk")
            .with_mapping("min_ram", "minRam")
    }
}

/// A port attached to a server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerInterface {
    pub server_id: Option<String>,
    pub port_id: Option<String>,
    pub net_id: Option<String>,
    pub mac_addr: Option<String>,
    pub port_state: Option<String>,
    pub fixed_ips: Option<Vec<Value>>,
}

impl Resource for ServerInterface {
    const KIND: &'static str = "ServerInterface";
    const SERVICE: ServiceType = ServiceType::Compute;
    const BASE_PATH: &'static str = "/servers/{server_id}/os-interface";
    const RESOURCE_KEY: Option<&'static str> = Some("interfaceAttachment");
    const RESOURCES_KEY: Option<&'static str> = Some("interfaceAttachments");
    const CAPABILITIES: Capabilities = Capabilities {
        create: true,
        fetch: true,
        list: true,
        commit: false,
        delete: true,
        head: false,
        paginated: false,
    };
    const ID_ATTR: &'static str = "port_id";

    fn id(&self) -> Option<&str> {
        self.port_id.as_deref()
    }

    fn status(&self) -> Option<&str> {
        self.port_state.as_deref()
    }
}

/// `SOFT` or `HARD` reboot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootType {
    Soft,
    Hard,
}

impl RebootType {
    fn as_str(self) -> &'static str {
        match self {
            RebootType::Soft => "SOFT",
            RebootType::Hard => "HARD",
        }
    }
}

fn server_uri(server_id: &str) -> UriParams {
    UriParams::new().with("server_id", server_id)
}

/// Compute service proxy
#[derive(Debug, Clone)]
pub struct ComputeProxy {
    proxy: Proxy,
}

impl Deref for ComputeProxy {
    type Target = Proxy;

    fn deref(&self) -> &Proxy {
        &self.proxy
    }
}

impl ComputeProxy {
    /// Proxy for the compute service
    pub fn new(session: Session) -> Self {
        Self {
            proxy: Proxy::new(session, ServiceType::Compute),
        }
    }

    // Servers

    /// Create a server
    pub async fn create_server(&self, server: &Server) -> Result<Server> {
        self.proxy.create(server).await
    }

    /// Get a server by id
    pub async fn get_server(&self, id: &str) -> Result<Server> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a server by name or id
    pub async fn find_server(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Server>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// Servers with full details
    pub async fn servers(&self, query: &Query) -> Result<Vec<Server>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a server
    pub async fn update_server<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Server> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a server
    pub async fn delete_server(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Server>(id, &UriParams::new(), ignore_missing)
            .await
    }

    async fn server_action(&self, id: &str, body: Value) -> Result<()> {
        let path = format!("/servers/{}/action", urlencoding::encode(id));
        self.proxy.post_json(&path, body).await?;
        Ok(())
    }

    /// Reboot a server
    pub async fn reboot_server(&self, id: &str, reboot_type: RebootType) -> Result<()> {
        self.server_action(id, json!({"reboot": {"type": reboot_type.as_str()}}))
            .await
    }

    /// Power on a stopped server
    pub async fn start_server(&self, id: &str) -> Result<()> {
        self.server_action(id, json!({"os-start": null})).await
    }

    /// Shut down a server
    pub async fn stop_server(&self, id: &str) -> Result<()> {
        self.server_action(id, json!({"os-stop": null})).await
    }

    /// Wait for a server to become `ACTIVE`, failing on `ERROR`
    ///
    /// `None` waits up to [`DEFAULT_WAIT`].
    pub async fn wait_for_server(&self, server: &Server, wait: Option<Duration>) -> Result<Server> {
        self.proxy
            .wait_for_status(
                server,
                "ACTIVE",
                &["ERROR"],
                DEFAULT_INTERVAL,
                wait.or(Some(DEFAULT_WAIT)),
            )
            .await
    }

    // Flavors

    /// Create a flavor
    pub async fn create_flavor(&self, flavor: &Flavor) -> Result<Flavor> {
        self.proxy.create(flavor).await
    }

    /// Get a flavor by id
    pub async fn get_flavor(&self, id: &str) -> Result<Flavor> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a flavor by name or id
    pub async fn find_flavor(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Flavor>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// List flavors
    pub async fn flavors(&self, query: &Query) -> Result<Vec<Flavor>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a flavor
    pub async fn update_flavor<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Flavor> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a flavor
    pub async fn delete_flavor(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Flavor>(id, &UriParams::new(), ignore_missing)
            .await
    }

    // Server interfaces

    /// Attach a port or network to a server
    pub async fn create_server_interface(
        &self,
        server_id: &str,
        interface: &ServerInterface,
    ) -> Result<ServerInterface> {
        let interface = ServerInterface {
            server_id: Some(server_id.to_string()),
            ..interface.clone()
        };
        self.proxy.create(&interface).await
    }

    /// Get a server's interface by port id
    pub async fn get_server_interface(&self, server_id: &str, port_id: &str) -> Result<ServerInterface> {
        self.proxy.get(port_id, &server_uri(server_id)).await
    }

    /// List the interfaces attached to a server
    pub async fn server_interfaces(&self, server_id: &str) -> Result<Vec<ServerInterface>> {
        self.proxy.list(&Query::new(), &server_uri(server_id)).await
    }

    /// Detach an interface from a server
    pub async fn delete_server_interface(
        &self,
        server_id: &str,
        port_id: &str,
        ignore_missing: bool,
    ) -> Result<bool> {
        self.proxy
            .delete::<ServerInterface>(port_id, &server_uri(server_id), ignore_missing)
            .await
    }
}

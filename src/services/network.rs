//! Network service: networks, subnets and ports

use crate::cloud::session::{ServiceType, Session};
use crate::error::Result;
use crate::proxy::Proxy;
use crate::resource::{Query, QueryParameters, Resource, UriParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Deref;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Network {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub admin_state_up: Option<bool>,
    pub shared: Option<bool>,
    #[serde(rename = "router:external")]
    pub is_router_external: Option<bool>,
    pub port_security_enabled: Option<bool>,
    pub mtu: Option<u32>,
    pub subnets: Option<Vec<String>>,
    pub availability_zones: Option<Vec<String>>,
    pub project_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub revision_number: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for Network {
    const KIND: &'static str = "Network";
    const SERVICE: ServiceType = ServiceType::Network;
    const BASE_PATH: &'static str = "/networks";
    const RESOURCE_KEY: Option<&'static str> = Some("network");
    const RESOURCES_KEY: Option<&'static str> = Some("networks");

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
            "description",
            "status",
            "shared",
            "admin_state_up",
            "project_id",
            "tags",
            "sort_key",
            "sort_dir",
        ])
        .with_mapping("is_router_external", "router:external")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Subnet {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub network_id: Option<String>,
    pub cidr: Option<String>,
    pub ip_version: Option<u8>,
    pub gateway_ip: Option<String>,
    pub enable_dhcp: Option<bool>,
    pub dns_nameservers: Option<Vec<String>>,
    pub allocation_pools: Option<Vec<Value>>,
    pub host_routes: Option<Vec<Value>>,
    pub subnetpool_id: Option<String>,
    pub project_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for Subnet {
    const KIND: &'static str = "Subnet";
    const SERVICE: ServiceType = ServiceType::Network;
    const BASE_PATH: &'static str = "/subnets";
    const RESOURCE_KEY: Option<&'static str> = Some("subnet");
    const RESOURCES_KEY: Option<&'static str> = Some("subnets");

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&[
            "name",
            "description",
            "network_id",
            "cidr",
            "ip_version",
            "gateway_ip",
            "enable_dhcp",
            "subnetpool_id",
            "project_id",
            "sort_key",
            "sort_dir",
        ])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Port {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub network_id: Option<String>,
    pub status: Option<String>,
    pub admin_state_up: Option<bool>,
    pub mac_address: Option<String>,
    pub fixed_ips: Option<Vec<Value>>,
    pub device_id: Option<String>,
    pub device_owner: Option<String>,
    pub security_groups: Option<Vec<String>>,
    #[serde(rename = "binding:host_id")]
    pub binding_host_id: Option<String>,
    #[serde(rename = "binding:vnic_type")]
    pub binding_vnic_type: Option<String>,
    pub project_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for Port {
    const KIND: &'static str = "Port";
    const SERVICE: ServiceType = ServiceType::Network;
    const BASE_PATH: &'static str = "/ports";
    const RESOURCE_KEY: Option<&'static str> = Some("port");
    const RESOURCES_KEY: Option<&'static str> = Some("ports");

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
            "description",
            "network_id",
            "status",
            "admin_state_up",
            "mac_address",
            "fixed_ips",
            "device_id",
            "device_owner",
            "project_id",
            "security_groups",
            "sort_key",
            "sort_dir",
        ])
        .with_mapping("binding_host_id", "binding:host_id")
    }
}

/// Network service proxy
#[derive(Debug, Clone)]
pub struct NetworkProxy {
    proxy: Proxy,
}

impl Deref for NetworkProxy {
    type Target = Proxy;

    fn deref(&self) -> &Proxy {
        &self.proxy
    }
}

impl NetworkProxy {
    /// Proxy for the network service
    pub fn new(session: Session) -> Self {
        Self {
            proxy: Proxy::new(session, ServiceType::Network),
        }
    }

    /// Create a network
    pub async fn create_network(&self, network: &Network) -> Result<Network> {
        self.proxy.create(network).await
    }

    /// Get a network by id
    pub async fn get_network(&self, id: &str) -> Result<Network> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a network by name or id
    pub async fn find_network(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Network>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// List networks
    pub async fn networks(&self, query: &Query) -> Result<Vec<Network>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a network
    pub async fn update_network<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Network> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a network
    pub async fn delete_network(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Network>(id, &UriParams::new(), ignore_missing)
            .await
    }

    /// Create a subnet
    pub async fn create_subnet(&self, subnet: &Subnet) -> Result<Subnet> {
        self.proxy.create(subnet).await
    }

    /// Get a subnet by id
    pub async fn get_subnet(&self, id: &str) -> Result<Subnet> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a subnet, optionally restricted to one network
    pub async fn find_subnet(
        &self,
        name_or_id: &str,
        network_id: Option<&str>,
        ignore_missing: bool,
    ) -> Result<Option<Subnet>> {
        let mut query = Query::new();
        if let Some(network_id) = network_id {
            query.insert("network_id", network_id);
        }
        self.proxy
            .find(name_or_id, &UriParams::new(), &query, ignore_missing)
            .await
    }

    /// List subnets
    pub async fn subnets(&self, query: &Query) -> Result<Vec<Subnet>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a subnet
    pub async fn update_subnet<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Subnet> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a subnet
    pub async fn delete_subnet(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Subnet>(id, &UriParams::new(), ignore_missing)
            .await
    }

    /// Create a port
    pub async fn create_port(&self, port: &Port) -> Result<Port> {
        self.proxy.create(port).await
    }

    /// Get a port by id
    pub async fn get_port(&self, id: &str) -> Result<Port> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a port by name or id
    pub async fn find_port(&self, name_or_id: &str, ignore_missing: bool) -> Result<Option<Port>> {
        self.proxy
            .find(name_or_id, &UriParams::new(), &Query::new(), ignore_missing)
            .await
    }

    /// List ports
    pub async fn ports(&self, query: &Query) -> Result<Vec<Port>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a port
    pub async fn update_port<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Port> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a port
    pub async fn delete_port(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Port>(id, &UriParams::new(), ignore_missing)
            .await
    }
}

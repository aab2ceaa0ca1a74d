//! CLI Dispatch
//!
//! Maps a resource kind named on the command line to the typed proxy calls.

use anyhow::{Context, Result};
use clap::ValueEnum;
use ostack::proxy::Proxy;
use ostack::resource::{Query, Resource, UriParams, DEFAULT_INTERVAL};
use ostack::services::{block_storage, compute, identity, image, network, object_store};
use ostack::Connection;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Server,
    Flavor,
    Network,
    Subnet,
    Port,
    Volume,
    Snapshot,
    Project,
    User,
    Image,
    Container,
}

impl Kind {
    /// Table columns as (header, dotted JSON path)
    pub fn columns(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Kind::Server => &[("ID", "id"), ("NAME", "name"), ("STATUS", "status")],
            Kind::Flavor => &[
                ("ID", "id"),
                ("NAME", "name"),
                ("VCPUS", "vcpus"),
                ("RAM", "ram"),
                ("DISK", "disk"),
            ],
            Kind::Network => &[("ID", "id"), ("NAME", "name"), ("STATUS", "status"), ("SUBNETS", "subnets")],
            Kind::Subnet => &[("ID", "id"), ("NAME", "name"), ("NETWORK", "network_id"), ("CIDR", "cidr")],
            Kind::Port => &[
                ("ID", "id"),
                ("NAME", "name"),
                ("MAC", "mac_address"),
                ("IP", "fixed_ips.0.ip_address"),
                ("STATUS", "status"),
            ],
            Kind::Volume => &[("ID", "id"), ("NAME", "name"), ("STATUS", "status"), ("SIZE", "size")],
            Kind::Snapshot => &[
                ("ID", "id"),
                ("NAME", "name"),
                ("STATUS", "status"),
                ("VOLUME", "volume_id"),
            ],
            Kind::Project => &[("ID", "id"), ("NAME", "name"), ("DOMAIN", "domain_id"), ("ENABLED", "enabled")],
            Kind::User => &[("ID", "id"), ("NAME", "name"), ("DOMAIN", "domain_id"), ("ENABLED", "enabled")],
            Kind::Image => &[("ID", "id"), ("NAME", "name"), ("STATUS", "status"), ("SIZE", "size")],
            Kind::Container => &[("NAME", "name"), ("OBJECTS", "object_count"), ("BYTES", "bytes_used")],
        }
    }

    /// Status `wait` targets when none is given, and the states that abort it
    fn default_wait(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Kind::Server => ("ACTIVE", &["ERROR"]),
            Kind::Volume | Kind::Snapshot => ("available", &["error"]),
            Kind::Image => ("active", &["killed"]),
            Kind::Network | Kind::Port => ("ACTIVE", &["ERROR"]),
            _ => ("deleted", &[]),
        }
    }
}

fn to_values<R: serde::Serialize>(items: Vec<R>) -> Result<Vec<Value>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).context("Failed to serialize resource"))
        .collect()
}

async fn find_one<R: Resource>(proxy: &Proxy, name_or_id: &str) -> Result<R> {
    proxy
        .find::<R>(name_or_id, &UriParams::new(), &Query::new(), false)
        .await?
        .with_context(|| format!("No {} found for {}", R::KIND, name_or_id))
}

/// List every resource of a kind
pub async fn list(conn: &Connection, kind: Kind, query: &Query) -> Result<Vec<Value>> {
    tracing::debug!("list: kind={:?}", kind);

    match kind {
        Kind::Server => to_values(conn.compute().servers(query).await?),
        Kind::Flavor => to_values(conn.compute().flavors(query).await?),
        Kind::Network => to_values(conn.network().networks(query).await?),
        Kind::Subnet => to_values(conn.network().subnets(query).await?),
        Kind::Port => to_values(conn.network().ports(query).await?),
        Kind::Volume => to_values(conn.block_storage().volumes(query).await?),
        Kind::Snapshot => to_values(conn.block_storage().snapshots(query).await?),
        Kind::Project => to_values(conn.identity().projects(query).await?),
        Kind::User => to_values(conn.identity().users(query).await?),
        Kind::Image => to_values(conn.image().images(query).await?),
        Kind::Container => to_values(conn.object_store().containers(query).await?),
    }
}

/// Resolve a name or id and show the resource
pub async fn show(conn: &Connection, kind: Kind, name_or_id: &str) -> Result<Value> {
    let value = match kind {
        Kind::Server => serde_json::to_value(find_one::<compute::Server>(conn.compute(), name_or_id).await?)?,
        Kind::Flavor => serde_json::to_value(find_one::<compute::Flavor>(conn.compute(), name_or_id).await?)?,
        Kind::Network => serde_json::to_value(find_one::<network::Network>(conn.network(), name_or_id).await?)?,
        Kind::Subnet => serde_json::to_value(find_one::<network::Subnet>(conn.network(), name_or_id).await?)?,
        Kind::Port => serde_json::to_value(find_one::<network::Port>(conn.network(), name_or_id).await?)?,
        Kind::Volume => {
            serde_json::to_value(find_one::<block_storage::Volume>(conn.block_storage(), name_or_id).await?)?
        },
        Kind::Snapshot => {
            serde_json::to_value(find_one::<block_storage::Snapshot>(conn.block_storage(), name_or_id).await?)?
        },
        Kind::Project => serde_json::to_value(find_one::<identity::Project>(conn.identity(), name_or_id).await?)?,
        Kind::User => serde_json::to_value(find_one::<identity::User>(conn.identity(), name_or_id).await?)?,
        Kind::Image => serde_json::to_value(find_one::<image::Image>(conn.image(), name_or_id).await?)?,
        Kind::Container => {
            serde_json::to_value(conn.object_store().get_container_metadata(name_or_id).await?)?
        },
    };
    Ok(value)
}

/// Delete a resource by name or id; `false` when it did not exist
pub async fn delete(conn: &Connection, kind: Kind, name_or_id: &str) -> Result<bool> {
    tracing::info!("delete: kind={:?}, resource={}", kind, name_or_id);

    async fn resolve_and_delete<R: Resource>(proxy: &Proxy, name_or_id: &str) -> Result<bool> {
        let Some(found) = proxy
            .find::<R>(name_or_id, &UriParams::new(), &Query::new(), true)
            .await?
        else {
            return Ok(false);
        };
        let id = found
            .id()
            .with_context(|| format!("{} {} has no id", R::KIND, name_or_id))?;
        Ok(proxy.delete::<R>(id, &UriParams::new(), true).await?)
    }

    match kind {
        Kind::Server => resolve_and_delete::<compute::Server>(conn.compute(), name_or_id).await,
        Kind::Flavor => resolve_and_delete::<compute::Flavor>(conn.compute(), name_or_id).await,
        Kind::Network => resolve_and_delete::<network::Network>(conn.network(), name_or_id).await,
        Kind::Subnet => resolve_and_delete::<network::Subnet>(conn.network(), name_or_id).await,
        Kind::Port => resolve_and_delete::<network::Port>(conn.network(), name_or_id).await,
        Kind::Volume => resolve_and_delete::<block_storage::Volume>(conn.block_storage(), name_or_id).await,
        Kind::Snapshot => {
            resolve_and_delete::<block_storage::Snapshot>(conn.block_storage(), name_or_id).await
        },
        Kind::Project => resolve_and_delete::<identity::Project>(conn.identity(), name_or_id).await,
        Kind::User => resolve_and_delete::<identity::User>(conn.identity(), name_or_id).await,
        Kind::Image => resolve_and_delete::<image::Image>(conn.image(), name_or_id).await,
        Kind::Container => Ok(conn.object_store().delete_container(name_or_id, true).await?),
    }
}

async fn wait_on<R: Resource>(
    proxy: &Proxy,
    name_or_id: &str,
    status: &str,
    failures: &[&str],
    timeout: Duration,
) -> Result<Value> {
    let resource = find_one::<R>(proxy, name_or_id).await?;
    let done = if status.eq_ignore_ascii_case("deleted") {
        proxy
            .wait_for_delete(&resource, DEFAULT_INTERVAL, Some(timeout))
            .await?
    } else {
        proxy
            .wait_for_status(&resource, status, failures, DEFAULT_INTERVAL, Some(timeout))
            .await?
    };
    Ok(serde_json::to_value(done)?)
}

/// Wait for a resource to reach a status (`deleted` waits for it to go away)
pub async fn wait(
    conn: &Connection,
    kind: Kind,
    name_or_id: &str,
    status: Option<&str>,
    timeout: Duration,
) -> Result<Value> {
    let (default_status, failures) = kind.default_wait();
    let status = status.unwrap_or(default_status);
    tracing::info!("wait: kind={:?}, resource={}, status={}", kind, name_or_id, status);

    match kind {
        Kind::Server => wait_on::<compute::Server>(conn.compute(), name_or_id, status, failures, timeout).await,
        Kind::Flavor => wait_on::<compute::Flavor>(conn.compute(), name_or_id, status, failures, timeout).await,
        Kind::Network => wait_on::<network::Network>(conn.network(), name_or_id, status, failures, timeout).await,
        Kind::Subnet => wait_on::<network::Subnet>(conn.network(), name_or_id, status, failures, timeout).await,
        Kind::Port => wait_on::<network::Port>(conn.network(), name_or_id, status, failures, timeout).await,
        Kind::Volume => {
            wait_on::<block_storage::Volume>(conn.block_storage(), name_or_id, status, failures, timeout).await
        },
        Kind::Snapshot => {
            wait_on::<block_storage::Snapshot>(conn.block_storage(), name_or_id, status, failures, timeout)
                .await
        },
        Kind::Project => wait_on::<identity::Project>(conn.identity(), name_or_id, status, failures, timeout).await,
        Kind::User => wait_on::<identity::User>(conn.identity(), name_or_id, status, failures, timeout).await,
        Kind::Image => wait_on::<image::Image>(conn.image(), name_or_id, status, failures, timeout).await,
        Kind::Container => {
            wait_on::<object_store::Container>(conn.object_store(), name_or_id, status, failures, timeout)
                .await
        },
    }
}

/// Extract a value from JSON using a dotted path (`fixed_ips.0.ip_address`)
pub fn extract_json_value(item: &Value, path: &str) -> String {
    let mut current = item;

    for part in path.split('.') {
        // Handle array index
        let next = match part.parse::<usize>() {
            Ok(idx) => current.get(idx),
            Err(_) => current.get(part),
        };
        current = match next {
            Some(v) => v,
            None => return "-".to_string(),
        };
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}

/// Render rows as a left-aligned text table
pub fn render_table(kind: Kind, items: &[Value]) -> String {
    let columns = kind.columns();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            columns
                .iter()
                .map(|(_, path)| extract_json_value(item, path))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, (header, _))| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect();

    let format_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![format_row(columns.iter().map(|(h, _)| *h).collect())];
    out.extend(
        rows.iter()
            .map(|row| format_row(row.iter().map(String::as_str).collect())),
    );
    out.join("\n")
}

//! Integration tests for the resource and proxy layers using wiremock
//!
//! Every service is served by one mock server under a per-service prefix,
//! the way a real catalog points each service at its own base URL.

use async_trait::async_trait;
use futures::TryStreamExt;
use ostack::cloud::auth::{Credentials, TokenSource};
use ostack::cloud::session::{ServiceType, Session};
use ostack::resource::{Query, UriParams};
use ostack::services::block_storage::Volume;
use ostack::services::compute::{RebootType, Server, ServerInterface};
use ostack::services::network::Network;
use ostack::services::object_store::{Container, Object};
use ostack::{Connection, Error};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn builder(server: &MockServer) -> ostack::cloud::session::SessionBuilder {
    let uri = server.uri();
    Session::builder()
        .endpoint(ServiceType::Compute, format!("{}/compute/v2.1", uri))
        .api_version(ServiceType::Compute, "2.53")
        .endpoint(ServiceType::Network, format!("{}/network/v2.0", uri))
        .endpoint(ServiceType::BlockStorage, format!("{}/volume/v3", uri))
        .endpoint(ServiceType::Identity, format!("{}/identity/v3", uri))
        .endpoint(ServiceType::Image, format!("{}/image/v2", uri))
        .endpoint(ServiceType::ObjectStore, format!("{}/swift/v1/AUTH_p", uri))
}

fn connect(server: &MockServer) -> Connection {
    Connection::new(builder(server).token(TOKEN).build().unwrap())
}

/// Test module for CRUD verbs and request construction
mod crud_tests {
    use super::*;

    /// Create wraps the body in the resource key and sends auth and microversion headers
    #[tokio::test]
    async fn test_create_server_envelope_and_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers"))
            .and(header("x-auth-token", TOKEN))
            .and(header("openstack-api-version", "compute 2.53"))
            .and(body_json(json!({
                "server": {"name": "web", "flavorRef": "f1", "imageRef": "i1"}
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({"server": {"id": "s1", "adminPass": "pw"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let created = conn
            .compute()
            .create_server(&Server {
                name: Some("web".into()),
                flavor_ref: Some("f1".into()),
                image_ref: Some("i1".into()),
                ..Default::default()
            })
            .await
            .expect("create should succeed");

        assert_eq!(created.id.as_deref(), Some("s1"));
        assert_eq!(created.name.as_deref(), Some("web"));
        assert_eq!(created.admin_password.as_deref(), Some("pw"));
    }

    /// A 404 on get becomes ResourceNotFound naming the kind and id
    #[tokio::test]
    async fn test_get_missing_server() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/nope"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("x-compute-request-id", "req-123")
                    .set_body_json(json!({
                        "itemNotFound": {"code": 404, "message": "Instance nope could not be found."}
                    })),
            )
            .mount(&server)
            .await;

        let conn = connect(&server);
        let err = conn.compute().get_server("nope").await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(ref msg) if msg == "No Server found for nope"));

        // The raw verb keeps the HTTP details
        let err = ostack::resource::fetch::<Server>(conn.session(), "nope", &UriParams::new())
            .await
            .unwrap_err();
        let http = err.http().expect("should carry the HTTP error");
        assert_eq!(http.message, "Instance nope could not be found.");
        assert_eq!(http.request_id.as_deref(), Some("req-123"));
    }

    /// Delete reports a missing resource as false only when asked to
    #[tokio::test]
    async fn test_delete_ignore_missing() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/compute/v2.1/servers/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/compute/v2.1/servers/s1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let conn = connect(&server);
        assert!(conn.compute().delete_server("s1", false).await.unwrap());
        assert!(!conn.compute().delete_server("gone", true).await.unwrap());
        assert!(matches!(
            conn.compute().delete_server("gone", false).await,
            Err(Error::NotFound(_))
        ));
    }

    /// Server actions post to the action endpoint
    #[tokio::test]
    async fn test_reboot_action() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers/s1/action"))
            .and(body_json(json!({"reboot": {"type": "HARD"}})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        conn.compute()
            .reboot_server("s1", RebootType::Hard)
            .await
            .expect("reboot should succeed");
    }

    /// Child resources render their parent into the path and carry it back
    #[tokio::test]
    async fn test_server_interfaces_child_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/s1/os-interface"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "interfaceAttachments": [
                    {"port_id": "p1", "net_id": "n1", "port_state": "ACTIVE"},
                    {"port_id": "p2", "net_id": "n1", "port_state": "DOWN"}
                ]
            })))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let interfaces: Vec<ServerInterface> = conn.compute().server_interfaces("s1").await.unwrap();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].server_id.as_deref(), Some("s1"));
        assert_eq!(interfaces[1].port_id.as_deref(), Some("p2"));
    }

    /// Verbs a resource does not allow fail before any request
    #[tokio::test]
    async fn test_method_not_supported() {
        let server = MockServer::start().await;
        let conn = connect(&server);

        let err = conn
            .compute()
            .update::<ServerInterface, _>("p1", &json!({"net_id": "n2"}), &UriParams::new().with("server_id", "s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotSupported { ref method, .. } if method == "commit"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    /// Image updates are JSON-Patch documents with the image patch media type
    #[tokio::test]
    async fn test_image_json_patch() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/image/v2/images/i1"))
            .and(header("content-type", "application/openstack-images-v2.1-json-patch"))
            .and(body_json(json!([
                {"op": "add", "path": "/name", "value": "renamed"}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "i1", "name": "renamed", "status": "active", "os_distro": "ubuntu"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let image = conn
            .image()
            .update_image("i1", &json!({"name": "renamed"}))
            .await
            .unwrap();
        assert_eq!(image.name.as_deref(), Some("renamed"));
        assert_eq!(image.properties.get("os_distro"), Some(&json!("ubuntu")));
    }

    /// Identity commits use PATCH with the resource envelope
    #[tokio::test]
    async fn test_project_update_uses_patch() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/identity/v3/projects/p1"))
            .and(body_json(json!({"project": {"enabled": false}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project": {"id": "p1", "name": "demo", "enabled": false}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let project = conn
            .identity()
            .update_project("p1", &json!({"enabled": false}))
            .await
            .unwrap();
        assert_eq!(project.enabled, Some(false));
        assert_eq!(project.name.as_deref(), Some("demo"));
    }
}

/// Test module for name-or-id resolution
mod find_tests {
    use super::*;

    async fn mount_missing_get(server: &MockServer, id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/compute/v2.1/servers/{}", id)))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    /// Find falls back to a name-filtered listing
    #[tokio::test]
    async fn test_find_by_name_falls_back_to_list() {
        let server = MockServer::start().await;
        mount_missing_get(&server, "web").await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .and(query_param("name", "web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s1", "name": "web", "status": "ACTIVE"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let found = conn.compute().find_server("web", false).await.unwrap().unwrap();
        assert_eq!(found.id.as_deref(), Some("s1"));
    }

    /// Two matches by name is an error
    #[tokio::test]
    async fn test_find_duplicate_name() {
        let server = MockServer::start().await;
        mount_missing_get(&server, "web").await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s1", "name": "web"}, {"id": "s2", "name": "web"}]
            })))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let err = conn.compute().find_server("web", true).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(_)));
    }

    /// No match is None or ResourceNotFound depending on ignore_missing
    #[tokio::test]
    async fn test_find_missing() {
        let server = MockServer::start().await;
        mount_missing_get(&server, "ghost").await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
            .mount(&server)
            .await;

        let conn = connect(&server);
        assert!(conn.compute().find_server("ghost", true).await.unwrap().is_none());
        assert!(matches!(
            conn.compute().find_server("ghost", false).await,
            Err(Error::ResourceNotFound(_))
        ));
    }

    /// Errors other than not-found on the direct lookup propagate
    #[tokio::test]
    async fn test_find_propagates_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/web"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let err = conn.compute().find_server("web", true).await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
    }
}

/// Test module for the pagination variants
mod pagination_tests {
    use super::*;

    /// Neutron-style `*_links` with a limit ends on an empty page
    #[tokio::test]
    async fn test_links_pagination() {
        let server = MockServer::start().await;
        let next = format!("{}/network/v2.0/networks?limit=1&marker=a", server.uri());

        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("marker", "b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("marker", "a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": [{"id": "b", "name": "net-b"}]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": [{"id": "a", "name": "net-a"}],
                "networks_links": [{"rel": "next", "href": next}]
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let networks: Vec<Network> = conn.network().networks(&Query::new().limit(1)).await.unwrap();
        let ids: Vec<_> = networks.iter().filter_map(|n| n.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    /// Glance-style top-level `next` with a version prefix
    #[tokio::test]
    async fn test_image_next_pagination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/image/v2/images"))
            .and(query_param("marker", "i1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"id": "i2", "name": "two"}],
                "first": "/v2/images"
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/image/v2/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"id": "i1", "name": "one"}],
                "next": "/v2/images?marker=i1"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let images = conn.image().images(&Query::new()).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].id.as_deref(), Some("i2"));
    }

    /// A server that keeps returning the same cursor is detected
    #[tokio::test]
    async fn test_endless_pagination_detected() {
        let server = MockServer::start().await;
        let next = format!("{}/network/v2.0/networks?marker=a", server.uri());

        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": [{"id": "a"}],
                "networks_links": [{"rel": "next", "href": next}]
            })))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let err = conn.network().networks(&Query::new()).await.unwrap_err();
        assert!(matches!(err, Error::Sdk(ref msg) if msg.contains("Endless pagination")));
    }

    /// Filters are translated to wire names and unknown ones rejected
    #[tokio::test]
    async fn test_volume_filters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/volume/v3/volumes/detail"))
            .and(query_param("all_tenants", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "volumes": [{"id": "v1", "status": "available", "size": 10}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let volumes: Vec<Volume> = conn
            .block_storage()
            .volumes(&Query::new().filter("all_projects", true))
            .await
            .unwrap();
        assert_eq!(volumes[0].size, Some(10));

        let err = conn
            .block_storage()
            .volumes(&Query::new().filter("colour", "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResourceQuery(_)));
    }

    /// Streams yield the same items as collected listings
    #[tokio::test]
    async fn test_list_stream() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s1"}, {"id": "s2"}]
            })))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let servers: Vec<Server> = conn
            .compute()
            .list_stream::<Server>(&Query::new(), &UriParams::new())
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(servers.len(), 2);
    }
}

/// Test module for header-mapped object storage
mod object_store_tests {
    use super::*;

    /// Containers are created with PUT and their attributes sent as headers
    #[tokio::test]
    async fn test_create_container_headers() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/swift/v1/AUTH_p/photos"))
            .and(header("x-container-read", ".r:*"))
            .and(header("x-container-meta-color", "blue"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let container = conn
            .object_store()
            .create_container(&Container {
                name: Some("photos".into()),
                read_acl: Some(".r:*".into()),
                metadata: Some(HashMap::from([("color".to_string(), "blue".to_string())])),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(container.name.as_deref(), Some("photos"));
    }

    /// HEAD reads counters and metadata back out of headers
    #[tokio::test]
    async fn test_container_metadata_from_head() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/swift/v1/AUTH_p/photos"))
            .respond_with(
                ResponseTemplate::new(204)
                    .insert_header("x-container-object-count", "3")
                    .insert_header("x-container-bytes-used", "2048")
                    .insert_header("x-container-meta-color", "blue"),
            )
            .mount(&server)
            .await;

        let conn = connect(&server);
        let container = conn
            .object_store()
            .get_container_metadata("photos")
            .await
            .unwrap();
        assert_eq!(container.object_count, Some(3));
        assert_eq!(container.bytes_used, Some(2048));
        assert_eq!(container.metadata.unwrap()["color"], "blue");
    }

    /// Object listings page by name marker when a limit is given
    #[tokio::test]
    async fn test_object_listing_marker_paging() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p/photos"))
            .and(query_param("marker", "b.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p/photos"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "a.jpg", "hash": "h1", "bytes": 1, "content_type": "image/jpeg"},
                {"name": "b.jpg", "hash": "h2", "bytes": 2, "content_type": "image/jpeg"}
            ])))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let objects: Vec<Object> = conn
            .object_store()
            .objects("photos", &Query::new().limit(2))
            .await
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].container.as_deref(), Some("photos"));
        assert_eq!(objects[1].etag.as_deref(), Some("h2"));
    }

    /// Without a limit, listings keep paging while the count header reports more
    #[tokio::test]
    async fn test_object_listing_follows_count_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p/photos"))
            .and(query_param("marker", "b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-container-object-count", "3")
                    .set_body_json(json!([{"name": "c"}])),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p/photos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-container-object-count", "3")
                    .set_body_json(json!([{"name": "a"}, {"name": "b"}])),
            )
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let objects: Vec<Object> = conn
            .object_store()
            .objects("photos", &Query::new())
            .await
            .unwrap();
        let names: Vec<_> = objects.iter().filter_map(|o| o.name.as_deref()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    /// Account listings use the container count the same way
    #[tokio::test]
    async fn test_container_listing_follows_count_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p"))
            .and(query_param("marker", "c1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-account-container-count", "2")
                    .set_body_json(json!([{"name": "c2", "count": 0, "bytes": 0}])),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-account-container-count", "2")
                    .set_body_json(json!([{"name": "c1", "count": 4, "bytes": 512}])),
            )
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let containers = conn.object_store().containers(&Query::new()).await.unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].object_count, Some(4));
        assert_eq!(containers[1].name.as_deref(), Some("c2"));
    }

    /// Uploads send raw data and header attributes
    #[tokio::test]
    async fn test_upload_and_download_object() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/swift/v1/AUTH_p/photos/cat.txt"))
            .and(header("content-type", "text/plain"))
            .and(header("x-delete-after", "3600"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("etag", "abc123")
                    .insert_header("content-type", "text/html; charset=UTF-8"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/swift/v1/AUTH_p/photos/cat.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"meow".to_vec()))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let stored = conn
            .object_store()
            .upload_object(
                "photos",
                "cat.txt",
                b"meow".to_vec(),
                &Object {
                    content_type: Some("text/plain".into()),
                    delete_after: Some(3600),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(stored.etag.as_deref(), Some("abc123"));
        assert_eq!(stored.content_type.as_deref(), Some("text/plain"));
        assert_eq!(stored.container.as_deref(), Some("photos"));

        let data = conn
            .object_store()
            .download_object("photos", "cat.txt")
            .await
            .unwrap();
        assert_eq!(data, b"meow");
    }
}

/// Test module for status polling
mod wait_tests {
    use super::*;

    const FAST: Duration = Duration::from_millis(10);

    fn building() -> Server {
        Server {
            id: Some("s1".into()),
            status: Some("BUILD".into()),
            ..Default::default()
        }
    }

    async fn mount_status(server: &MockServer, status: &str) {
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/s1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"server": {"id": "s1", "status": status}})),
            )
            .mount(server)
            .await;
    }

    /// Already in the target state: no request at all
    #[tokio::test]
    async fn test_wait_returns_immediately() {
        let server = MockServer::start().await;
        let conn = connect(&server);
        let active = Server {
            status: Some("active".into()),
            ..building()
        };

        let done = conn
            .compute()
            .wait_for_status(&active, "ACTIVE", &["ERROR"], FAST, Some(FAST))
            .await
            .unwrap();
        assert_eq!(done.status.as_deref(), Some("active"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wait_reaches_status() {
        let server = MockServer::start().await;
        mount_status(&server, "ACTIVE").await;

        let conn = connect(&server);
        let done = conn
            .compute()
            .wait_for_status(&building(), "ACTIVE", &["ERROR"], FAST, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(done.status.as_deref(), Some("ACTIVE"));
    }

    #[tokio::test]
    async fn test_wait_failure_state() {
        let server = MockServer::start().await;
        mount_status(&server, "ERROR").await;

        let conn = connect(&server);
        let err = conn
            .compute()
            .wait_for_status(&building(), "ACTIVE", &["error"], FAST, Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceFailure(_)));
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let server = MockServer::start().await;
        mount_status(&server, "BUILD").await;

        let conn = connect(&server);
        let err = conn
            .compute()
            .wait_for_status(&building(), "ACTIVE", &["ERROR"], FAST, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceTimeout(_)));
    }

    #[tokio::test]
    async fn test_wait_for_delete() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/s1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let gone = conn
            .compute()
            .wait_for_delete(&building(), FAST, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(gone.id.as_deref(), Some("s1"));
    }

    /// A resource that vanishes while waiting for a status is a failure
    #[tokio::test]
    async fn test_wait_resource_disappears() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/s1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let conn = connect(&server);
        let err = conn
            .compute()
            .wait_for_status(&building(), "ACTIVE", &["ERROR"], FAST, Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceFailure(ref msg) if msg.contains("disappeared")));
    }

    /// A `deleted` status ends a delete wait like a 404 does
    #[tokio::test]
    async fn test_wait_for_delete_deleted_status() {
        let server = MockServer::start().await;
        mount_status(&server, "DELETED").await;

        let conn = connect(&server);
        let gone = conn
            .compute()
            .wait_for_delete(&building(), FAST, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(gone.status.as_deref(), Some("BUILD"));
    }

    #[tokio::test]
    async fn test_wait_for_delete_timeout() {
        let server = MockServer::start().await;
        mount_status(&server, "ACTIVE").await;

        let conn = connect(&server);
        let err = conn
            .compute()
            .wait_for_delete(&building(), FAST, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceTimeout(_)));
    }
}

/// Test module for session level headers and re-authentication
mod session_tests {
    use super::*;

    struct Rotating(AtomicUsize);

    #[async_trait]
    impl TokenSource for Rotating {
        async fn token(&self) -> ostack::Result<Option<String>> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("token-{}", n)))
        }

        fn can_refresh(&self) -> bool {
            true
        }
    }

    /// A 401 is retried once with a fresh token
    #[tokio::test]
    async fn test_reauth_on_401() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/identity/v3/projects/p1"))
            .and(header("x-auth-token", "token-0"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/identity/v3/projects/p1"))
            .and(header("x-auth-token", "token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project": {"id": "p1", "name": "demo"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = builder(&server)
            .credentials(Credentials::new(Rotating(AtomicUsize::new(0))))
            .build()
            .unwrap();
        let conn = Connection::new(session);
        let project = conn.identity().get_project("p1").await.unwrap();
        assert_eq!(project.name.as_deref(), Some("demo"));
    }

    /// A static token cannot be refreshed, so the 401 surfaces
    #[tokio::test]
    async fn test_static_token_401_is_returned() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/identity/v3/projects/p1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connect(&server);
        let err = conn.identity().get_project("p1").await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(401));
    }

    /// The global request id goes out on every call
    #[tokio::test]
    async fn test_global_request_id_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks/n1"))
            .and(header("x-openstack-request-id", "req-fixed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "network": {"id": "n1", "router:external": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = builder(&server)
            .token(TOKEN)
            .global_request_id("req-fixed")
            .build()
            .unwrap();
        let network = Connection::new(session)
            .network()
            .get_network("n1")
            .await
            .unwrap();
        assert_eq!(network.is_router_external, Some(true));
    }
}

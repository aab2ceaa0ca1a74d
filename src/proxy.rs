//! Generic service proxy
//!
//! A [`Proxy`] binds a [`Session`] to one service. The per-service proxies in
//! [`crate::services`] wrap it with typed `create_*`/`get_*`/... methods.

use crate::cloud::http::{RequestOptions, Response};
use crate::cloud::session::{ServiceType, Session};
use crate::error::{Error, Result};
use crate::resource::{self, base, Pager, Query, Resource, UriParams};
use futures::Stream;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Proxy {
    session: Session,
    service: ServiceType,
}

impl Proxy {
    /// Proxy for `service` over `session`
    pub fn new(session: Session, service: ServiceType) -> Self {
        Self { session, service }
    }

    /// Session requests go through
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Service this proxy talks to
    pub fn service(&self) -> ServiceType {
        self.service
    }

    /// Create `resource` on the server
    pub async fn create<R: Resource>(&self, resource: &R) -> Result<R> {
        resource::create(&self.session, resource).await
    }

    /// Fetch by id; a 404 becomes [`Error::ResourceNotFound`]
    pub async fn get<R: Resource>(&self, id: &str, uri: &UriParams) -> Result<R> {
        resource::fetch(&self.session, id, uri)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => {
                    Error::ResourceNotFound(format!("No {} found for {}", R::KIND, id))
                },
                other => other,
            })
    }

    /// Fetch header attributes by id with `HEAD`
    pub async fn head<R: Resource>(&self, id: &str, uri: &UriParams) -> Result<R> {
        resource::head(&self.session, id, uri).await
    }

    /// Find by name or id; `None` on a miss when `ignore_missing` is set
    pub async fn find<R: Resource>(
        &self,
        name_or_id: &str,
        uri: &UriParams,
        query: &Query,
        ignore_missing: bool,
    ) -> Result<Option<R>> {
        resource::find(&self.session, name_or_id, uri, query, ignore_missing).await
    }

    /// List every page of a collection
    pub async fn list<R: Resource>(&self, query: &Query, uri: &UriParams) -> Result<Vec<R>> {
        resource::list(&self.session, query, uri).await
    }

    /// Page-by-page cursor over a collection
    pub fn pager<R: Resource>(&self, query: &Query, uri: &UriParams) -> Result<Pager<R>> {
        Pager::new(&self.session, query, uri)
    }

    /// Lazily paged listing
    pub fn list_stream<R: Resource>(
        &self,
        query: &Query,
        uri: &UriParams,
    ) -> Result<impl Stream<Item = Result<R>>> {
        Ok(self.pager::<R>(query, uri)?.into_stream())
    }

    /// Update with the non-null attributes of `changes`
    pub async fn update<R: Resource, T: Serialize + ?Sized>(
        &self,
        id: &str,
        changes: &T,
        uri: &UriParams,
    ) -> Result<R> {
        let changes = base::to_attrs(changes)?;
        resource::commit(&self.session, id, changes, uri).await
    }

    /// Update with an explicit change set; `null` values clear attributes
    pub async fn update_attrs<R: Resource>(
        &self,
        id: &str,
        changes: Map<String, Value>,
        uri: &UriParams,
    ) -> Result<R> {
        resource::commit(&self.session, id, changes, uri).await
    }

    /// Delete by id; returns `false` when missing and `ignore_missing` is set
    pub async fn delete<R: Resource>(
        &self,
        id: &str,
        uri: &UriParams,
        ignore_missing: bool,
    ) -> Result<bool> {
        match resource::delete::<R>(&self.session, id, uri).await {
            Ok(()) => Ok(true),
            Err(e) if ignore_missing && e.is_not_found() => {
                tracing::debug!("{} {} already gone", R::KIND, id);
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    /// Poll until the status reads `status`
    pub async fn wait_for_status<R: Resource>(
        &self,
        resource: &R,
        status: &str,
        failures: &[&str],
        interval: Duration,
        wait: Option<Duration>,
    ) -> Result<R> {
        resource::wait_for_status(&self.session, resource, status, failures, interval, wait)
            .await
    }

    /// Poll until the resource is gone
    pub async fn wait_for_delete<R: Resource>(
        &self,
        resource: &R,
        interval: Duration,
        wait: Option<Duration>,
    ) -> Result<R> {
        resource::wait_for_delete(&self.session, resource, interval, wait).await
    }

    /// Raw request against this proxy's service, for actions
    pub async fn request(&self, method: Method, path: &str, opts: RequestOptions) -> Result<Response> {
        self.session.request(self.service, method, path, opts).await
    }

    /// `POST {path}` with a JSON body
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Response> {
        self.request(Method::POST, path, RequestOptions::new().json(body))
            .await
    }
}

//! Identity service: projects and users

use crate::cloud::session::{ServiceType, Session};
use crate::error::Result;
use crate::proxy::Proxy;
use crate::resource::{CommitMethod, Query, QueryParameters, Resource, UriParams};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Project {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub domain_id: Option<String>,
    pub parent_id: Option<String>,
    pub enabled: Option<bool>,
    pub is_domain: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl Resource for Project {
    const KIND: &'static str = "Project";
    const SERVICE: ServiceType = ServiceType::Identity;
    const BASE_PATH: &'static str = "/projects";
    const RESOURCE_KEY: Option<&'static str> = Some("project");
    const RESOURCES_KEY: Option<&'static str> = Some("projects");
    const PAGINATION_KEY: Option<&'static str> = Some("links");
    const COMMIT_METHOD: CommitMethod = CommitMethod::Patch;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["name", "domain_id", "parent_id", "enabled", "is_domain", "tags"])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct User {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub domain_id: Option<String>,
    pub default_project_id: Option<String>,
    pub email: Option<String>,
    pub enabled: Option<bool>,
    /// Write only
    pub password: Option<String>,
    pub password_expires_at: Option<String>,
}

impl Resource for User {
    const KIND: &'static str = "User";
    const SERVICE: ServiceType = ServiceType::Identity;
    const BASE_PATH: &'static str = "/users";
    const RESOURCE_KEY: Option<&'static str> = Some("user");
    const RESOURCES_KEY: Option<&'static str> = Some("users");
    const PAGINATION_KEY: Option<&'static str> = Some("links");
    const COMMIT_METHOD: CommitMethod = CommitMethod::Patch;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn query_parameters() -> QueryParameters {
        QueryParameters::new(&["name", "domain_id", "enabled", "password_expires_at"])
    }
}

/// Identity service proxy
#[derive(Debug, Clone)]
pub struct IdentityProxy {
    proxy: Proxy,
}

impl Deref for IdentityProxy {
    type Target = Proxy;

    fn deref(&self) -> &Proxy {
        &self.proxy
    }
}

impl IdentityProxy {
    /// Proxy for the identity service
    pub fn new(session: Session) -> Self {
        Self {
            proxy: Proxy::new(session, ServiceType::Identity),
        }
    }

    /// Create a project
    pub async fn create_project(&self, project: &Project) -> Result<Project> {
        self.proxy.create(project).await
    }

    /// Get a project by id
    pub async fn get_project(&self, id: &str) -> Result<Project> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find a project; names are only unique within a domain
    pub async fn find_project(
        &self,
        name_or_id: &str,
        domain_id: Option<&str>,
        ignore_missing: bool,
    ) -> Result<Option<Project>> {
        let mut query = Query::new();
        if let Some(domain_id) = domain_id {
            query.insert("domain_id", domain_id);
        }
        self.proxy
            .find(name_or_id, &UriParams::new(), &query, ignore_missing)
            .await
    }

    /// List projects
    pub async fn projects(&self, query: &Query) -> Result<Vec<Project>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update a project
    pub async fn update_project<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<Project> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete a project
    pub async fn delete_project(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<Project>(id, &UriParams::new(), ignore_missing)
            .await
    }

    /// Create an user
    pub async fn create_user(&self, user: &User) -> Result<User> {
        self.proxy.create(user).await
    }

    /// Get an user by id
    pub async fn get_user(&self, id: &str) -> Result<User> {
        self.proxy.get(id, &UriParams::new()).await
    }

    /// Find an user by name or id
    pub async fn find_user(
        &self,
        name_or_id: &str,
        domain_id: Option<&str>,
        ignore_missing: bool,
    ) -> Result<Option<User>> {
        let mut query = Query::new();
        if let Some(domain_id) = domain_id {
            query.insert("domain_id", domain_id);
        }
        self.proxy
            .find(name_or_id, &UriParams::new(), &query, ignore_missing)
            .await
    }

    /// List users
    pub async fn users(&self, query: &Query) -> Result<Vec<User>> {
        self.proxy.list(query, &UriParams::new()).await
    }

    /// Update an user
    pub async fn update_user<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> Result<User> {
        self.proxy.update(id, changes, &UriParams::new()).await
    }

    /// Delete an user
    pub async fn delete_user(&self, id: &str, ignore_missing: bool) -> Result<bool> {
        self.proxy
            .delete::<User>(id, &UriParams::new(), ignore_missing)
            .await
    }
}

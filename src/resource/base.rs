//! Resource base
//!
//! A [`Resource`] declares its wire schema (serde fields plus the descriptors
//! in [`super::field`]) and which verbs the server allows. The free functions
//! here turn those declarations into HTTP requests.

use super::field::{self, HeaderField, Query, QueryParameters, UriParams};
use super::pager;
use crate::cloud::http::{RequestOptions, Response};
use crate::cloud::session::{ServiceType, Session};
use crate::error::{Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

const JSON_PATCH_CONTENT_TYPE: &str = "application/openstack-images-v2.1-json-patch";

/// Verbs a resource type allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub create: bool,
    pub fetch: bool,
    pub list: bool,
    pub commit: bool,
    pub delete: bool,
    pub head: bool,
    pub paginated: bool,
}

impl Capabilities {
    pub const CRUD: Self = Self {
        create: true,
        fetch: true,
        list: true,
        commit: true,
        delete: true,
        head: false,
        paginated: true,
    };

    pub const READ_ONLY: Self = Self {
        create: false,
        fetch: true,
        list: true,
        commit: false,
        delete: false,
        head: false,
        paginated: true,
    };
}

/// How new resources are sent to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMethod {
    /// `POST` to the collection
    Post,
    /// `PUT` to `{base_path}/{id}`, the id being chosen by the client
    Put,
}

/// How changes to an existing resource are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMethod {
    Put,
    Patch,
    Post,
    /// `PATCH` with a JSON-Patch document
    JsonPatch,
}

impl CommitMethod {
    fn http_method(self) -> Method {
        match self {
            CommitMethod::Put => Method::PUT,
            CommitMethod::Patch | CommitMethod::JsonPatch => Method::PATCH,
            CommitMethod::Post => Method::POST,
        }
    }
}

/// A server-side entity type and its wire schema
pub trait Resource:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Name used in messages
    const KIND: &'static str;
    const SERVICE: ServiceType;
    /// Collection path; `{name}` placeholders are URI fields
    const BASE_PATH: &'static str;
    /// Collection path for listing, when it differs (e.g. `/servers/detail`)
    const LIST_PATH: Option<&'static str> = None;
    const RESOURCE_KEY: Option<&'static str> = None;
    const RESOURCES_KEY: Option<&'static str> = None;
    /// Where next links live; defaults to `{resources_key}_links`
    const PAGINATION_KEY: Option<&'static str> = None;
    const CAPABILITIES: Capabilities = Capabilities::CRUD;
    const CREATE_METHOD: CreateMethod = CreateMethod::Post;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Put;
    /// Whether requests and responses carry a JSON body (object storage does not)
    const HAS_BODY: bool = true;
    const ID_ATTR: &'static str = "id";
    const HEADER_FIELDS: &'static [HeaderField] = &[];
    /// Header prefix collected into the `metadata` attribute
    const METADATA_PREFIX: Option<&'static str> = None;
    /// Header holding the collection's total size; listings keep paging by
    /// marker while it exceeds the items seen
    const COUNT_HEADER: Option<&'static str> = None;

    fn id(&self) -> Option<&str>;

    fn name(&self) -> Option<&str> {
        None
    }

    fn status(&self) -> Option<&str> {
        None
    }

    /// Accepted list filters
    fn query_parameters() -> QueryParameters {
        QueryParameters::default()
    }
}

fn require(allowed: bool, kind: &str, method: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::not_supported(kind, method))
    }
}

pub(crate) fn collection_path<R: Resource>(uri: &UriParams) -> Result<String> {
    field::render_path(R::BASE_PATH, uri, R::KIND)
}

pub(crate) fn item_path<R: Resource>(uri: &UriParams, id: &str) -> Result<String> {
    if id.is_empty() {
        return Err(Error::InvalidRequest(format!("{} requires an id", R::KIND)));
    }
    let base = collection_path::<R>(uri)?;
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(id)
    ))
}

/// Serialize a value into an attribute map, dropping nulls
pub(crate) fn to_attrs<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.retain(|_, v| !v.is_null());
            Ok(map)
        },
        Value::Null => Ok(Map::new()),
        other => Err(Error::InvalidRequest(format!(
            "expected an object of attributes, got {}",
            other
        ))),
    }
}

fn from_attrs<R: Resource>(attrs: Map<String, Value>) -> Result<R> {
    Ok(serde_json::from_value(Value::Object(attrs))?)
}

/// URI parameters carried by a resource value itself
pub fn uri_params_of<R: Resource>(resource: &R) -> Result<UriParams> {
    let attrs = to_attrs(resource)?;
    Ok(field::path_params(R::BASE_PATH)
        .into_iter()
        .filter_map(|name| {
            let value = match attrs.get(name)? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((name.to_string(), value))
        })
        .collect())
}

/// Move URI, header and metadata attributes out of the body
fn prepare<R: Resource>(mut attrs: Map<String, Value>) -> Result<(Map<String, Value>, RequestOptions)> {
    let mut opts = RequestOptions::new();

    for name in field::path_params(R::BASE_PATH) {
        attrs.remove(name);
    }

    for header_field in R::HEADER_FIELDS {
        if let Some(value) = attrs.remove(header_field.attr) {
            if header_field.read_only {
                continue;
            }
            if let Some(value) = field::header_value(&value) {
                opts = opts.header(header_field.header, &value)?;
            }
        }
    }

    if let Some(prefix) = R::METADATA_PREFIX {
        if let Some(Value::Object(metadata)) = attrs.remove("metadata") {
            for (key, value) in metadata {
                if let Some(value) = field::header_value(&value) {
                    opts = opts.header(&format!("{}{}", prefix, key), &value)?;
                }
            }
        }
    }

    Ok((attrs, opts))
}

/// Request headers carried by a resource's header and metadata fields
pub(crate) fn header_options<R: Resource>(resource: &R) -> Result<RequestOptions> {
    let (_, opts) = prepare::<R>(to_attrs(resource)?)?;
    Ok(opts)
}

fn wrap_body<R: Resource>(attrs: Map<String, Value>) -> Option<Value> {
    if !R::HAS_BODY {
        return None;
    }
    match R::RESOURCE_KEY {
        Some(key) => {
            let mut envelope = Map::new();
            envelope.insert(key.to_string(), Value::Object(attrs));
            Some(Value::Object(envelope))
        },
        None if attrs.is_empty() => None,
        None => Some(Value::Object(attrs)),
    }
}

/// JSON-Patch operations for a change set
pub(crate) fn json_patch(changes: &Map<String, Value>) -> Value {
    Value::Array(
        changes
            .iter()
            .map(|(key, value)| {
                let path = format!("/{}", key.replace('~', "~0").replace('/', "~1"));
                if value.is_null() {
                    json!({ "op": "remove", "path": path })
                } else {
                    json!({ "op": "add", "path": path, "value": value })
                }
            })
            .collect(),
    )
}

/// Merge header fields and metadata headers into an attribute map
fn merge_headers<R: Resource>(response: &Response, attrs: &mut Map<String, Value>) {
    for header_field in R::HEADER_FIELDS {
        if let Some(value) = header_field.read(&response.headers) {
            attrs.insert(header_field.attr.to_string(), value);
        }
    }

    if let Some(prefix) = R::METADATA_PREFIX {
        let metadata = field::read_metadata(&response.headers, prefix);
        if !metadata.is_empty() {
            match attrs.get_mut("metadata") {
                Some(Value::Object(existing)) => existing.extend(metadata),
                _ => {
                    attrs.insert("metadata".to_string(), Value::Object(metadata));
                },
            }
        }
    }
}

pub(crate) fn inject_uri(attrs: &mut Map<String, Value>, uri: &UriParams) {
    for (key, value) in uri.iter() {
        attrs
            .entry(key.to_string())
            .or_insert_with(|| Value::String(value.to_string()));
    }
}

/// Build a resource from a response, on top of already known attributes
pub(crate) fn translate<R: Resource>(
    response: &Response,
    has_body: bool,
    mut attrs: Map<String, Value>,
    uri: &UriParams,
) -> Result<R> {
    if has_body {
        let body = match (R::RESOURCE_KEY, response.json()?) {
            (Some(key), Value::Object(mut obj)) if obj.contains_key(key) => {
                obj.remove(key).unwrap_or(Value::Null)
            },
            (_, body) => body,
        };
        match body {
            Value::Object(mut obj) => {
                obj.remove("self");
                attrs.extend(obj);
            },
            Value::Null => {},
            other => {
                return Err(Error::Sdk(format!(
                    "unexpected {} response body: {}",
                    R::KIND,
                    other
                )))
            },
        }
    }

    merge_headers::<R>(response, &mut attrs);
    inject_uri(&mut attrs, uri);
    from_attrs(attrs)
}

fn seed<R: Resource>(id: &str) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert(R::ID_ATTR.to_string(), Value::String(id.to_string()));
    attrs
}

/// Create a resource on the server
pub async fn create<R: Resource>(session: &Session, resource: &R) -> Result<R> {
    require(R::CAPABILITIES.create, R::KIND, "create")?;

    let uri = uri_params_of(resource)?;
    let attrs = to_attrs(resource)?;
    let (body, opts) = prepare::<R>(attrs.clone())?;

    let (method, path) = match R::CREATE_METHOD {
        CreateMethod::Post => (Method::POST, collection_path::<R>(&uri)?),
        CreateMethod::Put => {
            let id = resource.id().ok_or_else(|| {
                Error::InvalidRequest(format!("{} must have an id to be created", R::KIND))
            })?;
            (Method::PUT, item_path::<R>(&uri, id)?)
        },
    };

    let opts = match wrap_body::<R>(body) {
        Some(body) => opts.json(body),
        None => opts,
    };

    let response = session.request(R::SERVICE, method, &path, opts).await?;
    translate(&response, R::HAS_BODY, attrs, &uri)
}

/// Fetch a resource by id
pub async fn fetch<R: Resource>(session: &Session, id: &str, uri: &UriParams) -> Result<R> {
    require(R::CAPABILITIES.fetch, R::KIND, "fetch")?;

    let path = item_path::<R>(uri, id)?;
    let response = session
        .request(R::SERVICE, Method::GET, &path, RequestOptions::new())
        .await?;
    translate(&response, R::HAS_BODY, seed::<R>(id), uri)
}

/// Fetch only the header attributes of a resource
pub async fn head<R: Resource>(session: &Session, id: &str, uri: &UriParams) -> Result<R> {
    require(R::CAPABILITIES.head, R::KIND, "head")?;

    let path = item_path::<R>(uri, id)?;
    let response = session
        .request(R::SERVICE, Method::HEAD, &path, RequestOptions::new())
        .await?;
    translate(&response, false, seed::<R>(id), uri)
}

/// Send a change set for an existing resource
pub async fn commit<R: Resource>(
    session: &Session,
    id: &str,
    changes: Map<String, Value>,
    uri: &UriParams,
) -> Result<R> {
    require(R::CAPABILITIES.commit, R::KIND, "commit")?;

    let path = item_path::<R>(uri, id)?;
    let mut known = seed::<R>(id);
    known.extend(changes.iter().filter(|(_, v)| !v.is_null()).map(|(k, v)| (k.clone(), v.clone())));

    let (body, opts) = prepare::<R>(changes)?;
    let opts = match R::COMMIT_METHOD {
        CommitMethod::JsonPatch => {
            let patch = serde_json::to_vec(&json_patch(&body))?;
            opts.raw(patch, JSON_PATCH_CONTENT_TYPE)
        },
        _ => match wrap_body::<R>(body) {
            Some(body) => opts.json(body),
            None => opts,
        },
    };

    let response = session
        .request(R::SERVICE, R::COMMIT_METHOD.http_method(), &path, opts)
        .await?;
    translate(&response, R::HAS_BODY, known, uri)
}

/// Delete a resource by id
pub async fn delete<R: Resource>(session: &Session, id: &str, uri: &UriParams) -> Result<()> {
    require(R::CAPABILITIES.delete, R::KIND, "delete")?;

    let path = item_path::<R>(uri, id)?;
    session
        .request(R::SERVICE, Method::DELETE, &path, RequestOptions::new())
        .await?;
    Ok(())
}

/// Re-read a resource using its own id and URI attributes
pub async fn refresh<R: Resource>(session: &Session, resource: &R) -> Result<R> {
    let id = resource
        .id()
        .ok_or_else(|| Error::InvalidRequest(format!("{} has no id to refresh", R::KIND)))?;
    let uri = uri_params_of(resource)?;

    if R::CAPABILITIES.fetch {
        fetch(session, id, &uri).await
    } else if R::CAPABILITIES.head {
        head(session, id, &uri).await
    } else {
        Err(Error::not_supported(R::KIND, "fetch"))
    }
}

/// Resolve a name or id to a single resource
///
/// Tries a direct fetch first, then lists (filtering by name on the server
/// when the resource supports it) and matches on id or name.
pub async fn find<R: Resource>(
    session: &Session,
    name_or_id: &str,
    uri: &UriParams,
    query: &Query,
    ignore_missing: bool,
) -> Result<Option<R>> {
    if R::CAPABILITIES.fetch && !name_or_id.is_empty() {
        match fetch::<R>(session, name_or_id, uri).await {
            Ok(found) => return Ok(Some(found)),
            // An invalid id format shows up as 400 or 403 on some services
            Err(Error::NotFound(_) | Error::BadRequest(_) | Error::Forbidden(_)) => {},
            Err(e) => return Err(e),
        }
    }

    let mut matched = None;
    if R::CAPABILITIES.list {
        let mut query = query.clone();
        if R::query_parameters().contains("name") && !query.contains("name") {
            query.insert("name", name_or_id);
        }
        let candidates = pager::list::<R>(session, &query, uri).await?;
        matched = get_one_match(name_or_id, candidates)?;
    }

    match matched {
        Some(found) => Ok(Some(found)),
        None if ignore_missing => Ok(None),
        None => Err(Error::ResourceNotFound(format!(
            "No {} found for {}",
            R::KIND,
            name_or_id
        ))),
    }
}

/// The single item whose id or name equals `name_or_id`
pub fn get_one_match<R: Resource>(
    name_or_id: &str,
    candidates: impl IntoIterator<Item = R>,
) -> Result<Option<R>> {
    let mut found = None;
    for candidate in candidates {
        if candidate.id() == Some(name_or_id) || candidate.name() == Some(name_or_id) {
            if found.is_some() {
                return Err(Error::DuplicateResource(format!(
                    "More than one {} exists with the name '{}'",
                    R::KIND,
                    name_or_id
                )));
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

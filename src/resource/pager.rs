//! Resource Pager
//!
//! Walks a collection page by page, following whatever cursor the service
//! hands back: a `*_links` entry, a `next` field, a `Link` header, or, as a
//! last resort, `marker` paging when the caller asked for a limit or a count
//! header reports items not yet seen.

use super::base::{inject_uri, Resource};
use super::field::{self, Query, UriParams};
use crate::cloud::http::{RequestOptions, Response};
use crate::cloud::session::Session;
use crate::error::{Error, Result};
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Cursor over the pages of a collection
pub struct Pager<R> {
    session: Session,
    uri: UriParams,
    next_url: Option<String>,
    params: BTreeMap<String, String>,
    limit: Option<String>,
    yielded: u64,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Pager<R> {
    pub fn new(session: &Session, query: &Query, uri: &UriParams) -> Result<Self> {
        if !R::CAPABILITIES.list {
            return Err(Error::not_supported(R::KIND, "list"));
        }

        let params = R::query_parameters().transpose(query, R::KIND)?;
        let path = field::render_path(R::LIST_PATH.unwrap_or(R::BASE_PATH), uri, R::KIND)?;
        let limit = params.get("limit").cloned();

        Ok(Self {
            session: session.clone(),
            uri: uri.clone(),
            next_url: Some(path),
            params,
            limit,
            yielded: 0,
            _resource: PhantomData,
        })
    }

    /// Fetch the next page; `None` once the collection is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<R>>> {
        let Some(url) = self.next_url.take() else {
            return Ok(None);
        };

        let opts = RequestOptions::new().queries(self.params.clone());
        let response = self
            .session
            .request(R::SERVICE, Method::GET, &url, opts)
            .await?;
        let data = response.json()?;

        // Cursor parameters are replaced by whatever the next link says
        let last_marker = self.params.remove("marker");
        self.params.remove("limit");

        let mut items = Vec::new();
        let mut marker = None;
        for raw in extract_items(&data, R::RESOURCES_KEY)? {
            let Value::Object(mut attrs) = raw else {
                return Err(Error::Sdk(format!(
                    "unexpected {} list item: {}",
                    R::KIND,
                    raw
                )));
            };
            attrs.remove("self");
            inject_uri(&mut attrs, &self.uri);
            let item: R = serde_json::from_value(Value::Object(attrs))?;
            marker = item.id().map(|s| s.to_string());
            items.push(item);
        }

        tracing::debug!("{}: fetched page of {} items from {}", R::KIND, items.len(), url);
        self.yielded += items.len() as u64;

        let total = R::COUNT_HEADER
            .and_then(|name| response.header(name))
            .and_then(|value| value.trim().parse::<u64>().ok());
        let state = PageState {
            marker: marker.as_deref(),
            limit: self.limit.as_deref(),
            more: total.is_some_and(|total| total > self.yielded),
        };

        if !items.is_empty() && R::CAPABILITIES.paginated {
            if let Some((next_url, next_params)) = next_request(
                &url,
                &response,
                &data,
                R::RESOURCES_KEY,
                R::PAGINATION_KEY,
                &state,
            )? {
                if last_marker.is_some() && next_params.get("marker") == last_marker.as_ref() {
                    return Err(Error::Sdk(format!(
                        "Endless pagination loop detected listing {}, aborting",
                        R::KIND
                    )));
                }
                self.params.extend(next_params);
                self.next_url = Some(next_url);
            }
        }

        Ok(Some(items))
    }

    /// Fetch all pages
    pub async fn collect_all(mut self) -> Result<Vec<R>> {
        let mut all_items = Vec::new();
        while let Some(page) = self.next_page().await? {
            all_items.extend(page);
        }
        Ok(all_items)
    }

    /// Items of every page as a stream, fetching pages lazily
    pub fn into_stream(self) -> impl Stream<Item = Result<R>> {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok::<_, Error>(page.map(|items| (stream::iter(items.into_iter().map(Ok)), pager)))
        })
        .try_flatten()
    }
}

/// List every item of a collection
pub async fn list<R: Resource>(session: &Session, query: &Query, uri: &UriParams) -> Result<Vec<R>> {
    Pager::<R>::new(session, query, uri)?.collect_all().await
}

/// Items of a list response body
fn extract_items(data: &Value, resources_key: Option<&str>) -> Result<Vec<Value>> {
    let items = match resources_key {
        Some(key) => data.get(key).cloned().unwrap_or(Value::Null),
        None => data.clone(),
    };

    match items {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        item @ Value::Object(_) => Ok(vec![item]),
        other => Err(Error::Sdk(format!("unexpected list response: {}", other))),
    }
}

/// Next link advertised in the body, if any
fn body_next_link(
    data: &Value,
    resources_key: Option<&str>,
    pagination_key: Option<&str>,
) -> Option<String> {
    let obj = data.as_object()?;

    let key = pagination_key
        .map(|k| k.to_string())
        .or_else(|| resources_key.map(|k| format!("{}_links", k)));

    let from_links = key.and_then(|key| match obj.get(&key)? {
        Value::Array(links) => links.iter().find_map(|link| {
            if link.get("rel")?.as_str()? == "next" {
                link.get("href")?.as_str().map(|s| s.to_string())
            } else {
                None
            }
        }),
        // identity: {"links": {"next": "...", "self": "..."}}
        Value::Object(links) => links.get("next")?.as_str().map(|s| s.to_string()),
        _ => None,
    });

    // image: top-level "next"
    from_links.or_else(|| obj.get("next")?.as_str().map(|s| s.to_string()))
}

/// Split a link into its path (or absolute URL) and query parameters
fn split_link(link: &str) -> Result<(String, BTreeMap<String, String>)> {
    if link.starts_with("http://") || link.starts_with("https://") {
        let mut url = url::Url::parse(link)?;
        let params = url.query_pairs().into_owned().collect();
        url.set_query(None);
        return Ok((url.to_string(), params));
    }

    match link.split_once('?') {
        Some((path, query)) => Ok((
            path.to_string(),
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        )),
        None => Ok((link.to_string(), BTreeMap::new())),
    }
}

/// Cursor state after reading a page
struct PageState<'a> {
    /// Id of the last item on the page
    marker: Option<&'a str>,
    limit: Option<&'a str>,
    /// A count header reports more items than have been yielded
    more: bool,
}

/// Work out the URL and parameters of the next page
fn next_request(
    current: &str,
    response: &Response,
    data: &Value,
    resources_key: Option<&str>,
    pagination_key: Option<&str>,
    state: &PageState<'_>,
) -> Result<Option<(String, BTreeMap<String, String>)>> {
    let mut next_link = body_next_link(data, resources_key, pagination_key).map(|link| {
        // "/v2/images?marker=..." is relative to the unversioned root
        if link.starts_with("/v") {
            match link[1..].find('/') {
                Some(idx) => link[idx + 1..].to_string(),
                None => link,
            }
        } else {
            link
        }
    });

    if next_link.is_none() {
        next_link = response.next_link();
    }

    if let Some(link) = next_link {
        return split_link(&link).map(Some);
    }

    // No cursor from the server: keep asking by marker while the caller is
    // paging with a limit or the count header says items remain
    let limit = state.limit.filter(|limit| *limit != "0");
    match state.marker {
        Some(marker) if limit.is_some() || state.more => {
            let mut params = BTreeMap::new();
            params.insert("marker".to_string(), marker.to_string());
            if let Some(limit) = limit {
                params.insert("limit".to_string(), limit.to_string());
            }
            Ok(Some((current.to_string(), params)))
        },
        _ => Ok(None),
    }
}

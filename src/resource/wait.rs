//! Polling helpers for resources that change state asynchronously

use super::base::{self, Resource};
use crate::cloud::session::Session;
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Delay between two polls
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
/// How long the per-service helpers wait before giving up
pub const DEFAULT_WAIT: Duration = Duration::from_secs(120);

fn attribute_matches(value: Option<&str>, wanted: &str) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case(wanted))
}

/// Poll `resource` until `attribute` reads `value`
///
/// Fails with [`Error::ResourceFailure`] when the attribute reaches one of
/// `failures` or the resource disappears, and with [`Error::ResourceTimeout`]
/// once `wait` has elapsed. `None` waits forever.
pub async fn wait_for_attribute<R, F>(
    session: &Session,
    resource: &R,
    attribute: F,
    value: &str,
    failures: &[&str],
    interval: Duration,
    wait: Option<Duration>,
) -> Result<R>
where
    R: Resource,
    F: Fn(&R) -> Option<&str>,
{
    if attribute_matches(attribute(resource), value) {
        return Ok(resource.clone());
    }

    let deadline = wait.map(|w| Instant::now() + w);
    let id = resource.id().unwrap_or("-").to_string();

    loop {
        let current = match base::refresh(session, resource).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                return Err(Error::ResourceFailure(format!(
                    "{} {} disappeared while waiting for '{}'",
                    R::KIND,
                    id,
                    value
                )))
            },
            Err(e) => return Err(e),
        };

        let seen = attribute(&current);
        if attribute_matches(seen, value) {
            return Ok(current);
        }

        if let Some(state) = seen {
            if failures.iter().any(|f| f.eq_ignore_ascii_case(state)) {
                return Err(Error::ResourceFailure(format!(
                    "{} {} transitioned to failure state {}",
                    R::KIND,
                    id,
                    state
                )));
            }
        }

        tracing::debug!(
            "Still waiting for {} {} to reach '{}', currently {}",
            R::KIND,
            id,
            value,
            seen.unwrap_or("-")
        );

        if deadline.is_some_and(|d| Instant::now() + interval > d) {
            return Err(Error::ResourceTimeout(format!(
                "Timeout waiting for {} {} to reach '{}'",
                R::KIND,
                id,
                value
            )));
        }
        sleep(interval).await;
    }
}

/// Poll `resource` until its status reads `status`
pub async fn wait_for_status<R: Resource>(
    session: &Session,
    resource: &R,
    status: &str,
    failures: &[&str],
    interval: Duration,
    wait: Option<Duration>,
) -> Result<R> {
    wait_for_attribute(session, resource, R::status, status, failures, interval, wait).await
}

/// Poll `resource` until the server no longer knows it
///
/// Returns the resource as it was passed in. A `deleted` status counts as
/// gone.
pub async fn wait_for_delete<R: Resource>(
    session: &Session,
    resource: &R,
    interval: Duration,
    wait: Option<Duration>,
) -> Result<R> {
    let deadline = wait.map(|w| Instant::now() + w);
    let id = resource.id().unwrap_or("-").to_string();

    loop {
        match base::refresh(session, resource).await {
            Err(e) if e.is_not_found() => return Ok(resource.clone()),
            Err(e) => return Err(e),
            Ok(current) if attribute_matches(current.status(), "deleted") => {
                return Ok(resource.clone())
            },
            Ok(_) => {},
        }

        tracing::debug!("Still waiting for {} {} to be deleted", R::KIND, id);

        if deadline.is_some_and(|d| Instant::now() + interval > d) {
            return Err(Error::ResourceTimeout(format!(
                "Timeout waiting for {} {} to delete",
                R::KIND,
                id
            )));
        }
        sleep(interval).await;
    }
}

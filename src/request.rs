use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Credentials;
use crate::range::QueryWindow;
use crate::{info_time, Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CHANGES_PATH: &str = "api/v9/changes";

/// An authenticated connection to Swarm, owned by exactly one query.
/// Released when dropped, whichever way the query ends.
pub struct SwarmSession {
    // Client uses Arc internally, cloning is cheap but a session is never shared.
    client: Client,
    base: Url,
    credentials: Credentials,
}

impl SwarmSession {
    pub fn open(swarm_url: &str, credentials: &Credentials) -> Result<Self> {
        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = if swarm_url.ends_with('/') {
            swarm_url.to_string()
        } else {
            format!("{swarm_url}/")
        };
        let base = Url::parse(&base).map_err(|e| Error::InvalidUrl(format!("{swarm_url}: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("swarm-commits/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        tracing::debug!(%base, user = %credentials.username, "opened swarm session");
        Ok(Self {
            client,
            base,
            credentials: credentials.clone(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds `<base>/<path>?<query>`.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// GETs `url` with basic auth and returns the body. Non-2xx answers are errors.
    pub async fn get_text(&self, url: Url) -> Result<String> {
        let res = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(res.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Drop for SwarmSession {
    fn drop(&mut self) {
        tracing::debug!(base = %self.base, "closed swarm session");
    }
}

/// A changelist as listed by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Change {
    #[serde(alias = "change")]
    pub id: u64,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub description: String,
    /// Submit time, unix seconds (UTC).
    #[serde(default)]
    pub time: Option<i64>,
}

impl Change {
    pub fn committed(&self) -> Option<NaiveDateTime> {
        self.time
            .and_then(|t| DateTime::from_timestamp(t, 0))
            .map(|dt| dt.naive_utc())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChangeList {
    #[serde(default)]
    changes: Vec<Change>,
}

/// REST side of Swarm, for the batch flow.
pub struct SwarmClient {
    session: SwarmSession,
}

impl SwarmClient {
    pub fn new(session: SwarmSession) -> Self {
        Self { session }
    }

    /// Changes submitted inside `window`, at most `max`.
    /// Failures are logged and yield an empty list.
    pub async fn list_changes(&self, window: &QueryWindow, max: usize) -> Vec<Change> {
        let filter = window.filter();
        let max = max.to_string();
        let result = async {
            let url = self
                .session
                .url(CHANGES_PATH, &[("range", filter.as_str()), ("max", max.as_str())])?;
            self.session.get_json::<ChangeList>(url).await
        }
        .await;

        match result {
            Ok(list) => {
                info_time!("Listed {} changes for {}", list.changes.len(), filter);
                list.changes
            }
            Err(e) => {
                tracing::error!(%e, range = %filter, "failed to list changes");
                Vec::new()
            }
        }
    }

    /// Unified diff of changelist `id`, `None` when it could not be fetched.
    pub async fn change_diff(&self, id: u64) -> Option<String> {
        let result = async {
            let url = self.session.url(&format!("{CHANGES_PATH}/{id}/diff"), &[])?;
            self.session.get_text(url).await
        }
        .await;

        result
            .map_err(|e| tracing::warn!(change = id, %e, "failed to fetch diff"))
            .ok()
    }
}

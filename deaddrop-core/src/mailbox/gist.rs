//! Read side: fetch the current payload of a gist through the REST API.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::MailboxError;

const USER_AGENT: &str = concat!("deaddrop/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

/// Stateless reader for `GET {api_base}/gists/{id}`.
#[derive(Debug, Clone)]
pub struct GistFetcher {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GistFetcher {
    pub fn new(api_base: &str, token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Content of the first file (in filename order) of gist `endpoint_id`.
    pub async fn fetch(&self, endpoint_id: &str) -> Result<Vec<u8>, MailboxError> {
        if endpoint_id.is_empty()
            || !endpoint_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(MailboxError::fetch(endpoint_id, "invalid gist id"));
        }

        let url = format!("{}/gists/{}", self.api_base, endpoint_id);
        debug!(%url, "fetching mailbox");

        let gist: GistResponse = self
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MailboxError::fetch(endpoint_id, e))?
            .json()
            .await
            .map_err(|e| MailboxError::fetch(endpoint_id, e))?;

        let Some((name, file)) = gist.files.into_iter().next() else {
            return Err(MailboxError::fetch(endpoint_id, "No file in gist"));
        };

        match (file.truncated, file.raw_url, file.content) {
            (true, Some(raw_url), _) => {
                debug!(file = %name, "gist content truncated, following raw_url");
                let body = self
                    .get(&raw_url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| MailboxError::fetch(endpoint_id, e))?
                    .bytes()
                    .await
                    .map_err(|e| MailboxError::fetch(endpoint_id, e))?;
                Ok(body.to_vec())
            }
            (_, _, Some(content)) => Ok(content.into_bytes()),
            _ => Err(MailboxError::fetch(
                endpoint_id,
                format!("file '{}' has no content", name),
            )),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

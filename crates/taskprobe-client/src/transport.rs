use crate::error::{ClientError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// JSON over HTTP, shared by the tracker and node agent bindings.
#[derive(Clone)]
pub(crate) struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub(crate) fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                endpoint: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.send_json(&url, self.client.get(&url))
    }

    pub(crate) fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.send_json(&url, self.client.get(&url).query(query))
    }

    /// Sends the request and returns the raw status and body, leaving the
    /// interpretation of non-2xx codes to the caller.
    pub(crate) fn post_raw<B>(&self, path: &str, body: &B) -> Result<(u16, String)>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|source| ClientError::Transport {
                endpoint: url.clone(),
                source,
            })?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|source| ClientError::Transport {
            endpoint: url.clone(),
            source,
        })?;
        Ok((status, text))
    }

    fn send_json<T: DeserializeOwned>(&self, url: &str, request: RequestBuilder) -> Result<T> {
        tracing::trace!("[HTTP] {}", url);
        let response = request.send().map_err(|source| ClientError::Transport {
            endpoint: url.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().map_err(|source| ClientError::Transport {
            endpoint: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ClientError::Decode {
            endpoint: url.to_string(),
            reason: e.to_string(),
        })
    }
}

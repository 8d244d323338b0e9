use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::BiolinkMcpError;
use crate::sources::ClientConfig;

pub(crate) const BIOLINK_BASE: &str = "https://api-v3.monarchinitiative.org/v3/api/";

/// Thin client over the Monarch Biolink v3 REST API.
pub struct BiolinkClient {
    client: ClientWithMiddleware,
    base: Url,
}

impl BiolinkClient {
    pub fn new(config: &ClientConfig) -> Result<Self, BiolinkMcpError> {
        let base = parse_base(&config.base_url)?;
        Ok(Self {
            client: crate::sources::build_client(config)?,
            base,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, BiolinkMcpError> {
        Self::new(&ClientConfig {
            base_url: base,
            max_retries: 0,
            ..ClientConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Joins percent-encoded path segments under the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BiolinkMcpError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BiolinkMcpError::Config(format!("Base URL cannot carry a path: {}", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<Value, BiolinkMcpError> {
        let url = self.endpoint(segments)?;
        let path = url.to_string();
        debug!(url = %path, ?params, "Biolink GET");

        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|err| BiolinkMcpError::Network(format!("GET {path}: {err}")))?;
        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, &path).await?;

        if !status.is_success() {
            let detail = crate::sources::body_excerpt(&bytes);
            warn!(status = status.as_u16(), url = %path, "Biolink request failed");
            return Err(BiolinkMcpError::HttpStatus {
                status: status.as_u16(),
                path,
                detail,
            });
        }

        Ok(decode_body(&path, &bytes))
    }

    pub async fn get_entity(&self, entity_id: &str) -> Result<Value, BiolinkMcpError> {
        self.get_json(&["entity", entity_id], &[]).await
    }

    pub async fn search_entities(
        &self,
        q: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Value, BiolinkMcpError> {
        let params = [
            ("q", q.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        self.get_json(&["search"], &params).await
    }

    /// Free-form search, optionally restricted to a taxon label.
    pub async fn search(&self, q: &str, taxon: Option<&str>) -> Result<Value, BiolinkMcpError> {
        let mut params = vec![("q", q.to_string())];
        if let Some(taxon) = taxon {
            params.push(("in_taxon_label", taxon.to_string()));
        }
        self.get_json(&["search"], &params).await
    }

    /// One page of the association table for `entity_id` and `category`.
    pub async fn association_table(
        &self,
        entity_id: &str,
        category: &str,
        offset: u64,
        limit: u64,
        traversal_path: Option<&str>,
    ) -> Result<Value, BiolinkMcpError> {
        let mut params = vec![("offset", offset.to_string()), ("limit", limit.to_string())];
        if let Some(traversal_path) = traversal_path {
            params.push(("path", traversal_path.to_string()));
        }
        self.get_json(&["entity", entity_id, category], &params).await
    }
}

fn parse_base(raw: &str) -> Result<Url, BiolinkMcpError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| {
        BiolinkMcpError::Config(format!("Invalid Biolink base URL {trimmed}: {err}"))
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(BiolinkMcpError::Config(format!(
            "Biolink base URL must be an http(s) URL: {trimmed}"
        )));
    }
    Ok(url)
}

/// Empty bodies decode to `{}`; non-JSON bodies are wrapped as `{"raw": …}`.
fn decode_body(path: &str, bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(serde_json::Map::new());
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => {
            warn!(url = %path, "Non-JSON response from Biolink");
            serde_json::json!({ "raw": String::from_utf8_lossy(bytes) })
        }
    }
}

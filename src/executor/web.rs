// Web tools: bounded page fetch and pluggable search

use crate::executor::schema::{ValidationError, parse};
use crate::executor::tool::{ToolContext, ToolImpl};
use crate::executor::types::{Parameter, ToolDefinition};
use crate::executor::{ExecutorError, Result, ToolOutput};
use crate::permission::PermissionMode;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Web tool configuration
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// JSON search backend; `None` makes web_search return a stub result
    pub search_endpoint: Option<String>,
    pub search_api_key: Option<String>,
    /// Maximum body bytes read by web_fetch
    pub fetch_max_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            search_endpoint: None,
            search_api_key: None,
            fetch_max_bytes: 100 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl WebConfig {
    pub fn from_env() -> Self {
        let mut config = WebConfig::default();
        config.search_endpoint = std::env::var("WEB_SEARCH_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());
        config.search_api_key = std::env::var("WEB_SEARCH_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if let Ok(v) = std::env::var("WEB_FETCH_MAX_BYTES") {
            match v.parse() {
                Ok(n) => config.fetch_max_bytes = n,
                Err(_) => warn!(value = %v, "Invalid WEB_FETCH_MAX_BYTES, using default"),
            }
        }
        config
    }

    fn client(&self) -> Client {
        Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .user_agent(concat!("autopilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default()
    }
}

/// Strip markup from an HTML document, dropping script and style bodies
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let lower: String = rest.chars().take(8).collect::<String>().to_ascii_lowercase();
        let skip_until = if lower.starts_with("<script") {
            Some("</script>")
        } else if lower.starts_with("<style") {
            Some("</style>")
        } else {
            None
        };

        if let Some(closing) = skip_until {
            match rest.to_ascii_lowercase().find(closing) {
                Some(end) => rest = &rest[end + closing.len()..],
                None => rest = "",
            }
            continue;
        }

        match rest.find('>') {
            Some(end) => {
                out.push(' ');
                rest = &rest[end + 1..];
            }
            None => rest = "",
        }
    }
    out.push_str(rest);

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct FetchInput {
    url: String,
}

pub struct WebFetchTool {
    client: Client,
    max_bytes: usize,
}

impl WebFetchTool {
    pub fn new(config: &WebConfig) -> Self {
        Self {
            client: config.client(),
            max_bytes: config.fetch_max_bytes,
        }
    }
}

#[async_trait]
impl ToolImpl for WebFetchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "web_fetch",
            "Fetch a web page over HTTP(S) and return its text. Large pages are truncated.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("url", "Absolute http or https URL"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let FetchInput { url } =
            parse(input).map_err(|e| ExecutorError::invalid("web_fetch", e))?;

        let parsed = Url::parse(&url).map_err(|e| {
            ExecutorError::invalid("web_fetch", ValidationError::Malformed(format!("invalid url: {}", e)))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExecutorError::invalid(
                "web_fetch",
                ValidationError::Malformed(format!("unsupported scheme '{}'", parsed.scheme())),
            ));
        }

        ctx.authorize("web_fetch", format!("Fetch {}?", url), "").await?;

        info!(url = %url, "fetching web content");
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Http(format!("{} returned {}", url, status)));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));

        let mut body: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let remaining = self.max_bytes - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                truncated = chunk.len() > remaining || stream.next().await.is_some();
                break;
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), truncated = truncated, "web content received");

        let text = String::from_utf8_lossy(&body);
        let mut content = if is_html {
            html_to_text(&text)
        } else {
            text.into_owned()
        };
        if truncated {
            content.push_str(&format!("\n\n[content truncated after {} bytes]", self.max_bytes));
        }
        Ok(ToolOutput::success(content))
    }
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

/// Queries a JSON search backend (`GET <endpoint>?q=..&count=..` returning
/// `{"results": [{"title", "url", "snippet"}]}`). Without a backend it
/// returns an explicit stub result instead of failing.
pub struct WebSearchTool {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn new(config: &WebConfig) -> Self {
        Self {
            client: config.client(),
            endpoint: config.search_endpoint.clone(),
            api_key: config.search_api_key.clone(),
        }
    }
}

#[async_trait]
impl ToolImpl for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "web_search",
            "Search the web and return titles, URLs and snippets.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("query", "Search query"))
        .param(Parameter::integer("max_results", "Maximum results (default 5)").optional())
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let SearchInput { query, max_results } =
            parse(input).map_err(|e| ExecutorError::invalid("web_search", e))?;
        ctx.authorize("web_search", format!("Search the web for '{}'?", query), "")
            .await?;

        let Some(endpoint) = &self.endpoint else {
            info!(query = %query, "web search not configured, returning stub result");
            return Ok(ToolOutput::success(format!(
                "Web search is not configured, so no results are available for '{}'. \
                 Continue with existing knowledge or use web_fetch on a known URL.",
                query
            )));
        };

        let count = max_results.unwrap_or(5).clamp(1, 20);
        let count_param = count.to_string();
        let mut request = self
            .client
            .get(endpoint)
            .query(&[("q", query.as_str()), ("count", count_param.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Http(format!("search backend returned {}", status)));
        }
        let body: SearchResponse = response.json().await?;

        if body.results.is_empty() {
            return Ok(ToolOutput::success(format!("No results for '{}'", query)));
        }

        let lines: Vec<String> = body
            .results
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, hit)| format!("{}. {}\n   {}\n   {}", i + 1, hit.title, hit.url, hit.snippet))
            .collect();
        Ok(ToolOutput::success(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_drops_markup_and_scripts() {
        let html = "<html><head><style>p{}</style><script>alert(1)</script></head>\
                    <body><h1>Title</h1><p>Fish &amp; chips</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("Fish & chips"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("p{}"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_html_to_text_plain_passthrough() {
        assert_eq!(html_to_text("just text"), "just text");
    }
}

//! `web_fetch`: download a page and reduce it to readable markdown.
//!
//! Registered with the `research` tag, so successful fetches are archived
//! into long-term memory by the agent loop with the URL as their source.

use async_trait::async_trait;
use shrimp_core::error::ToolError;
use shrimp_core::tool::{Tool, ToolContext, ToolResult};
use std::time::Duration;
use tracing::debug;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("openshrimp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_fetch".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text. Use it to read sources; \
         results are saved to memory automatically."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        debug!(url = %url, "Fetching page");
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to fetch {url}: {e}"))),
        };
        let status = response.status();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to read {url}: {e}"))),
        };

        if !status.is_success() {
            return Ok(ToolResult::failure(format!(
                "Failed to fetch {url}: HTTP {}",
                status.as_u16()
            )));
        }

        let text = if is_html { html_to_markdown(&body) } else { body };
        Ok(ToolResult::ok(format!("URL: {url}\n\n{text}")))
    }
}

/// Convert a page to markdown without its `<head>`, scripts and styles.
/// Falls back to the raw markup if conversion fails.
pub fn html_to_markdown(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "head"])
        .build();
    match converter.convert(html) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(e) => {
            debug!(error = %e, "HTML conversion failed, returning raw body");
            html.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_scripts_and_styles() {
        let html = r#"<html><head><title>Pricing</title><style>p{color:red}</style>
            <script type="text/javascript">var x = "secret";</script></head>
            <body><h1>Plans</h1><p>Basic costs ten dollars</p></body></html>"#;
        let text = html_to_markdown(html);
        assert!(text.contains("Plans"));
        assert!(text.contains("Basic costs ten dollars"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn decodes_entities_and_skips_comments() {
        let html = "<p>It&#8217;s &mdash; caf&eacute; &#x27;x&#x27;</p><!-- <b>hidden</b> -->";
        let text = html_to_markdown(html);
        assert!(text.contains("It\u{2019}s"));
        assert!(text.contains('\u{2014}'));
        assert!(text.contains("caf\u{e9}"));
        assert!(!text.contains('&'));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn unclosed_markup_does_not_panic() {
        assert!(html_to_markdown("text <b").contains("text"));
        assert!(!html_to_markdown("<script>never closed").contains("never"));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let tool = WebFetchTool::new(Duration::from_secs(5)).unwrap();
        let err = tool
            .execute(
                serde_json::json!({"url": "file:///etc/passwd"}),
                &ToolContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}

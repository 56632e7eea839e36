use anyhow::{Context, Result, bail};
use std::io::Write;

use crate::config::Settings;
use crate::providers::{
    ContentPart, McpTool, OutputItem, ResponsesProvider, ResponsesRequest, ToolSpec,
};

/// Attach the proxy as the single MCP tool of the request.
pub fn build_request(settings: &Settings) -> Result<ResponsesRequest> {
    if settings.prompt.trim().is_empty() {
        bail!("prompt is required");
    }
    if settings.model.trim().is_empty() {
        bail!("model is required (use --model or [openai].default_model)");
    }
    let tool = build_tool(settings)?;
    Ok(ResponsesRequest {
        model: settings.model.clone(),
        tools: vec![ToolSpec::Mcp(tool)],
        input: settings.prompt.clone(),
    })
}

pub fn build_tool(settings: &Settings) -> Result<McpTool> {
    let url = reqwest::Url::parse(&settings.proxy_url)
        .with_context(|| format!("invalid proxy url '{}'", settings.proxy_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "proxy url '{}' must use http or https",
            settings.proxy_url
        );
    }
    Ok(McpTool::new(settings.server_label.clone(), &url)
        .with_approval(settings.require_approval)
        .with_access_token(settings.proxy_token.as_deref())
        .with_tenant(settings.proxy_tenant.as_deref()))
}

/// Send the request once and write the response text to `out`.
/// Nothing is written when the call fails.
pub async fn run<P, W>(provider: &P, request: ResponsesRequest, out: &mut W) -> Result<()>
where
    P: ResponsesProvider + ?Sized,
    W: Write,
{
    tracing::info!(provider = provider.name(), model = %request.model, "sending request");
    let resp = provider
        .create_response(request)
        .await
        .with_context(|| format!("{} request failed", provider.name()))?;

    tracing::info!(id = ?resp.id, model = ?resp.model, status = ?resp.status, "response received");
    for item in &resp.output {
        match item {
            OutputItem::McpListTools {
                server_label,
                tools,
            } => tracing::info!(
                server = server_label.as_deref().unwrap_or("?"),
                count = tools.len(),
                "mcp tools listed"
            ),
            OutputItem::McpApprovalRequest {
                id,
                name,
                server_label,
                arguments,
            } => tracing::warn!(
                id = id.as_deref().unwrap_or("?"),
                server = server_label.as_deref().unwrap_or("?"),
                tool = %name,
                arguments = arguments.as_deref().unwrap_or(""),
                "mcp call awaits approval"
            ),
            OutputItem::McpCall {
                name,
                server_label,
                error: Some(err),
                ..
            } if !err.is_null() => tracing::warn!(
                server = server_label.as_deref().unwrap_or("?"),
                tool = %name,
                %err,
                "mcp call failed"
            ),
            OutputItem::McpCall {
                name,
                server_label,
                output,
                ..
            } => tracing::info!(
                server = server_label.as_deref().unwrap_or("?"),
                tool = %name,
                bytes = output.as_ref().map_or(0, |o| o.len()),
                "mcp call"
            ),
            OutputItem::Message { content } => {
                for part in content {
                    if let ContentPart::Refusal { refusal } = part {
                        tracing::warn!(%refusal, "model refused");
                    }
                }
            }
            OutputItem::Other => {}
        }
    }
    tracing::debug!(calls = resp.mcp_calls().count(), "tool activity");
    if let Some(u) = &resp.usage {
        tracing::info!(
            input = u.input_tokens,
            output = u.output_tokens,
            total = u.total_tokens,
            "usage"
        );
    }

    // Approvals need a follow-up turn, which this one-shot client never sends.
    let pending: Vec<&str> = resp
        .approval_requests()
        .filter_map(|item| match item {
            OutputItem::McpApprovalRequest { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    if !pending.is_empty() {
        bail!(
            "model asked for approval to call {}; rerun with --require-approval never",
            pending.join(", ")
        );
    }

    writeln!(out, "{}", resp.output_text())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Settings};
    use crate::providers::{ApprovalPolicy, ProviderError, ResponseObject};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockProvider {
        calls: Mutex<Vec<ResponsesRequest>>,
        reply: Option<serde_json::Value>,
    }

    impl MockProvider {
        fn replying(reply: serde_json::Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply: Some(reply),
            }
        }
        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply: None,
            }
        }
    }

    #[async_trait]
    impl ResponsesProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }
        async fn create_response(
            &self,
            req: ResponsesRequest,
        ) -> Result<ResponseObject, ProviderError> {
            self.calls.lock().unwrap().push(req);
            match &self.reply {
                Some(v) => Ok(serde_json::from_value(v.clone())?),
                None => Err(ProviderError::Remote {
                    code: Some("unauthorized".into()),
                    message: "bad token".into(),
                }),
            }
        }
    }

    fn settings() -> Settings {
        let mut s = Settings::resolve(&Config::default(), &|_| None);
        s.proxy_url = "https://proxy.example.dev".into();
        s
    }

    fn text_reply(text: &str) -> serde_json::Value {
        json!({
            "status": "completed",
            "output": [{
                "type": "message",
                "content": [{"type": "output_text", "text": text}]
            }]
        })
    }

    #[tokio::test]
    async fn issues_one_call_with_expected_descriptor() {
        let provider = MockProvider::replying(text_reply("ok"));
        let request = build_request(&settings()).unwrap();
        let mut out = Vec::new();
        run(&provider, request, &mut out).await.unwrap();

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let req = &calls[0];
        assert_eq!(req.model, "gpt-5");
        assert_eq!(req.input, "Give me 1 user from the database.");
        assert_eq!(req.tools.len(), 1);
        let ToolSpec::Mcp(tool) = &req.tools[0];
        assert_eq!(tool.server_label, "db-proxy");
        assert_eq!(tool.require_approval, ApprovalPolicy::Never);
        assert_eq!(tool.server_url, "https://proxy.example.dev/mcp/");
        assert!(tool.headers.is_empty());
    }

    #[tokio::test]
    async fn prints_response_text_unmodified() {
        let text = "  User #1: {\"email\": \"alice@example.com\"}\n\twith tabs  ";
        let provider = MockProvider::replying(text_reply(text));
        let mut out = Vec::new();
        run(&provider, build_request(&settings()).unwrap(), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{text}\n"));
    }

    #[tokio::test]
    async fn failure_propagates_and_prints_nothing() {
        let provider = MockProvider::failing();
        let mut out = Vec::new();
        let err = run(&provider, build_request(&settings()).unwrap(), &mut out)
            .await
            .unwrap_err();
        assert!(out.is_empty());
        assert!(format!("{err:#}").contains("bad token"));
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_approval_is_an_error_and_prints_nothing() {
        let provider = MockProvider::replying(json!({
            "status": "completed",
            "output": [
                {"type": "mcp_list_tools", "server_label": "db-proxy", "tools": []},
                {"type": "mcp_approval_request", "id": "mcpr_1", "name": "get_customer_by_email",
                 "server_label": "db-proxy", "arguments": "{}"}
            ]
        }));
        let mut s = settings();
        s.require_approval = ApprovalPolicy::Always;
        let mut out = Vec::new();
        let err = run(&provider, build_request(&s).unwrap(), &mut out)
            .await
            .unwrap_err();
        assert!(out.is_empty());
        assert!(err.to_string().contains("get_customer_by_email"));
    }

    #[test]
    fn rejects_blank_model() {
        let mut s = settings();
        s.model = "  ".into();
        let err = build_request(&s).unwrap_err();
        assert!(err.to_string().contains("model is required"));
    }

    #[test]
    fn proxy_url_query_is_not_glued_onto_endpoint() {
        let mut s = settings();
        s.proxy_url = "https://h.example/base?k=v".into();
        let ToolSpec::Mcp(tool) = build_request(&s).unwrap().tools.remove(0);
        assert_eq!(tool.server_url, "https://h.example/base/mcp/");
    }

    #[test]
    fn rejects_blank_prompt() {
        let mut s = settings();
        s.prompt = "   ".into();
        assert!(build_request(&s).is_err());
    }

    #[test]
    fn rejects_malformed_or_non_http_url() {
        let mut s = settings();
        s.proxy_url = "not a url".into();
        assert!(build_request(&s).is_err());
        s.proxy_url = "ftp://proxy.example.dev".into();
        let err = build_request(&s).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn forwards_proxy_token_when_configured() {
        let mut s = settings();
        s.proxy_token = Some("secret".into());
        s.require_approval = ApprovalPolicy::Always;
        let ToolSpec::Mcp(tool) = build_request(&s).unwrap().tools.remove(0);
        assert_eq!(tool.headers.get("Authorization").unwrap(), "Bearer secret");
        assert_eq!(tool.require_approval, ApprovalPolicy::Always);
    }
}

pub mod openai;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("remote: {message} ({})", .code.as_deref().unwrap_or("no code"))]
    Remote {
        code: Option<String>,
        message: String,
    },
}

/// Whether the model endpoint must ask before calling a tool on the MCP server.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    #[default]
    Never,
    Always,
}

impl std::str::FromStr for ApprovalPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never" => Ok(ApprovalPolicy::Never),
            "always" => Ok(ApprovalPolicy::Always),
            other => Err(format!("invalid approval policy: {} (use never|always)", other)),
        }
    }
}

impl std::fmt::Display for ApprovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalPolicy::Never => write!(f, "never"),
            ApprovalPolicy::Always => write!(f, "always"),
        }
    }
}

/// Remote MCP server attached to a request. The endpoint connects to it, not us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub server_label: String,
    pub server_url: String,
    pub require_approval: ApprovalPolicy,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl McpTool {
    pub fn new(server_label: impl Into<String>, proxy_base_url: &Url) -> Self {
        Self {
            server_label: server_label.into(),
            server_url: mcp_endpoint(proxy_base_url).to_string(),
            require_approval: ApprovalPolicy::default(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_approval(mut self, policy: ApprovalPolicy) -> Self {
        self.require_approval = policy;
        self
    }

    /// Forward a bearer token to the proxy. Empty tokens are ignored.
    pub fn with_access_token(mut self, token: Option<&str>) -> Self {
        if let Some(t) = token.filter(|t| !t.trim().is_empty()) {
            self.headers
                .insert("Authorization".into(), format!("Bearer {}", t.trim()));
        }
        self
    }

    pub fn with_tenant(mut self, tenant: Option<&str>) -> Self {
        if let Some(t) = tenant.filter(|t| !t.trim().is_empty()) {
            self.headers.insert("X-Tenant".into(), t.trim().to_string());
        }
        self
    }
}

/// The proxy serves MCP under a fixed path below its base URL.
/// Query and fragment of the base are not carried over.
pub fn mcp_endpoint(proxy_base_url: &Url) -> Url {
    let mut url = proxy_base_url.clone();
    let path = format!("{}/mcp/", proxy_base_url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    Mcp(McpTool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub tools: Vec<ToolSpec>,
    pub input: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    McpListTools {
        #[serde(default)]
        server_label: Option<String>,
        #[serde(default)]
        tools: Vec<serde_json::Value>,
    },
    McpApprovalRequest {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        server_label: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
    },
    McpCall {
        name: String,
        #[serde(default)]
        server_label: Option<String>,
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl ResponseObject {
    /// All `output_text` parts of all message items, joined in order.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                _ => None,
            })
            .flatten()
            .filter_map(|part| match part {
                ContentPart::OutputText { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool calls the endpoint holds back until someone approves them.
    pub fn approval_requests(&self) -> impl Iterator<Item = &OutputItem> {
        self.output
            .iter()
            .filter(|item| matches!(item, OutputItem::McpApprovalRequest { .. }))
    }

    pub fn mcp_calls(&self) -> impl Iterator<Item = &OutputItem> {
        self.output
            .iter()
            .filter(|item| matches!(item, OutputItem::McpCall { .. }))
    }

    /// A 2xx body can still describe a failed response.
    pub fn into_result(self) -> Result<Self, ProviderError> {
        if let Some(err) = self.error {
            return Err(ProviderError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        if self.status.as_deref() == Some("failed") {
            return Err(ProviderError::Remote {
                code: None,
                message: "response failed".into(),
            });
        }
        Ok(self)
    }
}

#[async_trait]
pub trait ResponsesProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn create_response(&self, req: ResponsesRequest) -> Result<ResponseObject, ProviderError>;
}

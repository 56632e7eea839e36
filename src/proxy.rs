use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::providers::{McpTool, ProviderError};

/// Reads the JSON tool listing the proxy serves on `GET /mcp/`.
pub struct ProxyClient {
    client: Client,
    tool: McpTool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolListing {
    #[serde(default)]
    pub tools: Vec<ProxyTool>,
    #[serde(default)]
    pub require_approval: Option<String>,
    #[serde(default)]
    pub server_label: Option<String>,
}

// The proxy may send both spellings of the schema key at once.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
    #[serde(default, rename = "inputSchema")]
    input_schema_camel: Option<Value>,
}

impl ProxyTool {
    pub fn schema(&self) -> Option<&Value> {
        self.input_schema
            .as_ref()
            .or(self.input_schema_camel.as_ref())
    }
}

impl ProxyClient {
    pub fn new(tool: McpTool) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self { client, tool })
    }

    pub async fn list_tools(&self) -> Result<ToolListing, ProviderError> {
        tracing::debug!(url = %self.tool.server_url, "listing proxy tools");
        let mut req = self.client.get(&self.tool.server_url);
        for (k, v) in &self.tool.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        let listing: ToolListing = req.send().await?.error_for_status()?.json().await?;
        Ok(listing)
    }
}

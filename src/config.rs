use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::providers::ApprovalPolicy;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5";
pub const DEFAULT_PROXY_URL: &str = "https://mediocre-wiggliest-opal.ngrok-free.dev";
pub const DEFAULT_SERVER_LABEL: &str = "db-proxy";
pub const DEFAULT_PROMPT: &str = "Give me 1 user from the database.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub proxy: Option<ProxyConfig>,
    pub query: Option<QueryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProxyConfig {
    pub url: Option<String>,
    pub server_label: Option<String>,
    pub require_approval: Option<ApprovalPolicy>,
    pub access_token: Option<String>,
    pub tenant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryConfig {
    pub prompt: Option<String>,
}

impl Config {
    /// An explicit path must exist. The default path is optional.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (PathBuf::from(p), true),
            None => (Self::default_path()?, false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config at {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("mcp-db-query").join("config.toml"))
            .ok_or_else(|| anyhow!("cannot resolve config dir"))
    }

    /// Returns the path and whether a new file was written.
    pub fn write_example_if_absent() -> Result<(PathBuf, bool)> {
        let path = Self::default_path()?;
        if path.exists() {
            return Ok((path, false));
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        fs::write(&path, example_config())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok((path, true))
    }
}

/// Starter file mirroring the built-in defaults.
fn example_config() -> String {
    format!(
        r#"# mcp-db-query config (TOML). Every key is optional.

[openai]
# leave empty to use OPENAI_API_KEY
api_key = ""
base_url = "{DEFAULT_OPENAI_BASE_URL}"
default_model = "{DEFAULT_MODEL}"

[proxy]
# requests go to <url>/mcp/; MCP_PROXY_URL is used when unset
url = "{DEFAULT_PROXY_URL}"
server_label = "{DEFAULT_SERVER_LABEL}"
# never | always
require_approval = "never"
# sent as "Authorization: Bearer <token>" when set (MCP_PROXY_TOKEN)
access_token = ""
# sent as "X-Tenant" when set (MCP_PROXY_TENANT)
# tenant = "acme"

[query]
prompt = "{DEFAULT_PROMPT}"
"#
    )
}

/// Fully resolved values: config file first, then environment, then defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub proxy_url: String,
    pub server_label: String,
    pub require_approval: ApprovalPolicy,
    pub proxy_token: Option<String>,
    pub proxy_tenant: Option<String>,
    pub prompt: String,
}

impl Settings {
    pub fn resolve(cfg: &Config, env: &dyn Fn(&str) -> Option<String>) -> Self {
        let openai = cfg.openai.clone().unwrap_or_default();
        let proxy = cfg.proxy.clone().unwrap_or_default();
        let query = cfg.query.clone().unwrap_or_default();
        let env = |key: &str| non_empty(env(key));

        Self {
            openai_api_key: non_empty(openai.api_key).or_else(|| env("OPENAI_API_KEY")),
            openai_base_url: non_empty(openai.base_url)
                .or_else(|| env("OPENAI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            model: non_empty(openai.default_model).unwrap_or_else(|| DEFAULT_MODEL.into()),
            proxy_url: non_empty(proxy.url)
                .or_else(|| env("MCP_PROXY_URL"))
                .unwrap_or_else(|| DEFAULT_PROXY_URL.into()),
            server_label: non_empty(proxy.server_label)
                .unwrap_or_else(|| DEFAULT_SERVER_LABEL.into()),
            require_approval: proxy.require_approval.unwrap_or_default(),
            proxy_token: non_empty(proxy.access_token).or_else(|| env("MCP_PROXY_TOKEN")),
            proxy_tenant: non_empty(proxy.tenant).or_else(|| env("MCP_PROXY_TENANT")),
            prompt: non_empty(query.prompt).unwrap_or_else(|| DEFAULT_PROMPT.into()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

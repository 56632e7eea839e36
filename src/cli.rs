use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::providers::ApprovalPolicy;

#[derive(Parser, Debug)]
#[command(name = "mcp-db-query", author, version, about = "Ask a hosted model about your database through an MCP proxy", long_about = None)]
pub struct Cli {
    /// Optional path to a config file (toml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log tool calls and token usage to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt with the database proxy attached and print the answer
    Query(QueryArgs),
    /// List the tools the proxy exposes
    ListTools(ListToolsArgs),
    /// Print the default config path
    ConfigPath,
    /// Create an example config file if missing
    InitConfig,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Prompt text; defaults to the configured prompt
    pub prompt: Option<String>,

    /// Model name; if not given, the configured default is used
    #[arg(short, long)]
    pub model: Option<String>,

    /// Base URL of the MCP proxy (the tool lives at <url>/mcp/)
    #[arg(long)]
    pub proxy_url: Option<String>,

    /// Label the model sees for the proxy
    #[arg(long)]
    pub server_label: Option<String>,

    /// Tool approval policy: never | always
    #[arg(long, value_parser = clap::value_parser!(ApprovalPolicy))]
    pub require_approval: Option<ApprovalPolicy>,

    /// Print the request body instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

impl QueryArgs {
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(p) = &self.prompt {
            settings.prompt = p.clone();
        }
        if let Some(m) = &self.model {
            settings.model = m.clone();
        }
        if let Some(u) = &self.proxy_url {
            settings.proxy_url = u.clone();
        }
        if let Some(l) = &self.server_label {
            settings.server_label = l.clone();
        }
        if let Some(a) = self.require_approval {
            settings.require_approval = a;
        }
    }
}

#[derive(Args, Debug)]
pub struct ListToolsArgs {
    /// Base URL of the MCP proxy
    #[arg(long)]
    pub proxy_url: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

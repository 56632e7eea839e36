mod cli;
mod config;
mod logging;
mod providers;
mod proxy;
mod query;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use cli::{Cli, Commands};
use colored::*;
use config::{Config, Settings};
use providers::openai::OpenAiProvider;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);
    let cfg = Config::load(cli.config.as_deref())?;
    let mut settings = Settings::resolve(&cfg, &|k| std::env::var(k).ok());

    match cli.command {
        Commands::Query(args) => {
            args.apply_to(&mut settings);
            let request = query::build_request(&settings)?;
            if args.dry_run {
                println!("{}", serde_json::to_string_pretty(&request)?);
                return Ok(());
            }
            let provider = OpenAiProvider::from_settings(&settings)?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            query::run(&provider, request, &mut out).await?;
        }
        Commands::ListTools(args) => {
            if let Some(u) = args.proxy_url {
                settings.proxy_url = u;
            }
            let tool = query::build_tool(&settings)?;
            let client = proxy::ProxyClient::new(tool)?;
            let listing = client.list_tools().await?;
            tracing::info!(
                label = ?listing.server_label,
                approval = ?listing.require_approval,
                count = listing.tools.len(),
                "proxy tool listing"
            );
            if listing.tools.is_empty() {
                eprintln!("{}", "proxy exposes no tools".yellow());
            }
            for t in listing.tools {
                let has_schema = t.schema().is_some();
                println!(
                    "{}: {}{}",
                    t.name.bold(),
                    t.description.unwrap_or_default(),
                    if has_schema { "" } else { " (no input schema)" }
                );
            }
        }
        Commands::ConfigPath => {
            println!("{}", Config::default_path()?.display());
        }
        Commands::InitConfig => {
            let (path, created) = Config::write_example_if_absent()?;
            if created {
                println!("Wrote example config to {}", path.display());
            } else {
                println!("Config already exists at {}", path.display());
            }
        }
    }

    Ok(())
}

use crate::application::{MetadataEnrichmentUseCase, MetadataProfiler};
use crate::domain::answer::QueryResponse;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMProvider;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::csv::CsvLoader;
use crate::infrastructure::db::CostStore;
use crate::interfaces::chat::{render_response, ChatClient};
use crate::interfaces::http::{add_log, start_server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudcost-sql")]
#[command(about = "Ask questions about AWS and Azure cost data in plain English")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: cloudcost.toml when present)
    #[arg(short, long, global = true, env = "CLOUDCOST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer one question and exit
    Ask {
        question: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat against a running API server
    Chat {
        /// Server base URL (default: derived from server.host and server.port)
        #[arg(long)]
        url: Option<String>,
    },

    /// Profile every column and annotate it with the language model
    Profile {
        /// Output file (default: metadata_path from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only collect statistics, skip the language model
        #[arg(long)]
        no_enrich: bool,
    },

    /// Load CSV exports into the database, one table per file
    Load {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Delete the database file first
        #[arg(long)]
        fresh: bool,
    },

    /// Manage provider API keys in the OS keyring
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store a key
    Set {
        #[arg(value_parser = parse_provider)]
        provider: LLMProvider,
        key: String,
    },
    /// Remove a stored key
    Delete {
        #[arg(value_parser = parse_provider)]
        provider: LLMProvider,
    },
}

fn parse_provider(value: &str) -> std::result::Result<LLMProvider, String> {
    match value.to_ascii_lowercase().as_str() {
        "openai" => Ok(LLMProvider::OpenAI),
        "gemini" => Ok(LLMProvider::Gemini),
        "local" => Ok(LLMProvider::Local),
        other => Err(format!("unknown provider '{}' (openai, gemini, local)", other)),
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = bootstrap::load_config(config_path)?;
            let state = bootstrap::build_app_state(&config).await?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            add_log(
                &state.logs,
                "INFO",
                "HttpApi",
                &format!("Listening on http://{}:{}", host, port),
            );
            start_server(state, &host, port)?.await?;
        }
        Commands::Ask { question, json } => {
            let config = bootstrap::load_config(config_path)?;
            let state = bootstrap::build_app_state(&config).await?;

            let response = QueryResponse::from(state.text_to_sql.execute(&question).await);
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render_response(&response));
            }
        }
        Commands::Chat { url } => {
            let url = match url {
                Some(url) => url,
                None => AppConfig::load(config_path)?.server.client_url(),
            };
            info!(url = %url, "Connecting to API server");
            ChatClient::new(&url).run().await?;
        }
        Commands::Profile { output, no_enrich } => {
            let config = bootstrap::load_config(config_path)?;
            let store = Arc::new(CostStore::open(&config.database_path).await?);

            let mut metadata = MetadataProfiler::new(store, config.profiler.sample_size)
                .profile()
                .await?;

            if !no_enrich {
                let summary = MetadataEnrichmentUseCase::new(
                    bootstrap::llm_client(),
                    &config.llm,
                    &config.profiler.model,
                    Duration::from_millis(config.profiler.request_delay_ms),
                )
                .enrich(&mut metadata)
                .await;
                info!(
                    enriched = summary.enriched,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Enrichment finished"
                );
            }

            let output = output.unwrap_or_else(|| config.metadata_path.clone());
            metadata.save(&output)?;
            info!(path = %output.display(), "Semantic metadata written");
        }
        Commands::Load { files, fresh } => {
            let config = bootstrap::load_config(config_path)?;
            if fresh && config.database_path.exists() {
                std::fs::remove_file(&config.database_path)?;
                info!(path = %config.database_path.display(), "Removed existing database");
            }

            let store = CostStore::create(&config.database_path);
            let loader = CsvLoader::new(&store);
            for file in &files {
                let report = loader.load_file(file).await?;
                println!("{} <- {} ({} rows)", report.table, file.display(), report.rows);
            }
        }
        Commands::Key { action } => {
            let service = ConfigService::new();
            match action {
                KeyCommands::Set { provider, key } => {
                    if key.trim().is_empty() {
                        return Err(AppError::ValidationError("API key is empty".to_string()));
                    }
                    service.save_api_key(provider, key.trim())?;
                    println!("Stored {:?} key in the OS keyring", provider);
                }
                KeyCommands::Delete { provider } => {
                    service.delete_api_key(provider)?;
                    println!("Removed {:?} key from the OS keyring", provider);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from([
            "cloudcost-sql",
            "--verbose",
            "load",
            "aws_cost_usage.csv",
            "azure_cost_usage.csv",
            "--fresh",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Load { files, fresh } => {
                assert_eq!(files.len(), 2);
                assert!(fresh);
            }
            _ => panic!("expected load"),
        }

        let cli = Cli::try_parse_from(["cloudcost-sql", "key", "set", "Gemini", "gm-123"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Key {
                action: KeyCommands::Set {
                    provider: LLMProvider::Gemini,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_chat_url_is_optional() {
        let cli = Cli::try_parse_from(["cloudcost-sql", "chat"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { url: None }));

        let cli =
            Cli::try_parse_from(["cloudcost-sql", "chat", "--url", "http://10.0.0.5:9100"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { url: Some(ref u) } if u == "http://10.0.0.5:9100"));
    }

    #[test]
    fn test_load_requires_files() {
        assert!(Cli::try_parse_from(["cloudcost-sql", "load"]).is_err());
        assert!(Cli::try_parse_from(["cloudcost-sql", "key", "set", "azure", "k"]).is_err());
    }
}

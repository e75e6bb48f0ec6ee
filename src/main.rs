use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use plugbot::domain::traits::Transport;
use plugbot::infrastructure::adapters::ConsoleTransport;
use plugbot::plugins::catalog::filter_enabled;
use plugbot::plugins::PluginCatalog;
use plugbot::{BotError, BotHost, Config};

#[derive(Parser)]
#[command(name = "plugbot")]
#[command(about = "An extensible chat-bot host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// List the plugins the current configuration would load
    Plugins,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(config.log_filter(rust_log.as_deref()))
        .init();

    let result = match cli.command {
        Commands::Run => run_bot(config),
        Commands::Version => {
            println!("plugbot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(&cli.config),
        Commands::Plugins => list_plugins(&config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// File values first, then environment overrides
fn load_config(path: &str) -> Result<Config, BotError> {
    let mut config = if Path::new(path).exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

fn init_config(path: &str) -> Result<(), BotError> {
    if Path::new(path).exists() {
        return Err(BotError::Internal(format!("{} already exists", path)));
    }
    let yaml = Config::default().to_yaml()?;
    std::fs::write(path, yaml).map_err(|e| BotError::Internal(e.to_string()))?;
    println!("Created {}", path);
    Ok(())
}

fn list_plugins(config: &Config) -> Result<(), BotError> {
    let catalog = PluginCatalog::builtin();
    let included: Vec<String> = filter_enabled(
        catalog.discover(&config.plugins.sources)?,
        &config.plugins.enabled,
    )?
    .iter()
    .map(|p| p.key().to_string())
    .collect();

    let discovered = catalog.discover(&config.plugins.sources)?;
    println!("Plugins ({} of {} enabled):", included.len(), discovered.len());
    for plugin in &discovered {
        let status = if included.iter().any(|k| k == plugin.key()) {
            "enabled"
        } else {
            "disabled"
        };
        println!(
            "  {:<12} {:<20} v{:<8} {:<9} {}",
            plugin.key(),
            plugin.plugin.name(),
            plugin.plugin.version(),
            status,
            plugin.origin()
        );
    }
    Ok(())
}

fn run_bot(config: Config) -> Result<(), BotError> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;

    rt.block_on(async move {
        let transport: Arc<dyn Transport> = if config.adapters.console.enabled {
            println!("Type a message and press Enter. Ctrl+C to exit.");
            Arc::new(ConsoleTransport::new())
        } else {
            Arc::new(ConsoleTransport::detached())
        };

        let mut host = BotHost::build(config, &PluginCatalog::builtin(), transport).await?;
        host.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await
    })
}

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    venom_config::VenomConfig,
};

#[derive(Parser)]
#[command(name = "venom", about = "Venom: HTTP gateway for a WhatsApp Web session")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file to load instead of discovering venom.{toml,yaml,json}.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default).
    Gateway {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VenomConfig> {
    match path {
        Some(path) => {
            let mut config = venom_config::load_config(path)?;
            venom_config::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            Ok(config)
        },
        None => Ok(venom_config::load_effective()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "venom starting");

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Gateway {
        bind: None,
        port: None,
    }) {
        Commands::Gateway { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            venom_gateway::start_gateway(config).await
        },
        Commands::Config => {
            if let Some(dir) = venom_config::config_dir() {
                println!("# config dir: {}", dir.display());
            }
            println!("{config:#?}");
            Ok(())
        },
    }
}

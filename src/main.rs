use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

use showdown_bot::infrastructure::auth::ShowdownLogin;
use showdown_bot::plugins::builtin::{echo_plugin, hello_plugin};
use showdown_bot::{Bot, Config, Connection};

#[derive(Parser)]
#[command(name = "showdown-bot")]
#[command(about = "A chat bot for Pokemon Showdown servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Nick to log in as (overrides config)
    #[arg(short, long)]
    nick: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and run the bot
    Run,
    /// Show version
    Version,
    /// Print a default config
    InitConfig,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_bot(&cli.config, cli.nick),
        Commands::Version => {
            println!("showdown-bot v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => init_config(),
    }
}

fn load_config(
    path: &str,
    nick_override: Option<String>,
) -> Result<Config, showdown_bot::ConfigError> {
    let mut config = if std::path::Path::new(path).exists() {
        Config::load(path)?
    } else {
        tracing::warn!("Config {} not found, using defaults and environment", path);
        Config::load_env()
    };

    if let Some(nick) = nick_override {
        config.bot.nick = nick;
    }
    config.validate()?;
    Ok(config)
}

fn run_bot(config_path: &str, nick_override: Option<String>) -> ExitCode {
    let config = match load_config(config_path, nick_override) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async {
        let authenticator = Arc::new(ShowdownLogin::from_config(&config));
        let (bot, outbound_rx) = Bot::new(config.clone(), authenticator);
        let bot = Arc::new(bot);

        for plugin in [echo_plugin(), hello_plugin()] {
            if let Err(e) = bot.register_plugin(plugin) {
                tracing::error!("Failed to register plugin: {}", e);
            }
        }
        tracing::info!("Registered plugins: {:?}", bot.plugins().names());

        let connection = Connection::new(Arc::clone(&bot), outbound_rx, &config);
        connection
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for ctrl-c: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_config() -> ExitCode {
    let mut config = Config::default();
    config.bot.nick = "MyBot".to_string();
    match config.to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

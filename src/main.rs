use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guestwifi::{
    config::{self, Overrides, Settings},
    server,
};

#[derive(Parser)]
#[command(name = "guestwifi")]
#[command(about = "Read and toggle the guest WiFi of a FRITZ!Box")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/guestwifi/config.toml)
    #[arg(short, long, global = true, env = "GUESTWIFI_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    router: RouterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RouterArgs {
    /// Router address (host, or full URL of the TR-064 endpoint)
    #[arg(long, global = true, env = "FRITZBOX_ADDRESS")]
    address: Option<String>,

    /// Router user name
    #[arg(long, global = true, env = "FRITZBOX_USER")]
    user: Option<String>,

    /// Router password
    #[arg(long, global = true, env = "FRITZBOX_PASS", hide_env_values = true)]
    password: Option<String>,

    /// Seconds to wait for the router to apply a change
    #[arg(long, global = true, env = "GUESTWIFI_SETTLE_SECS")]
    settle_secs: Option<u64>,

    /// Timeout in seconds for each router request
    #[arg(long, global = true, env = "GUESTWIFI_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Address to bind to
        #[arg(short, long, env = "GUESTWIFI_BIND")]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "GUESTWIFI_PORT")]
        port: Option<u16>,

        /// Redirect target after enable/disable
        #[arg(long, env = "BASE_URL")]
        base_url: Option<String>,

        /// Message shown at the top of the page
        #[arg(long, env = "HEADER_MESSAGE")]
        header_message: Option<String>,
    },

    /// Show the guest WiFi status
    Status,

    /// Show router and guest WiFi details as JSON
    Info,

    /// Turn the guest WiFi on
    Enable,

    /// Turn the guest WiFi off
    Disable,

    /// Show the resolved configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestwifi=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut overrides = Overrides {
        address: cli.router.address,
        user: cli.router.user,
        password: cli.router.password,
        settle_secs: cli.router.settle_secs,
        timeout_secs: cli.router.timeout_secs,
        ..Overrides::default()
    };
    if let Commands::Serve {
        bind,
        port,
        base_url,
        header_message,
    } = &cli.command
    {
        overrides.bind = bind.clone();
        overrides.port = *port;
        overrides.base_url = base_url.clone();
        overrides.header_message = header_message.clone();
    }

    let settings =
        Settings::load(cli.config.as_deref(), overrides).context("Invalid configuration")?;

    match cli.command {
        Commands::Serve { .. } => server::run_server(settings).await,
        Commands::Status => cmd_status(&settings).await,
        Commands::Info => cmd_info(&settings).await,
        Commands::Enable => cmd_switch(&settings, true).await,
        Commands::Disable => cmd_switch(&settings, false).await,
        Commands::ShowConfig => cmd_show_config(&settings, cli.config),
    }
}

async fn cmd_status(settings: &Settings) -> Result<()> {
    let controller = server::connect(settings).await?;
    let state = controller.get_guest_wifi_status().await;
    controller.close();

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

async fn cmd_info(settings: &Settings) -> Result<()> {
    let controller = server::connect(settings).await?;
    let info = controller.get_info().await;
    controller.close();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "fritzbox": info }))?
    );
    Ok(())
}

async fn cmd_switch(settings: &Settings, enable: bool) -> Result<()> {
    let controller = server::connect(settings).await?;
    println!(
        "Turning guest WiFi {} on {} ...",
        if enable { "on" } else { "off" },
        settings.credentials.address
    );
    let state = controller.set_guest_wifi_status(enable).await;
    controller.close();

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn cmd_show_config(settings: &Settings, explicit: Option<PathBuf>) -> Result<()> {
    match explicit.or_else(config::config_path) {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    println!();

    let masked_pw = "*".repeat(8);
    println!("{:<16} {}", "ADDRESS", settings.credentials.address);
    println!("{:<16} {}", "USER", settings.credentials.user);
    println!("{:<16} {}", "PASSWORD", masked_pw);
    println!("{:<16} {}", "BASE URL", settings.base_url);
    println!("{:<16} {}", "HEADER MESSAGE", settings.header_message);
    println!("{:<16} {}s", "SETTLE TIME", settings.settle_time.as_secs());
    println!("{:<16} {}s", "TIMEOUT", settings.request_timeout.as_secs());
    println!("{:<16} {}:{}", "LISTEN", settings.bind, settings.port);

    Ok(())
}

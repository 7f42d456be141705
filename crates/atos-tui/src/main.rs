use std::path::PathBuf;

use anyhow::{Context, Result};
use atos_core::{AtosClient, AxisKeyPolicy, Config};
use clap::{Parser, Subcommand};
use tracing::info;

mod app;
mod cli;
mod handler;
mod logging;
mod render;
mod tui;
mod ui;

use app::App;
use logging::LogTarget;
use tui::{EventHandler, TICK_RATE};

#[derive(Parser)]
#[command(name = "atos")]
#[command(version, about = "Chat and sales dashboard client for the Atos AI analytics API")]
struct Cli {
    /// API base URL (overrides ATOS_API_BASE_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Match chart axis keys exactly instead of ignoring case
    #[arg(long, global = true)]
    exact_axis_keys: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat and dashboard (default)
    Chat,
    /// Ask one question and print the answer
    Ask {
        /// Your question
        question: String,
        /// Directory for generated PDF, Excel or CSV files
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Generate a CSV report for a question
    Report {
        /// The question the report is about
        question: String,
    },
    /// Print the sales dashboard
    Dashboard,
    /// List the years with sales data
    Years,
    /// Check that the API is reachable
    Status,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.exact_axis_keys {
            config.axis_key_policy = AxisKeyPolicy::Exact;
        }
    }

    fn base_url(&self, config: &Config) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| config.resolved_base_url())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|_| Config::new());
    cli.apply(&mut config);

    let interactive = matches!(cli.command, None | Some(Commands::Chat));
    let target = if interactive { LogTarget::File } else { LogTarget::Stderr };
    let _guard = logging::init(target, config.log_json)?;

    let base_url = cli.base_url(&config);
    let client = AtosClient::new(&base_url, config.timeout())
        .with_context(|| format!("invalid API base URL: {}", base_url))?;
    info!(base_url = %client.base_url(), timeout_secs = config.timeout_secs, "client ready");

    let policy = config.axis_key_policy;
    match cli.command {
        None | Some(Commands::Chat) => run_tui(client, &config).await,
        Some(Commands::Ask { question, out }) => {
            let out_dir = out.unwrap_or_else(|| config.resolved_download_dir());
            cli::ask(&client, &question, policy, &out_dir).await
        }
        Some(Commands::Report { question }) => cli::report(&client, &question, policy).await,
        Some(Commands::Dashboard) => cli::dashboard(&client).await,
        Some(Commands::Years) => cli::years(&client).await,
        Some(Commands::Status) => cli::status(&client).await,
    }
}

async fn run_tui(client: AtosClient, config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);
    let mut app = App::new(client, config);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    app.shutdown();
    tui::restore()?;
    info!("session ended");
    result
}

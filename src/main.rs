use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use mentor::constants;
use mentor::github::GitHubClient;
use mentor::llm_interaction::{GeminiClient, GeminiConfig};
use mentor::web_server::{self, AppState};
use mentor::youtube::YouTubeClient;
use mentor::{SessionConfig, SessionManager};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web UI.
    Serve {
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding the page templates.")]
        templates: PathBuf,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
        #[arg(long, default_value_t = constants::DEFAULT_SESSION_IDLE_SECS, help = "Discard web sessions idle for this many seconds.")]
        session_idle_secs: u64,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Chat about a topic in the terminal.
    Chat {
        #[arg(long, help = "Topic to generate a roadmap for; asked interactively if omitted.")]
        topic: Option<String>,
        #[command(flatten)]
        service: ServiceArgs,
    },
}

/// Settings shared by every front end.
#[derive(clap::Args, Debug)]
struct ServiceArgs {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL", default_value = constants::DEFAULT_GEMINI_MODEL)]
    gemini_model: String,
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    youtube_api_key: Option<String>,
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
    #[arg(long, env = "MENTOR_TIMEOUT_SECS", default_value_t = constants::DEFAULT_TIMEOUT_SECS, help = "Timeout for each external API call.")]
    timeout_secs: u64,
    #[arg(long, default_value_t = constants::DEFAULT_RECENT_EXCHANGES, help = "Exchanges included verbatim in follow-up prompts.")]
    recent_exchanges: usize,
    #[arg(long, default_value_t = constants::DEFAULT_SUMMARY_EVERY, help = "Refresh the rolling summary every N messages (0 disables).")]
    summary_every: usize,
    #[arg(long, default_value_t = constants::DEFAULT_RESULT_LIMIT, help = "Videos and repositories listed per topic.")]
    results: usize,
}

impl ServiceArgs {
    fn build_manager(self) -> Result<SessionManager> {
        let timeout = Duration::from_secs(self.timeout_secs);
        if self.gemini_api_key.is_none() {
            error!("GEMINI_API_KEY is not set; roadmap and chat requests will fail");
        }

        let gemini = Arc::new(
            GeminiClient::new(
                GeminiConfig::new(self.gemini_api_key)
                    .with_model(self.gemini_model)
                    .with_timeout(timeout),
            )
            .context("Failed to build Gemini client")?,
        );
        let youtube = Arc::new(
            YouTubeClient::new(self.youtube_api_key, timeout)
                .context("Failed to build YouTube client")?,
        );
        let github = Arc::new(
            GitHubClient::new(self.github_token, timeout).context("Failed to build GitHub client")?,
        );

        let config = SessionConfig {
            recent_exchanges: self.recent_exchanges,
            summary_every: self.summary_every,
            result_limit: self.results,
            call_timeout: timeout,
        };
        Ok(SessionManager::new(gemini.clone(), youtube, github, gemini).with_config(config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,mentor=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            templates,
            static_dir,
            session_idle_secs,
            service,
        } => {
            info!("Starting Mentor web UI on port {}...", port);
            let manager = service.build_manager()?;
            let state = AppState::new(manager, templates)
                .with_session_idle_timeout(Duration::from_secs(session_idle_secs));

            let mut web_server_handle = tokio::spawn(async move {
                web_server::start_web_server(port, state, static_dir).await
            });

            let ctrl_c = tokio::signal::ctrl_c();
            // Pin the ctrl_c future to the stack so its address is stable
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                    web_server_handle.abort();
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(Ok(())) => info!("Web server task completed unexpectedly."),
                        Ok(Err(e)) => {
                            error!("Web server failed: {:?}", e);
                            return Err(e);
                        }
                        // Handle JoinError (e.g., if the task panicked)
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { topic, service } => {
            let manager = service.build_manager()?;
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            mentor::chat::run_chat(&manager, topic, stdin.lock(), stdout.lock())
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}

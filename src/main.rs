use clap::{Parser, Subcommand};

use npauth::cli::{commands, output};

#[derive(Parser)]
#[command(name = "npauth", version, about = "OAuth2 token lifecycle manager for a now-playing chat bot")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the authorization URL for a user
    Url {
        /// User identity, e.g. alice#0001
        user: String,

        /// Open the URL in the default browser
        #[arg(long)]
        open: bool,
    },

    /// Show whether a user's token is valid, expired or missing
    Status {
        user: String,
    },

    /// Print a valid access token, refreshing it if needed
    Token {
        user: String,
    },

    /// Exchange an authorization code and store the token
    Exchange {
        /// Authorization code from the provider redirect
        code: String,
        user: String,
    },

    /// Delete a user's stored token
    Revoke {
        user: String,
    },

    /// Run a chat message through the command dispatcher
    Dispatch {
        user: String,
        message: String,
    },

    /// Serve the OAuth callback and status endpoints
    Serve {
        /// Listen address, overrides server.bind
        #[arg(long, env = "NPAUTH_BIND")]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("NPAUTH_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        output::print_error(&e, json);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), npauth::NpauthError> {
    let config = npauth::load_config(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Url { user, open } => commands::run_url(&config, &user, open, json).await,
        Commands::Status { user } => commands::run_status(&config, &user, json).await,
        Commands::Token { user } => commands::run_token(&config, &user, json).await,
        Commands::Exchange { code, user } => {
            commands::run_exchange(&config, &code, &user, json).await
        }
        Commands::Revoke { user } => commands::run_revoke(&config, &user, json).await,
        Commands::Dispatch { user, message } => {
            commands::run_dispatch(&config, &user, &message, json).await
        }
        Commands::Serve { bind } => commands::run_serve(&config, bind.as_deref()).await,
    }
}

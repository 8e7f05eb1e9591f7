use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slashkv::{
    api, commands,
    config::Config,
    db,
    kv::{KeyValueStore, KvError, OnExists},
    slack::{
        access::DEFAULT_ACCESS_NAMESPACE, AccessRule, Authenticator, SlashCommand, StoreAccess,
    },
};

#[derive(Parser)]
#[command(name = "slashkv")]
#[command(about = "Slack slash-command webhook backed by a hierarchical key-value store")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run command text through the dispatcher and print the reply
    Dispatch {
        /// Command text, as typed after the slash command
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Inspect or edit the key-value store
    Kv {
        #[command(subcommand)]
        command: KvCommands,
    },
    /// Manage store-backed access rules
    Access {
        #[command(subcommand)]
        command: AccessCommands,
    },
}

#[derive(Subcommand)]
enum KvCommands {
    /// Read a key, falling back to ancestor namespaces
    Get { namespace: String, key: String },
    /// Write a key, creating the namespace if needed
    Set {
        namespace: String,
        key: String,
        value: String,
    },
    /// Delete a namespace and all of its entries
    Delete { namespace: String },
    /// List all namespaces
    List,
    /// Print the merged view of a namespace as JSON
    Show { namespace: String },
}

#[derive(Subcommand)]
enum AccessCommands {
    /// Allow a verification token, optionally for one team only
    Grant {
        token: String,
        #[arg(short, long)]
        team: Option<String>,
    },
    /// Remove a token's rule
    Revoke { token: String },
}

/// Initialize tracing with output to stderr (for one-shot commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "slashkv=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Keep stdout clean for command output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_store(config: &Config) -> anyhow::Result<KeyValueStore> {
    let path = config.database_path()?;
    let db = db::Database::open(path.clone())
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    db.migrate()?;
    Ok(KeyValueStore::new(db))
}

fn build_dispatcher(config: &Config) -> anyhow::Result<slashkv::slack::Dispatcher> {
    let protected = config
        .access_namespace
        .as_deref()
        .unwrap_or(DEFAULT_ACCESS_NAMESPACE);
    Ok(commands::example_dispatcher(
        &config.hierarchy_separator,
        Some(protected),
    )?)
}

async fn serve(config: Config, port: Option<u16>, bind: Option<String>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.port);
    let bind = bind.unwrap_or_else(|| config.bind.clone());
    tracing::info!("Starting slashkv server on {}:{}", bind, port);

    let store = open_store(&config)?;
    let authenticator = Authenticator::from_arc(config.access_provider(&store));
    if config.access_namespace.is_none() && config.access.is_empty() {
        tracing::warn!("No access rules configured; every request will be denied");
    }

    let state = api::AppState::new(store, authenticator, build_dispatcher(&config)?);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
    tracing::info!("slashkv listening on http://{}:{}", bind, port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_kv(config: &Config, command: KvCommands) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let separator = config.hierarchy_separator.as_str();

    match command {
        KvCommands::Get { namespace, key } => {
            let segment = store.get(&namespace, Some(separator), false)?;
            match segment.read(&key) {
                Ok(value) => println!("{}", value.unwrap_or_default()),
                Err(KvError::KeyNotFound { .. }) => {
                    anyhow::bail!("'{}' is not set in '{}'", key, namespace)
                }
                Err(e) => return Err(e.into()),
            }
        }
        KvCommands::Set {
            namespace,
            key,
            value,
        } => {
            store.update(&namespace, [(key, value)], OnExists::Update)?;
        }
        KvCommands::Delete { namespace } => {
            if !store.delete(&namespace)? {
                anyhow::bail!("namespace '{}' does not exist", namespace);
            }
        }
        KvCommands::List => {
            for namespace in store.namespaces()? {
                println!("{}", namespace);
            }
        }
        KvCommands::Show { namespace } => {
            let segment = store.get(&namespace, Some(separator), false)?;
            println!("{}", serde_json::to_string_pretty(&segment.snapshot()?)?);
        }
    }
    Ok(())
}

fn run_access(config: &Config, command: AccessCommands) -> anyhow::Result<()> {
    let namespace = config
        .access_namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_ACCESS_NAMESPACE.to_string());
    if config.access_namespace.is_none() {
        tracing::warn!(
            "access_namespace is not configured; the server will keep using the static access table"
        );
    }
    let access = StoreAccess::new(open_store(config)?, namespace);

    match command {
        AccessCommands::Grant { token, team } => {
            let rule = team.map_or(AccessRule::AnyTeam, AccessRule::Team);
            access.grant(&token, &rule)?;
        }
        AccessCommands::Revoke { token } => {
            if !access.revoke(&token)? {
                anyhow::bail!("no access rule for that token");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Only the server logs to stdout
    let use_stderr = !matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve { port, bind }) => serve(config, port, bind).await?,
        Some(Commands::Dispatch { text }) => {
            let store = open_store(&config)?;
            let dispatcher = build_dispatcher(&config)?;
            let request = SlashCommand::with_text(&text.join(" "));
            let response = dispatcher.dispatch(&request, &store)?;
            println!("{}", response.to_json()?);
        }
        Some(Commands::Kv { command }) => run_kv(&config, command)?,
        Some(Commands::Access { command }) => run_access(&config, command)?,
        None => serve(config, None, None).await?,
    }

    Ok(())
}

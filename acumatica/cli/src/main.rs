//! acu - Inspect and query an Acumatica instance through its generated client

use std::path::PathBuf;

use acumatica_client::cache::SnapshotStore;
use acumatica_client::{AcumaticaClient, CacheConfig, ClientConfig, QueryOptions};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use serde_json::Value;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "acu")]
#[command(about = "Inspect and query an Acumatica instance", long_about = None)]
#[command(after_help = "Connection settings come from ACUMATICA_URL, ACUMATICA_USERNAME,\n\
                        ACUMATICA_PASSWORD and ACUMATICA_TENANT (a .env file is read too).")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Generate everything from the live schema without reading or writing snapshots
    #[arg(long, global = true)]
    no_cache: bool,

    /// Ignore any snapshot and regenerate everything
    #[arg(long, global = true, conflicts_with = "no_cache")]
    force_rebuild: bool,

    /// Snapshot directory [default: platform cache dir]
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Accept invalid TLS certificates (self-signed development instances)
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List generated models, or show the fields of one
    Models {
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// List generated services, or show the methods of one
    Services {
        #[arg(value_name = "TAG")]
        tag: Option<String>,
    },

    /// List generic inquiries
    Inquiries,

    /// Fetch entities; a list unless ID is given
    Get {
        #[arg(value_name = "ENTITY")]
        entity: String,

        /// Primary key (comma separated for compound keys)
        #[arg(value_name = "ID")]
        id: Option<String>,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Run a generic inquiry by method name
    Inquiry {
        #[arg(value_name = "METHOD")]
        method: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Inspect or clear the snapshot cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Connect and report how the cache was used
    Stats,
    /// List snapshot files
    List,
    /// Delete every snapshot file
    Clear,
}

#[derive(Args)]
struct QueryArgs {
    /// Raw OData $filter expression
    #[arg(long)]
    filter: Option<String>,

    /// Fields to return (repeatable)
    #[arg(long)]
    select: Vec<String>,

    /// Detail entities to expand (repeatable)
    #[arg(long)]
    expand: Vec<String>,

    #[arg(long)]
    top: Option<u32>,

    #[arg(long)]
    skip: Option<u32>,
}

impl QueryArgs {
    fn to_options(&self) -> Option<QueryOptions> {
        let empty = self.filter.is_none()
            && self.select.is_empty()
            && self.expand.is_empty()
            && self.top.is_none()
            && self.skip.is_none();
        if empty {
            return None;
        }

        let mut options = QueryOptions::new()
            .select(self.select.iter().cloned())
            .expand(self.expand.iter().cloned());
        if let Some(filter) = &self.filter {
            options = options.filter(filter);
        }
        if let Some(top) = self.top {
            options = options.top(top);
        }
        if let Some(skip) = self.skip {
            options = options.skip(skip);
        }
        Some(options)
    }
}

/// Initialize tracing subscriber based on verbosity and output format
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,acumatica_client=info".to_string(),
            2 => "info,acumatica_client=debug".to_string(),
            _ => "debug,acumatica_client=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

impl Cli {
    /// Applies the cache flags on top of whatever the environment configured.
    fn apply_cache_flags(&self, mut cache: CacheConfig) -> CacheConfig {
        if self.no_cache {
            cache.enabled = false;
        }
        if self.force_rebuild {
            cache.force_rebuild = true;
        }
        if let Some(dir) = &self.cache_dir {
            cache.dir = Some(dir.clone());
        }
        cache
    }

    /// Cache settings for commands that never connect.
    fn offline_cache(&self) -> CacheConfig {
        let mut cache = CacheConfig::default();
        if let Some(dir) = std::env::var_os("ACUMATICA_CACHE_DIR") {
            cache.dir = Some(dir.into());
        }
        self.apply_cache_flags(cache)
    }

    async fn connect(&self) -> Result<AcumaticaClient> {
        let mut config = ClientConfig::from_env().wrap_err("reading ACUMATICA_* configuration")?;
        config.cache = self.apply_cache_flags(config.cache);
        if self.insecure {
            config.verify_ssl = false;
        }
        AcumaticaClient::connect(config)
            .await
            .wrap_err("connecting to Acumatica")
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_models(client: &AcumaticaClient, name: Option<&str>) -> Result<()> {
    let Some(name) = name else {
        for model in client.list_models() {
            println!("{model}");
        }
        return Ok(());
    };

    let model = client
        .models()
        .get(name)
        .ok_or_else(|| eyre!("Model '{name}' not found. Run 'acu models' to see them all."))?;
    println!("{}", model.name());
    for field in model.fields() {
        let marker = if field.required { " (required)" } else { "" };
        println!("  {}: {}{}", field.name, field.ty, marker);
    }
    Ok(())
}

fn show_services(client: &AcumaticaClient, tag: Option<&str>) -> Result<()> {
    let Some(tag) = tag else {
        for service in client.list_services() {
            println!("{service}");
        }
        return Ok(());
    };

    let service = client.service(tag)?;
    for op in service.methods() {
        println!("{} [{} {}]", op.method_name, op.http_method, op.path);
        for line in op.doc.to_string().lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.json);

    match &cli.command {
        Commands::Models { name } => {
            let client = cli.connect().await?;
            show_models(&client, name.as_deref())?;
            client.close().await?;
        }
        Commands::Services { tag } => {
            let client = cli.connect().await?;
            show_services(&client, tag.as_deref())?;
            client.close().await?;
        }
        Commands::Inquiries => {
            let client = cli.connect().await?;
            for spec in client.inquiries().iter() {
                println!("{} ({})", spec.method_name, spec.name);
            }
            client.close().await?;
        }
        Commands::Get { entity, id, query } => {
            let client = cli.connect().await?;
            let service = client.service(entity)?;
            let body = match id {
                Some(id) => {
                    let keys: Vec<&str> = id.split(',').map(str::trim).collect();
                    service.get_by_id(keys, query.to_options(), None).await?
                }
                None => service.get_list(query.to_options(), None).await?,
            };
            print_json(&body.unwrap_or(Value::Null))?;
            client.close().await?;
        }
        Commands::Inquiry { method, query } => {
            let client = cli.connect().await?;
            let body = client.inquiries().call(method, query.to_options()).await?;
            print_json(&body.unwrap_or(Value::Null))?;
            client.close().await?;
        }
        Commands::Cache { action } => match action {
            CacheCommand::Stats => {
                let client = cli.connect().await?;
                print_json(&serde_json::to_value(client.cache_stats())?)?;
                client.close().await?;
            }
            CacheCommand::List => {
                let store = SnapshotStore::new(cli.offline_cache().resolved_dir()?);
                for path in store.entries()? {
                    println!("{}", path.display());
                }
            }
            CacheCommand::Clear => {
                let store = SnapshotStore::new(cli.offline_cache().resolved_dir()?);
                let removed = store.clear()?;
                println!("Removed {removed} snapshot(s) from {}", store.dir().display());
            }
        },
    }

    Ok(())
}

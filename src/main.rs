use std::{io::read_to_string, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::*;
use cozo_client::{
    daemon::{self, Daemon},
    Client, ClientConfig, EmbeddedHandle, NativeOpener, Params, Relations,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Embedded engine to open, `http` for a remote server [env: COZO_ENGINE]
    #[arg(long, global = true)]
    engine: Option<String>,
    /// Storage path for persistent engines [env: COZO_PATH]
    #[arg(long = "path", global = true)]
    db_path: Option<PathBuf>,
    /// Print query results as tables
    #[arg(long, global = true)]
    table: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a CozoScript query, read from stdin when not given
    Run {
        script: Option<String>,
        /// Named parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// Export relations as JSON
    Export {
        #[arg(required = true)]
        relations: Vec<String>,
    },
    /// Import relations from a JSON file, or stdin
    Import { file: Option<PathBuf> },
    /// Back the database up to a file
    Backup { path: String },
    /// Restore an empty embedded database from a backup
    Restore { path: String },
    /// Import relations from a backup file
    ImportFromBackup {
        path: String,
        #[arg(required = true)]
        relations: Vec<String>,
    },
    /// Serve the embedded database over HTTP, authenticated with COZO_AUTH
    Serve {
        #[arg(long, default_value = "127.0.0.1:9070")]
        bind: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if dotenv::dotenv().is_err() {
        warn!("didn't load a .env file")
    }

    let args = Cli::parse();

    let mut config = ClientConfig::from_env().context("failed to read configuration")?;
    if let Some(engine) = args.engine {
        config = config.with_engine(engine);
    }
    if let Some(path) = args.db_path {
        config.path = path;
    }
    config.table = args.table;

    match args.command {
        Commands::Serve { bind } => serve(config, &bind),
        command => {
            let client = Client::new(config).context("failed to create client")?;
            execute(&client, command)
        }
    }
}

fn execute(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Run { script, params } => {
            let script = match script {
                Some(script) => script,
                None => read_to_string(std::io::stdin())?,
            };
            let params: Option<Params> = params
                .map(|p| serde_json::from_str(&p))
                .transpose()
                .context("--params must be a JSON object")?;

            match client.run(&script, params.as_ref()) {
                Ok(output) => println!("{output}"),
                Err(e) => match e.failure() {
                    Some(failure) => bail!("{}", failure.display()),
                    None => return Err(e.into()),
                },
            }
        }
        Commands::Export { relations } => {
            let data = client.export_relations(&relations)?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::Import { file } => {
            let input = match file {
                Some(file) => std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
                None => read_to_string(std::io::stdin())?,
            };
            let data: Relations =
                serde_json::from_str(&input).context("import data must map relations to rows")?;
            client.import_relations(&data)?;
        }
        Commands::Backup { path } => client.backup(&path)?,
        Commands::Restore { path } => client.restore(&path)?,
        Commands::ImportFromBackup { path, relations } => {
            client.import_from_backup(&path, &relations)?
        }
        Commands::Serve { .. } => bail!("serve does not take a client"),
    }

    Ok(())
}

/// Runs the embedded database as a daemon serving over HTTP
fn serve(config: ClientConfig, bind: &str) -> Result<()> {
    if config.is_remote() {
        bail!("only embedded databases can be served");
    }
    let auth = std::env::var("COZO_AUTH").context("COZO_AUTH env variable not set")?;
    let options = serde_json::to_string(&config.options)?;
    let db = EmbeddedHandle::open(&NativeOpener, &config.engine, &config.path, &options)
        .context("failed to open embedded database")?;

    actix_web::rt::System::new()
        .block_on(daemon::run(Daemon::new(db, auth), bind))
        .context("daemon failed")
}

use tracing::debug;

use crate::{
    config::{ClientConfig, RemoteOptions},
    embedded::{EmbeddedEngine, EmbeddedHandle, EngineOpener, NativeOpener},
    error::{Error, Result},
    remote::RemoteClient,
    reply::{self, NamedRows, Params, Relations},
};

#[cfg(feature = "table")]
use crate::table::{PrettyTable, TableFormat};

/// The transport a client is bound to for its whole life.
#[derive(Debug)]
enum Backend {
    Embedded(EmbeddedHandle),
    Remote(RemoteClient),
}

/// What [`Client::run`] returns.
#[derive(Debug)]
#[non_exhaustive]
pub enum Output {
    Rows(NamedRows),
    #[cfg(feature = "table")]
    Table(comfy_table::Table),
}

impl Output {
    /// The structured rows, or `None` when the result was rendered as a table.
    pub fn into_rows(self) -> Option<NamedRows> {
        match self {
            Output::Rows(rows) => Some(rows),
            #[cfg(feature = "table")]
            Output::Table(_) => None,
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Rows(rows) => std::fmt::Display::fmt(rows, f),
            #[cfg(feature = "table")]
            Output::Table(table) => std::fmt::Display::fmt(table, f),
        }
    }
}

/// A CozoDB client, either embedded in this process or talking to a server over HTTP.
///
/// An embedded client holds native resources. They are released by [`close`](Self::close)
/// or when the client is dropped.
///
/// ```no_run
/// use cozo_client::{Client, ClientConfig};
///
/// # fn main() -> cozo_client::Result<()> {
/// let db = Client::new(ClientConfig::http("http://127.0.0.1:9070", "secret"))?;
/// let output = db.run("?[a] := a = 1", None)?;
/// println!("{output}");
/// # Ok(())
/// # }
/// ```
pub struct Client {
    backend: Backend,
    #[cfg(feature = "table")]
    table: Option<Box<dyn TableFormat>>,
}

impl Client {
    /// Builds a client, opening embedded engines with [`NativeOpener`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_opener(config, &NativeOpener)
    }

    pub fn with_opener(config: ClientConfig, opener: &dyn EngineOpener) -> Result<Self> {
        let backend = if config.is_remote() {
            let remote = RemoteOptions::from_options(&config.options)?;
            debug!(host = %remote.host, "using remote database");
            Backend::Remote(RemoteClient::new(remote))
        } else {
            let options = serde_json::to_string(&config.options)?;
            Backend::Embedded(EmbeddedHandle::open(
                opener,
                &config.engine,
                &config.path,
                &options,
            )?)
        };
        Ok(Self::from_backend(backend, config.table))
    }

    /// Wraps an engine that is already open.
    pub fn from_engine(engine: Box<dyn EmbeddedEngine>, table: bool) -> Self {
        Self::from_backend(Backend::Embedded(EmbeddedHandle::new(engine)), table)
    }

    fn from_backend(backend: Backend, table: bool) -> Self {
        #[cfg(not(feature = "table"))]
        if table {
            tracing::warn!("table output was requested, but the `table` feature is not enabled");
        }
        Self {
            backend,
            #[cfg(feature = "table")]
            table: table.then(|| Box::new(PrettyTable) as Box<dyn TableFormat>),
        }
    }

    /// Replaces the table strategy; `None` returns structured rows.
    #[cfg(feature = "table")]
    pub fn table_format(mut self, table: Option<Box<dyn TableFormat>>) -> Self {
        self.table = table;
        self
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }

    /// Releases an embedded engine. A no-op for remote clients and for clients already closed.
    pub fn close(&mut self) {
        if let Backend::Embedded(db) = &mut self.backend {
            db.close();
        }
    }

    /// Runs a CozoScript query with optional named parameters.
    pub fn run(&self, script: &str, params: Option<&Params>) -> Result<Output> {
        if script.trim().is_empty() {
            return Err(Error::InvalidArgument("script must not be empty"));
        }
        let empty = Params::new();
        let params = params.unwrap_or(&empty);

        let resp = match &self.backend {
            Backend::Embedded(db) => db.run_query(script, params)?,
            Backend::Remote(remote) => remote.run_query(script, params)?,
        };
        let rows = reply::rows(reply::check(resp).map_err(Error::Query)?)?;
        Ok(self.format(rows))
    }

    #[cfg(feature = "table")]
    fn format(&self, rows: NamedRows) -> Output {
        match &self.table {
            Some(table) => Output::Table(table.tabulate(&rows)),
            None => Output::Rows(rows),
        }
    }

    #[cfg(not(feature = "table"))]
    fn format(&self, rows: NamedRows) -> Output {
        Output::Rows(rows)
    }

    /// Exports the named relations with all their rows.
    pub fn export_relations(&self, relations: &[String]) -> Result<Relations> {
        if relations.is_empty() {
            return Err(Error::InvalidArgument("no relations to export"));
        }
        check_names(relations)?;
        let resp = match &self.backend {
            Backend::Embedded(db) => db.export_relations(relations)?,
            Backend::Remote(remote) => remote.export_relations(relations)?,
        };
        reply::relations(reply::check(resp).map_err(Error::Export)?)
    }

    /// Imports rows in the format returned by [`export_relations`](Self::export_relations).
    /// The relations must already exist.
    pub fn import_relations(&self, data: &Relations) -> Result<()> {
        let resp = match &self.backend {
            Backend::Embedded(db) => db.import_relations(data)?,
            Backend::Remote(remote) => remote.import_relations(data)?,
        };
        reply::check(resp).map_err(Error::Import)?;
        Ok(())
    }

    /// Backs the database up to `path`. For remote databases the path is on the server.
    pub fn backup(&self, path: &str) -> Result<()> {
        let resp = match &self.backend {
            Backend::Embedded(db) => db.backup(path)?,
            Backend::Remote(remote) => remote.backup(path)?,
        };
        reply::check(resp).map_err(Error::Backup)?;
        Ok(())
    }

    /// Restores a backup into an empty database. Remote databases must be restored on the
    /// server itself.
    pub fn restore(&self, path: &str) -> Result<()> {
        let resp = match &self.backend {
            Backend::Embedded(db) => db.restore(path)?,
            Backend::Remote(_) => return Err(Error::Unsupported("restore")),
        };
        reply::check(resp).map_err(Error::Restore)?;
        Ok(())
    }

    /// Imports the named relations from a backup. The relations must already exist.
    pub fn import_from_backup(&self, path: &str, relations: &[String]) -> Result<()> {
        check_names(relations)?;
        let resp = match &self.backend {
            Backend::Embedded(db) => db.import_from_backup(path, relations)?,
            Backend::Remote(remote) => remote.import_from_backup(path, relations)?,
        };
        reply::check(resp).map_err(Error::Import)?;
        Ok(())
    }
}

fn check_names(relations: &[String]) -> Result<()> {
    if relations.iter().any(String::is_empty) {
        return Err(Error::InvalidArgument("relation names must not be empty"));
    }
    Ok(())
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

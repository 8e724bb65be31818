use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Engine selector that routes a client to the remote transport.
pub const HTTP_ENGINE: &str = "http";

/// How to construct a [`Client`](crate::Client).
///
/// `engine` is either `"http"` for a remote server or the name of an embedded engine
/// (`mem`, `sqlite`, `rocksdb`, ...). `path` only matters for persistent embedded engines.
/// For `"http"`, `options` must carry `host` and `auth`; embedded engines get the options
/// as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub engine: String,
    pub path: PathBuf,
    pub options: Map<String, Value>,
    /// Render query results as tables. Off by default, since a rendered table no longer
    /// carries the structured rows.
    pub table: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            engine: "mem".into(),
            path: PathBuf::new(),
            options: Map::new(),
            table: false,
        }
    }
}

impl ClientConfig {
    pub fn http(host: impl Into<String>, auth: impl Into<String>) -> Self {
        let mut options = Map::new();
        options.insert("host".into(), Value::String(host.into()));
        options.insert("auth".into(), Value::String(auth.into()));
        Self {
            engine: HTTP_ENGINE.into(),
            options,
            ..Default::default()
        }
    }

    pub fn embedded(engine: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Switches the engine. Leaving `http` drops the remote `host`/`auth` options so
    /// they are not handed to an embedded engine.
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        let engine = engine.into();
        if self.is_remote() && engine != HTTP_ENGINE {
            self.options.clear();
        }
        self.engine = engine;
        self
    }

    pub fn with_table(mut self, table: bool) -> Self {
        self.table = table;
        self
    }

    /// Reads `COZO_ENGINE`, `COZO_PATH`, `COZO_OPTIONS`, `COZO_HOST` and `COZO_AUTH`.
    ///
    /// A set `COZO_HOST` selects the http engine.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = var("COZO_HOST") {
            let mut options = Map::new();
            options.insert("host".into(), Value::String(host));
            if let Some(auth) = var("COZO_AUTH") {
                options.insert("auth".into(), Value::String(auth));
            }
            return Ok(Self {
                engine: HTTP_ENGINE.into(),
                options,
                ..Default::default()
            });
        }

        let mut config = Self::default();
        if let Some(engine) = var("COZO_ENGINE") {
            config.engine = engine;
        }
        if let Some(path) = var("COZO_PATH") {
            config.path = path.into();
        }
        if let Some(options) = var("COZO_OPTIONS") {
            config.options = serde_json::from_str(&options)?;
        }
        Ok(config)
    }

    pub fn is_remote(&self) -> bool {
        self.engine == HTTP_ENGINE
    }
}

/// Endpoint of a remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOptions {
    pub host: String,
    pub auth: String,
}

impl RemoteOptions {
    pub fn from_options(options: &Map<String, Value>) -> Result<Self> {
        let field = |key: &'static str| match options.get(key) {
            None | Some(Value::Null) => Err(Error::MissingOption(key)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(Error::InvalidOption(key)),
        };
        Ok(Self {
            host: field("host")?.trim_end_matches('/').to_owned(),
            auth: field("auth")?,
        })
    }
}

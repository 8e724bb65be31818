use serde_json::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the client. Engine-reported failures keep the reply they came from.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing option `{0}` for the http engine")]
    MissingOption(&'static str),

    #[error("option `{0}` must be a string")]
    InvalidOption(&'static str),

    #[error("failed to open `{engine}` engine: {cause}")]
    Acquisition { engine: String, cause: String },

    #[error("{0}")]
    Query(Failure),

    #[error("export failed: {0}")]
    Export(Failure),

    #[error("import failed: {0}")]
    Import(Failure),

    #[error("backup failed: {0}")]
    Backup(Failure),

    #[error("restore failed: {0}")]
    Restore(Failure),

    #[error("{0} is not supported on remote databases")]
    Unsupported(&'static str),

    #[error("the database has been closed")]
    Closed,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// The engine-reported failure behind this error, if there is one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::Query(f)
            | Error::Export(f)
            | Error::Import(f)
            | Error::Backup(f)
            | Error::Restore(f) => Some(f),
            _ => None,
        }
    }
}

/// A reply with `ok: false`.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: Option<String>,
    /// Human-formatted rendering of the error, usually with ANSI colours.
    pub display: Option<String>,
    pub reply: Value,
}

impl Failure {
    pub(crate) fn from_reply(reply: Value) -> Self {
        let text = |key: &str| reply.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            message: text("message"),
            display: text("display"),
            reply,
        }
    }

    /// The pretty rendering, falling back to the message and then the raw reply.
    pub fn display(&self) -> String {
        self.display
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| self.reply.to_string())
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message),
            None => write!(f, "{}", self.reply),
        }
    }
}

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::instrument;
use url::form_urlencoded;

use crate::{
    config::RemoteOptions,
    error::Result,
    reply::{self, Params, Relations},
};

/// Header carrying the server's auth token.
pub const AUTH_HEADER: &str = "x-cozo-auth";

/// Talks to a CozoDB server over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    host: String,
    auth: String,
    client: Client,
}

impl RemoteClient {
    pub fn new(options: RemoteOptions) -> Self {
        Self {
            host: options.host,
            auth: options.auth,
            client: Client::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Sends the request and decodes the body whatever the status code.
    /// A body that is not JSON is a decode error, not a transport one.
    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let body = request.header(AUTH_HEADER, &self.auth).send()?.text()?;
        reply::parse(&body)
    }

    #[instrument(skip_all)]
    pub fn run_query(&self, script: &str, params: &Params) -> Result<Value> {
        self.send(
            self.client
                .post(format!("{}/text-query", self.host))
                .json(&json!({ "script": script, "params": params })),
        )
    }

    #[instrument(skip_all)]
    pub fn export_relations(&self, relations: &[String]) -> Result<Value> {
        self.send(self.client.get(export_url(&self.host, relations)))
    }

    #[instrument(skip_all)]
    pub fn import_relations(&self, data: &Relations) -> Result<Value> {
        self.send(self.client.put(format!("{}/import", self.host)).json(data))
    }

    #[instrument(skip_all)]
    pub fn backup(&self, path: &str) -> Result<Value> {
        self.send(
            self.client
                .post(format!("{}/backup/", self.host))
                .json(&json!({ "path": path })),
        )
    }

    #[instrument(skip_all)]
    pub fn import_from_backup(&self, path: &str, relations: &[String]) -> Result<Value> {
        self.send(
            self.client
                .post(format!("{}/import-from-backup", self.host))
                .json(&json!({ "path": path, "relations": relations })),
        )
    }
}

/// Each name is form-encoded on its own, so commas inside names survive the join.
fn export_url(host: &str, relations: &[String]) -> String {
    let names = relations
        .iter()
        .map(|name| form_urlencoded::byte_serialize(name.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join(",");
    format!("{host}/export/{names}")
}

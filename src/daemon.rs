use std::net::{SocketAddr, ToSocketAddrs};

use actix_web::{
    dev::Server, error::InternalError, http::StatusCode, web, App, HttpRequest, HttpResponse,
    HttpServer,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use url::form_urlencoded;

use crate::{
    embedded::EmbeddedHandle,
    error::Result,
    remote::AUTH_HEADER,
    reply::Params,
};

/// Largest request body accepted, imports can be big.
const MAX_BODY: usize = 256 * 1024 * 1024;

/// The state shared by all workers: the embedded database and the token clients must send.
pub struct Daemon {
    db: EmbeddedHandle,
    auth: String,
}

impl Daemon {
    pub fn new(db: EmbeddedHandle, auth: impl Into<String>) -> Self {
        Self {
            db,
            auth: auth.into(),
        }
    }

    fn authorized(&self, req: &HttpRequest) -> bool {
        req.headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |token| token == self.auth)
    }
}

/// Binds the HTTP server without starting it. Returns the server future and the bound addresses.
///
/// Must be called from within an actix system.
pub fn bind(daemon: Daemon, addr: impl ToSocketAddrs) -> std::io::Result<(Server, Vec<SocketAddr>)> {
    let daemon = web::Data::new(daemon);
    let server = HttpServer::new(move || {
        use endpoints::*;

        App::new()
            .service(query_endpoint)
            .service(export_endpoint)
            .service(import_endpoint)
            .service(backup_endpoint)
            .service(import_from_backup_endpoint)
            .app_data(daemon.clone())
            .app_data(
                web::JsonConfig::default()
                    .limit(MAX_BODY)
                    .error_handler(|err, _req| {
                        let body = failure(&err.to_string());
                        InternalError::from_response(err, HttpResponse::BadRequest().json(body))
                            .into()
                    }),
            )
    })
    .bind(addr)?;
    let addrs = server.addrs();
    Ok((server.run(), addrs))
}

/// Serves the embedded database over HTTP until the server stops.
pub async fn run(daemon: Daemon, addr: impl ToSocketAddrs) -> std::io::Result<()> {
    let (server, addrs) = bind(daemon, addr)?;
    info!(?addrs, "serving embedded database");
    server.await
}

fn failure(message: &str) -> Value {
    json!({ "ok": false, "message": message })
}

/// The input data for the query endpoint
#[derive(Deserialize)]
pub struct QueryRequest {
    pub script: String,
    #[serde(default)]
    pub params: Params,
}

/// The input data for the backup endpoint
#[derive(Deserialize)]
pub struct BackupRequest {
    pub path: String,
}

/// The input data for the import-from-backup endpoint
#[derive(Deserialize)]
pub struct ImportFromBackupRequest {
    pub path: String,
    pub relations: Vec<String>,
}

/// The API endpoints. Restore has none, remote databases are restored on the server.
pub mod endpoints {
    use actix_web::{get, post, put, web, HttpRequest, Responder};

    use super::{
        export_names, to_responder, BackupRequest, Daemon, ImportFromBackupRequest, QueryRequest,
    };
    use crate::reply::Relations;

    #[post("/text-query")]
    pub async fn query_endpoint(
        input: web::Json<QueryRequest>,
        daemon: web::Data<Daemon>,
        req: HttpRequest,
    ) -> impl Responder {
        let input = input.into_inner();
        to_responder(&daemon, &req, move |db| {
            db.run_query(&input.script, &input.params)
        })
        .await
    }

    #[get("/export/{relations}")]
    pub async fn export_endpoint(daemon: web::Data<Daemon>, req: HttpRequest) -> impl Responder {
        let relations = export_names(req.uri().path());
        to_responder(&daemon, &req, move |db| db.export_relations(&relations)).await
    }

    #[put("/import")]
    pub async fn import_endpoint(
        input: web::Json<Relations>,
        daemon: web::Data<Daemon>,
        req: HttpRequest,
    ) -> impl Responder {
        let input = input.into_inner();
        to_responder(&daemon, &req, move |db| db.import_relations(&input)).await
    }

    #[post("/backup/")]
    pub async fn backup_endpoint(
        input: web::Json<BackupRequest>,
        daemon: web::Data<Daemon>,
        req: HttpRequest,
    ) -> impl Responder {
        let input = input.into_inner();
        to_responder(&daemon, &req, move |db| db.backup(&input.path)).await
    }

    #[post("/import-from-backup")]
    pub async fn import_from_backup_endpoint(
        input: web::Json<ImportFromBackupRequest>,
        daemon: web::Data<Daemon>,
        req: HttpRequest,
    ) -> impl Responder {
        let input = input.into_inner();
        to_responder(&daemon, &req, move |db| {
            db.import_from_backup(&input.path, &input.relations)
        })
        .await
    }
}

/// Decodes the comma-separated, form-encoded names of an `/export/...` path.
fn export_names(path: &str) -> Vec<String> {
    path.trim_start_matches("/export/")
        .split(',')
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            form_urlencoded::parse(name.as_bytes())
                .next()
                .map(|(name, _)| name.into_owned())
        })
        .collect()
}

/// Checks the auth header, runs the engine call off the async workers and relays its reply.
/// Replies with `ok: false` get a 400 status.
async fn to_responder<F>(daemon: &web::Data<Daemon>, req: &HttpRequest, call: F) -> HttpResponse
where
    F: FnOnce(&EmbeddedHandle) -> Result<Value> + Send + 'static,
{
    if !daemon.authorized(req) {
        return HttpResponse::Unauthorized().json(failure("unauthorized"));
    }

    let daemon = daemon.clone();
    let reply = match web::block(move || call(&daemon.db)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => return internal_error(req, &e),
        Err(e) => return internal_error(req, &e),
    };

    let status = if reply["ok"].as_bool() == Some(true) {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    HttpResponse::build(status).json(reply)
}

fn internal_error(req: &HttpRequest, e: &dyn std::fmt::Display) -> HttpResponse {
    error!("daemon error on {}: {e}", req.path());
    HttpResponse::InternalServerError().json(failure(&e.to_string()))
}

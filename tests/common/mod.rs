#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
};

use cozo_client::{
    daemon::{self, Daemon},
    Client, EmbeddedEngine, EmbeddedHandle, NamedRows, Relations,
};
use serde_json::{json, Value};

pub const AUTH: &str = "s3cret";

/// An in-memory stand-in for the native engine.
///
/// Scripts it understands:
/// - `?[a] := a = 1` returns a single row `[1]`
/// - `echo` returns the params, keys as headers
/// - `:create NAME {col, ...}` creates an empty relation
/// - `plain failure` fails without display text
///
/// Anything else fails like a parse error, with display text.
#[derive(Clone, Default)]
pub struct MockEngine {
    pub store: Arc<Mutex<Relations>>,
    pub closed: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Client {
        Client::from_engine(Box::new(self.clone()), false)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn with_relation(self, name: &str, headers: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.store.lock().unwrap().insert(
            name.to_owned(),
            NamedRows::new(headers.iter().map(|h| h.to_string()).collect(), rows),
        );
        self
    }

    fn create(&self, script: &str) -> Value {
        let rest = script.trim_start_matches(":create").trim();
        let Some((name, columns)) = rest.split_once('{') else {
            return fail("bad :create", None);
        };
        let headers = columns
            .trim_end_matches('}')
            .split(',')
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        self.store
            .lock()
            .unwrap()
            .insert(name.trim().to_owned(), NamedRows::new(headers, vec![]));
        json!({"ok": true, "headers": ["status"], "rows": [["OK"]]})
    }

    fn merge(&self, data: Relations) -> Value {
        let mut store = self.store.lock().unwrap();
        if let Some(missing) = data.keys().find(|name| !store.contains_key(*name)) {
            return fail(&format!("Cannot find requested stored relation '{missing}'"), None);
        }
        for (name, incoming) in data {
            let target = store.get_mut(&name).unwrap();
            for row in incoming.rows {
                if !target.rows.contains(&row) {
                    target.rows.push(row);
                }
            }
        }
        json!({"ok": true})
    }
}

fn fail(message: &str, display: Option<&str>) -> Value {
    match display {
        Some(display) => json!({"ok": false, "message": message, "display": display}),
        None => json!({"ok": false, "message": message}),
    }
}

impl EmbeddedEngine for MockEngine {
    fn run_query(&self, script: &str, params: &str) -> String {
        let reply = match script.trim() {
            "?[a] := a = 1" => json!({"ok": true, "headers": ["a"], "rows": [[1]]}),
            "echo" => {
                let params: BTreeMap<String, Value> = serde_json::from_str(params).unwrap();
                json!({
                    "ok": true,
                    "headers": params.keys().collect::<Vec<_>>(),
                    "rows": [params.values().collect::<Vec<_>>()]
                })
            }
            "plain failure" => fail("something broke", None),
            s if s.starts_with(":create") => self.create(s),
            s => fail(
                &format!("The query parser has encountered unexpected input: {s}"),
                Some("\u{1b}[31m×\u{1b}[0m The query parser has encountered unexpected input"),
            ),
        };
        reply.to_string()
    }

    fn export_relations(&self, payload: &str) -> String {
        let payload: Value = serde_json::from_str(payload).unwrap();
        let store = self.store.lock().unwrap();
        let mut data = Relations::new();
        for name in payload["relations"].as_array().unwrap() {
            let name = name.as_str().unwrap();
            match store.get(name) {
                Some(rows) => {
                    data.insert(name.to_owned(), rows.clone());
                }
                None => {
                    return fail(&format!("Cannot find requested stored relation '{name}'"), None)
                        .to_string()
                }
            }
        }
        json!({"ok": true, "data": data}).to_string()
    }

    fn import_relations(&self, payload: &str) -> String {
        let data: Relations = serde_json::from_str(payload).unwrap();
        self.merge(data).to_string()
    }

    fn backup(&self, path: &str) -> String {
        let store = self.store.lock().unwrap();
        let reply = match std::fs::write(path, serde_json::to_string(&*store).unwrap()) {
            Ok(()) => json!({"ok": true}),
            Err(e) => fail(&e.to_string(), None),
        };
        reply.to_string()
    }

    fn restore(&self, path: &str) -> String {
        let mut store = self.store.lock().unwrap();
        if !store.is_empty() {
            return fail("cannot restore backup: current database is not empty", None).to_string();
        }
        let reply = match std::fs::read_to_string(path) {
            Ok(text) => {
                *store = serde_json::from_str(&text).unwrap();
                json!({"ok": true})
            }
            Err(e) => fail(&e.to_string(), None),
        };
        reply.to_string()
    }

    fn import_from_backup(&self, payload: &str) -> String {
        let payload: Value = serde_json::from_str(payload).unwrap();
        let backup: Relations = match std::fs::read_to_string(payload["path"].as_str().unwrap()) {
            Ok(text) => serde_json::from_str(&text).unwrap(),
            Err(e) => return fail(&e.to_string(), None).to_string(),
        };
        let mut data = Relations::new();
        for name in payload["relations"].as_array().unwrap() {
            let name = name.as_str().unwrap();
            match backup.get(name) {
                Some(rows) => {
                    data.insert(name.to_owned(), rows.clone());
                }
                None => {
                    return fail(&format!("relation '{name}' not found in backup"), None)
                        .to_string()
                }
            }
        }
        self.merge(data).to_string()
    }

    fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves `engine` on an ephemeral port from a background actix system and returns its base URL.
pub fn spawn_daemon(engine: MockEngine) -> String {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        actix_web::rt::System::new().block_on(async move {
            let daemon = Daemon::new(EmbeddedHandle::new(Box::new(engine)), AUTH);
            let (server, addrs) = daemon::bind(daemon, "127.0.0.1:0").expect("failed to bind daemon");
            tx.send(addrs[0]).unwrap();
            server.await
        })
    });
    format!("http://{}", rx.recv().expect("daemon thread died"))
}

/// A server that answers every request like a misbehaving proxy: 502 with an HTML body.
pub fn spawn_bad_gateway() -> String {
    use actix_web::{web, App, HttpResponse, HttpServer};

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(|| {
                App::new().default_service(web::to(|| async {
                    HttpResponse::BadGateway()
                        .content_type("text/html")
                        .body("<html>bad gateway</html>")
                }))
            })
            .workers(1)
            .bind("127.0.0.1:0")
            .expect("failed to bind server");
            tx.send(server.addrs()[0]).unwrap();
            server.run().await
        })
    });
    format!("http://{}", rx.recv().expect("server thread died"))
}

use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;

use crate::{
    error::{Error, Result},
    reply::{self, Params, Relations},
};

/// The native engine binding. Every call returns a JSON object with an `ok` flag,
/// shaped like the replies of the HTTP server.
pub trait EmbeddedEngine: Send + Sync {
    fn run_query(&self, script: &str, params: &str) -> String;

    /// `payload` is `{"relations": [...]}`.
    fn export_relations(&self, payload: &str) -> String;

    /// `payload` maps relation names to `{headers, rows}`.
    fn import_relations(&self, payload: &str) -> String;

    fn backup(&self, path: &str) -> String;

    fn restore(&self, path: &str) -> String;

    /// `payload` is `{"path": ..., "relations": [...]}`.
    fn import_from_backup(&self, payload: &str) -> String;

    /// Releases native resources. Called at most once per engine.
    fn close(self: Box<Self>) {}
}

/// Opens an embedded engine from its name, storage path and JSON options.
pub trait EngineOpener {
    fn open(
        &self,
        engine: &str,
        path: &Path,
        options: &str,
    ) -> std::result::Result<Box<dyn EmbeddedEngine>, String>;
}

impl<F> EngineOpener for F
where
    F: Fn(&str, &Path, &str) -> std::result::Result<Box<dyn EmbeddedEngine>, String>,
{
    fn open(
        &self,
        engine: &str,
        path: &Path,
        options: &str,
    ) -> std::result::Result<Box<dyn EmbeddedEngine>, String> {
        self(engine, path, options)
    }
}

/// Opens engines compiled into this crate. Without the `cozo` feature every open fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl EngineOpener for NativeOpener {
    #[cfg(feature = "cozo")]
    fn open(
        &self,
        engine: &str,
        path: &Path,
        options: &str,
    ) -> std::result::Result<Box<dyn EmbeddedEngine>, String> {
        let db = cozo::DbInstance::new(engine, path, options).map_err(|e| e.to_string())?;
        Ok(Box::new(db))
    }

    #[cfg(not(feature = "cozo"))]
    fn open(
        &self,
        _engine: &str,
        _path: &Path,
        _options: &str,
    ) -> std::result::Result<Box<dyn EmbeddedEngine>, String> {
        Err("no embedded engine is compiled in, enable the `cozo` feature".into())
    }
}

#[cfg(feature = "cozo")]
impl EmbeddedEngine for cozo::DbInstance {
    fn run_query(&self, script: &str, params: &str) -> String {
        self.run_script_str(script, params, false)
    }

    fn export_relations(&self, payload: &str) -> String {
        self.export_relations_str(payload)
    }

    fn import_relations(&self, payload: &str) -> String {
        self.import_relations_str(payload)
    }

    fn backup(&self, path: &str) -> String {
        self.backup_db_str(path)
    }

    fn restore(&self, path: &str) -> String {
        self.restore_backup_str(path)
    }

    fn import_from_backup(&self, payload: &str) -> String {
        self.import_from_backup_str(payload)
    }
}

/// Owns an open engine and releases it exactly once, on [`close`](Self::close) or drop.
pub struct EmbeddedHandle {
    engine: Option<Box<dyn EmbeddedEngine>>,
}

impl EmbeddedHandle {
    pub fn new(engine: Box<dyn EmbeddedEngine>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    pub fn open(
        opener: &dyn EngineOpener,
        engine: &str,
        path: &Path,
        options: &str,
    ) -> Result<Self> {
        debug!(engine, path = %path.display(), "opening embedded engine");
        let db = opener
            .open(engine, path, options)
            .map_err(|cause| Error::Acquisition {
                engine: engine.to_owned(),
                cause,
            })?;
        Ok(Self::new(db))
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Returns whether this call released the engine.
    pub fn close(&mut self) -> bool {
        match self.engine.take() {
            Some(engine) => {
                debug!("releasing embedded engine");
                engine.close();
                true
            }
            None => false,
        }
    }

    /// Runs `f` against the open engine and returns its raw reply.
    fn call(&self, f: impl FnOnce(&dyn EmbeddedEngine) -> String) -> Result<String> {
        let engine = self.engine.as_deref().ok_or(Error::Closed)?;
        Ok(f(engine))
    }

    fn call_json(&self, f: impl FnOnce(&dyn EmbeddedEngine) -> String) -> Result<Value> {
        reply::parse(&self.call(f)?)
    }

    pub fn run_query(&self, script: &str, params: &Params) -> Result<Value> {
        let params = serde_json::to_string(params)?;
        self.call_json(|db| db.run_query(script, &params))
    }

    pub fn export_relations(&self, relations: &[String]) -> Result<Value> {
        let payload = json!({ "relations": relations }).to_string();
        self.call_json(|db| db.export_relations(&payload))
    }

    pub fn import_relations(&self, data: &Relations) -> Result<Value> {
        let payload = serde_json::to_string(data)?;
        self.call_json(|db| db.import_relations(&payload))
    }

    pub fn backup(&self, path: &str) -> Result<Value> {
        self.call_json(|db| db.backup(path))
    }

    pub fn restore(&self, path: &str) -> Result<Value> {
        self.call_json(|db| db.restore(path))
    }

    pub fn import_from_backup(&self, path: &str, relations: &[String]) -> Result<Value> {
        let payload = json!({ "path": path, "relations": relations }).to_string();
        self.call_json(|db| db.import_from_backup(&payload))
    }
}

impl Drop for EmbeddedHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EmbeddedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct Echo {
        closed: Arc<AtomicUsize>,
    }

    impl EmbeddedEngine for Echo {
        fn run_query(&self, script: &str, params: &str) -> String {
            json!({"ok": true, "headers": ["script", "params"], "rows": [[script, params]]})
                .to_string()
        }
        fn export_relations(&self, payload: &str) -> String {
            json!({"ok": true, "data": {}, "payload": payload}).to_string()
        }
        fn import_relations(&self, _payload: &str) -> String {
            json!({"ok": true}).to_string()
        }
        fn backup(&self, _path: &str) -> String {
            json!({"ok": true}).to_string()
        }
        fn restore(&self, _path: &str) -> String {
            json!({"ok": true}).to_string()
        }
        fn import_from_backup(&self, payload: &str) -> String {
            json!({"ok": true, "payload": payload}).to_string()
        }
        fn close(self: Box<Self>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn handle() -> (EmbeddedHandle, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let engine = Echo {
            closed: closed.clone(),
        };
        (EmbeddedHandle::new(Box::new(engine)), closed)
    }

    #[test]
    fn params_are_sent_as_json_text() {
        let (db, _) = handle();
        let mut params = Params::new();
        params.insert("name".into(), json!("Ünïcode"));
        let reply = db.run_query("?[x] <- [[$name]]", &params).unwrap();
        assert_eq!(reply["rows"][0][0], json!("?[x] <- [[$name]]"));
        assert_eq!(reply["rows"][0][1], json!(r#"{"name":"Ünïcode"}"#));
    }

    #[test]
    fn payloads_wrap_relation_names() {
        let (db, _) = handle();
        let reply = db.export_relations(&["a".into(), "b c".into()]).unwrap();
        assert_eq!(reply["payload"], json!(r#"{"relations":["a","b c"]}"#));

        let reply = db.import_from_backup("/tmp/backup", &["a".into()]).unwrap();
        let payload: Value = serde_json::from_str(reply["payload"].as_str().unwrap()).unwrap();
        assert_eq!(payload, json!({"path": "/tmp/backup", "relations": ["a"]}));
    }

    #[test]
    fn closes_once() {
        let (mut db, closed) = handle();
        assert!(db.close());
        assert!(!db.close());
        drop(db);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_engine() {
        let (db, closed) = handle();
        drop(db);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn calls_after_close_fail() {
        let (mut db, _) = handle();
        db.close();
        assert!(matches!(db.backup("/tmp/x"), Err(Error::Closed)));
    }

    #[test]
    fn failed_open_names_engine() {
        let opener = |_: &str, _: &Path, _: &str| -> std::result::Result<Box<dyn EmbeddedEngine>, String> {
            Err("disk on fire".into())
        };
        let err = EmbeddedHandle::open(&opener, "rocksdb", Path::new("/nope"), "{}").unwrap_err();
        assert_eq!(err.to_string(), "failed to open `rocksdb` engine: disk on fire");
    }
}

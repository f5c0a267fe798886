//! Integration tests: engine against an in-memory REST server.

use chrono::{DateTime, Utc};
use medisync_engine::{
    ConnectivityMonitor, HttpClient, HttpMethod, HttpResponse, ManualConnectivity,
    MemoryRecordStore, RecordStore, RestClient, SyncConfig, SyncEngine, SyncScheduler,
};
use medisync_model::{EntityType, MutationAction};
use medisync_store::{FileStateStore, StateStore};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A stored server-side record.
#[derive(Clone)]
struct ServerRecord {
    remote_id: String,
    updated_at: DateTime<Utc>,
    payload: Value,
}

impl ServerRecord {
    fn to_json(&self) -> Value {
        let mut body = self.payload.clone();
        if let Value::Object(map) = &mut body {
            map.insert("id".into(), json!(self.remote_id));
            map.insert("updated_at".into(), json!(self.updated_at.to_rfc3339()));
        }
        body
    }
}

#[derive(Default)]
struct ServerState {
    next_id: u64,
    records: HashMap<EntityType, Vec<ServerRecord>>,
}

/// An in-memory stand-in for the remote REST service.
///
/// Speaks the same wire contract as the real server: POST to the
/// collection URL creates, PUT/DELETE target `<collection>/<id>/`, GET
/// lists with an optional `updated_at__gte` filter and a paginated
/// `results` envelope. Payloads carrying `"reject": true` are refused
/// with 422.
#[derive(Default)]
struct InMemoryServer {
    state: Mutex<ServerState>,
}

impl InMemoryServer {
    fn new() -> Self {
        Self::default()
    }

    /// Seeds a record as if another client had written it.
    fn seed(&self, entity: EntityType, remote_id: &str, updated_at: DateTime<Utc>, payload: Value) {
        self.state
            .lock()
            .records
            .entry(entity)
            .or_default()
            .push(ServerRecord {
                remote_id: remote_id.to_string(),
                updated_at,
                payload,
            });
    }

    fn count(&self, entity: EntityType) -> usize {
        self.state
            .lock()
            .records
            .get(&entity)
            .map_or(0, Vec::len)
    }

    fn entity_for(path: &str) -> Option<(EntityType, &str)> {
        EntityType::ALL.iter().find_map(|entity| {
            path.strip_prefix(entity.remote_path())
                .map(|rest| (*entity, rest))
        })
    }

    fn json_response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn handle(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<&str>,
        body: Option<&[u8]>,
    ) -> HttpResponse {
        let Some((entity, rest)) = Self::entity_for(path) else {
            return Self::json_response(404, json!({"detail": "unknown collection"}));
        };

        let mut state = self.state.lock();
        match (method, rest) {
            (HttpMethod::Post, "") => {
                let payload: Value = match body.and_then(|b| serde_json::from_slice(b).ok()) {
                    Some(payload) => payload,
                    None => return Self::json_response(400, json!({"detail": "bad json"})),
                };
                if payload.get("reject") == Some(&json!(true)) {
                    return Self::json_response(422, json!({"detail": "validation failed"}));
                }

                state.next_id += 1;
                let record = ServerRecord {
                    remote_id: format!("rec-{}", state.next_id),
                    updated_at: Utc::now(),
                    payload,
                };
                let body = record.to_json();
                state.records.entry(entity).or_default().push(record);
                Self::json_response(201, body)
            }
            (HttpMethod::Get, "") => {
                let since = query
                    .and_then(|q| q.strip_prefix("updated_at__gte="))
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|t| t.with_timezone(&Utc));

                let results: Vec<Value> = state
                    .records
                    .get(&entity)
                    .into_iter()
                    .flatten()
                    .filter(|r| since.is_none_or(|since| r.updated_at >= since))
                    .map(ServerRecord::to_json)
                    .collect();
                Self::json_response(200, json!({"count": results.len(), "results": results}))
            }
            (HttpMethod::Put, id_slash) | (HttpMethod::Delete, id_slash) => {
                let id = id_slash.trim_end_matches('/');
                let records = state.records.entry(entity).or_default();
                let Some(pos) = records.iter().position(|r| r.remote_id == id) else {
                    return Self::json_response(404, json!({"detail": "not found"}));
                };

                if method == HttpMethod::Delete {
                    records.remove(pos);
                    return Self::json_response(204, json!({}));
                }

                let payload: Value = match body.and_then(|b| serde_json::from_slice(b).ok()) {
                    Some(payload) => payload,
                    None => return Self::json_response(400, json!({"detail": "bad json"})),
                };
                records[pos].payload = payload;
                records[pos].updated_at = Utc::now();
                Self::json_response(200, records[pos].to_json())
            }
            _ => Self::json_response(405, json!({"detail": "method not allowed"})),
        }
    }
}

/// Client-side handle onto the in-memory server.
struct ServerClient(Arc<InMemoryServer>);

impl HttpClient for ServerClient {
    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&[u8]>,
        _timeout: std::time::Duration,
    ) -> Result<HttpResponse, String> {
        let path = url
            .strip_prefix("http://server")
            .ok_or_else(|| format!("unexpected url: {url}"))?;
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        Ok(self.0.handle(method, path, query, body))
    }
}

/// Opt-in log output for debugging: `RUST_LOG=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    server: Arc<InMemoryServer>,
    records: Arc<MemoryRecordStore>,
    connectivity: Arc<ManualConnectivity>,
    dir: tempfile::TempDir,
    engine: Arc<SyncEngine<RestClient<ServerClient>, MemoryRecordStore>>,
}

impl Harness {
    fn new(online: bool) -> Self {
        init_tracing();
        let server = Arc::new(InMemoryServer::new());
        let records = Arc::new(MemoryRecordStore::new());
        let connectivity = Arc::new(ManualConnectivity::new(online));
        let dir = tempfile::tempdir().unwrap();

        let engine = Self::open_engine(&server, &records, &connectivity, dir.path());
        Self {
            server,
            records,
            connectivity,
            dir,
            engine,
        }
    }

    fn open_engine(
        server: &Arc<InMemoryServer>,
        records: &Arc<MemoryRecordStore>,
        connectivity: &Arc<ManualConnectivity>,
        dir: &std::path::Path,
    ) -> Arc<SyncEngine<RestClient<ServerClient>, MemoryRecordStore>> {
        let config = SyncConfig::new();
        let rest = RestClient::new(
            "http://server",
            ServerClient(Arc::clone(server)),
            config.request_timeout,
        );
        let store = Arc::new(FileStateStore::open(dir).unwrap());

        Arc::new(
            SyncEngine::new(
                config,
                Arc::new(rest),
                Arc::clone(records),
                Arc::clone(connectivity) as Arc<dyn ConnectivityMonitor>,
                store as Arc<dyn StateStore>,
            )
            .unwrap(),
        )
    }

    /// Simulates an application restart against the same state files.
    fn reopen(&mut self) {
        self.engine = Self::open_engine(
            &self.server,
            &self.records,
            &self.connectivity,
            self.dir.path(),
        );
    }
}

#[test]
fn full_round_trip_over_rest() {
    let h = Harness::new(true);

    // Another client's record is already on the server.
    h.server.seed(
        EntityType::Inventory,
        "rec-existing",
        Utc::now(),
        json!({"drug": "amoxicillin", "qty": 40}),
    );

    h.engine.enqueue(
        EntityType::Patients,
        MutationAction::Create,
        json!({"name": "Asha"}),
        "1",
        None,
    );

    let report = h.engine.sync_cycle().unwrap();
    assert_eq!(report.pushed, 1);
    // The pushed patient echoes back through the pull along with the
    // seeded inventory record.
    assert_eq!(report.pulled, 2);
    assert!(report.pull_errors.is_empty());

    assert_eq!(h.server.count(EntityType::Patients), 1);
    let patient = h
        .records
        .get_by_remote_id(EntityType::Patients, "rec-1")
        .unwrap()
        .unwrap();
    assert_eq!(patient.payload["name"], "Asha");

    // The seeded inventory record was pulled in.
    let pulled = h
        .records
        .get_by_remote_id(EntityType::Inventory, "rec-existing")
        .unwrap()
        .unwrap();
    assert_eq!(pulled.payload["qty"], 40);
}

#[test]
fn create_then_update_delivers_in_order() {
    let h = Harness::new(true);
    h.records.insert_local(
        EntityType::Prescriptions,
        medisync_model::LocalRecord {
            local_id: "9".into(),
            remote_id: None,
            updated_at: Utc::now(),
            payload: json!({"dosage": "250mg"}),
        },
    );

    h.engine.enqueue(
        EntityType::Prescriptions,
        MutationAction::Create,
        json!({"dosage": "250mg"}),
        "9",
        None,
    );
    h.engine.enqueue(
        EntityType::Prescriptions,
        MutationAction::Update,
        json!({"dosage": "500mg"}),
        "9",
        None,
    );

    let report = h.engine.sync_cycle().unwrap();
    assert_eq!(report.pushed, 2);

    let state = h.server.state.lock();
    let records = &state.records[&EntityType::Prescriptions];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload["dosage"], "500mg");
}

#[test]
fn queue_and_watermark_survive_restart() {
    let mut h = Harness::new(false);

    h.engine.enqueue(
        EntityType::Sales,
        MutationAction::Create,
        json!({"total": 120}),
        "1",
        None,
    );
    assert_eq!(h.engine.status().pending_count, 1);

    // Restart while offline: the mutation is still queued.
    h.reopen();
    assert_eq!(h.engine.status().pending_count, 1);

    h.connectivity.set_online(true);
    h.engine.sync_cycle().unwrap();
    assert_eq!(h.engine.status().pending_count, 0);
    assert_eq!(h.server.count(EntityType::Sales), 1);
    let watermark = h.engine.status().last_sync_at.unwrap();

    // Restart again: watermark persisted, queue entry still retained
    // (synced, inside the retention window).
    h.reopen();
    assert_eq!(h.engine.status().last_sync_at, Some(watermark));
    assert_eq!(h.engine.status().pending_count, 0);
}

#[test]
fn incremental_pull_skips_records_before_watermark() {
    let h = Harness::new(true);

    h.server.seed(
        EntityType::Suppliers,
        "rec-old",
        Utc::now(),
        json!({"name": "Acme Pharma"}),
    );
    h.engine.sync_cycle().unwrap();
    assert!(h
        .records
        .get_by_remote_id(EntityType::Suppliers, "rec-old")
        .unwrap()
        .is_some());

    // A record last modified well before the watermark is filtered out
    // by the server; a fresh one comes through.
    h.server.seed(
        EntityType::Suppliers,
        "rec-stale",
        Utc::now() - chrono::Duration::hours(1),
        json!({"name": "Stale"}),
    );
    h.server.seed(
        EntityType::Suppliers,
        "rec-new",
        Utc::now() + chrono::Duration::seconds(1),
        json!({"name": "Fresh"}),
    );

    h.engine.sync_cycle().unwrap();
    assert!(h
        .records
        .get_by_remote_id(EntityType::Suppliers, "rec-stale")
        .unwrap()
        .is_none());
    assert!(h
        .records
        .get_by_remote_id(EntityType::Suppliers, "rec-new")
        .unwrap()
        .is_some());
}

#[test]
fn server_rejection_dead_letters_the_mutation() {
    let h = Harness::new(true);

    h.engine.enqueue(
        EntityType::Patients,
        MutationAction::Create,
        json!({"reject": true}),
        "1",
        None,
    );

    let report = h.engine.sync_cycle().unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.push_failures, 1);
    assert_eq!(h.server.count(EntityType::Patients), 0);

    let status = h.engine.status();
    assert_eq!(status.pending_count, 1);
    assert!(status.recent_errors[0].error.contains("validation failed"));
    assert_eq!(h.engine.stats().dead_lettered, 1);
}

#[tokio::test]
async fn scheduler_flushes_offline_work_on_reconnect() {
    let h = Harness::new(false);
    let scheduler = SyncScheduler::spawn(Arc::clone(&h.engine));

    h.engine.enqueue(
        EntityType::Appointments,
        MutationAction::Create,
        json!({"patient": "Asha", "ward": "ENT"}),
        "1",
        None,
    );
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(h.server.count(EntityType::Appointments), 0);

    h.connectivity.set_online(true);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert_eq!(h.server.count(EntityType::Appointments), 1);
    assert_eq!(h.engine.status().pending_count, 0);
    scheduler.shutdown().await;
}

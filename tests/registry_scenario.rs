//! End-to-end scenarios over the in-memory store
//!
//! Drives the session manager and admin dispatcher the way the transport
//! does, then checks the replies an operator would see.

use serde_json::{json, Value};
use std::sync::Arc;

use disciple_server::admin::{AdminDispatcher, AdminResponse, RecordingChannel};
use disciple_server::db::{Disciple, DiscipleModel, DiscipleStatus, DocumentStore, MemoryStore};
use disciple_server::query::Query;
use disciple_server::registry::{DiscipleRegistry, ModelRegistry};
use disciple_server::session::{SessionManager, DISCIPLE_CONNECTED, DISCONNECT};

struct Harness {
    disciples: Arc<MemoryStore<Disciple>>,
    models: Arc<MemoryStore<DiscipleModel>>,
    sessions: SessionManager,
    dispatcher: AdminDispatcher,
    admin: RecordingChannel,
}

impl Harness {
    fn new() -> Self {
        let disciples = Arc::new(MemoryStore::<Disciple>::new());
        let models = Arc::new(MemoryStore::<DiscipleModel>::new());
        let disciple_registry = DiscipleRegistry::new(disciples.clone());
        let model_registry = ModelRegistry::new(models.clone());

        Self {
            sessions: SessionManager::new(disciple_registry.clone()),
            dispatcher: AdminDispatcher::new(disciple_registry, model_registry),
            disciples,
            models,
            admin: RecordingChannel::new("admin-1"),
        }
    }

    async fn report(&self, session: &str, id: &str) {
        self.sessions
            .on_event(
                session,
                DISCIPLE_CONNECTED,
                &json!({"id": id, "hostname": format!("{}.lan", id), "ram": 32, "cpus": [], "os": ["linux"]}),
            )
            .await;
    }

    async fn admin(&self, event: &str, data: Value) -> Vec<AdminResponse> {
        self.dispatcher.dispatch(&self.admin, event, &data).await;
        self.admin.take().await
    }
}

#[tokio::test]
async fn test_disciple_lifecycle_scenario() {
    let h = Harness::new();

    h.report("s1", "d1").await;
    let all = h.disciples.find(&Query::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, DiscipleStatus::Connected);

    h.sessions.on_event("s1", DISCONNECT, &Value::Null).await;
    let all = h.disciples.find(&Query::all()).await.unwrap();
    assert_eq!(all[0].status, DiscipleStatus::Disconnected);
    assert_eq!(all[0].client_id.as_deref(), Some("s1"));

    let replies = h.admin("disciples:flush", json!("")).await;
    assert_eq!(replies, vec![AdminResponse::Text("Dropped 1 Disciples!".into())]);
    assert!(h.disciples.is_empty().await);
}

#[tokio::test]
async fn test_startup_sweep_keeps_every_record() {
    let h = Harness::new();
    for (session, id) in [("s1", "d1"), ("s2", "d2"), ("s3", "d3")] {
        h.report(session, id).await;
    }
    h.sessions.disconnected("s2").await;

    let swept = h.sessions.registry().startup_reset().await;

    assert_eq!(swept, 3);
    let all = h.disciples.find(&Query::all()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|d| d.status == DiscipleStatus::Disconnected));
}

#[tokio::test]
async fn test_empty_where_flushes_every_disciple() {
    let h = Harness::new();
    h.report("s1", "d1").await;
    h.report("s2", "d2").await;
    h.sessions.disconnected("s2").await;

    let replies = h.admin("disciples", json!("{where: {}}")).await;
    assert_eq!(replies[0].payload().as_array().map(Vec::len), Some(2));

    let replies = h.admin("disciples:flush", json!("{where: {}}")).await;
    assert_eq!(replies, vec![AdminResponse::Text("Dropped 2 Disciples!".into())]);
    assert!(h.disciples.is_empty().await);
}

#[tokio::test]
async fn test_list_substitutes_default_query() {
    let h = Harness::new();
    h.report("s1", "d1").await;
    h.report("s2", "d2").await;
    h.sessions.disconnected("s1").await;

    let replies = h.admin("disciples", Value::Null).await;
    let listed = replies[0].payload();
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["discipleId"], "d2");

    let replies = h.admin("disciples", json!("status: disconnected")).await;
    assert_eq!(replies[0].payload()[0]["discipleId"], "d1");

    let replies = h.admin("disciples", json!("{ram: {'>=': 32}, sort: 'discipleId DESC'}")).await;
    let ids: Vec<_> = replies[0]
        .payload()
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["discipleId"].clone())
        .collect();
    assert_eq!(ids, vec![json!("d2"), json!("d1")]);
}

#[tokio::test]
async fn test_command_errors_are_isolated() {
    let h = Harness::new();
    h.report("s1", "d1").await;

    h.dispatcher.dispatch(&h.admin, "models", &json!("{name: {matches: 'x'}}")).await;
    h.dispatcher.dispatch(&h.admin, "disciples", &json!("")).await;

    let replies = h.admin.take().await;
    assert_eq!(replies.len(), 2);
    assert!(replies[0].is_error());
    assert_eq!(replies[1].event(), "response:json");
    assert_eq!(replies[1].payload()[0]["discipleId"], "d1");
}

#[tokio::test]
async fn test_model_upsert_and_drop() {
    let h = Harness::new();

    let replies = h.admin("model", json!("name: iris, description: flowers, type: classifier")).await;
    assert_eq!(replies, vec![AdminResponse::success()]);

    let id = h.models.find(&Query::all()).await.unwrap()[0].id.clone().unwrap();

    let replies = h.admin("model", json!({"id": id, "type": "svm"})).await;
    assert_eq!(replies, vec![AdminResponse::success()]);

    let replies = h.admin("models", Value::Null).await;
    let listed = replies[0].payload();
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["name"], "iris");
    assert_eq!(listed[0]["description"], "flowers");
    assert_eq!(listed[0]["type"], "regressor");

    let replies = h.admin("model:drop", Value::Null).await;
    assert!(replies[0].is_error());

    let replies = h.admin("model:drop", json!("name: iris")).await;
    assert_eq!(replies, vec![AdminResponse::Text("Dropped 1 Models!".into())]);
    assert!(h.models.is_empty().await);
}

#[tokio::test]
async fn test_racing_reports_never_duplicate() {
    let h = Arc::new(Harness::new());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.report(&format!("s{}", i), "d1").await })
        })
        .collect();
    for task in tasks {
        tokio_test::assert_ok!(task.await);
    }

    assert_eq!(h.disciples.len().await, 1);
}

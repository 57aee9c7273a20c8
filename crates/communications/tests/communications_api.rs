//! Communication service against a stubbed provider backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use milvault_communications::{
    AnnouncementChanges, CommunicationError, CommunicationService, NewAnnouncement, Priority,
};
use milvault_core::{Config, Rank, Role, User};
use milvault_provider::{DirectExecutor, Provider};
use milvault_session::{InMemoryAuthBackend, MemoryNotifier, SessionManager, Severity};
use milvault_store::SessionStore;

const EMAIL: &str = "j.doe@mil.example";
const ADMIN_EMAIL: &str = "c.major@mil.example";
const PASSWORD: &str = "correct-horse";

const SOLDIER_ID: &str = "0192c7a1-2f43-7cc1-9f6e-0242ac120002";
const ADMIN_ID: &str = "0192c7a1-2f43-7cc1-9f6e-0242ac120003";
const ANN_READ: &str = "0192c7a1-2f43-7cc1-9f6e-0242ac120111";
const ANN_UNREAD: &str = "0192c7a1-2f43-7cc1-9f6e-0242ac120122";
const ANN_MISSING: &str = "0192c7a1-2f43-7cc1-9f6e-0242ac120133";

#[derive(Default)]
struct StubState {
    list_params: Mutex<Vec<HashMap<String, String>>>,
    announcement_inserts: Mutex<Vec<Value>>,
    announcement_updates: Mutex<Vec<(HashMap<String, String>, Value)>>,
    announcement_deletes: Mutex<Vec<HashMap<String, String>>>,
    recipient_inserts: Mutex<Vec<Value>>,
    recipient_updates: Mutex<Vec<(HashMap<String, String>, Value)>>,
    stats_params: Mutex<Vec<HashMap<String, String>>>,
}

struct TestServer {
    base_url: String,
    state: Arc<StubState>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let state = Arc::new(StubState::default());
        let app = stub_backend(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn stub_backend(state: Arc<StubState>) -> Router {
    Router::new()
        .route(
            "/rest/v1/communications",
            get(list_announcements)
                .post(insert_announcement)
                .patch(update_announcement)
                .delete(delete_announcement),
        )
        .route(
            "/rest/v1/communication_recipients",
            get(recipient_rows)
                .post(insert_recipients)
                .patch(update_recipient),
        )
        .with_state(state)
}

fn announcement_json(id: &str, priority: &str, created_at: &str, read_at: Value) -> Value {
    json!({
        "id": id,
        "title": "Range closure",
        "content": "Ranges are closed on Friday for maintenance.",
        "priority": priority,
        "category": "operations",
        "is_published": true,
        "published_at": created_at,
        "expires_at": null,
        "created_by": ADMIN_ID,
        "created_at": created_at,
        "updated_at": created_at,
        "communication_recipients": [
            { "user_id": SOLDIER_ID, "read_at": read_at, "acknowledged_at": null,
              "created_at": created_at }
        ]
    })
}

async fn list_announcements(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.list_params.lock().unwrap().push(params);
    Json(json!([
        announcement_json(ANN_UNREAD, "urgent", "2025-06-01T11:00:00Z", json!(null)),
        announcement_json(
            ANN_READ,
            "normal",
            "2025-06-01T10:00:00Z",
            json!("2025-06-02T08:00:00Z")
        ),
    ]))
}

async fn insert_announcement(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.announcement_inserts.lock().unwrap().push(body.clone());

    let mut row = body;
    row["id"] = json!("0192c7a1-2f43-7cc1-9f6e-0242ac120144");
    row["created_at"] = json!("2025-06-03T09:00:00Z");
    row["updated_at"] = json!("2025-06-03T09:00:00Z");
    Json(json!([row]))
}

async fn update_announcement(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let missing = params.get("id").map(String::as_str) == Some(&format!("eq.{ANN_MISSING}")[..]);
    state
        .announcement_updates
        .lock()
        .unwrap()
        .push((params, body.clone()));
    if missing {
        return Json(json!([]));
    }

    let mut row = announcement_json(ANN_READ, "normal", "2025-06-01T10:00:00Z", json!(null));
    row.as_object_mut().unwrap().remove("communication_recipients");
    for (key, value) in body.as_object().cloned().unwrap_or_default() {
        row[key.as_str()] = value;
    }
    Json(json!([row]))
}

async fn delete_announcement(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    state.announcement_deletes.lock().unwrap().push(params);
    StatusCode::NO_CONTENT
}

async fn recipient_rows(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.stats_params.lock().unwrap().push(params);
    Json(json!([
        { "read_at": "2025-06-02T08:00:00Z", "acknowledged_at": "2025-06-02T08:05:00Z" },
        { "read_at": "2025-06-02T09:00:00Z", "acknowledged_at": null },
        { "read_at": null, "acknowledged_at": null }
    ]))
}

async fn insert_recipients(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.recipient_inserts.lock().unwrap().push(body.clone());
    Json(json!([{ "read_at": null, "acknowledged_at": null }]))
}

async fn update_recipient(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let missing = params.get("communication_id").map(String::as_str)
        == Some(&format!("eq.{ANN_MISSING}")[..]);
    state
        .recipient_updates
        .lock()
        .unwrap()
        .push((params, body.clone()));
    if missing {
        return Json(json!([]));
    }
    Json(json!([body]))
}

// ─────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────

struct Harness {
    srv: TestServer,
    service: CommunicationService,
    session: Arc<SessionManager>,
    notifier: Arc<MemoryNotifier>,
}

fn soldier() -> User {
    User {
        id: SOLDIER_ID.parse().unwrap(),
        email: EMAIL.into(),
        first_name: "Jordan".into(),
        last_name: "Doe".into(),
        role: Role::Soldier,
        rank: Some(Rank::Sergeant),
        military_id: Some("MIL-4821".into()),
        unit: Some("3rd Battalion".into()),
        phone: None,
        verified: true,
        created_at: None,
    }
}

fn admin() -> User {
    User {
        id: ADMIN_ID.parse().unwrap(),
        email: ADMIN_EMAIL.into(),
        first_name: "Casey".into(),
        last_name: "Major".into(),
        role: Role::Admin,
        rank: None,
        military_id: None,
        unit: None,
        phone: None,
        verified: true,
        created_at: None,
    }
}

async fn harness() -> Harness {
    let srv = TestServer::spawn().await;

    let mut config = Config::default();
    config.provider_url = srv.base_url.clone();
    config.provider_key = "test-key".into();

    let backend = Arc::new(
        InMemoryAuthBackend::new()
            .with_account(EMAIL, PASSWORD, soldier())
            .with_account(ADMIN_EMAIL, PASSWORD, admin()),
    );
    let session = Arc::new(SessionManager::new(
        backend,
        SessionStore::in_memory(),
        config.clone(),
    ));

    let provider = Provider::new(&config);
    let notifier = Arc::new(MemoryNotifier::new());
    let service = CommunicationService::new(
        session.clone(),
        provider.tables(Arc::new(DirectExecutor)),
        notifier.clone(),
    );

    Harness {
        srv,
        service,
        session,
        notifier,
    }
}

async fn soldier_harness() -> Harness {
    let h = harness().await;
    h.session.login(EMAIL, PASSWORD, false).await.unwrap();
    h
}

async fn admin_harness() -> Harness {
    let h = harness().await;
    h.session.login(ADMIN_EMAIL, PASSWORD, false).await.unwrap();
    h
}

// ─────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_lists_resolve_empty_without_network() {
    let h = harness().await;

    let items = h.service.list().await.unwrap();

    assert!(items.is_empty());
    assert!(h.srv.state.list_params.lock().unwrap().is_empty());
}

#[tokio::test]
async fn listing_joins_recipient_state_newest_first() {
    let h = soldier_harness().await;

    let items = h.service.list().await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].announcement.priority, Priority::Urgent);
    assert!(!items[0].is_read());
    assert!(items[1].is_read());
    assert!(!items[1].is_acknowledged());

    let recorded = h.srv.state.list_params.lock().unwrap();
    let params = &recorded[0];
    assert_eq!(
        params.get("communication_recipients.user_id"),
        Some(&format!("eq.{SOLDIER_ID}"))
    );
    assert_eq!(
        params.get("order").map(String::as_str),
        Some("created_at.desc")
    );
    let select = params.get("select").expect("no select param");
    assert!(select.contains("communication_recipients!inner"));

    // The listing also feeds the synchronous accessors.
    assert_eq!(h.service.cached(), items);
    assert_eq!(h.service.unread_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────
// Read receipts
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn marking_read_stamps_the_recipient_row_and_the_cache() {
    let h = soldier_harness().await;
    h.service.list().await.unwrap();

    h.service.mark_read(ANN_UNREAD.parse().unwrap()).await.unwrap();

    let recorded = h.srv.state.recipient_updates.lock().unwrap();
    let (params, body) = &recorded[0];
    assert_eq!(
        params.get("communication_id"),
        Some(&format!("eq.{ANN_UNREAD}"))
    );
    assert_eq!(params.get("user_id"), Some(&format!("eq.{SOLDIER_ID}")));
    assert!(body["read_at"].is_string());
    assert!(body.get("acknowledged_at").is_none());

    assert_eq!(h.service.unread_count(), 0);
}

#[tokio::test]
async fn acknowledging_an_unread_announcement_also_marks_it_read() {
    let h = soldier_harness().await;
    h.service.list().await.unwrap();

    h.service
        .acknowledge(ANN_UNREAD.parse().unwrap())
        .await
        .unwrap();

    let recorded = h.srv.state.recipient_updates.lock().unwrap();
    let (_, body) = &recorded[0];
    assert!(body["acknowledged_at"].is_string());
    assert!(body["read_at"].is_string());

    let cached = h.service.cached();
    let item = cached
        .iter()
        .find(|i| i.announcement.id == ANN_UNREAD.parse().unwrap())
        .unwrap();
    assert!(item.is_read());
    assert!(item.is_acknowledged());
}

#[tokio::test]
async fn acknowledging_a_read_announcement_keeps_the_read_time() {
    let h = soldier_harness().await;
    h.service.list().await.unwrap();

    h.service
        .acknowledge(ANN_READ.parse().unwrap())
        .await
        .unwrap();

    let recorded = h.srv.state.recipient_updates.lock().unwrap();
    let (_, body) = &recorded[0];
    assert!(body["acknowledged_at"].is_string());
    assert!(body.get("read_at").is_none());

    let cached = h.service.cached();
    let item = cached
        .iter()
        .find(|i| i.announcement.id == ANN_READ.parse().unwrap())
        .unwrap();
    assert_eq!(item.read_at, Some("2025-06-02T08:00:00Z".parse().unwrap()));
}

#[tokio::test]
async fn receipts_for_unaddressed_announcements_are_not_found() {
    let h = soldier_harness().await;

    let result = h.service.mark_read(ANN_MISSING.parse().unwrap()).await;

    assert_eq!(result, Err(CommunicationError::NotFound));
}

// ─────────────────────────────────────────────────────────────────────────
// Authoring
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn authoring_is_gated_to_administrators() {
    let h = harness().await;
    let new = NewAnnouncement::new("Range closure", "Ranges closed Friday.");

    let anonymous = h.service.create(new.clone()).await;
    assert_eq!(anonymous, Err(CommunicationError::NotAuthenticated));

    h.session.login(EMAIL, PASSWORD, false).await.unwrap();
    let as_soldier = h.service.create(new.clone()).await;
    assert_eq!(as_soldier, Err(CommunicationError::Forbidden));

    let edit = h
        .service
        .update(ANN_READ.parse().unwrap(), AnnouncementChanges::default())
        .await;
    assert_eq!(edit, Err(CommunicationError::Forbidden));

    let removal = h.service.remove(ANN_READ.parse().unwrap()).await;
    assert_eq!(removal, Err(CommunicationError::Forbidden));

    assert!(h.srv.state.announcement_inserts.lock().unwrap().is_empty());
    assert!(h.srv.state.announcement_updates.lock().unwrap().is_empty());
    assert!(h.srv.state.announcement_deletes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn creating_stamps_the_author_and_publication_time() {
    let h = admin_harness().await;

    let mut new = NewAnnouncement::new("Range closure", "Ranges closed Friday.");
    new.priority = Priority::High;
    new.category = Some("operations".into());

    let created = h.service.create(new).await.unwrap();

    let inserts = h.srv.state.announcement_inserts.lock().unwrap();
    let body = &inserts[0];
    assert_eq!(body["created_by"], ADMIN_ID);
    assert_eq!(body["priority"], "high");
    assert_eq!(body["is_published"], true);
    assert!(body["published_at"].is_string());

    assert_eq!(created.title, "Range closure");
    assert_eq!(created.author_id, ADMIN_ID.parse().unwrap());
    assert_eq!(
        h.notifier.last(),
        Some((Severity::Success, "Announcement created".to_string()))
    );
}

#[tokio::test]
async fn drafts_carry_no_publication_time() {
    let h = admin_harness().await;

    let mut new = NewAnnouncement::new("Draft order", "Hold for review.");
    new.publish = false;

    h.service.create(new).await.unwrap();

    let inserts = h.srv.state.announcement_inserts.lock().unwrap();
    assert_eq!(inserts[0]["is_published"], false);
    assert!(inserts[0]["published_at"].is_null());
}

#[tokio::test]
async fn blank_titles_are_rejected_before_the_network() {
    let h = admin_harness().await;

    let result = h
        .service
        .create(NewAnnouncement::new("   ", "body"))
        .await;

    assert_eq!(result, Err(CommunicationError::EmptyTitle));
    assert!(h.srv.state.announcement_inserts.lock().unwrap().is_empty());
    assert!(h.notifier.entries().is_empty());
}

#[tokio::test]
async fn publish_edits_stamp_a_fresh_publication_time() {
    let h = admin_harness().await;

    let changes = AnnouncementChanges {
        published: Some(true),
        ..AnnouncementChanges::default()
    };
    let updated = h
        .service
        .update(ANN_READ.parse().unwrap(), changes)
        .await
        .unwrap();

    let recorded = h.srv.state.announcement_updates.lock().unwrap();
    let (params, body) = &recorded[0];
    assert_eq!(params.get("id"), Some(&format!("eq.{ANN_READ}")));
    assert_eq!(body["is_published"], true);
    assert!(body["published_at"].is_string());

    assert!(updated.published);
    assert_eq!(
        h.notifier.last(),
        Some((Severity::Success, "Announcement updated".to_string()))
    );
}

#[tokio::test]
async fn updating_a_missing_announcement_is_not_found() {
    let h = admin_harness().await;

    let result = h
        .service
        .update(ANN_MISSING.parse().unwrap(), AnnouncementChanges::default())
        .await;

    assert_eq!(result, Err(CommunicationError::NotFound));
    assert_eq!(
        h.notifier.last(),
        Some((Severity::Error, "Announcement update failed".to_string()))
    );
}

#[tokio::test]
async fn removing_drops_the_row_and_the_cached_copy() {
    let h = admin_harness().await;
    h.service.list().await.unwrap();

    h.service.remove(ANN_READ.parse().unwrap()).await.unwrap();

    let deletes = h.srv.state.announcement_deletes.lock().unwrap();
    assert_eq!(deletes[0].get("id"), Some(&format!("eq.{ANN_READ}")));

    let cached = h.service.cached();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].announcement.id, ANN_UNREAD.parse().unwrap());
    assert_eq!(
        h.notifier.last(),
        Some((Severity::Success, "Announcement deleted".to_string()))
    );
}

#[tokio::test]
async fn recipients_are_assigned_in_bulk() {
    let h = admin_harness().await;
    let announcement_id = ANN_READ.parse().unwrap();

    h.service
        .assign_recipients(announcement_id, &[])
        .await
        .unwrap();
    assert!(h.srv.state.recipient_inserts.lock().unwrap().is_empty());

    let users = [SOLDIER_ID.parse().unwrap(), ADMIN_ID.parse().unwrap()];
    h.service
        .assign_recipients(announcement_id, &users)
        .await
        .unwrap();

    let inserts = h.srv.state.recipient_inserts.lock().unwrap();
    let rows = inserts[0].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["communication_id"], ANN_READ);
    assert_eq!(rows[0]["user_id"], SOLDIER_ID);
    assert_eq!(rows[1]["user_id"], ADMIN_ID);
}

#[tokio::test]
async fn stats_count_recipients_reads_and_acknowledgements() {
    let h = admin_harness().await;

    let stats = h.service.stats(ANN_READ.parse().unwrap()).await.unwrap();

    assert_eq!(stats.recipients, 3);
    assert_eq!(stats.read, 2);
    assert_eq!(stats.acknowledged, 1);

    let recorded = h.srv.state.stats_params.lock().unwrap();
    let params = &recorded[0];
    assert_eq!(
        params.get("communication_id"),
        Some(&format!("eq.{ANN_READ}"))
    );
    assert_eq!(
        params.get("select").map(String::as_str),
        Some("read_at,acknowledged_at")
    );
}

/// ActionDispatcher: the table from action id to handler, plus the guarded
/// lifecycle every action runs through.
///
/// Lifecycle: `dispatch` (busy lock + interim record, synchronous) →
/// `PendingAction::execute` (the network calls, in strict sequence) →
/// `PanelState::complete` (console, list view, lock released). The terminal UI
/// spawns `execute` so input stays live; `run_action` chains all three.
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ActionRequest, ConnectionSettings, RequestPipeline, ResponsePayload, Transport};
use crate::error::ActionError;
use crate::panel::PanelState;
use crate::stack::{PortEncoding, StackSummary, build_create_request, decode_stack_list};

// ── Action ids ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    Health,
    ListStacks,
    Stats,
    GetStack,
    GetStatus,
    DeleteStack,
    RefreshList,
    DeleteItem,
    CreateStack,
    ClearConsole,
}

impl ActionId {
    #[cfg(test)]
    pub const ALL: [ActionId; 10] = [
        ActionId::Health,
        ActionId::ListStacks,
        ActionId::Stats,
        ActionId::GetStack,
        ActionId::GetStatus,
        ActionId::DeleteStack,
        ActionId::RefreshList,
        ActionId::DeleteItem,
        ActionId::CreateStack,
        ActionId::ClearConsole,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionId::Health => "health",
            ActionId::ListStacks => "listStacks",
            ActionId::Stats => "stats",
            ActionId::GetStack => "getStack",
            ActionId::GetStatus => "getStatus",
            ActionId::DeleteStack => "deleteStack",
            ActionId::RefreshList => "refreshList",
            ActionId::DeleteItem => "deleteItem",
            ActionId::CreateStack => "create",
            ActionId::ClearConsole => "clearResponse",
        }
    }

    /// Console title for the action's records.
    pub fn title(self) -> &'static str {
        match self {
            ActionId::Health => "GET /healthz",
            ActionId::ListStacks => "GET /stacks",
            ActionId::Stats => "GET /stats",
            ActionId::GetStack => "GET /stacks/{stack_id}",
            ActionId::GetStatus => "GET /stacks/{stack_id}/status",
            ActionId::DeleteStack => "DELETE /stacks/{stack_id}",
            ActionId::RefreshList => "GET /stacks (refresh)",
            ActionId::DeleteItem => "DELETE /stacks/{stack_id} + GET /stacks",
            ActionId::CreateStack => "POST /stacks",
            ActionId::ClearConsole => "clear console",
        }
    }
}

/// What a control hands the dispatcher: the action plus, for per-item
/// controls, the id it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTrigger {
    pub id: ActionId,
    pub target: Option<String>,
}

impl ActionTrigger {
    pub fn new(id: ActionId) -> Self {
        Self { id, target: None }
    }

    pub fn targeted(id: ActionId, target: &str) -> Self {
        Self { id, target: Some(target.to_string()) }
    }
}

impl From<ActionId> for ActionTrigger {
    fn from(id: ActionId) -> Self {
        Self::new(id)
    }
}

// ── Handler inputs and outputs ────────────────────────────────────────────────

/// Inputs snapshotted when the action starts.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub settings: ConnectionSettings,
    pub stack_id: String,
    pub target: Option<String>,
    pub target_port: String,
    pub pod_spec: String,
    pub encoding: PortEncoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    /// Console body on success
    pub record: Value,
    pub created_stack_id: Option<String>,
}

impl ActionOutput {
    fn from_payload(payload: &ResponsePayload) -> Self {
        Self { record: payload_record(payload), created_stack_id: None }
    }
}

pub type Listing = Result<Vec<StackSummary>, String>;

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub result: Result<ActionOutput, ActionError>,
    /// Set when a list fetch completed; the view is rebuilt from it.
    pub listing: Option<Listing>,
}

impl ActionOutcome {
    pub fn failed(err: ActionError) -> Self {
        Self { result: Err(err), listing: None }
    }

    fn single(result: Result<ResponsePayload, ActionError>) -> Self {
        Self { result: result.map(|p| ActionOutput::from_payload(&p)), listing: None }
    }

    fn listed(result: Result<ResponsePayload, ActionError>) -> Self {
        let listing = result.as_ref().ok().map(listing_from);
        Self { result: result.map(|p| ActionOutput::from_payload(&p)), listing }
    }
}

#[derive(Debug, Clone)]
pub struct ActionCompletion {
    pub id: ActionId,
    pub title: String,
    pub outcome: ActionOutcome,
}

fn payload_record(payload: &ResponsePayload) -> Value {
    serde_json::to_value(payload).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
}

fn listing_from(payload: &ResponsePayload) -> Listing {
    match payload.body.as_json() {
        Some(body) => decode_stack_list(body),
        None => Err("stack list response was not JSON".to_string()),
    }
}

fn require_stack_id(raw: &str) -> Result<String, ActionError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ActionError::validation("stack_id is required"));
    }
    // Goes into the path as one segment.
    let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~');
    if !id.chars().all(unreserved) || id == "." || id == ".." {
        return Err(ActionError::validation(format!(
            "invalid stack_id {id:?}: use letters, digits, '-', '_', '.' or '~'"
        )));
    }
    Ok(id.to_string())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

pub type RemoteHandler = fn(RequestPipeline, ActionContext) -> BoxFuture<'static, ActionOutcome>;

#[derive(Clone, Copy)]
pub enum Handler {
    /// Runs synchronously against the panel, no network, no busy lock.
    Local(fn(&mut PanelState)),
    Remote(RemoteHandler),
}

fn health(p: RequestPipeline, _: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move { ActionOutcome::single(p.perform(ActionRequest::get("/healthz")).await) })
}

fn stats(p: RequestPipeline, _: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move { ActionOutcome::single(p.perform(ActionRequest::get("/stats")).await) })
}

fn list_stacks(p: RequestPipeline, _: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move { ActionOutcome::listed(p.perform(ActionRequest::get("/stacks")).await) })
}

fn get_stack(p: RequestPipeline, ctx: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move {
        match require_stack_id(&ctx.stack_id) {
            Ok(id) => ActionOutcome::single(p.perform(ActionRequest::get(format!("/stacks/{id}"))).await),
            Err(e) => ActionOutcome::failed(e),
        }
    })
}

fn get_status(p: RequestPipeline, ctx: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move {
        match require_stack_id(&ctx.stack_id) {
            Ok(id) => ActionOutcome::single(p.perform(ActionRequest::get(format!("/stacks/{id}/status"))).await),
            Err(e) => ActionOutcome::failed(e),
        }
    })
}

fn delete_stack(p: RequestPipeline, ctx: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move {
        match require_stack_id(&ctx.stack_id) {
            Ok(id) => ActionOutcome::single(p.perform(ActionRequest::delete(format!("/stacks/{id}"))).await),
            Err(e) => ActionOutcome::failed(e),
        }
    })
}

/// DELETE the card's stack, then always re-fetch the list. The view gets the
/// post-delete fetch; the console reports the first failure, if any.
fn delete_item(p: RequestPipeline, ctx: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move {
        let id = match require_stack_id(ctx.target.as_deref().unwrap_or("")) {
            Ok(id) => id,
            Err(e) => return ActionOutcome::failed(e),
        };
        let deleted = p.perform(ActionRequest::delete(format!("/stacks/{id}"))).await;
        let refreshed = p.perform(ActionRequest::get("/stacks")).await;
        let listing = refreshed.as_ref().ok().map(listing_from);

        let result = match (deleted, refreshed) {
            (Ok(d), Ok(r)) => Ok(ActionOutput {
                record: serde_json::json!({
                    "delete": payload_record(&d),
                    "refresh": payload_record(&r),
                }),
                created_stack_id: None,
            }),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        };
        ActionOutcome { result, listing }
    })
}

fn create_stack(p: RequestPipeline, ctx: ActionContext) -> BoxFuture<'static, ActionOutcome> {
    Box::pin(async move {
        let request = match build_create_request(&ctx.target_port, &ctx.pod_spec, ctx.encoding) {
            Ok(r) => r,
            Err(e) => return ActionOutcome::failed(e),
        };
        let body = match serde_json::to_value(&request) {
            Ok(b) => b,
            Err(e) => return ActionOutcome::failed(ActionError::Internal(format!("encoding create request: {e}"))),
        };
        let result = p.perform(ActionRequest::post("/stacks", body)).await.map(|payload| ActionOutput {
            record: payload_record(&payload),
            created_stack_id: payload.body.stack_id(),
        });
        ActionOutcome { result, listing: None }
    })
}

fn clear_console(state: &mut PanelState) {
    state.console.clear();
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    table: HashMap<ActionId, Handler>,
}

/// An action that passed the busy check and is ready to run its calls.
pub struct PendingAction {
    pub id: ActionId,
    pub title: String,
    handler: RemoteHandler,
    pipeline: RequestPipeline,
    ctx: ActionContext,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let mut d = Self { transport, table: HashMap::new() };
        d.register(ActionId::Health, Handler::Remote(health));
        d.register(ActionId::ListStacks, Handler::Remote(list_stacks));
        d.register(ActionId::Stats, Handler::Remote(stats));
        d.register(ActionId::GetStack, Handler::Remote(get_stack));
        d.register(ActionId::GetStatus, Handler::Remote(get_status));
        d.register(ActionId::DeleteStack, Handler::Remote(delete_stack));
        d.register(ActionId::RefreshList, Handler::Remote(list_stacks));
        d.register(ActionId::DeleteItem, Handler::Remote(delete_item));
        d.register(ActionId::CreateStack, Handler::Remote(create_stack));
        d.register(ActionId::ClearConsole, Handler::Local(clear_console));
        d
    }

    pub fn register(&mut self, id: ActionId, handler: Handler) {
        self.table.insert(id, handler);
    }

    pub fn handler(&self, id: ActionId) -> Option<Handler> {
        self.table.get(&id).copied()
    }

    /// Resolve the trigger. Returns the network part still to run, or None when
    /// the controls are disabled, the action was local, or nothing is registered.
    pub fn dispatch(&self, state: &mut PanelState, trigger: ActionTrigger) -> Option<PendingAction> {
        if state.busy.is_engaged() {
            debug!(action = trigger.id.as_str(), "ignored while busy");
            return None;
        }
        let Some(handler) = self.handler(trigger.id) else {
            warn!(action = trigger.id.as_str(), "no handler registered");
            return None;
        };
        match handler {
            Handler::Local(run) => {
                run(state);
                None
            }
            Handler::Remote(handler) => {
                let title = trigger.id.title().to_string();
                let ctx = state.begin(&title, trigger.target);
                let pipeline = RequestPipeline::new(self.transport.clone(), ctx.settings.clone());
                Some(PendingAction { id: trigger.id, title, handler, pipeline, ctx })
            }
        }
    }

    /// Dispatch, execute and complete in one go. Returns whether anything ran
    /// over the network.
    pub async fn run_action(&self, state: &mut PanelState, trigger: impl Into<ActionTrigger>) -> bool {
        match self.dispatch(state, trigger.into()) {
            Some(pending) => {
                let completion = pending.execute().await;
                state.complete(completion);
                true
            }
            None => false,
        }
    }
}

impl PendingAction {
    /// Run the handler's calls. A panicking handler still yields a completion
    /// so the busy lock is released.
    pub async fn execute(self) -> ActionCompletion {
        let PendingAction { id, title, handler, pipeline, ctx } = self;
        let outcome = match AssertUnwindSafe(handler(pipeline, ctx)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => ActionOutcome::failed(ActionError::Internal(format!("{} handler panicked", id.as_str()))),
        };
        ActionCompletion { id, title, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;
    use crate::client::testing::ScriptedTransport;
    use crate::config::ResolvedConfig;
    use crate::error::ErrorKind;
    use crate::panel::console::RecordState;
    use crate::panel::stack_list::ListContent;
    use crate::prefs::PreferenceStore;

    const BASE: &str = "http://localhost:8081";

    fn setup() -> (Arc<ScriptedTransport>, Dispatcher, PanelState) {
        let t = ScriptedTransport::new();
        let d = Dispatcher::new(t.clone());
        let s = PanelState::new(&ResolvedConfig::default(), PreferenceStore::unavailable());
        (t, d, s)
    }

    fn ids(state: &PanelState) -> Vec<String> {
        state.stacks.cards().iter().map(|c| c.stack_id.clone()).collect()
    }

    #[test]
    fn test_every_action_registered() {
        let (_, d, _) = setup();
        for id in ActionId::ALL {
            assert!(d.handler(id).is_some(), "{id:?} missing");
        }
        assert!(matches!(d.handler(ActionId::ClearConsole), Some(Handler::Local(_))));
    }

    #[tokio::test]
    async fn test_health_single_get() {
        let (t, d, mut s) = setup();
        t.reply(200, r#"{"status":"ok"}"#);
        assert!(d.run_action(&mut s, ActionId::Health).await);

        assert_eq!(t.calls(), vec![(Method::Get, format!("{BASE}/healthz"))]);
        assert!(!s.busy.is_engaged());
        let rec = s.console.record();
        assert_eq!(rec.state, RecordState::Ok);
        assert_eq!(rec.title, "GET /healthz");
        assert!(rec.body.contains("\"status\": 200"));
    }

    #[tokio::test]
    async fn test_busy_refuses_new_actions() {
        let (t, d, mut s) = setup();
        let pending = d.dispatch(&mut s, ActionId::Stats.into()).unwrap();
        assert!(s.busy.is_engaged());
        assert!(d.dispatch(&mut s, ActionId::Health.into()).is_none());
        assert!(d.dispatch(&mut s, ActionId::ClearConsole.into()).is_none());
        assert!(s.console.record().is_running());

        t.reply(200, "{}");
        let completion = pending.execute().await;
        s.complete(completion);
        assert!(!s.busy.is_engaged());
        assert_eq!(t.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_stack_id_is_local_validation() {
        let (t, d, mut s) = setup();
        s.inputs.stack_id = "   ".to_string();
        for id in [ActionId::GetStack, ActionId::GetStatus, ActionId::DeleteStack] {
            d.run_action(&mut s, id).await;
            let rec = s.console.record();
            assert_eq!(rec.error_kind, Some(ErrorKind::Validation));
            assert!(rec.body.contains("stack_id is required"));
            assert!(!s.busy.is_engaged());
        }
        assert!(t.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stack_id_cannot_change_the_path() {
        let (t, d, mut s) = setup();
        for bad in ["abc/status", "abc?x=1", "abc#frag", "a b", "..", "abc%2F"] {
            s.inputs.stack_id = bad.to_string();
            d.run_action(&mut s, ActionId::DeleteStack).await;
            let rec = s.console.record();
            assert_eq!(rec.error_kind, Some(ErrorKind::Validation), "{bad}");
            assert!(rec.body.contains("invalid stack_id"), "{bad}");
        }
        d.run_action(&mut s, ActionTrigger::targeted(ActionId::DeleteItem, "x/y")).await;
        assert_eq!(s.console.record().error_kind, Some(ErrorKind::Validation));
        assert!(t.requests().is_empty());
    }

    #[tokio::test]
    async fn test_single_stack_paths() {
        let (t, d, mut s) = setup();
        s.inputs.stack_id = " abc ".to_string();
        t.reply(200, "{}");
        t.reply(200, "{}");
        t.reply(200, "{}");
        d.run_action(&mut s, ActionId::GetStack).await;
        d.run_action(&mut s, ActionId::GetStatus).await;
        d.run_action(&mut s, ActionId::DeleteStack).await;
        assert_eq!(
            t.calls(),
            vec![
                (Method::Get, format!("{BASE}/stacks/abc")),
                (Method::Get, format!("{BASE}/stacks/abc/status")),
                (Method::Delete, format!("{BASE}/stacks/abc")),
            ]
        );
    }

    #[tokio::test]
    async fn test_not_found_surfaced_unmodified() {
        let (t, d, mut s) = setup();
        s.inputs.stack_id = "missing".to_string();
        t.reply(404, r#"{"error":"not found"}"#);
        d.run_action(&mut s, ActionId::GetStack).await;

        let rec = s.console.record();
        assert_eq!(rec.error_kind, Some(ErrorKind::Response));
        assert_eq!(rec.title, "GET /stacks/{stack_id} (ERROR)");
        let body: Value = serde_json::from_str(&rec.body).unwrap();
        assert_eq!(body["ok"], Value::Bool(false));
        assert_eq!(body["status"], serde_json::json!(404));
        assert_eq!(body["url"], serde_json::json!(format!("{BASE}/stacks/missing")));
        assert_eq!(body["body"], serde_json::json!({"error": "not found"}));
    }

    #[tokio::test]
    async fn test_transport_error_releases_lock() {
        let (t, d, mut s) = setup();
        t.fail("connection refused");
        d.run_action(&mut s, ActionId::Stats).await;
        assert!(!s.busy.is_engaged());
        assert_eq!(s.console.record().error_kind, Some(ErrorKind::Transport));
    }

    #[tokio::test]
    async fn test_refresh_and_list_render_full_snapshot() {
        let (t, d, mut s) = setup();
        t.reply(200, r#"{"stacks":[{"stack_id":"a"},{"stack_id":"b"}]}"#);
        d.run_action(&mut s, ActionId::RefreshList).await;
        assert_eq!(ids(&s), ["a", "b"]);

        t.reply(200, r#"{"stacks":[]}"#);
        d.run_action(&mut s, ActionId::ListStacks).await;
        assert!(matches!(s.stacks.content(), ListContent::Placeholder(_)));
        assert!(s.stacks.cards().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_snapshot() {
        let (t, d, mut s) = setup();
        t.reply(200, r#"{"stacks":[{"stack_id":"a"}]}"#);
        d.run_action(&mut s, ActionId::RefreshList).await;
        t.reply(500, r#"{"error":"internal server error"}"#);
        d.run_action(&mut s, ActionId::RefreshList).await;
        assert_eq!(ids(&s), ["a"]);
        assert_eq!(s.console.record().error_kind, Some(ErrorKind::Response));
    }

    #[tokio::test]
    async fn test_unexpected_list_payload_renders_placeholder() {
        let (t, d, mut s) = setup();
        t.reply(200, "<html>proxy error</html>");
        d.run_action(&mut s, ActionId::RefreshList).await;
        match s.stacks.content() {
            ListContent::Placeholder(msg) => assert!(msg.contains("not JSON")),
            other => panic!("expected placeholder, got {other:?}"),
        }
        assert_eq!(s.console.record().state, RecordState::Ok);
    }

    #[tokio::test]
    async fn test_delete_item_deletes_then_refreshes() {
        let (t, d, mut s) = setup();
        t.reply(200, r#"{"stacks":[{"stack_id":"abc"},{"stack_id":"def"}]}"#);
        d.run_action(&mut s, ActionId::RefreshList).await;
        assert_eq!(ids(&s), ["abc", "def"]);

        let trigger = s.stacks.cards()[0].delete.trigger();
        t.reply(200, r#"{"deleted":true,"stack_id":"abc"}"#);
        t.reply(200, r#"{"stacks":[{"stack_id":"def"},{"stack_id":"ghi"}]}"#);
        d.run_action(&mut s, trigger).await;

        assert_eq!(
            t.calls()[1..],
            [
                (Method::Delete, format!("{BASE}/stacks/abc")),
                (Method::Get, format!("{BASE}/stacks")),
            ]
        );
        assert_eq!(ids(&s), ["def", "ghi"]);
        assert_eq!(s.console.record().state, RecordState::Ok);
        assert!(!s.busy.is_engaged());
    }

    #[tokio::test]
    async fn test_delete_item_refreshes_even_when_delete_fails() {
        let (t, d, mut s) = setup();
        t.reply(404, r#"{"error":"not found"}"#);
        t.reply(200, r#"{"stacks":[{"stack_id":"other"}]}"#);
        d.run_action(&mut s, ActionTrigger::targeted(ActionId::DeleteItem, "gone")).await;

        assert_eq!(t.calls().len(), 2);
        assert_eq!(ids(&s), ["other"]);
        assert_eq!(s.console.record().error_kind, Some(ErrorKind::Response));
    }

    #[tokio::test]
    async fn test_delete_item_ignores_inspect_field() {
        let (t, d, mut s) = setup();
        s.inputs.stack_id = "typed-in".to_string();
        t.reply(200, "{}");
        t.reply(200, r#"{"stacks":[]}"#);
        d.run_action(&mut s, ActionTrigger::targeted(ActionId::DeleteItem, "card-id")).await;
        assert_eq!(t.calls()[0], (Method::Delete, format!("{BASE}/stacks/card-id")));
    }

    #[tokio::test]
    async fn test_create_propagates_stack_id() {
        let (t, d, mut s) = setup();
        s.inputs.target_port = "80/tcp".to_string();
        t.reply(201, r#"{"stack_id":"stack-42","status":"creating"}"#);
        d.run_action(&mut s, ActionId::CreateStack).await;

        let sent = &t.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, format!("{BASE}/stacks"));
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["target_port"], serde_json::json!([{"container_port": 80, "protocol": "TCP"}]));
        assert_eq!(s.inputs.stack_id, "stack-42");
        assert_eq!(s.inputs.last_stack_id, "stack-42");

        // Follow-up single-stack action needs no manual copy.
        t.reply(200, r#"{"stack_id":"stack-42","status":"running"}"#);
        d.run_action(&mut s, ActionId::GetStatus).await;
        assert_eq!(t.calls()[1], (Method::Get, format!("{BASE}/stacks/stack-42/status")));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_port_before_network() {
        let (t, d, mut s) = setup();
        s.inputs.stack_id = "keep".to_string();
        s.inputs.target_port = "eighty".to_string();
        d.run_action(&mut s, ActionId::CreateStack).await;

        assert!(t.requests().is_empty());
        assert_eq!(s.console.record().error_kind, Some(ErrorKind::Validation));
        assert_eq!(s.inputs.stack_id, "keep");
    }

    #[tokio::test]
    async fn test_clear_console_is_local() {
        let (t, d, mut s) = setup();
        t.reply(200, "{}");
        d.run_action(&mut s, ActionId::Health).await;
        assert!(!d.run_action(&mut s, ActionId::ClearConsole).await);
        assert_eq!(s.console.record().state, RecordState::Idle);
        assert_eq!(t.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_api_key_header_follows_settings() {
        let (t, d, mut s) = setup();
        s.set_input(crate::panel::Field::ApiKey, "k-1".to_string());
        t.reply(200, "{}");
        d.run_action(&mut s, ActionId::Health).await;
        assert_eq!(t.requests()[0].header("X-API-KEY"), Some("k-1"));

        s.toggle_api_key_enabled();
        t.reply(200, "{}");
        d.run_action(&mut s, ActionId::Health).await;
        assert_eq!(t.requests()[1].header("X-API-KEY"), None);
    }

    #[tokio::test]
    async fn test_panicking_handler_still_releases_lock() {
        fn explode() -> ActionOutcome {
            panic!("handler blew up")
        }
        fn boom(_: RequestPipeline, _: ActionContext) -> BoxFuture<'static, ActionOutcome> {
            Box::pin(async { explode() })
        }
        let (_, mut d, mut s) = setup();
        d.register(ActionId::Stats, Handler::Remote(boom));
        d.run_action(&mut s, ActionId::Stats).await;
        assert!(!s.busy.is_engaged());
        assert_eq!(s.console.record().error_kind, Some(ErrorKind::Internal));
    }
}

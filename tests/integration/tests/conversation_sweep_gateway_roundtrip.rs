use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parley_access::{AuthMode, AuthSettings};
use parley_agent_core::{
    ActionHints, AgentError, AgentRuntime, DialogueAgent, Prediction, UserMessage,
};
use parley_core::current_unix_timestamp_f64;
use parley_gateway::{
    build_gateway_router, DialogueAgentLoader, GatewayServerConfig, GatewayServerState,
    ModelLoadRequest,
};
use parley_multi_channel::{
    BotMessage, ChannelError, ChannelRegistry, InputChannel, OutputChannel, RestInputChannel,
};
use parley_session::{FileTrackerStore, Tracker, TrackerEvent, TrackerStore};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);
const AUTH_TOKEN: &str = "integration-secret";
const JWT_SECRET: &str = "integration-jwt-key";
const TWO_DAYS_SECONDS: f64 = 172_800.0;

struct ScriptedAgent {
    failing_sender: Option<&'static str>,
    calls: AsyncMutex<Vec<String>>,
}

impl ScriptedAgent {
    fn new(failing_sender: Option<&'static str>) -> Self {
        Self {
            failing_sender,
            calls: AsyncMutex::new(Vec::new()),
        }
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    fn fail_for(&self, tracker: &Tracker) -> Result<(), AgentError> {
        match self.failing_sender {
            Some(sender) if sender == tracker.sender_id() => Err(AgentError::Remote {
                endpoint: "/webhook".to_string(),
                status: 502,
                message: "bad gateway".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DialogueAgent for ScriptedAgent {
    fn fingerprint(&self) -> &str {
        "integration-model"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn handle_text(
        &self,
        tracker: &mut Tracker,
        message: UserMessage,
        output_channel: Arc<dyn OutputChannel>,
    ) -> Result<(), AgentError> {
        self.calls
            .lock()
            .await
            .push(format!("handle_text:{}", tracker.sender_id()));
        self.fail_for(tracker)?;
        let reply = format!("ack {}", message.text);
        tracker.update(TrackerEvent::user(
            message.text,
            message.input_channel.as_deref(),
        ));
        output_channel
            .send_text(tracker.sender_id(), reply.as_str())
            .await?;
        tracker.update(TrackerEvent::bot(reply));
        Ok(())
    }

    async fn log_message(
        &self,
        tracker: &mut Tracker,
        message: UserMessage,
    ) -> Result<(), AgentError> {
        tracker.update(TrackerEvent::user(message.text, None));
        Ok(())
    }

    async fn execute_action(
        &self,
        tracker: &mut Tracker,
        action: &str,
        output_channel: Arc<dyn OutputChannel>,
        _hints: ActionHints<'_>,
    ) -> Result<(), AgentError> {
        self.calls
            .lock()
            .await
            .push(format!("execute_action:{}:{action}", tracker.sender_id()));
        self.fail_for(tracker)?;
        tracker.update(TrackerEvent::action(action));
        output_channel
            .send_text(tracker.sender_id(), "are you still there?")
            .await?;
        Ok(())
    }

    async fn predict_next(&self, _tracker: &Tracker) -> Result<Prediction, AgentError> {
        Ok(Prediction::default())
    }

    async fn domain(&self) -> Result<Value, AgentError> {
        Ok(json!({"actions": ["action_follow_up"]}))
    }
}

struct WebhookChannel {
    delivered: AsyncMutex<Vec<BotMessage>>,
}

#[async_trait]
impl OutputChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_response(&self, message: BotMessage) -> Result<(), ChannelError> {
        self.delivered.lock().await.push(message);
        Ok(())
    }
}

struct WebhookInput {
    output: Arc<WebhookChannel>,
}

impl InputChannel for WebhookInput {
    fn name(&self) -> &str {
        "webhook"
    }

    fn output_channel(&self) -> Option<Arc<dyn OutputChannel>> {
        let output: Arc<dyn OutputChannel> = self.output.clone();
        Some(output)
    }
}

struct RejectingLoader;

impl DialogueAgentLoader for RejectingLoader {
    fn load(&self, request: &ModelLoadRequest) -> Result<Arc<dyn DialogueAgent>> {
        anyhow::bail!("no runtime reachable at {}", request.agent_url)
    }
}

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "parley-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

struct Harness {
    addr: SocketAddr,
    server: tokio::task::JoinHandle<()>,
    agent: Arc<ScriptedAgent>,
    webhook: Arc<WebhookChannel>,
    store_root: PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn start_gateway(workspace: &IsolatedWorkspace, agent: ScriptedAgent) -> Harness {
    let store_root = workspace.root().join("trackers");
    let store: Arc<dyn TrackerStore> =
        Arc::new(FileTrackerStore::open(&store_root).expect("open file tracker store"));
    let agent = Arc::new(agent);
    let webhook = Arc::new(WebhookChannel {
        delivered: AsyncMutex::new(Vec::new()),
    });
    let channels: Vec<Arc<dyn InputChannel>> = vec![
        Arc::new(RestInputChannel::new("rest")),
        Arc::new(WebhookInput {
            output: webhook.clone(),
        }),
    ];
    let auth_mode = AuthMode::from_settings(&AuthSettings {
        auth_token: Some(AUTH_TOKEN.to_string()),
        jwt_secret: Some(JWT_SECRET.to_string()),
        jwt_method: "HS256".to_string(),
    })
    .expect("auth mode");
    let dyn_agent: Arc<dyn DialogueAgent> = agent.clone();
    let config = GatewayServerConfig {
        bind: "127.0.0.1:0".to_string(),
        auth_mode,
        cors_origins: vec!["*".to_string()],
        request_timeout_ms: 10_000,
        runtime: AgentRuntime::new(Some(dyn_agent), Some(store)),
        channels: ChannelRegistry::new(channels),
        agent_loader: Arc::new(RejectingLoader),
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener addr");
    let app = build_gateway_router(Arc::new(GatewayServerState::new(config)));
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    Harness {
        addr,
        server,
        agent,
        webhook,
        store_root,
    }
}

fn bearer(username: &str, role: &str) -> String {
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({"user": {"username": username, "role": role}}),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode jwt");
    format!("Bearer {token}")
}

async fn put_events(client: &Client, harness: &Harness, sender_id: &str, events: Value) {
    let response = client
        .put(format!(
            "http://{}/conversations/{sender_id}/tracker/events?token={AUTH_TOKEN}",
            harness.addr
        ))
        .json(&events)
        .send()
        .await
        .expect("replace events");
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn integration_stale_sweep_routes_to_latest_channel_and_persists_to_disk() {
    let workspace = IsolatedWorkspace::new("stale-sweep");
    let harness = start_gateway(&workspace, ScriptedAgent::new(None)).await;
    let client = Client::new();
    let now = current_unix_timestamp_f64();

    put_events(
        &client,
        &harness,
        "alice",
        json!([
            {"event": "user", "text": "hi", "input_channel": "webhook", "timestamp": now - TWO_DAYS_SECONDS},
            {"event": "bot", "text": "hello", "timestamp": now - TWO_DAYS_SECONDS + 1.0}
        ]),
    )
    .await;
    put_events(
        &client,
        &harness,
        "bob",
        json!([{"event": "user", "text": "hey", "input_channel": "webhook", "timestamp": now - 30.0}]),
    )
    .await;

    let own = client
        .get(format!("http://{}/conversations/alice/tracker", harness.addr))
        .header("authorization", bearer("alice", "user"))
        .send()
        .await
        .expect("own tracker");
    assert_eq!(own.status().as_u16(), 200);

    let denied = client
        .post(format!(
            "http://{}/conversations/resume-dead-conversations",
            harness.addr
        ))
        .header("authorization", bearer("alice", "user"))
        .json(&json!({"name": "action_check_in"}))
        .send()
        .await
        .expect("user sweep");
    assert_eq!(denied.status().as_u16(), 403);
    assert!(harness.agent.calls().await.is_empty());

    let response = client
        .post(format!(
            "http://{}/conversations/resume-dead-conversations?output_channel=latest",
            harness.addr
        ))
        .header("authorization", bearer("ops", "admin"))
        .json(&json!({"name": "action_check_in"}))
        .send()
        .await
        .expect("admin sweep");
    assert_eq!(response.status().as_u16(), 200);
    let payload = response.json::<Value>().await.expect("sweep payload");
    assert_eq!(
        payload["triggered"],
        json!({"alice": "Action trigger sent"})
    );
    assert_eq!(payload["outcomes"][1]["status"], "skipped");

    let delivered = harness.webhook.delivered.lock().await.clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].recipient_id, "alice");

    let reopened = FileTrackerStore::open(&harness.store_root).expect("reopen store");
    let alice = reopened
        .retrieve("alice")
        .await
        .expect("retrieve alice")
        .expect("alice persisted");
    assert_eq!(alice.latest_action_name(), Some("action_check_in"));
    let bob = reopened
        .retrieve("bob")
        .await
        .expect("retrieve bob")
        .expect("bob persisted");
    assert_eq!(bob.events().len(), 1);
}

#[tokio::test]
async fn integration_conditional_sweep_isolates_failures_and_keeps_other_dispatches() {
    let workspace = IsolatedWorkspace::new("conditional-sweep");
    let harness = start_gateway(&workspace, ScriptedAgent::new(Some("bob"))).await;
    let client = Client::new();

    for sender_id in ["alice", "bob", "carol"] {
        put_events(
            &client,
            &harness,
            sender_id,
            json!([
                {"event": "user", "text": "hi", "input_channel": "webhook", "timestamp": 1.0},
                {"event": "slot", "name": "plan", "value": "trial", "timestamp": 2.0}
            ]),
        )
        .await;
    }

    let response = client
        .post(format!(
            "http://{}/conversations/handle-message-w-condition?token={AUTH_TOKEN}&output_channel=latest",
            harness.addr
        ))
        .json(&json!({
            "message": "/trial_ending",
            "slot_condition_name": "plan",
            "slot_value": "trial"
        }))
        .send()
        .await
        .expect("conditional sweep");
    assert_eq!(response.status().as_u16(), 200);
    let payload = response.json::<Value>().await.expect("payload");
    let statuses = payload["outcomes"]
        .as_array()
        .expect("outcomes")
        .iter()
        .map(|outcome| outcome["status"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(statuses, vec!["triggered", "failed", "triggered"]);
    assert_eq!(
        harness.agent.calls().await,
        vec![
            "handle_text:alice".to_string(),
            "handle_text:bob".to_string(),
            "handle_text:carol".to_string(),
        ]
    );
    let recipients = harness
        .webhook
        .delivered
        .lock()
        .await
        .iter()
        .map(|message| message.recipient_id.clone())
        .collect::<Vec<_>>();
    assert_eq!(recipients, vec!["alice".to_string(), "carol".to_string()]);

    let reload = client
        .put(format!("http://{}/model?token={AUTH_TOKEN}", harness.addr))
        .json(&json!({"agent_url": "http://127.0.0.1:9"}))
        .send()
        .await
        .expect("reload");
    assert_eq!(reload.status().as_u16(), 400);
    let status = client
        .get(format!("http://{}/status?token={AUTH_TOKEN}", harness.addr))
        .send()
        .await
        .expect("status")
        .json::<Value>()
        .await
        .expect("status payload");
    assert_eq!(status["fingerprint"], "integration-model");
    assert_eq!(status["runtime_version"], 0);
}

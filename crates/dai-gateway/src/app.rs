use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};

use dai_catalog::Catalog;
use dai_core::config::DaiConfig;
use dai_fleet::{BotSupervisor, RestartQueue};
use dai_memory::{ConversationLog, ConversationMemory};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: DaiConfig,
    pub catalog: Arc<dyn Catalog>,
    pub supervisor: Arc<BotSupervisor>,
    pub restarts: RestartQueue,
    pub memory: Arc<ConversationMemory>,
    /// Completed exchanges, newest last. Shared with the dispatcher.
    pub log: Arc<ConversationLog>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: DaiConfig,
        catalog: Arc<dyn Catalog>,
        supervisor: Arc<BotSupervisor>,
        restarts: RestartQueue,
        memory: Arc<ConversationMemory>,
        log: Arc<ConversationLog>,
    ) -> Self {
        Self {
            config,
            catalog,
            supervisor,
            restarts,
            memory,
            log,
            started_at: Utc::now(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/bots", get(crate::http::bots::list_bots))
        .route("/bots/{id}", get(crate::http::bots::get_bot))
        .route("/bots/{id}/start", post(crate::http::bots::start_bot))
        .route("/bots/{id}/stop", post(crate::http::bots::stop_bot))
        .route("/bots/{id}/restart", post(crate::http::bots::restart_bot))
        .route("/bots/{id}/reload", post(crate::http::bots::reload_bot))
        .route(
            "/logs/conversations",
            get(crate::http::logs::recent_conversations),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use dai_catalog::SqliteCatalog;
    use dai_core::types::BotId;
    use dai_fleet::{
        BotConnection, BotIdentity, BotLauncher, BotState, FleetError, StateSignal,
        SupervisorSettings,
    };
    use dai_memory::{ConversationEntry, MemoryKey, Speaker};

    struct FakeConnection(StateSignal);

    #[async_trait]
    impl BotConnection for FakeConnection {
        fn state(&self) -> BotState {
            self.0.get()
        }
        fn subscribe(&self) -> watch::Receiver<BotState> {
            self.0.subscribe()
        }
        async fn close(&self) {
            self.0.set(BotState::Closed);
        }
    }

    /// Connects instantly unless the token is "bad".
    struct FakeLauncher;

    #[async_trait]
    impl BotLauncher for FakeLauncher {
        async fn launch(&self, identity: &BotIdentity) -> Result<Box<dyn BotConnection>, FleetError> {
            if identity.token == "bad" {
                return Err(FleetError::Setup {
                    id: identity.id,
                    reason: "invalid token".into(),
                });
            }
            let signal = StateSignal::new();
            signal.set(BotState::Running);
            Ok(Box::new(FakeConnection(signal)))
        }
    }

    fn harness() -> (Router, Arc<AppState>, Arc<SqliteCatalog>) {
        let sqlite = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        sqlite
            .execute_batch(
                "INSERT INTO discord_bots (id, name, token, is_active) VALUES
                    (1, 'alpha', 'tok-a', 0),
                    (2, 'broken', 'bad', 1);",
            )
            .unwrap();
        let catalog: Arc<dyn Catalog> = sqlite.clone();

        let supervisor = Arc::new(BotSupervisor::new(
            Arc::new(FakeLauncher),
            SupervisorSettings {
                grace: Duration::from_millis(100),
                restart_pause: Duration::from_millis(1),
                close_timeout: Duration::from_millis(50),
            },
        ));
        let (restarts, _worker) =
            RestartQueue::spawn(Arc::clone(&supervisor), Arc::clone(&catalog), 8);
        let state = Arc::new(AppState::new(
            DaiConfig::default(),
            catalog,
            supervisor,
            restarts,
            Arc::new(ConversationMemory::with_capacity(4)),
            Arc::new(ConversationLog::new(10)),
        ));
        (build_router(Arc::clone(&state)), state, sqlite)
    }

    async fn call(app: &Router, method: &str, uri: &str) -> Response<Body> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(resp: Response<Body>) -> Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_empty_fleet() {
        let (app, _, _) = harness();
        let resp = call(&app, "GET", "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["bots_running"], 0);
        assert_eq!(json["command_prefix"], "!");
        assert_eq!(json["bots"].as_array().unwrap().len(), 0);
        assert_eq!(json["memory_keys"], 0);
        assert_eq!(json["memory_capacity"], 4);
    }

    #[tokio::test]
    async fn health_lists_running_bots_and_memory_keys() {
        let (app, state, _) = harness();
        call(&app, "POST", "/bots/1/start").await;
        state.memory.append(
            MemoryKey { channel_id: 10, user_id: 20 },
            Speaker::User,
            "hello",
        );

        let json = body_json(call(&app, "GET", "/health").await).await;
        assert_eq!(json["bots_running"], 1);
        assert_eq!(json["bots"][0]["id"], 1);
        assert_eq!(json["bots"][0]["name"], "alpha");
        assert_eq!(json["bots"][0]["state"], "running");
        assert_eq!(json["memory_keys"], 1);
    }

    #[tokio::test]
    async fn list_never_exposes_tokens() {
        let (app, _, _) = harness();
        let json = body_json(call(&app, "GET", "/bots").await).await;
        let bots = json.as_array().unwrap();
        assert_eq!(bots.len(), 2);
        assert_eq!(bots[0]["name"], "alpha");
        assert_eq!(bots[0]["running"], false);
        assert!(bots[0].get("token").is_none());
    }

    #[tokio::test]
    async fn list_filters_by_name() {
        let (app, _, _) = harness();
        let json = body_json(call(&app, "GET", "/bots?name=broken").await).await;
        let bots = json.as_array().unwrap();
        assert_eq!(bots.len(), 1);
        assert_eq!(bots[0]["id"], 2);

        let json = body_json(call(&app, "GET", "/bots?name=nobody").await).await;
        assert_eq!(json.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn start_marks_active_and_second_start_conflicts() {
        let (app, state, sqlite) = harness();

        let resp = call(&app, "POST", "/bots/1/start").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.supervisor.status(BotId(1)));
        assert!(sqlite.bot(BotId(1)).unwrap().unwrap().is_active);

        let json = body_json(call(&app, "GET", "/bots/1").await).await;
        assert_eq!(json["running"], true);
        assert_eq!(json["live"]["state"], "running");

        let resp = call(&app, "POST", "/bots/1/start").await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(state.supervisor.len(), 1);
    }

    #[tokio::test]
    async fn failed_start_marks_inactive() {
        let (app, state, sqlite) = harness();
        let resp = call(&app, "POST", "/bots/2/start").await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!state.supervisor.status(BotId(2)));
        assert!(!sqlite.bot(BotId(2)).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn unknown_bot_is_not_found() {
        let (app, _, _) = harness();
        assert_eq!(call(&app, "GET", "/bots/99").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            call(&app, "POST", "/bots/99/start").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (app, state, sqlite) = harness();
        call(&app, "POST", "/bots/1/start").await;

        let resp = call(&app, "POST", "/bots/1/stop").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!state.supervisor.status(BotId(1)));
        assert!(!sqlite.bot(BotId(1)).unwrap().unwrap().is_active);

        let resp = call(&app, "POST", "/bots/1/stop").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reload_is_accepted_and_applied_in_background() {
        let (app, state, sqlite) = harness();
        let resp = call(&app, "POST", "/bots/1/reload").await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        for _ in 0..50 {
            if sqlite.bot(BotId(1)).unwrap().unwrap().is_active {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.supervisor.status(BotId(1)));
        assert!(sqlite.bot(BotId(1)).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn concurrent_restart_and_reload_leave_bot_running_and_active() {
        let (app, state, sqlite) = harness();
        call(&app, "POST", "/bots/1/start").await;

        let (restart, reload) = tokio::join!(
            call(&app, "POST", "/bots/1/restart"),
            call(&app, "POST", "/bots/1/reload"),
        );
        assert_eq!(restart.status(), StatusCode::OK);
        assert_eq!(reload.status(), StatusCode::ACCEPTED);

        // Holding the lock keeps a queued restart from landing mid-assertion.
        let _settled = state.supervisor.lock(BotId(1)).await;
        for _ in 0..50 {
            if state.supervisor.status(BotId(1)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.supervisor.status(BotId(1)));
        assert_eq!(state.supervisor.len(), 1);
        assert!(sqlite.bot(BotId(1)).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn conversation_log_is_newest_first_and_limited() {
        let (app, state, _) = harness();
        for n in 0..3 {
            state.log.push(ConversationEntry {
                bot_id: BotId(1),
                guild_id: Some(7),
                channel_id: 10,
                user_id: 20,
                command: "gpt".into(),
                model: "GPT X".into(),
                user_message: format!("q{n}"),
                bot_response: format!("a{n}"),
                at: Utc::now(),
            });
        }

        let json = body_json(call(&app, "GET", "/logs/conversations?limit=2").await).await;
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["user_message"], "q2");
        assert_eq!(entries[1]["user_message"], "q1");
    }
}

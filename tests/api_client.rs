//! REST client and monitor tests against an in-process backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;

use imagineer::config::ApiSettings;
use imagineer::monitor::{Monitor, QueueFeed, ScrapingFeed, TrainingFeed};
use imagineer::poller::{AlwaysVisible, PollConfig, PollerState, TierIntervals};
use imagineer::{ApiError, ImagineerClient};
use imagineer_common::JobStatus;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, admin_token: Option<&str>) -> ImagineerClient {
    ImagineerClient::new(&ApiSettings {
        base_url: base_url.to_string(),
        admin_token: admin_token.map(str::to_string),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn fast_config() -> PollConfig {
    PollConfig::default().with_intervals(TierIntervals::uniform(Duration::from_millis(20)))
}

/// Poll `check` until it holds or five seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

mod client_requests {
    use super::*;

    #[tokio::test]
    async fn test_queue_decodes_snapshot() {
        let app = Router::new().route(
            "/api/jobs",
            get(|| async {
                axum::Json(json!({
                    "current": {"id": 3, "prompt": "fox", "status": "processing"},
                    "queue": [{"id": 4, "status": "queued"}, {"id": 5, "status": "pending"}],
                    "history": [{"id": 2, "status": "completed"}, {"id": 1, "status": "exploded"}]
                }))
            }),
        );
        let base_url = serve(app).await;

        let snapshot = client(&base_url, None).queue().await.unwrap();
        let current = snapshot.current.unwrap();
        assert_eq!(current.id, 3);
        assert_eq!(current.status, JobStatus::Running);
        assert_eq!(snapshot.queue.len(), 2);
        assert!(snapshot.queue.iter().all(|job| job.status == JobStatus::Pending));
        assert_eq!(snapshot.history[1].status, JobStatus::Unknown);
    }

    #[tokio::test]
    async fn test_training_runs_unwraps_envelope() {
        let app = Router::new().route(
            "/api/training",
            get(|| async {
                axum::Json(json!({
                    "training_runs": [
                        {"id": 1, "name": "portraits", "status": "training", "progress": 12.5, "album_ids": [4, 9]}
                    ]
                }))
            }),
        );
        let base_url = serve(app).await;

        let runs = client(&base_url, None).training_runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, JobStatus::Running);
        assert_eq!(runs[0].progress, Some(12.5));
        assert_eq!(runs[0].album_ids, vec![4, 9]);
    }

    #[tokio::test]
    async fn test_scraping_jobs_unwraps_envelope() {
        let app = Router::new().route(
            "/api/scraping/jobs",
            get(|| async {
                axum::Json(json!({
                    "jobs": [{"id": 8, "url": "https://example.com", "status": "scraping", "images_scraped": 31}]
                }))
            }),
        );
        let base_url = serve(app).await;

        let jobs = client(&base_url, None).scraping_jobs().await.unwrap();
        assert_eq!(jobs[0].images_scraped, 31);
        assert!(jobs[0].status.is_running());
    }

    #[tokio::test]
    async fn test_admin_token_sent_as_bearer() {
        async fn guarded(headers: HeaderMap) -> Response {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer secret") => axum::Json(json!({"jobs": []})).into_response(),
                _ => StatusCode::FORBIDDEN.into_response(),
            }
        }
        let app = Router::new().route("/api/scraping/jobs", get(guarded));
        let base_url = serve(app).await;

        assert!(client(&base_url, Some("secret")).scraping_jobs().await.is_ok());

        let err = client(&base_url, None).scraping_jobs().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let app = Router::new().route(
            "/api/training",
            get(|| async { (StatusCode::UNAUTHORIZED, "login required") }),
        );
        let base_url = serve(app).await;

        let err = client(&base_url, None).training_runs().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { status: 401, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient_with_body() {
        let app = Router::new().route(
            "/api/jobs",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "worker restarting") }),
        );
        let base_url = serve(app).await;

        let err = client(&base_url, None).queue().await.unwrap_err();
        assert!(err.is_transient());
        match err {
            ApiError::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "worker restarting");
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let app = Router::new().route("/api/jobs", get(|| async { "not json" }));
        let base_url = serve(app).await;

        let err = client(&base_url, None).queue().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let err = client("http://127.0.0.1:1", None).queue().await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert!(err.is_transient());
    }
}

mod monitors {
    use super::*;

    #[tokio::test]
    async fn test_queue_monitor_publishes_snapshots() {
        let app = Router::new().route(
            "/api/jobs",
            get(|| async { axum::Json(json!({"current": {"id": 1}, "queue": [], "history": []})) }),
        );
        let base_url = serve(app).await;

        let monitor = Monitor::<QueueFeed>::start(
            client(&base_url, None),
            fast_config(),
            Arc::new(AlwaysVisible),
        );
        let mut updates = monitor.subscribe();
        tokio::time::timeout(Duration::from_secs(5), updates.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(monitor.latest().unwrap().current.unwrap().id, 1);
        assert!(eventually(|| monitor.stats().successes >= 2).await);
        assert!(!monitor.needs_admin_auth());
    }

    #[tokio::test]
    async fn test_queue_monitor_degrades_to_empty_on_outage() {
        let monitor = Monitor::<QueueFeed>::start(
            client("http://127.0.0.1:1", None),
            fast_config(),
            Arc::new(AlwaysVisible),
        );

        assert!(eventually(|| monitor.latest().is_some()).await);
        assert!(monitor.latest().unwrap().is_drained());
        assert_eq!(monitor.stats().failures, 0);
    }

    #[tokio::test]
    async fn test_training_monitor_keeps_stale_value_on_error() {
        async fn flaky(State(calls): State<Arc<AtomicUsize>>) -> Response {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                axum::Json(json!({"training_runs": [{"id": 5, "status": "running"}]})).into_response()
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
            }
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/training", get(flaky))
            .with_state(Arc::clone(&calls));
        let base_url = serve(app).await;

        let monitor = Monitor::<TrainingFeed>::start(
            client(&base_url, None),
            fast_config(),
            Arc::new(AlwaysVisible),
        );

        assert!(eventually(|| monitor.stats().failures >= 2).await);
        let latest = monitor.latest().unwrap();
        assert_eq!(latest[0].id, 5);
        assert!(monitor.stats().last_error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_unauthorized_trips_gate_and_stops_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/training",
                get(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::UNAUTHORIZED, "admin only")
                }),
            )
            .with_state(Arc::clone(&calls));
        let base_url = serve(app).await;

        let monitor = Monitor::<TrainingFeed>::start(
            client(&base_url, None),
            fast_config(),
            Arc::new(AlwaysVisible),
        );
        let mut auth = monitor.auth_updates();
        tokio::time::timeout(Duration::from_secs(5), auth.wait_for(|tripped| *tripped))
            .await
            .unwrap()
            .unwrap();

        assert!(monitor.needs_admin_auth());
        assert!(eventually(|| monitor.state() == PollerState::Disabled).await);
        assert!(!monitor.handle().is_enabled());
        assert!(monitor.latest().is_none());

        let settled = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), settled);

        assert!(!monitor.set_enabled(true));
        assert!(!monitor.refresh());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(monitor.state(), PollerState::Disabled);
        assert_eq!(calls.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn test_auth_guard_disables_again_after_raw_resume() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/scraping/jobs",
                get(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::FORBIDDEN, "admin only")
                }),
            )
            .with_state(Arc::clone(&calls));
        let base_url = serve(app).await;

        let monitor = Monitor::<ScrapingFeed>::start(
            client(&base_url, None),
            fast_config(),
            Arc::new(AlwaysVisible),
        );
        assert!(eventually(|| monitor.needs_admin_auth() && !monitor.handle().is_enabled()).await);
        let before = calls.load(Ordering::SeqCst);

        // Bypass the monitor's refusal; the next 403 must stop polling again.
        monitor.handle().set_enabled(true);
        assert!(eventually(|| calls.load(Ordering::SeqCst) > before).await);
        assert!(eventually(|| !monitor.handle().is_enabled()).await);

        let settled = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), settled);
        assert_eq!(monitor.state(), PollerState::Disabled);
    }
}

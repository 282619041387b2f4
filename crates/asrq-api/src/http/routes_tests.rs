
    use super::*;
    use crate::test_support::test_service;
    use asrq_queue::{QueueService, TaskStatus};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn create_test_app() -> (Router, Arc<AppState>, TempDir) {
        let (service, dir) = test_service().await;
        let state = Arc::new(AppState::new(service).with_sync_poll_interval(Duration::from_millis(20)));
        (create_router(state.clone()), state, dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn submit(uri: &str, body: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_submit_async() {
        let (app, state, _dir) = create_test_app().await;

        let response = send(&app, submit("/api/asr/async?priority=3&ext=mp3", b"audio")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let task_id = body["task_id"].as_str().unwrap().to_string();
        assert_eq!(body["status_url"], format!("/api/asr/status/{}", task_id));

        let task = state.service.queue().get_task(&task_id).await.unwrap().unwrap();
        assert_eq!(task.priority, 3);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.payload_ref.unwrap().ends_with(".mp3"));
        assert_eq!(state.service.queue().size().await, 1);
    }

    #[tokio::test]
    async fn test_submit_default_priority() {
        let (app, state, _dir) = create_test_app().await;

        let body = body_json(send(&app, submit("/api/asr/async", b"audio")).await).await;
        let task_id = body["task_id"].as_str().unwrap();
        let task = state.service.queue().get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.priority, 10);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_priority() {
        let (app, state, _dir) = create_test_app().await;

        for uri in ["/api/asr/async?priority=0", "/api/asr/async?priority=101"] {
            let response = send(&app, submit(uri, b"audio")).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(state.service.queue().size().await, 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_body() {
        let (app, _state, _dir) = create_test_app().await;

        let response = send(&app, submit("/api/asr/async", b"")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_submit_queue_full() {
        let (app, state, dir) = create_test_app().await;
        state.set_max_queue_size(2);

        for _ in 0..2 {
            let response = send(&app, submit("/api/asr/async", b"audio")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, submit("/api/asr/async", b"audio")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(response).await["code"], "queue_full");
        assert_eq!(state.service.queue().size().await, 2);

        let saved = std::fs::read_dir(dir.path().join("audio")).unwrap().count();
        assert_eq!(saved, 2);
    }

    #[tokio::test]
    async fn test_submit_sync_waits_for_result() {
        let (app, state, _dir) = create_test_app().await;
        state.service.start().await;

        let response = send(&app, submit("/api/asr/sync", b"hello world")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"], "HELLO WORLD");

        state.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_task_status_and_detail() {
        let (app, _state, _dir) = create_test_app().await;

        let body = body_json(send(&app, submit("/api/asr/async", b"audio")).await).await;
        let task_id = body["task_id"].as_str().unwrap().to_string();

        let response = send(&app, get(&format!("/api/asr/status/{}", task_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        assert_eq!(status["task_id"], task_id.as_str());
        assert_eq!(status["status"], "pending");

        let response = send(&app, get(&format!("/api/task/{}", task_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["id"], task_id.as_str());
        assert_eq!(detail["priority"], 10);
    }

    #[tokio::test]
    async fn test_unknown_task_not_found() {
        let (app, _state, _dir) = create_test_app().await;

        let response = send(&app, get("/api/asr/status/no-such-task")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, get("/api/task/no-such-task")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "not_found");
    }

    #[tokio::test]
    async fn test_statistics_keys() {
        let (app, _state, _dir) = create_test_app().await;

        let response = send(&app, get("/api/statistics")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        for key in ["last_5_min", "last_15_min", "last_45_min"] {
            assert_eq!(body[key]["avg_waiting_time"], 0.0);
            assert_eq!(body[key]["avg_load_percent"], 0.0);
        }
    }

    async fn finish(service: &QueueService, status: TaskStatus, result: &str) {
        let payload_ref = service.payloads().save(b"audio", "wav").await.unwrap();
        let task = service.queue().push(payload_ref, 1).await.unwrap();
        service
            .queue()
            .update_task_status(&task.id, status, Some(result.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_history_filters_and_pages() {
        let (app, state, _dir) = create_test_app().await;
        for i in 0..3 {
            finish(&state.service, TaskStatus::Completed, &format!("text {}", i)).await;
        }
        finish(&state.service, TaskStatus::Failed, "boom").await;

        let body = body_json(send(&app, get("/api/history?page=1&page_size=2")).await).await;
        assert_eq!(body["total_count"], 4);
        assert_eq!(body["total_pages"], 2);
        assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(body["has_next"], true);

        let body = body_json(send(&app, get("/api/history?status=failed")).await).await;
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["tasks"][0]["result"], "boom");

        let response = send(&app, get("/api/history?status=pending")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let (app, state, _dir) = create_test_app().await;

        let body = body_json(send(&app, get("/api/config")).await).await;
        assert_eq!(body["max_queue_size"], 10);

        let request = Request::builder()
            .method("PUT")
            .uri("/api/config")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"max_queue_size": 25}"#))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.max_queue_size(), 25);

        let request = Request::builder()
            .method("PUT")
            .uri("/api/config")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"max_queue_size": 0}"#))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.max_queue_size(), 25);
    }

    #[tokio::test]
    async fn test_cleanup_endpoint() {
        let (app, state, _dir) = create_test_app().await;
        finish(&state.service, TaskStatus::Completed, "done").await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/cleanup?minutes=0")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["removed_files"], 1);
        assert_eq!(body["cleared_records"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_rejects_oversized_age() {
        let (app, state, _dir) = create_test_app().await;
        finish(&state.service, TaskStatus::Completed, "done").await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/cleanup?minutes={}", u64::MAX))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let recent = state.service.queue().get_recent_tasks(1).await.unwrap();
        assert!(recent[0].payload_ref.is_some());
    }

    #[tokio::test]
    async fn test_workers_endpoint() {
        let (app, _state, _dir) = create_test_app().await;

        let body = body_json(send(&app, get("/api/workers")).await).await;
        let workers = body.as_array().unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0]["device"], "cpu");
    }

    #[tokio::test]
    async fn test_health_and_liveness() {
        let (app, _state, _dir) = create_test_app().await;

        let response = send(&app, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["workers"], 1);

        let response = send(&app, get("/livez")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }


    use super::*;
    use crate::payload::FilePayloadStore;
    use crate::store::SqliteTaskStore;
    use asrq_config::PriorityOrder;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct EchoExecutor;

    #[async_trait]
    impl Executor for EchoExecutor {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, request: &ExecutionRequest) -> Result<String, QueueError> {
            let bytes = tokio::fs::read(&request.payload)
                .await
                .map_err(|e| QueueError::ExecutionFailed(e.to_string()))?;
            Ok(format!(
                "{}:{}",
                request.device,
                String::from_utf8_lossy(&bytes)
            ))
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl Executor for FailingExecutor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn execute(&self, _request: &ExecutionRequest) -> Result<String, QueueError> {
            Err(QueueError::ExecutionFailed("model crashed".to_string()))
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl Executor for PanickingExecutor {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn execute(&self, _request: &ExecutionRequest) -> Result<String, QueueError> {
            panic!("decoder blew up");
        }
    }

    struct SlowExecutor(Duration);

    #[async_trait]
    impl Executor for SlowExecutor {
        fn name(&self) -> &str {
            "slow"
        }

        async fn execute(&self, _request: &ExecutionRequest) -> Result<String, QueueError> {
            tokio::time::sleep(self.0).await;
            Ok("slow transcript".to_string())
        }
    }

    async fn setup() -> (Arc<TaskQueue>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
        let payloads = Arc::new(FilePayloadStore::new(dir.path().join("audio")).await.unwrap());
        let queue = TaskQueue::open(store, payloads, PriorityOrder::LowestFirst)
            .await
            .unwrap();
        (Arc::new(queue), dir)
    }

    async fn push_audio(queue: &TaskQueue, content: &str) -> Task {
        let payload_ref = queue.payloads().save(content.as_bytes(), "wav").await.unwrap();
        queue.push(payload_ref, 1).await.unwrap()
    }

    fn worker(queue: &Arc<TaskQueue>, executor: Arc<dyn Executor>) -> Worker {
        Worker::new(1, "cpu", queue.clone(), executor, Duration::from_millis(20))
    }

    async fn wait_until_finished(queue: &TaskQueue, ids: &[String]) {
        for _ in 0..200 {
            let mut done = true;
            for id in ids {
                let task = queue.get_task(id).await.unwrap().unwrap();
                if !task.is_terminal() {
                    done = false;
                }
            }
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("tasks did not finish in time");
    }

    #[tokio::test]
    async fn test_worker_new() {
        let (queue, _dir) = setup().await;
        let worker = worker(&queue, Arc::new(EchoExecutor));
        assert_eq!(worker.id(), 1);
        assert_eq!(worker.device(), "cpu");
        assert!(!worker.is_busy());
        assert_eq!(worker.tasks_completed(), 0);
    }

    #[tokio::test]
    async fn test_process_success() {
        let (queue, _dir) = setup().await;
        push_audio(&queue, "hello").await;
        let worker = worker(&queue, Arc::new(EchoExecutor));

        let task = queue.pop().await.unwrap().unwrap();
        let done = worker.process(task).await.unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("cpu:hello"));
        assert!(done.processing_time.is_some());
        assert_eq!(worker.tasks_completed(), 1);
        assert_eq!(worker.tasks_failed(), 0);
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_process_executor_error() {
        let (queue, _dir) = setup().await;
        push_audio(&queue, "hello").await;
        let worker = worker(&queue, Arc::new(FailingExecutor));

        let task = queue.pop().await.unwrap().unwrap();
        let done = worker.process(task).await.unwrap();

        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.result.unwrap().contains("model crashed"));
        assert_eq!(worker.tasks_failed(), 1);
    }

    #[tokio::test]
    async fn test_process_missing_payload() {
        let (queue, _dir) = setup().await;
        let task = push_audio(&queue, "hello").await;
        let payload_ref = task.payload_ref.clone().unwrap();
        queue.payloads().remove(&payload_ref).await.unwrap();

        let worker = worker(&queue, Arc::new(EchoExecutor));
        let task = queue.pop().await.unwrap().unwrap();
        let done = worker.process(task).await.unwrap();

        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.result.unwrap().starts_with("payload missing"));
    }

    #[tokio::test]
    async fn test_process_cleared_payload_ref() {
        let (queue, _dir) = setup().await;
        push_audio(&queue, "hello").await;
        let worker = worker(&queue, Arc::new(EchoExecutor));

        let mut task = queue.pop().await.unwrap().unwrap();
        task.payload_ref = None;
        let done = worker.process(task).await.unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_process_executor_panic() {
        let (queue, _dir) = setup().await;
        push_audio(&queue, "hello").await;
        let worker = worker(&queue, Arc::new(PanickingExecutor));

        let task = queue.pop().await.unwrap().unwrap();
        let done = worker.process(task).await.unwrap();

        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.result.unwrap().contains("panicked"));
        assert_eq!(worker.tasks_failed(), 1);
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_process_unrecorded_outcome_not_counted() {
        let (queue, _dir) = setup().await;
        push_audio(&queue, "hello").await;
        let worker = worker(&queue, Arc::new(EchoExecutor));

        let mut task = queue.pop().await.unwrap().unwrap();
        task.id = "gone".to_string();
        let err = worker.process(task).await.unwrap_err();

        assert!(matches!(err, QueueError::TaskNotFound(_)));
        assert_eq!(worker.tasks_completed(), 0);
        assert_eq!(worker.tasks_failed(), 0);
        assert!(!worker.is_busy());

        push_audio(&queue, "again").await;
        let mut task = queue.pop().await.unwrap().unwrap();
        task.id = "also-gone".to_string();
        task.payload_ref = None;
        let err = worker.process(task).await.unwrap_err();

        assert!(matches!(err, QueueError::TaskNotFound(_)));
        assert_eq!(worker.tasks_failed(), 0);
    }

    #[tokio::test]
    async fn test_pool_drains_queue() {
        let (queue, _dir) = setup().await;
        let config = WorkersConfig {
            devices: vec!["cuda:0".to_string(), "cuda:1".to_string()],
            poll_interval_ms: 20,
        };
        let pool = WorkerPool::new(
            queue.clone(),
            Arc::new(EchoExecutor),
            &config,
            CancellationToken::new(),
        );
        assert_eq!(pool.size(), 2);
        pool.start().await;

        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(push_audio(&queue, &format!("clip{}", i)).await.id);
        }

        wait_until_finished(&queue, &ids).await;
        pool.shutdown().await;

        for id in &ids {
            let task = queue.get_task(id).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
            assert!(task.result.unwrap().starts_with("cuda:"));
        }
        assert_eq!(pool.total_processed(), 6);
        assert_eq!(queue.size().await, 0);

        let stats = pool.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.iter().map(|s| s.tasks_completed).sum::<u64>(), 6);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_task() {
        let (queue, _dir) = setup().await;
        let config = WorkersConfig {
            devices: vec!["cpu".to_string()],
            poll_interval_ms: 20,
        };
        let pool = WorkerPool::new(
            queue.clone(),
            Arc::new(SlowExecutor(Duration::from_millis(300))),
            &config,
            CancellationToken::new(),
        );
        pool.start().await;

        let task = push_audio(&queue, "long").await;
        for _ in 0..100 {
            if pool.workers()[0].is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(pool.workers()[0].is_busy());

        pool.shutdown().await;

        let done = queue.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("slow transcript"));
    }

    #[tokio::test]
    async fn test_stopped_pool_takes_no_new_work() {
        let (queue, _dir) = setup().await;
        let parent = CancellationToken::new();
        let pool = WorkerPool::new(
            queue.clone(),
            Arc::new(EchoExecutor),
            &WorkersConfig {
                devices: vec!["cpu".to_string()],
                poll_interval_ms: 20,
            },
            parent.clone(),
        );
        pool.start().await;

        parent.cancel();
        pool.shutdown().await;

        let task = push_audio(&queue, "late").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stored = queue.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(queue.size().await, 1);
    }

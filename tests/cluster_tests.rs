mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use quartzite::cluster::ClusterNode;
use quartzite::config::ClusterConfig;
use quartzite::grpc::ClusterRpcServer;
use quartzite::QuartziteError;

use support::{counting_registry, interval_job, new_scheduler};

fn cluster_config(endpoint: &str, endpoint_main: &str, queue: &str) -> ClusterConfig {
    ClusterConfig {
        endpoint: endpoint.to_string(),
        endpoint_main: endpoint_main.to_string(),
        queue: queue.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_stamps_health_and_times() {
    let main = ClusterNode::new(cluster_config("127.0.0.1:46460", "", "main-q"));
    let worker = ClusterNode::new(cluster_config("127.0.0.1:46461", "127.0.0.1:46460", "worker-q"));

    let before = chrono::Utc::now();
    let record = main.register_node(worker.self_record()).await;

    assert!(record.health);
    assert!(record.register_time >= before - chrono::Duration::seconds(1));
    assert_eq!(record.endpoint, "127.0.0.1:46461");
    assert_eq!(record.queue, "worker-q");

    let peers = main.peer_records().await;
    assert_eq!(peers.len(), 1);
}

#[tokio::test]
async fn test_ping_refreshes_known_and_registers_unknown() {
    let main = ClusterNode::new(cluster_config("127.0.0.1:46462", "", "main-q"));
    let worker = ClusterNode::new(cluster_config("127.0.0.1:46463", "127.0.0.1:46462", "worker-q"));

    // Unknown endpoint: the ping registers it on the spot.
    let record = main.ping_node(worker.self_record()).await;
    assert!(record.health);
    assert_eq!(main.peer_records().await.len(), 1);

    let refreshed = main.ping_node(worker.self_record()).await;
    assert!(refreshed.last_heartbeat_time >= record.last_heartbeat_time);
}

#[tokio::test]
async fn test_choice_node_filters_by_queue_and_round_robins() {
    let main = ClusterNode::new(cluster_config("127.0.0.1:46464", "", "main-q"));
    let w1 = ClusterNode::new(cluster_config("127.0.0.1:46465", "127.0.0.1:46464", "worker-q"));
    let w2 = ClusterNode::new(cluster_config("127.0.0.1:46466", "127.0.0.1:46464", "worker-q"));

    main.register_node(main.self_record()).await;
    main.register_node(w1.self_record()).await;
    main.register_node(w2.self_record()).await;

    let queues = vec!["worker-q".to_string()];
    let first = main.choice_node(&queues).await.unwrap();
    let second = main.choice_node(&queues).await.unwrap();
    let third = main.choice_node(&queues).await.unwrap();

    // Only the two workers are eligible, visited alternately.
    assert_ne!(first.endpoint, second.endpoint);
    assert_eq!(first.endpoint, third.endpoint);
    assert!(first.queue == "worker-q" && second.queue == "worker-q");

    // An empty filter matches any queue, the main included.
    assert!(main.choice_node(&[]).await.is_ok());
}

#[tokio::test]
async fn test_choice_node_without_match_errors() {
    let main = ClusterNode::new(cluster_config("127.0.0.1:46467", "", "main-q"));
    main.register_node(main.self_record()).await;

    let err = main
        .choice_node(&["no-such-queue".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, QuartziteError::NoEligibleNode(_)));
}

#[tokio::test]
async fn test_silent_worker_is_marked_unhealthy() {
    let mut config = cluster_config("127.0.0.1:46468", "", "main-q");
    config.heartbeat_interval_ms = 50;

    let main = Arc::new(ClusterNode::new(config));
    main.init().await;

    let worker = ClusterNode::new(cluster_config("127.0.0.1:46469", "127.0.0.1:46468", "worker-q"));
    main.register_node(worker.self_record()).await;

    // Three missed heartbeat periods flip the worker to unhealthy.
    tokio::time::sleep(Duration::from_millis(400)).await;

    let err = main
        .choice_node(&["worker-q".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, QuartziteError::NoEligibleNode(_)));

    // The main itself never expires.
    assert!(main.choice_node(&[]).await.is_ok());
}

#[tokio::test]
async fn test_is_main_node_role() {
    let main = ClusterNode::new(cluster_config("127.0.0.1:46470", "", "main-q"));
    let worker = ClusterNode::new(cluster_config("127.0.0.1:46471", "127.0.0.1:46470", "worker-q"));

    assert!(main.is_main_node());
    assert!(!worker.is_main_node());
}

/// Scenario: a job tagged with the worker's queue fires on the worker
/// process, not on the main that dispatched it.
#[tokio::test]
async fn test_dispatch_runs_job_on_matching_worker() {
    let main_endpoint = "127.0.0.1:46480";
    let worker_endpoint = "127.0.0.1:46481";

    // Worker: its own registry/counter and a cluster RPC surface.
    let (worker_registry, worker_count) = counting_registry();
    let worker_scheduler = new_scheduler(worker_registry).await;
    let worker_node = Arc::new(ClusterNode::new(cluster_config(
        worker_endpoint,
        main_endpoint,
        "worker-q",
    )));
    worker_scheduler.bind_cluster_node(worker_node.clone());

    let shutdown = CancellationToken::new();
    let server = ClusterRpcServer::new(
        worker_endpoint.parse().unwrap(),
        worker_scheduler.clone(),
        worker_node.clone(),
    );
    let server_token = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(server_token).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Main: knows about itself and the worker.
    let (main_registry, main_count) = counting_registry();
    let main_scheduler = new_scheduler(main_registry).await;
    let main_node = Arc::new(ClusterNode::new(cluster_config(
        main_endpoint,
        "",
        "main-q",
    )));
    main_node.register_node(main_node.self_record()).await;
    main_node.register_node(worker_node.self_record()).await;
    main_scheduler.bind_cluster_node(main_node);

    let mut job = interval_job("1h");
    job.id = quartzite::Job::new_id();
    job.queues = vec!["worker-q".to_string()];
    main_scheduler.schedule_job(job).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(worker_count.load(Ordering::SeqCst), 1);
    assert_eq!(main_count.load(Ordering::SeqCst), 0);

    shutdown.cancel();
}

/// A queue that matches no peer but does match this node falls back to a
/// local fire; one that matches nothing at all is an error.
#[tokio::test]
async fn test_dispatch_falls_back_to_self_on_own_queue() {
    let (registry, count) = counting_registry();
    let scheduler = new_scheduler(registry).await;

    let node = Arc::new(ClusterNode::new(cluster_config(
        "127.0.0.1:46482",
        "",
        "main-q",
    )));
    node.register_node(node.self_record()).await;
    scheduler.bind_cluster_node(node);

    let mut job = interval_job("1h");
    job.id = quartzite::Job::new_id();
    job.queues = vec!["main-q".to_string()];
    scheduler.schedule_job(job.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    job.queues = vec!["elsewhere".to_string()];
    let err = scheduler.schedule_job(job).await.unwrap_err();
    assert!(matches!(err, QuartziteError::NoEligibleNode(_)));
}

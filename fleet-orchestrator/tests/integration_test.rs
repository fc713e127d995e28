//! Integration tests for the provisioning saga.
//!
//! Collaborators are the scriptable doubles from `test_utils` plus a real
//! route manager over a temp-dir config file with a mock daemon, so the
//! saga exercises the same validate/swap/reload pipeline production uses.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use fleet_agent::AgentAddr;
use fleet_monitor::{FleetMonitor, MonitorConfig};
use fleet_orchestrator::test_utils::{MemoryMetadataStore, MockContainerApi};
use fleet_orchestrator::{
    CreateWorkspaceRequest, OrchestratorError, ProvisioningOrchestrator, ProvisioningState,
    RouteStatus, StepOutcome,
};
use fleet_ports::{PortAllocator, RangePolicy};
use fleet_proxy::mock::MockDaemon;
use fleet_proxy::{default_kinds, RouteManager};

struct Harness {
    _dir: tempfile::TempDir,
    api: Arc<MockContainerApi>,
    store: Arc<MemoryMetadataStore>,
    daemon: Arc<MockDaemon>,
    orchestrator: ProvisioningOrchestrator,
    agent: AgentAddr,
}

fn harness(api: MockContainerApi, daemon: MockDaemon) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = Arc::new(api);
    let store = Arc::new(MemoryMetadataStore::new());
    let daemon = Arc::new(daemon);

    let routes = RouteManager::new(
        dir.path().join("fleet-routes.conf"),
        default_kinds(),
        Arc::clone(&daemon) as Arc<dyn fleet_proxy::ProxyDaemon>,
    )
    .expect("route manager");

    let allocator = PortAllocator::with_policy(
        dir.path().join("port-allocations.json"),
        RangePolicy {
            min_port: 20000,
            max_port: 20099,
            default_range_size: 10,
        },
    )
    .expect("allocator");

    let monitor = FleetMonitor::new(MonitorConfig::default());
    let agent = AgentAddr::new("10.0.0.7", 8585);

    let orchestrator = ProvisioningOrchestrator::new(
        Arc::clone(&api) as Arc<dyn fleet_orchestrator::ContainerApi>,
        Arc::clone(&store) as Arc<dyn fleet_orchestrator::MetadataStore>,
        routes,
        allocator,
        monitor,
        default_kinds(),
        vec![agent.clone()],
    )
    .expect("orchestrator");

    Harness {
        _dir: dir,
        api,
        store,
        daemon,
        orchestrator,
        agent,
    }
}

fn request(h: &Harness, user: &str) -> CreateWorkspaceRequest {
    CreateWorkspaceRequest {
        user_id: user.to_string(),
        agent: h.agent.clone(),
        cpus: Some(2.0),
        memory_mb: Some(4096),
        gpu: false,
    }
}

#[tokio::test]
async fn test_provision_happy_path_with_agent_port_map() {
    let mut map = HashMap::new();
    map.insert("code".to_string(), 31000);
    map.insert("notebook".to_string(), 31008);
    let h = harness(MockContainerApi::with_port_map(map), MockDaemon::new());

    let outcome = h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    assert!(outcome.fully_active());
    assert_eq!(outcome.container, StepOutcome::Succeeded);
    assert_eq!(outcome.routes, StepOutcome::Succeeded);
    assert_eq!(outcome.workspace.ports["code"], 31000);
    assert_eq!(outcome.workspace.ports["notebook"], 31008);
    assert_eq!(outcome.workspace.route_status, RouteStatus::Active);

    // The agent supplied the ports, so the allocator was never touched.
    let persisted = h.orchestrator.get_workspace("alice").await.unwrap();
    assert_eq!(persisted.state, ProvisioningState::Active);
    assert_eq!(h.daemon.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provision_falls_back_to_allocator_without_port_map() {
    let h = harness(MockContainerApi::new(), MockDaemon::new());

    let outcome = h.orchestrator.provision(request(&h, "bob")).await.unwrap();

    assert!(outcome.fully_active());
    // First block in a 20000-based window; kind offsets 0 and 8.
    assert_eq!(outcome.workspace.ports["code"], 20000);
    assert_eq!(outcome.workspace.ports["notebook"], 20008);
}

#[tokio::test]
async fn test_container_failure_is_terminal_and_skips_routes() {
    let api = MockContainerApi::new();
    api.fail_create.store(true, Ordering::SeqCst);
    let h = harness(api, MockDaemon::new());

    let outcome = h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    assert!(matches!(outcome.container, StepOutcome::Failed(_)));
    assert!(matches!(outcome.routes, StepOutcome::Skipped(_)));
    assert_eq!(outcome.workspace.state, ProvisioningState::ContainerFailed);
    assert!(outcome.workspace.error_message.is_some());

    // No route mutation was ever attempted.
    assert_eq!(h.daemon.checks.load(Ordering::SeqCst), 0);

    let persisted = h.store.records.lock().unwrap()["alice"].clone();
    assert_eq!(persisted.state, ProvisioningState::ContainerFailed);
}

#[tokio::test]
async fn test_route_failure_leaves_container_running_and_degraded() {
    let h = harness(MockContainerApi::new(), MockDaemon::failing_check());

    let outcome = h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    assert_eq!(outcome.container, StepOutcome::Succeeded);
    assert!(matches!(outcome.routes, StepOutcome::Failed(_)));
    assert_eq!(outcome.workspace.state, ProvisioningState::Degraded);
    assert_eq!(outcome.workspace.route_status, RouteStatus::Degraded);
    assert_eq!(outcome.workspace.container_status.as_deref(), Some("running"));

    // The container is deliberately left in place, not compensated away.
    assert!(h.api.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_deprovision_after_degraded_still_removes_container() {
    let h = harness(MockContainerApi::new(), MockDaemon::failing_check());
    h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    // Let teardown route traffic through the daemon again.
    h.daemon.fail_check.store(false, Ordering::SeqCst);

    let report = h.orchestrator.deprovision("alice").await.unwrap();

    assert!(report.fully_succeeded());
    // No route ever existed; removal is an idempotent no-op success.
    assert_eq!(report.routes, StepOutcome::Succeeded);
    assert_eq!(report.container, StepOutcome::Succeeded);
    assert_eq!(
        h.api.deleted.lock().unwrap().as_slice(),
        ["ws-alice".to_string()]
    );
    assert!(h.store.records.lock().unwrap().get("alice").is_none());
}

#[tokio::test]
async fn test_deprovision_reports_steps_independently() {
    let h = harness(MockContainerApi::new(), MockDaemon::new());
    h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    // Container vanished out from under us; the rest still proceeds.
    h.api.delete_not_found.store(true, Ordering::SeqCst);

    let report = h.orchestrator.deprovision("alice").await.unwrap();

    assert!(matches!(report.container, StepOutcome::Skipped(_)));
    assert_eq!(report.routes, StepOutcome::Succeeded);
    assert_eq!(report.ports, StepOutcome::Succeeded);
    assert_eq!(report.metadata, StepOutcome::Succeeded);
    assert!(report.fully_succeeded());
}

#[tokio::test]
async fn test_deprovision_failure_in_one_step_does_not_block_others() {
    let h = harness(MockContainerApi::new(), MockDaemon::new());
    h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    h.api.fail_delete.store(true, Ordering::SeqCst);

    let report = h.orchestrator.deprovision("alice").await.unwrap();

    assert!(matches!(report.container, StepOutcome::Failed(_)));
    assert!(!report.fully_succeeded());
    // Routes, ports, and metadata were all still attempted and released.
    assert_eq!(report.routes, StepOutcome::Succeeded);
    assert_eq!(report.ports, StepOutcome::Succeeded);
    assert_eq!(report.metadata, StepOutcome::Succeeded);
}

#[tokio::test]
async fn test_deprovision_unknown_user() {
    let h = harness(MockContainerApi::new(), MockDaemon::new());

    let err = h.orchestrator.deprovision("ghost").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn test_provision_records_audit_events() {
    let h = harness(MockContainerApi::new(), MockDaemon::new());
    h.orchestrator.provision(request(&h, "alice")).await.unwrap();

    let events = h.store.events.lock().unwrap().clone();
    let details: Vec<&str> = events.iter().map(|(_, _, d)| d.as_str()).collect();
    assert!(details.contains(&"requested"));
    assert!(details.contains(&"container_ready"));
    assert!(details.contains(&"active"));
}

#[tokio::test]
async fn test_invalid_user_id_rejected_before_any_step() {
    let h = harness(MockContainerApi::new(), MockDaemon::new());

    let mut req = request(&h, "alice");
    req.user_id = "Alice; rm".to_string();

    assert!(h.orchestrator.provision(req).await.is_err());
    assert!(h.api.created.lock().unwrap().is_empty());
    assert!(h.store.records.lock().unwrap().is_empty());
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Engine Boundary Tests
//!
//! Drives plans through the logging engine and a custom engine to check wave
//! dispatch, failure propagation and deferred value recording.

use anyhow::Result;
use async_trait::async_trait;
use cim_network_topology::domain::{AttributeRef, Instance, Network, Output, SecurityGroup, Subnet};
use cim_network_topology::state_machine::BindingState;
use cim_network_topology::{
    apply_plan, compile, topology::reference, ApplyOutcome, BindingTable, EngineFailure,
    LoggingEngine, Operation, Plan, PlanConfig, ProvisioningEngine, TopologyError, TopologyModel,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn jump_host_plan() -> Result<Plan> {
    let mut model = TopologyModel::new();
    model
        .declare("A", Network::new("10.10.1.0/24")?)?
        .declare("SubnetA", Subnet::new("A", "10.10.1.128/26", "eu-west-1a")?.public())?
        .declare("sg", SecurityGroup::new("A", "ssh"))?
        .declare(
            "Instance",
            Instance::new("SubnetA", "ami-0d64bb532e0502c46", "t2.micro").with_security_group("sg"),
        )?
        .declare("PublicIp", Output::new(AttributeRef::new("Instance", "public_ip")))?;
    Ok(compile(&model, &PlanConfig::default())?)
}

#[tokio::test]
async fn test_apply_resolves_deferred_values() -> Result<()> {
    let plan = jump_host_plan()?;
    let mut bindings = BindingTable::from_plan(&plan);
    let engine = LoggingEngine::new()
        .with_value("Instance.public_ip", "203.0.113.5")
        .with_value("Instance.private_ip", "10.10.1.140");

    let report = apply_plan(&plan, &engine, &mut bindings).await;

    assert!(report.is_success());
    assert_eq!(report.succeeded, vec!["A", "SubnetA", "sg", "Instance"]);
    assert_eq!(engine.dispatched().await, vec!["A", "SubnetA", "sg", "Instance"]);
    assert_eq!(bindings.read_output("PublicIp")?, "203.0.113.5");
    assert_eq!(bindings.read("Instance.private_ip")?, "10.10.1.140");
    assert!(bindings.pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreported_values_stay_pending() -> Result<()> {
    let plan = jump_host_plan()?;
    let mut bindings = BindingTable::from_plan(&plan);

    let report = apply_plan(&plan, &LoggingEngine::new(), &mut bindings).await;

    assert!(report.is_success());
    assert_eq!(bindings.pending(), vec!["Instance.public_ip", "Instance.private_ip"]);
    assert!(matches!(
        bindings.read_output("PublicIp"),
        Err(TopologyError::UnresolvedAtRead { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_failure_skips_dependents() -> Result<()> {
    let plan = jump_host_plan()?;
    let mut bindings = BindingTable::from_plan(&plan);
    let engine = LoggingEngine::new()
        .failing("SubnetA")
        .with_value("Instance.public_ip", "203.0.113.5");

    let report = apply_plan(&plan, &engine, &mut bindings).await;

    assert!(!report.is_success());
    assert_eq!(report.succeeded, vec!["A", "sg"]);
    assert_eq!(report.failed, vec![EngineFailure::new("SubnetA", "configured to fail")]);
    assert_eq!(report.skipped, vec!["Instance"]);
    assert_eq!(
        report.errors,
        vec![TopologyError::DependencyFailed {
            entity: "Instance".to_string(),
            failed: "SubnetA".to_string(),
        }]
    );

    assert_eq!(engine.dispatched().await, vec!["A", "SubnetA", "sg"]);
    assert_eq!(bindings.state("Instance.public_ip"), Some(BindingState::Failed));
    assert!(matches!(
        bindings.read_output("PublicIp"),
        Err(TopologyError::DependencyFailed { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_retry_reruns_failed_operation_and_dependents() -> Result<()> {
    let plan = jump_host_plan()?;
    let mut bindings = BindingTable::from_plan(&plan);

    let flaky = LoggingEngine::new().failing("SubnetA");
    apply_plan(&plan, &flaky, &mut bindings).await;

    let retry = plan.retry_from("SubnetA").expect("SubnetA is in the plan");
    assert_eq!(retry.entities(), vec!["SubnetA", "Instance"]);
    bindings.prepare_retry(&retry);

    let engine = LoggingEngine::new().with_value("Instance.public_ip", "203.0.113.5");
    let report = apply_plan(&retry, &engine, &mut bindings).await;

    assert!(report.is_success());
    assert_eq!(engine.dispatched().await, vec!["SubnetA", "Instance"]);
    assert_eq!(bindings.read_output("PublicIp")?, "203.0.113.5");
    Ok(())
}

/// Engine that counts how many operations run at once
#[derive(Default)]
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    order: Mutex<Vec<String>>,
}

#[async_trait]
impl ProvisioningEngine for ConcurrencyProbe {
    async fn apply(&self, operation: &Operation) -> Result<ApplyOutcome, EngineFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.order
            .lock()
            .map_err(|e| EngineFailure::new(&operation.entity, e.to_string()))?
            .push(operation.entity.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ApplyOutcome::new())
    }
}

#[tokio::test]
async fn test_waves_dispatch_concurrently() -> Result<()> {
    let plan = compile(&reference::bastion_production()?, &PlanConfig::default())?;
    let mut bindings = BindingTable::from_plan(&plan);
    let probe = ConcurrencyProbe::default();

    let report = apply_plan(&plan, &probe, &mut bindings).await;

    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), plan.len());
    assert!(probe.peak.load(Ordering::SeqCst) > 1);

    // Every operation ran after the operations it depends on
    let order = probe.order.lock().expect("probe lock").clone();
    for op in &plan.operations {
        let at = order.iter().position(|e| *e == op.entity);
        for dep in &op.depends_on {
            assert!(order.iter().position(|e| e == dep) < at);
        }
    }
    Ok(())
}

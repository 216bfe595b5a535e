// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Engine Boundary
//!
//! The core never provisions anything itself. [`apply_plan`] hands each
//! operation to a [`ProvisioningEngine`] and feeds the reported values back
//! into the [`BindingTable`].
//!
//! # Architecture
//!
//! ```text
//! Plan.levels()          Engine               BindingTable
//! ─────────────         ────────             ─────────────
//!  wave 0  ──join_all──▶ apply(op) ──values──▶ resolve(key)
//!  wave 1  ──join_all──▶ apply(op) ──failure─▶ mark_failed(entity)
//!  ...
//! ```
//!
//! Operations in one wave are dispatched concurrently. An operation whose
//! dependency failed is skipped, never dispatched.

use async_trait::async_trait;
use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::bindings::BindingTable;
use super::operation::{Operation, Plan};
use crate::errors::TopologyError;

/// Values an engine reports for one applied operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Deferred attribute name → value
    pub values: IndexMap<String, Value>,
}

impl ApplyOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }
}

/// Failure reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Engine failed on {entity}: {reason}")]
pub struct EngineFailure {
    pub entity: String,
    pub reason: String,
}

impl EngineFailure {
    pub fn new(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

/// External engine that performs operations against real infrastructure
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Apply one operation
    ///
    /// Returns the values of the deferred attributes the operation promised.
    async fn apply(&self, operation: &Operation) -> Result<ApplyOutcome, EngineFailure>;
}

/// Result of driving a plan through an engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<EngineFailure>,
    /// Not dispatched because a dependency failed
    pub skipped: Vec<String>,
    /// Binding errors raised while recording results
    pub errors: Vec<TopologyError>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.errors.is_empty()
    }
}

/// Drive `plan` through `engine`, one wave at a time
pub async fn apply_plan<E>(plan: &Plan, engine: &E, bindings: &mut BindingTable) -> ApplyReport
where
    E: ProvisioningEngine + ?Sized,
{
    let mut report = ApplyReport::default();

    for (level, wave) in plan.levels().into_iter().enumerate() {
        let (runnable, blocked): (Vec<&Operation>, Vec<&Operation>) =
            wave.into_iter().partition(|op| !bindings.is_failed(&op.entity));

        for op in blocked {
            debug!("Skipping {}: dependency {:?} failed", op.entity, bindings.failure_of(&op.entity));
            report.skipped.push(op.entity.clone());
        }

        debug!("Dispatching wave {} with {} operation(s)", level, runnable.len());
        let results = join_all(runnable.iter().map(|op| engine.apply(op))).await;

        for (op, result) in runnable.into_iter().zip(results) {
            match result {
                Ok(outcome) => {
                    record_outcome(op, &outcome, bindings, &mut report);
                    report.succeeded.push(op.entity.clone());
                }
                Err(failure) => {
                    warn!("{}", failure);
                    match bindings.mark_failed(&op.entity) {
                        Ok(errors) => report.errors.extend(errors),
                        Err(e) => report.errors.push(e),
                    }
                    report.failed.push(failure);
                }
            }
        }
    }

    info!(
        "Applied plan {}: {} succeeded, {} failed, {} skipped",
        plan.plan_id,
        report.succeeded.len(),
        report.failed.len(),
        report.skipped.len()
    );
    report
}

fn record_outcome(
    op: &Operation,
    outcome: &ApplyOutcome,
    bindings: &mut BindingTable,
    report: &mut ApplyReport,
) {
    for reference in op.deferred_refs() {
        let key = reference.key();
        if bindings.is_resolved(&key) {
            continue;
        }
        match outcome.values.get(&reference.attribute) {
            Some(value) => {
                if let Err(e) = bindings.resolve(&key, value.clone()) {
                    report.errors.push(e);
                }
            }
            None => debug!("{} left pending by the engine", key),
        }
    }
}

/// Engine that records dispatched operations without touching infrastructure
///
/// Useful for dry runs and tests: entities can be told to fail, and deferred
/// keys can be given fixed values.
#[derive(Debug, Default)]
pub struct LoggingEngine {
    dispatched: Mutex<Vec<String>>,
    failing: BTreeSet<String>,
    values: IndexMap<String, Value>,
}

impl LoggingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation on `entity`
    pub fn failing(mut self, entity: impl Into<String>) -> Self {
        self.failing.insert(entity.into());
        self
    }

    /// Report `value` for deferred key `key`
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Entities in dispatch order
    pub async fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().await.clone()
    }
}

#[async_trait]
impl ProvisioningEngine for LoggingEngine {
    async fn apply(&self, operation: &Operation) -> Result<ApplyOutcome, EngineFailure> {
        info!("{} {}", operation.kind, operation.address);
        self.dispatched.lock().await.push(operation.entity.clone());

        if self.failing.contains(&operation.entity) {
            return Err(EngineFailure::new(&operation.entity, "configured to fail"));
        }

        let mut outcome = ApplyOutcome::new();
        for reference in operation.deferred_refs() {
            if let Some(value) = self.values.get(&reference.key()) {
                outcome = outcome.with_value(reference.attribute, value.clone());
            }
        }
        Ok(outcome)
    }
}

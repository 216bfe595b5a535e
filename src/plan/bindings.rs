// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Attribute Binding Table
//!
//! Holds every deferred key a plan promises plus the plan's outputs. The
//! provisioning engine reports values through [`BindingTable::resolve`];
//! callers read outputs through [`BindingTable::read_output`].
//!
//! ```text
//! Pending ──resolve──▶ Resolved
//!    │
//!    └──mark_failed──▶ Failed ──prepare_retry──▶ Pending
//! ```
//!
//! A key is written at most once. Keys already resolved stay resolved when an
//! upstream entity is marked failed later.

use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::operation::{AttributeValue, Plan};
use crate::domain::AttributeRef;
use crate::errors::{TopologyError, TopologyResult};
use crate::state_machine::{BindingEvent, BindingState, StateMachineWithHistory, Transition};

/// One deferred key and its lifecycle
#[derive(Debug, Clone)]
pub struct DeferredBinding {
    pub key: String,
    pub entity: String,
    pub attribute: String,
    lifecycle: StateMachineWithHistory<BindingState>,
    value: Option<Value>,
}

impl DeferredBinding {
    fn new(reference: AttributeRef) -> Self {
        Self {
            key: reference.key(),
            entity: reference.entity,
            attribute: reference.attribute,
            lifecycle: StateMachineWithHistory::new(BindingState::Pending),
            value: None,
        }
    }

    pub fn state(&self) -> BindingState {
        *self.lifecycle.current_state()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn apply(&mut self, event: BindingEvent) -> bool {
        self.lifecycle
            .transition_with_history(event, Utc::now())
            .is_ok()
    }
}

#[derive(Debug, Clone)]
enum OutputSlot {
    /// Known at plan time
    Fixed(Value),
    /// Waits on a deferred key
    Deferred(String),
}

#[derive(Debug, Clone)]
struct OutputEntry {
    source: AttributeRef,
    slot: OutputSlot,
}

/// Binding table for one plan
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: IndexMap<String, DeferredBinding>,
    outputs: IndexMap<String, OutputEntry>,
    /// entity → entities whose operations depend on it, in plan order
    dependents: IndexMap<String, Vec<String>>,
    /// blocked entity → entity the engine marked failed
    failed: IndexMap<String, String>,
}

impl BindingTable {
    /// Pending bindings for every deferred key and output of `plan`
    pub fn from_plan(plan: &Plan) -> Self {
        let mut table = Self::default();

        for op in &plan.operations {
            table.dependents.entry(op.entity.clone()).or_default();
            for dep in &op.depends_on {
                table
                    .dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(op.entity.clone());
            }
            for reference in op.deferred_refs() {
                let binding = DeferredBinding::new(reference);
                table.bindings.insert(binding.key.clone(), binding);
            }
        }

        for output in &plan.outputs {
            let slot = match &output.value {
                AttributeValue::Deferred(key) => OutputSlot::Deferred(key.clone()),
                other => other
                    .to_json()
                    .map(OutputSlot::Fixed)
                    .unwrap_or_else(|| OutputSlot::Deferred(output.source.key())),
            };
            table.outputs.insert(
                output.name.clone(),
                OutputEntry {
                    source: output.source.clone(),
                    slot,
                },
            );
        }

        debug!(
            "Binding table: {} deferred keys, {} outputs",
            table.bindings.len(),
            table.outputs.len()
        );
        table
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, key: &str) -> Option<&DeferredBinding> {
        self.bindings.get(key)
    }

    pub fn state(&self, key: &str) -> Option<BindingState> {
        self.bindings.get(key).map(DeferredBinding::state)
    }

    pub fn is_resolved(&self, key: &str) -> bool {
        self.state(key) == Some(BindingState::Resolved)
    }

    /// Keys still waiting on the engine, in plan order
    pub fn pending(&self) -> Vec<&str> {
        self.bindings
            .values()
            .filter(|b| b.state() == BindingState::Pending)
            .map(|b| b.key.as_str())
            .collect()
    }

    pub fn history(&self, key: &str) -> Option<&[Transition<BindingState, BindingEvent>]> {
        self.bindings.get(key).map(|b| b.lifecycle.history())
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.keys().map(String::as_str).collect()
    }

    pub fn is_failed(&self, entity: &str) -> bool {
        self.failed.contains_key(entity)
    }

    /// Entity whose failure blocked `entity`
    pub fn failure_of(&self, entity: &str) -> Option<&str> {
        self.failed.get(entity).map(String::as_str)
    }

    /// Record the engine-supplied value of a deferred key
    ///
    /// # Errors
    /// - `UnknownDeferred` if the plan never promised `key`
    /// - `AlreadyResolved` on a second write
    /// - `DependencyFailed` if the owning entity is blocked
    pub fn resolve(&mut self, key: &str, value: impl Into<Value>) -> TopologyResult<()> {
        let binding = self
            .bindings
            .get_mut(key)
            .ok_or_else(|| TopologyError::UnknownDeferred {
                name: key.to_string(),
            })?;

        match binding.state() {
            BindingState::Resolved => Err(TopologyError::AlreadyResolved {
                name: key.to_string(),
            }),
            BindingState::Failed => Err(TopologyError::DependencyFailed {
                entity: binding.entity.clone(),
                failed: self
                    .failed
                    .get(&binding.entity)
                    .cloned()
                    .unwrap_or_else(|| binding.entity.clone()),
            }),
            BindingState::Pending => {
                if !binding.apply(BindingEvent::Resolve) {
                    return Err(TopologyError::AlreadyResolved {
                        name: key.to_string(),
                    });
                }
                binding.value = Some(value.into());
                info!("Resolved {}", key);
                Ok(())
            }
        }
    }

    /// Read a resolved deferred key
    ///
    /// # Errors
    /// - `UnknownDeferred`, `UnresolvedAtRead` or `DependencyFailed`
    pub fn read(&self, key: &str) -> TopologyResult<&Value> {
        let binding = self
            .bindings
            .get(key)
            .ok_or_else(|| TopologyError::UnknownDeferred {
                name: key.to_string(),
            })?;

        match (binding.state(), binding.value()) {
            (BindingState::Resolved, Some(value)) => Ok(value),
            (BindingState::Failed, _) => Err(self.blocked(&binding.entity, &binding.entity)),
            _ => Err(TopologyError::UnresolvedAtRead {
                name: key.to_string(),
            }),
        }
    }

    /// Read a named output
    ///
    /// # Errors
    /// - `UnknownDeferred` if the plan has no such output
    /// - `UnresolvedAtRead` until the engine resolves the source
    /// - `DependencyFailed` if the source entity is blocked
    pub fn read_output(&self, name: &str) -> TopologyResult<&Value> {
        let entry = self
            .outputs
            .get(name)
            .ok_or_else(|| TopologyError::UnknownDeferred {
                name: name.to_string(),
            })?;

        match &entry.slot {
            OutputSlot::Fixed(_) if self.failed.contains_key(&entry.source.entity) => {
                Err(self.blocked(name, &entry.source.entity))
            }
            OutputSlot::Fixed(value) => Ok(value),
            // The key's own state decides: a value resolved before the failure stays readable
            OutputSlot::Deferred(key) => match self.read(key) {
                Err(TopologyError::UnresolvedAtRead { .. }) => Err(TopologyError::UnresolvedAtRead {
                    name: name.to_string(),
                }),
                Err(TopologyError::DependencyFailed { failed, .. }) => {
                    Err(TopologyError::DependencyFailed {
                        entity: name.to_string(),
                        failed,
                    })
                }
                other => other,
            },
        }
    }

    /// Record an engine failure of `entity`
    ///
    /// Blocks the pending keys of `entity` and of every operation depending
    /// on it, directly or not. Returns one `DependencyFailed` per blocked
    /// dependent, in plan order.
    ///
    /// # Errors
    /// - `UnknownReference` if the plan has no operation for `entity`
    pub fn mark_failed(&mut self, entity: &str) -> TopologyResult<Vec<TopologyError>> {
        if !self.dependents.contains_key(entity) {
            return Err(TopologyError::UnknownReference {
                from: "engine".to_string(),
                to: entity.to_string(),
            });
        }

        warn!("Engine marked {} failed", entity);
        self.block(entity, entity);

        let dependents = self.transitive_dependents(entity);
        let mut errors = Vec::with_capacity(dependents.len());
        for dependent in dependents {
            self.block(&dependent, entity);
            errors.push(TopologyError::DependencyFailed {
                entity: dependent,
                failed: entity.to_string(),
            });
        }

        if !errors.is_empty() {
            warn!("{} dependent(s) of {} blocked", errors.len(), entity);
        }
        Ok(errors)
    }

    /// Unblock every entity of a retry plan; returns the keys made pending again
    pub fn prepare_retry(&mut self, retry: &Plan) -> Vec<String> {
        let mut reset = Vec::new();
        for op in &retry.operations {
            self.failed.shift_remove(&op.entity);
            for binding in self.bindings.values_mut().filter(|b| b.entity == op.entity) {
                if binding.state() == BindingState::Failed && binding.apply(BindingEvent::Retry) {
                    reset.push(binding.key.clone());
                }
            }
        }
        debug!("Retry reset {} deferred key(s)", reset.len());
        reset
    }

    fn block(&mut self, entity: &str, root: &str) {
        self.failed
            .entry(entity.to_string())
            .or_insert_with(|| root.to_string());
        for binding in self.bindings.values_mut().filter(|b| b.entity == entity) {
            if binding.state() == BindingState::Pending {
                binding.apply(BindingEvent::Block);
            }
        }
    }

    fn blocked(&self, entity: &str, source: &str) -> TopologyError {
        TopologyError::DependencyFailed {
            entity: entity.to_string(),
            failed: self
                .failed
                .get(source)
                .cloned()
                .unwrap_or_else(|| source.to_string()),
        }
    }

    fn transitive_dependents(&self, entity: &str) -> Vec<String> {
        let mut reached = IndexSet::new();
        let mut stack = vec![entity.to_string()];
        while let Some(current) = stack.pop() {
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if dependent != entity && reached.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }
        self.dependents
            .keys()
            .filter(|name| reached.contains(*name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;
    use crate::plan::operation::{Operation, OperationKind, OutputBinding};
    use uuid::Uuid;

    fn op(entity: &str, kind: ResourceKind, depends_on: &[&str], deferred: &[&str]) -> Operation {
        Operation {
            sequence: 0,
            kind: OperationKind::Create,
            resource_kind: kind,
            entity: entity.to_string(),
            address: format!("{}.{}", kind, entity),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            resolved_attributes: IndexMap::new(),
            deferred_attributes: deferred.iter().map(|a| format!("{}.{}", entity, a)).collect(),
        }
    }

    fn plan() -> Plan {
        Plan {
            plan_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            provider: "aws".to_string(),
            region: "eu-west-1".to_string(),
            operations: vec![
                op("A", ResourceKind::Network, &[], &[]),
                op("SubnetA", ResourceKind::Subnet, &["A"], &[]),
                op("Instance", ResourceKind::Instance, &["SubnetA"], &["public_ip", "private_ip"]),
            ],
            outputs: vec![
                OutputBinding {
                    name: "PublicIp".to_string(),
                    source: AttributeRef::new("Instance", "public_ip"),
                    description: None,
                    value: AttributeValue::Deferred("Instance.public_ip".to_string()),
                },
                OutputBinding {
                    name: "SubnetId".to_string(),
                    source: AttributeRef::id_of("SubnetA"),
                    description: None,
                    value: AttributeValue::Address("subnet.SubnetA.id".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_resolve_then_read() {
        let mut table = BindingTable::from_plan(&plan());
        assert_eq!(table.pending(), vec!["Instance.public_ip", "Instance.private_ip"]);

        assert_eq!(
            table.read_output("PublicIp"),
            Err(TopologyError::UnresolvedAtRead {
                name: "PublicIp".to_string()
            })
        );

        table.resolve("Instance.public_ip", "203.0.113.5").unwrap();
        assert_eq!(table.read_output("PublicIp").unwrap(), "203.0.113.5");
        assert!(table.is_resolved("Instance.public_ip"));
        assert_eq!(table.history("Instance.public_ip").unwrap().len(), 1);

        assert_eq!(
            table.resolve("Instance.public_ip", "198.51.100.1"),
            Err(TopologyError::AlreadyResolved {
                name: "Instance.public_ip".to_string()
            })
        );
        assert_eq!(table.read_output("PublicIp").unwrap(), "203.0.113.5");
    }

    #[test]
    fn test_fixed_output_reads_immediately() {
        let table = BindingTable::from_plan(&plan());
        assert_eq!(table.read_output("SubnetId").unwrap(), "subnet.SubnetA.id");
    }

    #[test]
    fn test_unknown_keys() {
        let mut table = BindingTable::from_plan(&plan());
        assert!(matches!(
            table.resolve("Instance.dns_name", "x"),
            Err(TopologyError::UnknownDeferred { .. })
        ));
        assert!(matches!(
            table.read_output("Nope"),
            Err(TopologyError::UnknownDeferred { .. })
        ));
        assert!(matches!(
            table.mark_failed("Nope"),
            Err(TopologyError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_mark_failed_blocks_dependents() {
        let mut table = BindingTable::from_plan(&plan());
        let errors = table.mark_failed("A").unwrap();
        assert_eq!(
            errors,
            vec![
                TopologyError::DependencyFailed {
                    entity: "SubnetA".to_string(),
                    failed: "A".to_string()
                },
                TopologyError::DependencyFailed {
                    entity: "Instance".to_string(),
                    failed: "A".to_string()
                },
            ]
        );

        assert_eq!(table.state("Instance.public_ip"), Some(BindingState::Failed));
        assert!(table.pending().is_empty());
        assert_eq!(table.failure_of("Instance"), Some("A"));
        assert!(matches!(
            table.resolve("Instance.public_ip", "203.0.113.5"),
            Err(TopologyError::DependencyFailed { .. })
        ));
        assert_eq!(
            table.read_output("PublicIp"),
            Err(TopologyError::DependencyFailed {
                entity: "PublicIp".to_string(),
                failed: "A".to_string()
            })
        );
    }

    #[test]
    fn test_resolved_keys_survive_later_failure() {
        let mut table = BindingTable::from_plan(&plan());
        table.resolve("Instance.public_ip", "203.0.113.5").unwrap();
        table.mark_failed("Instance").unwrap();

        assert!(table.is_resolved("Instance.public_ip"));
        assert_eq!(table.state("Instance.private_ip"), Some(BindingState::Failed));
    }

    #[test]
    fn test_output_of_resolved_key_survives_later_failure() {
        let mut table = BindingTable::from_plan(&plan());
        table.resolve("Instance.public_ip", "203.0.113.5").unwrap();
        table.mark_failed("Instance").unwrap();

        assert_eq!(table.read("Instance.public_ip").unwrap(), "203.0.113.5");
        assert_eq!(table.read_output("PublicIp").unwrap(), "203.0.113.5");
        assert!(matches!(
            table.read("Instance.private_ip"),
            Err(TopologyError::DependencyFailed { .. })
        ));
    }

    #[test]
    fn test_fixed_output_blocked_by_failed_source() {
        let mut table = BindingTable::from_plan(&plan());
        table.mark_failed("SubnetA").unwrap();

        assert_eq!(
            table.read_output("SubnetId"),
            Err(TopologyError::DependencyFailed {
                entity: "SubnetId".to_string(),
                failed: "SubnetA".to_string()
            })
        );
    }

    #[test]
    fn test_prepare_retry_unblocks() {
        let p = plan();
        let mut table = BindingTable::from_plan(&p);
        table.mark_failed("SubnetA").unwrap();

        let retry = p.retry_from("SubnetA").unwrap();
        let reset = table.prepare_retry(&retry);
        assert_eq!(reset, vec!["Instance.public_ip", "Instance.private_ip"]);
        assert!(!table.is_failed("Instance"));

        table.resolve("Instance.public_ip", "203.0.113.5").unwrap();
        assert_eq!(table.history("Instance.public_ip").unwrap().len(), 3);
    }
}

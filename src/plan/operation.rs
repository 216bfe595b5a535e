// Copyright (c) 2025 - Cowboy AI, Inc.
//! Plan operations

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::{AttributeRef, ResourceKind};

/// What the engine must do with an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Destroy,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attribute value as handed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Known at plan time
    Literal(Value),
    /// Symbolic plan address of another entity's identifier
    Address(String),
    /// Deferred key, known only after apply
    Deferred(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Plain JSON value, or `None` when anything inside is deferred
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Address(address) => Some(Value::String(address.clone())),
            Self::Deferred(_) => None,
            Self::List(items) => items
                .iter()
                .map(AttributeValue::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }

    pub fn is_deferred(&self) -> bool {
        match self {
            Self::Deferred(_) => true,
            Self::List(items) => items.iter().any(AttributeValue::is_deferred),
            _ => false,
        }
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Position in the emitted plan
    pub sequence: usize,
    pub kind: OperationKind,
    pub resource_kind: ResourceKind,
    pub entity: String,
    /// Symbolic plan address, `<kind>.<name>`
    pub address: String,
    /// Operations that must complete first
    pub depends_on: Vec<String>,
    pub resolved_attributes: IndexMap<String, AttributeValue>,
    /// Deferred keys this operation promises, `<entity>.<attribute>`
    pub deferred_attributes: Vec<String>,
}

impl Operation {
    /// Attribute names of the promised deferred keys
    pub fn deferred_refs(&self) -> Vec<AttributeRef> {
        self.deferred_attributes
            .iter()
            .filter_map(|key| AttributeRef::parse(key))
            .collect()
    }
}

/// Named output and where its value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub name: String,
    pub source: AttributeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: AttributeValue,
}

/// Operation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub destroy: usize,
    pub deferred: usize,
    pub outputs: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to destroy ({} deferred, {} outputs)",
            self.create, self.update, self.destroy, self.deferred, self.outputs
        )
    }
}

/// Ordered provisioning plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub region: String,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub outputs: Vec<OutputBinding>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operation(&self, entity: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.entity == entity)
    }

    pub fn output(&self, name: &str) -> Option<&OutputBinding> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Entity names in plan order
    pub fn entities(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.entity.as_str()).collect()
    }

    /// Every deferred key in plan order
    pub fn deferred_keys(&self) -> Vec<&str> {
        self.operations
            .iter()
            .flat_map(|op| op.deferred_attributes.iter().map(String::as_str))
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            outputs: self.outputs.len(),
            ..PlanSummary::default()
        };
        for op in &self.operations {
            match op.kind {
                OperationKind::Create => summary.create += 1,
                OperationKind::Update => summary.update += 1,
                OperationKind::Destroy => summary.destroy += 1,
            }
            summary.deferred += op.deferred_attributes.len();
        }
        summary
    }

    /// Waves of operations whose in-plan dependencies sit in earlier waves
    ///
    /// Dependencies outside the plan are treated as already satisfied.
    pub fn levels(&self) -> Vec<Vec<&Operation>> {
        let mut level_of: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<&Operation>> = Vec::new();

        for op in &self.operations {
            let level = op
                .depends_on
                .iter()
                .filter_map(|dep| level_of.get(dep.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(op.entity.as_str(), level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(op);
        }
        levels
    }

    /// Sub-plan re-running `entity` and every operation depending on it
    ///
    /// Keeps the plan id and the original sequence numbers. Returns `None`
    /// when the plan has no operation for `entity`.
    pub fn retry_from(&self, entity: &str) -> Option<Plan> {
        let start = self.operations.iter().position(|op| op.entity == entity)?;

        let mut selected: IndexSet<&str> = IndexSet::new();
        selected.insert(entity);
        for op in &self.operations[start + 1..] {
            if op.depends_on.iter().any(|d| selected.contains(d.as_str())) {
                selected.insert(op.entity.as_str());
            }
        }

        Some(Plan {
            plan_id: self.plan_id,
            generated_at: self.generated_at,
            provider: self.provider.clone(),
            region: self.region.clone(),
            operations: self
                .operations
                .iter()
                .filter(|op| selected.contains(op.entity.as_str()))
                .cloned()
                .collect(),
            outputs: self
                .outputs
                .iter()
                .filter(|o| selected.contains(o.source.entity.as_str()))
                .cloned()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(sequence: usize, entity: &str, depends_on: &[&str]) -> Operation {
        Operation {
            sequence,
            kind: OperationKind::Create,
            resource_kind: ResourceKind::Subnet,
            entity: entity.to_string(),
            address: format!("subnet.{}", entity),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            resolved_attributes: IndexMap::new(),
            deferred_attributes: Vec::new(),
        }
    }

    fn plan(operations: Vec<Operation>) -> Plan {
        Plan {
            plan_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            provider: "aws".to_string(),
            region: "eu-west-1".to_string(),
            operations,
            outputs: Vec::new(),
        }
    }

    #[test]
    fn test_levels_group_independent_operations() {
        let p = plan(vec![
            op(0, "a", &[]),
            op(1, "b", &["a"]),
            op(2, "c", &["a"]),
            op(3, "d", &["b", "c"]),
            op(4, "e", &[]),
        ]);
        let levels: Vec<Vec<&str>> = p
            .levels()
            .iter()
            .map(|wave| wave.iter().map(|op| op.entity.as_str()).collect())
            .collect();
        assert_eq!(levels, vec![vec!["a", "e"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_retry_from_selects_dependents() {
        let p = plan(vec![
            op(0, "a", &[]),
            op(1, "b", &["a"]),
            op(2, "c", &[]),
            op(3, "d", &["b"]),
        ]);
        let retry = p.retry_from("b").unwrap();
        assert_eq!(retry.entities(), vec!["b", "d"]);
        assert_eq!(retry.operations[1].sequence, 3);
        assert_eq!(retry.plan_id, p.plan_id);
        assert!(p.retry_from("zzz").is_none());
    }

    #[test]
    fn test_attribute_value_json() {
        let list = AttributeValue::List(vec![
            AttributeValue::Address("security_group.sg.id".to_string()),
            AttributeValue::Literal(json!(22)),
        ]);
        assert_eq!(list.to_json(), Some(json!(["security_group.sg.id", 22])));
        assert!(!list.is_deferred());

        let deferred = AttributeValue::Deferred("i.public_ip".to_string());
        assert_eq!(deferred.to_json(), None);
        assert!(deferred.is_deferred());
    }

    #[test]
    fn test_summary_display() {
        let p = plan(vec![op(0, "a", &[]), op(1, "b", &["a"])]);
        assert_eq!(
            p.summary().to_string(),
            "Plan: 2 to create, 0 to update, 0 to destroy (0 deferred, 0 outputs)"
        );
    }
}

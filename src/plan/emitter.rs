// Copyright (c) 2025 - Cowboy AI, Inc.
//! Plan Emission
//!
//! Walks the resource graph in topological order and turns each declaration
//! into an [`Operation`]. Cross-entity references are resolved from an
//! emission table filled as each upstream entity is emitted:
//!
//! - `<entity>.id` binds to the symbolic address `<kind>.<entity>.id`
//! - literal attributes bind to their declared values
//! - deferred attributes bind to a [`AttributeValue::Deferred`] placeholder

use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::operation::{AttributeValue, Operation, OperationKind, OutputBinding, Plan};
use crate::config::PlanConfig;
use crate::domain::{AttributeRef, AttributeSource, Resource, ID_ATTRIBUTE};
use crate::errors::{TopologyError, TopologyResult};
use crate::graph::{GraphNode, ResourceGraph};
use crate::topology::TopologyModel;

/// Values known at emission time, keyed `<entity>.<attribute>`
#[derive(Debug, Default)]
struct EmissionTable {
    values: IndexMap<String, AttributeValue>,
}

impl EmissionTable {
    fn lookup(&self, reference: &AttributeRef) -> TopologyResult<AttributeValue> {
        let key = reference.key();
        self.values
            .get(&key)
            .cloned()
            .ok_or(TopologyError::UnresolvedAtRead { name: key })
    }

    /// Bind everything `name` exposes to later declarations
    fn publish(&mut self, name: &str, resource: &Resource) {
        let kind = resource.kind();
        self.values.insert(
            AttributeRef::id_of(name).key(),
            AttributeValue::Address(format!("{}.{}.{}", kind, name, ID_ATTRIBUTE)),
        );

        for (attribute, source) in resource.attribute_sources() {
            if let AttributeSource::Literal(value) = source {
                self.values.insert(
                    AttributeRef::new(name, attribute).key(),
                    AttributeValue::Literal(value),
                );
            }
        }

        for attribute in kind.deferred_attributes() {
            let key = AttributeRef::new(name, *attribute).key();
            self.values.insert(key.clone(), AttributeValue::Deferred(key));
        }
    }
}

/// Produces ordered plans from a validated model
#[derive(Debug, Clone, Default)]
pub struct PlanEmitter {
    config: PlanConfig,
}

impl PlanEmitter {
    pub fn new(config: PlanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Create every entity, dependencies first
    pub fn emit_create(&self, model: &TopologyModel, graph: &ResourceGraph) -> TopologyResult<Plan> {
        self.emit_forward(model, graph, OperationKind::Create, None)
    }

    /// Update the changed entities and everything that depends on them
    ///
    /// # Errors
    /// - `UnknownReference` if a changed name was never declared
    pub fn emit_update(
        &self,
        model: &TopologyModel,
        graph: &ResourceGraph,
        changed: &[&str],
    ) -> TopologyResult<Plan> {
        let mut selected = IndexSet::new();
        for name in changed {
            if graph.node(name).is_none() {
                return Err(TopologyError::UnknownReference {
                    from: "update".to_string(),
                    to: name.to_string(),
                });
            }
            selected.insert(name.to_string());
            selected.extend(
                graph
                    .transitive_dependents(name)
                    .into_iter()
                    .map(|node| node.name.clone()),
            );
        }
        self.emit_forward(model, graph, OperationKind::Update, Some(&selected))
    }

    /// Destroy every entity, dependents first
    ///
    /// Each operation waits on the operations destroying its dependents.
    pub fn emit_destroy(&self, model: &TopologyModel, graph: &ResourceGraph) -> TopologyResult<Plan> {
        let order = graph.topological_order()?;
        let mut operations = Vec::new();

        for node in order.into_iter().rev() {
            if !node.kind.is_provisioned() {
                continue;
            }
            declared(model, node)?;

            let depends_on = graph
                .dependents_of(&node.name)
                .into_iter()
                .filter(|d| d.kind.is_provisioned())
                .map(|d| d.name.clone())
                .collect();

            let mut resolved_attributes = IndexMap::new();
            resolved_attributes.insert(
                ID_ATTRIBUTE.to_string(),
                AttributeValue::Address(format!("{}.{}.{}", node.kind, node.name, ID_ATTRIBUTE)),
            );

            operations.push(Operation {
                sequence: operations.len(),
                kind: OperationKind::Destroy,
                resource_kind: node.kind,
                entity: node.name.clone(),
                address: format!("{}.{}", node.kind, node.name),
                depends_on,
                resolved_attributes,
                deferred_attributes: Vec::new(),
            });
        }

        Ok(self.finish(OperationKind::Destroy, operations, Vec::new()))
    }

    fn emit_forward(
        &self,
        model: &TopologyModel,
        graph: &ResourceGraph,
        kind: OperationKind,
        selected: Option<&IndexSet<String>>,
    ) -> TopologyResult<Plan> {
        let is_selected = |name: &str| selected.map_or(true, |s| s.contains(name));

        let order = graph.topological_order()?;
        let mut table = EmissionTable::default();
        let mut operations = Vec::new();
        let mut outputs = Vec::new();

        for node in order {
            let resource = declared(model, node)?;

            if let Resource::Output(output) = resource {
                let value = table.lookup(&output.source)?;
                if is_selected(&output.source.entity) {
                    outputs.push(OutputBinding {
                        name: node.name.clone(),
                        source: output.source.clone(),
                        description: output.description.clone(),
                        value,
                    });
                }
                continue;
            }

            let resolved_attributes = self.resolve_attributes(resource, &table)?;
            table.publish(&node.name, resource);

            if !is_selected(&node.name) {
                continue;
            }

            let depends_on = graph
                .dependencies_of(&node.name)
                .into_iter()
                .filter(|d| d.kind.is_provisioned() && is_selected(&d.name))
                .map(|d| d.name.clone())
                .collect();

            let deferred_attributes = node
                .kind
                .deferred_attributes()
                .iter()
                .map(|attribute| AttributeRef::new(&node.name, *attribute).key())
                .collect();

            debug!("Emitting {} {}", kind, node.name);
            operations.push(Operation {
                sequence: operations.len(),
                kind,
                resource_kind: node.kind,
                entity: node.name.clone(),
                address: format!("{}.{}", node.kind, node.name),
                depends_on,
                resolved_attributes,
                deferred_attributes,
            });
        }

        Ok(self.finish(kind, operations, outputs))
    }

    fn resolve_attributes(
        &self,
        resource: &Resource,
        table: &EmissionTable,
    ) -> TopologyResult<IndexMap<String, AttributeValue>> {
        let mut attributes = IndexMap::new();

        for (name, source) in resource.attribute_sources() {
            let value = match source {
                AttributeSource::Literal(value) => AttributeValue::Literal(value),
                AttributeSource::Ref(reference) => table.lookup(&reference)?,
                AttributeSource::RefList(references) => AttributeValue::List(
                    references
                        .iter()
                        .map(|r| table.lookup(r))
                        .collect::<TopologyResult<Vec<_>>>()?,
                ),
            };
            attributes.insert(name.to_string(), value);
        }

        if let Resource::PeeringLink(link) = resource {
            let region = link
                .peer_region
                .clone()
                .unwrap_or_else(|| self.config.region.clone());
            attributes.insert("peer_region".to_string(), AttributeValue::Literal(json!(region)));
        }

        if let Some(own) = resource.tags() {
            let tags = self.config.merged_tags(own);
            if !tags.is_empty() {
                attributes.insert("tags".to_string(), AttributeValue::Literal(json!(tags)));
            }
        }

        Ok(attributes)
    }

    fn finish(&self, kind: OperationKind, operations: Vec<Operation>, outputs: Vec<OutputBinding>) -> Plan {
        info!(
            "Emitted {} plan: {} operations, {} outputs",
            kind,
            operations.len(),
            outputs.len()
        );
        Plan {
            plan_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            provider: self.config.provider.clone(),
            region: self.config.region.clone(),
            operations,
            outputs,
        }
    }
}

fn declared<'m>(model: &'m TopologyModel, node: &GraphNode) -> TopologyResult<&'m Resource> {
    model.get(&node.name).ok_or_else(|| TopologyError::UnknownReference {
        from: "plan".to_string(),
        to: node.name.clone(),
    })
}

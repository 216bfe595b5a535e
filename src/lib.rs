//! Network topology validation and provisioning plans
//!
//! Turns typed resource declarations (networks, subnets, gateways, route
//! tables, peering links, security rules, instances) into a verified,
//! dependency-ordered plan for an external provisioning engine.
//!
//! ```text
//! TopologyModel ──▶ ResourceGraph ──▶ Validator ──▶ PlanEmitter ──▶ Plan
//!                                                                    │
//!                     ProvisioningEngine ──values──▶ BindingTable ◀──┘
//! ```

pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod plan;
pub mod state_machine;
pub mod topology;
pub mod validation;

// Re-export commonly used types
pub use config::PlanConfig;
pub use errors::{ErrorCategory, TopologyError, TopologyResult};
pub use graph::{GraphNode, ResourceGraph};
pub use plan::{
    apply_plan, ApplyOutcome, ApplyReport, BindingTable, EngineFailure, LoggingEngine, Operation,
    OperationKind, Plan, PlanEmitter, ProvisioningEngine,
};
pub use topology::TopologyModel;
pub use validation::{ValidationError, ValidationErrorKind, ValidationReport, Validator};

/// Build the graph, validate it, and emit a create plan
///
/// # Errors
/// - `UnknownReference` / `KindMismatch` from the graph build
/// - `Validation` with every violation when the topology is rejected
pub fn compile(model: &TopologyModel, config: &PlanConfig) -> TopologyResult<Plan> {
    let graph = ResourceGraph::build(model)?;
    Validator::validate(model, &graph).map_err(TopologyError::Validation)?;
    PlanEmitter::new(config.clone()).emit_create(model, &graph)
}

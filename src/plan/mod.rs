// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Plans
//!
//! - [`emitter`]: turns a validated model into an ordered [`Plan`]
//! - [`bindings`]: deferred attribute table filled after apply
//! - [`executor`]: async boundary to the external provisioning engine

pub mod bindings;
pub mod emitter;
pub mod executor;
pub mod operation;

pub use bindings::{BindingTable, DeferredBinding};
pub use emitter::PlanEmitter;
pub use executor::{apply_plan, ApplyOutcome, ApplyReport, EngineFailure, LoggingEngine, ProvisioningEngine};
pub use operation::{AttributeValue, Operation, OperationKind, OutputBinding, Plan, PlanSummary};

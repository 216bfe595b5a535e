// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Validation
//!
//! Runs a fixed battery of structural checks over a model whose graph built
//! successfully. Every check runs; failures are collected into one
//! [`ValidationReport`] so a caller can fix all problems in a single pass.
//! Validation never mutates the model.

pub mod invariants;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::graph::ResourceGraph;
use crate::topology::TopologyModel;

/// Kind of structural violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    CycleDetected,
    InvalidNetworkBlock,
    MisalignedBlock,
    SubnetOutsideNetwork,
    SubnetOverlap,
    MultipleGateways,
    GatewayAttachedTwice,
    AssociationNetworkMismatch,
    DuplicateAssociation,
    PeeringSelfLink,
    DuplicatePeering,
    InvalidPortRange,
    MissingRuleSource,
    RuleSourceUnreachable,
    InstanceReferenceIntegrity,
    OutputSourceInvalid,
    OutputNeverResolvable,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CycleDetected => "cycle_detected",
            Self::InvalidNetworkBlock => "invalid_network_block",
            Self::MisalignedBlock => "misaligned_block",
            Self::SubnetOutsideNetwork => "subnet_outside_network",
            Self::SubnetOverlap => "subnet_overlap",
            Self::MultipleGateways => "multiple_gateways",
            Self::GatewayAttachedTwice => "gateway_attached_twice",
            Self::AssociationNetworkMismatch => "association_network_mismatch",
            Self::DuplicateAssociation => "duplicate_association",
            Self::PeeringSelfLink => "peering_self_link",
            Self::DuplicatePeering => "duplicate_peering",
            Self::InvalidPortRange => "invalid_port_range",
            Self::MissingRuleSource => "missing_rule_source",
            Self::RuleSourceUnreachable => "rule_source_unreachable",
            Self::InstanceReferenceIntegrity => "instance_reference_integrity",
            Self::OutputSourceInvalid => "output_source_invalid",
            Self::OutputNeverResolvable => "output_never_resolvable",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structural violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Entity the violation is reported against
    pub entity: String,
    pub detail: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.entity, self.detail)
    }
}

/// Ordered collection of violations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Violations of one kind
    pub fn of_kind(&self, kind: ValidationErrorKind) -> Vec<&ValidationError> {
        self.errors.iter().filter(|e| e.kind == kind).collect()
    }

    /// Violations reported against one entity
    pub fn for_entity(&self, entity: &str) -> Vec<&ValidationError> {
        self.errors.iter().filter(|e| e.entity == entity).collect()
    }

    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "; {}", error)?;
        }
        Ok(())
    }
}

/// Runs every structural check
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Collect every violation in check order
    pub fn check(model: &TopologyModel, graph: &ResourceGraph) -> ValidationReport {
        let checks: [(&str, Vec<ValidationError>); 10] = [
            ("cycles", invariants::check_acyclic(graph)),
            ("address blocks", invariants::check_address_blocks(model)),
            ("containment", invariants::check_subnet_containment(model)),
            ("disjointness", invariants::check_sibling_disjointness(model)),
            ("gateways", invariants::check_gateway_attachments(model)),
            ("associations", invariants::check_associations(model)),
            ("peering", invariants::check_peering_links(model)),
            ("security rules", invariants::check_security_rules(model)),
            ("instances", invariants::check_instances(model)),
            ("outputs", invariants::check_outputs(model)),
        ];

        let mut report = ValidationReport::default();
        for (name, errors) in checks {
            debug!("Validation check {}: {} error(s)", name, errors.len());
            report.errors.extend(errors);
        }

        info!(
            "Validated {} declarations: {} error(s)",
            model.len(),
            report.len()
        );
        report
    }

    /// Accept or reject the topology
    pub fn validate(model: &TopologyModel, graph: &ResourceGraph) -> Result<(), ValidationReport> {
        Self::check(model, graph).into_result()
    }
}

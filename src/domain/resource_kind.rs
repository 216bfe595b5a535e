// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Resource Kind Taxonomy
//!
//! The fixed, extensible vocabulary of resources a topology can declare.
//! Each kind knows its canonical plan prefix and which of its attributes are
//! only produced by the provisioning engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string that names no resource kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown resource kind: {0}")]
pub struct UnknownResourceKind(pub String);

/// Topology resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Isolated virtual network
    Network,
    /// Sub-range of a network bound to one availability zone
    Subnet,
    /// Internet gateway
    Gateway,
    /// Binding of a gateway to a network
    GatewayAttachment,
    /// Routing rule set
    RouteTable,
    /// Binding of a route table to a subnet
    RouteTableAssociation,
    /// Reachability link between two networks
    PeeringLink,
    /// Named traffic policy
    SecurityGroup,
    /// Single allow rule of a security group
    SecurityRule,
    /// Compute instance
    Instance,
    /// Named value exposed to the caller after apply
    Output,
}

impl ResourceKind {
    /// All kinds, in a stable order
    pub const ALL: [ResourceKind; 11] = [
        Self::Network,
        Self::Subnet,
        Self::Gateway,
        Self::GatewayAttachment,
        Self::RouteTable,
        Self::RouteTableAssociation,
        Self::PeeringLink,
        Self::SecurityGroup,
        Self::SecurityRule,
        Self::Instance,
        Self::Output,
    ];

    /// Canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::Gateway => "gateway",
            Self::GatewayAttachment => "gateway_attachment",
            Self::RouteTable => "route_table",
            Self::RouteTableAssociation => "route_table_association",
            Self::PeeringLink => "peering_link",
            Self::SecurityGroup => "security_group",
            Self::SecurityRule => "security_rule",
            Self::Instance => "instance",
            Self::Output => "output",
        }
    }

    /// Attributes whose values only exist after the engine applies the resource
    pub fn deferred_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Instance => &["public_ip", "private_ip"],
            Self::PeeringLink => &["accept_status"],
            _ => &[],
        }
    }

    /// Whether the engine provisions this kind (outputs are caller-side only)
    pub fn is_provisioned(&self) -> bool {
        !matches!(self, Self::Output)
    }

    /// Whether the kind carries free-form tags
    pub fn is_taggable(&self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Subnet
                | Self::Gateway
                | Self::RouteTable
                | Self::PeeringLink
                | Self::SecurityGroup
                | Self::Instance
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    /// Parse from the canonical string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}

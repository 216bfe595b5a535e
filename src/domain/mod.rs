// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Domain Models
//!
//! Value objects and typed entity declarations for a multi-network cloud
//! topology.
//!
//! # Value Objects with Invariants
//!
//! - [`CidrBlock`] - IPv4 block with containment/overlap arithmetic
//! - [`ResourceKind`] - Topology resource taxonomy
//!
//! # Entities
//!
//! - [`Network`], [`Subnet`], [`Gateway`], [`GatewayAttachment`]
//! - [`RouteTable`], [`RouteTableAssociation`], [`PeeringLink`]
//! - [`SecurityGroup`], [`SecurityRule`], [`Instance`], [`Output`]
//!
//! Entities reference each other by declared name only.

pub mod address;
pub mod entities;
pub mod resource_kind;

pub use address::{contains, overlaps, parse_block, AddressError, CidrBlock};
pub use entities::{
    AttributeRef, AttributeSource, Direction, FieldReference, Gateway, GatewayAttachment,
    Instance, Network, Output, PeeringLink, Protocol, Resource, RouteScope, RouteTable,
    RouteTableAssociation, SecurityGroup, SecurityRule, Subnet, Tags, ID_ATTRIBUTE,
};
pub use resource_kind::{ResourceKind, UnknownResourceKind};

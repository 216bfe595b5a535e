// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Assembly
//!
//! - [`model`]: the declaration builder
//! - [`reference`]: the bastion plus production network used by the binary

pub mod model;
pub mod reference;

pub use model::{Dependency, ExplicitReference, TopologyModel};

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Model Builder
//!
//! Accumulates entity declarations in declaration order. Cross-entity links
//! are recorded by name and only checked when the resource graph is built, so
//! declarations may arrive in any order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    FieldReference, GatewayAttachment, Instance, Network, Output, PeeringLink, Resource,
    ResourceKind, RouteTable, RouteTableAssociation, SecurityGroup, SecurityRule, Subnet,
};
use crate::errors::{TopologyError, TopologyResult};

/// Dependency recorded with [`TopologyModel::reference`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitReference {
    pub from: String,
    pub to: String,
}

/// One outgoing dependency of a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub target: String,
    pub expected: Option<ResourceKind>,
    /// Field name, or `depends_on` for explicit references
    pub via: &'static str,
}

/// Declared topology
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyModel {
    declarations: IndexMap<String, Resource>,
    /// Explicit references keyed by their source, in recording order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    explicit_references: IndexMap<String, Vec<String>>,
}

impl TopologyModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity
    ///
    /// # Errors
    /// - `DuplicateName` if any entity already uses `name`
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        resource: impl Into<Resource>,
    ) -> TopologyResult<&mut Self> {
        let name = name.into();
        let resource = resource.into();

        if let Some(existing) = self.declarations.get(&name) {
            return Err(TopologyError::DuplicateName {
                name,
                existing: existing.kind(),
            });
        }

        debug!("Declared {} {}", resource.kind(), name);
        self.declarations.insert(name, resource);
        Ok(self)
    }

    /// Record that `from` must be provisioned after `to`
    ///
    /// `to` may be declared later; a dangling target fails the graph build.
    ///
    /// # Errors
    /// - `UnknownReference` if `from` has not been declared
    pub fn reference(&mut self, from: &str, to: &str) -> TopologyResult<&mut Self> {
        if !self.declarations.contains_key(from) {
            return Err(TopologyError::UnknownReference {
                from: "depends_on".to_string(),
                to: from.to_string(),
            });
        }
        self.explicit_references
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.declarations.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ResourceKind> {
        self.get(name).map(Resource::kind)
    }

    /// Position of `name` in declaration order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.declarations.get_index_of(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declarations in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.declarations.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Explicit references grouped by source
    pub fn explicit_references(&self) -> Vec<ExplicitReference> {
        self.explicit_references
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |to| ExplicitReference {
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }

    /// Outgoing dependencies of `name`: field references first, then explicit ones
    pub fn dependencies_of(&self, name: &str) -> Vec<Dependency> {
        let Some(resource) = self.get(name) else {
            return Vec::new();
        };

        let mut deps: Vec<Dependency> = resource
            .references()
            .into_iter()
            .map(|FieldReference { field, target, expected }| Dependency {
                target,
                expected,
                via: field,
            })
            .collect();

        deps.extend(
            self.explicit_references
                .get(name)
                .into_iter()
                .flatten()
                .map(|to| Dependency {
                    target: to.clone(),
                    expected: None,
                    via: "depends_on",
                }),
        );
        deps
    }

    /// Check every reference, in declaration order
    ///
    /// # Errors
    /// - `UnknownReference` for the first dangling reference
    /// - `KindMismatch` for the first reference to an entity of the wrong kind
    pub fn check_references(&self) -> TopologyResult<()> {
        for (name, _) in self.iter() {
            for dep in self.dependencies_of(name) {
                let found = self.kind_of(&dep.target).ok_or_else(|| {
                    TopologyError::UnknownReference {
                        from: name.to_string(),
                        to: dep.target.clone(),
                    }
                })?;

                if let Some(expected) = dep.expected {
                    if expected != found {
                        return Err(TopologyError::KindMismatch {
                            from: name.to_string(),
                            to: dep.target,
                            expected,
                            found,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Typed views
    // ------------------------------------------------------------------------

    pub fn networks(&self) -> impl Iterator<Item = (&str, &Network)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::Network(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn subnets(&self) -> impl Iterator<Item = (&str, &Subnet)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::Subnet(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn gateway_attachments(&self) -> impl Iterator<Item = (&str, &GatewayAttachment)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::GatewayAttachment(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn route_tables(&self) -> impl Iterator<Item = (&str, &RouteTable)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::RouteTable(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn associations(&self) -> impl Iterator<Item = (&str, &RouteTableAssociation)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::RouteTableAssociation(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn peering_links(&self) -> impl Iterator<Item = (&str, &PeeringLink)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::PeeringLink(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn security_groups(&self) -> impl Iterator<Item = (&str, &SecurityGroup)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::SecurityGroup(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn security_rules(&self) -> impl Iterator<Item = (&str, &SecurityRule)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::SecurityRule(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn instances(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::Instance(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.iter().filter_map(|(n, r)| match r {
            Resource::Output(v) => Some((n, v)),
            _ => None,
        })
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        match self.get(name) {
            Some(Resource::Network(v)) => Some(v),
            _ => None,
        }
    }

    pub fn subnet(&self, name: &str) -> Option<&Subnet> {
        match self.get(name) {
            Some(Resource::Subnet(v)) => Some(v),
            _ => None,
        }
    }

    pub fn route_table(&self, name: &str) -> Option<&RouteTable> {
        match self.get(name) {
            Some(Resource::RouteTable(v)) => Some(v),
            _ => None,
        }
    }

    pub fn security_group(&self, name: &str) -> Option<&SecurityGroup> {
        match self.get(name) {
            Some(Resource::SecurityGroup(v)) => Some(v),
            _ => None,
        }
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Topology Invariants
//!
//! Each function checks one family of invariants and returns every violation
//! it finds, in declaration order. All functions are pure: no I/O, no
//! mutation, deterministic.
//!
//! Dangling references are already rejected by the graph build; lookups that
//! miss here are reported rather than assumed impossible.

use std::collections::{BTreeSet, HashMap};

use super::{ValidationError, ValidationErrorKind as Kind};
use crate::domain::{contains, overlaps, Protocol, Resource, ResourceKind, RouteScope};
use crate::graph::ResourceGraph;
use crate::topology::TopologyModel;

/// Highest valid port number
pub const MAX_PORT: i32 = 65_535;

/// Port sentinel meaning "all ports"
pub const WILDCARD_PORT: i32 = -1;

/// Validate the graph has no dependency cycle
pub fn check_acyclic(graph: &ResourceGraph) -> Vec<ValidationError> {
    match graph.detect_cycle() {
        Some(path) => {
            let entity = path.first().cloned().unwrap_or_default();
            vec![ValidationError::new(
                Kind::CycleDetected,
                entity,
                format!("dependency cycle {}", path.join(" -> ")),
            )]
        }
        None => Vec::new(),
    }
}

/// Validate network and subnet blocks
///
/// # Rules
/// - A network block must have a non-zero prefix length
/// - Network and subnet blocks must be written as network addresses
pub fn check_address_blocks(model: &TopologyModel) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, resource) in model.iter() {
        let block = match resource {
            Resource::Network(n) => {
                if n.cidr_block.prefix_length() == 0 {
                    errors.push(ValidationError::new(
                        Kind::InvalidNetworkBlock,
                        name,
                        format!("{} has a zero-length prefix", n.cidr_block),
                    ));
                }
                n.cidr_block
            }
            Resource::Subnet(s) => s.cidr_block,
            _ => continue,
        };

        if !block.is_aligned() {
            errors.push(ValidationError::new(
                Kind::MisalignedBlock,
                name,
                format!("{} has host bits set; expected {}", block, block.network()),
            ));
        }
    }
    errors
}

/// Validate every subnet lies inside its network
pub fn check_subnet_containment(model: &TopologyModel) -> Vec<ValidationError> {
    model
        .subnets()
        .filter_map(|(name, subnet)| {
            let network = model.network(&subnet.network)?;
            (!contains(&network.cidr_block, &subnet.cidr_block)).then(|| {
                ValidationError::new(
                    Kind::SubnetOutsideNetwork,
                    name,
                    format!(
                        "{} is not within {} ({})",
                        subnet.cidr_block, subnet.network, network.cidr_block
                    ),
                )
            })
        })
        .collect()
}

/// Validate sibling subnets are disjoint
///
/// Each overlapping pair is reported once, against the later declaration.
pub fn check_sibling_disjointness(model: &TopologyModel) -> Vec<ValidationError> {
    let subnets: Vec<_> = model.subnets().collect();
    let mut errors = Vec::new();

    for (i, (name, subnet)) in subnets.iter().enumerate() {
        for (earlier_name, earlier) in &subnets[..i] {
            if earlier.network == subnet.network && overlaps(&earlier.cidr_block, &subnet.cidr_block) {
                errors.push(ValidationError::new(
                    Kind::SubnetOverlap,
                    *name,
                    format!(
                        "{} overlaps {} ({}) in {}",
                        subnet.cidr_block, earlier_name, earlier.cidr_block, subnet.network
                    ),
                ));
            }
        }
    }
    errors
}

/// Validate gateway attachments
///
/// # Rules
/// - A network has at most one attached gateway
/// - A gateway is attached at most once
pub fn check_gateway_attachments(model: &TopologyModel) -> Vec<ValidationError> {
    let mut by_network: HashMap<&str, &str> = HashMap::new();
    let mut by_gateway: HashMap<&str, &str> = HashMap::new();
    let mut errors = Vec::new();

    for (name, attachment) in model.gateway_attachments() {
        if let Some(first) = by_network.get(attachment.network.as_str()) {
            errors.push(ValidationError::new(
                Kind::MultipleGateways,
                name,
                format!("{} already has a gateway attached by {}", attachment.network, first),
            ));
        } else {
            by_network.insert(&attachment.network, name);
        }

        if let Some(first) = by_gateway.get(attachment.gateway.as_str()) {
            errors.push(ValidationError::new(
                Kind::GatewayAttachedTwice,
                name,
                format!("{} is already attached by {}", attachment.gateway, first),
            ));
        } else {
            by_gateway.insert(&attachment.gateway, name);
        }
    }
    errors
}

/// Validate route table associations
///
/// # Rules
/// - Route table and subnet share a network
/// - At most one association per (scope, subnet)
pub fn check_associations(model: &TopologyModel) -> Vec<ValidationError> {
    let mut seen: HashMap<(RouteScope, &str), &str> = HashMap::new();
    let mut errors = Vec::new();

    for (name, association) in model.associations() {
        let (Some(table), Some(subnet)) = (
            model.route_table(&association.route_table),
            model.subnet(&association.subnet),
        ) else {
            continue;
        };

        if table.network != subnet.network {
            errors.push(ValidationError::new(
                Kind::AssociationNetworkMismatch,
                name,
                format!(
                    "route table {} belongs to {} but subnet {} belongs to {}",
                    association.route_table, table.network, association.subnet, subnet.network
                ),
            ));
        }

        let key = (table.scope, association.subnet.as_str());
        if let Some(first) = seen.get(&key) {
            errors.push(ValidationError::new(
                Kind::DuplicateAssociation,
                name,
                format!(
                    "subnet {} already has a {} route table via {}",
                    association.subnet, table.scope, first
                ),
            ));
        } else {
            seen.insert(key, name);
        }
    }
    errors
}

/// Validate peering links
///
/// # Rules
/// - Requester and accepter differ
/// - At most one link per unordered pair
///
/// Both sides being declared networks is enforced by the graph build.
pub fn check_peering_links(model: &TopologyModel) -> Vec<ValidationError> {
    let mut seen: HashMap<(&str, &str), &str> = HashMap::new();
    let mut errors = Vec::new();

    for (name, link) in model.peering_links() {
        if link.requester == link.accepter {
            errors.push(ValidationError::new(
                Kind::PeeringSelfLink,
                name,
                format!("{} cannot peer with itself", link.requester),
            ));
            continue;
        }

        let pair = link.unordered_pair();
        if let Some(first) = seen.get(&pair) {
            errors.push(ValidationError::new(
                Kind::DuplicatePeering,
                name,
                format!("{} and {} are already peered by {}", pair.0, pair.1, first),
            ));
        } else {
            seen.insert(pair, name);
        }
    }
    errors
}

/// Unordered pairs of peered networks
fn peered_pairs(model: &TopologyModel) -> BTreeSet<(String, String)> {
    model
        .peering_links()
        .map(|(_, link)| {
            let (a, b) = link.unordered_pair();
            (a.to_string(), b.to_string())
        })
        .collect()
}

/// Validate a port range for a protocol
///
/// # Rules
/// - Wildcard protocol: each port is the `-1` sentinel or within [0, 65535]
/// - Otherwise: both ports within [0, 65535] and `from <= to`
pub fn validate_port_range(protocol: Protocol, from_port: i32, to_port: i32) -> Result<(), String> {
    let in_range = |p: i32| (0..=MAX_PORT).contains(&p);

    if protocol.is_wildcard() {
        for port in [from_port, to_port] {
            if port != WILDCARD_PORT && !in_range(port) {
                return Err(format!("port {} is outside [0, {}]", port, MAX_PORT));
            }
        }
        return Ok(());
    }

    if !in_range(from_port) || !in_range(to_port) {
        return Err(format!(
            "ports {}-{} are outside [0, {}] for {}",
            from_port, to_port, MAX_PORT, protocol
        ));
    }
    if from_port > to_port {
        return Err(format!("from_port {} exceeds to_port {}", from_port, to_port));
    }
    Ok(())
}

/// Validate security rules
///
/// # Rules
/// - Port range is well-formed for the protocol
/// - At least one CIDR block or a source security group
/// - A source group in another network is only reachable over a peering link
pub fn check_security_rules(model: &TopologyModel) -> Vec<ValidationError> {
    let peered = peered_pairs(model);
    let mut errors = Vec::new();

    for (name, rule) in model.security_rules() {
        if let Err(detail) = validate_port_range(rule.protocol, rule.from_port, rule.to_port) {
            errors.push(ValidationError::new(Kind::InvalidPortRange, name, detail));
        }

        if rule.cidr_blocks.is_empty() && rule.source_security_group.is_none() {
            errors.push(ValidationError::new(
                Kind::MissingRuleSource,
                name,
                "rule names neither CIDR blocks nor a source security group",
            ));
        }

        let Some(source) = &rule.source_security_group else {
            continue;
        };
        let (Some(own), Some(other)) = (
            model.security_group(&rule.security_group),
            model.security_group(source),
        ) else {
            continue;
        };
        if own.network != other.network {
            let pair = if own.network <= other.network {
                (own.network.clone(), other.network.clone())
            } else {
                (other.network.clone(), own.network.clone())
            };
            if !peered.contains(&pair) {
                errors.push(ValidationError::new(
                    Kind::RuleSourceUnreachable,
                    name,
                    format!(
                        "source group {} lives in {} which is not peered with {}",
                        source, other.network, own.network
                    ),
                ));
            }
        }
    }
    errors
}

/// Validate instance references
///
/// # Rules
/// - Every security group shares the subnet's network
///
/// The subnet and groups existing with the right kinds is enforced by the
/// graph build.
pub fn check_instances(model: &TopologyModel) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, instance) in model.instances() {
        let Some(subnet) = model.subnet(&instance.subnet) else {
            continue;
        };

        for group_name in &instance.security_groups {
            let Some(group) = model.security_group(group_name) else {
                continue;
            };
            if group.network != subnet.network {
                errors.push(ValidationError::new(
                    Kind::InstanceReferenceIntegrity,
                    name,
                    format!(
                        "security group {} belongs to {} but the instance runs in {}",
                        group_name, group.network, subnet.network
                    ),
                ));
            }
        }
    }
    errors
}

/// Validate outputs
///
/// # Rules
/// - The source entity exposes the referenced attribute
/// - A `public_ip` output reads an instance in a public subnet
pub fn check_outputs(model: &TopologyModel) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, output) in model.outputs() {
        let Some(source) = model.get(&output.source.entity) else {
            continue;
        };

        if source.kind() == ResourceKind::Output || !source.exposes(&output.source.attribute) {
            errors.push(ValidationError::new(
                Kind::OutputSourceInvalid,
                name,
                format!(
                    "{} {} does not expose {}",
                    source.kind(),
                    output.source.entity,
                    output.source.attribute
                ),
            ));
            continue;
        }

        if let Resource::Instance(instance) = source {
            let public = model
                .subnet(&instance.subnet)
                .map(|s| s.map_public_ip_on_launch)
                .unwrap_or(false);
            if output.source.attribute == "public_ip" && !public {
                errors.push(ValidationError::new(
                    Kind::OutputNeverResolvable,
                    name,
                    format!(
                        "{} runs in {} which does not assign public addresses",
                        output.source.entity, instance.subnet
                    ),
                ));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port_range() {
        assert!(validate_port_range(Protocol::Tcp, 22, 22).is_ok());
        assert!(validate_port_range(Protocol::Tcp, 0, 65_535).is_ok());
        assert!(validate_port_range(Protocol::Tcp, 443, 80).is_err());
        assert!(validate_port_range(Protocol::Udp, -1, 53).is_err());
        assert!(validate_port_range(Protocol::Tcp, 22, 70_000).is_err());

        // Wildcard protocol ignores ordering
        assert!(validate_port_range(Protocol::All, 0, 0).is_ok());
        assert!(validate_port_range(Protocol::All, -1, -1).is_ok());
        assert!(validate_port_range(Protocol::All, 100, 0).is_ok());
        assert!(validate_port_range(Protocol::All, -2, 0).is_err());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bastion and production reference topology
//!
//! Two peered networks in `eu-west-1`, each with a private and a public
//! subnet, an internet gateway and route tables. The bastion network runs a
//! single SSH jump server whose public address is the topology's output.
//!
//! ```text
//! BstEuVPC 10.10.1.0/24 ◀──peering──▶ ProdEuVPC 10.10.2.0/24
//!   ├─ BastionPrivateSubnet1a  10.10.1.0/26     ├─ ProductionPrivateSubnet1a 10.10.2.0/26
//!   └─ BastionPublicSubnet1a   10.10.1.128/26   └─ ProductionPublicSubnet1a  10.10.2.128/26
//!        └─ BstJumpServerInstance (SGbstjumpbox)
//! ```

use crate::domain::{
    AttributeRef, Gateway, GatewayAttachment, Instance, Network, Output, PeeringLink, Protocol,
    RouteScope, RouteTable, RouteTableAssociation, SecurityGroup, SecurityRule, Subnet,
};
use crate::errors::TopologyResult;

use super::TopologyModel;

pub const REGION: &str = "eu-west-1";
pub const AVAILABILITY_ZONE: &str = "eu-west-1a";

pub const BASTION_NETWORK: &str = "BstEuVPC";
pub const PRODUCTION_NETWORK: &str = "ProdEuVPC";
pub const JUMP_SERVER: &str = "BstJumpServerInstance";
pub const JUMP_SERVER_OUTPUT: &str = "JumpServerPublicIP";

/// Address allowed to reach the jump server over SSH
pub const SSH_SOURCE: &str = "87.198.109.106/32";

/// Declare the full reference topology
pub fn bastion_production() -> TopologyResult<TopologyModel> {
    let mut model = TopologyModel::new();

    // Networks
    model
        .declare(
            BASTION_NETWORK,
            Network::new("10.10.1.0/24")?.with_tag("Name", "fh-eu-bst"),
        )?
        .declare(
            PRODUCTION_NETWORK,
            Network::new("10.10.2.0/24")?.with_tag("Name", "fh-eu-prod"),
        )?;

    // Subnets
    model
        .declare(
            "BastionPrivateSubnet1a",
            Subnet::new(BASTION_NETWORK, "10.10.1.0/26", AVAILABILITY_ZONE)?
                .with_tag("Name", "fh-bst-private1-subnet-eu-west-1a")
                .with_tag("stack", "bastian"),
        )?
        .declare(
            "BastionPublicSubnet1a",
            Subnet::new(BASTION_NETWORK, "10.10.1.128/26", AVAILABILITY_ZONE)?
                .public()
                .with_tag("Name", "fh-bst-public1-subnet-eu-west-1a")
                .with_tag("stack", "bastian"),
        )?
        .declare(
            "ProductionPrivateSubnet1a",
            Subnet::new(PRODUCTION_NETWORK, "10.10.2.0/26", AVAILABILITY_ZONE)?
                .with_tag("Name", "fh-prod-private1-subnet-eu-west-1a")
                .with_tag("stack", "Production"),
        )?
        .declare(
            "ProductionPublicSubnet1a",
            Subnet::new(PRODUCTION_NETWORK, "10.10.2.128/26", AVAILABILITY_ZONE)?
                .public()
                .with_tag("Name", "fh-prod-public1-subnet-eu-west-1a")
                .with_tag("stack", "Production"),
        )?;

    // Internet gateways
    model
        .declare(
            "InternetGatewayBastion",
            Gateway::new().with_tag("Name", "fh-eu-bst-igw"),
        )?
        .declare(
            "InternetGatewayProduction",
            Gateway::new().with_tag("Name", "fh-eu-prod-igw"),
        )?
        .declare(
            "InternetGatewayAttachmentBastion",
            GatewayAttachment::new("InternetGatewayBastion", BASTION_NETWORK),
        )?
        .declare(
            "InternetGatewayAttachmentProduction",
            GatewayAttachment::new("InternetGatewayProduction", PRODUCTION_NETWORK),
        )?;

    // Route tables
    let route_tables = [
        ("BastionEUPrivateRTB", BASTION_NETWORK, RouteScope::Private, "fh-bst-eu-private-rtb"),
        ("BastionEUPublicRTB", BASTION_NETWORK, RouteScope::Public, "fh-bst-eu-public-rtb"),
        ("ProductionEUPrivateRTB", PRODUCTION_NETWORK, RouteScope::Private, "fh-prod-eu-private-rtb"),
        ("ProductionEUPublicRTB", PRODUCTION_NETWORK, RouteScope::Public, "fh-prod-eu-public-rtb"),
    ];
    for (name, network, scope, tag) in route_tables {
        model.declare(
            name,
            RouteTable::new(network, scope)
                .with_tag("Name", tag)
                .with_tag("stack", "production"),
        )?;
    }

    model
        .declare(
            "BastionEUPrivateRTBPrivateSubnet1a",
            RouteTableAssociation::new("BastionEUPrivateRTB", "BastionPrivateSubnet1a"),
        )?
        .declare(
            "BastionEUPublicRTBPublicSubnet1a",
            RouteTableAssociation::new("BastionEUPublicRTB", "BastionPublicSubnet1a"),
        )?;

    // Peering
    model.declare(
        "VPCPeeringBstEuProd",
        PeeringLink::new(BASTION_NETWORK, PRODUCTION_NETWORK)
            .with_peer_region(REGION)
            .with_tag("Name", "BstEuVPC-ProdEuVPC-Peering"),
    )?;

    // Jump box security
    model
        .declare(
            "SGbstjumpbox",
            SecurityGroup::new(BASTION_NETWORK, "Allow SSH access from a specific IP")
                .with_tag("Name", "SGbstjumpbox"),
        )?
        .declare(
            "SSHIngress",
            SecurityRule::ingress("SGbstjumpbox", Protocol::Tcp, 22, 22).with_cidr(SSH_SOURCE)?,
        )?
        .declare(
            "EGRESS",
            SecurityRule::egress("SGbstjumpbox", Protocol::All, 0, 0).with_cidr("0.0.0.0/0")?,
        )?;

    // Jump server
    model
        .declare(
            JUMP_SERVER,
            Instance::new("BastionPublicSubnet1a", "ami-0d64bb532e0502c46", "t2.micro")
                .with_security_group("SGbstjumpbox")
                .with_tag("Name", "fh-eu-bst-jump-01"),
        )?
        .declare(
            JUMP_SERVER_OUTPUT,
            Output::new(AttributeRef::new(JUMP_SERVER, "public_ip"))
                .with_description("Public address of the bastion jump server"),
        )?;

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;

    #[test]
    fn test_declares_every_entity() {
        let model = bastion_production().unwrap();
        assert_eq!(model.len(), 22);
        assert_eq!(model.networks().count(), 2);
        assert_eq!(model.subnets().count(), 4);
        assert_eq!(model.route_tables().count(), 4);
        assert_eq!(model.security_rules().count(), 2);
        assert_eq!(model.kind_of(JUMP_SERVER_OUTPUT), Some(ResourceKind::Output));
    }

    #[test]
    fn test_references_resolve() {
        assert!(bastion_production().unwrap().check_references().is_ok());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Entities
//!
//! Typed declarations for every resource kind. Entities never hold each other
//! directly: every cross-entity link is the *name* of the referenced entity,
//! and [`Resource::references`] lists those links so the resource graph can
//! discover dependencies as a separate step.
//!
//! # Invariants (checked by the validator, not at construction)
//!
//! - Subnet block lies inside its network's block
//! - Sibling subnets do not overlap
//! - A network has at most one attached gateway
//! - Security rule ports are ordered and have a source

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::{AddressError, CidrBlock, ResourceKind};

/// Free-form key/value tags
pub type Tags = BTreeMap<String, String>;

/// Attribute every provisioned entity exposes at plan time
pub const ID_ATTRIBUTE: &str = "id";

// ============================================================================
// Networks and subnets
// ============================================================================

/// Isolated virtual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub cidr_block: CidrBlock,
    pub enable_dns_support: bool,
    pub enable_dns_hostnames: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl Network {
    /// Network with DNS support and hostnames enabled
    pub fn new(cidr_block: &str) -> Result<Self, AddressError> {
        Ok(Self {
            cidr_block: CidrBlock::parse(cidr_block)?,
            enable_dns_support: true,
            enable_dns_hostnames: true,
            tags: Tags::new(),
        })
    }

    pub fn with_dns(mut self, support: bool, hostnames: bool) -> Self {
        self.enable_dns_support = support;
        self.enable_dns_hostnames = hostnames;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Sub-range of a network in one availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub network: String,
    pub cidr_block: CidrBlock,
    pub availability_zone: String,
    /// Auto-assign a public address to instances launched here
    pub map_public_ip_on_launch: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl Subnet {
    pub fn new(
        network: impl Into<String>,
        cidr_block: &str,
        availability_zone: impl Into<String>,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            network: network.into(),
            cidr_block: CidrBlock::parse(cidr_block)?,
            availability_zone: availability_zone.into(),
            map_public_ip_on_launch: false,
            tags: Tags::new(),
        })
    }

    /// Mark the subnet as public
    pub fn public(mut self) -> Self {
        self.map_public_ip_on_launch = true;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Gateways and routing
// ============================================================================

/// Internet gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Attachment edge between a gateway and a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayAttachment {
    pub gateway: String,
    pub network: String,
}

impl GatewayAttachment {
    pub fn new(gateway: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            network: network.into(),
        }
    }
}

/// Purpose of a route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteScope {
    Public,
    Private,
}

impl RouteScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for RouteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Route table scoped to one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub network: String,
    pub scope: RouteScope,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl RouteTable {
    pub fn new(network: impl Into<String>, scope: RouteScope) -> Self {
        Self {
            network: network.into(),
            scope,
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Binds one route table to one subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    pub route_table: String,
    pub subnet: String,
}

impl RouteTableAssociation {
    pub fn new(route_table: impl Into<String>, subnet: impl Into<String>) -> Self {
        Self {
            route_table: route_table.into(),
            subnet: subnet.into(),
        }
    }
}

/// Peering connection from a requester network to an accepter network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringLink {
    pub requester: String,
    pub accepter: String,
    /// Region of the accepter; the plan's region when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_region: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl PeeringLink {
    pub fn new(requester: impl Into<String>, accepter: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            accepter: accepter.into(),
            peer_region: None,
            tags: Tags::new(),
        }
    }

    pub fn with_peer_region(mut self, region: impl Into<String>) -> Self {
        self.peer_region = Some(region.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Order-independent identity of the linked pair
    pub fn unordered_pair(&self) -> (&str, &str) {
        if self.requester <= self.accepter {
            (&self.requester, &self.accepter)
        } else {
            (&self.accepter, &self.requester)
        }
    }
}

// ============================================================================
// Security policy
// ============================================================================

/// Named traffic policy within one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub network: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl SecurityGroup {
    pub fn new(network: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            description: description.into(),
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::Egress => "egress",
        }
    }
}

/// Rule protocol; `All` is the `-1` wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    All,
}

impl Protocol {
    /// Wildcard sentinel for ports and protocol
    pub const WILDCARD: &'static str = "-1";

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "tcp" | "6" => Some(Self::Tcp),
            "udp" | "17" => Some(Self::Udp),
            "icmp" | "1" => Some(Self::Icmp),
            "-1" | "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
            Self::All => Self::WILDCARD,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single allow rule of a security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub security_group: String,
    pub direction: Direction,
    pub protocol: Protocol,
    pub from_port: i32,
    pub to_port: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidr_blocks: Vec<CidrBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_security_group: Option<String>,
}

impl SecurityRule {
    /// Port range rule with no source yet
    pub fn new(
        security_group: impl Into<String>,
        direction: Direction,
        protocol: Protocol,
        from_port: i32,
        to_port: i32,
    ) -> Self {
        Self {
            security_group: security_group.into(),
            direction,
            protocol,
            from_port,
            to_port,
            cidr_blocks: Vec::new(),
            source_security_group: None,
        }
    }

    pub fn ingress(security_group: impl Into<String>, protocol: Protocol, from_port: i32, to_port: i32) -> Self {
        Self::new(security_group, Direction::Ingress, protocol, from_port, to_port)
    }

    pub fn egress(security_group: impl Into<String>, protocol: Protocol, from_port: i32, to_port: i32) -> Self {
        Self::new(security_group, Direction::Egress, protocol, from_port, to_port)
    }

    pub fn with_cidr(mut self, block: &str) -> Result<Self, AddressError> {
        self.cidr_blocks.push(CidrBlock::parse(block)?);
        Ok(self)
    }

    pub fn with_source_group(mut self, group: impl Into<String>) -> Self {
        self.source_security_group = Some(group.into());
        self
    }
}

// ============================================================================
// Compute and outputs
// ============================================================================

/// Compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub subnet: String,
    /// Machine image identifier
    pub ami: String,
    /// Size class
    pub instance_type: String,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl Instance {
    pub fn new(
        subnet: impl Into<String>,
        ami: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            subnet: subnet.into(),
            ami: ami.into(),
            instance_type: instance_type.into(),
            security_groups: Vec::new(),
            tags: Tags::new(),
        }
    }

    pub fn with_security_group(mut self, group: impl Into<String>) -> Self {
        self.security_groups.push(group.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// `<entity>.<attribute>` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRef {
    pub entity: String,
    pub attribute: String,
}

impl AttributeRef {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Reference to an entity's plan-time identifier
    pub fn id_of(entity: impl Into<String>) -> Self {
        Self::new(entity, ID_ATTRIBUTE)
    }

    /// Parse `entity.attribute`; the attribute is everything after the last dot
    pub fn parse(text: &str) -> Option<Self> {
        let (entity, attribute) = text.rsplit_once('.')?;
        if entity.is_empty() || attribute.is_empty() {
            return None;
        }
        Some(Self::new(entity, attribute))
    }

    /// Binding table key
    pub fn key(&self) -> String {
        format!("{}.{}", self.entity, self.attribute)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.attribute)
    }
}

/// Named value exposed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub source: AttributeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Output {
    pub fn new(source: AttributeRef) -> Self {
        Self {
            source,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ============================================================================
// Resource sum type
// ============================================================================

/// Any declarable entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Network(Network),
    Subnet(Subnet),
    Gateway(Gateway),
    GatewayAttachment(GatewayAttachment),
    RouteTable(RouteTable),
    RouteTableAssociation(RouteTableAssociation),
    PeeringLink(PeeringLink),
    SecurityGroup(SecurityGroup),
    SecurityRule(SecurityRule),
    Instance(Instance),
    Output(Output),
}

/// A reference held in one of an entity's fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    pub field: &'static str,
    pub target: String,
    /// Required kind of the target; `None` accepts any kind
    pub expected: Option<ResourceKind>,
}

impl FieldReference {
    fn typed(field: &'static str, target: &str, expected: ResourceKind) -> Self {
        Self {
            field,
            target: target.to_string(),
            expected: Some(expected),
        }
    }
}

/// Where an emitted attribute's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSource {
    Literal(Value),
    Ref(AttributeRef),
    RefList(Vec<AttributeRef>),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Network(_) => ResourceKind::Network,
            Self::Subnet(_) => ResourceKind::Subnet,
            Self::Gateway(_) => ResourceKind::Gateway,
            Self::GatewayAttachment(_) => ResourceKind::GatewayAttachment,
            Self::RouteTable(_) => ResourceKind::RouteTable,
            Self::RouteTableAssociation(_) => ResourceKind::RouteTableAssociation,
            Self::PeeringLink(_) => ResourceKind::PeeringLink,
            Self::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Self::SecurityRule(_) => ResourceKind::SecurityRule,
            Self::Instance(_) => ResourceKind::Instance,
            Self::Output(_) => ResourceKind::Output,
        }
    }

    /// Every named reference held in the entity's fields, in field order
    pub fn references(&self) -> Vec<FieldReference> {
        use ResourceKind as K;

        match self {
            Self::Network(_) | Self::Gateway(_) => Vec::new(),
            Self::Subnet(s) => vec![FieldReference::typed("network", &s.network, K::Network)],
            Self::GatewayAttachment(a) => vec![
                FieldReference::typed("gateway", &a.gateway, K::Gateway),
                FieldReference::typed("network", &a.network, K::Network),
            ],
            Self::RouteTable(rt) => vec![FieldReference::typed("network", &rt.network, K::Network)],
            Self::RouteTableAssociation(a) => vec![
                FieldReference::typed("route_table", &a.route_table, K::RouteTable),
                FieldReference::typed("subnet", &a.subnet, K::Subnet),
            ],
            Self::PeeringLink(p) => vec![
                FieldReference::typed("requester", &p.requester, K::Network),
                FieldReference::typed("accepter", &p.accepter, K::Network),
            ],
            Self::SecurityGroup(sg) => vec![FieldReference::typed("network", &sg.network, K::Network)],
            Self::SecurityRule(rule) => {
                let mut refs = vec![FieldReference::typed(
                    "security_group",
                    &rule.security_group,
                    K::SecurityGroup,
                )];
                if let Some(source) = &rule.source_security_group {
                    refs.push(FieldReference::typed(
                        "source_security_group",
                        source,
                        K::SecurityGroup,
                    ));
                }
                refs
            }
            Self::Instance(i) => {
                let mut refs = vec![FieldReference::typed("subnet", &i.subnet, K::Subnet)];
                refs.extend(
                    i.security_groups
                        .iter()
                        .map(|sg| FieldReference::typed("security_groups", sg, K::SecurityGroup)),
                );
                refs
            }
            Self::Output(o) => vec![FieldReference {
                field: "source",
                target: o.source.entity.clone(),
                expected: None,
            }],
        }
    }

    /// Entity tags, for taggable kinds
    pub fn tags(&self) -> Option<&Tags> {
        match self {
            Self::Network(n) => Some(&n.tags),
            Self::Subnet(s) => Some(&s.tags),
            Self::Gateway(g) => Some(&g.tags),
            Self::RouteTable(rt) => Some(&rt.tags),
            Self::PeeringLink(p) => Some(&p.tags),
            Self::SecurityGroup(sg) => Some(&sg.tags),
            Self::Instance(i) => Some(&i.tags),
            _ => None,
        }
    }

    /// Attributes handed to the engine, excluding tags and the peer region default
    pub fn attribute_sources(&self) -> Vec<(&'static str, AttributeSource)> {
        use AttributeSource::{Literal, Ref, RefList};

        match self {
            Self::Network(n) => vec![
                ("cidr_block", Literal(json!(n.cidr_block.as_cidr()))),
                ("enable_dns_support", Literal(json!(n.enable_dns_support))),
                ("enable_dns_hostnames", Literal(json!(n.enable_dns_hostnames))),
            ],
            Self::Subnet(s) => vec![
                ("network_id", Ref(AttributeRef::id_of(&s.network))),
                ("cidr_block", Literal(json!(s.cidr_block.as_cidr()))),
                ("availability_zone", Literal(json!(s.availability_zone))),
                ("map_public_ip_on_launch", Literal(json!(s.map_public_ip_on_launch))),
            ],
            Self::Gateway(_) => Vec::new(),
            Self::GatewayAttachment(a) => vec![
                ("gateway_id", Ref(AttributeRef::id_of(&a.gateway))),
                ("network_id", Ref(AttributeRef::id_of(&a.network))),
            ],
            Self::RouteTable(rt) => vec![
                ("network_id", Ref(AttributeRef::id_of(&rt.network))),
                ("scope", Literal(json!(rt.scope.as_str()))),
            ],
            Self::RouteTableAssociation(a) => vec![
                ("route_table_id", Ref(AttributeRef::id_of(&a.route_table))),
                ("subnet_id", Ref(AttributeRef::id_of(&a.subnet))),
            ],
            Self::PeeringLink(p) => vec![
                ("requester_id", Ref(AttributeRef::id_of(&p.requester))),
                ("accepter_id", Ref(AttributeRef::id_of(&p.accepter))),
            ],
            Self::SecurityGroup(sg) => vec![
                ("network_id", Ref(AttributeRef::id_of(&sg.network))),
                ("description", Literal(json!(sg.description))),
            ],
            Self::SecurityRule(rule) => {
                let mut attrs = vec![
                    ("security_group_id", Ref(AttributeRef::id_of(&rule.security_group))),
                    ("type", Literal(json!(rule.direction.as_str()))),
                    ("protocol", Literal(json!(rule.protocol.as_str()))),
                    ("from_port", Literal(json!(rule.from_port))),
                    ("to_port", Literal(json!(rule.to_port))),
                ];
                if !rule.cidr_blocks.is_empty() {
                    let blocks: Vec<String> = rule.cidr_blocks.iter().map(CidrBlock::as_cidr).collect();
                    attrs.push(("cidr_blocks", Literal(json!(blocks))));
                }
                if let Some(source) = &rule.source_security_group {
                    attrs.push(("source_security_group_id", Ref(AttributeRef::id_of(source))));
                }
                attrs
            }
            Self::Instance(i) => vec![
                ("subnet_id", Ref(AttributeRef::id_of(&i.subnet))),
                ("ami", Literal(json!(i.ami))),
                ("instance_type", Literal(json!(i.instance_type))),
                (
                    "security_group_ids",
                    RefList(i.security_groups.iter().map(AttributeRef::id_of).collect()),
                ),
            ],
            Self::Output(o) => vec![("value", Ref(o.source.clone()))],
        }
    }

    /// Whether `attribute` can be read from this entity by another declaration
    pub fn exposes(&self, attribute: &str) -> bool {
        if attribute == ID_ATTRIBUTE && self.kind().is_provisioned() {
            return true;
        }
        self.kind().deferred_attributes().contains(&attribute)
            || self
                .attribute_sources()
                .iter()
                .any(|(name, source)| *name == attribute && matches!(source, AttributeSource::Literal(_)))
    }
}

macro_rules! impl_from_entity {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Resource {
                fn from(entity: $variant) -> Self {
                    Resource::$variant(entity)
                }
            }
        )*
    };
}

impl_from_entity!(
    Network,
    Subnet,
    Gateway,
    GatewayAttachment,
    RouteTable,
    RouteTableAssociation,
    PeeringLink,
    SecurityGroup,
    SecurityRule,
    Instance,
    Output,
);

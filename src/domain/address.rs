// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Space Value Objects
//!
//! CIDR blocks for a single address family (IPv4). All arithmetic is done on
//! the integral representation of the address, so containment and overlap are
//! plain range comparisons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u32),
}

/// IPv4 CIDR block
///
/// Invariants:
/// - Valid dotted-quad base address
/// - Prefix length 0-32
///
/// The base address is kept as written. [`CidrBlock::is_aligned`] reports
/// whether the host bits are zero; range arithmetic always uses the masked
/// network address.
///
/// # Examples
///
/// ```rust
/// use cim_network_topology::domain::CidrBlock;
///
/// let block = CidrBlock::parse("10.10.1.0/24").unwrap();
/// assert_eq!(block.prefix_length(), 24);
/// assert_eq!(block.size(), 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock {
    base: u32,
    prefix_length: u8,
}

impl CidrBlock {
    /// Widest prefix for the address family
    pub const MAX_PREFIX: u8 = 32;

    /// Parse `a.b.c.d/n`
    pub fn parse(text: impl AsRef<str>) -> Result<Self, AddressError> {
        let text = text.as_ref().trim();

        let (addr_str, prefix_str) = text
            .split_once('/')
            .ok_or_else(|| AddressError::InvalidCidr(text.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| AddressError::InvalidIpAddress(addr_str.to_string()))?;

        if prefix_str.is_empty() || !prefix_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::InvalidCidr(text.to_string()));
        }
        let prefix = prefix_str
            .parse::<u32>()
            .map_err(|_| AddressError::InvalidCidr(text.to_string()))?;

        if prefix > u32::from(Self::MAX_PREFIX) {
            return Err(AddressError::InvalidPrefixLength(prefix));
        }

        Ok(Self {
            base: u32::from(address),
            prefix_length: prefix as u8,
        })
    }

    /// Create from an address and prefix length
    pub fn from_parts(address: Ipv4Addr, prefix_length: u8) -> Result<Self, AddressError> {
        if prefix_length > Self::MAX_PREFIX {
            return Err(AddressError::InvalidPrefixLength(u32::from(prefix_length)));
        }
        Ok(Self {
            base: u32::from(address),
            prefix_length,
        })
    }

    /// Base address as written
    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.base)
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    fn mask(&self) -> u32 {
        match self.prefix_length {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n)),
        }
    }

    /// First address of the block
    pub fn first(&self) -> u32 {
        self.base & self.mask()
    }

    /// Last address of the block
    pub fn last(&self) -> u32 {
        self.first() | !self.mask()
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    /// Whether the host bits of the written address are zero
    pub fn is_aligned(&self) -> bool {
        self.base == self.first()
    }

    /// Canonical network address form
    pub fn network(&self) -> Self {
        Self {
            base: self.first(),
            prefix_length: self.prefix_length,
        }
    }

    /// True iff every address of `inner` lies within `self`
    pub fn contains(&self, inner: &CidrBlock) -> bool {
        contains(self, inner)
    }

    /// True iff the two blocks share at least one address
    pub fn overlaps(&self, other: &CidrBlock) -> bool {
        overlaps(self, other)
    }

    /// Canonical `a.b.c.d/n` string
    pub fn as_cidr(&self) -> String {
        format!("{}/{}", self.address(), self.prefix_length)
    }
}

/// Parse a CIDR string into a block
pub fn parse_block(text: &str) -> Result<CidrBlock, AddressError> {
    CidrBlock::parse(text)
}

/// True iff every address representable by `inner` is within `outer`
pub fn contains(outer: &CidrBlock, inner: &CidrBlock) -> bool {
    outer.first() <= inner.first() && inner.last() <= outer.last()
}

/// True iff the ranges share at least one address
pub fn overlaps(a: &CidrBlock, b: &CidrBlock) -> bool {
    a.first() <= b.last() && b.first() <= a.last()
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cidr())
    }
}

impl FromStr for CidrBlock {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CidrBlock> for String {
    fn from(block: CidrBlock) -> Self {
        block.as_cidr()
    }
}

//! # Addresses and routes
//!
//! An [`Address`] is a `scheme:identifier` pair. The scheme picks the inbox a
//! transport delivers to; the identifier is what the receiving side looks up in
//! its handler registry.
//!
//! A [`Route`] is the ordered list of hops a message travels. Only the first hop
//! matters for dispatch; later hops are carried along for the transport.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::error::Result;

/// A `scheme:identifier` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    scheme: String,
    id: String,
}

impl Address {
    pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
        }
    }

    /// Parses `scheme:identifier`. Only the first `:` splits, so identifiers may
    /// contain colons of their own.
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, id) = raw
            .split_once(':')
            .ok_or_else(|| Error::MissingScheme(raw.to_string()))?;

        if scheme.is_empty() {
            return Err(Error::EmptyScheme(raw.to_string()));
        }
        if id.is_empty() {
            return Err(Error::EmptyIdentifier(raw.to_string()));
        }

        Ok(Self::new(scheme, id))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The scheme-specific part, used as the registry key.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.id)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// An ordered, immutable sequence of hops.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    hops: Vec<Address>,
}

impl Route {
    pub fn new(hops: Vec<Address>) -> Self {
        Self { hops }
    }

    /// A single-hop route straight to `address`.
    pub fn to(address: Address) -> Self {
        Self { hops: vec![address] }
    }

    /// The primary hop, if the route has any.
    pub fn first(&self) -> Option<&Address> {
        self.hops.first()
    }

    pub fn hops(&self) -> &[Address] {
        &self.hops
    }
}

impl From<Address> for Route {
    fn from(address: Address) -> Self {
        Self::to(address)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hops = self.hops.iter();
        match hops.next() {
            Some(first) => write!(f, "{}", first)?,
            None => return write!(f, "<empty route>"),
        }
        for hop in hops {
            write!(f, " > {}", hop)?;
        }
        Ok(())
    }
}

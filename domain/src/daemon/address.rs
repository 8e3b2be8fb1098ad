//! Strict parsing of the `host:port` address advertised by the daemon.
//!
//! The daemon always listens on an IPv4 loopback address, so anything other
//! than four decimal octets and a decimal port is rejected outright.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use thiserror::Error;

/// Reasons an advertised address is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address contains internal whitespace: {0:?}")]
    InternalWhitespace(String),

    #[error("address is not of the form host:port: {0:?}")]
    MissingPort(String),

    #[error("host is not four dot-separated octets: {0:?}")]
    InvalidHost(String),

    #[error("octet out of range [0, 255]: {0:?}")]
    InvalidOctet(String),

    #[error("port is not a number in [0, 65535]: {0:?}")]
    InvalidPort(String),
}

/// A validated daemon socket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self { host, port }
    }

    /// Parse `host:port`, trimming surrounding whitespace.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let trimmed = address.trim();
        if trimmed.chars().any(char::is_whitespace) {
            return Err(AddressError::InternalWhitespace(address.to_string()));
        }

        let mut parts = trimmed.split(':');
        let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AddressError::MissingPort(address.to_string()));
        };

        let octets: Vec<&str> = host.split('.').collect();
        if octets.len() != 4 {
            return Err(AddressError::InvalidHost(host.to_string()));
        }
        let mut bytes = [0u8; 4];
        for (slot, octet) in bytes.iter_mut().zip(&octets) {
            *slot = parse_decimal(octet)
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| AddressError::InvalidOctet(octet.to_string()))?;
        }

        let port = parse_decimal(port)
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| AddressError::InvalidPort(port.to_string()))?;

        Ok(Self {
            host: Ipv4Addr::from(bytes),
            port,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

/// Digits only; no sign, no empty string. Capped well above any valid value.
fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 9 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for Endpoint {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

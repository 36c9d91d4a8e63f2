//! The UDP engine: one shared socket multiplexing discovery, queries, sets
//! and pings across every light on the LAN.

mod bulb;
mod client;
mod endpoint;

pub use bulb::{
	Bulb, BulbState, DeviceInfo, DeviceTime, Firmware, Group, LightPower, Location, Version,
};
pub use client::{Client, Config, DiscoverLights};

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Where a light lives: host, service port, and the 8-byte target from its
/// frame address (a 6-byte MAC padded with two zero bytes).
///
/// Equality on this triple identifies a specific light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightAddr {
	pub host: IpAddr,
	pub port: u16,
	pub target: [u8; 8],
}

impl LightAddr {
	pub(crate) fn socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.host, self.port)
	}
}

impl fmt::Display for LightAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mac = &self.target[..6];
		write!(
			f,
			"{}:{} ({:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x})",
			self.host, self.port, mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
		)
	}
}

/// How the receive loop finds the waiter for a state reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ReplyKey {
	/// A reply from one specific light.
	Directed {
		host: IpAddr,
		port: u16,
		target: [u8; 8],
		code: u16,
	},
	/// Any reply of the given type, regardless of sender; used by discovery.
	Broadcast { code: u16 },
}

impl ReplyKey {
	pub(crate) fn directed(addr: &LightAddr, code: u16) -> ReplyKey {
		ReplyKey::Directed {
			host: addr.host,
			port: addr.port,
			target: addr.target,
			code,
		}
	}

	pub(crate) fn from_datagram(addr: SocketAddr, target: [u8; 8], code: u16) -> ReplyKey {
		ReplyKey::Directed {
			host: addr.ip(),
			port: addr.port(),
			target,
			code,
		}
	}
}

/// How the receive loop finds the waiter for an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SeqKey {
	host: IpAddr,
	port: u16,
	target: [u8; 8],
	sequence: u8,
}

impl SeqKey {
	pub(crate) fn new(addr: &LightAddr, sequence: u8) -> SeqKey {
		SeqKey {
			host: addr.host,
			port: addr.port,
			target: addr.target,
			sequence,
		}
	}

	pub(crate) fn from_datagram(addr: SocketAddr, target: [u8; 8], sequence: u8) -> SeqKey {
		SeqKey {
			host: addr.ip(),
			port: addr.port(),
			target,
			sequence,
		}
	}
}

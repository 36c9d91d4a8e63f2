use crate::bitfield::{record, BitfieldError, Field, Schema};
use crate::error::Error;

/// The UDP port LIFX devices listen on, at both ends of the conversation.
pub const LIFX_PORT: u16 = 56700;

/// Protocol number carried by every frame: must be 1024 (decimal).
pub const PROTOCOL_VERSION: u16 = 1024;

/// Total size of the three wire headers that precede every payload.
pub const HEADER_BYTES: usize = 36;

static FRAME: Schema = Schema::new(
	"Frame",
	&[
		Field::uint("size", 16),
		Field::uint("origin", 2),
		Field::bool("tagged", 1),
		Field::bool("addressable", 1),
		Field::uint("protocol", 12),
		Field::bytes("source", 32),
	],
);

static FRAME_ADDRESS: Schema = Schema::new(
	"FrameAddress",
	&[
		Field::bytes("target", 64),
		Field::reserved(48),
		Field::reserved(6),
		Field::bool("ack_required", 1),
		Field::bool("res_required", 1),
		Field::uint("sequence", 8),
	],
);

static PROTOCOL_HEADER: Schema = Schema::new(
	"ProtocolHeader",
	&[
		Field::reserved(64),
		Field::uint("type", 16),
		Field::reserved(16),
	],
);

/// The Frame section contains information about the following:
///
/// * Size of the entire message
/// * LIFX Protocol number: must be 1024 (decimal)
/// * Use of the Frame Address target field
/// * Source identifier
///
/// The `tagged` field is a boolean that indicates whether the Frame Address
/// target field is being used to address an individual device or all devices.
/// If `tagged` is true, then the `target` field should be all zeros.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
	/// 16 bits: Size of entire message in bytes including this field
	pub size: u16,

	/// 2 bits: Message origin indicator: must be zero (0)
	pub origin: u8,

	/// 1 bit: Determines usage of the Frame Address target field
	pub tagged: bool,

	/// 1 bit: Message includes a target address: must be one (1)
	pub addressable: bool,

	/// 12 bits: Protocol number: must be 1024 (decimal)
	pub protocol: u16,

	/// 32 bits: Source identifier: unique value set by the client, used by
	/// responses.
	///
	/// If this packet is a reply, then this source field will be set to the
	/// same value as the client-sent request packet.
	pub source: [u8; 4],
}

/// The Frame Address section contains the following routing information:
///
/// * Target device address
/// * Acknowledgement message is required flag
/// * State response message is required flag
/// * Message sequence number
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAddress {
	/// 64 bits: 6 byte device address (MAC address) left-padded to 8 bytes,
	/// or all zeros to mean all devices
	pub target: [u8; 8],

	/// 1 bit: Acknowledgement message required
	pub ack_required: bool,

	/// 1 bit: Response message required
	pub res_required: bool,

	/// 8 bits: Wrap around message sequence number
	pub sequence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolHeader {
	/// 16 bits: Message type determines the payload being used
	pub typ: u16,
}

impl Frame {
	/// packed size, in bytes
	pub(crate) fn packed_size() -> usize {
		FRAME.total_bytes()
	}

	pub(crate) fn pack(&self) -> Result<Vec<u8>, BitfieldError> {
		record!(
			FRAME;
			self.size,
			self.origin,
			self.tagged,
			self.addressable,
			self.protocol,
			self.source
		)?
		.to_bytes()
	}

	pub(crate) fn unpack(v: &[u8]) -> Result<Frame, Error> {
		let rec = FRAME.from_bytes(v)?;
		let frame = Frame {
			size: rec.get("size")?,
			origin: rec.get("origin")?,
			tagged: rec.get("tagged")?,
			addressable: rec.get("addressable")?,
			protocol: rec.get("protocol")?,
			source: rec.get("source")?,
		};
		if frame.protocol != PROTOCOL_VERSION {
			return Err(Error::ProtocolError(format!(
				"unpacked frame had protocol version {}",
				frame.protocol
			)));
		}
		Ok(frame)
	}
}

impl FrameAddress {
	pub(crate) fn packed_size() -> usize {
		FRAME_ADDRESS.total_bytes()
	}

	pub(crate) fn pack(&self) -> Result<Vec<u8>, BitfieldError> {
		record!(
			FRAME_ADDRESS;
			self.target,
			self.ack_required,
			self.res_required,
			self.sequence
		)?
		.to_bytes()
	}

	pub(crate) fn unpack(v: &[u8]) -> Result<FrameAddress, Error> {
		let rec = FRAME_ADDRESS.from_bytes(v)?;
		Ok(FrameAddress {
			target: rec.get("target")?,
			ack_required: rec.get("ack_required")?,
			res_required: rec.get("res_required")?,
			sequence: rec.get("sequence")?,
		})
	}
}

impl ProtocolHeader {
	pub(crate) fn packed_size() -> usize {
		PROTOCOL_HEADER.total_bytes()
	}

	pub(crate) fn pack(&self) -> Result<Vec<u8>, BitfieldError> {
		record!(PROTOCOL_HEADER; self.typ)?.to_bytes()
	}

	pub(crate) fn unpack(v: &[u8]) -> Result<ProtocolHeader, Error> {
		let rec = PROTOCOL_HEADER.from_bytes(v)?;
		Ok(ProtocolHeader {
			typ: rec.get("type")?,
		})
	}
}

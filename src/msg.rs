use crate::bitfield::{record, BitfieldError, Field, Schema};
use crate::color::{HSBK_SCHEMA, HSBK};
use crate::error::Error;
use crate::protocol::{Frame, FrameAddress, ProtocolHeader, HEADER_BYTES, PROTOCOL_VERSION};

/// The message-type codes this library speaks.
pub(crate) mod wire {
	pub const GET_SERVICE: u16 = 2;
	pub const STATE_SERVICE: u16 = 3;
	pub const GET_HOST_INFO: u16 = 12;
	pub const STATE_HOST_INFO: u16 = 13;
	pub const GET_HOST_FIRMWARE: u16 = 14;
	pub const STATE_HOST_FIRMWARE: u16 = 15;
	pub const GET_WIFI_INFO: u16 = 16;
	pub const STATE_WIFI_INFO: u16 = 17;
	pub const GET_WIFI_FIRMWARE: u16 = 18;
	pub const STATE_WIFI_FIRMWARE: u16 = 19;
	pub const GET_POWER: u16 = 20;
	pub const SET_POWER: u16 = 21;
	pub const STATE_POWER: u16 = 22;
	pub const GET_LABEL: u16 = 23;
	pub const SET_LABEL: u16 = 24;
	pub const STATE_LABEL: u16 = 25;
	pub const GET_VERSION: u16 = 32;
	pub const STATE_VERSION: u16 = 33;
	pub const GET_INFO: u16 = 34;
	pub const STATE_INFO: u16 = 35;
	pub const ACKNOWLEDGEMENT: u16 = 45;
	pub const GET_LOCATION: u16 = 48;
	pub const STATE_LOCATION: u16 = 50;
	pub const GET_GROUP: u16 = 51;
	pub const STATE_GROUP: u16 = 53;
	pub const ECHO_REQUEST: u16 = 58;
	pub const ECHO_RESPONSE: u16 = 59;
	pub const LIGHT_GET: u16 = 101;
	pub const LIGHT_SET_COLOR: u16 = 102;
	pub const LIGHT_STATE: u16 = 107;
	pub const LIGHT_GET_POWER: u16 = 116;
	pub const LIGHT_SET_POWER: u16 = 117;
	pub const LIGHT_STATE_POWER: u16 = 118;
}

static EMPTY: Schema = Schema::new("Empty", &[]);

static STATE_SERVICE: Schema = Schema::new(
	"StateService",
	&[Field::uint("service", 8), Field::uint("port", 32)],
);

static STATE_DEVICE_INFO: Schema = Schema::new(
	"StateDeviceInfo",
	&[
		Field::float("signal", 32),
		Field::uint("tx", 32),
		Field::uint("rx", 32),
		Field::reserved(16),
	],
);

static STATE_FIRMWARE: Schema = Schema::new(
	"StateFirmware",
	&[
		Field::uint("build", 64),
		Field::reserved(64),
		Field::uint("version", 32),
	],
);

static POWER_LEVEL: Schema = Schema::new("PowerLevel", &[Field::uint("level", 16)]);

static LABEL: Schema = Schema::new("Label", &[Field::bytes("label", 32 * 8)]);

static STATE_VERSION: Schema = Schema::new(
	"StateVersion",
	&[
		Field::uint("vendor", 32),
		Field::uint("product", 32),
		Field::uint("version", 32),
	],
);

static STATE_INFO: Schema = Schema::new(
	"StateInfo",
	&[
		Field::uint("time", 64),
		Field::uint("uptime", 64),
		Field::uint("downtime", 64),
	],
);

static STATE_LOCATION: Schema = Schema::new(
	"StateLocation",
	&[
		Field::bytes("location", 16 * 8),
		Field::bytes("label", 32 * 8),
		Field::uint("updated_at", 64),
	],
);

static STATE_GROUP: Schema = Schema::new(
	"StateGroup",
	&[
		Field::bytes("group", 16 * 8),
		Field::bytes("label", 32 * 8),
		Field::uint("updated_at", 64),
	],
);

static ECHO: Schema = Schema::new("Echo", &[Field::bytes("payload", 64 * 8)]);

static LIGHT_SET_COLOR: Schema = Schema::new(
	"LightSetColor",
	&[
		Field::reserved(8),
		Field::record("color", &HSBK_SCHEMA),
		Field::uint("duration", 32),
	],
);

static LIGHT_STATE: Schema = Schema::new(
	"LightState",
	&[
		Field::record("color", &HSBK_SCHEMA),
		Field::reserved(16),
		Field::uint("power", 16),
		Field::bytes("label", 32 * 8),
		Field::reserved(64),
	],
);

static LIGHT_SET_POWER: Schema = Schema::new(
	"LightSetPower",
	&[Field::uint("level", 16), Field::uint("duration", 32)],
);

/// The payload schema registered for a message-type code, or `None` for
/// codes this library does not know.  Each code maps to at most one schema.
pub fn payload_schema(code: u16) -> Option<&'static Schema> {
	Some(match code {
		wire::GET_SERVICE
		| wire::GET_HOST_INFO
		| wire::GET_HOST_FIRMWARE
		| wire::GET_WIFI_INFO
		| wire::GET_WIFI_FIRMWARE
		| wire::GET_POWER
		| wire::GET_LABEL
		| wire::GET_VERSION
		| wire::GET_INFO
		| wire::ACKNOWLEDGEMENT
		| wire::GET_LOCATION
		| wire::GET_GROUP
		| wire::LIGHT_GET
		| wire::LIGHT_GET_POWER => &EMPTY,
		wire::STATE_SERVICE => &STATE_SERVICE,
		wire::STATE_HOST_INFO | wire::STATE_WIFI_INFO => &STATE_DEVICE_INFO,
		wire::STATE_HOST_FIRMWARE | wire::STATE_WIFI_FIRMWARE => &STATE_FIRMWARE,
		wire::SET_POWER | wire::STATE_POWER | wire::LIGHT_STATE_POWER => &POWER_LEVEL,
		wire::SET_LABEL | wire::STATE_LABEL => &LABEL,
		wire::STATE_VERSION => &STATE_VERSION,
		wire::STATE_INFO => &STATE_INFO,
		wire::STATE_LOCATION => &STATE_LOCATION,
		wire::STATE_GROUP => &STATE_GROUP,
		wire::ECHO_REQUEST | wire::ECHO_RESPONSE => &ECHO,
		wire::LIGHT_SET_COLOR => &LIGHT_SET_COLOR,
		wire::LIGHT_STATE => &LIGHT_STATE,
		wire::LIGHT_SET_POWER => &LIGHT_SET_POWER,
		_ => return None,
	})
}

/// Options used to construct a [RawMessage].
///
/// See also [RawMessage::build].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
	/// If not `None`, this is the address of the device you want to talk to.
	///
	/// To look up the address of a device, extract it from the
	/// [FrameAddress::target] field when a device sends a
	/// [Message::StateService] message.
	pub target: Option<[u8; 8]>,
	/// Acknowledgement message required.
	///
	/// Causes the light to send a [Message::Acknowledgement] message.
	pub ack_required: bool,
	/// Response message required.
	pub res_required: bool,
	/// A wrap around sequence number.  Echoed by replies, which lets a
	/// client correlate them with requests.
	pub sequence: u8,
	/// A client identifier.  Devices unicast their replies to whichever
	/// address sent a packet with a non-zero source.
	pub source: [u8; 4],
}

/// The raw message structure.
///
/// Contains low-level protocol info.  This is what is sent and received via
/// UDP packets.
///
/// To parse the payload, use [Message::from_raw].
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
	pub frame: Frame,
	pub frame_addr: FrameAddress,
	pub protocol_header: ProtocolHeader,
	pub payload: Vec<u8>,
}

impl RawMessage {
	/// Builds a RawMessage (which is suitable for sending on the network)
	/// from a given [Message].
	///
	/// If [BuildOptions::target] is None then the message is tagged, i.e.
	/// addressed to all devices.
	pub fn build(options: &BuildOptions, typ: Message) -> Result<RawMessage, Error> {
		let frame = Frame {
			size: 0,
			origin: 0,
			tagged: options.target.is_none(),
			addressable: true,
			protocol: PROTOCOL_VERSION,
			source: options.source,
		};
		let frame_addr = FrameAddress {
			target: options.target.unwrap_or([0; 8]),
			ack_required: options.ack_required,
			res_required: options.res_required,
			sequence: options.sequence,
		};
		let protocol_header = ProtocolHeader { typ: typ.code() };
		let payload = typ.to_payload()?;

		let mut msg = RawMessage {
			frame,
			frame_addr,
			protocol_header,
			payload,
		};
		msg.frame.size = msg.packed_size() as u16;

		Ok(msg)
	}

	/// The total size (in bytes) of the packed version of this message.
	pub fn packed_size(&self) -> usize {
		HEADER_BYTES + self.payload.len()
	}

	/// Packs this RawMessage into some bytes that can be sent over the
	/// network.
	///
	/// The length of the returned data will be [RawMessage::packed_size] in
	/// size.
	pub fn pack(&self) -> Result<Vec<u8>, BitfieldError> {
		let mut v = Vec::with_capacity(self.packed_size());
		v.extend(self.frame.pack()?);
		v.extend(self.frame_addr.pack()?);
		v.extend(self.protocol_header.pack()?);
		v.extend(&self.payload);
		Ok(v)
	}

	/// Given some bytes (generally read from a network socket), unpacks the
	/// data into a `RawMessage` structure.
	///
	/// The datagram is truncated to the length the frame claims; a size
	/// shorter than the headers or longer than the datagram is malformed.
	pub fn unpack(v: &[u8]) -> Result<RawMessage, Error> {
		let mut start = 0;
		let frame = Frame::unpack(v)?;
		start += Frame::packed_size();
		let frame_addr = FrameAddress::unpack(&v[start..])?;
		start += FrameAddress::packed_size();
		let protocol_header = ProtocolHeader::unpack(&v[start..])?;

		let size = frame.size as usize;
		if size < HEADER_BYTES || size > v.len() {
			return Err(Error::ProtocolError(format!(
				"frame claims {} bytes in a {}-byte datagram",
				size,
				v.len()
			)));
		}
		let payload = v[HEADER_BYTES..size].to_vec();

		Ok(RawMessage {
			frame,
			frame_addr,
			protocol_header,
			payload,
		})
	}
}

/// Decoded LIFX messages.
///
/// This enum lists all of the LIFX message types known to this library.
/// Note that other message types exist, but are not officially documented.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	/// GetService - 2
	///
	/// Sent by a client to acquire responses from all devices on the local
	/// network.  Causes the devices to transmit a [Message::StateService].
	GetService,

	/// StateService - 3
	///
	/// Response to [Message::GetService].
	StateService {
		/// Maps to the service exposed by the device; 1 is UDP.
		service: u8,
		/// Port number of the light.  If the service is temporarily
		/// unavailable the port value will be 0.
		port: u32,
	},

	/// GetHostInfo - 12
	GetHostInfo,

	/// StateHostInfo - 13
	///
	/// Provides host MCU information.
	StateHostInfo {
		/// radio receive signal strength in milliWatts
		signal: f32,
		/// bytes transmitted since power on
		tx: u32,
		/// bytes received since power on
		rx: u32,
	},

	/// GetHostFirmware - 14
	GetHostFirmware,

	/// StateHostFirmware - 15
	StateHostFirmware {
		/// firmware build time (absolute time in nanoseconds since epoch)
		build: u64,
		/// firmware version
		version: u32,
	},

	/// GetWifiInfo - 16
	GetWifiInfo,

	/// StateWifiInfo - 17
	///
	/// Provides Wifi subsystem information.
	StateWifiInfo {
		signal: f32,
		tx: u32,
		rx: u32,
	},

	/// GetWifiFirmware - 18
	GetWifiFirmware,

	/// StateWifiFirmware - 19
	StateWifiFirmware {
		build: u64,
		version: u32,
	},

	/// GetPower - 20
	GetPower,

	/// SetPower - 21
	SetPower {
		/// normally a u16, but only 0 and 65535 are supported
		level: u16,
	},

	/// StatePower - 22
	StatePower {
		level: u16,
	},

	/// GetLabel - 23
	GetLabel,

	/// SetLabel - 24
	///
	/// Labels longer than their 32-byte wire field are truncated.
	SetLabel {
		label: String,
	},

	/// StateLabel - 25
	StateLabel {
		label: String,
	},

	/// GetVersion - 32
	GetVersion,

	/// StateVersion - 33
	///
	/// Provides the hardware version of the device.
	StateVersion {
		vendor: u32,
		product: u32,
		version: u32,
	},

	/// GetInfo - 34
	GetInfo,

	/// StateInfo - 35
	///
	/// Provides run-time information of device.
	StateInfo {
		/// current time (absolute time in nanoseconds since epoch)
		time: u64,
		/// time since last power on (relative time in nanoseconds)
		uptime: u64,
		/// last power off period (5 second accuracy, in nanoseconds)
		downtime: u64,
	},

	/// Acknowledgement - 45
	///
	/// Response to any message sent with ack_required set to 1.
	///
	/// (Note that technically this message has no payload, but the frame
	/// sequence number is stored here for convenience.)
	Acknowledgement {
		seq: u8,
	},

	/// GetLocation - 48
	GetLocation,

	/// StateLocation - 50
	StateLocation {
		/// GUID byte array
		location: [u8; 16],
		label: String,
		/// UTC timestamp of last label update in nanoseconds
		updated_at: u64,
	},

	/// GetGroup - 51
	GetGroup,

	/// StateGroup - 53
	StateGroup {
		group: [u8; 16],
		label: String,
		updated_at: u64,
	},

	/// EchoRequest - 58
	///
	/// Requests an arbitrary payload be echoed back.
	EchoRequest {
		payload: [u8; 64],
	},

	/// EchoResponse - 59
	EchoResponse {
		payload: [u8; 64],
	},

	/// Get - 101
	///
	/// Sent by a client to obtain the light state.
	LightGet,

	/// SetColor - 102
	///
	/// Sent by a client to change the light state.
	LightSetColor {
		/// Color in HSBK
		color: HSBK,
		/// Color transition time in milliseconds
		duration: u32,
	},

	/// State - 107
	///
	/// Sent by a device to provide the current light state.
	LightState {
		color: HSBK,
		power: u16,
		label: String,
	},

	/// GetPower - 116
	LightGetPower,

	/// SetPower - 117
	///
	/// The power level must be either 0 or 65535; the duration is the power
	/// level transition time in milliseconds.
	LightSetPower {
		level: u16,
		duration: u32,
	},

	/// StatePower - 118
	LightStatePower {
		level: u16,
	},
}

impl Message {
	/// The message-type code put in the protocol header.
	pub fn code(&self) -> u16 {
		match self {
			Message::GetService => wire::GET_SERVICE,
			Message::StateService { .. } => wire::STATE_SERVICE,
			Message::GetHostInfo => wire::GET_HOST_INFO,
			Message::StateHostInfo { .. } => wire::STATE_HOST_INFO,
			Message::GetHostFirmware => wire::GET_HOST_FIRMWARE,
			Message::StateHostFirmware { .. } => wire::STATE_HOST_FIRMWARE,
			Message::GetWifiInfo => wire::GET_WIFI_INFO,
			Message::StateWifiInfo { .. } => wire::STATE_WIFI_INFO,
			Message::GetWifiFirmware => wire::GET_WIFI_FIRMWARE,
			Message::StateWifiFirmware { .. } => wire::STATE_WIFI_FIRMWARE,
			Message::GetPower => wire::GET_POWER,
			Message::SetPower { .. } => wire::SET_POWER,
			Message::StatePower { .. } => wire::STATE_POWER,
			Message::GetLabel => wire::GET_LABEL,
			Message::SetLabel { .. } => wire::SET_LABEL,
			Message::StateLabel { .. } => wire::STATE_LABEL,
			Message::GetVersion => wire::GET_VERSION,
			Message::StateVersion { .. } => wire::STATE_VERSION,
			Message::GetInfo => wire::GET_INFO,
			Message::StateInfo { .. } => wire::STATE_INFO,
			Message::Acknowledgement { .. } => wire::ACKNOWLEDGEMENT,
			Message::GetLocation => wire::GET_LOCATION,
			Message::StateLocation { .. } => wire::STATE_LOCATION,
			Message::GetGroup => wire::GET_GROUP,
			Message::StateGroup { .. } => wire::STATE_GROUP,
			Message::EchoRequest { .. } => wire::ECHO_REQUEST,
			Message::EchoResponse { .. } => wire::ECHO_RESPONSE,
			Message::LightGet => wire::LIGHT_GET,
			Message::LightSetColor { .. } => wire::LIGHT_SET_COLOR,
			Message::LightState { .. } => wire::LIGHT_STATE,
			Message::LightGetPower => wire::LIGHT_GET_POWER,
			Message::LightSetPower { .. } => wire::LIGHT_SET_POWER,
			Message::LightStatePower { .. } => wire::LIGHT_STATE_POWER,
		}
	}

	/// Serializes the payload through this message's schema.
	pub(crate) fn to_payload(&self) -> Result<Vec<u8>, BitfieldError> {
		match self {
			Message::GetService
			| Message::GetHostInfo
			| Message::GetHostFirmware
			| Message::GetWifiInfo
			| Message::GetWifiFirmware
			| Message::GetPower
			| Message::GetLabel
			| Message::GetVersion
			| Message::GetInfo
			| Message::Acknowledgement { .. }
			| Message::GetLocation
			| Message::GetGroup
			| Message::LightGet
			| Message::LightGetPower => Ok(Vec::new()),
			Message::StateService { service, port } => {
				record!(STATE_SERVICE; *service, *port)?.to_bytes()
			}
			Message::StateHostInfo { signal, tx, rx }
			| Message::StateWifiInfo { signal, tx, rx } => {
				record!(STATE_DEVICE_INFO; *signal, *tx, *rx)?.to_bytes()
			}
			Message::StateHostFirmware { build, version }
			| Message::StateWifiFirmware { build, version } => {
				record!(STATE_FIRMWARE; *build, *version)?.to_bytes()
			}
			Message::SetPower { level }
			| Message::StatePower { level }
			| Message::LightStatePower { level } => record!(POWER_LEVEL; *level)?.to_bytes(),
			Message::SetLabel { label } | Message::StateLabel { label } => {
				record!(LABEL; label.as_str())?.to_bytes()
			}
			Message::StateVersion {
				vendor,
				product,
				version,
			} => record!(STATE_VERSION; *vendor, *product, *version)?.to_bytes(),
			Message::StateInfo {
				time,
				uptime,
				downtime,
			} => record!(STATE_INFO; *time, *uptime, *downtime)?.to_bytes(),
			Message::StateLocation {
				location,
				label,
				updated_at,
			} => record!(STATE_LOCATION; *location, label.as_str(), *updated_at)?.to_bytes(),
			Message::StateGroup {
				group,
				label,
				updated_at,
			} => record!(STATE_GROUP; *group, label.as_str(), *updated_at)?.to_bytes(),
			Message::EchoRequest { payload } | Message::EchoResponse { payload } => {
				record!(ECHO; *payload)?.to_bytes()
			}
			Message::LightSetColor { color, duration } => {
				record!(LIGHT_SET_COLOR; *color, *duration)?.to_bytes()
			}
			Message::LightState {
				color,
				power,
				label,
			} => record!(LIGHT_STATE; *color, *power, label.as_str())?.to_bytes(),
			Message::LightSetPower { level, duration } => {
				record!(LIGHT_SET_POWER; *level, *duration)?.to_bytes()
			}
		}
	}

	/// Tries to parse the payload in a [RawMessage], based on its message
	/// type.
	pub fn from_raw(raw: &RawMessage) -> Result<Message, Error> {
		let code = raw.protocol_header.typ;
		let schema = payload_schema(code).ok_or(Error::UnknownMessageType(code))?;
		let rec = schema.from_bytes(&raw.payload)?;
		Ok(match code {
			wire::GET_SERVICE => Message::GetService,
			wire::STATE_SERVICE => Message::StateService {
				service: rec.get("service")?,
				port: rec.get("port")?,
			},
			wire::GET_HOST_INFO => Message::GetHostInfo,
			wire::STATE_HOST_INFO => Message::StateHostInfo {
				signal: rec.get("signal")?,
				tx: rec.get("tx")?,
				rx: rec.get("rx")?,
			},
			wire::GET_HOST_FIRMWARE => Message::GetHostFirmware,
			wire::STATE_HOST_FIRMWARE => Message::StateHostFirmware {
				build: rec.get("build")?,
				version: rec.get("version")?,
			},
			wire::GET_WIFI_INFO => Message::GetWifiInfo,
			wire::STATE_WIFI_INFO => Message::StateWifiInfo {
				signal: rec.get("signal")?,
				tx: rec.get("tx")?,
				rx: rec.get("rx")?,
			},
			wire::GET_WIFI_FIRMWARE => Message::GetWifiFirmware,
			wire::STATE_WIFI_FIRMWARE => Message::StateWifiFirmware {
				build: rec.get("build")?,
				version: rec.get("version")?,
			},
			wire::GET_POWER => Message::GetPower,
			wire::SET_POWER => Message::SetPower {
				level: rec.get("level")?,
			},
			wire::STATE_POWER => Message::StatePower {
				level: rec.get("level")?,
			},
			wire::GET_LABEL => Message::GetLabel,
			wire::SET_LABEL => Message::SetLabel {
				label: rec.get("label")?,
			},
			wire::STATE_LABEL => Message::StateLabel {
				label: rec.get("label")?,
			},
			wire::GET_VERSION => Message::GetVersion,
			wire::STATE_VERSION => Message::StateVersion {
				vendor: rec.get("vendor")?,
				product: rec.get("product")?,
				version: rec.get("version")?,
			},
			wire::GET_INFO => Message::GetInfo,
			wire::STATE_INFO => Message::StateInfo {
				time: rec.get("time")?,
				uptime: rec.get("uptime")?,
				downtime: rec.get("downtime")?,
			},
			wire::ACKNOWLEDGEMENT => Message::Acknowledgement {
				seq: raw.frame_addr.sequence,
			},
			wire::GET_LOCATION => Message::GetLocation,
			wire::STATE_LOCATION => Message::StateLocation {
				location: rec.get("location")?,
				label: rec.get("label")?,
				updated_at: rec.get("updated_at")?,
			},
			wire::GET_GROUP => Message::GetGroup,
			wire::STATE_GROUP => Message::StateGroup {
				group: rec.get("group")?,
				label: rec.get("label")?,
				updated_at: rec.get("updated_at")?,
			},
			wire::ECHO_REQUEST => Message::EchoRequest {
				payload: rec.get("payload")?,
			},
			wire::ECHO_RESPONSE => Message::EchoResponse {
				payload: rec.get("payload")?,
			},
			wire::LIGHT_GET => Message::LightGet,
			wire::LIGHT_SET_COLOR => Message::LightSetColor {
				color: rec.get("color")?,
				duration: rec.get("duration")?,
			},
			wire::LIGHT_STATE => Message::LightState {
				color: rec.get("color")?,
				power: rec.get("power")?,
				label: rec.get("label")?,
			},
			wire::LIGHT_GET_POWER => Message::LightGetPower,
			wire::LIGHT_SET_POWER => Message::LightSetPower {
				level: rec.get("level")?,
				duration: rec.get("duration")?,
			},
			wire::LIGHT_STATE_POWER => Message::LightStatePower {
				level: rec.get("level")?,
			},
			other => return Err(Error::UnknownMessageType(other)),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn build_a_packet() {
		// packet taken from the LIFX "building a packet" documentation

		let msg = Message::LightSetColor {
			color: HSBK {
				hue: 21845,
				saturation: 0xffff,
				brightness: 0xffff,
				kelvin: 3500,
			},
			duration: 1024,
		};

		let raw = RawMessage::build(
			&BuildOptions {
				target: None,
				ack_required: false,
				res_required: false,
				sequence: 0,
				source: [0; 4],
			},
			msg,
		)
		.unwrap();

		let bytes = raw.pack().unwrap();
		assert_eq!(bytes.len(), 49);
		assert_eq!(
			bytes,
			vec![
				0x31, 0x00, 0x00, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
				0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
				0x00, 0x00, 0x00, 0x00, 0x66, 0x00, 0x00, 0x00, 0x00, 0x55, 0x55, 0xFF, 0xFF, 0xFF,
				0xFF, 0xAC, 0x0D, 0x00, 0x04, 0x00, 0x00
			]
		);
	}

	#[test]
	fn decode_full_header_only() {
		let v = [
			0x24, 0x00, 0x00, 0x14, 0xca, 0x41, 0x37, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x98, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, 0x00, 0x00, 0x33, 0x00, 0x00, 0x00,
		];

		let raw = RawMessage::unpack(&v).unwrap();
		assert_eq!(raw.frame.size as usize, v.len());
		assert_eq!(raw.protocol_header.typ, 0x33);
		assert!(raw.payload.is_empty());
	}

	#[test]
	fn decode_light_state_datagram() {
		let v = [
			0x58, 0x00, 0x00, 0x54, 0xca, 0x41, 0x37, 0x05, 0xd0, 0x73, 0xd5, 0x02, 0x97, 0xde,
			0x00, 0x00, 0x4c, 0x49, 0x46, 0x58, 0x56, 0x32, 0x00, 0xc0, 0x44, 0x30, 0xeb, 0x47,
			0xc4, 0x48, 0x18, 0x14, 0x6b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff,
			0xb8, 0x0b, 0x00, 0x00, 0xff, 0xff, 0x4b, 0x69, 0x74, 0x63, 0x68, 0x65, 0x6e, 0x00,
			0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, 0x00, 0x00,
		];

		let raw = RawMessage::unpack(&v).unwrap();
		assert_eq!(raw.frame_addr.target[..6], [0xd0, 0x73, 0xd5, 0x02, 0x97, 0xde]);

		match Message::from_raw(&raw).unwrap() {
			Message::LightState {
				color,
				power,
				label,
			} => {
				assert_eq!(
					color,
					HSBK {
						hue: 0,
						saturation: 0,
						brightness: 0xffff,
						kelvin: 3000,
					}
				);
				assert_eq!(power, 0xffff);
				assert_eq!(label, "Kitchen");
			}
			other => panic!("expected a light state, got {:?}", other),
		}
	}

	#[test]
	fn size_must_cover_headers_and_fit_datagram() {
		let raw = RawMessage::build(&BuildOptions::default(), Message::GetService).unwrap();
		let mut bytes = raw.pack().unwrap();

		// size larger than the datagram
		bytes[0] = 0xff;
		assert!(matches!(
			RawMessage::unpack(&bytes),
			Err(Error::ProtocolError(_))
		));

		// size smaller than the headers
		bytes[0] = 0x10;
		assert!(matches!(
			RawMessage::unpack(&bytes),
			Err(Error::ProtocolError(_))
		));
	}

	#[test]
	fn truncates_payload_to_claimed_size() {
		let raw = RawMessage::build(
			&BuildOptions::default(),
			Message::StatePower { level: 0xffff },
		)
		.unwrap();
		let mut bytes = raw.pack().unwrap();
		bytes.extend_from_slice(b"trailing junk");

		let back = RawMessage::unpack(&bytes).unwrap();
		assert_eq!(back.payload.len(), 2);
		assert_eq!(back, raw);
	}

	#[test]
	fn unknown_type_is_rejected() {
		let mut raw = RawMessage::build(&BuildOptions::default(), Message::GetService).unwrap();
		raw.protocol_header.typ = 700;
		assert!(matches!(
			Message::from_raw(&raw),
			Err(Error::UnknownMessageType(700))
		));
	}

	#[test]
	fn payload_round_trips() {
		let messages = [
			Message::StateService {
				service: 1,
				port: 56700,
			},
			Message::StateHostInfo {
				signal: 1.5e-5,
				tx: 1234,
				rx: 5678,
			},
			Message::StateHostFirmware {
				build: 1_511_412_934_000_000_000,
				version: (2 << 16) | 60,
			},
			Message::SetPower { level: 65535 },
			Message::StateLabel {
				label: "Bedroom".to_owned(),
			},
			Message::StateVersion {
				vendor: 1,
				product: 27,
				version: 0,
			},
			Message::StateInfo {
				time: 7,
				uptime: 8,
				downtime: 9,
			},
			Message::StateLocation {
				location: [7; 16],
				label: "Home".to_owned(),
				updated_at: 12345,
			},
			Message::StateGroup {
				group: [9; 16],
				label: "Lounge".to_owned(),
				updated_at: 6789,
			},
			Message::EchoRequest { payload: [0xa5; 64] },
			Message::LightSetColor {
				color: HSBK {
					hue: 1,
					saturation: 2,
					brightness: 3,
					kelvin: 4,
				},
				duration: 500,
			},
			Message::LightState {
				color: HSBK {
					hue: 5,
					saturation: 6,
					brightness: 7,
					kelvin: 8,
				},
				power: 65535,
				label: "Desk".to_owned(),
			},
			Message::LightSetPower {
				level: 65535,
				duration: 100,
			},
		];

		for msg in messages {
			let raw = RawMessage::build(&BuildOptions::default(), msg.clone()).unwrap();
			let schema = payload_schema(msg.code()).unwrap();
			assert_eq!(raw.payload.len(), schema.total_bytes(), "{:?}", msg);

			let bytes = raw.pack().unwrap();
			assert_eq!(bytes.len(), raw.frame.size as usize);

			let back = Message::from_raw(&RawMessage::unpack(&bytes).unwrap()).unwrap();
			assert_eq!(back, msg);
		}
	}

	#[test]
	fn every_code_has_one_schema() {
		let codes = [
			2u16, 3, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 32, 33, 34, 35, 45,
			48, 50, 51, 53, 58, 59, 101, 102, 107, 116, 117, 118,
		];
		for code in codes {
			assert!(payload_schema(code).is_some(), "code {}", code);
		}
		assert!(payload_schema(0).is_none());
		assert!(payload_schema(103).is_none());
		assert!(payload_schema(501).is_none());
	}
}

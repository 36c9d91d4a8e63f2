//! Control LIFX lights over your local area network.
//!
//! LIFX bulbs speak a compact binary protocol on UDP port 56700.  This crate
//! implements that protocol in three layers: a declarative [bitfield] codec
//! for packed binary records, the packet framing and message catalog
//! ([Message], [RawMessage]), and a UDP engine ([udp::Client]) that shares
//! one socket between every concurrent operation, retries requests on a
//! fixed schedule, and routes replies back to whoever asked.
//!
//! # Discovery
//!
//! [udp::Client::discover_lights] broadcasts a [Message::GetService] and
//! yields a [udp::Bulb] for each device that answers, as the answers come
//! in.  Each bulb handle can then be queried (label, power, color, firmware,
//! uptime, location, group) and changed (power, color, label), all as plain
//! blocking calls:
//!
//! ```no_run
//! use lumen::udp::Client;
//! use lumen::LightWhite;
//!
//! # fn main() -> Result<(), lumen::Error> {
//! let client = Client::new();
//! for bulb in client.discover_lights()? {
//!     println!("found {}", bulb.get_label()?);
//!     bulb.fade_color(LightWhite { brightness: 1.0, kelvin: 2700 }, 500)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Reserved fields
//!
//! When *constructing* packets, every reserved field is set to zero.  It is
//! however possible to receive packets with reserved fields set to non-zero
//! values; those bits are read and discarded.  Be conservative in what you
//! send, and liberal in what you accept.
//!
//! # Unknown values
//!
//! It's common to see packets from LIFX bulbs that don't match the
//! documented protocol.  These are suspected to be internal messages used by
//! official LIFX apps.  The engine drops them.

pub mod bitfield;
mod color;
mod error;
mod msg;
mod protocol;
pub mod udp;

pub use bitfield::BitfieldError;
pub use color::{describe_kelvin, ColorSetting, LightColor, LightWhite, HSBK};
pub use error::Error;
pub use msg::{payload_schema, BuildOptions, Message, RawMessage};
pub use protocol::{
	Frame, FrameAddress, ProtocolHeader, HEADER_BYTES, LIFX_PORT, PROTOCOL_VERSION,
};

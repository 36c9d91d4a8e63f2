use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::color::ColorSetting;
use crate::error::Error;
use crate::msg::{wire, Message};
use crate::udp::{Client, LightAddr};
use crate::HSBK;

/// Whether a light is lit.  On the wire this is a u16, but only 0 and 65535
/// are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightPower {
	Off,
	On,
}

impl LightPower {
	fn level(self) -> u16 {
		match self {
			LightPower::Off => 0,
			LightPower::On => u16::MAX,
		}
	}

	fn from_level(level: u16) -> LightPower {
		if level == 0 {
			LightPower::Off
		} else {
			LightPower::On
		}
	}
}

impl fmt::Display for LightPower {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LightPower::Off => f.write_str("off"),
			LightPower::On => f.write_str("on"),
		}
	}
}

/// Radio statistics for the host MCU or the Wifi subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceInfo {
	/// receive signal strength in milliWatts
	pub signal: f32,
	/// bytes transmitted since power on
	pub tx: u32,
	/// bytes received since power on
	pub rx: u32,
}

/// A firmware build: when it was made and its version, split into the
/// conventional major/minor halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firmware {
	pub built_at: SystemTime,
	pub major: u16,
	pub minor: u16,
}

/// The hardware version of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
	pub vendor: u32,
	pub product: u32,
	pub version: u32,
}

/// A device's clock and power history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTime {
	/// the device's current wall-clock time
	pub time: SystemTime,
	/// time since last power on
	pub uptime: Duration,
	/// duration of the last power-off period (5 second accuracy)
	pub downtime: Duration,
}

/// The location a device reports: an opaque id, a human label, and when the
/// label was last changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
	pub id: [u8; 16],
	pub label: String,
	pub updated_at: SystemTime,
}

/// Group membership, same shape as [Location].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
	pub id: [u8; 16],
	pub label: String,
	pub updated_at: SystemTime,
}

/// Everything a light reports about what it is currently displaying.
#[derive(Debug, Clone, PartialEq)]
pub struct BulbState {
	pub color: HSBK,
	pub power: LightPower,
	pub label: String,
}

/// One light on the LAN.
///
/// Every method is a blocking network round trip through the shared engine;
/// nothing is cached.  Handles are cheap to clone.
#[derive(Clone)]
pub struct Bulb {
	client: Client,
	addr: LightAddr,
}

fn at_nanos(ns: u64) -> SystemTime {
	UNIX_EPOCH + Duration::from_nanos(ns)
}

/// The receive path routes replies by message type, so a mismatch here
/// means a device violated the protocol.
fn unexpected(msg: Message) -> Error {
	Error::ProtocolError(format!("unexpected reply {:?}", msg))
}

impl Bulb {
	pub(crate) fn new(client: Client, addr: LightAddr) -> Bulb {
		Bulb { client, addr }
	}

	pub fn addr(&self) -> LightAddr {
		self.addr
	}

	/// Checks the light answers echoes.  Fails with [Error::Timeout] when it
	/// does not.
	pub fn ping(&self) -> Result<(), Error> {
		self.client.ping_addr(&self.addr)
	}

	pub fn get_host_info(&self) -> Result<DeviceInfo, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetHostInfo, wire::STATE_HOST_INFO)?
		{
			Message::StateHostInfo { signal, tx, rx } => Ok(DeviceInfo { signal, tx, rx }),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_wifi_info(&self) -> Result<DeviceInfo, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetWifiInfo, wire::STATE_WIFI_INFO)?
		{
			Message::StateWifiInfo { signal, tx, rx } => Ok(DeviceInfo { signal, tx, rx }),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_host_firmware(&self) -> Result<Firmware, Error> {
		match self.client.get_state(
			&self.addr,
			Message::GetHostFirmware,
			wire::STATE_HOST_FIRMWARE,
		)? {
			Message::StateHostFirmware { build, version } => Ok(firmware(build, version)),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_wifi_firmware(&self) -> Result<Firmware, Error> {
		match self.client.get_state(
			&self.addr,
			Message::GetWifiFirmware,
			wire::STATE_WIFI_FIRMWARE,
		)? {
			Message::StateWifiFirmware { build, version } => Ok(firmware(build, version)),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_power(&self) -> Result<LightPower, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetPower, wire::STATE_POWER)?
		{
			Message::StatePower { level } => Ok(LightPower::from_level(level)),
			other => Err(unexpected(other)),
		}
	}

	/// Sets the power level and waits for the device to acknowledge it.
	pub fn set_power(&self, power: LightPower) -> Result<(), Error> {
		self.client.set_acked(
			&self.addr,
			Message::SetPower {
				level: power.level(),
			},
		)
	}

	pub fn poweron(&self) -> Result<(), Error> {
		self.set_power(LightPower::On)
	}

	pub fn poweroff(&self) -> Result<(), Error> {
		self.set_power(LightPower::Off)
	}

	pub fn get_label(&self) -> Result<String, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetLabel, wire::STATE_LABEL)?
		{
			Message::StateLabel { label } => Ok(label),
			other => Err(unexpected(other)),
		}
	}

	/// Renames the device.  Labels are truncated to their 32-byte wire
	/// field.
	pub fn set_label(&self, label: &str) -> Result<(), Error> {
		self.client.set_acked(
			&self.addr,
			Message::SetLabel {
				label: label.to_owned(),
			},
		)
	}

	pub fn get_version(&self) -> Result<Version, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetVersion, wire::STATE_VERSION)?
		{
			Message::StateVersion {
				vendor,
				product,
				version,
			} => Ok(Version {
				vendor,
				product,
				version,
			}),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_times(&self) -> Result<DeviceTime, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetInfo, wire::STATE_INFO)?
		{
			Message::StateInfo {
				time,
				uptime,
				downtime,
			} => Ok(DeviceTime {
				time: at_nanos(time),
				uptime: Duration::from_nanos(uptime),
				downtime: Duration::from_nanos(downtime),
			}),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_location(&self) -> Result<Location, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetLocation, wire::STATE_LOCATION)?
		{
			Message::StateLocation {
				location,
				label,
				updated_at,
			} => Ok(Location {
				id: location,
				label,
				updated_at: at_nanos(updated_at),
			}),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_group(&self) -> Result<Group, Error> {
		match self
			.client
			.get_state(&self.addr, Message::GetGroup, wire::STATE_GROUP)?
		{
			Message::StateGroup {
				group,
				label,
				updated_at,
			} => Ok(Group {
				id: group,
				label,
				updated_at: at_nanos(updated_at),
			}),
			other => Err(unexpected(other)),
		}
	}

	pub fn get_light_state(&self) -> Result<BulbState, Error> {
		match self
			.client
			.get_state(&self.addr, Message::LightGet, wire::LIGHT_STATE)?
		{
			Message::LightState {
				color,
				power,
				label,
			} => Ok(BulbState {
				color,
				power: LightPower::from_level(power),
				label,
			}),
			other => Err(unexpected(other)),
		}
	}

	/// What the light is displaying, as a color or a white.
	pub fn get_color(&self) -> Result<ColorSetting, Error> {
		Ok(ColorSetting::from(self.get_light_state()?.color))
	}

	/// Changes the displayed color immediately.
	pub fn set_color(&self, color: impl Into<ColorSetting>) -> Result<(), Error> {
		self.fade_color(color, 0)
	}

	/// Fades to a color over `duration_ms` milliseconds, waiting for the
	/// device to acknowledge the change.
	pub fn fade_color(&self, color: impl Into<ColorSetting>, duration_ms: u32) -> Result<(), Error> {
		self.client.set_acked(
			&self.addr,
			Message::LightSetColor {
				color: color.into().to_hsbk(),
				duration: duration_ms,
			},
		)
	}
}

fn firmware(build: u64, version: u32) -> Firmware {
	Firmware {
		built_at: at_nanos(build),
		major: (version >> 16) as u16,
		minor: (version & 0xffff) as u16,
	}
}

impl fmt::Debug for Bulb {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Bulb").field("addr", &self.addr).finish()
	}
}

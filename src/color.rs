use std::fmt;

use crate::bitfield::{Field, FromValue, IntoValue, Record, Schema, Value};

pub(crate) static HSBK_SCHEMA: Schema = Schema::new(
	"HSBK",
	&[
		Field::uint("hue", 16),
		Field::uint("saturation", 16),
		Field::uint("brightness", 16),
		Field::uint("kelvin", 16),
	],
);

/// Bulb color on the wire (Hue-Saturation-Brightness-Kelvin).
///
/// When a light is displaying whites, saturation will be zero, hue will be
/// ignored, and only brightness and kelvin matter.  When a light is
/// displaying colors, kelvin is ignored.
///
/// Normal values for kelvin are from 2500 (warm/yellow) to 9000 (cool/blue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HSBK {
	pub hue: u16,
	pub saturation: u16,
	pub brightness: u16,
	pub kelvin: u16,
}

impl FromValue for HSBK {
	fn from_value(value: &Value) -> Option<HSBK> {
		let Value::Record(rec) = value else {
			return None;
		};
		Some(HSBK {
			hue: rec.get("hue").ok()?,
			saturation: rec.get("saturation").ok()?,
			brightness: rec.get("brightness").ok()?,
			kelvin: rec.get("kelvin").ok()?,
		})
	}
}

impl IntoValue for HSBK {
	fn into_value(self) -> Value {
		Value::Record(Record::from_values(
			&HSBK_SCHEMA,
			vec![
				Value::Uint(self.hue as u64),
				Value::Uint(self.saturation as u64),
				Value::Uint(self.brightness as u64),
				Value::Uint(self.kelvin as u64),
			],
		))
	}
}

/// A hue/saturation/brightness color, in human units: hue in degrees within
/// `[0, 360)`, saturation and brightness within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColor {
	pub hue: f32,
	pub saturation: f32,
	pub brightness: f32,
}

/// A white setting: brightness within `[0, 1]` and a color temperature in
/// kelvin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightWhite {
	pub brightness: f32,
	pub kelvin: u16,
}

/// What to ask a light to display: a color or a white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorSetting {
	Color(LightColor),
	White(LightWhite),
}

/// Kelvin put on the wire for the color path, where the device ignores it.
const COLOR_KELVIN: u16 = 3500;

impl ColorSetting {
	pub fn to_hsbk(self) -> HSBK {
		match self {
			ColorSetting::Color(c) => HSBK {
				hue: (c.hue / 360.0 * 65535.0).round() as u16,
				saturation: (c.saturation * 65535.0).round() as u16,
				brightness: (c.brightness * 65535.0).round() as u16,
				kelvin: COLOR_KELVIN,
			},
			ColorSetting::White(w) => HSBK {
				hue: 0,
				saturation: 0,
				brightness: (w.brightness * 65535.0).round() as u16,
				kelvin: w.kelvin,
			},
		}
	}
}

/// A reply with zero saturation is a white; anything else is a color.
impl From<HSBK> for ColorSetting {
	fn from(hsbk: HSBK) -> ColorSetting {
		if hsbk.saturation == 0 {
			ColorSetting::White(LightWhite {
				brightness: hsbk.brightness as f32 / 65535.0,
				kelvin: hsbk.kelvin,
			})
		} else {
			ColorSetting::Color(LightColor {
				hue: hsbk.hue as f32 * 360.0 / 65535.0,
				saturation: hsbk.saturation as f32 / 65535.0,
				brightness: hsbk.brightness as f32 / 65535.0,
			})
		}
	}
}

impl From<LightColor> for ColorSetting {
	fn from(color: LightColor) -> ColorSetting {
		ColorSetting::Color(color)
	}
}

impl From<LightWhite> for ColorSetting {
	fn from(white: LightWhite) -> ColorSetting {
		ColorSetting::White(white)
	}
}

impl fmt::Display for ColorSetting {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ColorSetting::White(w) => write!(
				f,
				"{:.0}% white ({})",
				w.brightness * 100.0,
				describe_kelvin(w.kelvin)
			),
			ColorSetting::Color(c) => write!(
				f,
				"{:.0}% hue: {:.0} sat: {:.0}%",
				c.brightness * 100.0,
				c.hue,
				c.saturation * 100.0
			),
		}
	}
}

impl LightColor {
	/// The nearest 24-bit RGB rendering of this color.
	pub fn rgb(&self) -> (u8, u8, u8) {
		let interval = (self.hue / 60.0).floor();
		let offset = self.hue / 60.0 - interval;
		let a = self.brightness * (1.0 - self.saturation);
		let b = self.brightness * (1.0 - self.saturation * offset);
		let c = self.brightness * (1.0 - self.saturation * (1.0 - offset));

		let (r, g, b) = match interval as i32 {
			1 => (b, self.brightness, a),
			2 => (a, self.brightness, c),
			3 => (a, b, self.brightness),
			4 => (c, a, self.brightness),
			5 => (self.brightness, a, b),
			_ => (self.brightness, c, a),
		};

		(channel(r), channel(g), channel(b))
	}
}

fn channel(value: f32) -> u8 {
	if value <= 0.0 {
		0
	} else {
		((value * 256.0).ceil() as u16).saturating_sub(1).min(255) as u8
	}
}

/// Describe (in english words) the color temperature as given in kelvin.
///
/// These descriptions match the values shown in the LIFX mobile app.
pub fn describe_kelvin(k: u16) -> &'static str {
	match k {
		0..=1999 => "Candlelight",
		2000..=2499 => "Sunset",
		2500..=2699 => "Ultra Warm",
		2700..=2999 => "Incandescent",
		3000..=3499 => "Warm",
		3500..=3999 => "Neutral",
		4000..=4499 => "Cool",
		4500..=4999 => "Cool Daylight",
		5000..=5599 => "Soft Daylight",
		5600..=5999 => "Daylight",
		6000..=6499 => "Noon Daylight",
		6500..=6999 => "Bright Daylight",
		7000..=7499 => "Cloudy Daylight",
		7500..=7999 => "Blue Daylight",
		8000..=8999 => "Blue Overcast",
		9000..=u16::MAX => "Blue Ice",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pure_red_scales_to_full_range() {
		let setting = ColorSetting::Color(LightColor {
			hue: 0.0,
			saturation: 1.0,
			brightness: 1.0,
		});
		let hsbk = setting.to_hsbk();
		assert_eq!(hsbk.hue, 0);
		assert_eq!(hsbk.saturation, 65535);
		assert_eq!(hsbk.brightness, 65535);
		assert_eq!(hsbk.kelvin, COLOR_KELVIN);

		match ColorSetting::from(hsbk) {
			ColorSetting::Color(c) => {
				assert!(c.hue.abs() < 0.01);
				assert!((c.saturation - 1.0).abs() < 0.001);
				assert!((c.brightness - 1.0).abs() < 0.001);
			}
			other => panic!("expected a color, got {:?}", other),
		}
	}

	#[test]
	fn white_passes_kelvin_through() {
		let setting = ColorSetting::White(LightWhite {
			brightness: 1.0,
			kelvin: 2500,
		});
		let hsbk = setting.to_hsbk();
		assert_eq!(
			hsbk,
			HSBK {
				hue: 0,
				saturation: 0,
				brightness: 65535,
				kelvin: 2500
			}
		);
	}

	#[test]
	fn zero_saturation_reads_back_as_white() {
		let setting = ColorSetting::from(HSBK {
			hue: 12345,
			saturation: 0,
			brightness: 32768,
			kelvin: 4000,
		});
		match setting {
			ColorSetting::White(w) => {
				assert_eq!(w.kelvin, 4000);
				assert!((w.brightness - 0.5).abs() < 0.001);
			}
			other => panic!("expected a white, got {:?}", other),
		}
	}

	#[test]
	fn hue_scaling_round_trips_within_a_degree() {
		for degrees in [0.0f32, 60.0, 120.0, 180.0, 240.0, 300.0, 359.0] {
			let hsbk = ColorSetting::Color(LightColor {
				hue: degrees,
				saturation: 1.0,
				brightness: 1.0,
			})
			.to_hsbk();
			match ColorSetting::from(hsbk) {
				ColorSetting::Color(c) => assert!((c.hue - degrees).abs() < 0.5),
				other => panic!("expected a color, got {:?}", other),
			}
		}
	}

	#[test]
	fn rgb_primaries() {
		let red = LightColor {
			hue: 0.0,
			saturation: 1.0,
			brightness: 1.0,
		};
		assert_eq!(red.rgb(), (255, 0, 0));

		let green = LightColor {
			hue: 120.0,
			saturation: 1.0,
			brightness: 1.0,
		};
		assert_eq!(green.rgb(), (0, 255, 0));

		let blue = LightColor {
			hue: 240.0,
			saturation: 1.0,
			brightness: 1.0,
		};
		assert_eq!(blue.rgb(), (0, 0, 255));
	}
}

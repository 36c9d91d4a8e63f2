//! Walks every light on the LAN through a little test sequence: ping, read
//! power and color, toggle power, a couple of whites, and the RGB primaries.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use lumen::udp::{Bulb, Client};
use lumen::{Error, LightColor, LightWhite};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32;1m";
const RED: &str = "\x1b[31;1m";

fn bold(s: &str) -> String {
	format!("{}{}{}", BOLD, s, RESET)
}

/// Runs one labelled step, with a beat on either side so the change is
/// visible on the actual bulb.
fn run_step(name: &str, step: impl FnOnce() -> Result<(), Error>) {
	print!("{}: ", name);
	let _ = io::stdout().flush();
	thread::sleep(Duration::from_secs(1));
	match step() {
		Ok(()) => println!("{}success{}", GREEN, RESET),
		Err(Error::Timeout) => println!("{}fail{}", RED, RESET),
		Err(e) => println!("{}fail{} ({})", RED, RESET, e),
	}
	thread::sleep(Duration::from_secs(1));
}

fn run_demo_on(bulb: &Bulb) -> Result<(), Error> {
	println!("{}", bold(&format!("Running demo on \"{}\":", bulb.get_label()?)));
	println!();

	run_step("ping", || bulb.ping());

	let power = bulb.get_power().ok();
	match power {
		Some(power) => println!("power: {}", power),
		None => println!("power: {}fail{}", RED, RESET),
	}

	let color = bulb.get_color().ok();
	match &color {
		Some(color) => println!("color: {}", color),
		None => println!("color: {}fail{}", RED, RESET),
	}

	run_step("power off", || bulb.poweroff());
	run_step("power on", || bulb.poweron());

	run_step("bright white", || {
		bulb.set_color(LightWhite {
			brightness: 1.0,
			kelvin: 9000,
		})
	});
	run_step("warm white", || {
		bulb.set_color(LightWhite {
			brightness: 1.0,
			kelvin: 2500,
		})
	});

	for (name, hue) in [("color red", 0.0), ("color green", 120.0), ("color blue", 240.0)] {
		run_step(name, || {
			bulb.set_color(LightColor {
				hue,
				saturation: 1.0,
				brightness: 1.0,
			})
		});
	}

	// Put the light back the way we found it.
	if let Some(power) = power {
		let _ = bulb.set_power(power);
	}
	if let Some(color) = color {
		let _ = bulb.set_color(color);
	}
	println!();

	Ok(())
}

fn main() -> anyhow::Result<()> {
	stderrlog::new().verbosity(1).init()?;

	let client = Client::new();

	println!("{}", bold("Discovering lights:"));
	let mut bulbs = Vec::new();
	for bulb in client.discover_lights()? {
		match bulb.get_label() {
			Ok(label) => println!("Discovered \"{}\" at {}", label, bulb.addr()),
			Err(e) => println!("Discovered {} (label unavailable: {})", bulb.addr(), e),
		}
		bulbs.push(bulb);
	}
	println!();

	for bulb in &bulbs {
		if let Err(e) = run_demo_on(bulb) {
			println!("{}skipping{} {}: {}", RED, RESET, bulb.addr(), e);
		}
	}

	Ok(())
}

//! Drives the real engine against a scripted device on a loopback socket.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use lumen::udp::{Client, Config, LightAddr, LightPower};
use lumen::{BuildOptions, LightWhite, Message, RawMessage, HSBK};

const MAC: [u8; 8] = [0xd0, 0x73, 0xd5, 0x01, 0x02, 0x03, 0x00, 0x00];
const LABEL: &str = "Kitchen";

const TIMEOUT: Duration = Duration::from_millis(600);
const TRIES: u32 = 3;

fn client_for(device: SocketAddr) -> Client {
	Client::with_config(Config {
		bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
		broadcast: Some(device),
		timeout: TIMEOUT,
		tries: TRIES,
		..Config::default()
	})
}

/// What the scripted device should do differently from a well-behaved bulb.
#[derive(Default, Clone, Copy)]
struct Quirks {
	/// Answer every GetService twice, with identical datagrams.
	duplicate_state_service: bool,
	/// Ignore the first acknowledged set, ack the later ones, and then send
	/// a stale ack for the first set's sequence number.
	drop_first_ack: bool,
	/// Never answer queries (acknowledged sets still work).
	mute_queries: bool,
}

struct FakeBulb {
	addr: SocketAddr,
	/// Every acknowledged set the device accepted, in arrival order.
	accepted: Receiver<Message>,
}

impl FakeBulb {
	fn spawn(quirks: Quirks) -> FakeBulb {
		let sock = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
		let addr = sock.local_addr().unwrap();
		let (tx, accepted) = mpsc::channel();
		thread::spawn(move || serve(sock, quirks, tx));
		FakeBulb { addr, accepted }
	}
}

fn serve(sock: UdpSocket, quirks: Quirks, accepted: Sender<Message>) {
	let port = sock.local_addr().unwrap().port();
	let mut buf = [0u8; 4096];
	let mut sets_seen = 0u32;
	let mut dropped: Option<(SocketAddr, u8)> = None;

	loop {
		let Ok((nbytes, peer)) = sock.recv_from(&mut buf) else {
			return;
		};
		let Ok(raw) = RawMessage::unpack(&buf[..nbytes]) else {
			continue;
		};
		let Ok(msg) = Message::from_raw(&raw) else {
			continue;
		};

		let reply = |msg: Message, sequence: u8| {
			let options = BuildOptions {
				target: Some(MAC),
				sequence,
				source: raw.frame.source,
				..BuildOptions::default()
			};
			let bytes = RawMessage::build(&options, msg).unwrap().pack().unwrap();
			sock.send_to(&bytes, peer).unwrap();
		};

		// Acknowledged sets first: record, maybe drop, ack.
		if raw.frame_addr.ack_required {
			sets_seen += 1;
			if quirks.drop_first_ack && sets_seen == 1 {
				dropped = Some((peer, raw.frame_addr.sequence));
				continue;
			}
			let _ = accepted.send(msg.clone());
			reply(
				Message::Acknowledgement {
					seq: raw.frame_addr.sequence,
				},
				raw.frame_addr.sequence,
			);
			// A stale ack for a retry the engine has already completed.
			if let Some((stale_peer, stale_seq)) = dropped.take() {
				let options = BuildOptions {
					target: Some(MAC),
					sequence: stale_seq,
					source: raw.frame.source,
					..BuildOptions::default()
				};
				let bytes = RawMessage::build(&options, Message::Acknowledgement { seq: stale_seq })
					.unwrap()
					.pack()
					.unwrap();
				sock.send_to(&bytes, stale_peer).unwrap();
			}
			continue;
		}

		if quirks.mute_queries {
			continue;
		}

		let sequence = raw.frame_addr.sequence;
		match msg {
			Message::GetService => {
				let state = Message::StateService {
					service: 1,
					port: port as u32,
				};
				reply(state.clone(), sequence);
				if quirks.duplicate_state_service {
					reply(state, sequence);
				}
			}
			Message::GetPower => reply(Message::StatePower { level: 65535 }, sequence),
			Message::GetLabel => reply(
				Message::StateLabel {
					label: LABEL.to_owned(),
				},
				sequence,
			),
			Message::GetVersion => reply(
				Message::StateVersion {
					vendor: 1,
					product: 27,
					version: 0,
				},
				sequence,
			),
			Message::GetInfo => reply(
				Message::StateInfo {
					time: 1_700_000_000_000_000_000,
					uptime: 60_000_000_000,
					downtime: 5_000_000_000,
				},
				sequence,
			),
			Message::LightGet => reply(
				Message::LightState {
					color: HSBK {
						hue: 0,
						saturation: 0,
						brightness: 65535,
						kelvin: 3000,
					},
					power: 65535,
					label: LABEL.to_owned(),
				},
				sequence,
			),
			Message::EchoRequest { payload } => {
				reply(Message::EchoResponse { payload }, sequence)
			}
			_ => {}
		}
	}
}

#[test]
fn discovery_yields_each_device_once() {
	let device = FakeBulb::spawn(Quirks {
		duplicate_state_service: true,
		..Quirks::default()
	});
	let client = client_for(device.addr);

	let bulbs: Vec<_> = client.discover_lights().unwrap().collect();
	assert_eq!(bulbs.len(), 1);

	let addr = bulbs[0].addr();
	assert_eq!(addr.host, device.addr.ip());
	assert_eq!(addr.port, device.addr.port());
	assert_eq!(addr.target, MAC);
}

#[test]
fn directed_queries_return_device_state() {
	let device = FakeBulb::spawn(Quirks::default());
	let client = client_for(device.addr);

	let bulb = client
		.get_bulb(device.addr.ip(), device.addr.port(), MAC)
		.unwrap();

	assert_eq!(bulb.get_label().unwrap(), LABEL);
	assert_eq!(bulb.get_power().unwrap(), LightPower::On);

	let state = bulb.get_light_state().unwrap();
	assert_eq!(state.label, LABEL);
	assert_eq!(state.power, LightPower::On);
	assert_eq!(state.color.kelvin, 3000);

	let version = bulb.get_version().unwrap();
	assert_eq!((version.vendor, version.product), (1, 27));

	let times = bulb.get_times().unwrap();
	assert_eq!(times.uptime, Duration::from_secs(60));
}

#[test]
fn ack_for_a_retry_completes_the_set_once() {
	let device = FakeBulb::spawn(Quirks {
		drop_first_ack: true,
		..Quirks::default()
	});
	let client = client_for(device.addr);
	let bulb = client
		.get_bulb(device.addr.ip(), device.addr.port(), MAC)
		.unwrap();

	// The first transmission is swallowed, so completion rides on the second
	// retry's fresh sequence number.
	let started = Instant::now();
	bulb.poweron().unwrap();
	let elapsed = started.elapsed();
	assert!(
		elapsed >= TIMEOUT / TRIES - Duration::from_millis(20),
		"completed before any retry: {:?}",
		elapsed
	);
	assert!(elapsed < TIMEOUT, "did not complete within the budget");

	// The stale ack for the first sequence resolves nothing, and the engine
	// keeps working.
	assert_eq!(bulb.get_power().unwrap(), LightPower::On);
	assert!(device.accepted.try_recv().is_ok());
}

#[test]
fn set_color_puts_the_requested_hsbk_on_the_wire() {
	let device = FakeBulb::spawn(Quirks::default());
	let client = client_for(device.addr);
	let bulb = client
		.get_bulb(device.addr.ip(), device.addr.port(), MAC)
		.unwrap();

	bulb.fade_color(
		LightWhite {
			brightness: 1.0,
			kelvin: 2500,
		},
		500,
	)
	.unwrap();

	match device.accepted.recv_timeout(TIMEOUT) {
		Ok(Message::LightSetColor { color, duration }) => {
			assert_eq!(
				color,
				HSBK {
					hue: 0,
					saturation: 0,
					brightness: 65535,
					kelvin: 2500,
				}
			);
			assert_eq!(duration, 500);
		}
		other => panic!("expected the color change, got {:?}", other),
	}
}

#[test]
fn queries_time_out_against_a_mute_device() {
	let device = FakeBulb::spawn(Quirks {
		mute_queries: false,
		..Quirks::default()
	});
	let mute = FakeBulb::spawn(Quirks {
		mute_queries: true,
		..Quirks::default()
	});
	// Sanity: the quirk-free device is reachable through the same client.
	let client = client_for(device.addr);
	assert!(client
		.get_bulb(device.addr.ip(), device.addr.port(), MAC)
		.is_ok());

	let started = Instant::now();
	let err = client
		.get_bulb(mute.addr.ip(), mute.addr.port(), MAC)
		.unwrap_err();
	let elapsed = started.elapsed();

	assert!(matches!(err, lumen::Error::Timeout), "got {:?}", err);
	assert!(elapsed >= TIMEOUT, "timed out early: {:?}", elapsed);
	assert!(
		elapsed < TIMEOUT + TIMEOUT / TRIES + Duration::from_millis(200),
		"timed out late: {:?}",
		elapsed
	);
}

#[test]
fn ping_sends_one_echo_per_retry_before_timing_out() {
	let sink = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let sink_addr = sink.local_addr().unwrap();
	let client = client_for(sink_addr);

	let err = client
		.get_bulb(sink_addr.ip(), sink_addr.port(), MAC)
		.unwrap_err();
	assert!(matches!(err, lumen::Error::Timeout), "got {:?}", err);

	// All three transmissions made it out, each a distinct EchoRequest.
	sink.set_read_timeout(Some(Duration::from_millis(100)))
		.unwrap();
	let mut buf = [0u8; 4096];
	let mut echoes = 0;
	while let Ok((nbytes, _)) = sink.recv_from(&mut buf) {
		let raw = RawMessage::unpack(&buf[..nbytes]).unwrap();
		match Message::from_raw(&raw).unwrap() {
			Message::EchoRequest { .. } => echoes += 1,
			other => panic!("unexpected message {:?}", other),
		}
	}
	assert_eq!(echoes, TRIES);
}

#[test]
fn concurrent_queries_share_one_socket() {
	let device = FakeBulb::spawn(Quirks::default());
	let client = client_for(device.addr);
	let bulb = client
		.get_bulb(device.addr.ip(), device.addr.port(), MAC)
		.unwrap();

	let workers: Vec<_> = (0..4)
		.map(|i| {
			let bulb = bulb.clone();
			thread::spawn(move || match i {
				0 => bulb.get_label().map(|_| ()),
				1 => bulb.get_power().map(|_| ()),
				2 => bulb.get_light_state().map(|_| ()),
				_ => bulb.ping(),
			})
		})
		.collect();

	for worker in workers {
		worker.join().unwrap().unwrap();
	}
}

#[test]
fn overlapping_identical_queries_are_refused() {
	let device = FakeBulb::spawn(Quirks {
		mute_queries: true,
		..Quirks::default()
	});
	let client = client_for(device.addr);
	let bulb = client.bulb(LightAddr {
		host: device.addr.ip(),
		port: device.addr.port(),
		target: MAC,
	});

	let racer = {
		let bulb = bulb.clone();
		thread::spawn(move || bulb.get_label())
	};
	// Give the first query time to register its waiter.
	thread::sleep(Duration::from_millis(50));
	let second = bulb.get_label();
	assert!(
		matches!(second, Err(lumen::Error::PendingRequest)),
		"got {:?}",
		second
	);
	assert!(matches!(
		racer.join().unwrap(),
		Err(lumen::Error::Timeout)
	));
}

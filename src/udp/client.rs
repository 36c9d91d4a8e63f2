use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use get_if_addrs::{get_if_addrs, IfAddr, Ifv4Addr};
use log::{debug, warn};
use rand::Rng;

use crate::error::Error;
use crate::msg::{wire, BuildOptions, Message, RawMessage};
use crate::protocol::LIFX_PORT;
use crate::udp::bulb::Bulb;
use crate::udp::endpoint::{Endpoint, EndpointSlot, Inbound};
use crate::udp::{LightAddr, ReplyKey, SeqKey};

/// The service code for UDP in a [Message::StateService] reply; the only
/// service this library speaks.
const UDP_SERVICE: u8 = 1;

/// Engine configuration.  The defaults match what real bulbs expect; tests
/// pin `bind` and `broadcast` to loopback addresses.
#[derive(Debug, Clone)]
pub struct Config {
	/// Client identifier copied into every outgoing frame; devices echo it
	/// in their replies.
	pub source: [u8; 4],
	/// Total time an operation may spend before failing with
	/// [Error::Timeout].
	pub timeout: Duration,
	/// How many copies of a request are sent, spaced `timeout / tries`
	/// apart.
	pub tries: u32,
	/// Local address for the shared socket.
	pub bind: SocketAddr,
	/// Pin discovery to a single destination instead of broadcasting on
	/// every interface.
	pub broadcast: Option<SocketAddr>,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			source: *b"lumn",
			timeout: Duration::from_secs(3),
			tries: 3,
			bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, LIFX_PORT)),
			broadcast: None,
		}
	}
}

impl Config {
	fn tries(&self) -> u32 {
		self.tries.max(1)
	}

	/// The gap between retries; also how long the last try waits.
	fn interval(&self) -> Duration {
		self.timeout / self.tries()
	}
}

/// Handle to the engine.  Cloning is cheap and every clone shares the one
/// socket, which is bound lazily on first use.
///
/// Start with [Client::discover_lights], or [Client::get_bulb] when an
/// address is already known.
#[derive(Clone)]
pub struct Client {
	inner: Arc<Shared>,
}

struct Shared {
	cfg: Config,
	endpoint: EndpointSlot,
}

impl Default for Client {
	fn default() -> Client {
		Client::new()
	}
}

impl Client {
	pub fn new() -> Client {
		Client::with_config(Config::default())
	}

	pub fn with_config(cfg: Config) -> Client {
		Client {
			inner: Arc::new(Shared {
				cfg,
				endpoint: EndpointSlot::empty(),
			}),
		}
	}

	fn endpoint(&self) -> Result<Arc<Endpoint>, Error> {
		self.inner.endpoint.get_or_bind(&self.inner.cfg)
	}

	/// Discovers lights on the LAN.
	///
	/// Broadcasts `GetService` and yields a [Bulb] for every device that
	/// answers, as the answers arrive.  Each device is yielded once, even
	/// when it replies to several of the broadcast retries.  The stream ends
	/// once the broadcast window (the full retry budget) has elapsed.
	pub fn discover_lights(&self) -> Result<DiscoverLights, Error> {
		let endpoint = self.endpoint()?;
		let (tx, rx) = mpsc::channel();
		let guard = endpoint.register_reply(
			ReplyKey::Broadcast {
				code: wire::STATE_SERVICE,
			},
			tx,
		)?;

		let targets = self.broadcast_targets();
		let tries = self.inner.cfg.tries();
		let interval = self.inner.cfg.interval();
		let sender = Arc::clone(&endpoint);
		thread::Builder::new()
			.name("lumen-discover".to_owned())
			.spawn(move || {
				// Holds the broadcast waiter open for the whole window; the
				// stream ends when this guard drops.
				let _guard = guard;
				for _ in 0..tries {
					let options = BuildOptions {
						sequence: sender.next_seq(),
						source: sender.source(),
						..BuildOptions::default()
					};
					let packet = RawMessage::build(&options, Message::GetService)
						.and_then(|raw| raw.pack().map_err(Error::from));
					let bytes = match packet {
						Ok(bytes) => bytes,
						Err(e) => {
							warn!("discovery stopped: {}", e);
							return;
						}
					};
					for dest in &targets {
						if let Err(e) = sender.send(&bytes, *dest) {
							warn!("discovery send to {} failed: {}", dest, e);
							return;
						}
					}
					thread::sleep(interval);
				}
			})?;

		Ok(DiscoverLights {
			client: self.clone(),
			rx,
			seen: HashSet::new(),
		})
	}

	/// Builds a handle for a light at a known address, checking it is
	/// reachable first.
	pub fn get_bulb(&self, host: IpAddr, port: u16, target: [u8; 8]) -> Result<Bulb, Error> {
		let bulb = self.bulb(LightAddr { host, port, target });
		bulb.ping()?;
		Ok(bulb)
	}

	/// Builds a handle without probing the address.
	pub fn bulb(&self, addr: LightAddr) -> Bulb {
		Bulb::new(self.clone(), addr)
	}

	/// Every address a discovery broadcast goes to.
	fn broadcast_targets(&self) -> Vec<SocketAddr> {
		if let Some(dest) = self.inner.cfg.broadcast {
			return vec![dest];
		}
		let mut targets = vec![SocketAddr::from((Ipv4Addr::BROADCAST, LIFX_PORT))];
		match get_if_addrs() {
			Ok(interfaces) => {
				for iface in interfaces {
					if iface.ip().is_loopback() {
						continue;
					}
					if let IfAddr::V4(Ifv4Addr {
						broadcast: Some(bcast),
						..
					}) = iface.addr
					{
						let dest = SocketAddr::new(IpAddr::V4(bcast), LIFX_PORT);
						if !targets.contains(&dest) {
							targets.push(dest);
						}
					}
				}
			}
			Err(e) => debug!("interface enumeration failed: {}", e),
		}
		targets
	}

	/// Sends a query and waits for the paired state reply.
	///
	/// The reply waiter is keyed on `(host, port, target, expect)`, so it
	/// spans all the retries.  Completion races the retry budget: whichever
	/// of reply and exhaustion comes first wins, and the loser is cleaned
	/// up.
	pub(crate) fn get_state(
		&self,
		addr: &LightAddr,
		request: Message,
		expect: u16,
	) -> Result<Message, Error> {
		let endpoint = self.endpoint()?;
		let (tx, rx) = mpsc::channel();
		let _guard = endpoint.register_reply(ReplyKey::directed(addr, expect), tx)?;

		let dest = addr.socket_addr();
		for _ in 0..self.inner.cfg.tries() {
			let options = BuildOptions {
				target: Some(addr.target),
				sequence: endpoint.next_seq(),
				source: endpoint.source(),
				..BuildOptions::default()
			};
			let bytes = RawMessage::build(&options, request.clone())?.pack()?;
			endpoint.send(&bytes, dest)?;

			match rx.recv_timeout(self.inner.cfg.interval()) {
				Ok(inbound) => return Ok(inbound.msg),
				Err(RecvTimeoutError::Timeout) => continue,
				Err(RecvTimeoutError::Disconnected) => return Err(Error::Cancelled),
			}
		}
		Err(Error::Timeout)
	}

	/// Sends a set and waits for its acknowledgement.
	///
	/// Every retry allocates a fresh sequence number bound to the same
	/// completion handle, so an ack for any retry resolves the operation
	/// exactly once; all the sequence keys are purged together on exit.
	pub(crate) fn set_acked(&self, addr: &LightAddr, request: Message) -> Result<(), Error> {
		let endpoint = self.endpoint()?;
		let (tx, rx) = mpsc::channel();
		let op = endpoint.begin_ack_op();

		let dest = addr.socket_addr();
		for _ in 0..self.inner.cfg.tries() {
			let sequence = endpoint.next_seq();
			endpoint.register_ack(&op, SeqKey::new(addr, sequence), tx.clone());
			let options = BuildOptions {
				target: Some(addr.target),
				ack_required: true,
				sequence,
				source: endpoint.source(),
				..BuildOptions::default()
			};
			let bytes = RawMessage::build(&options, request.clone())?.pack()?;
			endpoint.send(&bytes, dest)?;

			match rx.recv_timeout(self.inner.cfg.interval()) {
				Ok(()) => return Ok(()),
				Err(RecvTimeoutError::Timeout) if endpoint.is_stopped() => {
					return Err(Error::Cancelled)
				}
				Err(RecvTimeoutError::Timeout) => continue,
				Err(RecvTimeoutError::Disconnected) => return Err(Error::Cancelled),
			}
		}
		Err(Error::Timeout)
	}

	/// Sends an echo with a random payload and waits for a byte-identical
	/// echo back.  Replies with a different payload are ignored; running out
	/// of retries is a timeout like everywhere else.
	pub(crate) fn ping_addr(&self, addr: &LightAddr) -> Result<(), Error> {
		let endpoint = self.endpoint()?;
		let mut payload = [0u8; 64];
		rand::thread_rng().fill(&mut payload[..]);

		let (tx, rx) = mpsc::channel();
		let _guard =
			endpoint.register_reply(ReplyKey::directed(addr, wire::ECHO_RESPONSE), tx)?;

		let dest = addr.socket_addr();
		for _ in 0..self.inner.cfg.tries() {
			let options = BuildOptions {
				target: Some(addr.target),
				sequence: endpoint.next_seq(),
				source: endpoint.source(),
				..BuildOptions::default()
			};
			let bytes = RawMessage::build(&options, Message::EchoRequest { payload })?.pack()?;
			endpoint.send(&bytes, dest)?;

			let deadline = Instant::now() + self.inner.cfg.interval();
			loop {
				let left = deadline.saturating_duration_since(Instant::now());
				if left == Duration::ZERO {
					break;
				}
				match rx.recv_timeout(left) {
					Ok(inbound) => match inbound.msg {
						Message::EchoResponse { payload: echoed } if echoed == payload => {
							return Ok(())
						}
						_ => debug!("ignoring mismatched echo from {}", inbound.addr),
					},
					Err(RecvTimeoutError::Timeout) => break,
					Err(RecvTimeoutError::Disconnected) => return Err(Error::Cancelled),
				}
			}
		}
		Err(Error::Timeout)
	}
}

/// The discovery stream: yields a [Bulb] per device as replies arrive, each
/// device once.  Blocks between items; ends when the broadcast window
/// closes.
pub struct DiscoverLights {
	client: Client,
	rx: Receiver<Inbound>,
	seen: HashSet<LightAddr>,
}

impl Iterator for DiscoverLights {
	type Item = Bulb;

	fn next(&mut self) -> Option<Bulb> {
		loop {
			let inbound = self.rx.recv().ok()?;
			let Message::StateService { service, port } = inbound.msg else {
				continue;
			};
			if service != UDP_SERVICE {
				debug!(
					"skipping unsupported service {}/{} on {}",
					service, port, inbound.addr
				);
				continue;
			}
			// A zero port means the service is temporarily unavailable.
			let port = match u16::try_from(port) {
				Ok(p) if p > 0 => p,
				_ => {
					debug!("unusable service port {} on {}", port, inbound.addr);
					continue;
				}
			};
			let addr = LightAddr {
				host: inbound.addr.ip(),
				port,
				target: inbound.raw.frame_addr.target,
			};
			if self.seen.insert(addr) {
				return Some(Bulb::new(self.client.clone(), addr));
			}
		}
	}
}

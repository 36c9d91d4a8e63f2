use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::error::Error;
use crate::msg::{Message, RawMessage};
use crate::udp::{Config, ReplyKey, SeqKey};

/// Received datagrams are read with this much room; every LIFX packet is
/// far smaller.
const RECV_BUFFER: usize = 4096;

/// How often the receive loop wakes to notice a teardown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// A datagram that parsed cleanly, as handed to a waiter.
pub(crate) struct Inbound {
	pub addr: SocketAddr,
	pub raw: RawMessage,
	pub msg: Message,
}

#[derive(Default)]
struct AckTable {
	/// Sequence key -> (owning operation, completion handle).
	by_seq: HashMap<SeqKey, (u64, Sender<()>)>,
	/// Operation -> every sequence key it registered.  Retries add fresh
	/// keys; all of them are purged together when the operation ends.
	owners: HashMap<u64, Vec<SeqKey>>,
	next_op: u64,
}

/// The one socket everything shares, with the waiter tables the receive
/// loop demultiplexes into.
///
/// Tables are only touched under short-held locks; nothing blocks while
/// holding one.
pub(crate) struct Endpoint {
	sock: UdpSocket,
	source: [u8; 4],
	sequence: AtomicU8,
	replies: Mutex<HashMap<ReplyKey, Sender<Inbound>>>,
	acks: Mutex<AckTable>,
	stopped: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Endpoint {
	/// Binds the socket, enables broadcast, and starts the receive loop.
	pub(crate) fn bind(cfg: &Config) -> Result<Arc<Endpoint>, Error> {
		let sock = UdpSocket::bind(cfg.bind)?;
		sock.set_broadcast(true)?;
		sock.set_read_timeout(Some(SHUTDOWN_POLL))?;

		let endpoint = Arc::new(Endpoint {
			sock,
			source: cfg.source,
			sequence: AtomicU8::new(rand::thread_rng().gen()),
			replies: Mutex::new(HashMap::new()),
			acks: Mutex::new(AckTable::default()),
			stopped: AtomicBool::new(false),
		});

		let worker = Arc::clone(&endpoint);
		thread::Builder::new()
			.name("lumen-recv".to_owned())
			.spawn(move || worker.recv_loop())?;

		Ok(endpoint)
	}

	pub(crate) fn source(&self) -> [u8; 4] {
		self.source
	}

	/// Allocates the next sequence number.  These are correlation tags, not
	/// reliability tokens; wrapping is fine.
	pub(crate) fn next_seq(&self) -> u8 {
		self.sequence.fetch_add(1, Ordering::Relaxed)
	}

	pub(crate) fn send(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), Error> {
		self.sock.send_to(bytes, dest)?;
		Ok(())
	}

	/// Registers the waiter for one reply key.  A key can hold at most one
	/// waiter; a second registration is refused.
	pub(crate) fn register_reply(
		self: &Arc<Self>,
		key: ReplyKey,
		tx: Sender<Inbound>,
	) -> Result<ReplyGuard, Error> {
		match lock(&self.replies).entry(key.clone()) {
			Entry::Occupied(_) => Err(Error::PendingRequest),
			Entry::Vacant(slot) => {
				slot.insert(tx);
				Ok(ReplyGuard {
					endpoint: Arc::clone(self),
					key,
				})
			}
		}
	}

	/// Starts an acknowledged operation; sequence keys are attached to it
	/// with [Endpoint::register_ack].
	pub(crate) fn begin_ack_op(self: &Arc<Self>) -> AckOp {
		let mut acks = lock(&self.acks);
		acks.next_op += 1;
		let id = acks.next_op;
		acks.owners.insert(id, Vec::new());
		AckOp {
			endpoint: Arc::clone(self),
			id,
		}
	}

	/// Binds one sequence key to an operation's completion handle.  If the
	/// sequence counter wrapped onto a key an older operation still holds,
	/// the old entry is displaced; the old operation keeps its other keys.
	pub(crate) fn register_ack(&self, op: &AckOp, key: SeqKey, tx: Sender<()>) {
		let mut acks = lock(&self.acks);
		if let Some((displaced, _)) = acks.by_seq.insert(key, (op.id, tx)) {
			if let Some(keys) = acks.owners.get_mut(&displaced) {
				keys.retain(|k| *k != key);
			}
		}
		if let Some(keys) = acks.owners.get_mut(&op.id) {
			keys.push(key);
		}
	}

	pub(crate) fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::Acquire)
	}

	/// Tears the endpoint down: every pending waiter's channel is dropped,
	/// which its operation observes as a cancellation.
	pub(crate) fn stop(&self) {
		self.stopped.store(true, Ordering::Release);
		lock(&self.replies).clear();
		let mut acks = lock(&self.acks);
		acks.by_seq.clear();
		acks.owners.clear();
	}

	fn recv_loop(&self) {
		let mut buf = [0u8; RECV_BUFFER];
		while !self.is_stopped() {
			let (nbytes, addr) = match self.sock.recv_from(&mut buf) {
				Ok(received) => received,
				Err(e)
					if matches!(
						e.kind(),
						io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
					) =>
				{
					continue;
				}
				Err(e) => {
					warn!("receive loop stopping: {}", e);
					break;
				}
			};

			let raw = match RawMessage::unpack(&buf[..nbytes]) {
				Ok(raw) => raw,
				Err(e) => {
					debug!("dropping malformed datagram from {}: {}", addr, e);
					continue;
				}
			};
			let msg = match Message::from_raw(&raw) {
				Ok(msg) => msg,
				Err(e) => {
					debug!("dropping datagram from {}: {}", addr, e);
					continue;
				}
			};

			if let Message::Acknowledgement { seq } = &msg {
				self.resolve_ack(addr, raw.frame_addr.target, *seq);
				continue;
			}

			let code = raw.protocol_header.typ;
			let directed = ReplyKey::from_datagram(addr, raw.frame_addr.target, code);
			let replies = lock(&self.replies);
			let waiter = replies
				.get(&directed)
				.or_else(|| replies.get(&ReplyKey::Broadcast { code }));
			match waiter {
				// A send failure means the waiter is gone but its guard has
				// not run yet; the guard will clean the entry up.
				Some(tx) => {
					let _ = tx.send(Inbound { addr, raw, msg });
				}
				None => debug!("no waiter for message type {} from {}", code, addr),
			}
		}
	}

	fn resolve_ack(&self, addr: SocketAddr, target: [u8; 8], seq: u8) {
		let key = SeqKey::from_datagram(addr, target, seq);
		let waiter = lock(&self.acks).by_seq.remove(&key);
		match waiter {
			Some((_, tx)) => {
				let _ = tx.send(());
			}
			None => debug!("unsolicited acknowledgement from {}", addr),
		}
	}
}

/// Removes its reply-table entry when the operation ends, no matter how.
pub(crate) struct ReplyGuard {
	endpoint: Arc<Endpoint>,
	key: ReplyKey,
}

impl Drop for ReplyGuard {
	fn drop(&mut self) {
		lock(&self.endpoint.replies).remove(&self.key);
	}
}

/// One acknowledged operation; purges every sequence key it still owns when
/// it ends.
pub(crate) struct AckOp {
	endpoint: Arc<Endpoint>,
	id: u64,
}

impl Drop for AckOp {
	fn drop(&mut self) {
		let mut acks = lock(&self.endpoint.acks);
		if let Some(keys) = acks.owners.remove(&self.id) {
			for key in keys {
				if let Some((owner, _)) = acks.by_seq.get(&key) {
					if *owner == self.id {
						acks.by_seq.remove(&key);
					}
				}
			}
		}
	}
}

/// Tears down the endpoint when the last client clone is dropped.
pub(crate) struct EndpointSlot {
	slot: Mutex<Option<Arc<Endpoint>>>,
}

impl EndpointSlot {
	pub(crate) fn empty() -> EndpointSlot {
		EndpointSlot {
			slot: Mutex::new(None),
		}
	}

	/// The endpoint, created lazily on first use.
	pub(crate) fn get_or_bind(&self, cfg: &Config) -> Result<Arc<Endpoint>, Error> {
		let mut slot = lock(&self.slot);
		if let Some(endpoint) = slot.as_ref() {
			return Ok(Arc::clone(endpoint));
		}
		let endpoint = Endpoint::bind(cfg)?;
		*slot = Some(Arc::clone(&endpoint));
		Ok(endpoint)
	}
}

impl Drop for EndpointSlot {
	fn drop(&mut self) {
		if let Some(endpoint) = lock(&self.slot).take() {
			endpoint.stop();
		}
	}
}

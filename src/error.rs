use std::io;

use thiserror::Error;

use crate::bitfield::BitfieldError;

/// Everything that can go wrong talking to a light.
#[derive(Error, Debug)]
pub enum Error {
	/// The retry budget elapsed without a matching reply.
	#[error("operation timed out")]
	Timeout,

	/// The engine was torn down while the operation was in flight.
	#[error("operation cancelled")]
	Cancelled,

	/// Another operation is already waiting on the same reply key; one reply
	/// cannot resolve two waiters.
	#[error("a request with the same reply key is already in flight")]
	PendingRequest,

	/// A parsed header carried a type code this library does not know.
	///
	/// LIFX devices are known to send messages that are not officially
	/// documented, so this does not necessarily represent a bug.  The engine
	/// drops such datagrams.
	#[error("unknown message type: `{0}`")]
	UnknownMessageType(u16),

	/// A message field contained an invalid or unsupported value.
	#[error("protocol error: `{0}`")]
	ProtocolError(String),

	/// Schema-level serialization or record-construction failure.
	#[error(transparent)]
	Bitfield(#[from] BitfieldError),

	#[error("i/o error")]
	Io(#[from] io::Error),
}

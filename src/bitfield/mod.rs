//! Declarative schemas for packed binary records.
//!
//! Every LIFX wire structure is described by a [Schema]: an ordered list of
//! [Field]s whose widths are bit counts, not necessarily byte multiples.  A
//! schema serializes a [Record] to little-endian bytes and parses bytes back
//! into a [Record].
//!
//! Two layouts exist behind one contract.  When every field is a whole number
//! of bytes, fields are simply concatenated in declaration order.  Otherwise
//! consecutive fields are collected into groups that end on a byte boundary;
//! within a group the first field occupies the most significant bits of the
//! group integer, and the integer is emitted as little-endian bytes.
//!
//! Reserved fields take up wire space but never appear in a [Record].

mod value;

pub use value::{FromValue, IntoValue, Record, Value};
pub(crate) use value::record;

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Errors from schema-driven serialization and from [Record] construction
/// and access.
#[derive(Error, Debug)]
pub enum BitfieldError {
	/// Not enough input to parse the schema.
	#[error("missing data for `{schema}`: need {need} bytes, got {got}")]
	ShortInput {
		schema: &'static str,
		need: usize,
		got: usize,
	},

	/// Positional construction with the wrong number of values.
	#[error("`{schema}` takes {want} values, got {got}")]
	Arity {
		schema: &'static str,
		want: usize,
		got: usize,
	},

	/// Named construction whose key set does not equal the schema's
	/// non-reserved names.
	#[error("unexpected keys for `{schema}`")]
	KeySet { schema: &'static str },

	/// Get or set with a name the schema does not declare.
	#[error("`{schema}` has no field named `{name}`")]
	UnknownField { schema: &'static str, name: String },

	/// A value whose shape does not fit the field.
	#[error("type mismatch on `{field}`: expected {requested}")]
	TypeMismatch {
		field: &'static str,
		requested: &'static str,
	},

	#[error("i/o error")]
	Io(#[from] std::io::Error),
}

/// The value shapes a [Field] can carry.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
	/// Raw bytes; short values are right-padded with NUL, long ones truncated.
	Bytes,
	/// Two's complement signed integer.
	Int,
	/// Zero-extended unsigned integer.
	Uint,
	/// Non-zero means true; serializes as 1 or 0.
	Bool,
	/// IEEE-754, 32 or 64 bits.
	Float,
	/// A nested schema; the field width is the nested schema's total.
	Record(&'static Schema),
}

impl FieldKind {
	fn describe(&self) -> &'static str {
		match self {
			FieldKind::Bytes => "bytes",
			FieldKind::Int => "int",
			FieldKind::Uint => "uint",
			FieldKind::Bool => "bool",
			FieldKind::Float => "float",
			FieldKind::Record(s) => s.name,
		}
	}
}

/// One slice of a packed structure: a name (or a reserved marker), a width in
/// bits, and a value shape.
///
/// Fields are only built through the `const` constructors, which reject
/// zero widths, floats that are not 32 or 64 bits, and integers wider than
/// 64 bits -- at compile time, since every schema in this crate is a
/// `static`.
#[derive(Debug, Clone, Copy)]
pub struct Field {
	name: Option<&'static str>,
	bits: u16,
	kind: FieldKind,
}

impl Field {
	const fn named(name: &'static str, bits: u16, kind: FieldKind) -> Field {
		assert!(bits > 0, "field width must be greater than zero");
		Field {
			name: Some(name),
			bits,
			kind,
		}
	}

	pub const fn uint(name: &'static str, bits: u16) -> Field {
		assert!(bits <= 64, "uint fields are at most 64 bits");
		Self::named(name, bits, FieldKind::Uint)
	}

	pub const fn int(name: &'static str, bits: u16) -> Field {
		assert!(bits <= 64, "int fields are at most 64 bits");
		Self::named(name, bits, FieldKind::Int)
	}

	pub const fn bool(name: &'static str, bits: u16) -> Field {
		assert!(bits <= 64, "bool fields are at most 64 bits");
		Self::named(name, bits, FieldKind::Bool)
	}

	pub const fn bytes(name: &'static str, bits: u16) -> Field {
		assert!(bits % 8 == 0, "bytes fields must be whole bytes");
		Self::named(name, bits, FieldKind::Bytes)
	}

	pub const fn float(name: &'static str, bits: u16) -> Field {
		assert!(bits == 32 || bits == 64, "float fields must be 32 or 64 bits");
		Self::named(name, bits, FieldKind::Float)
	}

	pub const fn record(name: &'static str, schema: &'static Schema) -> Field {
		let bits = schema.total_bits();
		assert!(bits > 0 && bits <= u16::MAX as u32);
		Field {
			name: Some(name),
			bits: bits as u16,
			kind: FieldKind::Record(schema),
		}
	}

	/// A gap that is written as zeros and discarded on parse.
	pub const fn reserved(bits: u16) -> Field {
		assert!(bits > 0, "field width must be greater than zero");
		Field {
			name: None,
			bits,
			kind: FieldKind::Uint,
		}
	}

	pub fn is_reserved(&self) -> bool {
		self.name.is_none()
	}

	pub fn bits(&self) -> u16 {
		self.bits
	}
}

/// An ordered list of [Field]s describing one packed record.
///
/// The total width must be a whole number of bytes, and in the bit-packed
/// layout every group must fit a 128-bit integer; both are checked when the
/// schema `static` is evaluated.
#[derive(Debug)]
pub struct Schema {
	name: &'static str,
	fields: &'static [Field],
}

impl Schema {
	pub const fn new(name: &'static str, fields: &'static [Field]) -> Schema {
		let mut aligned = true;
		let mut i = 0;
		while i < fields.len() {
			if fields[i].bits % 8 != 0 {
				aligned = false;
			}
			i += 1;
		}
		if !aligned {
			let mut group: u32 = 0;
			let mut i = 0;
			while i < fields.len() {
				group += fields[i].bits as u32;
				if group % 8 == 0 {
					assert!(group <= 128, "bit group wider than 128 bits");
					group = 0;
				}
				i += 1;
			}
			assert!(group == 0, "schema must pack to a whole number of bytes");
		}
		Schema { name, fields }
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Total width in bits, including reserved gaps.
	pub const fn total_bits(&self) -> u32 {
		let mut sum = 0;
		let mut i = 0;
		while i < self.fields.len() {
			sum += self.fields[i].bits as u32;
			i += 1;
		}
		sum
	}

	/// Exact serialized length in bytes.
	pub const fn total_bytes(&self) -> usize {
		(self.total_bits() / 8) as usize
	}

	/// Non-reserved field names, in declaration order.  This is also the
	/// positional-construction order.
	pub fn keys(&self) -> impl Iterator<Item = &'static str> {
		self.fields.iter().filter_map(|f| f.name)
	}

	pub(crate) fn fields(&self) -> &'static [Field] {
		self.fields
	}

	fn is_byte_aligned(&self) -> bool {
		self.fields.iter().all(|f| f.bits % 8 == 0)
	}

	/// Parses a [Record] from the first [Schema::total_bytes] of `data`.
	pub fn from_bytes(&'static self, data: &[u8]) -> Result<Record, BitfieldError> {
		if data.len() < self.total_bytes() {
			return Err(BitfieldError::ShortInput {
				schema: self.name,
				need: self.total_bytes(),
				got: data.len(),
			});
		}
		let values = if self.is_byte_aligned() {
			self.parse_aligned(data)?
		} else {
			self.parse_packed(data)?
		};
		Ok(Record::from_values(self, values))
	}

	fn parse_aligned(&'static self, data: &[u8]) -> Result<Vec<Value>, BitfieldError> {
		let mut values = Vec::new();
		let mut offset = 0;
		for field in self.fields {
			let len = field.bits as usize / 8;
			let chunk = &data[offset..offset + len];
			offset += len;
			if field.is_reserved() {
				continue;
			}
			values.push(parse_value(field, chunk)?);
		}
		Ok(values)
	}

	fn parse_packed(&'static self, data: &[u8]) -> Result<Vec<Value>, BitfieldError> {
		let mut values = Vec::new();
		let mut offset = 0;
		let mut group: Vec<&Field> = Vec::new();
		let mut group_bits: u32 = 0;
		for field in self.fields {
			group.push(field);
			group_bits += field.bits as u32;
			if group_bits % 8 != 0 {
				continue;
			}

			let len = group_bits as usize / 8;
			let mut word = [0u8; 16];
			word[..len].copy_from_slice(&data[offset..offset + len]);
			offset += len;
			let mut packed = u128::from_le_bytes(word);

			// The last field of the group sits in the least significant
			// bits, so extraction runs back to front.
			let mut extracted = Vec::new();
			for field in group.iter().rev() {
				let raw = packed & mask(field.bits);
				if (field.bits as u32) < 128 {
					packed >>= field.bits;
				}
				if field.is_reserved() {
					continue;
				}
				extracted.push(parse_packed_value(field, raw)?);
			}
			extracted.reverse();
			values.append(&mut extracted);

			group.clear();
			group_bits = 0;
		}
		Ok(values)
	}
}

const fn mask(bits: u16) -> u128 {
	if bits >= 128 {
		u128::MAX
	} else {
		(1 << bits) - 1
	}
}

fn parse_value(field: &Field, chunk: &[u8]) -> Result<Value, BitfieldError> {
	let mut c = Cursor::new(chunk);
	Ok(match field.kind {
		FieldKind::Bytes => Value::Bytes(chunk.to_vec()),
		FieldKind::Int => Value::Int(c.read_int::<LittleEndian>(chunk.len())?),
		FieldKind::Uint => Value::Uint(c.read_uint::<LittleEndian>(chunk.len())?),
		FieldKind::Bool => Value::Bool(c.read_uint::<LittleEndian>(chunk.len())? != 0),
		FieldKind::Float => match chunk.len() {
			4 => Value::Float(c.read_f32::<LittleEndian>()? as f64),
			_ => Value::Float(c.read_f64::<LittleEndian>()?),
		},
		FieldKind::Record(schema) => Value::Record(schema.from_bytes(chunk)?),
	})
}

fn parse_packed_value(field: &Field, raw: u128) -> Result<Value, BitfieldError> {
	Ok(match field.kind {
		FieldKind::Uint => Value::Uint(raw as u64),
		FieldKind::Int => {
			// Sign-extend from the field width.
			let shift = 128 - field.bits as u32;
			Value::Int((((raw << shift) as i128) >> shift) as i64)
		}
		FieldKind::Bool => Value::Bool(raw != 0),
		_ => {
			let len = (field.bits as usize - 1) / 8 + 1;
			parse_value(field, &raw.to_le_bytes()[..len])?
		}
	})
}

impl Record {
	/// Serializes to exactly `schema.total_bytes()` bytes.
	///
	/// Integers wider than their field are masked to the field width; short
	/// byte values are right-padded with NUL and long ones truncated.
	pub fn to_bytes(&self) -> Result<Vec<u8>, BitfieldError> {
		if self.schema().is_byte_aligned() {
			self.to_bytes_aligned()
		} else {
			self.to_bytes_packed()
		}
	}

	/// Pairs every field with its value; reserved fields get `None`.
	fn each_field(&self) -> impl Iterator<Item = (&'static Field, Option<&Value>)> + '_ {
		let mut values = self.values().iter();
		self.schema().fields().iter().map(move |field| {
			if field.is_reserved() {
				(field, None)
			} else {
				(field, values.next())
			}
		})
	}

	fn to_bytes_aligned(&self) -> Result<Vec<u8>, BitfieldError> {
		let mut out = Vec::with_capacity(self.schema().total_bytes());
		for (field, value) in self.each_field() {
			write_value(field, value, &mut out)?;
		}
		Ok(out)
	}

	fn to_bytes_packed(&self) -> Result<Vec<u8>, BitfieldError> {
		let mut out = Vec::with_capacity(self.schema().total_bytes());
		let mut packed: u128 = 0;
		let mut group_bits: u32 = 0;
		for (field, value) in self.each_field() {
			if (field.bits as u32) < 128 {
				packed <<= field.bits;
			}
			packed |= value_as_word(field, value)? & mask(field.bits);
			group_bits += field.bits as u32;
			if group_bits % 8 == 0 {
				let len = group_bits as usize / 8;
				out.extend_from_slice(&packed.to_le_bytes()[..len]);
				packed = 0;
				group_bits = 0;
			}
		}
		Ok(out)
	}
}

fn write_value(
	field: &Field,
	value: Option<&Value>,
	out: &mut Vec<u8>,
) -> Result<(), BitfieldError> {
	let len = field.bits as usize / 8;
	let Some(value) = value else {
		out.resize(out.len() + len, 0);
		return Ok(());
	};
	match (field.kind, value) {
		(FieldKind::Bytes, Value::Bytes(bytes)) => {
			let take = bytes.len().min(len);
			out.extend_from_slice(&bytes[..take]);
			out.resize(out.len() + (len - take), 0);
		}
		(FieldKind::Uint, Value::Uint(v)) => {
			out.write_uint::<LittleEndian>(v & mask(field.bits) as u64, len)?;
		}
		(FieldKind::Int, Value::Int(v)) => {
			// Two's complement truncated to the field width.
			out.write_uint::<LittleEndian>(*v as u64 & mask(field.bits) as u64, len)?;
		}
		(FieldKind::Bool, Value::Bool(v)) => {
			out.push(*v as u8);
			out.resize(out.len() + (len - 1), 0);
		}
		(FieldKind::Float, Value::Float(v)) => match len {
			4 => out.write_f32::<LittleEndian>(*v as f32)?,
			_ => out.write_f64::<LittleEndian>(*v)?,
		},
		(FieldKind::Record(schema), Value::Record(rec)) => {
			if !std::ptr::eq(schema, rec.schema()) {
				return Err(mismatch(field));
			}
			out.extend_from_slice(&rec.to_bytes()?);
		}
		_ => return Err(mismatch(field)),
	}
	Ok(())
}

/// The field's value as an integer, for packing into a bit group.  Byte-like
/// values contribute their little-endian byte form.
fn value_as_word(field: &Field, value: Option<&Value>) -> Result<u128, BitfieldError> {
	let Some(value) = value else { return Ok(0) };
	Ok(match (field.kind, value) {
		(FieldKind::Uint, Value::Uint(v)) => *v as u128,
		(FieldKind::Int, Value::Int(v)) => *v as u128,
		(FieldKind::Bool, Value::Bool(v)) => *v as u128,
		_ => {
			let mut bytes = Vec::new();
			write_value(field, Some(value), &mut bytes)?;
			let mut word = [0u8; 16];
			word[..bytes.len()].copy_from_slice(&bytes);
			u128::from_le_bytes(word)
		}
	})
}

fn mismatch(field: &Field) -> BitfieldError {
	BitfieldError::TypeMismatch {
		field: field.name.unwrap_or("reserved"),
		requested: field.kind.describe(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	static SIMPLE: Schema = Schema::new(
		"Simple",
		&[
			Field::int("foo", 16),
			Field::bytes("bar", 48),
			Field::float("baz", 64),
		],
	);

	static FULL: Schema = Schema::new(
		"Full",
		&[
			Field::bool("foo", 1),
			Field::uint("bar", 30),
			Field::uint("baz", 33),
			Field::float("fiz", 32),
		],
	);

	static RESERVED_SIMPLE: Schema = Schema::new(
		"ReservedSimple",
		&[
			Field::reserved(16),
			Field::bytes("foo", 16),
			Field::reserved(8),
			Field::bytes("bar", 16),
		],
	);

	static RESERVED_FULL: Schema = Schema::new(
		"ReservedFull",
		&[
			Field::reserved(4),
			Field::uint("foo", 12),
			Field::reserved(5),
			Field::uint("bar", 3),
		],
	);

	#[test]
	fn to_bytes_simple() {
		let rec = record!(SIMPLE; 1234i16, &b"hello!"[..], 3.14f64).unwrap();
		let mut expected = 1234i16.to_le_bytes().to_vec();
		expected.extend_from_slice(b"hello!");
		expected.extend_from_slice(&3.14f64.to_le_bytes());
		assert_eq!(rec.to_bytes().unwrap(), expected);
		assert_eq!(expected.len(), SIMPLE.total_bytes());
	}

	#[test]
	fn to_bytes_full() {
		let rec = record!(FULL; true, 123_456u32, 987_654u64, 1.55f32).unwrap();
		let packed: u64 = (((1 << 30) | 123_456) << 33) | 987_654;
		let mut expected = packed.to_le_bytes().to_vec();
		expected.extend_from_slice(&1.55f32.to_le_bytes());
		assert_eq!(rec.to_bytes().unwrap(), expected);
	}

	#[test]
	fn from_bytes_simple() {
		let mut data = (-1234i16).to_le_bytes().to_vec();
		data.extend_from_slice(b"foobar");
		data.extend_from_slice(&5.25f64.to_le_bytes());
		let rec = SIMPLE.from_bytes(&data).unwrap();
		assert_eq!(rec.get::<i16>("foo").unwrap(), -1234);
		assert_eq!(rec.get::<Vec<u8>>("bar").unwrap(), b"foobar");
		assert_eq!(rec.get::<f64>("baz").unwrap(), 5.25);
	}

	#[test]
	fn from_bytes_full() {
		let packed: u64 = (((1 << 30) | 9999) << 33) | 123_123;
		let mut data = packed.to_le_bytes().to_vec();
		data.extend_from_slice(&6.125f32.to_le_bytes());
		let rec = FULL.from_bytes(&data).unwrap();
		assert_eq!(rec.get::<bool>("foo").unwrap(), true);
		assert_eq!(rec.get::<u32>("bar").unwrap(), 9999);
		assert_eq!(rec.get::<u64>("baz").unwrap(), 123_123);
		assert_eq!(rec.get::<f32>("fiz").unwrap(), 6.125);
	}

	#[test]
	fn reserved_simple() {
		let rec = record!(RESERVED_SIMPLE; &b"qq"[..], &b"aa"[..]).unwrap();
		assert_eq!(rec.to_bytes().unwrap(), b"\x00\x00qq\x00aa");

		let rec = RESERVED_SIMPLE.from_bytes(b"zzqqzaa").unwrap();
		assert_eq!(rec.get::<Vec<u8>>("foo").unwrap(), b"qq");
		assert_eq!(rec.get::<Vec<u8>>("bar").unwrap(), b"aa");
	}

	#[test]
	fn reserved_full() {
		let rec = record!(RESERVED_FULL; 3456u16, 3u8).unwrap();
		assert_eq!(rec.to_bytes().unwrap(), b"\x80\x0d\x03");

		// Reserved bits may arrive non-zero; they are discarded.
		let rec = RESERVED_FULL.from_bytes(b"\x80\x9d\xab").unwrap();
		assert_eq!(rec.get::<u16>("foo").unwrap(), 3456);
		assert_eq!(rec.get::<u8>("bar").unwrap(), 3);
	}

	#[test]
	fn short_input() {
		match SIMPLE.from_bytes(b"tooshort") {
			Err(BitfieldError::ShortInput { need: 16, got: 8, .. }) => {}
			other => panic!("expected short input, got {:?}", other),
		}
	}

	#[test]
	fn bytes_pad_and_truncate() {
		let rec = record!(RESERVED_SIMPLE; &b"q"[..], &b"aaaa"[..]).unwrap();
		assert_eq!(rec.to_bytes().unwrap(), b"\x00\x00q\x00\x00aa");
	}

	#[test]
	fn parse_ignores_trailing_bytes() {
		let mut data = b"\x80\x0d\x03".to_vec();
		data.extend_from_slice(b"junk");
		let rec = RESERVED_FULL.from_bytes(&data).unwrap();
		assert_eq!(rec.get::<u16>("foo").unwrap(), 3456);
		assert_eq!(rec.to_bytes().unwrap().len(), RESERVED_FULL.total_bytes());
	}

	#[test]
	fn signed_round_trip_in_bit_group() {
		static PACKED_INT: Schema = Schema::new(
			"PackedInt",
			&[Field::int("a", 12), Field::uint("b", 4)],
		);
		let rec = record!(PACKED_INT; -5i16, 9u8).unwrap();
		let bytes = rec.to_bytes().unwrap();
		let back = PACKED_INT.from_bytes(&bytes).unwrap();
		assert_eq!(back.get::<i16>("a").unwrap(), -5);
		assert_eq!(back.get::<u8>("b").unwrap(), 9);
	}

	#[test]
	fn keys_skip_reserved() {
		let keys: Vec<_> = RESERVED_FULL.keys().collect();
		assert_eq!(keys, vec!["foo", "bar"]);
	}
}

//! Dynamic values for schema-driven records, and the conversions between
//! them and ordinary Rust types.

use super::{BitfieldError, Schema};

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Bytes(Vec<u8>),
	Int(i64),
	Uint(u64),
	Bool(bool),
	Float(f64),
	Record(Record),
}

/// A [Schema] paired with one value per non-reserved field.
///
/// Records are built either positionally (one value per non-reserved field,
/// in declaration order) or by name (the key set must equal the schema's
/// non-reserved names); the two cannot be combined.  Fields are read and
/// written by name, through the [FromValue]/[IntoValue] conversions.
#[derive(Debug, Clone)]
pub struct Record {
	schema: &'static Schema,
	values: Vec<Value>,
}

impl PartialEq for Record {
	fn eq(&self, other: &Record) -> bool {
		std::ptr::eq(self.schema, other.schema) && self.values == other.values
	}
}

impl Record {
	/// Builds a record from one value per non-reserved field, in schema
	/// order.
	pub fn positional(schema: &'static Schema, values: Vec<Value>) -> Result<Record, BitfieldError> {
		let want = schema.keys().count();
		if values.len() != want {
			return Err(BitfieldError::Arity {
				schema: schema.name(),
				want,
				got: values.len(),
			});
		}
		Ok(Record { schema, values })
	}

	/// Builds a record from `(name, value)` pairs.  Every non-reserved field
	/// must appear exactly once, and no other names may appear.
	pub fn named(
		schema: &'static Schema,
		mut pairs: Vec<(&str, Value)>,
	) -> Result<Record, BitfieldError> {
		let mut values = Vec::with_capacity(pairs.len());
		for key in schema.keys() {
			let at = pairs
				.iter()
				.position(|(name, _)| *name == key)
				.ok_or(BitfieldError::KeySet {
					schema: schema.name(),
				})?;
			values.push(pairs.swap_remove(at).1);
		}
		if !pairs.is_empty() {
			return Err(BitfieldError::KeySet {
				schema: schema.name(),
			});
		}
		Ok(Record { schema, values })
	}

	/// Construction for values the caller already knows to match the schema,
	/// such as parser output.
	pub(crate) fn from_values(schema: &'static Schema, values: Vec<Value>) -> Record {
		debug_assert_eq!(values.len(), schema.keys().count());
		Record { schema, values }
	}

	pub fn schema(&self) -> &'static Schema {
		self.schema
	}

	pub(super) fn values(&self) -> &[Value] {
		&self.values
	}

	fn index_of(&self, name: &str) -> Result<usize, BitfieldError> {
		self.schema
			.keys()
			.position(|key| key == name)
			.ok_or_else(|| BitfieldError::UnknownField {
				schema: self.schema.name(),
				name: name.to_owned(),
			})
	}

	/// Reads a field by name, converted through [FromValue].
	pub fn get<T: FromValue>(&self, name: &str) -> Result<T, BitfieldError> {
		let at = self.index_of(name)?;
		T::from_value(&self.values[at]).ok_or_else(|| BitfieldError::TypeMismatch {
			field: self.schema.keys().nth(at).unwrap_or("?"),
			requested: std::any::type_name::<T>(),
		})
	}

	/// Replaces a field by name.  Unknown names fail.
	pub fn set(&mut self, name: &str, value: impl IntoValue) -> Result<(), BitfieldError> {
		let at = self.index_of(name)?;
		self.values[at] = value.into_value();
		Ok(())
	}
}

/// Conversion out of a dynamic [Value].  `None` means the value's shape does
/// not fit the requested type.
pub trait FromValue: Sized {
	fn from_value(value: &Value) -> Option<Self>;
}

/// Conversion into a dynamic [Value].
pub trait IntoValue {
	fn into_value(self) -> Value;
}

impl FromValue for Value {
	fn from_value(value: &Value) -> Option<Value> {
		Some(value.clone())
	}
}

impl IntoValue for Value {
	fn into_value(self) -> Value {
		self
	}
}

macro_rules! impl_uint_value {
	($($t:ty),*) => {
		$(
			impl FromValue for $t {
				fn from_value(value: &Value) -> Option<$t> {
					match value {
						Value::Uint(v) => Some(*v as $t),
						_ => None,
					}
				}
			}
			impl IntoValue for $t {
				fn into_value(self) -> Value {
					Value::Uint(self as u64)
				}
			}
		)*
	};
}

macro_rules! impl_int_value {
	($($t:ty),*) => {
		$(
			impl FromValue for $t {
				fn from_value(value: &Value) -> Option<$t> {
					match value {
						Value::Int(v) => Some(*v as $t),
						_ => None,
					}
				}
			}
			impl IntoValue for $t {
				fn into_value(self) -> Value {
					Value::Int(self as i64)
				}
			}
		)*
	};
}

impl_uint_value! { u8, u16, u32, u64 }
impl_int_value! { i8, i16, i32, i64 }

impl FromValue for bool {
	fn from_value(value: &Value) -> Option<bool> {
		match value {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}
}

impl IntoValue for bool {
	fn into_value(self) -> Value {
		Value::Bool(self)
	}
}

impl FromValue for f32 {
	fn from_value(value: &Value) -> Option<f32> {
		match value {
			Value::Float(v) => Some(*v as f32),
			_ => None,
		}
	}
}

impl IntoValue for f32 {
	fn into_value(self) -> Value {
		Value::Float(self as f64)
	}
}

impl FromValue for f64 {
	fn from_value(value: &Value) -> Option<f64> {
		match value {
			Value::Float(v) => Some(*v),
			_ => None,
		}
	}
}

impl IntoValue for f64 {
	fn into_value(self) -> Value {
		Value::Float(self)
	}
}

impl FromValue for Vec<u8> {
	fn from_value(value: &Value) -> Option<Vec<u8>> {
		match value {
			Value::Bytes(v) => Some(v.clone()),
			_ => None,
		}
	}
}

impl IntoValue for Vec<u8> {
	fn into_value(self) -> Value {
		Value::Bytes(self)
	}
}

impl IntoValue for &[u8] {
	fn into_value(self) -> Value {
		Value::Bytes(self.to_vec())
	}
}

impl<const N: usize> FromValue for [u8; N] {
	fn from_value(value: &Value) -> Option<[u8; N]> {
		match value {
			Value::Bytes(v) => v.as_slice().try_into().ok(),
			_ => None,
		}
	}
}

impl<const N: usize> IntoValue for [u8; N] {
	fn into_value(self) -> Value {
		Value::Bytes(self.to_vec())
	}
}

/// Label text: UTF-8 bytes, right-padded with NUL on the wire.  Decoding
/// strips the trailing NULs and rejects invalid UTF-8.
impl FromValue for String {
	fn from_value(value: &Value) -> Option<String> {
		match value {
			Value::Bytes(v) => {
				let end = v.iter().rposition(|&b| b != 0).map_or(0, |at| at + 1);
				std::str::from_utf8(&v[..end]).ok().map(str::to_owned)
			}
			_ => None,
		}
	}
}

impl IntoValue for String {
	fn into_value(self) -> Value {
		Value::Bytes(self.into_bytes())
	}
}

impl IntoValue for &str {
	fn into_value(self) -> Value {
		Value::Bytes(self.as_bytes().to_vec())
	}
}

impl FromValue for Record {
	fn from_value(value: &Value) -> Option<Record> {
		match value {
			Value::Record(v) => Some(v.clone()),
			_ => None,
		}
	}
}

impl IntoValue for Record {
	fn into_value(self) -> Value {
		Value::Record(self)
	}
}

/// Positional [Record] construction with [IntoValue] conversion applied to
/// each argument.
macro_rules! record {
	($schema:expr; $($value:expr),* $(,)?) => {
		$crate::bitfield::Record::positional(
			&$schema,
			vec![$($crate::bitfield::IntoValue::into_value($value)),*],
		)
	};
}

pub(crate) use record;

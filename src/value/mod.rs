//! Typed protocol values
//!
//! A [`Value`] is an explicit tagged variant of everything the protocol can
//! transport: null, boolean, sized integers, floats, strings, datetimes,
//! references, embedded objects, and homogeneous arrays of any one of those.
//! Each value may carry an ordered list of content-language tags; array
//! elements share the array's annotation.
//!
//! ## Equality
//!
//! Values are equal only when they have the same variant and deep-equal payload:
//! - `uint8(5) != uint32(5)` (width and signedness are part of the variant)
//! - a typed null equals only a null of the same declared kind
//! - floats follow IEEE-754 (`NaN != NaN`)
//! - language annotations are not part of equality
//!
//! Ordering is only defined within one variant; comparing across variants yields `None`.

mod language;
mod node;
mod object;
mod reference;

pub use language::{LanguageTag, LanguageTags};
pub use node::{NodeBody, TypedNode};
pub use object::EmbeddedObject;
pub use reference::{KeyValue, ObjectPath};

use crate::error::InvalidValue;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerWidth {
    Bits8,
    Bits16,
    Bits32,
    Bits64,
}

impl IntegerWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntegerWidth::Bits8 => 8,
            IntegerWidth::Bits16 => 16,
            IntegerWidth::Bits32 => 32,
            IntegerWidth::Bits64 => 64,
        }
    }
}

/// Width and signedness of an integer value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerType {
    pub width: IntegerWidth,
    pub signed: bool,
}

impl IntegerType {
    pub const UINT8: IntegerType = IntegerType::unsigned(IntegerWidth::Bits8);
    pub const UINT16: IntegerType = IntegerType::unsigned(IntegerWidth::Bits16);
    pub const UINT32: IntegerType = IntegerType::unsigned(IntegerWidth::Bits32);
    pub const UINT64: IntegerType = IntegerType::unsigned(IntegerWidth::Bits64);
    pub const SINT8: IntegerType = IntegerType::signed(IntegerWidth::Bits8);
    pub const SINT16: IntegerType = IntegerType::signed(IntegerWidth::Bits16);
    pub const SINT32: IntegerType = IntegerType::signed(IntegerWidth::Bits32);
    pub const SINT64: IntegerType = IntegerType::signed(IntegerWidth::Bits64);

    pub const fn signed(width: IntegerWidth) -> Self {
        Self { width, signed: true }
    }

    pub const fn unsigned(width: IntegerWidth) -> Self {
        Self {
            width,
            signed: false,
        }
    }

    /// Inclusive range of representable values
    pub fn range(self) -> (i128, i128) {
        let bits = self.width.bits();
        if self.signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

/// Variant tag of a non-null, non-array value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Integer(IntegerType),
    Float,
    String,
    DateTime,
    Reference,
    Object,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer(ty) => match (ty.signed, ty.width) {
                (false, IntegerWidth::Bits8) => "uint8",
                (false, IntegerWidth::Bits16) => "uint16",
                (false, IntegerWidth::Bits32) => "uint32",
                (false, IntegerWidth::Bits64) => "uint64",
                (true, IntegerWidth::Bits8) => "sint8",
                (true, IntegerWidth::Bits16) => "sint16",
                (true, IntegerWidth::Bits32) => "sint32",
                (true, IntegerWidth::Bits64) => "sint64",
            },
            ValueKind::Float => "real64",
            ValueKind::String => "string",
            ValueKind::DateTime => "datetime",
            ValueKind::Reference => "reference",
            ValueKind::Object => "object",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "boolean" => ValueKind::Boolean,
            "uint8" => ValueKind::Integer(IntegerType::UINT8),
            "uint16" => ValueKind::Integer(IntegerType::UINT16),
            "uint32" => ValueKind::Integer(IntegerType::UINT32),
            "uint64" => ValueKind::Integer(IntegerType::UINT64),
            "sint8" => ValueKind::Integer(IntegerType::SINT8),
            "sint16" => ValueKind::Integer(IntegerType::SINT16),
            "sint32" => ValueKind::Integer(IntegerType::SINT32),
            "sint64" => ValueKind::Integer(IntegerType::SINT64),
            "real64" => ValueKind::Float,
            "string" => ValueKind::String,
            "datetime" => ValueKind::DateTime,
            "reference" => ValueKind::Reference,
            "object" => ValueKind::Object,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer checked against its declared width and signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Integer {
    ty: IntegerType,
    value: i128,
}

impl Integer {
    pub fn new(ty: IntegerType, value: i128) -> Result<Self, InvalidValue> {
        let (min, max) = ty.range();
        if value < min || value > max {
            return Err(InvalidValue::IntegerOutOfRange {
                kind: ValueKind::Integer(ty),
                value,
            });
        }
        Ok(Self { ty, value })
    }

    pub fn integer_type(&self) -> IntegerType {
        self.ty
    }

    pub fn value(&self) -> i128 {
        self.value
    }
}

/// Homogeneous array: every element has `element_kind`, none is null or an array
#[derive(Debug, Clone, PartialEq)]
pub struct ValueArray {
    element_kind: ValueKind,
    elements: Vec<ValueData>,
}

impl ValueArray {
    pub fn new(element_kind: ValueKind, elements: Vec<ValueData>) -> Result<Self, InvalidValue> {
        for (index, element) in elements.iter().enumerate() {
            match element {
                ValueData::Array(_) => return Err(InvalidValue::NestedArray),
                ValueData::Null(_) => return Err(InvalidValue::NullArrayElement { index }),
                _ => {}
            }
            // Scalars always have a kind
            let found = element.kind().ok_or(InvalidValue::NullArrayElement { index })?;
            if found != element_kind {
                return Err(InvalidValue::HeterogeneousArray {
                    expected: element_kind,
                    found,
                    index,
                });
            }
        }
        Ok(Self {
            element_kind,
            elements,
        })
    }

    /// Build an array whose element kind is taken from the first element.
    pub fn of(elements: Vec<ValueData>) -> Result<Self, InvalidValue> {
        let first = elements.first().ok_or(InvalidValue::UntypedEmptyArray)?;
        if first.is_array() {
            return Err(InvalidValue::NestedArray);
        }
        let kind = first
            .kind()
            .filter(|_| !first.is_null())
            .ok_or(InvalidValue::NullArrayElement { index: 0 })?;
        Self::new(kind, elements)
    }

    pub fn element_kind(&self) -> ValueKind {
        self.element_kind
    }

    pub fn elements(&self) -> &[ValueData] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Payload of a value
#[derive(Debug, Clone)]
pub enum ValueData {
    /// Null, optionally declared as a null of a given kind
    Null(Option<ValueKind>),
    Boolean(bool),
    Integer(Integer),
    Float(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Reference(ObjectPath),
    Object(EmbeddedObject),
    Array(ValueArray),
}

impl ValueData {
    /// Variant tag. Arrays report their element kind, nulls their declared kind.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            ValueData::Null(kind) => *kind,
            ValueData::Boolean(_) => Some(ValueKind::Boolean),
            ValueData::Integer(i) => Some(ValueKind::Integer(i.ty)),
            ValueData::Float(_) => Some(ValueKind::Float),
            ValueData::String(_) => Some(ValueKind::String),
            ValueData::DateTime(_) => Some(ValueKind::DateTime),
            ValueData::Reference(_) => Some(ValueKind::Reference),
            ValueData::Object(_) => Some(ValueKind::Object),
            ValueData::Array(a) => Some(a.element_kind),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ValueData::Null(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ValueData::Array(_))
    }
}

impl PartialEq for ValueData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueData::Null(a), ValueData::Null(b)) => a == b,
            (ValueData::Boolean(a), ValueData::Boolean(b)) => a == b,
            (ValueData::Integer(a), ValueData::Integer(b)) => a == b,
            // IEEE-754: NaN != NaN
            (ValueData::Float(a), ValueData::Float(b)) => a == b,
            (ValueData::String(a), ValueData::String(b)) => a == b,
            (ValueData::DateTime(a), ValueData::DateTime(b)) => {
                a == b && a.offset() == b.offset()
            }
            (ValueData::Reference(a), ValueData::Reference(b)) => a == b,
            (ValueData::Object(a), ValueData::Object(b)) => a == b,
            (ValueData::Array(a), ValueData::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for ValueData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (ValueData::Null(a), ValueData::Null(b)) if a == b => Some(Ordering::Equal),
            (ValueData::Boolean(a), ValueData::Boolean(b)) => a.partial_cmp(b),
            (ValueData::Integer(a), ValueData::Integer(b)) if a.ty == b.ty => {
                a.value.partial_cmp(&b.value)
            }
            (ValueData::Float(a), ValueData::Float(b)) => a.partial_cmp(b),
            (ValueData::String(a), ValueData::String(b)) => a.partial_cmp(b),
            (ValueData::DateTime(a), ValueData::DateTime(b)) => Some(
                a.cmp(b).then_with(|| {
                    a.offset()
                        .local_minus_utc()
                        .cmp(&b.offset().local_minus_utc())
                }),
            ),
            (ValueData::Reference(a), ValueData::Reference(b)) => {
                if a == b {
                    Some(Ordering::Equal)
                } else {
                    a.to_string().partial_cmp(&b.to_string())
                }
            }
            (ValueData::Array(a), ValueData::Array(b)) if a.element_kind == b.element_kind => {
                for (x, y) in a.elements.iter().zip(b.elements.iter()) {
                    match x.partial_cmp(y)? {
                        Ordering::Equal => continue,
                        ordering => return Some(ordering),
                    }
                }
                a.len().partial_cmp(&b.len())
            }
            _ => None,
        }
    }
}

macro_rules! integer_from {
    ($($t:ty => $ty:expr),* $(,)?) => {
        $(
            impl From<$t> for ValueData {
                fn from(v: $t) -> Self {
                    ValueData::Integer(Integer { ty: $ty, value: v as i128 })
                }
            }
        )*
    };
}

integer_from! {
    u8 => IntegerType::UINT8,
    u16 => IntegerType::UINT16,
    u32 => IntegerType::UINT32,
    u64 => IntegerType::UINT64,
    i8 => IntegerType::SINT8,
    i16 => IntegerType::SINT16,
    i32 => IntegerType::SINT32,
    i64 => IntegerType::SINT64,
}

impl From<bool> for ValueData {
    fn from(v: bool) -> Self {
        ValueData::Boolean(v)
    }
}

impl From<f64> for ValueData {
    fn from(v: f64) -> Self {
        ValueData::Float(v)
    }
}

impl From<&str> for ValueData {
    fn from(v: &str) -> Self {
        ValueData::String(v.to_string())
    }
}

impl From<String> for ValueData {
    fn from(v: String) -> Self {
        ValueData::String(v)
    }
}

impl From<DateTime<FixedOffset>> for ValueData {
    fn from(v: DateTime<FixedOffset>) -> Self {
        ValueData::DateTime(v)
    }
}

impl From<ObjectPath> for ValueData {
    fn from(v: ObjectPath) -> Self {
        ValueData::Reference(v)
    }
}

impl From<EmbeddedObject> for ValueData {
    fn from(v: EmbeddedObject) -> Self {
        ValueData::Object(v)
    }
}

/// A protocol value: payload plus optional content-language annotation
#[derive(Debug, Clone)]
pub struct Value {
    data: ValueData,
    languages: LanguageTags,
}

impl Value {
    pub fn new(data: ValueData) -> Self {
        Self {
            data,
            languages: LanguageTags::new(),
        }
    }

    pub fn null() -> Self {
        Self::new(ValueData::Null(None))
    }

    pub fn typed_null(kind: ValueKind) -> Self {
        Self::new(ValueData::Null(Some(kind)))
    }

    pub fn boolean(v: bool) -> Self {
        Self::new(v.into())
    }

    pub fn uint32(v: u32) -> Self {
        Self::new(v.into())
    }

    pub fn uint64(v: u64) -> Self {
        Self::new(v.into())
    }

    pub fn sint64(v: i64) -> Self {
        Self::new(v.into())
    }

    /// Integer of an explicit type, range-checked
    pub fn integer(ty: IntegerType, value: i128) -> Result<Self, InvalidValue> {
        Ok(Self::new(ValueData::Integer(Integer::new(ty, value)?)))
    }

    pub fn real64(v: f64) -> Self {
        Self::new(v.into())
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::new(ValueData::String(v.into()))
    }

    pub fn datetime(v: DateTime<FixedOffset>) -> Self {
        Self::new(v.into())
    }

    pub fn reference(path: ObjectPath) -> Self {
        Self::new(path.into())
    }

    pub fn object(object: EmbeddedObject) -> Self {
        Self::new(object.into())
    }

    pub fn array(element_kind: ValueKind, elements: Vec<ValueData>) -> Result<Self, InvalidValue> {
        Ok(Self::new(ValueData::Array(ValueArray::new(
            element_kind,
            elements,
        )?)))
    }

    /// Array whose element kind is inferred from the first element
    pub fn array_of(elements: Vec<ValueData>) -> Result<Self, InvalidValue> {
        Ok(Self::new(ValueData::Array(ValueArray::of(elements)?)))
    }

    pub fn with_languages(mut self, languages: LanguageTags) -> Self {
        self.languages = languages;
        self
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn into_data(self) -> ValueData {
        self.data
    }

    pub fn languages(&self) -> &LanguageTags {
        &self.languages
    }

    pub fn kind(&self) -> Option<ValueKind> {
        self.data.kind()
    }

    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    pub fn is_array(&self) -> bool {
        self.data.is_array()
    }
}

impl From<ValueData> for Value {
    fn from(data: ValueData) -> Self {
        Value::new(data)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.data.partial_cmp(&other.data)
    }
}

//! Typed node trees: the lossless, encoding-neutral form of a [`Value`].
//!
//! The transport layer picks the wire encoding; this module only guarantees
//! that `Value -> TypedNode -> Value` preserves every variant, width, offset and
//! language annotation. Scalars use their canonical CIM text forms.

use crate::error::InvalidValue;
use crate::value::{
    EmbeddedObject, Integer, LanguageTag, LanguageTags, ObjectPath, Value, ValueArray, ValueData,
    ValueKind,
};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

const EXTENDED_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedNode {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    pub body: NodeBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeBody {
    Null {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        declared: Option<String>,
    },
    Scalar {
        kind: String,
        text: String,
    },
    Array {
        element_kind: String,
        items: Vec<NodeBody>,
    },
    Object {
        class_name: String,
        properties: Vec<(String, TypedNode)>,
    },
}

impl Value {
    pub fn to_node(&self) -> TypedNode {
        TypedNode {
            languages: self.languages.to_strings(),
            body: data_to_body(&self.data),
        }
    }

    /// Rebuild a value from a node tree, re-running every construction check.
    pub fn from_node(node: &TypedNode) -> Result<Value, InvalidValue> {
        let languages = node
            .languages
            .iter()
            .map(|tag| LanguageTag::parse(tag))
            .collect::<Result<Vec<_>, _>>()?;
        let data = body_to_data(&node.body)?;
        Ok(Value::new(data).with_languages(LanguageTags::from_tags(languages)?))
    }
}

fn data_to_body(data: &ValueData) -> NodeBody {
    match data {
        ValueData::Null(declared) => NodeBody::Null {
            declared: declared.map(|k| k.as_str().to_string()),
        },
        ValueData::Object(object) => NodeBody::Object {
            class_name: object.class_name().to_string(),
            properties: object
                .properties()
                .iter()
                .map(|(name, value)| (name.clone(), value.to_node()))
                .collect(),
        },
        ValueData::Array(array) => NodeBody::Array {
            element_kind: array.element_kind().as_str().to_string(),
            items: array.elements().iter().map(data_to_body).collect(),
        },
        scalar => NodeBody::Scalar {
            // Scalars always carry a kind
            kind: scalar.kind().map(ValueKind::as_str).unwrap_or_default().to_string(),
            text: scalar_text(scalar),
        },
    }
}

fn scalar_text(data: &ValueData) -> String {
    match data {
        ValueData::Boolean(true) => "TRUE".to_string(),
        ValueData::Boolean(false) => "FALSE".to_string(),
        ValueData::Integer(i) => i.value().to_string(),
        ValueData::Float(f) => f.to_string(),
        ValueData::String(s) => s.clone(),
        ValueData::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        ValueData::Reference(path) => path.to_string(),
        ValueData::Null(_) | ValueData::Object(_) | ValueData::Array(_) => String::new(),
    }
}

/// RFC 3339 text, plus the signed extended years chrono writes outside 0..=9999
fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, EXTENDED_DATETIME_FORMAT))
        .ok()
}

fn kind_named(name: &str) -> Result<ValueKind, InvalidValue> {
    ValueKind::from_name(name)
        .ok_or_else(|| InvalidValue::MalformedNode(format!("unknown kind {:?}", name)))
}

fn body_to_data(body: &NodeBody) -> Result<ValueData, InvalidValue> {
    match body {
        NodeBody::Null { declared } => {
            let declared = declared.as_deref().map(kind_named).transpose()?;
            Ok(ValueData::Null(declared))
        }
        NodeBody::Scalar { kind, text } => parse_scalar(kind_named(kind)?, text),
        NodeBody::Array {
            element_kind,
            items,
        } => {
            let element_kind = kind_named(element_kind)?;
            let elements = items
                .iter()
                .map(body_to_data)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ValueData::Array(ValueArray::new(element_kind, elements)?))
        }
        NodeBody::Object {
            class_name,
            properties,
        } => {
            let mut object = EmbeddedObject::new(class_name)?;
            for (name, node) in properties {
                object = object.with_property(name, Value::from_node(node)?)?;
            }
            Ok(ValueData::Object(object))
        }
    }
}

fn parse_scalar(kind: ValueKind, text: &str) -> Result<ValueData, InvalidValue> {
    let malformed = || InvalidValue::MalformedNode(format!("bad {} text {:?}", kind, text));
    let data = match kind {
        ValueKind::Boolean => {
            if text.eq_ignore_ascii_case("true") {
                ValueData::Boolean(true)
            } else if text.eq_ignore_ascii_case("false") {
                ValueData::Boolean(false)
            } else {
                return Err(malformed());
            }
        }
        ValueKind::Integer(ty) => {
            let value = text.parse::<i128>().map_err(|_| malformed())?;
            ValueData::Integer(Integer::new(ty, value)?)
        }
        ValueKind::Float => ValueData::Float(text.parse::<f64>().map_err(|_| malformed())?),
        ValueKind::String => ValueData::String(text.to_string()),
        ValueKind::DateTime => {
            ValueData::DateTime(parse_datetime(text).ok_or_else(malformed)?)
        }
        ValueKind::Reference => ValueData::Reference(text.parse::<ObjectPath>()?),
        ValueKind::Object => {
            return Err(InvalidValue::MalformedNode(
                "objects are not scalar nodes".to_string(),
            ))
        }
    };
    Ok(data)
}

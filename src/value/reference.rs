//! Object paths: the target identity carried by reference values.
//!
//! Canonical text form: `[//host/namespace:]ClassName[.key=value,...]`, with
//! `namespace:` allowed on its own. String key values are double-quoted with
//! `\"` and `\\` escapes; booleans are `TRUE`/`FALSE`; integers are decimal.

use crate::error::InvalidValue;
use std::fmt;
use std::str::FromStr;

/// Key property value inside an object path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")
            }
            KeyValue::Integer(i) => write!(f, "{}", i),
            KeyValue::Boolean(true) => f.write_str("TRUE"),
            KeyValue::Boolean(false) => f.write_str("FALSE"),
        }
    }
}

/// Identity of a target object (host, namespace, class and key bindings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    host: Option<String>,
    namespace: Option<String>,
    class_name: String,
    keys: Vec<(String, KeyValue)>,
}

impl ObjectPath {
    pub fn new(class_name: &str) -> Result<Self, InvalidValue> {
        if !is_identifier(class_name) {
            return Err(invalid(format!("bad class name {:?}", class_name)));
        }
        Ok(Self {
            host: None,
            namespace: None,
            class_name: class_name.to_string(),
            keys: Vec::new(),
        })
    }

    pub fn with_namespace(mut self, namespace: &str) -> Result<Self, InvalidValue> {
        if namespace.is_empty() || !namespace.split('/').all(is_identifier) {
            return Err(invalid(format!("bad namespace {:?}", namespace)));
        }
        self.namespace = Some(namespace.to_string());
        Ok(self)
    }

    /// Set the host. A host requires a namespace in the text form, so the
    /// namespace must already be set.
    pub fn with_host(mut self, host: &str) -> Result<Self, InvalidValue> {
        let valid_host = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_'));
        if !valid_host {
            return Err(invalid(format!("bad host {:?}", host)));
        }
        if self.namespace.is_none() {
            return Err(invalid("host given without namespace".to_string()));
        }
        self.host = Some(host.to_string());
        Ok(self)
    }

    pub fn with_key(mut self, name: &str, value: KeyValue) -> Result<Self, InvalidValue> {
        if !is_identifier(name) {
            return Err(invalid(format!("bad key name {:?}", name)));
        }
        if self.keys.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
            return Err(invalid(format!("duplicate key {}", name)));
        }
        self.keys.push((name.to_string(), value));
        Ok(self)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn keys(&self) -> &[(String, KeyValue)] {
        &self.keys
    }

    pub fn key(&self, name: &str) -> Option<&KeyValue> {
        self.keys
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "//{}/", host)?;
        }
        if let Some(namespace) = &self.namespace {
            write!(f, "{}:", namespace)?;
        }
        f.write_str(&self.class_name)?;
        for (i, (name, value)) in self.keys.iter().enumerate() {
            let sep = if i == 0 { '.' } else { ',' };
            write!(f, "{}{}={}", sep, name, value)?;
        }
        Ok(())
    }
}

impl FromStr for ObjectPath {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, rest) = match s.strip_prefix("//") {
            Some(after) => {
                let slash = after
                    .find('/')
                    .ok_or_else(|| invalid(format!("missing namespace in {:?}", s)))?;
                (Some(&after[..slash]), &after[slash + 1..])
            }
            None => (None, s),
        };

        // The namespace separator is the first ':' ahead of the key list.
        let head_end = rest
            .find(|c: char| c == '.' || c == '"')
            .unwrap_or(rest.len());
        let (namespace, rest) = match rest[..head_end].find(':') {
            Some(colon) => (Some(&rest[..colon]), &rest[colon + 1..]),
            None => (None, rest),
        };

        let (class_name, key_text) = match rest.find('.') {
            Some(dot) => (&rest[..dot], Some(&rest[dot + 1..])),
            None => (rest, None),
        };

        let mut path = ObjectPath::new(class_name)?;
        if let Some(namespace) = namespace {
            path = path.with_namespace(namespace)?;
        }
        if let Some(host) = host {
            path = path.with_host(host)?;
        }
        if let Some(key_text) = key_text {
            for (name, value) in parse_keys(key_text)? {
                path = path.with_key(&name, value)?;
            }
        }
        Ok(path)
    }
}

fn parse_keys(text: &str) -> Result<Vec<(String, KeyValue)>, InvalidValue> {
    let mut keys = Vec::new();
    let mut chars = text.chars().peekable();
    loop {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(invalid(format!("key {:?} has no value", name)));
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => s.push(escaped),
                        None => return Err(invalid("dangling escape".to_string())),
                    },
                    Some('"') => break,
                    Some(c) => s.push(c),
                    None => return Err(invalid("unterminated string key".to_string())),
                }
            }
            KeyValue::String(s)
        } else {
            let mut raw = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                raw.push(c);
                chars.next();
            }
            if raw.eq_ignore_ascii_case("true") {
                KeyValue::Boolean(true)
            } else if raw.eq_ignore_ascii_case("false") {
                KeyValue::Boolean(false)
            } else {
                raw.parse::<i64>()
                    .map(KeyValue::Integer)
                    .map_err(|_| invalid(format!("bad key value {:?}", raw)))?
            }
        };
        keys.push((name, value));

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(c) => return Err(invalid(format!("unexpected {:?} after key value", c))),
        }
    }
    Ok(keys)
}

/// CIM identifier: ASCII letter or underscore, then letters, digits, underscores.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid(msg: String) -> InvalidValue {
    InvalidValue::InvalidReference(msg)
}

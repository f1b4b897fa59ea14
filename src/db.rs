use crate::{Error, Int};

use json::{object::Object, JsonValue};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CapKind {
    Boolean,
    Numeric,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapValue {
    Boolean(bool),
    Numeric(Int),
    String(String),
}

/// A single named attribute of a terminal. String values are raw: escapes
/// and `%`-directives are expanded later, on use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub value: CapValue,
}

impl Capability {
    pub fn kind(&self) -> CapKind {
        match self.value {
            CapValue::Boolean(_) => CapKind::Boolean,
            CapValue::Numeric(_) => CapKind::Numeric,
            CapValue::String(_) => CapKind::String,
        }
    }

    /// The capability name with any trailing cancellation marker removed.
    pub fn base_name(&self) -> &str {
        self.name.strip_suffix('@').unwrap_or(&self.name)
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.value, CapValue::Boolean(_)) && self.name.ends_with('@')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub aliases: Vec<String>,
    pub longname: Option<String>,
    pub caps: Vec<Capability>,
}

impl Entry {
    pub(crate) fn named(alias: &str) -> Self {
        Entry {
            aliases: vec![alias.to_string()],
            longname: None,
            caps: Vec::new(),
        }
    }

    /// The first alias on the header line.
    pub fn primary(&self) -> &str {
        &self.aliases[0]
    }

    pub fn answers_to(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }
}

/// An ordered list of entries parsed from one source buffer or blob.
/// Lookup by alias is first-match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Database {
    pub entries: Vec<Entry>,
}

impl Database {
    pub fn parse(input: &str) -> Result<Self, Error> {
        crate::parse_database(input)
    }

    pub fn lookup(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.answers_to(name))
    }

    pub fn to_blob(&self) -> Vec<u8> {
        self.to_json().dump().into_bytes()
    }

    pub fn from_blob(bytes: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(bytes).map_err(|_| Error::DatabaseUnavailable)?;
        let value = json::parse(text).map_err(|_| Error::DatabaseUnavailable)?;
        Self::from_json(&value)
    }

    pub fn to_json(&self) -> JsonValue {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let mut obj = Object::new();
                obj.insert(
                    "aliases",
                    JsonValue::Array(
                        entry
                            .aliases
                            .iter()
                            .map(|a| JsonValue::String(a.clone()))
                            .collect(),
                    ),
                );
                obj.insert(
                    "longname",
                    match &entry.longname {
                        Some(name) => JsonValue::String(name.clone()),
                        None => JsonValue::Null,
                    },
                );
                obj.insert(
                    "caps",
                    JsonValue::Array(entry.caps.iter().map(cap_to_json).collect()),
                );
                JsonValue::Object(obj)
            })
            .collect();
        JsonValue::Array(entries)
    }

    pub fn from_json(value: &JsonValue) -> Result<Self, Error> {
        if !value.is_array() {
            return Err(Error::DatabaseUnavailable);
        }
        let mut entries = Vec::new();
        for entry in value.members() {
            let mut aliases = Vec::new();
            for alias in entry["aliases"].members() {
                aliases.push(
                    alias
                        .as_str()
                        .ok_or(Error::DatabaseUnavailable)?
                        .to_string(),
                );
            }
            if aliases.is_empty() {
                return Err(Error::DatabaseUnavailable);
            }
            let longname = entry["longname"].as_str().map(String::from);
            let mut caps = Vec::new();
            for cap in entry["caps"].members() {
                caps.push(cap_from_json(cap)?);
            }
            entries.push(Entry {
                aliases,
                longname,
                caps,
            });
        }
        Ok(Database { entries })
    }
}

fn cap_to_json(cap: &Capability) -> JsonValue {
    let mut obj = Object::new();
    obj.insert("name", JsonValue::String(cap.name.clone()));
    match &cap.value {
        CapValue::Boolean(b) => obj.insert("bool", JsonValue::Boolean(*b)),
        CapValue::Numeric(n) => obj.insert("num", (*n).into()),
        CapValue::String(s) => obj.insert("str", JsonValue::String(s.clone())),
    }
    JsonValue::Object(obj)
}

fn cap_from_json(value: &JsonValue) -> Result<Capability, Error> {
    let name = value["name"]
        .as_str()
        .ok_or(Error::DatabaseUnavailable)?
        .to_string();
    let value = if let Some(b) = value["bool"].as_bool() {
        CapValue::Boolean(b)
    } else if let Some(n) = value["num"].as_i64() {
        CapValue::Numeric(n)
    } else if let Some(s) = value["str"].as_str() {
        CapValue::String(s.to_string())
    } else {
        return Err(Error::DatabaseUnavailable);
    };
    Ok(Capability { name, value })
}

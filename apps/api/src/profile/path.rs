//! Path-based reads and writes into a [`ProfileDocument`].
//!
//! Paths use dotted/indexed notation: `personalInfo.email`, `experience[0].endDate`,
//! `projects[1].technologies[0]`. Writes go through the document's JSON form so that
//! every component can address nested fields without special-casing them; missing
//! intermediate objects and list slots are created on the way down.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::profile::document::ProfileDocument;

/// A syntactically invalid path or a write the document shape cannot hold.
/// Always a programming error, never a user-recoverable condition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PathError {
    #[error("malformed path '{path}': {reason}")]
    Malformed { path: String, reason: String },

    #[error("path '{path}' crosses a scalar value")]
    NotAContainer { path: String },

    #[error("value written at '{path}' does not fit the profile shape: {reason}")]
    Shape { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed profile path. Always starts with a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfilePath {
    segments: Vec<Segment>,
}

impl ProfilePath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let malformed = |reason: &str| PathError::Malformed {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut chars = raw.chars().peekable();
        let mut expect_key = true;

        while let Some(&c) = chars.peek() {
            match c {
                '[' => {
                    if segments.is_empty() {
                        return Err(malformed("path must start with a key"));
                    }
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => return Err(malformed("index must be a non-negative integer")),
                            None => return Err(malformed("unclosed '['")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| malformed("empty index"))?;
                    segments.push(Segment::Index(index));
                    expect_key = false;
                }
                '.' => {
                    if expect_key {
                        return Err(malformed("empty key"));
                    }
                    chars.next();
                    expect_key = true;
                }
                _ => {
                    if !expect_key {
                        return Err(malformed("missing '.' before key"));
                    }
                    let mut key = String::new();
                    while let Some(&k) = chars.peek() {
                        if k.is_ascii_alphanumeric() || k == '_' {
                            key.push(k);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if key.is_empty() {
                        return Err(malformed(&format!("unexpected character '{c}'")));
                    }
                    segments.push(Segment::Key(key));
                    expect_key = false;
                }
            }
        }

        if expect_key {
            return Err(malformed(if segments.is_empty() {
                "empty path"
            } else {
                "trailing '.'"
            }));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The top-level document key this path lives under.
    pub fn section(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Key(k)) => k,
            _ => "",
        }
    }

    /// A new path with a key appended.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    /// A new path with an index appended.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }
}

impl fmt::Display for ProfilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(k) if i == 0 => write!(f, "{k}")?,
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for ProfilePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProfilePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProfilePath> for String {
    fn from(path: ProfilePath) -> Self {
        path.to_string()
    }
}

/// Reads the value at `path`. Absent and `null` both read as `None`.
pub fn get(doc: &ProfileDocument, path: &ProfilePath) -> Option<Value> {
    let root = serde_json::to_value(doc).ok()?;
    let mut current = &root;
    for segment in path.segments() {
        current = match segment {
            Segment::Key(k) => current.as_object()?.get(k)?,
            Segment::Index(i) => current.as_array()?.get(*i)?,
        };
    }
    (!current.is_null()).then(|| current.clone())
}

/// Reads the string at `path`, if there is one.
pub fn get_str(doc: &ProfileDocument, path: &ProfilePath) -> Option<String> {
    get(doc, path).and_then(|v| v.as_str().map(str::to_string))
}

/// Returns a copy of `doc` with `value` written at `path`.
///
/// Numbers and booleans written to a text field are stored as their text form, so
/// `personalInfo.phone = 4930123456` holds `"4930123456"`.
pub fn set(doc: &ProfileDocument, path: &ProfilePath, value: Value) -> Result<ProfileDocument, PathError> {
    let as_text = match &value {
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    match (write(doc, path, value), as_text) {
        (Err(PathError::Shape { .. }), Some(text)) => write(doc, path, Value::String(text)),
        (result, _) => result,
    }
}

fn write(doc: &ProfileDocument, path: &ProfilePath, value: Value) -> Result<ProfileDocument, PathError> {
    let mut root = to_json(doc, path)?;
    let slot = slot_mut(&mut root, path, &value)?;
    *slot = value;
    from_json(root, path)
}

/// Returns a copy of `doc` with `value` appended to the list at `path`,
/// creating the list if it does not exist yet.
pub fn push(doc: &ProfileDocument, path: &ProfilePath, value: Value) -> Result<ProfileDocument, PathError> {
    let mut root = to_json(doc, path)?;
    let slot = slot_mut(&mut root, path, &Value::Array(Vec::new()))?;
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot.as_array_mut() {
        Some(items) => items.push(value),
        None => {
            return Err(PathError::NotAContainer {
                path: path.to_string(),
            })
        }
    }
    from_json(root, path)
}

fn to_json(doc: &ProfileDocument, path: &ProfilePath) -> Result<Value, PathError> {
    serde_json::to_value(doc).map_err(|e| PathError::Shape {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn from_json(root: Value, path: &ProfilePath) -> Result<ProfileDocument, PathError> {
    serde_json::from_value(root).map_err(|e| PathError::Shape {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Walks to the slot addressed by `path`, creating containers along the way.
/// `leaf_hint` shapes the padding used when a list has to grow to reach the leaf index.
fn slot_mut<'a>(
    root: &'a mut Value,
    path: &ProfilePath,
    leaf_hint: &Value,
) -> Result<&'a mut Value, PathError> {
    let segments = path.segments();
    let mut current = root;

    for (i, segment) in segments.iter().enumerate() {
        let next = segments.get(i + 1);
        let filler = match next {
            Some(Segment::Key(_)) => Value::Object(Map::new()),
            Some(Segment::Index(_)) => Value::Array(Vec::new()),
            None => placeholder_like(leaf_hint),
        };

        current = match segment {
            Segment::Key(k) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let map = current.as_object_mut().ok_or_else(|| PathError::NotAContainer {
                    path: path.to_string(),
                })?;
                map.entry(k.clone()).or_insert(Value::Null)
            }
            Segment::Index(n) => {
                if current.is_null() {
                    *current = Value::Array(Vec::new());
                }
                let items = current.as_array_mut().ok_or_else(|| PathError::NotAContainer {
                    path: path.to_string(),
                })?;
                while items.len() <= *n {
                    items.push(filler.clone());
                }
                &mut items[*n]
            }
        };

        if current.is_null() && next.is_some() {
            *current = filler;
        }
    }

    Ok(current)
}

fn placeholder_like(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(String::new()),
        Value::Object(_) => Value::Object(Map::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

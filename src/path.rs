//! Structured field paths into a document.
//!
//! Paths are kept as segments internally and only rendered to the
//! `data.addedProducts[0].discount` form at the boundary.
use crate::error::PathError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            Segment::Index(_) => None,
        }
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Segment::Key(value.to_owned())
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        Segment::Key(value)
    }
}

impl From<usize> for Segment {
    fn from(value: usize) -> Self {
        Segment::Index(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
    /// Build a path from loose string parts. All-digit parts become indices.
    pub fn from_parts<I, S>(parts: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = vec![];
        for part in parts {
            let part = part.as_ref();
            if part.is_empty() {
                return Err(PathError::EmptySegment(part.to_owned()));
            }
            segments.push(classify(part));
        }
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(segments))
    }
    /// Parse `a.b[0].c` or `a.b.0.c`.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.trim().is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = vec![];
        for part in raw.split('.') {
            let (head, mut rest) = match part.find('[') {
                Some(at) => (&part[..at], &part[at..]),
                None => (part, ""),
            };
            if head.is_empty() && (rest.is_empty() || segments.is_empty()) {
                return Err(PathError::EmptySegment(raw.to_owned()));
            }
            if !head.is_empty() {
                segments.push(classify(head));
            }
            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| PathError::UnclosedIndex(raw.to_owned()))?;
                let inner = &rest[1..close];
                let index = inner.parse::<usize>().map_err(|_| PathError::InvalidIndex {
                    path: raw.to_owned(),
                    index: inner.to_owned(),
                })?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(PathError::UnclosedIndex(raw.to_owned()));
                }
            }
        }
        Ok(Self(segments))
    }
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn first_key(&self) -> Option<&str> {
        self.0.first().and_then(Segment::as_key)
    }
    /// The last named property on the path, skipping trailing indices.
    pub fn property_name(&self) -> Option<&str> {
        self.0.iter().rev().find_map(Segment::as_key)
    }
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Read the value at this path, if every step exists.
    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(root, |node, segment| match segment {
            Segment::Key(key) => node.as_object()?.get(key),
            Segment::Index(index) => node.as_array()?.get(*index),
        })
    }
}

fn classify(part: &str) -> Segment {
    match part.parse::<usize>() {
        Ok(index) if part.bytes().all(|b| b.is_ascii_digit()) => Segment::Index(index),
        _ => Segment::Key(part.to_owned()),
    }
}

/// Write `value` at `path`.
///
/// Missing, `null` and primitive nodes are replaced by the container the next
/// segment needs. Existing maps and lists are never replaced: an index on a map
/// is written as a string key, and a list only grows by appending at its end.
pub fn set_at(root: &mut Value, path: &Path, value: Value) -> Result<(), PathError> {
    let mut node = root;
    for segment in path.segments() {
        node = match segment {
            Segment::Key(key) => child_by_key(node, key, path)?,
            Segment::Index(index) => child_by_index(node, *index, path)?,
        };
    }
    *node = value;
    Ok(())
}

fn child_by_key<'v>(
    node: &'v mut Value,
    key: &str,
    path: &Path,
) -> Result<&'v mut Value, PathError> {
    match node {
        Value::Object(map) => Ok(map.entry(key.to_owned()).or_insert(Value::Null)),
        Value::Array(_) => Err(PathError::KeyOnList {
            path: path.to_string(),
            key: key.to_owned(),
        }),
        other => {
            *other = Value::Object(Map::new());
            child_by_key(other, key, path)
        }
    }
}

fn child_by_index<'v>(
    node: &'v mut Value,
    index: usize,
    path: &Path,
) -> Result<&'v mut Value, PathError> {
    match node {
        Value::Array(items) => {
            if index > items.len() {
                return Err(PathError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            if index == items.len() {
                items.push(Value::Null);
            }
            Ok(&mut items[index])
        }
        Value::Object(map) => Ok(map.entry(index.to_string()).or_insert(Value::Null)),
        other => {
            *other = Value::Array(vec![]);
            child_by_index(other, index, path)
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if position == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Path::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl<C> minicbor::Encode<C> for Path {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Path {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let raw = d.str()?;
        Path::parse(raw).map_err(|err| minicbor::decode::Error::message(err.to_string()))
    }
}

use crate::error::{Error, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A decrypted vault document: string keys in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

/// A value held by a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// YAML `null` / `~`.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer or float.
    Number(serde_yaml::Number),
    /// A string; may span several lines.
    String(String),
    /// A sequence. Treated as a single leaf when encrypting.
    Sequence(Vec<Value>),
    /// A nested mapping.
    Mapping(Document),
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Mutable lookup of a top-level key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert a key. An existing key keeps its position and the old value is
    /// returned; a new key is appended.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (&*k, v))
    }

    /// Look up a nested value by key path.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for key in parents {
            match current.get(key)? {
                Value::Mapping(doc) => current = doc,
                _ => return None,
            }
        }
        current.get(last)
    }

    /// Assign a value at a key path, creating intermediate mappings.
    ///
    /// Fails if an intermediate key already holds a non-mapping value.
    pub fn set_path(&mut self, path: &[&str], value: Value) -> Result<Option<Value>> {
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::PathConflict("empty key path".to_string()));
        };
        let mut current = self;
        for (depth, key) in parents.iter().enumerate() {
            if current.get(key).is_none() {
                current.insert(*key, Value::Mapping(Document::new()));
            }
            current = match current.get_mut(key) {
                Some(Value::Mapping(doc)) => doc,
                _ => {
                    return Err(Error::PathConflict(format!(
                        "'{}' is not a mapping",
                        path[..=depth].join(".")
                    )));
                }
            };
        }
        Ok(current.insert(*last, value))
    }

    /// Number of leaves (non-mapping values) in the whole tree.
    pub fn leaf_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, v)| match v {
                Value::Mapping(doc) => doc.leaf_count(),
                _ => 1,
            })
            .sum()
    }

    /// Build a document from a parsed YAML value.
    ///
    /// `null` (an empty YAML stream) becomes an empty document; any other
    /// non-mapping root is rejected.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Self> {
        match value {
            serde_yaml::Value::Null => Ok(Self::new()),
            serde_yaml::Value::Mapping(mapping) => Self::from_mapping(mapping),
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value),
            other => Err(Error::NotAMapping(yaml_kind(&other))),
        }
    }

    fn from_mapping(mapping: serde_yaml::Mapping) -> Result<Self> {
        let mut doc = Self::new();
        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => return Err(Error::NonStringKey(yaml_kind(&other).to_string())),
            };
            doc.insert(key, Value::from_yaml(value)?);
        }
        Ok(doc)
    }
}

impl Value {
    /// Convert a parsed YAML value. Unknown tags are dropped.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Self> {
        Ok(match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => Value::Number(n),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => Value::Sequence(
                seq.into_iter()
                    .map(Value::from_yaml)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_yaml::Value::Mapping(m) => Value::Mapping(Document::from_mapping(m)?),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value)?,
        })
    }

    /// Parse a single YAML value from source text.
    pub fn parse_yaml(text: &str) -> Result<Self> {
        Self::from_yaml(serde_yaml::from_str(text)?)
    }

    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Mapping(doc)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(seq) => serializer.collect_seq(seq),
            Value::Mapping(doc) => doc.serialize(serializer),
        }
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

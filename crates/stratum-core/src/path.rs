//! Location paths inside a manifest tree.
//!
//! Every diagnostic produced by the pipeline points at a location rendered as
//! `root.components[2].config.environment`. Schema validators report JSON
//! pointers (`/components/2/config/environment`); [`DocPath::from_json_pointer`]
//! converts those into the same notation.

use serde::{Serialize, Serializer};
use std::fmt;

/// One step of a [`DocPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A location inside the manifest tree, starting at the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    segments: Vec<Segment>,
}

impl DocPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of the `index`-th component.
    pub fn component(index: usize) -> Self {
        Self::root().key("components").index(index)
    }

    /// Returns a new path extended with an object key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Key(key.into()));
        next
    }

    /// Returns a new path extended with a sequence index.
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Index(index));
        next
    }

    /// Append every segment of `other` (treated as relative) to this path.
    pub fn join(&self, other: &DocPath) -> Self {
        let mut next = self.clone();
        next.segments.extend(other.segments.iter().cloned());
        next
    }

    /// Append a dotted relative path (`a.b.0`); numeric parts become indices.
    pub fn join_dotted(&self, dotted: &str) -> Self {
        let mut next = self.clone();
        for part in dotted.split('.').filter(|p| !p.is_empty()) {
            next.segments.push(match part.parse::<usize>() {
                Ok(index) => Segment::Index(index),
                Err(_) => Segment::Key(part.to_string()),
            });
        }
        next
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parse a JSON pointer (RFC 6901). Purely numeric tokens become indices.
    pub fn from_json_pointer(pointer: &str) -> Self {
        let segments = pointer
            .split('/')
            .skip(1)
            .map(|token| {
                let token = token.replace("~1", "/").replace("~0", "~");
                match token.parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Key(token),
                }
            })
            .collect();
        Self { segments }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for DocPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_keys_and_indices() {
        let path = DocPath::component(2).key("config").key("environment");
        assert_eq!(path.to_string(), "root.components[2].config.environment");
        assert_eq!(DocPath::root().to_string(), "root");
    }

    #[test]
    fn converts_json_pointers() {
        let path = DocPath::from_json_pointer("/components/0/binds/1/access");
        assert_eq!(path.to_string(), "root.components[0].binds[1].access");
        assert!(DocPath::from_json_pointer("").is_root());
        assert_eq!(
            DocPath::from_json_pointer("/tags/a~1b").to_string(),
            "root.tags.a/b"
        );
    }

    #[test]
    fn joins_relative_paths() {
        let base = DocPath::component(1).key("config");
        let joined = base.join(&DocPath::from_json_pointer("/memory"));
        assert_eq!(joined.to_string(), "root.components[1].config.memory");
        assert_eq!(
            base.join_dotted("rules.0.days").to_string(),
            "root.components[1].config.rules[0].days"
        );
    }
}

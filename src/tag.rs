use std::fmt;

/// Which per-key state cell a [`TagKey`] addresses.
///
/// `List` and `Watermark` both travel as "list fetches" on the wire; the
/// kind recorded here is what lets the response consumer tell them apart once
/// a response item has been demultiplexed back to its `TagKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Value,
    List,
    Watermark,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Value => write!(f, "value"),
            TagKind::List => write!(f, "list"),
            TagKind::Watermark => write!(f, "watermark"),
        }
    }
}

/// Value-typed identifier for one state cell under the reader's bound key.
///
/// Two `TagKey`s are equal iff both `kind` and `tag` match; immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKey {
    pub kind: TagKind,
    pub tag: Vec<u8>,
}

impl TagKey {
    pub fn new(kind: TagKind, tag: impl Into<Vec<u8>>) -> Self {
        Self { kind, tag: tag.into() }
    }

    pub fn value(tag: impl Into<Vec<u8>>) -> Self {
        Self::new(TagKind::Value, tag)
    }

    pub fn list(tag: impl Into<Vec<u8>>) -> Self {
        Self::new(TagKind::List, tag)
    }

    pub fn watermark(tag: impl Into<Vec<u8>>) -> Self {
        Self::new(TagKind::Watermark, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_kind_and_tag() {
        assert_eq!(TagKey::value("a"), TagKey::value("a"));
        assert_ne!(TagKey::value("a"), TagKey::list("a"));
        assert_ne!(TagKey::value("a"), TagKey::value("b"));
    }
}

// Keys are composite: an optional (parent kind, parent id) pair plus the
// record's own kind and id, encoded as a slash-separated path. The path is
// the record's address in the store; the parent portion is what ancestor
// queries scope on.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// The entity kinds this application stores. The string forms are the wire
/// contract with any existing data and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    User,
    Post,
    Comment,
    Course,
    Lesson,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::User => "User",
            Kind::Post => "Post",
            Kind::Comment => "Comment",
            Kind::Course => "Course",
            Kind::Lesson => "Lesson",
        }
    }

    fn from_segment(segment: &str) -> Option<Kind> {
        match segment {
            "User" => Some(Kind::User),
            "Post" => Some(Kind::Post),
            "Comment" => Some(Kind::Comment),
            "Course" => Some(Kind::Course),
            "Lesson" => Some(Kind::Lesson),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    parent: Option<(Kind, String)>,
    kind: Kind,
    id: String,
}

impl Key {
    /// Address a top-level record. IDs are opaque caller-supplied strings
    /// and must not contain '/', the path separator.
    pub fn new(kind: Kind, id: impl Into<String>) -> Self {
        let id = id.into();
        debug_assert!(!id.contains('/'), "entity IDs must not contain '/'");
        Self {
            parent: None,
            kind,
            id,
        }
    }

    /// Address a record scoped under its parent, e.g. a Lesson under a
    /// Course or a Comment under a Post.
    pub fn child(
        parent_kind: Kind,
        parent_id: impl Into<String>,
        kind: Kind,
        id: impl Into<String>,
    ) -> Self {
        let parent_id = parent_id.into();
        let id = id.into();
        debug_assert!(!parent_id.contains('/'), "entity IDs must not contain '/'");
        debug_assert!(!id.contains('/'), "entity IDs must not contain '/'");
        Self {
            parent: Some((parent_kind, parent_id)),
            kind,
            id,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<Key> {
        self.parent
            .as_ref()
            .map(|(kind, id)| Key::new(*kind, id.clone()))
    }

    /// The record's address: "Kind/id", prefixed with the parent's path for
    /// scoped records ("Course/CS0011/Lesson/intro").
    pub fn path(&self) -> String {
        match &self.parent {
            Some((pkind, pid)) => format!("{}/{}/{}/{}", pkind, pid, self.kind, self.id),
            None => format!("{}/{}", self.kind, self.id),
        }
    }

    pub fn parent_path(&self) -> Option<String> {
        self.parent
            .as_ref()
            .map(|(kind, id)| format!("{}/{}", kind, id))
    }

    pub fn parse(path: &str) -> StoreResult<Key> {
        let segments: Vec<&str> = path.split('/').collect();
        let bad = || StoreError::BadKey(path.to_string());
        match segments.as_slice() {
            [kind, id] => {
                let kind = Kind::from_segment(kind).ok_or_else(bad)?;
                if id.is_empty() {
                    return Err(bad());
                }
                Ok(Key::new(kind, *id))
            }
            [pkind, pid, kind, id] => {
                let pkind = Kind::from_segment(pkind).ok_or_else(bad)?;
                let kind = Kind::from_segment(kind).ok_or_else(bad)?;
                if pid.is_empty() || id.is_empty() {
                    return Err(bad());
                }
                Ok(Key::child(pkind, *pid, kind, *id))
            }
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A fresh opaque entity ID. Callers supply every ID; this is the one
/// sanctioned way to mint one when the record has no natural key.
pub fn fresh_id() -> String {
    Uuid::now_v7().to_string()
}

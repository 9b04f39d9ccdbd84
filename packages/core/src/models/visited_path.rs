//! Persistent visited-id path
//!
//! Each node of a reference tree owns the ordered list of entity ids visited on
//! the way from the root down to it. Paths are immutable and share their prefix:
//! `push` returns a new path and never touches the one it was called on, so two
//! sibling branches can extend the same parent path without seeing each other's
//! ids.

use std::sync::Arc;

#[derive(Debug)]
struct Segment {
    id: Arc<str>,
    prev: Option<Arc<Segment>>,
}

/// Immutable, prefix-sharing sequence of entity ids (root first)
#[derive(Debug, Clone, Default)]
pub struct VisitedPath {
    head: Option<Arc<Segment>>,
    len: usize,
}

impl VisitedPath {
    /// Path containing only the root entity
    pub fn root(id: &str) -> Self {
        Self::default().push(id)
    }

    /// Extend the path by one id, leaving `self` untouched
    pub fn push(&self, id: &str) -> Self {
        Self {
            head: Some(Arc::new(Segment {
                id: Arc::from(id),
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.segments().any(|segment| segment.id.as_ref() == id)
    }

    /// Ids in root-to-leaf order
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.segments().map(|segment| segment.id.as_ref()).collect();
        ids.reverse();
        ids
    }

    fn segments(&self) -> impl Iterator<Item = &Segment> {
        std::iter::successors(self.head.as_deref(), |segment| segment.prev.as_deref())
    }
}

impl PartialEq for VisitedPath {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.segments().zip(other.segments()).all(|(a, b)| a.id == b.id)
    }
}

impl Eq for VisitedPath {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_does_not_mutate_parent() {
        let root = VisitedPath::root("root");
        let left = root.push("a");
        let right = root.push("b");

        assert_eq!(root.ids(), vec!["root"]);
        assert_eq!(left.ids(), vec!["root", "a"]);
        assert_eq!(right.ids(), vec!["root", "b"]);
        assert!(!left.contains("b"));
        assert!(!right.contains("a"));
    }

    #[test]
    fn test_repeated_id_keeps_order() {
        let path = VisitedPath::root("root").push("a").push("root");
        assert_eq!(path.len(), 3);
        assert_eq!(path.ids(), vec!["root", "a", "root"]);
        assert!(!path.contains("missing"));
    }

    #[test]
    fn test_empty_path() {
        let path = VisitedPath::default();
        assert!(path.is_empty());
        assert!(path.ids().is_empty());
    }

    #[test]
    fn test_equality_compares_ids() {
        let a = VisitedPath::root("x").push("y");
        let b = VisitedPath::root("x").push("y");
        let c = VisitedPath::root("x").push("z");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

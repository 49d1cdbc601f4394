//! Named object paths ("arcs") through the assembly hierarchy
use crate::db::{Database, ObjectId};

/// How a path was written in its definition file
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PathKind {
    /// `arc = a/b/c;`: segments are exact object names, root to leaf
    Arc,
    /// `path = a/b-c;`: symbolic, not yet checked against the database
    Path,
}

/// An ordered chain of path-segment names, root first
#[derive(Clone, Debug, PartialEq)]
pub struct ArcPath {
    /// How the path is currently expressed
    pub kind: PathKind,
    /// Segment names, root to leaf
    pub segments: Vec<String>,
    /// The symbolic form as written, kept once a `Path` has been converted
    pub declared: Option<Vec<String>>,
}

impl ArcPath {
    /// Builds an arc from exact segment names
    pub fn arc<S: Into<String>, I: IntoIterator<Item = S>>(
        segments: I,
    ) -> Self {
        Self {
            kind: PathKind::Arc,
            segments: segments.into_iter().map(Into::into).collect(),
            declared: None,
        }
    }

    /// Builds a symbolic path
    pub fn path<S: Into<String>, I: IntoIterator<Item = S>>(
        segments: I,
    ) -> Self {
        Self {
            kind: PathKind::Path,
            segments: segments.into_iter().map(Into::into).collect(),
            declared: None,
        }
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Checks whether the path has no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the leaf segment, if any
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Looks up every segment, failing at the first unknown name
    ///
    /// On failure, returns the name of the segment that could not be found.
    pub fn lookup<D: Database + ?Sized>(
        &self,
        db: &D,
    ) -> Result<Vec<ObjectId>, String> {
        lookup_all(db, &self.segments)
    }

    /// Converts a symbolic path into an arc of database-verified segments
    ///
    /// The arc is truncated at the first segment that cannot be found; the
    /// missing name is returned so the caller can report it.  The original
    /// spelling is kept in [`declared`](Self::declared).  Arcs are returned
    /// unchanged.
    pub fn convert<D: Database + ?Sized>(&mut self, db: &D) -> Option<String> {
        if self.kind != PathKind::Path {
            return None;
        }
        let mut missing = None;
        let mut verified = Vec::with_capacity(self.segments.len());
        for s in &self.segments {
            if db.lookup(s).is_some() {
                verified.push(s.clone());
            } else {
                missing = Some(s.clone());
                break;
            }
        }
        let original = std::mem::replace(&mut self.segments, verified);
        self.declared = Some(original);
        self.kind = PathKind::Arc;
        missing
    }

    /// Finds `other` as a contiguous run inside this path
    ///
    /// Returns the index of the last matched segment, searching from the first
    /// occurrence of `other`'s root.
    pub fn find_run(&self, other: &[String]) -> Option<usize> {
        find_run(&self.segments, other)
    }
}

impl std::fmt::Display for ArcPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Looks up a list of names, failing at the first unknown one
pub(crate) fn lookup_all<D: Database + ?Sized>(
    db: &D,
    names: &[String],
) -> Result<Vec<ObjectId>, String> {
    names
        .iter()
        .map(|n| db.lookup(n).ok_or_else(|| n.clone()))
        .collect()
}

/// Returns the index (in `haystack`) of the last segment of `needle`, if
/// `needle` occurs contiguously starting at the first occurrence of its root
pub(crate) fn find_run<T: PartialEq>(
    haystack: &[T],
    needle: &[T],
) -> Option<usize> {
    let root = needle.first()?;
    let start = haystack.iter().position(|s| s == root)?;
    let end = start + needle.len();
    (end <= haystack.len() && haystack[start..end] == *needle)
        .then_some(end - 1)
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn contiguous_runs() {
        let hay = names(&["base", "arm1", "arm2", "tip"]);
        assert_eq!(find_run(&hay, &names(&["base", "arm1"])), Some(1));
        assert_eq!(find_run(&hay, &names(&["arm1", "arm2"])), Some(2));
        assert_eq!(find_run(&hay, &names(&["arm2", "tip"])), Some(3));
        assert_eq!(find_run(&hay, &names(&["arm1", "tip"])), None);
        assert_eq!(find_run(&hay, &names(&["tip", "more"])), None);
        assert_eq!(find_run(&hay, &names(&[])), None);
    }

    #[test]
    fn display() {
        let a = ArcPath::arc(["a", "b", "c"]);
        assert_eq!(a.to_string(), "a/b/c");
        assert_eq!(a.leaf(), Some("c"));
    }
}

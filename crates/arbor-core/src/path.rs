use std::fmt;
use std::sync::Arc;

/// Identity of one child inside its sibling list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    Explicit(String),
    /// Fallback for children declared without a key.
    Positional(usize),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Explicit(key) => f.write_str(key),
            InstanceKey::Positional(index) => write!(f, "#{index}"),
        }
    }
}

impl From<&str> for InstanceKey {
    fn from(key: &str) -> Self {
        InstanceKey::Explicit(key.to_owned())
    }
}

impl From<usize> for InstanceKey {
    fn from(index: usize) -> Self {
        InstanceKey::Positional(index)
    }
}

/// Stable position of an instance: the keys walked from the root.
///
/// Paths are cheap to clone and `Send`, so they can travel through the
/// request queue from background threads.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstancePath {
    segments: Arc<[InstanceKey]>,
}

impl InstancePath {
    pub fn root() -> Self {
        Self {
            segments: Arc::from(Vec::new()),
        }
    }

    pub fn from_segments(segments: impl IntoIterator<Item = InstanceKey>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn child(&self, key: impl Into<InstanceKey>) -> Self {
        let mut segments = self.segments.to_vec();
        segments.push(key.into());
        Self {
            segments: segments.into(),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        match self.segments.split_last() {
            Some((_, rest)) => Some(Self {
                segments: rest.into(),
            }),
            None => None,
        }
    }

    pub fn key(&self) -> Option<&InstanceKey> {
        self.segments.last()
    }

    pub fn segments(&self) -> &[InstanceKey] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` equals `other` or lies above it.
    pub fn contains(&self, other: &InstancePath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = InstancePath> + '_ {
        (0..self.segments.len()).rev().map(move |len| Self {
            segments: self.segments[..len].into(),
        })
    }

    /// Lowest common ancestor of two paths (inclusive).
    pub fn common_ancestor(&self, other: &InstancePath) -> InstancePath {
        let shared = self
            .segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if shared == self.segments.len() {
            return self.clone();
        }
        Self {
            segments: self.segments[..shared].into(),
        }
    }

    /// Lowest common ancestor of every path in `paths`.
    pub fn common_ancestor_of<'a>(
        paths: impl IntoIterator<Item = &'a InstancePath>,
    ) -> Option<InstancePath> {
        paths.into_iter().fold(None, |acc, path| match acc {
            None => Some(path.clone()),
            Some(acc) => Some(acc.common_ancestor(path)),
        })
    }
}

impl Default for InstancePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in self.segments.iter() {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstancePath({self})")
    }
}

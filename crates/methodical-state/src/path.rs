//! Locations inside a state tree.
//!
//! `$` is the root of a [`Node`](crate::Node). `$.columns.todo.cards[1]`
//! walks key `columns`, key `todo`, key `cards`, then index 1. On the wire a
//! path is a flat array (`["columns", "todo", "cards", 1]`), which is how it
//! travels inside an [`Op`](crate::Op).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a [`Path`]: an object key or an array index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    Key(String),
    Index(usize),
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(key) => write!(f, ".{key}"),
            Seg::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for Seg {
    fn from(key: &str) -> Self {
        Seg::Key(key.to_owned())
    }
}

impl From<String> for Seg {
    fn from(key: String) -> Self {
        Seg::Key(key)
    }
}

impl From<usize> for Seg {
    fn from(index: usize) -> Self {
        Seg::Index(index)
    }
}

/// A location in a state tree, relative to its root.
///
/// ```
/// use methodical_state::{path, Seg};
///
/// let at = path!("todos", 0, "done");
/// assert_eq!(at.to_string(), "$.todos[0].done");
///
/// let (parent, last) = at.split_parent().unwrap();
/// assert_eq!(parent, path!("todos", 0));
/// assert_eq!(last, &Seg::Key("done".into()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    segs: Vec<Seg>,
}

impl Path {
    pub const fn root() -> Self {
        Self { segs: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.segs.is_empty()
    }

    /// Alias of [`Path::is_root`].
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn segments(&self) -> &[Seg] {
        &self.segs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Seg> {
        self.segs.iter()
    }

    pub fn push(&mut self, seg: Seg) {
        self.segs.push(seg);
    }

    pub fn pop(&mut self) -> Option<Seg> {
        self.segs.pop()
    }

    /// This path extended by one segment.
    pub fn child(&self, seg: impl Into<Seg>) -> Path {
        let mut segs = Vec::with_capacity(self.segs.len() + 1);
        segs.extend_from_slice(&self.segs);
        segs.push(seg.into());
        Path { segs }
    }

    /// The container path and the segment that selects the target inside it.
    /// `None` for the root, which has no container.
    pub fn split_parent(&self) -> Option<(Path, &Seg)> {
        let (last, parent) = self.segs.split_last()?;
        Some((Path { segs: parent.to_vec() }, last))
    }

    /// True when `other` lies at or below this path.
    ///
    /// ```
    /// use methodical_state::path;
    ///
    /// assert!(path!("user").is_prefix_of(&path!("user", "name")));
    /// assert!(path!("user").is_prefix_of(&path!("user")));
    /// assert!(!path!("user", "name").is_prefix_of(&path!("user")));
    /// ```
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.segs.starts_with(&self.segs)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        self.segs.iter().try_for_each(|seg| write!(f, "{seg}"))
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path {
            segs: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.segs.iter()
    }
}

/// Build a [`Path`]. String expressions become keys, `usize` expressions
/// become indices; `path!()` is the root.
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::Seg::from($seg));
        )+
        p
    }};
}

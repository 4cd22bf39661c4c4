//! Depth-first traversal over schema trees.
//!
//! Only objects are visited; arrays are descended into but never yielded, and
//! scalar leaves are skipped. Every traversal starts from scratch.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::Result;

/// One component of a structural path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array position.
    Index(usize),
}

impl PathSegment {
    /// The key, when this segment is an object key.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

/// Render a structural path for messages, e.g. `paths./pets.get.parameters.0`.
pub fn render_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "(root)".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Lazy pre-order iterator yielding every object node with its path.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<(&'a Value, Vec<PathSegment>)>,
}

/// Start a read-only traversal at `root`.
pub fn walk(root: &Value) -> Walk<'_> {
    Walk {
        stack: vec![(root, Vec::new())],
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (&'a Map<String, Value>, Vec<PathSegment>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((value, path)) = self.stack.pop() {
            match value {
                Value::Object(map) => {
                    for (key, child) in map.iter().rev() {
                        let mut child_path = path.clone();
                        child_path.push(PathSegment::Key(key.clone()));
                        self.stack.push((child, child_path));
                    }
                    return Some((map, path));
                }
                Value::Array(items) => {
                    for (index, child) in items.iter().enumerate().rev() {
                        let mut child_path = path.clone();
                        child_path.push(PathSegment::Index(index));
                        self.stack.push((child, child_path));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Traverse `root`, letting `visit` mutate each object before its children are read.
///
/// Children removed or replaced by the visitor are not visited in their old form.
pub fn walk_mut<F>(root: &mut Value, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut Map<String, Value>, &[PathSegment]) -> Result<()>,
{
    let mut path = Vec::new();
    walk_mut_at(root, &mut path, visit)
}

fn walk_mut_at<F>(value: &mut Value, path: &mut Vec<PathSegment>, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut Map<String, Value>, &[PathSegment]) -> Result<()>,
{
    match value {
        Value::Object(map) => {
            visit(map, path)?;
            for (key, child) in map.iter_mut() {
                path.push(PathSegment::Key(key.clone()));
                walk_mut_at(child, path, visit)?;
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                path.push(PathSegment::Index(index));
                walk_mut_at(child, path, visit)?;
                path.pop();
            }
        }
        _ => {}
    }
    Ok(())
}

//! Dotted path lookup and completion over a metadata tree.

use crate::metadata::{ChildMap, MetadataNode};

const SEPARATOR: char = '.';
const CHILDREN_ANNOTATION: &str = "(children...)";

/// A completion offered for a partially typed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    /// Full dotted path to insert.
    pub full_path: String,
    /// Short hint shown next to the candidate; may be empty.
    pub annotation: String,
}

impl CompletionCandidate {
    fn new(full_path: String, annotation: String) -> Self {
        Self {
            full_path,
            annotation,
        }
    }
}

/// Result of walking a dotted path as far as it matches.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'tree, 'path> {
    /// Deepest node reached.
    pub node: &'tree MetadataNode,
    /// Leading portion of the path that matched, without a trailing dot.
    pub matched: &'path str,
}

/// Walks `path` from `root`, stopping at the first segment with no matching
/// child.
///
/// A segment descends into an object-valued key of the node itself before
/// falling back to the node's `children` collection.
#[must_use]
pub fn resolve<'tree, 'path>(root: &'tree MetadataNode, path: &'path str) -> Resolution<'tree, 'path> {
    let mut node = root;
    let mut matched_len = 0;
    for segment in path.split(SEPARATOR) {
        let Some(child) = descend(node, segment) else {
            break;
        };
        node = child;
        matched_len = if matched_len == 0 {
            segment.len()
        } else {
            matched_len + 1 + segment.len()
        };
    }
    Resolution {
        node,
        matched: path.get(..matched_len).unwrap_or_default(),
    }
}

fn descend<'tree>(node: &'tree MetadataNode, segment: &str) -> Option<&'tree MetadataNode> {
    node.nested()
        .get(segment)
        .or_else(|| node.children().get(segment))
}

/// Entries offered below `node`: its `children` collection when the server
/// listed one, otherwise its own object-valued keys.
fn branch_of(node: &MetadataNode) -> &ChildMap {
    if node.lists_children() {
        node.children()
    } else {
        node.nested()
    }
}

/// Children of the deepest node reached by `path`. Empty for a leaf.
#[must_use]
pub fn children_of<'tree>(root: &'tree MetadataNode, path: &str) -> &'tree ChildMap {
    branch_of(resolve(root, path).node)
}

/// Completion candidates for the text typed so far.
///
/// Only the text before the last dot is resolved; the trailing fragment is
/// left for the caller to filter on.
#[must_use]
pub fn complete(root: &MetadataNode, path: &str) -> Vec<CompletionCandidate> {
    let parent = path
        .rfind(SEPARATOR)
        .and_then(|index| path.get(..index))
        .unwrap_or_default();
    let resolution = resolve(root, parent);
    let prefix = if resolution.matched.is_empty() {
        String::new()
    } else {
        format!("{}{SEPARATOR}", resolution.matched)
    };

    let mut candidates = Vec::new();
    for (name, child) in branch_of(resolution.node).iter() {
        let annotation = child
            .description()
            .map(|description| format!("({description})"))
            .unwrap_or_default();
        candidates.push(CompletionCandidate::new(format!("{prefix}{name}"), annotation));
        if child.lists_children() {
            candidates.push(CompletionCandidate::new(
                format!("{prefix}{name}{SEPARATOR}"),
                CHILDREN_ANNOTATION.to_owned(),
            ));
        }
    }
    candidates
}

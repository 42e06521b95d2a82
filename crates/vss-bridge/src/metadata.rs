//! Typed signal metadata tree and its session cache.
//!
//! The server describes the signal namespace as nested JSON objects. The root
//! object maps top-level segment names directly to nodes; nodes below it
//! normally list their children under a `children` key, but may also hold
//! object-valued keys of their own. Parsing keeps both collections on
//! [`MetadataNode`] and the resolver decides which one a segment descends into.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::message::Response;

/// Tracing target for metadata cache events.
pub const METADATA_TARGET: &str = "vss_bridge::metadata";

const CHILDREN_KEY: &str = "children";
const DESCRIPTION_KEY: &str = "description";
const METADATA_KEY: &str = "metadata";

/// Children of a node in the order the server listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildMap(Vec<(String, MetadataNode)>);

impl ChildMap {
    /// Looks up a direct child by segment name.
    #[must_use]
    pub fn get(&self, segment: &str) -> Option<&MetadataNode> {
        self.0
            .iter()
            .find(|(name, _)| name == segment)
            .map(|(_, node)| node)
    }

    /// Iterates over `(segment, node)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataNode)> {
        self.0.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Segment names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, MetadataNode)> for ChildMap {
    fn from_iter<I: IntoIterator<Item = (String, MetadataNode)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One node of the signal namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataNode {
    description: Option<String>,
    attributes: Map<String, Value>,
    children: ChildMap,
    nested: ChildMap,
    lists_children: bool,
}

impl MetadataNode {
    /// Builds a node that lists `children` under a `children` key.
    #[must_use]
    pub const fn new(
        description: Option<String>,
        attributes: Map<String, Value>,
        children: ChildMap,
    ) -> Self {
        Self {
            description,
            attributes,
            children,
            nested: ChildMap(Vec::new()),
            lists_children: true,
        }
    }

    /// Human-readable description, if the server supplied one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Remaining attributes (`type`, `datatype`, `unit`, `uuid`, ...) verbatim.
    #[must_use]
    pub const fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Children listed under the node's `children` key.
    #[must_use]
    pub const fn children(&self) -> &ChildMap {
        &self.children
    }

    /// Object-valued keys held directly on the node.
    #[must_use]
    pub const fn nested(&self) -> &ChildMap {
        &self.nested
    }

    /// Whether the server sent a `children` key, even an empty one.
    #[must_use]
    pub const fn lists_children(&self) -> bool {
        self.lists_children
    }

    /// Whether nothing can be reached below this node.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.nested.is_empty()
    }

    /// Extracts the tree from a `getMetadata` reply for `"*"`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedResponse`] when the reply is not JSON,
    /// lacks an object-valued `metadata` key, or contains a malformed node.
    pub fn from_response(response: &Response) -> Result<Self, BridgeError> {
        let value = response
            .to_json()
            .map_err(|error| BridgeError::malformed(format!("reply is not JSON: {error}")))?;
        match value.get(METADATA_KEY) {
            Some(Value::Object(root)) => Self::from_root(root),
            Some(_) => Err(BridgeError::malformed("'metadata' is not an object")),
            None => Err(match value.get("error") {
                Some(error) => BridgeError::malformed(format!("server reported an error: {error}")),
                None => BridgeError::malformed("reply has no 'metadata' key"),
            }),
        }
    }

    /// Parses the root mapping, whose keys are the top-level segments.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MalformedResponse`] for any entry that is not a
    /// well-formed node.
    pub fn from_root(root: &Map<String, Value>) -> Result<Self, BridgeError> {
        let children = parse_children(root, "")?;
        Ok(Self::new(None, Map::new(), children))
    }
}

fn parse_children(entries: &Map<String, Value>, parent: &str) -> Result<ChildMap, BridgeError> {
    entries
        .iter()
        .map(|(segment, value)| {
            let path = if parent.is_empty() {
                segment.clone()
            } else {
                format!("{parent}.{segment}")
            };
            parse_node(value, &path).map(|node| (segment.clone(), node))
        })
        .collect()
}

fn parse_node(value: &Value, path: &str) -> Result<MetadataNode, BridgeError> {
    let Value::Object(fields) = value else {
        return Err(BridgeError::malformed(format!("node '{path}' is not an object")));
    };

    let mut description = None;
    let mut attributes = Map::new();
    let mut children = ChildMap::default();
    let mut nested = Vec::new();
    let mut lists_children = false;
    for (key, field) in fields {
        match (key.as_str(), field) {
            (CHILDREN_KEY, Value::Object(entries)) => {
                children = parse_children(entries, path)?;
                lists_children = true;
            }
            (CHILDREN_KEY, _) => {
                return Err(BridgeError::malformed(format!(
                    "children of '{path}' are not an object"
                )));
            }
            (DESCRIPTION_KEY, Value::String(text)) => description = Some(text.clone()),
            (_, Value::Object(_)) => match parse_node(field, &format!("{path}.{key}")) {
                Ok(child) => nested.push((key.clone(), child)),
                Err(error) => {
                    debug!(
                        target: METADATA_TARGET,
                        %error,
                        key = key.as_str(),
                        "keeping object as attribute"
                    );
                    attributes.insert(key.clone(), field.clone());
                }
            },
            _ => {
                attributes.insert(key.clone(), field.clone());
            }
        }
    }
    Ok(MetadataNode {
        description,
        attributes,
        children,
        nested: ChildMap(nested),
        lists_children,
    })
}

/// Session cache holding either nothing or one complete tree.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    tree: Option<MetadataNode>,
}

impl MetadataCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { tree: None }
    }

    /// The cached tree, if populated.
    #[must_use]
    pub const fn cached(&self) -> Option<&MetadataNode> {
        self.tree.as_ref()
    }

    /// Whether a tree is cached.
    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.tree.is_some()
    }

    /// Returns the cached tree or obtains one with `fetch`.
    ///
    /// The reply is parsed as a whole; on any failure the cache stays empty.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch` and reports
    /// [`BridgeError::MalformedResponse`] when the reply cannot be parsed.
    pub fn get_or_fetch<F>(&mut self, fetch: F) -> Result<&MetadataNode, BridgeError>
    where
        F: FnOnce() -> Result<Response, BridgeError>,
    {
        let tree = match self.tree.take() {
            Some(tree) => tree,
            None => {
                let response = fetch()?;
                let tree = MetadataNode::from_response(&response).inspect_err(|error| {
                    warn!(target: METADATA_TARGET, %error, "discarding metadata reply");
                })?;
                debug!(
                    target: METADATA_TARGET,
                    roots = tree.children().len(),
                    "metadata tree cached"
                );
                tree
            }
        };
        Ok(&*self.tree.insert(tree))
    }

    /// Drops the cached tree.
    pub fn invalidate(&mut self) {
        if self.tree.take().is_some() {
            debug!(target: METADATA_TARGET, "metadata tree invalidated");
        }
    }
}

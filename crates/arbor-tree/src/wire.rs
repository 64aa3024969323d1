//! Wire format
//!
//! [`serialize`] flattens an annotated tree into a [`WireTree`]: a map
//! from node id to [`WireNode`], plus the root id. Annotation render
//! hooks fill each record's display fields; the serializer itself only
//! records identity and links.
//!
//! Invariants of a valid payload (checked by [`WireTree::validate`]):
//! every referenced id is a key, links are symmetric, every entry is
//! reachable from the root, and the root is the only entry with a null
//! parent.

use crate::error::{TreeError, WireError};
use crate::node::{Node, NodeId};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Number of tool panels every wire node carries
pub const TOOL_PANELS: usize = 2;

/// Serialized node record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
    pub id: String,
    pub title: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub tabs: BTreeMap<String, String>,
    #[serde(default)]
    pub tools: Vec<BTreeMap<String, String>>,
    pub node_type_name: String,
}

impl WireNode {
    /// Record with identity fields only; links and display fields empty
    #[must_use]
    pub fn blank(node: &Node) -> Self {
        Self {
            id: node.id().to_string(),
            title: node.title().to_string(),
            parent: None,
            children: Vec::new(),
            data: BTreeMap::new(),
            tabs: BTreeMap::new(),
            tools: vec![BTreeMap::new(); TOOL_PANELS],
            node_type_name: node.kind().as_str().to_string(),
        }
    }

    /// Tool panel `index`, created on demand
    pub fn tool_mut(&mut self, index: usize) -> &mut BTreeMap<String, String> {
        if self.tools.len() <= index {
            self.tools.resize_with(index + 1, BTreeMap::new);
        }
        &mut self.tools[index]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMetadata {
    pub root_id: String,
}

/// Flattened, transmissible tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTree {
    pub metadata: TreeMetadata,
    pub node_dict: BTreeMap<String, WireNode>,
}

impl WireTree {
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.metadata.root_id
    }

    #[must_use]
    pub fn root(&self) -> Option<&WireNode> {
        self.node_dict.get(&self.metadata.root_id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WireNode> {
        self.node_dict.get(id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.node_dict.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_dict.is_empty()
    }

    /// Set of `(parent, child)` id pairs
    #[must_use]
    pub fn edges(&self) -> BTreeSet<(String, String)> {
        self.node_dict
            .values()
            .flat_map(|n| n.children.iter().map(|c| (n.id.clone(), c.clone())))
            .collect()
    }

    /// # Errors
    /// [`WireError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a payload
    ///
    /// # Errors
    /// Any [`WireError`] describing why the payload is not a tree.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        let tree: Self = serde_json::from_str(json)?;
        tree.validate()?;
        Ok(tree)
    }

    /// Check the wire invariants
    ///
    /// # Errors
    /// The first violated invariant.
    pub fn validate(&self) -> Result<(), WireError> {
        let root_id = &self.metadata.root_id;
        if !self.node_dict.contains_key(root_id) {
            return Err(WireError::MissingRoot(root_id.clone()));
        }

        let parentless: Vec<String> = self
            .node_dict
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id.clone())
            .collect();
        if parentless.len() != 1 || &parentless[0] != root_id {
            return Err(WireError::RootMismatch(parentless));
        }

        for (key, node) in &self.node_dict {
            if let Some(parent) = &node.parent {
                let Some(p) = self.node_dict.get(parent) else {
                    return Err(WireError::DanglingParent {
                        node: key.clone(),
                        parent: parent.clone(),
                    });
                };
                if !p.children.contains(key) {
                    return Err(WireError::AsymmetricLink {
                        parent: parent.clone(),
                        child: key.clone(),
                    });
                }
            }
            for child in &node.children {
                let Some(c) = self.node_dict.get(child) else {
                    return Err(WireError::DanglingChild {
                        node: key.clone(),
                        child: child.clone(),
                    });
                };
                if c.parent.as_ref() != Some(key) {
                    return Err(WireError::AsymmetricLink {
                        parent: key.clone(),
                        child: child.clone(),
                    });
                }
            }
        }

        let mut reached = HashSet::new();
        let mut queue = VecDeque::from([root_id.as_str()]);
        while let Some(id) = queue.pop_front() {
            if !reached.insert(id) {
                continue;
            }
            if let Some(node) = self.node_dict.get(id) {
                queue.extend(node.children.iter().map(String::as_str));
            }
        }
        if reached.len() != self.node_dict.len() {
            let missing = self
                .node_dict
                .keys()
                .filter(|k| !reached.contains(k.as_str()))
                .cloned()
                .collect();
            return Err(WireError::Unreachable(missing));
        }
        Ok(())
    }
}

/// Flatten the subtree rooted at `root` into a [`WireTree`]
///
/// Each reachable node appears exactly once. `root` is emitted with a
/// null parent even when it is attached to something in the arena.
///
/// # Errors
/// [`TreeError::NodeNotFound`] if `root` or a linked child is missing.
pub fn serialize(tree: &Tree, root: NodeId) -> Result<WireTree, TreeError> {
    let mut node_dict = BTreeMap::new();
    let mut queue = VecDeque::from([root]);
    let mut seen = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            return Err(TreeError::CorruptedLinks(id));
        }
        let node = tree.node(id)?;
        let mut wire = WireNode::blank(node);
        node.annotations().render(node, &mut wire);
        wire.parent = if id == root {
            None
        } else {
            node.parent().map(|p| p.to_string())
        };
        wire.children = node.children().iter().map(ToString::to_string).collect();
        queue.extend(node.children().iter().copied());
        node_dict.insert(wire.id.clone(), wire);
    }

    Ok(WireTree {
        metadata: TreeMetadata {
            root_id: root.to_string(),
        },
        node_dict,
    })
}

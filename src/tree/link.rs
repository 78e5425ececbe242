use super::Node;

/// Symbolic link to an entity's home under `/.id`.
///
/// Listings show entities as links, so every path to an album or a track
/// ends at the same node. The target is relative to the directory holding
/// the link.
#[derive(Debug)]
pub struct LinkNode {
    target: String,
    node: Node,
}

impl LinkNode {
    pub fn new(target: impl Into<String>, node: Node) -> Self {
        Self {
            target: target.into(),
            node,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The node the link points at.
    pub fn node(&self) -> &Node {
        &self.node
    }
}

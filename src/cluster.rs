//! Local cluster-membership bookkeeping.
//!
//! Single-node by design: only self-registration is exercised. A discovery
//! protocol (periodic heartbeat broadcast plus a listener merging peer
//! records) would slot in behind [`NodeRegistry::register`], but multi-node
//! operation is out of scope, so the registry never learns about peers on
//! its own.

use dashmap::DashMap;

/// A known cluster member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub ip: String,
}

/// Name-keyed record of cluster members. No conflict resolution, no
/// failure detection.
pub struct NodeRegistry {
    nodes: DashMap<String, Node>,
}

impl NodeRegistry {
    /// A registry holding only the local node.
    pub fn with_local_node(name: &str) -> NodeRegistry {
        let registry = NodeRegistry {
            nodes: DashMap::new(),
        };
        registry.register(Node {
            name: name.to_string(),
            ip: "localhost".to_string(),
        });
        registry
    }

    /// Insert or replace a member record.
    pub fn register(&self, node: Node) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn get(&self, name: &str) -> Option<Node> {
        self.nodes.get(name).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tabular summary for `/_cat/nodes`.
    pub fn cat_nodes(&self) -> String {
        let mut out = String::from(
            "ip        heap.percent ram.percent cpu load_1m load_5m load_15m node.role master name\n",
        );
        for node in self.nodes.iter() {
            out.push_str(&format!("{:<14} {:<65} {:<20}\n", node.ip, " ", node.name));
        }
        out
    }
}

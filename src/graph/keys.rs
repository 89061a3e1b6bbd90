//! Key layout for one graph namespace.
//!
//! Every piece of graph state lives under the namespace prefix, so any
//! number of graphs can share one store. The layout is a compatibility
//! contract; nothing outside this module builds keys.

use super::types::EntityKind;

/// Builds the keys of one namespace.
#[derive(Debug, Clone)]
pub(crate) struct KeySpace {
    ns: String,
}

impl KeySpace {
    pub fn new(ns: impl Into<String>) -> Self {
        KeySpace { ns: ns.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    /// Next-id counter, `ns:next_nid` / `ns:next_eid`.
    pub fn counter(&self, kind: EntityKind) -> String {
        match kind {
            EntityKind::Node => format!("{}:next_nid", self.ns),
            EntityKind::Edge => format!("{}:next_eid", self.ns),
        }
    }

    /// Membership set of all live ids, `ns:nodes` / `ns:edges`.
    pub fn members(&self, kind: EntityKind) -> String {
        match kind {
            EntityKind::Node => format!("{}:nodes", self.ns),
            EntityKind::Edge => format!("{}:edges", self.ns),
        }
    }

    /// Property map, `ns:n:{id}:p` / `ns:e:{id}:p`.
    pub fn props(&self, kind: EntityKind, id: u64) -> String {
        format!("{}:{}:{}:p", self.ns, kind.tag(), id)
    }

    /// Parent node of an edge, `ns:e:{id}:in`.
    pub fn edge_parent(&self, id: u64) -> String {
        format!("{}:e:{}:in", self.ns, id)
    }

    /// Child node of an edge, `ns:e:{id}:on`.
    pub fn edge_child(&self, id: u64) -> String {
        format!("{}:e:{}:on", self.ns, id)
    }

    /// Outgoing edge ids of a node, `ns:n:{id}:oe`.
    pub fn out_edges(&self, id: u64) -> String {
        format!("{}:n:{}:oe", self.ns, id)
    }

    /// Incoming edge ids of a node, `ns:n:{id}:ie`.
    pub fn in_edges(&self, id: u64) -> String {
        format!("{}:n:{}:ie", self.ns, id)
    }

    /// Weighted child set of a node, `ns:n:{id}:cn`.
    pub fn children(&self, id: u64) -> String {
        format!("{}:n:{}:cn", self.ns, id)
    }

    /// Weighted parent set of a node, `ns:n:{id}:pn`.
    pub fn parents(&self, id: u64) -> String {
        format!("{}:n:{}:pn", self.ns, id)
    }

    /// Forward index: ids with `field` set, `ns:i:n:{field}`.
    pub fn forward_index(&self, kind: EntityKind, field: &str) -> String {
        format!("{}:i:{}:{}", self.ns, kind.tag(), field)
    }

    /// Composite index: ids with `field` equal to `value`,
    /// `ns:i:n:{field}:{value}`.
    pub fn composite_index(&self, kind: EntityKind, field: &str, value: &str) -> String {
        format!("{}:i:{}:{}:{}", self.ns, kind.tag(), field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::new("g");
        assert_eq!(keys.counter(EntityKind::Node), "g:next_nid");
        assert_eq!(keys.counter(EntityKind::Edge), "g:next_eid");
        assert_eq!(keys.members(EntityKind::Node), "g:nodes");
        assert_eq!(keys.members(EntityKind::Edge), "g:edges");
        assert_eq!(keys.props(EntityKind::Node, 3), "g:n:3:p");
        assert_eq!(keys.props(EntityKind::Edge, 3), "g:e:3:p");
        assert_eq!(keys.edge_parent(4), "g:e:4:in");
        assert_eq!(keys.edge_child(4), "g:e:4:on");
        assert_eq!(keys.out_edges(5), "g:n:5:oe");
        assert_eq!(keys.in_edges(5), "g:n:5:ie");
        assert_eq!(keys.children(5), "g:n:5:cn");
        assert_eq!(keys.parents(5), "g:n:5:pn");
        assert_eq!(keys.forward_index(EntityKind::Node, "name"), "g:i:n:name");
        assert_eq!(
            keys.composite_index(EntityKind::Edge, "rel", "friends"),
            "g:i:e:rel:friends"
        );
    }

    #[test]
    fn test_namespaces_do_not_overlap() {
        let a = KeySpace::new("a");
        let b = KeySpace::new("b");
        assert_ne!(a.members(EntityKind::Node), b.members(EntityKind::Node));
        assert_eq!(a.namespace(), "a");
    }
}

//! The graph layer over the RocksDB backend, including reopen.

use lodestone::{GraphError, GraphStore, NodeId, RocksKv};
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn graph_operations_on_rocks() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let graph = GraphStore::new(RocksKv::open(dir.path()).unwrap(), "g");

    let a = graph.add_node(&[("name", "alice")]).unwrap();
    let b = graph.add_node(&[("name", "bob")]).unwrap();
    let e = graph.add_edge(a.id(), b.id(), &[("rel", "friends")]).unwrap();

    assert_eq!(graph.get_nodes(&[("name", "alice")]).unwrap().len(), 1);
    assert_eq!(graph.find_nodes(&[("name", "^b")]).unwrap().len(), 1);
    assert_eq!(e.parent_node().unwrap().id(), a.id());
    assert_eq!(a.children().unwrap(), vec![(b, 1)]);

    graph.del_node(a.id()).unwrap();
    assert!(graph.edges().unwrap().is_empty());
    assert!(b.in_edges().unwrap().is_empty());
    assert!(matches!(
        graph.node(a.id()),
        Err(GraphError::NodeNotFound(_))
    ));
}

#[test]
fn reopen_preserves_graph_and_counters() {
    init_logging();
    let dir = TempDir::new().unwrap();

    {
        let graph = GraphStore::new(RocksKv::open(dir.path()).unwrap(), "g");
        let n = graph.add_node(&[("name", "alice")]).unwrap();
        assert_eq!(n.id(), NodeId::new(0));
        graph.del_node(n.id()).unwrap();
    }

    let graph = GraphStore::new(RocksKv::open(dir.path()).unwrap(), "g");
    assert!(graph.nodes().unwrap().is_empty());

    // The counter survived the reopen; the deleted id is not reused.
    let n = graph.add_node(&[]).unwrap();
    assert_eq!(n.id(), NodeId::new(1));
}

#[test]
fn property_churn_on_rocks() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let graph = GraphStore::new(RocksKv::open(dir.path()).unwrap(), "g");

    let n = graph.add_node(&[("state", "new")]).unwrap();
    n.set("state", "active").unwrap();
    n.set("owner", "ops").unwrap();
    n.remove("owner").unwrap();

    assert!(graph.get_nodes(&[("state", "new")]).unwrap().is_empty());
    assert_eq!(graph.get_nodes(&[("state", "active")]).unwrap().len(), 1);
    assert!(graph.get_nodes(&[("owner", "ops")]).unwrap().is_empty());
    assert!(matches!(
        n.get("owner"),
        Err(GraphError::PropertyNotFound(_))
    ));
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lodestone::{GraphStore, MemoryKv};

fn bench_add_node(c: &mut Criterion) {
    let graph = GraphStore::new(MemoryKv::new(), "bench");
    c.bench_function("add_node", |b| {
        b.iter(|| graph.add_node(black_box(&[("kind", "item")])).unwrap())
    });
}

fn bench_add_edge(c: &mut Criterion) {
    let graph = GraphStore::new(MemoryKv::new(), "bench");
    let p = graph.add_node(&[]).unwrap().id();
    let n = graph.add_node(&[]).unwrap().id();
    c.bench_function("add_edge", |b| {
        b.iter(|| graph.add_edge(black_box(p), black_box(n), &[]).unwrap())
    });
}

fn bench_exact_match(c: &mut Criterion) {
    let graph = GraphStore::new(MemoryKv::new(), "bench");
    for i in 0..1000 {
        let shard = (i % 10).to_string();
        graph
            .add_node(&[("shard", shard.as_str()), ("kind", "item")])
            .unwrap();
    }
    c.bench_function("exact_match_1k", |b| {
        b.iter(|| {
            graph
                .get_nodes(black_box(&[("shard", "3"), ("kind", "item")]))
                .unwrap()
        })
    });
}

fn bench_regex_match(c: &mut Criterion) {
    let graph = GraphStore::new(MemoryKv::new(), "bench");
    for i in 0..1000 {
        let name = format!("item-{i:04}");
        graph.add_node(&[("name", name.as_str())]).unwrap();
    }
    c.bench_function("regex_match_1k", |b| {
        b.iter(|| graph.find_nodes(black_box(&[("name", "^item-09")])).unwrap())
    });
}

criterion_group!(
    benches,
    bench_add_node,
    bench_add_edge,
    bench_exact_match,
    bench_regex_match
);
criterion_main!(benches);

//! Benchmarks for reference tree building
//!
//! Run with: `cargo bench -p refgraph-core`
//!
//! These benchmarks cover the shapes seen in practice:
//! - Wide entries (hundreds of direct references)
//! - Densely cross-linked graphs (many cycles, shared children)
//! - Deep chains that run into the failsafe

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use refgraph_core::{
    build_tree_of_references, render_cards, Entity, EntityGraph, EntityType, TreeConfig, TreeOptions,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn link(id: &str) -> Value {
    json!({ "sys": { "type": "Link", "linkType": "Entry", "id": id } })
}

/// Root with `width` direct leaf references
fn wide_graph(width: usize) -> (Arc<Entity>, EntityGraph) {
    let ids: Vec<String> = (0..width).map(|i| format!("leaf-{}", i)).collect();
    let links: Vec<Value> = ids.iter().map(|id| link(id)).collect();
    let root = Entity::new("root", EntityType::Entry).with_field("refs", "en-US", Value::Array(links));
    let graph = EntityGraph::from_entities(ids.iter().map(|id| Entity::new(id.as_str(), EntityType::Entry)));
    (Arc::new(root), graph)
}

/// `size` entries each linking to the next three (wrapping), so cycles everywhere
fn cyclic_graph(size: usize) -> (Arc<Entity>, EntityGraph) {
    let entities: Vec<Entity> = (0..size)
        .map(|i| {
            let links: Vec<Value> = (1..=3).map(|step| link(&format!("n{}", (i + step) % size))).collect();
            Entity::new(format!("n{}", i), EntityType::Entry).with_field("refs", "en-US", Value::Array(links))
        })
        .collect();
    let root = Arc::new(entities[0].clone());
    (root, EntityGraph::from_entities(entities))
}

/// Linear chain longer than the failsafe depth
fn deep_chain(length: usize) -> (Arc<Entity>, EntityGraph) {
    let entities: Vec<Entity> = (0..length)
        .map(|i| {
            Entity::new(format!("c{}", i), EntityType::Entry).with_field(
                "next",
                "en-US",
                link(&format!("c{}", i + 1)),
            )
        })
        .collect();
    let root = Arc::new(entities[0].clone());
    (root, EntityGraph::from_entities(entities))
}

fn bench_wide(c: &mut Criterion) {
    let (root, graph) = wide_graph(500);
    let options = TreeOptions::default();
    c.bench_function("build_wide_500", |b| {
        b.iter(|| build_tree_of_references(black_box(&root), black_box(&graph), &options))
    });
}

fn bench_cyclic(c: &mut Criterion) {
    let (root, graph) = cyclic_graph(6);
    let options = TreeOptions::with_max_level(5);
    c.bench_function("build_cyclic_6x3", |b| {
        b.iter(|| build_tree_of_references(black_box(&root), black_box(&graph), &options))
    });

    let tree = build_tree_of_references(&root, &graph, &options);
    c.bench_function("render_cyclic_6x3", |b| b.iter(|| render_cards(black_box(&tree))));
}

fn bench_deep(c: &mut Criterion) {
    let (root, graph) = deep_chain(100);
    let options = TreeConfig::full_tab().options();
    c.bench_function("build_deep_chain_failsafe", |b| {
        b.iter(|| build_tree_of_references(black_box(&root), black_box(&graph), &options))
    });
}

criterion_group!(benches, bench_wide, bench_cyclic, bench_deep);
criterion_main!(benches);

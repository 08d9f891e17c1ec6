//! Benchmark: scanning markup and draining a full batch of requests.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elx_core::{Engine, EngineConfig, MemoryDocument, NodeId, TaskQueue};

struct Page {
    doc: Rc<MemoryDocument>,
    tasks: Rc<TaskQueue>,
    engine: Engine<MemoryDocument>,
    rows: Vec<NodeId>,
}

fn page(rows: usize) -> Page {
    let doc = Rc::new(MemoryDocument::new());
    let tasks = Rc::new(TaskQueue::new());
    let engine = Engine::new(doc.clone(), tasks.clone(), EngineConfig::default());
    let rows = (0..rows)
        .map(|i| {
            let key = format!("x-ref-row{}", i % 16);
            let rot = format!("x-rot-row{}", i % 16);
            doc.create_child(
                doc.body(),
                "div",
                &[
                    ("class", "off"),
                    (key.as_str(), ""),
                    (rot.as_str(), "off on"),
                    ("x-var-count", "this"),
                ],
            )
        })
        .collect();
    Page { doc, tasks, engine, rows }
}

fn bench_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("init");
    for size in [16, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_with_setup(
                || page(size),
                |page| {
                    page.engine.init(&page.rows, None);
                    black_box(page.engine.keys().len())
                },
            );
        });
    }
    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");
    for size in [16, 256, 1024] {
        let page = page(size);
        page.engine.init(&page.rows, None);
        group.bench_with_input(BenchmarkId::from_parameter(size), &page, |b, page| {
            b.iter(|| {
                for &row in &page.rows {
                    page.engine.process(row, "");
                }
                black_box(page.tasks.run_until_idle())
            });
        });
        black_box(page.doc.mutations());
    }
    group.finish();
}

criterion_group!(benches, bench_init, bench_drain);
criterion_main!(benches);

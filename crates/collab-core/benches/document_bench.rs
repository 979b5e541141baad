//! Criterion benchmarks for the edit hot path.
//!
//! Every accepted edit is decoded from a socket read and appended to the
//! in-memory document while the document lock is held, so both steps sit on
//! the critical section that serialises all clients.
//!
//! Run with:
//! ```bash
//! cargo bench --package collab-core --bench document_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use collab_core::{Document, Edit, EditDecoder, Framing};

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let lines: Vec<u8> = (0..64).flat_map(|i| format!("edit number {i}\n").into_bytes()).collect();

    for framing in [Framing::Chunk, Framing::Line] {
        group.bench_with_input(
            BenchmarkId::from_parameter(framing),
            &lines,
            |b, input| {
                b.iter(|| {
                    let mut decoder = EditDecoder::new(framing, 1024);
                    black_box(decoder.decode(black_box(input)).unwrap());
                });
            },
        );
    }
    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let edit = Edit::from("a typical edit of a few dozen bytes of text");
    c.bench_function("apply_1k_edits", |b| {
        b.iter(|| {
            let mut doc = Document::new();
            for _ in 0..1_000 {
                black_box(doc.apply(&edit));
            }
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let mut doc = Document::new();
    for i in 0..10_000 {
        doc.apply(&Edit::from(format!("line {i}").as_str()));
    }
    c.bench_function("snapshot_10k_edits", |b| b.iter(|| black_box(doc.snapshot())));
}

criterion_group!(benches, bench_decode, bench_apply, bench_snapshot);
criterion_main!(benches);

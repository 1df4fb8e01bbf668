// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

//! Reframing throughput benchmarks.
//!
//! Measures:
//! - Line splitting of an upstream SSE body delivered in small chunks
//! - Full per-line classification and accumulation of answer deltas
//!
//! Run: cargo bench --bench reframe_throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chatrelay::stream::{CozeChunkClassifier, LineBuffer, ReframeState};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn upstream_body(frames: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..frames {
        if i % 10 == 0 {
            body.push_str("data: {\"event\":\"message\",\"message\":{\"type\":\"verbose\",\"content\":\"{}\"}}\n\n");
        }
        body.push_str(&format!(
            "data: {{\"event\":\"message\",\"message\":{{\"type\":\"answer\",\"content\":\"token {i} 你好\"}},\"conversation_id\":\"conv-bench\"}}\n\n"
        ));
    }
    body.into_bytes()
}

fn reframe(body: &[u8], chunk_size: usize) -> usize {
    let classifier = CozeChunkClassifier;
    let mut lines = LineBuffer::default();
    let mut state = ReframeState::new("");
    let mut emitted = 0;

    for chunk in body.chunks(chunk_size) {
        for line in lines.push(chunk) {
            if state.apply_line(&line, &classifier).is_some() {
                emitted += 1;
            }
        }
    }
    emitted + state.full_content().len()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_line_buffer(c: &mut Criterion) {
    let body = upstream_body(1_000);
    let mut group = c.benchmark_group("line_buffer");
    group.throughput(Throughput::Bytes(body.len() as u64));

    for chunk_size in [7usize, 64, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &size| {
                b.iter(|| {
                    let mut lines = LineBuffer::default();
                    let mut count = 0;
                    for chunk in black_box(&body).chunks(size) {
                        count += lines.push(chunk).len();
                    }
                    count
                })
            },
        );
    }
    group.finish();
}

fn bench_reframe(c: &mut Criterion) {
    let mut group = c.benchmark_group("reframe");

    for frames in [100usize, 1_000] {
        let body = upstream_body(frames);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &body, |b, body| {
            b.iter(|| reframe(black_box(body), 256))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_line_buffer, bench_reframe);
criterion_main!(benches);

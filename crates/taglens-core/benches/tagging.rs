//! Benchmarks for the CPU-only tagging stages.
//!
//! Run with: cargo bench -p taglens-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use taglens_core::tagging::caption::miner::mine_captions;
use taglens_core::tagging::filter::assemble;
use taglens_core::tagging::labels::{decode_label_bytes, LabelTable};
use taglens_core::TagResult;

fn caption_set() -> Vec<String> {
    [
        "a woman sitting on a white background",
        "woman smiling in studio",
        "a young woman with long hair wearing a red dress, standing next to a window",
        "portrait of a smiling person in a bright room",
        "the woman is holding a cup of coffee in front of a brick wall",
        "a close up photo of a woman with blue eyes and short brown hair",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn label_csv(rows: usize) -> String {
    let mut csv = String::from("tag_id,name,category,count\n");
    for i in 0..rows {
        csv.push_str(&format!("{i},tag_{i},{},{}\n", i % 9, 1000 - i % 1000));
    }
    csv
}

fn benchmark_mine_captions(c: &mut Criterion) {
    let captions = caption_set();

    c.bench_function("mine_captions", |b| {
        b.iter(|| {
            let _ = mine_captions(black_box(&captions), 10, 0.0);
        })
    });
}

fn benchmark_label_parse(c: &mut Criterion) {
    let csv = label_csv(10_000);

    c.bench_function("label_table_parse_10k", |b| {
        b.iter(|| {
            let _ = LabelTable::parse(black_box(&csv));
        })
    });
}

fn benchmark_label_decode(c: &mut Criterion) {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(label_csv(10_000).as_bytes());

    c.bench_function("label_decode_utf8_bom", |b| {
        b.iter(|| {
            let _ = decode_label_bytes(black_box(&bytes));
        })
    });
}

fn benchmark_assemble(c: &mut Criterion) {
    let candidates: Vec<TagResult> = (0..20_000)
        .map(|i| TagResult::new(format!("tag_{i}"), (i % 997) as f32 / 997.0))
        .collect();

    c.bench_function("assemble_20k", |b| {
        b.iter(|| {
            let _ = assemble(black_box(candidates.clone()), 20, 0.1);
        })
    });
}

criterion_group!(
    benches,
    benchmark_mine_captions,
    benchmark_label_parse,
    benchmark_label_decode,
    benchmark_assemble,
);
criterion_main!(benches);

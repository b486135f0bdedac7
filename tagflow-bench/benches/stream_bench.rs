//! Tokenizer and stream adapter benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tagflow_core::TransitionTable;
use tagflow_sax::{ParserConfig, TagParser};
use tagflow_stream::{StreamAdapter, TagArg};

fn create_document(items: usize) -> String {
    let mut doc = String::from("<?xml version=\"1.0\"?><items>");
    for i in 0..items {
        doc.push_str(&format!(
            r#"<item id="{}" kind="bench">text &amp; more text {}</item>"#,
            i, i
        ));
    }
    doc.push_str("</items>");
    doc
}

fn items_table() -> Arc<TransitionTable<usize, TagArg>> {
    Arc::new(
        TransitionTable::<usize, TagArg>::new()
            .with_bare("START", "o:items", "LIST")
            .with_handler("LIST", "o:item", "ITEM", |ctx, _| {
                *ctx.data_mut() += 1;
                ctx.target().to_string()
            })
            .with_bare("ITEM", "t", "ITEM")
            .with_bare("ITEM", "c:item", "LIST")
            .with_bare("LIST", "c:items", "START")
            .with_bare("START", "e", "DONE"),
    )
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("sax_parse");

    for items in [10, 1000] {
        let doc = create_document(items);
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &doc, |b, doc| {
            b.iter(|| black_box(TagParser::parse_all(doc.as_bytes(), ParserConfig::default()).unwrap()));
        });
    }

    group.finish();
}

fn bench_adapter_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_adapter_chunked");
    let doc = create_document(1000);
    let table = items_table();

    for chunk_size in [64, 4096, 65536] {
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut adapter = StreamAdapter::with_parser(Arc::clone(&table), "START", 0usize);
                    for chunk in doc.as_bytes().chunks(chunk_size) {
                        adapter.write(chunk).unwrap();
                    }
                    adapter.end().unwrap();
                    black_box(*adapter.data())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_adapter_chunked);

criterion_main!(benches);

use canonical::{normalize, NormalizeConfig, NormalizedRecord};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use ingest::RawRecord;
use schema::{Domain, ValidationConfig, ValidationPartitioner};
use serde_json::json;
use std::hint::black_box;

/// Retail rows; every tenth one lacks a customer id.
fn retail_records(count: usize) -> Vec<NormalizedRecord> {
    let cfg = NormalizeConfig::default();
    (0..count)
        .map(|idx| {
            let customer = if idx % 10 == 0 {
                json!(null)
            } else {
                json!(format!("C{}", idx % 500))
            };
            let raw = RawRecord::from_value(json!({
                "Transaction_ID": format!("T{idx}"),
                "Customer_ID": customer,
                "Amount": format!("{}.{:02}", idx % 1000, idx % 100),
                "Date": "03/15/2024",
                "Store": "Koramangala",
            }))
            .expect("object");
            normalize(raw, &cfg)
        })
        .collect()
}

fn bench_partition_sizes(c: &mut Criterion) {
    let partitioner = ValidationPartitioner::with_defaults().expect("partitioner");
    let mut group = c.benchmark_group("partition_retail");

    for size in [100, 1_000, 10_000] {
        let records = retail_records(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("records_{size}"), |b| {
            b.iter_batched(
                || records.clone(),
                |batch| {
                    partitioner
                        .partition(Domain::Retail, black_box("bench.csv"), batch)
                        .expect("partition")
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Sequential versus pooled validation at the same batch size.
fn bench_partition_workers(c: &mut Criterion) {
    let records = retail_records(10_000);
    let mut group = c.benchmark_group("partition_workers");
    group.throughput(Throughput::Elements(records.len() as u64));

    for workers in [1, 2, 4, 8] {
        let cfg = ValidationConfig {
            max_workers: workers,
            ..ValidationConfig::default()
        };
        let partitioner =
            ValidationPartitioner::new(schema::ContractSet::builtin(), cfg).expect("partitioner");
        group.bench_function(format!("workers_{workers}"), |b| {
            b.iter_batched(
                || records.clone(),
                |batch| {
                    partitioner
                        .partition(Domain::Retail, "bench.csv", black_box(batch))
                        .expect("partition")
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_partition_sizes, bench_partition_workers);
criterion_main!(benches);

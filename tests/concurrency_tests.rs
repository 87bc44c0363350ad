use std::sync::Arc;
use std::thread;

use txmart::{BatchInput, Domain, MartConfig, Pipeline, PipelineError};

const THREADS: usize = 8;
const ROWS_PER_BATCH: usize = 5;

fn retail_batch(batch: usize, customer: &str) -> BatchInput {
    let mut csv = String::from("transaction_id,customer_id,amount\n");
    for row in 0..ROWS_PER_BATCH {
        csv.push_str(&format!("T{batch}-{row},{customer},{}\n", row + 1));
    }
    BatchInput::new(format!("retail_{batch}.csv"), "csv", Domain::Retail, csv.into_bytes())
}

#[test]
fn concurrent_batches_for_one_customer_lose_no_entries() {
    let pipeline = Arc::new(Pipeline::from_config(&MartConfig::default()).expect("pipeline"));

    thread::scope(|scope| {
        for batch in 0..THREADS {
            let pipeline = Arc::clone(&pipeline);
            scope.spawn(move || {
                let outcome = pipeline
                    .process_batch(&retail_batch(batch, "C1"))
                    .expect("batch");
                assert_eq!(outcome.aggregated.appended, ROWS_PER_BATCH);
            });
        }
    });

    let retail = pipeline
        .aggregates()
        .records("C1", Some(Domain::Retail))
        .expect("aggregate");
    assert_eq!(retail.len(), THREADS * ROWS_PER_BATCH);
    assert_eq!(
        pipeline.warehouse().domain_records(Domain::Retail).expect("warehouse").len(),
        THREADS * ROWS_PER_BATCH
    );
}

#[test]
fn entries_from_one_batch_keep_their_file_order() {
    let pipeline = Pipeline::from_config(&MartConfig::default()).expect("pipeline");
    pipeline.process_batch(&retail_batch(0, "C7")).expect("batch");

    let ids: Vec<String> = pipeline
        .aggregates()
        .records("C7", Some(Domain::Retail))
        .expect("aggregate")
        .iter()
        .map(|doc| doc["transaction_id"].as_str().unwrap_or_default().to_string())
        .collect();
    let expected: Vec<String> = (0..ROWS_PER_BATCH).map(|row| format!("T0-{row}")).collect();
    assert_eq!(ids, expected);
}

#[test]
fn process_all_returns_results_in_input_order() {
    let pipeline = Pipeline::from_config(&MartConfig::default()).expect("pipeline");
    let mut inputs: Vec<BatchInput> = (0..6)
        .map(|batch| retail_batch(batch, &format!("C{batch}")))
        .collect();
    inputs.insert(
        3,
        BatchInput::new("broken.json", "json", Domain::Retail, b"not json".to_vec()),
    );

    let results = pipeline.process_all(&inputs);
    assert_eq!(results.len(), inputs.len());
    for (idx, result) in results.iter().enumerate() {
        if idx == 3 {
            assert!(matches!(result, Err(PipelineError::Ingest(_))));
        } else {
            let outcome = result.as_ref().expect("batch succeeded");
            assert_eq!(outcome.report.file_id(), inputs[idx].file_id);
            assert_eq!(outcome.report.accepted(), ROWS_PER_BATCH);
        }
    }
    assert_eq!(pipeline.aggregates().customers().expect("customers").len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_entry_point_runs_batches_side_by_side() {
    let pipeline = Arc::new(Pipeline::from_config(&MartConfig::default()).expect("pipeline"));

    let handles: Vec<_> = (0..4)
        .map(|batch| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(pipeline.process_batch_async(retail_batch(batch, "C42")))
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.expect("join").expect("batch");
        assert_eq!(outcome.report.accepted(), ROWS_PER_BATCH);
    }
    let retail = pipeline
        .aggregates()
        .records("C42", Some(Domain::Retail))
        .expect("aggregate");
    assert_eq!(retail.len(), 4 * ROWS_PER_BATCH);
}

//! Tree dig example: find values in a content tree, scan them and record results.
//!
//! This example shows how to:
//! - Fill an in-memory repository
//! - Build a ScanPipeline with a persister and a mail sender
//! - Dig a subtree and run the resulting jobs
//!
//! Run with: cargo run --example tree_dig

use contentscan::backends::{MockScanner, EICAR_SIGNATURE};
use contentscan::job::MemoryJobQueue;
use contentscan::prelude::*;
use contentscan::repository::MemoryRepository;
use contentscan::result::{MailConfig, MemoryResultStore, PersisterConfig, RecordingMailTransport};

use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Contentscan Tree Dig Example ===\n");

    let repository = MemoryRepository::new();
    repository
        .set_binary("/content/site/logo", b"PNG image bytes".to_vec())
        .set_binary("/content/site/upload", EICAR_SIGNATURE.to_vec())
        .set_strings("/content/site/comments", ["nice post", "x".repeat(2048).as_str()])
        .set_string("/content/site/title", "Welcome");

    let queue = Arc::new(MemoryJobQueue::new());
    let store = Arc::new(MemoryResultStore::new());
    let mail = Arc::new(RecordingMailTransport::new());

    let config = ContentScanConfig::new()
        .with_tree_digger(
            TreeDiggerConfig::new()
                .with_property_types([PropertyType::Binary, PropertyType::String])
                .with_property_length_max(1024),
        )
        .with_mail(MailConfig::new(["security@example.com"]).with_from("contentscan@example.com"))
        .with_persister(PersisterConfig::new());

    let pipeline = ScanPipeline::builder()
        .with_config(config)
        .with_repository(Arc::new(repository))
        .with_scanner(MockScanner::new().with_name("example-scanner"))
        .with_job_queue(queue.clone())
        .with_result_store(store.clone())
        .with_mail_transport(mail.clone())
        .build()?;

    let summary = pipeline.dig("/content")?;
    println!(
        "Dig visited {} nodes, emitted {} jobs, skipped {} values",
        summary.nodes_visited, summary.jobs_emitted, summary.values_skipped
    );

    println!("\n=== Running Jobs ===");
    for (job, outcome) in queue.run_pending(pipeline.runner()).await {
        println!("  {} {:?}", job.topic, outcome);
    }

    mail.wait_for(1, Duration::from_secs(1)).await;

    println!("\n=== Recorded Results ===");
    for (path, properties) in store.records() {
        println!("  {} -> {}", path, serde_json::Value::Object(properties));
    }

    println!("\n=== Mails ===");
    for message in mail.sent() {
        println!("  to {:?}: {}", message.to, message.subject.unwrap_or_default());
    }

    pipeline.shutdown().await;
    println!("\n=== Example Complete ===");
    Ok(())
}

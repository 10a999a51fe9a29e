//! Live stream example: watch scan results of committed changes as SSE frames.
//!
//! This example shows how to:
//! - Start a change digger through the pipeline configuration
//! - Open a streaming client and read its frames
//! - Feed commit notifications and drive the job queue
//!
//! Run with: cargo run --example live_stream

use contentscan::backends::{MockScanner, EICAR_SIGNATURE};
use contentscan::job::MemoryJobQueue;
use contentscan::prelude::*;
use contentscan::repository::MemoryRepository;
use contentscan::sse::CONTENT_TYPE;

use futures::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Contentscan Live Stream Example ===\n");

    let repository = MemoryRepository::new();
    let queue = Arc::new(MemoryJobQueue::new());

    let config = ContentScanConfig::new().with_change_digger(ChangeDiggerConfig::new().with_workers(2));
    let pipeline = ScanPipeline::builder()
        .with_config(config)
        .with_repository(Arc::new(repository.clone()))
        .with_scanner(MockScanner::new())
        .with_job_queue(queue.clone())
        .build()?;

    let mut stream = pipeline.open_stream();
    println!("Client {} connected ({})", stream.client_id(), CONTENT_TYPE);

    let reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            print!("{}", String::from_utf8_lossy(&frame));
        }
    });

    let commits = [
        ("/content/uploads/a", b"harmless bytes".to_vec(), "alice"),
        ("/content/uploads/b", EICAR_SIGNATURE.to_vec(), "mallory"),
    ];
    for (node, data, user) in commits {
        repository.set_binary(&format!("{}/data", node), data);
        let added: BTreeSet<String> = ["data".to_string()].into();
        pipeline.on_change(node, &added, &BTreeSet::new(), Some(user))?;
    }

    // Change digs run on workers; wait for their jobs to arrive.
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    for (job, outcome) in queue.run_pending(pipeline.runner()).await {
        println!("# {} {:?}", job.topic, outcome);
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.shutdown().await;
    reader.await?;

    println!("\n=== Example Complete ===");
    Ok(())
}

//! Basic FastDFS Client Usage Example
//!
//! This example demonstrates the fundamental operations of the FastDFS client:
//! - Uploading files from buffers
//! - Downloading whole files and byte ranges
//! - Deleting files
//!
//! Run this example with:
//! ```bash
//! FASTDFS_TRACKER_ADDR=192.168.1.100:22122 RUST_LOG=fdfs=debug cargo run --example basic_usage
//! ```

use fdfs::types::TRACKER_DEFAULT_PORT;
use fdfs::{Client, ClientConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    println!("FastDFS Rust Client - Basic Usage Example");
    println!("{}", "=".repeat(50));

    // Step 1: Configure the client
    let tracker_addr = std::env::var("FASTDFS_TRACKER_ADDR")
        .unwrap_or_else(|_| format!("192.168.1.100:{}", TRACKER_DEFAULT_PORT));
    let config = ClientConfig::new(vec![tracker_addr])
        .with_max_conns(10)
        .with_connect_timeout(5000)
        .with_idle_timeout(60000);

    // Step 2: Create the client instance
    // No connection is made until the first operation
    let client = Client::new(config)?;

    println!("\n1. Uploading data from buffer...");
    let test_data = b"Hello, FastDFS! This is a test file.";
    let file_id = client.upload_buffer(test_data, "txt").await?;
    println!("   File ID: {}", file_id);

    println!("\n2. Downloading file...");
    let downloaded_data = client.download_file(&file_id).await?;
    println!("   Downloaded {} bytes", downloaded_data.len());
    println!("   Content: {}", String::from_utf8_lossy(&downloaded_data));

    println!("\n3. Downloading bytes 7..14 into a caller buffer...");
    let mut buf = [0u8; 7];
    let n = client.download_into(&file_id, &mut buf, 7, 7).await?;
    println!("   Range: {}", String::from_utf8_lossy(&buf[..n]));

    println!("\n4. Deleting file...");
    client.delete_file(&file_id).await?;
    println!("   File deleted successfully!");

    match client.download_file(&file_id).await {
        Err(e) => println!("   Download after delete failed as expected: {}", e),
        Ok(_) => println!("   Unexpected: file still present"),
    }

    println!("\n{}", "=".repeat(50));
    println!("Storage pools opened: {}", client.storage_pool_count().await);

    // Step 3: Close the client
    client.close().await;
    println!("\nClient closed.");

    Ok(())
}

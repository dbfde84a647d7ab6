//! Integration tests for FastDFS client
//!
//! These tests require a running FastDFS cluster.
//! Set the environment variable FASTDFS_TRACKER_ADDR to run these tests.
//!
//! Example: FASTDFS_TRACKER_ADDR=192.168.1.100:22122 cargo test --test integration_tests

use fdfs::{Client, ClientConfig, FdfsError};
use std::env;
use std::io::Write;

/// Tracker address from the environment, if a cluster is available
fn tracker_addr() -> Option<String> {
    env::var("FASTDFS_TRACKER_ADDR").ok()
}

/// Creates a client for the configured cluster, or None to skip the test
fn cluster_client() -> Option<Client> {
    let Some(addr) = tracker_addr() else {
        println!("Skipping integration test - set FASTDFS_TRACKER_ADDR to run");
        return None;
    };
    Some(Client::new(ClientConfig::new(vec![addr])).unwrap())
}

/// Test complete upload, download, and delete cycle
///
/// Uploads a buffer, reads it back, deletes it, then checks that the file
/// is gone.
#[tokio::test]
async fn test_upload_download_delete_cycle() {
    let Some(client) = cluster_client() else {
        return;
    };

    let test_data = b"Hello, FastDFS! This is a test file.";
    let file_id = client
        .upload_buffer(test_data, "txt")
        .await
        .expect("Upload should succeed");
    assert!(!file_id.is_empty(), "File ID should not be empty after upload");

    let downloaded = client
        .download_file(&file_id)
        .await
        .expect("Download should succeed");
    assert_eq!(&downloaded[..], test_data);

    client
        .delete_file(&file_id)
        .await
        .expect("Delete should succeed");

    let result = client.download_file(&file_id).await;
    assert!(
        matches!(result, Err(FdfsError::FileNotFound)),
        "Deleted file should not be downloadable"
    );

    client.close().await;
}

/// Test uploading file from disk
#[tokio::test]
async fn test_upload_file_from_disk() {
    let Some(client) = cluster_client() else {
        return;
    };

    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(b"Test file content from disk").unwrap();
    file.flush().unwrap();

    let file_id = client
        .upload_file(file.path())
        .await
        .expect("Upload from disk should succeed");
    assert!(file_id.ends_with(".txt"));

    let downloaded = client.download_file(&file_id).await.unwrap();
    assert_eq!(&downloaded[..], b"Test file content from disk");

    client.delete_file(&file_id).await.unwrap();
    client.close().await;
}

/// Test downloading file to disk
#[tokio::test]
async fn test_download_to_file() {
    let Some(client) = cluster_client() else {
        return;
    };

    let test_data = b"Test data for download to file";
    let file_id = client.upload_buffer(test_data, "bin").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("downloaded.bin");
    let written = client
        .download_to_file(&file_id, &path, 0, 0)
        .await
        .expect("Download to file should succeed");

    assert_eq!(written, test_data.len() as u64);
    assert_eq!(std::fs::read(&path).unwrap(), test_data);

    client.delete_file(&file_id).await.unwrap();
    client.close().await;
}

/// Test downloading file range
///
/// Reads a slice from the middle of a file into a new buffer and into a
/// caller buffer.
#[tokio::test]
async fn test_download_range() {
    let Some(client) = cluster_client() else {
        return;
    };

    let test_data = b"0123456789ABCDEFGHIJ";
    let file_id = client.upload_buffer(test_data, "txt").await.unwrap();

    let range = client.download_to_buffer(&file_id, 5, 10).await.unwrap();
    assert_eq!(&range[..], b"56789ABCDE");

    let mut buf = [0u8; 10];
    let n = client.download_into(&file_id, &mut buf, 10, 10).await.unwrap();
    assert_eq!(&buf[..n], b"ABCDEFGHIJ");

    client.delete_file(&file_id).await.unwrap();
    client.close().await;
}

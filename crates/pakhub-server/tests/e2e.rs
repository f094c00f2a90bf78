//! End-to-end exchanges against a live server.
//!
//! Each test binds an ephemeral port, runs the server on a `LocalSet`,
//! and drives it through the real client over loopback TCP.

#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use pakhub_client::PatchClient;
use pakhub_protocol::{Patch, PatchKey};
use pakhub_server::{Server, ServerConfig};
use std::future::Future;
use std::path::Path;
use tokio::net::TcpListener;
use tokio::task::LocalSet;

const BUFFER_SIZE: usize = 4096;

fn test_config(cache_dir: &Path) -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        cache_dir: cache_dir.to_path_buf(),
        buffer_size: BUFFER_SIZE,
        max_patch_size: 1 << 20,
    }
}

/// Run `scenario` against a freshly started server, then stop it and wait
/// for the cache worker to drain.
async fn with_server<F, Fut>(cache_dir: &Path, scenario: F)
where
    F: FnOnce(PatchClient) -> Fut,
    Fut: Future<Output = ()>,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = Server::new(test_config(cache_dir)).unwrap();

    let local = LocalSet::new();
    local
        .run_until(async move {
            let server_task = tokio::task::spawn_local(async move {
                let _ = server.serve(listener).await;
            });

            let client = PatchClient::new("127.0.0.1", port).with_buffer_size(BUFFER_SIZE);
            scenario(client).await;

            server_task.abort();
            let _ = server_task.await;
        })
        .await;
}

fn test_patches() -> Vec<Patch> {
    // The 31_247 and 65_536 patches do not fit one 4096-byte frame.
    [0usize, 100, 31_247, 65_536, 1]
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let content: Vec<u8> = (0..n).map(|b| ((b + i) % 251) as u8).collect();
            Patch::new(format!("patch{i}.pak"), Bytes::from(content))
        })
        .collect()
}

#[tokio::test(flavor = "current_thread")]
async fn full_patch_lifecycle() {
    let cache = tempfile::tempdir().unwrap();
    with_server(cache.path(), |client| async move {
        let key = PatchKey::new("PlatformX", 42);
        let patches = test_patches();

        let stored = client.upload(key.clone(), patches.clone()).await.unwrap();
        assert_eq!(stored.len(), patches.len());
        assert_eq!(stored[2].size, 31_247);

        let listed = client.list().await.unwrap();
        assert_eq!(listed.len(), patches.len());
        assert!(listed.iter().all(|meta| meta.key == key));

        // Byte-for-byte, including the patches spanning several frames.
        let downloaded = client.download("PlatformX", 42).await.unwrap();
        assert_eq!(downloaded, patches);

        // Unknown keys yield empty answers, not errors.
        assert!(client.download("PlatformY", 42).await.unwrap().is_empty());
        assert!(client.delete("PlatformX", 999).await.unwrap().is_empty());
        assert_eq!(client.list().await.unwrap().len(), patches.len());

        let removed = client.delete("PlatformX", 42).await.unwrap();
        assert_eq!(removed.len(), patches.len());
        assert!(client.list().await.unwrap().is_empty());
        assert!(client.download("PlatformX", 42).await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test(flavor = "current_thread")]
async fn reupload_replaces_by_name() {
    let cache = tempfile::tempdir().unwrap();
    with_server(cache.path(), |client| async move {
        let key = PatchKey::new("Win", 7);
        client
            .upload(key.clone(), vec![Patch::new("a.pak", Bytes::from_static(b"v1"))])
            .await
            .unwrap();
        client
            .upload(
                key.clone(),
                vec![
                    Patch::new("a.pak", Bytes::from_static(b"version-two")),
                    Patch::new("b.pak", Bytes::from_static(b"new")),
                ],
            )
            .await
            .unwrap();

        let downloaded = client.download("Win", 7).await.unwrap();
        assert_eq!(downloaded.len(), 2);
        assert_eq!(downloaded[0].name, "a.pak");
        assert_eq!(downloaded[0].data, Bytes::from_static(b"version-two"));
    })
    .await;
}

#[tokio::test(flavor = "current_thread")]
async fn empty_upload_is_a_no_op() {
    let cache = tempfile::tempdir().unwrap();
    with_server(cache.path(), |client| async move {
        let stored = client
            .upload(PatchKey::new("PlatformX", 42), Vec::new())
            .await
            .unwrap();
        assert!(stored.is_empty());
        assert!(client.list().await.unwrap().is_empty());
        assert!(client.download("PlatformX", 42).await.unwrap().is_empty());
    })
    .await;

    // Nothing reached the disk cache either.
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_downloads_interleave() {
    let cache = tempfile::tempdir().unwrap();
    with_server(cache.path(), |client| async move {
        let key = PatchKey::new("PlatformX", 42);
        let patches = test_patches();
        client.upload(key, patches.clone()).await.unwrap();

        let (a, b) = tokio::join!(
            client.download("PlatformX", 42),
            client.download("PlatformX", 42)
        );
        assert_eq!(a.unwrap(), patches);
        assert_eq!(b.unwrap(), patches);
    })
    .await;
}

#[tokio::test(flavor = "current_thread")]
async fn oversized_upload_is_refused() {
    let cache = tempfile::tempdir().unwrap();
    with_server(cache.path(), |client| async move {
        // Declared size above the server's 1 MiB cap: the server drops the
        // connection instead of allocating.
        let big = Patch::new("huge.pak", Bytes::from(vec![0u8; (1 << 20) + 1]));
        let result = client
            .upload(PatchKey::new("PlatformX", 1), vec![big])
            .await;
        assert!(result.is_err());

        // The registry is untouched and the server still serves.
        assert!(client.list().await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test(flavor = "current_thread")]
async fn cache_restores_across_restart() {
    let cache = tempfile::tempdir().unwrap();
    let key = PatchKey::new("PlatformX", 42);
    let patches = test_patches();

    {
        let (key, patches) = (key.clone(), patches.clone());
        with_server(cache.path(), |client| async move {
            client.upload(key, patches).await.unwrap();
        })
        .await;
    }

    // Fresh server over the same cache directory.
    with_server(cache.path(), |client| async move {
        let listed = client.list().await.unwrap();
        assert_eq!(listed.len(), patches.len());
        assert!(listed.iter().all(|meta| meta.key == key));

        let downloaded = client.download("PlatformX", 42).await.unwrap();
        assert_eq!(downloaded, patches);
    })
    .await;
}

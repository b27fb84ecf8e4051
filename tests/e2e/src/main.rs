fn main() {
    println!("Run `cargo test -p peershare-e2e` to execute the end-to-end scenarios.");
}

/// End-to-end scenarios: a real server and a real client talking over
/// loopback TCP, exercising the full listing/download/resume/verify path.
#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use peershare_catalog::Catalog;
    use peershare_client::{Client, DownloadOutcome, DownloadRequest, ResumeRecord};
    use peershare_server::{FileServer, ServerConfig};
    use peershare_transfer::hash_bytes;

    struct Fixture {
        client: Client,
        catalog: Arc<Catalog>,
        share_dir: tempfile::TempDir,
        download_dir: tempfile::TempDir,
        _cancel: CancelOnDrop,
    }

    /// Stops the server even when a test panics.
    struct CancelOnDrop(tokio_util::sync::CancellationToken);

    impl Drop for CancelOnDrop {
        fn drop(&mut self) {
            self.0.cancel();
        }
    }

    async fn start(compression_enabled: bool, max_connections: usize) -> Fixture {
        let share_dir = tempfile::tempdir().unwrap();
        let download_dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(Catalog::new());

        let config = ServerConfig {
            port: 0,
            compression_enabled,
            max_connections,
            shared_folder: None,
        };
        let server = FileServer::bind(config, Arc::clone(&catalog)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = server.cancellation_token();
        tokio::spawn(server.run());

        Fixture {
            client: Client::new("127.0.0.1", addr.port()),
            catalog,
            share_dir,
            download_dir,
            _cancel: CancelOnDrop(cancel),
        }
    }

    impl Fixture {
        async fn share(&self, name: &str, data: &[u8]) -> PathBuf {
            let path = self.share_dir.path().join(name);
            tokio::fs::write(&path, data).await.unwrap();
            self.catalog.add_file(&path).await.unwrap();
            path
        }

        fn dest(&self, name: &str) -> PathBuf {
            self.download_dir.path().join(name)
        }

        fn request(&self, name: &str, expected: Option<String>) -> DownloadRequest {
            DownloadRequest {
                name: name.into(),
                dest: self.dest(name),
                expected_digest: expected,
                compress: false,
                resume: true,
            }
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 247) as u8).collect()
    }

    async fn raw_exchange(client: &Client, request: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", client.port())).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn list_download_verify_roundtrip() {
        let fx = start(true, 8).await;
        let data = pattern(200_000);
        fx.share("asset.bin", &data).await;

        let listing = fx.client.fetch_listing().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "asset.bin");
        assert_eq!(listing[0].size, data.len() as u64);
        assert_eq!(listing[0].digest, hash_bytes(&data));

        let request = fx.request("asset.bin", Some(listing[0].digest.clone()));
        let outcome = fx.client.download(&request, None).await.unwrap();

        assert_eq!(
            outcome,
            DownloadOutcome::Complete {
                bytes: data.len() as u64,
                digest: hash_bytes(&data),
            }
        );
        assert_eq!(tokio::fs::read(&request.dest).await.unwrap(), data);
        assert_eq!(ResumeRecord::load(&request.dest).await, None);
    }

    #[tokio::test]
    async fn compressed_download_roundtrip() {
        let fx = start(true, 8).await;
        // Compressible content spanning several chunks.
        let data: Vec<u8> = (0..300_000).map(|i| (i / 512) as u8).collect();
        fx.share("zeros.bin", &data).await;

        let mut request = fx.request("zeros.bin", Some(hash_bytes(&data)));
        request.compress = true;

        let outcome = fx.client.download(&request, None).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(tokio::fs::read(&request.dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn server_compression_setting_wins() {
        // Compression disabled server-side: a COMPRESS request is served raw.
        let fx = start(false, 8).await;
        let data = pattern(50_000);
        fx.share("raw.bin", &data).await;

        let mut request = fx.request("raw.bin", Some(hash_bytes(&data)));
        request.compress = true;

        let outcome = fx.client.download(&request, None).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(tokio::fs::read(&request.dest).await.unwrap(), data);
    }

    /// The spec's canonical scenario: 100 000 shared bytes, 40 000 already
    /// on disk, a valid record — the client fetches exactly the remaining
    /// 60 000 and the digest matches.
    #[tokio::test]
    async fn resume_completes_partial_download() {
        let fx = start(true, 8).await;
        let data = pattern(100_000);
        fx.share("a.txt", &data).await;

        let request = fx.request("a.txt", Some(hash_bytes(&data)));
        tokio::fs::write(&request.dest, &data[..40_000]).await.unwrap();
        ResumeRecord {
            filename: "a.txt".into(),
            expected_digest: String::new(),
            total_size: 100_000,
            bytes_downloaded: 40_000,
            server_host: fx.client.host().to_string(),
            server_port: fx.client.port(),
        }
        .save(&request.dest)
        .await
        .unwrap();

        let outcome = fx.client.download(&request, None).await.unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Complete {
                bytes: 100_000,
                digest: hash_bytes(&data),
            }
        );
        assert_eq!(tokio::fs::read(&request.dest).await.unwrap(), data);
        assert_eq!(ResumeRecord::load(&request.dest).await, None);
    }

    #[tokio::test]
    async fn stale_oversized_partial_triggers_retry_from_zero() {
        let fx = start(true, 8).await;
        let data = pattern(10_000);
        fx.share("shrunk.bin", &data).await;

        // Partial file larger than the shared file: the negotiated offset
        // is past EOF, the server rejects it, the client restarts cleanly.
        let request = fx.request("shrunk.bin", Some(hash_bytes(&data)));
        let stale = pattern(15_000);
        tokio::fs::write(&request.dest, &stale).await.unwrap();
        ResumeRecord {
            filename: "shrunk.bin".into(),
            expected_digest: String::new(),
            total_size: 15_000,
            bytes_downloaded: 15_000,
            server_host: fx.client.host().to_string(),
            server_port: fx.client.port(),
        }
        .save(&request.dest)
        .await
        .unwrap();

        let outcome = fx.client.download(&request, None).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(tokio::fs::read(&request.dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn offset_past_eof_gets_error_and_no_payload() {
        let fx = start(true, 8).await;
        fx.share("small.bin", b"12345").await;

        let response = raw_exchange(&fx.client, "GET small.bin OFFSET 5\n").await;
        assert_eq!(response, "ERROR: Invalid offset\n");
    }

    #[tokio::test]
    async fn missing_file_is_refused() {
        let fx = start(true, 8).await;

        let request = fx.request("ghost.bin", None);
        let outcome = fx.client.download(&request, None).await.unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Refused {
                reason: "File not found".into()
            }
        );
    }

    #[tokio::test]
    async fn checksum_matches_content_hash() {
        let fx = start(true, 8).await;
        let data = pattern(4_096);
        fx.share("sum.bin", &data).await;

        let digest = fx.client.fetch_checksum("sum.bin").await.unwrap();
        assert_eq!(digest, hash_bytes(&data));

        let err = fx.client.fetch_checksum("nope.bin").await.unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn busy_server_refuses_download() {
        let fx = start(true, 1).await;
        fx.share("f.bin", b"contended").await;

        // Occupy the only slot with an idle connection.
        let _holder = TcpStream::connect(("127.0.0.1", fx.client.port()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let request = fx.request("f.bin", None);
        let outcome = fx.client.download(&request, None).await.unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Refused {
                reason: "Server busy".into()
            }
        );
    }

    #[tokio::test]
    async fn stale_catalog_digest_reports_corruption() {
        let fx = start(true, 8).await;
        let original = pattern(30_000);
        let path = fx.share("mutated.bin", &original).await;

        // Capture the listing, then change the file behind the catalog's
        // back. The advertised digest is now stale.
        let listing = fx.client.fetch_listing().await.unwrap();
        let advertised = listing[0].digest.clone();
        tokio::fs::write(&path, pattern(30_000).iter().map(|b| b ^ 0xFF).collect::<Vec<_>>())
            .await
            .unwrap();

        let request = fx.request("mutated.bin", Some(advertised.clone()));
        let outcome = fx.client.download(&request, None).await.unwrap();

        let DownloadOutcome::Corrupted { expected, actual } = outcome else {
            panic!("expected Corrupted, got {outcome:?}");
        };
        assert_eq!(expected, advertised);
        assert_ne!(actual, advertised);
        assert!(!request.dest.exists());
        assert_eq!(ResumeRecord::load(&request.dest).await, None);
    }

    #[tokio::test]
    async fn compression_discards_partial_before_requesting() {
        let fx = start(true, 8).await;
        let data: Vec<u8> = (0..120_000).map(|i| (i / 256) as u8).collect();
        fx.share("comp.bin", &data).await;

        let mut request = fx.request("comp.bin", Some(hash_bytes(&data)));
        request.compress = true;
        tokio::fs::write(&request.dest, &data[..9_999]).await.unwrap();
        ResumeRecord {
            filename: "comp.bin".into(),
            expected_digest: String::new(),
            total_size: data.len() as u64,
            bytes_downloaded: 9_999,
            server_host: fx.client.host().to_string(),
            server_port: fx.client.port(),
        }
        .save(&request.dest)
        .await
        .unwrap();

        let outcome = fx.client.download(&request, None).await.unwrap();
        assert!(outcome.is_complete());
        // The whole file was fetched fresh, not appended to the partial.
        assert_eq!(tokio::fs::read(&request.dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn removal_mid_catalog_does_not_affect_listing_consistency() {
        let fx = start(true, 8).await;
        let data = pattern(5_000);
        fx.share("keep.bin", &data).await;
        fx.share("drop.bin", &data).await;

        assert!(fx.catalog.remove("drop.bin").await);

        let listing = fx.client.fetch_listing().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "keep.bin");

        let request = fx.request("drop.bin", None);
        let outcome = fx.client.download(&request, None).await.unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Refused {
                reason: "File not found".into()
            }
        );
    }

    #[tokio::test]
    async fn probe_detects_running_server() {
        let fx = start(true, 8).await;
        fx.client.probe().await.unwrap();
    }
}

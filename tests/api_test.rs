//! # HTTP API Tests
//!
//! These tests start the real router on a random local port, backed by an
//! in-memory object store, a temporary SQLite index and a fake transcoder.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test api_test
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use call_archive::config::ArchiveConfig;
use call_archive::error::TranscodeError;
use call_archive::index::MetadataIndex;
use call_archive::serve::create_router;
use call_archive::services::ArchiveServices;
use call_archive::store::{RecordingStore, SourceStream};
use call_archive::transcode::Transcoder;

const FILE_PATH: &str = "9_26_2025/2012055255 by user@domain.com @ 9_47_43 AM_18600.wav";
const BROKEN_PATH: &str = "9_26_2025/broken.wav";

/// Writes one second of 8 kHz audio, fails for sources containing "BROKEN"
#[derive(Default)]
struct FakeTranscoder {
    runs: AtomicUsize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode_to_file(&self, input: SourceStream, output: &Path) -> Result<(), TranscodeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let data: Vec<bytes::Bytes> = input
            .try_collect()
            .await
            .map_err(|e| TranscodeError::Input(e.to_string()))?;
        if data.concat().starts_with(b"BROKEN") {
            return Err(TranscodeError::Exit {
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output, spec)
            .map_err(|e| TranscodeError::Io(std::io::Error::other(e)))?;
        for i in 0..8000i32 {
            writer
                .write_sample(((i % 80) - 40) as i16 * 300)
                .map_err(|e| TranscodeError::Io(std::io::Error::other(e)))?;
        }
        writer
            .finalize()
            .map_err(|e| TranscodeError::Io(std::io::Error::other(e)))?;
        Ok(())
    }

    async fn decode_pcm(&self, _input: SourceStream) -> Result<Vec<i16>, TranscodeError> {
        Ok(vec![0; 8000])
    }

    fn sample_rate(&self) -> u32 {
        8000
    }
}

struct TestServer {
    url: String,
    objects: Arc<InMemory>,
    transcoder: Arc<FakeTranscoder>,
    _handle: tokio::task::JoinHandle<()>,
    _guard: tempfile::TempDir,
}

fn test_config(database_path: &Path) -> ArchiveConfig {
    let mut config: ArchiveConfig = toml::from_str(
        r#"
        [storage]
        backend = "memory"

        [sync]
        periodic = false
        batch_pause_ms = 0
        "#,
    )
    .unwrap();
    config.database_path = database_path.to_path_buf();
    config
}

/// Start a test API server
async fn start_test_api_server() -> TestServer {
    let (pool, guard) = call_archive::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    let db_path = guard.path().join("test.sqlite");
    let index = Arc::new(MetadataIndex::from_pool(pool, db_path.clone()).await.unwrap());

    let objects = Arc::new(InMemory::new());
    for (key, data) in [
        (format!("recordings/{}", FILE_PATH), &b"RIFF-source"[..]),
        (format!("recordings/{}", BROKEN_PATH), &b"BROKEN"[..]),
        ("recordings/9_27_2025/unknown.wav".to_string(), &b"RIFF"[..]),
    ] {
        objects
            .put(&ObjectPath::from(key), PutPayload::from(data.to_vec()))
            .await
            .unwrap();
    }

    let store = Arc::new(RecordingStore::new(objects.clone(), "recordings", "cache"));
    let transcoder = Arc::new(FakeTranscoder::default());
    let services = Arc::new(ArchiveServices::assemble(
        index,
        store,
        transcoder.clone(),
        &test_config(&db_path),
    ));

    let app = create_router(services);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    TestServer {
        url,
        objects,
        transcoder,
        _handle: handle,
        _guard: guard,
    }
}

fn audio_url(server: &TestServer, path: &str) -> String {
    format!("{}/audio/{}", server.url, urlencoding::encode(path).replace("%2F", "/"))
}

async fn full_sync(server: &TestServer, client: &reqwest::Client) -> Value {
    let response = client
        .post(format!("{}/sync", server.url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = start_test_api_server().await;
    let response = reqwest::get(format!("{}/health", server.url)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_sync_then_list_recordings() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();

    let report = full_sync(&server, &client).await;
    assert_eq!(report["success"], true);
    assert_eq!(report["indexedFiles"], 3);
    assert!(report["duration"].is_number());

    let body: Value = client
        .get(format!("{}/recordings?limit=2", server.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["totalCount"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
    // newest date first
    assert_eq!(body["files"][0]["filePath"], "9_27_2025/unknown.wav");
}

#[tokio::test]
async fn test_list_filters_and_bad_params() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();
    full_sync(&server, &client).await;

    let body: Value = client
        .get(format!(
            "{}/recordings?durationMin=10&durationMode=min&phone=2012",
            server.url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["totalCount"], 1);
    let file = &body["files"][0];
    assert_eq!(file["phone"], "2012055255");
    assert_eq!(file["email"], "user@domain.com");
    assert_eq!(file["callDate"], "2025-09-26");
    assert_eq!(file["callTime"], "09:47:43");
    assert_eq!(file["durationMs"], 18600);

    // malformed filters are ignored rather than rejected
    let response = client
        .get(format!(
            "{}/recordings?durationMin=abc&dateStart=never&limit=0&sortColumn=bogus",
            server.url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["totalCount"], 3);
    assert_eq!(body["limit"], 1);
}

#[tokio::test]
async fn test_sync_date_range() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/sync", server.url))
        .json(&serde_json::json!({
            "dateRange": {"startDate": "2025-09-27", "endDate": "9_27_2025"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["indexedFiles"], 1);
    assert_eq!(report["failedDays"].as_array().unwrap().len(), 0);

    let response = client
        .post(format!("{}/sync", server.url))
        .json(&serde_json::json!({
            "dateRange": {"startDate": "2025-09-28", "endDate": "2025-09-27"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_audio_full_then_range() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();

    let response = client.get(audio_url(&server, FILE_PATH)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/wav");
    assert_eq!(response.headers()["accept-ranges"], "bytes");
    assert!(response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("inline; filename="));
    let full = response.bytes().await.unwrap();
    // 44-byte header + 8000 samples
    assert_eq!(full.len(), 44 + 16000);

    let response = client
        .get(audio_url(&server, FILE_PATH))
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 206);
    assert_eq!(
        response.headers()["content-range"],
        format!("bytes 100-199/{}", full.len()).as_str()
    );
    assert!(response.headers().get("last-modified").is_some());
    let part = response.bytes().await.unwrap();
    assert_eq!(part.len(), 100);
    assert_eq!(&part[..], &full[100..200]);

    assert_eq!(server.transcoder.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recordings_audio_route() {
    let server = start_test_api_server().await;
    let (folder, filename) = FILE_PATH.split_once('/').unwrap();
    let url = format!(
        "{}/recordings/{}/{}",
        server.url,
        folder,
        urlencoding::encode(filename)
    );

    let response = reqwest::get(url).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().len(), 44 + 16000);
}

#[tokio::test]
async fn test_audio_errors() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(audio_url(&server, "9_26_2025/missing.wav"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not found");
    assert_eq!(body["key"], "9_26_2025/missing.wav");

    let response = client.get(audio_url(&server, BROKEN_PATH)).send().await.unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["stage"], "transcode");
    assert!(!body.to_string().contains("Invalid data"));

    let key = call_archive::cache::cache_key("cache", call_archive::cache::ArtifactKind::Audio, BROKEN_PATH);
    assert!(server.objects.head(&key).await.is_err());

    let response = client
        .get(audio_url(&server, FILE_PATH))
        .header("Range", "bytes=999999-")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 416);
    assert_eq!(response.headers()["content-range"], "bytes */16044");
}

#[tokio::test]
async fn test_malformed_range_serves_full_body() {
    let server = start_test_api_server().await;
    let response = reqwest::Client::new()
        .get(audio_url(&server, FILE_PATH))
        .header("Range", "bytes=abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().len(), 16044);
}

#[tokio::test]
async fn test_waveform_endpoint() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();
    let url = format!(
        "{}/waveform/{}",
        server.url,
        urlencoding::encode(FILE_PATH).replace("%2F", "/")
    );

    let first: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(first["cached"], false);
    assert_eq!(first["waveform"].as_array().unwrap().len(), 1000);
    assert_eq!(first["sampleRate"], 8000);
    assert_eq!(first["totalSamples"], 8000);

    let second: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(second["cached"], true);
    assert_eq!(second["waveform"], first["waveform"]);
}

#[tokio::test]
async fn test_admin_stats() {
    let server = start_test_api_server().await;
    let client = reqwest::Client::new();
    full_sync(&server, &client).await;

    let body: Value = client
        .get(format!("{}/admin/stats", server.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["totalFiles"], 3);
    assert!(body["databaseSize"].as_u64().unwrap() > 0);
    assert!(body["databasePath"].as_str().unwrap().ends_with("test.sqlite"));
}

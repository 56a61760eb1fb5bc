//! End-to-end pipeline tests: upload, content read/write, download and
//! delete against a temp database, an in-memory object store and stub media
//! adapters.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use uuid::Uuid;

use cove_api::pipeline::{
    DeleteOutcome, UploadRequest, handle_content_read, handle_content_write, handle_delete,
    handle_download, handle_upload,
};
use cove_api::{AppState, AppStateInner, DriveError};
use cove_crypto::CipherEngine;
use cove_db::Database;
use cove_media::{AudioTags, MediaError, MediaProber, ProbeReport, TagParser};

// ── Stub media adapters ─────────────────────────────────────────────────

struct StubTags(AudioTags);

impl TagParser for StubTags {
    fn parse(&self, _bytes: &[u8], _kind: &str) -> Result<AudioTags, MediaError> {
        Ok(self.0.clone())
    }
}

struct FailingTags;

impl TagParser for FailingTags {
    fn parse(&self, _bytes: &[u8], _kind: &str) -> Result<AudioTags, MediaError> {
        Err(MediaError::Tool("stub tag parser failure".into()))
    }
}

struct StubProber;

impl MediaProber for StubProber {
    fn probe(&self, _path: &Path) -> Result<ProbeReport, MediaError> {
        Ok(ProbeReport {
            duration_secs: Some(13),
            width: Some(1920),
            height: Some(1080),
            codec: Some("h264".into()),
        })
    }

    fn thumbnail(&self, _path: &Path, _at_secs: f64) -> Result<Vec<u8>, MediaError> {
        Ok(vec![0xff, 0xd8, 0xff, 0xe0])
    }
}

struct FailingProber;

impl MediaProber for FailingProber {
    fn probe(&self, _path: &Path) -> Result<ProbeReport, MediaError> {
        Err(MediaError::Tool("stub prober failure".into()))
    }

    fn thumbnail(&self, _path: &Path, _at_secs: f64) -> Result<Vec<u8>, MediaError> {
        Err(MediaError::Tool("stub prober failure".into()))
    }
}

// ── Harness ─────────────────────────────────────────────────────────────

struct TestDrive {
    state: AppState,
    owner: Uuid,
    _dir: tempfile::TempDir,
}

fn new_drive(tags: Arc<dyn TagParser>, prober: Arc<dyn MediaProber>) -> TestDrive {
    let dir = tempfile::tempdir().unwrap();
    let staging_dir = dir.path().join("staging");
    std::fs::create_dir_all(&staging_dir).unwrap();

    let db = Database::open(&dir.path().join("cove-test.db")).unwrap();
    let owner = Uuid::new_v4();
    db.create_user(&owner.to_string(), "owner", "owner@example.com", "hash")
        .unwrap();

    let state: AppState = Arc::new(AppStateInner {
        db,
        store: cove_store::memory_operator(),
        engine: CipherEngine::from_hex(&"ab".repeat(32)).unwrap(),
        tags,
        prober,
        jwt_secret: "test-secret".into(),
        staging_dir,
    });

    TestDrive { state, owner, _dir: dir }
}

impl TestDrive {
    fn default_media() -> (Arc<dyn TagParser>, Arc<dyn MediaProber>) {
        (Arc::new(FailingTags), Arc::new(FailingProber))
    }

    fn new() -> Self {
        let (tags, prober) = Self::default_media();
        new_drive(tags, prober)
    }

    fn second_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .db
            .create_user(&id.to_string(), "joiner", &format!("{id}@example.com"), "hash")
            .unwrap();
        id
    }

    async fn upload(&self, bytes: &[u8], kind: &str, name: &str) -> cove_types::models::StoredFile {
        handle_upload(
            &self.state,
            UploadRequest {
                bytes: Bytes::copy_from_slice(bytes),
                kind: kind.into(),
                name: name.into(),
                owner_id: self.owner,
            },
        )
        .await
        .unwrap()
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.state.staging_dir.as_path())
            .unwrap()
            .next()
            .is_none()
    }
}

// ── Upload ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_upload_is_encrypted_and_reads_back() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"hello-123", "text/plain", "hello.txt").await;

    assert!(stored.encrypted);
    assert_eq!(stored.size, 9);
    let nonce = BASE64.decode(stored.nonce.as_deref().unwrap()).unwrap();
    let tag = BASE64.decode(stored.tag.as_deref().unwrap()).unwrap();
    assert_eq!(nonce.len(), 12);
    assert_eq!(tag.len(), 16);

    // The stored blob is base64 ciphertext, not the plaintext.
    let blob = drive.state.store.read(&stored.storage_key).await.unwrap().to_vec();
    assert_ne!(blob, b"hello-123");
    assert!(blob.len() as i64 > stored.size);

    let content = handle_content_read(&drive.state, stored.id, drive.owner)
        .await
        .unwrap();
    assert_eq!(content, "hello-123");

    assert!(drive.staging_is_empty());
}

#[tokio::test]
async fn binary_upload_is_never_encrypted() {
    let drive = TestDrive::new();
    let payload: Vec<u8> = (0..=255).collect();
    let stored = drive.upload(&payload, "image/png", "pic.png").await;

    assert!(!stored.encrypted);
    assert!(stored.nonce.is_none());
    assert!(stored.tag.is_none());

    // Blob matches the upload byte for byte, and download returns it as-is.
    let blob = drive.state.store.read(&stored.storage_key).await.unwrap().to_vec();
    assert_eq!(blob, payload);

    let download = handle_download(&drive.state, stored.id, drive.owner)
        .await
        .unwrap();
    assert_eq!(download.bytes, payload);
    assert_eq!(download.kind, "image/png");
}

#[tokio::test]
async fn failing_tag_parser_does_not_fail_upload() {
    let drive = new_drive(Arc::new(FailingTags), Arc::new(FailingProber));
    let stored = drive.upload(b"not really audio", "audio/mpeg", "x.mp3").await;

    let row = drive
        .state
        .db
        .get_audio_metadata(&stored.id.to_string())
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn audio_tags_are_persisted() {
    let tags = AudioTags {
        title: Some("Song A".into()),
        artist: Some("Band B".into()),
        album: None,
        cover: Some("data:image/jpeg;base64,AAAA".into()),
    };
    let drive = new_drive(Arc::new(StubTags(tags)), Arc::new(FailingProber));
    let stored = drive.upload(b"fake mp3 bytes", "audio/mpeg", "song.mp3").await;

    let row = drive
        .state
        .db
        .get_audio_metadata(&stored.id.to_string())
        .unwrap()
        .unwrap();
    assert_eq!(row.title.as_deref(), Some("Song A"));
    assert_eq!(row.artist.as_deref(), Some("Band B"));
    assert_eq!(row.cover.as_deref(), Some("data:image/jpeg;base64,AAAA"));
}

#[tokio::test]
async fn video_probe_records_metadata_after_upload() {
    let drive = new_drive(Arc::new(FailingTags), Arc::new(StubProber));
    let stored = drive.upload(b"fake mp4 bytes", "video/mp4", "clip.mp4").await;

    // The probe tail is detached; wait for it to land.
    let mut row = None;
    for _ in 0..100 {
        row = drive
            .state
            .db
            .get_video_metadata(&stored.id.to_string())
            .unwrap();
        if row.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let row = row.expect("video metadata row never appeared");

    assert_eq!(row.duration, Some(13));
    assert_eq!(row.resolution.as_deref(), Some("1920x1080"));
    assert_eq!(row.codec.as_deref(), Some("h264"));

    let thumb_key = row.thumbnail.unwrap();
    let thumb = drive.state.store.read(&thumb_key).await.unwrap().to_vec();
    assert_eq!(thumb, vec![0xff, 0xd8, 0xff, 0xe0]);
}

#[tokio::test]
async fn failing_prober_still_returns_a_valid_upload() {
    let drive = new_drive(Arc::new(FailingTags), Arc::new(FailingProber));
    let stored = drive.upload(b"fake mp4 bytes", "video/mp4", "clip.mp4").await;

    // Give the detached task a moment to fail and clean up.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let row = drive
        .state
        .db
        .get_video_metadata(&stored.id.to_string())
        .unwrap();
    assert!(row.is_none());

    // The upload itself is intact.
    let blob = drive.state.store.read(&stored.storage_key).await.unwrap().to_vec();
    assert_eq!(blob, b"fake mp4 bytes");
}

// ── Content write ───────────────────────────────────────────────────────

#[tokio::test]
async fn rewrites_rotate_nonce_and_tag_and_last_write_wins() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"first", "text/plain", "notes.txt").await;
    let first_nonce = stored.nonce.clone().unwrap();
    let first_tag = stored.tag.clone().unwrap();

    handle_content_write(&drive.state, stored.id, drive.owner, "second")
        .await
        .unwrap();
    let after_one = drive.state.db.get_file(&stored.id.to_string()).unwrap().unwrap();

    handle_content_write(&drive.state, stored.id, drive.owner, "third")
        .await
        .unwrap();
    let after_two = drive.state.db.get_file(&stored.id.to_string()).unwrap().unwrap();

    let nonces = [
        first_nonce,
        after_one.nonce.clone().unwrap(),
        after_two.nonce.clone().unwrap(),
    ];
    assert_ne!(nonces[0], nonces[1]);
    assert_ne!(nonces[1], nonces[2]);
    assert_ne!(nonces[0], nonces[2]);
    assert_ne!(first_tag, after_two.auth_tag.clone().unwrap());

    let content = handle_content_read(&drive.state, stored.id, drive.owner)
        .await
        .unwrap();
    assert_eq!(content, "third");
}

#[tokio::test]
async fn write_requires_write_grant() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"owner text", "text/plain", "notes.txt").await;
    let outsider = drive.second_user();

    let err = handle_content_write(&drive.state, stored.id, outsider, "sneaky")
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::AccessDenied));
}

// ── Read-path failure signaling ─────────────────────────────────────────

#[tokio::test]
async fn corrupted_blob_surfaces_as_decryption_failure() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"precious text", "text/plain", "notes.txt").await;

    // Flip one bit of the stored ciphertext.
    let blob = drive.state.store.read(&stored.storage_key).await.unwrap().to_vec();
    let mut raw = BASE64.decode(&blob).unwrap();
    raw[0] ^= 0x01;
    drive
        .state
        .store
        .write(&stored.storage_key, BASE64.encode(&raw).into_bytes())
        .await
        .unwrap();

    let err = handle_content_read(&drive.state, stored.id, drive.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::DecryptionFailed(_)));
}

#[tokio::test]
async fn content_read_requires_a_grant() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"private", "text/plain", "notes.txt").await;
    let outsider = drive.second_user();

    let err = handle_content_read(&drive.state, stored.id, outsider)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::AccessDenied));
}

// ── Download ────────────────────────────────────────────────────────────

#[tokio::test]
async fn download_decrypts_only_the_text_kind() {
    let drive = TestDrive::new();
    let text = drive.upload(b"dear diary", "text/plain", "diary.txt").await;

    let payload = handle_download(&drive.state, text.id, drive.owner)
        .await
        .unwrap();
    assert_eq!(payload.bytes, b"dear diary");
    assert_eq!(payload.kind, "text/plain");
    assert_eq!(payload.name, "diary.txt");
}

// ── Delete ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn owner_delete_destroys_blob_and_rows() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"goodbye", "text/plain", "bye.txt").await;

    let outcome = handle_delete(&drive.state, stored.id, drive.owner)
        .await
        .unwrap();
    assert!(matches!(outcome, DeleteOutcome::Deleted));

    assert!(drive.state.db.get_file(&stored.id.to_string()).unwrap().is_none());
    let read = drive.state.store.read(&stored.storage_key).await;
    assert!(read.is_err());
}

#[tokio::test]
async fn grantee_delete_only_revokes_access() {
    let drive = TestDrive::new();
    let stored = drive.upload(b"shared doc", "text/plain", "doc.txt").await;
    let joiner = drive.second_user();
    drive
        .state
        .db
        .insert_grant(&joiner.to_string(), &stored.id.to_string(), "write")
        .unwrap();

    let outcome = handle_delete(&drive.state, stored.id, joiner).await.unwrap();
    assert!(matches!(outcome, DeleteOutcome::Revoked));

    // File and owner grant survive; the joiner's grant is gone.
    assert!(drive.state.db.get_file(&stored.id.to_string()).unwrap().is_some());
    assert!(
        !drive
            .state
            .db
            .has_grant(&stored.id.to_string(), &joiner.to_string())
            .unwrap()
    );

    // And a user with no grant at all cannot delete anything.
    let outsider = drive.second_user();
    let err = handle_delete(&drive.state, stored.id, outsider).await.unwrap_err();
    assert!(matches!(err, DriveError::AccessDenied));
}

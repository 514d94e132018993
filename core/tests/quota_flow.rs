//! End-to-end quota flow over a real temp directory: registration, initial
//! authoritative recompute, and oldest-first eviction planning.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use foldertrim_core::{FolderEvent, RegistrationService};
use tempfile::TempDir;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn write_file(dir: &Path, name: &str, bytes: usize) {
    let mut file = File::create(dir.join(name)).unwrap();
    file.write_all(&vec![0u8; bytes]).unwrap();
}

fn gb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

async fn next_event(events: &mut tokio::sync::mpsc::Receiver<FolderEvent>) -> FolderEvent {
    timeout(RECV_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for folder event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_over_quota_registration_plans_oldest_first_eviction() {
    let dir = TempDir::new().unwrap();
    // Three 4 KiB files against a 2 KiB quota: over by 10 KiB, so all
    // three must be selected, oldest first.
    write_file(dir.path(), "a.bin", 4096);
    write_file(dir.path(), "b.bin", 4096);
    write_file(dir.path(), "c.bin", 4096);

    let (service, mut events) = RegistrationService::with_disk_walk();

    let status = service
        .register_folder(dir.path(), gb(2048))
        .await
        .unwrap();
    assert_eq!(status.index, 0);
    assert_eq!(status.quota_bytes, 2048);
    assert_eq!(status.tracked_bytes, 0);

    match next_event(&mut events).await {
        FolderEvent::Registered { folder_index, .. } => assert_eq!(folder_index, 0),
        other => panic!("expected registered, got {other:?}"),
    }

    match next_event(&mut events).await {
        FolderEvent::SizeChanged { folder_index, .. } => assert_eq!(folder_index, 0),
        other => panic!("expected size_changed, got {other:?}"),
    }

    match next_event(&mut events).await {
        FolderEvent::EvictionPlanned {
            folder_index,
            bytes_to_free,
            files,
            ..
        } => {
            assert_eq!(folder_index, 0);
            assert_eq!(bytes_to_free, 3 * 4096 - 2048);

            let names: Vec<_> = files
                .iter()
                .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, vec!["a.bin", "b.bin", "c.bin"]);
        }
        other => panic!("expected eviction_planned, got {other:?}"),
    }

    // The recompute has been applied by the time its events arrive.
    let status = service.status(dir.path()).await.unwrap();
    assert_eq!(status.tracked_bytes, 3 * 4096);
}

#[tokio::test]
async fn test_under_quota_registration_emits_no_eviction() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "small.bin", 1024);

    let (service, mut events) = RegistrationService::with_disk_walk();
    service.register_folder(dir.path(), 1.0).await.unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        FolderEvent::Registered { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        FolderEvent::SizeChanged { .. }
    ));
    assert!(
        timeout(Duration::from_millis(200), events.recv())
            .await
            .is_err(),
        "no eviction expected under quota"
    );
}

#[tokio::test]
async fn test_reregistration_keeps_tracked_size_and_emits_registered() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "data.bin", 8192);

    let (service, mut events) = RegistrationService::with_disk_walk();
    service.register_folder(dir.path(), 1.0).await.unwrap();

    // Drain registered + initial size_changed so the recompute has landed.
    assert!(matches!(
        next_event(&mut events).await,
        FolderEvent::Registered { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        FolderEvent::SizeChanged { .. }
    ));

    let status = service.register_folder(dir.path(), 2.0).await.unwrap();
    assert_eq!(status.index, 0);
    assert_eq!(status.tracked_bytes, 8192);

    match next_event(&mut events).await {
        FolderEvent::Registered {
            folder_index,
            max_size_gb,
            ..
        } => {
            assert_eq!(folder_index, 0);
            assert_eq!(max_size_gb, 2.0);
        }
        other => panic!("expected registered, got {other:?}"),
    }
}

use chrono::Duration;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use medrep_core::model::{DoctorId, PresentationId, Session, SessionId, SlideId, SlideTiming};
use medrep_core::time::fixed_now;
use storage::repository::Storage;
use storage::seed;

static NEXT_STORE: AtomicU32 = AtomicU32::new(0);

/// A unique throwaway document path per test invocation.
fn temp_store(tag: &str) -> PathBuf {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    let counter = NEXT_STORE.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "medrep-{tag}-{}-{stamp}-{counter}.json",
        std::process::id()
    ))
}

fn timings() -> Vec<SlideTiming> {
    vec![
        SlideTiming {
            slide_id: SlideId::new("slide-1-0"),
            time_spent_ms: 20_000,
        },
        SlideTiming {
            slide_id: SlideId::new("slide-1-1"),
            time_spent_ms: 15_000,
        },
    ]
}

#[tokio::test]
async fn json_store_seeds_and_survives_reopen() {
    let path = temp_store("reopen");

    {
        let storage = Storage::json_file(&path).expect("open");
        let doctors = storage.doctors.list_doctors().await.unwrap();
        assert_eq!(doctors.len(), 2);

        let session = Session::begin(
            SessionId::new("s-1"),
            DoctorId::new(seed::DOCTOR_1_ID),
            PresentationId::new(seed::PRESENTATION_1_ID),
            fixed_now(),
        );
        storage.sessions.insert_session(&session).await.unwrap();
        storage
            .sessions
            .complete_session(session.id(), fixed_now() + Duration::seconds(35), &timings())
            .await
            .unwrap();
    }

    // A fresh open reads the persisted document, not the seed.
    let reopened = Storage::json_file(&path).expect("reopen");
    let doctor = reopened
        .doctors
        .get_doctor(&DoctorId::new(seed::DOCTOR_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doctor.rollup().sessions(), 1);
    assert_eq!(doctor.rollup().avg_engagement().value(), 100);

    let session = reopened
        .sessions
        .get_session(&SessionId::new("s-1"))
        .await
        .unwrap()
        .unwrap();
    assert!(session.is_complete());

    let analytics = reopened.analytics.list_analytics().await.unwrap();
    assert_eq!(analytics.len(), 2);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn json_store_reseeds_on_malformed_document() {
    let path = temp_store("corrupt");
    std::fs::write(&path, "{ not json at all").unwrap();

    let storage = Storage::json_file(&path).expect("open despite corruption");
    let doctors = storage.doctors.list_doctors().await.unwrap();
    assert_eq!(doctors.len(), 2);
    assert!(storage.sessions.list_sessions().await.unwrap().is_empty());

    // The re-seeded document was written back out.
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("slideAnalytics"));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn json_store_failed_mutation_leaves_document_untouched() {
    let path = temp_store("atomic");
    let storage = Storage::json_file(&path).expect("open");

    let session = Session::begin(
        SessionId::new("s-1"),
        DoctorId::new(seed::DOCTOR_1_ID),
        PresentationId::new(seed::PRESENTATION_1_ID),
        fixed_now(),
    );
    storage.sessions.insert_session(&session).await.unwrap();

    // Unknown session: rejected before anything is written.
    let err = storage
        .sessions
        .complete_session(&SessionId::new("s-404"), fixed_now(), &timings())
        .await
        .unwrap_err();
    assert!(matches!(err, storage::repository::StorageError::NotFound));

    assert!(storage.analytics.list_analytics().await.unwrap().is_empty());
    let stored = storage
        .sessions
        .get_session(session.id())
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_complete());

    let _ = std::fs::remove_file(&path);
}

use chrono::Duration;
use medrep_core::model::{DoctorId, PresentationId, Session, SessionId, SlideId, SlideTiming};
use medrep_core::time::fixed_now;
use storage::repository::{Storage, StorageError};
use storage::seed;

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

fn open_session(id: &str) -> Session {
    Session::begin(
        SessionId::new(id),
        DoctorId::new(seed::DOCTOR_1_ID),
        PresentationId::new(seed::PRESENTATION_1_ID),
        fixed_now(),
    )
}

#[tokio::test]
async fn sqlite_seeds_and_completes_a_session() {
    let storage = Storage::sqlite("sqlite:file:memdb_flow?mode=memory&cache=shared")
        .await
        .expect("connect + migrate");
    seed::apply(&storage, fixed_now()).await.expect("seed");

    let doctors = storage.doctors.list_doctors().await.unwrap();
    assert_eq!(doctors.len(), 2);

    let slides = storage
        .slides
        .slides_for_presentation(&PresentationId::new(seed::PRESENTATION_1_ID))
        .await
        .unwrap();
    assert_eq!(slides.len(), 6);
    assert!(slides.windows(2).all(|w| w[0].order() < w[1].order()));

    let session = open_session("s-1");
    storage.sessions.insert_session(&session).await.unwrap();

    let ended_at = fixed_now() + Duration::seconds(35);
    let completed = storage
        .sessions
        .complete_session(session.id(), ended_at, &timings())
        .await
        .unwrap();

    let completion = completed.completion().unwrap();
    assert!((completion.total_time_secs() - 35.0).abs() < f64::EPSILON);
    assert_eq!(completion.engagement().value(), 100);

    let doctor = storage
        .doctors
        .get_doctor(&DoctorId::new(seed::DOCTOR_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doctor.rollup().sessions(), 1);
    assert_eq!(doctor.rollup().avg_engagement().value(), 100);
    assert_eq!(doctor.rollup().last_ended(), Some(ended_at));
    assert_eq!(doctor.rollup().total_time(), Duration::seconds(35));

    let presentation = storage
        .presentations
        .get_presentation(&PresentationId::new(seed::PRESENTATION_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(presentation.rollup().sessions(), 1);
    assert_eq!(presentation.rollup().last_ended(), Some(ended_at));

    let analytics = storage.analytics.list_analytics().await.unwrap();
    assert_eq!(analytics.len(), 2);
    assert_eq!(analytics[0].time_spent_ms(), 20_000);
    assert_eq!(analytics[1].time_spent_ms(), 15_000);

    let by_session = storage
        .analytics
        .analytics_for_session(session.id())
        .await
        .unwrap();
    assert_eq!(by_session.len(), 2);
}

#[tokio::test]
async fn sqlite_rejects_duplicate_and_double_ended_sessions() {
    let storage = Storage::sqlite("sqlite:file:memdb_conflicts?mode=memory&cache=shared")
        .await
        .expect("connect + migrate");
    seed::apply(&storage, fixed_now()).await.expect("seed");

    let session = open_session("s-1");
    storage.sessions.insert_session(&session).await.unwrap();
    let dup = storage.sessions.insert_session(&session).await.unwrap_err();
    assert!(matches!(dup, StorageError::Conflict));

    let ended_at = fixed_now() + Duration::seconds(10);
    storage
        .sessions
        .complete_session(session.id(), ended_at, &timings())
        .await
        .unwrap();

    let err = storage
        .sessions
        .complete_session(session.id(), ended_at + Duration::seconds(5), &timings())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // The rejected second completion wrote nothing.
    let analytics = storage.analytics.list_analytics().await.unwrap();
    assert_eq!(analytics.len(), 2);
    let doctor = storage
        .doctors
        .get_doctor(&DoctorId::new(seed::DOCTOR_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doctor.rollup().sessions(), 1);
}

#[tokio::test]
async fn sqlite_completing_unknown_session_is_not_found() {
    let storage = Storage::sqlite("sqlite:file:memdb_missing?mode=memory&cache=shared")
        .await
        .expect("connect + migrate");
    seed::apply(&storage, fixed_now()).await.expect("seed");

    let err = storage
        .sessions
        .complete_session(&SessionId::new("s-404"), fixed_now(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_seeding_twice_does_not_duplicate() {
    let storage = Storage::sqlite("sqlite:file:memdb_reseed?mode=memory&cache=shared")
        .await
        .expect("connect + migrate");
    seed::apply(&storage, fixed_now()).await.expect("seed");
    seed::apply(&storage, fixed_now()).await.expect("re-seed");

    assert_eq!(storage.doctors.list_doctors().await.unwrap().len(), 2);
    let slides = storage
        .slides
        .slides_for_presentation(&PresentationId::new(seed::PRESENTATION_2_ID))
        .await
        .unwrap();
    assert_eq!(slides.len(), 6);
}

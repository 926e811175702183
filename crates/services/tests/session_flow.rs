use chrono::Duration;
use medrep_core::Clock;
use medrep_core::model::{DoctorId, PresentationId};
use medrep_core::time::fixed_now;
use services::{AnalyticsService, SessionLoopService};
use storage::repository::Storage;
use storage::seed;

/// The canonical flow: doctor-1 x presentation-1, 20 s on slide 0, 15 s on
/// slide 1, then end. The session spans 35 s, two analytic rows land, and
/// doctor-1's session count increments by one.
#[tokio::test]
async fn full_session_flow_records_expected_analytics() {
    let storage = Storage::in_memory_seeded(fixed_now());
    let start_service = SessionLoopService::from_storage(Clock::fixed(fixed_now()), &storage);

    let mut started = start_service
        .start_session(
            &DoctorId::new(seed::DOCTOR_1_ID),
            &PresentationId::new(seed::PRESENTATION_1_ID),
        )
        .await
        .unwrap();

    // Drive the viewer with its own clock.
    let mut viewer_clock = Clock::fixed(fixed_now());
    viewer_clock.advance(Duration::seconds(20));
    started.recorder.next(viewer_clock.now()).unwrap();
    viewer_clock.advance(Duration::seconds(15));

    let end_service = SessionLoopService::from_storage(viewer_clock, &storage);
    let session = end_service.end_session(&mut started.recorder).await.unwrap();

    let completion = session.completion().expect("session ended");
    assert!((completion.total_time_secs() - 35.0).abs() < f64::EPSILON);
    assert_eq!(completion.engagement().value(), 100);

    let analytics = storage
        .analytics
        .analytics_for_session(session.id())
        .await
        .unwrap();
    assert_eq!(analytics.len(), 2);
    assert_eq!(analytics[0].slide_id().as_str(), "slide-1-0");
    assert_eq!(analytics[0].time_spent_ms(), 20_000);
    assert_eq!(analytics[1].slide_id().as_str(), "slide-1-1");
    assert_eq!(analytics[1].time_spent_ms(), 15_000);

    let doctor = storage
        .doctors
        .get_doctor(&DoctorId::new(seed::DOCTOR_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doctor.rollup().sessions(), 1);
    assert_eq!(doctor.rollup().avg_engagement().value(), 100);
    assert_eq!(doctor.rollup().last_ended(), Some(completion.ended_at()));

    let presentation = storage
        .presentations
        .get_presentation(&PresentationId::new(seed::PRESENTATION_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(presentation.rollup().sessions(), 1);

    // The analytics surface reflects the session immediately.
    let analytics_service = AnalyticsService::from_storage(&storage);
    let data = analytics_service.analytics().await.unwrap();
    assert_eq!(data.recent_sessions.len(), 1);
    assert_eq!(data.recent_sessions[0].slides, 2);
    assert_eq!(data.top_slides[0].slide.id.as_str(), "slide-1-0");
    assert_eq!(data.all_slide_analytics.len(), 2);
}

/// Paused time counts against engagement: it extends the wall clock but is
/// attributed to no slide.
#[tokio::test]
async fn paused_time_lowers_engagement() {
    let storage = Storage::in_memory_seeded(fixed_now());
    let start_service = SessionLoopService::from_storage(Clock::fixed(fixed_now()), &storage);

    let mut started = start_service
        .start_session(
            &DoctorId::new(seed::DOCTOR_1_ID),
            &PresentationId::new(seed::PRESENTATION_1_ID),
        )
        .await
        .unwrap();

    let mut viewer_clock = Clock::fixed(fixed_now());
    viewer_clock.advance(Duration::seconds(20));
    started.recorder.pause(viewer_clock.now()).unwrap();
    viewer_clock.advance(Duration::seconds(10));
    started.recorder.resume(viewer_clock.now()).unwrap();
    viewer_clock.advance(Duration::seconds(15));

    let end_service = SessionLoopService::from_storage(viewer_clock, &storage);
    let session = end_service.end_session(&mut started.recorder).await.unwrap();

    let completion = session.completion().expect("session ended");
    assert!((completion.total_time_secs() - 45.0).abs() < f64::EPSILON);
    // 35 s recorded over a 45 s span.
    assert_eq!(completion.engagement().value(), 78);
}

/// A second end on the same session is rejected and recomputes nothing.
#[tokio::test]
async fn ending_twice_is_rejected_end_to_end() {
    let storage = Storage::in_memory_seeded(fixed_now());
    let service = SessionLoopService::from_storage(Clock::fixed(fixed_now()), &storage);

    let mut started = service
        .start_session(
            &DoctorId::new(seed::DOCTOR_1_ID),
            &PresentationId::new(seed::PRESENTATION_1_ID),
        )
        .await
        .unwrap();

    service.end_session(&mut started.recorder).await.unwrap();

    let err = service.end_session(&mut started.recorder).await.unwrap_err();
    assert!(matches!(err, services::SessionError::AlreadyEnded));

    let doctor = storage
        .doctors
        .get_doctor(&DoctorId::new(seed::DOCTOR_1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doctor.rollup().sessions(), 1);
}

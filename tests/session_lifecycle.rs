//! Session state machine, device claiming, and teardown behavior.

use std::time::Duration;

use depthstream::testing::ScriptedSdk;
use depthstream::{
    Capabilities, DepthStreamError, DeviceRegistry, PixelFormat, SessionState, StreamConfig,
    StreamKind,
};

const DEVICE_ID: u32 = 7;

fn full_registry() -> DeviceRegistry<ScriptedSdk> {
    let sdk = ScriptedSdk::new().with_device(
        DEVICE_ID,
        "scripted-cam",
        Capabilities::COLOR | Capabilities::DEPTH | Capabilities::POSE,
    );
    DeviceRegistry::new(sdk)
}

fn color_depth() -> Vec<StreamConfig> {
    vec![
        StreamConfig::color(640, 480, PixelFormat::Yuyv, 30),
        StreamConfig::depth(640, 480, 30),
    ]
}

#[test]
fn resolve_out_of_range_reports_both_counts() {
    let registry = DeviceRegistry::new(ScriptedSdk::new());
    assert_eq!(registry.count().unwrap(), 0);

    let err = registry.resolve(0).unwrap_err();
    assert!(matches!(
        err,
        DepthStreamError::DeviceNotFound {
            requested: 0,
            available: 0,
        }
    ));
    let message = err.to_string();
    assert!(message.contains("index 0"), "got: {message}");
    assert!(message.contains("0 device(s)"), "got: {message}");
}

#[test]
fn resolve_returns_descriptor() {
    let registry = full_registry();
    assert_eq!(registry.count().unwrap(), 1);

    let device = registry.resolve(0).unwrap();
    assert_eq!(device.id, DEVICE_ID);
    assert_eq!(device.name, "scripted-cam");
    assert!(device.capabilities.contains(Capabilities::DEPTH));

    let err = registry.resolve(1).unwrap_err();
    assert!(matches!(
        err,
        DepthStreamError::DeviceNotFound {
            requested: 1,
            available: 1,
        }
    ));
}

#[test]
fn create_rejects_empty_config_set() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let err = registry.create_session(&device, vec![]).unwrap_err();
    assert!(matches!(err, DepthStreamError::UnsupportedStreamConfig(_)));
}

#[test]
fn create_rejects_duplicate_stream_kind() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let err = registry
        .create_session(
            &device,
            vec![
                StreamConfig::color(640, 480, PixelFormat::Yuyv, 30),
                StreamConfig::color(640, 480, PixelFormat::Rgb8, 30),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, DepthStreamError::UnsupportedStreamConfig(_)));
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn create_rejects_off_table_configs() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();

    // Unsupported resolution.
    let err = registry
        .create_session(
            &device,
            vec![StreamConfig::color(650, 480, PixelFormat::Yuyv, 30)],
        )
        .unwrap_err();
    assert!(matches!(err, DepthStreamError::UnsupportedStreamConfig(_)));

    // Unsupported rate.
    let err = registry
        .create_session(&device, vec![StreamConfig::depth(640, 480, 25)])
        .unwrap_err();
    assert!(matches!(err, DepthStreamError::UnsupportedStreamConfig(_)));

    // Format/kind mismatch.
    let err = registry
        .create_session(
            &device,
            vec![StreamConfig::color(640, 480, PixelFormat::Z16, 30)],
        )
        .unwrap_err();
    assert!(matches!(err, DepthStreamError::UnsupportedStreamConfig(_)));
}

#[test]
fn create_rejects_streams_the_device_cannot_serve() {
    let sdk = ScriptedSdk::new().with_device(3, "rgb-only", Capabilities::COLOR);
    let registry = DeviceRegistry::new(sdk);
    let device = registry.resolve(0).unwrap();

    let err = registry
        .create_session(&device, vec![StreamConfig::pose()])
        .unwrap_err();
    assert!(matches!(err, DepthStreamError::UnsupportedStreamConfig(_)));
    assert!(err.to_string().contains("pose"));
}

#[test]
fn start_brings_up_the_configured_pipeline() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let mut session = registry.create_session(&device, color_depth()).unwrap();
    assert_eq!(session.state(), SessionState::Created);

    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Started);

    let ledger = registry.sdk().ledger();
    assert_eq!(ledger.pipelines_created, 1);
    assert_eq!(ledger.starts, 1);
    assert_eq!(registry.sdk().configured_streams(), color_depth());
}

#[test]
fn start_twice_is_rejected() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let mut session = registry.create_session(&device, color_depth()).unwrap();
    session.start().unwrap();

    let err = session.start().unwrap_err();
    assert!(matches!(
        err,
        DepthStreamError::InvalidSessionState {
            expected: SessionState::Created,
            actual: SessionState::Started,
        }
    ));
}

#[test]
fn restart_after_stop_is_not_supported() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let mut session = registry.create_session(&device, color_depth()).unwrap();
    session.start().unwrap();
    session.stop();

    let err = session.start().unwrap_err();
    assert!(matches!(
        err,
        DepthStreamError::InvalidSessionState {
            actual: SessionState::Stopped,
            ..
        }
    ));
}

#[test]
fn stop_is_idempotent() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let mut session = registry.create_session(&device, color_depth()).unwrap();
    session.start().unwrap();

    session.stop();
    session.stop();
    session.stop();

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(registry.sdk().ledger().stops, 1);
}

#[test]
fn dropping_a_started_session_stops_the_pipeline() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    {
        let mut session = registry.create_session(&device, color_depth()).unwrap();
        session.start().unwrap();
    }
    assert_eq!(registry.sdk().ledger().stops, 1);
}

#[test]
fn stop_failure_still_releases_the_device() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();

    let mut session = registry.create_session(&device, color_depth()).unwrap();
    session.start().unwrap();
    registry.sdk().fail_next_stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);

    // The claim must be gone despite the failed SDK stop.
    let mut next = registry.create_session(&device, color_depth()).unwrap();
    next.start().unwrap();
}

#[test]
fn start_failure_releases_the_claim() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();

    let mut session = registry.create_session(&device, color_depth()).unwrap();
    registry.sdk().fail_next_start();
    let err = session.start().unwrap_err();
    assert!(matches!(err, DepthStreamError::DeviceIo { op: "start", .. }));
    assert_eq!(session.state(), SessionState::Created);

    let mut next = registry.create_session(&device, color_depth()).unwrap();
    next.start().unwrap();
}

#[test]
fn racing_starts_produce_one_winner_and_one_busy() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();

    let mut first = registry.create_session(&device, color_depth()).unwrap();
    let mut second = registry.create_session(&device, color_depth()).unwrap();

    let (a, b) = std::thread::scope(|scope| {
        let a = scope.spawn(|| first.start());
        let b = scope.spawn(|| second.start());
        (a.join().expect("thread"), b.join().expect("thread"))
    });

    let busy = |r: &depthstream::Result<()>| {
        matches!(
            r,
            Err(DepthStreamError::DeviceBusy {
                device_id: DEVICE_ID
            })
        )
    };
    assert!(
        (a.is_ok() && busy(&b)) || (b.is_ok() && busy(&a)),
        "expected one winner and one busy, got {a:?} / {b:?}"
    );
    assert_eq!(registry.sdk().ledger().starts, 1);
}

#[test]
fn second_device_is_not_blocked_by_the_first() {
    let sdk = ScriptedSdk::new()
        .with_device(1, "cam-a", Capabilities::COLOR | Capabilities::DEPTH)
        .with_device(2, "cam-b", Capabilities::COLOR | Capabilities::DEPTH);
    let registry = DeviceRegistry::new(sdk);

    let first = registry.resolve(0).unwrap();
    let second = registry.resolve(1).unwrap();

    let mut a = registry.create_session(&first, color_depth()).unwrap();
    let mut b = registry.create_session(&second, color_depth()).unwrap();
    a.start().unwrap();
    b.start().unwrap();
}

#[test]
fn extrinsics_query_requires_a_started_session() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let mut session = registry.create_session(&device, color_depth()).unwrap();

    let err = session
        .extrinsics(StreamKind::Color, StreamKind::Depth)
        .unwrap_err();
    assert!(matches!(
        err,
        DepthStreamError::InvalidSessionState {
            expected: SessionState::Started,
            actual: SessionState::Created,
        }
    ));

    session.start().unwrap();
    let extrinsics = session
        .extrinsics(StreamKind::Color, StreamKind::Depth)
        .unwrap();
    assert_eq!(extrinsics, depthstream::Extrinsics::identity());

    let err = session
        .extrinsics(StreamKind::Color, StreamKind::Pose)
        .unwrap_err();
    assert!(matches!(
        err,
        DepthStreamError::StreamNotEnabled(StreamKind::Pose)
    ));
}

#[test]
fn session_survives_many_start_stop_cycles_across_sessions() {
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();

    for _ in 0..50 {
        let mut session = registry.create_session(&device, color_depth()).unwrap();
        session.start().unwrap();
        session.stop();
    }
    let ledger = registry.sdk().ledger();
    assert_eq!(ledger.starts, 50);
    assert_eq!(ledger.stops, 50);
}

#[test]
fn advance_timeout_is_plumbed_through() {
    // A session with no scripted data times out rather than hanging.
    let registry = full_registry();
    let device = registry.resolve(0).unwrap();
    let mut session = registry.create_session(&device, color_depth()).unwrap();
    session.start().unwrap();

    let mut cursor = depthstream::AcquisitionCursor::begin(&session).unwrap();
    let err = cursor.advance(Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, DepthStreamError::AcquisitionTimeout));
}

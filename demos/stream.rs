//! Stream color/depth/pose bundles from a scripted device to stdout.
//!
//! Usage: cargo run --example stream

use std::time::Duration;

use depthstream::testing::{FrameScript, ScriptedSdk};
use depthstream::{
    AcquisitionCursor, Capabilities, DepthStreamError, DeviceRegistry, PixelFormat, PoseSnapshot,
    StreamConfig, StreamKind,
};

/// Script ~3 seconds of 30 Hz capture, with an occasional two-frame
/// burst the way a real pipeline delivers them under load.
fn script_capture(sdk: &ScriptedSdk) {
    let mut number = 1u64;
    while number <= 90 {
        let burst = if number % 30 == 0 { 2 } else { 1 };
        let mut frames = Vec::new();
        for _ in 0..burst {
            let ts = number as f64 * 33.3;
            frames.push(FrameScript::video(
                StreamKind::Color,
                number,
                ts,
                640,
                480,
                PixelFormat::Yuyv,
            ));
            frames.push(FrameScript::depth(number, ts, 640, 480, 1200 + number as u16));
            frames.push(FrameScript::pose(
                number,
                ts,
                PoseSnapshot {
                    translation: [number as f32 * 0.01, 0.0, 0.0],
                    tracker_confidence: 3,
                    ..PoseSnapshot::default()
                },
            ));
            number += 1;
        }
        sdk.push_batch(frames);
    }
}

fn main() {
    env_logger::init();

    let sdk = ScriptedSdk::new()
        .with_device(
            0,
            "D435i (scripted)",
            Capabilities::COLOR | Capabilities::DEPTH | Capabilities::POSE,
        )
        .with_depth_units(0.001);
    script_capture(&sdk);
    let registry = DeviceRegistry::new(sdk);

    let device = match registry.resolve(0) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to resolve device: {}", e);
            std::process::exit(1);
        }
    };

    println!("Device:   {} (id {})", device.name, device.id);
    println!("Caps:     {:?}", device.capabilities);
    println!();

    let mut session = match registry.create_session(
        &device,
        vec![
            StreamConfig::color(640, 480, PixelFormat::Yuyv, 30),
            StreamConfig::depth(640, 480, 30),
            StreamConfig::pose(),
        ],
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to create session: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = session.start() {
        eprintln!("Failed to start session: {}", e);
        std::process::exit(1);
    }

    let mut cursor = match AcquisitionCursor::begin(&session) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to open cursor: {}", e);
            std::process::exit(1);
        }
    };

    println!("Streaming bundles until the script runs dry...");

    let mut count: u64 = 0;
    loop {
        match cursor.advance(Duration::from_millis(100)) {
            Ok(bundle) => {
                count += 1;

                // Print every ~10th bundle to keep the output readable.
                if count % 10 == 1 {
                    let color = bundle.view(StreamKind::Color);
                    let depth_m = bundle.view(StreamKind::Depth).ok().and_then(|v| {
                        let raw = v.sample_u16(v.rows() / 2, v.cols() / 2)?;
                        let units = bundle.depth_units().ok()?;
                        Some(raw as f32 * units)
                    });
                    let pose = bundle.pose();
                    println!(
                        "frame={:<4} ts={:<8.1} color_shape={:?} center_depth={:?} pos={:?}",
                        bundle.frame_number(),
                        bundle.timestamp(),
                        color.map(|v| v.shape()).ok(),
                        depth_m,
                        pose.map(|p| p.translation).ok(),
                    );
                }
            }
            Err(DepthStreamError::AcquisitionTimeout) => {
                println!("Script exhausted after {} bundle(s)", count);
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    drop(cursor);
    session.stop();
    println!(
        "Backend ledger balanced: {}",
        registry.sdk().balanced()
    );
}

//! # depthstream - synchronized frame acquisition for depth cameras
//!
//! Streams time-aligned color, depth, and 6-DoF pose frames from a
//! depth-sensing camera. Provides:
//! - Device enumeration and index-based selection
//! - Session lifecycle over one pipeline per device, stop-on-drop
//! - A blocking acquisition cursor that splits multi-frame batches into
//!   ordered bundles
//! - Zero-copy typed views (shape, strides, format) over frame pixels
//! - Exactly-once release of every SDK frame handle a bundle owns
//!
//! The hardware backend is abstracted behind the [`DeviceSdk`] trait;
//! [`testing::ScriptedSdk`] is a deterministic implementation for tests
//! and demos.
//!
//! ## Quick Start
//! ```no_run
//! use depthstream::{AcquisitionCursor, DeviceRegistry, PixelFormat, StreamConfig, StreamKind};
//! use std::time::Duration;
//!
//! fn run(sdk: impl depthstream::DeviceSdk) -> depthstream::Result<()> {
//!     let registry = DeviceRegistry::new(sdk);
//!     let device = registry.resolve(0)?;
//!     let mut session = registry.create_session(
//!         &device,
//!         vec![
//!             StreamConfig::color(640, 480, PixelFormat::Rgb8, 30),
//!             StreamConfig::depth(640, 480, 30),
//!         ],
//!     )?;
//!     session.start()?;
//!
//!     let mut cursor = AcquisitionCursor::begin(&session)?;
//!     for _ in 0..100 {
//!         let bundle = cursor.advance(Duration::from_secs(1))?;
//!         let color = bundle.view(StreamKind::Color)?;
//!         println!("frame {}: shape {:?}", bundle.frame_number(), color.shape());
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;
pub mod sdk;
pub mod device;
pub mod session;
pub mod cursor;
pub mod frame;
pub mod stream;
pub mod testing;

pub use cursor::AcquisitionCursor;
pub use device::DeviceRegistry;
pub use error::DepthStreamError;
pub use frame::{FrameBundle, TypedFrameView};
pub use sdk::{DeviceSdk, SdkDeviceInfo, SdkError};
pub use session::{Session, SessionState};
pub use stream::BundleStream;
pub use types::*;

/// Result type alias for depthstream operations.
pub type Result<T> = std::result::Result<T, DepthStreamError>;

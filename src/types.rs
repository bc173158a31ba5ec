use std::fmt;

/// One independently configured sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Color,
    Depth,
    Pose,
}

impl StreamKind {
    /// The capability bit a device must advertise to serve this stream.
    pub fn required_capability(self) -> Capabilities {
        match self {
            StreamKind::Color => Capabilities::COLOR,
            StreamKind::Depth => Capabilities::DEPTH,
            StreamKind::Pose => Capabilities::POSE,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Color => write!(f, "color"),
            StreamKind::Depth => write!(f, "depth"),
            StreamKind::Pose => write!(f, "pose"),
        }
    }
}

/// Pixel layout of a stream.
///
/// Channel and byte counts live here so view construction never
/// hardcodes them per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved luma/chroma, 2 bytes per pixel, viewed as (rows, cols, 2) u8.
    Yuyv,
    /// Packed RGB, 3 bytes per pixel, viewed as (rows, cols, 3) u8.
    Rgb8,
    /// 16-bit linear depth, 1 channel of 2-byte samples; meters = raw * units.
    Z16,
    /// Fixed-size 6-DoF pose struct stream; carries no pixel data.
    SixDof,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Yuyv => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Z16 => 2,
            PixelFormat::SixDof => 0,
        }
    }

    /// Channel count of the interleaved view (innermost shape axis).
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Yuyv => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Z16 => 1,
            PixelFormat::SixDof => 0,
        }
    }

    /// Whether this format is valid for the given stream kind.
    pub fn supports(self, kind: StreamKind) -> bool {
        matches!(
            (kind, self),
            (StreamKind::Color, PixelFormat::Yuyv)
                | (StreamKind::Color, PixelFormat::Rgb8)
                | (StreamKind::Depth, PixelFormat::Z16)
                | (StreamKind::Pose, PixelFormat::SixDof)
        )
    }
}

bitflags::bitflags! {
    /// Capability bitmap reported by an attached device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const POSE  = 1 << 2;
        const IMU   = 1 << 3;
    }
}

/// Resolutions accepted for color and depth streams.
const VIDEO_RESOLUTIONS: &[(u32, u32)] = &[(424, 240), (640, 480), (848, 480), (1280, 720)];

/// Frame rates accepted for color and depth streams.
const VIDEO_FPS: &[u32] = &[15, 30, 60];

/// Pose streams run at a fixed rate with no pixel geometry.
const POSE_FPS: u32 = 200;

/// Declares one requested stream: kind, geometry, pixel layout, rate.
///
/// Fixed at session creation and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub kind: StreamKind,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fps: u32,
}

impl StreamConfig {
    pub fn color(width: u32, height: u32, format: PixelFormat, fps: u32) -> Self {
        StreamConfig {
            kind: StreamKind::Color,
            width,
            height,
            format,
            fps,
        }
    }

    pub fn depth(width: u32, height: u32, fps: u32) -> Self {
        StreamConfig {
            kind: StreamKind::Depth,
            width,
            height,
            format: PixelFormat::Z16,
            fps,
        }
    }

    pub fn pose() -> Self {
        StreamConfig {
            kind: StreamKind::Pose,
            width: 0,
            height: 0,
            format: PixelFormat::SixDof,
            fps: POSE_FPS,
        }
    }

    /// Check this config against the fixed support table.
    ///
    /// Returns a human-readable reason on rejection; the session wraps
    /// it in `UnsupportedStreamConfig`.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.format.supports(self.kind) {
            return Err(format!(
                "{:?} is not a valid format for the {} stream",
                self.format, self.kind
            ));
        }
        match self.kind {
            StreamKind::Color | StreamKind::Depth => {
                if !VIDEO_RESOLUTIONS.contains(&(self.width, self.height)) {
                    return Err(format!(
                        "{}x{} is not a supported {} resolution",
                        self.width, self.height, self.kind
                    ));
                }
                if !VIDEO_FPS.contains(&self.fps) {
                    return Err(format!(
                        "{} fps is not a supported {} rate",
                        self.fps, self.kind
                    ));
                }
            }
            StreamKind::Pose => {
                if self.width != 0 || self.height != 0 {
                    return Err("pose streams carry no pixel geometry".into());
                }
                if self.fps != POSE_FPS {
                    return Err(format!("pose streams run at {} fps only", POSE_FPS));
                }
            }
        }
        Ok(())
    }
}

/// Immutable snapshot of an attached device from enumeration.
///
/// Does not own or claim the physical device.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub id: u32,
    pub name: String,
    pub capabilities: Capabilities,
}

/// 6-DoF pose copied out of a pose sub-frame.
///
/// A plain value with its own lifetime, usable after the bundle it came
/// from is gone.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    /// Orientation quaternion [x, y, z, w].
    pub rotation: [f32; 4],
    /// Translation in meters [x, y, z].
    pub translation: [f32; 3],
    /// Linear velocity in m/s.
    pub velocity: [f32; 3],
    /// Linear acceleration in m/s^2.
    pub acceleration: [f32; 3],
    /// Angular velocity in rad/s.
    pub angular_velocity: [f32; 3],
    /// Angular acceleration in rad/s^2.
    pub angular_acceleration: [f32; 3],
    /// Relocalization map confidence, 0 (failed) to 3 (high).
    pub mapper_confidence: u32,
    /// Pose tracking confidence, 0 (failed) to 3 (high).
    pub tracker_confidence: u32,
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        PoseSnapshot {
            rotation: [0.0, 0.0, 0.0, 1.0],
            translation: [0.0; 3],
            velocity: [0.0; 3],
            acceleration: [0.0; 3],
            angular_velocity: [0.0; 3],
            angular_acceleration: [0.0; 3],
            mapper_confidence: 0,
            tracker_confidence: 0,
        }
    }
}

/// Rigid transform between two sensors on the same device.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    /// 3x3 row-major rotation matrix.
    pub rotation: [[f32; 3]; 3],
    /// Translation in meters [x, y, z].
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub fn identity() -> Self {
        Extrinsics {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_geometry() {
        assert_eq!(PixelFormat::Yuyv.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Yuyv.channels(), 2);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgb8.channels(), 3);
        assert_eq!(PixelFormat::Z16.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Z16.channels(), 1);
    }

    #[test]
    fn test_format_kind_pairing() {
        assert!(PixelFormat::Yuyv.supports(StreamKind::Color));
        assert!(PixelFormat::Rgb8.supports(StreamKind::Color));
        assert!(PixelFormat::Z16.supports(StreamKind::Depth));
        assert!(PixelFormat::SixDof.supports(StreamKind::Pose));
        assert!(!PixelFormat::Z16.supports(StreamKind::Color));
        assert!(!PixelFormat::Rgb8.supports(StreamKind::Depth));
        assert!(!PixelFormat::SixDof.supports(StreamKind::Color));
    }

    #[test]
    fn test_config_validation() {
        assert!(StreamConfig::color(640, 480, PixelFormat::Yuyv, 30)
            .validate()
            .is_ok());
        assert!(StreamConfig::depth(848, 480, 60).validate().is_ok());
        assert!(StreamConfig::pose().validate().is_ok());

        // Off-table resolution and rate.
        assert!(StreamConfig::color(641, 480, PixelFormat::Yuyv, 30)
            .validate()
            .is_err());
        assert!(StreamConfig::depth(640, 480, 25).validate().is_err());

        // Format/kind mismatch.
        assert!(StreamConfig::color(640, 480, PixelFormat::Z16, 30)
            .validate()
            .is_err());
    }

    #[test]
    fn test_required_capability() {
        assert_eq!(StreamKind::Pose.required_capability(), Capabilities::POSE);
        assert!(Capabilities::all().contains(Capabilities::COLOR | Capabilities::DEPTH));
    }
}

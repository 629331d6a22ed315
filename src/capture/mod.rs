// # Capture Module
//
// Camera-side components: the permission gate, the capture controller with its
// shutter/busy state, and the file-backed camera used by the CLI.

pub mod camera;
pub mod controller;
pub mod file_camera;
pub mod permission;

pub use camera::{CameraFacing, CaptureArtifact, CaptureDevice};
pub use controller::{AnalyzingFlag, AnalyzingGuard, CaptureController};
pub use file_camera::{FileCamera, FileSourceProbe};
pub use permission::{MediaDevice, MediaStream, PermissionGate, PermissionProbe, PermissionState, StreamProbe};

//! Error taxonomy for the gesture engine.
//!
//! Most hardware-level anomalies (a driver sending two `MT_DOWN` events for
//! the same slot, a key count running away) are not modelled as `Result`
//! failures: the pipeline never unwinds past a `SYN_REPORT` boundary, so
//! those are logged via [`tracing`] and the offending event is dropped.
//! Only conditions that make a *device* unusable are surfaced as errors.

use std::io;
use std::path::PathBuf;

/// Errors that can occur while adding, opening, or reading from a device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device reports a capability set the engine has no dispatch for
    /// (e.g. a joystick button alongside pointer axes).
    #[error("device {0:?} has an unsupported capability combination")]
    Unsupported(PathBuf),

    /// `open_restricted`, `fstat`, or a syspath sanity check failed.
    #[error("failed to open device {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The embedder ran out of memory while allocating per-device state.
    #[error("out of memory while initializing device {0:?}")]
    OutOfMemory(PathBuf),

    /// The fd backing a device became permanently unreadable; the device
    /// stays registered so a later resume can replace the fd.
    #[error("fatal read error on device {path:?}: {source}")]
    FatalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Non-fatal anomalies that are logged and then the pipeline continues.
///
/// These never reach the embedder as `Result::Err` — they are reported
/// through the `tracing` subscriber the embedder has installed, exactly as
/// libinput's `log_bug_kernel`/`log_bug_libinput` split distinguishes a
/// kernel driver bug from an engine-internal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A kernel driver violated the evdev protocol (e.g. duplicate
    /// `ABS_MT_TRACKING_ID` assignment for an already-active slot).
    KernelBug,
    /// An invariant internal to the engine was violated (e.g. a key release
    /// count would have gone negative, or a motion event arrived with no
    /// fingers down).
    InternalBug,
}

impl InvariantViolation {
    /// Emit this violation through `tracing`, with `context` describing
    /// what went wrong.
    pub fn log(self, context: &str) {
        match self {
            InvariantViolation::KernelBug => {
                tracing::warn!(target: "evdev_gestures::bug_kernel", "{context}")
            }
            InvariantViolation::InternalBug => {
                tracing::warn!(target: "evdev_gestures::bug_internal", "{context}")
            }
        }
    }
}

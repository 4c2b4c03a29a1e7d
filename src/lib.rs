//! Input-event normalization and gesture-detection engine for kernel
//! pointing devices.
//!
//! Consumes decoded evdev-style records from an external event source
//! (spec §6) and turns them into semantic pointer/keyboard/touch events,
//! deriving tap-to-click, scroll, and calibration behavior along the way.
//! The engine owns no fds and spawns no threads: it is driven entirely by
//! the embedder feeding it records and timer expiries (spec §5).
//!
//! Module map:
//! - [`device`] — per-device state: key bitmaps, multitouch slots, pending
//!   event accumulator.
//! - [`event`] — raw event records, well-known codes, and the semantic
//!   events emitted to [`event::EventSink`].
//! - [`pipeline`] — the per-device ingest/flush/SYN_DROPPED state machine.
//! - [`tap`] — the 15-state tap-to-click FSM.
//! - [`scroll`] — the scroll coordinator (axis wheel, button-held scroll).
//! - [`dispatch`] — fallback vs. touchpad dispatch selection.
//! - [`seat`] — cross-device touch-slot allocation.
//! - [`matrix`] — affine calibration matrices.
//! - [`filter`] — the pointer-acceleration filter contract.
//! - [`config`] — per-device configuration surface.
//! - [`timer`] — the re-entrancy-safe timer wheel.
//! - [`ratelimit`] — the `SYN_DROPPED` warning rate limiter.
//! - [`source`] — calloop/session collaborator shims.
//! - [`error`] — the device and invariant-violation error taxonomy.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod filter;
pub mod led;
pub mod matrix;
pub mod pipeline;
pub mod ratelimit;
pub mod scroll;
pub mod seat;
pub mod source;
pub mod tap;
pub mod timer;

pub use device::Device;
pub use event::{EventSink, RawEvent, SemanticEvent};
pub use seat::Seat;

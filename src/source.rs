//! External-collaborator shims (spec §6): the engine never opens a device
//! node or registers itself with an event loop directly. An embedder
//! supplies a [`Session`] (mirroring the teacher's `backend::session::Session`)
//! and, for each opened device fd, the engine hands back a [`DeviceSource`]
//! the embedder registers with its own `calloop` loop — analogous to the
//! teacher's `LibinputInputBackend`, but registering per-device rather than
//! a single aggregate libinput context fd, since spec §5 exposes "one fd per
//! device plus one per timer".

use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;

use calloop::{EventSource, Interest, Mode, Poll, PostAction, Readiness, Token, TokenFactory};

use crate::error::DeviceError;
use crate::event::DeviceId;

/// Device-access collaborator (spec §6: `open_restricted`/`close_restricted`).
/// Mirrors the teacher's `backend::session::Session` trait, narrowed to the
/// two operations the engine actually needs.
pub trait Session {
    type Error: std::fmt::Debug;

    fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, Self::Error>;
    fn close_restricted(&mut self, fd: OwnedFd);
}

/// A `Session` that opens paths directly, for embedders running with enough
/// privilege to read `/dev/input/event*` themselves (no logind/seatd
/// handoff). Mirrors the teacher's `direct` session backend, minus VT
/// switching, which is out of scope here.
#[derive(Debug, Default)]
pub struct DirectSession;

impl Session for DirectSession {
    type Error = std::io::Error;

    fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, Self::Error> {
        use rustix::fs::{Mode as RustixMode, OFlags};
        let oflags = OFlags::from_bits_truncate(flags as u32);
        rustix::fs::open(path, oflags, RustixMode::empty())
            .map(Into::into)
            .map_err(Into::into)
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        drop(fd);
    }
}

/// Opens `path` through `session`, translating failures into the
/// `DeviceError` taxonomy (spec §7: `DeviceOpenError`).
pub fn open_device<S: Session>(session: &mut S, path: &Path, flags: i32) -> Result<OwnedFd, DeviceError>
where
    S::Error: Into<std::io::Error>,
{
    session.open_restricted(path, flags).map_err(|err| DeviceError::Open {
        path: path.to_path_buf(),
        source: err.into(),
    })
}

/// A calloop source wrapping one device's open fd. `process_events` yields
/// the owning [`DeviceId`] on readiness; the embedder is expected to drain
/// the fd (decoding kernel records is out of scope, per spec §6's "consumer
/// of raw events" framing) and feed the results to
/// [`crate::pipeline::ingest`] or [`crate::dispatch::DeviceDispatch::ingest`].
///
/// Grounded on `LibinputInputBackend`'s `EventSource` implementation, with
/// the event payload narrowed from a full libinput context drain to "this
/// one fd is readable", since this engine does not own fd decoding.
pub struct DeviceSource {
    fd: OwnedFd,
    device: DeviceId,
    token: Option<Token>,
}

impl DeviceSource {
    pub fn new(fd: OwnedFd, device: DeviceId) -> Self {
        DeviceSource { fd, device, token: None }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }
}

impl AsRawFd for DeviceSource {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl EventSource for DeviceSource {
    type Event = DeviceId;
    type Metadata = ();
    type Ret = ();
    type Error = std::io::Error;

    fn process_events<F>(&mut self, _readiness: Readiness, token: Token, mut callback: F) -> std::io::Result<PostAction>
    where
        F: FnMut(Self::Event, &mut ()) -> Self::Ret,
    {
        if Some(token) == self.token {
            callback(self.device, &mut ());
        }
        Ok(PostAction::Continue)
    }

    fn register(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        self.token = Some(factory.token());
        poll.register(self.as_raw_fd(), Interest::READ, Mode::Level, self.token.unwrap())
    }

    fn reregister(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        self.token = Some(factory.token());
        poll.reregister(self.as_raw_fd(), Interest::READ, Mode::Level, self.token.unwrap())
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        self.token = None;
        poll.unregister(self.as_raw_fd())
    }
}

/// Convert a [`crate::timer::TimerWheel`]'s next deadline into the duration
/// `calloop::timer::Timer` expects, relative to `now_ms`. Returns `None` if
/// nothing is armed, or zero-duration if the deadline already passed
/// (calloop fires those on the next iteration of the loop).
pub fn timer_duration(now_ms: u64, deadline_ms: u64) -> std::time::Duration {
    std::time::Duration::from_millis(deadline_ms.saturating_sub(now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_duration_clamps_to_zero_for_past_deadlines() {
        assert_eq!(timer_duration(100, 50), std::time::Duration::from_millis(0));
        assert_eq!(timer_duration(50, 100), std::time::Duration::from_millis(50));
    }
}

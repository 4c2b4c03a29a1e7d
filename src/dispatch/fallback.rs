//! Generic dispatch for mice, keyboards, and touchscreens: the shared
//! pipeline with no extra gesture logic layered on top (spec §4.6).

use crate::device::Device;
use crate::event::{EventSink, RawEvent};
use crate::pipeline;
use crate::seat::Seat;

#[derive(Debug, Default)]
pub struct FallbackDispatch;

impl FallbackDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
        pipeline::ingest(device, seat, event, sink);
    }
}

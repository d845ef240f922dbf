//! The two MIDI forwarding paths: device→host filtering (§4.4) and the
//! host→device pacing thread's batch-building logic (§4.5). Both are pure
//! functions/state machines over the [`IoBuffers`](crate::io_buffers)
//! rings, so they can be driven by a mock ring in tests without a real
//! device or pacing thread.

use std::time::Duration;

use ob_midi::{MIDI_EVENT_RECORD_SIZE, MIDI_EVENT_SIZE, MidiEvent};
use ob_usb::MIDI_MAX_TRANSFER;

use crate::io_buffers::ReadRing;

/// Average wait time for a 32-sample batch at the nominal sample rate —
/// the pacing thread's idle poll interval when no events are pending.
pub fn smallest_sleep(nominal_sample_rate_hz: f64) -> Duration {
    let sample_period = 1.0 / nominal_sample_rate_hz;
    Duration::from_secs_f64(sample_period * 32.0 / 2.0)
}

/// The result of filtering one MIDI-in transfer's raw bytes.
pub struct FilteredMidi {
    pub forwarded: Vec<MidiEvent>,
    pub dropped_reserved: usize,
}

/// Walks `buf[..actual_length]` in 4-byte strides, keeping only events
/// whose Cable-Number/Code-Index byte is `0x08..=0x0F`, stamping each
/// survivor with `time`.
pub fn filter_o2p_midi(buf: &[u8], actual_length: usize, time: f64) -> FilteredMidi {
    let mut forwarded = Vec::new();
    let mut dropped_reserved = 0;

    let mut offset = 0;
    while offset + MIDI_EVENT_SIZE <= actual_length {
        let mut bytes = [0u8; MIDI_EVENT_SIZE];
        bytes.copy_from_slice(&buf[offset..offset + MIDI_EVENT_SIZE]);
        let event = MidiEvent::new(bytes, time);

        if event.is_forwardable() {
            forwarded.push(event);
        } else {
            dropped_reserved += 1;
        }

        offset += MIDI_EVENT_SIZE;
    }

    FilteredMidi { forwarded, dropped_reserved }
}

/// Outcome of one pacing-thread cycle: the 512-byte buffer to submit (if
/// any events were batched) and how long to sleep before the next cycle.
pub struct PacingOutcome {
    pub batch: Option<([u8; MIDI_MAX_TRANSFER], usize)>,
    pub sleep: Duration,
}

/// Drives the p2o MIDI ring, batching events that share a host timestamp
/// into one outgoing transfer and holding back events from a later batch
/// for the next cycle.
pub struct MidiPacer {
    pending: Option<MidiEvent>,
    last_time: f64,
    idle_sleep: Duration,
}

impl MidiPacer {
    pub fn new(nominal_sample_rate_hz: f64) -> Self {
        Self { pending: None, last_time: 0.0, idle_sleep: smallest_sleep(nominal_sample_rate_hz) }
    }

    /// Builds the next outgoing batch from `ring`. Always returns a sleep
    /// duration, even when no batch was built (the ring was empty) — the
    /// pacing thread uses this to idle rather than busy-poll.
    pub fn next_outcome(&mut self, ring: &dyn ReadRing) -> PacingOutcome {
        let mut buf = [0u8; MIDI_MAX_TRANSFER];
        let mut pos = 0usize;
        let mut diff: Option<f64> = None;

        loop {
            if pos + MIDI_EVENT_SIZE > MIDI_MAX_TRANSFER {
                break;
            }

            if self.pending.is_none() {
                if ring.read_space() < MIDI_EVENT_RECORD_SIZE {
                    break;
                }
                let mut record = [0u8; MIDI_EVENT_RECORD_SIZE];
                let read = ring.read(Some(&mut record), MIDI_EVENT_RECORD_SIZE);
                debug_assert_eq!(read, MIDI_EVENT_RECORD_SIZE);
                self.pending = Some(MidiEvent::from_record(&record));
            }

            let event = self.pending.expect("just populated above");

            // `last_time` is the timestamp of the batch *currently being
            // assembled*, not some absolute origin — so the first event
            // pulled into an empty batch always starts that batch, whatever
            // its timestamp, rather than being compared against a stale
            // value left over from (or never set since) the previous one.
            if pos == 0 {
                self.last_time = event.time;
            } else if event.time > self.last_time {
                diff = Some(event.time - self.last_time);
                self.last_time = event.time;
                break;
            }

            buf[pos..pos + MIDI_EVENT_SIZE].copy_from_slice(&event.bytes);
            pos += MIDI_EVENT_SIZE;
            self.pending = None;
        }

        let sleep = match diff {
            Some(d) if d > 0.0 => Duration::try_from_secs_f64(d).unwrap_or(self.idle_sleep),
            _ => self.idle_sleep,
        };

        PacingOutcome { batch: if pos > 0 { Some((buf, pos)) } else { None }, sleep }
    }
}

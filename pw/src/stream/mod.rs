//! Streaming transport: framed events over one generation exchange
//!
//! A single exchange carries one generation as an ordered sequence of
//! framed events (content deltas, one sources list, then a terminal done
//! or error). Delivery inside the process uses a bounded channel for
//! backpressure; the byte framing is newline-delimited JSON, decoded
//! incrementally by [`FrameDecoder`].

mod codec;
mod event;

pub use codec::{FrameDecoder, encode_frame};
pub use event::{GenerationOutcome, StreamEvent};

/// Bounded event-channel capacity per exchange
///
/// A slow consumer applies backpressure to the producer instead of letting
/// the buffer grow without limit.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

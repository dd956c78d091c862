//! The remote-speaker registry.
//!
//! Sole owner of every `RemoteSpeaker` entry, protected by one mutex
//! held for the duration of an entire mix pass (microseconds) or a
//! single insert-and-push. There is deliberately no per-entry locking:
//! one mutex covers the whole map.

use crate::audio_codec::FrameDecoder;
use crate::error::FrameError;
use crate::frame::{Frame, Id};
use crate::jitter::JitterQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

pub struct RemoteSpeaker {
    pub id: Id,
    pub jitter: JitterQueue<Frame>,
    pub decoder: Box<dyn FrameDecoder>,
    pub last_heard: Instant,
}

/// Whether a speaker produced a packet on this mix tick. Drives both
/// `last_heard` refresh and stale eviction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickOutcome {
    Heard,
    Silent,
}

type DecoderFactory = Box<dyn Fn() -> Result<Box<dyn FrameDecoder>, FrameError> + Send + Sync>;

pub struct Registry {
    speakers: Mutex<HashMap<Id, RemoteSpeaker>>,
    jitter_depth: usize,
    stale_timeout: std::time::Duration,
    decoder_factory: DecoderFactory,
}

impl Registry {
    pub fn new(
        jitter_depth: usize,
        stale_timeout: std::time::Duration,
        decoder_factory: impl Fn() -> Result<Box<dyn FrameDecoder>, FrameError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            speakers: Mutex::new(HashMap::new()),
            jitter_depth,
            stale_timeout,
            decoder_factory: Box::new(decoder_factory),
        }
    }

    /// Pushes `frame` onto `id`'s jitter queue, creating the entry (a
    /// fresh decoder, an empty jitter queue, `last_heard := now`) if
    /// this is the first time `id` has been seen.
    pub fn push(&self, id: Id, frame: Frame, now: Instant) -> Result<(), FrameError> {
        let mut speakers = self.speakers.lock();
        if !speakers.contains_key(&id) {
            let decoder = (self.decoder_factory)()?;
            speakers.insert(
                id,
                RemoteSpeaker {
                    id,
                    jitter: JitterQueue::new(self.jitter_depth),
                    decoder,
                    last_heard: now,
                },
            );
        }
        speakers.get(&id).unwrap().jitter.push(frame);
        Ok(())
    }

    /// Runs `f` over every currently-registered speaker, refreshing
    /// `last_heard` for any speaker `f` reports as `Heard` this tick,
    /// and evicting any speaker that was `Silent` and has been quiet
    /// for longer than `stale_timeout`.
    pub fn for_each_speaker_mut(&self, now: Instant, mut f: impl FnMut(&mut RemoteSpeaker) -> TickOutcome) {
        let mut speakers = self.speakers.lock();
        speakers.retain(|_, speaker| {
            let outcome = f(speaker);
            if outcome == TickOutcome::Heard {
                speaker.last_heard = now;
            }
            let stale = now.saturating_duration_since(speaker.last_heard) > self.stale_timeout;
            !(outcome == TickOutcome::Silent && stale)
        });
    }

    pub fn len(&self) -> usize {
        self.speakers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: Id) -> bool {
        self.speakers.lock().contains_key(&id)
    }
}

//! The mix/decode path: the platform playback callback pops one
//! packet per speaker, decodes (or conceals), sums, and clips. No
//! per-speaker gain normalization — deliberate, so mix loudness
//! doesn't depend on how many people are talking.
//!
//! Grounded on `crimpz-Audio-P2P/src/main.rs`'s `build_output_stream`
//! for the cpal wiring; the per-speaker registry walk has no
//! point-to-point analogue there and is built directly from
//! [`crate::registry::Registry`].

use crate::constants::{CHANNELS, FRAME_SIZE, STALE_TIMEOUT};
use crate::registry::{Registry, TickOutcome};
use anyhow::{anyhow, Result};
use cpal::traits::DeviceTrait;
use cpal::Sample;
use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

pub fn build_output_stream(
    device: cpal::Device,
    cfg: cpal::StreamConfig,
    registry: Arc<Registry>,
) -> Result<cpal::Stream> {
    match device.default_output_config()?.sample_format() {
        cpal::SampleFormat::F32 => build_output::<f32>(device, cfg, registry),
        cpal::SampleFormat::I16 => build_output::<i16>(device, cfg, registry),
        cpal::SampleFormat::U16 => build_output::<u16>(device, cfg, registry),
        other => Err(anyhow!("unsupported output sample format: {other:?}")),
    }
}

fn build_output<T>(device: cpal::Device, cfg: cpal::StreamConfig, registry: Arc<Registry>) -> Result<cpal::Stream>
where
    T: Sample + cpal::SizedSample + 'static,
{
    let err_fn = |e| error!("playback stream error: {e}");

    let mut mix_buf = [0f32; FRAME_SIZE];
    let mut scratch = [0f32; FRAME_SIZE];

    let stream = device.build_output_stream(
        &cfg,
        move |out: &mut [T], _| {
            if out.len() != FRAME_SIZE * CHANNELS {
                warn!(got = out.len(), want = FRAME_SIZE * CHANNELS, "playback tick had unexpected buffer size");
                for sample in out.iter_mut() {
                    *sample = f32_to_sample(0.0);
                }
                return;
            }

            mix_buf.fill(0.0);
            let now = Instant::now();

            registry.for_each_speaker_mut(now, |speaker| {
                let popped = speaker.jitter.pop();
                let outcome = if popped.is_some() { TickOutcome::Heard } else { TickOutcome::Silent };

                // A silent speaker past the stale timeout is evicted
                // and makes no contribution this tick.
                if outcome == TickOutcome::Silent
                    && now.saturating_duration_since(speaker.last_heard) > STALE_TIMEOUT
                {
                    return TickOutcome::Silent;
                }

                match speaker.decoder.decode(popped.as_deref(), &mut scratch) {
                    Ok(n) => {
                        if n < FRAME_SIZE {
                            scratch[n..].fill(0.0);
                        }
                        for (m, s) in mix_buf.iter_mut().zip(scratch.iter()) {
                            *m += s;
                        }
                    }
                    Err(e) => {
                        warn!(id = speaker.id, error = %e, "decoder faulted, flushing speaker queue");
                        speaker.jitter.clear();
                    }
                }
                outcome
            });

            for (o, m) in out.iter_mut().zip(mix_buf.iter()) {
                *o = f32_to_sample(m.clamp(-1.0, 1.0));
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn f32_to_sample<T: Sample + 'static>(s: f32) -> T {
    if TypeId::of::<T>() == TypeId::of::<f32>() {
        unsafe { std::mem::transmute_copy::<f32, T>(&s) }
    } else if TypeId::of::<T>() == TypeId::of::<i16>() {
        let v = (s * i16::MAX as f32) as i16;
        unsafe { std::mem::transmute_copy::<i16, T>(&v) }
    } else if TypeId::of::<T>() == TypeId::of::<u16>() {
        let v = (((s + 1.0) / 2.0) * u16::MAX as f32) as u16;
        unsafe { std::mem::transmute_copy::<u16, T>(&v) }
    } else {
        panic!("unsupported playback sample type")
    }
}

//! The capture/encode path: the platform capture callback encodes each
//! exact-`FRAME_SIZE` PCM tick and hands the compressed bytes off to a
//! dedicated sender thread through the capture ring, rather than
//! sending directly — chosen because the hub connection is a blocking
//! `TcpStream` and the capture callback must never block on the
//! network.
//!
//! Grounded on `crimpz-Audio-P2P/src/main.rs`'s `build_input_stream`/
//! `build_input` (per-sample-format dispatch, accumulate-then-encode)
//! and `sample_to_f32`.

use crate::audio_codec::FrameEncoder;
use crate::constants::{FRAME_SIZE, MAX_PAYLOAD};
use crate::ring::AsyncByteRing;
use anyhow::{anyhow, Result};
use cpal::traits::DeviceTrait;
use cpal::Sample;
use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Builds the capture stream, dispatching on the device's native
/// sample format for each of f32/i16/u16.
pub fn build_input_stream(
    device: cpal::Device,
    cfg: cpal::StreamConfig,
    encoder: Box<dyn FrameEncoder>,
    ring: Arc<AsyncByteRing>,
) -> Result<cpal::Stream> {
    match device.default_input_config()?.sample_format() {
        cpal::SampleFormat::F32 => build_input::<f32>(device, cfg, encoder, ring),
        cpal::SampleFormat::I16 => build_input::<i16>(device, cfg, encoder, ring),
        cpal::SampleFormat::U16 => build_input::<u16>(device, cfg, encoder, ring),
        other => Err(anyhow!("unsupported input sample format: {other:?}")),
    }
}

fn build_input<T>(
    device: cpal::Device,
    cfg: cpal::StreamConfig,
    mut encoder: Box<dyn FrameEncoder>,
    ring: Arc<AsyncByteRing>,
) -> Result<cpal::Stream>
where
    T: Sample + cpal::SizedSample + 'static,
{
    let err_fn = |e| error!("capture stream error: {e}");

    // Stack-allocated scratch reused every tick: the callback must not
    // allocate.
    let mut pcm = [0f32; FRAME_SIZE];
    let mut encoded = [0u8; MAX_PAYLOAD];
    let mut framed = [0u8; 4 + MAX_PAYLOAD];

    let stream = device.build_input_stream(
        &cfg,
        move |data: &[T], _| {
            if data.len() != FRAME_SIZE {
                warn!(got = data.len(), want = FRAME_SIZE, "capture tick had unexpected sample count, dropping");
                return;
            }
            for (dst, &src) in pcm.iter_mut().zip(data.iter()) {
                *dst = sample_to_f32(src);
            }

            match encoder.encode(&pcm, &mut encoded) {
                Ok(len) => {
                    framed[..4].copy_from_slice(&(len as u32).to_le_bytes());
                    framed[4..4 + len].copy_from_slice(&encoded[..len]);
                    if !ring.write(&framed[..4 + len]) {
                        warn!(len, "encoded frame larger than capture ring capacity, dropped");
                    }
                }
                Err(e) => error!("opus encode error: {e}"),
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn sample_to_f32<T: Sample + 'static>(s: T) -> f32 {
    if TypeId::of::<T>() == TypeId::of::<f32>() {
        unsafe { std::mem::transmute_copy::<T, f32>(&s) }
    } else if TypeId::of::<T>() == TypeId::of::<i16>() {
        let s: i16 = unsafe { std::mem::transmute_copy(&s) };
        s as f32 / i16::MAX as f32
    } else if TypeId::of::<T>() == TypeId::of::<u16>() {
        let s: u16 = unsafe { std::mem::transmute_copy(&s) };
        s as f32 / u16::MAX as f32 * 2.0 - 1.0
    } else {
        panic!("unsupported capture sample type")
    }
}

const RING_POLL: Duration = Duration::from_micros(200);

/// Drains the capture ring and performs the network writes the
/// capture callback itself must never do. `transport` carries no
/// speaker id — the hub stamps it from the connection.
pub fn run_sender<W: std::io::Write>(ring: Arc<AsyncByteRing>, mut transport: W, running: Arc<AtomicBool>) {
    while running.load(Ordering::Acquire) {
        match ring.read() {
            Some(view) => {
                let mut bytes = view.as_slice();
                while bytes.len() >= 4 {
                    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                    if bytes.len() < 4 + len {
                        warn!("truncated internal ring frame, dropping remainder of this view");
                        break;
                    }
                    let payload = &bytes[4..4 + len];
                    if let Err(e) = crate::codec::send_framed(&mut transport, None, payload) {
                        warn!(error = %e, "sender thread exiting: transport broken");
                        return;
                    }
                    bytes = &bytes[4 + len..];
                }
            }
            None => std::thread::sleep(RING_POLL),
        }
    }
}

//! Client process lifecycle: capture callback, playback callback,
//! receiver thread, sender thread, main thread.
//!
//! Grounded on `crimpz-Audio-P2P/src/main.rs`'s `main`/`select_host`
//! for device setup and the `tokio::signal::ctrl_c` shutdown shape,
//! adapted to a `running`-flag cancellation model instead of a tokio
//! runtime.

use crate::audio_codec::{OpusFrameDecoder, OpusFrameEncoder};
use crate::client::{capture, mixer, receiver};
use crate::codec::recv_id_preamble;
use crate::constants::{CAPTURE_RING_TICKS, CHANNELS, FRAME_SIZE, JITTER_DEPTH, MAX_PAYLOAD, SAMPLE_RATE, STALE_TIMEOUT};
use crate::frame::Id;
use crate::registry::Registry;
use crate::ring::AsyncByteRing;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

pub struct ClientRuntime {
    my_id: Id,
    running: Arc<AtomicBool>,
    read_stream: TcpStream,
    input_stream: cpal::Stream,
    output_stream: cpal::Stream,
    sender_handle: Option<JoinHandle<()>>,
    receiver_handle: Option<JoinHandle<()>>,
}

impl ClientRuntime {
    pub fn connect(server_addr: SocketAddr) -> Result<Self> {
        let write_stream = TcpStream::connect(server_addr).context("connecting to hub")?;
        write_stream.set_nodelay(true).context("enabling TCP_NODELAY")?;
        let mut preamble_stream = write_stream.try_clone().context("cloning socket for id preamble")?;
        let my_id = recv_id_preamble(&mut preamble_stream).context("reading assigned id from hub")?;
        info!(my_id, %server_addr, "connected to hub");

        let read_stream = write_stream.try_clone().context("cloning socket for receiver thread")?;

        let host = select_host()?;
        let input_device = host.default_input_device().context("no default input device")?;
        let output_device = host.default_output_device().context("no default output device")?;
        info!(input = %input_device.name().unwrap_or_default(), "selected capture device");
        info!(output = %output_device.name().unwrap_or_default(), "selected playback device");

        let in_cfg = fixed_stream_config(&input_device, true)?;
        let out_cfg = fixed_stream_config(&output_device, false)?;

        let ring_capacity = CAPTURE_RING_TICKS * (4 + MAX_PAYLOAD);
        let ring = Arc::new(AsyncByteRing::new(ring_capacity));

        let encoder = Box::new(OpusFrameEncoder::new(SAMPLE_RATE)?);
        let input_stream = capture::build_input_stream(input_device, in_cfg, encoder, Arc::clone(&ring))?;

        let registry = Arc::new(Registry::new(JITTER_DEPTH, STALE_TIMEOUT, || {
            OpusFrameDecoder::new(SAMPLE_RATE).map(|d| Box::new(d) as Box<dyn crate::audio_codec::FrameDecoder>)
        }));
        let output_stream = mixer::build_output_stream(output_device, out_cfg, Arc::clone(&registry))?;

        let running = Arc::new(AtomicBool::new(true));

        let sender_handle = {
            let ring = Arc::clone(&ring);
            let running = Arc::clone(&running);
            let transport = write_stream.try_clone().context("cloning socket for sender thread")?;
            Some(std::thread::spawn(move || capture::run_sender(ring, transport, running)))
        };

        let receiver_handle = {
            let registry = Arc::clone(&registry);
            let running = Arc::clone(&running);
            let transport = read_stream.try_clone().context("cloning socket for receiver thread")?;
            Some(std::thread::spawn(move || receiver::run(transport, my_id, registry, running)))
        };

        input_stream.play().context("starting capture stream")?;
        output_stream.play().context("starting playback stream")?;

        Ok(Self {
            my_id,
            running,
            read_stream,
            input_stream,
            output_stream,
            sender_handle,
            receiver_handle,
        })
    }

    pub fn my_id(&self) -> Id {
        self.my_id
    }

    /// Still running, i.e. the receiver hasn't observed a disconnect.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop devices, join receiver and sender, close the transport,
    /// release codec state.
    pub fn shutdown(mut self) {
        info!("client shutting down");
        self.running.store(false, Ordering::Release);

        let _ = self.input_stream.pause();
        let _ = self.output_stream.pause();

        // Unblocks the receiver thread's blocking read.
        let _ = self.read_stream.shutdown(Shutdown::Both);

        if let Some(handle) = self.receiver_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.sender_handle.take() {
            let _ = handle.join();
        }
    }
}

fn select_host() -> Result<cpal::Host> {
    #[cfg(target_os = "windows")]
    {
        Ok(cpal::host_from_id(cpal::HostId::Wasapi)?)
    }
    #[cfg(target_os = "macos")]
    {
        Ok(cpal::host_from_id(cpal::HostId::CoreAudio)?)
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Ok(cpal::default_host())
    }
}

/// Builds a `StreamConfig` pinned to the design sample rate, mono, and
/// an exact `FRAME_SIZE`-sample period — the capture/mix contracts
/// assume every callback tick is exactly one frame.
fn fixed_stream_config(device: &cpal::Device, input: bool) -> Result<cpal::StreamConfig> {
    let supported = if input { device.default_input_config()? } else { device.default_output_config()? };
    let mut cfg: cpal::StreamConfig = supported.into();
    cfg.channels = CHANNELS as u16;
    cfg.sample_rate = cpal::SampleRate(SAMPLE_RATE);
    cfg.buffer_size = cpal::BufferSize::Fixed(FRAME_SIZE as u32);
    Ok(cfg)
}

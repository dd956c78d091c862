//! The boundary to the external audio codec: an `encode_float`/
//! `decode_float` contract, with no concrete codec type named at this
//! layer.
//!
//! Encoder and decoder state are each owned exclusively by a single
//! thread (capture and mix respectively), so neither needs to be
//! `Sync` — only `Send`, to move into the owning thread/callback.
//! The concrete implementation wraps the `opus` crate
//! (`OpusEncoder`/`OpusDecoder` in `crimpz-Audio-P2P/src/main.rs`).

use crate::error::FrameError;

/// Compresses one `FRAME_SIZE`-sample PCM block into at most
/// `MAX_PAYLOAD` bytes.
pub trait FrameEncoder: Send {
    fn encode(&mut self, pcm: &[f32], out: &mut [u8]) -> Result<usize, FrameError>;
}

/// Decodes one compressed frame back into exactly `FRAME_SIZE` PCM
/// samples, or performs packet-loss concealment when given `None`.
pub trait FrameDecoder: Send {
    fn decode(&mut self, data: Option<&[u8]>, out: &mut [f32]) -> Result<usize, FrameError>;
}

pub struct OpusFrameEncoder {
    inner: opus::Encoder,
}

impl OpusFrameEncoder {
    pub fn new(sample_rate: u32) -> Result<Self, FrameError> {
        let inner = opus::Encoder::new(sample_rate, opus::Channels::Mono, opus::Application::Voip)
            .map_err(|e| FrameError::CodecFault(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl FrameEncoder for OpusFrameEncoder {
    fn encode(&mut self, pcm: &[f32], out: &mut [u8]) -> Result<usize, FrameError> {
        self.inner.encode_float(pcm, out).map_err(|e| FrameError::CodecFault(e.to_string()))
    }
}

pub struct OpusFrameDecoder {
    inner: opus::Decoder,
}

impl OpusFrameDecoder {
    pub fn new(sample_rate: u32) -> Result<Self, FrameError> {
        let inner = opus::Decoder::new(sample_rate, opus::Channels::Mono)
            .map_err(|e| FrameError::CodecFault(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl FrameDecoder for OpusFrameDecoder {
    fn decode(&mut self, data: Option<&[u8]>, out: &mut [f32]) -> Result<usize, FrameError> {
        let empty = [];
        let input = data.unwrap_or(&empty);
        self.inner.decode_float(input, out, false).map_err(|e| FrameError::CodecFault(e.to_string()))
    }
}

#[cfg(test)]
pub mod test_support {
    //! A deterministic, allocation-free fake codec for unit/property
    //! tests that never links against `libopus`. Encodes a PCM block
    //! as its own little-endian f32 bytes (so decode is exact), and
    //! treats an empty/`None` input as silence — a stand-in for PLC.
    use super::*;

    #[derive(Default)]
    pub struct IdentityEncoder;

    impl FrameEncoder for IdentityEncoder {
        fn encode(&mut self, pcm: &[f32], out: &mut [u8]) -> Result<usize, FrameError> {
            let needed = pcm.len() * 4;
            if needed > out.len() {
                return Err(FrameError::TooLarge { size: needed, max: out.len() });
            }
            for (chunk, sample) in out.chunks_exact_mut(4).zip(pcm.iter()) {
                chunk.copy_from_slice(&sample.to_le_bytes());
            }
            Ok(needed)
        }
    }

    #[derive(Default)]
    pub struct IdentityDecoder;

    impl FrameDecoder for IdentityDecoder {
        fn decode(&mut self, data: Option<&[u8]>, out: &mut [f32]) -> Result<usize, FrameError> {
            match data {
                None => {
                    out.fill(0.0);
                    Ok(out.len())
                }
                Some(bytes) => {
                    let n = bytes.len() / 4;
                    for (i, chunk) in bytes.chunks_exact(4).enumerate().take(out.len()) {
                        out[i] = f32::from_le_bytes(chunk.try_into().unwrap());
                    }
                    Ok(n.min(out.len()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn identity_codec_round_trips() {
        let mut enc = IdentityEncoder;
        let mut dec = IdentityDecoder;
        let pcm = vec![0.1, -0.2, 0.3, 0.0];
        let mut bytes = vec![0u8; 64];
        let n = enc.encode(&pcm, &mut bytes).unwrap();
        let mut out = vec![0.0f32; pcm.len()];
        let decoded = dec.decode(Some(&bytes[..n]), &mut out).unwrap();
        assert_eq!(decoded, pcm.len());
        assert_eq!(out, pcm);
    }

    #[test]
    fn concealment_on_none_is_silence() {
        let mut dec = IdentityDecoder;
        let mut out = vec![1.0f32; 8];
        let n = dec.decode(None, &mut out).unwrap();
        assert_eq!(n, 8);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}

//! In-process audio engine used when ffmpeg is not installed.
//!
//! Decoding uses symphonia, sample-rate conversion uses rubato and MP3
//! encoding uses LAME. All work is CPU-bound and runs on tokio's blocking pool.

use async_trait::async_trait;
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, Quality};
use rubato::{FftFixedIn, Resampler};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioBackend, TARGET_CHANNELS, TARGET_SAMPLE_RATE};
use crate::workspace::Workspace;
use crate::{MashupError, Result};

const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Frames handed to LAME per call
const ENCODE_CHUNK_FRAMES: usize = 1152 * 64;

/// Decoded interleaved PCM
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl PcmBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Keep only the first `seconds`
    pub fn truncate_secs(&mut self, seconds: u32) {
        let frames = seconds as usize * self.sample_rate as usize;
        self.samples.truncate(frames * self.channels);
    }

    pub fn append(&mut self, other: &PcmBuffer) -> Result<()> {
        if other.sample_rate != self.sample_rate || other.channels != self.channels {
            return Err(MashupError::Encode(format!(
                "cannot append {} Hz/{} ch audio to {} Hz/{} ch audio",
                other.sample_rate, other.channels, self.sample_rate, self.channels
            )));
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    fn empty_normalized() -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: TARGET_SAMPLE_RATE,
            channels: TARGET_CHANNELS,
        }
    }
}

/// Audio backend that never leaves the process
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub const NAME: &'static str = "native";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioBackend for NativeBackend {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let input = input.to_path_buf();

        render(output, move || {
            tracing::debug!("Decoding {} in-process", input.display());
            let pcm = normalize(decode_file(&input)?)?;
            encode_mp3(&pcm)
        })
        .await
    }

    async fn trim(&self, input: &Path, output: &Path, seconds: u32) -> Result<()> {
        let input = input.to_path_buf();

        render(output, move || {
            let mut pcm = decode_file(&input)?;
            if pcm.duration_secs() <= seconds as f64 {
                tracing::debug!(
                    "{} is only {:.1}s, keeping it whole",
                    input.display(),
                    pcm.duration_secs()
                );
                return Ok(fs_err::read(&input)?);
            }

            pcm.truncate_secs(seconds);
            encode_mp3(&normalize(pcm)?)
        })
        .await
    }

    async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _workspace: &Workspace,
    ) -> Result<()> {
        let inputs = inputs.to_vec();

        render(output, move || {
            let mut combined = PcmBuffer::empty_normalized();
            for (index, input) in inputs.iter().enumerate() {
                tracing::debug!("Adding clip {}: {}", index + 1, input.display());
                combined.append(&normalize(decode_file(input)?)?)?;
            }
            encode_mp3(&combined)
        })
        .await
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Run `job` on the blocking pool, then write what it produced to `output`.
///
/// The write happens on the async side after the join. A caller that stops
/// waiting (Ctrl-C drops the pipeline) leaves nothing on disk, even though the
/// blocking job itself runs to completion.
async fn render<F>(output: &Path, job: F) -> Result<()>
where
    F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    let bytes = tokio::task::spawn_blocking(job).await??;
    fs_err::write(output, bytes)?;
    Ok(())
}

/// Decode the default audio track of any container symphonia understands
pub(crate) fn decode_file(path: &Path) -> Result<PcmBuffer> {
    let decode_err = |e: SymphoniaError| MashupError::Decode(format!("{}: {}", path.display(), e));

    let file = std::fs::File::open(path)?;
    let media_source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MashupError::Decode(format!("{}: no audio track", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count());
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // A corrupt packet is skipped, not fatal
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("Skipping undecodable packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(decode_err(e)),
        }
    }

    let (Some(sample_rate), Some(channels)) = (sample_rate, channels) else {
        return Err(MashupError::Decode(format!(
            "{}: unknown sample rate or channel layout",
            path.display()
        )));
    };
    if channels == 0 || samples.is_empty() {
        return Err(MashupError::Decode(format!(
            "{}: no audio samples",
            path.display()
        )));
    }

    Ok(PcmBuffer {
        samples,
        sample_rate,
        channels,
    })
}

/// Bring any buffer to the target rate and stereo layout
pub(crate) fn normalize(pcm: PcmBuffer) -> Result<PcmBuffer> {
    let planes = to_stereo_planes(&pcm);
    let planes = if pcm.sample_rate == TARGET_SAMPLE_RATE {
        planes
    } else {
        resample(planes, pcm.sample_rate, TARGET_SAMPLE_RATE)?
    };

    let frames = planes.first().map_or(0, Vec::len);
    let mut samples = Vec::with_capacity(frames * TARGET_CHANNELS);
    for frame in 0..frames {
        for plane in &planes {
            samples.push(plane[frame]);
        }
    }

    Ok(PcmBuffer {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
        channels: TARGET_CHANNELS,
    })
}

/// Split interleaved samples into left/right planes; mono is duplicated and
/// anything past the first two channels is dropped
fn to_stereo_planes(pcm: &PcmBuffer) -> Vec<Vec<f32>> {
    let frames = pcm.frames();
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);

    for frame in pcm.samples.chunks_exact(pcm.channels) {
        left.push(frame[0]);
        right.push(if pcm.channels > 1 { frame[1] } else { frame[0] });
    }

    vec![left, right]
}

fn resample(planes: Vec<Vec<f32>>, from: u32, to: u32) -> Result<Vec<Vec<f32>>> {
    let resample_err = |e: &dyn std::fmt::Display| MashupError::Encode(format!("resampling failed: {e}"));

    let frames = planes.first().map_or(0, Vec::len);
    let expected = (frames as u64 * to as u64 / from as u64) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        from as usize,
        to as usize,
        RESAMPLE_CHUNK_FRAMES,
        2,
        planes.len(),
    )
    .map_err(|e| resample_err(&e))?;
    let delay = resampler.output_delay();

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); planes.len()];
    let append = |chunk: Vec<Vec<f32>>, out: &mut Vec<Vec<f32>>| {
        for (plane, produced) in out.iter_mut().zip(chunk) {
            plane.extend_from_slice(&produced);
        }
    };

    let mut position = 0;
    while position < frames {
        let needed = resampler.input_frames_next();
        let end = (position + needed).min(frames);
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[position..end]).collect();

        let produced = if end - position == needed {
            resampler.process(&chunk, None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(|e| resample_err(&e))?;
        append(produced, &mut out);
        position = end;
    }

    // Drain what the resampler still holds
    while out[0].len() < expected + delay {
        let produced = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| resample_err(&e))?;
        if produced.first().map_or(true, Vec::is_empty) {
            break;
        }
        append(produced, &mut out);
    }

    for plane in out.iter_mut() {
        plane.drain(..delay.min(plane.len()));
        plane.truncate(expected);
    }

    Ok(out)
}

/// Encode normalized PCM to CBR MP3 bytes
pub(crate) fn encode_mp3(pcm: &PcmBuffer) -> Result<Vec<u8>> {
    let encode_err = |e: &dyn std::fmt::Debug| MashupError::Encode(format!("{e:?}"));

    if pcm.channels != TARGET_CHANNELS {
        return Err(MashupError::Encode(format!(
            "expected {} channels, got {}",
            TARGET_CHANNELS, pcm.channels
        )));
    }

    let mut builder = Builder::new()
        .ok_or_else(|| MashupError::Encode("failed to initialise LAME".to_string()))?;
    builder
        .set_num_channels(TARGET_CHANNELS as u8)
        .map_err(|e| encode_err(&e))?;
    builder
        .set_sample_rate(pcm.sample_rate)
        .map_err(|e| encode_err(&e))?;
    builder
        .set_brate(Bitrate::Kbps192)
        .map_err(|e| encode_err(&e))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| encode_err(&e))?;
    let mut encoder = builder.build().map_err(|e| encode_err(&e))?;

    let pcm16: Vec<i16> = pcm
        .samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();

    let mut mp3 = Vec::new();
    for chunk in pcm16.chunks(ENCODE_CHUNK_FRAMES * TARGET_CHANNELS) {
        encoder
            .encode_to_vec(InterleavedPcm(chunk), &mut mp3)
            .map_err(|e| encode_err(&e))?;
    }
    encoder
        .flush_to_vec::<FlushNoGap>(&mut mp3)
        .map_err(|e| encode_err(&e))?;

    Ok(mp3)
}

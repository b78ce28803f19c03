use std::io::Cursor;

use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the recordings handed to the backend.
pub const UPLOAD_SAMPLE_RATE: u32 = 16_000;

pub const WAV_DATA_URL_PREFIX: &str = "data:audio/wav;base64,";

pub fn create_resampler(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1
    )?;
    Ok(resampler)
}

pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples.chunks(chunk_size).map(|chunk| {
        let mut chunk = chunk.to_vec();
        chunk.resize(chunk_size, 0.0);
        chunk
    }).collect()
}

/// Averages interleaved channels down to mono.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

pub fn resample(samples: &[f32], in_rate: u32, out_rate: u32) -> anyhow::Result<Vec<f32>> {
    if in_rate == out_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let chunk_size = 1024;
    let mut resampler = create_resampler(in_rate as f64, out_rate as f64, chunk_size)?;
    let mut out = Vec::with_capacity(samples.len() * out_rate as usize / in_rate as usize + chunk_size);
    for chunk in split_for_chunks(samples, chunk_size) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    // Trailing padding from the last chunk is not audio.
    out.truncate(samples.len() * out_rate as usize / in_rate as usize);
    Ok(out)
}

/// Encodes mono f32 samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Turns one finished recording into the `audio_complete` payload.
pub fn encode_recording(samples: &[f32], sample_rate: u32) -> anyhow::Result<String> {
    let samples = resample(samples, sample_rate, UPLOAD_SAMPLE_RATE)?;
    let wav = encode_wav(&samples, UPLOAD_SAMPLE_RATE)?;
    tracing::debug!("encoded recording: {} samples, {} bytes", samples.len(), wav.len());
    Ok(format!(
        "{}{}",
        WAV_DATA_URL_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(&wav)
    ))
}

// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decodes fetched bytes into planar f32 buffers at the output sample rate.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::buffer::AudioBuffer;
use super::error::AssetError;

/// Decodes an encoded clip, transcoding it to the target sample rate if needed.
pub fn decode(locator: &str, bytes: Vec<u8>, target_rate: u32) -> Result<AudioBuffer, AssetError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = locator.rsplit_once('.').map(|(_, ext)| ext) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AssetError::decode(locator, e))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AssetError::decode(locator, "no audio track found"))?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AssetError::decode(locator, "sample rate not specified"))?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AssetError::decode(locator, e))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(AssetError::decode(locator, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(locator, error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(AssetError::decode(locator, e)),
        };

        let spec = *decoded.spec();
        let channel_count = spec.channels.count();
        if channel_count == 0 {
            continue;
        }
        if channels.is_empty() {
            channels = vec![Vec::new(); channel_count];
        }

        let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        for frame in interleaved.samples().chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
    }

    if channels.is_empty() {
        return Err(AssetError::decode(locator, "no audio decoded"));
    }

    if source_rate != target_rate {
        debug!(
            locator,
            source_rate, target_rate, "Transcoding clip to output rate"
        );
        channels = channels
            .iter()
            .map(|channel| transcode(channel, source_rate, target_rate))
            .collect();
    }

    Ok(AudioBuffer::new(channels, target_rate))
}

/// Resamples one channel with linear interpolation.
/// Drum hits and impulse responses don't need anything more careful than this.
pub(crate) fn transcode(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let target_frames = (samples.len() as f64 * ratio).ceil() as usize;

    (0..target_frames)
        .map(|target_frame| {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            let s0 = samples.get(source_frame).copied().unwrap_or(0.0);
            let s1 = samples.get(source_frame + 1).copied().unwrap_or(s0);
            s0 + (s1 - s0) * frac
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use tempfile::tempdir;

    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn transcode_lengthens_when_upsampling() {
        let source: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();

        let result = transcode(&source, 44100, 48000);
        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(expected_len, result.len());
        assert_eq!(source[0], result[0]);
    }

    #[test]
    fn decodes_stereo_wav() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("clip.wav");
        write_wav(
            &path,
            vec![vec![0.25f32, 0.5, 0.75], vec![-0.25f32, -0.5, -0.75]],
            44100,
        )?;

        let buffer = decode("clip.wav", std::fs::read(&path)?, 44100)?;
        assert_eq!(2, buffer.channel_count());
        assert_eq!(3, buffer.frames());
        assert_eq!(&[0.25, 0.5, 0.75], buffer.channel(0));
        assert_eq!(&[-0.25, -0.5, -0.75], buffer.channel(1));
        Ok(())
    }

    #[test]
    fn decodes_to_output_rate() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("clip.wav");
        write_wav(&path, vec![vec![0.5f32; 22050]], 22050)?;

        let buffer = decode("clip.wav", std::fs::read(&path)?, 44100)?;
        assert_eq!(44100, buffer.sample_rate());
        assert_eq!(44100, buffer.frames());
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        let result = decode("noise.wav", vec![1, 2, 3, 4, 5, 6, 7, 8], 44100);
        assert!(matches!(result, Err(AssetError::Decode { .. })));
    }
}

use crate::error::PanelError;
use crate::frames::{decode_frame, frame_path};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame as GifFrame, RgbaImage};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

// NeuQuant sampling factor; 1 is best quality but far too slow for 1024px frames.
const QUANTIZER_SPEED: i32 = 10;

// Frames decoded at once. Bounds memory to a chunk of full-size RGBA buffers.
const DECODE_CHUNK: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    pub path: PathBuf,
    /// Indices written, in order.
    pub frames: Vec<u32>,
    /// Indices whose file existed but failed to decode.
    pub skipped: Vec<u32>,
}

/// Build an animation from frames `0..total` that currently exist in `dir`.
///
/// Missing indices are skipped. The GIF is written next to `output` and
/// renamed over it only once encoding succeeded.
pub fn assemble_animation(
    dir: &Path,
    total: u32,
    output: &Path,
    frame_delay_ms: u32,
) -> Result<AssemblyReport, PanelError> {
    let partial = partial_path(output);
    let (frames, skipped) = match encode_frames(dir, total, &partial, frame_delay_ms) {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };
    fs::rename(&partial, output).map_err(|e| PanelError::io(output, e))?;

    log::info!(
        "Wrote {} frames to {} ({} skipped)",
        frames.len(),
        output.display(),
        skipped.len()
    );

    Ok(AssemblyReport {
        path: output.to_path_buf(),
        frames,
        skipped,
    })
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "animation.gif".into());
    name.push(".partial");
    output.with_file_name(name)
}

fn encode_frames(
    dir: &Path,
    total: u32,
    target: &Path,
    frame_delay_ms: u32,
) -> Result<(Vec<u32>, Vec<u32>), PanelError> {
    let file = File::create(target).map_err(|e| PanelError::io(target, e))?;
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), QUANTIZER_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(frame_delay_ms, 1);

    let mut frames = Vec::new();
    let mut skipped = Vec::new();
    let indices: Vec<u32> = (0..total).collect();
    for chunk in indices.chunks(DECODE_CHUNK) {
        let decoded: Vec<(u32, Result<RgbaImage, PanelError>)> = chunk
            .par_iter()
            .filter_map(|&index| {
                let path = frame_path(dir, index);
                path.is_file().then(|| (index, decode_frame(&path)))
            })
            .collect();

        for (index, result) in decoded {
            match result {
                Ok(image) => {
                    encoder.encode_frame(GifFrame::from_parts(image, 0, 0, delay))?;
                    frames.push(index);
                }
                Err(e) => {
                    log::warn!("Skipping frame {}: {}", index, e);
                    skipped.push(index);
                }
            }
        }
    }

    if frames.is_empty() {
        return Err(PanelError::Encode(format!(
            "no frames found in {}",
            dir.display()
        )));
    }
    Ok((frames, skipped))
}

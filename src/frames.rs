use crate::error::PanelError;
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

/// File name for the frame at `index`, e.g. `image_0007.png`.
pub fn frame_file_name(index: u32) -> String {
    format!("image_{:04}.png", index)
}

pub fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(frame_file_name(index))
}

/// A decoded frame ready for display.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u32,
    pub image: RgbaImage,
}

pub fn decode_frame(path: &Path) -> Result<RgbaImage, PanelError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| PanelError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Load the frame at `index` if its file exists and decodes.
pub fn load_frame(dir: &Path, index: u32) -> Option<Frame> {
    let path = frame_path(dir, index);
    if !path.is_file() {
        return None;
    }
    match decode_frame(&path) {
        Ok(image) => Some(Frame { index, image }),
        Err(e) => {
            log::trace!("{}", e);
            None
        }
    }
}

/// Delete numbered outputs starting at index 0 and stopping at the first gap
/// or after `scan_limit` lookups. Returns the number of files removed.
pub fn clear_frames(dir: &Path, scan_limit: u32) -> Result<u32, PanelError> {
    let mut removed = 0;
    for index in 0..scan_limit {
        let path = frame_path(dir, index);
        if !path.is_file() {
            break;
        }
        fs::remove_file(&path).map_err(|e| PanelError::io(&path, e))?;
        removed += 1;
    }
    if removed > 0 {
        log::info!("Removed {} previous frames from {}", removed, dir.display());
    }
    Ok(removed)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Write a small solid-colour PNG frame.
    pub fn write_frame(dir: &Path, index: u32, shade: u8) -> PathBuf {
        let path = frame_path(dir, index);
        RgbaImage::from_pixel(4, 4, Rgba([shade, 255 - shade, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }
}

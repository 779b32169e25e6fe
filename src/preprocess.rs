use image::imageops::{self, FilterType};

use crate::error::ServiceError;

pub const INPUT_SIZE: u32 = 128;
pub const INPUT_CHANNELS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: u32,
    width: u32,
}

impl ImageTensor {
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> [i64; 4] {
        [
            1,
            i64::from(self.height),
            i64::from(self.width),
            i64::from(INPUT_CHANNELS),
        ]
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, row: u32, col: u32) -> [f32; 3] {
        let base = ((row * self.width + col) * INPUT_CHANNELS) as usize;
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }
}

// Aspect ratio is not preserved: every image is stretched to INPUT_SIZE square.
pub fn preprocess(raw: &[u8]) -> Result<ImageTensor, ServiceError> {
    if raw.is_empty() {
        return Err(ServiceError::Decode("image payload is empty".into()));
    }

    let decoded =
        image::load_from_memory(raw).map_err(|e| ServiceError::Decode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let resized = if rgb.dimensions() == (INPUT_SIZE, INPUT_SIZE) {
        rgb
    } else {
        imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
    };

    let data = resized
        .into_raw()
        .into_iter()
        .map(|channel| f32::from(channel) / 255.0)
        .collect();

    Ok(ImageTensor {
        data,
        height: INPUT_SIZE,
        width: INPUT_SIZE,
    })
}

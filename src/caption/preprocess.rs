//! Image loading and BLIP preprocessing.
//!
//! BLIP expects a `[3, 384, 384]` float tensor, resized to fill the square and
//! normalised with the CLIP channel mean/std.

use std::path::Path;

use candle_core::{DType, Device, Tensor};

/// Side length of the square BLIP input.
pub const IMAGE_SIZE: u32 = 384;

const MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Decode `path` and return a normalised `[3, IMAGE_SIZE, IMAGE_SIZE]` tensor
/// on `device`.
///
/// The format is sniffed from the file content, so an uploaded PNG staged
/// under a `.jpg` name still decodes.
pub fn load_image(path: &Path, device: &Device) -> candle_core::Result<Tensor> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(candle_core::Error::wrap)?
        .resize_to_fill(
            IMAGE_SIZE,
            IMAGE_SIZE,
            image::imageops::FilterType::Triangle,
        );
    let side = IMAGE_SIZE as usize;
    let data = img.to_rgb8().into_raw();
    let data = Tensor::from_vec(data, (side, side, 3), &Device::Cpu)?.permute((2, 0, 1))?;
    let mean = Tensor::new(&MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&STD, &Device::Cpu)?.reshape((3, 1, 1))?;

    (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?
        .to_device(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn png_is_resized_to_square_chw() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("forest.png");
        image::RgbImage::from_pixel(64, 32, image::Rgb([10, 200, 30]))
            .save(&path)
            .expect("save png");

        let t = load_image(&path, &Device::Cpu).expect("load");
        assert_eq!(t.dims(), &[3, 384, 384]);
        assert_eq!(t.dtype(), DType::F32);
    }

    #[test]
    fn png_with_jpg_suffix_still_decodes() {
        let dir = tempdir().expect("temp dir");
        let png = dir.path().join("real.png");
        image::RgbImage::new(8, 8).save(&png).expect("save png");
        let staged = dir.path().join("upload.jpg");
        std::fs::copy(&png, &staged).expect("copy");

        assert!(load_image(&staged, &Device::Cpu).is_ok());
    }

    #[test]
    fn non_image_bytes_fail() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"definitely not an image").expect("write");

        assert!(load_image(&path, &Device::Cpu).is_err());
    }
}

// THEORY:
// Turns a finished deployment into a PNG: every owned pixel is blended 50/50
// with a color derived from its owner's id, and each sensor centre is stamped
// white so overlapping disks stay distinguishable.

use image::{ImageEncoder, Rgba, RgbaImage};
use sensor_deploy::SensorArea;
use std::path::Path;

fn sensor_color(id: u32) -> [u8; 3] {
    [
        (id.wrapping_mul(67).wrapping_add(90) % 256) as u8,
        (id.wrapping_mul(151).wrapping_add(40) % 256) as u8,
        (id.wrapping_mul(211).wrapping_add(170) % 256) as u8,
    ]
}

/// Paints the ownership map of `area` over `background`.
pub fn overlay(background: &RgbaImage, area: &SensorArea) -> RgbaImage {
    let mut canvas = background.clone();
    let width = area.geometry().width();
    for (index, owner) in area.ledger().owners().iter().enumerate() {
        let Some(id) = owner else { continue };
        let (x, y) = (index as u32 % width, index as u32 / width);
        let color = sensor_color(*id);
        let pixel = canvas.get_pixel_mut(x, y);
        for channel in 0..3 {
            pixel[channel] = ((pixel[channel] as u16 + color[channel] as u16) / 2) as u8;
        }
    }
    for sensor in area.sensors() {
        let (x, y) = (sensor.position.x, sensor.position.y);
        if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
            canvas.put_pixel(x as u32, y as u32, Rgba([255, 255, 255, 255]));
        }
    }
    canvas
}

pub fn save(path: &Path, image: &RgbaImage) -> Result<(), image::error::ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(output));
    encoder.write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgba8)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_differ_between_neighbouring_ids() {
        let colors: Vec<[u8; 3]> = (0..8).map(sensor_color).collect();
        for pair in colors.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}

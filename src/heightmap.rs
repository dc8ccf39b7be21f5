use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::terrain::Terrain;

/// Loads a terrain from a heightmap image. Pixel intensity maps linearly to
/// height with mid-gray at zero, so the terrain spans
/// `[-amplitude / 2, +amplitude / 2]`.
pub fn load_terrain(path: impl AsRef<Path>, amplitude: f32) -> Result<Terrain> {
    let path = path.as_ref();
    let image = image::open(path)
        .with_context(|| format!("failed to decode heightmap {}", path.display()))?;
    let terrain = terrain_from_image(&image.to_rgb8(), amplitude)?;
    log::info!(
        "loaded heightmap {} ({}x{}, amplitude {amplitude})",
        path.display(),
        terrain.width(),
        terrain.length()
    );
    Ok(terrain)
}

/// Builds a terrain from decoded pixels, reading only the first channel of
/// each pixel, and computes normals eagerly so the returned terrain is ready
/// to query.
pub fn terrain_from_image(image: &RgbImage, amplitude: f32) -> Result<Terrain> {
    let (w, l) = image.dimensions();
    let mut terrain = Terrain::new(w as i32, l as i32)?;
    let pixels = image.as_raw();
    for z in 0..l as usize {
        for x in 0..w as usize {
            let c = pixels[3 * (z * w as usize + x)];
            terrain.set_height(x, z, amplitude * (c as f32 / 255.0 - 0.5));
        }
    }
    terrain.compute_normals();
    Ok(terrain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(width: u32, height: u32, channel: &[u8]) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let c = channel[(y * width + x) as usize];
            image::Rgb([c, c, c])
        })
    }

    #[test]
    fn load_scaling_remaps_bytes_linearly() {
        let img = gray_image(2, 2, &[0, 128, 255, 64]);
        let t = terrain_from_image(&img, 20.0).unwrap();
        let expected = |c: u8| 20.0 * (c as f32 / 255.0 - 0.5);
        assert_eq!(t.get_height(0, 0), expected(0));
        assert_eq!(t.get_height(1, 0), expected(128));
        assert_eq!(t.get_height(0, 1), expected(255));
        assert_eq!(t.get_height(1, 1), expected(64));
        // Byte extremes land on the amplitude extremes.
        assert_eq!(t.get_height(0, 0), -10.0);
        assert_eq!(t.get_height(0, 1), 10.0);
    }

    #[test]
    fn loader_reads_only_the_first_channel() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 255, 255])
            }
        });
        let t = terrain_from_image(&img, 2.0).unwrap();
        assert_eq!(t.get_height(0, 0), 1.0);
        assert_eq!(t.get_height(1, 0), -1.0);
    }

    #[test]
    fn loaded_terrain_has_valid_normals() {
        let img = gray_image(3, 3, &[0, 0, 0, 0, 255, 0, 0, 0, 0]);
        let mut t = terrain_from_image(&img, 2.0).unwrap();
        assert_eq!(t.width(), 3);
        assert_eq!(t.length(), 3);
        let n = t.get_normal(1, 1);
        assert!(n.y > 0.0);
    }

    #[test]
    fn missing_file_is_a_fatal_load_error() {
        assert!(load_terrain("definitely-not-here.bmp", 20.0).is_err());
    }
}

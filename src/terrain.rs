use anyhow::{Result, bail};
use glam::Vec3;

/// Attenuation applied to each 4-neighbor's rough normal during smoothing.
const FALLOUT_RATIO: f32 = 0.5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NormalState {
    Stale,
    Valid,
}

/// A heightfield terrain: a dense grid of heights plus a lazily derived
/// grid of surface normals. Both grids are flat row-major buffers indexed
/// `z * width + x`.
///
/// Normals are recomputed in full the next time they are read after any
/// height write. The stored normals are intentionally not unit length; the
/// renderer normalizes them.
pub struct Terrain {
    width: usize,
    length: usize,
    heights: Vec<f32>,
    normals: Vec<Vec3>,
    normal_state: NormalState,
}

impl Terrain {
    pub fn new(width: i32, length: i32) -> Result<Self> {
        if width <= 0 || length <= 0 {
            bail!("invalid terrain dimensions {width}x{length}");
        }
        let (width, length) = (width as usize, length as usize);
        Ok(Self {
            width,
            length,
            heights: vec![0.0; width * length],
            normals: vec![Vec3::ZERO; width * length],
            normal_state: NormalState::Stale,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn index(&self, x: usize, z: usize) -> usize {
        assert!(
            x < self.width && z < self.length,
            "terrain coordinate ({x}, {z}) out of bounds for {}x{}",
            self.width,
            self.length
        );
        z * self.width + x
    }

    /// Sets the height at (x, z), invalidating the normal field.
    pub fn set_height(&mut self, x: usize, z: usize, y: f32) {
        let i = self.index(x, z);
        self.heights[i] = y;
        self.normal_state = NormalState::Stale;
    }

    pub fn get_height(&self, x: usize, z: usize) -> f32 {
        self.heights[self.index(x, z)]
    }

    /// Returns the normal at (x, z), recomputing the whole normal field
    /// first if it is stale.
    pub fn get_normal(&mut self, x: usize, z: usize) -> Vec3 {
        self.compute_normals();
        self.normals[self.index(x, z)]
    }

    /// Rebuilds the normal field from the current heights. No-op while the
    /// field is already valid.
    ///
    /// Pass 1 accumulates, per cell, the unit face normals of the corner
    /// triangles formed with whichever of the four grid neighbors exist.
    /// Pass 2 blends each cell's rough normal with its in-bounds 4-neighbors
    /// scaled by `FALLOUT_RATIO`, substituting straight up when the blend
    /// cancels to zero.
    pub fn compute_normals(&mut self) {
        if self.normal_state == NormalState::Valid {
            return;
        }
        let (w, l) = (self.width, self.length);
        let h = |x: usize, z: usize| self.heights[z * w + x];

        let mut rough = vec![Vec3::ZERO; w * l];
        for z in 0..l {
            for x in 0..w {
                let here = h(x, z);
                // Edge vectors to the neighbors that exist.
                let out = (z > 0).then(|| Vec3::new(0.0, h(x, z - 1) - here, -1.0));
                let toward = (z + 1 < l).then(|| Vec3::new(0.0, h(x, z + 1) - here, 1.0));
                let left = (x > 0).then(|| Vec3::new(-1.0, h(x - 1, z) - here, 0.0));
                let right = (x + 1 < w).then(|| Vec3::new(1.0, h(x + 1, z) - here, 0.0));

                // Cross-product order keeps every face normal on the +Y side.
                let mut sum = Vec3::ZERO;
                if let (Some(out), Some(left)) = (out, left) {
                    sum += out.cross(left).normalize();
                }
                if let (Some(left), Some(toward)) = (left, toward) {
                    sum += left.cross(toward).normalize();
                }
                if let (Some(toward), Some(right)) = (toward, right) {
                    sum += toward.cross(right).normalize();
                }
                if let (Some(right), Some(out)) = (right, out) {
                    sum += right.cross(out).normalize();
                }
                rough[z * w + x] = sum;
            }
        }

        for z in 0..l {
            for x in 0..w {
                let mut sum = rough[z * w + x];
                if x > 0 {
                    sum += rough[z * w + x - 1] * FALLOUT_RATIO;
                }
                if x + 1 < w {
                    sum += rough[z * w + x + 1] * FALLOUT_RATIO;
                }
                if z > 0 {
                    sum += rough[(z - 1) * w + x] * FALLOUT_RATIO;
                }
                if z + 1 < l {
                    sum += rough[(z + 1) * w + x] * FALLOUT_RATIO;
                }
                if sum.length_squared() == 0.0 {
                    sum = Vec3::Y;
                }
                self.normals[z * w + x] = sum;
            }
        }
        self.normal_state = NormalState::Valid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: i32, length: i32, height: f32) -> Terrain {
        let mut t = Terrain::new(width, length).unwrap();
        for z in 0..t.length() {
            for x in 0..t.width() {
                t.set_height(x, z, height);
            }
        }
        t
    }

    /// 3x3 with a unit peak in the middle.
    fn center_peak() -> Terrain {
        let mut t = Terrain::new(3, 3).unwrap();
        t.set_height(1, 1, 1.0);
        t
    }

    #[test]
    fn dimensions_are_fixed_at_construction() {
        let t = Terrain::new(4, 7).unwrap();
        assert_eq!(t.width(), 4);
        assert_eq!(t.length(), 7);
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(Terrain::new(0, 5).is_err());
        assert!(Terrain::new(5, 0).is_err());
        assert!(Terrain::new(-3, 5).is_err());
    }

    #[test]
    fn heights_default_to_zero() {
        let t = Terrain::new(3, 3).unwrap();
        for z in 0..3 {
            for x in 0..3 {
                assert_eq!(t.get_height(x, z), 0.0);
            }
        }
    }

    #[test]
    fn set_then_get_returns_exact_value() {
        let mut t = Terrain::new(5, 5).unwrap();
        t.set_height(2, 3, 1.25);
        t.set_height(0, 0, -7.5);
        assert_eq!(t.get_height(2, 3), 1.25);
        assert_eq!(t.get_height(0, 0), -7.5);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn get_height_out_of_bounds_panics() {
        let t = Terrain::new(3, 3).unwrap();
        t.get_height(3, 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn set_height_out_of_bounds_panics() {
        let mut t = Terrain::new(3, 3).unwrap();
        t.set_height(0, 3, 1.0);
    }

    #[test]
    fn set_height_invalidates_normals() {
        let mut t = center_peak();
        let before = t.get_normal(1, 0);
        // Raising the peak steepens the slope under its neighbors.
        t.set_height(1, 1, 4.0);
        let after = t.get_normal(1, 0);
        assert_ne!(before, after);
    }

    #[test]
    fn compute_normals_is_idempotent() {
        let mut t = center_peak();
        t.compute_normals();
        let first: Vec<Vec3> = (0..3)
            .flat_map(|z| (0..3).map(move |x| (x, z)))
            .map(|(x, z)| t.get_normal(x, z))
            .collect();
        t.compute_normals();
        let second: Vec<Vec3> = (0..3)
            .flat_map(|z| (0..3).map(move |x| (x, z)))
            .map(|(x, z)| t.get_normal(x, z))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn flat_field_normals_point_straight_up() {
        let mut t = flat(5, 5, 2.0);
        for z in 0..5 {
            for x in 0..5 {
                let n = t.get_normal(x, z);
                assert_eq!(n.x, 0.0);
                assert_eq!(n.z, 0.0);
                assert!(n.y > 0.0);
            }
        }
    }

    #[test]
    fn degenerate_strip_falls_back_to_up() {
        // A single-column grid has no complete corner pair anywhere, so the
        // rough normals cancel to zero and every cell takes the fallback.
        let mut t = flat(1, 4, 3.0);
        for z in 0..4 {
            assert_eq!(t.get_normal(0, z), Vec3::Y);
        }
        let mut t = Terrain::new(1, 1).unwrap();
        assert_eq!(t.get_normal(0, 0), Vec3::Y);
    }

    #[test]
    fn corner_cells_use_only_available_neighbors() {
        let mut t = center_peak();
        for &(x, z) in &[(0, 0), (2, 0), (0, 2), (2, 2)] {
            let n = t.get_normal(x, z);
            assert!(n.is_finite());
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn center_peak_normals() {
        let mut t = center_peak();
        // The summit's normal is symmetric and points straight up.
        let top = t.get_normal(1, 1);
        assert!(top.y > 0.0);
        assert!(top.x.abs() < 1e-6);
        assert!(top.z.abs() < 1e-6);
        // Edge-midpoint cells sit on the flanks; their normals splay away
        // from the summit, downhill.
        assert!(t.get_normal(1, 0).z < 0.0);
        assert!(t.get_normal(1, 2).z > 0.0);
        assert!(t.get_normal(0, 1).x < 0.0);
        assert!(t.get_normal(2, 1).x > 0.0);
    }

    #[test]
    fn normals_are_not_renormalized() {
        // The smoothed field keeps its accumulated magnitude.
        let mut t = flat(5, 5, 0.0);
        let n = t.get_normal(2, 2);
        assert!(n.length() > 1.5);
    }
}

use glam::{Mat4, Quat, Vec3};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ViewPreset {
    Overview,
    Chase,
    Side,
    HighTrail,
}

impl ViewPreset {
    /// Whether the focus point tracks the avatar every frame.
    fn follows_avatar(self) -> bool {
        matches!(self, ViewPreset::Chase | ViewPreset::HighTrail)
    }
}

/// Orbit camera: the eye circles a focus point at `distance`, steered by
/// yaw/pitch in degrees.
pub struct OrbitCamera {
    pub focus: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub preset: ViewPreset,
}

impl OrbitCamera {
    pub fn new() -> Self {
        let mut camera = Self {
            focus: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            distance: 0.0,
            preset: ViewPreset::Overview,
        };
        camera.apply_preset(ViewPreset::Overview, Vec3::ZERO);
        camera
    }

    pub fn apply_preset(&mut self, preset: ViewPreset, avatar: Vec3) {
        self.preset = preset;
        match preset {
            ViewPreset::Overview => {
                self.focus = Vec3::ZERO;
                self.yaw = -140.0;
                self.pitch = 35.0;
                self.distance = 12.0;
            }
            ViewPreset::Chase => {
                self.focus = avatar;
                self.yaw = -140.0;
                self.pitch = 15.0;
                self.distance = 4.0;
            }
            ViewPreset::Side => {
                self.focus = avatar;
                self.yaw = -50.0;
                self.pitch = 10.0;
                self.distance = 6.0;
            }
            ViewPreset::HighTrail => {
                self.focus = avatar;
                self.yaw = -140.0;
                self.pitch = 60.0;
                self.distance = 9.0;
            }
        }
    }

    /// Keeps tracking presets glued to the avatar.
    pub fn follow(&mut self, avatar: Vec3) {
        if self.preset.follows_avatar() {
            self.focus = avatar;
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        let rotation = Quat::from_rotation_y(self.yaw.to_radians())
            * Quat::from_rotation_x(-self.pitch.to_radians());
        self.focus + rotation * Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn build_view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.focus, Vec3::Y)
    }
}

pub struct Projection {
    aspect: f32,
    fovy: f32,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy_degrees: f32, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy_degrees.to_radians(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn build_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_presets_follow_the_avatar() {
        let mut camera = OrbitCamera::new();
        camera.apply_preset(ViewPreset::Chase, Vec3::new(1.0, 0.0, 2.0));
        camera.follow(Vec3::new(3.0, 1.0, 4.0));
        assert_eq!(camera.focus, Vec3::new(3.0, 1.0, 4.0));
    }

    #[test]
    fn overview_ignores_follow() {
        let mut camera = OrbitCamera::new();
        camera.follow(Vec3::new(3.0, 1.0, 4.0));
        assert_eq!(camera.focus, Vec3::ZERO);
    }

    #[test]
    fn eye_sits_at_orbit_distance() {
        let mut camera = OrbitCamera::new();
        camera.apply_preset(ViewPreset::Side, Vec3::new(2.0, 0.5, 2.0));
        let eye = camera.eye_position();
        assert!((eye.distance(camera.focus) - camera.distance).abs() < 1e-4);
    }
}

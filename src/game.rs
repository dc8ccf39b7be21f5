use glam::Vec2;
use rand::Rng;

use crate::terrain::Terrain;

pub const TARGET_HIT_RADIUS: f32 = 7.5;
const THRUST_STEP: f32 = 0.3;
const STEER_STEP: f32 = 0.05;
const DRAG: f32 = 0.05;
const STOP_EPSILON: f32 = 0.08;
const START_POS: Vec2 = Vec2::new(8.0, 8.0);
const TARGET_X: f32 = 55.0;

/// All transient game state in one place: the spinning-top avatar, the aim
/// being wound up for the next launch, the target ring, and the score.
/// Positions and velocities live on the terrain's XZ grid plane.
pub struct GameState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub heading: f32,
    pub thrust: f32,
    pub target: Vec2,
    pub score: u32,
    pub spin_degrees: f32,
}

impl GameState {
    pub fn new() -> Self {
        let mut state = Self {
            position: START_POS,
            velocity: Vec2::ZERO,
            heading: 0.0,
            thrust: 0.0,
            target: Vec2::new(TARGET_X, 0.0),
            score: 0,
            spin_degrees: 0.0,
        };
        state.respawn_target();
        state
    }

    pub fn adjust_thrust(&mut self, delta: f32) {
        self.thrust += delta * THRUST_STEP;
    }

    pub fn steer(&mut self, delta: f32) {
        self.heading += delta * STEER_STEP;
    }

    /// Converts the wound-up thrust into velocity along the current heading,
    /// then clears the aim.
    pub fn launch(&mut self) {
        self.velocity = self.thrust * Vec2::new(self.heading.cos(), self.heading.sin());
        self.thrust = 0.0;
        self.heading = 0.0;
    }

    /// One fixed tick: integrate position, decay velocity toward rest, and
    /// keep the top spinning.
    pub fn tick(&mut self) {
        self.position += self.velocity;
        self.velocity.x = decay(self.velocity.x);
        self.velocity.y = decay(self.velocity.y);
        self.spin_degrees = (self.spin_degrees + 1.0) % 360.0;
    }

    /// The avatar's cell on the terrain grid, clamped so a launch past the
    /// edge never indexes out of bounds.
    pub fn grid_position(&self, terrain: &Terrain) -> (usize, usize) {
        let x = (self.position.x.max(0.0) as usize).min(terrain.width() - 1);
        let z = (self.position.y.max(0.0) as usize).min(terrain.length() - 1);
        (x, z)
    }

    /// Checks for a target hit; on a hit, bumps the score, sends the avatar
    /// back to the start, and respawns the target. Returns whether a hit
    /// happened so the caller can reset the camera too.
    pub fn detect_target(&mut self) -> bool {
        if self.position.distance(self.target) >= TARGET_HIT_RADIUS {
            return false;
        }
        self.score += 1;
        log::info!("target hit, score {}", self.score);
        self.position = START_POS;
        self.velocity = Vec2::ZERO;
        self.heading = 0.0;
        self.thrust = 0.0;
        self.respawn_target();
        true
    }

    fn respawn_target(&mut self) {
        self.target = Vec2::new(TARGET_X, rand::thread_rng().gen_range(15..45) as f32);
    }
}

fn decay(v: f32) -> f32 {
    if v.abs() < STOP_EPSILON {
        0.0
    } else if v > 0.0 {
        v - DRAG
    } else {
        v + DRAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_converts_aim_into_velocity() {
        let mut g = GameState::new();
        g.adjust_thrust(4.0); // 1.2
        g.launch();
        assert!((g.velocity.x - 1.2).abs() < 1e-6);
        assert!(g.velocity.y.abs() < 1e-6);
        assert_eq!(g.thrust, 0.0);
        assert_eq!(g.heading, 0.0);
    }

    #[test]
    fn steering_rotates_the_launch_direction() {
        let mut g = GameState::new();
        g.adjust_thrust(10.0); // 3.0
        // Quarter turn: 0.05 rad per step.
        for _ in 0..10 {
            g.steer(1.0);
        }
        g.launch();
        assert!((g.velocity.x - 3.0 * 0.5f32.cos()).abs() < 1e-5);
        assert!((g.velocity.y - 3.0 * 0.5f32.sin()).abs() < 1e-5);
    }

    #[test]
    fn velocity_decays_and_snaps_to_rest() {
        let mut g = GameState::new();
        g.velocity = Vec2::new(0.12, -0.12);
        g.tick();
        assert!((g.velocity.x - 0.07).abs() < 1e-6);
        assert!((g.velocity.y + 0.07).abs() < 1e-6);
        g.tick();
        assert_eq!(g.velocity, Vec2::ZERO);
    }

    #[test]
    fn tick_integrates_position_before_decay() {
        let mut g = GameState::new();
        let start = g.position;
        g.velocity = Vec2::new(1.0, 2.0);
        g.tick();
        assert_eq!(g.position, start + Vec2::new(1.0, 2.0));
    }

    #[test]
    fn grid_position_clamps_to_terrain_bounds() {
        let terrain = Terrain::new(10, 10).unwrap();
        let mut g = GameState::new();
        g.position = Vec2::new(-4.0, 300.0);
        assert_eq!(g.grid_position(&terrain), (0, 9));
    }

    #[test]
    fn target_hit_scores_and_resets() {
        let mut g = GameState::new();
        g.velocity = Vec2::new(1.0, 1.0);
        g.position = g.target + Vec2::new(1.0, 1.0);
        assert!(g.detect_target());
        assert_eq!(g.score, 1);
        assert_eq!(g.position, START_POS);
        assert_eq!(g.velocity, Vec2::ZERO);
        // The respawned target stays in its spawn band.
        assert_eq!(g.target.x, TARGET_X);
        assert!(g.target.y >= 15.0 && g.target.y < 45.0);
    }

    #[test]
    fn far_from_target_is_not_a_hit() {
        let mut g = GameState::new();
        g.position = g.target + Vec2::new(TARGET_HIT_RADIUS + 1.0, 0.0);
        assert!(!g.detect_target());
        assert_eq!(g.score, 0);
    }
}

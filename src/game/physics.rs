//! Platformer physics: fixed-step integration and platform collision

use serde::Deserialize;

use crate::config::PhysicsConstants;

use super::player::{Body, PlayerInput};

/// Static level rectangle, origin top-left, y grows downward
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Overlap test for two rectangles; touching edges do not count
#[allow(clippy::too_many_arguments)]
pub fn aabb_overlap(
    ax: f32,
    ay: f32,
    aw: f32,
    ah: f32,
    bx: f32,
    by: f32,
    bw: f32,
    bh: f32,
) -> bool {
    !(ax + aw <= bx || ax >= bx + bw || ay + ah <= by || ay >= by + bh)
}

/// Physics system for advancing player bodies
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one body by `dt` seconds under the given input.
    ///
    /// Platforms are checked in slice order and the first overlapping one
    /// wins: the body is placed on top of it regardless of approach side.
    pub fn step(
        body: &mut Body,
        input: PlayerInput,
        dt: f32,
        platforms: &[Platform],
        constants: &PhysicsConstants,
    ) {
        body.vx = input.horizontal_axis() * constants.move_speed;
        body.vy += constants.gravity * dt;

        // A jump overrides this step's gravity
        if input.up && body.on_ground {
            body.vy = -constants.jump_velocity;
            body.on_ground = false;
        }

        body.x += body.vx * dt;
        body.y += body.vy * dt;

        body.on_ground = false;
        if let Some(platform) = Self::first_overlap(body, platforms, constants) {
            body.y = platform.y - constants.player_height;
            body.vy = 0.0;
            body.on_ground = true;
        }
    }

    fn first_overlap<'a>(
        body: &Body,
        platforms: &'a [Platform],
        constants: &PhysicsConstants,
    ) -> Option<&'a Platform> {
        platforms.iter().find(|p| {
            aabb_overlap(
                body.x,
                body.y,
                constants.player_width,
                constants.player_height,
                p.x,
                p.y,
                p.width,
                p.height,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_platforms;

    const DT: f32 = 1.0 / 60.0;

    fn constants() -> PhysicsConstants {
        PhysicsConstants::default()
    }

    #[test]
    fn aabb_edges_touching_do_not_overlap() {
        assert!(aabb_overlap(0.0, 0.0, 10.0, 10.0, 5.0, 5.0, 10.0, 10.0));
        assert!(!aabb_overlap(0.0, 0.0, 10.0, 10.0, 10.0, 0.0, 10.0, 10.0));
        assert!(!aabb_overlap(0.0, 0.0, 10.0, 10.0, 0.0, 10.0, 10.0, 10.0));
    }

    #[test]
    fn horizontal_velocity_is_instant() {
        let mut body = Body::at(100.0, 100.0);
        let input = PlayerInput {
            right: true,
            ..Default::default()
        };
        PhysicsSystem::step(&mut body, input, DT, &[], &constants());
        assert_eq!(body.vx, 400.0);

        let input = PlayerInput {
            left: true,
            ..Default::default()
        };
        PhysicsSystem::step(&mut body, input, DT, &[], &constants());
        assert_eq!(body.vx, -400.0);

        PhysicsSystem::step(&mut body, PlayerInput::default(), DT, &[], &constants());
        assert_eq!(body.vx, 0.0);
    }

    #[test]
    fn gravity_accumulates_in_the_air() {
        let mut body = Body::at(0.0, 0.0);
        PhysicsSystem::step(&mut body, PlayerInput::default(), 0.1, &[], &constants());
        assert!((body.vy - 150.0).abs() < 1e-3);
        assert!((body.y - 15.0).abs() < 1e-3);
        assert!(!body.on_ground);

        PhysicsSystem::step(&mut body, PlayerInput::default(), 0.1, &[], &constants());
        assert!((body.vy - 300.0).abs() < 1e-3);
    }

    #[test]
    fn jump_from_ground() {
        let mut body = Body {
            on_ground: true,
            ..Body::at(0.0, 0.0)
        };
        let input = PlayerInput {
            up: true,
            ..Default::default()
        };
        PhysicsSystem::step(&mut body, input, DT, &[], &constants());

        assert!(!body.on_ground);
        assert_eq!(body.vy, -700.0);
        assert!((body.y - (-700.0 * DT)).abs() < 1e-3);

        // Gravity resumes on the following step
        PhysicsSystem::step(&mut body, input, DT, &[], &constants());
        assert!((body.vy - (-700.0 + 1500.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn jump_off_platform_leaves_it() {
        let platforms = [Platform::new(0.0, 980.0, 1920.0, 250.0)];
        let mut body = Body {
            on_ground: true,
            ..Body::at(50.0, 920.0)
        };
        let input = PlayerInput {
            up: true,
            ..Default::default()
        };
        PhysicsSystem::step(&mut body, input, DT, &platforms, &constants());
        assert_eq!(body.vy, -700.0);
        assert!(body.y < 920.0);
        assert!(!body.on_ground);
    }

    #[test]
    fn no_jump_while_airborne() {
        let mut body = Body::at(0.0, 0.0);
        let input = PlayerInput {
            up: true,
            ..Default::default()
        };
        PhysicsSystem::step(&mut body, input, DT, &[], &constants());
        assert!(body.vy > 0.0);
    }

    #[test]
    fn landing_snaps_to_platform_top() {
        let platforms = [Platform::new(0.0, 980.0, 1920.0, 250.0)];
        let mut body = Body {
            vy: 600.0,
            ..Body::at(50.0, 915.0)
        };
        PhysicsSystem::step(&mut body, PlayerInput::default(), DT, &platforms, &constants());

        assert_eq!(body.y, 920.0);
        assert_eq!(body.vy, 0.0);
        assert!(body.on_ground);
    }

    #[test]
    fn standing_player_stays_grounded() {
        let platforms = [Platform::new(0.0, 980.0, 1920.0, 250.0)];
        let mut body = Body {
            on_ground: true,
            ..Body::at(50.0, 920.0)
        };
        for _ in 0..120 {
            PhysicsSystem::step(&mut body, PlayerInput::default(), DT, &platforms, &constants());
            assert_eq!(body.y, 920.0);
            assert!(body.on_ground);
        }
    }

    #[test]
    fn first_platform_in_order_wins() {
        let upper = Platform::new(0.0, 100.0, 200.0, 20.0);
        let lower = Platform::new(0.0, 110.0, 200.0, 20.0);
        let start = Body::at(10.0, 50.0);

        let mut body = start;
        PhysicsSystem::step(&mut body, PlayerInput::default(), DT, &[upper, lower], &constants());
        assert_eq!(body.y, 40.0);

        let mut body = start;
        PhysicsSystem::step(&mut body, PlayerInput::default(), DT, &[lower, upper], &constants());
        assert_eq!(body.y, 50.0);
    }

    #[test]
    fn step_is_deterministic() {
        let platforms = default_platforms();
        let input = PlayerInput {
            left: false,
            right: true,
            up: true,
        };
        let start = Body {
            vx: 12.0,
            vy: -3.0,
            ..Body::at(310.0, 700.0)
        };

        let mut a = start;
        let mut b = start;
        for _ in 0..200 {
            PhysicsSystem::step(&mut a, input, DT, &platforms, &constants());
            PhysicsSystem::step(&mut b, input, DT, &platforms, &constants());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn one_second_of_right_input_moves_by_speed() {
        let platforms = default_platforms();
        let mut body = Body {
            on_ground: true,
            ..Body::at(100.0, 920.0)
        };
        let input = PlayerInput {
            right: true,
            ..Default::default()
        };
        for _ in 0..60 {
            PhysicsSystem::step(&mut body, input, DT, &platforms, &constants());
        }
        assert!((body.x - 500.0).abs() < 1.0, "x = {}", body.x);
    }
}

//! Drum machine physics: geometry, balls, and the per-ball force model.
//!
//! Coordinates are canvas pixels with y growing downwards, so gravity adds
//! to vy and the air jet subtracts from it. One call = one fixed frame;
//! there is no sub-stepping.

use crate::{
    config::DrumConfig,
    rng::RandomSource,
    types::Number,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Fixed machine layout for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumGeometry {
    pub center:         Point,
    pub radius:         f64,
    /// Near the top of the drum.
    pub suction_center: Point,
    pub suction_radius: f64,
    /// Air-jet corridor, centred horizontally, rising from the bottom.
    pub jet_width:      f64,
    pub jet_height:     f64,
}

impl DrumGeometry {
    /// Drum centred on the canvas.
    pub fn from_config(config: &DrumConfig) -> Self {
        let center = Point { x: config.canvas_width / 2.0, y: config.canvas_height / 2.0 };
        Self {
            center,
            radius: config.drum_radius,
            suction_center: Point {
                x: center.x,
                y: center.y - config.drum_radius + config.suction_offset,
            },
            suction_radius: config.suction_radius,
            jet_width: config.jet_width,
            jet_height: config.jet_height,
        }
    }

    pub fn in_jet_corridor(&self, p: Point) -> bool {
        (p.x - self.center.x).abs() < self.jet_width / 2.0
    }

    /// Bottom band of the corridor where the jet blasts at full strength.
    pub fn in_blast_zone(&self, p: Point) -> bool {
        p.y > self.center.y + self.radius - self.jet_height
    }

    pub fn in_suction_zone(&self, p: Point) -> bool {
        p.distance_to(self.suction_center) < self.suction_radius
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimBall {
    /// Printed label; also selects the colour band.
    pub id:          Number,
    pub x:           f64,
    pub y:           f64,
    pub vx:          f64,
    pub vy:          f64,
    pub radius:      f64,
    pub mass:        f64,
    pub restitution: f64,
    /// Per-frame velocity multiplier.
    pub friction:    f64,
}

impl SimBall {
    /// Random position inside the drum, random velocity, mass near 1.0.
    /// Overlapping spawns are allowed; collisions separate them.
    pub async fn spawn(
        id: Number,
        geometry: &DrumGeometry,
        params: &DrumConfig,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let angle = rng.next_f64().await * PI * 2.0;
        let r = rng.next_f64().await * (geometry.radius - params.spawn_margin).max(0.0);
        let vx = (rng.next_f64().await - 0.5) * params.spawn_speed;
        let vy = (rng.next_f64().await - 0.5) * params.spawn_speed;
        let mass = 1.0 + (rng.next_f64().await - 0.5) * params.mass_jitter;
        Self {
            id,
            x: geometry.center.x + angle.cos() * r,
            y: geometry.center.y + angle.sin() * r,
            vx,
            vy,
            radius: params.ball_radius,
            mass,
            restitution: params.restitution,
            friction: params.friction,
        }
    }

    pub fn position(&self) -> Point {
        Point { x: self.x, y: self.y }
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * (self.vx * self.vx + self.vy * self.vy)
    }
}

/// Gravity, air jet, damping, then advance position.
pub async fn integrate(
    ball: &mut SimBall,
    geometry: &DrumGeometry,
    params: &DrumConfig,
    rng: &mut dyn RandomSource,
) {
    ball.vy += params.gravity;

    let turbulence = params.turbulence;
    if turbulence > 0.0 && geometry.in_jet_corridor(ball.position()) {
        if geometry.in_blast_zone(ball.position()) {
            ball.vy -= turbulence * params.blast_lift_factor + rng.next_f64().await * params.blast_chaos;
            ball.vx += (rng.next_f64().await - 0.5) * params.blast_jitter;
        } else if ball.y > geometry.center.y {
            // Weak residual lift; push sideways so balls cycle back down.
            ball.vy -= turbulence * params.dispersal_lift_factor;
            ball.vx += (rng.next_f64().await - 0.5) * params.dispersal_jitter;
        }
    }

    ball.vx *= ball.friction;
    ball.vy *= ball.friction;

    ball.x += ball.vx;
    ball.y += ball.vy;
}

/// Keep the ball inside the drum. Returns true if it hit the wall.
pub fn collide_wall(ball: &mut SimBall, geometry: &DrumGeometry, tangential_damping: f64) -> bool {
    let dx = ball.x - geometry.center.x;
    let dy = ball.y - geometry.center.y;
    let dist = dx.hypot(dy);
    if dist + ball.radius <= geometry.radius || dist == 0.0 {
        return false;
    }

    let nx = dx / dist;
    let ny = dy / dist;
    let overlap = dist + ball.radius - geometry.radius;
    ball.x -= nx * overlap;
    ball.y -= ny * overlap;

    let dot = ball.vx * nx + ball.vy * ny;
    ball.vx = (ball.vx - 2.0 * dot * nx) * ball.restitution;
    ball.vy = (ball.vy - 2.0 * dot * ny) * ball.restitution;

    // Surface friction along the wall tangent.
    let tx = -ny;
    let ty = nx;
    let t_dot = ball.vx * tx + ball.vy * ty;
    ball.vx -= tx * t_dot * tangential_damping;
    ball.vy -= ty * t_dot * tangential_damping;
    true
}

/// 2D elastic collision with unequal masses. Returns true if the pair
/// overlapped and was resolved.
pub fn resolve_pair(b1: &mut SimBall, b2: &mut SimBall) -> bool {
    let dx = b2.x - b1.x;
    let dy = b2.y - b1.y;
    let distance = dx.hypot(dy);
    if distance >= b1.radius + b2.radius {
        return false;
    }

    let angle = dy.atan2(dx);
    let (sin, cos) = angle.sin_cos();

    // Rotate into the collision-normal frame.
    let vx1 = b1.vx * cos + b1.vy * sin;
    let vy1 = b1.vy * cos - b1.vx * sin;
    let vx2 = b2.vx * cos + b2.vy * sin;
    let vy2 = b2.vy * cos - b2.vx * sin;

    let total = b1.mass + b2.mass;
    let vx1_final = ((b1.mass - b2.mass) * vx1 + 2.0 * b2.mass * vx2) / total;
    let vx2_final = ((b2.mass - b1.mass) * vx2 + 2.0 * b1.mass * vx1) / total;

    b1.vx = vx1_final * cos - vy1 * sin;
    b1.vy = vy1 * cos + vx1_final * sin;
    b2.vx = vx2_final * cos - vy2 * sin;
    b2.vy = vy2 * cos + vx2_final * sin;

    let overlap = (b1.radius + b2.radius - distance) / 2.0;
    b1.x -= overlap * cos;
    b1.y -= overlap * sin;
    b2.x += overlap * cos;
    b2.y += overlap * sin;
    true
}

/// O(n²) sweep over every pair. Returns the number of resolved contacts.
pub fn resolve_collisions(balls: &mut [SimBall]) -> usize {
    let mut contacts = 0;
    for i in 0..balls.len() {
        let (head, tail) = balls.split_at_mut(i + 1);
        let b1 = &mut head[i];
        for b2 in tail.iter_mut() {
            if resolve_pair(b1, b2) {
                contacts += 1;
            }
        }
    }
    contacts
}

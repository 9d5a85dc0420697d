//! Lightning bolts: short-lived, beat-spawned particles with jagged branches.

use glam::Vec2;
use rand::Rng;
use tracing::debug;

use super::canvas::Canvas;
use super::color::Rgba;
use crate::audio::BeatEvent;

/// Longest lifetime a bolt can be spawned with (ticks)
pub const MAX_LIFETIME: i32 = 15;

/// Shortest lifetime a bolt can be spawned with (ticks)
pub const MIN_LIFETIME: i32 = 5;

/// Side branch of a bolt, relative to its core path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch {
    /// Angle relative to the core direction (degrees)
    pub angle_offset: f32,
    /// Length as a fraction of the core length
    pub length_fraction: f32,
    /// Where along the core the branch starts (0 = center, 1 = tip)
    pub start_fraction: f32,
}

/// A single lightning bolt radiating from the canvas center
#[derive(Debug, Clone)]
pub struct LightningBolt {
    angle: f32,
    reach: f32,
    lifetime: i32,
    width: f32,
    color: Rgba,
    alpha: f32,
    flicker: f32,
    branches: Vec<Branch>,
}

impl LightningBolt {
    /// Spawn a bolt pointing at `angle` degrees, shaped by beat `intensity`
    pub fn new<R: Rng>(angle: f32, intensity: f32, rng: &mut R) -> Self {
        let intensity = intensity.max(1.0);

        let variation = rng.gen_range(-100..=100) as f32;
        let channel = ((217.0 + variation) * intensity).clamp(0.0, 255.0) as u8;

        // Strong beats may fork a third branch
        let branch_count = if intensity > 1.5 {
            rng.gen_range(2..=3)
        } else {
            2
        };
        let branches = (0..branch_count)
            .map(|_| Branch {
                angle_offset: rng.gen_range(-45.0..=45.0) * intensity,
                length_fraction: rng.gen_range(0.5..=1.0) * intensity,
                start_fraction: rng.gen_range(0.3..=0.7),
            })
            .collect();

        Self {
            angle,
            reach: rng.gen_range(0.8..=1.0),
            lifetime: rng.gen_range(MIN_LIFETIME..=MAX_LIFETIME),
            width: rng.gen_range(0.15..=0.25) * intensity,
            color: Rgba::rgb(channel, channel, channel),
            alpha: (255.0 * intensity).min(255.0),
            flicker: rng.gen(),
            branches,
        }
    }

    /// Advance one tick; returns `false` once the bolt has expired
    pub fn update<R: Rng>(&mut self, rng: &mut R) -> bool {
        self.lifetime -= 1;
        self.flicker = rng.gen();
        let remaining = self.lifetime.max(0) as f32 / MAX_LIFETIME as f32;
        self.alpha = remaining * 255.0 * (0.7 + 0.3 * self.flicker);
        self.lifetime > 0
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn lifetime(&self) -> i32 {
        self.lifetime
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Draw the core path and its branches from the canvas center
    pub fn render<R: Rng>(&self, canvas: &mut Canvas, rng: &mut R) {
        let (w, h) = (canvas.width() as f32, canvas.height() as f32);
        let bounds = Vec2::new(w, h);
        let center = canvas.center();

        let core_len = self.reach * w.min(h * 0.75);
        let core_end = (center + Vec2::from_angle(self.angle.to_radians()) * core_len)
            .clamp(Vec2::ZERO, bounds);
        let core = jagged_path(center, core_end, 10, rng);
        self.draw_path(canvas, &core, false, rng);

        let branch_cap = w.min(h) * 0.99;
        for branch in &self.branches {
            let start = center.lerp(core_end, branch.start_fraction);
            let length = (core_len * branch.length_fraction).min(branch_cap);
            let direction = Vec2::from_angle((self.angle + branch.angle_offset).to_radians());
            let end = (start + direction * length).clamp(Vec2::ZERO, bounds);
            let path = jagged_path(start, end, 6, rng);
            self.draw_path(canvas, &path, true, rng);
        }
    }

    /// Layered strokes: wide and faint underneath, narrow and bright on top
    fn draw_path<R: Rng>(
        &self,
        canvas: &mut Canvas,
        points: &[Vec2],
        is_branch: bool,
        rng: &mut R,
    ) {
        let layers = if is_branch { 3 } else { 4 };
        let base_width = self.width * if is_branch { 0.6 } else { 1.0 };

        for layer in 0..layers {
            let width = base_width * (5 - layer) as f32;
            let alpha = self.alpha * 0.8f32.powi(layer) * self.flicker;
            let color = self.color.with_alpha(alpha.clamp(0.0, 255.0) as u8);

            canvas.stroke_polyline(points, width, color);

            if !is_branch {
                for &p in &points[..points.len().saturating_sub(1)] {
                    if rng.gen::<f32>() < 0.2 {
                        let offset = rng.gen_range(-20.0..=20.0);
                        canvas.stroke_line(p, p + Vec2::splat(offset), width * 0.5, color);
                    }
                }
            }
        }
    }
}

/// Jittered polyline from `start` to `end`
///
/// Interior points sit on the straight line plus a perpendicular offset whose
/// bound shrinks linearly to zero towards `end`; now and then an extra
/// displaced midpoint is inserted.
pub fn jagged_path<R: Rng>(start: Vec2, end: Vec2, segments: usize, rng: &mut R) -> Vec<Vec2> {
    let delta = end - start;
    let dist = delta.length();
    let normal = delta.perp().normalize_or_zero();

    let mut points = Vec::with_capacity(segments * 2 + 2);
    points.push(start);

    for i in 0..segments {
        let progress = (i + 1) as f32 / (segments + 1) as f32;
        let zigzag = (1.0 - progress) * dist * 0.2;

        let straight = start + delta * progress;
        let point = straight + normal * rng.gen_range(-1.0f32..=1.0) * zigzag;

        if rng.gen::<f32>() < 0.3 {
            let last = points[points.len() - 1];
            let jitter = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
            points.push((last + point) / 2.0 + jitter * 100.0);
        }
        points.push(point);
    }

    points.push(end);
    points
}

/// Live bolt collection with a hard population cap
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    bolts: Vec<LightningBolt>,
    max_live: usize,
}

impl ParticleSystem {
    pub fn new(max_live: usize) -> Self {
        Self {
            bolts: Vec::new(),
            max_live,
        }
    }

    /// Add one bolt; returns `false` if the cap is reached
    pub fn spawn<R: Rng>(&mut self, angle: f32, intensity: f32, rng: &mut R) -> bool {
        if self.bolts.len() >= self.max_live {
            return false;
        }
        self.bolts.push(LightningBolt::new(angle, intensity, rng));
        true
    }

    /// Spawn `1..=⌊intensity⌋` bolts at random angles for a beat
    ///
    /// Returns the number actually spawned.
    pub fn spawn_burst<R: Rng>(&mut self, beat: &BeatEvent, rng: &mut R) -> usize {
        if !beat.occurred {
            return 0;
        }
        let upper = (beat.intensity.max(1.0) as usize).max(1);
        let wanted = rng.gen_range(1..=upper);

        let mut spawned = 0;
        for _ in 0..wanted {
            let angle = rng.gen_range(0.0..360.0);
            if !self.spawn(angle, beat.intensity, rng) {
                debug!(
                    "Particle cap {} reached, dropped {} bolts",
                    self.max_live,
                    wanted - spawned
                );
                break;
            }
            spawned += 1;
        }
        spawned
    }

    /// Age every bolt and drop the expired ones; returns the live count
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> usize {
        self.bolts.retain_mut(|bolt| bolt.update(rng));
        self.bolts.len()
    }

    pub fn render<R: Rng>(&self, canvas: &mut Canvas, rng: &mut R) {
        for bolt in &self.bolts {
            bolt.render(canvas, rng);
        }
    }

    pub fn bolts(&self) -> &[LightningBolt] {
        &self.bolts
    }

    pub fn len(&self) -> usize {
        self.bolts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bolts.is_empty()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn beat(intensity: f32) -> BeatEvent {
        BeatEvent {
            occurred: true,
            intensity,
        }
    }

    #[test]
    fn test_bolt_shape_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let bolt = LightningBolt::new(90.0, 1.2, &mut rng);
            assert!((MIN_LIFETIME..=MAX_LIFETIME).contains(&bolt.lifetime()));
            assert_eq!(bolt.branches().len(), 2);
            for branch in bolt.branches() {
                assert!((0.3..=0.7).contains(&branch.start_fraction));
            }
        }
    }

    #[test]
    fn test_strong_bolts_fork_two_or_three_branches() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [0usize; 4];
        for _ in 0..1000 {
            let bolt = LightningBolt::new(0.0, 3.0, &mut rng);
            let n = bolt.branches().len();
            assert!((2..=3).contains(&n), "strong bolt had {n} branches");
            seen[n] += 1;
        }
        assert!(seen[2] > 0 && seen[3] > 0);

        // 1.5 itself is not strong
        for _ in 0..100 {
            assert_eq!(LightningBolt::new(0.0, 1.5, &mut rng).branches().len(), 2);
        }
    }

    #[test]
    fn test_removed_on_tick_lifetime_reaches_zero() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut system = ParticleSystem::new(8);
        assert!(system.spawn(45.0, 1.0, &mut rng));
        let lifetime = system.bolts()[0].lifetime();

        for k in 1..lifetime {
            assert_eq!(system.tick(&mut rng), 1, "removed early at tick {k}");
            assert_eq!(system.bolts()[0].lifetime(), lifetime - k);
        }
        assert_eq!(system.tick(&mut rng), 0);
    }

    #[test]
    fn test_burst_respects_cap() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut system = ParticleSystem::new(5);

        for _ in 0..20 {
            system.spawn_burst(&beat(40.0), &mut rng);
            assert!(system.len() <= 5);
        }
        assert_eq!(system.len(), 5);
    }

    #[test]
    fn test_no_burst_without_beat() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut system = ParticleSystem::new(10);
        assert_eq!(system.spawn_burst(&BeatEvent::NONE, &mut rng), 0);
        assert!(system.is_empty());
    }

    #[test]
    fn test_burst_size_bounded_by_intensity() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let mut system = ParticleSystem::new(100);
            let spawned = system.spawn_burst(&beat(3.7), &mut rng);
            assert!((1..=3).contains(&spawned));
        }
    }

    #[test]
    fn test_jagged_path_endpoints() {
        let mut rng = StdRng::seed_from_u64(6);
        let start = Vec2::new(10.0, 10.0);
        let end = Vec2::new(200.0, 50.0);

        let path = jagged_path(start, end, 10, &mut rng);

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert!(path.len() >= 12 && path.len() <= 22);
    }

    #[test]
    fn test_render_marks_canvas() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut system = ParticleSystem::new(4);
        for angle in [0.0, 90.0, 180.0, 270.0] {
            system.spawn(angle, 3.0, &mut rng);
        }
        system.tick(&mut rng);

        let mut canvas = Canvas::new(100, 100).unwrap();
        system.render(&mut canvas, &mut rng);

        assert!(canvas.data().chunks(4).any(|px| px[3] > 0));
    }

    proptest! {
        #[test]
        fn prop_lifetime_strictly_decreases(seed in any::<u64>(), intensity in 1.0f32..6.0) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut bolt = LightningBolt::new(0.0, intensity, &mut rng);
            let mut previous = bolt.lifetime();
            let mut alive = true;
            while alive {
                alive = bolt.update(&mut rng);
                prop_assert_eq!(bolt.lifetime(), previous - 1);
                prop_assert_eq!(alive, bolt.lifetime() > 0);
                prop_assert!(bolt.alpha() >= 0.0 && bolt.alpha() <= 255.0);
                previous = bolt.lifetime();
            }
        }
    }
}

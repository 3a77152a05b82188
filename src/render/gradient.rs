//! Template gradients
//!
//! Linear gradients painted behind cards that have no picture.

use crate::config::GradientKey;
use crate::utils::color::Rgb;

/// Color stops for a template gradient key
pub fn gradient_stops(key: GradientKey) -> [Rgb; 2] {
    match key {
        GradientKey::Love => [Rgb::new(0xFB, 0xCF, 0xE8), Rgb::new(0xF4, 0x72, 0xB6)],
        GradientKey::Friendship => [Rgb::new(0xDD, 0xD6, 0xFE), Rgb::new(0xA7, 0x8B, 0xFA)],
        GradientKey::Gratitude => [Rgb::new(0xFF, 0xED, 0xD5), Rgb::new(0xFD, 0xBA, 0x74)],
        GradientKey::Inspiration => [Rgb::new(0xD1, 0xFA, 0xE5), Rgb::new(0x6E, 0xE7, 0xB7)],
        GradientKey::Primary => [Rgb::new(0xF4, 0x72, 0xB6), Rgb::new(0xA7, 0x8B, 0xFA)],
        GradientKey::Secondary => [Rgb::new(0xFD, 0xE6, 0x8A), Rgb::new(0xFC, 0xA5, 0xA5)],
        GradientKey::Outline => [Rgb::new(0xF9, 0xFA, 0xFB), Rgb::new(0xE5, 0xE7, 0xEB)],
    }
}

/// Interpolate between colors in a gradient
pub fn interpolate_gradient(colors: &[Rgb], t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let n = colors.len();

    if n == 0 {
        return Rgb::WHITE;
    }
    if n == 1 {
        return colors[0];
    }

    // Calculate which segment we're in
    let segment_count = n - 1;
    let scaled_t = t * segment_count as f32;
    let segment = (scaled_t as usize).min(segment_count - 1);
    let local_t = scaled_t - segment as f32;

    colors[segment].lerp(colors[segment + 1], local_t)
}

/// A CSS-style linear gradient over a `width` x `height` box
///
/// The angle follows CSS: 0 points up, 90 points right, 135 runs from the
/// top-left corner to the bottom-right corner.
#[derive(Debug, Clone, Copy)]
pub struct LinearGradient {
    dir_x: f32,
    dir_y: f32,
    center_x: f32,
    center_y: f32,
    length: f32,
}

impl LinearGradient {
    pub fn new(width: f32, height: f32, angle_deg: f32) -> Self {
        let angle = angle_deg.to_radians();
        let (dir_x, dir_y) = (angle.sin(), -angle.cos());
        let length = (width * dir_x).abs() + (height * dir_y).abs();

        Self {
            dir_x,
            dir_y,
            center_x: width / 2.0,
            center_y: height / 2.0,
            length: length.max(f32::EPSILON),
        }
    }

    /// Position along the gradient line (0 at the start corner, 1 at the end)
    pub fn t_at(&self, x: f32, y: f32) -> f32 {
        let projected = (x - self.center_x) * self.dir_x + (y - self.center_y) * self.dir_y;
        (projected / self.length + 0.5).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_endpoints() {
        let stops = gradient_stops(GradientKey::Love);
        assert_eq!(interpolate_gradient(&stops, 0.0), stops[0]);
        assert_eq!(interpolate_gradient(&stops, 1.0), stops[1]);
        assert_eq!(interpolate_gradient(&[], 0.3), Rgb::WHITE);
    }

    #[test]
    fn test_diagonal_gradient_corners() {
        let gradient = LinearGradient::new(300.0, 400.0, 135.0);
        assert!(gradient.t_at(0.0, 0.0) < 0.01);
        assert!(gradient.t_at(300.0, 400.0) > 0.99);
        assert!((gradient.t_at(150.0, 200.0) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_vertical_gradient() {
        let gradient = LinearGradient::new(100.0, 100.0, 180.0);
        assert!(gradient.t_at(10.0, 0.0) < 0.01);
        assert!(gradient.t_at(90.0, 100.0) > 0.99);
        assert!((gradient.t_at(0.0, 50.0) - gradient.t_at(100.0, 50.0)).abs() < 1e-4);
    }
}

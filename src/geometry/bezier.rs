use glam::Vec3;

/// Cubic Bezier curve through four control points
///
/// Scanned branches arrive as start/end positions plus tangent directions;
/// the importer converts them into this form so the rest of the pipeline can
/// sample positions and tangents at arbitrary parameters.
#[derive(Debug, Clone, Copy)]
pub struct BezierCurve {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub p3: Vec3,
}

impl BezierCurve {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Evaluate the curve position at parameter t in [0, 1]
    pub fn point(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        self.p0 * (u * u * u)
            + self.p1 * (3.0 * u * u * t)
            + self.p2 * (3.0 * u * t * t)
            + self.p3 * (t * t * t)
    }

    /// Normalized tangent direction at parameter t
    ///
    /// Falls back to the chord direction when the derivative degenerates
    /// (coincident control points).
    pub fn axis(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        let derivative = (self.p1 - self.p0) * (3.0 * u * u)
            + (self.p2 - self.p1) * (6.0 * u * t)
            + (self.p3 - self.p2) * (3.0 * t * t);
        let len = derivative.length();
        if len > 1e-6 {
            derivative / len
        } else {
            (self.p3 - self.p0).normalize_or(Vec3::Y)
        }
    }

    /// Approximate arc length by uniform sampling
    pub fn length(&self) -> f32 {
        const SAMPLES: usize = 16;
        let mut total = 0.0;
        let mut prev = self.p0;
        for i in 1..=SAMPLES {
            let next = self.point(i as f32 / SAMPLES as f32);
            total += prev.distance(next);
            prev = next;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_curve() -> BezierCurve {
        BezierCurve::new(
            Vec3::ZERO,
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
        )
    }

    #[test]
    fn test_endpoints() {
        let curve = straight_curve();
        assert!(curve.point(0.0).distance(Vec3::ZERO) < 1e-6);
        assert!(curve.point(1.0).distance(Vec3::new(0.0, 3.0, 0.0)) < 1e-6);
    }

    #[test]
    fn test_straight_length() {
        let curve = straight_curve();
        assert!((curve.length() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_axis_points_along_chord() {
        let curve = straight_curve();
        let axis = curve.axis(0.5);
        assert!(axis.distance(Vec3::Y) < 1e-4);
    }

    #[test]
    fn test_degenerate_axis_is_finite() {
        let curve = BezierCurve::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        assert!(curve.axis(0.5).is_finite());
    }
}

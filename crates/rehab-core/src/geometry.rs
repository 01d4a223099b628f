//! Geometric utilities for joint-angle computations.

use nalgebra::Vector2;

use crate::error::{Error, Result};
use crate::types::Point2D;

/// Rays shorter than this are treated as zero length
const MIN_RAY_LENGTH: f64 = 1e-10;

/// Calculate angle between two vectors in radians, 0 if either is zero length
pub fn angle_between(v1: &Vector2<f64>, v2: &Vector2<f64>) -> f64 {
    let (n1, n2) = (v1.norm(), v2.norm());
    if n1 < MIN_RAY_LENGTH || n2 < MIN_RAY_LENGTH {
        0.0
    } else {
        (v1.dot(v2) / (n1 * n2)).clamp(-1.0, 1.0).acos()
    }
}

/// Angle at vertex `b` between rays b→a and b→c, in degrees within [0, 180].
///
/// Returns exactly 0 when either ray has zero length (a or c coincides with b).
pub fn angle_at(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    angle_between(&b.vector_to(a), &b.vector_to(c)).to_degrees()
}

/// Same as [`angle_at`] but reports coincident joints instead of returning 0
pub fn try_angle_at(a: &Point2D, b: &Point2D, c: &Point2D) -> Result<f64> {
    let ba = b.vector_to(a);
    let bc = b.vector_to(c);
    if ba.norm() < MIN_RAY_LENGTH || bc.norm() < MIN_RAY_LENGTH {
        return Err(Error::DegenerateGeometry(format!(
            "({:.1}, {:.1})",
            b.x, b.y
        )));
    }
    Ok(angle_between(&ba, &bc).to_degrees())
}

pub fn midpoint(a: &Point2D, b: &Point2D) -> Point2D {
    Point2D::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    #[test]
    fn test_right_angle() {
        let angle = angle_at(&p(0.0, 1.0), &p(0.0, 0.0), &p(1.0, 0.0));
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_straight_and_folded() {
        let straight = angle_at(&p(-1.0, 0.0), &p(0.0, 0.0), &p(1.0, 0.0));
        assert!((straight - 180.0).abs() < 1e-9);

        let folded = angle_at(&p(2.0, 0.0), &p(0.0, 0.0), &p(5.0, 0.0));
        assert!(folded.abs() < 1e-9);
    }

    #[test]
    fn test_range_and_symmetry() {
        let vertex = p(3.0, -2.0);
        let points = [
            p(10.0, 4.0),
            p(-7.5, 2.0),
            p(3.0, 9.0),
            p(0.1, -0.1),
            p(-100.0, -250.0),
            p(42.0, -2.0),
        ];

        for a in &points {
            for c in &points {
                let forward = angle_at(a, &vertex, c);
                let backward = angle_at(c, &vertex, a);
                assert!((0.0..=180.0).contains(&forward), "angle {} out of range", forward);
                assert!((forward - backward).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_degenerate_returns_zero() {
        let b = p(5.0, 5.0);
        let a_on_b = angle_at(&b, &b, &p(9.0, 1.0));
        let c_on_b = angle_at(&p(1.0, 1.0), &b, &b);

        assert_eq!(a_on_b, 0.0);
        assert_eq!(c_on_b, 0.0);
        assert!(!a_on_b.is_nan());
    }

    #[test]
    fn test_try_angle_reports_degenerate() {
        let b = p(1.0, 1.0);
        assert!(matches!(
            try_angle_at(&b, &b, &p(2.0, 2.0)),
            Err(Error::DegenerateGeometry(_))
        ));

        let ok = try_angle_at(&p(0.0, 1.0), &p(0.0, 0.0), &p(1.0, 0.0)).unwrap();
        assert!((ok - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint() {
        let mid = midpoint(&p(0.0, 10.0), &p(4.0, 20.0));
        assert_eq!(mid, p(2.0, 15.0));
    }
}

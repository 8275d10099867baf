/// Axis-aligned rectangles in scaled pixel space.
///
/// All level geometry is authored in a 1920x1080 base coordinate space and
/// multiplied by a uniform scale factor at load time. Everything downstream
/// (collision, proximity, rendering) works in scaled coordinates only.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Rect { x, y, w, h }
    }

    /// Build from a base-space (x, y, w, h) tuple, applying the scale factor.
    pub fn scaled(base: (i32, i32, i32, i32), scale: f32) -> Self {
        Rect {
            x: (base.0 as f32 * scale) as i32,
            y: (base.1 as f32 * scale) as i32,
            w: (base.2 as f32 * scale) as i32,
            h: (base.3 as f32 * scale) as i32,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Overlap test. Touching edges do not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Euclidean distance between the centers of two rects.
    pub fn center_distance(&self, other: &Rect) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        let dx = (ax - bx) as f32;
        let dy = (ay - by) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Same rect shifted by (dx, dy).
    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Clamp position so the rect stays inside (0, 0)..(bounds_w, bounds_h).
    pub fn clamped(&self, bounds_w: i32, bounds_h: i32) -> Rect {
        Rect {
            x: self.x.max(0).min((bounds_w - self.w).max(0)),
            y: self.y.max(0).min((bounds_h - self.h).max(0)),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_and_touching() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(&Rect::new(5, 5, 10, 10)));
        assert!(!a.intersects(&Rect::new(10, 0, 10, 10))); // edge contact
        assert!(!a.intersects(&Rect::new(20, 20, 5, 5)));
    }

    #[test]
    fn containment_counts_as_overlap() {
        let outer = Rect::new(0, 0, 100, 100);
        let inner = Rect::new(40, 40, 10, 10);
        assert!(outer.intersects(&inner));
        assert!(inner.intersects(&outer));
    }

    #[test]
    fn scaling_applies_to_all_components() {
        let r = Rect::scaled((100, 200, 40, 80), 0.75);
        assert_eq!(r, Rect::new(75, 150, 30, 60));
    }

    #[test]
    fn center_distance_is_euclidean() {
        let a = Rect::new(0, 0, 10, 10); // center (5, 5)
        let b = Rect::new(3, 4, 10, 10); // center (8, 9)
        assert!((a.center_distance(&b) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn clamp_keeps_rect_in_bounds() {
        let r = Rect::new(-5, 1075, 60, 100);
        let c = r.clamped(1440, 810);
        assert_eq!(c.x, 0);
        assert_eq!(c.y, 810 - 100);
    }
}

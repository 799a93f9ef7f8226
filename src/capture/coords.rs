//! Coordinate mapping between desktop points and captured pixels
//!
//! Three spaces are involved:
//! - global points: shared by all displays, y grows upward
//! - surface-local points: a global point minus the display's origin
//! - frame pixels: the captured buffer, y grows downward, scaled by the
//!   display's backing scale factor
//!
//! Everything in here is pure and allocation free.

/// A point in desktop point space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in point space, origin at its minimum corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle spanning two corner points, in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self {
            x,
            y,
            width: a.x.max(b.x) - x,
            height: a.y.max(b.y) - y,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Edges are inclusive so a point on the border between two displays
    /// matches both; callers take the first match.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }

    /// True when the rectangle has no positive area (NaN counts as degenerate)
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A rectangle in frame pixel space, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const EMPTY: PixelRect = PixelRect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Converts platform coordinates with a top-left origin (y down) into
/// global points with a bottom-left origin (y up).
///
/// `reference_height` is the height of the primary display, so the primary
/// display's bottom edge sits at y = 0 in global space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesktopSpace {
    reference_height: f64,
}

impl DesktopSpace {
    pub fn new(reference_height: f64) -> Self {
        Self { reference_height }
    }

    pub fn reference_height(&self) -> f64 {
        self.reference_height
    }

    pub fn point_from_top_left(&self, x: f64, y: f64) -> Point {
        Point::new(x, self.reference_height - y)
    }

    pub fn rect_from_top_left(&self, x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect::new(x, self.reference_height - (y + height), width, height)
    }
}

/// Express a global point relative to a display's origin
pub fn to_surface_local(global: Point, surface_frame: &Rect) -> Point {
    Point::new(global.x - surface_frame.x, global.y - surface_frame.y)
}

/// Map a committed region onto the pixel buffer of a frame captured from
/// `surface_frame`.
///
/// The scale factor is derived per frame from the buffer size, so frames
/// from high-density displays crop correctly. The vertical origin is
/// flipped because global points grow upward while pixel rows grow
/// downward. All values are rounded, then clamped to the frame.
///
/// Returns [`PixelRect::EMPTY`] when no crop is possible; this is not an
/// error, callers should skip the frame.
pub fn crop_rect_in_pixels(
    region: &Rect,
    surface_frame: &Rect,
    frame_width_px: u32,
    frame_height_px: u32,
) -> PixelRect {
    if region.is_degenerate()
        || surface_frame.is_degenerate()
        || frame_width_px == 0
        || frame_height_px == 0
    {
        return PixelRect::EMPTY;
    }

    let scale_x = frame_width_px as f64 / surface_frame.width;
    let scale_y = frame_height_px as f64 / surface_frame.height;
    let local = to_surface_local(Point::new(region.x, region.y), surface_frame);

    let x = (local.x * scale_x).round();
    let y = (frame_height_px as f64 - (local.y + region.height) * scale_y).round();
    // A positive region always covers at least one pixel before clamping.
    let width = (region.width * scale_x).round().max(1.0);
    let height = (region.height * scale_y).round().max(1.0);

    let (x0, x1) = clamp_span(x, width, frame_width_px);
    let (y0, y1) = clamp_span(y, height, frame_height_px);

    if x1 <= x0 || y1 <= y0 {
        return PixelRect::EMPTY;
    }

    PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Clamp `[start, start + len)` into `[0, limit)`, returning start and end.
fn clamp_span(start: f64, len: f64, limit: u32) -> (u32, u32) {
    let end = start + len;
    if start >= limit as f64 || end <= 0.0 {
        return (0, 0);
    }
    let lo = start.clamp(0.0, (limit - 1) as f64);
    let hi = end.clamp(lo, limit as f64);
    (lo as u32, hi as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retina_bottom_left_region() {
        let region = Rect::new(0.0, 0.0, 100.0, 100.0);
        let surface = Rect::new(0.0, 0.0, 1000.0, 800.0);

        let crop = crop_rect_in_pixels(&region, &surface, 2000, 1600);

        assert_eq!(
            crop,
            PixelRect {
                x: 0,
                y: 1400,
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn test_region_on_offset_display() {
        // Secondary display to the right of a 1440-wide primary
        let surface = Rect::new(1440.0, 100.0, 800.0, 600.0);
        let region = Rect::new(1540.0, 600.0, 50.0, 40.0);

        let crop = crop_rect_in_pixels(&region, &surface, 800, 600);

        // local (100, 500), top edge at 540 points from the surface bottom
        assert_eq!(
            crop,
            PixelRect {
                x: 100,
                y: 60,
                width: 50,
                height: 40
            }
        );
    }

    #[test]
    fn test_fractional_scale_rounds_instead_of_truncating() {
        let surface = Rect::new(0.0, 0.0, 100.0, 100.0);
        let region = Rect::new(10.3, 20.0, 33.3, 10.0);

        let crop = crop_rect_in_pixels(&region, &surface, 150, 150);

        // 10.3 * 1.5 = 15.45 -> 15, 33.3 * 1.5 = 49.95 -> 50
        assert_eq!(crop.x, 15);
        assert_eq!(crop.width, 50);
        // 150 - 30 * 1.5 = 105
        assert_eq!(crop.y, 105);
        assert_eq!(crop.height, 15);
    }

    #[test]
    fn test_degenerate_region_yields_empty_rect() {
        let surface = Rect::new(0.0, 0.0, 1000.0, 800.0);

        for region in [
            Rect::new(10.0, 10.0, 0.0, 50.0),
            Rect::new(10.0, 10.0, 50.0, 0.0),
            Rect::new(10.0, 10.0, -5.0, 50.0),
            Rect::new(10.0, 10.0, 50.0, f64::NAN),
        ] {
            let crop = crop_rect_in_pixels(&region, &surface, 2000, 1600);
            assert_eq!(crop, PixelRect::EMPTY, "region {:?}", region);
            assert!(crop.is_empty());
        }
    }

    #[test]
    fn test_region_overflowing_frame_is_clamped() {
        let surface = Rect::new(0.0, 0.0, 100.0, 100.0);
        let region = Rect::new(90.0, -20.0, 40.0, 40.0);

        let crop = crop_rect_in_pixels(&region, &surface, 100, 100);

        assert_eq!(crop.x, 90);
        assert_eq!(crop.width, 10);
        // Region spans y in [-20, 20): only the bottom 20 rows are on screen
        assert_eq!(crop.y, 80);
        assert_eq!(crop.height, 20);
    }

    #[test]
    fn test_region_outside_surface_is_empty() {
        let surface = Rect::new(0.0, 0.0, 100.0, 100.0);
        let region = Rect::new(200.0, 10.0, 20.0, 20.0);

        assert!(crop_rect_in_pixels(&region, &surface, 100, 100).is_empty());
    }

    #[test]
    fn test_contained_regions_always_fit_in_frame() {
        let surface = Rect::new(-300.0, 50.0, 1280.0, 720.0);
        let frames = [(1280, 720), (2560, 1440), (1920, 1080), (1281, 719)];

        for (fw, fh) in frames {
            for step_x in 0..8 {
                for step_y in 0..8 {
                    let width = 2.0 + step_x as f64 * 37.7;
                    let height = 2.0 + step_y as f64 * 21.3;
                    let region = Rect::new(
                        surface.max_x() - width - step_y as f64 * 3.1,
                        surface.y + step_x as f64 * 5.9,
                        width,
                        height,
                    );
                    let crop = crop_rect_in_pixels(&region, &surface, fw, fh);
                    assert!(!crop.is_empty(), "empty crop for {:?}", region);
                    assert!(crop.x + crop.width <= fw);
                    assert!(crop.y + crop.height <= fh);
                }
            }
        }
    }

    #[test]
    fn test_to_surface_local() {
        let surface = Rect::new(1440.0, -900.0, 1600.0, 900.0);
        let local = to_surface_local(Point::new(1500.0, -100.0), &surface);
        assert_eq!(local, Point::new(60.0, 800.0));
    }

    #[test]
    fn test_rect_from_corners_any_order() {
        let r = Rect::from_corners(Point::new(50.0, 10.0), Point::new(20.0, 30.0));
        assert_eq!(r, Rect::new(20.0, 10.0, 30.0, 20.0));
    }

    #[test]
    fn test_desktop_space_flip() {
        let space = DesktopSpace::new(900.0);

        assert_eq!(space.point_from_top_left(10.0, 0.0), Point::new(10.0, 900.0));
        assert_eq!(
            space.rect_from_top_left(0.0, 0.0, 1440.0, 900.0),
            Rect::new(0.0, 0.0, 1440.0, 900.0)
        );
        // Display stacked below the primary in top-left space
        assert_eq!(
            space.rect_from_top_left(0.0, 900.0, 1920.0, 1080.0),
            Rect::new(0.0, -1080.0, 1920.0, 1080.0)
        );
    }
}

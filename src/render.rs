//! Paint buffer types delivered to the host compositor.
//!
//! The engine renders off-screen into a memory buffer and reports each paint
//! as a [`PaintFrame`]: the raw pixels, the sub-region changed since the
//! previous paint, and the buffer dimensions. The pixel format is fixed
//! 32-bit BGRA with premultiplied alpha; no format negotiation takes place,
//! so hosts that need RGBA must convert (see [`PaintFrame::to_rgba`]).

/// Bytes per pixel in a paint buffer (BGRA).
pub const BYTES_PER_PIXEL: usize = 4;

/// A rectangular region modified since the previous paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width of the dirty region.
    pub width: i32,
    /// Height of the dirty region.
    pub height: i32,
}

impl DirtyRect {
    /// Creates a new dirty rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a dirty rect covering the entire viewport.
    pub fn full(width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Returns the area of the dirty region.
    pub fn area(&self) -> i32 {
        self.width * self.height
    }

    /// Checks if this rect intersects with another.
    pub fn intersects(&self, other: &DirtyRect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Returns the union of two rectangles (smallest rect containing both).
    pub fn union(&self, other: &DirtyRect) -> DirtyRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);

        DirtyRect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    /// Clips this rect to fit within bounds.
    pub fn clip(&self, max_width: i32, max_height: i32) -> DirtyRect {
        let x = self.x.max(0);
        let y = self.y.max(0);
        let width = (self.x + self.width).min(max_width) - x;
        let height = (self.y + self.height).min(max_height) - y;

        DirtyRect {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }
}

/// One rendered frame as delivered by the engine's paint callback.
///
/// `buffer` holds `width * height` pixels in BGRA order, premultiplied
/// alpha, row-major with no padding between rows.
#[derive(Debug, Clone)]
pub struct PaintFrame {
    /// Raw BGRA pixel data.
    pub buffer: Vec<u8>,
    /// The region changed since the previous paint.
    pub dirty: DirtyRect,
    /// Buffer width in pixels.
    pub width: u32,
    /// Buffer height in pixels.
    pub height: u32,
}

impl PaintFrame {
    /// Creates a frame covering the whole buffer.
    pub fn full(buffer: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            buffer,
            dirty: DirtyRect::full(width as i32, height as i32),
            width,
            height,
        }
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Whether the buffer length matches the reported dimensions.
    pub fn is_complete(&self) -> bool {
        self.buffer.len() == self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Converts the BGRA buffer to RGBA for hosts that cannot composite
    /// BGRA directly.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.buffer.len());
        for chunk in self.buffer.chunks_exact(BYTES_PER_PIXEL) {
            rgba.push(chunk[2]); // R
            rgba.push(chunk[1]); // G
            rgba.push(chunk[0]); // B
            rgba.push(chunk[3]); // A
        }
        rgba
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_rect_union() {
        let a = DirtyRect::new(0, 0, 10, 10);
        let b = DirtyRect::new(5, 5, 10, 10);

        let u = a.union(&b);
        assert_eq!(u, DirtyRect::new(0, 0, 15, 15));
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_dirty_rect_clip() {
        let r = DirtyRect::new(-5, -5, 20, 20);
        let clipped = r.clip(10, 10);
        assert_eq!(clipped, DirtyRect::new(0, 0, 10, 10));
        assert_eq!(clipped.area(), 100);
    }

    #[test]
    fn test_paint_frame_rgba_conversion() {
        // One BGRA pixel: B=1, G=2, R=3, A=4.
        let frame = PaintFrame::full(vec![1, 2, 3, 4], 1, 1);
        assert!(frame.is_complete());
        assert_eq!(frame.stride(), 4);
        assert_eq!(frame.to_rgba(), vec![3, 2, 1, 4]);
    }
}

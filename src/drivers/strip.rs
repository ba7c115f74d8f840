// Strip-based rendering buffer for the eINK click.
// 1 KB strip instead of a 5 KB framebuffer; the panel is sent as horizontal
// bands of physical rows. Drawing happens in logical (rotated) coordinates
// and is clipped to the current band.
// begin_strip() for full refresh, begin_window() for partial.

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Point, Size},
    pixelcolor::BinaryColor,
    primitives::Rectangle,
};

use super::ssd1681::{HEIGHT, Rotation, WIDTH};

pub const STRIP_ROWS: u16 = 40;
pub const PHYS_BYTES_PER_ROW: usize = (WIDTH as usize) / 8;

pub const STRIP_BUF_SIZE: usize = PHYS_BYTES_PER_ROW * STRIP_ROWS as usize; // 1000B
pub const STRIP_COUNT: u16 = HEIGHT / STRIP_ROWS; // 5 strips

// physical rectangle currently backed by the buffer
#[derive(Clone, Copy)]
struct Window {
    x: u16,
    y: u16,
    w: u16,
    h: u16,
}

impl Window {
    const fn row_bytes(&self) -> usize {
        (self.w / 8) as usize
    }

    const fn len(&self) -> usize {
        self.row_bytes() * self.h as usize
    }
}

/// Bits `lo..hi` of a byte, MSB first (pixel 0 is bit 7).
#[inline]
fn span_mask(lo: usize, hi: usize) -> u8 {
    (0xFFu8 >> lo) & ((!(0xFFu16 >> hi)) as u8)
}

pub struct StripBuffer {
    buf: [u8; STRIP_BUF_SIZE],
    rotation: Rotation,
    win: Window,
}

impl StripBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0xFF; STRIP_BUF_SIZE],
            rotation: Rotation::Deg0,
            win: Window {
                x: 0,
                y: 0,
                w: WIDTH,
                h: STRIP_ROWS,
            },
        }
    }

    pub fn begin_strip(&mut self, rotation: Rotation, strip_idx: u16) {
        self.rotation = rotation;
        self.win = Window {
            x: 0,
            y: strip_idx * STRIP_ROWS,
            w: WIDTH,
            h: STRIP_ROWS,
        };
        self.buf.fill(0xFF);
    }

    /// Physical window; `x` and `w` must be multiples of 8.
    pub fn begin_window(&mut self, rotation: Rotation, x: u16, y: u16, w: u16, h: u16) {
        self.rotation = rotation;
        let max_h = Self::max_rows_for_width(w);
        if max_h == 0 {
            self.win = Window { x, y, w: 0, h: 0 };
            return;
        }
        if h > max_h {
            log::warn!("begin_window: {}x{} exceeds strip buf, clamping h -> {}", w, h, max_h);
        }
        self.win = Window {
            x,
            y,
            w,
            h: h.min(max_h),
        };
        let len = self.win.len();
        self.buf[..len].fill(0xFF);
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[..self.win.len()]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let len = self.win.len();
        &mut self.buf[..len]
    }

    pub fn window(&self) -> (u16, u16, u16, u16) {
        (self.win.x, self.win.y, self.win.w, self.win.h)
    }

    /// Current window in logical coordinates, for skipping off-strip drawing.
    pub fn logical_window(&self) -> Rectangle {
        let Window { x, y, w, h } = self.win;
        let (lx, ly, lw, lh) = match self.rotation {
            Rotation::Deg0 => (x, y, w, h),
            Rotation::Deg90 => (y, WIDTH - x - w, h, w),
            Rotation::Deg180 => (WIDTH - x - w, HEIGHT - y - h, w, h),
            Rotation::Deg270 => (HEIGHT - y - h, x, h, w),
        };
        Rectangle::new(Point::new(lx as i32, ly as i32), Size::new(lw as u32, lh as u32))
    }

    pub fn max_rows_for_width(width: u16) -> u16 {
        match (width / 8) as usize {
            0 => 0,
            rb => (STRIP_BUF_SIZE / rb) as u16,
        }
    }

    #[inline]
    fn to_physical(&self, lx: u16, ly: u16) -> (u16, u16) {
        match self.rotation {
            Rotation::Deg0 => (lx, ly),
            Rotation::Deg90 => (WIDTH - 1 - ly, lx),
            Rotation::Deg180 => (WIDTH - 1 - lx, HEIGHT - 1 - ly),
            Rotation::Deg270 => (ly, HEIGHT - 1 - lx),
        }
    }

    // logical point, already known to be on screen
    #[inline]
    fn plot(&mut self, lx: u16, ly: u16, black: bool) {
        let (px, py) = self.to_physical(lx, ly);
        self.fill_physical_rect(px, py, px + 1, py + 1, black);
    }

    // physical rect [x0, x1) x [y0, y1), clipped to the window
    fn fill_physical_rect(&mut self, x0: u16, y0: u16, x1: u16, y1: u16, black: bool) {
        let win = self.win;
        let x0 = x0.max(win.x);
        let x1 = x1.min(win.x + win.w);
        let y0 = y0.max(win.y);
        let y1 = y1.min(win.y + win.h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let (c0, c1) = ((x0 - win.x) as usize, (x1 - win.x) as usize);
        let rb = win.row_bytes();

        for r in (y0 - win.y) as usize..(y1 - win.y) as usize {
            let row = &mut self.buf[r * rb..(r + 1) * rb];
            for i in c0 / 8..c1.div_ceil(8) {
                let base = i * 8;
                let mask = span_mask(c0.max(base) - base, c1.min(base + 8) - base);
                if black {
                    row[i] &= !mask;
                } else {
                    row[i] |= mask;
                }
            }
        }
    }

    // clip a logical rectangle to the screen; None when nothing is left
    fn clip_logical(&self, area: &Rectangle) -> Option<(u16, u16, u16, u16)> {
        let size = self.size();
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u16;
        let br = area.top_left + Point::new(area.size.width as i32, area.size.height as i32);
        let (x0, x1) = (clamp(area.top_left.x, size.width), clamp(br.x, size.width));
        let (y0, y1) = (clamp(area.top_left.y, size.height), clamp(br.y, size.height));
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

impl Default for StripBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for StripBuffer {
    fn size(&self) -> Size {
        match self.rotation {
            Rotation::Deg0 | Rotation::Deg180 => Size::new(WIDTH as u32, HEIGHT as u32),
            Rotation::Deg90 | Rotation::Deg270 => Size::new(HEIGHT as u32, WIDTH as u32),
        }
    }
}

impl DrawTarget for StripBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let screen = self.bounding_box();
        for Pixel(p, color) in pixels {
            if screen.contains(p) {
                self.plot(p.x as u16, p.y as u16, color == BinaryColor::On);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let Some((x0, y0, x1, y1)) = self.clip_logical(area) else {
            return Ok(());
        };
        let black = color == BinaryColor::On;

        // every rotation maps an axis-aligned rect to an axis-aligned rect
        match self.rotation {
            Rotation::Deg0 => self.fill_physical_rect(x0, y0, x1, y1, black),
            Rotation::Deg90 => self.fill_physical_rect(WIDTH - y1, x0, WIDTH - y0, x1, black),
            Rotation::Deg180 => self.fill_physical_rect(WIDTH - x1, HEIGHT - y1, WIDTH - x0, HEIGHT - y0, black),
            Rotation::Deg270 => self.fill_physical_rect(y0, HEIGHT - x1, y1, HEIGHT - x0, black),
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let points = area.rows().flat_map(|y| area.columns().map(move |x| Point::new(x, y)));
        self.draw_iter(points.zip(colors).map(|(p, c)| Pixel(p, c)))
    }
}

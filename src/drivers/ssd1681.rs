// SSD1681 e-paper driver for the eINK click (1.54", 200x200, GDEH0154D67)
// No framebuffer; pixels are streamed through a 1KB StripBuffer. Partial
// refresh: BW-only write -> DU update -> sync both planes.
//
// Async variants (render_full_async, render_partial_async) await BUSY low
// through `embedded_hal_async::digital::Wait` instead of polling it.

use embedded_graphics_core::geometry::{OriginDimensions, Size};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use embedded_hal_async::digital::Wait;
use log::{debug, warn};

use super::strip::{STRIP_COUNT, StripBuffer};
use crate::Error;

pub const WIDTH: u16 = 200;
pub const HEIGHT: u16 = 200;

pub const SPI_FREQ_MHZ: u32 = 20;

// BUSY budgets; the panel needs roughly half of each
const POWER_OFF_TIMEOUT_MS: u32 = 300;
const FULL_REFRESH_TIMEOUT_MS: u32 = 4000;
const PARTIAL_REFRESH_TIMEOUT_MS: u32 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

mod cmd {
    pub const DRIVER_OUTPUT_CONTROL: u8 = 0x01;
    pub const DEEP_SLEEP: u8 = 0x10;
    pub const DATA_ENTRY_MODE: u8 = 0x11;
    pub const SW_RESET: u8 = 0x12;
    pub const TEMPERATURE_SENSOR: u8 = 0x18;
    pub const MASTER_ACTIVATION: u8 = 0x20;
    pub const DISPLAY_UPDATE_CONTROL_1: u8 = 0x21;
    pub const DISPLAY_UPDATE_CONTROL_2: u8 = 0x22;
    pub const WRITE_RAM_BW: u8 = 0x24;
    pub const WRITE_RAM_RED: u8 = 0x26; // previous frame for DU
    pub const BORDER_WAVEFORM: u8 = 0x3C;
    pub const SET_RAM_X_RANGE: u8 = 0x44;
    pub const SET_RAM_Y_RANGE: u8 = 0x45;
    pub const SET_RAM_X_COUNTER: u8 = 0x4E;
    pub const SET_RAM_Y_COUNTER: u8 = 0x4F;
}

/// Byte-aligned physical window of a partial refresh. The masks force the
/// padding columns white so DU leaves them alone.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Window {
    px: u16,
    py: u16,
    pw: u16,
    ph: u16,
    left_mask: u8,
    right_mask: u8,
}

pub struct Ssd1681<SPI, DC, RST, BUSY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: BUSY,
    rotation: Rotation,
    power_is_on: bool,
    init_done: bool,
    hibernating: bool,
    initial_refresh: bool,
}

// ── Blocking API ────────────────────────────────────────────────────────

impl<SPI, DC, RST, BUSY, E> Ssd1681<SPI, DC, RST, BUSY>
where
    SPI: SpiDevice<Error = E>,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
{
    pub fn new(spi: SPI, dc: DC, rst: RST, busy: BUSY) -> Self {
        Self {
            spi,
            dc,
            rst,
            busy,
            rotation: Rotation::Deg0,
            power_is_on: false,
            init_done: false,
            hibernating: false,
            initial_refresh: true,
        }
    }

    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.rst.set_high().map_err(Error::pin)?;
        delay.delay_ms(20);
        self.rst.set_low().map_err(Error::pin)?;
        delay.delay_ms(2);
        self.rst.set_high().map_err(Error::pin)?;
        delay.delay_ms(20);
        self.hibernating = false;
        Ok(())
    }

    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.init_display(delay)
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// True until the first full refresh has been performed.
    pub fn needs_initial_refresh(&self) -> bool {
        self.initial_refresh
    }

    /// BUSY is high while the controller runs a waveform.
    #[inline]
    pub fn is_busy(&mut self) -> Result<bool, Error<E>> {
        self.busy.is_high().map_err(Error::pin)
    }

    /// Full refresh: same content to RED then BW, GC waveform.
    pub fn render_full<D, F>(&mut self, strip: &mut StripBuffer, delay: &mut D, draw: F) -> Result<(), Error<E>>
    where
        D: DelayNs,
        F: Fn(&mut StripBuffer),
    {
        self.ensure_init(delay)?;
        self.write_full_frame(strip, delay, &draw)?;
        self.start_update_full()?;
        self.wait_busy(delay, FULL_REFRESH_TIMEOUT_MS)?;
        self.power_is_on = false;
        self.initial_refresh = false;
        Ok(())
    }

    /// Partial refresh of a logical region. Falls back to a full refresh
    /// until the panel has been fully refreshed once.
    #[allow(clippy::too_many_arguments)]
    pub fn render_partial<D, F>(
        &mut self,
        strip: &mut StripBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        delay: &mut D,
        draw: F,
    ) -> Result<(), Error<E>>
    where
        D: DelayNs,
        F: Fn(&mut StripBuffer),
    {
        if self.initial_refresh {
            return self.render_full(strip, delay, draw);
        }
        self.ensure_init(delay)?;

        let Some(win) = self.aligned_window(x, y, w, h) else {
            return Ok(());
        };

        self.write_region_strips(strip, &win, cmd::WRITE_RAM_BW, &draw)?;

        self.set_partial_ram_area(win.px, win.py, win.pw, win.ph)?;
        self.start_update_partial()?;
        self.wait_busy(delay, PARTIAL_REFRESH_TIMEOUT_MS)?;
        self.power_is_on = true;

        self.write_region_strips_dual(strip, &win, &draw)?;
        self.power_off(delay)
    }

    pub fn power_off<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        if self.power_is_on {
            self.start_power_off()?;
            self.wait_busy(delay, POWER_OFF_TIMEOUT_MS)?;
            self.power_is_on = false;
        }
        Ok(())
    }

    /// Lowest-power state; RAM is lost and the next render resets the
    /// controller first.
    pub fn deep_sleep<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.power_off(delay)?;
        self.send_command(cmd::DEEP_SLEEP)?;
        self.send_data(&[0x01])?;
        self.init_done = false;
        self.hibernating = true;
        Ok(())
    }

    pub fn release(self) -> (SPI, DC, RST, BUSY) {
        (self.spi, self.dc, self.rst, self.busy)
    }

    // ── Strip data helpers ──────────────────────────────────

    fn write_full_frame<D, F>(&mut self, strip: &mut StripBuffer, delay: &mut D, draw: &F) -> Result<(), Error<E>>
    where
        D: DelayNs,
        F: Fn(&mut StripBuffer),
    {
        for &ram_cmd in &[cmd::WRITE_RAM_RED, cmd::WRITE_RAM_BW] {
            self.set_partial_ram_area(0, 0, WIDTH, HEIGHT)?;
            self.send_command(ram_cmd)?;
            delay.delay_ms(1);

            for i in 0..STRIP_COUNT {
                strip.begin_strip(self.rotation, i);
                draw(strip);
                self.send_data(strip.data())?;
            }
        }
        Ok(())
    }

    // render one band of the window and apply the padding masks
    fn render_band<F>(&self, strip: &mut StripBuffer, win: &Window, y: u16, rows: u16, draw: &F)
    where
        F: Fn(&mut StripBuffer),
    {
        strip.begin_window(self.rotation, win.px, y, win.pw, rows);
        draw(strip);

        let row_bytes = (win.pw / 8) as usize;
        if (win.left_mask != 0 || win.right_mask != 0) && row_bytes > 0 {
            for row in strip.data_mut().chunks_mut(row_bytes) {
                row[0] |= win.left_mask;
                row[row.len() - 1] |= win.right_mask;
            }
        }
    }

    fn write_region_strips<F>(&mut self, strip: &mut StripBuffer, win: &Window, ram_cmd: u8, draw: &F) -> Result<(), Error<E>>
    where
        F: Fn(&mut StripBuffer),
    {
        let max_rows = StripBuffer::max_rows_for_width(win.pw);

        self.set_partial_ram_area(win.px, win.py, win.pw, win.ph)?;
        self.send_command(ram_cmd)?;

        let mut y = win.py;
        while y < win.py + win.ph {
            let rows = max_rows.min(win.py + win.ph - y);
            self.render_band(strip, win, y, rows, draw);
            self.send_data(strip.data())?;
            y += rows;
        }
        Ok(())
    }

    // sync RED and BW with one draw per band
    fn write_region_strips_dual<F>(&mut self, strip: &mut StripBuffer, win: &Window, draw: &F) -> Result<(), Error<E>>
    where
        F: Fn(&mut StripBuffer),
    {
        let max_rows = StripBuffer::max_rows_for_width(win.pw);

        let mut y = win.py;
        while y < win.py + win.ph {
            let rows = max_rows.min(win.py + win.ph - y);
            self.render_band(strip, win, y, rows, draw);

            for &ram_cmd in &[cmd::WRITE_RAM_RED, cmd::WRITE_RAM_BW] {
                self.set_partial_ram_area(win.px, y, win.pw, rows)?;
                self.send_command(ram_cmd)?;
                self.send_data(strip.data())?;
            }
            y += rows;
        }
        Ok(())
    }

    // ── Display init ────────────────────────────────────────

    fn ensure_init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        if !self.init_done {
            if self.hibernating {
                self.reset(delay)?;
            }
            self.init_display(delay)?;
        }
        Ok(())
    }

    fn init_display<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.send_command(cmd::SW_RESET)?;
        delay.delay_ms(10);

        // 200 gate lines, scan G0 -> G199
        self.send_command(cmd::DRIVER_OUTPUT_CONTROL)?;
        self.send_data(&[((HEIGHT - 1) & 0xFF) as u8, ((HEIGHT - 1) >> 8) as u8, 0x00])?;

        self.send_command(cmd::BORDER_WAVEFORM)?;
        self.send_data(&[0x05])?;

        // internal temperature sensor
        self.send_command(cmd::TEMPERATURE_SENSOR)?;
        self.send_data(&[0x80])?;

        self.set_partial_ram_area(0, 0, WIDTH, HEIGHT)?;

        self.init_done = true;
        debug!("SSD1681: init done");
        Ok(())
    }

    // ── Coordinate helpers ──────────────────────────────────

    fn transform_region(&self, x: u16, y: u16, w: u16, h: u16) -> (u16, u16, u16, u16) {
        match self.rotation {
            Rotation::Deg0 => (x, y, w, h),
            Rotation::Deg90 => (WIDTH - y - h, x, h, w),
            Rotation::Deg180 => (WIDTH - x - w, HEIGHT - y - h, w, h),
            Rotation::Deg270 => (y, HEIGHT - x - w, h, w),
        }
    }

    // clip to the logical screen, rotate, widen to whole bytes
    fn aligned_window(&self, x: u16, y: u16, w: u16, h: u16) -> Option<Window> {
        let size = self.size();
        let (lw, lh) = (size.width as u16, size.height as u16);
        if x >= lw || y >= lh {
            return None;
        }
        let w = w.min(lw - x);
        let h = h.min(lh - y);
        if w == 0 || h == 0 {
            return None;
        }

        let (tx, ty, tw, th) = self.transform_region(x, y, w, h);

        let px = tx & !7;
        let py = ty;
        let pw = ((tw + (tx & 7) + 7) & !7).min(WIDTH - px);
        let ph = th.min(HEIGHT - py);

        let lp = (tx - px) as u32;
        let rp = ((px + pw) - (tx + tw)) as u32;
        let left_mask: u8 = if lp > 0 { !((1u8 << (8 - lp)) - 1) } else { 0 };
        let right_mask: u8 = if rp > 0 { (1u8 << rp) - 1 } else { 0 };

        Some(Window {
            px,
            py,
            pw,
            ph,
            left_mask,
            right_mask,
        })
    }

    // X counts in bytes, Y in gate lines; X and Y both increment
    fn set_partial_ram_area(&mut self, x: u16, y: u16, w: u16, h: u16) -> Result<(), Error<E>> {
        let y_end = y + h - 1;

        self.send_command(cmd::DATA_ENTRY_MODE)?;
        self.send_data(&[0x03])?;

        self.send_command(cmd::SET_RAM_X_RANGE)?;
        self.send_data(&[(x / 8) as u8, ((x + w - 1) / 8) as u8])?;

        self.send_command(cmd::SET_RAM_Y_RANGE)?;
        self.send_data(&[
            (y & 0xFF) as u8,
            (y >> 8) as u8,
            (y_end & 0xFF) as u8,
            (y_end >> 8) as u8,
        ])?;

        self.send_command(cmd::SET_RAM_X_COUNTER)?;
        self.send_data(&[(x / 8) as u8])?;

        self.send_command(cmd::SET_RAM_Y_COUNTER)?;
        self.send_data(&[(y & 0xFF) as u8, (y >> 8) as u8])
    }

    // ── Update sequences ────────────────────────────────────

    fn start_update_full(&mut self) -> Result<(), Error<E>> {
        // bypass RED as 0, BW normal
        self.send_command(cmd::DISPLAY_UPDATE_CONTROL_1)?;
        self.send_data(&[0x40, 0x00])?;

        // clock + analog on, load temperature + LUT, GC waveform, power off
        self.send_command(cmd::DISPLAY_UPDATE_CONTROL_2)?;
        self.send_data(&[0xF7])?;

        self.send_command(cmd::MASTER_ACTIVATION)
    }

    fn start_update_partial(&mut self) -> Result<(), Error<E>> {
        self.send_command(cmd::DISPLAY_UPDATE_CONTROL_1)?;
        self.send_data(&[0x00, 0x00])?;

        // DU waveform, analog stays on
        self.send_command(cmd::DISPLAY_UPDATE_CONTROL_2)?;
        self.send_data(&[0xFC])?;

        self.send_command(cmd::MASTER_ACTIVATION)
    }

    fn start_power_off(&mut self) -> Result<(), Error<E>> {
        self.send_command(cmd::DISPLAY_UPDATE_CONTROL_2)?;
        self.send_data(&[0x83])?;
        self.send_command(cmd::MASTER_ACTIVATION)
    }

    // ── Low-level SPI / busy ────────────────────────────────

    fn wait_busy<D: DelayNs>(&mut self, delay: &mut D, timeout_ms: u32) -> Result<(), Error<E>> {
        for _ in 0..timeout_ms {
            if self.busy.is_low().map_err(Error::pin)? {
                return Ok(());
            }
            delay.delay_ms(1);
        }
        warn!("SSD1681: BUSY still high after {} ms", timeout_ms);
        Err(Error::Timeout)
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), Error<E>> {
        self.dc.set_low().map_err(Error::pin)?;
        self.spi.write(&[cmd]).map_err(Error::Bus)?;
        self.dc.set_high().map_err(Error::pin)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), Error<E>> {
        self.dc.set_high().map_err(Error::pin)?;
        self.spi.write(data).map_err(Error::Bus)
    }
}

// ── Async API ───────────────────────────────────────────────────────────
// BUSY waits are awaited; SPI writes stay blocking.

impl<SPI, DC, RST, BUSY, E> Ssd1681<SPI, DC, RST, BUSY>
where
    SPI: SpiDevice<Error = E>,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin + Wait,
{
    async fn wait_busy_async(&mut self) -> Result<(), Error<E>> {
        self.busy.wait_for_low().await.map_err(Error::pin)
    }

    pub async fn render_full_async<D, F>(&mut self, strip: &mut StripBuffer, delay: &mut D, draw: F) -> Result<(), Error<E>>
    where
        D: DelayNs,
        F: Fn(&mut StripBuffer),
    {
        self.ensure_init(delay)?;
        self.write_full_frame(strip, delay, &draw)?;
        self.start_update_full()?;
        self.wait_busy_async().await?;
        self.power_is_on = false;
        self.initial_refresh = false;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn render_partial_async<D, F>(
        &mut self,
        strip: &mut StripBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        delay: &mut D,
        draw: F,
    ) -> Result<(), Error<E>>
    where
        D: DelayNs,
        F: Fn(&mut StripBuffer),
    {
        if self.initial_refresh {
            return self.render_full_async(strip, delay, draw).await;
        }
        self.ensure_init(delay)?;

        let Some(win) = self.aligned_window(x, y, w, h) else {
            return Ok(());
        };

        self.write_region_strips(strip, &win, cmd::WRITE_RAM_BW, &draw)?;

        self.set_partial_ram_area(win.px, win.py, win.pw, win.ph)?;
        self.start_update_partial()?;
        self.wait_busy_async().await?;
        self.power_is_on = true;

        self.write_region_strips_dual(strip, &win, &draw)?;
        self.power_off_async().await
    }

    pub async fn power_off_async(&mut self) -> Result<(), Error<E>> {
        if self.power_is_on {
            self.start_power_off()?;
            self.wait_busy_async().await?;
            self.power_is_on = false;
        }
        Ok(())
    }
}

impl<SPI, DC, RST, BUSY> OriginDimensions for Ssd1681<SPI, DC, RST, BUSY> {
    fn size(&self) -> Size {
        match self.rotation {
            Rotation::Deg0 | Rotation::Deg180 => Size::new(WIDTH as u32, HEIGHT as u32),
            Rotation::Deg90 | Rotation::Deg270 => Size::new(HEIGHT as u32, WIDTH as u32),
        }
    }
}

// Host-side stand-ins for the embedded-hal peripherals a click needs.
//
// Each mock records what the driver did and answers from a register file
// or a script, so tests can assert on the exact wire traffic.

use core::cell::RefCell;
use core::convert::Infallible;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, SpiBus, SpiDevice};

// ── Delay ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct NoopDelay {
    pub elapsed_ns: u64,
}

impl NoopDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

// ── I2C: one 256-byte register file per responding address ─────────────

struct I2cTarget {
    regs: [u8; 256],
    pointer: u8,
    reads: VecDeque<Vec<u8>>,
    nak: u32,
    write_cycle: u32,
}

#[derive(Default)]
pub struct MockI2c {
    targets: HashMap<u8, I2cTarget>,
    pub writes: Vec<(u8, Vec<u8>)>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, address: u8) -> Self {
        self.targets.insert(
            address,
            I2cTarget {
                regs: [0; 256],
                pointer: 0,
                reads: VecDeque::new(),
                nak: 0,
                write_cycle: 0,
            },
        );
        self
    }

    fn target(&mut self, address: u8) -> &mut I2cTarget {
        self.targets.get_mut(&address).expect("unknown mock address")
    }

    pub fn set_reg(&mut self, address: u8, reg: u8, value: u8) {
        self.target(address).regs[reg as usize] = value;
    }

    pub fn set_regs(&mut self, address: u8, start: u8, values: &[u8]) {
        let t = self.target(address);
        for (i, &v) in values.iter().enumerate() {
            t.regs[start as usize + i] = v;
        }
    }

    pub fn reg(&self, address: u8, reg: u8) -> u8 {
        self.targets[&address].regs[reg as usize]
    }

    pub fn regs(&self, address: u8, start: u8, len: usize) -> Vec<u8> {
        let start = start as usize;
        self.targets[&address].regs[start..start + len].to_vec()
    }

    /// Next read from `address` returns these bytes instead of the register file.
    pub fn queue_read(&mut self, address: u8, bytes: &[u8]) {
        self.target(address).reads.push_back(bytes.to_vec());
    }

    /// Refuse the next `count` transactions to `address` (busy EEPROM, etc).
    pub fn nak_next(&mut self, address: u8, count: u32) {
        self.target(address).nak = count;
    }

    /// After every data write, refuse the next `polls` transactions, like an
    /// EEPROM busy with its internal write cycle.
    pub fn write_cycle(&mut self, address: u8, polls: u32) {
        self.target(address).write_cycle = polls;
    }

    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, w)| w.clone())
            .collect()
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let nak = i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let target = self.targets.get_mut(&address).ok_or(nak)?;
        if target.nak > 0 {
            target.nak -= 1;
            return Err(nak);
        }

        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    self.writes.push((address, bytes.to_vec()));
                    if let Some((&first, rest)) = bytes.split_first() {
                        target.pointer = first;
                        for &b in rest {
                            target.regs[target.pointer as usize] = b;
                            target.pointer = target.pointer.wrapping_add(1);
                        }
                        if !rest.is_empty() {
                            target.nak = target.write_cycle;
                        }
                    }
                }
                i2c::Operation::Read(buf) => {
                    if let Some(scripted) = target.reads.pop_front() {
                        let n = buf.len().min(scripted.len());
                        buf[..n].copy_from_slice(&scripted[..n]);
                    } else {
                        for b in buf.iter_mut() {
                            *b = target.regs[target.pointer as usize];
                            target.pointer = target.pointer.wrapping_add(1);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Shared trace for multi-peripheral ordering (DC vs SPI bytes) ────────

#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    Pin(&'static str, bool),
    Spi(Vec<u8>),
}

pub type Trace = Rc<RefCell<Vec<TraceEvent>>>;

pub fn new_trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

// ── SPI device: records written bytes per transaction, scripted replies ─

#[derive(Default)]
pub struct MockSpi {
    pub transactions: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
    trace: Option<Trace>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(trace: Trace) -> Self {
        Self {
            trace: Some(trace),
            ..Self::default()
        }
    }

    /// Bytes clocked in during the next read-capable operation.
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }

    fn fill(&mut self, buf: &mut [u8]) {
        let reply = self.replies.pop_front().unwrap_or_default();
        for (i, b) in buf.iter_mut().enumerate() {
            *b = reply.get(i).copied().unwrap_or(0);
        }
    }
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut written = Vec::new();
        for op in operations.iter_mut() {
            match op {
                spi::Operation::Write(bytes) => written.extend_from_slice(bytes),
                spi::Operation::Read(buf) => self.fill(buf),
                spi::Operation::Transfer(read, write) => {
                    written.extend_from_slice(write);
                    self.fill(read);
                }
                spi::Operation::TransferInPlace(buf) => {
                    written.extend_from_slice(buf);
                    self.fill(buf);
                }
                spi::Operation::DelayNs(_) => {}
            }
        }
        if let Some(trace) = &self.trace {
            trace.borrow_mut().push(TraceEvent::Spi(written.clone()));
        }
        self.transactions.push(written);
        Ok(())
    }
}

// ── SPI bus: byte-level exchange driven by a closure ────────────────────

/// Raw bus for drivers that manage CS themselves. `respond` sees every byte
/// the master clocks out and returns the byte clocked back in.
pub struct MockSpiBus<F: FnMut(u8) -> u8> {
    pub respond: F,
    pub written: Vec<u8>,
}

impl<F: FnMut(u8) -> u8> MockSpiBus<F> {
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            written: Vec::new(),
        }
    }

    fn exchange(&mut self, out: u8) -> u8 {
        self.written.push(out);
        (self.respond)(out)
    }
}

impl<F: FnMut(u8) -> u8> spi::ErrorType for MockSpiBus<F> {
    type Error = spi::ErrorKind;
}

impl<F: FnMut(u8) -> u8> SpiBus for MockSpiBus<F> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for w in words.iter_mut() {
            *w = self.exchange(0x00);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        for &w in words {
            self.exchange(w);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let n = read.len().max(write.len());
        for i in 0..n {
            let b = self.exchange(write.get(i).copied().unwrap_or(0x00));
            if let Some(r) = read.get_mut(i) {
                *r = b;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for w in words.iter_mut() {
            *w = self.exchange(*w);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ── GPIO ────────────────────────────────────────────────────────────────

pub struct MockPin {
    pub high: bool,
    pub history: Vec<bool>,
    name: &'static str,
    trace: Option<Trace>,
}

impl MockPin {
    pub fn new() -> Self {
        Self {
            high: false,
            history: Vec::new(),
            name: "",
            trace: None,
        }
    }

    pub fn traced(name: &'static str, trace: Trace) -> Self {
        Self {
            name,
            trace: Some(trace),
            ..Self::new()
        }
    }

    fn set(&mut self, high: bool) {
        self.high = high;
        self.history.push(high);
        if let Some(trace) = &self.trace {
            trace.borrow_mut().push(TraceEvent::Pin(self.name, high));
        }
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

/// Input that replays `levels`, then holds `idle`.
pub struct MockInput {
    levels: VecDeque<bool>,
    idle: bool,
    pub waits: u32,
}

impl MockInput {
    pub fn new(idle: bool) -> Self {
        Self {
            levels: VecDeque::new(),
            idle,
            waits: 0,
        }
    }

    pub fn with_levels(idle: bool, levels: &[bool]) -> Self {
        Self {
            levels: levels.iter().copied().collect(),
            ..Self::new(idle)
        }
    }

    fn sample(&mut self) -> bool {
        self.levels.pop_front().unwrap_or(self.idle)
    }
}

impl digital::ErrorType for MockInput {
    type Error = Infallible;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sample())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sample())
    }
}

impl embedded_hal_async::digital::Wait for MockInput {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.waits += 1;
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        self.waits += 1;
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.waits += 1;
        Ok(())
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        self.waits += 1;
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.waits += 1;
        Ok(())
    }
}

/// Open-drain line for 1-Wire: records driven levels, replays sampled ones.
pub struct MockOpenDrain {
    pub driven: Vec<bool>,
    samples: VecDeque<bool>,
}

impl MockOpenDrain {
    pub fn new(samples: &[bool]) -> Self {
        Self {
            driven: Vec::new(),
            samples: samples.iter().copied().collect(),
        }
    }

    /// Queue the slave's answer to eight read slots, LSB first.
    pub fn push_byte(&mut self, byte: u8) {
        for bit in 0..8 {
            self.samples.push_back(byte & (1 << bit) != 0);
        }
    }

    pub fn push_sample(&mut self, level: bool) {
        self.samples.push_back(level);
    }
}

impl digital::ErrorType for MockOpenDrain {
    type Error = Infallible;
}

impl OutputPin for MockOpenDrain {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.driven.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.driven.push(true);
        Ok(())
    }
}

impl InputPin for MockOpenDrain {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.samples.pop_front().unwrap_or(true))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.samples.pop_front().unwrap_or(true))
    }
}

// ── PWM ─────────────────────────────────────────────────────────────────

pub struct MockPwm {
    pub duty: u16,
    max: u16,
}

impl MockPwm {
    pub fn new(max: u16) -> Self {
        Self { duty: 0, max }
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty = duty;
        Ok(())
    }
}

// ── UART ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSerial {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = Infallible;
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ── SD card in SPI mode, byte by byte ──────────────────────────────────

struct PendingWrite {
    block: usize,
    data: Option<Vec<u8>>,
}

/// Card side of the SD SPI protocol, driven through `MockSpiBus`. Answers
/// each command after one filler byte; ACMD41 reports busy once.
pub struct FakeSdCard {
    pub blocks: Vec<[u8; 512]>,
    pub commands: Vec<(u8, u32)>,
    pub crc_errors: u32,
    /// Token returned after a data block; 0x05 accepts it.
    pub data_response: u8,
    csd: [u8; 16],
    sdhc: bool,
    v1: bool,
    idle: bool,
    app_cmd: bool,
    busy_polls: u32,
    out: VecDeque<u8>,
    frame: Vec<u8>,
    write: Option<PendingWrite>,
}

impl FakeSdCard {
    fn with_blocks(blocks: usize) -> Self {
        // CSD v2, C_SIZE 0x1D9F
        let mut csd = [
            0x40, 0x0E, 0x00, 0x32, 0x5B, 0x59, 0x00, 0x00, 0x1D, 0x9F, 0x7F, 0x80, 0x0A, 0x40,
            0x00, 0x00,
        ];
        csd[15] = crate::crc::crc7_sd(&csd[..15]);
        Self {
            blocks: vec![[0; 512]; blocks],
            commands: Vec::new(),
            crc_errors: 0,
            data_response: 0x05,
            csd,
            sdhc: true,
            v1: false,
            idle: false,
            app_cmd: false,
            busy_polls: 1,
            out: VecDeque::new(),
            frame: Vec::new(),
            write: None,
        }
    }

    pub fn sdhc(blocks: usize) -> Self {
        Self::with_blocks(blocks)
    }

    pub fn sd_v1(blocks: usize) -> Self {
        Self {
            sdhc: false,
            v1: true,
            ..Self::with_blocks(blocks)
        }
    }

    /// Flip a bit in the stored CSD trailer.
    pub fn corrupt_csd(&mut self) {
        self.csd[15] ^= 0x02;
    }

    fn reply(&mut self, bytes: &[u8]) {
        self.out.push_back(0xFF);
        self.out.extend(bytes.iter().copied());
    }

    fn block_index(&self, arg: u32) -> usize {
        if self.sdhc { arg as usize } else { arg as usize / 512 }
    }

    pub fn exchange(&mut self, mosi: u8) -> u8 {
        let miso = self.out.pop_front().unwrap_or(0xFF);

        if let Some(mut w) = self.write.take() {
            match w.data.as_mut() {
                None if mosi == 0xFE => w.data = Some(Vec::with_capacity(514)),
                None => {}
                Some(d) => d.push(mosi),
            }
            let complete = w.data.as_ref().is_some_and(|d| d.len() == 514);
            if !complete {
                self.write = Some(w);
                return miso;
            }
            if self.data_response == 0x05 {
                if let Some(d) = &w.data {
                    self.blocks[w.block].copy_from_slice(&d[..512]);
                }
                self.out.extend([0x05, 0x00, 0x00]);
            } else {
                self.out.push_back(self.data_response);
            }
            return miso;
        }

        if self.frame.is_empty() && mosi & 0xC0 != 0x40 {
            return miso;
        }
        self.frame.push(mosi);
        if self.frame.len() == 6 {
            let frame = core::mem::take(&mut self.frame);
            self.command(&frame);
        }
        miso
    }

    fn command(&mut self, frame: &[u8]) {
        let index = frame[0] & 0x3F;
        let arg = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        self.commands.push((index, arg));
        if crate::crc::crc7_sd(&frame[..5]) != frame[5] {
            self.crc_errors += 1;
            self.reply(&[0x08]);
            return;
        }

        let app = core::mem::take(&mut self.app_cmd);
        let r1 = self.idle as u8;
        match index {
            0 => {
                self.idle = true;
                self.reply(&[0x01]);
            }
            8 if self.v1 => self.reply(&[0x05]),
            8 => self.reply(&[0x01, 0x00, 0x00, 0x01, arg as u8]),
            55 => {
                self.app_cmd = true;
                self.reply(&[r1]);
            }
            41 if app => {
                if self.busy_polls > 0 {
                    self.busy_polls -= 1;
                    self.reply(&[0x01]);
                } else {
                    self.idle = false;
                    self.reply(&[0x00]);
                }
            }
            58 => {
                let ccs = if self.sdhc { 0xC0 } else { 0x80 };
                self.reply(&[r1, ccs, 0xFF, 0x80, 0x00]);
            }
            16 => self.reply(&[r1]),
            17 => {
                let block = self.blocks[self.block_index(arg)];
                self.reply(&[0x00, 0xFF, 0xFE]);
                self.out.extend(block);
                self.out.extend([0xFF, 0xFF]);
            }
            24 => {
                self.reply(&[0x00]);
                self.write = Some(PendingWrite {
                    block: self.block_index(arg),
                    data: None,
                });
            }
            9 => {
                let csd = self.csd;
                self.reply(&[0x00, 0xFF, 0xFE]);
                self.out.extend(csd);
                self.out.extend([0xFF, 0xFF]);
            }
            _ => self.reply(&[0x04 | r1]),
        }
    }
}

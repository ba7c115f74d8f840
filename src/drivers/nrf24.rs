// nRF C click: Nordic nRF24L01+ 2.4 GHz transceiver
//
// SPI: one command byte, then register data LSB first. The chip clocks
// STATUS out during the command byte of every transaction, so each
// transfer here is a single in-place buffer whose first byte comes back
// as STATUS.
//
// Modes: CE low + PWR_UP = standby-I; CE high + PRIM_RX = RX; a CE pulse
// (>10 us) with PRIM_RX clear sends one payload from the TX FIFO.
// Static payload width; pipe 0 receives auto-acks for the TX address.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use log::{debug, info, warn};

use crate::Error;

pub const MAX_PAYLOAD: usize = 32;
pub const MAX_CHANNEL: u8 = 125;

mod cmd {
    pub const R_REGISTER: u8 = 0x00;
    pub const W_REGISTER: u8 = 0x20;
    pub const R_RX_PAYLOAD: u8 = 0x61;
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    pub const FLUSH_TX: u8 = 0xE1;
    pub const FLUSH_RX: u8 = 0xE2;
    pub const NOP: u8 = 0xFF;
}

pub mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;
    pub const RF_SETUP: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const OBSERVE_TX: u8 = 0x08;
    pub const RPD: u8 = 0x09;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const RX_ADDR_P1: u8 = 0x0B;
    pub const TX_ADDR: u8 = 0x10;
    pub const RX_PW_P0: u8 = 0x11;
    pub const RX_PW_P1: u8 = 0x12;
    pub const FIFO_STATUS: u8 = 0x17;
}

const CONFIG_EN_CRC: u8 = 1 << 3;
const CONFIG_CRCO: u8 = 1 << 2;
const CONFIG_PWR_UP: u8 = 1 << 1;
const CONFIG_PRIM_RX: u8 = 1 << 0;

const STATUS_RX_DR: u8 = 1 << 6;
const STATUS_TX_DS: u8 = 1 << 5;
const STATUS_MAX_RT: u8 = 1 << 4;

const FIFO_RX_EMPTY: u8 = 1 << 0;

// Tpd2stby with the external crystal
const POWER_UP_US: u32 = 1_500;
// Thce, minimum CE high pulse for TX
const CE_PULSE_US: u32 = 10;
// Tstby2a, standby to active RX/TX
const SETTLE_US: u32 = 130;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataRate {
    Kbps250,
    Mbps1,
    #[default]
    Mbps2,
}

impl DataRate {
    fn bits(self) -> u8 {
        match self {
            DataRate::Kbps250 => 0x20,
            DataRate::Mbps1 => 0x00,
            DataRate::Mbps2 => 0x08,
        }
    }
}

/// Output power: -18, -12, -6, 0 dBm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaLevel {
    Min,
    Low,
    High,
    #[default]
    Max,
}

impl PaLevel {
    fn bits(self) -> u8 {
        (self as u8) << 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrcMode {
    Disabled,
    OneByte,
    #[default]
    TwoBytes,
}

impl CrcMode {
    fn bits(self) -> u8 {
        match self {
            CrcMode::Disabled => 0,
            CrcMode::OneByte => CONFIG_EN_CRC,
            CrcMode::TwoBytes => CONFIG_EN_CRC | CONFIG_CRCO,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub channel: u8,
    pub data_rate: DataRate,
    pub pa_level: PaLevel,
    pub crc: CrcMode,
    /// 3..=5 bytes
    pub address_width: u8,
    /// ARD, 250 us steps, 0..=15
    pub retransmit_delay: u8,
    /// ARC, 0..=15; 0 disables retransmission
    pub retransmit_count: u8,
    pub payload_width: u8,
    pub auto_ack: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: 76,
            data_rate: DataRate::default(),
            pa_level: PaLevel::default(),
            crc: CrcMode::default(),
            address_width: 5,
            retransmit_delay: 5,
            retransmit_count: 15,
            payload_width: MAX_PAYLOAD as u8,
            auto_ack: true,
        }
    }
}

impl Config {
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_data_rate(mut self, data_rate: DataRate) -> Self {
        self.data_rate = data_rate;
        self
    }

    pub fn with_pa_level(mut self, pa_level: PaLevel) -> Self {
        self.pa_level = pa_level;
        self
    }

    pub fn with_crc(mut self, crc: CrcMode) -> Self {
        self.crc = crc;
        self
    }

    pub fn with_address_width(mut self, width: u8) -> Self {
        self.address_width = width;
        self
    }

    pub fn with_retransmit(mut self, delay: u8, count: u8) -> Self {
        self.retransmit_delay = delay;
        self.retransmit_count = count;
        self
    }

    pub fn with_payload_width(mut self, width: u8) -> Self {
        self.payload_width = width;
        self
    }

    pub fn with_auto_ack(mut self, enabled: bool) -> Self {
        self.auto_ack = enabled;
        self
    }

    fn is_valid(&self) -> bool {
        self.channel <= MAX_CHANNEL
            && (3..=5).contains(&self.address_width)
            && self.retransmit_delay <= 15
            && self.retransmit_count <= 15
            && (1..=MAX_PAYLOAD as u8).contains(&self.payload_width)
            // auto-ack needs CRC
            && !(self.auto_ack && self.crc == CrcMode::Disabled)
    }
}

pub struct Nrf24<SPI, CE> {
    spi: SPI,
    ce: CE,
    config: Config,
    config_reg: u8,
}

impl<SPI, CE, E> Nrf24<SPI, CE>
where
    SPI: SpiDevice<Error = E>,
    CE: OutputPin,
{
    pub fn new(spi: SPI, ce: CE, config: Config) -> Self {
        Self {
            spi,
            ce,
            config,
            config_reg: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<u8, Error<E>> {
        self.spi.transfer_in_place(buf).map_err(Error::Bus)?;
        Ok(buf[0])
    }

    fn command(&mut self, command: u8) -> Result<u8, Error<E>> {
        self.transfer(&mut [command])
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, Error<E>> {
        let mut buf = [cmd::R_REGISTER | (register & 0x1F), cmd::NOP];
        self.transfer(&mut buf)?;
        Ok(buf[1])
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<E>> {
        self.transfer(&mut [cmd::W_REGISTER | (register & 0x1F), value])?;
        Ok(())
    }

    // `Config` is only fully checked by init(); these keep the fixed
    // frame buffers in bounds before that
    fn address_width(&self) -> Result<usize, Error<E>> {
        match self.config.address_width {
            w @ 3..=5 => Ok(w as usize),
            _ => Err(Error::InvalidArgument),
        }
    }

    fn payload_width(&self) -> Result<usize, Error<E>> {
        match self.config.payload_width as usize {
            w @ 1..=MAX_PAYLOAD => Ok(w),
            _ => Err(Error::InvalidArgument),
        }
    }

    fn write_address(&mut self, register: u8, address: &[u8]) -> Result<(), Error<E>> {
        if address.len() != self.address_width()? {
            return Err(Error::InvalidArgument);
        }
        let mut buf = [0u8; 6];
        buf[0] = cmd::W_REGISTER | register;
        buf[1..=address.len()].copy_from_slice(address);
        self.transfer(&mut buf[..=address.len()])?;
        Ok(())
    }

    fn read_address(&mut self, register: u8, out: &mut [u8]) -> Result<(), Error<E>> {
        let width = self.address_width()?;
        if out.len() < width {
            return Err(Error::InvalidArgument);
        }
        let mut buf = [cmd::NOP; 6];
        buf[0] = cmd::R_REGISTER | register;
        self.transfer(&mut buf[..=width])?;
        out[..width].copy_from_slice(&buf[1..=width]);
        Ok(())
    }

    fn write_config(&mut self, value: u8) -> Result<(), Error<E>> {
        self.write_register(reg::CONFIG, value)?;
        self.config_reg = value;
        Ok(())
    }

    /// Program the radio from `Config` and enter standby-I. Fails with
    /// `InvalidResponse` if the address-width register does not read back,
    /// which is what an empty socket looks like.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        if !self.config.is_valid() {
            warn!("nRF24: rejected config {:?}", self.config);
            return Err(Error::InvalidArgument);
        }
        self.ce.set_low().map_err(Error::pin)?;

        let c = self.config;
        let setup_aw = c.address_width - 2;
        self.write_register(reg::SETUP_AW, setup_aw)?;
        if self.read_register(reg::SETUP_AW)? != setup_aw {
            return Err(Error::InvalidResponse);
        }

        self.write_register(
            reg::SETUP_RETR,
            (c.retransmit_delay << 4) | c.retransmit_count,
        )?;
        self.write_register(reg::RF_CH, c.channel)?;
        self.write_register(reg::RF_SETUP, c.data_rate.bits() | c.pa_level.bits())?;
        self.write_register(reg::EN_AA, if c.auto_ack { 0x03 } else { 0x00 })?;
        self.write_register(reg::EN_RXADDR, 0x03)?;
        self.write_register(reg::RX_PW_P0, c.payload_width)?;
        self.write_register(reg::RX_PW_P1, c.payload_width)?;

        self.clear_interrupts()?;
        self.command(cmd::FLUSH_TX)?;
        self.command(cmd::FLUSH_RX)?;

        self.write_config(c.crc.bits() | CONFIG_PWR_UP)?;
        delay.delay_us(POWER_UP_US);

        info!("nRF24: channel {} {:?} {:?}", c.channel, c.data_rate, c.pa_level);
        Ok(())
    }

    pub fn status(&mut self) -> Result<u8, Error<E>> {
        self.command(cmd::NOP)
    }

    pub fn clear_interrupts(&mut self) -> Result<(), Error<E>> {
        self.write_register(reg::STATUS, STATUS_RX_DR | STATUS_TX_DS | STATUS_MAX_RT)
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<(), Error<E>> {
        if channel > MAX_CHANNEL {
            return Err(Error::InvalidArgument);
        }
        self.write_register(reg::RF_CH, channel)?;
        self.config.channel = channel;
        Ok(())
    }

    /// Destination address; also set on pipe 0 so auto-acks come back.
    pub fn set_tx_address(&mut self, address: &[u8]) -> Result<(), Error<E>> {
        self.write_address(reg::TX_ADDR, address)?;
        self.write_address(reg::RX_ADDR_P0, address)
    }

    /// Our own receive address (pipe 1).
    pub fn set_rx_address(&mut self, address: &[u8]) -> Result<(), Error<E>> {
        self.write_address(reg::RX_ADDR_P1, address)
    }

    pub fn tx_address(&mut self, out: &mut [u8]) -> Result<(), Error<E>> {
        self.read_address(reg::TX_ADDR, out)
    }

    /// Queue one payload (shorter ones are zero-padded to the static width)
    /// and pulse CE. Completion is reported by `poll_send`.
    pub fn send(&mut self, payload: &[u8], delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        let width = self.payload_width()?;
        if payload.len() > width {
            return Err(Error::InvalidArgument);
        }

        self.ce.set_low().map_err(Error::pin)?;
        if self.config_reg & CONFIG_PRIM_RX != 0 {
            self.write_config(self.config_reg & !CONFIG_PRIM_RX)?;
        }

        let mut buf = [0u8; 1 + MAX_PAYLOAD];
        buf[0] = cmd::W_TX_PAYLOAD;
        buf[1..=payload.len()].copy_from_slice(payload);
        self.transfer(&mut buf[..=width])?;

        self.ce.set_high().map_err(Error::pin)?;
        delay.delay_us(CE_PULSE_US);
        self.ce.set_low().map_err(Error::pin)?;
        Ok(())
    }

    /// `Ok` once the payload was sent (and acked, with auto-ack). Running
    /// out of retransmits flushes the TX FIFO and yields `Timeout`.
    pub fn poll_send(&mut self) -> nb::Result<(), Error<E>> {
        let status = self.status()?;
        if status & STATUS_TX_DS != 0 {
            self.write_register(reg::STATUS, STATUS_TX_DS)?;
            return Ok(());
        }
        if status & STATUS_MAX_RT != 0 {
            let observe = self.read_register(reg::OBSERVE_TX)?;
            debug!("nRF24: no ack, OBSERVE_TX 0x{:02X}", observe);
            self.write_register(reg::STATUS, STATUS_MAX_RT)?;
            self.command(cmd::FLUSH_TX)?;
            return Err(nb::Error::Other(Error::Timeout));
        }
        Err(nb::Error::WouldBlock)
    }

    /// Enter RX mode.
    pub fn listen(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.write_config(self.config_reg | CONFIG_PRIM_RX | CONFIG_PWR_UP)?;
        self.write_register(reg::STATUS, STATUS_RX_DR)?;
        self.ce.set_high().map_err(Error::pin)?;
        delay.delay_us(SETTLE_US);
        Ok(())
    }

    /// Leave RX mode for standby-I.
    pub fn standby(&mut self) -> Result<(), Error<E>> {
        self.ce.set_low().map_err(Error::pin)
    }

    /// Pop one payload into `buf`; returns the number of bytes copied.
    pub fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Error<E>> {
        if self.read_register(reg::FIFO_STATUS)? & FIFO_RX_EMPTY != 0 {
            return Err(nb::Error::WouldBlock);
        }

        let width = self.payload_width()?;
        let mut frame = [cmd::NOP; 1 + MAX_PAYLOAD];
        frame[0] = cmd::R_RX_PAYLOAD;
        self.transfer(&mut frame[..=width])?;
        self.write_register(reg::STATUS, STATUS_RX_DR)?;

        let n = width.min(buf.len());
        buf[..n].copy_from_slice(&frame[1..=n]);
        Ok(n)
    }

    /// Received power detector: carrier above -64 dBm on the current channel.
    pub fn carrier_detected(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_register(reg::RPD)? & 0x01 != 0)
    }

    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        self.ce.set_low().map_err(Error::pin)?;
        self.write_config(self.config_reg & !CONFIG_PWR_UP)
    }

    pub fn release(self) -> (SPI, CE) {
        (self.spi, self.ce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPin, NoopDelay};
    use core::cell::RefCell;
    use embedded_hal::spi::{self, ErrorType, Operation};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct RadioState {
        regs: [u8; 0x20],
        tx_addr: Vec<u8>,
        rx_addr_p0: Vec<u8>,
        rx_addr_p1: Vec<u8>,
        tx_fifo: Vec<Vec<u8>>,
        rx_fifo: VecDeque<Vec<u8>>,
        flushes: u32,
    }

    impl RadioState {
        fn status(&self) -> u8 {
            let pipe = if self.rx_fifo.is_empty() { 0x0E } else { 0x02 };
            (self.regs[reg::STATUS as usize] & 0x70) | pipe
        }
    }

    /// Register-level stand-in for the transceiver.
    struct FakeRadio(Rc<RefCell<RadioState>>);

    impl ErrorType for FakeRadio {
        type Error = spi::ErrorKind;
    }

    impl SpiDevice for FakeRadio {
        fn transaction(&mut self, ops: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            let mut s = self.0.borrow_mut();
            for op in ops.iter_mut() {
                let Operation::TransferInPlace(buf) = op else {
                    return Err(spi::ErrorKind::Other);
                };
                let command = buf[0];
                let status = s.status();
                let data = &mut buf[1..];
                match command {
                    0x00..=0x1F => {
                        let r = command & 0x1F;
                        let src = match r {
                            reg::RX_ADDR_P0 => s.rx_addr_p0.clone(),
                            reg::RX_ADDR_P1 => s.rx_addr_p1.clone(),
                            reg::TX_ADDR => s.tx_addr.clone(),
                            reg::FIFO_STATUS => {
                                vec![if s.rx_fifo.is_empty() { FIFO_RX_EMPTY } else { 0 }]
                            }
                            _ => vec![s.regs[r as usize]],
                        };
                        for (d, v) in data.iter_mut().zip(src) {
                            *d = v;
                        }
                    }
                    0x20..=0x3F => match command & 0x1F {
                        reg::STATUS => s.regs[reg::STATUS as usize] &= !data[0],
                        reg::RX_ADDR_P0 => s.rx_addr_p0 = data.to_vec(),
                        reg::RX_ADDR_P1 => s.rx_addr_p1 = data.to_vec(),
                        reg::TX_ADDR => s.tx_addr = data.to_vec(),
                        r => s.regs[r as usize] = data[0],
                    },
                    cmd::R_RX_PAYLOAD => {
                        let payload = s.rx_fifo.pop_front().unwrap_or_default();
                        for (d, v) in data.iter_mut().zip(payload) {
                            *d = v;
                        }
                    }
                    cmd::W_TX_PAYLOAD => s.tx_fifo.push(data.to_vec()),
                    cmd::FLUSH_TX => {
                        s.tx_fifo.clear();
                        s.flushes += 1;
                    }
                    cmd::FLUSH_RX => s.rx_fifo.clear(),
                    _ => {}
                }
                buf[0] = status;
            }
            Ok(())
        }
    }

    fn radio(config: Config) -> (Nrf24<FakeRadio, MockPin>, Rc<RefCell<RadioState>>) {
        let state = Rc::new(RefCell::new(RadioState::default()));
        let nrf = Nrf24::new(FakeRadio(state.clone()), MockPin::new(), config);
        (nrf, state)
    }

    #[test]
    fn init_programs_registers() {
        let config = Config::default()
            .with_channel(100)
            .with_data_rate(DataRate::Kbps250)
            .with_pa_level(PaLevel::Low)
            .with_payload_width(8);
        let (mut nrf, state) = radio(config);
        nrf.init(&mut NoopDelay::new()).unwrap();

        let s = state.borrow();
        assert_eq!(s.regs[reg::SETUP_AW as usize], 0x03);
        assert_eq!(s.regs[reg::SETUP_RETR as usize], 0x5F);
        assert_eq!(s.regs[reg::RF_CH as usize], 100);
        assert_eq!(s.regs[reg::RF_SETUP as usize], 0x22);
        assert_eq!(s.regs[reg::EN_AA as usize], 0x03);
        assert_eq!(s.regs[reg::RX_PW_P0 as usize], 8);
        // EN_CRC | CRCO | PWR_UP
        assert_eq!(s.regs[reg::CONFIG as usize], 0x0E);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (mut nrf, _) = radio(Config::default().with_channel(126));
        assert_eq!(nrf.init(&mut NoopDelay::new()), Err(Error::InvalidArgument));

        let (mut nrf, _) = radio(Config::default().with_crc(CrcMode::Disabled));
        assert_eq!(nrf.init(&mut NoopDelay::new()), Err(Error::InvalidArgument));
    }

    #[test]
    fn oversized_widths_fail_before_init() {
        let mut delay = NoopDelay::new();
        let (mut nrf, state) = radio(Config::default().with_payload_width(40));
        assert_eq!(nrf.send(&[1, 2, 3], &mut delay), Err(Error::InvalidArgument));
        state.borrow_mut().rx_fifo.push_back(vec![0xAA; 32]);
        assert_eq!(nrf.read(&mut [0u8; 64]), Err(nb::Error::Other(Error::InvalidArgument)));

        let (mut nrf, state) = radio(Config::default().with_address_width(6));
        assert_eq!(nrf.set_tx_address(&[1, 2, 3, 4, 5, 6]), Err(Error::InvalidArgument));
        assert_eq!(nrf.tx_address(&mut [0u8; 8]), Err(Error::InvalidArgument));
        assert!(state.borrow().tx_addr.is_empty());
    }

    #[test]
    fn send_and_poll() {
        let (mut nrf, state) = radio(Config::default().with_payload_width(4));
        let mut delay = NoopDelay::new();
        nrf.init(&mut delay).unwrap();
        nrf.set_tx_address(b"clk01").unwrap();
        nrf.send(&[1, 2, 3], &mut delay).unwrap();

        {
            let s = state.borrow();
            assert_eq!(s.tx_fifo, vec![vec![1, 2, 3, 0]]);
            assert_eq!(s.tx_addr, b"clk01");
            assert_eq!(s.rx_addr_p0, b"clk01");
        }
        let mut addr = [0u8; 5];
        nrf.tx_address(&mut addr).unwrap();
        assert_eq!(&addr, b"clk01");

        assert_eq!(nrf.poll_send(), Err(nb::Error::WouldBlock));
        state.borrow_mut().regs[reg::STATUS as usize] |= STATUS_TX_DS;
        assert_eq!(nrf.poll_send(), Ok(()));
        assert_eq!(state.borrow().regs[reg::STATUS as usize], 0);

        let (_, ce) = nrf.release();
        // low at init, low before the pulse, high-low pulse
        assert_eq!(ce.history, vec![false, false, true, false]);
    }

    #[test]
    fn lost_packet_flushes_tx() {
        let (mut nrf, state) = radio(Config::default());
        nrf.init(&mut NoopDelay::new()).unwrap();
        nrf.send(&[0xAA], &mut NoopDelay::new()).unwrap();

        let flushes = state.borrow().flushes;
        state.borrow_mut().regs[reg::STATUS as usize] |= STATUS_MAX_RT;
        assert_eq!(nrf.poll_send(), Err(nb::Error::Other(Error::Timeout)));
        let s = state.borrow();
        assert_eq!(s.flushes, flushes + 1);
        assert!(s.tx_fifo.is_empty());
    }

    #[test]
    fn receive_payload() {
        let (mut nrf, state) = radio(Config::default().with_payload_width(3));
        let mut delay = NoopDelay::new();
        nrf.init(&mut delay).unwrap();
        nrf.listen(&mut delay).unwrap();
        assert_eq!(
            state.borrow().regs[reg::CONFIG as usize] & CONFIG_PRIM_RX,
            CONFIG_PRIM_RX
        );

        let mut buf = [0u8; 8];
        assert_eq!(nrf.read(&mut buf), Err(nb::Error::WouldBlock));

        state.borrow_mut().rx_fifo.push_back(vec![7, 8, 9]);
        assert_eq!(nrf.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], &[7, 8, 9]);

        nrf.standby().unwrap();
        nrf.power_down().unwrap();
        assert_eq!(state.borrow().regs[reg::CONFIG as usize] & CONFIG_PWR_UP, 0);
    }

    #[test]
    fn address_width_is_enforced() {
        let (mut nrf, _) = radio(Config::default().with_address_width(3));
        assert_eq!(nrf.set_rx_address(b"long!"), Err(Error::InvalidArgument));
        nrf.set_rx_address(b"abc").unwrap();
    }

    #[test]
    fn missing_chip_is_detected() {
        struct Floating;
        impl ErrorType for Floating {
            type Error = spi::ErrorKind;
        }
        impl SpiDevice for Floating {
            fn transaction(&mut self, ops: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
                for op in ops.iter_mut() {
                    if let Operation::TransferInPlace(buf) = op {
                        buf.fill(0xFF);
                    }
                }
                Ok(())
            }
        }

        let mut nrf = Nrf24::new(Floating, MockPin::new(), Config::default());
        assert_eq!(nrf.init(&mut NoopDelay::new()), Err(Error::InvalidResponse));
    }
}

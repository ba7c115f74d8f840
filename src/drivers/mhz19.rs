// Winsen MH-Z19B NDIR CO2 sensor, 9600 8N1
//
// Every frame is 9 bytes:
//   request:  FF 01 cmd d0 d1 d2 d3 d4 cs
//   response: FF cmd d0 d1 d2 d3 d4 d5 cs
// cs is the negated sum of bytes 1..=7. Only READ CO2 is answered; the
// calibration and setup commands are fire-and-forget.

use embedded_io::{Read, ReadExactError, Write};
use log::warn;

use crate::Error;
use crate::crc::checksum_negated_sum;

const FRAME_LEN: usize = 9;
const START: u8 = 0xFF;
const SENSOR: u8 = 0x01;

mod cmd {
    pub const READ_CO2: u8 = 0x86;
    pub const ZERO_POINT: u8 = 0x87;
    pub const SPAN_POINT: u8 = 0x88;
    pub const ABC: u8 = 0x79;
    pub const DETECTION_RANGE: u8 = 0x99;
}

const ABC_ON: u8 = 0xA0;
const ABC_OFF: u8 = 0x00;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reading {
    pub co2_ppm: u16,
    /// Sensor-internal temperature, whole degC, coarse.
    pub temperature: i16,
    pub status: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Range {
    Ppm2000,
    #[default]
    Ppm5000,
    Ppm10000,
}

impl Range {
    pub fn ppm(self) -> u16 {
        match self {
            Range::Ppm2000 => 2000,
            Range::Ppm5000 => 5000,
            Range::Ppm10000 => 10_000,
        }
    }
}

fn request(command: u8, data: [u8; 5]) -> [u8; FRAME_LEN] {
    let mut frame = [START, SENSOR, command, data[0], data[1], data[2], data[3], data[4], 0];
    frame[8] = checksum_negated_sum(&frame[1..8]);
    frame
}

pub struct Mhz19<UART> {
    uart: UART,
}

impl<UART, E> Mhz19<UART>
where
    UART: Read<Error = E> + Write<Error = E>,
{
    pub fn new(uart: UART) -> Self {
        Self { uart }
    }

    fn send(&mut self, command: u8, data: [u8; 5]) -> Result<(), Error<E>> {
        self.uart
            .write_all(&request(command, data))
            .map_err(Error::Bus)?;
        self.uart.flush().map_err(Error::Bus)
    }

    fn receive(&mut self, command: u8) -> Result<[u8; FRAME_LEN], Error<E>> {
        let mut frame = [0u8; FRAME_LEN];
        self.uart.read_exact(&mut frame).map_err(|e| match e {
            ReadExactError::UnexpectedEof => Error::InvalidResponse,
            ReadExactError::Other(e) => Error::Bus(e),
        })?;

        if frame[0] != START || frame[1] != command {
            warn!("MH-Z19: unexpected frame header {:02X} {:02X}", frame[0], frame[1]);
            return Err(Error::InvalidResponse);
        }
        if checksum_negated_sum(&frame[1..8]) != frame[8] {
            warn!("MH-Z19: checksum mismatch");
            return Err(Error::Crc);
        }
        Ok(frame)
    }

    pub fn read(&mut self) -> Result<Reading, Error<E>> {
        self.send(cmd::READ_CO2, [0; 5])?;
        let frame = self.receive(cmd::READ_CO2)?;
        Ok(Reading {
            co2_ppm: u16::from_be_bytes([frame[2], frame[3]]),
            temperature: frame[4] as i16 - 40,
            status: frame[5],
        })
    }

    pub fn co2_ppm(&mut self) -> Result<u16, Error<E>> {
        Ok(self.read()?.co2_ppm)
    }

    /// Declare the current air to be 400 ppm. Run after 20 minutes in
    /// fresh air.
    pub fn calibrate_zero(&mut self) -> Result<(), Error<E>> {
        self.send(cmd::ZERO_POINT, [0; 5])
    }

    /// Declare the current gas concentration to be `ppm`.
    pub fn calibrate_span(&mut self, ppm: u16) -> Result<(), Error<E>> {
        if ppm == 0 {
            return Err(Error::InvalidArgument);
        }
        let [hi, lo] = ppm.to_be_bytes();
        self.send(cmd::SPAN_POINT, [hi, lo, 0, 0, 0])
    }

    /// Automatic baseline correction (on by default in the sensor).
    pub fn set_auto_calibration(&mut self, enabled: bool) -> Result<(), Error<E>> {
        let flag = if enabled { ABC_ON } else { ABC_OFF };
        self.send(cmd::ABC, [flag, 0, 0, 0, 0])
    }

    pub fn set_range(&mut self, range: Range) -> Result<(), Error<E>> {
        let [hi, lo] = range.ppm().to_be_bytes();
        self.send(cmd::DETECTION_RANGE, [0, 0, 0, hi, lo])
    }

    pub fn release(self) -> UART {
        self.uart
    }
}

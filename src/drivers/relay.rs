// Relay click: two relays switched by transistors on two GPIOs (high = closed)

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Relay1,
    Relay2,
}

/// The relays have no bus, so the error carries only `Error::Pin`.
pub type RelayError = Error<Infallible>;

pub struct Relay<R1, R2> {
    relay1: R1,
    relay2: R2,
    state: [bool; 2],
}

impl<R1, R2> Relay<R1, R2>
where
    R1: OutputPin,
    R2: OutputPin,
{
    /// Both relays are opened on construction.
    pub fn new(relay1: R1, relay2: R2) -> Result<Self, RelayError> {
        let mut relay = Self {
            relay1,
            relay2,
            state: [false; 2],
        };
        relay.set(Channel::Relay1, false)?;
        relay.set(Channel::Relay2, false)?;
        Ok(relay)
    }

    pub fn set(&mut self, channel: Channel, on: bool) -> Result<(), RelayError> {
        match channel {
            Channel::Relay1 => self.relay1.set_state(on.into()).map_err(Error::pin)?,
            Channel::Relay2 => self.relay2.set_state(on.into()).map_err(Error::pin)?,
        }
        self.state[channel as usize] = on;
        Ok(())
    }

    pub fn on(&mut self, channel: Channel) -> Result<(), RelayError> {
        self.set(channel, true)
    }

    pub fn off(&mut self, channel: Channel) -> Result<(), RelayError> {
        self.set(channel, false)
    }

    pub fn toggle(&mut self, channel: Channel) -> Result<(), RelayError> {
        self.set(channel, !self.is_on(channel))
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        self.state[channel as usize]
    }

    pub fn release(self) -> (R1, R2) {
        (self.relay1, self.relay2)
    }
}

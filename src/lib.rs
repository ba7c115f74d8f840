// Drivers for MikroE Click boards (board-independent, embedded-hal 1.0)
//
// One module per chip under drivers/; the bus and pins come from whatever
// MCU HAL implements the embedded-hal traits. board only knows about the
// mikroBUS socket layout, never about a specific MCU.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod bus;
pub mod crc;
pub mod drivers;
pub mod error;

#[cfg(test)]
mod testing;

pub use error::Error;

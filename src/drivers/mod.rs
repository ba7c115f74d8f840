// Click drivers, one chip per module.
//
// Nothing in here depends on a board; the caller hands in a bus and pins
// implementing the embedded-hal traits (see board for socket helpers).

pub mod bme280;
pub mod dc_motor;
pub mod ds18b20;
pub mod eeprom24;
pub mod lsm6dsl;
pub mod mcp3204;
pub mod mcp4161;
pub mod mhz19;
pub mod microsd;
pub mod nrf24;
pub mod onewire;
pub mod relay;
pub mod sdcard;
pub mod sht3x;
pub mod ssd1681;
pub mod strip;

// Shared driver error
//
// `E` is the error type of the bus the driver talks over (I2C, SPI or
// UART). Pin errors have their own, unrelated types, so they collapse
// into `Pin`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Bus transaction failed.
    Bus(E),
    /// A GPIO (CS, DC, CE, reset, ...) could not be driven or sampled.
    Pin,
    /// Identification register did not hold the expected value.
    InvalidDeviceId(u8),
    /// Checksum over received data did not match.
    Crc,
    /// Device did not finish an operation within its time budget.
    Timeout,
    /// Argument outside the range the device accepts.
    InvalidArgument,
    /// Device answered with something that is not a valid response.
    InvalidResponse,
    /// Operation needs `init()` first.
    NotInitialized,
}

impl<E> Error<E> {
    pub(crate) fn pin<P>(_: P) -> Self {
        Error::Pin
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::Pin => f.write_str("gpio error"),
            Error::InvalidDeviceId(id) => write!(f, "unexpected device id 0x{:02X}", id),
            Error::Crc => f.write_str("checksum mismatch"),
            Error::Timeout => f.write_str("device timeout"),
            Error::InvalidArgument => f.write_str("argument out of range"),
            Error::InvalidResponse => f.write_str("invalid response"),
            Error::NotInitialized => f.write_str("driver not initialized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_device_id() {
        let e: Error<()> = Error::InvalidDeviceId(0x58);
        assert_eq!(format!("{}", e), "unexpected device id 0x58");
    }

    #[test]
    fn pin_errors_collapse() {
        let e: Error<u8> = Error::pin(());
        assert_eq!(e, Error::Pin);
    }
}

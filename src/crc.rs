// Checksums used by individual clicks
//
// CRC-7/MMC     : SD command frames (microSD click)
// CRC-8/Maxim   : 1-Wire ROM codes and scratchpads (DS18B20)
// CRC-8 generic : MSB-first, parameterized; Sensirion words use 0x31/0xFF
// negated sum   : 9-byte UART frames (MH-Z19)
//
// All bitwise; tables would cost more flash than these few calls save.

/// CRC-7/MMC: poly 0x09, init 0, MSB first. Result in the low 7 bits.
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let mut d = byte;
        for _ in 0..8 {
            crc <<= 1;
            if (d ^ crc) & 0x80 != 0 {
                crc ^= 0x09;
            }
            d <<= 1;
        }
    }
    crc & 0x7F
}

/// Last byte of an SD command frame: CRC-7 shifted up with the end bit set.
pub fn crc7_sd(frame: &[u8]) -> u8 {
    (crc7(frame) << 1) | 0x01
}

/// CRC-8/Maxim (Dallas 1-Wire): reflected poly 0x31 (0x8C), init 0.
pub fn crc8_maxim(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ 0x8C;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// MSB-first CRC-8 with arbitrary polynomial and initial value, no final xor.
pub const fn crc8(poly: u8, init: u8, data: &[u8]) -> u8 {
    let mut crc = init;
    let mut i = 0;
    while i < data.len() {
        crc ^= data[i];
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
            bit += 1;
        }
        i += 1;
    }
    crc
}

/// Sensirion word CRC (SHT3x, SGP4x): poly 0x31, init 0xFF.
pub const fn crc8_sensirion(data: &[u8]) -> u8 {
    crc8(0x31, 0xFF, data)
}

/// Two's complement of the byte sum; a frame whose bytes plus this sum to 0 is valid.
pub fn checksum_negated_sum(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

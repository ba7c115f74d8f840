// FAT volume on the microSD click
// No RTC on the click; timestamps are fixed (2025-01-01 unless overridden).

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use embedded_sdmmc::{Mode, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use log::info;

use super::microsd::MicroSd;
use crate::Error;

pub type FsError<E> = embedded_sdmmc::Error<Error<E>>;

#[derive(Clone, Copy)]
pub struct FixedTimeSource(pub Timestamp);

impl Default for FixedTimeSource {
    fn default() -> Self {
        Self(Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        })
    }
}

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        self.0
    }
}

pub struct SdStorage<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    pub volume_mgr: VolumeManager<MicroSd<SPI, CS, D>, FixedTimeSource>,
}

impl<SPI, CS, D, E> SdStorage<SPI, CS, D>
where
    SPI: SpiBus<Error = E>,
    CS: OutputPin,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Bring the card up and hand it to the FAT layer.
    pub fn new(card: MicroSd<SPI, CS, D>, time: FixedTimeSource) -> Result<Self, Error<E>> {
        if card.card_type().is_none() {
            card.init()?;
        }
        match card.num_bytes() {
            Ok(bytes) => info!("SD card: {} bytes ({} MB)", bytes, bytes / 1024 / 1024),
            Err(e) => info!("SD card size unknown: {}", e),
        }
        Ok(Self {
            volume_mgr: VolumeManager::new(card, time),
        })
    }

    pub fn file_size(&self, name: &str) -> Result<u32, FsError<E>> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root = volume.open_root_dir()?;
        let file = root.open_file_in_dir(name, Mode::ReadOnly)?;
        Ok(file.length())
    }

    /// Read from `offset` until `buf` is full or the file ends.
    pub fn read_file_chunk(&self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize, FsError<E>> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root = volume.open_root_dir()?;
        let file = root.open_file_in_dir(name, Mode::ReadOnly)?;
        file.seek_from_start(offset)?;

        let mut total = 0;
        while !file.is_eof() && total < buf.len() {
            let n = file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Create or truncate `name` in the root directory.
    pub fn write_file(&self, name: &str, data: &[u8]) -> Result<(), FsError<E>> {
        self.write_mode(name, data, Mode::ReadWriteCreateOrTruncate)
    }

    /// Append to `name`, creating it if needed. Sensor logs go through here.
    pub fn append_file(&self, name: &str, data: &[u8]) -> Result<(), FsError<E>> {
        self.write_mode(name, data, Mode::ReadWriteCreateOrAppend)
    }

    fn write_mode(&self, name: &str, data: &[u8], mode: Mode) -> Result<(), FsError<E>> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root = volume.open_root_dir()?;
        let file = root.open_file_in_dir(name, mode)?;
        if !data.is_empty() {
            file.write(data)?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn release(self) -> MicroSd<SPI, CS, D> {
        let (card, _time) = self.volume_mgr.free();
        card
    }
}

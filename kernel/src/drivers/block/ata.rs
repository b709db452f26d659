//! A minimal ATA PIO driver for the primary master drive: the
//! "disk-image-backed" [`BlockDevice`] the emulator boots against, as
//! opposed to [`super::floppy::FloppyDisk`]'s real floppy hardware.

use x86_64::instructions::port::Port;

use crate::device::block::{BlockDevice, BlockDeviceIoError, BlockDeviceMetadata};

const SECTOR_BYTES: usize = 512;

const DATA: u16 = 0x1F0;
const SECTOR_COUNT: u16 = 0x1F2;
const LBA_LOW: u16 = 0x1F3;
const LBA_MID: u16 = 0x1F4;
const LBA_HIGH: u16 = 0x1F5;
const DRIVE_HEAD: u16 = 0x1F6;
const COMMAND: u16 = 0x1F7;
const STATUS: u16 = 0x1F7;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_WRITE_SECTORS: u8 = 0x30;

const STATUS_BSY: u8 = 0x80;
const STATUS_DRQ: u8 = 0x08;
const STATUS_ERR: u8 = 0x01;

/// Talks to the primary ATA bus in 28-bit LBA PIO mode. Good enough for a
/// QEMU-attached disk image; no DMA, no 48-bit LBA, no ATAPI. `Clone` is
/// cheap: every instance talks to the same ports, so cloning just shares
/// that access, which is what `vfscore::gpt::find_partitions` needs to hand
/// each partition its own offset-wrapped device.
#[derive(Clone)]
pub struct AtaDisk {
    total_sectors: usize,
}

impl AtaDisk {
    /// # Safety
    /// Callers must ensure only one `AtaDisk` talks to a given bus at a
    /// time and that the primary ATA controller is actually present.
    pub unsafe fn new(total_sectors: usize) -> Self {
        Self { total_sectors }
    }

    fn wait_ready(&self) -> Result<(), BlockDeviceIoError> {
        let mut status_port: Port<u8> = Port::new(STATUS);
        loop {
            let status = unsafe { status_port.read() };
            if status & STATUS_BSY == 0 {
                if status & STATUS_ERR != 0 {
                    return Err(BlockDeviceIoError::OperationNotSupported);
                }
                if status & STATUS_DRQ != 0 {
                    return Ok(());
                }
            }
        }
    }

    fn select_sector(&self, lba: u32) {
        unsafe {
            Port::<u8>::new(DRIVE_HEAD).write(0xE0 | ((lba >> 24) & 0x0F) as u8);
            Port::<u8>::new(SECTOR_COUNT).write(1u8);
            Port::<u8>::new(LBA_LOW).write((lba & 0xFF) as u8);
            Port::<u8>::new(LBA_MID).write(((lba >> 8) & 0xFF) as u8);
            Port::<u8>::new(LBA_HIGH).write(((lba >> 16) & 0xFF) as u8);
        }
    }

    fn read_sector(&self, lba: u32, buf: &mut [u8]) -> Result<(), BlockDeviceIoError> {
        debug_assert_eq!(buf.len(), SECTOR_BYTES);
        self.select_sector(lba);
        unsafe { Port::<u8>::new(COMMAND).write(CMD_READ_SECTORS) };
        self.wait_ready()?;

        let mut data_port: Port<u16> = Port::new(DATA);
        for chunk in buf.chunks_exact_mut(2) {
            let word = unsafe { data_port.read() };
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    fn write_sector(&self, lba: u32, buf: &[u8]) -> Result<(), BlockDeviceIoError> {
        debug_assert_eq!(buf.len(), SECTOR_BYTES);
        self.select_sector(lba);
        unsafe { Port::<u8>::new(COMMAND).write(CMD_WRITE_SECTORS) };
        self.wait_ready()?;

        let mut data_port: Port<u16> = Port::new(DATA);
        for chunk in buf.chunks_exact(2) {
            let word = u16::from_le_bytes([chunk[0], chunk[1]]);
            unsafe { data_port.write(word) };
        }
        Ok(())
    }
}

impl BlockDevice for AtaDisk {
    fn metadata(&self) -> BlockDeviceMetadata {
        BlockDeviceMetadata {
            block_size: SECTOR_BYTES,
            total_blocks: self.total_sectors,
        }
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BlockDeviceIoError> {
        if offset % SECTOR_BYTES != 0 {
            return Err(BlockDeviceIoError::UnalignedOffset);
        }
        if buf.len() % SECTOR_BYTES != 0 {
            return Err(BlockDeviceIoError::MismatchedBlockSize);
        }

        let start_lba = (offset / SECTOR_BYTES) as u32;
        for (i, chunk) in buf.chunks_exact_mut(SECTOR_BYTES).enumerate() {
            self.read_sector(start_lba + i as u32, chunk)?;
        }
        Ok(buf.len())
    }

    fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, BlockDeviceIoError> {
        if offset % SECTOR_BYTES != 0 {
            return Err(BlockDeviceIoError::UnalignedOffset);
        }
        if buf.len() % SECTOR_BYTES != 0 {
            return Err(BlockDeviceIoError::MismatchedBlockSize);
        }

        let start_lba = (offset / SECTOR_BYTES) as u32;
        for (i, chunk) in buf.chunks_exact(SECTOR_BYTES).enumerate() {
            self.write_sector(start_lba + i as u32, chunk)?;
        }
        Ok(buf.len())
    }
}

fn bridge_err(err: BlockDeviceIoError) -> vfscore::block::BlockDeviceError {
    match err {
        BlockDeviceIoError::OperationNotSupported => vfscore::block::BlockDeviceError::OperationNotSupported,
        BlockDeviceIoError::UnalignedOffset => vfscore::block::BlockDeviceError::UnalignedOffset,
        BlockDeviceIoError::OffsetOutOfBounds => vfscore::block::BlockDeviceError::OffsetOutOfBounds,
        BlockDeviceIoError::MismatchedBlockSize => vfscore::block::BlockDeviceError::MismatchedBlockSize,
    }
}

/// Bridges onto `vfscore`'s device trait, mirroring
/// [`super::floppy::FloppyDisk`]'s one-line wrapper (§10.5).
impl vfscore::block::BlockDevice for AtaDisk {
    fn metadata(&self) -> vfscore::block::BlockDeviceMetadata {
        let m = BlockDevice::metadata(self);
        vfscore::block::BlockDeviceMetadata {
            block_size: m.block_size,
            total_blocks: m.total_blocks,
        }
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, vfscore::block::BlockDeviceError> {
        BlockDevice::read(self, offset, buf).map_err(bridge_err)
    }

    fn write(&self, offset: usize, buf: &[u8]) -> Result<usize, vfscore::block::BlockDeviceError> {
        BlockDevice::write(self, offset, buf).map_err(bridge_err)
    }
}

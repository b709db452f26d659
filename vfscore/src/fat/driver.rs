//! The read-only FAT32 [`Driver`] (§4.6): BPB parsing, cluster-chain
//! walking, and directory enumeration including long filenames.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::block::BlockDevice;
use crate::driver::{Descriptor, DirEntryInfo, Driver, FileType};
use crate::error::VfsError;

use super::bpb::Bpb;
use super::dirent::{Attribute, RawDirEntry};
use super::lfn::assemble_name;

/// Cluster values at or above this terminate a chain (§4.6).
const END_OF_CLUSTER_CHAIN: u32 = 0x0FFF_FFF8;
const CLUSTER_MASK: u32 = 0x0FFF_FFFF;

struct FatEntryInfo {
    name: String,
    cluster: u32,
    size: usize,
    attribute: u8,
}

pub struct FatDriver<D: BlockDevice> {
    device: D,
    bpb: Bpb,
}

impl<D: BlockDevice> FatDriver<D> {
    /// Reads sector 0, validates the BPB signature and that its
    /// `bytes_per_sector` matches the device, and returns a ready driver.
    pub fn new(device: D) -> Result<Self, VfsError> {
        let mut sector = vec![0u8; 512];
        device.read(0, &mut sector).map_err(VfsError::from)?;
        let bpb = Bpb::parse(&sector)?;
        if bpb.bytes_per_sector as usize != device.metadata().block_size {
            return Err(VfsError::NotFat);
        }
        Ok(Self { device, bpb })
    }

    fn read_sector(&self, sector: u64, buf: &mut [u8]) -> Result<(), VfsError> {
        self.device
            .read(sector as usize * self.bpb.bytes_per_sector as usize, buf)
            .map_err(VfsError::from)?;
        Ok(())
    }

    fn read_cluster(&self, cluster: u32, buf: &mut [u8]) -> Result<(), VfsError> {
        let sector = self.bpb.cluster_to_sector(cluster);
        for s in 0..self.bpb.sectors_per_cluster as u64 {
            let off = s as usize * self.bpb.bytes_per_sector as usize;
            self.read_sector(sector + s, &mut buf[off..off + self.bpb.bytes_per_sector as usize])?;
        }
        Ok(())
    }

    /// Reads the 4-byte FAT entry for `cluster`, returning the next cluster
    /// in the chain or `None` at the terminator.
    fn next_cluster(&self, cluster: u32) -> Result<Option<u32>, VfsError> {
        let fat_byte_offset = cluster as u64 * 4;
        let bps = self.bpb.bytes_per_sector as u64;
        let sector = self.bpb.fat_start_sector() + fat_byte_offset / bps;
        let offset_in_sector = (fat_byte_offset % bps) as usize;

        let mut buf = vec![0u8; self.bpb.bytes_per_sector as usize];
        self.read_sector(sector, &mut buf)?;
        let raw = u32::from_le_bytes(buf[offset_in_sector..offset_in_sector + 4].try_into().unwrap()) & CLUSTER_MASK;

        if raw >= END_OF_CLUSTER_CHAIN {
            Ok(None)
        } else {
            Ok(Some(raw))
        }
    }

    /// Walks the cluster chain from `start_cluster`, parsing every valid
    /// directory entry (skipping deleted slots, assembling LFN fragments)
    /// until the on-disk terminator or chain end.
    fn entries(&self, start_cluster: u32) -> Result<Vec<FatEntryInfo>, VfsError> {
        let mut result = Vec::new();
        let mut pending_lfn = Vec::new();
        let mut cluster = start_cluster;
        let bytes_per_cluster = self.bpb.bytes_per_cluster();
        let mut cluster_buf = vec![0u8; bytes_per_cluster];

        'clusters: loop {
            self.read_cluster(cluster, &mut cluster_buf)?;

            for chunk in cluster_buf.chunks(32) {
                let raw = RawDirEntry::from_bytes(chunk);
                if raw.is_free() {
                    break 'clusters;
                }
                if raw.is_deleted() {
                    pending_lfn.clear();
                    continue;
                }
                if raw.is_lfn() {
                    pending_lfn.push(super::dirent::LfnEntry::from_bytes(chunk));
                    continue;
                }

                let mut name = raw.short_name();
                if !pending_lfn.is_empty() {
                    let fragments = core::mem::take(&mut pending_lfn);
                    let (assembled, checksum) = assemble_name(fragments);
                    if checksum == raw.checksum() {
                        name = assembled;
                    }
                }

                let mut cluster_num = raw.first_cluster();
                if cluster_num == 0 {
                    cluster_num = self.bpb.root_cluster;
                }

                result.push(FatEntryInfo {
                    name,
                    cluster: cluster_num,
                    size: raw.file_size() as usize,
                    attribute: raw.attribute(),
                });
            }

            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => break,
            }
        }

        Ok(result)
    }

    fn entry_kind(attribute: u8) -> FileType {
        if Attribute::from_bits_truncate(attribute).contains(Attribute::DIRECTORY) {
            FileType::Directory
        } else {
            FileType::Regular
        }
    }
}

impl<D: BlockDevice> Driver for FatDriver<D> {
    fn read(&self, desc: &Descriptor, offset: usize, buf: &mut [u8]) -> Result<usize, VfsError> {
        if desc.kind != FileType::Regular {
            return Err(VfsError::NotFile);
        }
        if offset >= desc.size {
            return Err(VfsError::EndOfFile);
        }

        let to_read = buf.len().min(desc.size - offset);
        let bytes_per_cluster = self.bpb.bytes_per_cluster();

        let mut cluster = desc.token as u32;
        let mut clusters_to_skip = offset / bytes_per_cluster;
        while clusters_to_skip > 0 {
            cluster = self.next_cluster(cluster)?.ok_or(VfsError::InvalidSector)?;
            clusters_to_skip -= 1;
        }

        let mut cluster_offset = offset % bytes_per_cluster;
        let mut written = 0;
        let mut cluster_buf = vec![0u8; bytes_per_cluster];
        while written < to_read {
            self.read_cluster(cluster, &mut cluster_buf)?;
            let chunk = (bytes_per_cluster - cluster_offset).min(to_read - written);
            buf[written..written + chunk].copy_from_slice(&cluster_buf[cluster_offset..cluster_offset + chunk]);
            written += chunk;
            cluster_offset = 0;
            if written < to_read {
                cluster = self.next_cluster(cluster)?.ok_or(VfsError::InvalidSector)?;
            }
        }
        Ok(written)
    }

    fn write(&self, _desc: &Descriptor, _offset: usize, _buf: &[u8]) -> Result<usize, VfsError> {
        Err(VfsError::NotImplemented)
    }

    /// Not stubbed: performs the same linear scan `readdir` does, matching
    /// by resolved name, since the controller's path walk requires a
    /// working `find` on every mountable driver (§4.6 note).
    fn find(&self, desc: &Descriptor, name: &str) -> Result<Descriptor, VfsError> {
        if desc.kind != FileType::Directory {
            return Err(VfsError::NotDirectory);
        }
        let entries = self.entries(desc.token as u32)?;
        let entry = entries.iter().find(|e| e.name == name).ok_or(VfsError::NoSuchFile)?;
        Ok(Descriptor {
            kind: Self::entry_kind(entry.attribute),
            size: entry.size,
            token: entry.cluster as u64,
        })
    }

    fn create(&self, _desc: &Descriptor, _name: &str, _kind: FileType) -> Result<(), VfsError> {
        Err(VfsError::NotImplemented)
    }

    fn readdir(&self, desc: &Descriptor, index: usize) -> Result<DirEntryInfo, VfsError> {
        if desc.kind != FileType::Directory {
            return Err(VfsError::NotDirectory);
        }
        let entries = self.entries(desc.token as u32)?;
        // The exhaustion sentinel is the on-disk terminator, so it reads as
        // `EndOfFile` rather than `IndexOutOfRange` (§4.4, §4.6).
        let entry = entries.get(index).ok_or(VfsError::EndOfFile)?;
        Ok(DirEntryInfo {
            name: entry.name.clone(),
            kind: Self::entry_kind(entry.attribute),
            size: entry.size,
            token: entry.cluster as u64,
        })
    }

    fn remove(&self, _desc: &Descriptor, _name: &str) -> Result<(), VfsError> {
        Err(VfsError::NotImplemented)
    }

    fn get_root(&self) -> Descriptor {
        Descriptor {
            kind: FileType::Directory,
            size: 0,
            token: self.bpb.root_cluster as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::drivers::test_support::InMemoryBlockDevice;

    use super::*;

    const SECTOR: usize = 512;
    const ROOT_CLUSTER: u32 = 2;

    fn sector_offset(sector: u64) -> usize {
        sector as usize * SECTOR
    }

    /// `cluster` numbering starts at 2 (the FAT convention); with one
    /// sector per cluster and `data_start_sector() == 2`, cluster `c`
    /// lives at sector `c`.
    fn cluster_offset(cluster: u32) -> usize {
        sector_offset(cluster as u64)
    }

    fn pad(name: &str, len: usize) -> Vec<u8> {
        let mut bytes = name.as_bytes().to_vec();
        bytes.resize(len, b' ');
        bytes
    }

    fn short_checksum(short: &[u8; 11]) -> u8 {
        let mut sum: u8 = 0;
        for &b in short {
            sum = sum.rotate_right(1).wrapping_add(b);
        }
        sum
    }

    /// Writes a short 8.3 entry at `buf[..32]`.
    fn write_short(buf: &mut [u8], base: &str, ext: &str, attr: u8, cluster: u32, size: u32) -> [u8; 11] {
        let mut short = [0u8; 11];
        short[0..8].copy_from_slice(&pad(base, 8));
        short[8..11].copy_from_slice(&pad(ext, 3));

        buf[0..11].copy_from_slice(&short);
        buf[11] = attr;
        buf[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        buf[26..28].copy_from_slice(&((cluster & 0xFFFF) as u16).to_le_bytes());
        buf[28..32].copy_from_slice(&size.to_le_bytes());
        short
    }

    /// Writes a single-fragment LFN entry immediately followed by its short
    /// alias, consuming 64 bytes of `buf`. `name` must fit in 13 UTF-16 code
    /// units (every fixture name here does).
    fn write_named_entry(buf: &mut [u8], name: &str, short_base: &str, short_ext: &str, attr: u8, cluster: u32, size: u32) {
        let short = write_short(&mut buf[32..64], short_base, short_ext, attr, cluster, size);
        let checksum = short_checksum(&short);

        let mut units: Vec<u16> = name.encode_utf16().collect();
        assert!(units.len() <= 13, "fixture name too long for a single LFN fragment");
        units.push(0x0000);
        units.resize(13, 0xFFFF);

        let lfn = &mut buf[0..32];
        lfn[0] = 0x01 | 0x40; // fragment 1, last (and only) logical fragment
        lfn[11] = 0x0F; // LFN attribute
        lfn[12] = 0x00;
        lfn[13] = checksum;
        for (i, unit) in units[0..5].iter().enumerate() {
            lfn[1 + i * 2..3 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }
        lfn[26..28].copy_from_slice(&0u16.to_le_bytes());
        for (i, unit) in units[5..11].iter().enumerate() {
            lfn[14 + i * 2..16 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }
        for (i, unit) in units[11..13].iter().enumerate() {
            lfn[28 + i * 2..30 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }
    }

    const KERNEL_ELF_DATA: &[u8] = b"\x7fELF kernel stub\n";
    const NVVARS_DATA: &[u8] = b"nvvars-binary-blob";

    fn memmap_data() -> Vec<u8> {
        (0..200u32).map(|i| (i % 256) as u8).collect()
    }

    /// Builds a tiny FAT32 volume: root has `apps/`, `EFI/`, `kernel.elf`,
    /// `NvVars`, `MEMMAP`; `EFI/` has `.`, `..`, `BOOT/`. One sector per
    /// cluster, one FAT, clusters 2-8 each a single-cluster file/directory.
    fn build_fixture_image() -> InMemoryBlockDevice {
        const CLUSTER_APPS: u32 = 3;
        const CLUSTER_EFI: u32 = 4;
        const CLUSTER_BOOT: u32 = 5;
        const CLUSTER_KERNEL: u32 = 6;
        const CLUSTER_NVVARS: u32 = 7;
        const CLUSTER_MEMMAP: u32 = 8;

        let mut image = vec![0u8; 16 * SECTOR];

        // BPB (sector 0).
        {
            let bpb = &mut image[0..SECTOR];
            bpb[11..13].copy_from_slice(&(SECTOR as u16).to_le_bytes());
            bpb[13] = 1; // sectors_per_cluster
            bpb[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved_sector_count
            bpb[16] = 1; // num_fats
            bpb[32..36].copy_from_slice(&16u32.to_le_bytes()); // total_sectors_32
            bpb[36..40].copy_from_slice(&1u32.to_le_bytes()); // fat_size_32
            bpb[44..48].copy_from_slice(&ROOT_CLUSTER.to_le_bytes());
            bpb[510] = 0x55;
            bpb[511] = 0xAA;
        }

        // FAT (sector 1): every cluster we use is a single-cluster chain.
        {
            let fat = &mut image[sector_offset(1)..sector_offset(1) + SECTOR];
            for cluster in [
                ROOT_CLUSTER,
                CLUSTER_APPS,
                CLUSTER_EFI,
                CLUSTER_BOOT,
                CLUSTER_KERNEL,
                CLUSTER_NVVARS,
                CLUSTER_MEMMAP,
            ] {
                let off = cluster as usize * 4;
                fat[off..off + 4].copy_from_slice(&END_OF_CLUSTER_CHAIN.to_le_bytes());
            }
        }

        // Root directory (cluster 2): apps, EFI, kernel.elf, NvVars, MEMMAP.
        {
            let root = &mut image[cluster_offset(ROOT_CLUSTER)..cluster_offset(ROOT_CLUSTER) + SECTOR];
            write_named_entry(&mut root[0..64], "apps", "APPS", "", 0x10, CLUSTER_APPS, 0);
            write_short(&mut root[64..96], "EFI", "", 0x10, CLUSTER_EFI, 0);
            write_named_entry(&mut root[96..160], "kernel.elf", "KERNEL", "ELF", 0x20, CLUSTER_KERNEL, KERNEL_ELF_DATA.len() as u32);
            write_named_entry(&mut root[160..224], "NvVars", "NVVARS", "", 0x20, CLUSTER_NVVARS, NVVARS_DATA.len() as u32);
            write_short(&mut root[224..256], "MEMMAP", "", 0x20, CLUSTER_MEMMAP, memmap_data().len() as u32);
        }

        // apps/ (cluster 3): left empty.

        // EFI/ (cluster 4): ., .., BOOT.
        {
            let efi = &mut image[cluster_offset(CLUSTER_EFI)..cluster_offset(CLUSTER_EFI) + SECTOR];
            write_short(&mut efi[0..32], ".", "", 0x10, CLUSTER_EFI, 0);
            write_short(&mut efi[32..64], "..", "", 0x10, 0, 0);
            write_short(&mut efi[64..96], "BOOT", "", 0x10, CLUSTER_BOOT, 0);
        }

        // EFI/BOOT/ (cluster 5): left empty.

        // File contents.
        image[cluster_offset(CLUSTER_KERNEL)..cluster_offset(CLUSTER_KERNEL) + KERNEL_ELF_DATA.len()]
            .copy_from_slice(KERNEL_ELF_DATA);
        image[cluster_offset(CLUSTER_NVVARS)..cluster_offset(CLUSTER_NVVARS) + NVVARS_DATA.len()]
            .copy_from_slice(NVVARS_DATA);
        let memmap = memmap_data();
        image[cluster_offset(CLUSTER_MEMMAP)..cluster_offset(CLUSTER_MEMMAP) + memmap.len()].copy_from_slice(&memmap);

        InMemoryBlockDevice::new(SECTOR, image)
    }

    #[test]
    fn root_readdir_lists_entries_in_on_disk_order() {
        let driver = FatDriver::new(build_fixture_image()).unwrap();
        let root = driver.get_root();

        let names: Vec<_> = (0..)
            .map_while(|i| driver.readdir(&root, i).ok())
            .map(|e| e.name)
            .collect();

        assert_eq!(names, ["apps", "EFI", "kernel.elf", "NvVars", "MEMMAP"]);
    }

    #[test]
    fn subdirectory_readdir_includes_dot_entries() {
        let driver = FatDriver::new(build_fixture_image()).unwrap();
        let root = driver.get_root();
        let efi = driver.find(&root, "EFI").unwrap();
        assert_eq!(efi.kind, FileType::Directory);

        let names: Vec<_> = (0..)
            .map_while(|i| driver.readdir(&efi, i).ok())
            .map(|e| e.name)
            .collect();

        assert_eq!(names, [".", "..", "BOOT"]);
    }

    #[test]
    fn reading_memmap_for_its_full_size_succeeds() {
        let driver = FatDriver::new(build_fixture_image()).unwrap();
        let root = driver.get_root();
        let memmap = driver.find(&root, "MEMMAP").unwrap();
        assert_eq!(memmap.kind, FileType::Regular);

        let mut buf = vec![0u8; memmap.size];
        let read = driver.read(&memmap, 0, &mut buf).unwrap();
        assert_eq!(read, memmap.size);
        assert_eq!(buf, memmap_data());
    }

    #[test]
    fn find_agrees_with_readdir_for_every_root_entry() {
        let driver = FatDriver::new(build_fixture_image()).unwrap();
        let root = driver.get_root();

        for i in 0.. {
            let Ok(listed) = driver.readdir(&root, i) else { break };
            let found = driver.find(&root, &listed.name).unwrap();
            assert_eq!(found.kind, listed.kind, "{}", listed.name);
            assert_eq!(found.size, listed.size, "{}", listed.name);
            assert_eq!(found.token, listed.token, "{}", listed.name);
        }
    }

    #[test]
    fn readdir_rejects_a_regular_file_descriptor() {
        let driver = FatDriver::new(build_fixture_image()).unwrap();
        let root = driver.get_root();
        let kernel = driver.find(&root, "kernel.elf").unwrap();
        assert_eq!(driver.readdir(&kernel, 0), Err(VfsError::NotDirectory));
    }

    #[test]
    fn reading_a_directory_descriptor_is_rejected() {
        let driver = FatDriver::new(build_fixture_image()).unwrap();
        let root = driver.get_root();
        let mut buf = [0u8; 4];
        assert_eq!(driver.read(&root, 0, &mut buf), Err(VfsError::NotFile));
    }
}

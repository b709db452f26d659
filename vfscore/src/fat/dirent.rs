//! 32-byte FAT directory entries, both the 8.3 short form and the
//! long-filename (LFN) slot form (§4.6, §6).

use alloc::string::String;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attribute: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
        const LONG_NAME = Self::READ_ONLY.bits() | Self::HIDDEN.bits() | Self::SYSTEM.bits() | Self::VOLUME_ID.bits();
    }
}

pub const DELETED_MARKER: u8 = 0xE5;

/// A raw 8.3 short directory entry.
pub struct RawDirEntry<'a> {
    bytes: &'a [u8],
}

impl<'a> RawDirEntry<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= 32);
        Self { bytes }
    }

    pub fn is_free(&self) -> bool {
        self.bytes[0] == 0x00
    }

    pub fn is_deleted(&self) -> bool {
        self.bytes[0] == DELETED_MARKER
    }

    pub fn attribute(&self) -> u8 {
        self.bytes[11]
    }

    pub fn is_lfn(&self) -> bool {
        Attribute::from_bits_truncate(self.attribute()) == Attribute::LONG_NAME
    }

    pub fn first_cluster(&self) -> u32 {
        let low = u16::from_le_bytes(self.bytes[26..28].try_into().unwrap()) as u32;
        let high = u16::from_le_bytes(self.bytes[20..22].try_into().unwrap()) as u32;
        (high << 16) | low
    }

    pub fn file_size(&self) -> u32 {
        u32::from_le_bytes(self.bytes[28..32].try_into().unwrap())
    }

    /// Sum-rotate checksum of the 11-byte short name, verified against the
    /// matching LFN fragments' shared `checksum` field.
    pub fn checksum(&self) -> u8 {
        let mut sum: u8 = 0;
        for &b in &self.bytes[0..11] {
            sum = sum.rotate_right(1).wrapping_add(b);
        }
        sum
    }

    /// Reconstructs the 8.3 name as `BASE.EXT`, trimming padding spaces and
    /// omitting the dot when there's no extension.
    pub fn short_name(&self) -> String {
        let base = trim_spaces(&self.bytes[0..8]);
        let ext = trim_spaces(&self.bytes[8..11]);
        if ext.is_empty() {
            base
        } else {
            let mut name = base;
            name.push('.');
            name.push_str(&ext);
            name
        }
    }
}

fn trim_spaces(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&b| b != b' ').map(|i| i + 1).unwrap_or(0);
    raw[..end].iter().map(|&b| b as char).collect()
}

/// A raw long-filename slot. Up to 13 UTF-16 code units split across
/// `name1`/`name2`/`name3`.
pub struct LfnEntry<'a> {
    bytes: &'a [u8],
}

impl<'a> LfnEntry<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= 32);
        Self { bytes }
    }

    /// Sequence number with the "last logical fragment" bit (`0x40`)
    /// masked off.
    pub fn order(&self) -> u8 {
        self.bytes[0] & 0x3F
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[13]
    }

    /// The fragment's code units in forward order, stopping at the first
    /// `0x0000` terminator (trailing `0xFFFF` padding is never reached).
    pub fn code_units(&self) -> alloc::vec::Vec<u16> {
        let mut units = alloc::vec::Vec::with_capacity(13);
        for chunk in [&self.bytes[1..11], &self.bytes[14..26], &self.bytes[28..32]] {
            for pair in chunk.chunks_exact(2) {
                let unit = u16::from_le_bytes([pair[0], pair[1]]);
                if unit == 0x0000 {
                    return units;
                }
                units.push(unit);
            }
        }
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_trims_padding_and_inserts_dot() {
        let mut raw = [b' '; 32];
        raw[0..8].copy_from_slice(b"KERNEL  ");
        raw[8..11].copy_from_slice(b"ELF");
        let entry = RawDirEntry::from_bytes(&raw);
        assert_eq!(entry.short_name(), "KERNEL.ELF");
    }

    #[test]
    fn short_name_without_extension_has_no_dot() {
        let mut raw = [b' '; 32];
        raw[0..8].copy_from_slice(b"EFI     ");
        let entry = RawDirEntry::from_bytes(&raw);
        assert_eq!(entry.short_name(), "EFI");
    }

    #[test]
    fn lfn_attribute_is_recognized() {
        let mut raw = [0u8; 32];
        raw[11] = 0x0F;
        assert!(RawDirEntry::from_bytes(&raw).is_lfn());
    }

    #[test]
    fn lfn_code_units_stop_at_terminator() {
        let mut raw = [0xFFu8; 32];
        raw[0] = 0x41;
        raw[11] = 0x0F;
        let name: [u16; 3] = [b'a' as u16, b'b' as u16, b'c' as u16];
        raw[1..7].copy_from_slice(&name.iter().flat_map(|u| u.to_le_bytes()).collect::<alloc::vec::Vec<_>>());
        raw[7..9].copy_from_slice(&0u16.to_le_bytes());
        let entry = LfnEntry::from_bytes(&raw);
        assert_eq!(entry.code_units(), alloc::vec![b'a' as u16, b'b' as u16, b'c' as u16]);
    }
}

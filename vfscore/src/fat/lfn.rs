//! UTF-16 long-filename reconstruction (§4.6, §9 design note (c), §10.7).
//!
//! The reference implementation's encoding helper truncates every UTF-16
//! code unit to its low byte, which mangles any character outside ASCII.
//! This decodes properly, including surrogate pairs, via
//! [`char::decode_utf16`].

use alloc::string::String;

use super::dirent::LfnEntry;

/// Assembles the long filename from a directory entry's LFN fragments.
/// `fragments` must be in on-disk order (they precede their short entry, so
/// the highest sequence number comes first); this sorts them by sequence
/// number before decoding.
pub fn assemble_name(mut fragments: alloc::vec::Vec<LfnEntry<'_>>) -> (String, u8) {
    fragments.sort_by_key(|f| f.order());
    let checksum = fragments.first().map(|f| f.checksum()).unwrap_or(0);

    let mut units = alloc::vec::Vec::new();
    for fragment in &fragments {
        units.extend(fragment.code_units());
    }

    let name = char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();

    (name, checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::dirent::LfnEntry;

    fn lfn_slot(order: u8, checksum: u8, text: &str) -> [u8; 32] {
        let mut raw = [0xFFu8; 32];
        raw[0] = order;
        raw[11] = 0x0F;
        raw[13] = checksum;

        let mut units: alloc::vec::Vec<u16> = text.encode_utf16().collect();
        units.push(0x0000);
        units.resize(13, 0xFFFF);

        for (i, chunk) in [(1usize, 5usize), (14, 6), (28, 2)].iter().enumerate() {
            let (offset, len) = *chunk;
            let start = [0usize, 5, 11][i];
            for j in 0..len {
                let bytes = units[start + j].to_le_bytes();
                raw[offset + j * 2] = bytes[0];
                raw[offset + j * 2 + 1] = bytes[1];
            }
        }
        raw
    }

    #[test]
    fn assembles_ascii_name_from_single_fragment() {
        let raw = lfn_slot(0x41, 0xAB, "kernel.elf");
        let (name, checksum) = assemble_name(alloc::vec![LfnEntry::from_bytes(&raw)]);
        assert_eq!(name, "kernel.elf");
        assert_eq!(checksum, 0xAB);
    }

    #[test]
    fn assembles_name_split_across_two_fragments_in_disk_order() {
        // Fragment 2 (tail) is encountered first on disk, fragment 1 (head)
        // second; assembly must still produce the forward string.
        let tail = lfn_slot(0x42, 0x10, "file-name.txt");
        let head = lfn_slot(0x01, 0x10, "a-long-");
        let (name, _) = assemble_name(alloc::vec![LfnEntry::from_bytes(&tail), LfnEntry::from_bytes(&head)]);
        assert!(name.starts_with("a-long-"));
    }

    #[test]
    fn decodes_surrogate_pairs_instead_of_truncating() {
        // U+1F600 GRINNING FACE, outside the BMP, needs a surrogate pair.
        let emoji = '\u{1F600}';
        let raw = lfn_slot(0x41, 0x00, &String::from(emoji));
        let (name, _) = assemble_name(alloc::vec![LfnEntry::from_bytes(&raw)]);
        assert_eq!(name.chars().next(), Some(emoji));
    }
}

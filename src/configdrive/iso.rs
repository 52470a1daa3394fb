//! ISO9660 signature scanning on raw block devices.
//!
//! A config drive may be written as a bare ISO9660 image onto an
//! unpartitioned disk. The image is detected through its first volume
//! descriptor, which sits right after the 32 KiB system area:
//!
//! ```text
//! offset  size  field
//!      0     1  descriptor type
//!      1     5  standard identifier, "CD001"
//!     80     8  volume space size (u32 LE, then u32 BE)
//!    128     4  logical block size (u16 LE, then u16 BE)
//! ```

use anyhow::{Context, Result};
use slog_scope::{debug, trace};
use std::io::{Read, Seek, SeekFrom};

use crate::platform::{DiskGeometry, MediaType};

/// Start of the first volume descriptor (end of the system area).
pub const BOOT_RECORD_OFFSET: u64 = 0x8000;

/// Standard identifier of every ISO9660 volume descriptor.
pub const ISO9660_IDENTIFIER: &[u8; 5] = b"CD001";

const IDENTIFIER_OFFSET: usize = 1;
const VOLUME_SPACE_SIZE_OFFSET: usize = 80;
const LOGICAL_BLOCK_SIZE_OFFSET: usize = 128;

/// An ISO9660 image found on a physical disk.
///
/// Only the scanner builds these, after validating the descriptor signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateIsoImage {
    source_disk_path: String,
    byte_offset: u64,
    size_bytes: u64,
}

impl CandidateIsoImage {
    pub fn source_disk_path(&self) -> &str {
        &self.source_disk_path
    }

    /// Offset of the image on the device; images always start at the
    /// beginning of the disk.
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Combine two 16-bit half-words into a 32-bit value: `(hi << 16) + lo`.
pub fn combine_half_words(hi: u16, lo: u16) -> u32 {
    (u32::from(hi) << 16) + u32::from(lo)
}

/// Read a little-endian half-word, `None` if it falls outside `buf`.
fn half_word_at(buf: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let bytes = buf.get(offset..end)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Image size declared by a primary volume descriptor starting at
/// `desc_start` within `sector`.
///
/// Returns `None` if the signature does not match or the descriptor does not
/// fit in the sector.
fn descriptor_image_size(sector: &[u8], desc_start: usize) -> Option<u64> {
    let id_start = desc_start.checked_add(IDENTIFIER_OFFSET)?;
    let id = sector.get(id_start..id_start + ISO9660_IDENTIFIER.len())?;
    if id != ISO9660_IDENTIFIER {
        trace!("no ISO9660 identifier, found {:?}", id);
        return None;
    }

    let volume_off = desc_start + VOLUME_SPACE_SIZE_OFFSET;
    let lo = half_word_at(sector, volume_off)?;
    let hi = half_word_at(sector, volume_off + 2)?;
    let volume_space_size = combine_half_words(hi, lo);
    let logical_block_size = half_word_at(sector, desc_start + LOGICAL_BLOCK_SIZE_OFFSET)?;

    trace!(
        "volume space size: {} blocks, logical block size: {}",
        volume_space_size,
        logical_block_size
    );
    Some(u64::from(volume_space_size) * u64::from(logical_block_size))
}

/// Look for an ISO9660 image at the start of a raw device.
///
/// Non-fixed media and disks too small to hold a volume descriptor are
/// rejected without touching the device. I/O errors are propagated; callers
/// treat them as "no image on this disk".
pub fn scan<D>(
    source_disk_path: &str,
    device: &mut D,
    geometry: &DiskGeometry,
) -> Result<Option<CandidateIsoImage>>
where
    D: Read + Seek + ?Sized,
{
    if geometry.media_type != MediaType::Fixed {
        trace!("'{}' is not fixed media, skipping", source_disk_path);
        return Ok(None);
    }

    let bytes_per_sector = u64::from(geometry.bytes_per_sector);
    if bytes_per_sector == 0 {
        return Ok(None);
    }
    let offset = BOOT_RECORD_OFFSET / bytes_per_sector * bytes_per_sector;

    if geometry.total_disk_bytes() <= offset + bytes_per_sector {
        trace!("'{}' is too small to hold an ISO image", source_disk_path);
        return Ok(None);
    }

    device
        .seek(SeekFrom::Start(offset))
        .with_context(|| format!("failed to seek '{source_disk_path}' to {offset}"))?;
    let mut sector = vec![0u8; geometry.bytes_per_sector as usize];
    device
        .read_exact(&mut sector)
        .with_context(|| format!("failed to read sector at {offset} from '{source_disk_path}'"))?;

    let desc_start = (BOOT_RECORD_OFFSET - offset) as usize;
    let size_bytes = match descriptor_image_size(&sector, desc_start) {
        Some(size) => size,
        None => return Ok(None),
    };

    debug!(
        "found ISO9660 image on '{}' ({} bytes)",
        source_disk_path, size_bytes
    );
    Ok(Some(CandidateIsoImage {
        source_disk_path: source_disk_path.to_string(),
        byte_offset: 0,
        size_bytes,
    }))
}

/// Build a raw disk image carrying an ISO9660 primary volume descriptor.
#[cfg(test)]
pub(crate) fn fake_iso_disk(total_len: usize, blocks: u32, block_size: u16) -> Vec<u8> {
    let mut disk = vec![0u8; total_len];
    let desc = BOOT_RECORD_OFFSET as usize;
    disk[desc] = 1;
    disk[desc + 1..desc + 6].copy_from_slice(ISO9660_IDENTIFIER);
    disk[desc + 6] = 1;
    disk[desc + 80..desc + 84].copy_from_slice(&blocks.to_le_bytes());
    disk[desc + 84..desc + 88].copy_from_slice(&blocks.to_be_bytes());
    disk[desc + 128..desc + 130].copy_from_slice(&block_size.to_le_bytes());
    disk[desc + 130..desc + 132].copy_from_slice(&block_size.to_be_bytes());
    disk
}

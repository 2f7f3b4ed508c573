use std::convert::TryFrom;
use std::io::{self, Write};

use log::debug;
use thiserror::Error;

use super::{ImageSpec, IMAGE_HEADER_LEN};
use crate::Segment;

/// How the base address of an image is checked against the valid address range of its spec
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AddressCheck {
    /// Rejects an address only if it is both below the low bound and above the high bound,
    /// which never happens for a valid range. Output stays byte compatible with images built
    /// by the Realtek SDK.
    Compatible,
    /// Rejects an address that is below the low bound or above the high bound
    Strict,
}

/// Errors that cause a single image to be skipped
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(
        "Segment Address Error! {} at {:#010x} is outside {:#010x}..{:#010x}",
        filename,
        address,
        low,
        high
    )]
    SegmentAddress {
        filename: &'static str,
        address: u32,
        /// The size the image would have had
        size: u32,
        low: u32,
        high: u32,
    },
    #[error("Segment of {} at {:#010x} extends past the end of the address space", filename, address)]
    SizeOverflow { filename: &'static str, address: u32 },
}

/// A firmware image assembled from the sections claimed by an `ImageSpec`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AssembledImage {
    pub spec: ImageSpec,
    /// The load address of the lowest section, if any section was claimed
    pub base_address: Option<u32>,
    /// The size of the image data, excluding the header
    pub size: u32,
    /// The header followed by the image data
    pub bytes: Vec<u8>,
}

impl Default for AddressCheck {
    fn default() -> AddressCheck {
        AddressCheck::Compatible
    }
}

impl AddressCheck {
    /// Returns true if `address` should be rejected for the range `low`..`high`
    pub fn rejects(self, address: u32, low: u32, high: u32) -> bool {
        match self {
            AddressCheck::Compatible => address < low && address > high,
            AddressCheck::Strict => address < low || address > high,
        }
    }
}

impl AssembledImage {
    /// Returns an image for `spec` without any data
    pub fn empty(spec: &ImageSpec) -> AssembledImage {
        AssembledImage {
            spec: *spec,
            base_address: None,
            size: 0,
            bytes: Vec::new(),
        }
    }

    /// Returns true if the image has no data and should not be written
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the image header, which is empty for images without one
    pub fn header(&self) -> &[u8] {
        let len = self.header_len();

        &self.bytes[..len]
    }

    /// Returns the image data that follows the header
    pub fn payload(&self) -> &[u8] {
        let len = self.header_len();

        &self.bytes[len..]
    }

    fn header_len(&self) -> usize {
        if self.spec.header.magic().is_some() && !self.bytes.is_empty() {
            IMAGE_HEADER_LEN
        } else {
            0
        }
    }

    /// Writes the header and the image data to the given `writer`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.bytes)
    }
}

impl ImageSpec {
    /// Assembles the image from the sections in `pool` that this spec claims
    ///
    /// The claimed sections are laid out in order of their load address, with zeros filling any
    /// gap between them. Sections that end up in the image are removed from the pool, as is a
    /// single empty section. Sections are left in the pool when the image is rejected or when
    /// there is nothing to copy.
    pub fn assemble(
        &self,
        pool: &mut Vec<Segment>,
        check: AddressCheck,
    ) -> Result<AssembledImage, AssembleError> {
        let mut image = AssembledImage::empty(self);
        let mut claimed: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name.as_deref().map_or(false, |name| self.claims(name)))
            .map(|(idx, _)| idx)
            .collect();

        if claimed.is_empty() {
            debug!("No sections found for {}", self.filename);

            return Ok(image);
        }

        if claimed.len() == 1 && pool[claimed[0]].is_empty() {
            let section = pool.remove(claimed[0]);

            debug!(
                "Segment at {:#010x}, size 0x00000000 copy to image {}",
                section.address, self.filename
            );

            image.base_address = Some(section.address);

            return Ok(image);
        }

        // Stable, so sections at the same address keep their section table order
        claimed.sort_by_key(|&idx| pool[idx].address);

        let base_address = pool[claimed[0]].address;
        let last = &pool[claimed[claimed.len() - 1]];
        let end = u64::from(last.address) + u64::from(last.len());
        let size = u32::try_from(end - u64::from(base_address)).map_err(|_| {
            AssembleError::SizeOverflow {
                filename: self.filename,
                address: base_address,
            }
        })?;

        image.base_address = Some(base_address);
        image.size = size;

        debug!(
            "Segment at {:#010x}, size {:#010x} copy to image {}",
            base_address, size, self.filename
        );

        if check.rejects(base_address, self.address_low, self.address_high) {
            return Err(AssembleError::SegmentAddress {
                filename: self.filename,
                address: base_address,
                size,
                low: self.address_low,
                high: self.address_high,
            });
        }

        if size == 0 {
            return Ok(image);
        }

        let mut bytes = Vec::with_capacity(IMAGE_HEADER_LEN + size as usize);

        if let Some(magic) = self.header.magic() {
            bytes.extend_from_slice(&header_bytes(magic, size, base_address));
        }

        let mut cursor = base_address;

        for &idx in &claimed {
            let section = &pool[idx];

            if section.address > cursor {
                let gap = (section.address - cursor) as usize;

                bytes.resize(bytes.len() + gap, 0);
                cursor = section.address;
            }

            bytes.extend_from_slice(&section.data);

            // The cursor moves by the declared size, not by the padded length of the data
            cursor = cursor.saturating_add(section.size);
        }

        // Remove the consumed sections from the back so the remaining indices stay valid
        claimed.sort_unstable_by(|a, b| b.cmp(a));

        for idx in claimed {
            pool.remove(idx);
        }

        image.bytes = bytes;

        Ok(image)
    }
}

/// Returns the 32 byte image header with the given `magic` words
fn header_bytes(magic: [u32; 2], size: u32, address: u32) -> [u8; IMAGE_HEADER_LEN] {
    let words = [
        magic[0], magic[1], size, address, 0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF,
    ];
    let mut buf = [0u8; IMAGE_HEADER_LEN];

    for (chunk, word) in buf.chunks_exact_mut(4).zip(words.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    buf
}

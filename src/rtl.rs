//! Realtek RTL8710 firmware image module
//!
//! The RTL8710 boot loader expects the firmware split into separate images: a boot image in
//! flash (`xip_image1`) with its RAM counterpart (`ram_1`), the application image in flash
//! (`xip_image2`) with its RAM counterpart (`ram_2`), and an optional RDP image. Each image is
//! assembled from a fixed set of named ELF sections.

use bitflags::bitflags;

pub mod convert;
pub mod image;
pub mod ota;

pub use convert::{elf2image, Options, Report, Usage};
pub use image::{AddressCheck, AssembleError, AssembledImage};
pub use ota::{save, save_ota, OtaWriter};

/// The magic words of the header prepended to application images
pub const HDR_MAGIC: [u32; 2] = [0x3539_3138, 0x3131_3738];

/// The magic words of the header prepended to boot images
pub const BOOT_MAGIC: [u32; 2] = [0x9696_9999, 0xFC66_CC3F];

/// The length of an image header
pub const IMAGE_HEADER_LEN: usize = 32;

/// The name of the combined over-the-air update file
pub const OTA_FILENAME: &str = "ota.bin";

/// The header that is prepended to an image
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HeaderStyle {
    /// The image is written as raw data
    None,
    /// Application image header
    Header,
    /// Boot image header
    Boot,
}

bitflags! {
    /// Classification of an image
    pub struct Tags: u8 {
        /// The image is part of the over-the-air update file
        const OTA = 0b001;
        /// The image is loaded into SRAM
        const SRAM = 0b010;
        /// The image is executed in place from flash
        const FLASH = 0b100;
    }
}

/// Describes how a single firmware image is assembled from ELF sections
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ImageSpec {
    /// The name of the file the image is saved to
    pub filename: &'static str,
    /// The names of the sections that make up the image
    pub sections: &'static [&'static str],
    /// The header written in front of the image data
    pub header: HeaderStyle,
    pub tags: Tags,
    /// The lowest valid base address
    pub address_low: u32,
    /// The highest valid base address
    pub address_high: u32,
}

/// The firmware layout of the RTL8710, in the order the images claim sections
pub const LAYOUT: [ImageSpec; 5] = [
    ImageSpec {
        filename: "xip_image2.p.bin",
        sections: &[".xip_image2.text"],
        header: HeaderStyle::Header,
        tags: Tags::OTA.union(Tags::FLASH),
        address_low: 0x0800_b000,
        address_high: 0x0C00_0000,
    },
    ImageSpec {
        filename: "ram_2.p.bin",
        sections: &[".ram_image2.entry", ".ram_image2.text", ".ram_image2.data"],
        header: HeaderStyle::Header,
        tags: Tags::OTA.union(Tags::SRAM),
        address_low: 0x1000_0000,
        address_high: 0x1004_0000,
    },
    ImageSpec {
        filename: "rdp.bin",
        sections: &[".ram_rdp.text"],
        header: HeaderStyle::None,
        tags: Tags::SRAM,
        address_low: 0x1003_f000,
        address_high: 0x1004_0000,
    },
    ImageSpec {
        filename: "xip_image1.bin",
        sections: &[".xip_image1.text"],
        header: HeaderStyle::Boot,
        tags: Tags::FLASH,
        address_low: 0x0800_0000,
        address_high: 0x0C00_0000,
    },
    ImageSpec {
        filename: "ram_1.bin",
        sections: &[".ram_image1.entry", ".ram_image1.text", ".ram_image1.data"],
        header: HeaderStyle::Boot,
        tags: Tags::SRAM,
        address_low: 0x1000_0000,
        address_high: 0x1004_0000,
    },
];

impl HeaderStyle {
    /// Returns the magic words of the header, if any
    pub fn magic(self) -> Option<[u32; 2]> {
        match self {
            HeaderStyle::None => None,
            HeaderStyle::Header => Some(HDR_MAGIC),
            HeaderStyle::Boot => Some(BOOT_MAGIC),
        }
    }
}

impl ImageSpec {
    /// Returns true if the section called `name` belongs to this image
    pub fn claims(&self, name: &str) -> bool {
        self.sections.iter().any(|section| *section == name)
    }
}

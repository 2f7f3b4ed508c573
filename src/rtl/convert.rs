//! Conversion of an ELF executable into the RTL8710 firmware images

use std::fs::File;
use std::path::PathBuf;

use log::{debug, error, info};

use super::{
    save, AddressCheck, AssembleError, AssembledImage, OtaWriter, Tags, LAYOUT, OTA_FILENAME,
};
use crate::elf::ElfParser;
use crate::{Error, Segment};

/// Options for `elf2image`
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// The ELF file to convert
    pub input: PathBuf,
    /// The directory to write the images to
    pub outdir: PathBuf,
    /// Also write the combined update file
    pub ota: bool,
    pub address_check: AddressCheck,
}

/// The number of bytes the images occupy in flash and SRAM
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Usage {
    pub flash: u64,
    pub sram: u64,
}

/// An image that was written to a file
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    /// The load address of the image
    pub address: u32,
    /// The size of the image data, excluding the header
    pub size: u32,
}

/// The combined update file that was written
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SavedOta {
    pub path: PathBuf,
    /// The images in the order they were appended
    pub images: Vec<SavedImage>,
    /// The trailing checksum word
    pub checksum: u32,
}

/// The outcome of a conversion
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Report {
    pub saved: Vec<SavedImage>,
    pub ota: Option<SavedOta>,
    pub usage: Usage,
}

impl Usage {
    /// Sums the image sizes, counting an image towards SRAM if it is tagged as such and
    /// towards flash otherwise
    pub fn of(images: &[AssembledImage]) -> Usage {
        images.iter().fold(Usage::default(), |mut usage, image| {
            if image.spec.tags.contains(Tags::SRAM) {
                usage.sram += u64::from(image.size);
            } else if image.spec.tags.contains(Tags::FLASH) {
                usage.flash += u64::from(image.size);
            }

            usage
        })
    }

    pub fn total(&self) -> u64 {
        self.flash + self.sram
    }
}

impl SavedImage {
    fn new(path: PathBuf, image: &AssembledImage) -> SavedImage {
        SavedImage {
            path,
            address: image.base_address.unwrap_or_default(),
            size: image.size,
        }
    }
}

/// Assembles every image in `LAYOUT` in order, claiming sections from `pool`
///
/// Images that fail to assemble are logged and left without data. An image rejected for its
/// address keeps its base address and size, so it still counts towards the `Usage`.
pub fn assemble_all(pool: &mut Vec<Segment>, check: AddressCheck) -> Vec<AssembledImage> {
    LAYOUT
        .iter()
        .map(|spec| match spec.assemble(pool, check) {
            Ok(image) => image,
            Err(err) => {
                error!("{}", err);

                let mut image = AssembledImage::empty(spec);

                if let AssembleError::SegmentAddress { address, size, .. } = err {
                    image.base_address = Some(address);
                    image.size = size;
                }

                image
            }
        })
        .collect()
}

/// Converts the ELF file in `options` to firmware images
///
/// Every image with data is saved to its own file in the output directory. When requested, the
/// update images are also combined into a single checksummed file.
pub fn elf2image(options: &Options) -> Result<Report, Error> {
    let file = File::open(&options.input).map_err(|source| Error::OpenInput {
        path: options.input.clone(),
        source,
    })?;
    let elf = ElfParser::parse(file)?;

    debug!(
        "Read {} sections from {}",
        elf.sections.len(),
        options.input.display()
    );

    let mut pool = elf.into_sections();
    let images = assemble_all(&mut pool, options.address_check);

    for section in &pool {
        debug!("Section not part of any image: {}", section);
    }

    let mut report = Report {
        usage: Usage::of(&images),
        ..Report::default()
    };

    for image in &images {
        if let Some(path) = save(image, &options.outdir)? {
            report.saved.push(SavedImage::new(path, image));
        }
    }

    if options.ota {
        report.ota = Some(save_ota_file(&images, options)?);
    }

    Ok(report)
}

/// Writes the update images to the combined update file in the output directory
fn save_ota_file(images: &[AssembledImage], options: &Options) -> Result<SavedOta, Error> {
    let path = options.outdir.join(OTA_FILENAME);
    let write_error = |source| Error::WriteOutput {
        path: path.clone(),
        source,
    };

    let mut writer = OtaWriter::create(&path).map_err(write_error)?;
    let mut saved = Vec::new();

    for image in images.iter().filter(|i| i.spec.tags.contains(Tags::OTA)) {
        writer.append(image).map_err(write_error)?;

        if !image.is_empty() {
            debug!(
                "Appended {} to {}, checksum {:#010x}",
                image.spec.filename,
                path.display(),
                writer.checksum()
            );

            saved.push(SavedImage::new(path.clone(), image));
        }
    }

    let (_, checksum) = writer.finish().map_err(write_error)?;

    info!("Saved {} with checksum {:#010x}", path.display(), checksum);

    Ok(SavedOta {
        path,
        images: saved,
        checksum,
    })
}

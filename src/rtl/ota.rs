//! Writing assembled images to their own files or to the combined update file

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use log::info;

use super::AssembledImage;
use crate::Error;

/// Writes `image` to its own file in `outdir` and returns the path of the file
///
/// Returns `None` without touching the file system if the image is empty.
pub fn save(image: &AssembledImage, outdir: &Path) -> Result<Option<PathBuf>, Error> {
    if image.is_empty() {
        return Ok(None);
    }

    let path = outdir.join(image.spec.filename);

    write_file(&path, |file| image.write_to(file)).map_err(|source| Error::WriteOutput {
        path: path.clone(),
        source,
    })?;

    info!(
        "Saved {} bytes at {:#010x} to {}",
        image.bytes.len(),
        image.base_address.unwrap_or_default(),
        path.display()
    );

    Ok(Some(path))
}

/// Appends `image` to the combined update file `writer` and returns `checksum` with every
/// written byte added to it
pub fn save_ota<W: Write>(image: &AssembledImage, writer: &mut W, checksum: u32) -> io::Result<u32> {
    if image.is_empty() {
        return Ok(checksum);
    }

    image.write_to(writer)?;

    Ok(add_bytes(checksum, &image.bytes))
}

/// Adds each byte of `bytes` to `checksum`, wrapping on overflow
pub fn add_bytes(checksum: u32, bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(checksum, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}

/// Writer for the combined update file, which holds the update images back to back followed by
/// a little endian checksum word
#[derive(Debug)]
pub struct OtaWriter<W: Write> {
    writer: W,
    checksum: u32,
}

impl OtaWriter<BufWriter<File>> {
    /// Creates the update file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;

        Ok(OtaWriter::new(BufWriter::new(file)))
    }
}

impl<W: Write> OtaWriter<W> {
    pub fn new(writer: W) -> OtaWriter<W> {
        OtaWriter {
            writer,
            checksum: 0,
        }
    }

    /// Appends the image if it is not empty
    pub fn append(&mut self, image: &AssembledImage) -> io::Result<()> {
        self.checksum = save_ota(image, &mut self.writer, self.checksum)?;

        Ok(())
    }

    /// Returns the checksum of everything appended so far
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Writes the checksum word and returns the inner writer along with the checksum
    pub fn finish(mut self) -> io::Result<(W, u32)> {
        self.writer.write_u32::<LittleEndian>(self.checksum)?;
        self.writer.flush()?;

        Ok((self.writer, self.checksum))
    }
}

/// Creates or truncates the file at `path` and writes to it with `f`
fn write_file<F>(path: &Path, f: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);

    f(&mut writer)?;
    writer.flush()
}

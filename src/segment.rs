use std::fmt;

/// A contiguous region of bytes that is to be placed at `address` on the target.
///
/// Segments read from an ELF file carry the name of the section they were read from, while
/// segments created by other means are anonymous.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Segment {
    /// The name of the ELF section, if the segment was read from one
    pub name: Option<String>,
    /// The load address of the segment
    pub address: u32,
    /// The segment data, always padded with zeros to a multiple of 4 bytes
    pub data: Vec<u8>,
    /// The size of the data before it was padded
    pub size: u32,
    /// The offset of the data in the file it was read from, when relevant
    pub file_offset: Option<u32>,
}

impl Segment {
    /// Creates a segment for the ELF section `name`, where `size` is the size of the section as
    /// declared in its section header
    pub fn section<S: Into<String>>(name: S, address: u32, data: Vec<u8>, size: u32) -> Segment {
        Segment {
            name: Some(name.into()),
            address,
            data: pad_to_word(data),
            size,
            file_offset: None,
        }
    }

    /// Returns the length of the padded segment data
    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    /// Returns true if the segment holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{} ", name)?;
        }

        write!(f, "len {:#07x} load {:#010x}", self.data.len(), self.address)?;

        if let Some(file_offset) = self.file_offset {
            write!(f, " file_offs {:#010x}", file_offset)?;
        }

        Ok(())
    }
}

/// Appends zeros to `data` until its length is a multiple of 4
fn pad_to_word(mut data: Vec<u8>) -> Vec<u8> {
    let rem = data.len() % 4;

    if rem != 0 {
        data.resize(data.len() + 4 - rem, 0);
    }

    data
}

//! A small ELF32 reader that extracts the loadable program sections of an RTL8710 executable

use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace, warn};
use num_enum::{FromPrimitive, IntoPrimitive};
use thiserror::Error;

use crate::Segment;

/// The length of the ELF32 file header
pub const HEADER_LEN: usize = 0x34;

/// The length of a single ELF32 section header entry
pub const SECTION_HEADER_LEN: usize = 0x28;

/// The largest number of section headers we're willing to read
pub const MAX_SECTIONS: u16 = 100;

/// The ELF machine type of the ARM Cortex-M core in the RTL8710
pub const MACHINE_ARM: u16 = 0x28;

/// The ELF magic value
const MAGIC: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];

/// Parser that reads the ELF header and section table of a file
#[derive(Debug)]
pub struct ElfParser<R> {
    reader: BufReader<R>,
}

/// The fields of the ELF32 file header that we care about
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Header {
    /// The object file type
    pub file_type: u16,
    /// The target machine type
    pub machine: u16,
    /// The program entry address
    pub entry_addr: u32,
    /// The program header offset
    pub ph_offset: u32,
    /// The section header offset
    pub sh_offset: u32,
    /// The number of section header entries
    pub sh_entry_num: u16,
    /// The index of the section header that contains the names for the sections
    pub sh_str_idx: u16,
}

/// ELF32 Section Header
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SectionHeader {
    /// Offset to a string in the .shstrtab section with the name of this section
    pub name_offset: u32,
    /// The raw type code of this section
    pub typ: u32,
    /// The attributes of this section
    pub flags: u32,
    /// Virtual address for this section, if it's to be loaded into memory
    pub virt_addr: u32,
    /// Offset to the section in the file image
    pub offset: u32,
    /// The size of the section in the file image, in bytes
    pub size: u32,
}

/// The section types defined by the ELF specification that we know of
#[repr(u32)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum SectionType {
    Null = 0x00,
    /// Program data
    ProgBits = 0x01,
    SymTab = 0x02,
    /// String table
    StrTab = 0x03,
    Rela = 0x04,
    Hash = 0x05,
    Dynamic = 0x06,
    Note = 0x07,
    /// Program space with no data, like .bss
    NoBits = 0x08,
    Rel = 0x09,
    #[num_enum(default)]
    Unknown = 0xffff_ffff,
}

/// Errors that indicate what went wrong during parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing ELF header")]
    MissingHeader,
    #[error("Input does not contain ELF magic header")]
    InvalidMagicHeader,
    #[error("Input does not appear to be an RTL ELF file, e_machine={:#06x}", _0)]
    UnsupportedMachineType(u16),
    #[error("{} sections found in ELF file", _0)]
    InvalidSectionCount(u16),
    #[error("No section header found at offset {:#06x} in ELF file", _0)]
    MissingSectionHeaders(u32),
    #[error("ELF file has no STRTAB section at index {}", _0)]
    MissingStringTable(u16),
    #[error("The string table is truncated, expected {} bytes at offset {:#x}", size, offset)]
    TruncatedStringTable { offset: u32, size: u32 },
    #[error("Section name offset {:#x} is outside the string table", _0)]
    InvalidSectionName(u32),
    #[error("Section {} is truncated, expected {} bytes at offset {:#x}", name, size, offset)]
    TruncatedSection { name: String, offset: u32, size: u32 },
    #[error("I/O error: {}", _0)]
    IoError(#[from] io::Error),
}

/// A parsed ELF file with its loadable program sections
#[derive(Debug)]
pub struct ElfFile {
    pub header: Header,
    pub sections: Vec<Segment>,
}

impl SectionHeader {
    /// Reads a section header from a single section header table entry
    pub fn from_bytes(buf: &[u8]) -> io::Result<SectionHeader> {
        let mut cursor = Cursor::new(buf);

        Ok(SectionHeader {
            name_offset: cursor.read_u32::<LittleEndian>()?,
            typ: cursor.read_u32::<LittleEndian>()?,
            flags: cursor.read_u32::<LittleEndian>()?,
            virt_addr: cursor.read_u32::<LittleEndian>()?,
            offset: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Returns the type of the section
    pub fn section_type(&self) -> SectionType {
        SectionType::from_primitive(self.typ)
    }
}

impl ElfFile {
    /// Consumes `self` and returns the sections
    pub fn into_sections(self) -> Vec<Segment> {
        self.sections
    }
}

impl<R: Read + Seek> ElfParser<R> {
    pub fn new(reader: R) -> ElfParser<R> {
        let reader = BufReader::new(reader);

        ElfParser { reader }
    }

    /// Parses the header and every program data section with a non-zero load address
    pub fn parse(reader: R) -> Result<ElfFile, ParseError> {
        let mut parser = ElfParser::new(reader);
        let header = parser.parse_header()?;
        let sections = parser.parse_sections(&header)?;

        Ok(ElfFile { header, sections })
    }

    pub fn parse_header(&mut self) -> Result<Header, ParseError> {
        // Seek to the beginning of the file
        self.reader.seek(SeekFrom::Start(0))?;

        let mut header = [0u8; HEADER_LEN];

        self.reader
            .read_exact(&mut header)
            .map_err(|_| ParseError::MissingHeader)?;

        // Ensure that the header starts with the magic value
        if header[0x0..0x4] != MAGIC {
            return Err(ParseError::InvalidMagicHeader);
        }

        // Everything after the 16 byte identification is read as little endian fields
        let mut cursor = Cursor::new(&header[0x10..]);

        let file_type = cursor.read_u16::<LittleEndian>()?;
        let machine = cursor.read_u16::<LittleEndian>()?;

        if machine != MACHINE_ARM {
            return Err(ParseError::UnsupportedMachineType(machine));
        }

        // Skip the ELF version
        let _version = cursor.read_u32::<LittleEndian>()?;
        let entry_addr = cursor.read_u32::<LittleEndian>()?;
        let ph_offset = cursor.read_u32::<LittleEndian>()?;
        let sh_offset = cursor.read_u32::<LittleEndian>()?;

        // Skip the flags, the header size and the program header entry size and count
        cursor.seek(SeekFrom::Current(4 + 2 + 2 + 2))?;

        // The section header entry size is always assumed to be `SECTION_HEADER_LEN`
        let _sh_entry_size = cursor.read_u16::<LittleEndian>()?;
        let sh_entry_num = cursor.read_u16::<LittleEndian>()?;
        let sh_str_idx = cursor.read_u16::<LittleEndian>()?;

        let header = Header {
            file_type,
            machine,
            entry_addr,
            ph_offset,
            sh_offset,
            sh_entry_num,
            sh_str_idx,
        };

        debug!("ELF header: {:x?}", header);

        Ok(header)
    }

    /// Reads the section header table described by `header`
    pub fn section_headers(&mut self, header: &Header) -> Result<Vec<SectionHeader>, ParseError> {
        if header.sh_entry_num == 0 || header.sh_entry_num > MAX_SECTIONS {
            return Err(ParseError::InvalidSectionCount(header.sh_entry_num));
        }

        let expected_len = header.sh_entry_num as usize * SECTION_HEADER_LEN;
        let mut table = Vec::with_capacity(expected_len);

        self.reader.seek(SeekFrom::Start(header.sh_offset as u64))?;
        self.reader
            .by_ref()
            .take(expected_len as u64)
            .read_to_end(&mut table)?;

        if table.is_empty() {
            return Err(ParseError::MissingSectionHeaders(header.sh_offset));
        }

        if table.len() != expected_len {
            warn!(
                "Unexpected ELF section header length {:#06x} is not mod-{:#04x}",
                table.len(),
                SECTION_HEADER_LEN
            );
        }

        // Only whole entries are read, a trailing partial entry is ignored
        let headers = table
            .chunks_exact(SECTION_HEADER_LEN)
            .map(SectionHeader::from_bytes)
            .collect::<io::Result<Vec<_>>>()?;

        Ok(headers)
    }

    /// Reads the section name string table
    pub fn string_table(
        &mut self,
        header: &Header,
        headers: &[SectionHeader],
    ) -> Result<Vec<u8>, ParseError> {
        let strtab = headers
            .get(header.sh_str_idx as usize)
            .ok_or(ParseError::MissingStringTable(header.sh_str_idx))?;

        if strtab.section_type() != SectionType::StrTab {
            warn!(
                "ELF file has incorrect STRTAB section type {:#04x}",
                strtab.typ
            );
        }

        let table = self.read_at(strtab.offset, strtab.size)?;

        if table.len() != strtab.size as usize {
            return Err(ParseError::TruncatedStringTable {
                offset: strtab.offset,
                size: strtab.size,
            });
        }

        Ok(table)
    }

    /// Reads every program data section with a non-zero load address as a `Segment`
    pub fn parse_sections(&mut self, header: &Header) -> Result<Vec<Segment>, ParseError> {
        let headers = self.section_headers(header)?;
        let string_table = self.string_table(header, &headers)?;
        let mut sections = Vec::new();

        for sh in headers
            .iter()
            .filter(|sh| sh.section_type() == SectionType::ProgBits && sh.virt_addr != 0)
        {
            let name = lookup_name(&string_table, sh.name_offset)?;
            let data = self.read_section_data(&name, sh)?;
            let mut section = Segment::section(name, sh.virt_addr, data, sh.size);

            section.file_offset = Some(sh.offset);

            trace!("Read section {}", section);

            sections.push(section);
        }

        Ok(sections)
    }

    fn read_section_data(&mut self, name: &str, sh: &SectionHeader) -> Result<Vec<u8>, ParseError> {
        let data = self.read_at(sh.offset, sh.size)?;

        if data.len() != sh.size as usize {
            return Err(ParseError::TruncatedSection {
                name: name.to_owned(),
                offset: sh.offset,
                size: sh.size,
            });
        }

        Ok(data)
    }

    /// Reads up to `size` bytes at `offset`, stopping early at the end of the file
    fn read_at(&mut self, offset: u32, size: u32) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();

        self.reader.seek(SeekFrom::Start(u64::from(offset)))?;
        self.reader
            .by_ref()
            .take(u64::from(size))
            .read_to_end(&mut buf)?;

        Ok(buf)
    }
}

/// Returns the null-terminated string at `offset` in the `string_table`
fn lookup_name(string_table: &[u8], offset: u32) -> Result<String, ParseError> {
    let raw = string_table
        .get(offset as usize..)
        .ok_or(ParseError::InvalidSectionName(offset))?;
    let end = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or(ParseError::InvalidSectionName(offset))?;

    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

//! Helpers for building ELF files in tests

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::elf::{HEADER_LEN, MACHINE_ARM, SECTION_HEADER_LEN};

const SHT_PROGBITS: u32 = 0x01;
const SHT_STRTAB: u32 = 0x03;
const SHT_NOBITS: u32 = 0x08;

struct Section {
    name: String,
    typ: u32,
    addr: u32,
    data: Vec<u8>,
    size: u32,
}

/// Builds a little endian ELF32 executable with a section header table
pub struct ElfBuilder {
    machine: u16,
    entry: u32,
    strtab_type: u32,
    sections: Vec<Section>,
}

impl ElfBuilder {
    pub fn new() -> ElfBuilder {
        ElfBuilder {
            machine: MACHINE_ARM,
            entry: 0,
            strtab_type: SHT_STRTAB,
            sections: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> ElfBuilder {
        self.machine = machine;
        self
    }

    pub fn entry(mut self, entry: u32) -> ElfBuilder {
        self.entry = entry;
        self
    }

    pub fn string_table_type(mut self, typ: u32) -> ElfBuilder {
        self.strtab_type = typ;
        self
    }

    /// Adds a program data section
    pub fn progbits(mut self, name: &str, addr: u32, data: &[u8]) -> ElfBuilder {
        self.sections.push(Section {
            name: name.to_owned(),
            typ: SHT_PROGBITS,
            addr,
            data: data.to_vec(),
            size: data.len() as u32,
        });
        self
    }

    /// Adds a section that occupies `size` bytes of memory but none in the file
    pub fn nobits(mut self, name: &str, addr: u32, size: u32) -> ElfBuilder {
        self.sections.push(Section {
            name: name.to_owned(),
            typ: SHT_NOBITS,
            addr,
            data: Vec::new(),
            size,
        });
        self
    }

    /// Lays out the header, the section data, the string table and finally the section header
    /// table
    pub fn build(self) -> Vec<u8> {
        let mut strtab = vec![0u8];
        let mut name_offsets = Vec::new();

        for section in &self.sections {
            name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(section.name.as_bytes());
            strtab.push(0);
        }

        let strtab_name = strtab.len() as u32;
        strtab.extend_from_slice(b".shstrtab\0");

        let mut body = Vec::new();
        let mut offsets = Vec::new();

        for section in &self.sections {
            offsets.push((HEADER_LEN + body.len()) as u32);
            body.extend_from_slice(&section.data);
        }

        let strtab_offset = (HEADER_LEN + body.len()) as u32;
        body.extend_from_slice(&strtab);

        while body.len() % 4 != 0 {
            body.push(0);
        }

        let sh_offset = (HEADER_LEN + body.len()) as u32;
        let sh_num = self.sections.len() as u16 + 2;

        let mut buf = Vec::new();

        buf.write_all(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]).unwrap();
        buf.write_all(&[0u8; 8]).unwrap();
        buf.write_u16::<LittleEndian>(2).unwrap();
        buf.write_u16::<LittleEndian>(self.machine).unwrap();
        buf.write_u32::<LittleEndian>(1).unwrap();
        buf.write_u32::<LittleEndian>(self.entry).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(sh_offset).unwrap();
        buf.write_u32::<LittleEndian>(0x0500_0200).unwrap();
        buf.write_u16::<LittleEndian>(HEADER_LEN as u16).unwrap();
        buf.write_u16::<LittleEndian>(0x20).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.write_u16::<LittleEndian>(SECTION_HEADER_LEN as u16).unwrap();
        buf.write_u16::<LittleEndian>(sh_num).unwrap();
        buf.write_u16::<LittleEndian>(sh_num - 1).unwrap();

        assert_eq!(buf.len(), HEADER_LEN);

        buf.extend_from_slice(&body);

        write_section_header(&mut buf, [0; 6]);

        for ((section, name), offset) in self.sections.iter().zip(name_offsets).zip(offsets) {
            write_section_header(
                &mut buf,
                [name, section.typ, 0x06, section.addr, offset, section.size],
            );
        }

        write_section_header(
            &mut buf,
            [
                strtab_name,
                self.strtab_type,
                0,
                0,
                strtab_offset,
                strtab.len() as u32,
            ],
        );

        buf
    }
}

/// Writes name, type, flags, address, offset and size followed by zeroed link, info, alignment
/// and entry size fields
fn write_section_header(buf: &mut Vec<u8>, fields: [u32; 6]) {
    for field in fields.iter() {
        buf.write_u32::<LittleEndian>(*field).unwrap();
    }

    buf.write_all(&[0u8; 16]).unwrap();
}

/// Creates an empty directory under the system temp directory that is unique to this process
/// and `name`
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rtlimage-{}-{}", std::process::id(), name));

    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();

    dir
}

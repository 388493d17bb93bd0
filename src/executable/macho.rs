//! Mach-O executables.

use object::{Object, ObjectSection, ObjectSegment};

use super::{detect_goarch, find_section, open, section_data, Executable};
use crate::error::{Error, Format, Result};
use crate::symbol::Function;

const TEXT: &str = "__text";
const GOSYMTAB: &str = "__gosymtab";
const GOPCLNTAB: &str = "__gopclntab";

pub struct MachO {
    goarch: String,
    segment_vaddr: u64,
    segment_offset: u64,
    text_addr: u64,
    symtab: Vec<u8>,
    pclntab: Vec<u8>,
}

impl MachO {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let file = open(data, Format::MachO)?;

        let text = find_section(&file, Format::MachO, TEXT)?;
        let symtab = find_section(&file, Format::MachO, GOSYMTAB)?;
        let pclntab = find_section(&file, Format::MachO, GOPCLNTAB)?;

        // The segment mapping the code carries the vm-address to file-offset rule.
        let text_addr = text.address();
        let segment = file
            .segments()
            .find(|segment| {
                let start = segment.address();
                text_addr >= start && text_addr - start < segment.size()
            })
            .ok_or_else(|| Error::not_go(Format::MachO, "no segment maps the code section"))?;
        let (segment_offset, _) = segment.file_range();

        Ok(Self {
            goarch: detect_goarch(data, &file, Format::MachO)?,
            segment_vaddr: segment.address(),
            segment_offset,
            text_addr,
            symtab: section_data(&symtab, Format::MachO)?,
            pclntab: section_data(&pclntab, Format::MachO)?,
        })
    }
}

impl Executable for MachO {
    fn format(&self) -> Format {
        Format::MachO
    }

    fn goarch(&self) -> &str {
        &self.goarch
    }

    fn text_addr(&self) -> u64 {
        self.text_addr
    }

    fn symtab_data(&self) -> &[u8] {
        &self.symtab
    }

    fn pclntab_data(&self) -> &[u8] {
        &self.pclntab
    }

    fn offset(&self, function: &Function) -> i64 {
        function
            .entry
            .wrapping_sub(self.segment_vaddr)
            .wrapping_add(self.segment_offset) as i64
    }
}

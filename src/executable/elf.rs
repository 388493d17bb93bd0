//! ELF executables.

use object::{Object, ObjectSection, ObjectSegment};

use super::{detect_goarch, find_section, open, section_data, Executable};
use crate::error::{Error, Format, Result};
use crate::symbol::Function;

const TEXT: &str = ".text";
const GOSYMTAB: &str = ".gosymtab";
const GOPCLNTAB: &str = ".gopclntab";

pub struct Elf {
    goarch: String,
    load_vaddr: u64,
    text_addr: u64,
    symtab: Vec<u8>,
    pclntab: Vec<u8>,
}

impl Elf {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let file = open(data, Format::Elf)?;

        // `object` only yields PT_LOAD program headers as segments.
        let load = file
            .segments()
            .next()
            .ok_or_else(|| Error::not_go(Format::Elf, "no loadable segment"))?;

        let text = find_section(&file, Format::Elf, TEXT)?;
        let symtab = find_section(&file, Format::Elf, GOSYMTAB)?;
        let pclntab = find_section(&file, Format::Elf, GOPCLNTAB)?;

        Ok(Self {
            goarch: detect_goarch(data, &file, Format::Elf)?,
            load_vaddr: load.address(),
            text_addr: text.address(),
            symtab: section_data(&symtab, Format::Elf)?,
            pclntab: section_data(&pclntab, Format::Elf)?,
        })
    }
}

impl Executable for Elf {
    fn format(&self) -> Format {
        Format::Elf
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
        function.entry.wrapping_sub(self.load_vaddr) as i64
    }
}

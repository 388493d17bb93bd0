//! PE executables.
//!
//! Go does not emit dedicated sections for its metadata in PE images. The symbol
//! table and pc-line table live inside another section and are delimited by
//! pairs of COFF symbols.

use object::{Object, ObjectSection, ObjectSymbol, SectionIndex};

use super::{detect_goarch, find_section, open, Executable};
use crate::error::{Error, Format, Result};
use crate::symbol::Function;

const TEXT: &str = ".text";
const SYMTAB_START: &str = "runtime.symtab";
const SYMTAB_END: &str = "runtime.esymtab";
const PCLNTAB_START: &str = "runtime.pclntab";
const PCLNTAB_END: &str = "runtime.epclntab";

pub struct Pe {
    goarch: String,
    image_base: u64,
    text_rva: u64,
    text_offset: u64,
    symtab: Vec<u8>,
    pclntab: Vec<u8>,
}

impl Pe {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let file = open(data, Format::Pe)?;
        let image_base = file.relative_address_base();

        let text = find_section(&file, Format::Pe, TEXT)?;
        let (text_offset, _) = text
            .file_range()
            .ok_or_else(|| Error::not_go(Format::Pe, ".text section has no file data"))?;

        Ok(Self {
            goarch: detect_goarch(data, &file, Format::Pe)?,
            image_base,
            text_rva: text.address().wrapping_sub(image_base),
            text_offset,
            symtab: marked_range(&file, SYMTAB_START, SYMTAB_END)?,
            pclntab: marked_range(&file, PCLNTAB_START, PCLNTAB_END)?,
        })
    }
}

/// Extracts the bytes between the `start` and `end` marker symbols, which must
/// both be defined in the same section.
fn marked_range(file: &object::File<'_>, start: &str, end: &str) -> Result<Vec<u8>> {
    let mut start_sym: Option<(SectionIndex, u64)> = None;
    let mut end_sym: Option<(SectionIndex, u64)> = None;

    for symbol in file.symbols() {
        let (name, slot) = match symbol.name() {
            Ok(name) if name == start => (name, &mut start_sym),
            Ok(name) if name == end => (name, &mut end_sym),
            _ => continue,
        };
        if slot.is_some() {
            continue;
        }
        let index = symbol.section_index().ok_or_else(|| {
            Error::not_go(Format::Pe, format!("symbol {name} has no section"))
        })?;
        *slot = Some((index, symbol.address()));
    }

    let (Some((start_index, start_addr)), Some((end_index, end_addr))) = (start_sym, end_sym)
    else {
        return Err(Error::not_go(
            Format::Pe,
            format!("{start}/{end} symbols not found"),
        ));
    };
    if start_index != end_index {
        return Err(Error::not_go(
            Format::Pe,
            format!("{start} and {end} are in different sections"),
        ));
    }

    let section = file
        .section_by_index(start_index)
        .map_err(|err| Error::not_go(Format::Pe, format!("bad section for {start}: {err}")))?;
    let data = section
        .data()
        .map_err(|err| Error::not_go(Format::Pe, format!("section data: {err}")))?;

    // Symbol addresses include the section's address; the difference is the value.
    let from = start_addr.wrapping_sub(section.address());
    let to = end_addr.wrapping_sub(section.address());
    usize::try_from(from)
        .ok()
        .zip(usize::try_from(to).ok())
        .and_then(|(from, to)| data.get(from..to))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::not_go(Format::Pe, format!("{start}..{end} is outside its section")))
}

impl Executable for Pe {
    fn format(&self) -> Format {
        Format::Pe
    }

    fn goarch(&self) -> &str {
        &self.goarch
    }

    fn text_addr(&self) -> u64 {
        self.image_base.wrapping_add(self.text_rva)
    }

    fn symtab_data(&self) -> &[u8] {
        &self.symtab
    }

    fn pclntab_data(&self) -> &[u8] {
        &self.pclntab
    }

    fn offset(&self, function: &Function) -> i64 {
        let rva = function.entry.wrapping_sub(self.image_base) as i64;
        rva - self.text_rva.wrapping_sub(self.text_offset) as i64
    }
}

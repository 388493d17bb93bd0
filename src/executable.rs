//! Executable container recognition.
//!
//! This module defines the `Executable` trait: the view of a Go-built binary the
//! replacer needs (architecture, code base address, the two metadata blobs and
//! the rule mapping a function's entry address to a file offset). ELF, Mach-O
//! and PE each provide one implementation, chosen either by sniffing magic bytes
//! or by trying the parsers in order.

use object::{Architecture as ObjArch, Object, ObjectSection};

use crate::error::{Error, Format, Result};
use crate::symbol::Function;

pub mod buildinfo;
pub mod elf;
pub mod macho;
pub mod pe;

pub use elf::Elf;
pub use macho::MachO;
pub use pe::Pe;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
];
const PE_MAGIC: [u8; 2] = *b"MZ";

/// Information about a Go executable required for patching.
pub trait Executable {
    fn format(&self) -> Format;

    /// `GOARCH` of the executable, e.g. `amd64`.
    fn goarch(&self) -> &str;

    /// Virtual address of the code section.
    fn text_addr(&self) -> u64;

    /// Raw contents of the Go symbol table.
    fn symtab_data(&self) -> &[u8];

    /// Raw contents of the Go pc-line table.
    fn pclntab_data(&self) -> &[u8];

    /// File offset of the function's first instruction.
    fn offset(&self, function: &Function) -> i64;
}

/// Recognizes the container by its leading magic bytes and parses it.
pub fn by_signature(data: &[u8]) -> Result<Box<dyn Executable>> {
    let signature: [u8; 4] = match data.get(..4) {
        Some(bytes) => [bytes[0], bytes[1], bytes[2], bytes[3]],
        None => return Err(Error::UnknownFormat),
    };

    let executable = if signature == ELF_MAGIC {
        parse_elf(data)?
    } else if MACHO_MAGICS.contains(&signature) {
        parse_macho(data)?
    } else if signature[..2] == PE_MAGIC {
        parse_pe(data)?
    } else {
        return Err(Error::UnknownFormat);
    };

    tracing::debug!(
        format = %executable.format(),
        goarch = executable.goarch(),
        text = format_args!("0x{:x}", executable.text_addr()),
        "recognized executable"
    );
    Ok(executable)
}

/// Tries ELF, Mach-O and PE in order. A container that parses but is not a Go
/// executable stops the search with that parser's error.
pub fn recognize(data: &[u8]) -> Result<Box<dyn Executable>> {
    let parsers: [fn(&[u8]) -> Result<Box<dyn Executable>>; 3] = [parse_elf, parse_macho, parse_pe];

    for parse in parsers {
        match parse(data) {
            Ok(executable) => return Ok(executable),
            Err(Error::NotFormat { format, reason }) => {
                tracing::trace!(%format, %reason, "not this container format");
            }
            Err(err) => return Err(err),
        }
    }

    Err(Error::UnknownFormat)
}

fn parse_elf(data: &[u8]) -> Result<Box<dyn Executable>> {
    Ok(Box::new(Elf::parse(data)?))
}

fn parse_macho(data: &[u8]) -> Result<Box<dyn Executable>> {
    Ok(Box::new(MachO::parse(data)?))
}

fn parse_pe(data: &[u8]) -> Result<Box<dyn Executable>> {
    Ok(Box::new(Pe::parse(data)?))
}

/// Parses `data` with `object` and checks it is a container of `format`.
pub(crate) fn open(data: &[u8], format: Format) -> Result<object::File<'_>> {
    let file = object::File::parse(data).map_err(|err| Error::NotFormat {
        format,
        reason: err.to_string(),
    })?;

    let actual = match file.format() {
        object::BinaryFormat::Elf => Format::Elf,
        object::BinaryFormat::MachO => Format::MachO,
        object::BinaryFormat::Pe => Format::Pe,
        other => {
            return Err(Error::NotFormat {
                format,
                reason: format!("found {other:?}"),
            })
        }
    };
    if actual != format {
        return Err(Error::NotFormat {
            format,
            reason: format!("found {actual}"),
        });
    }
    Ok(file)
}

pub(crate) fn find_section<'data, 'file>(
    file: &'file object::File<'data>,
    format: Format,
    name: &str,
) -> Result<object::Section<'data, 'file>> {
    file.section_by_name(name)
        .ok_or_else(|| Error::not_go(format, format!("{name} section not found")))
}

pub(crate) fn section_data<'data>(
    section: &impl ObjectSection<'data>,
    format: Format,
) -> Result<Vec<u8>> {
    section
        .data()
        .map(<[u8]>::to_vec)
        .map_err(|err| Error::not_go(format, format!("section data: {err}")))
}

/// Resolves `GOARCH`: first from embedded build settings, then from the header's machine field.
pub(crate) fn detect_goarch(data: &[u8], file: &object::File<'_>, format: Format) -> Result<String> {
    if let Some(goarch) = buildinfo::goarch(data) {
        return Ok(goarch);
    }
    goarch_from_machine(file.architecture(), file.is_little_endian())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::not_go(
                format,
                format!("can't detect goarch from {:?}", file.architecture()),
            )
        })
}

/// Maps a machine type to the `GOARCH` spelling Go uses for it.
pub fn goarch_from_machine(arch: ObjArch, little_endian: bool) -> Option<&'static str> {
    let goarch = match (arch, little_endian) {
        (ObjArch::I386, _) => "386",
        (ObjArch::X86_64, _) => "amd64",
        (ObjArch::Arm, true) => "arm",
        (ObjArch::Arm, false) => "armbe",
        (ObjArch::Aarch64, true) => "arm64",
        (ObjArch::Aarch64, false) => "arm64be",
        (ObjArch::Mips, true) => "mipsle",
        (ObjArch::Mips, false) => "mips",
        (ObjArch::Mips64, true) => "mips64le",
        (ObjArch::Mips64, false) => "mips64",
        (ObjArch::Riscv32, _) => "riscv",
        (ObjArch::Riscv64, _) => "riscv64",
        (ObjArch::PowerPc64, true) => "ppc64le",
        (ObjArch::PowerPc64, false) => "ppc64",
        (ObjArch::S390x, _) => "s390x",
        (ObjArch::LoongArch64, _) => "loong64",
        _ => return None,
    };
    Some(goarch)
}

//! Synthetic Go executables for integration tests.
//!
//! Each builder lays out a minimal but well-formed container holding a code
//! section and a Go 1.20 line table describing the functions in it.

#![allow(dead_code)]

use object::endian::{U16, U32, U64};
use object::pod::bytes_of;
use object::Endianness;

pub const PAGE_SIZE: u64 = 0x1000;

/// ELF: one PT_LOAD mapping the whole file at `ELF_BASE`.
pub const ELF_BASE: u64 = 0x400000;
pub const ELF_TEXT_OFFSET: u64 = 0x1000;

/// Mach-O: the `__TEXT` segment maps the file from offset 0 at `MACHO_BASE`.
pub const MACHO_BASE: u64 = 0x1000000;
pub const MACHO_TEXT_OFFSET: u64 = 0x1000;

/// PE: `.text` is at RVA 0x1000 but file offset 0x400.
pub const PE_IMAGE_BASE: u64 = 0x400000;
pub const PE_TEXT_RVA: u64 = 0x1000;
pub const PE_TEXT_OFFSET: u64 = 0x400;
const PE_FILE_ALIGN: u64 = 0x200;

/// Filler for code bytes, so untouched bytes are easy to check.
pub const FILL: u8 = 0xcc;

/// Functions laid out in a code section, as offsets from its start.
#[derive(Debug, Clone)]
pub struct Program<'a> {
    pub functions: &'a [(&'a str, u32)],
    pub text_len: u32,
    /// `GOARCH` recorded in embedded build info, if any.
    pub goarch: Option<&'a str>,
    pub with_pclntab: bool,
}

impl Program<'static> {
    /// `main.a` at the start of the code and `main.b` 0x1000 bytes later.
    pub fn two_functions() -> Self {
        Program {
            functions: &[("main.a", 0), ("main.b", 0x1000)],
            text_len: 0x1100,
            goarch: None,
            with_pclntab: true,
        }
    }
}

impl<'a> Program<'a> {
    pub fn goarch(mut self, goarch: &'a str) -> Self {
        self.goarch = Some(goarch);
        self
    }

    pub fn without_pclntab(mut self) -> Self {
        self.with_pclntab = false;
        self
    }
}

/// Go 1.20 line table: little-endian, 8-byte pointers, entries relative to
/// the start of the code section.
pub fn pclntab(functions: &[(&str, u32)], text_len: u32) -> Vec<u8> {
    let mut names = Vec::new();
    let mut name_offsets = Vec::new();
    for (name, _) in functions {
        name_offsets.push(names.len() as u32);
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }

    let header_len = 8 + 8 * 8;
    let funcdata = header_len + names.len();
    let functab_len = (functions.len() * 2 + 1) * 4;

    let mut out = vec![0xf1, 0xff, 0xff, 0xff, 0, 0, 1, 8];
    let words = [functions.len(), 0, 0, header_len, 0, 0, 0, funcdata];
    for word in words {
        out.extend_from_slice(&(word as u64).to_le_bytes());
    }
    out.extend_from_slice(&names);

    for (i, (_, entry)) in functions.iter().enumerate() {
        out.extend_from_slice(&entry.to_le_bytes());
        out.extend_from_slice(&((functab_len + i * 8) as u32).to_le_bytes());
    }
    out.extend_from_slice(&text_len.to_le_bytes());

    for (i, (_, entry)) in functions.iter().enumerate() {
        out.extend_from_slice(&entry.to_le_bytes());
        out.extend_from_slice(&name_offsets[i].to_le_bytes());
    }
    out
}

/// Go 1.18+ build info with inline strings, aligned to 16 bytes.
fn append_buildinfo(out: &mut Vec<u8>, goarch: &str) {
    fn put_string(out: &mut Vec<u8>, value: &[u8]) {
        let mut len = value.len();
        while len >= 0x80 {
            out.push((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        out.push(len as u8);
        out.extend_from_slice(value);
    }

    pad_to(out, 16);
    let start = out.len();
    out.extend_from_slice(b"\xff Go buildinf:");
    out.push(8);
    out.push(0x2);
    out.resize(start + 32, 0);
    put_string(out, b"go1.21.5");
    let modinfo = format!(
        "path\texample.com/app\nbuild\t-compiler=gc\nbuild\tGOARCH={goarch}\nbuild\tGOOS=linux\n"
    );
    put_string(out, modinfo.as_bytes());
}

fn pad_to(out: &mut Vec<u8>, align: usize) {
    let len = out.len().next_multiple_of(align);
    out.resize(len, 0);
}

fn u16(v: u16) -> U16<Endianness> {
    U16::new(Endianness::Little, v)
}
fn u32(v: u32) -> U32<Endianness> {
    U32::new(Endianness::Little, v)
}
fn u64(v: u64) -> U64<Endianness> {
    U64::new(Endianness::Little, v)
}

fn elf_section(name: u32, sh_type: u32, flags: u64, addr: u64, offset: u64, size: u64) -> object::elf::SectionHeader64<Endianness> {
    object::elf::SectionHeader64 {
        sh_name: u32(name),
        sh_type: u32(sh_type),
        sh_flags: u64(flags),
        sh_addr: u64(addr),
        sh_offset: u64(offset),
        sh_size: u64(size),
        sh_link: u32(0),
        sh_info: u32(0),
        sh_addralign: u64(if sh_type == object::elf::SHT_STRTAB { 1 } else { 16 }),
        sh_entsize: u64(0),
    }
}

/// A 64-bit little-endian ELF executable for `machine` (an `EM_*` value).
pub fn elf(machine: u16, program: &Program<'_>) -> Vec<u8> {
    use object::elf::*;

    let mut buffer = vec![0u8; ELF_TEXT_OFFSET as usize];
    buffer.resize(buffer.len() + program.text_len as usize, FILL);

    pad_to(&mut buffer, 16);
    let gosymtab_offset = buffer.len() as u64;

    let pclntab_offset = buffer.len() as u64;
    if program.with_pclntab {
        buffer.extend_from_slice(&pclntab(program.functions, program.text_len));
    }
    let pclntab_size = buffer.len() as u64 - pclntab_offset;
    let load_size = buffer.len() as u64;

    if let Some(goarch) = program.goarch {
        append_buildinfo(&mut buffer, goarch);
    }

    let mut shstrtab = vec![0u8];
    let mut name = |s: &str| {
        let offset = shstrtab.len() as u32;
        shstrtab.extend_from_slice(s.as_bytes());
        shstrtab.push(0);
        offset
    };
    let text_name = name(".text");
    let gosymtab_name = name(".gosymtab");
    let pclntab_name = name(".gopclntab");
    let shstrtab_name = name(".shstrtab");

    let shstrtab_offset = buffer.len() as u64;
    buffer.extend_from_slice(&shstrtab);
    pad_to(&mut buffer, 8);
    let shoff = buffer.len() as u64;

    let mut sections = vec![
        elf_section(0, SHT_NULL, 0, 0, 0, 0),
        elf_section(
            text_name,
            SHT_PROGBITS,
            u64::from(SHF_ALLOC | SHF_EXECINSTR),
            ELF_BASE + ELF_TEXT_OFFSET,
            ELF_TEXT_OFFSET,
            u64::from(program.text_len),
        ),
        elf_section(
            gosymtab_name,
            SHT_PROGBITS,
            u64::from(SHF_ALLOC),
            ELF_BASE + gosymtab_offset,
            gosymtab_offset,
            0,
        ),
    ];
    if program.with_pclntab {
        sections.push(elf_section(
            pclntab_name,
            SHT_PROGBITS,
            u64::from(SHF_ALLOC),
            ELF_BASE + pclntab_offset,
            pclntab_offset,
            pclntab_size,
        ));
    }
    sections.push(elf_section(
        shstrtab_name,
        SHT_STRTAB,
        0,
        0,
        shstrtab_offset,
        shstrtab.len() as u64,
    ));
    for section in &sections {
        buffer.extend_from_slice(bytes_of(section));
    }

    let file_header = FileHeader64::<Endianness> {
        e_ident: Ident {
            magic: ELFMAG,
            class: ELFCLASS64,
            data: ELFDATA2LSB,
            version: EV_CURRENT,
            os_abi: ELFOSABI_SYSV,
            abi_version: 0,
            padding: [0; 7],
        },
        e_type: u16(ET_EXEC),
        e_machine: u16(machine),
        e_version: u32(EV_CURRENT as u32),
        e_entry: u64(ELF_BASE + ELF_TEXT_OFFSET),
        e_phoff: u64(64),
        e_shoff: u64(shoff),
        e_flags: u32(0),
        e_ehsize: u16(64),
        e_phentsize: u16(56),
        e_phnum: u16(1),
        e_shentsize: u16(64),
        e_shnum: u16(sections.len() as u16),
        e_shstrndx: u16(sections.len() as u16 - 1),
    };
    let prog_header = ProgramHeader64::<Endianness> {
        p_type: u32(PT_LOAD),
        p_flags: u32(PF_R | PF_X),
        p_offset: u64(0),
        p_vaddr: u64(ELF_BASE),
        p_paddr: u64(ELF_BASE),
        p_filesz: u64(load_size),
        p_memsz: u64(load_size),
        p_align: u64(PAGE_SIZE),
    };

    let header = bytes_of(&file_header);
    buffer[..header.len()].copy_from_slice(header);
    let phdr = bytes_of(&prog_header);
    buffer[64..64 + phdr.len()].copy_from_slice(phdr);
    buffer
}

fn put_name(out: &mut Vec<u8>, name: &str, len: usize) {
    let start = out.len();
    out.extend_from_slice(name.as_bytes());
    out.resize(start + len, 0);
}

/// A 64-bit little-endian x86-64 Mach-O executable.
pub fn macho(program: &Program<'_>) -> Vec<u8> {
    const CPU_TYPE_X86_64: u32 = 0x0100_0007;
    const CPU_SUBTYPE_X86_64_ALL: u32 = 3;
    const MH_EXECUTE: u32 = 2;
    const LC_SEGMENT_64: u32 = 0x19;
    const SECTION_LEN: u32 = 80;
    const SEGMENT_LEN: u32 = 72;

    let mut body = vec![0u8; MACHO_TEXT_OFFSET as usize];
    body.resize(body.len() + program.text_len as usize, FILL);
    pad_to(&mut body, 16);
    let gosymtab_offset = body.len() as u64;
    let pclntab_offset = body.len() as u64;
    if program.with_pclntab {
        body.extend_from_slice(&pclntab(program.functions, program.text_len));
    }
    let pclntab_size = body.len() as u64 - pclntab_offset;
    let segment_size = body.len() as u64;

    let mut sections = vec![
        ("__text", MACHO_TEXT_OFFSET, u64::from(program.text_len)),
        ("__gosymtab", gosymtab_offset, 0),
    ];
    if program.with_pclntab {
        sections.push(("__gopclntab", pclntab_offset, pclntab_size));
    }
    let nsects = sections.len() as u32;
    let cmdsize = SEGMENT_LEN + SECTION_LEN * nsects;

    let mut header = Vec::new();
    for word in [0xfeed_facf, CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, MH_EXECUTE, 1, cmdsize, 0, 0] {
        header.extend_from_slice(&u32::to_le_bytes(word));
    }

    header.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    header.extend_from_slice(&cmdsize.to_le_bytes());
    put_name(&mut header, "__TEXT", 16);
    for value in [MACHO_BASE, segment_size, 0, segment_size] {
        header.extend_from_slice(&value.to_le_bytes());
    }
    for value in [7u32, 5, nsects, 0] {
        header.extend_from_slice(&value.to_le_bytes());
    }

    for (name, offset, size) in sections {
        put_name(&mut header, name, 16);
        put_name(&mut header, "__TEXT", 16);
        header.extend_from_slice(&(MACHO_BASE + offset).to_le_bytes());
        header.extend_from_slice(&size.to_le_bytes());
        for value in [offset as u32, 4, 0, 0, 0, 0, 0, 0] {
            header.extend_from_slice(&value.to_le_bytes());
        }
    }

    assert!(header.len() < MACHO_TEXT_OFFSET as usize);
    body[..header.len()].copy_from_slice(&header);

    if let Some(goarch) = program.goarch {
        append_buildinfo(&mut body, goarch);
    }
    body
}

/// A PE32+ x86-64 executable. The Go metadata lives in `.rdata`, delimited by
/// `runtime.*` COFF symbols.
pub fn pe(program: &Program<'_>) -> Vec<u8> {
    build_pe(program, RDATA_SECTION)
}

/// Like [`pe`], but `runtime.epclntab` is defined in `.text` instead of `.rdata`.
pub fn pe_with_split_pclntab_markers(program: &Program<'_>) -> Vec<u8> {
    build_pe(program, TEXT_SECTION)
}

const TEXT_SECTION: i16 = 1;
const RDATA_SECTION: i16 = 2;

fn build_pe(program: &Program<'_>, epclntab_section: i16) -> Vec<u8> {
    const PE_HEADER_OFFSET: usize = 0x40;
    const OPTIONAL_HEADER_LEN: u16 = 240;
    const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
    const IMAGE_SYM_CLASS_EXTERNAL: u8 = 2;

    let text_raw_len = u64::from(program.text_len).next_multiple_of(PE_FILE_ALIGN);
    let rdata_rva = (PE_TEXT_RVA + u64::from(program.text_len)).next_multiple_of(PAGE_SIZE);
    let rdata_offset = PE_TEXT_OFFSET + text_raw_len;

    let pclntab = pclntab(program.functions, program.text_len);
    let rdata_len = pclntab.len() as u64;
    let rdata_raw_len = rdata_len.next_multiple_of(PE_FILE_ALIGN);
    let symtab_offset = rdata_offset + rdata_raw_len;
    let image_size = (rdata_rva + rdata_len).next_multiple_of(PAGE_SIZE);

    let mut out = vec![0u8; PE_TEXT_OFFSET as usize];
    out[..2].copy_from_slice(b"MZ");
    out[0x3c..0x40].copy_from_slice(&(PE_HEADER_OFFSET as u32).to_le_bytes());

    // Signature and COFF file header.
    let mut h = Vec::new();
    h.extend_from_slice(b"PE\0\0");
    h.extend_from_slice(&IMAGE_FILE_MACHINE_AMD64.to_le_bytes());
    h.extend_from_slice(&2u16.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes());
    h.extend_from_slice(&(symtab_offset as u32).to_le_bytes());
    let mut markers = vec![
        ("runtime.symtab", 0, RDATA_SECTION),
        ("runtime.esymtab", 0, RDATA_SECTION),
    ];
    if program.with_pclntab {
        markers.push(("runtime.pclntab", 0, RDATA_SECTION));
        markers.push(("runtime.epclntab", rdata_len as u32, epclntab_section));
    }
    h.extend_from_slice(&(markers.len() as u32).to_le_bytes());
    h.extend_from_slice(&OPTIONAL_HEADER_LEN.to_le_bytes());
    h.extend_from_slice(&0x0022u16.to_le_bytes());

    // Optional header, PE32+.
    let optional_start = h.len();
    h.extend_from_slice(&0x20bu16.to_le_bytes());
    h.extend_from_slice(&[3, 0]);
    for value in [text_raw_len as u32, rdata_raw_len as u32, 0, PE_TEXT_RVA as u32, PE_TEXT_RVA as u32] {
        h.extend_from_slice(&value.to_le_bytes());
    }
    h.extend_from_slice(&PE_IMAGE_BASE.to_le_bytes());
    h.extend_from_slice(&(PAGE_SIZE as u32).to_le_bytes());
    h.extend_from_slice(&(PE_FILE_ALIGN as u32).to_le_bytes());
    for version in [6u16, 1, 0, 0, 6, 1] {
        h.extend_from_slice(&version.to_le_bytes());
    }
    for value in [0u32, image_size as u32, PE_TEXT_OFFSET as u32, 0] {
        h.extend_from_slice(&value.to_le_bytes());
    }
    h.extend_from_slice(&3u16.to_le_bytes());
    h.extend_from_slice(&0x8160u16.to_le_bytes());
    for value in [0x200000u64, 0x1000, 0x100000, 0x1000] {
        h.extend_from_slice(&value.to_le_bytes());
    }
    h.extend_from_slice(&0u32.to_le_bytes());
    h.extend_from_slice(&16u32.to_le_bytes());
    h.resize(optional_start + OPTIONAL_HEADER_LEN as usize, 0);

    // Section headers.
    let sections = [
        (".text", u64::from(program.text_len), PE_TEXT_RVA, text_raw_len, PE_TEXT_OFFSET, 0x6000_0020u32),
        (".rdata", rdata_len, rdata_rva, rdata_raw_len, rdata_offset, 0x4000_0040),
    ];
    for (name, virtual_size, rva, raw_len, raw_offset, characteristics) in sections {
        put_name(&mut h, name, 8);
        for value in [virtual_size, rva, raw_len, raw_offset, 0, 0] {
            h.extend_from_slice(&(value as u32).to_le_bytes());
        }
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&characteristics.to_le_bytes());
    }
    out[PE_HEADER_OFFSET..PE_HEADER_OFFSET + h.len()].copy_from_slice(&h);

    out.resize((PE_TEXT_OFFSET + u64::from(program.text_len)) as usize, FILL);
    out.resize(rdata_offset as usize, 0);
    out.extend_from_slice(&pclntab);
    out.resize(symtab_offset as usize, 0);

    // COFF marker symbols, names in the string table.
    let mut strings = Vec::new();
    for (name, value, section) in &markers {
        let name_offset = 4 + strings.len() as u32;
        strings.extend_from_slice(name.as_bytes());
        strings.push(0);

        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&name_offset.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
        out.extend_from_slice(&section.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.push(IMAGE_SYM_CLASS_EXTERNAL);
        out.push(0);
    }
    out.extend_from_slice(&(4 + strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&strings);

    if let Some(goarch) = program.goarch {
        append_buildinfo(&mut out, goarch);
    }
    out
}

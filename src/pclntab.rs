//! Go program-counter line table decoding.
//!
//! The table starts with a magic number that selects the layout. Only the parts
//! needed to enumerate functions are decoded: the function table (entry PCs and
//! `_func` offsets) and the function name table.

use object::{Endian, Endianness};

use crate::error::{Error, Result};
use crate::symbol::Function;

const GO12_MAGIC: u32 = 0xffff_fffb;
const GO116_MAGIC: u32 = 0xffff_fffa;
const GO118_MAGIC: u32 = 0xffff_fff0;
const GO120_MAGIC: u32 = 0xffff_fff1;

const HEADER_LEN: usize = 8;

/// Line table layout revisions, named after the Go release that introduced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    Go12,
    Go116,
    Go118,
    Go120,
}

impl Version {
    fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            GO12_MAGIC => Some(Version::Go12),
            GO116_MAGIC => Some(Version::Go116),
            GO118_MAGIC => Some(Version::Go118),
            GO120_MAGIC => Some(Version::Go120),
            _ => None,
        }
    }
}

/// A decoded view over a line table blob.
#[derive(Debug)]
pub struct LineTable<'data> {
    version: Version,
    endian: Endianness,
    ptr_size: usize,
    text_start: u64,
    nfunc: usize,
    funcnametab: &'data [u8],
    funcdata: &'data [u8],
    functab: &'data [u8],
}

impl<'data> LineTable<'data> {
    /// Parses the header of `data`. `text_start` is the address of the code
    /// section; newer layouts store entry points relative to it.
    pub fn parse(data: &'data [u8], text_start: u64) -> Result<Self> {
        let header = data
            .get(..HEADER_LEN)
            .ok_or_else(|| Error::LineTable(format!("too short: {} bytes", data.len())))?;
        let magic_bytes: [u8; 4] = [header[0], header[1], header[2], header[3]];

        let (endian, version) = [Endianness::Little, Endianness::Big]
            .into_iter()
            .find_map(|endian| {
                Version::from_magic(endian.read_u32_bytes(magic_bytes)).map(|v| (endian, v))
            })
            .ok_or_else(|| {
                Error::LineTable(format!(
                    "unsupported version magic {:02x?}",
                    magic_bytes
                ))
            })?;

        let quantum = header[6];
        let ptr_size = usize::from(header[7]);
        if header[4] != 0 || header[5] != 0 {
            return Err(Error::LineTable("non-zero header padding".into()));
        }
        if !matches!(quantum, 1 | 2 | 4) {
            return Err(Error::LineTable(format!("bad pc quantum {quantum}")));
        }
        if !matches!(ptr_size, 4 | 8) {
            return Err(Error::LineTable(format!("bad pointer size {ptr_size}")));
        }

        let mut table = LineTable {
            version,
            endian,
            ptr_size,
            text_start,
            nfunc: 0,
            funcnametab: data,
            funcdata: data,
            functab: data,
        };

        let word = |n: usize| table.uintptr(data, HEADER_LEN + n * ptr_size);
        let from_word = |n: usize| -> Result<&'data [u8]> {
            let offset = word(n)?;
            usize::try_from(offset)
                .ok()
                .and_then(|offset| data.get(offset..))
                .ok_or_else(|| Error::LineTable(format!("header word {n} out of range")))
        };

        let (nfunc, funcnametab, funcdata) = match version {
            Version::Go118 | Version::Go120 => {
                // word 2 holds the unrelocated text start; the caller's address is used instead.
                (word(0)?, from_word(3)?, from_word(7)?)
            }
            Version::Go116 => (word(0)?, from_word(2)?, from_word(6)?),
            Version::Go12 => (word(0)?, data, data),
        };
        let functab = match version {
            Version::Go12 => data.get(HEADER_LEN + ptr_size..).unwrap_or_default(),
            _ => funcdata,
        };

        let nfunc = usize::try_from(nfunc)
            .map_err(|_| Error::LineTable(format!("function count {nfunc} too large")))?;
        table.nfunc = nfunc;
        let functab_len = nfunc
            .checked_mul(2)
            .and_then(|n| n.checked_add(1))
            .and_then(|n| n.checked_mul(table.functab_field_size()))
            .ok_or_else(|| Error::LineTable("function table size overflow".into()))?;
        table.functab = functab.get(..functab_len).ok_or_else(|| {
            Error::LineTable(format!("function table truncated: {nfunc} functions"))
        })?;
        table.funcnametab = funcnametab;
        table.funcdata = funcdata;

        tracing::debug!(
            ?version,
            ?endian,
            quantum,
            ptr_size,
            functions = nfunc,
            "parsed line table header"
        );
        Ok(table)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Number of entries in the function table.
    pub fn len(&self) -> usize {
        self.nfunc
    }

    pub fn is_empty(&self) -> bool {
        self.nfunc == 0
    }

    /// Decodes every function in table order. A function ends where the next
    /// one begins; the last one ends at the table's trailing sentinel PC.
    pub fn functions(&self) -> Result<Vec<Function>> {
        let mut functions = Vec::with_capacity(self.nfunc);
        for i in 0..self.nfunc {
            let entry = self.pc(i)?;
            let end = self.pc(i + 1)?;
            let name = self.func_name(i)?;
            if end <= entry {
                return Err(Error::LineTable(format!(
                    "function {name} has empty range 0x{entry:x}..0x{end:x}"
                )));
            }
            functions.push(Function { name, entry, end });
        }
        Ok(functions)
    }

    fn functab_field_size(&self) -> usize {
        if self.version >= Version::Go118 {
            4
        } else {
            self.ptr_size
        }
    }

    fn pc(&self, i: usize) -> Result<u64> {
        let value = self.field(self.functab, 2 * i * self.functab_field_size())?;
        Ok(if self.version >= Version::Go118 {
            value.wrapping_add(self.text_start)
        } else {
            value
        })
    }

    fn func_name(&self, i: usize) -> Result<String> {
        let func_offset = self.field(self.functab, (2 * i + 1) * self.functab_field_size())?;
        let info = usize::try_from(func_offset)
            .ok()
            .and_then(|offset| self.funcdata.get(offset..))
            .ok_or_else(|| Error::LineTable(format!("function {i}: bad _func offset")))?;

        // `_func` begins with the entry (pointer-sized before 1.18, a u32 offset after),
        // followed by the u32 name offset.
        let name_field = if self.version >= Version::Go118 { 4 } else { self.ptr_size };
        let name_offset = self.read_u32(info, name_field)? as usize;

        let name = self
            .funcnametab
            .get(name_offset..)
            .and_then(crate::utils::read_cstr)
            .ok_or_else(|| Error::LineTable(format!("function {i}: bad name offset")))?;
        // A lossy name could never match an exact lookup.
        String::from_utf8(name.to_vec())
            .map_err(|_| Error::LineTable(format!("function {i}: name is not valid utf-8")))
    }

    fn field(&self, data: &[u8], offset: usize) -> Result<u64> {
        if self.functab_field_size() == 4 {
            self.read_u32(data, offset).map(u64::from)
        } else {
            self.uintptr(data, offset)
        }
    }

    fn uintptr(&self, data: &[u8], offset: usize) -> Result<u64> {
        if self.ptr_size == 4 {
            return self.read_u32(data, offset).map(u64::from);
        }
        let bytes = data
            .get(offset..offset + 8)
            .ok_or_else(|| Error::LineTable(format!("read past end at 0x{offset:x}")))?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(self.endian.read_u64_bytes(raw))
    }

    fn read_u32(&self, data: &[u8], offset: usize) -> Result<u32> {
        let bytes = data
            .get(offset..offset + 4)
            .ok_or_else(|| Error::LineTable(format!("read past end at 0x{offset:x}")))?;
        Ok(self.endian.read_u32_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

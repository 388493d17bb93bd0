//! Go build information embedded by the linker.
//!
//! The blob starts with a 16-byte-aligned header: the 14-byte magic, the pointer
//! size and a flags byte. Since Go 1.18 the version and module-info strings
//! follow inline at offset 32, each prefixed by a uvarint length. Older
//! binaries store pointers instead; those are not decoded.

use crate::utils::read_uvarint;

const MAGIC: &[u8] = b"\xff Go buildinf:";
const HEADER_LEN: usize = 32;
const ALIGN: usize = 16;
const FLAGS_OFFSET: usize = 15;
const FLAG_INLINE_STRINGS: u8 = 0x2;

/// Decoded build information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Toolchain version, e.g. `go1.22.1`.
    pub go_version: String,
    /// `build` settings from the module info, in order.
    pub settings: Vec<(String, String)>,
}

impl BuildInfo {
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Best-effort lookup of the `GOARCH` build setting.
pub fn goarch(data: &[u8]) -> Option<String> {
    read(data)?.setting("GOARCH").map(str::to_string)
}

/// Locates and decodes the build information blob, if the binary has one in
/// the inline-string layout.
pub fn read(data: &[u8]) -> Option<BuildInfo> {
    let start = (0..data.len().saturating_sub(HEADER_LEN))
        .step_by(ALIGN)
        .find(|&offset| data[offset..].starts_with(MAGIC))?;

    let flags = data[start + FLAGS_OFFSET];
    if flags & FLAG_INLINE_STRINGS == 0 {
        tracing::trace!(offset = start, "build info uses pointer layout; skipping");
        return None;
    }

    let mut rest = &data[start + HEADER_LEN..];
    let go_version = next_string(&mut rest)?;
    let modinfo = next_string(&mut rest)?;

    Some(BuildInfo {
        go_version: String::from_utf8_lossy(go_version).into_owned(),
        settings: parse_settings(&String::from_utf8_lossy(modinfo)),
    })
}

fn next_string<'data>(rest: &mut &'data [u8]) -> Option<&'data [u8]> {
    let (len, consumed) = read_uvarint(rest)?;
    let len = usize::try_from(len).ok()?;
    let value = rest.get(consumed..consumed.checked_add(len)?)?;
    *rest = &rest[consumed + len..];
    Some(value)
}

/// Extracts `build\tKEY=VALUE` lines. The sentinels framing the module info
/// never sit on a settings line, so they need no special handling.
fn parse_settings(modinfo: &str) -> Vec<(String, String)> {
    modinfo
        .lines()
        .filter_map(|line| line.strip_prefix("build\t"))
        .filter_map(|setting| setting.split_once('='))
        .map(|(key, value)| (key.to_string(), value.trim_matches('"').to_string()))
        .collect()
}

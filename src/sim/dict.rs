//! Resolution of words in the resident program's dictionary.
//!
//! The program running on the board keeps a linked list of named entries in RAM,
//! newest first. Each entry is laid out as:
//!
//! ```text
//! start:           length byte (low 5 bits = name length, upper bits are flags)
//! start+1..:       name bytes
//! (even aligned):  16-bit big-endian link to the previous entry (0 = end of list)
//! ```
//!
//! Two system variables locate the list: `here` (the end of the newest entry)
//! and `last` (the start of the newest entry).
//!
//! An entry's extent runs from its start up to the start of the entry defined after it
//! (or up to `here` for the newest entry).

use super::mem::AddressSpace;

/// Address of the `here` variable.
pub const HERE: u32 = 0x2002;
/// Address of the `last` variable.
pub const LAST: u32 = 0x2004;

/// One dictionary entry and its extent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DictEntry {
    /// Address of the entry's length byte.
    pub start: u16,
    /// End of the entry's extent (exclusive).
    pub end: u16,
    /// Length of the entry's name.
    pub name_len: u8,
}
impl DictEntry {
    /// Signed distance from the start of the entry to the end of its extent.
    pub fn span(&self) -> i32 {
        i32::from(self.end) - i32::from(self.start)
    }

    /// Whether `addr` is in `[start, end)`.
    pub fn contains(&self, addr: u16) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Reads the entry's name out of memory.
    pub fn name(&self, mem: &AddressSpace) -> String {
        let bytes: Vec<_> = (0..u32::from(self.name_len))
            .map(|i| mem.peek(u32::from(self.start) + 1 + i))
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn name_matches(&self, mem: &AddressSpace, name: &[u8]) -> bool {
        name.len() == usize::from(self.name_len)
            && name.iter()
                .zip(u32::from(self.start) + 1..)
                .all(|(&b, addr)| mem.peek(addr) == b)
    }
}

/// Iterator over the dictionary, newest entry first.
///
/// The walk stops early if a link does not point strictly below the entry it came from,
/// so a corrupted list cannot loop forever.
pub struct Entries<'m> {
    mem: &'m AddressSpace,
    next: u16,
    end: u16,
}
impl Iterator for Entries<'_> {
    type Item = DictEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next;
        if start == 0 {
            return None;
        }

        let name_len = self.mem.peek(u32::from(start)) & 0x1F;
        let link_addr = {
            let a = u32::from(start) + u32::from(name_len) + 1;
            a + (a & 1)
        };
        let link = self.mem.peek_word(link_addr);

        self.next = match link {
            0 => 0,
            l if l < start => l,
            l => {
                tracing::warn!("dictionary link at {link_addr:04X} points forward to {l:04X}, stopping walk");
                0
            }
        };

        let entry = DictEntry { start, end: self.end, name_len };
        self.end = start;
        Some(entry)
    }
}

/// Walks the dictionary, newest entry first.
pub fn entries(mem: &AddressSpace) -> Entries<'_> {
    Entries {
        mem,
        next: mem.peek_word(LAST),
        end: mem.peek_word(HERE),
    }
}

/// Finds the newest entry named `name`.
pub fn lookup_by_name(mem: &AddressSpace, name: &str) -> Option<DictEntry> {
    entries(mem).find(|e| e.name_matches(mem, name.as_bytes()))
}

/// Finds the entry whose extent contains `addr`.
pub fn lookup_by_address(mem: &AddressSpace, addr: u16) -> Option<DictEntry> {
    entries(mem).find(|e| e.contains(addr))
}

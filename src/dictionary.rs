// dictionary.rs - Dictionary entries, words and flags

use std::collections::HashMap;

use bitflags::bitflags;

use crate::cell::{Addr, Cell, EntryId};
use crate::errors::ForthError;
use crate::interpreter::VirtualMachine;

bitflags! {
    /// Flags associated with each dictionary entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WordFlags: u16 {
        /// Excluded from name lookup.
        const HIDDEN = 1 << 0;
        /// Executes at compile time rather than being appended.
        const IMMEDIATE = 1 << 1;
        /// The composite is a data block, never executed.
        const DATA = 1 << 2;
        /// The data label is emitted `.global`.
        const GLOBAL_DATA = 1 << 3;
        /// This primitive is EXIT, matched by the tail-call rewriter.
        const IS_EXIT = 1 << 4;
        /// The composite was produced by DEFER.
        const IS_DEFERRED = 1 << 5;
        /// The entry is referenced by a Literal cell somewhere.
        const IN_TOKEN = 1 << 6;
        /// Emission bookkeeping: already collected into an output list.
        const ADDED_TO_LIST = 1 << 7;
        /// Optimizer bookkeeping: already visited in the current pass.
        const VISITED = 1 << 8;
        /// The composite can reach itself.
        const RECURSIVE = 1 << 9;
    }
}

/// How a token-threaded primitive ends. The compiler appends the matching
/// jump back into the inner interpreter unless the snippet is nonstandard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenNext {
    #[default]
    Nonstandard,
    Normal,
    SkipR2,
    SkipLoad,
}

/// The assembly body of a primitive under token threading.
#[derive(Debug, Clone, Default)]
pub struct TokenAsm {
    pub asm: Vec<String>,
    pub next: TokenNext,
}

/// The assembly body of a primitive under subroutine threading. A custom
/// next suppresses the standard `add r2, r2, 1; jump r2` tail.
#[derive(Debug, Clone, Default)]
pub struct SrtAsm {
    pub asm: Vec<String>,
    pub custom_next: bool,
}

/// The host implementation of a primitive.
pub type HostFn = fn(&mut VirtualMachine, EntryId) -> Result<(), ForthError>;

/// A word defined in native code: a host closure plus target assembly for
/// both threading models.
pub struct PrimitiveWord {
    pub host: HostFn,
    pub token: TokenAsm,
    pub srt: SrtAsm,
}

/// A word built from other words and numbers.
#[derive(Debug, Default)]
pub struct CompositeWord {
    pub cells: Vec<Cell>,
}

pub enum Word {
    Primitive(PrimitiveWord),
    Composite(CompositeWord),
}

/// A named record binding a name to a word and its flags. The emitted
/// label is assigned lazily by the cross-compiler.
pub struct DictionaryEntry {
    pub name: String,
    pub ulp_name: Option<String>,
    pub word: Word,
    pub flags: WordFlags,
    /// Direct call sites counted by the emitter; decides whether the
    /// subroutine model emits a DOCOL prelude.
    pub calls: u32,
}

impl DictionaryEntry {
    pub fn composite(name: impl Into<String>, flags: WordFlags) -> DictionaryEntry {
        DictionaryEntry {
            name: name.into(),
            ulp_name: None,
            word: Word::Composite(CompositeWord::default()),
            flags,
            calls: 0,
        }
    }

    pub fn data(name: impl Into<String>, cells: Vec<Cell>, flags: WordFlags) -> DictionaryEntry {
        DictionaryEntry {
            name: name.into(),
            ulp_name: None,
            word: Word::Composite(CompositeWord { cells }),
            flags: flags | WordFlags::DATA,
            calls: 0,
        }
    }
}

/// The Forth dictionary. An arena of entries holds everything cells can
/// point at; the listed subset is what name lookup and LAST see. Entries
/// are never removed, so handles stay valid for the process lifetime.
#[derive(Default)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    listed: Vec<EntryId>,
    index: HashMap<String, Vec<EntryId>>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }

    /// Place an entry in the arena without listing it. Used for anonymous
    /// data blocks that are only reachable through addresses.
    pub fn alloc(&mut self, entry: DictionaryEntry) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(entry);
        id
    }

    /// Add an entry to the dictionary proper. Redefinitions append; the
    /// older entry becomes unreachable by name but stays addressable.
    pub fn add(&mut self, entry: DictionaryEntry) -> EntryId {
        let key = entry.name.to_lowercase();
        let id = self.alloc(entry);
        self.listed.push(id);
        self.index.entry(key).or_default().push(id);
        id
    }

    /// Case-insensitive lookup, newest first, skipping hidden entries.
    pub fn find_name(&self, name: &str) -> Result<EntryId, ForthError> {
        let key = name.to_lowercase();
        if let Some(bucket) = self.index.get(&key) {
            for id in bucket.iter().rev() {
                if !self.entries[id.0].flags.contains(WordFlags::HIDDEN) {
                    return Ok(*id);
                }
            }
        }
        Err(ForthError::Lookup(name.to_string()))
    }

    /// Whether a name currently resolves, for redefinition warnings.
    pub fn resolves(&self, name: &str) -> bool {
        self.find_name(name).is_ok()
    }

    pub fn entry(&self, id: EntryId) -> &DictionaryEntry {
        &self.entries[id.0]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut DictionaryEntry {
        &mut self.entries[id.0]
    }

    pub fn name(&self, id: EntryId) -> &str {
        &self.entries[id.0].name
    }

    /// The newest entry in the dictionary proper.
    pub fn last(&self) -> Result<EntryId, ForthError> {
        self.listed
            .last()
            .copied()
            .ok_or_else(|| ForthError::Invariant("dictionary is empty".to_string()))
    }

    /// The newest entry, required to be a composite word.
    pub fn last_composite(&self) -> Result<EntryId, ForthError> {
        let id = self.last()?;
        match self.entries[id.0].word {
            Word::Composite(_) => Ok(id),
            Word::Primitive(_) => Err(ForthError::Compile(
                "the last word in dictionary is not a forth word".to_string(),
            )),
        }
    }

    pub fn composite(&self, id: EntryId) -> Result<&CompositeWord, ForthError> {
        match &self.entries[id.0].word {
            Word::Composite(word) => Ok(word),
            Word::Primitive(_) => Err(ForthError::Type(format!(
                "{} is not a forth word",
                self.entries[id.0].name
            ))),
        }
    }

    pub fn composite_mut(&mut self, id: EntryId) -> Result<&mut CompositeWord, ForthError> {
        match &mut self.entries[id.0].word {
            Word::Composite(word) => Ok(word),
            Word::Primitive(_) => Err(ForthError::Type(
                "expected a forth word, found a primitive".to_string(),
            )),
        }
    }

    /// Append a cell to a composite body.
    pub fn push_cell(&mut self, id: EntryId, cell: Cell) -> Result<(), ForthError> {
        self.composite_mut(id)?.cells.push(cell);
        Ok(())
    }

    /// Every entry in the arena, listed or not.
    pub fn ids(&self) -> impl Iterator<Item = EntryId> {
        (0..self.entries.len()).map(EntryId)
    }

    /// The dictionary proper, oldest first.
    pub fn listed(&self) -> &[EntryId] {
        &self.listed
    }

    /// Read the counted string stored in packed cells at an address.
    pub fn counted_string(&self, addr: Addr) -> Result<String, ForthError> {
        let word = self.composite(addr.entry)?;
        if addr.offset < 0 || addr.offset as usize > word.cells.len() {
            return Err(ForthError::Bounds(format!(
                "string offset out of range: {}",
                addr.offset
            )));
        }
        let mut bytes = crate::cell::cells_to_bytes(&word.cells[addr.offset as usize..])?;
        if addr.upper && !bytes.is_empty() {
            bytes.remove(0);
        }
        if bytes.is_empty() {
            return Err(ForthError::Bounds("string has no length byte".to_string()));
        }
        let length = bytes[0] as usize;
        if length + 1 > bytes.len() {
            return Err(ForthError::Bounds(format!(
                "string length is invalid: {}",
                length
            )));
        }
        Ok(String::from_utf8_lossy(&bytes[1..1 + length]).into_owned())
    }
}

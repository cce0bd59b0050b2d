// interpreter.rs - The Forth virtual machine and the outer interpreter

use std::io::Write;

use crate::cell::{Addr, BranchId, Cell, DestId, EntryId};
use crate::dictionary::{
    Dictionary, DictionaryEntry, HostFn, SrtAsm, TokenAsm, Word, WordFlags,
};
use crate::errors::{entry_error, ForthError};
use crate::parse::ParseArea;
use crate::primitives;
use crate::stack::Stack;

/// The execution state, published to Forth code as the STATE variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Execute parsed words.
    Interpret,
    /// Append parsed words to the newest composite.
    Compile,
    /// Leave the virtual machine.
    Exit,
}

impl State {
    pub fn from_u16(value: u16) -> Result<State, ForthError> {
        match value {
            0 => Ok(State::Interpret),
            1 => Ok(State::Compile),
            2 => Ok(State::Exit),
            other => Err(ForthError::Invariant(format!("unknown state {}", other))),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            State::Interpret => 0,
            State::Compile => 1,
            State::Exit => 2,
        }
    }
}

/// A typed handle onto the first cell of a dedicated data entry, so Forth
/// code reading the published VARIABLE and the host see the same value.
#[derive(Debug, Clone, Copy)]
pub struct VmVariable {
    entry: EntryId,
}

impl VmVariable {
    /// Create the backing data entry plus the named wrapper word that
    /// pushes its address. Shared variables get a global data label so
    /// the host device can find them in the emitted image.
    pub fn create(
        vm: &mut VirtualMachine,
        name: &str,
        shared: bool,
    ) -> Result<VmVariable, ForthError> {
        let mut flags = WordFlags::empty();
        if shared {
            flags |= WordFlags::GLOBAL_DATA;
        }
        let data = vm
            .dictionary
            .alloc(DictionaryEntry::data(name, vec![Cell::Number(0)], flags));
        let exit = vm.dictionary.find_name("EXIT")?;
        let wrapper = vm
            .dictionary
            .add(DictionaryEntry::composite(name, WordFlags::empty()));
        vm.dictionary.push_cell(
            wrapper,
            Cell::Literal(Box::new(Cell::Address(Addr::new(data)))),
        )?;
        vm.dictionary
            .push_cell(wrapper, Cell::Address(Addr::new(exit)))?;
        Ok(VmVariable { entry: data })
    }

    pub fn get(&self, dictionary: &Dictionary) -> Result<u16, ForthError> {
        match dictionary.composite(self.entry)?.cells.first() {
            Some(Cell::Number(n)) => Ok(*n),
            _ => Err(ForthError::Invariant(
                "vm variable does not hold a number".to_string(),
            )),
        }
    }

    pub fn set(&self, dictionary: &mut Dictionary, value: u16) -> Result<(), ForthError> {
        dictionary.composite_mut(self.entry)?.cells[0] = Cell::Number(value);
        Ok(())
    }
}

/// A lazily named control-flow join point shared by its branch sites.
#[derive(Debug, Default)]
pub struct DestSlot {
    pub addr: Option<Addr>,
    pub label: Option<String>,
}

/// The Forth virtual machine.
pub struct VirtualMachine {
    pub dictionary: Dictionary,
    pub stack: Stack,
    pub return_stack: Stack,
    pub control_flow_stack: Stack,
    pub do_stack: Stack,
    pub parse_area: ParseArea,
    /// The interpreter pointer of the running composite, if any.
    pub ip: Option<Addr>,
    pub state: VmVariable,
    pub base: VmVariable,
    pub dests: Vec<DestSlot>,
    pub branches: Vec<Option<DestId>>,
    pub out: Box<dyn Write>,
}

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("01_core.f", include_str!("builtin/01_core.f")),
    ("02_flow.f", include_str!("builtin/02_flow.f")),
    ("03_math.f", include_str!("builtin/03_math.f")),
    ("04_defining.f", include_str!("builtin/04_defining.f")),
    ("05_case.f", include_str!("builtin/05_case.f")),
    ("06_host.f", include_str!("builtin/06_host.f")),
    ("07_strings.f", include_str!("builtin/07_strings.f")),
];

impl VirtualMachine {
    /// Set up a virtual machine printing to stdout.
    pub fn new() -> Result<VirtualMachine, ForthError> {
        VirtualMachine::with_output(Box::new(std::io::stdout()))
    }

    /// Set up a virtual machine with the given output, installing the
    /// primitive catalog, the BASE and STATE variables and the embedded
    /// standard Forth sources.
    pub fn with_output(out: Box<dyn Write>) -> Result<VirtualMachine, ForthError> {
        let mut vm = VirtualMachine {
            dictionary: Dictionary::new(),
            stack: Stack::new("data"),
            return_stack: Stack::new("return"),
            control_flow_stack: Stack::new("control flow"),
            do_stack: Stack::new("do"),
            parse_area: ParseArea::new(),
            ip: None,
            state: VmVariable { entry: EntryId(0) },
            base: VmVariable { entry: EntryId(0) },
            dests: Vec::new(),
            branches: Vec::new(),
            out,
        };
        primitives::install(&mut vm);
        vm.base = VmVariable::create(&mut vm, "BASE", true)?;
        vm.base.set(&mut vm.dictionary, 10)?;
        vm.state = VmVariable::create(&mut vm, "STATE", false)?;
        for (name, source) in BUILTIN_SOURCES {
            vm.interpret(source.as_bytes())
                .map_err(|e| e.context(format!("error loading builtin {}", name)))?;
        }
        Ok(vm)
    }

    pub fn add_primitive(
        &mut self,
        name: &str,
        host: HostFn,
        token: TokenAsm,
        srt: SrtAsm,
        flags: WordFlags,
    ) -> EntryId {
        self.dictionary.add(DictionaryEntry {
            name: name.to_string(),
            ulp_name: None,
            word: Word::Primitive(crate::dictionary::PrimitiveWord { host, token, srt }),
            flags,
            calls: 0,
        })
    }

    pub fn state(&self) -> Result<State, ForthError> {
        State::from_u16(self.state.get(&self.dictionary)?)
    }

    pub fn set_state(&mut self, state: State) -> Result<(), ForthError> {
        self.state.set(&mut self.dictionary, state.to_u16())
    }

    /// Reset all stacks and the instruction pointer. The REPL calls this
    /// after an error or an interrupt.
    pub fn reset(&mut self) {
        self.stack.reset();
        self.return_stack.reset();
        self.control_flow_stack.reset();
        self.do_stack.reset();
        self.ip = None;
    }

    /// Interpret the given source bytes through the outer loop.
    pub fn interpret(&mut self, source: &[u8]) -> Result<(), ForthError> {
        self.parse_area.save();
        self.parse_area.fill(source);
        let result = self.interpret_loop();
        self.parse_area.restore();
        result
    }

    fn interpret_loop(&mut self) -> Result<(), ForthError> {
        loop {
            let word = self.parse_area.word(b' ', false);
            if word.is_empty() {
                return Ok(());
            }
            let name = String::from_utf8_lossy(&word).into_owned();
            let cells = self.get_cells(&name)?;
            match self.state()? {
                State::Interpret => {
                    for cell in cells {
                        cell.execute(self)?;
                    }
                }
                State::Compile => {
                    for cell in cells {
                        let immediate = match &cell {
                            Cell::Address(addr) => self
                                .dictionary
                                .entry(addr.entry)
                                .flags
                                .contains(WordFlags::IMMEDIATE),
                            _ => false,
                        };
                        if immediate {
                            cell.execute(self)?;
                        } else {
                            let last = self.dictionary.last_composite()?;
                            self.dictionary.push_cell(last, cell)?;
                        }
                    }
                }
                State::Exit => return Ok(()),
            }
        }
    }

    /// Resolve a token: dictionary lookup, then a character literal, then
    /// a number in the current BASE. Numbers with a trailing dot become a
    /// double, low cell first. A failed number parse surfaces the original
    /// dictionary miss.
    fn get_cells(&mut self, name: &str) -> Result<Vec<Cell>, ForthError> {
        let dict_err = match self.dictionary.find_name(name) {
            Ok(entry) => return Ok(vec![Cell::Address(Addr::new(entry))]),
            Err(err) => err,
        };
        let bytes = name.as_bytes();
        if bytes.len() == 3 && bytes[0] == b'\'' && bytes[2] == b'\'' {
            return Ok(vec![Cell::Literal(Box::new(Cell::Number(u16::from(
                bytes[1],
            ))))]);
        }
        let mut text = name.to_lowercase();
        let double = text.ends_with('.');
        if double {
            text.pop();
        }
        let negative = text.starts_with('-');
        if negative {
            text.remove(0);
        }
        let mut base = u32::from(self.base.get(&self.dictionary)?);
        if let Some(rest) = text.strip_prefix("0x") {
            base = 16;
            text = rest.to_string();
        } else if let Some(rest) = text.strip_prefix("0b") {
            base = 2;
            text = rest.to_string();
        } else if let Some(rest) = text.strip_prefix('#') {
            base = 10;
            text = rest.to_string();
        }
        if !(2..=36).contains(&base) {
            return Err(dict_err);
        }
        let Ok(parsed) = i64::from_str_radix(&text, base) else {
            return Err(dict_err);
        };
        let value = if negative { parsed.wrapping_neg() } else { parsed };
        let low = Cell::Literal(Box::new(Cell::Number(value as u16)));
        if double {
            let high = Cell::Literal(Box::new(Cell::Number((value >> 16) as u16)));
            Ok(vec![low, high])
        } else {
            Ok(vec![low])
        }
    }

    /// Run a composite word body starting at the given offset. The prior
    /// instruction pointer goes onto the return stack; the body runs until
    /// EXIT pops it back. Both the return stack depth and the pointer are
    /// restored before surfacing any inner failure.
    pub fn execute_composite(&mut self, entry: EntryId, offset: isize) -> Result<(), ForthError> {
        let name = self.dictionary.name(entry).to_string();
        if self.dictionary.composite(entry)?.cells.is_empty() {
            return Err(entry_error(
                &name,
                "this forth word doesn't have a definition",
            ));
        }

        let start_depth = self.return_stack.depth();
        let previous = self.ip;
        self.return_stack.push(ip_cell(previous));
        self.ip = Some(Addr {
            entry,
            offset,
            upper: false,
        });

        while self.return_stack.depth() > start_depth {
            let ip = match self.ip {
                Some(ip) => ip,
                None => {
                    self.unwind(previous, start_depth);
                    return Err(entry_error(&name, "instruction pointer lost inside word"));
                }
            };
            if ip.entry != entry {
                self.unwind(previous, start_depth);
                return Err(entry_error(
                    &name,
                    "instruction pointer somehow left the calling word",
                ));
            }
            let len = self.dictionary.composite(entry)?.cells.len() as isize;
            if ip.offset < 0 || ip.offset >= len {
                self.unwind(previous, start_depth);
                return Err(entry_error(
                    &name,
                    "instruction pointer went outside of definition",
                ));
            }
            let current = ip.offset;
            let cell = self.dictionary.composite(entry)?.cells[current as usize].clone();
            if let Some(ip) = self.ip.as_mut() {
                ip.offset += 1;
            }
            if let Err(err) = cell.execute(self) {
                let described = self.describe_cell(&cell);
                self.unwind(previous, start_depth);
                return Err(err.in_entry(
                    &name,
                    format!("error while executing {} in position {}", described, current),
                ));
            }
        }

        if self.ip != previous {
            self.unwind(previous, start_depth);
            return Err(entry_error(&name, "instruction pointer not correct on exit"));
        }
        if self.return_stack.depth() != start_depth {
            self.unwind(previous, start_depth);
            return Err(entry_error(&name, "return stack wrong size on exit"));
        }
        Ok(())
    }

    fn unwind(&mut self, previous: Option<Addr>, depth: usize) {
        self.ip = previous;
        let _ = self.return_stack.set_depth(depth);
    }

    // control-flow bookkeeping

    pub fn new_dest(&mut self) -> DestId {
        self.dests.push(DestSlot::default());
        DestId(self.dests.len() - 1)
    }

    pub fn new_branch(&mut self) -> BranchId {
        self.branches.push(None);
        BranchId(self.branches.len() - 1)
    }

    pub fn resolve_branch(&mut self, branch: BranchId, dest: DestId) {
        self.branches[branch.0] = Some(dest);
    }

    pub fn set_dest_addr(&mut self, dest: DestId, addr: Addr) {
        self.dests[dest.0].addr = Some(addr);
    }

    pub fn dest_of(&self, branch: BranchId) -> Result<DestId, ForthError> {
        self.branches[branch.0]
            .ok_or_else(|| ForthError::Compile("branch was never resolved".to_string()))
    }

    pub fn dest_addr(&self, dest: DestId) -> Result<Addr, ForthError> {
        self.dests[dest.0]
            .addr
            .ok_or_else(|| ForthError::Compile("destination was never compiled".to_string()))
    }

    /// The resolved target of a branch site.
    pub fn branch_target(&self, branch: BranchId) -> Result<Addr, ForthError> {
        self.dest_addr(self.dest_of(branch)?)
    }

    /// Human-readable form of a cell, used by .S, --SEE and error text.
    pub fn describe_cell(&self, cell: &Cell) -> String {
        match cell {
            Cell::Number(n) => n.to_string(),
            Cell::Address(addr) => {
                let name = self.dictionary.name(addr.entry);
                let mut text = if name.is_empty() {
                    format!("Address{{#{}", addr.entry.0)
                } else {
                    format!("Address{{{}", name)
                };
                if addr.offset != 0 {
                    text.push_str(&format!(" {}", addr.offset));
                }
                if addr.upper {
                    text.push_str(" upper");
                }
                text.push('}');
                text
            }
            Cell::Literal(inner) => format!("Literal({})", self.describe_cell(inner)),
            Cell::Destination(dest) => format!("Dest{{{}}}", dest.0),
            Cell::Branch(branch) => format!("Branch{{{}}}", branch.0),
            Cell::Branch0(branch) => format!("Branch0{{{}}}", branch.0),
            Cell::TailCall(entry) => {
                format!("TailCall{{{}}}", self.dictionary.name(*entry))
            }
        }
    }

    pub fn write_out(&mut self, text: &str) -> Result<(), ForthError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| ForthError::Io(e.to_string()))
    }
}

fn ip_cell(ip: Option<Addr>) -> Cell {
    match ip {
        Some(addr) => Cell::Address(addr),
        // address zero is the host: EXIT hands control back to the outer
        // interpreter when it pops this
        None => Cell::Number(0),
    }
}

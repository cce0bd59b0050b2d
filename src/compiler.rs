// compiler.rs - The two-target cross-compiler
//
// BuildAssembly wraps the root word in a synthesized initializer, walks
// everything reachable from it, runs the optimizer, then emits the whole
// program as assembly text for the downstream assembler. Two threading
// models are supported: token threading, where word bodies are arrays of
// addresses dispatched by a small inner interpreter, and subroutine
// threading, where bodies are chains of native jumps.

use std::collections::BTreeMap;

use crate::cell::{Cell, DestId, EntryId};
use crate::dictionary::{TokenNext, Word, WordFlags};
use crate::errors::ForthError;
use crate::interpreter::{State, VirtualMachine};
use crate::optimizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadingModel {
    Token,
    Subroutine,
}

/// Cross-compile the named root word and return the program text.
/// The virtual machine should not be used afterwards.
pub fn build_assembly(
    vm: &mut VirtualMachine,
    word: &str,
    model: ThreadingModel,
) -> Result<String, ForthError> {
    Ulp::new(model).build_assembly(vm, word)
}

/// The emitter state: output lists in discovery order, the literal pool,
/// and the counter behind every generated label.
pub struct Ulp {
    model: ThreadingModel,
    out_count: u32,
    literals: BTreeMap<String, String>,
    forth_words: Vec<EntryId>,
    assembly_words: Vec<EntryId>,
    data_words: Vec<EntryId>,
}

impl Ulp {
    pub fn new(model: ThreadingModel) -> Ulp {
        Ulp {
            model,
            out_count: 0,
            literals: BTreeMap::new(),
            forth_words: Vec::new(),
            assembly_words: Vec::new(),
            data_words: Vec::new(),
        }
    }

    pub fn build_assembly(
        &mut self,
        vm: &mut VirtualMachine,
        word: &str,
    ) -> Result<String, ForthError> {
        vm.set_state(State::Interpret)?;
        let source = match self.model {
            ThreadingModel::Token => {
                format!(" : VM.INIT VM.STACK.INIT {} BEGIN HALT AGAIN ; ", word)
            }
            // the subroutine boot code initializes the stack register
            // itself, before jumping into the initializer body
            ThreadingModel::Subroutine => {
                format!(" : VM.INIT {} BEGIN HALT AGAIN ; ", word)
            }
        };
        vm.interpret(source.as_bytes()).map_err(|e| {
            e.context("could not compile the supporting words for cross-compiling")
        })?;
        let init = vm.dictionary.last()?;
        vm.dictionary
            .entry_mut(init)
            .flags
            .insert(WordFlags::HIDDEN);

        self.add_entry(vm, init)?;
        let reachable = self.forth_words.clone();
        optimizer::optimize(vm, &reachable)?;

        // the optimizer rewrites bodies, so walk again from scratch
        for id in vm.dictionary.ids().collect::<Vec<_>>() {
            vm.dictionary
                .entry_mut(id)
                .flags
                .remove(WordFlags::ADDED_TO_LIST);
        }
        self.forth_words.clear();
        self.assembly_words.clear();
        self.data_words.clear();
        self.literals.clear();
        self.add_entry(vm, init)?;
        self.count_calls(vm)?;
        self.emit(vm)
    }

    // ------------------------------------------------------------------
    // reachability walk

    fn add_entry(&mut self, vm: &mut VirtualMachine, id: EntryId) -> Result<(), ForthError> {
        if vm
            .dictionary
            .entry(id)
            .flags
            .contains(WordFlags::ADDED_TO_LIST)
        {
            return Ok(());
        }
        let is_data = vm.dictionary.entry(id).flags.contains(WordFlags::DATA);
        let is_composite = matches!(vm.dictionary.entry(id).word, Word::Composite(_));
        if is_data {
            if vm.dictionary.entry(id).name.is_empty() {
                let generated = self.name("data", "unnamed", true);
                vm.dictionary.entry_mut(id).name = generated;
            }
            let label = sanitize(&vm.dictionary.entry(id).name);
            let entry = vm.dictionary.entry_mut(id);
            entry.ulp_name = Some(label);
            entry.flags.insert(WordFlags::ADDED_TO_LIST);
            self.data_words.push(id);
        } else if is_composite {
            let label = self.name("forth", &vm.dictionary.entry(id).name, true);
            let entry = vm.dictionary.entry_mut(id);
            entry.ulp_name = Some(label);
            entry.flags.insert(WordFlags::ADDED_TO_LIST);
            self.forth_words.push(id);
        } else {
            let label = self.name("asm", &vm.dictionary.entry(id).name, true);
            let entry = vm.dictionary.entry_mut(id);
            entry.ulp_name = Some(label);
            entry.flags.insert(WordFlags::ADDED_TO_LIST);
            self.assembly_words.push(id);
            return Ok(());
        }
        let cells = vm.dictionary.composite(id)?.cells.clone();
        for cell in &cells {
            self.add_cell(vm, cell)?;
        }
        Ok(())
    }

    fn add_cell(&mut self, vm: &mut VirtualMachine, cell: &Cell) -> Result<(), ForthError> {
        match cell {
            Cell::Number(_) => Ok(()),
            Cell::Address(addr) => self.add_entry(vm, addr.entry),
            Cell::Literal(inner) => {
                self.add_cell(vm, inner)?;
                if let Cell::Address(addr) = &**inner {
                    vm.dictionary
                        .entry_mut(addr.entry)
                        .flags
                        .insert(WordFlags::IN_TOKEN);
                }
                let mut reference = self.cell_reference(vm, inner)?;
                if matches!(&**inner, Cell::Address(_)) {
                    reference = format!("__body{}", reference);
                }
                self.literals.insert(literal_symbol(&reference), reference);
                Ok(())
            }
            Cell::Destination(dest) => {
                let addr = vm.dest_addr(*dest)?;
                self.add_entry(vm, addr.entry)
            }
            Cell::Branch(branch) | Cell::Branch0(branch) => {
                let addr = vm.branch_target(*branch)?;
                self.add_entry(vm, addr.entry)
            }
            Cell::TailCall(entry) => self.add_entry(vm, *entry),
        }
    }

    /// Count direct calls into each composite. The subroutine emitter
    /// only places a DOCOL stub in front of words that are called;
    /// tail calls and execution tokens reach the body label directly.
    fn count_calls(&self, vm: &mut VirtualMachine) -> Result<(), ForthError> {
        for id in vm.dictionary.ids().collect::<Vec<_>>() {
            vm.dictionary.entry_mut(id).calls = 0;
        }
        for id in &self.forth_words {
            let cells = vm.dictionary.composite(*id)?.cells.clone();
            for cell in cells {
                if let Cell::Address(addr) = cell {
                    let entry = vm.dictionary.entry(addr.entry);
                    if matches!(entry.word, Word::Composite(_))
                        && !entry.flags.contains(WordFlags::DATA)
                    {
                        vm.dictionary.entry_mut(addr.entry).calls += 1;
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // references and labels

    /// The symbol a cell is referred to by when it is stored as data or
    /// wrapped in a literal.
    fn cell_reference(&self, vm: &VirtualMachine, cell: &Cell) -> Result<String, ForthError> {
        match cell {
            Cell::Number(n) => Ok(n.to_string()),
            Cell::Address(addr) => {
                let entry = vm.dictionary.entry(addr.entry);
                let mut name = entry.ulp_name.clone().ok_or_else(|| {
                    ForthError::Emission(format!("{} has no label assigned", entry.name))
                })?;
                if addr.offset != 0 {
                    name = format!("{}+{}", name, addr.offset);
                }
                if addr.upper {
                    name.push_str("+0x8000");
                }
                Ok(name)
            }
            other => Err(ForthError::Emission(format!(
                "cannot refer to cell {:?}",
                other
            ))),
        }
    }

    fn dest_label(&mut self, vm: &mut VirtualMachine, dest: DestId) -> String {
        if let Some(label) = &vm.dests[dest.0].label {
            return label.clone();
        }
        let label = self.name("dest", "", true);
        vm.dests[dest.0].label = Some(label.clone());
        label
    }

    fn branch_label(
        &mut self,
        vm: &mut VirtualMachine,
        branch: crate::cell::BranchId,
    ) -> Result<String, ForthError> {
        let dest = vm.dest_of(branch)?;
        Ok(self.dest_label(vm, dest))
    }

    fn name(&mut self, middle: &str, word: &str, add_suffix: bool) -> String {
        // keep this one static so the boot code can reference it
        if word == "VM.INIT" {
            return "__forth_VM.INIT".to_string();
        }
        let fixed = sanitize(word);
        if add_suffix {
            let name = format!("__{}_{}_{}", middle, fixed, self.out_count);
            self.out_count += 1;
            name
        } else {
            format!("__{}_{}", middle, fixed)
        }
    }

    // ------------------------------------------------------------------
    // emission

    /// The lines a cell becomes inside an executable body.
    fn cell_execution(
        &mut self,
        vm: &mut VirtualMachine,
        cell: &Cell,
    ) -> Result<Vec<String>, ForthError> {
        match cell {
            Cell::Number(_) => Err(ForthError::Emission(
                "cannot directly execute a number".to_string(),
            )),
            Cell::Address(_) => {
                let name = self.cell_reference(vm, cell)?;
                Ok(match self.model {
                    ThreadingModel::Token => vec![format!(".int {}", name)],
                    ThreadingModel::Subroutine => vec![format!("jump {}", name)],
                })
            }
            Cell::Literal(inner) => {
                let mut name = self.cell_reference(vm, inner)?;
                if matches!(&**inner, Cell::Address(_)) {
                    name = format!("__body{}", name);
                }
                Ok(match self.model {
                    ThreadingModel::Token => {
                        vec![format!(".int {}", literal_symbol(&name))]
                    }
                    ThreadingModel::Subroutine => vec![
                        format!("move r0, {}", name),
                        "jump __add_to_stack".to_string(),
                    ],
                })
            }
            Cell::Destination(dest) => Ok(vec![format!("{}:", self.dest_label(vm, *dest))]),
            Cell::Branch(branch) => {
                let label = self.branch_label(vm, *branch)?;
                Ok(match self.model {
                    ThreadingModel::Token => vec![format!(".int {} + 0x8000", label)],
                    ThreadingModel::Subroutine => {
                        vec![format!("move r2, {}", label), "jump r2".to_string()]
                    }
                })
            }
            Cell::Branch0(branch) => {
                let label = self.branch_label(vm, *branch)?;
                Ok(match self.model {
                    ThreadingModel::Token => vec![format!(".int {} + 0x4000", label)],
                    ThreadingModel::Subroutine => vec![
                        format!("move r1, {}", label),
                        "jump __branch_if".to_string(),
                    ],
                })
            }
            Cell::TailCall(entry) => {
                let label = vm
                    .dictionary
                    .entry(*entry)
                    .ulp_name
                    .clone()
                    .ok_or_else(|| {
                        ForthError::Emission("tail call target has no label".to_string())
                    })?;
                // target the body so the callee's prelude is bypassed
                Ok(match self.model {
                    ThreadingModel::Token => {
                        vec![format!(".int __body{} + 0x8000", label)]
                    }
                    ThreadingModel::Subroutine => vec![
                        format!("move r2, __body{}", label),
                        "jump r2".to_string(),
                    ],
                })
            }
        }
    }

    fn emit(&mut self, vm: &mut VirtualMachine) -> Result<String, ForthError> {
        let mut sections: Vec<String> = vec![self.boot()];
        match self.model {
            ThreadingModel::Token => {
                let mut text = String::from(".text\n");
                for id in self.assembly_words.clone() {
                    text.push_str(&self.emit_primitive(vm, id)?);
                }
                sections.push(text);

                let mut data = String::from(".data\n__forth_words:\n");
                for id in self.forth_words.clone() {
                    data.push_str(&self.emit_composite(vm, id)?);
                }
                data.push_str("__data_words:\n");
                for id in self.data_words.clone() {
                    data.push_str(&self.emit_data(vm, id)?);
                }
                for (symbol, value) in &self.literals {
                    data.push_str(&format!("{}: .int {}\n", symbol, value));
                }
                data.push_str("__data_end:\n");
                sections.push(data);
            }
            ThreadingModel::Subroutine => {
                let mut text = String::from(".text\n");
                text.push_str(&format_strs(SRT_SUPPORT));
                for id in self.assembly_words.clone() {
                    text.push_str(&self.emit_primitive(vm, id)?);
                }
                text.push_str("__forth_words:\n");
                for id in self.forth_words.clone() {
                    text.push_str(&self.emit_composite(vm, id)?);
                }
                sections.push(text);

                let mut data = String::from(".data\n__data_words:\n");
                for id in self.data_words.clone() {
                    data.push_str(&self.emit_data(vm, id)?);
                }
                data.push_str("__data_end:\n");
                sections.push(data);
            }
        }
        Ok(sections.join("\n"))
    }

    fn emit_primitive(&self, vm: &VirtualMachine, id: EntryId) -> Result<String, ForthError> {
        let entry = vm.dictionary.entry(id);
        let label = entry
            .ulp_name
            .clone()
            .ok_or_else(|| ForthError::Emission(format!("{} has no label", entry.name)))?;
        let prim = match &entry.word {
            Word::Primitive(prim) => prim,
            Word::Composite(_) => {
                return Err(ForthError::Emission(format!(
                    "{} is not a primitive",
                    entry.name
                )))
            }
        };
        let mut lines = vec![format!("{}:", label), format!("__body{}:", label)];
        match self.model {
            ThreadingModel::Token => {
                lines.extend(prim.token.asm.iter().cloned());
                match prim.token.next {
                    TokenNext::Nonstandard => {}
                    TokenNext::Normal => lines.push("jump next".to_string()),
                    TokenNext::SkipR2 => lines.push("jump __next_skip_r2".to_string()),
                    TokenNext::SkipLoad => lines.push("jump __next_skip_load".to_string()),
                }
            }
            ThreadingModel::Subroutine => {
                lines.extend(prim.srt.asm.iter().cloned());
                if !prim.srt.custom_next {
                    lines.push("add r2, r2, 1".to_string());
                    lines.push("jump r2".to_string());
                }
            }
        }
        Ok(format_lines(&lines))
    }

    fn emit_composite(
        &mut self,
        vm: &mut VirtualMachine,
        id: EntryId,
    ) -> Result<String, ForthError> {
        let name = vm.dictionary.entry(id).name.clone();
        let label = vm
            .dictionary
            .entry(id)
            .ulp_name
            .clone()
            .ok_or_else(|| ForthError::Emission(format!("{} has no label", name)))?;
        let calls = vm.dictionary.entry(id).calls;
        let cells = vm.dictionary.composite(id)?.cells.clone();
        let mut lines = vec![format!("{}:", label)];
        if self.model == ThreadingModel::Subroutine && calls > 0 {
            lines.push("jump __docol".to_string());
        }
        lines.push(format!("__body{}:", label));
        for cell in &cells {
            let emitted = self
                .cell_execution(vm, cell)
                .map_err(|e| e.in_entry(&name, "error while compiling"))?;
            lines.extend(emitted);
        }
        Ok(format_lines(&lines))
    }

    fn emit_data(&mut self, vm: &mut VirtualMachine, id: EntryId) -> Result<String, ForthError> {
        let name = vm.dictionary.entry(id).name.clone();
        let label = vm
            .dictionary
            .entry(id)
            .ulp_name
            .clone()
            .ok_or_else(|| ForthError::Emission(format!("{} has no label", name)))?;
        let cells = vm.dictionary.composite(id)?.cells.clone();
        let mut lines = Vec::new();
        if vm
            .dictionary
            .entry(id)
            .flags
            .contains(WordFlags::GLOBAL_DATA)
        {
            lines.push(format!(".global {}", label));
        }
        lines.push(format!("{}:", label));
        lines.push(format!("__body{}:", label));
        for cell in &cells {
            let mut reference = self
                .cell_reference(vm, cell)
                .map_err(|e| e.in_entry(&name, "cannot compile this cell inside data"))?;
            if matches!(cell, Cell::Address(_)) {
                reference = format!("__body{}", reference);
            }
            lines.push(format!(".int {}", reference));
        }
        Ok(format_lines(&lines))
    }

    fn boot(&self) -> String {
        let mut lines: Vec<String> = PRE_BOOT.iter().map(|s| s.to_string()).collect();
        let model_boot = match self.model {
            ThreadingModel::Token => TOKEN_BOOT,
            ThreadingModel::Subroutine => SRT_BOOT,
        };
        lines.extend(model_boot.iter().map(|s| s.to_string()));
        format_lines(&lines)
    }
}

/// The pre-boot data cells live at fixed offsets from the start of the
/// data section; the host device and the emulator find them without any
/// symbolic linkage, so their order never changes.
const PRE_BOOT: &[&str] = &[
    ".boot.data",
    ".global MUTEX_FLAG0",
    ".global MUTEX_FLAG1",
    ".global MUTEX_TURN",
    ".global HOST_FUNC",
    ".global HOST_PARAM0",
    "MUTEX_FLAG0: .int 0",
    "MUTEX_FLAG1: .int 0",
    "MUTEX_TURN:  .int 0",
    "HOST_FUNC:   .int 0",
    "HOST_PARAM0: .int 0",
];

/// The token-threaded boot region: the instruction pointer cell, the
/// return stack pointer cell, and the inner interpreter. Dispatch is a
/// pure range comparison over the emitted section boundaries, with the
/// conditional branch bit at 0x4000 and the definite branch bit at
/// 0x8000.
const TOKEN_BOOT: &[&str] = &[
    ".data",
    "__ip:  .int __forth_VM.INIT",
    "__rsp: .int __stack_start",
    ".boot",
    ".global entry",
    "entry:",
    "next:",
    "move r2, 0",
    "__next_skip_r2:",
    "ld r1, r2, __ip",
    "__next_skip_load:",
    "add r1, r1, 1",
    "ld r0, r1, -1",
    "__ins_asm:",
    "jumpr __ins_forth, __forth_words, ge",
    "st r1, r2, __ip",
    "jump r0",
    "__ins_forth:",
    "jumpr __ins_num, __data_words, ge",
    "st r0, r2, __ip",
    "ld r0, r2, __rsp",
    "add r0, r0, 1",
    "st r1, r0, 0",
    "st r0, r2, __rsp",
    "jump __next_skip_r2",
    "__ins_num:",
    "jumpr __ins_branch0, __data_end, gt",
    "ld r0, r0, 0",
    "sub r3, r3, 1",
    "st r0, r3, 0",
    "jump __next_skip_load",
    "__ins_branch0:",
    "jumpr __ins_branch, 0x8000, ge",
    "ld r0, r3, 0",
    "add r3, r3, 1",
    "jumpr __next_skip_load, 1, ge",
    "ld r0, r1, -1",
    "__ins_branch:",
    "and r1, r0, 0x3FFF",
    "jump __next_skip_load",
];

/// The subroutine-threaded boot region. Registers survive a halt, so a
/// cold boot is told apart from a wakeup by r2 being zero: cold boots
/// initialize the stack register and enter the initializer body, wakeups
/// resume at the element the halt recorded in r2.
const SRT_BOOT: &[&str] = &[
    ".data",
    "__rsp: .int __stack_start",
    ".boot",
    ".global entry",
    "entry:",
    "move r0, r2",
    "jumpr __entry.0, 1, lt",
    "jump r2",
    "__entry.0:",
    "move r3, __stack_end",
    "move r2, __body__forth_VM.INIT",
    "jump r2",
];

/// Support routines shared by every subroutine-threaded body. r2 always
/// holds the address of the body element being executed; element sizes
/// are one word for calls and two words for literals and branches. The
/// DOCOL prelude reads the caller's jump instruction to recover the
/// callee, pushes the caller's position, and drops into the body past
/// the stub.
const SRT_SUPPORT: &[&str] = &[
    "__docol:",
    "move r0, __rsp",
    "ld r1, r0, 0",
    "add r1, r1, 1",
    "st r2, r1, 0",
    "st r1, r0, 0",
    "ld r0, r2, 0",
    "rsh r0, r0, 2",
    "and r0, r0, 0xFFF",
    "add r2, r0, 1",
    "jump r2",
    "__add_to_stack:",
    "sub r3, r3, 1",
    "st r0, r3, 0",
    "add r2, r2, 2",
    "jump r2",
    "__branch_if:",
    "ld r0, r3, 0",
    "add r3, r3, 1",
    "jumpr __branch_if.0, 1, lt",
    "add r2, r2, 2",
    "jump r2",
    "__branch_if.0:",
    "move r2, r1",
    "jump r2",
];

fn format_strs(lines: &[&str]) -> String {
    let owned: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    format_lines(&owned)
}

/// Indent instructions, leave labels and directives flush.
fn format_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        if !line.contains(':') && !line.starts_with('.') {
            out.push_str("    ");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Forth names can hold any byte; everything outside the label alphabet
/// is spelled out by its code so two names can never collide.
fn sanitize(text: &str) -> String {
    let mut out = String::new();
    for byte in text.bytes() {
        match byte {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'_' => out.push(byte as char),
            other => out.push_str(&format!("_ascii{}_", other)),
        }
    }
    out
}

fn literal_symbol(reference: &str) -> String {
    format!("__literal_{}", reference.replace('+', "_plus_"))
}

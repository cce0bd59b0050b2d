// cell.rs - The tagged values that flow through the stacks and word bodies

use crate::dictionary::Word;
use crate::errors::{entry_error, ForthError};
use crate::interpreter::VirtualMachine;

/// Handle to a dictionary entry in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub usize);

/// Handle to a branch destination. Destinations are shared between the
/// word body that emits the label and the branch sites that jump to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestId(pub usize);

/// Handle to a branch site. The compiled copy of a branch cell and the
/// copy held on the control flow stack resolve through the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchId(pub usize);

/// An address into a word body. `upper` selects the upper byte of the
/// 16-bit cell for character addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub entry: EntryId,
    pub offset: isize,
    pub upper: bool,
}

impl Addr {
    pub fn new(entry: EntryId) -> Addr {
        Addr {
            entry,
            offset: 0,
            upper: false,
        }
    }
}

/// A Cell is the smallest unit of address within Forth. Cells are what
/// constitute word bodies, stack entries and data blocks. The target cell
/// is 16 bits unsigned and all arithmetic wraps accordingly.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// A literal 16-bit value.
    Number(u16),
    /// A pointer into a word body.
    Address(Addr),
    /// Pushes the inner cell when executed. Used for execution tokens
    /// and quoted addresses.
    Literal(Box<Cell>),
    /// A control-flow join point, named lazily during emission.
    Destination(DestId),
    /// An unconditional branch to a destination.
    Branch(BranchId),
    /// Pop the top of the stack and branch if it is zero.
    Branch0(BranchId),
    /// A call in final position, rewritten by the optimizer so it does
    /// not grow the return stack.
    TailCall(EntryId),
}

impl Cell {
    /// Execute this cell on the host.
    pub fn execute(&self, vm: &mut VirtualMachine) -> Result<(), ForthError> {
        match self {
            Cell::Number(_) => Err(ForthError::Type(
                "cannot directly execute a number".to_string(),
            )),
            Cell::Address(addr) => execute_address(vm, *addr),
            Cell::Literal(inner) => {
                vm.stack.push((**inner).clone());
                Ok(())
            }
            Cell::Destination(_) => Ok(()),
            Cell::Branch(id) => {
                vm.ip = Some(vm.branch_target(*id)?);
                Ok(())
            }
            Cell::Branch0(id) => {
                let value = vm.stack.pop()?;
                if let Cell::Number(0) = value {
                    vm.ip = Some(vm.branch_target(*id)?);
                }
                // a non-number on top of the stack is left ignored
                Ok(())
            }
            Cell::TailCall(_) => Err(ForthError::Type(
                "cannot directly execute a tail call".to_string(),
            )),
        }
    }
}

fn execute_address(vm: &mut VirtualMachine, addr: Addr) -> Result<(), ForthError> {
    enum Target {
        Data(Cell),
        Composite,
        Primitive(crate::dictionary::HostFn),
    }
    let target = {
        let entry = vm.dictionary.entry(addr.entry);
        match &entry.word {
            Word::Composite(word) => {
                if entry.flags.contains(crate::dictionary::WordFlags::DATA) {
                    if addr.offset < 0 || addr.offset >= word.cells.len() as isize {
                        return Err(entry_error(
                            &entry.name,
                            "trying to get data from outside of allocated data",
                        ));
                    }
                    Target::Data(word.cells[addr.offset as usize].clone())
                } else {
                    Target::Composite
                }
            }
            Word::Primitive(word) => {
                if addr.offset != 0 {
                    return Err(entry_error(
                        &entry.name,
                        "cannot execute a primitive word at an offset",
                    ));
                }
                Target::Primitive(word.host)
            }
        }
    };
    match target {
        Target::Data(cell) => {
            vm.stack.push(cell);
            Ok(())
        }
        Target::Composite => vm.execute_composite(addr.entry, addr.offset),
        Target::Primitive(host) => host(vm, addr.entry),
    }
}

/// Pack bytes into 16-bit cells, low byte first, optionally prefixing the
/// length byte of a counted string.
pub fn bytes_to_cells(bytes: &[u8], counted: bool) -> Vec<Cell> {
    let mut packed = Vec::with_capacity(bytes.len() + 1);
    if counted {
        packed.push(bytes.len() as u8);
    }
    packed.extend_from_slice(bytes);
    let mut cells = Vec::with_capacity(packed.len() / 2 + 1);
    let mut chunks = packed.chunks_exact(2);
    for pair in &mut chunks {
        let value = u16::from(pair[1]) << 8 | u16::from(pair[0]);
        cells.push(Cell::Number(value));
    }
    if let [last] = chunks.remainder() {
        cells.push(Cell::Number(u16::from(*last)));
    }
    cells
}

/// Unpack a sequence of number cells back into bytes, low byte first.
pub fn cells_to_bytes(cells: &[Cell]) -> Result<Vec<u8>, ForthError> {
    let mut out = Vec::with_capacity(cells.len() * 2);
    for cell in cells {
        match cell {
            Cell::Number(n) => {
                out.push(*n as u8);
                out.push((*n >> 8) as u8);
            }
            other => {
                return Err(ForthError::Type(format!(
                    "can only convert number cells to bytes, found {:?}",
                    other
                )))
            }
        }
    }
    Ok(out)
}

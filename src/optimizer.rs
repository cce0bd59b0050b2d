// optimizer.rs - Passes over the reachable dictionary before emission

use crate::cell::{Addr, Cell, EntryId};
use crate::dictionary::{Word, WordFlags};
use crate::errors::ForthError;
use crate::interpreter::VirtualMachine;

/// Run every pass over the reachability set, in order: recursion tagging,
/// deferred-word inlining, tail-call rewriting. The order matters; the
/// recursion flags gate the body rewrites that follow.
pub fn optimize(vm: &mut VirtualMachine, words: &[EntryId]) -> Result<(), ForthError> {
    tag_recursion(vm, words);
    inline_deferred(vm, words)?;
    rewrite_tail_calls(vm, words)?;
    Ok(())
}

/// Mark every composite that can reach itself. A recursive word must keep
/// its shape, so later passes leave it alone.
fn tag_recursion(vm: &mut VirtualMachine, words: &[EntryId]) {
    for id in words {
        vm.dictionary.entry_mut(*id).flags.remove(WordFlags::RECURSIVE);
    }
    for id in words {
        clear_visited(vm);
        let cells = match vm.dictionary.composite(*id) {
            Ok(word) => word.cells.clone(),
            Err(_) => continue,
        };
        for cell in &cells {
            if cell_is_recursive(vm, cell, *id) {
                vm.dictionary.entry_mut(*id).flags.insert(WordFlags::RECURSIVE);
                break;
            }
        }
    }
}

fn clear_visited(vm: &mut VirtualMachine) {
    for id in vm.dictionary.ids().collect::<Vec<_>>() {
        vm.dictionary.entry_mut(id).flags.remove(WordFlags::VISITED);
    }
}

fn cell_is_recursive(vm: &mut VirtualMachine, cell: &Cell, target: EntryId) -> bool {
    match cell {
        Cell::Address(addr) => word_is_recursive(vm, addr.entry, target),
        Cell::Literal(inner) => cell_is_recursive(vm, inner, target),
        Cell::TailCall(entry) => word_is_recursive(vm, *entry, target),
        _ => false,
    }
}

fn word_is_recursive(vm: &mut VirtualMachine, id: EntryId, target: EntryId) -> bool {
    if id == target {
        return true;
    }
    let entry = vm.dictionary.entry(id);
    if entry.flags.contains(WordFlags::VISITED) {
        return false;
    }
    let cells = match &entry.word {
        Word::Composite(word) => word.cells.clone(),
        Word::Primitive(_) => return false,
    };
    vm.dictionary.entry_mut(id).flags.insert(WordFlags::VISITED);
    cells
        .iter()
        .any(|cell| cell_is_recursive(vm, cell, target))
}

/// Rebind deferred words in place. A word produced by DEFER dispatches
/// through a one-cell holder; once its address can no longer change, the
/// held cell is spliced directly into the body. Words whose address
/// escaped into a Literal keep their indirection.
fn inline_deferred(vm: &mut VirtualMachine, words: &[EntryId]) -> Result<(), ForthError> {
    let exit = vm.dictionary.find_name("EXIT")?;
    for id in words {
        let flags = vm.dictionary.entry(*id).flags;
        if !flags.contains(WordFlags::IS_DEFERRED)
            || flags.contains(WordFlags::IN_TOKEN)
            || flags.contains(WordFlags::RECURSIVE)
        {
            continue;
        }
        let holder = match vm.dictionary.composite(*id)?.cells.first() {
            Some(Cell::Literal(inner)) => match **inner {
                Cell::Address(holder) if holder.offset == 0 => holder.entry,
                _ => continue,
            },
            _ => continue,
        };
        if !vm.dictionary.entry(holder).flags.contains(WordFlags::DATA) {
            continue;
        }
        let held = match vm.dictionary.composite(holder)?.cells.first() {
            Some(cell) => cell.clone(),
            None => continue,
        };
        vm.dictionary.composite_mut(*id)?.cells =
            vec![held, Cell::Address(Addr::new(exit))];
    }
    Ok(())
}

/// Replace every adjacent pair of a composite call followed by EXIT with
/// a single tail call, so the emitted code jumps instead of nesting.
fn rewrite_tail_calls(vm: &mut VirtualMachine, words: &[EntryId]) -> Result<(), ForthError> {
    for id in words {
        let mut i = 0;
        loop {
            let len = vm.dictionary.composite(*id)?.cells.len();
            if i + 1 >= len {
                break;
            }
            let (first, second) = {
                let cells = &vm.dictionary.composite(*id)?.cells;
                (cells[i].clone(), cells[i + 1].clone())
            };
            let callee = match first {
                Cell::Address(addr) if addr.offset == 0 && !addr.upper => addr.entry,
                _ => {
                    i += 1;
                    continue;
                }
            };
            let callee_flags = vm.dictionary.entry(callee).flags;
            let callee_composite =
                matches!(vm.dictionary.entry(callee).word, Word::Composite(_));
            if !callee_composite || callee_flags.contains(WordFlags::DATA) {
                i += 1;
                continue;
            }
            let exits = match second {
                Cell::Address(addr) => vm
                    .dictionary
                    .entry(addr.entry)
                    .flags
                    .contains(WordFlags::IS_EXIT),
                _ => false,
            };
            if !exits {
                i += 1;
                continue;
            }
            let cells = &mut vm.dictionary.composite_mut(*id)?.cells;
            cells[i] = Cell::TailCall(callee);
            cells.remove(i + 1);
            i += 1;
        }
    }
    Ok(())
}

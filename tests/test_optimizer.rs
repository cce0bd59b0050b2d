// The optimizer passes: recursion tagging, deferred-word inlining and
// tail-call rewriting, checked directly on the dictionary.

mod common;

use common::vm_with_buffer;
use crucible::cell::{Cell, EntryId};
use crucible::dictionary::{Word, WordFlags};
use crucible::interpreter::VirtualMachine;
use crucible::optimizer;

fn composites(vm: &VirtualMachine, names: &[&str]) -> Vec<EntryId> {
    names
        .iter()
        .map(|name| vm.dictionary.find_name(name).expect("word should exist"))
        .collect()
}

/// True when any composite in the set still holds a call directly
/// followed by EXIT.
fn has_call_exit_pair(vm: &VirtualMachine, words: &[EntryId]) -> bool {
    for id in words {
        let cells = &vm.dictionary.composite(*id).unwrap().cells;
        for pair in cells.windows(2) {
            let callee_is_composite = match &pair[0] {
                Cell::Address(addr) => matches!(
                    vm.dictionary.entry(addr.entry).word,
                    Word::Composite(_)
                ) && !vm
                    .dictionary
                    .entry(addr.entry)
                    .flags
                    .contains(WordFlags::DATA),
                _ => false,
            };
            let then_exits = match &pair[1] {
                Cell::Address(addr) => vm
                    .dictionary
                    .entry(addr.entry)
                    .flags
                    .contains(WordFlags::IS_EXIT),
                _ => false,
            };
            if callee_is_composite && then_exits {
                return true;
            }
        }
    }
    false
}

#[test]
fn calls_in_final_position_become_tail_calls() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : HELPER 1 DROP ; : CALLER HELPER ; ").unwrap();
    let words = composites(&vm, &["CALLER", "HELPER"]);
    assert!(has_call_exit_pair(&vm, &words));
    optimizer::optimize(&mut vm, &words).unwrap();
    assert!(!has_call_exit_pair(&vm, &words));

    let helper = vm.dictionary.find_name("HELPER").unwrap();
    let caller = vm.dictionary.find_name("CALLER").unwrap();
    let cells = &vm.dictionary.composite(caller).unwrap().cells;
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0], Cell::TailCall(helper));
}

#[test]
fn calls_to_primitives_are_left_alone() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : ONLYPRIM DROP ; ").unwrap();
    let words = composites(&vm, &["ONLYPRIM"]);
    optimizer::optimize(&mut vm, &words).unwrap();
    let id = words[0];
    let cells = &vm.dictionary.composite(id).unwrap().cells;
    // DROP is a primitive, the pair must survive
    assert_eq!(cells.len(), 2);
    assert!(matches!(cells[0], Cell::Address(_)));
}

#[test]
fn direct_recursion_is_tagged() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : SPIN RECURSE ; : PLAIN 1 DROP ; ").unwrap();
    let words = composites(&vm, &["SPIN", "PLAIN"]);
    optimizer::optimize(&mut vm, &words).unwrap();
    let spin = vm.dictionary.find_name("SPIN").unwrap();
    let plain = vm.dictionary.find_name("PLAIN").unwrap();
    assert!(vm
        .dictionary
        .entry(spin)
        .flags
        .contains(WordFlags::RECURSIVE));
    assert!(!vm
        .dictionary
        .entry(plain)
        .flags
        .contains(WordFlags::RECURSIVE));
}

#[test]
fn mutual_recursion_through_a_deferred_word_is_tagged() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" DEFER PONG : PING PONG ; ' PING IS PONG ").unwrap();
    let words = composites(&vm, &["PING", "PONG"]);
    optimizer::optimize(&mut vm, &words).unwrap();
    let ping = vm.dictionary.find_name("PING").unwrap();
    assert!(vm
        .dictionary
        .entry(ping)
        .flags
        .contains(WordFlags::RECURSIVE));
}

#[test]
fn deferred_words_are_spliced_in_place() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" DEFER ACT : TARGET 5 DROP ; ' TARGET IS ACT ").unwrap();
    let words = composites(&vm, &["ACT", "TARGET"]);
    optimizer::optimize(&mut vm, &words).unwrap();
    let act = vm.dictionary.find_name("ACT").unwrap();
    let target = vm.dictionary.find_name("TARGET").unwrap();
    let cells = &vm.dictionary.composite(act).unwrap().cells;
    // the literal and dispatch are gone, only the held call remains and
    // the tail pass turns it into a jump
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0], Cell::TailCall(target));
}

#[test]
fn in_token_blocks_deferred_inlining() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" DEFER ACT : TARGET 5 DROP ; ' TARGET IS ACT ").unwrap();
    let act = vm.dictionary.find_name("ACT").unwrap();
    vm.dictionary
        .entry_mut(act)
        .flags
        .insert(WordFlags::IN_TOKEN);
    let words = composites(&vm, &["ACT", "TARGET"]);
    optimizer::optimize(&mut vm, &words).unwrap();
    let cells = &vm.dictionary.composite(act).unwrap().cells;
    assert!(
        matches!(cells[0], Cell::Literal(_)),
        "an escaped deferred word keeps its indirection"
    );
}

#[test]
fn untouched_words_still_run_on_the_host() {
    // tail calls only exist for emission, so a body that ends in a
    // primitive must come through the optimizer executable
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" : MAIN 1 1 + U. 0 DROP ; ").unwrap();
    let words = composites(&vm, &["MAIN"]);
    optimizer::optimize(&mut vm, &words).unwrap();
    vm.interpret(b" MAIN ")
        .unwrap_or_else(|e| panic!("optimized MAIN failed: {}", e));
    assert_eq!(buf.contents(), "2 ");
}

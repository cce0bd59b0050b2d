// Primitive behaviors that the scenario suite does not reach: typed
// errors, address arithmetic, and byte lane addressing.

mod common;

use common::vm_with_buffer;

#[test]
fn pops_on_an_empty_stack_underflow() {
    let (mut vm, _buf) = vm_with_buffer();
    assert!(vm.interpret(b" DROP ").is_err());
    assert!(vm.interpret(b" SWAP ").is_err());
    assert!(vm.interpret(b" R> ").is_err());
}

#[test]
fn address_plus_number_adjusts_the_offset() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" 3 CREATE BLOCK ").unwrap();
    vm.interpret(b" 7 BLOCK 2 + ! BLOCK 2 + @ U. ").unwrap();
    assert_eq!(buf.contents(), "7 ");
}

#[test]
fn address_minus_address_requires_the_same_entry() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" VARIABLE A VARIABLE B ").unwrap();
    vm.interpret(b" A 2 + A - U. ").unwrap();
    assert_eq!(buf.contents(), "2 ");
    assert!(vm.interpret(b" A B - ").is_err());
}

#[test]
fn fetch_requires_an_address() {
    let (mut vm, _buf) = vm_with_buffer();
    assert!(vm.interpret(b" 5 @ ").is_err());
    assert!(vm.interpret(b" 5 6 ! ").is_err());
}

#[test]
fn fetch_outside_the_data_block_is_out_of_bounds() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" VARIABLE V ").unwrap();
    assert!(vm.interpret(b" V 5 + @ ").is_err());
}

#[test]
fn byte_lanes_read_and_write_independently() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" VARIABLE V 0x1234 V ! ").unwrap();
    vm.interpret(b" V C@ U. V CHAR+ C@ U. ").unwrap();
    assert_eq!(buf.contents(), "52 18 ");
    vm.interpret(b" 0xFF V CHAR+ C! V @ U. ").unwrap();
    assert_eq!(buf.contents(), "52 18 65332 ");
    vm.interpret(b" 0 V C! V @ U. ").unwrap();
    assert_eq!(buf.contents(), "52 18 65332 65280 ");
}

#[test]
fn char_plus_walks_bytes_and_aligned_rounds_up() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" 2 CREATE PAIR 0x2211 PAIR ! 0x4433 PAIR 1 + ! ").unwrap();
    vm.interpret(b" PAIR CHAR+ CHAR+ CHAR+ C@ U. ").unwrap();
    assert_eq!(buf.contents(), "68 ");
    vm.interpret(b" PAIR CHAR+ ALIGNED C@ U. ").unwrap();
    assert_eq!(buf.contents(), "68 51 ");
}

#[test]
fn branch0_ignores_a_non_number() {
    // an address on top of a conditional is dropped without branching
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" VARIABLE V : MAIN V IF 1 U. ELSE 2 U. THEN ESP.DONE ; MAIN ")
        .unwrap();
    assert_eq!(buf.contents(), "1 ");
}

#[test]
fn execute_requires_an_address() {
    let (mut vm, _buf) = vm_with_buffer();
    assert!(vm.interpret(b" 5 EXECUTE ").is_err());
}

#[test]
fn executing_a_primitive_at_an_offset_fails() {
    let (mut vm, _buf) = vm_with_buffer();
    assert!(vm.interpret(b" ' DUP 1 + EXECUTE ").is_err());
}

#[test]
fn logic_ops_require_numbers() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" VARIABLE V ").unwrap();
    assert!(vm.interpret(b" 1 V AND ").is_err());
}

#[test]
fn division_by_zero_is_an_error() {
    let (mut vm, _buf) = vm_with_buffer();
    assert!(vm.interpret(b" 1 0 U/MOD ").is_err());
}

#[test]
fn host_only_words_refuse_to_run() {
    let (mut vm, _buf) = vm_with_buffer();
    let err = vm.interpret(b" HALT ").unwrap_err();
    assert!(err.to_string().contains("cannot be executed on the host"));
}

#[test]
fn mutex_words_are_host_noops() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" MUTEX.TAKE MUTEX.GIVE 1 U. ").unwrap();
    assert_eq!(buf.contents(), "1 ");
}

#[test]
fn dot_s_shows_the_stack() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" 1 2 3 .S ").unwrap();
    assert_eq!(buf.contents(), "[1 2 3]");
}

#[test]
fn words_lists_the_dictionary() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" : ZYZZY 1 ; WORDS ").unwrap();
    let listing = buf.contents();
    assert!(listing.contains("ZYZZY"));
    assert!(listing.contains("DUP"));
}

#[test]
fn see_shows_a_definition() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" : TWICE DUP + ; BL WORD TWICE --SEE ").unwrap();
    let shown = buf.contents();
    assert!(shown.contains("TWICE:"));
    assert!(shown.contains("DUP"));
}

#[test]
fn allocate_hands_out_zeroed_cells() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" 4 ALLOCATE DROP 3 + @ U. ").unwrap();
    assert_eq!(buf.contents(), "0 ");
}

#[test]
fn set_hidden_removes_a_word_from_lookup() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : GHOST 1 ; 1 ' GHOST SET-HIDDEN ").unwrap();
    assert!(vm.interpret(b" GHOST ").is_err());
}

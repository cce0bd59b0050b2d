// Parse area behavior and number recognition.

mod common;

use common::{vm_with_buffer, SharedBuf};
use crucible::interpreter::VirtualMachine;
use crucible::parse::ParseArea;

#[test]
fn word_splits_on_whitespace() {
    let mut area = ParseArea::new();
    area.fill(b"  DUP \t SWAP\nDROP");
    assert_eq!(area.word(b' ', false), b"DUP");
    assert_eq!(area.word(b' ', false), b"SWAP");
    assert_eq!(area.word(b' ', false), b"DROP");
    assert_eq!(area.word(b' ', false), b"");
}

#[test]
fn word_with_exact_delimiter() {
    let mut area = ParseArea::new();
    area.fill(b" hello world) trailing");
    assert_eq!(area.word(b')', false), b"hello world");
    assert_eq!(area.word(b' ', false), b"trailing");
}

#[test]
fn word_with_escaped_delimiter() {
    let mut area = ParseArea::new();
    area.fill(br#"say \"hi\"" rest"#);
    assert_eq!(area.word(b'"', true), br#"say \"hi\""#);
    assert_eq!(area.word(b' ', false), b"rest");
}

#[test]
fn save_and_restore_swap_the_held_slot() {
    let mut area = ParseArea::new();
    area.fill(b"outer words");
    assert_eq!(area.word(b' ', false), b"outer");
    area.save();
    area.fill(b"inner");
    assert_eq!(area.word(b' ', false), b"inner");
    area.restore();
    assert_eq!(area.word(b' ', false), b"words");
}

fn output_of(vm: &mut VirtualMachine, buf: &SharedBuf, code: &str) -> String {
    let before = buf.contents().len();
    vm.interpret(code.as_bytes()).expect("interpret failed");
    buf.contents()[before..].to_string()
}

#[test]
fn numbers_round_trip_in_every_base() {
    let (mut vm, buf) = vm_with_buffer();
    for n in [0u16, 1, 2, 9, 10, 255, 256, 32767, 32768, 65535] {
        let decimal = output_of(&mut vm, &buf, &format!(" {} U. ", n));
        assert_eq!(decimal, format!("{} ", n));
        let hex = output_of(&mut vm, &buf, &format!(" 0x{:X} U. ", n));
        assert_eq!(hex, format!("{} ", n));
        let binary = output_of(&mut vm, &buf, &format!(" 0b{:b} U. ", n));
        assert_eq!(binary, format!("{} ", n));
    }
}

#[test]
fn base_variable_controls_parsing() {
    let (mut vm, buf) = vm_with_buffer();
    let out = output_of(&mut vm, &buf, " 16 BASE ! FF U. #10 U. 10 U. 0b101 U. ");
    // in base 16: FF is 255, #10 forces decimal, 10 is 16
    assert_eq!(out, "255 10 16 5 ");
}

#[test]
fn negative_numbers_wrap_to_16_bits() {
    let (mut vm, buf) = vm_with_buffer();
    assert_eq!(output_of(&mut vm, &buf, " -1 U. "), "65535 ");
    assert_eq!(output_of(&mut vm, &buf, " -2 U. "), "65534 ");
    assert_eq!(output_of(&mut vm, &buf, " -0x10 U. "), "65520 ");
}

#[test]
fn doubles_push_low_then_high() {
    let (mut vm, buf) = vm_with_buffer();
    // the high cell is on top
    assert_eq!(output_of(&mut vm, &buf, " 0xFFFFFF. U. U. "), "255 65535 ");
    assert_eq!(output_of(&mut vm, &buf, " 1. U. U. "), "0 1 ");
}

#[test]
fn character_literals_are_three_chars_quoted() {
    let (mut vm, buf) = vm_with_buffer();
    assert_eq!(output_of(&mut vm, &buf, " 'A' U. "), "65 ");
    assert!(vm.interpret(b" 'AB' ").is_err());
}

#[test]
fn unknown_words_surface_the_dictionary_miss() {
    let (mut vm, _buf) = vm_with_buffer();
    let err = vm.interpret(b" NO-SUCH-WORD ").unwrap_err();
    assert!(err.to_string().contains("NO-SUCH-WORD"));
}

#[test]
fn lookup_is_case_insensitive() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : MiXeD 7 ; ").unwrap();
    let lower = vm.dictionary.find_name("mixed").unwrap();
    let upper = vm.dictionary.find_name("MIXED").unwrap();
    let mixed = vm.dictionary.find_name("MiXeD").unwrap();
    assert_eq!(lower, upper);
    assert_eq!(lower, mixed);
}

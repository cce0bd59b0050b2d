// Structural checks on the emitted assembly for both threading models.

mod common;

use common::vm_with_buffer;
use crucible::compiler::{build_assembly, ThreadingModel};

const COUNTDOWN: &str = "
    : countdown ( n -- )
        DUP 0= IF
            DROP
        ELSE
            1-
            RECURSE
            EXIT
        THEN
    ;
    : MAIN
        DEPTH U.
        2000 countdown DEPTH U.
        ESP.DONE
    ;
";

fn build(source: &str, model: ThreadingModel) -> String {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(source.as_bytes()).expect("program should load");
    build_assembly(&mut vm, "MAIN", model).expect("cross-compile should succeed")
}

#[test]
fn emission_is_deterministic() {
    let first = build(COUNTDOWN, ThreadingModel::Token);
    let second = build(COUNTDOWN, ThreadingModel::Token);
    assert_eq!(first, second);
    let first = build(COUNTDOWN, ThreadingModel::Subroutine);
    let second = build(COUNTDOWN, ThreadingModel::Subroutine);
    assert_eq!(first, second);
}

#[test]
fn the_pre_boot_data_layout_is_fixed() {
    for model in [ThreadingModel::Token, ThreadingModel::Subroutine] {
        let asm = build(" : MAIN ESP.DONE ; ", model);
        let flag0 = asm.find("MUTEX_FLAG0: .int 0").expect("flag0 missing");
        let flag1 = asm.find("MUTEX_FLAG1: .int 0").expect("flag1 missing");
        let turn = asm.find("MUTEX_TURN:  .int 0").expect("turn missing");
        let func = asm.find("HOST_FUNC:   .int 0").expect("func missing");
        let param = asm.find("HOST_PARAM0: .int 0").expect("param missing");
        assert!(flag0 < flag1 && flag1 < turn && turn < func && func < param);
        assert!(asm.starts_with(".boot.data"));
    }
}

#[test]
fn unreachable_words_are_omitted() {
    let asm = build(
        " : UNUSED 42 U. ; : USED 7 U. ; : MAIN USED ESP.DONE ; ",
        ThreadingModel::Token,
    );
    assert!(asm.contains("__forth_USED"));
    assert!(!asm.contains("__forth_UNUSED"));
}

#[test]
fn token_sections_stay_ordered() {
    let asm = build(COUNTDOWN, ThreadingModel::Token);
    let text = asm.find(".text").expect("text section missing");
    let forth = asm.find("__forth_words:").expect("forth marker missing");
    let data = asm.find("__data_words:").expect("data marker missing");
    let end = asm.find("__data_end:").expect("end marker missing");
    assert!(text < forth && forth < data && data < end);
}

#[test]
fn branch_targets_carry_their_bits() {
    let asm = build(COUNTDOWN, ThreadingModel::Token);
    // IF compiles a conditional, BEGIN AGAIN and the tail call compile
    // definite branches
    assert!(asm.contains("+ 0x4000"));
    assert!(asm.contains("+ 0x8000"));
    for line in asm.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(".int __dest_")
            && !trimmed.contains("+ 0x4000")
            && !trimmed.contains("+ 0x8000")
        {
            panic!("a branch target lost its bit: {}", line);
        }
    }
}

#[test]
fn tail_calls_jump_to_the_body() {
    let asm = build(COUNTDOWN, ThreadingModel::Token);
    assert!(
        asm.contains(".int __body__forth_countdown"),
        "the recursive call should be a branch to its own body"
    );
    let srt = build(COUNTDOWN, ThreadingModel::Subroutine);
    assert!(srt.contains("move r2, __body__forth_countdown"));
}

#[test]
fn literals_are_pooled_once_per_value() {
    let asm = build(
        " : MAIN 123 U. 123 U. ESP.DONE ; ",
        ThreadingModel::Token,
    );
    let pool_entries = asm
        .lines()
        .filter(|line| line.starts_with("__literal_123:"))
        .count();
    assert_eq!(pool_entries, 1);
    assert!(asm.contains("__literal_123: .int 123"));
}

#[test]
fn the_initializer_label_is_pinned() {
    for model in [ThreadingModel::Token, ThreadingModel::Subroutine] {
        let asm = build(" : MAIN ESP.DONE ; ", model);
        assert!(asm.contains("__forth_VM.INIT:"));
        assert!(asm.contains("__body__forth_VM.INIT:"));
    }
}

#[test]
fn srt_emits_the_support_routines() {
    let asm = build(COUNTDOWN, ThreadingModel::Subroutine);
    assert!(asm.contains("__docol:"));
    assert!(asm.contains("__add_to_stack:"));
    assert!(asm.contains("__branch_if:"));
}

#[test]
fn srt_preludes_only_called_words() {
    let asm = build(COUNTDOWN, ThreadingModel::Subroutine);
    // the initializer is entered by the boot code, never called
    assert!(asm.contains("__forth_VM.INIT:\n__body__forth_VM.INIT:"));
    // countdown is called directly from MAIN, so it carries the prelude
    let countdown = asm
        .find("__forth_countdown")
        .expect("countdown label missing");
    let after = &asm[countdown..];
    assert!(
        after.contains("jump __docol"),
        "a called word should start with the DOCOL stub"
    );
}

#[test]
fn global_data_is_exported() {
    let asm = build(" : MAIN BASE @ U. ESP.DONE ; ", ThreadingModel::Token);
    assert!(asm.contains(".global BASE"));
    assert!(asm.contains("BASE:"));
}

#[test]
fn variables_become_data_words() {
    let asm = build(
        " VARIABLE COUNTER 9 COUNTER ! : MAIN COUNTER @ U. ESP.DONE ; ",
        ThreadingModel::Token,
    );
    // the holder is anonymous, it gets a generated data label holding 9
    assert!(asm.contains("__data_unnamed_"));
    assert!(asm.contains(".int 9"));
}

#[test]
fn missing_root_word_fails_the_build() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : HELPER 1 DROP ; ").unwrap();
    assert!(build_assembly(&mut vm, "MAIN", ThreadingModel::Token).is_err());
}

// Host-side scenarios for the interpreter and the builtin words.
// Every case defines MAIN, runs it on the host, and compares the output
// the host functions produced.

mod common;

use common::{run_host, vm_with_buffer, wrap_main};

#[test]
fn basic_words() {
    let tests: &[(&str, String, &str)] = &[
        ("blank", " : MAIN ESP.DONE ; ".to_string(), ""),
        (
            "print u16",
            " : MAIN 123 U. 456 U. ESP.DONE ; ".to_string(),
            "123 456 ",
        ),
        (
            "print char",
            " : MAIN 'A' ESP.PRINTCHAR 'B' ESP.PRINTCHAR 'C' ESP.PRINTCHAR ESP.DONE ; "
                .to_string(),
            "ABC",
        ),
        ("double", wrap_main("0xFFFFFF. U. U."), "255 65535 "),
        ("+", wrap_main("1 2 + U."), "3 "),
        ("-", wrap_main("3 1 - U."), "2 "),
        (
            "LSHIFT",
            wrap_main("1 0 LSHIFT U. 1 1 LSHIFT U. 1 2 LSHIFT U."),
            "1 2 4 ",
        ),
        ("SWAP", wrap_main("1 2 SWAP U. U."), "1 2 "),
        ("DUP", wrap_main("456 789 DUP U. U. U."), "789 789 456 "),
        ("ROT", wrap_main("1 2 3 ROT U. U. U."), "1 3 2 "),
        ("DROP", wrap_main("1 2 3 DROP U. U."), "2 1 "),
        ("EXIT", wrap_main("1 U. ESP.DONE EXIT 2 U."), "1 "),
        ("IF true", wrap_main("TRUE IF 123 THEN U."), "123 "),
        ("IF false", wrap_main("456 FALSE IF 123 THEN U."), "456 "),
        ("IF ELSE true", wrap_main("TRUE IF 123 ELSE 456 THEN U."), "123 "),
        (
            "IF ELSE false",
            wrap_main("FALSE IF 123 ELSE 456 THEN U."),
            "456 ",
        ),
        (">R R>", wrap_main("123 234 >R U. R> U."), "123 234 "),
        ("EXECUTE primitive", wrap_main("1 2 ['] + EXECUTE U."), "3 "),
        ("EXECUTE word", wrap_main("['] FALSE EXECUTE U."), "0 "),
        (
            "@ !",
            " VARIABLE V 789 V ! : MAIN V @ U. 123 456 V ! U. V @ U. ESP.DONE ; ".to_string(),
            "789 123 456 ",
        ),
        (
            "PICK",
            wrap_main("123 456 789 2 PICK U. U. U. U."),
            "123 789 456 123 ",
        ),
        ("DEPTH", wrap_main("123 DEPTH DEPTH U. U. U."), "2 1 123 "),
        (
            "U/MOD",
            wrap_main("10 2 U/MOD U. U. 123 2 U/MOD U. U."),
            "5 0 61 1 ",
        ),
        ("NEGATE", wrap_main("-1 NEGATE U. -2 NEGATE U."), "1 2 "),
        (
            ".",
            wrap_main("0 . 1 . 2 . 3 . -1 . -2 . -3 ."),
            "0 1 2 3 -1 -2 -3 ",
        ),
        (
            "C@",
            " : MAIN [ BL WORD test ] LITERAL C@ U. ESP.DONE ; ".to_string(),
            "4 ",
        ),
        ("BASE", wrap_main("BASE @ U."), "10 "),
        ("DO", wrap_main("4 0 DO I . LOOP"), "0 1 2 3 "),
        ("+LOOP", wrap_main("10 0 DO I . 2 +LOOP"), "0 2 4 6 8 "),
        (
            "nested DO",
            wrap_main("2 0 DO 2 0 DO J . I . LOOP LOOP"),
            "0 0 0 1 1 0 1 1 ",
        ),
        (
            "BEGIN UNTIL",
            wrap_main("3 BEGIN DUP . 1- DUP 0= UNTIL DROP"),
            "3 2 1 ",
        ),
        (
            "BEGIN WHILE REPEAT",
            wrap_main("0 BEGIN DUP 3 < WHILE DUP . 1+ REPEAT DROP"),
            "0 1 2 ",
        ),
        (
            "CASE match",
            wrap_main("2 CASE 1 OF 111 U. ENDOF 2 OF 222 U. ENDOF 333 U. ENDCASE"),
            "222 ",
        ),
        (
            "CASE default",
            wrap_main("5 CASE 1 OF 111 U. ENDOF 999 U. ENDCASE"),
            "999 ",
        ),
        ("S\" TYPE", wrap_main("S\" HI\" TYPE"), "HI"),
        (".\"", wrap_main(".\" HELLO\""), "HELLO"),
        (
            "CONSTANT",
            " 42 CONSTANT ANSWER : MAIN ANSWER U. ESP.DONE ; ".to_string(),
            "42 ",
        ),
        (
            "DEFER IS",
            " DEFER GREET : HI 1 U. ; ' HI IS GREET : MAIN GREET ESP.DONE ; ".to_string(),
            "1 ",
        ),
        (
            "comparisons",
            wrap_main("1 2 < U. 2 1 < U. 1 1 = U. 1 2 = U."),
            "65535 0 65535 0 ",
        ),
        (
            "signed compare",
            wrap_main("-1 0 < U. 0 -1 < U. -2 -1 < U."),
            "65535 0 65535 ",
        ),
        ("MIN MAX", wrap_main("3 5 MIN U. 3 5 MAX U."), "3 5 "),
        ("XOR", wrap_main("0x0F0F 0x00FF XOR U."), "4080 "),
        ("empty depth", wrap_main("DEPTH U."), "0 "),
    ];
    for (name, source, expected) in tests {
        run_host(name, source, expected);
    }
}

#[test]
fn create_does_defines_new_behavior() {
    run_host(
        "CREATE DOES>",
        " : CONST2 1 CREATE LAST >BODY ! DOES> @ U. ; 7 CONST2 SEVEN : MAIN SEVEN ESP.DONE ; ",
        "7 ",
    );
}

#[test]
fn redefinition_warns_and_shadows() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" : FOO 1 U. ; : FOO 2 U. ; ").unwrap();
    assert_eq!(buf.contents(), "Redefining FOO ");
    vm.interpret(b" FOO ").unwrap();
    assert_eq!(buf.contents(), "Redefining FOO 2 ");
}

#[test]
fn recursive_countdown_completes() {
    // the deep case overflows the native stack of a default test thread,
    // the host interpreter nests a call frame per recursion step
    std::thread::Builder::new()
        .stack_size(32 * 1024 * 1024)
        .spawn(|| {
            run_host(
                "tail call countdown",
                " : countdown ( n -- )
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
                    5 countdown DEPTH U.
                    2000 countdown DEPTH U.
                    ESP.DONE
                  ; ",
                "0 0 0 ",
            );
        })
        .expect("spawn test thread")
        .join()
        .expect("countdown thread panicked");
}

#[test]
fn return_stack_depth_is_preserved() {
    // a word that unbalances the return stack is a corrupt program and
    // must surface an error instead of running off
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" : BAD R> DROP ; ").unwrap();
    assert!(vm.interpret(b" BAD ").is_err());
}

#[test]
fn interpret_mode_words_run_directly() {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(b" 1 2 + U. ").unwrap();
    assert_eq!(buf.contents(), "3 ");
}

#[test]
fn bye_sets_the_exit_state() {
    let (mut vm, _buf) = vm_with_buffer();
    vm.interpret(b" BYE 1 2 + U. ").unwrap();
    assert_eq!(
        vm.state().unwrap(),
        crucible::interpreter::State::Exit,
        "BYE should stop the outer loop before the addition runs"
    );
    assert_eq!(vm.stack.depth(), 0);
}

// primitives.rs - The primitive word catalog
//
// Each primitive carries three implementations: a host function used by the
// interpreter, a token-threaded assembly snippet with its NEXT kind, and a
// subroutine-threaded snippet. The compiler appends the matching NEXT tail
// unless a snippet is declared nonstandard.

use crate::cell::{Addr, Cell, EntryId};
use crate::dictionary::{DictionaryEntry, HostFn, SrtAsm, TokenAsm, TokenNext, WordFlags};
use crate::errors::{entry_error, pop_error, ForthError};
use crate::interpreter::{State, VirtualMachine};

struct Primitive {
    name: &'static str,
    host: HostFn,
    flags: WordFlags,
    token: &'static [&'static str],
    next: TokenNext,
    srt: &'static [&'static str],
    srt_custom: bool,
}

impl Primitive {
    fn host_only(name: &'static str, host: HostFn) -> Primitive {
        Primitive {
            name,
            host,
            flags: WordFlags::empty(),
            token: &[],
            next: TokenNext::Nonstandard,
            srt: &[],
            srt_custom: false,
        }
    }

    fn immediate(name: &'static str, host: HostFn) -> Primitive {
        Primitive {
            flags: WordFlags::IMMEDIATE,
            ..Primitive::host_only(name, host)
        }
    }
}

/// Install the whole catalog into the dictionary.
pub fn install(vm: &mut VirtualMachine) {
    for prim in catalog() {
        vm.add_primitive(
            prim.name,
            prim.host,
            TokenAsm {
                asm: prim.token.iter().map(|s| s.to_string()).collect(),
                next: prim.next,
            },
            SrtAsm {
                asm: prim.srt.iter().map(|s| s.to_string()).collect(),
                custom_next: prim.srt_custom,
            },
            prim.flags,
        );
    }
}

fn catalog() -> Vec<Primitive> {
    vec![
        Primitive::host_only(".S", prim_dot_s),
        Primitive::host_only("WORDS", prim_words),
        Primitive::host_only("--SEE", prim_see),
        Primitive::host_only("WORD", prim_word),
        Primitive::host_only("--CREATE-FORTH", prim_create_forth),
        Primitive::host_only("--CREATE-ASSEMBLY", prim_create_assembly),
        Primitive::host_only("--CREATE-ASSEMBLY-SRT", prim_create_assembly_srt),
        Primitive::host_only("--CREATE-ASSEMBLY-BOTH", prim_create_assembly_both),
        Primitive::immediate("[", prim_interpret_mode),
        Primitive::host_only("]", prim_compile_mode),
        Primitive::host_only("BYE", prim_bye),
        Primitive::host_only("LAST", prim_last),
        Primitive::host_only(">C", prim_to_control),
        Primitive::host_only("C>", prim_from_control),
        Primitive::host_only(">DO", prim_to_do),
        Primitive::host_only("DO>", prim_from_do),
        Primitive {
            name: ">R",
            host: prim_to_r,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r1, r2, __rsp",
                "add r1, r1, 1",
                "st r0, r1, 0",
                "st r1, r2, __rsp",
                "add r3, r3, 1",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "move r0, __rsp",
                "ld r1, r0, 0",
                "add r1, r1, 1",
                "st r1, r0, 0",
                "ld r0, r3, 0",
                "st r0, r1, 0",
                "add r3, r3, 1",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "R>",
            host: prim_from_r,
            flags: WordFlags::empty(),
            token: &[
                "ld r1, r2, __rsp",
                "ld r0, r1, 0",
                "sub r1, r1, 1",
                "st r1, r2, __rsp",
                "sub r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "move r0, __rsp",
                "ld r1, r0, 0",
                "sub r1, r1, 1",
                "st r1, r0, 0",
                "ld r0, r1, 1",
                "sub r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive::host_only("BRANCH", prim_branch),
        Primitive::host_only("BRANCH0", prim_branch0),
        Primitive::host_only("DEST", prim_dest),
        Primitive::host_only("RESOLVE-BRANCH", prim_resolve_branch),
        Primitive::immediate("LITERAL", prim_literal),
        Primitive::host_only("FIND-WORD", prim_find_word),
        Primitive::host_only("COMPILE,", prim_compile_comma),
        Primitive {
            name: "EXECUTE",
            host: prim_execute,
            flags: WordFlags::empty(),
            token: &["ld r0, r3, 0", "add r3, r3, 1", "jump __ins_asm"],
            next: TokenNext::Nonstandard,
            srt: &[
                "ld r0, r3, 0",
                "add r3, r3, 1",
                "jumpr __execute.0, __forth_words, ge",
                "jump r0",
                "__execute.0:",
                "move r1, __rsp",
                "ld r1, r1, 0",
                "add r1, r1, 1",
                "st r2, r1, 0",
                "move r2, __rsp",
                "st r1, r2, 0",
                "move r2, r0",
                "jump r2",
            ],
            srt_custom: true,
        },
        Primitive::host_only("ALLOCATE", prim_allocate),
        Primitive {
            name: "@",
            host: prim_fetch,
            flags: WordFlags::empty(),
            token: &["ld r0, r3, 0", "ld r0, r0, 0", "st r0, r3, 0"],
            next: TokenNext::SkipLoad,
            srt: &["ld r0, r3, 0", "ld r0, r0, 0", "st r0, r3, 0"],
            srt_custom: false,
        },
        Primitive {
            name: "!",
            host: prim_store,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "st r1, r0, 0",
                "add r3, r3, 2",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "st r1, r0, 0",
                "add r3, r3, 2",
            ],
            srt_custom: false,
        },
        Primitive {
            name: ">BODY",
            host: prim_to_body,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r0, r0, 0",
                "ld r0, r0, 0",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipLoad,
            srt: &[
                "ld r0, r3, 0",
                "ld r0, r0, 0",
                "rsh r0, r0, 4",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "C@",
            host: prim_c_fetch,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r1, r0, 0",
                "jumpr __c_ampersand.0, 0x8000, lt",
                "rsh r1, r1, 8",
                "__c_ampersand.0:",
                "and r1, r1, 0xFF",
                "st r1, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 0",
                "ld r1, r0, 0",
                "jumpr __c_ampersand.0, 0x8000, lt",
                "rsh r1, r1, 8",
                "__c_ampersand.0:",
                "and r1, r1, 0xFF",
                "st r1, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "C!",
            host: prim_c_store,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "ld r2, r0, 0",
                "jumpr __c_exclamation.0, 0x8000, lt",
                "and r2, r2, 0x00FF",
                "lsh r1, r1, 8",
                "jump __c_exclamation.1",
                "__c_exclamation.0:",
                "and r2, r2, 0xFF00",
                "and r1, r1, 0x00FF",
                "__c_exclamation.1:",
                "or r2, r2, r1",
                "st r2, r0, 0",
                "add r3, r3, 2",
            ],
            next: TokenNext::Normal,
            srt: &[
                "st r2, r3, -1",
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "ld r2, r0, 0",
                "jumpr __c_exclamation.0, 0x8000, lt",
                "and r2, r2, 0x00FF",
                "lsh r1, r1, 8",
                "jump __c_exclamation.1",
                "__c_exclamation.0:",
                "and r2, r2, 0xFF00",
                "and r1, r1, 0x00FF",
                "__c_exclamation.1:",
                "or r2, r2, r1",
                "st r2, r0, 0",
                "ld r2, r3, -1",
                "add r3, r3, 2",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "CHAR+",
            host: prim_char_plus,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "jumpr __char_plus.0, 0x8000, lt",
                "and r0, r0, 0x7FFF",
                "add r0, r0, 1",
                "jump __char_plus.1",
                "__char_plus.0:",
                "or r0, r0, 0x8000",
                "__char_plus.1:",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 0",
                "jumpr __char_plus.0, 0x8000, lt",
                "and r0, r0, 0x7FFF",
                "add r0, r0, 1",
                "jump __char_plus.1",
                "__char_plus.0:",
                "or r0, r0, 0x8000",
                "__char_plus.1:",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "ALIGNED",
            host: prim_aligned,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "jumpr __aligned.0, 0x8000, lt",
                "add r0, r0, 1",
                "and r0, r0, 0x7FFF",
                "st r0, r3, 0",
                "__aligned.0:",
            ],
            next: TokenNext::SkipLoad,
            srt: &[
                "ld r0, r3, 0",
                "jumpr __aligned.0, 0x8000, lt",
                "add r0, r0, 1",
                "and r0, r0, 0x7FFF",
                "st r0, r3, 0",
                "__aligned.0:",
            ],
            srt_custom: false,
        },
        Primitive::host_only("--POSTPONE", prim_postpone),
        Primitive::host_only("SET-HIDDEN", prim_set_hidden),
        Primitive::host_only("SET-IMMEDIATE", prim_set_immediate),
        Primitive::host_only("SET-DEFERRED", prim_set_deferred),
        Primitive::immediate("DOES>", prim_does),
        Primitive::host_only("--DOES", prim_does_patch),
        Primitive {
            name: "EXIT",
            host: prim_exit,
            flags: WordFlags::IS_EXIT,
            token: &[
                "ld r0, r2, __rsp",
                "ld r1, r0, 0",
                "sub r0, r0, 1",
                "st r0, r2, __rsp",
            ],
            next: TokenNext::SkipLoad,
            srt: &[
                "move r0, __rsp",
                "ld r1, r0, 0",
                "ld r2, r1, 0",
                "sub r1, r1, 1",
                "st r1, r0, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "+",
            host: prim_add,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "add r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "add r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "-",
            host: prim_sub,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "sub r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "sub r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "AND",
            host: prim_and,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "and r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "and r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "OR",
            host: prim_or,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "or r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "or r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "*",
            host: prim_mul,
            flags: WordFlags::empty(),
            token: &[
                "ld r1, r3, 1",
                "ld r0, r3, 0",
                "st r2, r3, 1",
                "__mult.0:",
                "and r2, r0, 1",
                "jump __mult.1, eq",
                "ld r2, r3, 1",
                "add r2, r2, r1",
                "st r2, r3, 1",
                "__mult.1:",
                "lsh r1, r1, 1",
                "rsh r0, r0, 1",
                "jumpr __mult.0, 0, gt",
                "add r3, r3, 1",
            ],
            next: TokenNext::Normal,
            srt: &[
                "st r2, r3, -1",
                "ld r1, r3, 1",
                "ld r0, r3, 0",
                "move r2, 0",
                "st r2, r3, 1",
                "__mult.0:",
                "and r2, r0, 1",
                "jump __mult.1, eq",
                "ld r2, r3, 1",
                "add r2, r2, r1",
                "st r2, r3, 1",
                "__mult.1:",
                "lsh r1, r1, 1",
                "rsh r0, r0, 1",
                "jumpr __mult.0, 0, gt",
                "ld r2, r3, -1",
                "add r3, r3, 1",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "U/MOD",
            host: prim_u_div_mod,
            flags: WordFlags::empty(),
            token: &[
                "stage_rst",
                "__divmod.0:",
                "lsh r2, r2, 1",
                "lsh r1, r1, 1",
                "ld r0, r3, 1",
                "jumpr __divmod.1, 0x8000, lt",
                "or r2, r2, 1",
                "__divmod.1:",
                "lsh r0, r0, 1",
                "st r0, r3, 1",
                "ld r0, r3, 0",
                "sub r0, r2, r0",
                "jump __divmod.2, ov",
                "move r2, r0",
                "or r1, r1, 1",
                "__divmod.2:",
                "stage_inc 1",
                "jumps __divmod.0, 16, lt",
                "st r2, r3, 1",
                "st r1, r3, 0",
            ],
            next: TokenNext::Normal,
            srt: &[
                "st r2, r3, -1",
                "move r2, 0",
                "stage_rst",
                "__divmod.0:",
                "lsh r2, r2, 1",
                "lsh r1, r1, 1",
                "ld r0, r3, 1",
                "jumpr __divmod.1, 0x8000, lt",
                "or r2, r2, 1",
                "__divmod.1:",
                "lsh r0, r0, 1",
                "st r0, r3, 1",
                "ld r0, r3, 0",
                "sub r0, r2, r0",
                "jump __divmod.2, ov",
                "move r2, r0",
                "or r1, r1, 1",
                "__divmod.2:",
                "stage_inc 1",
                "jumps __divmod.0, 16, lt",
                "st r2, r3, 1",
                "st r1, r3, 0",
                "ld r2, r3, -1",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "LSHIFT",
            host: prim_lshift,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "lsh r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "lsh r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "RSHIFT",
            host: prim_rshift,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "rsh r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "rsh r0, r0, r1",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "SWAP",
            host: prim_swap,
            flags: WordFlags::empty(),
            token: &[
                "ld r1, r3, 0",
                "ld r0, r3, 1",
                "st r1, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r1, r3, 0",
                "ld r0, r3, 1",
                "st r1, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "DUP",
            host: prim_dup,
            flags: WordFlags::empty(),
            token: &["ld r0, r3, 0", "sub r3, r3, 1", "st r0, r3, 0"],
            next: TokenNext::SkipLoad,
            srt: &["ld r0, r3, 0", "sub r3, r3, 1", "st r0, r3, 0"],
            srt_custom: false,
        },
        Primitive {
            name: "PICK",
            host: prim_pick,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "add r0, r0, r3",
                "ld r0, r0, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipLoad,
            srt: &[
                "ld r0, r3, 0",
                "add r0, r0, r3",
                "ld r0, r0, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "RPICK",
            host: prim_rpick,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r2, __rsp",
                "ld r1, r3, 0",
                "sub r0, r0, r1",
                "ld r0, r0, 0",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "move r1, 0",
                "ld r0, r1, __rsp",
                "ld r1, r3, 0",
                "sub r0, r0, r1",
                "ld r0, r0, 0",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "ROT",
            host: prim_rot,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "st r0, r3, 1",
                "ld r0, r3, 2",
                "st r1, r3, 2",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 0",
                "ld r1, r3, 1",
                "st r0, r3, 1",
                "ld r0, r3, 2",
                "st r1, r3, 2",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "DROP",
            host: prim_drop,
            flags: WordFlags::empty(),
            token: &["add r3, r3, 1"],
            next: TokenNext::SkipLoad,
            srt: &["add r3, r3, 1"],
            srt_custom: false,
        },
        Primitive {
            name: "LOOPCHECK",
            host: prim_loopcheck,
            flags: WordFlags::empty(),
            token: &[
                "ld r2, r2, __rsp",
                "ld r0, r2, 0",
                "ld r1, r3, 0",
                "add r1, r1, r0",
                "st r1, r2, 0",
                "ld r1, r2, -1",
                "sub r1, r0, r1",
                "ld r0, r3, 0",
                "move r2, 0",
                "jumpr __loopcheck.0, 0x7FFF, gt",
                "add r1, r1, r0",
                "jump __loopcheck.1",
                "__loopcheck.0:",
                "sub r0, r2, r0",
                "sub r1, r1, r0",
                "__loopcheck.1:",
                "move r0, 0xFFFF",
                "jump __loopcheck.2, ov",
                "move r0, 0",
                "__loopcheck.2:",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "st r2, r3, -1",
                "move r2, __rsp",
                "ld r2, r2, 0",
                "ld r0, r2, 0",
                "ld r1, r3, 0",
                "add r1, r1, r0",
                "st r1, r2, 0",
                "ld r1, r2, -1",
                "sub r1, r0, r1",
                "ld r0, r3, 0",
                "jumpr __loopcheck.0, 0x7FFF, gt",
                "add r1, r1, r0",
                "jump __loopcheck.1",
                "__loopcheck.0:",
                "move r2, 0",
                "sub r0, r2, r0",
                "sub r1, r1, r0",
                "__loopcheck.1:",
                "move r0, 0xFFFF",
                "jump __loopcheck.2, ov",
                "move r0, 0",
                "__loopcheck.2:",
                "ld r2, r3, -1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "U<",
            host: prim_u_less,
            flags: WordFlags::empty(),
            token: &[
                "ld r1, r3, 1",
                "ld r0, r3, 0",
                "sub r1, r1, r0",
                "move r0, 0xFFFF",
                "jump __u_lessthan.0, ov",
                "move r0, 0",
                "__u_lessthan.0:",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r1, r3, 1",
                "ld r0, r3, 0",
                "sub r1, r1, r0",
                "move r0, 0xFFFF",
                "jump __u_lessthan.0, ov",
                "move r0, 0",
                "__u_lessthan.0:",
                "add r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "DEPTH",
            host: prim_depth,
            flags: WordFlags::empty(),
            token: &[
                "move r0, __stack_end",
                "sub r0, r0, r3",
                "sub r3, r3, 1",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipLoad,
            srt: &[
                "move r0, __stack_end",
                "sub r0, r0, r3",
                "sub r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "VM.STACK.INIT",
            host: prim_stack_init,
            flags: WordFlags::empty(),
            token: &["move r3, __stack_end"],
            next: TokenNext::SkipLoad,
            srt: &["move r3, __stack_end"],
            srt_custom: false,
        },
        Primitive {
            name: "HALT",
            host: prim_not_implemented,
            flags: WordFlags::empty(),
            token: &["halt"],
            next: TokenNext::Nonstandard,
            srt: &["add r2, r2, 1", "halt"],
            srt_custom: true,
        },
        Primitive {
            name: "ESP.FUNC.UNSAFE",
            host: prim_esp_func,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 1",
                "ld r1, r3, 0",
                "st r0, r2, HOST_PARAM0",
                "st r1, r2, HOST_FUNC",
                "add r3, r3, 2",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "move r1, 0",
                "ld r0, r3, 1",
                "st r0, r1, HOST_PARAM0",
                "ld r0, r3, 0",
                "st r0, r1, HOST_FUNC",
                "add r3, r3, 2",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "ESP.FUNC.READ.UNSAFE",
            host: prim_esp_func_read,
            flags: WordFlags::empty(),
            token: &["ld r0, r2, HOST_FUNC", "sub r3, r3, 1", "st r0, r3, 0"],
            next: TokenNext::SkipLoad,
            srt: &[
                "move r0, HOST_FUNC",
                "ld r0, r0, 0",
                "sub r3, r3, 1",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "MUTEX.TAKE",
            host: prim_nop,
            flags: WordFlags::empty(),
            token: &[
                "move r0, 1",
                "st r0, r2, MUTEX_FLAG0",
                "st r0, r2, MUTEX_TURN",
                "__mutex.take.0:",
                "ld r0, r2, MUTEX_FLAG1",
                "jumpr __mutex.take.1, 1, lt",
                "ld r0, r2, MUTEX_TURN",
                "jumpr __mutex.take.0, 0, gt",
                "__mutex.take.1:",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "move r1, 0",
                "move r0, 1",
                "st r0, r1, MUTEX_FLAG0",
                "st r0, r1, MUTEX_TURN",
                "__mutex.take.0:",
                "ld r0, r1, MUTEX_FLAG1",
                "jumpr __mutex.take.1, 1, lt",
                "ld r0, r1, MUTEX_TURN",
                "jumpr __mutex.take.0, 0, gt",
                "__mutex.take.1:",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "MUTEX.GIVE",
            host: prim_nop,
            flags: WordFlags::empty(),
            token: &["st r2, r2, MUTEX_FLAG0"],
            next: TokenNext::SkipLoad,
            srt: &["move r0, 0", "st r0, r0, MUTEX_FLAG0"],
            srt_custom: false,
        },
        Primitive {
            name: "D-",
            host: prim_d_sub,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 3",
                "ld r1, r3, 1",
                "sub r0, r0, r1",
                "st r0, r3, 3",
                "ld r0, r3, 2",
                "ld r1, r3, 0",
                "jump __d_minus.0, ov",
                "jump __d_minus.1",
                "__d_minus.0:",
                "sub r0, r0, 1",
                "__d_minus.1:",
                "sub r0, r0, r1",
                "add r3, r3, 2",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 3",
                "ld r1, r3, 1",
                "sub r0, r0, r1",
                "st r0, r3, 3",
                "ld r0, r3, 2",
                "ld r1, r3, 0",
                "jump __d_minus.0, ov",
                "jump __d_minus.1",
                "__d_minus.0:",
                "sub r0, r0, 1",
                "__d_minus.1:",
                "sub r0, r0, r1",
                "add r3, r3, 2",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
        Primitive {
            name: "D+",
            host: prim_d_add,
            flags: WordFlags::empty(),
            token: &[
                "ld r0, r3, 3",
                "ld r1, r3, 1",
                "add r0, r0, r1",
                "st r0, r3, 3",
                "ld r0, r3, 2",
                "ld r1, r3, 0",
                "jump __d_plus.0, ov",
                "jump __d_plus.1",
                "__d_plus.0:",
                "add r0, r0, 1",
                "__d_plus.1:",
                "add r0, r0, r1",
                "add r3, r3, 2",
                "st r0, r3, 0",
            ],
            next: TokenNext::SkipR2,
            srt: &[
                "ld r0, r3, 3",
                "ld r1, r3, 1",
                "add r0, r0, r1",
                "st r0, r3, 3",
                "ld r0, r3, 2",
                "ld r1, r3, 0",
                "jump __d_plus.0, ov",
                "jump __d_plus.1",
                "__d_plus.0:",
                "add r0, r0, 1",
                "__d_plus.1:",
                "add r0, r0, r1",
                "add r3, r3, 2",
                "st r0, r3, 0",
            ],
            srt_custom: false,
        },
    ]
}

// ============================================================================
// HOST IMPLEMENTATIONS
// ============================================================================

fn ename(vm: &VirtualMachine, entry: EntryId) -> String {
    vm.dictionary.name(entry).to_string()
}

fn prim_not_implemented(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    Err(entry_error(
        &ename(vm, entry),
        "cannot be executed on the host",
    ))
}

fn prim_nop(_vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    Ok(())
}

fn pop_addr(vm: &mut VirtualMachine, name: &str) -> Result<Addr, ForthError> {
    match vm.stack.pop().map_err(|e| pop_error(e, name))? {
        Cell::Address(addr) => Ok(addr),
        other => Err(entry_error(
            name,
            format!("requires an address cell, found {}", vm.describe_cell(&other)),
        )),
    }
}

/// Pop a counted-string address and read it back as text.
fn parse_name_arg(vm: &mut VirtualMachine, name: &str) -> Result<String, ForthError> {
    let addr = pop_addr(vm, name)?;
    vm.dictionary
        .counted_string(addr)
        .map_err(|e| e.in_entry(name, "could not parse name"))
}

/// Pop a count and that many string or number pieces, reassembling the
/// assembly text with backslash escapes expanded.
fn parse_assembly_arg(vm: &mut VirtualMachine, name: &str) -> Result<Vec<String>, ForthError> {
    let count = vm
        .stack
        .pop_number()
        .map_err(|e| e.in_entry(name, "count argument requires a number"))?;
    let mut parts = Vec::new();
    for _ in 0..count {
        let cell = vm.stack.pop().map_err(|e| pop_error(e, name))?;
        match cell {
            Cell::Address(addr) => parts.push(
                vm.dictionary
                    .counted_string(addr)
                    .map_err(|e| e.in_entry(name, "could not convert input to string"))?,
            ),
            Cell::Number(n) => parts.push(n.to_string()),
            other => {
                return Err(entry_error(
                    name,
                    format!("unknown argument type {}", vm.describe_cell(&other)),
                ))
            }
        }
    }
    parts.reverse();
    let joined = parts.concat().replace("\\r", "\r").replace("\\n", "\n");
    Ok(joined.split('\n').map(|line| line.to_string()).collect())
}

fn prim_dot_s(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let items: Vec<String> = vm
        .stack
        .items()
        .iter()
        .map(|cell| vm.describe_cell(cell))
        .collect();
    vm.write_out(&format!("[{}]", items.join(" ")))
}

fn prim_words(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let mut text = String::from("\n");
    for id in vm.dictionary.listed().iter().rev() {
        let name = vm.dictionary.name(*id);
        if !name.is_empty() {
            text.push_str(name);
            text.push(' ');
        }
    }
    vm.write_out(&text)
}

fn prim_see(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let target = parse_name_arg(vm, &name)?;
    let found = vm
        .dictionary
        .find_name(&target)
        .map_err(|e| e.in_entry(&name, "could not find word"))?;
    let details = match &vm.dictionary.entry(found).word {
        crate::dictionary::Word::Composite(word) => {
            let cells: Vec<String> = word.cells.iter().map(|c| vm.describe_cell(c)).collect();
            cells.join(" ")
        }
        crate::dictionary::Word::Primitive(_) => "<primitive>".to_string(),
    };
    vm.write_out(&format!("\n{}: {}", target, details))
}

fn prim_word(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let delimiter = vm
        .stack
        .pop_number()
        .map_err(|e| e.in_entry(&name, "could not pop delimiter"))?;
    let bytes = vm.parse_area.word(delimiter as u8, false);
    let cells = crate::cell::bytes_to_cells(&bytes, true);
    let data = vm
        .dictionary
        .alloc(DictionaryEntry::data("", cells, WordFlags::empty()));
    vm.stack.push(Cell::Address(Addr::new(data)));
    Ok(())
}

fn prim_create_forth(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let new_name = parse_name_arg(vm, &name)?;
    if vm.dictionary.resolves(&new_name) {
        vm.write_out(&format!("Redefining {} ", new_name))?;
    }
    vm.dictionary
        .add(DictionaryEntry::composite(new_name, WordFlags::empty()));
    Ok(())
}

fn prim_create_assembly(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let new_name = parse_name_arg(vm, &name)?;
    let asm = parse_assembly_arg(vm, &name)?;
    vm.add_primitive(
        &new_name,
        prim_not_implemented,
        TokenAsm {
            asm,
            next: TokenNext::Nonstandard,
        },
        SrtAsm::default(),
        WordFlags::empty(),
    );
    Ok(())
}

fn prim_create_assembly_srt(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let new_name = parse_name_arg(vm, &name)?;
    let asm = parse_assembly_arg(vm, &name)?;
    vm.add_primitive(
        &new_name,
        prim_not_implemented,
        TokenAsm::default(),
        SrtAsm {
            asm,
            custom_next: true,
        },
        WordFlags::empty(),
    );
    Ok(())
}

fn prim_create_assembly_both(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let new_name = parse_name_arg(vm, &name)?;
    let srt = parse_assembly_arg(vm, &name)
        .map_err(|e| e.in_entry(&name, "could not parse subroutine threaded assembly"))?;
    let token = parse_assembly_arg(vm, &name)?;
    vm.add_primitive(
        &new_name,
        prim_not_implemented,
        TokenAsm {
            asm: token,
            next: TokenNext::Nonstandard,
        },
        SrtAsm {
            asm: srt,
            custom_next: true,
        },
        WordFlags::empty(),
    );
    Ok(())
}

fn prim_interpret_mode(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    vm.set_state(State::Interpret)
}

fn prim_compile_mode(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    vm.set_state(State::Compile)
}

fn prim_bye(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    vm.set_state(State::Exit)
}

fn prim_last(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let last = vm.dictionary.last()?;
    vm.stack.push(Cell::Address(Addr::new(last)));
    Ok(())
}

fn prim_to_control(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    vm.control_flow_stack.push(cell);
    Ok(())
}

fn prim_from_control(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm
        .control_flow_stack
        .pop()
        .map_err(|e| e.in_entry(&name, "could not pop from control flow stack"))?;
    vm.stack.push(cell);
    Ok(())
}

fn prim_to_do(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    vm.do_stack.push(cell);
    Ok(())
}

fn prim_from_do(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm
        .do_stack
        .pop()
        .map_err(|e| e.in_entry(&name, "could not pop from do stack"))?;
    vm.stack.push(cell);
    Ok(())
}

fn prim_to_r(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    vm.return_stack.push(cell);
    Ok(())
}

fn prim_from_r(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm
        .return_stack
        .pop()
        .map_err(|e| e.in_entry(&name, "could not pop from return stack"))?;
    vm.stack.push(cell);
    Ok(())
}

fn prim_branch(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let id = vm.new_branch();
    vm.stack.push(Cell::Branch(id));
    Ok(())
}

fn prim_branch0(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let id = vm.new_branch();
    vm.stack.push(Cell::Branch0(id));
    Ok(())
}

fn prim_dest(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let id = vm.new_dest();
    vm.stack.push(Cell::Destination(id));
    Ok(())
}

fn prim_resolve_branch(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let dest_cell = vm
        .stack
        .pop()
        .map_err(|e| e.in_entry(&name, "could not pop destination"))?;
    let branch_cell = vm
        .stack
        .pop()
        .map_err(|e| e.in_entry(&name, "could not pop branch"))?;
    let dest = match dest_cell {
        Cell::Destination(dest) => dest,
        other => {
            return Err(entry_error(
                &name,
                format!("expected a destination, found {}", vm.describe_cell(&other)),
            ))
        }
    };
    match branch_cell {
        Cell::Branch(branch) | Cell::Branch0(branch) => {
            vm.resolve_branch(branch, dest);
            Ok(())
        }
        other => Err(entry_error(
            &name,
            format!("expected a branch, found {}", vm.describe_cell(&other)),
        )),
    }
}

fn prim_literal(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let last = vm
        .dictionary
        .last_composite()
        .map_err(|e| e.in_entry(&name, "could not get last forth word"))?;
    vm.dictionary
        .push_cell(last, Cell::Literal(Box::new(cell)))?;
    Ok(())
}

fn prim_find_word(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let target = parse_name_arg(vm, &name)?;
    let found = vm
        .dictionary
        .find_name(&target)
        .map_err(|e| e.in_entry(&name, format!("could not find name: {}", target)))?;
    vm.stack.push(Cell::Address(Addr::new(found)));
    Ok(())
}

fn prim_compile_comma(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let last = vm
        .dictionary
        .last_composite()
        .map_err(|e| e.in_entry(&name, "could not get last forth word"))?;
    let dest = match &cell {
        Cell::Destination(dest) => Some(*dest),
        _ => None,
    };
    vm.dictionary.push_cell(last, cell)?;
    if let Some(dest) = dest {
        let offset = vm.dictionary.composite(last)?.cells.len() as isize - 1;
        vm.set_dest_addr(
            dest,
            Addr {
                entry: last,
                offset,
                upper: false,
            },
        );
    }
    Ok(())
}

fn prim_execute(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    match cell {
        Cell::Address(_) => cell
            .execute(vm)
            .map_err(|e| e.in_entry(&name, "error while executing")),
        other => Err(entry_error(
            &name,
            format!("unable to execute cell {}", vm.describe_cell(&other)),
        )),
    }
}

fn prim_allocate(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let count = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let cells = vec![Cell::Number(0); count as usize];
    // the data block never enters the dictionary proper, it is only
    // reachable through the address handed back
    let data = vm
        .dictionary
        .alloc(DictionaryEntry::data("", cells, WordFlags::empty()));
    vm.stack.push(Cell::Address(Addr::new(data)));
    vm.stack.push(Cell::Number(0));
    Ok(())
}

fn prim_fetch(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = match vm.stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => addr,
        other => {
            return Err(entry_error(
                &name,
                format!(
                    "can only read address cells, found {}",
                    vm.describe_cell(&other)
                ),
            ))
        }
    };
    let word = vm
        .dictionary
        .composite(addr.entry)
        .map_err(|e| e.in_entry(&name, "can only read forth data words"))?;
    if addr.offset < 0 || addr.offset >= word.cells.len() as isize {
        return Err(entry_error(
            &name,
            format!("reading outside of data range, offset {}", addr.offset),
        ));
    }
    let cell = word.cells[addr.offset as usize].clone();
    vm.stack.push(cell);
    Ok(())
}

fn prim_store(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = match vm.stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => addr,
        other => {
            return Err(entry_error(
                &name,
                format!(
                    "can only write address cells, found {}",
                    vm.describe_cell(&other)
                ),
            ))
        }
    };
    let value = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let word = vm
        .dictionary
        .composite_mut(addr.entry)
        .map_err(|e| e.in_entry(&name, "can only write forth data words"))?;
    if addr.offset < 0 || addr.offset >= word.cells.len() as isize {
        return Err(entry_error(
            &name,
            format!("writing outside of data range, offset {}", addr.offset),
        ));
    }
    word.cells[addr.offset as usize] = value;
    Ok(())
}

fn prim_to_body(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = pop_addr(vm, &name)?;
    let word = vm
        .dictionary
        .composite(addr.entry)
        .map_err(|e| e.in_entry(&name, "requires a forth word"))?;
    match word.cells.first() {
        Some(Cell::Literal(inner)) => match **inner {
            Cell::Address(body) => {
                vm.stack.push(Cell::Address(body));
                Ok(())
            }
            _ => Err(entry_error(
                &name,
                "did not find an address, was this word defined by DEFER ?",
            )),
        },
        _ => Err(entry_error(
            &name,
            "did not find a cell literal, was this word defined by DEFER ?",
        )),
    }
}

fn prim_c_fetch(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = match vm.stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => addr,
        other => {
            return Err(entry_error(
                &name,
                format!(
                    "can only read address cells, found {}",
                    vm.describe_cell(&other)
                ),
            ))
        }
    };
    let word = vm
        .dictionary
        .composite(addr.entry)
        .map_err(|e| e.in_entry(&name, "can only read forth data words"))?;
    if addr.offset < 0 || addr.offset >= word.cells.len() as isize {
        return Err(entry_error(
            &name,
            format!("reading outside of data range, offset {}", addr.offset),
        ));
    }
    let stored = match word.cells[addr.offset as usize] {
        Cell::Number(n) => n,
        ref other => {
            return Err(entry_error(
                &name,
                format!("can only read a number, found {}", vm.describe_cell(other)),
            ))
        }
    };
    let lane = if addr.upper { stored >> 8 } else { stored };
    vm.stack.push(Cell::Number(lane & 0xFF));
    Ok(())
}

fn prim_c_store(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = match vm.stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => addr,
        other => {
            return Err(entry_error(
                &name,
                format!(
                    "can only write address cells, found {}",
                    vm.describe_cell(&other)
                ),
            ))
        }
    };
    let value = vm.stack.pop_number().map_err(|e| pop_error(e, &name))? & 0xFF;
    let stored = {
        let word = vm
            .dictionary
            .composite(addr.entry)
            .map_err(|e| e.in_entry(&name, "can only write forth data words"))?;
        if addr.offset < 0 || addr.offset >= word.cells.len() as isize {
            return Err(entry_error(
                &name,
                format!("writing outside of data range, offset {}", addr.offset),
            ));
        }
        word.cells[addr.offset as usize].clone()
    };
    let stored = match stored {
        Cell::Number(n) => n,
        other => {
            return Err(entry_error(
                &name,
                format!("can only write a number, found {}", vm.describe_cell(&other)),
            ))
        }
    };
    let merged = if addr.upper {
        (stored & 0x00FF) | (value << 8)
    } else {
        (stored & 0xFF00) | value
    };
    let word = vm
        .dictionary
        .composite_mut(addr.entry)
        .map_err(|e| e.in_entry(&name, "can only write forth data words"))?;
    word.cells[addr.offset as usize] = Cell::Number(merged);
    Ok(())
}

fn prim_char_plus(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = match vm.stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => addr,
        other => {
            return Err(entry_error(
                &name,
                format!("cannot advance {}", vm.describe_cell(&other)),
            ))
        }
    };
    let next = if addr.upper {
        Addr {
            entry: addr.entry,
            offset: addr.offset + 1,
            upper: false,
        }
    } else {
        Addr {
            entry: addr.entry,
            offset: addr.offset,
            upper: true,
        }
    };
    vm.stack.push(Cell::Address(next));
    Ok(())
}

fn prim_aligned(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = match vm.stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => addr,
        other => {
            return Err(entry_error(
                &name,
                format!("cannot align {}", vm.describe_cell(&other)),
            ))
        }
    };
    let aligned = Addr {
        entry: addr.entry,
        offset: addr.offset + if addr.upper { 1 } else { 0 },
        upper: false,
    };
    vm.stack.push(Cell::Address(aligned));
    Ok(())
}

fn prim_postpone(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = pop_addr(vm, &name)?;
    let last = vm
        .dictionary
        .last_composite()
        .map_err(|e| e.in_entry(&name, "could not get last forth word"))?;
    if vm
        .dictionary
        .entry(addr.entry)
        .flags
        .contains(WordFlags::IMMEDIATE)
    {
        vm.dictionary.push_cell(last, Cell::Address(addr))?;
    } else {
        let compile = vm
            .dictionary
            .find_name("COMPILE,")
            .map_err(|e| e.in_entry(&name, "requires the word COMPILE,"))?;
        vm.dictionary
            .push_cell(last, Cell::Literal(Box::new(Cell::Address(addr))))?;
        vm.dictionary
            .push_cell(last, Cell::Address(Addr::new(compile)))?;
    }
    Ok(())
}

fn set_flag(vm: &mut VirtualMachine, entry: EntryId, flag: WordFlags) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let addr = pop_addr(vm, &name)?;
    let value = vm
        .stack
        .pop_number()
        .map_err(|e| e.in_entry(&name, "could not get boolean"))?;
    let flags = &mut vm.dictionary.entry_mut(addr.entry).flags;
    if value != 0 {
        flags.insert(flag);
    } else {
        flags.remove(flag);
    }
    Ok(())
}

fn prim_set_hidden(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    set_flag(vm, entry, WordFlags::HIDDEN)
}

fn prim_set_immediate(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    set_flag(vm, entry, WordFlags::IMMEDIATE)
}

fn prim_set_deferred(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    set_flag(vm, entry, WordFlags::IS_DEFERRED)
}

/// DOES> runs while a defining word is being compiled. The remainder of
/// the definition goes into a fresh hidden composite; the defining word
/// gets the patch sequence that rebinds the created word at runtime.
fn prim_does(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let defining = vm
        .dictionary
        .last_composite()
        .map_err(|e| e.in_entry(&name, "must be used inside a definition"))?;
    let patch = vm.dictionary.find_name("--DOES")?;
    let exit = vm.dictionary.find_name("EXIT")?;
    vm.dictionary
        .entry_mut(defining)
        .flags
        .remove(WordFlags::HIDDEN);
    let code = vm
        .dictionary
        .add(DictionaryEntry::composite("", WordFlags::HIDDEN));
    vm.dictionary.push_cell(
        defining,
        Cell::Literal(Box::new(Cell::Address(Addr::new(code)))),
    )?;
    vm.dictionary
        .push_cell(defining, Cell::Address(Addr::new(patch)))?;
    vm.dictionary
        .push_cell(defining, Cell::Address(Addr::new(exit)))?;
    Ok(())
}

/// The runtime half of DOES>: rewrite the created word so it pushes its
/// data address and then runs the code after DOES>.
fn prim_does_patch(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let code = pop_addr(vm, &name)?;
    let created = vm
        .dictionary
        .last_composite()
        .map_err(|e| e.in_entry(&name, "could not get last forth word"))?;
    let exit = vm.dictionary.find_name("EXIT")?;
    let first = vm.dictionary.composite(created)?.cells.first().cloned();
    match first {
        Some(first @ Cell::Literal(_)) => {
            vm.dictionary.composite_mut(created)?.cells =
                vec![first, Cell::Address(code), Cell::Address(Addr::new(exit))];
            Ok(())
        }
        _ => Err(entry_error(&name, "requires a created word")),
    }
}

fn prim_exit(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    match vm.return_stack.pop().map_err(|e| pop_error(e, &name))? {
        Cell::Address(addr) => {
            vm.ip = Some(addr);
            Ok(())
        }
        // the host pushed a zero in place of an address at the top level
        Cell::Number(0) => {
            vm.ip = None;
            Ok(())
        }
        other => Err(entry_error(
            &name,
            format!(
                "requires a return address, found {}",
                vm.describe_cell(&other)
            ),
        )),
    }
}

fn prim_add(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let result = match (&left, &right) {
        (Cell::Number(l), Cell::Number(r)) => Cell::Number(l.wrapping_add(*r)),
        (Cell::Address(l), Cell::Number(r)) => Cell::Address(Addr {
            entry: l.entry,
            offset: l.offset + *r as isize,
            upper: false,
        }),
        (Cell::Number(l), Cell::Address(r)) => Cell::Address(Addr {
            entry: r.entry,
            offset: r.offset + *l as isize,
            upper: false,
        }),
        _ => {
            return Err(entry_error(
                &name,
                format!(
                    "could not add {} and {} due to types",
                    vm.describe_cell(&left),
                    vm.describe_cell(&right)
                ),
            ))
        }
    };
    vm.stack.push(result);
    Ok(())
}

fn prim_sub(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let result = match (&left, &right) {
        (Cell::Number(l), Cell::Number(r)) => Cell::Number(l.wrapping_sub(*r)),
        (Cell::Address(l), Cell::Number(r)) => Cell::Address(Addr {
            entry: l.entry,
            offset: l.offset - *r as isize,
            upper: false,
        }),
        (Cell::Address(l), Cell::Address(r)) if l.entry == r.entry => {
            Cell::Number((l.offset as u16).wrapping_sub(r.offset as u16))
        }
        _ => {
            return Err(entry_error(
                &name,
                format!(
                    "could not subtract {} from {} due to types",
                    vm.describe_cell(&right),
                    vm.describe_cell(&left)
                ),
            ))
        }
    };
    vm.stack.push(result);
    Ok(())
}

fn prim_and(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    vm.stack.push(Cell::Number(left & right));
    Ok(())
}

fn prim_or(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    vm.stack.push(Cell::Number(left | right));
    Ok(())
}

fn prim_mul(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    vm.stack.push(Cell::Number(left.wrapping_mul(right)));
    Ok(())
}

fn prim_u_div_mod(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    if right == 0 {
        return Err(entry_error(&name, "division by zero"));
    }
    vm.stack.push(Cell::Number(left % right));
    vm.stack.push(Cell::Number(left / right));
    Ok(())
}

fn prim_lshift(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let amount = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let num = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    vm.stack
        .push(Cell::Number(num.checked_shl(u32::from(amount)).unwrap_or(0)));
    Ok(())
}

fn prim_rshift(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let amount = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let num = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    vm.stack
        .push(Cell::Number(num.checked_shr(u32::from(amount)).unwrap_or(0)));
    Ok(())
}

fn prim_swap(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    vm.stack.push(right);
    vm.stack.push(left);
    Ok(())
}

fn prim_dup(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    vm.stack.push(cell.clone());
    vm.stack.push(cell);
    Ok(())
}

fn prim_pick(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let n = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let cell = vm
        .stack
        .pick(n as usize)
        .map_err(|e| e.in_entry(&name, "could not reach that deep"))?;
    vm.stack.push(cell);
    Ok(())
}

fn prim_rpick(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let n = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let cell = vm
        .return_stack
        .pick(n as usize)
        .map_err(|e| e.in_entry(&name, "could not reach that deep"))?;
    vm.stack.push(cell);
    Ok(())
}

fn prim_rot(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let c = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let b = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    let a = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    vm.stack.push(b);
    vm.stack.push(c);
    vm.stack.push(a);
    Ok(())
}

fn prim_drop(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    Ok(())
}

/// The shared DO ... LOOP step. Pops the loop index and limit from the
/// return stack and the increment from the data stack, stores the next
/// index, and pushes all-ones once the index crosses the limit boundary.
fn prim_loopcheck(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let index = vm
        .return_stack
        .pop_number()
        .map_err(|e| pop_error(e, &name))?;
    let n = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let limit = vm
        .return_stack
        .pop_number()
        .map_err(|e| e.in_entry(&name, "could not pop from return stack"))?;
    vm.return_stack.push(Cell::Number(limit));
    vm.return_stack.push(Cell::Number(index.wrapping_add(n)));
    let ind_lim = index.wrapping_sub(limit);
    let crossed = if (n as i16) >= 0 {
        u32::from(ind_lim) + u32::from(n) > 0xFFFF
    } else {
        u32::from(ind_lim).wrapping_sub(u32::from((n as i16).unsigned_abs())) > 0xFFFF
    };
    vm.stack
        .push(Cell::Number(if crossed { 0xFFFF } else { 0 }));
    Ok(())
}

fn prim_u_less(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let right = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let left = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    vm.stack
        .push(Cell::Number(if left < right { 0xFFFF } else { 0 }));
    Ok(())
}

fn prim_depth(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    let depth = vm.stack.depth() as u16;
    vm.stack.push(Cell::Number(depth));
    Ok(())
}

fn prim_stack_init(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    vm.stack.reset();
    Ok(())
}

fn prim_esp_func(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let func = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let cell = vm.stack.pop().map_err(|e| pop_error(e, &name))?;
    match func {
        // nothing, and done
        0 | 1 => Ok(()),
        // print unsigned number
        2 => {
            let text = format!("{} ", vm.describe_cell(&cell));
            vm.write_out(&text)
        }
        // print char
        3 => match cell {
            Cell::Number(n) => vm.write_out(&((n as u8) as char).to_string()),
            other => Err(entry_error(
                &name,
                format!("expected a number, got {}", vm.describe_cell(&other)),
            )),
        },
        other => Err(entry_error(&name, format!("unknown function {}", other))),
    }
}

fn prim_esp_func_read(vm: &mut VirtualMachine, _entry: EntryId) -> Result<(), ForthError> {
    // the host performs every function immediately
    vm.stack.push(Cell::Number(0));
    Ok(())
}

fn prim_d_sub(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let y_high = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let y_low = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let x_high = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let x_low = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let y = u32::from(y_high) << 16 | u32::from(y_low);
    let x = u32::from(x_high) << 16 | u32::from(x_low);
    let z = x.wrapping_sub(y);
    vm.stack.push(Cell::Number(z as u16));
    vm.stack.push(Cell::Number((z >> 16) as u16));
    Ok(())
}

fn prim_d_add(vm: &mut VirtualMachine, entry: EntryId) -> Result<(), ForthError> {
    let name = ename(vm, entry);
    let y_high = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let y_low = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let x_high = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let x_low = vm.stack.pop_number().map_err(|e| pop_error(e, &name))?;
    let y = u32::from(y_high) << 16 | u32::from(y_low);
    let x = u32::from(x_high) << 16 | u32::from(x_low);
    let z = x.wrapping_add(y);
    vm.stack.push(Cell::Number(z as u16));
    vm.stack.push(Cell::Number((z >> 16) as u16));
    Ok(())
}

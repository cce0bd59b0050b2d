#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crucible::interpreter::VirtualMachine;

/// An output sink the test can read back after handing a clone to the
/// virtual machine.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> SharedBuf {
        SharedBuf::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn vm_with_buffer() -> (VirtualMachine, SharedBuf) {
    let buf = SharedBuf::new();
    let vm = VirtualMachine::with_output(Box::new(buf.clone())).expect("vm setup failed");
    (vm, buf)
}

/// Load a program, run MAIN on the host, and compare the output.
pub fn run_host(name: &str, source: &str, expected: &str) {
    let (mut vm, buf) = vm_with_buffer();
    vm.interpret(source.as_bytes())
        .unwrap_or_else(|e| panic!("{}: failed to execute test code: {}", name, e));
    vm.interpret(b" MAIN ")
        .unwrap_or_else(|e| panic!("{}: error while running: {}", name, e));
    assert_eq!(buf.contents(), expected, "case {}", name);
}

pub fn wrap_main(code: &str) -> String {
    format!(" : MAIN {} ESP.DONE ; ", code)
}

// stack.rs - Growable stacks of cells

use crate::cell::Cell;
use crate::errors::ForthError;

/// A stack of cells. The virtual machine keeps four of these: the data
/// stack, the return stack, the control flow stack and the DO stack.
#[derive(Debug, Default)]
pub struct Stack {
    name: &'static str,
    items: Vec<Cell>,
}

impl Stack {
    pub fn new(name: &'static str) -> Stack {
        Stack {
            name,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, cell: Cell) {
        self.items.push(cell);
    }

    pub fn pop(&mut self) -> Result<Cell, ForthError> {
        self.items.pop().ok_or(ForthError::Underflow(self.name))
    }

    /// Pop a cell and require it to be a number.
    pub fn pop_number(&mut self) -> Result<u16, ForthError> {
        match self.pop()? {
            Cell::Number(n) => Ok(n),
            other => Err(ForthError::Type(format!(
                "could not convert cell to number: {:?}",
                other
            ))),
        }
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    /// Shrink the stack to the given depth. Growing is not allowed.
    pub fn set_depth(&mut self, depth: usize) -> Result<(), ForthError> {
        if depth > self.items.len() {
            return Err(ForthError::Invariant(
                "cannot arbitrarily increase stack depth".to_string(),
            ));
        }
        self.items.truncate(depth);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Copy the item `n` positions below the top.
    pub fn pick(&self, n: usize) -> Result<Cell, ForthError> {
        if n >= self.items.len() {
            return Err(ForthError::Bounds(format!("number out of range: {}", n)));
        }
        Ok(self.items[self.items.len() - n - 1].clone())
    }

    pub fn items(&self) -> &[Cell] {
        &self.items
    }
}

//! Stack emitters.
//!
//! The stack grows to the right of `STACK` as `(marker, value)` cell pairs
//! terminated by a pair whose marker is zero. `[>>]` and `[<<]` stride over
//! the non-zero marker column in steps of two, so locating the terminator
//! and walking back to the anchor both finish at statically known cells no
//! matter how deep the stack is.

use crate::error::Internal;
use crate::layout::Cell;

use super::{Emitter, Frag};

impl Emitter {
    /// Run `inner` with the runtime head on the terminator pair's marker
    /// cell, then walk back. The head ends on `STACK` on every path, which
    /// is what keeps the statically known position accurate across
    /// data-dependent stack depths.
    pub fn at_stack_end(&mut self, inner: &Frag) -> Result<String, Internal> {
        let inner = self.resolve(inner)?;
        let mut bf = self.move_to(Cell::Stack)?;
        bf += &format!(">>[>>]{inner}[<<]");
        Ok(bf)
    }

    /// Push a literal: plant the marker, count the value into the pair's
    /// value cell and step back onto the marker column.
    pub fn push_value(&mut self, v: u8) -> Result<String, Internal> {
        let inner = format!("+>{}<", "+".repeat(v as usize));
        self.at_stack_end(&Frag::Text(inner))
    }

    /// Push a register's value.
    ///
    /// Each unit of the register bumps the terminator pair's value cell;
    /// the marker stays zero during the drain, so the stride keeps finding
    /// the same pair, and the final emission plants its marker. The net
    /// effect is one `(1, value)` pair, with the register preserved by the
    /// non-destructive drain.
    pub fn push_register(&mut self, r: Cell) -> Result<String, Internal> {
        let mut bf = self.do_cell_times(
            r,
            &Frag::call(|e| e.at_stack_end(&Frag::Lit(">+<<<"))),
            None,
            false,
        )?;
        bf += &self.at_stack_end(&Frag::Lit("+"))?;
        Ok(bf)
    }

    /// Pop the top pair into `r`: drain its value cell into the register
    /// (walking through the anchor each step), clear its marker and stride
    /// back.
    pub fn pop_register(&mut self, r: Cell) -> Result<String, Internal> {
        let mut bf = self.set(r, 0)?;
        bf += &self.at_stack_end(&Frag::Lit("<[-<"))?;
        bf += &self.at(r, &Frag::Lit("+"))?;
        bf += &self.at_stack_end(&Frag::Lit("<]<-<<"))?;
        Ok(bf)
    }
}

//! Comparison and predicate emitters.
//!
//! Everything here funnels through [`Emitter::if_cb`]: run an emission only
//! if `CB` is non-zero, ending at a known head position on both branches.
//! That property is what lets data-dependent conditionals compose without
//! losing track of the head.

use crate::error::Internal;
use crate::layout::Cell;

use super::{Emitter, Frag, Operand};

/// Ordered comparison modes. `Gt`/`Ge` reduce to `Lt`/`Le` on swapped
/// operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpMode {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpMode {
    fn strict(self) -> bool {
        matches!(self, CmpMode::Lt | CmpMode::Gt)
    }

    fn swapped(self) -> bool {
        matches!(self, CmpMode::Gt | CmpMode::Ge)
    }

    /// Truth value for two equal operands.
    fn on_equal(self) -> u8 {
        matches!(self, CmpMode::Le | CmpMode::Ge) as u8
    }
}

impl Emitter {
    /// Execute `inner` if `CB` is non-zero.
    ///
    /// Emission, starting at `CB`: `[ inner move-to(C2) ] << [<]`. If `CB`
    /// was non-zero the loop body runs once and parks the head on `C2`
    /// (zero), so the loop exits and `<<` lands on `C0`. If `CB` was zero
    /// the head never moved; `<<` lands on `C1` (the constant 1) and `[<]`
    /// walks left to the first zero cell, which is `C0` by construction.
    /// Either way the head ends on `C0`. `CB` itself is left untouched.
    pub fn if_cb(&mut self, inner: &Frag) -> Result<String, Internal> {
        let mut bf = self.move_to(Cell::Cb)?;
        let mut body = self.resolve(inner)?;
        body += &self.move_to(Cell::C2)?;
        bf += &format!("[{body}]<<[<]");
        self.pos = self.index(Cell::C0)?;
        Ok(bf)
    }

    /// `RC := r != 0`.
    pub fn pred_not_zero(&mut self, r: Cell) -> Result<String, Internal> {
        let mut bf = self.set(Cell::Rc, 0)?;
        bf += &self.add_cell(Cell::Cb, r, false)?;
        bf += &self.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1)))?;
        bf += &self.set(Cell::Cb, 0)?;
        Ok(bf)
    }

    /// `RC := r == 0`.
    pub fn pred_zero(&mut self, r: Cell) -> Result<String, Internal> {
        let mut bf = self.set(Cell::Rc, 1)?;
        bf += &self.add_cell(Cell::Cb, r, false)?;
        bf += &self.if_cb(&Frag::call(|e| e.dec(Some(Cell::Rc), 1)))?;
        bf += &self.set(Cell::Cb, 0)?;
        Ok(bf)
    }

    /// `RC := !RC`.
    pub fn pred_not(&mut self) -> Result<String, Internal> {
        let mut bf = self.copy_cell(Cell::Cb, Cell::Rc, true)?;
        bf += &self.inc(Some(Cell::Rc), 1)?;
        bf += &self.if_cb(&Frag::call(|e| e.dec(Some(Cell::Rc), 1)))?;
        bf += &self.set(Cell::Cb, 0)?;
        Ok(bf)
    }

    /// `RC := a == b`. Comparing a register against itself is decided at
    /// compile time.
    pub fn pred_equal(&mut self, a: Cell, b: Operand) -> Result<String, Internal> {
        let mut bf = self.set(Cell::Rc, 1)?;
        match b {
            Operand::Reg(rb) if rb == a => return Ok(bf),
            Operand::Reg(rb) => {
                bf += &self.add_cell(Cell::Cb, a, false)?;
                bf += &self.sub_cell(Cell::Cb, rb, false)?;
            }
            Operand::Val(v) => {
                bf += &self.add_cell(Cell::Cb, a, false)?;
                bf += &self.dec(Some(Cell::Cb), v as usize)?;
            }
        }
        bf += &self.if_cb(&Frag::call(|e| e.dec(Some(Cell::Rc), 1)))?;
        bf += &self.set(Cell::Cb, 0)?;
        Ok(bf)
    }

    /// `RC := a != b`.
    pub fn pred_not_equal(&mut self, a: Cell, b: Operand) -> Result<String, Internal> {
        let mut bf = self.set(Cell::Rc, 0)?;
        match b {
            Operand::Reg(rb) if rb == a => return Ok(bf),
            Operand::Reg(rb) => {
                bf += &self.add_cell(Cell::Cb, a, false)?;
                bf += &self.sub_cell(Cell::Cb, rb, false)?;
            }
            Operand::Val(v) => {
                bf += &self.add_cell(Cell::Cb, a, false)?;
                bf += &self.dec(Some(Cell::Cb), v as usize)?;
            }
        }
        bf += &self.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1)))?;
        bf += &self.set(Cell::Cb, 0)?;
        Ok(bf)
    }

    /// Ordered comparison of `a` against `b`, result in `RC`.
    ///
    /// The difference protocol: copy the operands into `CA`/`CB` (swapped
    /// for the greater modes), bump `CA` for the strict modes, then drain
    /// `CA` while probing `CB`. Each probe step nets zero on `RC` while
    /// `CB` is non-zero and minus one the moment it runs dry, so `RC`
    /// (seeded with 1) survives as 1 exactly when `CB >= CA` throughout.
    pub fn comparison(&mut self, a: Cell, b: Operand, mode: CmpMode) -> Result<String, Internal> {
        if let Operand::Reg(rb) = b {
            if rb == a {
                return self.set(Cell::Rc, mode.on_equal());
            }
        }

        let mut bf = self.set(Cell::Rc, 1)?;

        let (dest_a, dest_b) = if mode.swapped() {
            (Cell::Cb, Cell::Ca)
        } else {
            (Cell::Ca, Cell::Cb)
        };
        bf += &self.add_cell(dest_a, a, false)?;
        match b {
            Operand::Reg(rb) => bf += &self.add_cell(dest_b, rb, false)?,
            Operand::Val(v) => bf += &self.inc(Some(dest_b), v as usize)?,
        }

        // the drain tests CA <= CB; for the strict modes shift to CA+1
        if mode.strict() {
            bf += &self.inc(Some(Cell::Ca), 1)?;
        }

        bf += &self.move_to(Cell::Ca)?;
        let probe = Frag::call(|e| {
            let mut s = e.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1)))?;
            s += &e.dec(Some(Cell::Rc), 1)?;
            s += &e.dec(Some(Cell::Cb), 1)?;
            Ok(s)
        });
        bf += &self.do_cell_times(Cell::Ca, &probe, None, true)?;

        bf += &self.set(Cell::Cb, 0)?;
        Ok(bf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn emitter() -> Emitter {
        Emitter::new(Layout::default())
    }

    #[test]
    fn if_cb_lands_on_c0_either_way() {
        let mut e = emitter();
        e.move_to(Cell::Rc).unwrap();
        let bf = e.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1))).unwrap();
        // from RC: two left to CB, body bumps RC and parks on C2
        assert_eq!(bf, "<<[>>+<<<]<<[<]");
        assert_eq!(e.pos(), 0);
    }

    #[test]
    fn equal_register_comparisons_fold() {
        let mut e = emitter();
        let bf = e
            .comparison(Cell::R(1), Operand::Reg(Cell::R(1)), CmpMode::Lt)
            .unwrap();
        assert_eq!(bf, ">>>>>[-]");
        let mut e = emitter();
        let bf = e
            .comparison(Cell::R(1), Operand::Reg(Cell::R(1)), CmpMode::Ge)
            .unwrap();
        assert!(bf.ends_with("[-]+"));
    }

    #[test]
    fn equal_register_predicates_fold() {
        let mut e = emitter();
        let bf = e.pred_equal(Cell::R(3), Operand::Reg(Cell::R(3))).unwrap();
        assert!(bf.ends_with("[-]+"));
        let mut e = emitter();
        let bf = e
            .pred_not_equal(Cell::R(3), Operand::Reg(Cell::R(3)))
            .unwrap();
        assert!(bf.ends_with("[-]"));
    }
}

//! Mid-level emitters: cell-count dispatch, copies, arithmetic and text
//! printing. Every operation restores its scratch cells to zero and leaves
//! the statically known head position accurate.

use crate::error::Internal;
use crate::layout::Cell;

use super::{bracketed, Emitter, Frag, Operand};

impl Emitter {
    /// Run `inner` as many times as the current contents of `count`.
    ///
    /// The destructive form clobbers `count` (faster, needs no scratch);
    /// otherwise `count` is saved to a scratch cell inside the loop and
    /// restored by a drain loop afterwards. With `dest` given, `inner` is
    /// rebased to emit at `dest` each iteration, which also steers the
    /// scratch search away from the cells the loop touches.
    pub fn do_cell_times(
        &mut self,
        count: Cell,
        inner: &Frag,
        dest: Option<Cell>,
        destructive: bool,
    ) -> Result<String, Internal> {
        if destructive {
            let mut bf = self.move_to(count)?;
            let mut body = String::from("-");
            body += &match dest {
                Some(d) => self.at(d, inner)?,
                None => self.resolve(inner)?,
            };
            body += &self.move_to(count)?;
            bf += &bracketed(&body);
            return Ok(bf);
        }

        let temp = match dest {
            None => self.closest_scratch(Some(count), None)?,
            Some(d) => self.closest_scratch(Some(d), Some(count))?,
        };
        self.with_locked(temp, |e| {
            let mut bf = e.move_to(count)?;
            let mut body = String::from("-");
            body += &e.at_str(temp, "+")?;
            body += &match dest {
                Some(d) => e.at(d, inner)?,
                None => e.resolve(inner)?,
            };
            body += &e.move_to(count)?;
            bf += &bracketed(&body);

            bf += &e.move_to(temp)?;
            let mut restore = String::from("-");
            restore += &e.at_str(count, "+")?;
            restore += &e.move_to(temp)?;
            bf += &bracketed(&restore);
            Ok(bf)
        })
    }

    /// `dest += source`. The destructive form leaves `source` at zero.
    pub fn add_cell(
        &mut self,
        dest: Cell,
        source: Cell,
        destructive: bool,
    ) -> Result<String, Internal> {
        self.do_cell_times(source, &Frag::Lit("+"), Some(dest), destructive)
    }

    /// `dest -= source`.
    pub fn sub_cell(
        &mut self,
        dest: Cell,
        source: Cell,
        destructive: bool,
    ) -> Result<String, Internal> {
        self.do_cell_times(source, &Frag::Lit("-"), Some(dest), destructive)
    }

    /// `dest = source`; a no-op when they are the same cell.
    pub fn copy_cell(
        &mut self,
        dest: Cell,
        source: Cell,
        destructive: bool,
    ) -> Result<String, Internal> {
        if dest == source {
            return Ok(String::new());
        }
        let mut bf = self.at_str(dest, "[-]")?;
        bf += &self.add_cell(dest, source, destructive)?;
        Ok(bf)
    }

    /// `dest = a * b`. When `dest` aliases `a`, or both factors are the
    /// same register, `a` is first saved into a scratch cell and the
    /// iteration runs on the copy.
    pub fn mul_cell(&mut self, dest: Cell, a: Cell, b: Operand) -> Result<String, Internal> {
        let (step, direction_cell): (Frag, Option<Cell>) = match b {
            Operand::Val(v) => (Frag::call(move |e| e.inc(Some(dest), v as usize)), None),
            Operand::Reg(rb) => (
                Frag::call(move |e| e.add_cell(dest, rb, false)),
                Some(rb),
            ),
        };

        let aliased = dest == a || matches!(b, Operand::Reg(rb) if rb == a);
        if aliased {
            let t = self.closest_scratch(Some(dest), direction_cell)?;
            self.with_locked(t, |e| {
                let mut bf = e.add_cell(t, a, false)?;
                bf += &e.set(dest, 0)?;
                bf += &e.do_cell_times(t, &step, None, true)?;
                Ok(bf)
            })
        } else {
            let mut bf = self.set(dest, 0)?;
            bf += &self.do_cell_times(a, &step, None, false)?;
            Ok(bf)
        }
    }

    /// `dest = a / b`, truncating. Division by zero yields zero, with no
    /// runtime fault: a literal zero divisor folds away entirely and a
    /// register divisor is tested through `CB` before the division loop is
    /// entered. Requires `C1` to hold 1.
    pub fn div_cell(&mut self, dest: Cell, a: Cell, b: Operand) -> Result<String, Internal> {
        if b == Operand::Val(0) {
            return self.set(dest, 0);
        }

        let t = self.closest_scratch(Some(Cell::Ca), None)?;
        self.with_locked(t, |e| {
            let mut bf = String::new();
            if dest == a {
                bf += &e.copy_cell(t, a, false)?;
            }
            bf += &e.set(dest, 0)?;

            match b {
                Operand::Val(v) => {
                    bf += &e.set(Cell::Rc, 1)?;
                    if dest == a {
                        bf += &e.copy_cell(Cell::Cb, t, true)?;
                    } else {
                        bf += &e.copy_cell(Cell::Cb, a, false)?;
                    }
                    bf += &e.inc(Some(Cell::Ca), v as usize)?;

                    // run the loop once unconditionally and compensate;
                    // cheaper than testing the condition up front
                    bf += &e.dec(Some(dest), 1)?;
                    bf += &e.inc(Some(Cell::Cb), v as usize)?;

                    bf += &e.move_to(Cell::Rc)?;
                    bf.push('[');
                    bf += &e.inc(Some(dest), 1)?;
                    bf += &e.dec(Some(Cell::Cb), v as usize)?;
                    let probe = Frag::call(move |e| {
                        let mut s =
                            e.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1)))?;
                        s += &e.dec(Some(Cell::Rc), 1)?;
                        s += &e.dec(Some(Cell::Cb), 1)?;
                        s += &e.inc(Some(t), 1)?;
                        Ok(s)
                    });
                    bf += &e.repeat(&probe, v as usize)?;
                    bf += &e.do_cell_times(
                        t,
                        &Frag::call(|e| e.inc(Some(Cell::Cb), 1)),
                        None,
                        true,
                    )?;
                    bf += &e.move_to(Cell::Rc)?;
                    bf.push(']');

                    bf += &e.set(Cell::Ca, 0)?;
                }
                Operand::Reg(rb) => {
                    bf += &e.set(Cell::Rc, 0)?;
                    bf += &e.add_cell(Cell::Cb, rb, false)?;
                    bf += &e.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1)))?;
                    bf += &e.move_to(Cell::Rc)?;
                    bf.push('[');

                    if rb == a {
                        bf += &e.dec(None, 1)?;
                        bf += &e.inc(Some(dest), 1)?;
                    } else {
                        if dest == a {
                            bf += &e.copy_cell(Cell::Cb, t, true)?;
                        } else {
                            bf += &e.copy_cell(Cell::Cb, a, false)?;
                        }
                        bf += &e.add_cell(Cell::Ca, rb, false)?;

                        bf += &e.dec(Some(dest), 1)?;
                        bf += &e.add_cell(Cell::Cb, Cell::Ca, false)?;

                        bf += &e.move_to(Cell::Rc)?;
                        bf.push('[');
                        bf += &e.inc(Some(dest), 1)?;
                        bf += &e.sub_cell(Cell::Cb, Cell::Ca, false)?;
                        let probe = Frag::call(move |e| {
                            let mut s =
                                e.if_cb(&Frag::call(|e| e.inc(Some(Cell::Rc), 1)))?;
                            s += &e.dec(Some(Cell::Rc), 1)?;
                            s += &e.dec(Some(Cell::Cb), 1)?;
                            s += &e.inc(Some(t), 1)?;
                            Ok(s)
                        });
                        bf += &e.do_cell_times(Cell::Ca, &probe, None, true)?;
                        bf += &e.do_cell_times(
                            t,
                            &Frag::call(|e| {
                                let mut s = e.inc(Some(Cell::Ca), 1)?;
                                s += &e.inc(Some(Cell::Cb), 1)?;
                                Ok(s)
                            }),
                            None,
                            true,
                        )?;
                        bf += &e.move_to(Cell::Rc)?;
                        bf.push(']');
                        bf += &e.set(Cell::Ca, 0)?;
                    }

                    bf += &e.move_to(Cell::Rc)?;
                    bf.push(']');
                }
            }

            bf += &e.set(Cell::Cb, 0)?;
            bf += &e.set(t, 0)?;
            Ok(bf)
        })
    }

    /// Print a byte string. The head stays on the current cell; consecutive
    /// bytes are reached by deltas from the previous value and the cell is
    /// zeroed after the last write.
    pub fn print_text(&mut self, bytes: &[u8]) -> Result<String, Internal> {
        let mut bf = String::new();
        let mut cur = 0;
        for &next in bytes {
            bf += &self.set_from_to(cur, next, None)?;
            bf.push('.');
            cur = next;
        }
        bf += "[-]";
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
    fn copy_to_self_is_a_noop() {
        let mut e = emitter();
        assert_eq!(e.copy_cell(Cell::R(2), Cell::R(2), false).unwrap(), "");
        assert_eq!(e.pos(), 0);
    }

    #[test]
    fn destructive_count_loop_anchors_on_the_count_cell() {
        let mut e = emitter();
        let bf = e
            .do_cell_times(Cell::R(0), &Frag::Lit("."), None, true)
            .unwrap();
        // R0 is six cells right of the start; the body prints and returns
        assert_eq!(bf, ">>>>>>[-.]");
        assert_eq!(e.pos(), 6);
    }

    #[test]
    fn nondestructive_count_loop_restores_the_count() {
        let mut e = emitter();
        let bf = e
            .do_cell_times(Cell::R(0), &Frag::Lit("."), None, false)
            .unwrap();
        // backup lands in T1 (T0 is the direction cell and excluded)
        assert_eq!(bf, ">>>>>>[->>>+.<<<]>>>[-<<<+>>>]");
        assert_eq!(e.pos(), 9);
    }

    #[test]
    fn print_text_walks_deltas() {
        let mut e = emitter();
        let bf = e.print_text(b"AB").unwrap();
        let expected = format!("{}.+.[-]", "+".repeat(65));
        assert_eq!(bf, expected);
    }
}

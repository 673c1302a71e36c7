//! The emitter facade.
//!
//! An [`Emitter`] owns the statically known head position and the
//! scratch-lock bookkeeping and exposes every emission as a method
//! returning an appended Brainfuck fragment. The mid-level operations call
//! each other freely through `&mut self`:
//!
//! ```
//! use bfal::emit::{Emitter, Frag};
//! use bfal::{Cell, Layout};
//!
//! let mut e = Emitter::new(Layout::default());
//! let bf = e.at(Cell::R(0), &Frag::Lit("[-]")).unwrap();
//! assert_eq!(bf, ">>>>>>[-]");
//! ```

mod arith;
mod cmp;
mod stack;

pub use cmp::CmpMode;

use crate::error::Internal;
use crate::layout::{Cell, Layout};

/// A fragment argument: either Brainfuck text, or a deferred emission that
/// runs against the emitter (and moves the head) when it is resolved.
pub enum Frag {
    Lit(&'static str),
    Text(String),
    Call(Box<dyn Fn(&mut Emitter) -> Result<String, Internal>>),
}

impl Frag {
    pub fn call<F>(f: F) -> Self
    where
        F: Fn(&mut Emitter) -> Result<String, Internal> + 'static,
    {
        Frag::Call(Box::new(f))
    }
}

/// A register-or-literal operand, the `RR`/`RV` split of the source
/// language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Cell),
    Val(u8),
}

pub(crate) fn bracketed(body: &str) -> String {
    format!("[{body}]")
}

/// Tracks the head position the emitted program will have at runtime
/// immediately before the next fragment executes.
pub struct Emitter {
    layout: Layout,
    pos: usize,
    locked: Vec<Cell>,
}

impl Emitter {
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        let pos = layout.start_pos();
        Self {
            layout,
            pos,
            locked: Vec::new(),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The statically known head position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn index(&self, cell: Cell) -> Result<usize, Internal> {
        self.layout
            .index_of(cell)
            .ok_or(Internal::UnknownCell(cell))
    }

    pub(crate) fn resolve(&mut self, frag: &Frag) -> Result<String, Internal> {
        match frag {
            Frag::Lit(s) => Ok((*s).to_string()),
            Frag::Text(s) => Ok(s.clone()),
            Frag::Call(f) => f(self),
        }
    }

    /// Run `f` with `cell` locked; the lock is released on every path.
    pub(crate) fn with_locked<T>(
        &mut self,
        cell: Cell,
        f: impl FnOnce(&mut Self) -> Result<T, Internal>,
    ) -> Result<T, Internal> {
        self.locked.push(cell);
        let result = f(self);
        self.locked.pop();
        result
    }

    /// First unlocked scratch cell strictly beyond `from` in the given
    /// direction (non-negative searches rightward).
    fn find_scratch(&self, from: usize, direction: isize) -> Option<Cell> {
        let step: isize = if direction >= 0 { 1 } else { -1 };
        let cells = self.layout.cells();
        let mut i = from as isize + step;
        // the reverse search never needs to reach slot 0; nothing below the
        // comparison block is scratch
        while i > 0 && (i as usize) < cells.len() {
            let cell = cells[i as usize];
            if cell.is_scratch() && !self.locked.contains(&cell) {
                return Some(cell);
            }
            i += step;
        }
        None
    }

    /// Scratch cell closest to `anchor` (the current head cell if `None`),
    /// preferring the direction of `direction_cell`. The direction cell is
    /// excluded from the search; if nothing is free on the preferred side,
    /// the search reverses.
    pub fn closest_scratch(
        &mut self,
        anchor: Option<Cell>,
        direction_cell: Option<Cell>,
    ) -> Result<Cell, Internal> {
        let c = match anchor {
            Some(cell) => self.index(cell)?,
            None => self.pos,
        };
        let (d, direction_cell) = match direction_cell {
            Some(cell) => (self.index(cell)? as isize, cell),
            None => match self.layout.cell_at(c + 1) {
                Some(cell) => (c as isize + 1, cell),
                None => (c as isize - 1, self.layout.cells()[c - 1]),
            },
        };
        let direction = d - c as isize;

        self.locked.push(direction_cell);
        let found = self
            .find_scratch(c, direction)
            .or_else(|| self.find_scratch(c, -direction));
        self.locked.pop();

        found.ok_or(Internal::NoScratch)
    }

    /// Emit `frag` `n` times; each repetition is resolved separately so a
    /// deferred emission sees the head where the previous one left it.
    pub fn repeat(&mut self, frag: &Frag, n: usize) -> Result<String, Internal> {
        let mut bf = String::new();
        for _ in 0..n {
            bf += &self.resolve(frag)?;
        }
        Ok(bf)
    }

    /// Move the head to layout position `pos`.
    pub fn move_to_pos(&mut self, pos: usize) -> String {
        let motion = if pos < self.pos {
            "<".repeat(self.pos - pos)
        } else {
            ">".repeat(pos - self.pos)
        };
        self.pos = pos;
        motion
    }

    /// Move the head to `cell`.
    pub fn move_to(&mut self, cell: Cell) -> Result<String, Internal> {
        let pos = self.index(cell)?;
        Ok(self.move_to_pos(pos))
    }

    /// Move to `cell`, then emit `frag` there.
    pub fn at(&mut self, cell: Cell, frag: &Frag) -> Result<String, Internal> {
        let mut bf = self.move_to(cell)?;
        bf += &self.resolve(frag)?;
        Ok(bf)
    }

    pub(crate) fn at_str(&mut self, cell: Cell, raw: &str) -> Result<String, Internal> {
        let mut bf = self.move_to(cell)?;
        bf += raw;
        Ok(bf)
    }

    /// Wrap `inner` in the conditional-branch pair. The inner emission must
    /// put the head back on the cell the loop opened on; both the entry
    /// test and the back-edge test read the cell under the head.
    pub fn wrap_loop(&mut self, inner: &Frag) -> Result<String, Internal> {
        let body = self.resolve(inner)?;
        Ok(bracketed(&body))
    }

    /// `+` or `-` repeated, at `dest` or at the current head.
    pub fn inc(&mut self, dest: Option<Cell>, n: usize) -> Result<String, Internal> {
        let cmds = "+".repeat(n);
        match dest {
            Some(cell) => self.at_str(cell, &cmds),
            None => Ok(cmds),
        }
    }

    pub fn dec(&mut self, dest: Option<Cell>, n: usize) -> Result<String, Internal> {
        let cmds = "-".repeat(n);
        match dest {
            Some(cell) => self.at_str(cell, &cmds),
            None => Ok(cmds),
        }
    }

    /// Take a cell known to hold `from` to `to` along the shorter signed
    /// path modulo 256.
    pub fn set_from_to(
        &mut self,
        from: u8,
        to: u8,
        dest: Option<Cell>,
    ) -> Result<String, Internal> {
        let diff = to.wrapping_sub(from);
        if diff == 0 {
            Ok(String::new())
        } else if diff <= 128 {
            self.inc(dest, diff as usize)
        } else {
            self.dec(dest, 256 - diff as usize)
        }
    }

    /// Zero `dest`, then count it up (or down) to `val`.
    pub fn set(&mut self, dest: Cell, val: u8) -> Result<String, Internal> {
        let mut bf = self.at_str(dest, "[-]")?;
        bf += &self.set_from_to(0, val, None)?;
        Ok(bf)
    }

    /// The constants initialiser; emitted once per compilation before the
    /// first fragment.
    pub fn init_constants(&mut self) -> Result<String, Internal> {
        let mut bf = String::new();
        for (cell, val) in self.layout.constants().to_vec() {
            bf += &self.inc(Some(cell), val as usize)?;
        }
        Ok(bf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> Emitter {
        Emitter::new(Layout::default())
    }

    #[test]
    fn motion_tracks_position() {
        let mut e = emitter();
        assert_eq!(e.move_to(Cell::R(0)).unwrap(), ">>>>>>");
        assert_eq!(e.pos(), 6);
        assert_eq!(e.move_to(Cell::Rc).unwrap(), "<");
        assert_eq!(e.move_to(Cell::Rc).unwrap(), "");
    }

    #[test]
    fn set_from_to_picks_the_short_path() {
        let mut e = emitter();
        assert_eq!(e.set_from_to(0, 3, None).unwrap(), "+++");
        assert_eq!(e.set_from_to(3, 0, None).unwrap(), "---");
        assert_eq!(e.set_from_to(0, 255, None).unwrap(), "-");
        assert_eq!(e.set_from_to(250, 2, None).unwrap(), "++++++++");
        assert_eq!(e.set_from_to(7, 7, None).unwrap(), "");
        // 128 apart: the increment direction wins the tie
        assert_eq!(e.set_from_to(0, 128, None).unwrap(), "+".repeat(128));
    }

    #[test]
    fn set_zeroes_first() {
        let mut e = emitter();
        assert_eq!(e.set(Cell::Rc, 2).unwrap(), ">>>>>[-]++");
    }

    #[test]
    fn closest_scratch_prefers_the_near_side() {
        let mut e = emitter();
        // anchor R1 (index 8): the direction cell defaults to T1 and is
        // excluded, so the search lands one scratch further right
        let t = e.closest_scratch(Some(Cell::R(1)), None).unwrap();
        assert_eq!(t, Cell::T(2));
        // explicit direction towards R0 prefers the left neighbour
        let t = e
            .closest_scratch(Some(Cell::R(1)), Some(Cell::R(0)))
            .unwrap();
        assert_eq!(t, Cell::T(0));
    }

    #[test]
    fn closest_scratch_skips_locked_cells() {
        let mut e = emitter();
        e.with_locked(Cell::T(0), |e| {
            let t = e
                .closest_scratch(Some(Cell::R(1)), Some(Cell::R(0)))
                .unwrap();
            assert_eq!(t, Cell::T(1));
            Ok(())
        })
        .unwrap();
        // released again afterwards
        let t = e
            .closest_scratch(Some(Cell::R(1)), Some(Cell::R(0)))
            .unwrap();
        assert_eq!(t, Cell::T(0));
    }

    #[test]
    fn closest_scratch_reverses_at_the_layout_edge() {
        let mut e = emitter();
        let t = e.closest_scratch(Some(Cell::Stack), None).unwrap();
        assert_eq!(t, Cell::T(7));
    }

    #[test]
    fn repeat_resolves_each_iteration() {
        let mut e = emitter();
        let frag = Frag::call(|e| e.inc(Some(Cell::C1), 1));
        // first iteration moves to C1, later ones are already there
        assert_eq!(e.repeat(&frag, 3).unwrap(), ">+++");
    }

    #[test]
    fn unknown_cell_is_an_internal_error() {
        let mut e = Emitter::new(Layout::new(crate::layout::LayoutFeatures::empty()));
        assert_eq!(
            e.move_to(Cell::Stack),
            Err(Internal::UnknownCell(Cell::Stack))
        );
    }
}

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Optional capabilities of a memory layout. Earlier generations of the
    /// language shipped without the comparison block or the stack; dropping
    /// a flag removes the corresponding cells and dispatch entries and
    /// nothing else.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayoutFeatures: u8 {
        const COMPARISONS = 1 << 0;
        const STACK = 1 << 1;
    }
}

impl Default for LayoutFeatures {
    fn default() -> Self {
        Self::all()
    }
}

/// A named cell slot of the layout.
///
/// `C0..CA` form the comparison block (`C1` holds the constant 1 for the
/// whole run), `RC` is the condition register driving `IF`/`LOOP`,
/// `R0..R7` are the user registers, `T0..T7` the scratch cells and
/// `STACK`/`STACK0` anchor the stack region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    C0,
    C1,
    C2,
    Cb,
    Ca,
    Rc,
    R(u8),
    T(u8),
    Stack,
    Stack0,
}

/// Role of a cell slot within the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reserved,
    Register,
    Scratch,
    Stack,
}

impl Cell {
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            Cell::C0 | Cell::C1 | Cell::C2 | Cell::Cb | Cell::Ca | Cell::Rc => Role::Reserved,
            Cell::R(_) => Role::Register,
            Cell::T(_) => Role::Scratch,
            Cell::Stack | Cell::Stack0 => Role::Stack,
        }
    }

    #[must_use]
    pub fn is_scratch(self) -> bool {
        self.role() == Role::Scratch
    }

    /// Resolve a register name as it appears in assembly source. The
    /// condition register is addressable like any other register.
    #[must_use]
    pub fn register(name: &str) -> Option<Cell> {
        if name == "RC" {
            return Some(Cell::Rc);
        }
        let n = name.strip_prefix('R')?;
        if n.len() != 1 {
            return None;
        }
        match n.as_bytes()[0] {
            d @ b'0'..=b'7' => Some(Cell::R(d - b'0')),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::C0 => f.write_str("C0"),
            Cell::C1 => f.write_str("C1"),
            Cell::C2 => f.write_str("C2"),
            Cell::Cb => f.write_str("CB"),
            Cell::Ca => f.write_str("CA"),
            Cell::Rc => f.write_str("RC"),
            Cell::R(n) => write!(f, "R{n}"),
            Cell::T(n) => write!(f, "T{n}"),
            Cell::Stack => f.write_str("STACK"),
            Cell::Stack0 => f.write_str("STACK0"),
        }
    }
}

/// The compile-time memory layout: an ordered sequence of named cell slots,
/// the initial head position and the constants initialised at program start.
/// Immutable for the whole compilation; its ordering is part of the contract
/// with already-emitted code.
#[derive(Debug, Clone)]
pub struct Layout {
    cells: Vec<Cell>,
    constants: Vec<(Cell, u8)>,
    features: LayoutFeatures,
}

impl Layout {
    #[must_use]
    pub fn new(features: LayoutFeatures) -> Self {
        let mut cells = Vec::new();
        if features.contains(LayoutFeatures::COMPARISONS) {
            cells.extend([Cell::C0, Cell::C1, Cell::C2, Cell::Cb, Cell::Ca]);
        }
        cells.push(Cell::Rc);
        for n in 0..8 {
            cells.push(Cell::R(n));
            cells.push(Cell::T(n));
        }
        if features.contains(LayoutFeatures::STACK) {
            cells.extend([Cell::Stack, Cell::Stack0]);
        }

        let constants = if features.contains(LayoutFeatures::COMPARISONS) {
            vec![(Cell::C1, 1)]
        } else {
            Vec::new()
        };

        Self {
            cells,
            constants,
            features,
        }
    }

    /// Position of `cell` on the tape, if it exists in this layout.
    #[must_use]
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        self.cells.iter().position(|&c| c == cell)
    }

    #[must_use]
    pub fn cell_at(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// `(cell, value)` pairs initialised via increments from a zeroed tape.
    #[must_use]
    pub fn constants(&self) -> &[(Cell, u8)] {
        &self.constants
    }

    #[must_use]
    pub fn features(&self) -> LayoutFeatures {
        self.features
    }

    /// Initial head position of the tape machine.
    #[must_use]
    pub fn start_pos(&self) -> usize {
        0
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(LayoutFeatures::default())
    }
}

//! A conforming interpreter for the target tape language, used by the test
//! suite and by `bfalc --run`.
//!
//! Implementation details that matter to compiled programs:
//! - memory consists of 8-bit cells that wrap on under- and overflow
//! - negative memory addresses do not exist; leaving the tape is a fault
//! - input is line-buffered by default (a line is delivered byte-wise,
//!   terminated by `\x0A`; an empty line reads as `\x00`), or unbuffered
//!   first-byte-of-line
//! - `[-]` and `[+]` are executed as a single clear-to-zero

use std::io::{BufRead, Write};

use num_enum::TryFromPrimitive;
use thiserror::Error;

/// The eight primitives of the tape language, keyed by their source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Primitive {
    Right = b'>',
    Left = b'<',
    Inc = b'+',
    Dec = b'-',
    Out = b'.',
    In = b',',
    Open = b'[',
    Close = b']',
}

/// A loaded instruction; brackets carry their resolved jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inst {
    Right,
    Left,
    Inc,
    Dec,
    Out,
    In,
    Clear,
    Open(usize),
    Close(usize),
}

#[derive(Debug, Error)]
pub enum TapeError {
    #[error("parentheses in source do not match (too many ]'s)")]
    UnbalancedClose,
    #[error("parentheses in source do not match (too many ['s)")]
    UnbalancedOpen,
    #[error("forbidden memory access: address < 0")]
    Underflow,
    #[error("forbidden memory access: address >= {0}")]
    Overflow(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Interpreter {
    memory_size: usize,
    buffer_input: bool,
    prog: Vec<Inst>,
    /// The tape. Public so tests can seed and inspect cells directly.
    pub memory: Vec<u8>,
    /// The head.
    pub ptr: usize,
    pending_input: Vec<u8>,
    next_input: usize,
}

impl Interpreter {
    #[must_use]
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory_size,
            buffer_input: true,
            prog: Vec::new(),
            memory: vec![0; memory_size],
            ptr: 0,
            pending_input: Vec::new(),
            next_input: 0,
        }
    }

    /// Deliver only the first byte of each input line instead of buffering
    /// the whole line.
    pub fn set_buffer_input(&mut self, buffered: bool) {
        self.buffer_input = buffered;
    }

    /// Load a program. Non-primitive characters are ignored; `[-]` and
    /// `[+]` become single clear instructions; brackets are matched here so
    /// execution can never see an unbalanced program.
    pub fn load(&mut self, source: &str) -> Result<(), TapeError> {
        let filtered: String = source
            .bytes()
            .filter(|&b| Primitive::try_from(b).is_ok())
            .map(char::from)
            .collect();
        let compact = filtered.replace("[-]", "0").replace("[+]", "0");

        let mut prog = Vec::with_capacity(compact.len());
        let mut opens = Vec::new();
        for c in compact.bytes() {
            let inst = match c {
                b'0' => Inst::Clear,
                b'>' => Inst::Right,
                b'<' => Inst::Left,
                b'+' => Inst::Inc,
                b'-' => Inst::Dec,
                b'.' => Inst::Out,
                b',' => Inst::In,
                b'[' => {
                    opens.push(prog.len());
                    Inst::Open(0)
                }
                _ => {
                    let open = opens.pop().ok_or(TapeError::UnbalancedClose)?;
                    prog[open] = Inst::Open(prog.len() + 1);
                    Inst::Close(open + 1)
                }
            };
            prog.push(inst);
        }
        if !opens.is_empty() {
            return Err(TapeError::UnbalancedOpen);
        }

        self.prog = prog;
        Ok(())
    }

    /// Zero the tape and reset the head and input buffer.
    pub fn reset(&mut self) {
        self.memory = vec![0; self.memory_size];
        self.ptr = 0;
        self.pending_input.clear();
        self.next_input = 0;
    }

    /// Reset, then execute the loaded program.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), TapeError> {
        self.reset();
        self.execute(input, output)
    }

    /// Execute the loaded program on the current tape.
    pub fn execute<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), TapeError> {
        let mut pc = 0;
        while let Some(&inst) = self.prog.get(pc) {
            match inst {
                Inst::Open(target) if self.memory[self.ptr] == 0 => {
                    pc = target;
                    continue;
                }
                Inst::Close(target) if self.memory[self.ptr] != 0 => {
                    pc = target;
                    continue;
                }
                Inst::Open(_) | Inst::Close(_) => {}
                Inst::Right => {
                    self.ptr += 1;
                    if self.ptr >= self.memory_size {
                        return Err(TapeError::Overflow(self.memory_size));
                    }
                }
                Inst::Left => {
                    self.ptr = self.ptr.checked_sub(1).ok_or(TapeError::Underflow)?;
                }
                Inst::Inc => self.memory[self.ptr] = self.memory[self.ptr].wrapping_add(1),
                Inst::Dec => self.memory[self.ptr] = self.memory[self.ptr].wrapping_sub(1),
                Inst::Clear => self.memory[self.ptr] = 0,
                Inst::Out => output.write_all(&[self.memory[self.ptr]])?,
                Inst::In => self.memory[self.ptr] = self.read_byte(input)?,
            }
            pc += 1;
        }
        output.flush()?;
        Ok(())
    }

    fn read_byte<R: BufRead>(&mut self, input: &mut R) -> Result<u8, TapeError> {
        if !self.buffer_input {
            let line = read_line(input)?;
            return Ok(line.first().copied().unwrap_or(0));
        }

        if self.next_input >= self.pending_input.len() {
            let line = read_line(input)?;
            self.pending_input = if line.is_empty() {
                vec![0]
            } else {
                let mut l = line;
                l.push(0x0A);
                l
            };
            self.next_input = 0;
        }
        let byte = self.pending_input[self.next_input];
        self.next_input += 1;
        Ok(byte)
    }
}

/// One line of input without its terminator.
fn read_line<R: BufRead>(input: &mut R) -> Result<Vec<u8>, TapeError> {
    let mut line = Vec::new();
    input.read_until(b'\n', &mut line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(line)
}

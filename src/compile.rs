//! The instruction dispatcher: consumes parsed commands, routes them to the
//! emitters with literal-vs-register dispatch, manages the control-flow-end
//! stack and owns all per-compilation state.

use std::collections::HashMap;

use log::{debug, trace};

use crate::emit::{CmpMode, Emitter, Operand};
use crate::error::{Assembly, CompileError, Fault, Internal};
use crate::layout::{Cell, Layout, LayoutFeatures};
use crate::opcodes::{Opcode, OpcodeClass, OpcodeTable};
use crate::parse::{self, Arg, Command};
use crate::peephole;

/// Which end tag closes the currently open control-flow block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    EndLoop,
    EndIf,
}

/// The compiler front door. Holds the layout generation; each call to
/// [`Compiler::compile`] runs in its own session, so compilation is a pure
/// function of the source text.
#[derive(Debug, Clone)]
pub struct Compiler {
    layout: Layout,
    table: OpcodeTable,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_features(LayoutFeatures::default())
    }

    /// A compiler for a reduced layout generation. Opcodes whose cells are
    /// missing simply do not exist in the dispatch table.
    #[must_use]
    pub fn with_features(features: LayoutFeatures) -> Self {
        Self {
            layout: Layout::new(features),
            table: OpcodeTable::new(features),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Compile assembly source to a Brainfuck program.
    pub fn compile(&self, source: &str) -> Result<String, CompileError> {
        let mut session = Session::new(self.layout.clone())
            .map_err(|e| CompileError::at(0, "start of input", e.into()))?;

        for (no, line) in source.lines().enumerate() {
            let line_no = no + 1;
            let parsed = parse::parse_command(&self.table, &session.aliases, line)
                .map_err(|fault| CompileError::at(line_no, line, fault))?;
            let Some(cmd) = parsed else { continue };

            trace!("line {line_no}: {:?} {:?} {:?}", cmd.opcode, cmd.sig, cmd.args);
            session
                .step(&cmd)
                .map_err(|fault| CompileError::at(line_no, line, fault))?;
        }

        if !session.ends.is_empty() {
            let line_no = source.lines().count();
            return Err(CompileError::at(
                line_no,
                "end of input",
                Assembly::UnclosedBlock.into(),
            ));
        }

        let raw_len = session.out.len();
        let out = peephole::run(&session.out);
        debug!("compiled {} -> {} bytes (peephole)", raw_len, out.len());
        Ok(out)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by a single compilation.
struct Session {
    emitter: Emitter,
    aliases: HashMap<String, String>,
    ends: Vec<BlockEnd>,
    init: Option<String>,
    out: String,
}

fn byte(v: i64) -> u8 {
    v.rem_euclid(256) as u8
}

impl Session {
    fn new(layout: Layout) -> Result<Self, Internal> {
        let mut emitter = Emitter::new(layout);
        // prepared up front so the head model covers it; appended to the
        // output just before the first fragment of the compilation
        let init = Some(emitter.init_constants()?).filter(|bf| !bf.is_empty());
        Ok(Self {
            emitter,
            aliases: HashMap::new(),
            ends: Vec::new(),
            init,
            out: String::new(),
        })
    }

    fn step(&mut self, cmd: &Command) -> Result<(), Fault> {
        let fragment = self.dispatch(cmd)?;
        if fragment.is_empty() {
            return Ok(());
        }
        if let Some(init) = self.init.take() {
            self.out.push_str(&init);
        }
        self.out.push_str(&fragment);
        if !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        Ok(())
    }

    fn dispatch(&mut self, cmd: &Command) -> Result<String, Fault> {
        match cmd.class {
            OpcodeClass::Instruction => self.instruction(cmd),
            OpcodeClass::ControlFlowStart => self.control_flow_start(cmd),
            OpcodeClass::ControlFlowEnd => self.control_flow_end(cmd),
            OpcodeClass::Special => self.special(cmd),
        }
    }

    fn instruction(&mut self, cmd: &Command) -> Result<String, Fault> {
        use Opcode::*;

        let e = &mut self.emitter;
        let bf = match (cmd.opcode, cmd.sig.as_str()) {
            (Set, "RV") => {
                let r = cmd.reg(0)?;
                let mut bf = e.at_str(r, "[-]")?;
                bf += &e.set_from_to(0, byte(cmd.val(1)?), Some(r))?;
                bf
            }
            (Set, "RR") => e.copy_cell(cmd.reg(0)?, cmd.reg(1)?, false)?,

            (Stz, "R") => e.at_str(cmd.reg(0)?, "[-]")?,

            (Push, "V") => e.push_value(byte(cmd.val(0)?))?,
            (Push, "R") => e.push_register(cmd.reg(0)?)?,
            (Pop, "R") => e.pop_register(cmd.reg(0)?)?,

            (Input, "R") => e.at_str(cmd.reg(0)?, ",")?,
            (Output, "R") => e.at_str(cmd.reg(0)?, ".")?,

            (Inc, "R") => e.inc(Some(cmd.reg(0)?), 1)?,
            (Inc, "RV") => e.inc(Some(cmd.reg(0)?), byte(cmd.val(1)?) as usize)?,
            (Inc, "RR") => e.add_cell(cmd.reg(0)?, cmd.reg(1)?, false)?,

            (Dec, "R") => e.dec(Some(cmd.reg(0)?), 1)?,
            (Dec, "RV") => e.dec(Some(cmd.reg(0)?), byte(cmd.val(1)?) as usize)?,
            (Dec, "RR") => e.sub_cell(cmd.reg(0)?, cmd.reg(1)?, false)?,

            (Add, "RVV") => e.set(
                cmd.reg(0)?,
                byte(cmd.val(1)?.wrapping_add(cmd.val(2)?)),
            )?,
            (Add, "RRV") => {
                let mut bf = e.copy_cell(cmd.reg(0)?, cmd.reg(1)?, false)?;
                bf += &e.inc(Some(cmd.reg(0)?), byte(cmd.val(2)?) as usize)?;
                bf
            }
            (Add, "RRR") => {
                let mut bf = e.copy_cell(cmd.reg(0)?, cmd.reg(1)?, false)?;
                bf += &e.add_cell(cmd.reg(0)?, cmd.reg(2)?, false)?;
                bf
            }

            (Sub, "RVV") => e.set(
                cmd.reg(0)?,
                byte(cmd.val(1)?.wrapping_sub(cmd.val(2)?)),
            )?,
            (Sub, "RRV") => {
                let mut bf = e.copy_cell(cmd.reg(0)?, cmd.reg(1)?, false)?;
                bf += &e.dec(Some(cmd.reg(0)?), byte(cmd.val(2)?) as usize)?;
                bf
            }
            (Sub, "RRR") => {
                let mut bf = e.copy_cell(cmd.reg(0)?, cmd.reg(1)?, false)?;
                bf += &e.sub_cell(cmd.reg(0)?, cmd.reg(2)?, false)?;
                bf
            }

            (Mul, "RVV") => e.set(
                cmd.reg(0)?,
                byte(cmd.val(1)?.wrapping_mul(cmd.val(2)?)),
            )?,
            (Mul, "RRV") => e.mul_cell(cmd.reg(0)?, cmd.reg(1)?, Operand::Val(byte(cmd.val(2)?)))?,
            (Mul, "RRR") => e.mul_cell(cmd.reg(0)?, cmd.reg(1)?, Operand::Reg(cmd.reg(2)?))?,

            (Div, "RVV") => {
                let (a, b) = (byte(cmd.val(1)?), byte(cmd.val(2)?));
                let q = if b == 0 { 0 } else { a / b };
                e.set(cmd.reg(0)?, q)?
            }
            (Div, "RRV") => e.div_cell(cmd.reg(0)?, cmd.reg(1)?, Operand::Val(byte(cmd.val(2)?)))?,
            (Div, "RRR") => e.div_cell(cmd.reg(0)?, cmd.reg(1)?, Operand::Reg(cmd.reg(2)?))?,

            (True, "") => e.set(Cell::Rc, 1)?,
            (False, "") => e.set(Cell::Rc, 0)?,
            (Not, "") => e.pred_not()?,

            (NotZero, "V") => e.set(Cell::Rc, (byte(cmd.val(0)?) != 0) as u8)?,
            (NotZero, "R") => e.pred_not_zero(cmd.reg(0)?)?,
            (Zero, "V") => e.set(Cell::Rc, (byte(cmd.val(0)?) == 0) as u8)?,
            (Zero, "R") => e.pred_zero(cmd.reg(0)?)?,

            (Equal, "VV") => e.set(
                Cell::Rc,
                (byte(cmd.val(0)?) == byte(cmd.val(1)?)) as u8,
            )?,
            (Equal, "RV") => e.pred_equal(cmd.reg(0)?, Operand::Val(byte(cmd.val(1)?)))?,
            (Equal, "RR") => e.pred_equal(cmd.reg(0)?, Operand::Reg(cmd.reg(1)?))?,

            (NotEqual, "VV") => e.set(
                Cell::Rc,
                (byte(cmd.val(0)?) != byte(cmd.val(1)?)) as u8,
            )?,
            (NotEqual, "RV") => e.pred_not_equal(cmd.reg(0)?, Operand::Val(byte(cmd.val(1)?)))?,
            (NotEqual, "RR") => e.pred_not_equal(cmd.reg(0)?, Operand::Reg(cmd.reg(1)?))?,

            (Greater | GreaterEqual | Less | LessEqual, sig) => {
                let mode = match cmd.opcode {
                    Greater => CmpMode::Gt,
                    GreaterEqual => CmpMode::Ge,
                    Less => CmpMode::Lt,
                    _ => CmpMode::Le,
                };
                match sig {
                    "VV" => {
                        let (a, b) = (byte(cmd.val(0)?), byte(cmd.val(1)?));
                        let truth = match mode {
                            CmpMode::Gt => a > b,
                            CmpMode::Ge => a >= b,
                            CmpMode::Lt => a < b,
                            CmpMode::Le => a <= b,
                        };
                        e.set(Cell::Rc, truth as u8)?
                    }
                    "RV" => e.comparison(cmd.reg(0)?, Operand::Val(byte(cmd.val(1)?)), mode)?,
                    "RR" => e.comparison(cmd.reg(0)?, Operand::Reg(cmd.reg(1)?), mode)?,
                    _ => {
                        return Err(Internal::UnhandledType {
                            opcode: cmd.opcode,
                            tag: cmd.sig.clone(),
                        }
                        .into())
                    }
                }
            }

            (opcode, tag) => {
                return Err(Internal::UnhandledType {
                    opcode,
                    tag: tag.to_string(),
                }
                .into())
            }
        };
        Ok(bf)
    }

    fn control_flow_start(&mut self, cmd: &Command) -> Result<String, Fault> {
        let end = match cmd.opcode {
            Opcode::Loop => BlockEnd::EndLoop,
            Opcode::If => BlockEnd::EndIf,
            opcode => return Err(Internal::UnhandledOpcode(opcode).into()),
        };
        let mut bf = self.emitter.move_to(Cell::Rc)?;
        bf.push('[');
        self.ends.push(end);
        Ok(bf)
    }

    fn control_flow_end(&mut self, cmd: &Command) -> Result<String, Fault> {
        let expected = match cmd.opcode {
            Opcode::EndLoop => BlockEnd::EndLoop,
            Opcode::EndIf => BlockEnd::EndIf,
            opcode => return Err(Internal::UnhandledOpcode(opcode).into()),
        };
        match self.ends.pop() {
            Some(end) if end == expected => {}
            _ => return Err(Assembly::UnexpectedBlockEnd.into()),
        }

        let mut bf = match expected {
            // the loop re-tests the condition register
            BlockEnd::EndLoop => self.emitter.move_to(Cell::Rc)?,
            // a taken branch must not re-enter
            BlockEnd::EndIf => self.emitter.set(Cell::Rc, 0)?,
        };
        bf.push(']');
        Ok(bf)
    }

    fn special(&mut self, cmd: &Command) -> Result<String, Fault> {
        match cmd.opcode {
            Opcode::Alias => {
                let name = cmd.text(0)?.to_string();
                let replacement = match &cmd.args[1] {
                    Arg::Value(v) => v.to_string(),
                    Arg::Register(cell) => cell.to_string(),
                    Arg::Text(_) => return Err(Internal::BadArgument { pos: 1 }.into()),
                };
                self.aliases.insert(name, replacement);
                Ok(String::new())
            }
            Opcode::Print => {
                let bytes = parse::unescape_latin1(cmd.text(0)?)?;
                let e = &mut self.emitter;
                let t = e.closest_scratch(None, None)?;
                let mut bf = e.move_to(t)?;
                bf += &e.print_text(&bytes)?;
                Ok(bf)
            }
            opcode => Err(Internal::UnhandledOpcode(opcode).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_tape_characters_and_newlines() {
        let bf = Compiler::new()
            .compile("SET R0 65\nPRT \"Hi\"\nOUT R0\n")
            .unwrap();
        assert!(bf
            .chars()
            .all(|c| matches!(c, '>' | '<' | '+' | '-' | '.' | ',' | '[' | ']' | '\n')));
    }

    #[test]
    fn constants_precede_the_first_fragment() {
        let bf = Compiler::new().compile("SET R0 1").unwrap();
        // the C1 constant is a single increment one cell in
        assert!(bf.starts_with(">+"));
    }

    #[test]
    fn alias_only_programs_emit_nothing() {
        let bf = Compiler::new().compile("ALIAS FOO 3\n// comment").unwrap();
        assert_eq!(bf, "");
    }

    #[test]
    fn unclosed_blocks_are_user_errors() {
        let err = Compiler::new().compile("TRUE\nLOOP\nFALSE").unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn mismatched_block_ends_are_user_errors() {
        let err = Compiler::new()
            .compile("TRUE\nIF\nENDLOOP")
            .unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn commands_end_on_their_own_lines() {
        let bf = Compiler::new().compile("SET R0 1\nSET R1 2").unwrap();
        assert!(bf.ends_with('\n'));
        assert!(bf.lines().count() >= 2);
    }
}

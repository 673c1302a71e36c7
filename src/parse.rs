//! The lexical boundary: splits a line of assembly into parts, classifies
//! arguments into registers, values and text, applies aliases and produces
//! the command tuple the dispatcher consumes.

use std::collections::HashMap;

use crate::error::{Assembly, Fault, Internal};
use crate::layout::Cell;
use crate::opcodes::{Opcode, OpcodeClass, OpcodeTable};

/// A classified command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Register(Cell),
    Value(i64),
    Text(String),
}

impl Arg {
    fn kind(&self) -> char {
        match self {
            Arg::Register(_) => 'R',
            Arg::Value(_) => 'V',
            Arg::Text(_) => 'T',
        }
    }
}

/// One parsed command: class, opcode, the realised type string and up to
/// three classified arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub class: OpcodeClass,
    pub opcode: Opcode,
    pub sig: String,
    pub args: Vec<Arg>,
}

impl Command {
    pub(crate) fn reg(&self, pos: usize) -> Result<Cell, Internal> {
        match self.args.get(pos) {
            Some(Arg::Register(cell)) => Ok(*cell),
            _ => Err(Internal::BadArgument { pos }),
        }
    }

    pub(crate) fn val(&self, pos: usize) -> Result<i64, Internal> {
        match self.args.get(pos) {
            Some(Arg::Value(v)) => Ok(*v),
            _ => Err(Internal::BadArgument { pos }),
        }
    }

    pub(crate) fn text(&self, pos: usize) -> Result<&str, Internal> {
        match self.args.get(pos) {
            Some(Arg::Text(s)) => Ok(s),
            _ => Err(Internal::BadArgument { pos }),
        }
    }
}

/// Integer literal parsing with radix prefixes: `0b` binary, `0x`
/// hexadecimal, `0o` octal, decimal otherwise.
#[must_use]
pub fn lit_str_to_int(s: &str) -> Option<i64> {
    let prefix = s.get(..2).map(str::to_ascii_lowercase);
    match prefix.as_deref() {
        Some("0b") => i64::from_str_radix(&s[2..], 2).ok(),
        Some("0x") => i64::from_str_radix(&s[2..], 16).ok(),
        Some("0o") => i64::from_str_radix(&s[2..], 8).ok(),
        _ => s.parse().ok(),
    }
}

/// Split a line of assembly into its parts. Splitting occurs at whitespace;
/// blocks enclosed by quotes are one part and keep their case. Everything
/// after `//` is a comment.
pub fn split_parts(line: &str) -> Result<Vec<String>, Assembly> {
    let line = line.split("//").next().unwrap_or("");
    if line.is_empty() {
        return Ok(Vec::new());
    }

    if line.matches('"').count() % 2 != 0 {
        return Err(Assembly::UnmatchedQuote);
    }

    let mut parts = Vec::new();
    for (i, chunk) in line.split('"').enumerate() {
        if chunk.is_empty() {
            continue;
        }
        if i % 2 == 0 {
            parts.extend(
                chunk
                    .to_uppercase()
                    .split_whitespace()
                    .map(str::to_string),
            );
        } else {
            parts.push(chunk.to_string());
        }
    }
    Ok(parts)
}

/// Classify a single argument, applying the alias table first (except for
/// the `ALIAS` command itself, so aliases can be redefined).
fn parse_arg(aliases: &HashMap<String, String>, opcode: Opcode, raw: &str) -> Arg {
    let token = if opcode != Opcode::Alias {
        aliases.get(raw).map_or(raw, String::as_str)
    } else {
        raw
    };

    if let Some(cell) = Cell::register(token) {
        Arg::Register(cell)
    } else if let Some(v) = lit_str_to_int(token) {
        Arg::Value(v)
    } else {
        Arg::Text(token.to_string())
    }
}

/// The realised type string did not match any legal one; pin down whether
/// the arity is off or which argument has the wrong kind. Guaranteed to
/// return an error.
fn find_error(sig: &str, possible: &[&str], args: &[Arg]) -> Fault {
    let length = sig.len();
    let mut allowed: Vec<usize> = possible.iter().map(|t| t.len()).collect();
    allowed.sort_unstable();
    allowed.dedup();

    if !allowed.contains(&length) {
        return Assembly::WrongArity {
            found: length,
            allowed,
        }
        .into();
    }

    let candidates: Vec<&str> = possible
        .iter()
        .copied()
        .filter(|t| t.len() == length)
        .collect();

    for (pos, kind) in sig.chars().enumerate() {
        let legal: Vec<char> = {
            let mut l: Vec<char> = candidates
                .iter()
                .filter_map(|t| t.chars().nth(pos))
                .collect();
            l.sort_unstable();
            l.dedup();
            l
        };
        if legal.contains(&kind) {
            continue;
        }

        let arg = match &args[pos] {
            Arg::Register(cell) => cell.to_string(),
            Arg::Value(v) => v.to_string(),
            Arg::Text(s) => s.clone(),
        };
        let err = match legal.as_slice() {
            ['R'] => Assembly::NotARegister { pos: pos + 1, arg },
            ['V'] => Assembly::NotAValue { pos: pos + 1, arg },
            _ => Assembly::WrongArgKind { pos: pos + 1, arg },
        };
        return err.into();
    }

    Internal::ErrorDetection.into()
}

/// Parse one line of assembly. `Ok(None)` means the line is empty or a
/// comment.
pub fn parse_command(
    table: &OpcodeTable,
    aliases: &HashMap<String, String>,
    line: &str,
) -> Result<Option<Command>, Fault> {
    let parts = split_parts(line)?;
    let Some((head, rest)) = parts.split_first() else {
        return Ok(None);
    };

    let opcode = table
        .lookup(head)
        .ok_or_else(|| Assembly::UnknownOpcode(head.clone()))?;

    let args: Vec<Arg> = rest
        .iter()
        .map(|raw| parse_arg(aliases, opcode, raw))
        .collect();
    let sig: String = args.iter().map(Arg::kind).collect();

    let possible = opcode.types();
    if !possible.contains(&sig.as_str()) {
        return Err(find_error(&sig, possible, &args));
    }

    Ok(Some(Command {
        class: opcode.class(),
        opcode,
        sig,
        args,
    }))
}

fn push_latin1(bytes: &mut Vec<u8>, c: char) -> Result<(), Assembly> {
    let code = c as u32;
    if code > 0xFF {
        return Err(Assembly::NotLatin1(c));
    }
    bytes.push(code as u8);
    Ok(())
}

/// Interpret backslash escapes in a print payload and encode it as Latin-1.
pub fn unescape_latin1(text: &str) -> Result<Vec<u8>, Assembly> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            push_latin1(&mut bytes, c)?;
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('0') => bytes.push(0),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0C),
            Some('v') => bytes.push(0x0B),
            Some('\\') => bytes.push(b'\\'),
            Some('\'') => bytes.push(b'\''),
            Some('"') => bytes.push(b'"'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                match (
                    hi.and_then(|c| c.to_digit(16)),
                    lo.and_then(|c| c.to_digit(16)),
                ) {
                    (Some(hi), Some(lo)) => bytes.push((hi * 16 + lo) as u8),
                    _ => {
                        // not a \xNN escape after all; keep it verbatim
                        bytes.push(b'\\');
                        bytes.push(b'x');
                        for c in [hi, lo].into_iter().flatten() {
                            push_latin1(&mut bytes, c)?;
                        }
                    }
                }
            }
            Some(other) => {
                bytes.push(b'\\');
                push_latin1(&mut bytes, other)?;
            }
            None => bytes.push(b'\\'),
        }
    }
    Ok(bytes)
}

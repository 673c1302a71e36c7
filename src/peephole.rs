//! Peephole post-pass over the emitted program text.
//!
//! Two rewrites, repeated to fixed point: adjacent head-motion runs
//! collapse to their net motion, and runs of `[-]` separated only by
//! whitespace collapse to a single `[-]`. Print payloads are emitted as
//! deltas and write primitives, never as literal `<>[]+-` characters, so
//! rewriting the whole text is safe. Neither rewrite may change what a
//! conforming interpreter observes.

use std::sync::OnceLock;

use regex::Regex;

fn motion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(<+>+|>+<+)+").unwrap())
}

fn clear_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"((\[-\])+\s*)+").unwrap())
}

/// Replace every mixed run of `<` and `>` by its net motion.
fn collapse_motion(bf: &str) -> String {
    let mut bf = bf.to_string();
    loop {
        let found = motion_re()
            .find(&bf)
            .map(|m| (m.range(), m.as_str().to_string()));
        let Some((range, run)) = found else {
            return bf;
        };
        let right = run.bytes().filter(|&b| b == b'>').count();
        let left = run.len() - right;
        let net = if right >= left {
            ">".repeat(right - left)
        } else {
            "<".repeat(left - right)
        };
        bf.replace_range(range, &net);
    }
}

/// Collapse runs of `[-]` (possibly newline-separated) into one, keeping
/// the whitespace so line structure survives.
fn collapse_clears(bf: &str) -> String {
    clear_re()
        .replace_all(bf, |caps: &regex::Captures<'_>| {
            let ws: String = caps[0].chars().filter(|c| c.is_whitespace()).collect();
            format!("[-]{ws}")
        })
        .into_owned()
}

/// Run the post-pass. Idempotent, and observably equivalent to the input
/// on every conforming interpreter.
#[must_use]
pub fn run(bf: &str) -> String {
    let mut cur = bf.to_string();
    loop {
        let next = collapse_clears(&collapse_motion(&cur));
        if next == cur {
            return cur;
        }
        cur = next;
    }
}

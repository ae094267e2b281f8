// src/dialog.rs

//! Operator interaction capability.
//!
//! Steps that need a human decision go through the [`Dialog`] trait, so
//! the state machine can be exercised in tests with a scripted
//! implementation instead of a real terminal. Prompts are blocking and
//! operator-paced; there is no timeout.

use tracing::debug;

use crate::errors::Result;
use crate::exp::AntennaSet;

/// Answer of a three-way checkpoint around manually edited products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAnswer {
    /// Accept and continue.
    Ok,
    /// Abort the run cleanly.
    Abort,
    /// Re-run the step that produced the product.
    Repeat,
}

/// Synchronous question/answer contract with the operator.
pub trait Dialog: Send {
    /// Free-text question; the raw trimmed line is returned.
    fn ask_text(&mut self, question: &str) -> Result<String>;

    /// Yes/no question. Re-prompts until the answer is recognizable.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Choice from a closed set. Re-prompts on anything not in
    /// `accepted`, never fails on a wrong answer.
    fn choose(&mut self, question: &str, accepted: &[&str]) -> Result<String>;

    /// Three-way `ok`/`abort`/`repeat` checkpoint.
    fn checkpoint(&mut self, question: &str) -> Result<CheckAnswer> {
        let answer = self.choose(question, &["ok", "abort", "repeat"])?;
        Ok(match answer.as_str() {
            "ok" => CheckAnswer::Ok,
            "abort" => CheckAnswer::Abort,
            _ => CheckAnswer::Repeat,
        })
    }
}

/// Terminal implementation reading answers from stdin.
#[derive(Debug, Default)]
pub struct TerminalDialog;

impl TerminalDialog {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl Dialog for TerminalDialog {
    fn ask_text(&mut self, question: &str) -> Result<String> {
        println!("{question}");
        self.read_line()
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        loop {
            println!("{question} (y/n)");
            match self.read_line()?.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                other => println!("Answer '{other}' not understood."),
            }
        }
    }

    fn choose(&mut self, question: &str, accepted: &[&str]) -> Result<String> {
        loop {
            println!("{question} [{}]", accepted.join("/"));
            let answer = self.read_line()?.to_lowercase();
            if accepted.contains(&answer.as_str()) {
                return Ok(answer);
            }
            println!("Expected one of: {}.", accepted.join(", "));
        }
    }
}

/// Ask for a comma- or space-separated antenna list, re-prompting until
/// every entry is an antenna of this experiment. An empty answer means
/// "none".
pub fn ask_antennas(
    dialog: &mut dyn Dialog,
    antennas: &AntennaSet,
    question: &str,
) -> Result<Vec<String>> {
    'outer: loop {
        let answer = dialog.ask_text(question)?;
        if answer.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sep = if answer.contains(',') { ',' } else { ' ' };
        let mut picked = Vec::new();
        for raw in answer.split(sep) {
            let code = capitalize(raw.trim());
            if code.is_empty() {
                continue;
            }
            if !antennas.contains(&code) {
                debug!(antenna = %code, "antenna not in experiment; re-prompting");
                continue 'outer;
            }
            picked.push(code);
        }

        return Ok(picked);
    }
}

/// Ask for the weight-flagging threshold, re-prompting until the answer
/// is a float in `[0, 1)`.
pub fn ask_threshold(dialog: &mut dyn Dialog, question: &str) -> Result<f64> {
    loop {
        let answer = dialog.ask_text(question)?;
        match answer.trim().parse::<f64>() {
            Ok(value) if (0.0..1.0).contains(&value) => return Ok(value),
            _ => debug!(answer = %answer, "threshold outside [0, 1); re-prompting"),
        }
    }
}

fn capitalize(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

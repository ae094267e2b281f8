use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use postcorr::dialog::Dialog;
use postcorr::errors::Result;

/// A dialog that replays queued answers instead of reading a terminal,
/// and records every question it was asked.
///
/// Re-prompt semantics match the terminal implementation: an answer
/// outside the accepted set consumes one queue entry and the question is
/// asked again.
#[derive(Default)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<String>>,
    questions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers(answers: &[&str]) -> Self {
        let dialog = Self::new();
        for answer in answers {
            dialog.push_answer(answer);
        }
        dialog
    }

    pub fn push_answer(&self, answer: &str) {
        self.answers
            .lock()
            .unwrap()
            .push_back(answer.to_string());
    }

    /// Every question asked so far, in order.
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    fn next_answer(&self, question: &str) -> String {
        self.questions.lock().unwrap().push(question.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer left for question: {question}"))
    }
}

impl Dialog for ScriptedDialog {
    fn ask_text(&mut self, question: &str) -> Result<String> {
        Ok(self.next_answer(question))
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        loop {
            match self.next_answer(question).to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    fn choose(&mut self, question: &str, accepted: &[&str]) -> Result<String> {
        loop {
            let answer = self.next_answer(question).to_lowercase();
            if accepted.contains(&answer.as_str()) {
                return Ok(answer);
            }
        }
    }
}

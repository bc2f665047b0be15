//! Operator interaction: confirmations, alerts and notifications.
//!
//! Reconciliation only consumes answers. Where they come from (a terminal, a
//! dialog, a script) is up to the [`Prompt`] implementation injected by the caller.

use thiserror::Error;

/// Answer to a yes/no/cancel question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Abort the whole run.
    Cancel,
}

impl Answer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
            Answer::Cancel => "cancel",
        }
    }
}

/// The prompt surface could not produce an answer.
#[derive(Debug, Error)]
#[error("Prompt failed: {0}")]
pub struct PromptError(pub String);

/// Interactive questions asked of the operator.
pub trait Prompt {
    /// Ok/cancel style confirmation.
    fn confirm(&self, title: &str, message: &str) -> Result<bool, PromptError>;

    /// Yes/no/cancel question. `Cancel` always aborts the run.
    fn confirm_tri_state(&self, title: &str, message: &str) -> Result<Answer, PromptError>;

    /// Blocking error message the operator must acknowledge.
    fn alert(&self, title: &str, message: &str);
}

/// Fire-and-forget notifications.
pub trait Notifier {
    fn notify(&self, message: &str);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Prompt that replays scripted answers and records what it was asked.
    #[derive(Default)]
    pub(crate) struct ScriptedPrompt {
        answers: RefCell<VecDeque<Answer>>,
        pub(crate) asked: RefCell<Vec<String>>,
        pub(crate) alerts: RefCell<Vec<String>>,
    }

    impl ScriptedPrompt {
        pub(crate) fn new(answers: &[Answer]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().copied().collect()),
                ..Default::default()
            }
        }

        pub(crate) fn next(&self, title: &str) -> Answer {
            self.asked.borrow_mut().push(title.to_string());
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected prompt: {}", title))
        }
    }

    impl Prompt for ScriptedPrompt {
        fn confirm(&self, title: &str, _message: &str) -> Result<bool, PromptError> {
            Ok(self.next(title) == Answer::Yes)
        }

        fn confirm_tri_state(&self, title: &str, _message: &str) -> Result<Answer, PromptError> {
            Ok(self.next(title))
        }

        fn alert(&self, title: &str, message: &str) {
            self.alerts
                .borrow_mut()
                .push(format!("{}: {}", title, message));
        }
    }

    #[test]
    fn test_scripted_prompt_replays_in_order() {
        let prompt = ScriptedPrompt::new(&[Answer::No, Answer::Yes]);
        assert_eq!(prompt.confirm_tri_state("a", "").unwrap(), Answer::No);
        assert!(prompt.confirm("b", "").unwrap());
        assert_eq!(*prompt.asked.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_answer_as_str() {
        assert_eq!(Answer::Yes.as_str(), "yes");
        assert_eq!(Answer::No.as_str(), "no");
        assert_eq!(Answer::Cancel.as_str(), "cancel");
    }
}

//! Terminal implementations of the operator prompt and notifications.

use dialoguer::{Confirm, Input};
use log::{debug, warn};
use owo_colors::OwoColorize;
use proxy_queue::{Answer, Notifier, Prompt, PromptError};

fn show(title: &str, message: &str) {
    println!();
    println!("{}", title.bold().bright_white());
    println!("{}", message);
}

/// Asks the operator on the controlling terminal.
///
/// Tri-state questions answer Esc (or `q`) as Cancel.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&self, title: &str, message: &str) -> Result<bool, PromptError> {
        show(title, message);
        Confirm::new()
            .with_prompt("Continue?")
            .default(true)
            .interact_opt()
            .map(|answer| answer.unwrap_or(false))
            .map_err(|e| PromptError(e.to_string()))
    }

    fn confirm_tri_state(&self, title: &str, message: &str) -> Result<Answer, PromptError> {
        show(title, message);
        let answer = Confirm::new()
            .with_prompt("Yes / No (Esc to cancel)")
            .interact_opt()
            .map_err(|e| PromptError(e.to_string()))?;

        let answer = match answer {
            Some(true) => Answer::Yes,
            Some(false) => Answer::No,
            None => Answer::Cancel,
        };
        debug!("{}: answered {}", title, answer.as_str());
        Ok(answer)
    }

    fn alert(&self, title: &str, message: &str) {
        eprintln!();
        eprintln!("{} {}", "✖".red(), title.red().bold());
        eprintln!("{}", message);
        let acknowledged = Input::<String>::new()
            .with_prompt("Press ENTER to continue")
            .allow_empty(true)
            .interact_text();
        if let Err(e) = acknowledged {
            warn!("Could not wait for acknowledgement: {}", e);
        }
    }
}

/// Answers Yes to everything. Used for unattended runs.
pub struct AssumeYes;

fn assumed(title: &str, answer: Answer) -> Answer {
    let note = format!("(assumed {})", answer.as_str());
    println!("{} {}", title.bold(), note.dimmed());
    answer
}

impl Prompt for AssumeYes {
    fn confirm(&self, title: &str, _message: &str) -> Result<bool, PromptError> {
        Ok(assumed(title, Answer::Yes) == Answer::Yes)
    }

    fn confirm_tri_state(&self, title: &str, _message: &str) -> Result<Answer, PromptError> {
        Ok(assumed(title, Answer::Yes))
    }

    fn alert(&self, title: &str, message: &str) {
        eprintln!("{} {}: {}", "✖".red(), title.red().bold(), message);
    }
}

/// Prints notifications to the terminal.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        println!("{} {}", "»".bright_cyan(), message.bright_cyan());
    }
}

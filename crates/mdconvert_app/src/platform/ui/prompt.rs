use std::io::{self, BufRead, Write};

pub const QUIT_QUESTION: &str = "Files are still converting. Quit anyway? [y/N]";

/// Asks on stdin whether to quit while conversions are running.
pub fn confirm_quit() -> bool {
    print!("{QUIT_QUESTION} ");
    let _ = io::stdout().flush();
    read_answer(io::stdin().lock())
}

/// Reads one answer line. Without an interactive stdin (closed or
/// unreadable) nobody can decline, so the interrupt wins.
fn read_answer(mut input: impl BufRead) -> bool {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) | Err(_) => true,
        Ok(_) => is_yes(&answer),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

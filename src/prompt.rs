use inventory_keeper::analysis::Confirm;
use std::io::{self, BufRead, Write};
use tracing::error;

/// Ask on stdout, read y/n from stdin. Repeats until it gets an answer.
pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if stdin.lock().read_line(&mut input)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for an answer",
            ));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => println!("(enter 'y' or 'n')"),
        }
    }
}

/// Interactive approval for patching. A closed or broken stdin declines.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        match prompt_confirm(question, None) {
            Ok(answer) => answer,
            Err(err) => {
                error!("Unable to read an answer: {}", err);
                false
            }
        }
    }
}

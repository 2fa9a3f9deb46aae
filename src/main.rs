use std::fs;
use std::path::Path;

use anyhow::Result;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

use cfpq_engine::error::EngineError;
use cfpq_engine::interpret::Interpreter;

fn main() -> Result<()> {
    env_logger::init();

    match std::env::args().nth(1) {
        Some(path) => run_file(&path).map_err(Into::into),
        None => {
            repl();
            Ok(())
        }
    }
}

fn run_file(path: &str) -> cfpq_engine::error::Result<()> {
    if Path::new(path).extension().and_then(|ext| ext.to_str()) != Some("lll") {
        return Err(EngineError::Io(format!(
            "query file {path} must have the .lll extension"
        )));
    }
    let source = fs::read_to_string(path)
        .map_err(|err| EngineError::Io(format!("cannot read {path}: {err}")))?;
    Interpreter::new().run(&source)
}

/// Interactive mode: one persistent environment, one statement batch
/// per submitted line. Errors abort the current line, not the session.
fn repl() {
    println!("graph query engine - type :quit to exit");

    let mut interpreter = Interpreter::new();
    let mut editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("lll".to_string()),
        DefaultPromptSegment::Empty,
    );

    loop {
        match editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == ":quit" || input == ":q" {
                    break;
                }
                if let Err(err) = interpreter.run(input) {
                    eprintln!("{err}");
                }
            }
            Ok(Signal::CtrlC) | Ok(Signal::CtrlD) => {
                println!("bye");
                break;
            }
            Err(err) => {
                eprintln!("readline error: {err:?}");
                break;
            }
        }
    }
}

use std::env::args;

use log::debug;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use muscheme::Interpreter;

fn main() {
    env_logger::init();

    match args().nth(1) {
        Some(file) => run_file(file),
        None => run_repl(),
    }
}

fn run_file(file_path: String) {
    use std::fs;

    let source = match fs::read_to_string(&file_path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Unable to read {}: {}", file_path, error);
            return;
        }
    };

    let mut interpreter = Interpreter::new();
    match interpreter.run(source.trim()) {
        Ok(result) => println!("{}", result),
        Err(error) => eprintln!("{}", error),
    }
}

fn run_repl() {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(error) => {
            eprintln!("Unable to start the line editor: {}", error);
            return;
        }
    };

    // One interpreter per session, so definitions persist between lines.
    let mut interpreter = Interpreter::new();

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("{}", error);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        debug!("input: {:?}", line);
        match interpreter.run(&line) {
            Ok(result) => println!("{}", result),
            Err(error) => println!("{}", error),
        }
    }
}

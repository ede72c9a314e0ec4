use std::{
    env, fs,
    io::{self, BufRead, Write},
    process::ExitCode,
};

use rill::Engine;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        run_file(&args[1])
    } else {
        run_repl()
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot open '{path}': {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut engine = Engine::new();
    match engine.evaluate(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Reads statements from stdin. Incomplete input switches the prompt from
/// `>` to `+` and keeps buffering until the statement parses.
fn run_repl() -> ExitCode {
    let mut engine = Engine::new();
    let mut buffer = String::new();
    let mut prompt = ">";

    let stdin = io::stdin();
    loop {
        print!("{prompt} ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
        if line.trim().is_empty() && buffer.is_empty() {
            continue;
        }
        buffer.push_str(&line);

        match engine.evaluate(&buffer) {
            Ok(()) => {
                buffer.clear();
                prompt = ">";
            }
            Err(e) if e.is_incomplete() => {
                prompt = "+";
            }
            Err(e) => {
                eprintln!("{e}");
                buffer.clear();
                prompt = ">";
            }
        }
    }
}

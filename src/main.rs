use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use bytelox::compiler;
use bytelox::error::InterpretError;
use bytelox::vm::Vm;

const EX_USAGE: u8 = 64;
const EX_COMPILE: u8 = 65;
const EX_RUNTIME: u8 = 70;
const EX_IO: u8 = 74;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: bytelox [script]");
            ExitCode::from(EX_USAGE)
        }
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read '{}': {}", path, err);
            return ExitCode::from(EX_IO);
        }
    };

    match bytelox::interpret(&source, &mut io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ InterpretError::Compile(_)) => {
            eprintln!("{}", err);
            ExitCode::from(EX_COMPILE)
        }
        Err(err @ InterpretError::Runtime(_)) => {
            eprintln!("{}", err);
            ExitCode::from(EX_RUNTIME)
        }
    }
}

// The REPL keeps one Vm alive so definitions carry from line to line.
fn repl() -> ExitCode {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut vm = Vm::new();

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            return ExitCode::SUCCESS;
        }

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => return ExitCode::SUCCESS,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        match compiler::compile(&line) {
            Ok(chunk) => {
                if let Err(err) = vm.interpret(chunk, &mut stdout) {
                    eprintln!("{}", err);
                }
            }
            Err(diagnostics) => {
                for diagnostic in diagnostics {
                    eprintln!("{}", diagnostic);
                }
            }
        }
    }
}

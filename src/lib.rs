pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod error;
pub mod scanner;
pub mod value;
pub mod vm;

pub use error::{CompileError, InterpretError, RuntimeError};

use std::io::Write;

/// Compiles and runs one source string, printing through `out`.
pub fn interpret<W: Write>(source: &str, out: &mut W) -> Result<(), InterpretError> {
    let chunk = compiler::compile(source).map_err(InterpretError::Compile)?;
    let mut vm = vm::Vm::new();
    vm.interpret(chunk, out).map_err(InterpretError::Runtime)
}

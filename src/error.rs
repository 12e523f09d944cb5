use crate::value::Value;
use std::error;
use std::fmt;
use std::io;
use std::rc::Rc;

/// One compiler diagnostic. The parser collects these in emission order;
/// panic mode keeps cascades out, so each entry is a line the user sees.
#[derive(Debug)]
pub struct CompileError {
    line: u32,
    message: String,
}

impl CompileError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        CompileError {
            line,
            message: message.into(),
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error: {}", self.line, self.message)
    }
}

impl error::Error for CompileError {}

#[derive(Debug)]
pub struct RuntimeError {
    line: u32,
    kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    OperandNotNumber,
    OperandsNotNumbers,
    InvalidAddOperands,
    UndefinedVariable(Rc<str>),
    StackOverflow,
    InternalError(VmError),
}

/// Faults that a well-formed chunk never produces. They are still errors
/// rather than panics: the VM executes whatever bytes it is handed.
#[derive(Debug)]
pub enum VmError {
    EmptyStackPop,
    InvalidOpCode,
    UnexpectedConstant(Value),
    Io(io::Error),
}

impl RuntimeError {
    pub fn new(line: u32, kind: ErrorKind) -> Self {
        RuntimeError { line, kind }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error: ", self.line)?;
        match &self.kind {
            ErrorKind::OperandNotNumber => f.write_str("Operand must be a number."),
            ErrorKind::OperandsNotNumbers => f.write_str("Operands must be numbers."),
            ErrorKind::InvalidAddOperands => {
                f.write_str("Operands must be two numbers or two strings.")
            }
            ErrorKind::UndefinedVariable(name) => {
                write!(f, "Undefined variable '{}'.", name)
            }
            ErrorKind::StackOverflow => f.write_str("Stack overflow."),
            ErrorKind::InternalError(vm_err) => match vm_err {
                VmError::EmptyStackPop => f.write_str("illegal pop on empty stack"),
                VmError::InvalidOpCode => f.write_str("invalid op code"),
                VmError::UnexpectedConstant(val) => {
                    write!(f, "unexpected constant {:?}", val)
                }
                VmError::Io(err) => write!(f, "output write failed: {}", err),
            },
        }
    }
}

impl error::Error for RuntimeError {}

/// Outcome of the full source-to-side-effects pipeline.
#[derive(Debug)]
pub enum InterpretError {
    Compile(Vec<CompileError>),
    Runtime(RuntimeError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretError::Compile(diagnostics) => {
                let mut first = true;
                for diagnostic in diagnostics {
                    if !first {
                        writeln!(f)?;
                    }
                    write!(f, "{}", diagnostic)?;
                    first = false;
                }
                Ok(())
            }
            InterpretError::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl error::Error for InterpretError {}

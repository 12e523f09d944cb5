use crate::chunk::{Chunk, Instruction};
use crate::error::{ErrorKind, RuntimeError, VmError};
use crate::value::Value;
use fnv::FnvHashMap;
use std::io::Write;
use std::rc::Rc;

const STACK_MAX: usize = 256;

/// Stack machine for compiled chunks. Globals survive across `interpret`
/// calls, which is what lets a REPL accumulate definitions; the value
/// stack is reset on every call.
pub struct Vm {
    chunk: Chunk,
    ip: usize,
    stack: Vec<Value>,
    globals: FnvHashMap<Rc<str>, Value>,
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            chunk: Chunk::new(),
            ip: 0,
            stack: Vec::with_capacity(STACK_MAX),
            globals: FnvHashMap::default(),
        }
    }

    pub fn interpret<W: Write>(&mut self, chunk: Chunk, out: &mut W) -> Result<(), RuntimeError> {
        self.chunk = chunk;
        self.ip = 0;
        self.stack.clear();
        self.run(out)
    }

    fn run<W: Write>(&mut self, out: &mut W) -> Result<(), RuntimeError> {
        loop {
            let (instr_size, instr) = self.chunk.read_instruction(self.ip);
            match instr {
                Instruction::OpPop => {
                    self.pop()?;
                }

                Instruction::OpPrint => {
                    let val = self.pop()?;
                    writeln!(out, "{}", val)
                        .map_err(|err| self.runtime_error(ErrorKind::InternalError(VmError::Io(err))))?;
                }

                Instruction::OpNegate => {
                    let val = self.pop()?;
                    match val {
                        Value::Number(n) => self.push(Value::Number(-n))?,
                        _ => return Err(self.runtime_error(ErrorKind::OperandNotNumber)),
                    }
                }

                Instruction::OpNot => {
                    let val = self.pop()?;
                    self.push(Value::Boolean(val.is_falsey()))?;
                }

                Instruction::OpAdd => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let result = match (lhs, rhs) {
                        (Value::Number(lv), Value::Number(rv)) => Value::Number(lv + rv),
                        (Value::String(lv), Value::String(rv)) => concatenate(&lv, &rv),
                        _ => return Err(self.runtime_error(ErrorKind::InvalidAddOperands)),
                    };
                    self.push(result)?;
                }

                Instruction::OpSubtract => {
                    let (lhs, rhs) = self.pop_numbers()?;
                    self.push(Value::Number(lhs - rhs))?;
                }

                Instruction::OpMultiply => {
                    let (lhs, rhs) = self.pop_numbers()?;
                    self.push(Value::Number(lhs * rhs))?;
                }

                Instruction::OpDivide => {
                    let (lhs, rhs) = self.pop_numbers()?;
                    self.push(Value::Number(lhs / rhs))?;
                }

                Instruction::OpEqual => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Boolean(lhs == rhs))?;
                }

                Instruction::OpGreater => {
                    let (lhs, rhs) = self.pop_numbers()?;
                    self.push(Value::Boolean(lhs > rhs))?;
                }

                Instruction::OpLess => {
                    let (lhs, rhs) = self.pop_numbers()?;
                    self.push(Value::Boolean(lhs < rhs))?;
                }

                Instruction::OpNil => self.push(Value::Nil)?,
                Instruction::OpTrue => self.push(Value::Boolean(true))?,
                Instruction::OpFalse => self.push(Value::Boolean(false))?,

                Instruction::OpConstant(offset) => {
                    let val = self.get_chunk_constant(offset)?;
                    self.push(val)?;
                }

                Instruction::OpDefineGlobal(offset) => {
                    let name = self.get_chunk_variable(offset)?;
                    let init_val = self.pop()?;
                    self.globals.insert(name, init_val);
                }

                Instruction::OpGetGlobal(offset) => {
                    let name = self.get_chunk_variable(offset)?;
                    match self.globals.get(&name) {
                        Some(val) => {
                            let val = val.clone();
                            self.push(val)?;
                        }
                        None => {
                            return Err(self.runtime_error(ErrorKind::UndefinedVariable(name)));
                        }
                    }
                }

                Instruction::OpSetGlobal(offset) => {
                    let name = self.get_chunk_variable(offset)?;
                    let new_val = self.peek(0)?;
                    match self.globals.get_mut(&name) {
                        Some(val) => *val = new_val,
                        None => {
                            return Err(self.runtime_error(ErrorKind::UndefinedVariable(name)));
                        }
                    }
                }

                Instruction::OpGetLocal(slot) => match self.stack.get(slot as usize) {
                    Some(val) => {
                        let val = val.clone();
                        self.push(val)?;
                    }
                    None => {
                        return Err(self
                            .runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop)));
                    }
                },

                Instruction::OpSetLocal(slot) => {
                    let new_val = self.peek(0)?;
                    match self.stack.get_mut(slot as usize) {
                        Some(val) => *val = new_val,
                        None => {
                            return Err(self
                                .runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop)));
                        }
                    }
                }

                Instruction::OpJumpIfFalse(offset) => {
                    // the condition value stays on the stack; the compiler
                    // pairs each branch with its own Pop
                    if self.peek(0)?.is_falsey() {
                        self.ip += offset as usize;
                    }
                }

                Instruction::OpJump(offset) => {
                    self.ip += offset as usize;
                }

                Instruction::OpLoop(offset) => {
                    // the backward distance counts from past the operand
                    // bytes, so step over them before jumping
                    self.ip = (self.ip + instr_size as usize)
                        .checked_sub(offset as usize)
                        .ok_or_else(|| {
                            self.runtime_error(ErrorKind::InternalError(VmError::InvalidOpCode))
                        })?;
                    continue;
                }

                Instruction::OpReturn => {
                    return Ok(());
                }

                Instruction::OpInvalid => {
                    return Err(self.runtime_error(ErrorKind::InternalError(VmError::InvalidOpCode)));
                }
            }
            self.ip += instr_size as usize;
        }
    }

    // === chunk access ===
    fn get_chunk_constant(&self, offset: u8) -> Result<Value, RuntimeError> {
        match self.chunk.get_constant_checked(offset) {
            Some(val) => Ok(val.clone()),
            None => Err(self.runtime_error(ErrorKind::InternalError(VmError::InvalidOpCode))),
        }
    }

    fn get_chunk_variable(&self, offset: u8) -> Result<Rc<str>, RuntimeError> {
        match self.get_chunk_constant(offset)? {
            Value::String(name) => Ok(name),
            other => Err(self.runtime_error(ErrorKind::InternalError(
                VmError::UnexpectedConstant(other),
            ))),
        }
    }

    // === stack access ===
    fn push(&mut self, val: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == STACK_MAX {
            return Err(self.runtime_error(ErrorKind::StackOverflow));
        }
        self.stack.push(val);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| self.runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop)))
    }

    // depth 0 is the top of the stack
    fn peek(&self, depth: usize) -> Result<Value, RuntimeError> {
        self.stack
            .iter()
            .rev()
            .nth(depth)
            .cloned()
            .ok_or_else(|| self.runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop)))
    }

    fn pop_numbers(&mut self) -> Result<(f64, f64), RuntimeError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        match (lhs, rhs) {
            (Value::Number(lv), Value::Number(rv)) => Ok((lv, rv)),
            _ => Err(self.runtime_error(ErrorKind::OperandsNotNumbers)),
        }
    }

    // === error reporting ===
    fn runtime_error(&self, kind: ErrorKind) -> RuntimeError {
        RuntimeError::new(self.chunk.get_line(self.ip), kind)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn concatenate(lhs: &str, rhs: &str) -> Value {
    let mut joined = String::with_capacity(lhs.len() + rhs.len());
    joined.push_str(lhs);
    joined.push_str(rhs);
    Value::String(Rc::from(joined.as_str()))
}

use crate::chunk::{Chunk, Instruction, InstructionOffsetIter};

/// Renders a chunk one formatted line per instruction:
/// `OFFSET LINE NAME [OPERANDS]`, with `|` in the line column when the
/// line matches the previous instruction.
pub struct Disassembler<'a> {
    chunk: &'a Chunk,
    iter: InstructionOffsetIter<'a>,
    prev_line: Option<u32>,
}

impl<'a> Disassembler<'a> {
    pub fn new(chunk: &'a Chunk) -> Self {
        Disassembler {
            iter: chunk.iter().with_code_offset(),
            chunk,
            prev_line: None,
        }
    }

    fn line_column(&mut self, offset: usize) -> String {
        let line = self.chunk.get_line(offset);
        if self.prev_line == Some(line) {
            format!("{:>4} ", "|")
        } else {
            self.prev_line = Some(line);
            format!("{:04} ", line)
        }
    }

    fn constant(&self, index: u8) -> String {
        match self.chunk.get_constant_checked(index) {
            Some(val) => format!("'{:?}'", val),
            None => "<out-of-bound>".to_string(),
        }
    }

    fn constant_instruction(&self, name: &str, index: u8) -> String {
        format!("{} {:04}\t{}", name, index, self.constant(index))
    }

    fn slot_instruction(&self, name: &str, slot: u8) -> String {
        format!("{} {:04}", name, slot)
    }

    fn jump_instruction(&self, name: &str, offset: usize, jump: u16, forward: bool) -> String {
        let past_operands = offset + 3;
        let target = if forward {
            Some(past_operands + jump as usize)
        } else {
            past_operands.checked_sub(jump as usize)
        };
        match target {
            Some(target) => format!("{} {:04} -> {}", name, jump, target),
            None => format!("{} {:04} -> <out-of-bound>", name, jump),
        }
    }
}

impl Iterator for Disassembler<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let (offset, instr) = self.iter.next()?;
        let mut result = format!("{:04} {}", offset, self.line_column(offset));

        let rendered = match instr {
            Instruction::OpConstant(ix) => self.constant_instruction("OP_CONSTANT", ix),
            Instruction::OpGetGlobal(ix) => self.constant_instruction("OP_GET_GLOBAL", ix),
            Instruction::OpDefineGlobal(ix) => self.constant_instruction("OP_DEFINE_GLOBAL", ix),
            Instruction::OpSetGlobal(ix) => self.constant_instruction("OP_SET_GLOBAL", ix),
            Instruction::OpGetLocal(slot) => self.slot_instruction("OP_GET_LOCAL", slot),
            Instruction::OpSetLocal(slot) => self.slot_instruction("OP_SET_LOCAL", slot),
            Instruction::OpJump(jump) => self.jump_instruction("OP_JUMP", offset, jump, true),
            Instruction::OpJumpIfFalse(jump) => {
                self.jump_instruction("OP_JUMP_IF_FALSE", offset, jump, true)
            }
            Instruction::OpLoop(jump) => self.jump_instruction("OP_LOOP", offset, jump, false),
            Instruction::OpNil => "OP_NIL".to_string(),
            Instruction::OpTrue => "OP_TRUE".to_string(),
            Instruction::OpFalse => "OP_FALSE".to_string(),
            Instruction::OpPop => "OP_POP".to_string(),
            Instruction::OpEqual => "OP_EQUAL".to_string(),
            Instruction::OpGreater => "OP_GREATER".to_string(),
            Instruction::OpLess => "OP_LESS".to_string(),
            Instruction::OpAdd => "OP_ADD".to_string(),
            Instruction::OpSubtract => "OP_SUBTRACT".to_string(),
            Instruction::OpMultiply => "OP_MULTIPLY".to_string(),
            Instruction::OpDivide => "OP_DIVIDE".to_string(),
            Instruction::OpNot => "OP_NOT".to_string(),
            Instruction::OpNegate => "OP_NEGATE".to_string(),
            Instruction::OpPrint => "OP_PRINT".to_string(),
            Instruction::OpReturn => "OP_RETURN".to_string(),
            Instruction::OpInvalid => "OP_INVALID".to_string(),
        };

        result.push_str(&rendered);
        Some(result)
    }
}

pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {} ==", name);
    for instr_str in Disassembler::new(chunk) {
        println!("{}", instr_str);
    }
}

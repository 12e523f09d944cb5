use crate::chunk::{Chunk, Instruction};
use crate::debug;
use crate::error::CompileError;
use crate::scanner::{Scanner, ScannerError, Token, TokenKind};
use crate::value::Value;
use std::rc::Rc;

// slot operands are single bytes, so both pools cap at 256
const MAX_LOCALS: usize = 256;
const MAX_CONSTANT_INDEX: usize = u8::MAX as usize;

pub fn compile(source: &str) -> Result<Chunk, Vec<CompileError>> {
    let parser = Parser::new(Scanner::new(source));
    let chunk = parser.parse()?;
    if cfg!(debug_assertions) {
        debug::disassemble_chunk(&chunk, "code");
    }
    Ok(chunk)
}

struct Local<'a> {
    name_token: Token<'a>,
    depth: usize,

    // false between declaration and the end of the initializer, which is
    // what makes `var a = a;` detectable
    initialized: bool,
}

impl<'a> Local<'a> {
    fn new_uninit(name_token: Token<'a>, depth: usize) -> Self {
        Local {
            name_token,
            depth,
            initialized: false,
        }
    }

    fn var_name(&self) -> &str {
        self.name_token.lexeme
    }
}

enum LookupError {
    Unresolved,
    ResolvedUninit,
}

/// Lexical state of the single compilation frame: the local stack mirrors
/// the runtime value stack, so a local's index is its runtime slot.
struct CompilerState<'a> {
    locals: Vec<Local<'a>>,
    scope_depth: usize,
}

impl<'a> CompilerState<'a> {
    fn new() -> Self {
        CompilerState {
            locals: Vec::new(),
            scope_depth: 0,
        }
    }

    fn in_global_scope(&self) -> bool {
        self.scope_depth == 0
    }

    fn add_local(&mut self, name_token: Token<'a>) -> bool {
        if self.locals.len() == MAX_LOCALS {
            return false;
        }
        self.locals
            .push(Local::new_uninit(name_token, self.scope_depth));
        true
    }

    fn init_last_local(&mut self) {
        if let Some(last) = self.locals.last_mut() {
            last.initialized = true;
        }
    }

    fn declared_in_scope(&self, name: &str) -> bool {
        self.locals
            .iter()
            .rev()
            .take_while(|local| local.depth == self.scope_depth)
            .any(|local| local.var_name() == name)
    }

    fn resolve_local(&self, name: &str) -> Result<usize, LookupError> {
        match self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.var_name() == name)
        {
            Some((slot, local)) if local.initialized => Ok(slot),
            Some(_) => Err(LookupError::ResolvedUninit),
            None => Err(LookupError::Unresolved),
        }
    }
}

#[derive(Copy, Clone, PartialEq, PartialOrd)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    // one level tighter, for left-associative binary operands
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

enum VarKind {
    Local,
    Global { offset: u8, line: u32 },
}

type Parselet<'a> = fn(&mut Parser<'a>, Token<'a>, bool);

pub struct Parser<'a> {
    scanner: std::iter::Peekable<Scanner<'a>>,
    chunk: Chunk,
    state: CompilerState<'a>,
    errors: Vec<CompileError>,
    panic_mode: bool,
    curr_line: u32,
    prev_kind: Option<TokenKind>,
}

impl<'a> Parser<'a> {
    pub fn new(scanner: Scanner<'a>) -> Self {
        Parser {
            scanner: scanner.peekable(),
            chunk: Chunk::new(),
            state: CompilerState::new(),
            errors: Vec::new(),
            panic_mode: false,
            curr_line: 1,
            prev_kind: None,
        }
    }

    pub fn parse(mut self) -> Result<Chunk, Vec<CompileError>> {
        self.program();

        if self.errors.is_empty() {
            self.emit_return();
            Ok(self.chunk)
        } else {
            Err(self.errors)
        }
    }

    // === scope management ===
    fn begin_scope(&mut self) {
        self.state.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.state.scope_depth -= 1;
        while self
            .state
            .locals
            .last()
            .map_or(false, |local| local.depth > self.state.scope_depth)
        {
            self.state.locals.pop();
            self.emit_instruction(Instruction::OpPop, self.curr_line);
        }
    }

    // === code emitters ===
    fn emit_instruction(&mut self, instr: Instruction, line: u32) {
        self.chunk.push_instruction(instr, line);
    }

    fn emit_jump(&mut self, instr: Instruction) -> usize {
        self.chunk.push_instruction(instr, self.curr_line)
    }

    fn patch_jump(&mut self, instr_offset: usize) {
        // distance from the end of the 3-byte jump to the current tail
        let jump = self.next_instr_offset() - instr_offset - 3;
        if jump > u16::MAX as usize {
            self.report_error(self.curr_line, "Too much code to jump over.");
        }
        self.chunk.patch_jump_offset(instr_offset, jump as u16);
    }

    fn emit_loop(&mut self, target_offset: usize) {
        let jump = self.next_instr_offset() - target_offset + 3;
        if jump > u16::MAX as usize {
            self.report_error(self.curr_line, "Loop body too large.");
        }
        self.emit_instruction(Instruction::OpLoop(jump as u16), self.curr_line);
    }

    fn emit_return(&mut self) {
        self.emit_instruction(Instruction::OpReturn, self.curr_line);
    }

    fn make_constant(&mut self, value: Value, line: u32) -> u8 {
        let index = self.chunk.push_constant(value);
        if index > MAX_CONSTANT_INDEX {
            self.report_error(line, "Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn emit_identifier(&mut self, name: &str) -> u8 {
        self.make_constant(Value::String(Rc::from(name)), self.curr_line)
    }

    fn next_instr_offset(&self) -> usize {
        self.chunk.code_len()
    }

    // === declarations and statements ===
    fn program(&mut self) {
        while !self.is_eof() {
            self.declaration();
        }
    }

    fn declaration(&mut self) {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Var => {
                self.advance();
                self.var_decl();
            }
            Some(_) => self.statement(),
            None => {}
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        let tok = match self.peek() {
            Some(tok) => tok,
            None => return,
        };

        match tok.kind {
            TokenKind::Print => {
                self.advance();
                self.print_statement();
            }
            TokenKind::If => {
                self.advance();
                self.if_statement();
            }
            TokenKind::While => {
                self.advance();
                self.while_statement();
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.begin_scope();
                self.block();
                self.end_scope();
            }
            _ => self.expr_statement(),
        }
    }

    fn var_decl(&mut self) {
        let var_kind = self.parse_var();

        // initializer value (or nil) ends up on top of the stack
        if self.consume_if(TokenKind::Equal).is_some() {
            self.expression();
        } else {
            self.emit_instruction(Instruction::OpNil, self.curr_line);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        );

        match var_kind {
            VarKind::Global { offset, line } => {
                self.emit_instruction(Instruction::OpDefineGlobal(offset), line);
            }
            VarKind::Local => {
                // the initializer stays in the local's stack slot
                self.state.init_last_local();
            }
        }
    }

    fn parse_var(&mut self) -> VarKind {
        let ident = match self.consume(TokenKind::Identifier, "Expect variable name.") {
            Some(tok) => tok,
            None => return VarKind::Local,
        };

        if self.state.in_global_scope() {
            let offset = self.emit_identifier(ident.lexeme);
            VarKind::Global {
                offset,
                line: ident.line,
            }
        } else {
            if self.state.declared_in_scope(ident.lexeme) {
                self.report_error(
                    ident.line,
                    "Already a variable with this name in this scope.",
                );
            }
            if !self.state.add_local(ident) {
                self.report_error(ident.line, "Too many local variables in function.");
            }
            VarKind::Local
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_instruction(Instruction::OpPrint, self.curr_line);
    }

    fn expr_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_instruction(Instruction::OpPop, self.curr_line);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(Instruction::OpJumpIfFalse(u16::MAX));

        // pop the condition value when falling into the then branch
        self.emit_instruction(Instruction::OpPop, self.curr_line);
        self.statement();

        let else_jump = self.emit_jump(Instruction::OpJump(u16::MAX));
        self.patch_jump(then_jump);

        // the skipped branch still has to pop the condition; this is the
        // implicit else when the user wrote none
        self.emit_instruction(Instruction::OpPop, self.curr_line);

        if self.consume_if(TokenKind::Else).is_some() {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.next_instr_offset();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(Instruction::OpJumpIfFalse(u16::MAX));
        self.emit_instruction(Instruction::OpPop, self.curr_line);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_instruction(Instruction::OpPop, self.curr_line);
    }

    fn block(&mut self) {
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::RightBrace {
                break;
            }
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    // === expressions ===
    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, prec: Precedence) {
        let tok = match self.advance() {
            Some(tok) => tok,
            None => {
                self.report_error(self.curr_line, "Expect expression.");
                return;
            }
        };

        // only a parse at assignment level may bind a trailing `=`
        let can_assign = prec <= Precedence::Assignment;

        match self.prefix_rule(tok.kind) {
            Some(parselet) => parselet(self, tok, can_assign),
            None => {
                self.report_error(tok.line, "Expect expression.");
                return;
            }
        }

        while let Some(tok) = self.peek() {
            if prec > self.infix_prec(tok.kind) {
                break;
            }
            self.advance();
            if let Some(parselet) = self.infix_rule(tok.kind) {
                parselet(self, tok, can_assign);
            }
        }

        if can_assign {
            if let Some(equal) = self.consume_if(TokenKind::Equal) {
                self.report_error(equal.line, "Invalid assignment target.");
            }
        }
    }

    fn number(&mut self, tok: Token<'a>, _: bool) {
        if let TokenKind::Number(val) = tok.kind {
            let offset = self.make_constant(Value::Number(val), tok.line);
            self.emit_instruction(Instruction::OpConstant(offset), tok.line);
        }
    }

    fn string(&mut self, tok: Token<'a>, _: bool) {
        // the lexeme includes the surrounding quotes
        let content = &tok.lexeme[1..tok.lexeme.len() - 1];
        let offset = self.make_constant(Value::String(Rc::from(content)), tok.line);
        self.emit_instruction(Instruction::OpConstant(offset), tok.line);
    }

    fn literal(&mut self, tok: Token<'a>, _: bool) {
        match tok.kind {
            TokenKind::True => self.emit_instruction(Instruction::OpTrue, tok.line),
            TokenKind::False => self.emit_instruction(Instruction::OpFalse, tok.line),
            TokenKind::Nil => self.emit_instruction(Instruction::OpNil, tok.line),
            _ => {}
        }
    }

    fn variable(&mut self, tok: Token<'a>, can_assign: bool) {
        let is_assign = can_assign && self.consume_if(TokenKind::Equal).is_some();

        match self.state.resolve_local(tok.lexeme) {
            Ok(slot) => {
                let slot = slot as u8;
                if is_assign {
                    self.expression();
                    self.emit_instruction(Instruction::OpSetLocal(slot), tok.line);
                } else {
                    self.emit_instruction(Instruction::OpGetLocal(slot), tok.line);
                }
            }
            Err(LookupError::ResolvedUninit) => {
                self.report_error(tok.line, "Can't read local variable in its own initializer.");
            }
            Err(LookupError::Unresolved) => {
                // not a local, assume a global
                let offset = self.emit_identifier(tok.lexeme);
                if is_assign {
                    self.expression();
                    self.emit_instruction(Instruction::OpSetGlobal(offset), tok.line);
                } else {
                    self.emit_instruction(Instruction::OpGetGlobal(offset), tok.line);
                }
            }
        }
    }

    fn grouping(&mut self, _: Token<'a>, _: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, tok: Token<'a>, _: bool) {
        self.parse_precedence(Precedence::Unary);
        match tok.kind {
            TokenKind::Minus => self.emit_instruction(Instruction::OpNegate, tok.line),
            TokenKind::Bang => self.emit_instruction(Instruction::OpNot, tok.line),
            _ => {}
        }
    }

    fn binary(&mut self, tok: Token<'a>, _: bool) {
        let prec = self.infix_prec(tok.kind);
        self.parse_precedence(prec.next());

        match tok.kind {
            TokenKind::Plus => self.emit_instruction(Instruction::OpAdd, tok.line),
            TokenKind::Minus => self.emit_instruction(Instruction::OpSubtract, tok.line),
            TokenKind::Star => self.emit_instruction(Instruction::OpMultiply, tok.line),
            TokenKind::Slash => self.emit_instruction(Instruction::OpDivide, tok.line),
            TokenKind::EqualEqual => self.emit_instruction(Instruction::OpEqual, tok.line),
            TokenKind::BangEqual => {
                self.emit_instruction(Instruction::OpEqual, tok.line);
                self.emit_instruction(Instruction::OpNot, tok.line);
            }
            TokenKind::Greater => self.emit_instruction(Instruction::OpGreater, tok.line),
            TokenKind::GreaterEqual => {
                self.emit_instruction(Instruction::OpLess, tok.line);
                self.emit_instruction(Instruction::OpNot, tok.line);
            }
            TokenKind::Less => self.emit_instruction(Instruction::OpLess, tok.line),
            TokenKind::LessEqual => {
                self.emit_instruction(Instruction::OpGreater, tok.line);
                self.emit_instruction(Instruction::OpNot, tok.line);
            }
            _ => {}
        }
    }

    fn and_(&mut self, tok: Token<'a>, _: bool) {
        let end_jump = self.emit_jump(Instruction::OpJumpIfFalse(u16::MAX));

        self.emit_instruction(Instruction::OpPop, tok.line);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump);
    }

    fn or_(&mut self, tok: Token<'a>, _: bool) {
        let else_jump = self.emit_jump(Instruction::OpJumpIfFalse(u16::MAX));
        let end_jump = self.emit_jump(Instruction::OpJump(u16::MAX));

        self.patch_jump(else_jump);
        self.emit_instruction(Instruction::OpPop, tok.line);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    // === parse rule tables ===
    fn prefix_rule(&self, kind: TokenKind) -> Option<Parselet<'a>> {
        match kind {
            TokenKind::LeftParen => Some(Self::grouping),
            TokenKind::Minus | TokenKind::Bang => Some(Self::unary),
            TokenKind::Number(_) => Some(Self::number),
            TokenKind::String => Some(Self::string),
            TokenKind::Identifier => Some(Self::variable),
            TokenKind::True | TokenKind::False | TokenKind::Nil => Some(Self::literal),
            _ => None,
        }
    }

    fn infix_prec(&self, kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Minus | TokenKind::Plus => Precedence::Term,
            TokenKind::Star | TokenKind::Slash => Precedence::Factor,
            TokenKind::BangEqual | TokenKind::EqualEqual => Precedence::Equality,
            TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => Precedence::Comparison,
            TokenKind::And => Precedence::And,
            TokenKind::Or => Precedence::Or,
            _ => Precedence::None,
        }
    }

    fn infix_rule(&self, kind: TokenKind) -> Option<Parselet<'a>> {
        match kind {
            TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::BangEqual
            | TokenKind::EqualEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => Some(Self::binary),
            TokenKind::And => Some(Self::and_),
            TokenKind::Or => Some(Self::or_),
            _ => None,
        }
    }

    // === parse utils ===
    fn advance(&mut self) -> Option<Token<'a>> {
        while let Some(item) = self.scanner.next() {
            match item {
                Ok(tok) => {
                    self.curr_line = tok.line;
                    self.prev_kind = Some(tok.kind);
                    return Some(tok);
                }
                Err(err) => self.error_in_scan(err),
            }
        }
        None
    }

    fn peek(&mut self) -> Option<Token<'a>> {
        loop {
            match self.scanner.peek() {
                Some(Ok(tok)) => return Some(*tok),
                Some(Err(_)) => {
                    if let Some(Err(err)) = self.scanner.next() {
                        self.error_in_scan(err);
                    }
                }
                None => return None,
            }
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Option<Token<'a>> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.advance();
                Some(tok)
            }
            Some(tok) => {
                self.report_error(tok.line, message);
                None
            }
            None => {
                self.report_error(self.curr_line, message);
                None
            }
        }
    }

    fn consume_if(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.advance();
                Some(tok)
            }
            _ => None,
        }
    }

    fn is_eof(&mut self) -> bool {
        self.peek().is_none()
    }

    fn error_in_scan(&mut self, err: ScannerError) {
        match err {
            ScannerError::UnterminatedString(line) => {
                self.report_error(line, "Unterminated string.");
            }
            ScannerError::UnexpectedChar(line) => {
                self.report_error(line, "Unexpected character.");
            }
        }
    }

    fn report_error(&mut self, line: u32, message: &str) {
        // panic mode swallows cascades until the next statement boundary
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompileError::new(line, message));
    }

    // skip ahead to the next likely statement boundary: just past a `;`,
    // or just before a statement keyword
    fn synchronize(&mut self) {
        self.panic_mode = false;

        loop {
            if self.prev_kind == Some(TokenKind::Semicolon) {
                return;
            }
            match self.peek() {
                Some(tok) => match tok.kind {
                    TokenKind::Class
                    | TokenKind::Fun
                    | TokenKind::Var
                    | TokenKind::For
                    | TokenKind::If
                    | TokenKind::While
                    | TokenKind::Print
                    | TokenKind::Return => return,
                    _ => {
                        self.advance();
                    }
                },
                None => return,
            }
        }
    }
}

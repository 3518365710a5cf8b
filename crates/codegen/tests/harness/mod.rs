//! Test harness: a small reader for Yul text and assemble/disassemble helpers.
#![allow(dead_code)]

use stackgen_codegen::{
    Assembler, CodeGenerator, CodegenError, disassemble,
    config::{CodegenOpts, EvmVersion},
    ir::{
        Block, BlockIdGen, Expr, ExprCall, ExprKind, Function, Ident, Lit, LitKind, Span, Stmt,
        StmtFor, StmtKind, StmtSwitch, StmtSwitchCase, U256,
    },
};

/// Options matching the expected outputs: no `PUSH0`, stack allocation optimized.
pub fn legacy_opts() -> CodegenOpts {
    CodegenOpts::new(EvmVersion::Istanbul)
}

/// Generates code for `src` and returns the disassembly.
#[track_caller]
pub fn assemble(src: &str) -> String {
    match try_assemble(src, &legacy_opts()) {
        Ok(code) => code,
        Err(err) => panic!("code generation failed: {err}\n{src}"),
    }
}

pub fn try_assemble(src: &str, opts: &CodegenOpts) -> Result<String, CodegenError> {
    let block = parse(src);
    let mut asm = Assembler::new(opts.evm_version);
    CodeGenerator::assemble(&block, &mut asm, opts)?;
    let code = asm.assemble().expect("assembly failed");
    Ok(disassemble(&code.bytecode))
}

/// Parses a Yul block.
#[track_caller]
pub fn parse(src: &str) -> Block {
    let mut parser = Parser { src: src.as_bytes(), pos: 0, ids: BlockIdGen::new() };
    let block = parser.parse_block().unwrap_or_else(|err| panic!("{err}\n{src}"));
    parser.skip_trivia();
    assert_eq!(parser.pos, src.len(), "trailing input");
    block
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Assign,
    Arrow,
    Word(String),
    Number(U256),
    Str(Vec<u8>),
    Eof,
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    ids: BlockIdGen,
}

type PResult<T> = Result<T, String>;

impl Parser<'_> {
    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.src[self.pos..];
            if let Some(&c) = rest.first()
                && c.is_ascii_whitespace()
            {
                self.pos += 1;
            } else if rest.starts_with(b"//") {
                while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else if rest.starts_with(b"/*") {
                let close = rest[2..].windows(2).position(|w| w == b"*/");
                self.pos += close.map_or(rest.len(), |i| i + 4);
            } else {
                break;
            }
        }
    }

    fn lex(&mut self) -> PResult<(Token, Span)> {
        self.skip_trivia();
        let start = self.pos;
        let Some(&c) = self.src.get(self.pos) else {
            return Ok((Token::Eof, self.span(start)));
        };
        let token = match c {
            b'{' => self.single(Token::LBrace),
            b'}' => self.single(Token::RBrace),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b',' => self.single(Token::Comma),
            b':' if self.src.get(self.pos + 1) == Some(&b'=') => {
                self.pos += 2;
                Token::Assign
            }
            b'-' if self.src.get(self.pos + 1) == Some(&b'>') => {
                self.pos += 2;
                Token::Arrow
            }
            b'"' => {
                self.pos += 1;
                let mut bytes = Vec::new();
                loop {
                    match self.src.get(self.pos) {
                        None => return Err(format!("unterminated string at {start}")),
                        Some(b'"') => break,
                        Some(b'\\') => {
                            let escaped = self.src.get(self.pos + 1).copied().unwrap_or(b'\\');
                            bytes.push(match escaped {
                                b'n' => b'\n',
                                b't' => b'\t',
                                other => other,
                            });
                            self.pos += 2;
                        }
                        Some(&b) => {
                            bytes.push(b);
                            self.pos += 1;
                        }
                    }
                }
                self.pos += 1;
                Token::Str(bytes)
            }
            b'0'..=b'9' => {
                let text = self.take_while(|b| b.is_ascii_alphanumeric());
                let value = match text.strip_prefix("0x") {
                    Some(hex) => U256::from_str_radix(hex, 16),
                    None => U256::from_str_radix(&text, 10),
                };
                Token::Number(value.map_err(|err| format!("bad number `{text}`: {err}"))?)
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                Token::Word(self.take_while(|b| b.is_ascii_alphanumeric() || b"_$.".contains(&b)))
            }
            c => return Err(format!("unexpected character `{}` at {start}", c as char)),
        };
        Ok((token, self.span(start)))
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn take_while(&mut self, f: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.pos < self.src.len() && f(self.src[self.pos]) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn span(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn peek(&mut self) -> PResult<Token> {
        let pos = self.pos;
        let (token, _) = self.lex()?;
        self.pos = pos;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> PResult<Span> {
        let (token, span) = self.lex()?;
        if token == expected {
            Ok(span)
        } else {
            Err(format!("expected {expected:?}, found {token:?} at {span}"))
        }
    }

    fn eat(&mut self, expected: &Token) -> PResult<bool> {
        if self.peek()? == *expected {
            self.lex()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn ident(&mut self) -> PResult<Ident> {
        match self.lex()? {
            (Token::Word(name), span) => Ok(Ident::new(name, span)),
            (token, span) => Err(format!("expected identifier, found {token:?} at {span}")),
        }
    }

    fn ident_list(&mut self) -> PResult<Vec<Ident>> {
        let mut idents = vec![self.ident()?];
        while self.eat(&Token::Comma)? {
            idents.push(self.ident()?);
        }
        Ok(idents)
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let id = self.ids.next_id();
        let open = self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace)? {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Block::new(id, open.to(self.span(self.pos)), stmts))
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = {
            self.skip_trivia();
            self.pos
        };
        let kind = match self.peek()? {
            Token::LBrace => StmtKind::Block(self.parse_block()?),
            Token::Word(word) => match word.as_str() {
                "let" => {
                    self.lex()?;
                    let names = self.ident_list()?;
                    let value =
                        if self.eat(&Token::Assign)? { Some(self.parse_expr()?) } else { None };
                    StmtKind::VarDecl(names, value)
                }
                "function" => {
                    self.lex()?;
                    let name = self.ident()?;
                    self.expect(Token::LParen)?;
                    let parameters =
                        if self.eat(&Token::RParen)? { Vec::new() } else { self.params()? };
                    let returns =
                        if self.eat(&Token::Arrow)? { self.ident_list()? } else { Vec::new() };
                    let body = self.parse_block()?;
                    StmtKind::FunctionDef(Function { name, parameters, returns, body })
                }
                "if" => {
                    self.lex()?;
                    let cond = self.parse_expr()?;
                    StmtKind::If(cond, self.parse_block()?)
                }
                "switch" => {
                    self.lex()?;
                    self.parse_switch()?
                }
                "for" => {
                    self.lex()?;
                    let init = self.parse_block()?;
                    let cond = self.parse_expr()?;
                    let step = self.parse_block()?;
                    let body = self.parse_block()?;
                    StmtKind::For(Box::new(StmtFor { init, cond, step, body }))
                }
                "break" => self.keyword(StmtKind::Break)?,
                "continue" => self.keyword(StmtKind::Continue)?,
                "leave" => self.keyword(StmtKind::Leave)?,
                _ => {
                    let first = self.ident()?;
                    match self.peek()? {
                        Token::LParen => {
                            let call = self.parse_call(first)?;
                            StmtKind::Expr(call)
                        }
                        Token::Comma | Token::Assign => {
                            let mut targets = vec![first];
                            while self.eat(&Token::Comma)? {
                                targets.push(self.ident()?);
                            }
                            self.expect(Token::Assign)?;
                            StmtKind::Assign(targets, self.parse_expr()?)
                        }
                        token => return Err(format!("unexpected {token:?} after `{first}`")),
                    }
                }
            },
            token => return Err(format!("unexpected {token:?} at {start}")),
        };
        Ok(Stmt { span: self.span(start), kind })
    }

    fn params(&mut self) -> PResult<Vec<Ident>> {
        let params = self.ident_list()?;
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn keyword(&mut self, kind: StmtKind) -> PResult<StmtKind> {
        self.lex()?;
        Ok(kind)
    }

    fn parse_switch(&mut self) -> PResult<StmtKind> {
        let selector = self.parse_expr()?;
        let mut branches = Vec::new();
        let mut default_case = None;
        loop {
            match self.peek()? {
                Token::Word(w) if w == "case" => {
                    let (_, span) = self.lex()?;
                    let constant = match self.parse_expr()?.kind {
                        ExprKind::Lit(lit) => lit,
                        kind => return Err(format!("case value must be a literal, found {kind:?}")),
                    };
                    let body = self.parse_block()?;
                    branches.push(StmtSwitchCase { span: span.to(body.span), constant, body });
                }
                Token::Word(w) if w == "default" => {
                    self.lex()?;
                    default_case = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(StmtKind::Switch(StmtSwitch { selector, branches, default_case }))
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        let (token, span) = self.lex()?;
        let lit = |kind| -> PResult<Expr> {
            Ok(Expr { span, kind: ExprKind::Lit(Lit::new(kind, span)) })
        };
        match token {
            Token::Number(n) => lit(LitKind::Number(n)),
            Token::Str(s) => lit(LitKind::Str(s)),
            Token::Word(w) if w == "true" => lit(LitKind::Bool(true)),
            Token::Word(w) if w == "false" => lit(LitKind::Bool(false)),
            Token::Word(name) => {
                let ident = Ident::new(name, span);
                if self.peek()? == Token::LParen {
                    self.parse_call(ident)
                } else {
                    Ok(Expr { span, kind: ExprKind::Ident(ident) })
                }
            }
            token => Err(format!("expected expression, found {token:?} at {span}")),
        }
    }

    fn parse_call(&mut self, name: Ident) -> PResult<Expr> {
        self.expect(Token::LParen)?;
        let mut arguments = Vec::new();
        if !self.eat(&Token::RParen)? {
            loop {
                arguments.push(self.parse_expr()?);
                if !self.eat(&Token::Comma)? {
                    break;
                }
            }
            self.expect(Token::RParen)?;
        }
        let span = name.span.to(self.span(self.pos));
        Ok(Expr { span, kind: ExprKind::Call(ExprCall { name, arguments }) })
    }
}

#[test]
fn reads_all_statement_kinds() {
    let block = parse(
        r#"{
            // comment
            let a, b := f(1, 0x20) /* block
            comment */
            function f(x, y) -> r { r := add(x, y) leave }
            if true { a := "ab" }
            switch a case 0 { } case 1 { b := a } default { }
            for { let i := 0 } lt(i, 2) { i := add(i, 1) } { break continue }
            { pop(b) }
        }"#,
    );
    let kinds: Vec<_> = block.stmts.iter().map(|s| std::mem::discriminant(&s.kind)).collect();
    assert_eq!(kinds.len(), 6);
    let StmtKind::Switch(switch) = &block.stmts[3].kind else { panic!("not a switch") };
    assert_eq!(switch.branches.len(), 2);
    assert!(switch.default_case.is_some());
    let StmtKind::VarDecl(names, Some(value)) = &block.stmts[0].kind else { panic!() };
    assert_eq!(names.len(), 2);
    let ExprKind::Call(call) = &value.kind else { panic!() };
    assert_eq!(call.arguments.len(), 2);
}

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    error::{Error, RunResult},
    expressions::{Accessor, ArgDecl, CallArg, Expr, Ident, Initializer, MemberDecl, Op, Stmt},
    lexer::{Lexer, Token, TokenKind},
};

/// Parses a program: a sequence of statements.
pub(crate) fn parse(src: &str) -> RunResult<Vec<Stmt>> {
    let mut parser = Parser::new(src);
    let mut program = Vec::new();
    while let Some(stmt) = parser.next_statement()? {
        program.push(stmt);
    }
    Ok(program)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    If,
    Else,
    Is,
    Let,
    Def,
    New,
    While,
    For,
    Return,
    Object,
    Inherits,
}

fn keyword(text: &str) -> Option<Keyword> {
    Some(match text {
        "if" => Keyword::If,
        "else" => Keyword::Else,
        "is" => Keyword::Is,
        "let" => Keyword::Let,
        "def" => Keyword::Def,
        "new" => Keyword::New,
        "while" => Keyword::While,
        "for" => Keyword::For,
        "return" => Keyword::Return,
        "object" => Keyword::Object,
        "inherits" => Keyword::Inherits,
        _ => return None,
    })
}

/// The statement context the parser is inside, used to reject `def`
/// anywhere but the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseScope {
    Main,
    Function,
    Loop,
    Branch,
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    scope: ParseScope,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            lexer: Lexer::new(src),
            scope: ParseScope::Main,
        }
    }

    fn next_statement(&mut self) -> RunResult<Option<Stmt>> {
        let t = self.lexer.next()?;
        if t.is(TokenKind::Eof) {
            return Ok(None);
        }
        self.parse_statement(t).map(Some)
    }

    fn err_at(&self, message: impl Into<String>, token: &Token<'_>) -> Error {
        if token.is(TokenKind::Eof) {
            Error::incomplete(message, token.pos)
        } else {
            Error::parse(message, token.pos)
        }
    }

    fn err_here(&mut self, message: impl Into<String>) -> Error {
        Error::parse(message, self.lexer.pos())
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> RunResult<Token<'a>> {
        let t = self.lexer.next()?;
        if t.kind == kind {
            Ok(t)
        } else {
            Err(self.err_at(format!("expected {what}"), &t))
        }
    }

    fn close_statement(&mut self) -> RunResult<()> {
        self.expect(TokenKind::Eos, "a ';'").map(|_| ())
    }

    fn with_scope<T>(&mut self, scope: ParseScope, f: impl FnOnce(&mut Self) -> RunResult<T>) -> RunResult<T> {
        let prev = self.scope;
        self.scope = scope;
        let result = f(self);
        self.scope = prev;
        result
    }

    fn parse_statement(&mut self, t: Token<'a>) -> RunResult<Stmt> {
        match t.kind {
            TokenKind::Identifier => match keyword(t.text) {
                Some(Keyword::Let) => self.parse_let(),
                Some(Keyword::If) => self.parse_if(),
                Some(Keyword::Def) => self.parse_def(&t),
                Some(Keyword::While) => self.parse_while(),
                Some(Keyword::For) => self.parse_for(),
                Some(Keyword::Return) => self.parse_return(),
                Some(Keyword::Object) => self.parse_object(),
                Some(Keyword::Else | Keyword::Is | Keyword::Inherits) => {
                    Err(self.err_at(format!("unexpected keyword '{}'", t.text), &t))
                }
                Some(Keyword::New) | None => {
                    self.lexer.reverse(t);
                    self.parse_expr_statement()
                }
            },
            TokenKind::Directive => self.parse_directive(),
            TokenKind::LBrack => {
                self.lexer.reverse(t);
                self.parse_block_statement()
            }
            _ => {
                self.lexer.reverse(t);
                self.parse_expr_statement()
            }
        }
    }

    fn parse_expr_statement(&mut self) -> RunResult<Stmt> {
        let Some(expr) = self.parse_expression()? else {
            return Err(self.err_here("expected an expression"));
        };
        self.close_statement()?;
        Ok(Stmt::Expr(expr))
    }

    fn require_expression(&mut self) -> RunResult<Expr> {
        match self.parse_expression()? {
            Some(expr) => Ok(expr),
            None => Err(self.err_here("expected an expression")),
        }
    }

    // let NAME [= EXPR] ;
    fn parse_let(&mut self) -> RunResult<Stmt> {
        let name = self.expect(TokenKind::Identifier, "an identifier")?;
        let pk = self.lexer.peek()?;
        let expr = if pk.is(TokenKind::Op) && pk.text == "=" {
            self.lexer.next()?;
            Some(self.require_expression()?)
        } else {
            None
        };
        self.close_statement()?;
        Ok(Stmt::Let {
            name: name.text.to_owned(),
            expr,
        })
    }

    // if ( EXPR ) STATEMENT { else if ( EXPR ) STATEMENT } [ else STATEMENT ]
    fn parse_if(&mut self) -> RunResult<Stmt> {
        self.expect(TokenKind::LParen, "a '('")?;
        let cond = self.require_expression()?;
        self.expect(TokenKind::RParen, "a ')'")?;
        let body = self.with_scope(ParseScope::Branch, Self::parse_block_statement)?;

        let mut orelse = None;
        let pk = self.lexer.peek()?;
        if pk.is(TokenKind::Identifier) && keyword(pk.text) == Some(Keyword::Else) {
            self.lexer.next()?;
            let pk = self.lexer.peek()?;
            let branch = if pk.is(TokenKind::Identifier) && keyword(pk.text) == Some(Keyword::If) {
                self.lexer.next()?;
                self.parse_if()?
            } else {
                self.with_scope(ParseScope::Branch, Self::parse_block_statement)?
            };
            orelse = Some(Box::new(branch));
        }

        Ok(Stmt::If {
            cond,
            body: Box::new(body),
            orelse,
        })
    }

    // while ( EXPR ) STATEMENT
    fn parse_while(&mut self) -> RunResult<Stmt> {
        self.expect(TokenKind::LParen, "a '('")?;
        let cond = self.require_expression()?;
        self.expect(TokenKind::RParen, "a ')'")?;
        let body = self.with_scope(ParseScope::Loop, Self::parse_block_statement)?;
        Ok(Stmt::While {
            cond,
            body: Box::new(body),
        })
    }

    // for ( let INIT ; COND ; STEP ) STATEMENT
    fn parse_for(&mut self) -> RunResult<Stmt> {
        self.expect(TokenKind::LParen, "a '('")?;
        let t = self.expect(TokenKind::Identifier, "'let'")?;
        if keyword(t.text) != Some(Keyword::Let) {
            return Err(self.err_at("expected 'let'", &t));
        }
        let init = self.parse_let()?;
        let cond = self.require_expression()?;
        self.expect(TokenKind::Eos, "a ';'")?;
        let step = self.require_expression()?;
        self.expect(TokenKind::RParen, "a ')'")?;
        let body = self.with_scope(ParseScope::Loop, Self::parse_block_statement)?;
        Ok(Stmt::For {
            init: Box::new(init),
            cond,
            step,
            body: Box::new(body),
        })
    }

    // return [EXPR] ;
    fn parse_return(&mut self) -> RunResult<Stmt> {
        let expr = self.parse_expression()?;
        self.close_statement()?;
        Ok(Stmt::Return(expr))
    }

    // def NAME ( ARG_LIST ) STATEMENT — top-level scope only
    fn parse_def(&mut self, at: &Token<'a>) -> RunResult<Stmt> {
        if self.scope != ParseScope::Main {
            return Err(self.err_at("cannot define a function here", at));
        }
        let name = self.expect(TokenKind::Identifier, "an identifier")?;
        self.expect(TokenKind::LParen, "a '('")?;
        let args = self.parse_argument_list()?;
        self.expect(TokenKind::RParen, "a ')'")?;
        let body = self.with_scope(ParseScope::Function, Self::parse_block_statement)?;
        Ok(Stmt::Def {
            name: name.text.to_owned(),
            args,
            body: Rc::new(body),
        })
    }

    // NAME [is TYPE] {, NAME [is TYPE]}
    fn parse_argument_list(&mut self) -> RunResult<Vec<ArgDecl>> {
        let mut list = Vec::new();
        loop {
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RParen) {
                break;
            }
            if pk.is(TokenKind::Eof) {
                return Err(self.err_at("expected a ')'", &pk));
            }
            let name = self.expect(TokenKind::Identifier, "an identifier")?;

            let mut type_name = None;
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::Identifier) && keyword(pk.text) == Some(Keyword::Is) {
                self.lexer.next()?;
                let ty = self.expect(TokenKind::Identifier, "a type")?;
                type_name = Some(ty.text.to_owned());
            }
            list.push(ArgDecl {
                name: name.text.to_owned(),
                type_name,
            });

            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RParen) {
                break;
            }
            if !pk.is(TokenKind::Comma) {
                return Err(self.err_at("expected a comma", &pk));
            }
            self.lexer.next()?;
        }
        Ok(list)
    }

    // object NAME [inherits PARENT] { NAME [= EXPR] ; ... }
    fn parse_object(&mut self) -> RunResult<Stmt> {
        let name = self.expect(TokenKind::Identifier, "an identifier")?;

        let mut parent = None;
        let pk = self.lexer.peek()?;
        if pk.is(TokenKind::Identifier) && keyword(pk.text) == Some(Keyword::Inherits) {
            self.lexer.next()?;
            let p = self.expect(TokenKind::Identifier, "a type")?;
            parent = Some(p.text.to_owned());
        }

        self.expect(TokenKind::LBrack, "a '{'")?;
        let mut members = Vec::new();
        loop {
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RBrack) {
                self.lexer.next()?;
                break;
            }
            if pk.is(TokenKind::Eof) {
                return Err(self.err_at("expected a '}'", &pk));
            }
            let member = self.expect(TokenKind::Identifier, "an identifier")?;
            let pk = self.lexer.peek()?;
            let init = if pk.is(TokenKind::Op) && pk.text == "=" {
                self.lexer.next()?;
                Some(Rc::new(self.require_expression()?))
            } else {
                None
            };
            self.expect(TokenKind::Eos, "a ';'")?;
            members.push(MemberDecl {
                name: member.text.to_owned(),
                init,
            });
        }

        Ok(Stmt::ObjectDef {
            name: name.text.to_owned(),
            parent,
            members,
        })
    }

    // @import NAME | @loadlib "PATH"
    fn parse_directive(&mut self) -> RunResult<Stmt> {
        let name = self.expect(TokenKind::Identifier, "a directive name")?;
        match name.text {
            "import" => {
                let module = self.expect(TokenKind::Identifier, "a module name")?;
                Ok(Stmt::Import(module.text.to_owned()))
            }
            "loadlib" => {
                let path = self.expect(TokenKind::Literal, "a path string")?;
                Ok(Stmt::LoadLib(path.text.to_owned()))
            }
            other => Err(self.err_at(format!("unknown directive '{other}'"), &name)),
        }
    }

    /// A STATEMENT: either a single statement or a brace-delimited block.
    fn parse_block_statement(&mut self) -> RunResult<Stmt> {
        let t = self.lexer.next()?;
        if t.is(TokenKind::Eof) {
            return Err(self.err_at("expected a statement", &t));
        }
        if !t.is(TokenKind::LBrack) {
            return self.parse_statement(t);
        }
        let mut stmts = Vec::new();
        loop {
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RBrack) {
                self.lexer.next()?;
                break;
            }
            if pk.is(TokenKind::Eof) {
                return Err(self.err_at("expected a '}'", &pk));
            }
            let t = self.lexer.next()?;
            stmts.push(self.parse_statement(t)?);
        }
        Ok(Stmt::Block(stmts))
    }

    /// Pratt-style expression parsing over an operand stack and an
    /// operator stack. Operators reduce while the stacked operator binds
    /// at least as tightly (strictly tighter for the right-associative
    /// `=`); postfix member/index/call chains are folded into the operand
    /// as it is read.
    fn parse_expression(&mut self) -> RunResult<Option<Expr>> {
        let mut ostack: Vec<Expr> = Vec::new();
        let mut opstack: Vec<Op> = Vec::new();
        let mut expect_operand = true;

        loop {
            let pk = self.lexer.peek()?;
            match pk.kind {
                TokenKind::Number => {
                    if !expect_operand {
                        return Err(self.err_at("expected an operator", &pk));
                    }
                    let t = self.lexer.next()?;
                    let value: f64 = t
                        .text
                        .parse()
                        .map_err(|_| self.err_at("invalid number literal", &t))?;
                    ostack.push(Expr::Number(value));
                    expect_operand = false;
                }
                TokenKind::Literal => {
                    if !expect_operand {
                        return Err(self.err_at("expected an operator", &pk));
                    }
                    let t = self.lexer.next()?;
                    ostack.push(Expr::Text(t.text.to_owned()));
                    expect_operand = false;
                }
                TokenKind::Identifier => {
                    if !expect_operand {
                        return Err(self.err_at("expected an operator", &pk));
                    }
                    match keyword(pk.text) {
                        Some(Keyword::New) => {
                            self.lexer.next()?;
                            let expr = self.parse_new_expression()?;
                            ostack.push(expr);
                        }
                        Some(_) => return Err(self.err_at("you can't do that here", &pk)),
                        None => {
                            let t = self.lexer.next()?;
                            let id = self.parse_identifier(&t)?;
                            let pk = self.lexer.peek()?;
                            if pk.is(TokenKind::LParen) {
                                if !id.path.is_empty() {
                                    return Err(self.err_at("cannot call a member path", &pk));
                                }
                                self.lexer.next()?;
                                let args = self.parse_call_args()?;
                                self.expect(TokenKind::RParen, "a ')'")?;
                                ostack.push(Expr::Call { name: id.name, args });
                            } else {
                                ostack.push(Expr::Ident(id));
                            }
                        }
                    }
                    expect_operand = false;
                }
                TokenKind::Op => {
                    let text = pk.text;
                    if text == "..." {
                        // Expansion is handled by the call-argument parser.
                        break;
                    }
                    if text == "&" && expect_operand {
                        self.lexer.next()?;
                        let t = self.expect(TokenKind::Identifier, "an identifier")?;
                        ostack.push(Expr::FnAddr(t.text.to_owned()));
                        expect_operand = false;
                        continue;
                    }
                    if text == "++" || text == "--" {
                        self.lexer.next()?;
                        let op = if text == "++" { Op::Incr } else { Op::Decr };
                        if expect_operand {
                            let t = self.expect(TokenKind::Identifier, "an identifier")?;
                            if keyword(t.text).is_some() {
                                return Err(self.err_at("expected an identifier", &t));
                            }
                            let target = self.parse_identifier(&t)?;
                            ostack.push(Expr::IncDec {
                                op,
                                prefix: true,
                                target,
                            });
                            expect_operand = false;
                        } else {
                            match ostack.pop() {
                                Some(Expr::Ident(target)) => ostack.push(Expr::IncDec {
                                    op,
                                    prefix: false,
                                    target,
                                }),
                                _ => return Err(self.err_at(format!("'{text}' requires an identifier"), &pk)),
                            }
                        }
                        continue;
                    }
                    let Some(op) = Op::from_text(text) else {
                        return Err(self.err_at(format!("unknown operator '{text}'"), &pk));
                    };
                    if expect_operand {
                        return Err(self.err_at("expected a value or identifier", &pk));
                    }
                    self.lexer.next()?;
                    while let Some(&top) = opstack.last() {
                        let reduce = top.precedence() > op.precedence()
                            || (top.precedence() == op.precedence() && !op.right_associative());
                        if !reduce {
                            break;
                        }
                        self.make_op_expression(&mut ostack, &mut opstack)?;
                    }
                    opstack.push(op);
                    expect_operand = true;
                }
                // Anything else ends the expression; the caller decides
                // whether what follows is legal.
                _ => break,
            }
        }

        while !opstack.is_empty() {
            self.make_op_expression(&mut ostack, &mut opstack)?;
        }
        if ostack.len() > 1 {
            return Err(self.err_here("expected an operator"));
        }
        Ok(ostack.pop())
    }

    /// Reduces the top operator against the operand stack.
    fn make_op_expression(&mut self, ostack: &mut Vec<Expr>, opstack: &mut Vec<Op>) -> RunResult<()> {
        let Some(op) = opstack.pop() else {
            return Err(self.err_here("not enough arguments"));
        };
        let (Some(rhs), Some(lhs)) = (ostack.pop(), ostack.pop()) else {
            return Err(self.err_here("not enough arguments"));
        };
        let expr = if op == Op::Assign {
            match lhs {
                Expr::Ident(target) => Expr::Assign {
                    target,
                    value: Box::new(rhs),
                },
                _ => return Err(self.err_here("left side of assignment must be an identifier")),
            }
        } else {
            Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
        };
        ostack.push(expr);
        Ok(())
    }

    /// A base name plus its `.field` / `[index]` accessor chain.
    fn parse_identifier(&mut self, t: &Token<'a>) -> RunResult<Ident> {
        let mut id = Ident {
            name: t.text.to_owned(),
            path: SmallVec::new(),
        };
        loop {
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::Op) && pk.text == "." {
                self.lexer.next()?;
                let field = self.expect(TokenKind::Identifier, "an identifier")?;
                id.path.push(Accessor::Field(field.text.to_owned()));
            } else if pk.is(TokenKind::SqLBrack) {
                self.lexer.next()?;
                let index = self.lexer.next()?;
                match index.kind {
                    TokenKind::Number => {
                        let value: usize = index
                            .text
                            .parse()
                            .map_err(|_| self.err_at("invalid index", &index))?;
                        id.path.push(Accessor::Index(value));
                    }
                    TokenKind::Identifier => id.path.push(Accessor::Field(index.text.to_owned())),
                    _ => return Err(self.err_at("expected an identifier or number", &index)),
                }
                self.expect(TokenKind::SqRBrack, "a closing ']'")?;
            } else {
                break;
            }
        }
        Ok(id)
    }

    /// Call-site arguments; each may carry a trailing `...` expansion.
    fn parse_call_args(&mut self) -> RunResult<Vec<CallArg>> {
        let mut args = Vec::new();
        loop {
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RParen) {
                break;
            }
            if pk.is(TokenKind::Eof) {
                return Err(self.err_at("expected a ')'", &pk));
            }
            let expr = self.require_expression()?;
            let mut expand = false;
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::Op) && pk.text == "..." {
                self.lexer.next()?;
                expand = true;
            }
            args.push(CallArg { expr, expand });

            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RParen) {
                break;
            }
            if !pk.is(TokenKind::Comma) {
                return Err(self.err_at("expected a comma", &pk));
            }
            self.lexer.next()?;
        }
        Ok(args)
    }

    // new [ ... ] | new { ... } | new TYPE { ... }
    fn parse_new_expression(&mut self) -> RunResult<Expr> {
        let pk = self.lexer.peek()?;
        match pk.kind {
            TokenKind::SqLBrack => {
                self.lexer.next()?;
                let mut items = Vec::new();
                loop {
                    let pk = self.lexer.peek()?;
                    if pk.is(TokenKind::SqRBrack) {
                        break;
                    }
                    if pk.is(TokenKind::Eof) {
                        return Err(self.err_at("expected a ']'", &pk));
                    }
                    items.push(self.require_expression()?);
                    let pk = self.lexer.peek()?;
                    if pk.is(TokenKind::SqRBrack) {
                        break;
                    }
                    if !pk.is(TokenKind::Comma) {
                        return Err(self.err_at("expected a comma", &pk));
                    }
                    self.lexer.next()?;
                }
                self.expect(TokenKind::SqRBrack, "a ']'")?;
                Ok(Expr::NewArray(items))
            }
            TokenKind::LBrack => Ok(Expr::NewBlob(self.parse_initializer_list()?)),
            TokenKind::Identifier => {
                let t = self.lexer.next()?;
                if keyword(t.text).is_some() {
                    return Err(self.err_at("expected a type", &t));
                }
                let inits = self.parse_initializer_list()?;
                Ok(Expr::NewInstance {
                    type_name: t.text.to_owned(),
                    inits,
                })
            }
            _ => Err(self.err_at("expected a type, '{', or '['", &pk)),
        }
    }

    // { NAME = EXPR, ... }
    fn parse_initializer_list(&mut self) -> RunResult<Vec<Initializer>> {
        self.expect(TokenKind::LBrack, "a '{'")?;
        let mut list = Vec::new();
        loop {
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RBrack) {
                break;
            }
            if pk.is(TokenKind::Eof) {
                return Err(self.err_at("expected a '}'", &pk));
            }
            let name = self.expect(TokenKind::Identifier, "an identifier")?;
            let eq = self.lexer.next()?;
            if !(eq.is(TokenKind::Op) && eq.text == "=") {
                return Err(self.err_at("expected '='", &eq));
            }
            let expr = self.require_expression()?;
            list.push(Initializer {
                name: name.text.to_owned(),
                expr,
            });
            let pk = self.lexer.peek()?;
            if pk.is(TokenKind::RBrack) {
                break;
            }
            if !pk.is(TokenKind::Comma) {
                return Err(self.err_at("expected a comma", &pk));
            }
            self.lexer.next()?;
        }
        self.expect(TokenKind::RBrack, "a '}'")?;
        Ok(list)
    }
}

use std::rc::Rc;

use crate::script::ast::*;
use crate::script::lexer::{tokenize, Token, TokenKind};
use crate::script::ScriptError;

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut parser = Parser { tokens: tokenize(source)?, pos: 0, depth: 0 };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(body)
}

const MAX_NESTING: usize = 200;
const MAX_CHAIN: usize = 2_000;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

enum BinaryKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn binary_operator(punct: &str) -> Option<(u8, BinaryKind)> {
    use BinaryKind::*;
    let operator = match punct {
        "||" => (1, Logical(LogicalOp::Or)),
        "&&" => (2, Logical(LogicalOp::And)),
        "|" => (3, Binary(BinaryOp::BitOr)),
        "^" => (4, Binary(BinaryOp::BitXor)),
        "&" => (5, Binary(BinaryOp::BitAnd)),
        "==" => (6, Binary(BinaryOp::Eq)),
        "!=" => (6, Binary(BinaryOp::NotEq)),
        "===" => (6, Binary(BinaryOp::StrictEq)),
        "!==" => (6, Binary(BinaryOp::StrictNotEq)),
        "<" => (7, Binary(BinaryOp::Lt)),
        ">" => (7, Binary(BinaryOp::Gt)),
        "<=" => (7, Binary(BinaryOp::LtEq)),
        ">=" => (7, Binary(BinaryOp::GtEq)),
        "<<" => (8, Binary(BinaryOp::Shl)),
        ">>" => (8, Binary(BinaryOp::Shr)),
        ">>>" => (8, Binary(BinaryOp::UShr)),
        "+" => (9, Binary(BinaryOp::Add)),
        "-" => (9, Binary(BinaryOp::Sub)),
        "*" => (10, Binary(BinaryOp::Mul)),
        "/" => (10, Binary(BinaryOp::Div)),
        "%" => (10, Binary(BinaryOp::Mod)),
        _ => return None,
    };
    Some(operator)
}

fn assignment_operator(punct: &str) -> Option<Option<BinaryOp>> {
    let operator = match punct {
        "=" => None,
        "+=" => Some(BinaryOp::Add),
        "-=" => Some(BinaryOp::Sub),
        "*=" => Some(BinaryOp::Mul),
        "/=" => Some(BinaryOp::Div),
        "%=" => Some(BinaryOp::Mod),
        "&=" => Some(BinaryOp::BitAnd),
        "|=" => Some(BinaryOp::BitOr),
        "^=" => Some(BinaryOp::BitXor),
        "<<=" => Some(BinaryOp::Shl),
        ">>=" => Some(BinaryOp::Shr),
        ">>>=" => Some(BinaryOp::UShr),
        _ => return None,
    };
    Some(operator)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax { pos: self.peek().pos, message: message.into() }
    }

    fn nested<T>(&mut self, parse: fn(&mut Parser) -> Result<T, ScriptError>) -> Result<T, ScriptError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("Nesting too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.is_punct(punct);
        if found {
            self.advance();
        }
        found
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ScriptError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(format!("Expected {:?}, found {:?}", punct, self.peek().kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ScriptError> {
        match self.advance().kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(self.error(format!("Expected identifier, found {:?}", other))),
        }
    }

    /// Automatic semicolon insertion, restricted to the cases gate scripts rely on.
    fn consume_semicolon(&mut self) -> Result<(), ScriptError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before {
            Ok(())
        } else {
            Err(self.error(format!("Expected \";\", found {:?}", self.peek().kind)))
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        self.nested(Parser::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt, ScriptError> {
        if self.eat_punct("{") {
            return Ok(Stmt::Block(self.block_body()?));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        let keyword = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "var" | "let" | "const" => {
                self.advance();
                let declarations = self.var_declarations()?;
                self.consume_semicolon()?;
                Ok(Stmt::Var(declarations))
            }
            "function" => {
                self.advance();
                let name = self.expect_ident()?;
                Ok(Stmt::Function(self.function_rest(Some(name))?))
            }
            "if" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.is_keyword("else") {
                    self.advance();
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(test, consequent, alternate))
            }
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                Ok(Stmt::While(test, Box::new(self.statement()?)))
            }
            "do" => {
                self.advance();
                let body = Box::new(self.statement()?);
                if !self.is_keyword("while") {
                    return Err(self.error("Expected \"while\" after do body"));
                }
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile(body, test))
            }
            "for" => {
                self.advance();
                self.for_statement()
            }
            "break" | "continue" => {
                self.advance();
                self.consume_semicolon()?;
                Ok(if keyword == "break" { Stmt::Break } else { Stmt::Continue })
            }
            "return" => {
                self.advance();
                let argument = if self.is_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(argument))
            }
            _ => {
                let expr = self.expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.error("Unterminated block"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn var_declarations(&mut self) -> Result<Vec<(String, Option<Expr>)>, ScriptError> {
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") { Some(self.assignment()?) } else { None };
            declarations.push((name, init));
            if !self.eat_punct(",") {
                return Ok(declarations);
            }
        }
    }

    fn for_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.expect_punct("(")?;
        let init = if self.is_punct(";") {
            None
        } else if self.is_keyword("var") || self.is_keyword("let") {
            self.advance();
            Some(Box::new(Stmt::Var(self.var_declarations()?)))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;
        let test = if self.is_punct(";") { None } else { Some(self.expression()?) };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") { None } else { Some(self.expression()?) };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For { init, test, update, body })
    }

    fn function_rest(&mut self, name: Option<String>) -> Result<Rc<FunctionDef>, ScriptError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                params.push(self.expect_ident()?);
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("{")?;
        let body = self.block_body()?;
        Ok(Rc::new(FunctionDef { name, params, body }))
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_punct(",") {
            exprs.push(self.assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        self.nested(Parser::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr, ScriptError> {
        let target = self.conditional()?;
        let operator = match &self.peek().kind {
            TokenKind::Punct(p) => assignment_operator(p),
            _ => None,
        };
        match operator {
            Some(operator) => {
                if !matches!(target, Expr::Ident(_) | Expr::Member(..)) {
                    return Err(self.error("Invalid assignment target"));
                }
                self.advance();
                let value = self.assignment()?;
                Ok(Expr::Assign(operator, Box::new(target), Box::new(value)))
            }
            None => Ok(target),
        }
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let test = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate)))
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        for _ in 0..MAX_CHAIN {
            let (precedence, kind) = match &self.peek().kind {
                TokenKind::Punct(p) => match binary_operator(p) {
                    Some(operator) => operator,
                    None => return Ok(left),
                },
                _ => return Ok(left),
            };
            if precedence < min_precedence {
                return Ok(left);
            }
            self.advance();
            let right = Box::new(self.binary(precedence + 1)?);
            left = match kind {
                BinaryKind::Binary(op) => Expr::Binary(op, Box::new(left), right),
                BinaryKind::Logical(op) => Expr::Logical(op, Box::new(left), right),
            };
        }
        Err(self.error("Operator chain too long"))
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        self.nested(Parser::unary_inner)
    }

    fn unary_inner(&mut self) -> Result<Expr, ScriptError> {
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Ident(name) if name == "typeof" => Some(UnaryOp::Typeof),
            TokenKind::Ident(name) if name == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            return Ok(Expr::Unary(op, Box::new(self.unary()?)));
        }
        if self.is_punct("++") || self.is_punct("--") {
            let delta = if self.is_punct("++") { 1.0 } else { -1.0 };
            self.advance();
            let target = self.unary()?;
            if !matches!(target, Expr::Ident(_) | Expr::Member(..)) {
                return Err(self.error("Invalid update target"));
            }
            return Ok(Expr::Update { delta, prefix: true, target: Box::new(target) });
        }
        let expr = self.call_member()?;
        if (self.is_punct("++") || self.is_punct("--")) && !self.peek().newline_before {
            let delta = if self.is_punct("++") { 1.0 } else { -1.0 };
            if !matches!(expr, Expr::Ident(_) | Expr::Member(..)) {
                return Err(self.error("Invalid update target"));
            }
            self.advance();
            return Ok(Expr::Update { delta, prefix: false, target: Box::new(expr) });
        }
        Ok(expr)
    }

    fn call_member(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        for _ in 0..MAX_CHAIN {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                expr = Expr::Member(Box::new(expr), Box::new(Expr::Str(name.into())));
            } else if self.eat_punct("[") {
                let key = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Member(Box::new(expr), Box::new(key));
            } else if self.eat_punct("(") {
                let mut args = Vec::new();
                if !self.eat_punct(")") {
                    loop {
                        args.push(self.assignment()?);
                        if self.eat_punct(")") {
                            break;
                        }
                        self.expect_punct(",")?;
                    }
                }
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
        Err(self.error("Member chain too long"))
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s.into())),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "this" => Ok(Expr::This),
                "function" => {
                    let name = match &self.peek().kind {
                        TokenKind::Ident(name) => Some(name.clone()),
                        _ => None,
                    };
                    if name.is_some() {
                        self.advance();
                    }
                    Ok(Expr::Function(self.function_rest(name)?))
                }
                _ => Ok(Expr::Ident(name)),
            },
            TokenKind::Punct("(") => {
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                let mut elements = Vec::new();
                while !self.eat_punct("]") {
                    if self.is_punct(",") {
                        self.advance();
                        elements.push(Expr::Ident("undefined".to_string()));
                        continue;
                    }
                    elements.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(elements))
            }
            TokenKind::Punct("{") => {
                let mut properties = Vec::new();
                while !self.eat_punct("}") {
                    let key = match self.advance().kind {
                        TokenKind::Ident(name) | TokenKind::Str(name) => name,
                        TokenKind::Number(n) => crate::script::value::number_to_string(n),
                        other => return Err(self.error(format!("Invalid property key {:?}", other))),
                    };
                    self.expect_punct(":")?;
                    properties.push((key, self.assignment()?));
                    if !self.is_punct("}") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Object(properties))
            }
            other => Err(ScriptError::Syntax { pos: token.pos, message: format!("Unexpected token {:?}", other) }),
        }
    }
}

use std::rc::Rc;

use dncl_core::{Kind, Span, Token};

use crate::ast::{Block, Expr, InfixOp, PrefixOp, Program, StepDirection, Stmt};
use crate::error::{found_text, ParserError, ParserErrorKind};

// Binding power for the precedence-climbing expression parser. `While` sits
// just above `Lowest` so that statement clauses (conditions, loop bounds)
// parse at a level where the clause keywords terminate the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    While,
    Or,
    And,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

// Helper aliases for shorter return types
type LineResult = Result<Vec<Stmt>, ParserError>;
type StmtResult = Result<Stmt, ParserError>;
type BlockResult = Result<Block, ParserError>;
type ExprResult = Result<Expr, ParserError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,

    // Indent depth of the statement line being parsed, needed when a function
    // literal (and therefore a block) appears in expression position.
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|token| token.kind != Kind::Comment)
            .collect();
        if tokens.is_empty() {
            tokens.push(Token::new(Kind::Eof, String::new(), Span::new(0, 0)));
        }

        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // Consumes the whole token sequence; the first error wins, there is no
    // recovery.
    pub fn parse_program(&mut self) -> Result<Program, ParserError> {
        let mut statements = Vec::new();

        self.skip_blank_lines();
        while !self.check(Kind::Eof) {
            match self.cur_indent() {
                Some(0) => {
                    self.advance();
                }
                Some(found) => {
                    return Err(ParserError::new(
                        ParserErrorKind::IndentError { expected: 0, found },
                        self.cur(),
                    ))
                }
                None => return Err(ParserError::unexpected(self.cur(), "行頭")),
            }
            statements.extend(self.parse_statement_line(0)?);
            self.skip_blank_lines();
        }

        let span = statements_span(&statements);
        Ok(Program { statements, span })
    }

    // One logical line; multi-assignment makes this a Vec.
    fn parse_statement_line(&mut self, depth: usize) -> LineResult {
        self.depth = depth;
        match self.cur().kind {
            Kind::If => Ok(vec![self.parse_if(depth)?]),
            Kind::Function if matches!(self.peek().kind, Kind::Word | Kind::Ident) => {
                Ok(vec![self.parse_function(depth)?])
            }
            _ => self.parse_simple_line(depth),
        }
    }

    fn parse_simple_line(&mut self, depth: usize) -> LineResult {
        let expr = self.parse_expression(Precedence::Lowest)?;
        match self.cur().kind {
            Kind::Assign => self.parse_assignments(expr),
            Kind::Wo => Ok(vec![self.parse_for(expr, depth)?]),
            Kind::While => Ok(vec![self.parse_while(expr, depth)?]),
            _ => {
                self.end_of_line()?;
                let span = expr.span();
                Ok(vec![Stmt::Expression { expr, span }])
            }
        }
    }

    fn parse_assignments(&mut self, first: Expr) -> LineResult {
        let mut statements = Vec::new();
        let mut target = first;

        loop {
            if !matches!(target, Expr::Ident { .. } | Expr::Index { .. }) {
                return Err(ParserError::unexpected(
                    self.cur(),
                    "代入先(変数か配列要素)",
                ));
            }
            self.expect(Kind::Assign, "'='")?;
            let value = self.parse_expression(Precedence::Lowest)?;
            let span = target.span().union(value.span());
            statements.push(Stmt::Assign {
                target,
                value,
                span,
            });

            if !self.match_one(Kind::Comma) {
                break;
            }
            target = self.parse_expression(Precedence::Lowest)?;
        }

        self.end_of_line()?;
        Ok(statements)
    }

    fn parse_if(&mut self, depth: usize) -> StmtResult {
        let if_token = self.advance();
        let condition = self.parse_expression(Precedence::While)?;
        self.expect(Kind::Then, "'ならば'")?;
        self.expect(Kind::Colon, "':'")?;
        let consequence = self.parse_block_or_inline(depth)?;
        let alternative = self.parse_alternative(depth)?;

        let end = alternative
            .as_ref()
            .map(|block| block.span)
            .unwrap_or(consequence.span);
        let span = if_token.span.union(end);
        Ok(Stmt::If {
            condition,
            consequence,
            alternative,
            span,
        })
    }

    // An else-if line becomes an alternative block holding a single nested if,
    // so the evaluator only ever sees two-way branches.
    fn parse_alternative(&mut self, depth: usize) -> Result<Option<Block>, ParserError> {
        let saved = self.pos;
        self.skip_blank_lines();

        let continued = matches!(self.cur_indent(), Some(d) if d == depth)
            && matches!(self.peek().kind, Kind::Elif | Kind::Else);
        if !continued {
            self.pos = saved;
            return Ok(None);
        }
        self.advance();

        if self.check(Kind::Elif) {
            let elif_token = self.advance();
            let condition = self.parse_expression(Precedence::While)?;
            self.expect(Kind::Then, "'ならば'")?;
            self.expect(Kind::Colon, "':'")?;
            let consequence = self.parse_block_or_inline(depth)?;
            let alternative = self.parse_alternative(depth)?;

            let end = alternative
                .as_ref()
                .map(|block| block.span)
                .unwrap_or(consequence.span);
            let span = elif_token.span.union(end);
            let nested = Stmt::If {
                condition,
                consequence,
                alternative,
                span,
            };
            Ok(Some(Block {
                statements: vec![nested],
                span,
            }))
        } else {
            self.advance();
            self.expect(Kind::Colon, "':'")?;
            Ok(Some(self.parse_block_or_inline(depth)?))
        }
    }

    fn parse_while(&mut self, condition: Expr, depth: usize) -> StmtResult {
        self.expect(Kind::While, "'の間繰り返す'")?;
        self.expect(Kind::Colon, "':'")?;
        let body = self.parse_block_or_inline(depth)?;
        let span = condition.span().union(body.span);
        Ok(Stmt::While {
            condition,
            body,
            span,
        })
    }

    fn parse_for(&mut self, counter: Expr, depth: usize) -> StmtResult {
        let (name, counter_span) = match counter {
            Expr::Ident { name, span } => (name, span),
            _ => {
                return Err(ParserError::unexpected(
                    self.cur(),
                    "繰り返しのカウンタ変数",
                ))
            }
        };

        self.expect(Kind::Wo, "'を'")?;
        let start = self.parse_expression(Precedence::While)?;
        self.expect(Kind::Kara, "'から'")?;
        let end = self.parse_expression(Precedence::While)?;
        self.expect(Kind::Made, "'まで'")?;
        let step = self.parse_expression(Precedence::While)?;

        let direction = match self.cur().kind {
            Kind::UpTo => StepDirection::Increment,
            Kind::DownTo => StepDirection::Decrement,
            _ => {
                return Err(ParserError::unexpected(
                    self.cur(),
                    "'ずつ増やしながら繰り返す' か 'ずつ減らしながら繰り返す'",
                ))
            }
        };
        self.advance();
        self.expect(Kind::Colon, "':'")?;
        let body = self.parse_block_or_inline(depth)?;

        let span = counter_span.union(body.span);
        Ok(Stmt::For {
            counter: name,
            counter_span,
            start,
            end,
            step,
            direction,
            body,
            span,
        })
    }

    fn parse_function(&mut self, depth: usize) -> StmtResult {
        let fn_token = self.cur().clone();
        let func = self.parse_function_literal(depth)?;
        let name = match &func {
            Expr::FunctionLiteral {
                name: Some(name), ..
            } => name.clone(),
            _ => return Err(ParserError::unexpected(&fn_token, "関数名")),
        };
        self.end_of_line()?;

        let span = func.span();
        Ok(Stmt::Function { name, func, span })
    }

    fn parse_function_literal(&mut self, depth: usize) -> ExprResult {
        let fn_token = self.advance();
        let name = match self.cur().kind {
            Kind::Word | Kind::Ident => Some(self.advance().lexeme),
            _ => None,
        };

        self.expect(Kind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(Kind::RParen) {
            loop {
                match self.cur().kind {
                    Kind::Word | Kind::Ident => params.push(self.advance().lexeme),
                    _ => return Err(ParserError::unexpected(self.cur(), "仮引数名")),
                }
                if !self.match_one(Kind::Comma) {
                    break;
                }
            }
        }
        self.expect(Kind::RParen, "')'")?;
        self.expect(Kind::Wo, "'を'")?;
        self.expect(Kind::Colon, "':'")?;

        let body = self.parse_block_or_inline(depth)?;
        let define_token = self.expect_define(depth)?;

        let span = fn_token.span.union(define_token.span);
        Ok(Expr::FunctionLiteral {
            name,
            params,
            body: Rc::new(body),
            span,
        })
    }

    // The closing と定義する either trails an inline body directly or sits on
    // its own line at the definition's depth.
    fn expect_define(&mut self, depth: usize) -> Result<Token, ParserError> {
        if self.check(Kind::Define) {
            return Ok(self.advance());
        }

        self.skip_blank_lines();
        match self.cur_indent() {
            Some(found) if found == depth => {
                self.advance();
            }
            Some(found) => {
                return Err(ParserError::new(
                    ParserErrorKind::IndentError {
                        expected: depth,
                        found,
                    },
                    self.cur(),
                ))
            }
            None => return Err(ParserError::unexpected(self.cur(), "'と定義する'")),
        }
        self.expect(Kind::Define, "'と定義する'")
    }

    fn parse_block_or_inline(&mut self, parent_depth: usize) -> BlockResult {
        if self.check(Kind::NewLine) {
            self.advance();
            self.parse_block(parent_depth)
        } else {
            let statements = self.parse_statement_line(parent_depth)?;
            let span = statements_span(&statements);
            Ok(Block { statements, span })
        }
    }

    // The first line fixes the block depth, which must be strictly deeper
    // than the enclosing block. Lines at the same depth continue the block, a
    // shallower depth closes it, anything else is an indent error.
    fn parse_block(&mut self, parent_depth: usize) -> BlockResult {
        self.skip_blank_lines();
        let block_depth = match self.cur_indent() {
            Some(depth) if depth > parent_depth => depth,
            Some(found) => {
                return Err(ParserError::new(
                    ParserErrorKind::IndentError {
                        expected: parent_depth + 1,
                        found,
                    },
                    self.cur(),
                ))
            }
            None => {
                return Err(ParserError::unexpected(
                    self.cur(),
                    "インデントされたブロック",
                ))
            }
        };

        let mut statements = Vec::new();
        loop {
            self.advance();
            statements.extend(self.parse_statement_line(block_depth)?);
            self.skip_blank_lines();

            match self.cur_indent() {
                Some(depth) if depth == block_depth => continue,
                Some(depth) if depth <= parent_depth => break,
                Some(found) => {
                    return Err(ParserError::new(
                        ParserErrorKind::IndentError {
                            expected: block_depth,
                            found,
                        },
                        self.cur(),
                    ))
                }
                None => break,
            }
        }

        let span = statements_span(&statements);
        Ok(Block { statements, span })
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ExprResult {
        let mut left = self.parse_prefix()?;
        while precedence < self.cur_precedence() {
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ExprResult {
        match self.cur().kind {
            Kind::Int => {
                let token = self.advance();
                match token.lexeme.parse::<i64>() {
                    Ok(value) => Ok(Expr::Int {
                        value,
                        span: token.span,
                    }),
                    Err(_) => Err(ParserError::new(
                        ParserErrorKind::InvalidIntLiteral {
                            literal: token.lexeme.clone(),
                        },
                        &token,
                    )),
                }
            }
            Kind::Float => {
                let token = self.advance();
                match token.lexeme.parse::<f64>() {
                    Ok(value) => Ok(Expr::Float {
                        value,
                        span: token.span,
                    }),
                    Err(_) => Err(ParserError::new(
                        ParserErrorKind::InvalidFloatLiteral {
                            literal: token.lexeme.clone(),
                        },
                        &token,
                    )),
                }
            }
            Kind::Str => {
                let token = self.advance();
                let chars: Vec<char> = token.lexeme.chars().collect();
                let value: String = chars[1..chars.len() - 1].iter().collect();
                Ok(Expr::Str {
                    value,
                    span: token.span,
                })
            }
            Kind::True | Kind::False => {
                let token = self.advance();
                Ok(Expr::Bool {
                    value: token.kind == Kind::True,
                    span: token.span,
                })
            }
            Kind::Ident | Kind::Word => {
                let token = self.advance();
                Ok(Expr::Ident {
                    name: token.lexeme,
                    span: token.span,
                })
            }
            Kind::Minus | Kind::Plus | Kind::Bang => {
                let token = self.advance();
                let op = match token.kind {
                    Kind::Minus => PrefixOp::Minus,
                    Kind::Plus => PrefixOp::Plus,
                    _ => PrefixOp::Not,
                };
                let right = self.parse_expression(Precedence::Prefix)?;
                let span = token.span.union(right.span());
                Ok(Expr::Prefix {
                    op,
                    right: Box::new(right),
                    span,
                })
            }
            Kind::LParen => {
                let open = self.advance();
                let mut expr = self.parse_expression(Precedence::Lowest)?;
                let close = self.expect(Kind::RParen, "')'")?;
                // No grouping node; the parens only widen the inner span
                *expr.span_mut() = open.span.union(close.span);
                Ok(expr)
            }
            Kind::LBracket => self.parse_array_literal(),
            Kind::LLenticular => self.parse_system_literal(),
            Kind::Function => {
                let depth = self.depth;
                self.parse_function_literal(depth)
            }
            _ => Err(ParserError::new(
                ParserErrorKind::UnknownPrefixOperator {
                    literal: found_text(self.cur()),
                },
                self.cur(),
            )),
        }
    }

    fn parse_array_literal(&mut self) -> ExprResult {
        let open = self.advance();
        let mut elements = Vec::new();
        if !self.check(Kind::RBracket) {
            loop {
                elements.push(self.parse_expression(Precedence::Lowest)?);
                if !self.match_one(Kind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(Kind::RBracket, "']'")?;
        Ok(Expr::Array {
            elements,
            span: open.span.union(close.span),
        })
    }

    // The text between the lenticular brackets may lex as several tokens
    // (keywords included); any run of tokens up to the closing bracket is
    // accepted.
    fn parse_system_literal(&mut self) -> ExprResult {
        let open = self.advance();
        loop {
            match self.cur().kind {
                Kind::RLenticular => break,
                Kind::NewLine | Kind::Eof => {
                    return Err(ParserError::unexpected(self.cur(), "'】'"))
                }
                _ => {
                    self.advance();
                }
            }
        }
        let close = self.advance();
        Ok(Expr::SystemInput {
            span: open.span.union(close.span),
        })
    }

    fn parse_infix(&mut self, left: Expr) -> ExprResult {
        match self.cur().kind {
            Kind::LParen => self.parse_call(left),
            Kind::LBracket => self.parse_index(left),
            Kind::Plus
            | Kind::Minus
            | Kind::Asterisk
            | Kind::Slash
            | Kind::IntDiv
            | Kind::Percent
            | Kind::Eq
            | Kind::NotEq
            | Kind::Lt
            | Kind::Gt
            | Kind::LtEq
            | Kind::GtEq
            | Kind::And
            | Kind::Or => {
                let token = self.advance();
                let op = infix_op(token.kind);
                let right = self.parse_expression(Parser::precedence_of(token.kind))?;
                let span = left.span().union(right.span());
                Ok(Expr::Infix {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                })
            }
            _ => Err(ParserError::new(
                ParserErrorKind::UnknownInfixOperator {
                    literal: found_text(self.cur()),
                },
                self.cur(),
            )),
        }
    }

    fn parse_call(&mut self, function: Expr) -> ExprResult {
        self.advance();
        let mut args = Vec::new();
        if !self.check(Kind::RParen) {
            loop {
                args.push(self.parse_expression(Precedence::Lowest)?);
                if !self.match_one(Kind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(Kind::RParen, "')'")?;
        let span = function.span().union(close.span);
        Ok(Expr::Call {
            function: Box::new(function),
            args,
            span,
        })
    }

    fn parse_index(&mut self, left: Expr) -> ExprResult {
        self.advance();
        let index = self.parse_expression(Precedence::Lowest)?;
        let close = self.expect(Kind::RBracket, "']'")?;
        let span = left.span().union(close.span);
        Ok(Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
            span,
        })
    }

    fn cur_precedence(&self) -> Precedence {
        Parser::precedence_of(self.cur().kind)
    }

    fn precedence_of(kind: Kind) -> Precedence {
        match kind {
            Kind::Or => Precedence::Or,
            Kind::And => Precedence::And,
            Kind::Eq | Kind::NotEq => Precedence::Equals,
            Kind::Lt | Kind::Gt | Kind::LtEq | Kind::GtEq => Precedence::LessGreater,
            Kind::Plus | Kind::Minus => Precedence::Sum,
            Kind::Asterisk | Kind::Slash | Kind::IntDiv | Kind::Percent => Precedence::Product,
            Kind::LParen => Precedence::Call,
            Kind::LBracket => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }

    fn end_of_line(&mut self) -> Result<(), ParserError> {
        match self.cur().kind {
            Kind::NewLine => {
                self.advance();
                Ok(())
            }
            Kind::Eof | Kind::Define => Ok(()),
            _ => Err(ParserError::unexpected(self.cur(), "行末")),
        }
    }

    fn skip_blank_lines(&mut self) {
        loop {
            match self.cur().kind {
                Kind::NewLine => {
                    self.advance();
                }
                Kind::Indent(_) if matches!(self.peek().kind, Kind::NewLine) => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn cur_indent(&self) -> Option<usize> {
        match self.cur().kind {
            Kind::Indent(depth) => Some(depth),
            _ => None,
        }
    }

    // At eof this keeps returning the eof token instead of running off the
    // end; every loop checks for eof explicitly.
    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: Kind) -> bool {
        self.cur().kind == kind
    }

    fn match_one(&mut self, kind: Kind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: Kind, expected: &str) -> Result<Token, ParserError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParserError::unexpected(self.cur(), expected))
        }
    }
}

fn statements_span(statements: &[Stmt]) -> Span {
    match (statements.first(), statements.last()) {
        (Some(first), Some(last)) => first.span().union(last.span()),
        _ => Span::new(0, 0),
    }
}

fn infix_op(kind: Kind) -> InfixOp {
    match kind {
        Kind::Plus => InfixOp::Add,
        Kind::Minus => InfixOp::Sub,
        Kind::Asterisk => InfixOp::Mul,
        Kind::Slash => InfixOp::Div,
        Kind::IntDiv => InfixOp::IntDiv,
        Kind::Percent => InfixOp::Rem,
        Kind::Eq => InfixOp::Eq,
        Kind::NotEq => InfixOp::NotEq,
        Kind::Lt => InfixOp::Lt,
        Kind::Gt => InfixOp::Gt,
        Kind::LtEq => InfixOp::LtEq,
        Kind::GtEq => InfixOp::GtEq,
        Kind::And => InfixOp::And,
        Kind::Or => InfixOp::Or,
        _ => unreachable!("not an infix operator: {:?}", kind),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ParserErrorKind;
    use crate::parser::Parser;
    use dncl_core::{LexerError, Scanner, Token};

    fn parse_literal(src: &str) -> String {
        let tokens: Result<Vec<Token>, LexerError> = Scanner::new().scan_tokens(src).collect();
        let mut parser = Parser::new(tokens.unwrap());
        parser.parse_program().unwrap().literal()
    }

    fn parse_err(src: &str) -> ParserErrorKind {
        let tokens: Result<Vec<Token>, LexerError> = Scanner::new().scan_tokens(src).collect();
        let mut parser = Parser::new(tokens.unwrap());
        parser.parse_program().unwrap_err().kind
    }

    #[test]
    fn test_expression_precedence() {
        let tests = [
            ("1 + 2 * 3", "(1 + (2 * 3))"),
            ("(1 + 2) * 3", "((1 + 2) * 3)"),
            ("1 + 2 - 3", "((1 + 2) - 3)"),
            ("-a * b", "((-a) * b)"),
            ("!x == false", "((!x) == false)"),
            ("a + b / 2 % c", "(a + ((b / 2) % c))"),
            ("5 // 2 + 1", "((5 // 2) + 1)"),
            ("a < b == b >= c", "((a < b) == (b >= c))"),
            ("a && b || c", "((a && b) || c)"),
            ("x == 1 || y == 2 && z", "((x == 1) || ((y == 2) && z))"),
            ("f(1, 2 + 3)[0]", "(f(1, (2 + 3))[0])"),
            ("配列[i + 1] * 2", "((配列[(i + 1)]) * 2)"),
        ];

        for (src, expected) in tests {
            assert_eq!(parse_literal(src), expected, "source: {}", src);
        }
    }

    #[test]
    fn test_statements() {
        let tests = [
            ("x = 1 + 2", "x = (1 + 2)"),
            ("x = 1, y = 2", "x = 1; y = 2"),
            ("a[0] = 5", "(a[0]) = 5"),
            ("表示する(1)", "表示する(1)"),
            ("x = [1, 2.5, \"a\"]", "x = [1, 2.5, \"a\"]"),
            ("x = 【外部からの入力】", "x = 【外部からの入力】"),
            (
                "n < 10 の間繰り返す: n = n + 1",
                "(n < 10) の間繰り返す: n = (n + 1)",
            ),
            (
                "i を 0 から 9 まで 1 ずつ増やしながら繰り返す: 表示する(i)",
                "i を 0 から 9 まで 1 ずつ増やしながら繰り返す: 表示する(i)",
            ),
            (
                "i を 9 から 0 まで 3 ずつ減らしながら繰り返す: 表示する(i)",
                "i を 9 から 0 まで 3 ずつ減らしながら繰り返す: 表示する(i)",
            ),
        ];

        for (src, expected) in tests {
            assert_eq!(parse_literal(src), expected, "source: {}", src);
        }
    }

    #[test]
    fn test_if_with_indented_blocks() {
        let src = "もし x < 3 ならば:\n\
                   　表示する(1)\n\
                   　表示する(2)\n\
                   そうでなければ:\n\
                   　表示する(3)\n";
        assert_eq!(
            parse_literal(src),
            "もし (x < 3) ならば: 表示する(1); 表示する(2) そうでなければ: 表示する(3)"
        );
    }

    #[test]
    fn test_elif_desugars_to_nested_if() {
        let src = "もし x == 1 ならば:\n\
                   　表示する(1)\n\
                   そうでなくもし x == 2 ならば:\n\
                   　表示する(2)\n\
                   そうでなければ:\n\
                   　表示する(3)\n";
        assert_eq!(
            parse_literal(src),
            "もし (x == 1) ならば: 表示する(1) そうでなければ: \
             もし (x == 2) ならば: 表示する(2) そうでなければ: 表示する(3)"
        );
    }

    #[test]
    fn test_nested_blocks() {
        let src = "もし a ならば:\n\
                   　もし b ならば:\n\
                   　　表示する(1)\n\
                   　表示する(2)\n";
        assert_eq!(
            parse_literal(src),
            "もし a ならば: もし b ならば: 表示する(1); 表示する(2)"
        );
    }

    #[test]
    fn test_function_definition() {
        let src = "関数 二倍(x) を:\n\
                   　戻り値(x * 2)\n\
                   と定義する\n\
                   表示する(二倍(4))\n";
        assert_eq!(
            parse_literal(src),
            "関数 二倍(x) を: 戻り値((x * 2)) と定義する; 表示する(二倍(4))"
        );
    }

    #[test]
    fn test_inline_function_definition() {
        assert_eq!(
            parse_literal("関数 恒等(x) を: 戻り値(x) と定義する"),
            "関数 恒等(x) を: 戻り値(x) と定義する"
        );
    }

    #[test]
    fn test_indent_error_on_missing_block() {
        assert_eq!(
            parse_err("もし 1 ならば:\n表示する(1)\n"),
            ParserErrorKind::IndentError {
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn test_indent_error_on_bad_dedent() {
        let src = "もし 1 ならば:\n\
                   　　表示する(1)\n\
                   　表示する(2)\n";
        assert_eq!(
            parse_err(src),
            ParserErrorKind::IndentError {
                expected: 4,
                found: 2
            }
        );
    }

    #[test]
    fn test_invalid_int_literal() {
        assert_eq!(
            parse_err("x = 99999999999999999999"),
            ParserErrorKind::InvalidIntLiteral {
                literal: String::from("99999999999999999999")
            }
        );
    }

    #[test]
    fn test_unknown_prefix_operator() {
        assert_eq!(
            parse_err("x = * 2"),
            ParserErrorKind::UnknownPrefixOperator {
                literal: String::from("*")
            }
        );
    }

    #[test]
    fn test_unexpected_token() {
        assert_eq!(
            parse_err("x = (1 + 2"),
            ParserErrorKind::UnexpectedToken {
                expected: String::from("')'"),
                found: String::from("ファイル終端")
            }
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            parse_err("1 + 2 = 3"),
            ParserErrorKind::UnexpectedToken {
                expected: String::from("代入先(変数か配列要素)"),
                found: String::from("=")
            }
        );
    }

    #[test]
    fn test_node_spans_contain_children() {
        let tokens: Result<Vec<Token>, LexerError> =
            Scanner::new().scan_tokens("x = 1 + (2 * 3)").collect();
        let mut parser = Parser::new(tokens.unwrap());
        let program = parser.parse_program().unwrap();

        let stmt = &program.statements[0];
        let crate::ast::Stmt::Assign { target, value, span } = stmt else {
            panic!("expected assignment");
        };
        assert!(span.start <= target.span().start);
        assert!(span.end >= value.span().end);
        assert!(program.span.start <= span.start && program.span.end >= span.end);
    }
}

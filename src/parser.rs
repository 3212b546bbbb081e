use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::{ASTNode, Expr, Function, Prototype};
use crate::lexer::{CharSource, Lexer, Token};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("expected an identifier, number or '(' to start an expression, found {0}")]
    ExpectedPrimary(Token),
    #[error("expected ')' to close the parenthesized expression, found {0}")]
    ExpectedCloseParen(Token),
    #[error("expected ')' or ',' in the argument list of '{0}', found {1}")]
    ExpectedArgumentSeparator(String, Token),
    #[error("expected a function name in the prototype, found {0}")]
    ExpectedFunctionName(Token),
    #[error("expected '(' after '{0}' in the prototype, found {1}")]
    ExpectedPrototypeOpen(String, Token),
    #[error("expected ')' to close the parameters of '{0}', found {1}")]
    ExpectedPrototypeClose(String, Token),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

pub type ParseResult<T> = Result<T, ParseError>;

lazy_static! {
    static ref BINOP_PRECEDENCE: HashMap<char, i32> = {
        let mut precedence = HashMap::new();
        precedence.insert('<', 10);
        precedence.insert('+', 20);
        precedence.insert('-', 20);
        precedence.insert('*', 40);
        precedence
    };
    // longest prefix that reads as a decimal number, strtod style
    static ref NUMBER_RE: Regex = Regex::new(r"^(\d+\.?\d*|\.\d+)").unwrap();
}

/// Deepest expression tree, and deepest parenthesis or call nesting, the
/// parser builds.
pub const MAX_EXPR_DEPTH: usize = 512;

fn check_depth(depth: usize) -> ParseResult<usize> {
    if depth > MAX_EXPR_DEPTH {
        Err(ParseError::TooDeep(MAX_EXPR_DEPTH))
    } else {
        Ok(depth)
    }
}

/// Converts the raw text of a number token. `1.2.3` reads as `1.2`.
fn parse_number_text(text: &str) -> ParseResult<f64> {
    NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))
}

/// Recursive descent parser over a pull-based lexer with one token of lookahead.
pub struct Parser<S> {
    lexer: Lexer<S>,
    current: Token,
    nesting: usize,
}

impl<'a> Parser<std::str::Chars<'a>> {
    pub fn from_str(input: &'a str) -> Self {
        Parser::new(Lexer::from_str(input))
    }
}

impl<S: CharSource> Parser<S> {
    pub fn new(mut lexer: Lexer<S>) -> Self {
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            nesting: 0,
        }
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    fn next_token(&mut self) -> &Token {
        self.current = self.lexer.next_token();
        &self.current
    }

    /// Parses the next statement. Returns `None` once the input is exhausted.
    ///
    /// A failed statement skips the offending token so the following call
    /// picks up with the rest of the input.
    pub fn step(&mut self) -> Option<ParseResult<ASTNode>> {
        while self.current.is_operator(';') {
            self.next_token();
        }

        let result = match self.current {
            Token::Eof => return None,
            Token::Def => self.parse_definition().map(ASTNode::Definition),
            Token::Extern => self.parse_extern().map(ASTNode::Extern),
            _ => self.parse_top_level().map(ASTNode::TopLevel),
        };

        match &result {
            Ok(node) => tracing::debug!("parsed {}", node),
            Err(err) => {
                tracing::debug!("skipping {} after error: {}", self.current, err);
                self.next_token();
            }
        }
        Some(result)
    }

    pub fn parse_definition(&mut self) -> ParseResult<Function> {
        // eat 'def'
        self.next_token();
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { prototype, body })
    }

    pub fn parse_extern(&mut self) -> ParseResult<Prototype> {
        // eat 'extern'
        self.next_token();
        self.parse_prototype()
    }

    /// wraps a bare expression in an anonymous function
    pub fn parse_top_level(&mut self) -> ParseResult<Function> {
        let body = self.parse_expression()?;
        Ok(Function {
            prototype: Prototype::anonymous(),
            body,
        })
    }

    /// `name(arg1 arg2 ...)`, parameters are not comma separated
    pub fn parse_prototype(&mut self) -> ParseResult<Prototype> {
        let name = match &self.current {
            Token::Identifier(name) => name.clone(),
            tok => return Err(ParseError::ExpectedFunctionName(tok.clone())),
        };

        if !self.next_token().is_operator('(') {
            return Err(ParseError::ExpectedPrototypeOpen(name, self.current.clone()));
        }

        let mut args = Vec::new();
        while let Token::Identifier(arg) = self.next_token() {
            args.push(arg.clone());
        }

        if !self.current.is_operator(')') {
            return Err(ParseError::ExpectedPrototypeClose(name, self.current.clone()));
        }
        self.next_token();

        Ok(Prototype { name, args })
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.expression().map(|(expr, _)| expr)
    }

    /// precedence of the current token, or -1 if it is not a binary operator
    pub fn get_token_precedence(&self) -> i32 {
        match self.current {
            Token::Operator(op) => BINOP_PRECEDENCE.get(&op).copied().unwrap_or(-1),
            _ => -1,
        }
    }

    // The private parsers below return each expression with the depth of its
    // tree, so lowering, rendering and dropping it stay within the stack.

    fn expression(&mut self) -> ParseResult<(Expr, usize)> {
        let lhs = self.parse_primary()?;
        self.parse_binop_rhs(0, lhs)
    }

    /// parses a sub-expression one nesting level down
    fn nested_expression(&mut self) -> ParseResult<(Expr, usize)> {
        if self.nesting >= MAX_EXPR_DEPTH {
            return Err(ParseError::TooDeep(MAX_EXPR_DEPTH));
        }
        self.nesting += 1;
        let result = self.expression();
        self.nesting -= 1;
        result
    }

    fn parse_binop_rhs(
        &mut self,
        expr_precedence: i32,
        lhs: (Expr, usize),
    ) -> ParseResult<(Expr, usize)> {
        let (mut lhs, mut lhs_depth) = lhs;
        loop {
            let precedence = self.get_token_precedence();
            if precedence < expr_precedence {
                return Ok((lhs, lhs_depth));
            }

            let op = match self.current {
                Token::Operator(op) => op,
                _ => unreachable!("only operators have a precedence"),
            };
            self.next_token();

            let mut rhs = self.parse_primary()?;

            // a tighter binding operator after the rhs takes the rhs as its own lhs
            if precedence < self.get_token_precedence() {
                rhs = self.parse_binop_rhs(precedence + 1, rhs)?;
            }

            let (rhs, rhs_depth) = rhs;
            lhs_depth = check_depth(lhs_depth.max(rhs_depth) + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_primary(&mut self) -> ParseResult<(Expr, usize)> {
        match &self.current {
            Token::Identifier(_) => self.parse_identifier(),
            Token::Number(_) => self.parse_number(),
            Token::Operator('(') => self.parse_nested(),
            tok => Err(ParseError::ExpectedPrimary(tok.clone())),
        }
    }

    fn parse_number(&mut self) -> ParseResult<(Expr, usize)> {
        let value = match &self.current {
            Token::Number(text) => parse_number_text(text)?,
            _ => unreachable!(),
        };
        self.next_token();
        Ok((Expr::Number(value), 1))
    }

    fn parse_nested(&mut self) -> ParseResult<(Expr, usize)> {
        // eat '('
        self.next_token();
        let expr = self.nested_expression()?;
        if !self.current.is_operator(')') {
            return Err(ParseError::ExpectedCloseParen(self.current.clone()));
        }
        self.next_token();
        Ok(expr)
    }

    fn parse_identifier(&mut self) -> ParseResult<(Expr, usize)> {
        let name = match &self.current {
            Token::Identifier(name) => name.clone(),
            _ => unreachable!(),
        };

        if !self.next_token().is_operator('(') {
            return Ok((Expr::Variable(name), 1));
        }
        self.next_token();

        let mut args = Vec::new();
        let mut depth = 0;
        if !self.current.is_operator(')') {
            loop {
                let (arg, arg_depth) = self.nested_expression()?;
                args.push(arg);
                depth = depth.max(arg_depth);

                if self.current.is_operator(')') {
                    break;
                }
                if !self.current.is_operator(',') {
                    return Err(ParseError::ExpectedArgumentSeparator(
                        name,
                        self.current.clone(),
                    ));
                }
                self.next_token();
            }
        }
        // eat ')'
        self.next_token();

        Ok((Expr::Call(name, args), check_depth(depth + 1)?))
    }
}

impl<S: CharSource> Iterator for Parser<S> {
    type Item = ParseResult<ASTNode>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// parse every statement in `input`, stopping at the first syntax error
pub fn parse_str(input: &str) -> ParseResult<Vec<ASTNode>> {
    Parser::from_str(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    fn top_level(input: &str) -> Expr {
        match Parser::from_str(input).step() {
            Some(Ok(ASTNode::TopLevel(func))) => {
                assert!(func.prototype.is_anonymous());
                func.body
            }
            other => panic!("expected a top-level expression, got {:?}", other),
        }
    }

    #[test]
    fn precedence_table() {
        for (input, expected) in &[("<", 10), ("+", 20), ("-", 20), ("*", 40)] {
            assert_eq!(Parser::from_str(input).get_token_precedence(), *expected);
        }
        for input in &["/", "=", ">", "!", "(", ",", ";", "x", "1"] {
            assert_eq!(Parser::from_str(input).get_token_precedence(), -1);
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            top_level("(a + b) * c"),
            Expr::binary('*', Expr::binary('+', var("a"), var("b")), var("c"))
        );
    }

    #[test]
    fn tighter_operator_extends_rhs() {
        assert_eq!(
            top_level("a + b * c"),
            Expr::binary('+', var("a"), Expr::binary('*', var("b"), var("c")))
        );
    }

    #[test]
    fn equal_precedence_binds_left() {
        assert_eq!(
            top_level("a - b - c"),
            Expr::binary('-', Expr::binary('-', var("a"), var("b")), var("c"))
        );
        assert_eq!(
            top_level("a - b + c"),
            Expr::binary('+', Expr::binary('-', var("a"), var("b")), var("c"))
        );
    }

    #[test]
    fn mixed_precedence_chain() {
        // a < ((b + (c * d)) - e)
        assert_eq!(
            top_level("a < b + c * d - e"),
            Expr::binary(
                '<',
                var("a"),
                Expr::binary(
                    '-',
                    Expr::binary('+', var("b"), Expr::binary('*', var("c"), var("d"))),
                    var("e")
                )
            )
        );
    }

    #[test]
    fn expression_stops_at_unknown_operator() {
        let mut parser = Parser::from_str("a + b / c");
        assert_eq!(
            parser.parse_expression(),
            Ok(Expr::binary('+', var("a"), var("b")))
        );
        assert_eq!(parser.current(), &Token::Operator('/'));
    }

    #[test]
    fn top_level_call() {
        let expected = ASTNode::TopLevel(Function {
            prototype: Prototype::anonymous(),
            body: Expr::binary(
                '+',
                var("a"),
                Expr::Call("my_func".to_string(), vec![var("b"), var("c")]),
            ),
        });
        assert_eq!(parse_str("a + my_func(b, c)"), Ok(vec![expected]));
    }

    #[test]
    fn call_arguments_are_expressions() {
        assert_eq!(
            top_level("f(a * 2, g(), (b))"),
            Expr::Call(
                "f".to_string(),
                vec![
                    Expr::binary('*', var("a"), Expr::Number(2.0)),
                    Expr::Call("g".to_string(), vec![]),
                    var("b"),
                ]
            )
        );
    }

    #[test]
    fn extern_parameters_are_adjacent() {
        assert_eq!(
            parse_str("extern my_func(a b)"),
            Ok(vec![ASTNode::Extern(Prototype::new("my_func", &["a", "b"]))])
        );
    }

    #[test]
    fn comma_in_prototype_is_rejected() {
        let mut parser = Parser::from_str("extern my_func(a, b)");
        assert_eq!(
            parser.parse_extern(),
            Err(ParseError::ExpectedPrototypeClose(
                "my_func".to_string(),
                Token::Operator(',')
            ))
        );
    }

    #[test]
    fn duplicate_parameters_parse() {
        assert_eq!(
            parse_str("extern f(x x)"),
            Ok(vec![ASTNode::Extern(Prototype::new("f", &["x", "x"]))])
        );
    }

    #[test]
    fn definition() {
        let mut parser = Parser::from_str("def my_func(a b c)\n\r\t(a + b) * c");
        let expected = Function {
            prototype: Prototype::new("my_func", &["a", "b", "c"]),
            body: Expr::binary('*', Expr::binary('+', var("a"), var("b")), var("c")),
        };
        assert_eq!(parser.step(), Some(Ok(ASTNode::Definition(expected))));
        assert_eq!(parser.step(), None);
    }

    #[test]
    fn numbers_convert_like_strtod() {
        assert_eq!(top_level("1.5"), Expr::Number(1.5));
        assert_eq!(top_level(".25"), Expr::Number(0.25));
        assert_eq!(top_level("4."), Expr::Number(4.0));
        assert_eq!(top_level("1.2.3"), Expr::Number(1.2));
        assert_eq!(
            Parser::from_str("..").parse_expression(),
            Err(ParseError::InvalidNumber("..".to_string()))
        );
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(
            Parser::from_str("(a + b").parse_expression(),
            Err(ParseError::ExpectedCloseParen(Token::Eof))
        );
        assert_eq!(
            Parser::from_str("a +").parse_expression(),
            Err(ParseError::ExpectedPrimary(Token::Eof))
        );
        assert_eq!(
            Parser::from_str("f(a b)").parse_expression(),
            Err(ParseError::ExpectedArgumentSeparator(
                "f".to_string(),
                Token::Identifier("b".to_string())
            ))
        );
        assert_eq!(
            Parser::from_str("def 1(x) x").parse_definition(),
            Err(ParseError::ExpectedFunctionName(Token::Number("1".to_string())))
        );
        assert_eq!(
            Parser::from_str("extern f x").parse_extern(),
            Err(ParseError::ExpectedPrototypeOpen(
                "f".to_string(),
                Token::Identifier("x".to_string())
            ))
        );
    }

    #[test]
    fn error_messages_describe_expectation() {
        let err = Parser::from_str(")").parse_expression().unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected an identifier, number or '(' to start an expression, found ')'"
        );
    }

    #[test]
    fn semicolons_are_separators() {
        let nodes = parse_str(";;x; ;y;").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[1],
            ASTNode::TopLevel(Function {
                prototype: Prototype::anonymous(),
                body: var("y"),
            })
        );
    }

    #[test]
    fn step_recovers_after_error() {
        let mut parser = Parser::from_str("def (x) x; extern sin(a); 1 + 2");
        assert_eq!(
            parser.step(),
            Some(Err(ParseError::ExpectedFunctionName(Token::Operator('('))))
        );

        // the rest of the broken definition parses as whatever it looks like
        let mut recovered = Vec::new();
        while let Some(result) = parser.step() {
            if let Ok(node) = result {
                recovered.push(node);
            }
        }
        assert!(recovered.contains(&ASTNode::Extern(Prototype::new("sin", &["a"]))));
        assert_eq!(
            recovered.last(),
            Some(&ASTNode::TopLevel(Function {
                prototype: Prototype::anonymous(),
                body: Expr::binary('+', Expr::Number(1.0), Expr::Number(2.0)),
            }))
        );
    }

    #[test]
    fn long_flat_expression_is_bounded() {
        let at_limit = format!("1{}", "+1".repeat(MAX_EXPR_DEPTH - 1));
        assert!(parse_str(&at_limit).is_ok());

        let too_long = format!("1{}", "+1".repeat(200_000));
        assert_eq!(
            Parser::from_str(&too_long).parse_expression(),
            Err(ParseError::TooDeep(MAX_EXPR_DEPTH))
        );
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let parens = format!("{}1", "(".repeat(100_000));
        assert_eq!(
            Parser::from_str(&parens).parse_expression(),
            Err(ParseError::TooDeep(MAX_EXPR_DEPTH))
        );

        let calls = format!("{}1", "f(".repeat(100_000));
        assert_eq!(
            Parser::from_str(&calls).parse_expression(),
            Err(ParseError::TooDeep(MAX_EXPR_DEPTH))
        );

        let right_nested = format!(
            "{}1{}",
            "a * (".repeat(MAX_EXPR_DEPTH),
            ")".repeat(MAX_EXPR_DEPTH)
        );
        assert_eq!(
            Parser::from_str(&right_nested).parse_expression(),
            Err(ParseError::TooDeep(MAX_EXPR_DEPTH))
        );
    }

    #[test]
    fn step_survives_too_deep_statement() {
        let src = format!("1{}; 2 * 3", "+1".repeat(MAX_EXPR_DEPTH * 4));
        let mut parser = Parser::from_str(&src);
        assert_eq!(parser.step(), Some(Err(ParseError::TooDeep(MAX_EXPR_DEPTH))));

        let mut last = None;
        for result in parser {
            if let Ok(node) = result {
                last = Some(node);
            }
        }
        assert_eq!(
            last,
            Some(ASTNode::TopLevel(Function {
                prototype: Prototype::anonymous(),
                body: Expr::binary('*', Expr::Number(2.0), Expr::Number(3.0)),
            }))
        );
    }

    #[test]
    fn parse_str_reports_first_error() {
        assert_eq!(
            parse_str("x; )"),
            Err(ParseError::ExpectedPrimary(Token::Operator(')')))
        );
    }
}

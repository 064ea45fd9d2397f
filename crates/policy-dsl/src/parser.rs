//! Parser: recursive descent over the token stream.
//!
//! Operator precedence, loosest to tightest: `or`, `and`, `not`,
//! comparison (`== != > < >= <=` / `in` / `contains` / `matches`), primary.
//! `in` requires a parenthesised list on the right.

use serde_json::Value;

use crate::ast::{ActionDecl, CmpOpAst, DefaultsDecl, Expr, PolicyFileAst, RuleDecl};
use crate::error::{DslError, DslResult};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parser for policy rule files.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse policy source text into its AST.
    pub fn parse(input: &str) -> DslResult<PolicyFileAst> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        parser.parse_file()
    }

    fn parse_file(&mut self) -> DslResult<PolicyFileAst> {
        let mut file = PolicyFileAst::default();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Rule => file.rules.push(self.parse_rule()?),
                TokenKind::Defaults => {
                    if file.defaults.is_some() {
                        return Err(self.error_here("duplicate defaults block"));
                    }
                    file.defaults = Some(self.parse_defaults()?);
                }
                _ => {
                    let tok = self.peek();
                    return Err(DslError::Parse {
                        line: tok.line,
                        col: tok.col,
                        message: format!("expected 'rule' or 'defaults', found '{}'", tok.text),
                    });
                }
            }
        }
        Ok(file)
    }

    fn parse_rule(&mut self) -> DslResult<RuleDecl> {
        let line = self.peek().line;
        self.expect(TokenKind::Rule)?;
        let name = self.expect(TokenKind::StringLiteral)?.text;
        self.expect(TokenKind::OpenBrace)?;

        let mut rule = RuleDecl {
            name,
            priority: 0,
            description: String::new(),
            enabled: true,
            when: Expr::Bool(true),
            actions: Vec::new(),
            line,
        };
        let mut saw_when = false;

        while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
            match self.peek_kind() {
                TokenKind::When => {
                    self.advance();
                    self.expect(TokenKind::OpenBrace)?;
                    rule.when = self.parse_or()?;
                    self.expect(TokenKind::CloseBrace)?;
                    saw_when = true;
                }
                TokenKind::Then => {
                    self.advance();
                    self.expect(TokenKind::OpenBrace)?;
                    while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
                        rule.actions.push(self.parse_action()?);
                    }
                    self.expect(TokenKind::CloseBrace)?;
                }
                TokenKind::Identifier => {
                    let key = self.advance().text;
                    self.expect(TokenKind::Assign)?;
                    match key.as_str() {
                        "priority" => rule.priority = self.expect_integer()?,
                        "description" => {
                            rule.description = self.expect(TokenKind::StringLiteral)?.text;
                        }
                        "enabled" => rule.enabled = self.expect_bool()?,
                        other => {
                            return Err(self.error_here(&format!("unknown rule attribute '{other}'")))
                        }
                    }
                }
                _ => {
                    let tok = self.peek();
                    return Err(DslError::Parse {
                        line: tok.line,
                        col: tok.col,
                        message: format!("unexpected '{}' in rule body", tok.text),
                    });
                }
            }
        }
        self.expect(TokenKind::CloseBrace)?;

        if !saw_when {
            return Err(DslError::Parse {
                line,
                col: 1,
                message: format!("rule \"{}\" is missing a when block", rule.name),
            });
        }
        Ok(rule)
    }

    fn parse_defaults(&mut self) -> DslResult<DefaultsDecl> {
        self.expect(TokenKind::Defaults)?;
        self.expect(TokenKind::OpenBrace)?;
        let mut defaults = DefaultsDecl::default();
        while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
            let key = self.expect(TokenKind::Identifier)?.text;
            self.expect(TokenKind::Assign)?;
            match key.as_str() {
                "decision" => defaults.decision = Some(self.expect(TokenKind::StringLiteral)?.text),
                "required_approvers" => {
                    let n = self.expect_integer()?;
                    let n = u32::try_from(n)
                        .map_err(|_| self.error_here("required_approvers must be non-negative"))?;
                    defaults.required_approvers = Some(n);
                }
                other => {
                    return Err(self.error_here(&format!("unknown defaults attribute '{other}'")))
                }
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(defaults)
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn parse_or(&mut self) -> DslResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> DslResult<Expr> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> DslResult<Expr> {
        if self.check(TokenKind::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> DslResult<Expr> {
        let left = self.parse_primary()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => CmpOpAst::Eq,
            TokenKind::Ne => CmpOpAst::Ne,
            TokenKind::Gt => CmpOpAst::Gt,
            TokenKind::Lt => CmpOpAst::Lt,
            TokenKind::Ge => CmpOpAst::Ge,
            TokenKind::Le => CmpOpAst::Le,
            TokenKind::In => CmpOpAst::In,
            TokenKind::Contains => CmpOpAst::Contains,
            TokenKind::Matches => CmpOpAst::Matches,
            _ => return Ok(left),
        };
        self.advance();

        let right = if op == CmpOpAst::In {
            self.parse_list()?
        } else {
            self.parse_primary()?
        };
        Ok(Expr::Compare { op, left: Box::new(left), right: Box::new(right) })
    }

    fn parse_list(&mut self) -> DslResult<Expr> {
        if !self.check(TokenKind::OpenParen) {
            let tok = self.peek();
            return Err(DslError::Parse {
                line: tok.line,
                col: tok.col,
                message: "'in' requires a parenthesised list".into(),
            });
        }
        self.advance();
        let mut items = Vec::new();
        if !self.check(TokenKind::CloseParen) {
            loop {
                items.push(self.parse_primary()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(Expr::List(items))
    }

    fn parse_primary(&mut self) -> DslResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Ident(tok.text))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expr::Str(tok.text))
            }
            TokenKind::NumberLiteral => {
                self.advance();
                let n: f64 = tok.text.parse().map_err(|_| DslError::Parse {
                    line: tok.line,
                    col: tok.col,
                    message: format!("invalid number '{}'", tok.text),
                })?;
                Ok(Expr::Num(n))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            _ => Err(DslError::Parse {
                line: tok.line,
                col: tok.col,
                message: format!("expected expression, found '{}'", tok.text),
            }),
        }
    }

    // ── Actions ──────────────────────────────────────────────────────

    fn parse_action(&mut self) -> DslResult<ActionDecl> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        let mut action = ActionDecl { name: name_tok.text, args: Vec::new(), line: name_tok.line };

        if self.check(TokenKind::OpenParen) {
            self.advance();
            while !self.check(TokenKind::CloseParen) && !self.check(TokenKind::Eof) {
                let key = self.expect(TokenKind::Identifier)?.text;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_arg_value()?;
                action.args.push((key, value));
                if self.check(TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::CloseParen)?;
        }
        Ok(action)
    }

    fn parse_arg_value(&mut self) -> DslResult<Value> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Value::String(tok.text))
            }
            TokenKind::NumberLiteral => {
                self.advance();
                let n: f64 = tok.text.parse().map_err(|_| DslError::Parse {
                    line: tok.line,
                    col: tok.col,
                    message: format!("invalid number '{}'", tok.text),
                })?;
                Ok(serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number))
            }
            TokenKind::True => {
                self.advance();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Value::Bool(false))
            }
            TokenKind::OpenParen => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::CloseParen) && !self.check(TokenKind::Eof) {
                    items.push(self.parse_arg_value()?);
                    if self.check(TokenKind::Comma) {
                        self.advance();
                    }
                }
                self.expect(TokenKind::CloseParen)?;
                Ok(Value::Array(items))
            }
            _ => Err(DslError::Parse {
                line: tok.line,
                col: tok.col,
                message: format!("expected argument value, found '{}'", tok.text),
            }),
        }
    }

    // ── Token helpers ────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> DslResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek();
            Err(DslError::Parse {
                line: tok.line,
                col: tok.col,
                message: format!("expected {kind}, found '{}'", tok.text),
            })
        }
    }

    fn expect_integer(&mut self) -> DslResult<i64> {
        let tok = self.expect(TokenKind::NumberLiteral)?;
        tok.text.parse::<i64>().map_err(|_| DslError::Parse {
            line: tok.line,
            col: tok.col,
            message: format!("expected integer, found '{}'", tok.text),
        })
    }

    fn expect_bool(&mut self) -> DslResult<bool> {
        match self.peek_kind() {
            TokenKind::True => {
                self.advance();
                Ok(true)
            }
            TokenKind::False => {
                self.advance();
                Ok(false)
            }
            _ => {
                let tok = self.peek();
                Err(DslError::Parse {
                    line: tok.line,
                    col: tok.col,
                    message: format!("expected true or false, found '{}'", tok.text),
                })
            }
        }
    }

    fn error_here(&self, message: &str) -> DslError {
        let tok = self.peek();
        DslError::Parse { line: tok.line, col: tok.col, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_rule() {
        let src = r#"
            rule "breaking-changes" {
              priority = 100
              description = "breaking needs review"
              enabled = true
              when { change.breaking > 0 AND actor.kind != "human" }
              then {
                require_approval(count: 1)
                add_rationale(message: "breaking changes require human approval")
              }
            }
        "#;
        let file = Parser::parse(src).unwrap();
        assert_eq!(file.rules.len(), 1);
        let rule = &file.rules[0];
        assert_eq!(rule.name, "breaking-changes");
        assert_eq!(rule.priority, 100);
        assert!(rule.enabled);
        assert!(matches!(rule.when, Expr::And(_, _)));
        assert_eq!(rule.actions.len(), 2);
        assert_eq!(rule.actions[0].name, "require_approval");
        assert_eq!(rule.actions[0].args[0].0, "count");
    }

    #[test]
    fn precedence_or_below_and() {
        // a == 1 or b == 2 and c == 3  ⇒  Or(a==1, And(b==2, c==3))
        let src = r#"rule "p" { when { a == 1 or b == 2 and c == 3 } then { } }"#;
        let file = Parser::parse(src).unwrap();
        match &file.rules[0].when {
            Expr::Or(left, right) => {
                assert!(matches!(**left, Expr::Compare { .. }));
                assert!(matches!(**right, Expr::And(_, _)));
            }
            other => panic!("expected Or at the top, got {other:?}"),
        }
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let src = r#"rule "p" { when { not a == 1 and b == 2 } then { } }"#;
        let file = Parser::parse(src).unwrap();
        match &file.rules[0].when {
            Expr::And(left, _) => assert!(matches!(**left, Expr::Not(_))),
            other => panic!("expected And at the top, got {other:?}"),
        }
    }

    #[test]
    fn in_requires_list() {
        let ok = r#"rule "p" { when { actor.kind in ("ci", "agent") } then { } }"#;
        let file = Parser::parse(ok).unwrap();
        match &file.rules[0].when {
            Expr::Compare { op: CmpOpAst::In, right, .. } => match &**right {
                Expr::List(items) => assert_eq!(items.len(), 2),
                other => panic!("expected list, got {other:?}"),
            },
            other => panic!("expected in-comparison, got {other:?}"),
        }

        let bad = r#"rule "p" { when { actor.kind in "ci" } then { } }"#;
        let err = Parser::parse(bad).unwrap_err();
        assert!(err.to_string().contains("parenthesised list"), "{err}");
    }

    #[test]
    fn parenthesised_grouping() {
        let src = r#"rule "p" { when { (a == 1 or b == 2) and c == 3 } then { } }"#;
        let file = Parser::parse(src).unwrap();
        match &file.rules[0].when {
            Expr::And(left, _) => assert!(matches!(**left, Expr::Or(_, _))),
            other => panic!("expected And at the top, got {other:?}"),
        }
    }

    #[test]
    fn defaults_block() {
        let src = r#"defaults { decision = "approve" required_approvers = 2 }"#;
        let file = Parser::parse(src).unwrap();
        let d = file.defaults.unwrap();
        assert_eq!(d.decision.as_deref(), Some("approve"));
        assert_eq!(d.required_approvers, Some(2));
    }

    #[test]
    fn missing_when_is_an_error() {
        let err = Parser::parse(r#"rule "p" { then { block(reason: "no") } }"#).unwrap_err();
        assert!(err.to_string().contains("missing a when block"), "{err}");
    }

    #[test]
    fn error_carries_position() {
        let err = Parser::parse("rule \"p\" {\n  bogus = 1\n}").unwrap_err();
        match err {
            DslError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn action_list_argument() {
        let src = r#"rule "p" { when { true } then { add_reviewer(reviewers: ("human:alice", "human:bob")) } }"#;
        let file = Parser::parse(src).unwrap();
        let (_, value) = &file.rules[0].actions[0].args[0];
        assert_eq!(value.as_array().unwrap().len(), 2);
    }
}

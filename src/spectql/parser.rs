use super::ast::*;
use super::error::{ParseError, SpectqlError};
use super::lexer::{Lexer, Token, TokenKind};

/// Recursive-descent parser with one token of lookahead.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, SpectqlError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        Ok(Self::from_tokens(tokens))
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Query, ParseError> {
        let resource = self.parse_resource_path()?;
        let projection = self.parse_projection()?;

        let filter = if self.check(&TokenKind::Question) {
            self.advance();
            Some(self.parse_filter()?)
        } else {
            None
        };

        let format = if self.check(&TokenKind::Colon) {
            self.advance();
            Some(self.parse_identifier("format name")?)
        } else {
            None
        };

        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected_token("'?', ':' or end of query"));
        }

        Ok(Query {
            resource,
            projection,
            filter,
            format,
        })
    }

    fn parse_resource_path(&mut self) -> Result<ResourcePath, ParseError> {
        // Optional leading slash
        if self.check(&TokenKind::Slash) {
            self.advance();
        }

        let mut segments = vec![self.parse_identifier("resource path segment")?];
        while self.check(&TokenKind::Slash) {
            self.advance();
            segments.push(self.parse_identifier("resource path segment")?);
        }

        if segments.len() < 2 {
            return Err(self.unexpected_token("'/' followed by a resource name"));
        }

        Ok(ResourcePath { segments })
    }

    fn parse_projection(&mut self) -> Result<Projection, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;

        if self.check(&TokenKind::Star) {
            self.advance();
            self.expect(TokenKind::RBrace, "'}'")?;
            return Ok(Projection::Wildcard);
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_projection_item()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(TokenKind::RBrace, "',' or '}'")?;
        Ok(Projection::Items(items))
    }

    fn parse_projection_item(&mut self) -> Result<ProjectionItem, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(ProjectionItem::Column(name))
            }
            Some(TokenKind::Function(name)) => {
                let function = name.clone();
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let column = self.parse_identifier("column name")?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(ProjectionItem::Call { function, column })
            }
            _ => Err(self.unexpected_token("'*', column name or function call")),
        }
    }

    fn parse_filter(&mut self) -> Result<FilterExpr, ParseError> {
        let mut predicates = vec![self.parse_condition()?];

        while self.check(&TokenKind::Amp) {
            self.advance();
            predicates.push(self.parse_condition()?);
        }

        Ok(FilterExpr::new(predicates))
    }

    fn parse_condition(&mut self) -> Result<Predicate, ParseError> {
        let column = self.parse_identifier("column name")?;
        let op = self.parse_operator()?;
        let literal = self.parse_literal()?;
        Ok(Predicate { column, op, literal })
    }

    fn parse_operator(&mut self) -> Result<Operator, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::EqEq) => Operator::Eq,
            Some(TokenKind::NotEq) => Operator::NotEq,
            Some(TokenKind::Gt) => Operator::Gt,
            Some(TokenKind::Lt) => Operator::Lt,
            _ => return Err(self.unexpected_token("comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let literal = match self.peek_kind() {
            Some(TokenKind::String(s)) => Literal::String(s.clone()),
            Some(TokenKind::Number(n)) => Literal::Number(*n),
            Some(TokenKind::Identifier(word)) if word == "true" => Literal::Boolean(true),
            Some(TokenKind::Identifier(word)) if word == "false" => Literal::Boolean(false),
            _ => return Err(self.unexpected_token("string, number or boolean literal")),
        };
        self.advance();
        Ok(literal)
    }

    fn parse_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected_token(expected)),
        }
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position).map(|t| &t.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<&Token> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(expected))
        }
    }

    fn unexpected_token(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.position).or_else(|| self.tokens.last()) {
            Some(token) => ParseError {
                token: token.kind.clone(),
                position: token.position,
                expected: expected.to_string(),
            },
            None => ParseError {
                token: TokenKind::Eof,
                position: 0,
                expected: expected.to_string(),
            },
        }
    }
}

/// Tokenizes and parses a query string.
pub fn parse_query(input: &str) -> Result<Query, SpectqlError> {
    let mut parser = Parser::new(input)?;
    Ok(parser.parse()?)
}

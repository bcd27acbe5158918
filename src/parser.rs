use crate::{
    ast::{
        AggregateCall, AggregateFunc, CompOp, Expr, FieldPath, Operand, OutputFormat, Query,
        QueryValue, SelectClause, SelectItem, SelectKind, SortDirection, Token,
    },
    lexer::{LexError, Lexer},
};
use std::mem;

/// Errors that can occur during parsing.
///
/// Parsing produces either a complete query or a single error with the
/// offending source position; partial trees are never returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Lexer error (with position)
    Lex(LexError),
    /// Unexpected token
    UnexpectedToken {
        expected: String,
        got: Token,
        position: usize,
    },
    /// Structurally invalid syntax
    InvalidSyntax { message: String, position: usize },
}

impl ParseError {
    /// Character offset of the failure in the query text.
    pub fn position(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.position,
            ParseError::UnexpectedToken { position, .. } => *position,
            ParseError::InvalidSyntax { position, .. } => *position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Lex(e) => write!(f, "{}", e),
            ParseError::UnexpectedToken {
                expected,
                got,
                position,
            } => write!(
                f,
                "expected {}, got {:?} at position {}",
                expected, got, position
            ),
            ParseError::InvalidSyntax { message, position } => {
                write!(f, "{} at position {}", message, position)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_pos: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let (current_token, current_pos) = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            current_pos,
        })
    }

    /// Convenience constructor from query text.
    pub fn from_query(text: &str) -> Result<Self, ParseError> {
        Parser::new(Lexer::new(text))
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let (token, pos) = self.lexer.next_token()?;
        self.current_token = token;
        self.current_pos = pos;
        Ok(())
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        if mem::discriminant(&self.current_token) != mem::discriminant(&expected) {
            return Err(self.unexpected(what));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            got: self.current_token.clone(),
            position: self.current_pos,
        }
    }

    /// Parse a complete query.
    ///
    /// All clauses are optional. A query that opens with a predicate instead
    /// of a clause keyword is shorthand for `SELECT * WHERE predicate`; the
    /// remaining clauses may still follow it.
    pub fn parse(&mut self) -> Result<Query, ParseError> {
        let select = if self.check(&Token::Select) {
            self.advance()?;
            Some(self.parse_select_clause()?)
        } else {
            None
        };

        let where_clause = if self.check(&Token::Where) {
            self.advance()?;
            Some(self.parse_expression()?)
        } else if select.is_none() && self.starts_comparison() {
            // Bare predicate form
            Some(self.parse_expression()?)
        } else {
            None
        };

        let group_by = if self.check(&Token::Group) {
            self.advance()?;
            self.expect(Token::By, "BY after GROUP")?;
            Some(self.parse_field_list()?)
        } else {
            None
        };

        let having = if self.check(&Token::Having) {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        let order_by = if self.check(&Token::Order) {
            self.advance()?;
            self.expect(Token::By, "BY after ORDER")?;
            Some(self.parse_order_list()?)
        } else {
            None
        };

        let format = if self.check(&Token::Format) {
            self.advance()?;
            Some(self.parse_format_name()?)
        } else {
            None
        };

        if !self.check(&Token::Eof) {
            return Err(self.unexpected("end of query"));
        }

        Ok(Query {
            select,
            where_clause,
            group_by,
            having,
            order_by,
            format,
        })
    }

    fn starts_comparison(&self) -> bool {
        matches!(
            self.current_token,
            Token::Identifier(_) | Token::QualifiedIdentifier(_) | Token::Not | Token::LParen
        )
    }

    // ========================================
    // Projection
    // ========================================

    fn parse_select_clause(&mut self) -> Result<SelectClause, ParseError> {
        let distinct = if self.check(&Token::Distinct) {
            self.advance()?;
            true
        } else {
            false
        };

        let mut items = vec![self.parse_select_item()?];
        while self.check(&Token::Comma) {
            self.advance()?;
            items.push(self.parse_select_item()?);
        }

        Ok(SelectClause { distinct, items })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, ParseError> {
        let kind = match &self.current_token {
            Token::Star => {
                self.advance()?;
                SelectKind::Star
            }
            Token::Identifier(name) if AggregateFunc::from_name(name).is_some() => {
                // Only a call is an aggregate; a bare `count` stays a field
                let func = AggregateFunc::from_name(name).unwrap();
                let name = name.clone();
                self.advance()?;
                if self.check(&Token::LParen) {
                    SelectKind::Aggregate(self.parse_aggregate_call(func)?)
                } else {
                    SelectKind::Field(vec![name])
                }
            }
            Token::Identifier(_) | Token::QualifiedIdentifier(_) => {
                SelectKind::Field(self.parse_field_path()?)
            }
            _ => return Err(self.unexpected("projection item")),
        };

        let alias = if self.check(&Token::As) {
            self.advance()?;
            match mem::replace(&mut self.current_token, Token::Eof) {
                Token::Identifier(name) => {
                    self.advance()?;
                    Some(name)
                }
                token => {
                    self.current_token = token;
                    return Err(self.unexpected("alias name after AS"));
                }
            }
        } else {
            None
        };

        Ok(SelectItem { kind, alias })
    }

    fn parse_aggregate_call(&mut self, func: AggregateFunc) -> Result<AggregateCall, ParseError> {
        let open_pos = self.current_pos;
        self.expect(Token::LParen, "'('")?;

        let distinct = if self.check(&Token::Distinct) {
            self.advance()?;
            true
        } else {
            false
        };

        let field = match &self.current_token {
            Token::Star => {
                if func != AggregateFunc::Count {
                    return Err(ParseError::InvalidSyntax {
                        message: format!("{:?} requires a field argument, not '*'", func),
                        position: self.current_pos,
                    });
                }
                if distinct {
                    return Err(ParseError::InvalidSyntax {
                        message: "COUNT(DISTINCT *) is not defined".to_string(),
                        position: open_pos,
                    });
                }
                self.advance()?;
                None
            }
            Token::Identifier(_) | Token::QualifiedIdentifier(_) => Some(self.parse_field_path()?),
            _ => return Err(self.unexpected("'*' or field name in aggregate")),
        };

        let filter = if self.check(&Token::Where) {
            self.advance()?;
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        self.expect(Token::RParen, "')' closing aggregate")?;

        Ok(AggregateCall {
            func,
            distinct,
            field,
            filter,
        })
    }

    // ========================================
    // Expressions
    // ========================================

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::Or) {
            self.advance()?;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;

        loop {
            if self.check(&Token::And) {
                self.advance()?;
            } else if !self.starts_comparison() {
                // Adjacency of two comparisons composes with AND
                break;
            }
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Not) {
            self.advance()?;
            let operand = self.parse_not()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::LParen) {
            self.advance()?;
            let expr = self.parse_expression()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(expr);
        }

        let operand = self.parse_operand()?;

        if let Some(op) = self.comparison_op() {
            self.advance()?;
            let value = self.parse_value()?;
            return Ok(Expr::Comparison { operand, op, value });
        }

        if self.check(&Token::In) {
            self.advance()?;
            self.expect(Token::LBracket, "'[' opening IN list")?;
            let mut values = vec![self.parse_value()?];
            while self.check(&Token::Comma) {
                self.advance()?;
                values.push(self.parse_value()?);
            }
            self.expect(Token::RBracket, "']' closing IN list")?;
            return Ok(Expr::In { operand, values });
        }

        if self.check(&Token::Like) {
            self.advance()?;
            let pattern = match mem::replace(&mut self.current_token, Token::Eof) {
                Token::Pattern(p) => p,
                Token::String(s) => s,
                Token::Identifier(s) => s,
                Token::Number(s) => s,
                token => {
                    self.current_token = token;
                    return Err(self.unexpected("pattern after LIKE"));
                }
            };
            self.advance()?;
            return Ok(Expr::Like { operand, pattern });
        }

        // Bare field reference: existence probe
        Ok(Expr::Exists(operand))
    }

    fn comparison_op(&self) -> Option<CompOp> {
        match self.current_token {
            Token::Eq | Token::EqEq => Some(CompOp::Eq),
            Token::NotEq => Some(CompOp::NotEq),
            Token::Lt => Some(CompOp::Lt),
            Token::LtEq => Some(CompOp::LtEq),
            Token::Gt => Some(CompOp::Gt),
            Token::GtEq => Some(CompOp::GtEq),
            Token::Match => Some(CompOp::Match),
            _ => None,
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        if let Token::Identifier(name) = &self.current_token {
            if let Some(func) = AggregateFunc::from_name(name) {
                let name = name.clone();
                self.advance()?;
                if self.check(&Token::LParen) {
                    return Ok(Operand::Aggregate(self.parse_aggregate_call(func)?));
                }
                return Ok(Operand::Field(vec![name]));
            }
        }
        Ok(Operand::Field(self.parse_field_path()?))
    }

    fn parse_field_path(&mut self) -> Result<FieldPath, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => {
                self.advance()?;
                Ok(vec![name])
            }
            Token::QualifiedIdentifier(segments) => {
                self.advance()?;
                Ok(segments)
            }
            token => {
                self.current_token = token;
                Err(self.unexpected("field name"))
            }
        }
    }

    // ========================================
    // Values
    // ========================================

    fn parse_value(&mut self) -> Result<QueryValue, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Number(raw) => {
                self.advance()?;
                Ok(QueryValue::Number(raw))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(QueryValue::Str(s))
            }
            Token::Pattern(p) => {
                self.advance()?;
                Ok(QueryValue::Pattern(p))
            }
            Token::Regex(r) => {
                self.advance()?;
                Ok(QueryValue::Regex(r))
            }
            Token::Null => {
                self.advance()?;
                Ok(QueryValue::Null)
            }
            // A lone `*` in value position matches anything
            Token::Star => {
                self.advance()?;
                Ok(QueryValue::Pattern("*".to_string()))
            }
            Token::Identifier(name) => {
                self.advance()?;
                Ok(QueryValue::Str(name))
            }
            Token::QualifiedIdentifier(segments) => {
                // An unquoted dotted value such as `1.5T` never reaches here
                // (the lexer classifies it), but dotted words do: treat the
                // raw text as a string value.
                self.advance()?;
                Ok(QueryValue::Str(segments.join(".")))
            }
            Token::LBracket => {
                self.advance()?;
                self.parse_range_or_list()
            }
            token => {
                self.current_token = token;
                Err(self.unexpected("value"))
            }
        }
    }

    /// After `[`: either a numeric range `[a:b]` or a value list `[a, b]`.
    fn parse_range_or_list(&mut self) -> Result<QueryValue, ParseError> {
        let first = self.parse_value()?;

        if self.check(&Token::Colon) {
            let low = match &first {
                QueryValue::Number(raw) => raw.parse::<f64>().map_err(|_| {
                    self.invalid("range bounds must be numeric", self.current_pos)
                })?,
                _ => return Err(self.invalid("range bounds must be numeric", self.current_pos)),
            };
            self.advance()?;
            let high = match self.parse_value()? {
                QueryValue::Number(raw) => raw.parse::<f64>().map_err(|_| {
                    self.invalid("range bounds must be numeric", self.current_pos)
                })?,
                _ => return Err(self.invalid("range bounds must be numeric", self.current_pos)),
            };
            self.expect(Token::RBracket, "']' closing range")?;
            return Ok(QueryValue::Range(low, high));
        }

        let mut values = vec![first];
        while self.check(&Token::Comma) {
            self.advance()?;
            values.push(self.parse_value()?);
        }
        self.expect(Token::RBracket, "']' closing list")?;
        Ok(QueryValue::List(values))
    }

    fn invalid(&self, message: &str, position: usize) -> ParseError {
        ParseError::InvalidSyntax {
            message: message.to_string(),
            position,
        }
    }

    // ========================================
    // Trailing clauses
    // ========================================

    fn parse_field_list(&mut self) -> Result<Vec<FieldPath>, ParseError> {
        let mut fields = vec![self.parse_field_path()?];
        while self.check(&Token::Comma) {
            self.advance()?;
            fields.push(self.parse_field_path()?);
        }
        Ok(fields)
    }

    fn parse_order_list(&mut self) -> Result<Vec<(FieldPath, SortDirection)>, ParseError> {
        let mut keys = vec![self.parse_order_key()?];
        while self.check(&Token::Comma) {
            self.advance()?;
            keys.push(self.parse_order_key()?);
        }
        Ok(keys)
    }

    fn parse_order_key(&mut self) -> Result<(FieldPath, SortDirection), ParseError> {
        let field = self.parse_field_path()?;
        let direction = if self.check(&Token::Asc) {
            self.advance()?;
            SortDirection::Asc
        } else if self.check(&Token::Desc) {
            self.advance()?;
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Ok((field, direction))
    }

    fn parse_format_name(&mut self) -> Result<OutputFormat, ParseError> {
        let pos = self.current_pos;
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => {
                self.advance()?;
                OutputFormat::from_name(&name).ok_or_else(|| ParseError::InvalidSyntax {
                    message: format!(
                        "unknown format '{}' (expected json, table, csv, tsv, or paths)",
                        name
                    ),
                    position: pos,
                })
            }
            token => {
                self.current_token = token;
                Err(self.unexpected("format name"))
            }
        }
    }
}

/// Parse query text in one call.
pub fn parse_query(text: &str) -> Result<Query, ParseError> {
    Parser::from_query(text)?.parse()
}

use crate::ast::Token;

/// Errors produced while tokenizing query text.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    /// Character offset into the query text
    pub position: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for LexError {}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    /// Whether the previous token was `~=`. A `/` right after it starts a
    /// regex literal; everywhere else `/` is an ordinary pattern character.
    after_match_op: bool,
}

/// Characters that may continue a bare word. Dashes and slashes appear in
/// unquoted values (`n-back`) and path patterns (`*/func/*`); dots appear in
/// qualified identifiers and decimals.
fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '*' | '?' | '%' | '/')
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            after_match_op: false,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.current_char() {
                    self.advance();
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if is_word_char(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some('/') => result.push('/'),
                        Some(ch) => {
                            return Err(LexError {
                                message: format!("invalid escape sequence '\\{}'", ch),
                                position: self.position,
                            })
                        }
                        None => {
                            return Err(LexError {
                                message: "unterminated string".to_string(),
                                position: start,
                            })
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError {
            message: "unterminated string".to_string(),
            position: start,
        })
    }

    fn read_regex(&mut self) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // consume opening '/'

        while let Some(ch) = self.current_char() {
            match ch {
                '/' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        // Only the delimiter needs unescaping; everything
                        // else belongs to the regex engine.
                        Some('/') => result.push('/'),
                        Some(c) => {
                            result.push('\\');
                            result.push(c);
                        }
                        None => {
                            return Err(LexError {
                                message: "unterminated regex literal".to_string(),
                                position: start,
                            })
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError {
            message: "unterminated regex literal".to_string(),
            position: start,
        })
    }

    /// Classify a bare word as pattern, number, qualified identifier,
    /// keyword, or identifier.
    fn classify_word(&self, word: String, position: usize) -> Result<Token, LexError> {
        if word.contains(['*', '?', '%']) {
            return Ok(Token::Pattern(word));
        }
        if is_number(&word) {
            return Ok(Token::Number(word));
        }
        if word.contains('.') {
            let segments: Vec<&str> = word.split('.').collect();
            if segments.iter().all(|s| is_plain_identifier(s)) {
                return Ok(Token::QualifiedIdentifier(
                    segments.into_iter().map(|s| s.to_string()).collect(),
                ));
            }
            // Something like `.nii.gz` - an unquoted value, not a reference
            return Ok(Token::Identifier(word));
        }
        if is_plain_identifier(&word) {
            if let Some(keyword) = Token::keyword(&word) {
                return Ok(keyword);
            }
            return Ok(Token::Identifier(word));
        }
        if word.is_empty() {
            return Err(LexError {
                message: "unexpected end of input".to_string(),
                position,
            });
        }
        // Dashed values like `n-back` fall through here
        Ok(Token::Identifier(word))
    }

    /// Produce the next token together with its starting character offset.
    pub fn next_token(&mut self) -> Result<(Token, usize), LexError> {
        self.skip_whitespace_and_comments();
        let start = self.position;

        let token = match self.current_char() {
            None => Token::Eof,
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(':') => {
                self.advance();
                Token::Colon
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::EqEq
                } else {
                    self.advance();
                    Token::Eq
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::NotEq
                } else {
                    return Err(LexError {
                        message: "unexpected '!' (did you mean '!='?)".to_string(),
                        position: start,
                    });
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::LtEq
                } else {
                    self.advance();
                    Token::Lt
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::GtEq
                } else {
                    self.advance();
                    Token::Gt
                }
            }
            Some('~') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::Match
                } else {
                    return Err(LexError {
                        message: "unexpected '~' (did you mean '~='?)".to_string(),
                        position: start,
                    });
                }
            }
            Some('"') => Token::String(self.read_string('"')?),
            Some('\'') => Token::String(self.read_string('\'')?),
            Some('/') if self.after_match_op => Token::Regex(self.read_regex()?),
            Some('*') => {
                // A lone star is projection/COUNT(*) punctuation; a star glued
                // to word characters begins a pattern value.
                if self.peek_char(1).is_some_and(is_word_char) {
                    let word = self.read_word();
                    Token::Pattern(word)
                } else {
                    self.advance();
                    Token::Star
                }
            }
            Some('?') => {
                if self.peek_char(1).is_some_and(is_word_char) {
                    let word = self.read_word();
                    Token::Pattern(word)
                } else {
                    self.advance();
                    Token::Question
                }
            }
            Some(ch) if is_word_char(ch) => {
                let word = self.read_word();
                self.classify_word(word, start)?
            }
            Some(ch) => {
                return Err(LexError {
                    message: format!("unexpected character '{}'", ch),
                    position: start,
                })
            }
        };

        self.after_match_op = token == Token::Match;
        Ok((token, start))
    }

    /// Tokenize the whole input, ending with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<(Token, usize)>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let (token, pos) = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, pos));
            if done {
                return Ok(tokens);
            }
        }
    }
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_number(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.is_empty() {
        return false;
    }
    let mut parts = body.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match frac_part {
        None => true,
        Some(frac) => !frac.is_empty() && frac.chars().all(|c| c.is_ascii_digit()),
    }
}

#[test]
fn test_keywords_case_insensitive() {
    let mut lexer = Lexer::new("select WHERE Group by");
    assert_eq!(lexer.next_token().unwrap().0, Token::Select);
    assert_eq!(lexer.next_token().unwrap().0, Token::Where);
    assert_eq!(lexer.next_token().unwrap().0, Token::Group);
    assert_eq!(lexer.next_token().unwrap().0, Token::By);
    assert_eq!(lexer.next_token().unwrap().0, Token::Eof);
}

#[test]
fn test_numbers_keep_raw_lexeme() {
    let mut lexer = Lexer::new("01 2.5");
    assert_eq!(lexer.next_token().unwrap().0, Token::Number("01".into()));
    assert_eq!(lexer.next_token().unwrap().0, Token::Number("2.5".into()));
}

#[test]
fn test_star_vs_pattern() {
    let mut lexer = Lexer::new("COUNT(*) suffix=*bold*");
    assert_eq!(
        lexer.next_token().unwrap().0,
        Token::Identifier("COUNT".into())
    );
    assert_eq!(lexer.next_token().unwrap().0, Token::LParen);
    assert_eq!(lexer.next_token().unwrap().0, Token::Star);
    assert_eq!(lexer.next_token().unwrap().0, Token::RParen);
    assert_eq!(
        lexer.next_token().unwrap().0,
        Token::Identifier("suffix".into())
    );
    assert_eq!(lexer.next_token().unwrap().0, Token::Eq);
    assert_eq!(
        lexer.next_token().unwrap().0,
        Token::Pattern("*bold*".into())
    );
}

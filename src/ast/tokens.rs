#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer or decimal number, raw lexeme preserved
    ///
    /// The raw text matters: `01` must keep its padding so entity
    /// comparisons can decide between numeric and string semantics.
    ///
    /// # Examples
    /// ```text
    /// 01
    /// 42
    /// 2.5
    /// ```
    Number(String),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "n-back"
    /// 'mag'
    /// ```
    String(String),

    /// Glob pattern value - a bare word containing `*`, `?`, or `%`
    ///
    /// Emitted only for unquoted words; a quoted string is never a pattern.
    ///
    /// # Examples
    /// ```text
    /// *bold*
    /// T?w
    /// %back%
    /// ```
    Pattern(String),

    /// Regex literal in `/.../` form, recognized after `~=`
    ///
    /// # Examples
    /// ```text
    /// sub ~= /0[1-3]/
    /// ```
    Regex(String),

    // Identifiers
    /// Bare field name or unquoted value
    ///
    /// # Examples
    /// ```text
    /// sub
    /// nback
    /// T1w
    /// ```
    Identifier(String),

    /// Dotted field reference, emitted as a single token
    ///
    /// Keyword classification never applies to the segments, so
    /// `participants.group` is an ordinary reference.
    ///
    /// # Examples
    /// ```text
    /// metadata.RepetitionTime
    /// metadata.Coil.Channels
    /// participants.age
    /// ```
    QualifiedIdentifier(Vec<String>),

    // Keywords (case-insensitive in source)
    Select,
    Distinct,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    As,
    And,
    Or,
    Not,
    In,
    Like,
    Null,
    Format,

    // Operators
    /// Equality (`=`)
    Eq,
    /// Equality (`==`), same semantics as `=`
    EqEq,
    /// Inequality (`!=`)
    NotEq,
    /// Less than
    Lt,
    /// Less than or equal
    LtEq,
    /// Greater than
    Gt,
    /// Greater than or equal
    GtEq,
    /// Regex match (`~=`), full match
    Match,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    /// Standalone `*` (projection, COUNT(*))
    Star,
    /// Standalone `?`
    Question,

    /// End of input
    Eof,
}

impl Token {
    /// Keyword lookup for a plain word, case-insensitive.
    pub fn keyword(word: &str) -> Option<Token> {
        match word.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Token::Select),
            "DISTINCT" => Some(Token::Distinct),
            "FROM" => Some(Token::From),
            "WHERE" => Some(Token::Where),
            "GROUP" => Some(Token::Group),
            "BY" => Some(Token::By),
            "HAVING" => Some(Token::Having),
            "ORDER" => Some(Token::Order),
            "ASC" => Some(Token::Asc),
            "DESC" => Some(Token::Desc),
            "AS" => Some(Token::As),
            "AND" => Some(Token::And),
            "OR" => Some(Token::Or),
            "NOT" => Some(Token::Not),
            "IN" => Some(Token::In),
            "LIKE" => Some(Token::Like),
            "NULL" => Some(Token::Null),
            "FORMAT" => Some(Token::Format),
            _ => None,
        }
    }
}

use biql::{Lexer, Token};

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|(token, _)| token)
        .collect()
}

#[test]
fn test_basic_tokenization() {
    assert_eq!(
        tokens("sub=01 AND task=rest"),
        vec![
            Token::Identifier("sub".into()),
            Token::Eq,
            Token::Number("01".into()),
            Token::And,
            Token::Identifier("task".into()),
            Token::Eq,
            Token::Identifier("rest".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_string_literals() {
    assert_eq!(
        tokens(r#"task="n-back" OR suffix='T1w'"#),
        vec![
            Token::Identifier("task".into()),
            Token::Eq,
            Token::String("n-back".into()),
            Token::Or,
            Token::Identifier("suffix".into()),
            Token::Eq,
            Token::String("T1w".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        tokens(r#""a\"b\n""#),
        vec![Token::String("a\"b\n".into()), Token::Eof]
    );
}

#[test]
fn test_unterminated_string_is_an_error() {
    let result = Lexer::new("task=\"rest").tokenize();
    assert!(result.is_err());
}

#[test]
fn test_operators() {
    assert_eq!(
        tokens("metadata.RepetitionTime>=2.0 AND run<=3"),
        vec![
            Token::QualifiedIdentifier(vec!["metadata".into(), "RepetitionTime".into()]),
            Token::GtEq,
            Token::Number("2.0".into()),
            Token::And,
            Token::Identifier("run".into()),
            Token::LtEq,
            Token::Number("3".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_equality_operator_variants() {
    assert_eq!(
        tokens("a=1 b==2 c!=3"),
        vec![
            Token::Identifier("a".into()),
            Token::Eq,
            Token::Number("1".into()),
            Token::Identifier("b".into()),
            Token::EqEq,
            Token::Number("2".into()),
            Token::Identifier("c".into()),
            Token::NotEq,
            Token::Number("3".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_range_brackets() {
    assert_eq!(
        tokens("run=[1:3]"),
        vec![
            Token::Identifier("run".into()),
            Token::Eq,
            Token::LBracket,
            Token::Number("1".into()),
            Token::Colon,
            Token::Number("3".into()),
            Token::RBracket,
            Token::Eof,
        ]
    );
}

#[test]
fn test_wildcard_patterns() {
    assert_eq!(
        tokens("suffix=bold*"),
        vec![
            Token::Identifier("suffix".into()),
            Token::Eq,
            Token::Pattern("bold*".into()),
            Token::Eof,
        ]
    );
    assert_eq!(
        tokens("suffix=T?w"),
        vec![
            Token::Identifier("suffix".into()),
            Token::Eq,
            Token::Pattern("T?w".into()),
            Token::Eof,
        ]
    );
    assert_eq!(
        tokens("sub=0?"),
        vec![
            Token::Identifier("sub".into()),
            Token::Eq,
            Token::Pattern("0?".into()),
            Token::Eof,
        ]
    );
    // Patterns can cross path separators
    assert_eq!(
        tokens("filepath=*/func/*"),
        vec![
            Token::Identifier("filepath".into()),
            Token::Eq,
            Token::Pattern("*/func/*".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_like_pattern() {
    assert_eq!(
        tokens("task LIKE %back%"),
        vec![
            Token::Identifier("task".into()),
            Token::Like,
            Token::Pattern("%back%".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_star_is_punctuation_when_alone() {
    assert_eq!(
        tokens("SELECT *"),
        vec![Token::Select, Token::Star, Token::Eof]
    );
    assert_eq!(
        tokens("COUNT(*)"),
        vec![
            Token::Identifier("COUNT".into()),
            Token::LParen,
            Token::Star,
            Token::RParen,
            Token::Eof,
        ]
    );
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert_eq!(
        tokens("select distinct where group by having order asc desc as and or not in like null format"),
        vec![
            Token::Select,
            Token::Distinct,
            Token::Where,
            Token::Group,
            Token::By,
            Token::Having,
            Token::Order,
            Token::Asc,
            Token::Desc,
            Token::As,
            Token::And,
            Token::Or,
            Token::Not,
            Token::In,
            Token::Like,
            Token::Null,
            Token::Format,
            Token::Eof,
        ]
    );
}

#[test]
fn test_qualified_identifier_keeps_keyword_segments() {
    // `group` is a keyword on its own but not inside a dotted name
    assert_eq!(
        tokens("participants.group=control"),
        vec![
            Token::QualifiedIdentifier(vec!["participants".into(), "group".into()]),
            Token::Eq,
            Token::Identifier("control".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_nested_metadata_path() {
    assert_eq!(
        tokens("metadata.Coil.Channels>31"),
        vec![
            Token::QualifiedIdentifier(vec![
                "metadata".into(),
                "Coil".into(),
                "Channels".into()
            ]),
            Token::Gt,
            Token::Number("31".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_regex_literal_after_match_operator() {
    assert_eq!(
        tokens("sub~=/0[1-3]/"),
        vec![
            Token::Identifier("sub".into()),
            Token::Match,
            Token::Regex("0[1-3]".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_match_with_quoted_string() {
    assert_eq!(
        tokens(r#"sub~="0[1-3]""#),
        vec![
            Token::Identifier("sub".into()),
            Token::Match,
            Token::String("0[1-3]".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_comments_are_discarded() {
    assert_eq!(
        tokens("sub=01 # only the first subject\nAND task=rest"),
        vec![
            Token::Identifier("sub".into()),
            Token::Eq,
            Token::Number("01".into()),
            Token::And,
            Token::Identifier("task".into()),
            Token::Eq,
            Token::Identifier("rest".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_token_positions() {
    let positions: Vec<usize> = Lexer::new("sub = 01")
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|(_, pos)| pos)
        .collect();
    assert_eq!(positions, vec![0, 4, 6, 8]);
}

#[test]
fn test_stray_character_reports_position() {
    let err = Lexer::new("sub=01 ^").tokenize().unwrap_err();
    assert_eq!(err.position, 7);
}

#[test]
fn test_complex_query_tokenizes() {
    let tokens = tokens(
        "SELECT sub, ses, filepath WHERE (task=nback OR task=rest) \
         AND metadata.RepetitionTime<3.0",
    );
    assert!(tokens.contains(&Token::Select));
    assert!(tokens.contains(&Token::Where));
    assert!(tokens.contains(&Token::LParen));
    assert!(tokens.contains(&Token::RParen));
}

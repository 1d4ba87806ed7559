//! Lexer for the object query language.
//!
//! Converts query text into a sequence of tokens with span information.
//! Keywords are matched case-insensitively; identifiers keep their original
//! spelling because aliases are case-sensitive.

use chumsky::prelude::*;

/// A token in the object query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Clause Keywords
    // ========================================================================
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Limit,
    Offset,

    // ========================================================================
    // Sort Keywords
    // ========================================================================
    Asc,
    Desc,
    Nulls,
    First,
    Last,

    // ========================================================================
    // Join Keywords
    // ========================================================================
    As,
    Join,
    Left,
    Inner,
    Outer,
    Fetch,
    With,
    On,
    Distinct,

    // ========================================================================
    // Predicate Keywords
    // ========================================================================
    And,
    Or,
    Not,
    Is,
    Null,
    In,
    Between,
    Like,
    Escape,
    Member,
    Of,
    Empty,
    True,
    False,

    // ========================================================================
    // Case Keywords
    // ========================================================================
    Case,
    When,
    Then,
    Else,
    End,

    // ========================================================================
    // Literals and Parameters
    // ========================================================================
    /// An identifier (not a keyword).
    Ident(&'src str),
    /// A string literal (contents without quotes, `''` escapes preserved).
    StringLit(&'src str),
    /// A number (integer or decimal).
    Number(&'src str),
    /// `:name`
    NamedParam(&'src str),
    /// `?1`, or a bare `?` when no label follows.
    PositionalParam(Option<&'src str>),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `||`
    Concat,
}

impl<'src> Token<'src> {
    /// Whether this token is a reserved word.
    ///
    /// Reserved words are still accepted as path segments after a dot.
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            Token::Ident(_)
                | Token::StringLit(_)
                | Token::Number(_)
                | Token::NamedParam(_)
                | Token::PositionalParam(_)
                | Token::LParen
                | Token::RParen
                | Token::Comma
                | Token::Dot
                | Token::Eq
                | Token::Ne
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Percent
                | Token::Concat
        )
    }
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Clause keywords
            Token::Select => write!(f, "select"),
            Token::From => write!(f, "from"),
            Token::Where => write!(f, "where"),
            Token::Group => write!(f, "group"),
            Token::By => write!(f, "by"),
            Token::Having => write!(f, "having"),
            Token::Order => write!(f, "order"),
            Token::Limit => write!(f, "limit"),
            Token::Offset => write!(f, "offset"),

            // Sort keywords
            Token::Asc => write!(f, "asc"),
            Token::Desc => write!(f, "desc"),
            Token::Nulls => write!(f, "nulls"),
            Token::First => write!(f, "first"),
            Token::Last => write!(f, "last"),

            // Join keywords
            Token::As => write!(f, "as"),
            Token::Join => write!(f, "join"),
            Token::Left => write!(f, "left"),
            Token::Inner => write!(f, "inner"),
            Token::Outer => write!(f, "outer"),
            Token::Fetch => write!(f, "fetch"),
            Token::With => write!(f, "with"),
            Token::On => write!(f, "on"),
            Token::Distinct => write!(f, "distinct"),

            // Predicate keywords
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Is => write!(f, "is"),
            Token::Null => write!(f, "null"),
            Token::In => write!(f, "in"),
            Token::Between => write!(f, "between"),
            Token::Like => write!(f, "like"),
            Token::Escape => write!(f, "escape"),
            Token::Member => write!(f, "member"),
            Token::Of => write!(f, "of"),
            Token::Empty => write!(f, "empty"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),

            // Case keywords
            Token::Case => write!(f, "case"),
            Token::When => write!(f, "when"),
            Token::Then => write!(f, "then"),
            Token::Else => write!(f, "else"),
            Token::End => write!(f, "end"),

            // Literals
            Token::Ident(s) => write!(f, "{}", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::Number(s) => write!(f, "{}", s),
            Token::NamedParam(s) => write!(f, ":{}", s),
            Token::PositionalParam(Some(s)) => write!(f, "?{}", s),
            Token::PositionalParam(None) => write!(f, "?"),

            // Symbols
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Concat => write!(f, "||"),
        }
    }
}

/// Map an identifier string to a keyword token or return Ident.
fn keyword_or_ident(s: &str) -> Token<'_> {
    match s.to_ascii_lowercase().as_str() {
        // Clause keywords
        "select" => Token::Select,
        "from" => Token::From,
        "where" => Token::Where,
        "group" => Token::Group,
        "by" => Token::By,
        "having" => Token::Having,
        "order" => Token::Order,
        "limit" => Token::Limit,
        "offset" => Token::Offset,

        // Sort keywords
        "asc" => Token::Asc,
        "desc" => Token::Desc,
        "nulls" => Token::Nulls,
        "first" => Token::First,
        "last" => Token::Last,

        // Join keywords
        "as" => Token::As,
        "join" => Token::Join,
        "left" => Token::Left,
        "inner" => Token::Inner,
        "outer" => Token::Outer,
        "fetch" => Token::Fetch,
        "with" => Token::With,
        "on" => Token::On,
        "distinct" => Token::Distinct,

        // Predicate keywords
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "is" => Token::Is,
        "null" => Token::Null,
        "in" => Token::In,
        "between" => Token::Between,
        "like" => Token::Like,
        "escape" => Token::Escape,
        "member" => Token::Member,
        "of" => Token::Of,
        "empty" => Token::Empty,
        "true" => Token::True,
        "false" => Token::False,

        // Case keywords
        "case" => Token::Case,
        "when" => Token::When,
        "then" => Token::Then,
        "else" => Token::Else,
        "end" => Token::End,

        _ => Token::Ident(s),
    }
}

/// Create a lexer for the object query language.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace and comments.
/// Unrecognized characters are reported and skipped so lexing continues.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let ident = text::ident().map(keyword_or_ident);

    // String literals: '...' with '' as an escaped quote
    let string_lit = just('\'')
        .ignore_then(
            just("''")
                .ignored()
                .or(none_of('\'').ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''))
        .map(Token::StringLit);

    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10));
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .then(exponent.or_not())
        .to_slice()
        .map(Token::Number);

    let named_param = just(':')
        .ignore_then(text::ident())
        .map(Token::NamedParam);

    let positional_param = just('?')
        .ignore_then(text::digits(10).to_slice().or_not())
        .map(Token::PositionalParam);

    // Symbols (multi-char first, then single-char)
    let symbol = choice((
        just("<>").to(Token::Ne),
        just("!=").to(Token::Ne),
        just("<=").to(Token::Le),
        just(">=").to(Token::Ge),
        just("||").to(Token::Concat),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just('=').to(Token::Eq),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    // Line comments: -- ... until newline
    let line_comment = just("--")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();

    // Block comments: /* ... */
    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();

    let comment = line_comment.or(block_comment);

    let token = choice((
        ident,
        string_lit,
        number,
        named_param,
        positional_param,
        symbol,
    ))
    .map_with(|tok, e| (tok, e.span()));

    token
        .padded_by(comment.padded().repeated())
        .padded()
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
        .padded_by(comment.padded().repeated())
        .padded()
        .then_ignore(end())
}

/// Lex a query string into tokens.
///
/// Returns Ok with the token list on success, or Err with the lexing errors.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}

/// Turn keywords back into identifiers where they cannot act as keywords.
///
/// Entity names, aliases and path segments may collide with reserved words
/// (`from Order o`, `order.code`). A keyword becomes an identifier with its
/// source spelling when it
/// - is next to a `.`,
/// - directly follows `from`, `fetch` or `as`, or follows `join` and is not `fetch`,
/// - is `order` or `group` without a following `by`.
///
/// Tokens are rewritten left to right, so a rewritten token no longer counts
/// as a keyword for its successor.
pub fn identify_soft_keywords<'src>(source: &'src str, tokens: &mut [(Token<'src>, SimpleSpan)]) {
    for i in 0..tokens.len() {
        let token = &tokens[i].0;
        if !token.is_keyword() {
            continue;
        }
        let prev = i.checked_sub(1).map(|j| &tokens[j].0);
        let next = tokens.get(i + 1).map(|(t, _)| t);

        let soft = matches!(prev, Some(Token::Dot))
            || matches!(next, Some(Token::Dot))
            || matches!(prev, Some(Token::From | Token::Fetch | Token::As))
            || (matches!(prev, Some(Token::Join)) && *token != Token::Fetch)
            || (matches!(token, Token::Order | Token::Group) && !matches!(next, Some(Token::By)));

        if soft {
            let span = tokens[i].1;
            if let Some(text) = source.get(span.start()..span.end()) {
                tokens[i].0 = Token::Ident(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_only(tokens: Vec<(Token<'_>, SimpleSpan)>) -> Vec<Token<'_>> {
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_lex_keywords_case_insensitive() {
        let tokens = tokens_only(lex("SELECT distinct From wHeRe").expect("lexing should succeed"));
        assert_eq!(
            tokens,
            vec![Token::Select, Token::Distinct, Token::From, Token::Where]
        );
    }

    #[test]
    fn test_lex_identifiers_keep_case() {
        let tokens = tokens_only(lex("Person p elements size").expect("lexing should succeed"));
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Person"),
                Token::Ident("p"),
                Token::Ident("elements"),
                Token::Ident("size"),
            ]
        );
    }

    #[test]
    fn test_lex_string_with_escaped_quote() {
        let tokens = tokens_only(lex("'it''s' 'plain'").expect("lexing should succeed"));
        assert_eq!(
            tokens,
            vec![Token::StringLit("it''s"), Token::StringLit("plain")]
        );
    }

    #[test]
    fn test_lex_numbers() {
        let tokens = tokens_only(lex("42 3.14 0 1.5e3 2E-4").expect("lexing should succeed"));
        assert_eq!(
            tokens,
            vec![
                Token::Number("42"),
                Token::Number("3.14"),
                Token::Number("0"),
                Token::Number("1.5e3"),
                Token::Number("2E-4"),
            ]
        );
    }

    #[test]
    fn test_lex_parameters() {
        let tokens = tokens_only(lex(":name ?1 ?").expect("lexing should succeed"));
        assert_eq!(
            tokens,
            vec![
                Token::NamedParam("name"),
                Token::PositionalParam(Some("1")),
                Token::PositionalParam(None),
            ]
        );
    }

    #[test]
    fn test_lex_symbols() {
        let tokens =
            tokens_only(lex("( ) , . = <> != < <= > >= + - * / % ||").expect("lexing should succeed"));
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::RParen,
                Token::Comma,
                Token::Dot,
                Token::Eq,
                Token::Ne,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Concat,
            ]
        );
    }

    #[test]
    fn test_lex_with_comments() {
        let source = "from Person p -- trailing\n/* block\n comment */ where p.age > 3";
        let tokens = tokens_only(lex(source).expect("lexing should succeed"));
        assert_eq!(tokens.len(), 9);
        assert_eq!(tokens[3], Token::Where);
    }

    #[test]
    fn test_lex_spans() {
        let tokens = lex("from Person").expect("lexing should succeed");
        assert_eq!(tokens[1].1.start, 5);
        assert_eq!(tokens[1].1.end, 11);
    }

    #[test]
    fn test_lex_recovers_from_bad_character() {
        let (tokens, errs) = lexer().parse("from # Person").into_output_errors();
        assert!(!errs.is_empty());
        let tokens = tokens.expect("recovered output");
        assert!(tokens.iter().any(|(t, _)| *t == Token::Ident("Person")));
    }

    fn soft(source: &str) -> Vec<Token<'_>> {
        let mut tokens = lex(source).expect("lexing should succeed");
        identify_soft_keywords(source, &mut tokens);
        tokens_only(tokens)
    }

    #[test]
    fn test_keyword_entity_names_become_identifiers() {
        assert_eq!(
            soft("from Order o order by o.code"),
            vec![
                Token::From,
                Token::Ident("Order"),
                Token::Ident("o"),
                Token::Order,
                Token::By,
                Token::Ident("o"),
                Token::Dot,
                Token::Ident("code"),
            ]
        );
        assert_eq!(
            soft("join fetch o.Group g"),
            vec![
                Token::Join,
                Token::Fetch,
                Token::Ident("o"),
                Token::Dot,
                Token::Ident("Group"),
                Token::Ident("g"),
            ]
        );
    }

    #[test]
    fn test_rewritten_keyword_does_not_soften_successor() {
        assert_eq!(
            soft("p.from where x"),
            vec![
                Token::Ident("p"),
                Token::Dot,
                Token::Ident("from"),
                Token::Where,
                Token::Ident("x"),
            ]
        );
        assert_eq!(
            soft("select m.name as member from Member m"),
            vec![
                Token::Select,
                Token::Ident("m"),
                Token::Dot,
                Token::Ident("name"),
                Token::As,
                Token::Ident("member"),
                Token::From,
                Token::Ident("Member"),
                Token::Ident("m"),
            ]
        );
    }

    #[test]
    fn test_is_keyword() {
        assert!(Token::Order.is_keyword());
        assert!(!Token::Ident("order").is_keyword());
        assert!(!Token::Comma.is_keyword());
    }
}

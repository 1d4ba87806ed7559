//! Parser for the object query language using chumsky.
//!
//! Transforms the lexer's token stream into a [`SelectStatement`]. Errors
//! inside parenthesized sub-expressions recover to [`Expr::Error`] so that
//! several syntax errors can be reported for one query.

use chumsky::input::ValueInput;
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::Token;
use super::span::{Span, Spanned};

/// Convert a SimpleSpan to our Span type (Range<usize>)
fn to_span(span: SimpleSpan) -> Span {
    span.start..span.end
}

fn binary(left: Spanned<Expr>, op: BinaryOp, right: Spanned<Expr>) -> Spanned<Expr> {
    let span = left.span.start..right.span.end;
    Spanned::new(
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}

/// What may follow the left operand of a predicate.
enum Suffix {
    Compare(BinaryOp, Spanned<Expr>),
    IsNull(bool),
    IsEmpty(bool),
    Negatable(bool, NegatableSuffix),
}

/// Predicates that accept a leading `not`.
enum NegatableSuffix {
    Between(Spanned<Expr>, Spanned<Expr>),
    In(Vec<Spanned<Expr>>),
    Like(Spanned<Expr>, Option<Spanned<Expr>>),
    MemberOf(Spanned<Expr>),
}

fn apply_suffix(lhs: Spanned<Expr>, suffix: Suffix) -> Expr {
    let expr = Box::new(lhs);
    match suffix {
        Suffix::Compare(op, right) => Expr::Binary {
            left: expr,
            op,
            right: Box::new(right),
        },
        Suffix::IsNull(negated) => Expr::IsNull { expr, negated },
        Suffix::IsEmpty(negated) => Expr::IsEmpty { expr, negated },
        Suffix::Negatable(negated, NegatableSuffix::Between(low, high)) => Expr::Between {
            expr,
            low: Box::new(low),
            high: Box::new(high),
            negated,
        },
        Suffix::Negatable(negated, NegatableSuffix::In(list)) => Expr::InList {
            expr,
            list,
            negated,
        },
        Suffix::Negatable(negated, NegatableSuffix::Like(pattern, escape)) => Expr::Like {
            expr,
            pattern: Box::new(pattern),
            escape: escape.map(Box::new),
            negated,
        },
        Suffix::Negatable(negated, NegatableSuffix::MemberOf(collection)) => Expr::MemberOf {
            element: expr,
            collection: Box::new(collection),
            negated,
        },
    }
}

/// Create the statement parser.
///
/// The parser is generic over the input type, accepting any `ValueInput`
/// that produces `Token` values with `SimpleSpan` spans.
pub fn parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, SelectStatement, extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    // ==========================================================================
    // Basic token parsers
    // ==========================================================================

    let ident = select! {
        Token::Ident(s) => s.to_string(),
    }
    .labelled("identifier")
    .map_with(|n, e| Spanned::new(n, to_span(e.span())));

    let segments = ident
        .clone()
        .then(
            just(Token::Dot)
                .ignore_then(ident.clone())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|(head, tail)| {
            let mut segments = Vec::with_capacity(tail.len() + 1);
            segments.push(head);
            segments.extend(tail);
            segments
        });

    let path = segments
        .clone()
        .map(Expr::Path)
        .map_with(|p, e| Spanned::new(p, to_span(e.span())));

    // A malformed number still yields a literal so parsing continues; the
    // error is emitted alongside.
    let number = select! {
        Token::Number(n) => n,
    }
    .validate(|n: &str, e, emitter| {
        if n.contains(['.', 'e', 'E']) {
            match n.parse::<f64>() {
                Ok(value) if value.is_finite() => Literal::Decimal(value),
                _ => {
                    emitter.emit(Rich::custom(e.span(), format!("decimal literal out of range: {n}")));
                    Literal::Decimal(0.0)
                }
            }
        } else {
            match n.parse::<i64>() {
                Ok(value) => Literal::Integer(value),
                Err(_) => {
                    emitter.emit(Rich::custom(e.span(), format!("integer literal out of range: {n}")));
                    Literal::Integer(0)
                }
            }
        }
    });

    let literal = choice((
        number,
        select! {
            Token::StringLit(s) => Literal::String(s.replace("''", "'")),
            Token::True => Literal::Boolean(true),
            Token::False => Literal::Boolean(false),
            Token::Null => Literal::Null,
        },
    ))
    .map(Expr::Literal)
    .labelled("literal");

    let parameter = select! {
        Token::NamedParam(n) => Expr::NamedParameter(n.to_string()),
        Token::PositionalParam(label) => Expr::PositionalParameter(label.map(str::to_string)),
    }
    .labelled("parameter");

    // ==========================================================================
    // Expressions
    // ==========================================================================

    let expr = recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>();

        // name(*) | name([distinct] args)
        let function = ident
            .clone()
            .then(
                just(Token::Star)
                    .map_with(|_, e| (false, vec![Spanned::new(Expr::Star, to_span(e.span()))]))
                    .or(just(Token::Distinct)
                        .or_not()
                        .map(|d| d.is_some())
                        .then(args))
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map(|(name, (distinct, args))| Expr::Function {
                name,
                args,
                distinct,
            });

        let case = just(Token::Case)
            .ignore_then(expr.clone().or_not())
            .then(
                just(Token::When)
                    .ignore_then(expr.clone())
                    .then_ignore(just(Token::Then))
                    .then(expr.clone())
                    .repeated()
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then(just(Token::Else).ignore_then(expr.clone()).or_not())
            .then_ignore(just(Token::End))
            .map(|((operand, whens), else_result)| Expr::Case {
                operand: operand.map(Box::new),
                whens,
                else_result: else_result.map(Box::new),
            });

        let paren = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(|inner| Expr::Paren(Box::new(inner)))
            .recover_with(via_parser(nested_delimiters(
                Token::LParen,
                Token::RParen,
                [],
                |_| Expr::Error,
            )));

        let atom = choice((
            literal.clone(),
            parameter.clone(),
            case,
            function,
            segments.clone().map(Expr::Path),
            paren,
        ))
        .map_with(|e, ex| Spanned::new(e, to_span(ex.span())))
        .boxed();

        let unary = just(Token::Minus)
            .map_with(|_, e| to_span(e.span()))
            .repeated()
            .foldr(atom, |op_span, rhs: Spanned<Expr>| {
                let span = op_span.start..rhs.span.end;
                Spanned::new(
                    Expr::Unary {
                        op: UnaryOp::Neg,
                        expr: Box::new(rhs),
                    },
                    span,
                )
            })
            .boxed();

        let product = unary
            .clone()
            .foldl(
                choice((
                    just(Token::Star).to(BinaryOp::Mul),
                    just(Token::Slash).to(BinaryOp::Div),
                    just(Token::Percent).to(BinaryOp::Mod),
                ))
                .then(unary)
                .repeated(),
                |left, (op, right)| binary(left, op, right),
            )
            .boxed();

        let additive = product
            .clone()
            .foldl(
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Sub),
                    just(Token::Concat).to(BinaryOp::Concat),
                ))
                .then(product)
                .repeated(),
                |left, (op, right)| binary(left, op, right),
            )
            .boxed();

        // ----------------------------------------------------------------------
        // Predicates
        // ----------------------------------------------------------------------

        let compare = choice((
            just(Token::Eq).to(BinaryOp::Eq),
            just(Token::Ne).to(BinaryOp::Ne),
            just(Token::Le).to(BinaryOp::Le),
            just(Token::Ge).to(BinaryOp::Ge),
            just(Token::Lt).to(BinaryOp::Lt),
            just(Token::Gt).to(BinaryOp::Gt),
        ))
        .then(additive.clone())
        .map(|(op, right)| Suffix::Compare(op, right));

        let is = just(Token::Is)
            .ignore_then(just(Token::Not).or_not().map(|n| n.is_some()))
            .then(choice((
                just(Token::Null).to(false),
                just(Token::Empty).to(true),
            )))
            .map(|(negated, empty)| {
                if empty {
                    Suffix::IsEmpty(negated)
                } else {
                    Suffix::IsNull(negated)
                }
            });

        let in_list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .or(parameter
                .clone()
                .map_with(|p, e| vec![Spanned::new(p, to_span(e.span()))]));

        let negatable = just(Token::Not)
            .or_not()
            .map(|n| n.is_some())
            .then(choice((
                just(Token::Between)
                    .ignore_then(additive.clone())
                    .then_ignore(just(Token::And))
                    .then(additive.clone())
                    .map(|(low, high)| NegatableSuffix::Between(low, high)),
                just(Token::In)
                    .ignore_then(in_list)
                    .map(NegatableSuffix::In),
                just(Token::Like)
                    .ignore_then(additive.clone())
                    .then(just(Token::Escape).ignore_then(additive.clone()).or_not())
                    .map(|(pattern, escape)| NegatableSuffix::Like(pattern, escape)),
                just(Token::Member)
                    .ignore_then(just(Token::Of).or_not())
                    .ignore_then(path.clone())
                    .map(NegatableSuffix::MemberOf),
            )))
            .map(|(negated, suffix)| Suffix::Negatable(negated, suffix));

        let predicate = additive
            .then(choice((compare, is, negatable)).or_not())
            .map_with(|(lhs, suffix), e| match suffix {
                None => lhs,
                Some(suffix) => Spanned::new(apply_suffix(lhs, suffix), to_span(e.span())),
            })
            .boxed();

        let negation = just(Token::Not)
            .map_with(|_, e| to_span(e.span()))
            .repeated()
            .foldr(predicate, |op_span, rhs: Spanned<Expr>| {
                let span = op_span.start..rhs.span.end;
                Spanned::new(
                    Expr::Unary {
                        op: UnaryOp::Not,
                        expr: Box::new(rhs),
                    },
                    span,
                )
            })
            .boxed();

        let conjunction = negation
            .clone()
            .foldl(
                just(Token::And).to(BinaryOp::And).then(negation).repeated(),
                |left, (op, right)| binary(left, op, right),
            )
            .boxed();

        conjunction
            .clone()
            .foldl(
                just(Token::Or).to(BinaryOp::Or).then(conjunction).repeated(),
                |left, (op, right)| binary(left, op, right),
            )
            .boxed()
    });

    // ==========================================================================
    // Select clause
    // ==========================================================================

    let alias = just(Token::As).or_not().ignore_then(ident.clone());

    let select_item = expr
        .clone()
        .then(alias.clone().or_not())
        .map(|(expr, alias)| SelectItem { expr, alias })
        .map_with(|i, e| Spanned::new(i, to_span(e.span())));

    let select_clause = just(Token::Select)
        .ignore_then(just(Token::Distinct).or_not().map(|d| d.is_some()))
        .then(
            select_item
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(|(distinct, items)| SelectClause { distinct, items })
        .map_with(|s, e| Spanned::new(s, to_span(e.span())));

    // ==========================================================================
    // From clause
    // ==========================================================================

    // elements(p) / indices(p) are normalized to p.elements / p.indices
    let qualified_collection = ident
        .clone()
        .filter(|name: &Spanned<String>| {
            name.value.eq_ignore_ascii_case("elements") || name.value.eq_ignore_ascii_case("indices")
        })
        .then(
            segments
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(qualifier, mut segments)| {
            segments.push(qualifier.map(|q| q.to_ascii_lowercase()));
            Expr::Path(segments)
        })
        .map_with(|p, e| Spanned::new(p, to_span(e.span())));

    let join_path = qualified_collection.or(path.clone());

    let join_kind = choice((
        just(Token::Left)
            .then(just(Token::Outer).or_not())
            .to(JoinKind::Left),
        just(Token::Inner).to(JoinKind::Inner),
    ))
    .or_not()
    .map(|kind| kind.unwrap_or(JoinKind::Inner));

    let join = join_kind
        .then_ignore(just(Token::Join))
        .then(just(Token::Fetch).or_not().map(|f| f.is_some()))
        .then(join_path)
        .then(alias.clone().or_not())
        .then(
            choice((just(Token::With), just(Token::On)))
                .ignore_then(expr.clone())
                .or_not(),
        )
        .map(|((((kind, fetch), target), alias), condition)| JoinDecl {
            kind,
            fetch,
            target,
            alias,
            condition,
        })
        .map_with(|j, e| Spanned::new(j, to_span(e.span())));

    let entity_name = segments
        .clone()
        .map(|segments| {
            segments
                .iter()
                .map(|s| s.value.as_str())
                .collect::<Vec<_>>()
                .join(".")
        })
        .labelled("entity name")
        .map_with(|n, e| Spanned::new(n, to_span(e.span())));

    let root = entity_name
        .then(alias.or_not())
        .then(join.repeated().collect::<Vec<_>>())
        .map(|((entity, alias), joins)| FromRoot {
            entity,
            alias,
            joins,
        })
        .map_with(|r, e| Spanned::new(r, to_span(e.span())));

    let from_clause = just(Token::From)
        .ignore_then(
            root.separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(|roots| FromClause { roots })
        .map_with(|f, e| Spanned::new(f, to_span(e.span())));

    // ==========================================================================
    // Remaining clauses
    // ==========================================================================

    let where_clause = just(Token::Where).ignore_then(expr.clone());

    let group_by = just(Token::Group)
        .then(just(Token::By))
        .ignore_then(
            expr.clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then(just(Token::Having).ignore_then(expr.clone()).or_not());

    let sort = expr
        .clone()
        .then(
            choice((
                just(Token::Asc).to(SortDirection::Asc),
                just(Token::Desc).to(SortDirection::Desc),
            ))
            .or_not(),
        )
        .then(
            just(Token::Nulls)
                .ignore_then(choice((
                    just(Token::First).to(NullPrecedence::First),
                    just(Token::Last).to(NullPrecedence::Last),
                )))
                .or_not(),
        )
        .map(|((expr, direction), nulls)| SortSpec {
            expr,
            direction,
            nulls,
        })
        .map_with(|s, e| Spanned::new(s, to_span(e.span())));

    let order_by = just(Token::Order).then(just(Token::By)).ignore_then(
        sort.separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>(),
    );

    let limit = just(Token::Limit).ignore_then(expr.clone());
    let offset = just(Token::Offset).ignore_then(expr);

    // ==========================================================================
    // Statement
    // ==========================================================================

    select_clause
        .or_not()
        .then(from_clause)
        .then(where_clause.or_not())
        .then(group_by.or_not())
        .then(order_by.or_not())
        .then(limit.or_not())
        .then(offset.or_not())
        .then_ignore(end())
        .map(
            |((((((select, from), where_clause), grouping), order_by), limit), offset)| {
                let (group_by, having) = grouping.unwrap_or_default();
                SelectStatement {
                    select,
                    from,
                    where_clause,
                    group_by,
                    having,
                    order_by: order_by.unwrap_or_default(),
                    limit,
                    offset,
                }
            },
        )
}

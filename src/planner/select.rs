//! Select-list expansion and the result-shape descriptor.

use serde::Serialize;

use crate::hql::{BinaryOp, Literal};
use crate::metamodel::table::embeddable_columns;
use crate::metamodel::ValueType;
use crate::semantic::{BoundExpr, BoundQuery, ColumnRef, GroupKind, ParameterRegistry};
use crate::sql::expr::Expr;
use crate::sql::query::SelectExpr;

use super::expr_converter::ExprConverter;
use super::{PlanError, PlanResult};

/// How the columns of the result rows rebuild the selected values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultShape {
    pub items: Vec<ResultItem>,
}

impl ResultShape {
    pub fn column_count(&self) -> usize {
        self.items.iter().map(|i| i.columns.len()).sum()
    }
}

/// One selected value (or fetched association) and the column aliases it
/// reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItem {
    /// Result variable or join alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub columns: Vec<String>,
    pub mapping: ResultMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultMapping {
    Scalar {
        #[serde(skip_serializing_if = "Option::is_none")]
        value_type: Option<ValueType>,
    },
    Entity {
        entity: String,
    },
    Embeddable {
        embeddable: String,
    },
    /// Columns of an association fetched along with item `owner`.
    Fetch {
        target: String,
        owner: usize,
        attribute: String,
    },
}

/// Build the SQL select list and the matching result shape.
///
/// Fetched groups follow the explicit items; their owner is the item that
/// selects (or fetches) the group they join from.
pub(crate) fn build_select(
    converter: &mut ExprConverter<'_>,
    bound: &BoundQuery,
    parameters: &ParameterRegistry,
) -> PlanResult<(Vec<SelectExpr>, ResultShape)> {
    let mut select = Vec::new();
    let mut shape = ResultShape::default();
    // (group, item index) for every entity-valued item, to locate fetch owners
    let mut owners = Vec::new();

    for (index, item) in bound.select.iter().enumerate() {
        let (columns, mapping) = match &item.expr {
            BoundExpr::Entity { group, entity } => {
                owners.push((*group, index));
                (
                    converter.entity_columns(*group, entity)?,
                    ResultMapping::Entity {
                        entity: entity.clone(),
                    },
                )
            }
            BoundExpr::Embeddable { columns, embeddable } => (
                columns
                    .iter()
                    .map(|c| converter.column(c))
                    .collect::<PlanResult<Vec<_>>>()?,
                ResultMapping::Embeddable {
                    embeddable: embeddable.clone(),
                },
            ),
            other => (
                vec![converter.convert(other)?],
                ResultMapping::Scalar {
                    value_type: scalar_type(other, parameters),
                },
            ),
        };
        push_item(&mut select, &mut shape, columns, item.alias.clone(), mapping);
    }

    for &fetch in &bound.fetches {
        let group = converter
            .joins()
            .group(fetch)
            .cloned()
            .ok_or_else(|| PlanError::Internal(format!("unknown fetched group {}", fetch)))?;
        let join = group
            .join
            .as_ref()
            .ok_or_else(|| PlanError::Internal(format!("fetched root group {}", group.path)))?;
        let owner = owners
            .iter()
            .find(|(g, _)| *g == join.parent)
            .map(|(_, item)| *item)
            .ok_or_else(|| PlanError::Internal(format!("fetch without owner: {}", group.path)))?;

        let (target, columns) = match &group.kind {
            GroupKind::Entity { entity } => (entity.clone(), converter.entity_columns(fetch, entity)?),
            GroupKind::BasicElements { column, value_type } => (
                value_type.to_string(),
                vec![converter.column(&ColumnRef::new(fetch, 0, column.clone()))?],
            ),
            GroupKind::EmbeddableElements {
                embeddable,
                column_prefix,
            } => {
                let columns = embeddable_columns(converter.metamodel(), embeddable, column_prefix)?
                    .into_iter()
                    .map(|(c, _)| converter.column(&ColumnRef::new(fetch, 0, c)))
                    .collect::<PlanResult<Vec<_>>>()?;
                (embeddable.clone(), columns)
            }
        };

        owners.push((fetch, shape.items.len()));
        push_item(
            &mut select,
            &mut shape,
            columns,
            group.user_alias.clone(),
            ResultMapping::Fetch {
                target,
                owner,
                attribute: join.attribute.clone(),
            },
        );
    }

    Ok((select, shape))
}

/// Alias of column `n` of result item `item`.
pub(crate) fn column_alias(item: usize, n: usize) -> String {
    format!("col_{}_{}_", item, n)
}

fn push_item(
    select: &mut Vec<SelectExpr>,
    shape: &mut ResultShape,
    columns: Vec<Expr>,
    alias: Option<String>,
    mapping: ResultMapping,
) {
    let item = shape.items.len();
    let mut aliases = Vec::with_capacity(columns.len());
    for (n, column) in columns.into_iter().enumerate() {
        let column_alias = column_alias(item, n);
        select.push(SelectExpr::new(column).with_alias(&column_alias));
        aliases.push(column_alias);
    }
    shape.items.push(ResultItem {
        alias,
        columns: aliases,
        mapping,
    });
}

/// Best-effort Java-side type of a scalar select item.
pub(crate) fn scalar_type(expr: &BoundExpr, parameters: &ParameterRegistry) -> Option<ValueType> {
    match expr {
        BoundExpr::Column { value_type, .. } => Some(*value_type),
        BoundExpr::Discriminator { .. } | BoundExpr::TypeLiteral { .. } => Some(ValueType::String),
        BoundExpr::CountStar => Some(ValueType::Long),
        BoundExpr::Size(_) => Some(ValueType::Integer),
        BoundExpr::Literal(literal) => match literal {
            Literal::Integer(_) => Some(ValueType::Integer),
            Literal::Decimal(_) => Some(ValueType::Double),
            Literal::String(_) => Some(ValueType::String),
            Literal::Boolean(_) => Some(ValueType::Boolean),
            Literal::Null => None,
        },
        BoundExpr::Parameter { slot } => parameters.slots().get(*slot).and_then(|s| s.value_type),
        BoundExpr::Function { name, args, .. } => match name.to_ascii_lowercase().as_str() {
            "count" => Some(ValueType::Long),
            "avg" => Some(ValueType::Double),
            "sum" | "min" | "max" | "abs" | "coalesce" | "nullif" => {
                args.first().and_then(|a| scalar_type(a, parameters))
            }
            "upper" | "lower" | "trim" | "concat" | "substring" | "str" => Some(ValueType::String),
            "length" | "locate" => Some(ValueType::Integer),
            _ => None,
        },
        BoundExpr::Binary { left, op, right } => match op {
            BinaryOp::Concat => Some(ValueType::String),
            op if op.is_comparison() => Some(ValueType::Boolean),
            BinaryOp::And | BinaryOp::Or => Some(ValueType::Boolean),
            _ => scalar_type(left, parameters).or_else(|| scalar_type(right, parameters)),
        },
        BoundExpr::Unary { op, expr } => match op {
            crate::hql::UnaryOp::Not => Some(ValueType::Boolean),
            crate::hql::UnaryOp::Neg => scalar_type(expr, parameters),
        },
        BoundExpr::Case {
            whens, else_result, ..
        } => whens
            .iter()
            .find_map(|(_, then)| scalar_type(then, parameters))
            .or_else(|| else_result.as_ref().and_then(|e| scalar_type(e, parameters))),
        BoundExpr::Paren(inner) => scalar_type(inner, parameters),
        BoundExpr::IsNull { .. }
        | BoundExpr::Between { .. }
        | BoundExpr::InList { .. }
        | BoundExpr::Like { .. }
        | BoundExpr::IsEmpty { .. }
        | BoundExpr::MemberOf { .. } => Some(ValueType::Boolean),
        BoundExpr::Entity { .. }
        | BoundExpr::Embeddable { .. }
        | BoundExpr::ResultVariable(_)
        | BoundExpr::Error => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hql;
    use crate::metamodel::fixtures;
    use crate::semantic::{Binder, TranslationContext};
    use crate::sql::Dialect;

    fn shape_of(query: &str) -> (Vec<SelectExpr>, ResultShape) {
        let metamodel = fixtures::sample();
        let statement = hql::parse(query).statement.unwrap();
        let mut ctx = TranslationContext::new();
        let bound = Binder::new(&metamodel, query, &mut ctx).bind(&statement);
        assert!(!ctx.errors.has_errors(), "{:?}", ctx.errors.errors());
        let TranslationContext {
            joins, parameters, ..
        } = &mut ctx;
        let mut converter = ExprConverter::new(&metamodel, Dialect::DuckDb, joins, &bound.select);
        build_select(&mut converter, &bound, parameters).unwrap()
    }

    #[test]
    fn test_entity_item_expands_with_numbered_aliases() {
        let (select, shape) = shape_of("from Person p");
        assert_eq!(select.len(), 6);
        assert_eq!(shape.items.len(), 1);
        assert_eq!(
            shape.items[0].columns,
            vec!["col_0_0_", "col_0_1_", "col_0_2_", "col_0_3_", "col_0_4_", "col_0_5_"]
        );
        assert_eq!(
            shape.items[0].mapping,
            ResultMapping::Entity {
                entity: "com.acme.Person".into()
            }
        );
    }

    #[test]
    fn test_scalar_items_carry_types() {
        let (_, shape) = shape_of("select p.name, count(p), avg(p.age) as a from Person p group by p.name");
        let types: Vec<_> = shape
            .items
            .iter()
            .map(|i| match &i.mapping {
                ResultMapping::Scalar { value_type } => *value_type,
                other => panic!("unexpected mapping {:?}", other),
            })
            .collect();
        assert_eq!(
            types,
            vec![Some(ValueType::String), Some(ValueType::Long), Some(ValueType::Double)]
        );
        assert_eq!(shape.items[2].alias.as_deref(), Some("a"));
    }

    #[test]
    fn test_embeddable_item() {
        let (_, shape) = shape_of("select c.billing from Customer c");
        assert_eq!(shape.items[0].columns.len(), 2);
        assert_eq!(
            shape.items[0].mapping,
            ResultMapping::Embeddable {
                embeddable: "Address".into()
            }
        );
    }

    #[test]
    fn test_fetch_items_follow_select_items() {
        let (_, shape) = shape_of("select o from Order o join fetch o.customer c join fetch o.lines");
        assert_eq!(shape.items.len(), 3);
        assert_eq!(
            shape.items[1].mapping,
            ResultMapping::Fetch {
                target: "Customer".into(),
                owner: 0,
                attribute: "customer".into(),
            }
        );
        assert_eq!(shape.items[1].alias.as_deref(), Some("c"));
        assert_eq!(shape.items[2].columns[0], "col_2_0_");
        assert_eq!(shape.column_count(), 4 + 4 + 3);
    }

    #[test]
    fn test_shape_serializes_tagged() {
        let (_, shape) = shape_of("select count(*) from Order o");
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(
            json,
            r#"{"items":[{"columns":["col_0_0_"],"mapping":{"kind":"scalar","value_type":"long"}}]}"#
        );
    }
}

//! Bound expression to SQL expression conversion.

use crate::hql::{BinaryOp, Literal as HqlLiteral, UnaryOp};
use crate::metamodel::table::{
    embeddable_columns, entity_columns, entity_tables, identifier_columns,
};
use crate::metamodel::{CollectionElement, EntityType, Metamodel, MetamodelError};
use crate::semantic::{BoundExpr, BoundSelectItem, ColumnRef, CollectionRef, GroupId, JoinIndex};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{
    count_star, lit_int, lit_str, BinaryOperator as SqlBinaryOp, Expr as SqlExpr, ExprExt,
    Literal as SqlLiteral, UnaryOperator as SqlUnaryOp,
};
use crate::sql::query::{Query, SelectExpr, TableRef};

use super::select::column_alias;
use super::{PlanError, PlanResult};

/// Converts bound expressions into SQL expressions qualified by the
/// generated table aliases.
///
/// Holds the join index mutably: collection subqueries reserve fresh
/// aliases from the same generator as the main query.
pub struct ExprConverter<'a> {
    metamodel: &'a dyn Metamodel,
    dialect: Dialect,
    joins: &'a mut JoinIndex,
    select: &'a [BoundSelectItem],
}

impl<'a> ExprConverter<'a> {
    pub fn new(
        metamodel: &'a dyn Metamodel,
        dialect: Dialect,
        joins: &'a mut JoinIndex,
        select: &'a [BoundSelectItem],
    ) -> Self {
        Self {
            metamodel,
            dialect,
            joins,
            select,
        }
    }

    pub fn joins(&self) -> &JoinIndex {
        self.joins
    }

    pub fn metamodel(&self) -> &'a dyn Metamodel {
        self.metamodel
    }

    /// Convert a scalar-positioned expression.
    ///
    /// Entity references become their identifier (a row value when the
    /// identifier is composite); embeddables become a row value.
    pub fn convert(&mut self, expr: &BoundExpr) -> PlanResult<SqlExpr> {
        match expr {
            BoundExpr::Column { column, .. } | BoundExpr::Discriminator { column } => self.column(column),

            BoundExpr::Entity { group, entity } => {
                let columns = self.identifier_columns(*group, entity)?;
                Ok(row_value(columns))
            }

            BoundExpr::Embeddable { columns, .. } => {
                let columns = columns
                    .iter()
                    .map(|c| self.column(c))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(row_value(columns))
            }

            BoundExpr::Literal(literal) => Ok(SqlExpr::Literal(match literal {
                HqlLiteral::Integer(n) => SqlLiteral::Int(*n),
                HqlLiteral::Decimal(f) => SqlLiteral::Float(*f),
                HqlLiteral::String(s) => SqlLiteral::String(s.clone()),
                HqlLiteral::Boolean(b) => SqlLiteral::Bool(*b),
                HqlLiteral::Null => SqlLiteral::Null,
            })),

            BoundExpr::Parameter { slot } => Ok(SqlExpr::Parameter(*slot)),

            BoundExpr::TypeLiteral { value, .. } => Ok(lit_str(value)),

            BoundExpr::Binary { left, op, right } => {
                let left = self.convert(left)?;
                let right = widen_parameter(self.convert(right)?, &left);
                Ok(SqlExpr::BinaryOp {
                    left: Box::new(widen_parameter(left, &right)),
                    op: convert_binary_op(*op),
                    right: Box::new(right),
                })
            }

            BoundExpr::Unary { op, expr } => Ok(SqlExpr::UnaryOp {
                op: match op {
                    UnaryOp::Not => SqlUnaryOp::Not,
                    UnaryOp::Neg => SqlUnaryOp::Minus,
                },
                expr: Box::new(self.convert(expr)?),
            }),

            BoundExpr::Function {
                name,
                args,
                distinct,
            } => self.convert_function(name, args, *distinct),

            BoundExpr::CountStar => Ok(count_star()),

            BoundExpr::Case {
                operand,
                whens,
                else_result,
            } => Ok(SqlExpr::Case {
                operand: match operand {
                    Some(o) => Some(Box::new(self.convert(o)?)),
                    None => None,
                },
                when_clauses: whens
                    .iter()
                    .map(|(w, t)| Ok((self.convert(w)?, self.convert(t)?)))
                    .collect::<PlanResult<Vec<_>>>()?,
                else_clause: match else_result {
                    Some(e) => Some(Box::new(self.convert(e)?)),
                    None => None,
                },
            }),

            BoundExpr::IsNull { expr, negated } => {
                let columns = self.expand(expr)?;
                let checks = columns
                    .into_iter()
                    .map(|c| SqlExpr::IsNull {
                        expr: Box::new(c),
                        negated: *negated,
                    })
                    .collect();
                all_of(checks)
            }

            BoundExpr::Between {
                expr,
                low,
                high,
                negated,
            } => Ok(SqlExpr::Between {
                expr: Box::new(self.convert(expr)?),
                low: Box::new(self.convert(low)?),
                high: Box::new(self.convert(high)?),
                negated: *negated,
            }),

            BoundExpr::InList {
                expr,
                list,
                negated,
            } => {
                let expr = self.convert(expr)?;
                let values = list
                    .iter()
                    .map(|item| Ok(widen_parameter(self.convert(item)?, &expr)))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(SqlExpr::In {
                    expr: Box::new(expr),
                    values,
                    negated: *negated,
                })
            }

            BoundExpr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => Ok(SqlExpr::Like {
                expr: Box::new(self.convert(expr)?),
                pattern: Box::new(self.convert(pattern)?),
                escape: match escape {
                    Some(e) => Some(Box::new(self.convert(e)?)),
                    None => None,
                },
                negated: *negated,
            }),

            BoundExpr::Size(collection) => {
                let subquery = self.collection_subquery(collection, |_| vec![count_star()])?;
                Ok(SqlExpr::Subquery(Box::new(subquery)))
            }

            BoundExpr::IsEmpty {
                collection,
                negated,
            } => {
                let subquery = self.collection_subquery(collection, |_| vec![lit_int(1)])?;
                Ok(SqlExpr::Exists {
                    subquery: Box::new(subquery),
                    negated: !negated,
                })
            }

            BoundExpr::MemberOf {
                element,
                collection,
                negated,
            } => {
                let element = self.convert(element)?;
                let subquery = self.collection_subquery(collection, |elements| elements)?;
                Ok(SqlExpr::InSubquery {
                    expr: Box::new(element),
                    subquery: Box::new(subquery),
                    negated: *negated,
                })
            }

            BoundExpr::Paren(inner) => Ok(SqlExpr::Paren(Box::new(self.convert(inner)?))),

            BoundExpr::ResultVariable(index) => {
                let item = self.select_item(*index)?;
                self.convert(&item)
            }

            BoundExpr::Error => Err(PlanError::Internal(
                "unbound expression reached the producer".into(),
            )),
        }
    }

    /// Every column an expression stands for: all identifier columns of an
    /// entity, all columns of an embeddable, or the expression itself.
    pub fn expand(&mut self, expr: &BoundExpr) -> PlanResult<Vec<SqlExpr>> {
        match expr {
            BoundExpr::Entity { group, entity } => self.identifier_columns(*group, entity),
            BoundExpr::Embeddable { columns, .. } => columns.iter().map(|c| self.column(c)).collect(),
            BoundExpr::ResultVariable(index) => {
                let item = self.select_item(*index)?;
                self.expand(&item)
            }
            other => Ok(vec![self.convert(other)?]),
        }
    }

    /// Sort keys of an order by expression.
    ///
    /// A result variable naming a computed select item sorts by that item's
    /// column alias; columns and composite values sort by their columns.
    pub fn sort_columns(&mut self, expr: &BoundExpr) -> PlanResult<Vec<SqlExpr>> {
        if let BoundExpr::ResultVariable(index) = expr {
            let item = self.select_item(*index)?;
            let computed = !matches!(
                item,
                BoundExpr::Entity { .. }
                    | BoundExpr::Embeddable { .. }
                    | BoundExpr::Column { .. }
                    | BoundExpr::Discriminator { .. }
            );
            if computed {
                return Ok(vec![SqlExpr::Column {
                    table: None,
                    column: column_alias(*index, 0),
                }]);
            }
        }
        self.expand(expr)
    }

    /// Every mapped column of an entity group, in result order.
    pub fn entity_columns(&self, group: GroupId, entity: &str) -> PlanResult<Vec<SqlExpr>> {
        let entity = self.entity(entity)?;
        let offset = self.entity_table(group)?;
        entity_columns(self.metamodel, entity)?
            .into_iter()
            .map(|c| self.column(&ColumnRef::new(group, offset + c.table, c.column)))
            .collect()
    }

    pub fn identifier_columns(&self, group: GroupId, entity: &str) -> PlanResult<Vec<SqlExpr>> {
        let entity = self.entity(entity)?;
        let offset = self.entity_table(group)?;
        identifier_columns(self.metamodel, entity)?
            .into_iter()
            .map(|c| self.column(&ColumnRef::new(group, offset + c.table, c.column)))
            .collect()
    }

    pub fn column(&self, column: &ColumnRef) -> PlanResult<SqlExpr> {
        let alias = self.joins.table_alias(column).ok_or_else(|| {
            PlanError::Internal(format!(
                "no table {} in group {} for column {}",
                column.table, column.group, column.column
            ))
        })?;
        Ok(qualified(alias, &column.column))
    }

    fn entity(&self, name: &str) -> PlanResult<&'a EntityType> {
        self.metamodel
            .entity_type(name)
            .ok_or_else(|| PlanError::Metamodel(MetamodelError::UnknownType(name.to_string())))
    }

    fn entity_table(&self, group: GroupId) -> PlanResult<usize> {
        self.joins
            .group(group)
            .map(|g| g.entity_table)
            .ok_or_else(|| PlanError::Internal(format!("unknown table group {}", group)))
    }

    fn select_item(&self, index: usize) -> PlanResult<BoundExpr> {
        self.select
            .get(index)
            .map(|item| item.expr.clone())
            .ok_or_else(|| PlanError::Internal(format!("unknown result variable {}", index)))
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn convert_function(&mut self, name: &str, args: &[BoundExpr], distinct: bool) -> PlanResult<SqlExpr> {
        if name == "count" {
            if let [arg @ (BoundExpr::Entity { .. } | BoundExpr::Embeddable { .. })] = args {
                return self.count_composite(arg, distinct);
            }
        }
        Ok(SqlExpr::Function {
            name: name.to_string(),
            args: args
                .iter()
                .map(|a| self.convert(a))
                .collect::<PlanResult<Vec<_>>>()?,
            distinct,
        })
    }

    /// `count` over an entity or embeddable.
    ///
    /// An entity counts its first identifier column unless a distinct count
    /// needs the whole identifier. A distinct count over several columns
    /// uses `count(distinct a, b)` or the row value `count(distinct (a, b))`;
    /// dialects with neither reject the query. A plain count over several
    /// columns counts the rows where every column is set.
    fn count_composite(&mut self, arg: &BoundExpr, distinct: bool) -> PlanResult<SqlExpr> {
        let mut columns = self.expand(arg)?;
        let is_entity = matches!(arg, BoundExpr::Entity { .. });

        let args = if columns.len() == 1 || (is_entity && !distinct) {
            columns.truncate(1);
            columns
        } else if distinct {
            if self.dialect.supports_tuple_distinct_counts() {
                columns
            } else if self.dialect.supports_tuple_counts() {
                vec![SqlExpr::Tuple(columns)]
            } else {
                return Err(PlanError::Unsupported {
                    feature: "count(distinct) over a composite value",
                    dialect: self.dialect.name(),
                });
            }
        } else if self.dialect.supports_tuple_counts() {
            vec![SqlExpr::Tuple(columns)]
        } else {
            let checks = columns
                .into_iter()
                .map(|c| SqlExpr::IsNull {
                    expr: Box::new(c),
                    negated: true,
                })
                .collect();
            vec![SqlExpr::Case {
                operand: None,
                when_clauses: vec![(all_of(checks)?, lit_int(1))],
                else_clause: None,
            }]
        };

        Ok(SqlExpr::Function {
            name: "count".into(),
            args,
            distinct,
        })
    }

    // =========================================================================
    // Collection subqueries
    // =========================================================================

    /// `SELECT <select(elements)> FROM <collection table> WHERE <key = owner id>`,
    /// correlated to the owner group.
    fn collection_subquery(
        &mut self,
        collection: &CollectionRef,
        select: impl FnOnce(Vec<SqlExpr>) -> Vec<SqlExpr>,
    ) -> PlanResult<Query> {
        let mapping = &collection.mapping;
        let alias = self.joins.reserve_alias(&mapping.name);

        let (table, schema, element_columns) = match (&mapping.table, &mapping.element) {
            (None, CollectionElement::Entity { target, .. }) => {
                let target = self.entity(target)?;
                let root = entity_tables(self.metamodel, target)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| MetamodelError::UnknownType(target.name.clone()))?;
                let ids = identifier_columns(self.metamodel, target)?
                    .into_iter()
                    .map(|c| c.column)
                    .collect();
                (root.name, root.schema, ids)
            }
            (Some(table), CollectionElement::Entity { columns, .. }) => {
                (table.clone(), mapping.schema.clone(), columns.clone())
            }
            (Some(table), CollectionElement::Basic { column, .. }) => {
                (table.clone(), mapping.schema.clone(), vec![column.clone()])
            }
            (Some(table), CollectionElement::Embeddable {
                embeddable,
                column_prefix,
            }) => {
                let columns = embeddable_columns(self.metamodel, embeddable, column_prefix)?
                    .into_iter()
                    .map(|(c, _)| c)
                    .collect();
                (table.clone(), mapping.schema.clone(), columns)
            }
            (None, _) => {
                return Err(PlanError::Internal(format!(
                    "{}: element collection without a table",
                    collection.path
                )))
            }
        };

        let mut from = TableRef::new(&table).with_alias(&alias);
        if let Some(schema) = &schema {
            from = from.with_schema(schema);
        }

        let correlation = mapping
            .key_columns
            .iter()
            .zip(&collection.owner_ids)
            .map(|(key, owner)| Ok(equals(qualified(&alias, key), self.column(owner)?)))
            .collect::<PlanResult<Vec<_>>>()?;

        let elements = element_columns
            .iter()
            .map(|c| qualified(&alias, c))
            .collect();
        let items: Vec<SelectExpr> = select(elements).into_iter().map(SelectExpr::new).collect();

        let mut query = Query::new().select(items).from(from);
        if let Some(predicate) = SqlExpr::conjunction(correlation) {
            query = query.filter(predicate);
        }
        Ok(query)
    }
}

pub(crate) fn qualified(alias: &str, column: &str) -> SqlExpr {
    SqlExpr::Column {
        table: Some(alias.to_string()),
        column: column.to_string(),
    }
}

pub(crate) fn equals(left: SqlExpr, right: SqlExpr) -> SqlExpr {
    left.binary(SqlBinaryOp::Eq, right)
}

/// A single column, or a row value of several.
fn row_value(mut columns: Vec<SqlExpr>) -> SqlExpr {
    if columns.len() == 1 {
        columns.remove(0)
    } else {
        SqlExpr::Tuple(columns)
    }
}

/// A placeholder facing a row value becomes a row of placeholders for the
/// same parameter, one per column.
fn widen_parameter(expr: SqlExpr, other: &SqlExpr) -> SqlExpr {
    match (expr, other) {
        (SqlExpr::Parameter(slot), SqlExpr::Tuple(columns)) => {
            SqlExpr::Tuple(columns.iter().map(|_| SqlExpr::Parameter(slot)).collect())
        }
        (expr, _) => expr,
    }
}

fn all_of(predicates: Vec<SqlExpr>) -> PlanResult<SqlExpr> {
    SqlExpr::conjunction(predicates)
        .ok_or_else(|| PlanError::Internal("empty null check".into()))
}

fn convert_binary_op(op: BinaryOp) -> SqlBinaryOp {
    match op {
        BinaryOp::Eq => SqlBinaryOp::Eq,
        BinaryOp::Ne => SqlBinaryOp::Ne,
        BinaryOp::Lt => SqlBinaryOp::Lt,
        BinaryOp::Le => SqlBinaryOp::Lte,
        BinaryOp::Gt => SqlBinaryOp::Gt,
        BinaryOp::Ge => SqlBinaryOp::Gte,
        BinaryOp::And => SqlBinaryOp::And,
        BinaryOp::Or => SqlBinaryOp::Or,
        BinaryOp::Add => SqlBinaryOp::Plus,
        BinaryOp::Sub => SqlBinaryOp::Minus,
        BinaryOp::Mul => SqlBinaryOp::Mul,
        BinaryOp::Div => SqlBinaryOp::Div,
        BinaryOp::Mod => SqlBinaryOp::Mod,
        BinaryOp::Concat => SqlBinaryOp::Concat,
    }
}

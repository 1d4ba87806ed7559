//! From-clause assembly from the table groups of the join index.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::semantic::join_index::TableReference;
use crate::semantic::{GroupId, JoinIndex, TableGroup};
use crate::sql::expr::{lit_str, Expr, ExprExt};
use crate::sql::query::{Join, JoinType, TableRef};

use super::expr_converter::{equals, qualified};
use super::{PlanError, PlanResult};

/// FROM table, joins in emission order, and the predicates of root groups
/// that belong in WHERE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FromClause {
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub root_predicates: Vec<Expr>,
}

pub struct JoinBuilder<'a> {
    joins: &'a JoinIndex,
}

impl<'a> JoinBuilder<'a> {
    pub fn new(joins: &'a JoinIndex) -> Self {
        Self { joins }
    }

    /// Groups in emission order: every group after the group it joins from
    /// and after every group its `with` condition reads.
    ///
    /// Among the groups ready at a given point the earliest created goes
    /// first, so queries without `with` conditions keep creation order.
    pub fn join_order(&self) -> PlanResult<Vec<GroupId>> {
        let groups = self.joins.groups();
        let mut graph: DiGraph<GroupId, ()> = DiGraph::with_capacity(groups.len(), groups.len());
        let nodes: HashMap<GroupId, NodeIndex> =
            groups.iter().map(|g| (g.id, graph.add_node(g.id))).collect();

        for group in groups {
            let Some(join) = &group.join else { continue };
            let mut dependencies = vec![join.parent];
            if let Some(condition) = &join.condition {
                dependencies.extend(condition.referenced_groups());
            }
            for dependency in dependencies {
                if dependency == group.id {
                    continue;
                }
                if let (Some(&from), Some(&to)) = (nodes.get(&dependency), nodes.get(&group.id)) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        if let Err(cycle) = petgraph::algo::toposort(&graph, None) {
            let group = graph[cycle.node_id()];
            let alias = groups
                .get(group)
                .map(|g| g.user_alias.clone().unwrap_or_else(|| g.path.clone()))
                .unwrap_or_default();
            return Err(PlanError::JoinCycle(alias));
        }

        let mut pending: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();
        let mut ready: BinaryHeap<Reverse<GroupId>> = graph
            .node_indices()
            .filter(|n| pending.get(n) == Some(&0))
            .map(|n| Reverse(graph[n]))
            .collect();

        let mut order = Vec::with_capacity(groups.len());
        while let Some(Reverse(group)) = ready.pop() {
            order.push(group);
            let Some(&node) = nodes.get(&group) else { continue };
            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(count) = pending.get_mut(&next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(graph[next]));
                    }
                }
            }
        }

        tracing::trace!(?order, "join order");
        Ok(order)
    }

    /// Emit every group in `order`.
    ///
    /// `conditions` holds converted `with` conditions and `filters` the
    /// filter predicates, both keyed by group.
    pub fn build(
        &self,
        order: &[GroupId],
        conditions: &HashMap<GroupId, Expr>,
        filters: &HashMap<GroupId, Expr>,
    ) -> PlanResult<FromClause> {
        let mut clause = FromClause::default();

        for &id in order {
            let group = self
                .joins
                .group(id)
                .ok_or_else(|| PlanError::Internal(format!("unknown table group {}", id)))?;

            let mut entity_predicates = Vec::new();
            if let Some(restriction) = restriction_predicate(group) {
                entity_predicates.push(restriction);
            }
            if let Some(filter) = filters.get(&id) {
                entity_predicates.push(filter.clone());
            }

            match &group.join {
                None => self.emit_root(group, entity_predicates, &mut clause),
                Some(join) => {
                    let last = group.tables.len().saturating_sub(1);
                    for (index, table) in group.tables.iter().enumerate() {
                        let mut on = if index == 0 {
                            join.on
                                .iter()
                                .map(|(parent, column)| {
                                    let alias = self.joins.table_alias(parent).ok_or_else(|| {
                                        PlanError::Internal(format!(
                                            "{}: parent column {} has no table",
                                            group.path, parent.column
                                        ))
                                    })?;
                                    Ok(equals(qualified(alias, &parent.column), qualified(&table.alias, column)))
                                })
                                .collect::<PlanResult<Vec<_>>>()?
                        } else {
                            self.key_equalities(group, table)
                        };
                        if index == group.entity_table {
                            on.append(&mut entity_predicates);
                        }
                        if index == last {
                            if let Some(condition) = conditions.get(&id) {
                                on.push(condition.clone());
                            }
                        }
                        clause.joins.push(Join {
                            join_type: join.join_type,
                            table: table_ref(table),
                            on: Expr::conjunction(on),
                        });
                    }
                }
            }
        }

        Ok(clause)
    }

    /// The first root becomes FROM, later ones CROSS JOIN; a root's
    /// subclass tables join it with INNER joins.
    fn emit_root(&self, group: &TableGroup, predicates: Vec<Expr>, clause: &mut FromClause) {
        for (index, table) in group.tables.iter().enumerate() {
            if index == 0 {
                if clause.from.is_none() {
                    clause.from = Some(table_ref(table));
                } else {
                    clause.joins.push(Join {
                        join_type: JoinType::Cross,
                        table: table_ref(table),
                        on: None,
                    });
                }
            } else {
                clause.joins.push(Join {
                    join_type: JoinType::Inner,
                    table: table_ref(table),
                    on: Expr::conjunction(self.key_equalities(group, table)),
                });
            }
        }
        clause.root_predicates.extend(predicates);
    }

    /// Equalities joining a table to an earlier table of the same group.
    fn key_equalities(&self, group: &TableGroup, table: &TableReference) -> Vec<Expr> {
        table
            .join_columns
            .iter()
            .filter_map(|(earlier, earlier_column, column)| {
                let earlier = group.tables.get(*earlier)?;
                Some(equals(
                    qualified(&earlier.alias, earlier_column),
                    qualified(&table.alias, column),
                ))
            })
            .collect()
    }
}

/// `alias.kind = 'CAT'`, or `IN (...)` when subtypes share the restriction.
fn restriction_predicate(group: &TableGroup) -> Option<Expr> {
    let (column, values) = group.restriction.as_ref()?;
    let column = qualified(group.entity_alias(), column);
    match values.as_slice() {
        [] => None,
        [single] => Some(column.eq(lit_str(single))),
        many => Some(column.in_list(many.iter().map(|v| lit_str(v)).collect())),
    }
}

fn table_ref(table: &TableReference) -> TableRef {
    let table_ref = TableRef::new(&table.table).with_alias(&table.alias);
    match &table.schema {
        Some(schema) => table_ref.with_schema(schema),
        None => table_ref,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hql;
    use crate::metamodel::fixtures;
    use crate::semantic::{Binder, TranslationContext};
    use crate::sql::Dialect;

    fn bind(query: &str) -> TranslationContext {
        let metamodel = fixtures::sample();
        let statement = hql::parse(query).statement.unwrap();
        let mut ctx = TranslationContext::new();
        let _ = Binder::new(&metamodel, query, &mut ctx).bind(&statement);
        assert!(!ctx.errors.has_errors(), "{:?}", ctx.errors.errors());
        ctx
    }

    fn render_joins(clause: &FromClause) -> Vec<String> {
        clause
            .joins
            .iter()
            .map(|j| j.tokens(Dialect::Postgres).serialize_compact(Dialect::Postgres))
            .collect()
    }

    #[test]
    fn test_creation_order_without_conditions() {
        let ctx = bind("select l.product.name from Order o join o.lines l where o.customer.name = 'x'");
        let order = JoinBuilder::new(&ctx.joins).join_order().unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_with_condition_dependency_is_emitted_first() {
        let ctx = bind("from Order o join o.lines l with l.quantity > o.customer.id");
        let order = JoinBuilder::new(&ctx.joins).join_order().unwrap();
        assert_eq!(ctx.joins.lookup(0, "customer"), Some(2));
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_join_cycle_is_reported() {
        let ctx = bind("from Order o join o.lines l with l.product.name = 'x'");
        let err = JoinBuilder::new(&ctx.joins).join_order().unwrap_err();
        assert!(matches!(err, PlanError::JoinCycle(_)));
        assert!(err.to_string().starts_with("cycle in join dependencies involving "));
    }

    #[test]
    fn test_joined_subclass_root_uses_inner_key_join() {
        let ctx = bind("from Employee e");
        let builder = JoinBuilder::new(&ctx.joins);
        let order = builder.join_order().unwrap();
        let clause = builder.build(&order, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(clause.from.as_ref().unwrap().alias.as_deref(), Some("e1_0"));
        assert_eq!(
            render_joins(&clause),
            vec!["INNER JOIN employee AS e1_1 ON e1_0.id = e1_1.person_id"]
        );
    }

    #[test]
    fn test_single_table_subclass_restriction_goes_to_where() {
        let ctx = bind("from Cat c");
        let builder = JoinBuilder::new(&ctx.joins);
        let order = builder.join_order().unwrap();
        let clause = builder.build(&order, &HashMap::new(), &HashMap::new()).unwrap();
        assert!(clause.joins.is_empty());
        assert_eq!(
            clause.root_predicates,
            vec![qualified("c1_0", "kind").eq(lit_str("CAT"))]
        );
    }

    #[test]
    fn test_many_to_many_join_emits_both_tables() {
        let ctx = bind("select p.code from Order o left join o.promotions p");
        let builder = JoinBuilder::new(&ctx.joins);
        let order = builder.join_order().unwrap();
        let clause = builder.build(&order, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(
            render_joins(&clause),
            vec![
                "LEFT JOIN order_promotion AS p1_0 ON o1_0.id = p1_0.order_id",
                "LEFT JOIN promotion AS p1_1 ON p1_0.promotion_id = p1_1.id",
            ]
        );
    }
}

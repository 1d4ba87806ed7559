//! Semantic binding.
//!
//! Walks the syntax tree clause by clause (from, select, where, group by,
//! having, order by, limit/offset) and turns every identifier into a bound
//! leaf: a table-group column, an entity or embeddable reference, a
//! parameter slot or a literal. Problems are reported to the context's
//! error handler and binding continues, so one pass collects every error.

use crate::hql::{
    BinaryOp, Expr, FromClause, JoinDecl, JoinKind, Literal, SelectClause, SelectStatement, SortSpec,
    Span, Spanned,
};
use crate::metamodel::table::identifier_columns;
use crate::metamodel::{CollectionElement, Metamodel, ValueType};
use crate::sql::JoinType;

use super::bound::{
    BoundExpr, BoundQuery, BoundSelectItem, BoundSort, ParameterDeclaration, ParameterKey,
};
use super::join_index::{AliasTarget, ColumnRef, GroupId, GroupView};
use super::path::{Clause, CollectionRef, ExplicitJoin, PathResolver, PathTarget, ResolvedPath, Scope};
use super::TranslationContext;

/// Functions whose names are normalized to lower case.
const AGGREGATES: &[&str] = &["count", "sum", "avg", "min", "max"];

/// How the surrounding expression uses a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathUsage {
    Value,
    Comparison,
}

/// Binds one statement against a metamodel.
pub struct Binder<'a, 'c> {
    metamodel: &'a dyn Metamodel,
    source: &'a str,
    ctx: &'c mut TranslationContext,
    declared: &'a [ParameterDeclaration],
    strict: bool,
    clause: Clause,
    roots: Vec<GroupId>,
    /// Result variable of each select item.
    result_variables: Vec<Option<String>>,
    used_parameters: Vec<ParameterKey>,
    mixing_reported: bool,
}

impl<'a, 'c> Binder<'a, 'c> {
    pub fn new(metamodel: &'a dyn Metamodel, source: &'a str, ctx: &'c mut TranslationContext) -> Self {
        Self {
            metamodel,
            source,
            ctx,
            declared: &[],
            strict: false,
            clause: Clause::From,
            roots: vec![],
            result_variables: vec![],
            used_parameters: vec![],
            mixing_reported: false,
        }
    }

    /// Check parameter usage against caller declarations.
    pub fn with_declared_parameters(mut self, declared: &'a [ParameterDeclaration]) -> Self {
        self.declared = declared;
        self
    }

    /// Reject queries mixing named and positional parameters.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn bind(mut self, statement: &SelectStatement) -> BoundQuery {
        let mut query = BoundQuery::default();

        self.bind_from(&statement.from, &mut query);
        self.bind_select(statement.select.as_ref(), &mut query);
        self.check_fetch_owners(&query);

        if let Some(predicate) = &statement.where_clause {
            self.clause = Clause::Where;
            query.where_clause = Some(self.bind_expr(predicate));
        }

        self.clause = Clause::GroupBy;
        query.group_by = statement.group_by.iter().map(|e| self.bind_expr(e)).collect();

        if let Some(predicate) = &statement.having {
            self.clause = Clause::Having;
            query.having = Some(self.bind_expr(predicate));
        }

        self.clause = Clause::OrderBy;
        query.order_by = statement.order_by.iter().map(|s| self.bind_sort(s)).collect();

        query.limit = statement.limit.as_ref().map(|e| self.bind_row_limit(e));
        query.offset = statement.offset.as_ref().map(|e| self.bind_row_limit(e));

        self.check_declared_parameters();
        tracing::debug!(
            roots = query.roots.len(),
            groups = self.ctx.joins.len(),
            parameters = self.ctx.parameters.len(),
            "bound query"
        );
        query
    }

    // =========================================================================
    // From
    // =========================================================================

    fn bind_from(&mut self, from: &FromClause, query: &mut BoundQuery) {
        self.clause = Clause::From;
        for root in &from.roots {
            let Some(entity) = self.metamodel.entity_type(&root.entity) else {
                self.error(format!("{} is not mapped", root.entity.value));
                continue;
            };
            let path = root
                .alias
                .as_ref()
                .map(|a| a.value.clone())
                .unwrap_or_else(|| entity.simple_name().to_string());
            let group = match self.ctx.joins.create_root(self.metamodel, entity, &path) {
                Ok(id) => id,
                Err(e) => {
                    self.error(e.to_string());
                    continue;
                }
            };
            if let Some(alias) = &root.alias {
                self.register_alias(alias, AliasTarget { group, view: GroupView::Value });
            }
            self.roots.push(group);

            for join in &root.joins {
                self.bind_join(join, query);
            }
        }
        query.roots = self.roots.clone();
    }

    fn bind_join(&mut self, join: &JoinDecl, query: &mut BoundQuery) {
        self.clause = Clause::From;
        let Some(segments) = join.target.as_path() else {
            self.error(format!("illegal join target: {}", self.text(&join.target.span)));
            return;
        };
        let explicit = ExplicitJoin {
            join_type: match join.kind {
                JoinKind::Inner => JoinType::Inner,
                JoinKind::Left => JoinType::Left,
            },
            reusable: join.condition.is_none(),
        };
        let Some(resolved) = self.resolve(segments, None, Some(explicit)) else {
            return;
        };
        let Some((group, view)) = resolved.joined else {
            self.error(format!(
                "illegal join target, not an association: {}",
                self.text(&join.target.span)
            ));
            return;
        };

        if let Some(alias) = &join.alias {
            self.register_alias(alias, AliasTarget { group, view });
        }

        if join.fetch {
            if view == GroupView::Index {
                self.error(format!(
                    "fetch join requires an association path: {}",
                    self.text(&join.target.span)
                ));
            } else if join.condition.is_some() {
                self.error(format!(
                    "with clause not allowed on fetched associations: {}",
                    self.text(&join.target.span)
                ));
            } else if let Some(g) = self.ctx.joins.group_mut(group) {
                g.fetched = true;
                query.fetches.push(group);
            }
        }

        if let Some(condition) = &join.condition {
            self.clause = Clause::With;
            let bound = self.bind_expr(condition);
            if let Some(j) = self.ctx.joins.group_mut(group).and_then(|g| g.join.as_mut()) {
                j.condition = Some(bound);
            }
            self.clause = Clause::From;
        }
    }

    // =========================================================================
    // Select
    // =========================================================================

    fn bind_select(&mut self, select: Option<&Spanned<SelectClause>>, query: &mut BoundQuery) {
        self.clause = Clause::Select;
        let Some(select) = select else {
            for &group in &self.roots {
                if let Some(entity) = self.ctx.joins.group(group).and_then(|g| g.entity_name()) {
                    query.select.push(BoundSelectItem {
                        expr: BoundExpr::Entity {
                            group,
                            entity: entity.to_string(),
                        },
                        alias: None,
                    });
                    self.result_variables.push(None);
                }
            }
            return;
        };

        query.distinct = select.distinct;
        for item in &select.items {
            let expr = self.bind_expr(&item.expr);
            let alias = item.alias.as_ref().map(|a| a.value.clone());
            if let Some(alias) = &alias {
                if self.ctx.joins.has_alias(alias) {
                    self.error(format!("select alias duplicates a from-clause alias: {}", alias));
                } else if self.result_variables.iter().flatten().any(|v| v == alias) {
                    self.error(format!("duplicate select alias: {}", alias));
                }
            }
            self.result_variables.push(alias.clone());
            query.select.push(BoundSelectItem { expr, alias });
        }
    }

    /// Every fetched group must hang off a selected entity, possibly
    /// through other fetched groups.
    fn check_fetch_owners(&mut self, query: &BoundQuery) {
        let selected: Vec<GroupId> = query
            .select
            .iter()
            .filter_map(|item| match item.expr {
                BoundExpr::Entity { group, .. } => Some(group),
                _ => None,
            })
            .collect();

        for &fetch in &query.fetches {
            if self.fetch_owner_selected(fetch, &selected) {
                continue;
            }
            let path = self
                .ctx
                .joins
                .group(fetch)
                .map(|g| g.path.clone())
                .unwrap_or_default();
            self.error(format!(
                "query specified join fetching, but the owner of the fetched association was not present in the select list: {}",
                path
            ));
        }
    }

    fn fetch_owner_selected(&self, fetch: GroupId, selected: &[GroupId]) -> bool {
        let joins = &self.ctx.joins;
        let mut current = fetch;
        while let Some(parent) = joins.group(current).and_then(|g| g.parent()) {
            if selected.contains(&parent) {
                return true;
            }
            if !joins.group(parent).is_some_and(|g| g.fetched) {
                return false;
            }
            current = parent;
        }
        false
    }

    // =========================================================================
    // Order by / limit
    // =========================================================================

    fn bind_sort(&mut self, sort: &Spanned<SortSpec>) -> BoundSort {
        let expr = match &sort.expr.value {
            Expr::Path(segments) => {
                let variable = match segments.as_slice() {
                    [name] => self.result_variable(name),
                    _ => None,
                };
                match variable {
                    Some(index) => BoundExpr::ResultVariable(index),
                    None => self.bind_path(segments, PathUsage::Value),
                }
            }
            _ => {
                self.error(format!(
                    "order by expression must be a simple path or a select alias: {}",
                    self.text(&sort.expr.span)
                ));
                BoundExpr::Error
            }
        };
        BoundSort {
            expr,
            direction: sort.direction,
            nulls: sort.nulls,
        }
    }

    fn result_variable(&self, name: &str) -> Option<usize> {
        self.result_variables
            .iter()
            .position(|v| v.as_deref() == Some(name))
    }

    fn bind_row_limit(&mut self, expr: &Spanned<Expr>) -> BoundExpr {
        match &expr.value {
            Expr::Literal(Literal::Integer(_)) => self.bind_expr(expr),
            Expr::NamedParameter(_) | Expr::PositionalParameter(_) => {
                let bound = self.bind_expr(expr);
                if let BoundExpr::Parameter { slot } = bound {
                    self.ctx.parameters.infer_type(slot, ValueType::Integer);
                }
                bound
            }
            _ => {
                self.error(format!(
                    "limit and offset must be integer literals or parameters: {}",
                    self.text(&expr.span)
                ));
                BoundExpr::Error
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn bind_expr(&mut self, expr: &Spanned<Expr>) -> BoundExpr {
        match &expr.value {
            Expr::Path(segments) => self.bind_path(segments, PathUsage::Value),
            Expr::Literal(literal) => BoundExpr::Literal(literal.clone()),
            Expr::NamedParameter(name) => self.bind_parameter(ParameterKey::Named(name.clone())),
            Expr::PositionalParameter(None) => {
                self.error("legacy-style query parameters (`?`) are not supported; use ?1 or :name");
                BoundExpr::Error
            }
            Expr::PositionalParameter(Some(label)) => match label.parse() {
                Ok(0) => {
                    self.error("positional parameter labels start at 1: ?0");
                    BoundExpr::Error
                }
                Ok(position) => self.bind_parameter(ParameterKey::Positional(position)),
                Err(_) => {
                    self.error(format!("invalid positional parameter label: ?{}", label));
                    BoundExpr::Error
                }
            },
            Expr::Binary { left, op, right } => self.bind_binary(left, *op, right),
            Expr::Unary { op, expr } => BoundExpr::Unary {
                op: *op,
                expr: Box::new(self.bind_expr(expr)),
            },
            Expr::Function {
                name,
                args,
                distinct,
            } => self.bind_function(name, args, *distinct),
            Expr::Star => {
                self.error("`*` is only allowed in count(*)");
                BoundExpr::Error
            }
            Expr::Case {
                operand,
                whens,
                else_result,
            } => BoundExpr::Case {
                operand: operand.as_ref().map(|o| Box::new(self.bind_expr(o))),
                whens: whens
                    .iter()
                    .map(|(w, t)| (self.bind_expr(w), self.bind_expr(t)))
                    .collect(),
                else_result: else_result.as_ref().map(|e| Box::new(self.bind_expr(e))),
            },
            Expr::IsNull { expr, negated } => BoundExpr::IsNull {
                expr: Box::new(self.bind_expr(expr)),
                negated: *negated,
            },
            Expr::IsEmpty { expr, negated } => match self.bind_collection(expr, "is empty") {
                Some(collection) => BoundExpr::IsEmpty {
                    collection,
                    negated: *negated,
                },
                None => BoundExpr::Error,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let expr = self.bind_expr(expr);
                let low = self.bind_expr(low);
                let high = self.bind_expr(high);
                self.infer(&low, &expr);
                self.infer(&high, &expr);
                BoundExpr::Between {
                    expr: Box::new(expr),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: *negated,
                }
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let type_call = is_type_call(expr);
                let bound = self.bind_expr(expr);
                let list: Vec<BoundExpr> = list
                    .iter()
                    .map(|item| {
                        let literal = if type_call { self.entity_literal(item) } else { None };
                        literal.unwrap_or_else(|| self.bind_expr(item))
                    })
                    .collect();
                for item in &list {
                    self.infer(item, &bound);
                }
                BoundExpr::InList {
                    expr: Box::new(bound),
                    list,
                    negated: *negated,
                }
            }
            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                let expr = self.bind_expr(expr);
                let pattern = self.bind_expr(pattern);
                let escape = escape.as_ref().map(|e| self.bind_expr(e));
                self.infer_as(&pattern, ValueType::String);
                if let Some(escape) = &escape {
                    self.infer_as(escape, ValueType::String);
                }
                BoundExpr::Like {
                    expr: Box::new(expr),
                    pattern: Box::new(pattern),
                    escape: escape.map(Box::new),
                    negated: *negated,
                }
            }
            Expr::MemberOf {
                element,
                collection,
                negated,
            } => {
                let element = self.bind_expr(element);
                let Some(collection) = self.bind_collection(collection, "member of") else {
                    return BoundExpr::Error;
                };
                if let Some(value_type) = self.element_value_type(&collection) {
                    self.infer_as(&element, value_type);
                }
                BoundExpr::MemberOf {
                    element: Box::new(element),
                    collection,
                    negated: *negated,
                }
            }
            Expr::Paren(inner) => BoundExpr::Paren(Box::new(self.bind_expr(inner))),
            Expr::Error => BoundExpr::Error,
        }
    }

    fn bind_binary(&mut self, left: &Spanned<Expr>, op: BinaryOp, right: &Spanned<Expr>) -> BoundExpr {
        let (left, right) = if op.is_comparison() {
            (
                self.bind_comparison_operand(left, right),
                self.bind_comparison_operand(right, left),
            )
        } else {
            (self.bind_expr(left), self.bind_expr(right))
        };
        if !matches!(op, BinaryOp::And | BinaryOp::Or) {
            self.infer(&left, &right);
            self.infer(&right, &left);
        }
        BoundExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn bind_comparison_operand(&mut self, expr: &Spanned<Expr>, other: &Spanned<Expr>) -> BoundExpr {
        if is_type_call(other) {
            if let Some(literal) = self.entity_literal(expr) {
                return literal;
            }
        }
        match &expr.value {
            Expr::Path(segments) => self.bind_path(segments, PathUsage::Comparison),
            _ => self.bind_expr(expr),
        }
    }

    fn bind_function(&mut self, name: &Spanned<String>, args: &[Spanned<Expr>], distinct: bool) -> BoundExpr {
        let lower = name.value.to_ascii_lowercase();
        match (lower.as_str(), args) {
            ("count", [arg]) if matches!(arg.value, Expr::Star) => BoundExpr::CountStar,
            ("type", [arg]) => self.bind_type(arg),
            ("index", [arg]) => self.bind_index(arg),
            ("size", [arg]) => match self.bind_collection(arg, "size()") {
                Some(collection) => BoundExpr::Size(collection),
                None => BoundExpr::Error,
            },
            _ => BoundExpr::Function {
                name: if AGGREGATES.contains(&lower.as_str()) {
                    lower
                } else {
                    name.value.clone()
                },
                args: args.iter().map(|a| self.bind_expr(a)).collect(),
                distinct,
            },
        }
    }

    /// `TYPE(x)`: the discriminator column on x's root table.
    fn bind_type(&mut self, arg: &Spanned<Expr>) -> BoundExpr {
        let BoundExpr::Entity { group, entity } = self.bind_expr(arg) else {
            self.error(format!(
                "type() requires an entity-valued expression: {}",
                self.text(&arg.span)
            ));
            return BoundExpr::Error;
        };
        let column = self
            .metamodel
            .entity_type(&entity)
            .and_then(|e| self.metamodel.discriminator_column(e));
        let table = self
            .ctx
            .joins
            .group(group)
            .map(|g| g.entity_table)
            .unwrap_or_default();
        match column {
            Some(column) => BoundExpr::Discriminator {
                column: ColumnRef::new(group, table, column),
            },
            None => {
                let name = self
                    .metamodel
                    .entity_type(&entity)
                    .map(|e| e.simple_name().to_string())
                    .unwrap_or(entity);
                self.error(format!("entity type has no discriminator column: {}", name));
                BoundExpr::Error
            }
        }
    }

    /// `INDEX(alias)`: the index column of an indexed collection join.
    fn bind_index(&mut self, arg: &Spanned<Expr>) -> BoundExpr {
        let index = match arg.as_path() {
            Some([alias]) => self
                .ctx
                .joins
                .resolve_alias(alias)
                .and_then(|target| self.ctx.joins.group(target.group))
                .and_then(|g| Some((g.id, g.index_column.clone()?))),
            _ => None,
        };
        match index {
            Some((group, (column, value_type))) => BoundExpr::Column {
                column: ColumnRef::new(group, 0, column),
                value_type,
            },
            None => {
                self.error(format!(
                    "index() requires an indexed collection join: {}",
                    self.text(&arg.span)
                ));
                BoundExpr::Error
            }
        }
    }

    /// An entity name on the other side of `TYPE(x)`.
    fn entity_literal(&self, expr: &Spanned<Expr>) -> Option<BoundExpr> {
        let [name] = expr.as_path()? else {
            return None;
        };
        if self.ctx.joins.has_alias(name) {
            return None;
        }
        let entity = self.metamodel.entity_type(name)?;
        Some(BoundExpr::TypeLiteral {
            entity: entity.name.clone(),
            value: entity.discriminator_value().to_string(),
        })
    }

    // =========================================================================
    // Paths
    // =========================================================================

    fn bind_path(&mut self, segments: &[Spanned<String>], usage: PathUsage) -> BoundExpr {
        let Some(resolved) = self.resolve(segments, None, None) else {
            return BoundExpr::Error;
        };
        match resolved.target {
            PathTarget::Basic { column, value_type } | PathTarget::Index { column, value_type } => {
                BoundExpr::Column { column, value_type }
            }
            PathTarget::Entity { group, entity } => BoundExpr::Entity { group, entity },
            PathTarget::Embeddable { columns, embeddable } => BoundExpr::Embeddable { columns, embeddable },
            PathTarget::Size(collection) => BoundExpr::Size(collection),
            PathTarget::Collection(_) if self.clause == Clause::Select => {
                match self.resolve(segments, Some("elements"), None).map(|r| r.target) {
                    Some(PathTarget::Basic { column, value_type }) => BoundExpr::Column { column, value_type },
                    Some(PathTarget::Entity { group, entity }) => BoundExpr::Entity { group, entity },
                    Some(PathTarget::Embeddable { columns, embeddable }) => {
                        BoundExpr::Embeddable { columns, embeddable }
                    }
                    _ => BoundExpr::Error,
                }
            }
            PathTarget::Collection(collection) => {
                match usage {
                    PathUsage::Comparison => self.error(format!(
                        "cannot compare collection-valued path expression: {}",
                        collection.path
                    )),
                    PathUsage::Value => self.error(format!(
                        "illegal syntax near collection-valued path expression in {}: {}",
                        self.clause, collection.mapping.name
                    )),
                }
                BoundExpr::Error
            }
        }
    }

    /// A path that must end on a collection.
    fn bind_collection(&mut self, expr: &Spanned<Expr>, construct: &str) -> Option<CollectionRef> {
        let resolved = match expr.as_path() {
            Some(segments) => self.resolve(segments, None, None)?,
            None => {
                self.error(format!(
                    "{} requires a collection-valued path: {}",
                    construct,
                    self.text(&expr.span)
                ));
                return None;
            }
        };
        match resolved.target {
            PathTarget::Collection(collection) => Some(collection),
            _ => {
                self.error(format!(
                    "{} requires a collection-valued path: {}",
                    construct,
                    self.text(&expr.span)
                ));
                None
            }
        }
    }

    fn resolve(
        &mut self,
        segments: &[Spanned<String>],
        suffix: Option<&str>,
        explicit: Option<ExplicitJoin>,
    ) -> Option<ResolvedPath> {
        let (scope, name, rest) = self.start_scope(segments)?;
        let mut names: Vec<&str> = rest.iter().map(|s| s.value.as_str()).collect();
        names.extend(suffix);
        let resolver = PathResolver::new(self.metamodel);
        match resolver.resolve(&mut self.ctx.joins, scope, &name, &names, self.clause, explicit) {
            Ok(resolved) => Some(resolved),
            Err(message) => {
                self.error(message);
                None
            }
        }
    }

    /// Where a path starts: an alias, or an attribute of the only root.
    fn start_scope<'s>(
        &mut self,
        segments: &'s [Spanned<String>],
    ) -> Option<(Scope, String, &'s [Spanned<String>])> {
        let first = segments.first()?;
        if let Some(target) = self.ctx.joins.resolve_alias(first) {
            let Some(scope) = Scope::of_alias(&self.ctx.joins, target) else {
                self.error(format!("could not resolve identifier: {}", first.value));
                return None;
            };
            return Some((scope, first.value.clone(), &segments[1..]));
        }

        if let [root] = self.roots[..] {
            let group = self.ctx.joins.group(root)?;
            let owns_attribute = group
                .entity_name()
                .and_then(|name| self.metamodel.entity_type(name))
                .is_some_and(|entity| self.metamodel.entity_attribute(entity, first).is_some());
            if owns_attribute {
                let name = group.user_alias.clone().unwrap_or_else(|| group.path.clone());
                let scope = Scope::of_group(&self.ctx.joins, root)?;
                return Some((scope, name, segments));
            }
        }

        self.error(format!("could not resolve identifier: {}", first.value));
        None
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    fn bind_parameter(&mut self, key: ParameterKey) -> BoundExpr {
        if self.strict && !self.mixing_reported {
            let mixed = self.used_parameters.iter().any(|used| {
                std::mem::discriminant(used) != std::mem::discriminant(&key)
            });
            if mixed {
                self.mixing_reported = true;
                self.error("cannot mix positional and named parameters");
            }
        }

        if !self.used_parameters.contains(&key) {
            if !self.declared.is_empty() && !self.declared.iter().any(|d| d.key == key) {
                self.error(format!("parameter not declared: {}", key));
            }
            self.used_parameters.push(key.clone());
        }

        BoundExpr::Parameter {
            slot: self.ctx.parameters.slot_for(key.into()),
        }
    }

    fn check_declared_parameters(&mut self) {
        for declaration in self.declared {
            if !self.used_parameters.contains(&declaration.key) {
                self.ctx
                    .errors
                    .report_warning(format!("declared parameter is never used: {}", declaration.key));
                continue;
            }
            if let Some(value_type) = declaration.value_type {
                let slot = self.ctx.parameters.slot_for(declaration.key.clone().into());
                self.ctx.parameters.declare_type(slot, value_type);
            }
        }
    }

    /// Type `target` after `other` when `target` is a parameter.
    fn infer(&mut self, target: &BoundExpr, other: &BoundExpr) {
        if let Some(value_type) = self.value_type_of(other) {
            self.infer_as(target, value_type);
        }
    }

    fn infer_as(&mut self, target: &BoundExpr, value_type: ValueType) {
        match target {
            BoundExpr::Parameter { slot } => self.ctx.parameters.infer_type(*slot, value_type),
            BoundExpr::Paren(inner) => self.infer_as(inner, value_type),
            _ => {}
        }
    }

    fn value_type_of(&self, expr: &BoundExpr) -> Option<ValueType> {
        match expr {
            BoundExpr::Column { value_type, .. } => Some(*value_type),
            BoundExpr::Entity { entity, .. } => self.identifier_type(entity),
            BoundExpr::Discriminator { .. } | BoundExpr::TypeLiteral { .. } => Some(ValueType::String),
            BoundExpr::Literal(literal) => match literal {
                Literal::Integer(_) => Some(ValueType::Integer),
                Literal::Decimal(_) => Some(ValueType::Double),
                Literal::String(_) => Some(ValueType::String),
                Literal::Boolean(_) => Some(ValueType::Boolean),
                Literal::Null => None,
            },
            BoundExpr::Size(_) => Some(ValueType::Integer),
            BoundExpr::CountStar => Some(ValueType::Long),
            BoundExpr::Parameter { slot } => self
                .ctx
                .parameters
                .slots()
                .get(*slot)
                .and_then(|s| s.value_type),
            BoundExpr::Paren(inner) => self.value_type_of(inner),
            _ => None,
        }
    }

    fn identifier_type(&self, entity: &str) -> Option<ValueType> {
        let entity = self.metamodel.entity_type(entity)?;
        let ids = identifier_columns(self.metamodel, entity).ok()?;
        ids.first().map(|c| c.value_type)
    }

    fn element_value_type(&self, collection: &CollectionRef) -> Option<ValueType> {
        match &collection.mapping.element {
            CollectionElement::Entity { target, .. } => self.identifier_type(target),
            CollectionElement::Basic { value_type, .. } => Some(*value_type),
            CollectionElement::Embeddable { .. } => None,
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    fn register_alias(&mut self, alias: &Spanned<String>, target: AliasTarget) {
        if let Err(message) = self.ctx.joins.register_alias(alias, target) {
            self.error(message);
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.ctx.errors.report_error(message);
    }

    /// Query text under `span`.
    fn text(&self, span: &Span) -> &'a str {
        self.source.get(span.clone()).unwrap_or_default().trim()
    }
}

fn is_type_call(expr: &Spanned<Expr>) -> bool {
    matches!(&expr.value, Expr::Function { name, args, .. } if name.eq_ignore_ascii_case("type") && args.len() == 1)
}

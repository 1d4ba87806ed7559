//! Named filters: predicate templates enabled per translation.
//!
//! A filter definition names its parameters and may carry a default
//! condition. Entities opt in through `[[entity.filter]]` entries in the
//! descriptor table, optionally overriding the condition. Conditions are
//! SQL templates:
//!
//! - `{alias}` is replaced by the alias of the entity's table
//! - `:param` becomes a bind placeholder for the filter parameter
//! - quoted string literals and `::` casts pass through untouched
//!
//! ```
//! use hqlt::filter::FilterDefinition;
//! use hqlt::metamodel::ValueType;
//!
//! let tenant = FilterDefinition::new("tenant")
//!     .with_parameter("tenant", ValueType::String)
//!     .with_condition("{alias}.tenant_code = :tenant");
//! assert_eq!(tenant.parameters.len(), 1);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ErrorHandler;
use crate::metamodel::{EntityType, Metamodel, ValueType};
use crate::semantic::{ParameterRegistry, ParameterSource};
use crate::sql::expr::{Expr, FragmentPart};

static TEMPLATE_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'|::|\{alias\}|:([A-Za-z_][A-Za-z0-9_]*)"));

/// An enabled filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default, rename = "parameter")]
    pub parameters: Vec<FilterParameter>,
    /// Used for entities that join the filter without their own condition.
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParameter {
    pub name: String,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
}

impl FilterDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            parameters: vec![],
            condition: None,
        }
    }

    pub fn with_parameter(mut self, name: &str, value_type: ValueType) -> Self {
        self.parameters.push(FilterParameter {
            name: name.into(),
            value_type,
        });
        self
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.into());
        self
    }

    fn parameter(&self, name: &str) -> Option<&FilterParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// The predicate every enabled filter adds for rows of `entity` read
/// through `alias`, or `None` when no filter applies.
///
/// The nearest declaration in the entity's hierarchy decides both
/// participation and the condition.
pub fn entity_filter_predicate(
    metamodel: &dyn Metamodel,
    filters: &[FilterDefinition],
    entity: &EntityType,
    alias: &str,
    parameters: &mut ParameterRegistry,
    errors: &mut ErrorHandler,
) -> Option<Expr> {
    let hierarchy = metamodel.hierarchy(entity);
    let mut predicates = Vec::new();

    for filter in filters {
        let Some(declared) = hierarchy
            .iter()
            .rev()
            .find_map(|ty| ty.filters.iter().find(|f| f.name == filter.name))
        else {
            continue;
        };
        let Some(condition) = declared.condition.as_deref().or(filter.condition.as_deref()) else {
            errors.report_warning(format!(
                "filter {} has no condition for entity {}",
                filter.name, entity.name
            ));
            continue;
        };
        if let Some(fragment) = expand_template(filter, condition, alias, parameters, errors) {
            tracing::trace!(filter = %filter.name, entity = %entity.name, alias, "filter applied");
            predicates.push(fragment);
        }
    }

    Expr::conjunction(predicates)
}

/// Expand a condition template into a SQL fragment.
fn expand_template(
    filter: &FilterDefinition,
    template: &str,
    alias: &str,
    parameters: &mut ParameterRegistry,
    errors: &mut ErrorHandler,
) -> Option<Expr> {
    let pattern = match TEMPLATE_PATTERN.as_ref() {
        Ok(pattern) => pattern,
        Err(e) => {
            errors.report_error(format!("filter {}: {}", filter.name, e));
            return None;
        }
    };

    let mut parts = Vec::new();
    let mut last = 0;
    for captures in pattern.captures_iter(template) {
        let Some(whole) = captures.get(0) else { continue };
        push_sql(&mut parts, &template[last..whole.start()]);
        last = whole.end();

        match captures.get(1) {
            Some(name) => {
                let name = name.as_str();
                let Some(parameter) = filter.parameter(name) else {
                    errors.report_error(format!(
                        "filter {} references undefined parameter: {}",
                        filter.name, name
                    ));
                    return None;
                };
                let slot = parameters.slot_for(ParameterSource::Filter {
                    filter: filter.name.clone(),
                    parameter: name.to_string(),
                });
                parameters.declare_type(slot, parameter.value_type);
                parts.push(FragmentPart::Parameter(slot));
            }
            None if whole.as_str() == "{alias}" => push_sql(&mut parts, alias),
            None => push_sql(&mut parts, whole.as_str()),
        }
    }
    push_sql(&mut parts, &template[last..]);

    Some(Expr::Fragment(parts))
}

/// Append raw SQL, merging with a preceding raw part.
fn push_sql(parts: &mut Vec<FragmentPart>, sql: &str) {
    if sql.is_empty() {
        return;
    }
    match parts.last_mut() {
        Some(FragmentPart::Sql(previous)) => previous.push_str(sql),
        _ => parts.push(FragmentPart::Sql(sql.to_string())),
    }
}

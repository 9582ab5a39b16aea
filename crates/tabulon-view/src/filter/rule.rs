//! Filter rules and filter state

use serde::{Deserialize, Serialize};
use tabulon_core::{ColumnDescriptor, EngineError, Result, find_column};

use super::FilterOperator;

/// Logical operator joining a rule to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }

    pub fn combine(&self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

impl std::str::FromStr for Combinator {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "and" | "&&" => Ok(Self::And),
            "or" | "||" => Ok(Self::Or),
            _ => Err(EngineError::UnknownOperator(s.to_string())),
        }
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    /// Unique ID for this rule
    pub id: usize,
    /// Disabled rules are skipped entirely, including their combinator edge
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub column_id: String,
    pub operator: FilterOperator,
    /// Primary value
    #[serde(default)]
    pub value: String,
    /// Upper bound for `between`
    #[serde(default)]
    pub value2: Option<String>,
    /// Logical operator to use AFTER this rule, between it and the next one.
    /// `None` falls back to the state's global combinator.
    #[serde(default)]
    pub combinator: Option<Combinator>,
}

fn enabled_by_default() -> bool {
    true
}

impl FilterRule {
    pub fn new(
        id: usize,
        column_id: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id,
            enabled: true,
            column_id: column_id.into(),
            operator,
            value: value.into(),
            value2: None,
            combinator: None,
        }
    }

    pub fn between(
        id: usize,
        column_id: impl Into<String>,
        low: impl Into<String>,
        high: impl Into<String>,
    ) -> Self {
        Self {
            value2: Some(high.into()),
            ..Self::new(id, column_id, FilterOperator::Between, low)
        }
    }

    /// Build a rule from untyped input, rejecting unknown operators and
    /// incomplete ranges up front.
    pub fn parse(
        id: usize,
        column_id: impl Into<String>,
        operator: &str,
        value: impl Into<String>,
        value2: Option<String>,
    ) -> Result<Self> {
        let operator: FilterOperator = operator.parse()?;
        let rule = Self {
            value2,
            ..Self::new(id, column_id, operator, value)
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = Some(combinator);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check the rule is complete on its own
    pub fn validate(&self) -> Result<()> {
        if self.operator.requires_two_values()
            && self.value2.as_deref().is_none_or(|v| v.trim().is_empty())
        {
            return Err(EngineError::MissingSecondValue(self.operator.name().to_string()));
        }
        Ok(())
    }
}

/// Ordered list of rules plus the combinator used where a rule has none
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub rules: Vec<FilterRule>,
    #[serde(default)]
    pub global_combinator: Combinator,
}

impl FilterState {
    pub fn new(rules: Vec<FilterRule>, global_combinator: Combinator) -> Self {
        Self {
            rules,
            global_combinator,
        }
    }

    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rule(&mut self, rule: FilterRule) {
        self.rules.push(rule);
    }

    /// Remove a rule by id, returning whether it existed
    pub fn remove_rule(&mut self, id: usize) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() != before
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// True when no enabled rule remains
    pub fn is_empty(&self) -> bool {
        self.active_rules().next().is_none()
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &FilterRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Next free rule id
    pub fn next_id(&self) -> usize {
        self.rules.iter().map(|r| r.id + 1).max().unwrap_or(0)
    }

    /// Check every rule against the column schema
    pub fn validate<T>(&self, columns: &[ColumnDescriptor<T>]) -> Result<()> {
        for rule in &self.rules {
            let column = find_column(columns, &rule.column_id)
                .ok_or_else(|| EngineError::UnknownColumn(rule.column_id.clone()))?;
            if !column.is_filterable {
                return Err(EngineError::ColumnNotFilterable(rule.column_id.clone()));
            }
            rule.validate()?;
        }
        Ok(())
    }
}

use super::super::domain::{KpiId, ThresholdId};
use super::operator::ThresholdOperator;
use serde::{Deserialize, Serialize};

/// One bonus band of a KPI. Rules are tried in ascending `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: ThresholdId,
    pub kpi_id: KpiId,
    pub operator: ThresholdOperator,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub bonus: f64,
    pub description: Option<String>,
    pub order: u32,
}

impl ThresholdRule {
    pub fn matches(&self, value: f64) -> bool {
        match (self.operator, self.lower, self.upper) {
            (ThresholdOperator::AtLeast, Some(lower), _) => value >= lower,
            (ThresholdOperator::AtMost, _, Some(upper)) => value <= upper,
            (ThresholdOperator::Below, _, Some(upper)) => value < upper,
            (ThresholdOperator::Above, Some(lower), _) => value > lower,
            (ThresholdOperator::Between, Some(lower), Some(upper)) => {
                lower <= value && value <= upper
            }
            _ => false,
        }
    }

    /// Rule lacks a bound its operator reads, so it can never match.
    pub fn is_inert(&self) -> bool {
        (self.operator.needs_lower() && self.lower.is_none())
            || (self.operator.needs_upper() && self.upper.is_none())
    }

    pub fn label(&self) -> String {
        match (self.operator, self.lower, self.upper) {
            (ThresholdOperator::Between, Some(lower), Some(upper)) => {
                format!("{lower}-{upper} -> {}%", self.bonus)
            }
            (op, Some(lower), _) if op.needs_lower() => {
                format!("{op} {lower} -> {}%", self.bonus)
            }
            (op, _, Some(upper)) if op.needs_upper() => {
                format!("{op} {upper} -> {}%", self.bonus)
            }
            (op, _, _) => format!("{op} (missing bound) -> {}%", self.bonus),
        }
    }
}

/// Rule fields as submitted by the admin surface before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDraft {
    pub operator: ThresholdOperator,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    pub bonus: f64,
    #[serde(default)]
    pub description: Option<String>,
    /// Appended after the KPI's current last rule when omitted.
    #[serde(default)]
    pub order: Option<u32>,
}

impl ThresholdDraft {
    pub fn new(operator: ThresholdOperator, bonus: f64) -> Self {
        Self {
            operator,
            lower: None,
            upper: None,
            bonus,
            description: None,
            order: None,
        }
    }

    pub fn lower(mut self, lower: f64) -> Self {
        self.lower = Some(lower);
        self
    }

    pub fn upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    pub fn order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered threshold rules of a single KPI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<ThresholdRule>,
}

impl RuleSet {
    /// Sorts by evaluation order; equal orders keep creation (id) order.
    pub fn new(mut rules: Vec<ThresholdRule>) -> Self {
        rules.sort_by_key(|rule| (rule.order, rule.id));
        Self { rules }
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching `value`, in evaluation order.
    pub fn matching_rule(&self, value: f64) -> Option<&ThresholdRule> {
        if value.is_nan() {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(value))
    }

    /// Bonus percentage of the first matching rule, or 0.
    pub fn evaluate(&self, value: f64) -> f64 {
        self.matching_rule(value)
            .map(|rule| rule.bonus)
            .unwrap_or(0.0)
    }
}

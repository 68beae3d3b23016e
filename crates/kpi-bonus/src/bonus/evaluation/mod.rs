mod operator;
mod rules;

pub use operator::{OperatorParseError, ThresholdOperator};
pub use rules::{RuleSet, ThresholdDraft, ThresholdRule};

use super::domain::KpiId;
use super::repository::{RepositoryError, ThresholdStore};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Store-backed evaluator that loads each KPI's rules once per pass.
///
/// Rule changes made while an evaluator is alive are not observed; passes build a
/// fresh evaluator per call so every recompute reads the current rules.
pub struct BonusEvaluator<'a, S: ?Sized> {
    store: &'a S,
    cache: HashMap<KpiId, RuleSet>,
}

impl<'a, S> BonusEvaluator<'a, S>
where
    S: ThresholdStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    pub fn rules(&mut self, kpi_id: KpiId) -> Result<&RuleSet, RepositoryError> {
        let rules = match self.cache.entry(kpi_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(RuleSet::new(self.store.rules_for(kpi_id)?)),
        };
        Ok(rules)
    }

    /// Bonus percentage for `value` under the KPI's rules. NaN yields 0.
    pub fn evaluate(&mut self, kpi_id: KpiId, value: f64) -> Result<f64, RepositoryError> {
        if value.is_nan() {
            return Ok(0.0);
        }
        Ok(self.rules(kpi_id)?.evaluate(value))
    }
}

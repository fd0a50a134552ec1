//! Per-run graph state
//!
//! [`GraphState`] is created for one request and dropped when the run ends.
//! Every field has exactly one writer:
//!
//! | Field            | Writer                      |
//! |------------------|-----------------------------|
//! | `input_text`     | caller, at construction     |
//! | `converted_text` | entry node                  |
//! | six fragments    | one leaf task each          |
//!
//! Fragment slots are selected by an exhaustive match on [`AnalysisKind`], so
//! a task can only ever reach its own slot. Writing a slot twice is rejected.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The six leaf analyses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Property valuations by location
    PropertyValuation,
    /// Risk percentages per peril
    RiskPercentage,
    /// Business interruption exposure
    BusinessInterruption,
    /// Existing insurance coverage
    CurrentInsurance,
    /// Exposure to currency movements
    MultiCurrencyRisk,
    /// Coverage recommendations
    InsuranceRecommendation,
}

impl AnalysisKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 6] = [
        Self::PropertyValuation,
        Self::RiskPercentage,
        Self::BusinessInterruption,
        Self::CurrentInsurance,
        Self::MultiCurrencyRisk,
        Self::InsuranceRecommendation,
    ];

    /// Task name
    #[must_use]
    pub const fn task_name(self) -> &'static str {
        match self {
            Self::PropertyValuation => "property_valuation",
            Self::RiskPercentage => "risk_percentage",
            Self::BusinessInterruption => "business_interruption",
            Self::CurrentInsurance => "current_insurance",
            Self::MultiCurrencyRisk => "multi_currency_risk",
            Self::InsuranceRecommendation => "insurance_recommendation",
        }
    }

    /// Key of this task's fragment in the final report
    #[must_use]
    pub const fn result_key(self) -> &'static str {
        match self {
            Self::PropertyValuation => "property_valuations_s",
            Self::RiskPercentage => "risk_percentage_s",
            Self::BusinessInterruption => "business_interruption_s",
            Self::CurrentInsurance => "current_insurance_s",
            Self::MultiCurrencyRisk => "multi_currency_risk_s",
            Self::InsuranceRecommendation => "insurance_recommendation_s",
        }
    }

    /// Look up a kind by task name
    #[must_use]
    pub fn from_task_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.task_name() == name)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_name())
    }
}

/// Output of one leaf task, bound to the task's kind
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    kind: AnalysisKind,
    value: Value,
}

impl Fragment {
    /// Create fragment for `kind`
    #[inline]
    #[must_use]
    pub fn new(kind: AnalysisKind, value: Value) -> Self {
        Self { kind, value }
    }

    /// Producing task
    #[inline]
    #[must_use]
    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Fragment value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug, Clone, Default)]
struct FragmentSlots {
    property_valuation: Option<Value>,
    risk_percentage: Option<Value>,
    business_interruption: Option<Value>,
    current_insurance: Option<Value>,
    multi_currency_risk: Option<Value>,
    insurance_recommendation: Option<Value>,
}

impl FragmentSlots {
    fn slot(&self, kind: AnalysisKind) -> &Option<Value> {
        match kind {
            AnalysisKind::PropertyValuation => &self.property_valuation,
            AnalysisKind::RiskPercentage => &self.risk_percentage,
            AnalysisKind::BusinessInterruption => &self.business_interruption,
            AnalysisKind::CurrentInsurance => &self.current_insurance,
            AnalysisKind::MultiCurrencyRisk => &self.multi_currency_risk,
            AnalysisKind::InsuranceRecommendation => &self.insurance_recommendation,
        }
    }

    fn slot_mut(&mut self, kind: AnalysisKind) -> &mut Option<Value> {
        match kind {
            AnalysisKind::PropertyValuation => &mut self.property_valuation,
            AnalysisKind::RiskPercentage => &mut self.risk_percentage,
            AnalysisKind::BusinessInterruption => &mut self.business_interruption,
            AnalysisKind::CurrentInsurance => &mut self.current_insurance,
            AnalysisKind::MultiCurrencyRisk => &mut self.multi_currency_risk,
            AnalysisKind::InsuranceRecommendation => &mut self.insurance_recommendation,
        }
    }
}

/// State threaded through one orchestration run
#[derive(Debug, Clone)]
pub struct GraphState {
    input_text: String,
    converted_text: Option<Arc<str>>,
    fragments: FragmentSlots,
}

impl GraphState {
    /// Create state for a run over `input_text`
    #[must_use]
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            converted_text: None,
            fragments: FragmentSlots::default(),
        }
    }

    /// Extracted document text
    #[inline]
    #[must_use]
    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    /// Normalized text, once the entry node has run
    ///
    /// Shared by reference count; leaf tasks each hold a snapshot.
    #[inline]
    #[must_use]
    pub fn converted_text(&self) -> Option<&Arc<str>> {
        self.converted_text.as_ref()
    }

    /// Record the entry node's output
    ///
    /// # Errors
    /// `StateError::AlreadyWritten` if the text was already set
    pub fn set_converted_text(&mut self, text: impl Into<Arc<str>>) -> Result<(), StateError> {
        if self.converted_text.is_some() {
            return Err(StateError::AlreadyWritten("converted_text"));
        }
        self.converted_text = Some(text.into());
        Ok(())
    }

    /// Fragment written by the task of `kind`
    #[inline]
    #[must_use]
    pub fn fragment(&self, kind: AnalysisKind) -> Option<&Value> {
        self.fragments.slot(kind).as_ref()
    }

    /// Store a leaf task's fragment in its slot
    ///
    /// # Errors
    /// `StateError::AlreadyWritten` if the slot is occupied
    pub fn record(&mut self, fragment: Fragment) -> Result<(), StateError> {
        let slot = self.fragments.slot_mut(fragment.kind);
        if slot.is_some() {
            return Err(StateError::AlreadyWritten(fragment.kind.result_key()));
        }
        *slot = Some(fragment.value);
        Ok(())
    }

    /// Number of filled fragment slots
    #[must_use]
    pub fn completed(&self) -> usize {
        AnalysisKind::ALL
            .into_iter()
            .filter(|kind| self.fragments.slot(*kind).is_some())
            .count()
    }

    /// Kinds whose slot is still empty
    #[must_use]
    pub fn missing(&self) -> Vec<AnalysisKind> {
        AnalysisKind::ALL
            .into_iter()
            .filter(|kind| self.fragments.slot(*kind).is_none())
            .collect()
    }
}

/// Lifecycle of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// Created, not started
    Pending,
    /// Entry node or leaves executing
    Running,
    /// All leaves succeeded
    Completed,
    /// Some stage failed
    Failed,
}

impl RunState {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: RunState) -> &'static [RunState] {
    use RunState::{Completed, Failed, Pending, Running};
    match from {
        Pending => &[Running, Failed],
        Running => &[Completed, Failed],
        Completed | Failed => &[],
    }
}

/// Check a run state transition
///
/// # Errors
/// `StateError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_have_unique_names_and_keys() {
        let names: std::collections::HashSet<_> =
            AnalysisKind::ALL.iter().map(|k| k.task_name()).collect();
        let keys: std::collections::HashSet<_> =
            AnalysisKind::ALL.iter().map(|k| k.result_key()).collect();
        assert_eq!(names.len(), 6);
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn task_name_lookup() {
        assert_eq!(
            AnalysisKind::from_task_name("current_insurance"),
            Some(AnalysisKind::CurrentInsurance)
        );
        assert_eq!(AnalysisKind::from_task_name("weather"), None);
    }

    #[test]
    fn each_kind_writes_its_own_slot() {
        let mut state = GraphState::new("text");
        for (i, kind) in AnalysisKind::ALL.into_iter().enumerate() {
            state.record(Fragment::new(kind, json!({ "i": i }))).unwrap();
        }

        assert_eq!(state.completed(), 6);
        for (i, kind) in AnalysisKind::ALL.into_iter().enumerate() {
            assert_eq!(state.fragment(kind), Some(&json!({ "i": i })));
        }
    }

    #[test]
    fn second_write_to_slot_rejected() {
        let mut state = GraphState::new("text");
        state
            .record(Fragment::new(AnalysisKind::RiskPercentage, json!({"risks": []})))
            .unwrap();

        let err = state
            .record(Fragment::new(AnalysisKind::RiskPercentage, json!({})))
            .unwrap_err();

        assert_eq!(err, StateError::AlreadyWritten("risk_percentage_s"));
        assert_eq!(
            state.fragment(AnalysisKind::RiskPercentage),
            Some(&json!({"risks": []}))
        );
    }

    #[test]
    fn converted_text_written_once() {
        let mut state = GraphState::new("€1m");
        assert!(state.converted_text().is_none());

        state.set_converted_text("1,000,000.00 EUR").unwrap();
        assert!(state.set_converted_text("again").is_err());
        assert_eq!(state.converted_text().map(AsRef::as_ref), Some("1,000,000.00 EUR"));
    }

    #[test]
    fn missing_lists_empty_slots() {
        let mut state = GraphState::new("text");
        state
            .record(Fragment::new(AnalysisKind::PropertyValuation, json!({})))
            .unwrap();

        let missing = state.missing();
        assert_eq!(missing.len(), 5);
        assert!(!missing.contains(&AnalysisKind::PropertyValuation));
    }

    #[test]
    fn run_state_transitions() {
        use RunState::*;
        assert!(validate_transition(Pending, Running).is_ok());
        assert!(validate_transition(Running, Completed).is_ok());
        assert!(validate_transition(Running, Failed).is_ok());
        assert!(validate_transition(Pending, Failed).is_ok());

        assert!(validate_transition(Pending, Completed).is_err());
        assert!(validate_transition(Completed, Running).is_err());
        assert!(validate_transition(Failed, Running).is_err());
        assert!(validate_transition(Completed, Failed).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }
}

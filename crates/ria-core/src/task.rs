//! Leaf analysis tasks
//!
//! The catalog is fixed at compile time: [`TaskRegistry::standard`] holds one
//! [`AnalysisTask`] per [`AnalysisKind`]. A task reads the normalized text,
//! hands it to the injected [`AnalysisCapability`] together with its
//! instructions, and shapes the returned JSON into its fragment.

use crate::capability::AnalysisCapability;
use crate::error::PipelineError;
use crate::state::{AnalysisKind, Fragment};
use serde_json::{Map, Value};

const PROPERTY_VALUATION: &str = "You are an insurance risk analyst covering commercial \
property, public liability and business interruption. Summarise the total property valuation, \
business interruption exposure, annual operating costs and historical and forecast damage \
costs found in the report. State every currency value in EUR. Output shape: \
{\"executive_summary\": \"...\"}.";

const RISK_PERCENTAGE: &str = "You are an insurance risk analyst. Find every risk factor \
stated with a percentage, an X-in-Y-year return period, a per-period frequency, a correlation \
or words such as chance, likelihood or annual probability. For each, report risk_name, \
probability (the exact expression), context (time or scope qualifier) and notes. State every \
currency value in EUR. Output shape: {\"risks\": [{\"risk_name\": \"...\", \"probability\": \
\"...\", \"context\": \"...\", \"notes\": \"...\"}]}.";

const BUSINESS_INTERRUPTION: &str = "You are a business interruption analyst. Find every \
statement that quantifies lost revenue, extra expense or cost impact from disrupted \
operations: closures, postponements, alternate venues, maintenance overruns. Key each finding \
by a short label; values carry amount_eur (number only), timeframe, quote (verbatim) and \
notes. Output shape: {\"<label>\": {\"amount_eur\": 0, \"timeframe\": \"...\", \"quote\": \
\"...\", \"notes\": \"...\"}}.";

const CURRENT_INSURANCE: &str = "You are an insurance coverage analyst. Find every statement \
showing an inadequacy, exclusion or gap in the existing insurance programme, such as limits \
below replacement cost, uncovered interruption losses or missing specialist cover. For each, \
report gap_name (at most 8 words), issue, quote (verbatim) and notes with figures in EUR. \
Output shape: {\"current_insurance_gaps\": [{\"gap_name\": \"...\", \"issue\": \"...\", \
\"quote\": \"...\", \"notes\": \"...\"}]}.";

const MULTI_CURRENCY_RISK: &str = "You are a treasury risk analyst. Find every multi-currency \
risk factor carrying a percentage, probability, frequency or quantified FX exposure. Key each \
by its risk name; values carry probability, context and notes with amounts in EUR. Output \
shape: {\"<risk name>\": {\"probability\": \"...\", \"context\": \"...\", \"notes\": \
\"...\"}}.";

const INSURANCE_RECOMMENDATION: &str = "You are an insurance analyst. Identify every distinct \
insurance recommendation. For each, report coverage (type, limit and structure), rationale, \
timeline (priority and dates) and financial_impact (premium change or saving, or \"Not \
specified\"). Output shape: {\"recommendations\": [{\"coverage\": \"...\", \"rationale\": \
\"...\", \"timeline\": \"...\", \"financial_impact\": \"...\"}]}.";

/// One leaf node of the task graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTask {
    kind: AnalysisKind,
    instructions: &'static str,
    array_key: Option<&'static str>,
}

impl AnalysisTask {
    /// Standard task for `kind`
    #[must_use]
    pub const fn for_kind(kind: AnalysisKind) -> Self {
        let (instructions, array_key) = match kind {
            AnalysisKind::PropertyValuation => (PROPERTY_VALUATION, None),
            AnalysisKind::RiskPercentage => (RISK_PERCENTAGE, Some("risks")),
            AnalysisKind::BusinessInterruption => (BUSINESS_INTERRUPTION, None),
            AnalysisKind::CurrentInsurance => (CURRENT_INSURANCE, None),
            AnalysisKind::MultiCurrencyRisk => (MULTI_CURRENCY_RISK, None),
            AnalysisKind::InsuranceRecommendation => {
                (INSURANCE_RECOMMENDATION, Some("recommendations"))
            }
        };
        Self {
            kind,
            instructions,
            array_key,
        }
    }

    /// Task kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Task name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.task_name()
    }

    /// Key of this task's fragment in the report
    #[inline]
    #[must_use]
    pub fn result_key(&self) -> &'static str {
        self.kind.result_key()
    }

    /// Analysis instructions handed to the capability
    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &'static str {
        self.instructions
    }

    /// Key a top-level array result is wrapped under
    #[inline]
    #[must_use]
    pub fn array_key(&self) -> Option<&'static str> {
        self.array_key
    }

    /// Shape raw capability output into this task's fragment value
    ///
    /// A top-level array is wrapped under [`array_key`](Self::array_key) when
    /// the task has one; anything else passes through.
    #[must_use]
    pub fn shape(&self, value: Value) -> Value {
        match (value, self.array_key) {
            (Value::Array(items), Some(key)) => {
                let mut wrapped = Map::new();
                wrapped.insert(key.to_string(), Value::Array(items));
                Value::Object(wrapped)
            }
            (value, _) => value,
        }
    }

    /// Run this task over the normalized text
    ///
    /// # Errors
    /// - `PipelineError::TaskPrecondition` if `converted_text` is absent or blank
    /// - `PipelineError::AnalysisCapability` if the capability fails
    pub async fn run(
        &self,
        converted_text: Option<&str>,
        capability: &dyn AnalysisCapability,
    ) -> Result<Fragment, PipelineError> {
        let text = match converted_text {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                tracing::error!(task = self.name(), "converted_text missing");
                return Err(PipelineError::TaskPrecondition {
                    task: self.name(),
                    field: "converted_text",
                });
            }
        };

        let raw = capability.invoke(self, text).await.map_err(|source| {
            tracing::error!(task = self.name(), error = %source, "analysis capability failed");
            PipelineError::AnalysisCapability {
                task: self.name(),
                source,
            }
        })?;

        Ok(Fragment::new(self.kind, self.shape(raw)))
    }
}

/// Fixed catalog of leaf tasks
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<AnalysisTask>,
}

impl TaskRegistry {
    /// The six standard analyses
    #[must_use]
    pub fn standard() -> Self {
        Self {
            tasks: AnalysisKind::ALL
                .into_iter()
                .map(AnalysisTask::for_kind)
                .collect(),
        }
    }

    /// All tasks, in declaration order
    #[inline]
    #[must_use]
    pub fn tasks(&self) -> &[AnalysisTask] {
        &self.tasks
    }

    /// Task for `kind`
    #[must_use]
    pub fn get(&self, kind: AnalysisKind) -> Option<&AnalysisTask> {
        self.tasks.iter().find(|task| task.kind == kind)
    }

    /// Number of tasks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

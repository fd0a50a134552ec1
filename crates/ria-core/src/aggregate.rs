//! Final report assembly
//!
//! The aggregator turns a completed [`GraphState`] into an [`AnalysisReport`].
//! It checks that every fragment is present, then validates the assembled
//! object against the JSON Schema generated from the report type. Values are
//! never transformed.

use crate::error::SchemaError;
use crate::state::{AnalysisKind, GraphState};
use jsonschema::JSONSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object fragment
pub type JsonObject = Map<String, Value>;

/// Merged output of all six analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnalysisReport {
    /// Property valuation summary
    #[serde(rename = "property_valuations_s")]
    pub property_valuations: JsonObject,
    /// Risk percentages
    #[serde(rename = "risk_percentage_s")]
    pub risk_percentage: JsonObject,
    /// Business interruption exposures
    #[serde(rename = "business_interruption_s")]
    pub business_interruption: JsonObject,
    /// Current insurance gaps
    #[serde(rename = "current_insurance_s")]
    pub current_insurance: JsonObject,
    /// Multi-currency risks
    #[serde(rename = "multi_currency_risk_s")]
    pub multi_currency_risk: JsonObject,
    /// Insurance recommendations
    #[serde(rename = "insurance_recommendation_s")]
    pub insurance_recommendation: JsonObject,
}

impl AnalysisReport {
    /// JSON Schema of the report
    ///
    /// # Errors
    /// `SchemaError::InvalidSchema` if the generated schema cannot be encoded
    pub fn json_schema() -> Result<Value, SchemaError> {
        let schema = schemars::schema_for!(AnalysisReport);
        serde_json::to_value(&schema).map_err(|e| SchemaError::InvalidSchema(e.to_string()))
    }

    /// Fragment for `kind`
    #[must_use]
    pub fn fragment(&self, kind: AnalysisKind) -> &JsonObject {
        match kind {
            AnalysisKind::PropertyValuation => &self.property_valuations,
            AnalysisKind::RiskPercentage => &self.risk_percentage,
            AnalysisKind::BusinessInterruption => &self.business_interruption,
            AnalysisKind::CurrentInsurance => &self.current_insurance,
            AnalysisKind::MultiCurrencyRisk => &self.multi_currency_risk,
            AnalysisKind::InsuranceRecommendation => &self.insurance_recommendation,
        }
    }
}

/// Validates and merges the fragments of a finished run
pub struct StateAggregator {
    schema: JSONSchema,
}

impl std::fmt::Debug for StateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateAggregator").finish_non_exhaustive()
    }
}

impl StateAggregator {
    /// Compile the report schema
    ///
    /// # Errors
    /// `SchemaError::InvalidSchema` if the schema does not compile
    pub fn new() -> Result<Self, SchemaError> {
        let schema_value = AnalysisReport::json_schema()?;
        let schema = JSONSchema::compile(&schema_value)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema })
    }

    /// Assemble the report from a completed state
    ///
    /// # Errors
    /// - `SchemaError::MissingFields` if any fragment is absent or null
    /// - `SchemaError::Violations` if a fragment is not a JSON object
    pub fn aggregate(&self, state: &GraphState) -> Result<AnalysisReport, SchemaError> {
        let mut merged = Map::new();
        let mut missing = Vec::new();

        for kind in AnalysisKind::ALL {
            match state.fragment(kind) {
                None | Some(Value::Null) => missing.push(kind.result_key()),
                Some(value) => {
                    merged.insert(kind.result_key().to_string(), value.clone());
                }
            }
        }

        if !missing.is_empty() {
            tracing::error!(missing = ?missing, "aggregate incomplete");
            return Err(SchemaError::MissingFields(missing));
        }

        let merged = Value::Object(merged);
        self.validate(&merged)?;

        serde_json::from_value(merged).map_err(|e| SchemaError::Violations(vec![e.to_string()]))
    }

    /// Validate a candidate report value against the schema
    ///
    /// # Errors
    /// `SchemaError::Violations` listing every failing location
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        if let Err(errors) = self.schema.validate(value) {
            let violations: Vec<String> = errors
                .map(|error| format!("at '{}': {}", error.instance_path, error))
                .collect();
            tracing::error!(count = violations.len(), "aggregate failed schema validation");
            return Err(SchemaError::Violations(violations));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Fragment;
    use serde_json::json;

    fn complete_state() -> GraphState {
        let mut state = GraphState::new("text");
        for kind in AnalysisKind::ALL {
            state
                .record(Fragment::new(kind, json!({ "task": kind.task_name() })))
                .unwrap();
        }
        state
    }

    #[test]
    fn schema_requires_all_six_keys() {
        let schema = AnalysisReport::json_schema().unwrap();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 6);
        for kind in AnalysisKind::ALL {
            assert!(required.contains(&json!(kind.result_key())));
        }
    }

    #[test]
    fn aggregates_complete_state() {
        let aggregator = StateAggregator::new().unwrap();
        let report = aggregator.aggregate(&complete_state()).unwrap();

        for kind in AnalysisKind::ALL {
            assert_eq!(report.fragment(kind)["task"], json!(kind.task_name()));
        }

        let wire = serde_json::to_value(&report).unwrap();
        assert_eq!(wire.as_object().unwrap().len(), 6);
        assert_eq!(wire["risk_percentage_s"]["task"], "risk_percentage");
    }

    #[test]
    fn missing_fragment_rejected() {
        let aggregator = StateAggregator::new().unwrap();
        let mut state = GraphState::new("text");
        for kind in AnalysisKind::ALL
            .into_iter()
            .filter(|k| *k != AnalysisKind::CurrentInsurance)
        {
            state.record(Fragment::new(kind, json!({}))).unwrap();
        }

        let err = aggregator.aggregate(&state).unwrap_err();
        assert!(matches!(err, SchemaError::MissingFields(ref f) if f == &["current_insurance_s"]));
    }

    #[test]
    fn null_fragment_counts_as_missing() {
        let aggregator = StateAggregator::new().unwrap();
        let mut state = GraphState::new("text");
        for kind in AnalysisKind::ALL {
            let value = if kind == AnalysisKind::RiskPercentage {
                Value::Null
            } else {
                json!({})
            };
            state.record(Fragment::new(kind, value)).unwrap();
        }

        assert!(matches!(
            aggregator.aggregate(&state),
            Err(SchemaError::MissingFields(_))
        ));
    }

    #[test]
    fn non_object_fragment_violates_schema() {
        let aggregator = StateAggregator::new().unwrap();
        let mut state = GraphState::new("text");
        for kind in AnalysisKind::ALL {
            let value = if kind == AnalysisKind::PropertyValuation {
                json!(["not", "an", "object"])
            } else {
                json!({})
            };
            state.record(Fragment::new(kind, value)).unwrap();
        }

        let err = aggregator.aggregate(&state).unwrap_err();
        match err {
            SchemaError::Violations(v) => {
                assert!(v.iter().any(|msg| msg.contains("property_valuations_s")));
            }
            other => panic!("expected violations, got {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_violate_schema() {
        let aggregator = StateAggregator::new().unwrap();
        let mut value = serde_json::to_value(
            aggregator.aggregate(&complete_state()).unwrap(),
        )
        .unwrap();
        value["extra"] = json!({});

        assert!(aggregator.validate(&value).is_err());
    }
}

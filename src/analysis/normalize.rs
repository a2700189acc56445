use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::response::{ClassifierFields, RawServiceResponse, ResponseShape};

pub const UNKNOWN_EXAM_TYPE: &str = "Desconhecido";
pub const NO_DIAGNOSIS: &str = "Sem diagnóstico disponível";

/// Canonical result rendered by the UI, whatever shape produced it.
///
/// Confidence is a percentage (0–100) exactly as the service reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    exam_type: String,
    diagnosis: String,
    confidence: f64,
}

impl AnalysisResult {
    pub fn exam_type(&self) -> &str {
        &self.exam_type
    }

    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    fn from_fields(fields: &ClassifierFields) -> Self {
        Self {
            exam_type: fields
                .exam_type
                .clone()
                .unwrap_or_else(|| UNKNOWN_EXAM_TYPE.to_string()),
            diagnosis: fields
                .diagnosis
                .clone()
                .or_else(|| fields.predicted_class.clone())
                .unwrap_or_else(|| NO_DIAGNOSIS.to_string()),
            confidence: fields.confidence.unwrap_or(0.0),
        }
    }
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self::from_fields(&ClassifierFields::default())
    }
}

/// Map a service response onto the canonical result.
///
/// Priority: `specialist`, then `organ_classifier`, then top-level fields,
/// then defaults.
pub fn normalize(raw: &RawServiceResponse) -> AnalysisResult {
    match raw.shape() {
        ResponseShape::Specialist { specialist, .. } => AnalysisResult::from_fields(specialist),
        ResponseShape::OrganClassifier(organ) => AnalysisResult::from_fields(organ),
        ResponseShape::Flat(fields) => AnalysisResult::from_fields(fields),
        ResponseShape::Unknown => AnalysisResult::default(),
    }
}

pub fn normalize_value(body: &Value) -> AnalysisResult {
    normalize(&RawServiceResponse::from_value(body.clone()))
}

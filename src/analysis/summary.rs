//! Presentation model for a finished analysis (the result card).

use std::fmt::Write as _;

use serde::Serialize;

use super::normalize::AnalysisResult;
use super::response::{RawServiceResponse, ResponseShape};

/// Confidence as displayed: two decimals and a percent sign.
pub fn format_confidence(confidence: f64) -> String {
    format!("{confidence:.2}%")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialistDetail {
    pub predicted_class: Option<String>,
    pub interpretation: Option<String>,
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub exam_type: String,
    pub diagnosis: String,
    pub confidence: String,
    /// Organ reported by `organ_classifier`, when the service ran it.
    pub organ: Option<String>,
    pub specialist: Option<SpecialistDetail>,
    /// Pretty-printed raw response for the debug panel.
    pub raw_debug: Option<String>,
}

impl ResultView {
    pub fn build(result: &AnalysisResult, raw: Option<&RawServiceResponse>) -> Self {
        let (organ, specialist) = match raw.map(RawServiceResponse::shape) {
            Some(ResponseShape::Specialist { specialist, organ }) => (
                organ.as_ref().and_then(|o| o.diagnosis.clone()),
                Some(SpecialistDetail {
                    predicted_class: specialist.predicted_class.clone(),
                    interpretation: specialist.diagnosis.clone(),
                    confidence: specialist.confidence.map(format_confidence),
                }),
            ),
            Some(ResponseShape::OrganClassifier(organ)) => (organ.diagnosis.clone(), None),
            _ => (None, None),
        };

        Self {
            exam_type: result.exam_type().to_string(),
            diagnosis: result.diagnosis().to_string(),
            confidence: format_confidence(result.confidence()),
            organ,
            specialist,
            raw_debug: raw.map(RawServiceResponse::pretty),
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self, include_raw: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Tipo de Exame: {}", self.exam_type);
        if let Some(organ) = &self.organ {
            let _ = writeln!(out, "Órgão identificado: {organ}");
        }
        let _ = writeln!(out, "Diagnóstico: {}", self.diagnosis);
        if let Some(detail) = &self.specialist {
            let _ = writeln!(out, "Diagnóstico especialista:");
            if let Some(class) = &detail.predicted_class {
                let _ = writeln!(out, "  Classe: {class}");
            }
            if let Some(interpretation) = &detail.interpretation {
                let _ = writeln!(out, "  Interpretação: {interpretation}");
            }
            if let Some(confidence) = &detail.confidence {
                let _ = writeln!(out, "  Confiança: {confidence}");
            }
        }
        let _ = writeln!(out, "Confiança: {}", self.confidence);
        if include_raw {
            if let Some(raw) = &self.raw_debug {
                let _ = writeln!(out, "Resposta bruta (debug):\n{raw}");
            }
        }
        out
    }
}

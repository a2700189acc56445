use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::AnalysisError;

/// Classifier fields as the service reported them. Missing, empty or
/// wrongly-typed values are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierFields {
    pub exam_type: Option<String>,
    pub diagnosis: Option<String>,
    pub predicted_class: Option<String>,
    pub confidence: Option<f64>,
}

impl ClassifierFields {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            exam_type: text_field(object, "examType"),
            diagnosis: text_field(object, "diagnosis"),
            predicted_class: text_field(object, "predicted_class"),
            confidence: numeric_field(object, "confidence"),
        }
    }

    fn is_empty(&self) -> bool {
        self.exam_type.is_none() && self.diagnosis.is_none() && self.confidence.is_none()
    }
}

/// Which of the known payload layouts the service answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `specialist` object, possibly next to an `organ_classifier` object.
    Specialist {
        specialist: ClassifierFields,
        organ: Option<ClassifierFields>,
    },
    /// `organ_classifier` object only.
    OrganClassifier(ClassifierFields),
    /// Top-level `examType` / `diagnosis` / `confidence`.
    Flat(ClassifierFields),
    Unknown,
}

impl ResponseShape {
    pub fn classify(body: &Value) -> Self {
        let Some(object) = body.as_object() else {
            return Self::Unknown;
        };

        let organ = nested_object(object, "organ_classifier").map(ClassifierFields::from_object);

        if let Some(specialist) = nested_object(object, "specialist") {
            return Self::Specialist {
                specialist: ClassifierFields::from_object(specialist),
                organ,
            };
        }
        if let Some(organ) = organ {
            return Self::OrganClassifier(organ);
        }

        let flat = ClassifierFields {
            predicted_class: None,
            ..ClassifierFields::from_object(object)
        };
        if flat.is_empty() {
            Self::Unknown
        } else {
            Self::Flat(flat)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Specialist { .. } => "specialist",
            Self::OrganClassifier(_) => "organ_classifier",
            Self::Flat(_) => "flat",
            Self::Unknown => "unknown",
        }
    }
}

/// The service's JSON body, kept verbatim, plus its classified shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RawServiceResponse {
    body: Value,
    shape: ResponseShape,
}

impl RawServiceResponse {
    pub fn from_value(body: Value) -> Self {
        let shape = ResponseShape::classify(&body);
        Self { body, shape }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AnalysisError> {
        let body: Value = serde_json::from_slice(bytes)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        Ok(Self::from_value(body))
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn shape(&self) -> &ResponseShape {
        &self.shape
    }

    /// Indented JSON for the debug panel.
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }
}

impl Serialize for RawServiceResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

fn nested_object<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    object.get(key).and_then(Value::as_object)
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn numeric_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(Value::as_f64)
}

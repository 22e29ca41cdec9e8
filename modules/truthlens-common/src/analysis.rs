use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single fact-checkable claim and the model's verdict on it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FactCheck {
    /// The specific claim being checked
    pub claim: String,
    /// "true", "false", "misleading", or "unverified"
    pub verdict: String,
    /// Confidence in the verdict, 0.0 (low) to 1.0 (high)
    #[serde(default)]
    pub confidence: f64,
    /// Short explanation of the verdict
    pub explanation: String,
}

/// Bias assessment of an article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BiasAnalysis {
    /// Overall bias score, 0.0 (low) to 1.0 (high)
    #[serde(default)]
    pub overall_score: f64,
    /// Detected political leaning (e.g. "left", "center-left", "center", "right")
    #[serde(default = "default_leaning")]
    pub political_leaning: String,
    /// Specific phrases or framing choices that indicate bias
    #[serde(default)]
    pub bias_indicators: Vec<String>,
    /// Loaded-language score, 0.0 to 1.0
    #[serde(default)]
    pub language_bias: f64,
    /// Estimated bias of the source outlet, 0.0 to 1.0
    #[serde(default)]
    pub source_bias: f64,
    /// Framing/presentation bias score, 0.0 to 1.0
    #[serde(default)]
    pub framing_bias: f64,
}

/// Misinformation risk assessment of an article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MisinformationAnalysis {
    /// Overall misinformation risk, 0.0 (low) to 1.0 (high)
    #[serde(default)]
    pub risk_score: f64,
    /// Fact-checks of specific claims made in the article
    #[serde(default)]
    pub fact_checks: Vec<FactCheck>,
    /// Red flags: unsourced claims, conspiracy framing, doctored context
    #[serde(default)]
    pub red_flags: Vec<String>,
}

/// Sentiment assessment of an article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SentimentAnalysis {
    /// Overall sentiment, -1.0 (negative) to 1.0 (positive)
    #[serde(default)]
    pub overall_sentiment: f64,
    /// Predominant emotional tone (e.g. "neutral", "angry", "fearful")
    #[serde(default = "default_tone")]
    pub emotional_tone: String,
    /// Key phrases driving the sentiment
    #[serde(default)]
    pub key_phrases: Vec<String>,
}

/// Credibility assessment of an article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CredibilityAssessment {
    /// Overall credibility, 0.0 (low) to 1.0 (high)
    #[serde(default)]
    pub overall_score: f64,
    /// Quality of evidence presented, 0.0 to 1.0
    #[serde(default)]
    pub evidence_quality: f64,
    /// Reliability of the source outlet, 0.0 to 1.0
    #[serde(default)]
    pub source_reliability: f64,
}

/// The full structured response the analysis model must emit. This is the
/// versioned contract: the prompt's schema description is generated from this
/// type, and every model response is re-validated against it — the model's
/// claimed adherence is never trusted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub bias_analysis: BiasAnalysis,
    #[serde(default)]
    pub misinformation_analysis: MisinformationAnalysis,
    #[serde(default)]
    pub sentiment_analysis: SentimentAnalysis,
    #[serde(default)]
    pub credibility_assessment: CredibilityAssessment,
    /// Overall confidence in the analysis, 0.0 (low) to 1.0 (high)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_leaning() -> String {
    "center".to_string()
}

fn default_tone() -> String {
    "neutral".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

impl Default for BiasAnalysis {
    fn default() -> Self {
        Self {
            overall_score: 0.0,
            political_leaning: default_leaning(),
            bias_indicators: Vec::new(),
            language_bias: 0.0,
            source_bias: 0.0,
            framing_bias: 0.0,
        }
    }
}

impl Default for MisinformationAnalysis {
    fn default() -> Self {
        Self {
            risk_score: 0.0,
            fact_checks: Vec::new(),
            red_flags: Vec::new(),
        }
    }
}

impl Default for SentimentAnalysis {
    fn default() -> Self {
        Self {
            overall_sentiment: 0.0,
            emotional_tone: default_tone(),
            key_phrases: Vec::new(),
        }
    }
}

impl Default for CredibilityAssessment {
    fn default() -> Self {
        Self {
            overall_score: 0.0,
            evidence_quality: 0.0,
            source_reliability: 0.0,
        }
    }
}

impl Default for AnalysisResponse {
    fn default() -> Self {
        Self {
            bias_analysis: BiasAnalysis::default(),
            misinformation_analysis: MisinformationAnalysis::default(),
            sentiment_analysis: SentimentAnalysis::default(),
            credibility_assessment: CredibilityAssessment::default(),
            confidence: default_confidence(),
        }
    }
}

/// A numeric field outside its declared range. Out-of-range values are a
/// validation failure, never silently clamped.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{field} = {value} outside [{min}, {max}]")]
pub struct RangeError {
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

fn check(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), RangeError> {
    if !value.is_finite() || value < min || value > max {
        return Err(RangeError {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl AnalysisResponse {
    /// Validate every scored field against its declared range.
    pub fn validate(&self) -> Result<(), RangeError> {
        let b = &self.bias_analysis;
        check("bias_analysis.overall_score", b.overall_score, 0.0, 1.0)?;
        check("bias_analysis.language_bias", b.language_bias, 0.0, 1.0)?;
        check("bias_analysis.source_bias", b.source_bias, 0.0, 1.0)?;
        check("bias_analysis.framing_bias", b.framing_bias, 0.0, 1.0)?;

        let m = &self.misinformation_analysis;
        check("misinformation_analysis.risk_score", m.risk_score, 0.0, 1.0)?;
        for fc in &m.fact_checks {
            check("fact_checks.confidence", fc.confidence, 0.0, 1.0)?;
        }

        check(
            "sentiment_analysis.overall_sentiment",
            self.sentiment_analysis.overall_sentiment,
            -1.0,
            1.0,
        )?;

        let c = &self.credibility_assessment;
        check("credibility_assessment.overall_score", c.overall_score, 0.0, 1.0)?;
        check(
            "credibility_assessment.evidence_quality",
            c.evidence_quality,
            0.0,
            1.0,
        )?;
        check(
            "credibility_assessment.source_reliability",
            c.source_reliability,
            0.0,
            1.0,
        )?;

        check("confidence", self.confidence, 0.0, 1.0)
    }

    /// Deterministic low-confidence analysis used when the model call cannot
    /// be completed. The reason is folded into the categorical labels so the
    /// degraded record is self-describing; the shape is schema-legal and
    /// passes `validate()` like any model-produced result.
    pub fn fallback(reason: &str) -> Self {
        let short = crate::types::truncate_on_boundary(reason, 20);
        Self {
            bias_analysis: BiasAnalysis {
                political_leaning: format!("center (fallback - {short})"),
                ..BiasAnalysis::default()
            },
            misinformation_analysis: MisinformationAnalysis {
                risk_score: 0.1,
                ..MisinformationAnalysis::default()
            },
            sentiment_analysis: SentimentAnalysis {
                emotional_tone: format!("neutral (fallback - {short})"),
                ..SentimentAnalysis::default()
            },
            credibility_assessment: CredibilityAssessment {
                overall_score: 0.3,
                evidence_quality: 0.0,
                source_reliability: 0.0,
            },
            confidence: 0.1,
        }
    }

    /// Concatenate the categorical parts of the analysis into one text blob.
    /// Embedding this makes analyses searchable by similarity alongside the
    /// article text itself.
    pub fn summary_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.push(self.bias_analysis.political_leaning.as_str());
        parts.extend(self.bias_analysis.bias_indicators.iter().map(|s| s.as_str()));
        parts.extend(
            self.misinformation_analysis
                .red_flags
                .iter()
                .map(|s| s.as_str()),
        );
        parts.push(self.sentiment_analysis.emotional_tone.as_str());
        parts
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_response_validates() {
        assert!(AnalysisResponse::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_bias_rejected() {
        let mut response = AnalysisResponse::default();
        response.bias_analysis.overall_score = 1.5;
        let err = response.validate().unwrap_err();
        assert_eq!(err.field, "bias_analysis.overall_score");
        assert_eq!(err.value, 1.5);
    }

    #[test]
    fn negative_sentiment_in_range() {
        let mut response = AnalysisResponse::default();
        response.sentiment_analysis.overall_sentiment = -0.8;
        assert!(response.validate().is_ok());
        response.sentiment_analysis.overall_sentiment = -1.2;
        assert!(response.validate().is_err());
    }

    #[test]
    fn nan_rejected() {
        let mut response = AnalysisResponse::default();
        response.confidence = f64::NAN;
        assert!(response.validate().is_err());
    }

    #[test]
    fn fact_check_confidence_checked() {
        let mut response = AnalysisResponse::default();
        response.misinformation_analysis.fact_checks.push(FactCheck {
            claim: "x".into(),
            verdict: "false".into(),
            confidence: 2.0,
            explanation: "y".into(),
        });
        assert!(response.validate().is_err());
    }

    #[test]
    fn fallback_is_schema_legal() {
        let fallback = AnalysisResponse::fallback("RateLimited");
        assert!(fallback.validate().is_ok());
        assert!(fallback
            .bias_analysis
            .political_leaning
            .contains("fallback - RateLimited"));
        assert!((fallback.misinformation_analysis.risk_score - 0.1).abs() < f64::EPSILON);
        assert!((fallback.credibility_assessment.overall_score - 0.3).abs() < f64::EPSILON);
        assert!((fallback.confidence - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn fallback_truncates_long_reasons() {
        let fallback = AnalysisResponse::fallback("SomeVeryLongErrorKindNameThatGoesOn");
        assert!(fallback.bias_analysis.political_leaning.len() < 60);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "bias_analysis": {"overall_score": 0.4},
            "confidence": 0.9
        }"#;
        let response: AnalysisResponse = serde_json::from_str(json).unwrap();
        assert!((response.bias_analysis.overall_score - 0.4).abs() < f64::EPSILON);
        assert_eq!(response.bias_analysis.political_leaning, "center");
        assert_eq!(response.sentiment_analysis.emotional_tone, "neutral");
        assert!((response.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_text_concatenates_labels() {
        let mut response = AnalysisResponse::default();
        response.bias_analysis.political_leaning = "center-right".into();
        response.bias_analysis.bias_indicators = vec!["loaded headline".into()];
        response.misinformation_analysis.red_flags = vec!["unsourced claim".into()];
        response.sentiment_analysis.emotional_tone = "angry".into();
        assert_eq!(
            response.summary_text(),
            "center-right loaded headline unsourced claim angry"
        );
    }

    #[test]
    fn schema_includes_all_sections() {
        let schema = schemars::schema_for!(AnalysisResponse);
        let json = serde_json::to_string(&schema).unwrap();
        for section in [
            "bias_analysis",
            "misinformation_analysis",
            "sentiment_analysis",
            "credibility_assessment",
            "confidence",
        ] {
            assert!(json.contains(section), "schema missing {section}");
        }
    }
}

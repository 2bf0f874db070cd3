//! Composite impact report: the request the estimator assembles and the
//! strictly validated reply.

use foundation::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub const INSIGHT_COUNT: usize = 5;

/// Every resolved input the report is generated from.
///
/// `refresh` changes whenever any upstream signal freshly resolves or the user
/// asks for a new report, so an otherwise identical tuple still regenerates.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub center: GeoPoint,
    pub radius_meters: u32,
    pub population: f64,
    pub traffic_signal_count: u32,
    pub wattage: f64,
    pub temperature_c: f64,
    pub relative_humidity_pct: f64,
    pub us_aqi: f64,
    pub max_offload_capacity_kw: f64,
    pub offload_needed_kw: f64,
    pub percent_offload: f64,
    pub raw_kw_offload: f64,
    pub refresh: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CostSaving {
    pub fuel_saved: String,
    pub electricity_saved: String,
    pub money_saved: String,
    pub roi: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvironmentalImpact {
    pub co2_reduced: String,
    pub water_saved: String,
    pub noise_pollution_reduction: String,
    pub recycling: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImpactReport {
    pub cost_saving: CostSaving,
    pub environmental_impact: EnvironmentalImpact,
    pub ai_insights: Vec<String>,
}

impl ImpactReport {
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.ai_insights.len() != INSIGHT_COUNT {
            return Err(ParseError::Shape(format!(
                "aiInsights must hold exactly {INSIGHT_COUNT} entries, got {}",
                self.ai_insights.len()
            )));
        }
        if let Some(i) = self.ai_insights.iter().position(|s| s.trim().is_empty()) {
            return Err(ParseError::Shape(format!("aiInsights[{i}] is empty")));
        }
        Ok(())
    }
}

/// Slice from the first `{` to the last `}`, dropping prose or code fences
/// a text generator wraps around its JSON.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_impact_report(text: &str) -> Result<ImpactReport, ParseError> {
    let json = extract_json_object(text).ok_or(ParseError::NoJsonObject)?;
    let report: ImpactReport = serde_json::from_str(json)?;
    report.validate()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{extract_json_object, parse_impact_report};
    use crate::error::ParseError;

    fn report_json(insights: serde_json::Value) -> serde_json::Value {
        json!({
            "costSaving": {
                "fuelSaved": "120 L/day",
                "electricitySaved": "288 kWh/day",
                "moneySaved": "$37/day",
                "roi": "14 months"
            },
            "environmentalImpact": {
                "co2Reduced": "111 kg/day",
                "waterSaved": "518 L/day",
                "noisePollutionReduction": "Moderate",
                "recycling": "Extends device life"
            },
            "aiInsights": insights
        })
    }

    #[test]
    fn extracts_object_wrapped_in_prose_and_fences() {
        let body = report_json(json!(["a", "b", "c", "d", "e"]));
        let text = format!(
            "Here is the report you asked for:\n```json\n{}\n```\nLet me know if you need more.",
            serde_json::to_string_pretty(&body).unwrap()
        );
        let report = parse_impact_report(&text).unwrap();
        assert_eq!(report.cost_saving.roi, "14 months");
        assert_eq!(report.environmental_impact.water_saved, "518 L/day");
        assert_eq!(report.ai_insights, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn insight_count_must_be_five() {
        let text = report_json(json!(["a", "b", "c", "d"])).to_string();
        assert!(matches!(parse_impact_report(&text), Err(ParseError::Shape(_))));

        let text = report_json(json!(["a", "b", "c", "d", "e", "f"])).to_string();
        assert!(matches!(parse_impact_report(&text), Err(ParseError::Shape(_))));
    }

    #[test]
    fn blank_insight_is_rejected() {
        let text = report_json(json!(["a", "b", "  ", "d", "e"])).to_string();
        let err = parse_impact_report(&text).unwrap_err();
        assert_eq!(err.to_string(), "unexpected response shape: aiInsights[2] is empty");
    }

    #[test]
    fn extra_group_is_rejected() {
        let mut body = report_json(json!(["a", "b", "c", "d", "e"]));
        body["summary"] = json!("extra");
        assert!(matches!(
            parse_impact_report(&body.to_string()),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn text_without_object_is_reported() {
        assert!(matches!(
            parse_impact_report("I cannot help with that."),
            Err(ParseError::NoJsonObject)
        ));
        assert_eq!(extract_json_object("} then {"), None);
    }
}

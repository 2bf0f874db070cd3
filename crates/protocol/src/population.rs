use foundation::SearchArea;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParseError, number_at};
use crate::geojson::circle_feature;

pub const DEFAULT_DATASET: &str = "wpgppop";
pub const DEFAULT_YEAR: u32 = 2020;

/// Body of `POST /api/worldpop-population`.
///
/// Everything but `geojson` is optional on the wire; the server fills in the
/// defaults. `geojson` is optional here so that a missing polygon is reported
/// as a 400 rather than a generic deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runasync: Option<bool>,
}

impl PopulationQuery {
    pub fn for_area(area: &SearchArea) -> Self {
        Self {
            dataset: Some(DEFAULT_DATASET.to_string()),
            year: Some(DEFAULT_YEAR),
            geojson: Some(circle_feature(area)),
            runasync: Some(false),
        }
    }

    pub fn dataset(&self) -> &str {
        self.dataset.as_deref().unwrap_or(DEFAULT_DATASET)
    }

    pub fn year(&self) -> u32 {
        self.year.unwrap_or(DEFAULT_YEAR)
    }

    pub fn runasync(&self) -> bool {
        self.runasync.unwrap_or(false)
    }
}

/// Successful proxy reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationResponse {
    pub total_population: f64,
    /// The upstream payload the total was read from.
    pub raw: Value,
}

pub fn parse_population_response(body: &str) -> Result<f64, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    number_at(&value, "/total_population", "total_population")
}

#[cfg(test)]
mod tests {
    use foundation::SearchArea;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{PopulationQuery, parse_population_response};
    use crate::error::ParseError;

    #[test]
    fn defaults_apply_when_fields_absent() {
        let q: PopulationQuery =
            serde_json::from_value(json!({"geojson": {"type": "Feature"}})).unwrap();
        assert_eq!(q.dataset(), "wpgppop");
        assert_eq!(q.year(), 2020);
        assert!(!q.runasync());
    }

    #[test]
    fn null_geojson_reads_as_missing() {
        let q: PopulationQuery = serde_json::from_value(json!({"geojson": null})).unwrap();
        assert_eq!(q.geojson, None);
    }

    #[test]
    fn area_query_serialises_defaults() {
        let q = PopulationQuery::for_area(&SearchArea::default());
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["dataset"], json!("wpgppop"));
        assert_eq!(v["year"], json!(2020));
        assert_eq!(v["runasync"], json!(false));
        assert_eq!(v["geojson"]["geometry"]["type"], json!("Polygon"));
    }

    #[test]
    fn total_must_be_numeric() {
        assert_eq!(
            parse_population_response(r#"{"total_population": 18211.5, "raw": {}}"#).unwrap(),
            18211.5
        );
        assert!(matches!(
            parse_population_response(r#"{"total_population": "many"}"#),
            Err(ParseError::NotANumber("total_population"))
        ));
        assert!(matches!(
            parse_population_response(r#"{"raw": {}}"#),
            Err(ParseError::MissingField("total_population"))
        ));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Body posted to the device-allocation endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub population: f64,
    pub traffic_light_count: u32,
    /// Predicted fleet draw in watts.
    pub wattage: f64,
}

/// How a predicted load spreads over idle device classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAllocation {
    pub counts_by_device_class: BTreeMap<String, u64>,
    pub offload_per_device_class_kw: BTreeMap<String, f64>,
    pub max_offload_capacity_kw: f64,
    pub offload_needed_kw: f64,
    /// Share of the needed load that could be placed, within `[0, 1]`.
    pub percent_offload: f64,
    pub raw_kw_offload: f64,
}

impl DeviceAllocation {
    pub fn validate(&self) -> Result<(), ParseError> {
        let scalars = [
            ("max_offload_capacity_kw", self.max_offload_capacity_kw),
            ("offload_needed_kw", self.offload_needed_kw),
            ("raw_kw_offload", self.raw_kw_offload),
        ];
        for (field, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(ParseError::Shape(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.percent_offload) {
            return Err(ParseError::Shape(format!(
                "percent_offload must be within [0, 1], got {}",
                self.percent_offload
            )));
        }
        if let Some((class, kw)) = self
            .offload_per_device_class_kw
            .iter()
            .find(|(_, kw)| !kw.is_finite() || **kw < 0.0)
        {
            return Err(ParseError::Shape(format!(
                "offload for {class} must be a non-negative number, got {kw}"
            )));
        }
        Ok(())
    }
}

pub fn parse_allocation(body: &str) -> Result<DeviceAllocation, ParseError> {
    let allocation: DeviceAllocation = serde_json::from_str(body)?;
    allocation.validate()?;
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_allocation;
    use crate::error::ParseError;

    fn body(percent: f64) -> String {
        json!({
            "counts_by_device_class": {"phone": 180, "laptop": 122},
            "offload_per_device_class_kw": {"phone": 0.2, "laptop": 11.8},
            "max_offload_capacity_kw": 14.6,
            "offload_needed_kw": 12.0,
            "percent_offload": percent,
            "raw_kw_offload": 12.0
        })
        .to_string()
    }

    #[test]
    fn accepts_well_formed_allocation() {
        let a = parse_allocation(&body(1.0)).unwrap();
        assert_eq!(a.counts_by_device_class["laptop"], 122);
        assert_eq!(a.raw_kw_offload, 12.0);
    }

    #[test]
    fn rejects_percent_outside_unit_interval() {
        assert!(matches!(parse_allocation(&body(1.4)), Err(ParseError::Shape(_))));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(matches!(
            parse_allocation(r#"{"percent_offload": 0.5}"#),
            Err(ParseError::Json(_))
        ));
    }
}

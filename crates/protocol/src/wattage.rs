use foundation::DeviceProfile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParseError, number_at};

/// Body posted to the wattage inference endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WattageRequest {
    pub avg_cpu_util: f64,
    pub avg_gpu_util: f64,
    pub active_machines: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_load_1_mean: Option<f64>,
}

impl From<&DeviceProfile> for WattageRequest {
    fn from(p: &DeviceProfile) -> Self {
        Self {
            avg_cpu_util: p.avg_cpu_utilization(),
            avg_gpu_util: p.avg_gpu_utilization(),
            active_machines: p.available_machines(),
            machine_load_1_mean: p.machine_load_1_mean(),
        }
    }
}

/// Reads the predicted draw (watts) from `{"Wattage": <number>}`.
pub fn parse_wattage(body: &str) -> Result<f64, ParseError> {
    let v: Value = serde_json::from_str(body)?;
    number_at(&v, "/Wattage", "Wattage")
}

use serde::Serialize;

/// Fleet utilisation inputs for the wattage predictor.
///
/// Construct through [`DeviceProfile::new`]; the CPU < GPU ordering is
/// checked there rather than patched up afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct DeviceProfile {
    avg_cpu_utilization: f64,
    avg_gpu_utilization: f64,
    available_machines: u32,
    machine_load_1_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("{field} utilization must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("CPU utilization ({cpu}) must stay below GPU utilization ({gpu})")]
    CpuNotBelowGpu { cpu: f64, gpu: f64 },
    #[error("machine load average must be finite and non-negative, got {0}")]
    InvalidLoad(f64),
}

impl DeviceProfile {
    pub fn new(cpu: f64, gpu: f64, available_machines: u32) -> Result<Self, ProfileError> {
        check_unit("CPU", cpu)?;
        check_unit("GPU", gpu)?;
        if cpu >= gpu {
            return Err(ProfileError::CpuNotBelowGpu { cpu, gpu });
        }
        Ok(Self {
            avg_cpu_utilization: cpu,
            avg_gpu_utilization: gpu,
            available_machines,
            machine_load_1_mean: None,
        })
    }

    pub fn with_load_mean(mut self, load: f64) -> Result<Self, ProfileError> {
        if !load.is_finite() || load < 0.0 {
            return Err(ProfileError::InvalidLoad(load));
        }
        self.machine_load_1_mean = Some(load);
        Ok(self)
    }

    pub fn avg_cpu_utilization(&self) -> f64 {
        self.avg_cpu_utilization
    }

    pub fn avg_gpu_utilization(&self) -> f64 {
        self.avg_gpu_utilization
    }

    pub fn available_machines(&self) -> u32 {
        self.available_machines
    }

    pub fn machine_load_1_mean(&self) -> Option<f64> {
        self.machine_load_1_mean
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            avg_cpu_utilization: 0.35,
            avg_gpu_utilization: 0.65,
            available_machines: 120,
            machine_load_1_mean: None,
        }
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ProfileError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ProfileError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceProfile, ProfileError};

    #[test]
    fn accepts_cpu_below_gpu() {
        let p = DeviceProfile::new(0.2, 0.7, 40).unwrap();
        assert_eq!(p.available_machines(), 40);
        assert_eq!(p.machine_load_1_mean(), None);
    }

    #[test]
    fn rejects_cpu_at_or_above_gpu() {
        assert_eq!(
            DeviceProfile::new(0.7, 0.7, 1),
            Err(ProfileError::CpuNotBelowGpu { cpu: 0.7, gpu: 0.7 })
        );
        assert!(DeviceProfile::new(0.9, 0.1, 1).is_err());
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(matches!(
            DeviceProfile::new(-0.1, 0.5, 1),
            Err(ProfileError::OutOfRange { field: "CPU", .. })
        ));
        assert!(matches!(
            DeviceProfile::new(0.1, f64::NAN, 1),
            Err(ProfileError::OutOfRange { field: "GPU", .. })
        ));
    }

    #[test]
    fn load_mean_must_be_finite() {
        let p = DeviceProfile::default();
        assert!(p.with_load_mean(f64::INFINITY).is_err());
        assert_eq!(p.with_load_mean(1.25).unwrap().machine_load_1_mean(), Some(1.25));
    }

    #[test]
    fn default_profile_is_valid() {
        let d = DeviceProfile::default();
        assert!(
            DeviceProfile::new(d.avg_cpu_utilization(), d.avg_gpu_utilization(), 1).is_ok()
        );
    }
}

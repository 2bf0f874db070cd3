use foundation::{DeviceProfile, GeoPoint, ProfileError, SearchArea, clamp_radius};
use tokio::sync::watch;

/// Single source of truth for what the user picked.
///
/// Every field lives in a watch channel; writers go through the setters and
/// readers subscribe. Writes that do not change the value do not notify.
#[derive(Debug)]
pub struct GeoState {
    area: watch::Sender<SearchArea>,
    profile: watch::Sender<DeviceProfile>,
    refresh: watch::Sender<u64>,
}

impl Default for GeoState {
    fn default() -> Self {
        Self::new(SearchArea::default(), DeviceProfile::default())
    }
}

impl GeoState {
    pub fn new(area: SearchArea, profile: DeviceProfile) -> Self {
        Self {
            area: watch::Sender::new(area),
            profile: watch::Sender::new(profile),
            refresh: watch::Sender::new(0),
        }
    }

    pub fn area(&self) -> SearchArea {
        *self.area.borrow()
    }

    pub fn profile(&self) -> DeviceProfile {
        *self.profile.borrow()
    }

    pub fn refresh_count(&self) -> u64 {
        *self.refresh.borrow()
    }

    pub fn watch_area(&self) -> watch::Receiver<SearchArea> {
        self.area.subscribe()
    }

    pub fn watch_profile(&self) -> watch::Receiver<DeviceProfile> {
        self.profile.subscribe()
    }

    pub fn watch_refresh(&self) -> watch::Receiver<u64> {
        self.refresh.subscribe()
    }

    /// Map click.
    pub fn set_center(&self, center: GeoPoint) {
        self.area.send_if_modified(|area| {
            let next = area.with_center(center);
            replace(area, next)
        });
    }

    /// Radius slider. Returns the radius actually stored after clamping.
    pub fn set_radius(&self, radius_meters: u32) -> u32 {
        self.area.send_if_modified(|area| {
            let next = area.with_radius(radius_meters);
            replace(area, next)
        });
        clamp_radius(radius_meters)
    }

    pub fn set_area(&self, area: SearchArea) {
        self.area.send_if_modified(|current| replace(current, area));
    }

    pub fn set_profile(&self, profile: DeviceProfile) {
        self.profile
            .send_if_modified(|current| replace(current, profile));
    }

    /// CPU slider. An invalid value is rejected and the stored profile is
    /// left as it was; the GPU value is never adjusted to make room.
    pub fn set_cpu_utilization(&self, cpu: f64) -> Result<(), ProfileError> {
        self.revise(|p| rebuild(p, cpu, p.avg_gpu_utilization(), p.available_machines()))
    }

    pub fn set_gpu_utilization(&self, gpu: f64) -> Result<(), ProfileError> {
        self.revise(|p| rebuild(p, p.avg_cpu_utilization(), gpu, p.available_machines()))
    }

    pub fn set_available_machines(&self, machines: u32) -> Result<(), ProfileError> {
        self.revise(|p| rebuild(p, p.avg_cpu_utilization(), p.avg_gpu_utilization(), machines))
    }

    /// Asks for the report to be regenerated with unchanged inputs.
    pub fn request_refresh(&self) {
        self.refresh.send_modify(|n| *n += 1);
    }

    fn revise(
        &self,
        f: impl FnOnce(&DeviceProfile) -> Result<DeviceProfile, ProfileError>,
    ) -> Result<(), ProfileError> {
        let next = f(&self.profile())?;
        self.set_profile(next);
        Ok(())
    }
}

fn rebuild(
    current: &DeviceProfile,
    cpu: f64,
    gpu: f64,
    machines: u32,
) -> Result<DeviceProfile, ProfileError> {
    let profile = DeviceProfile::new(cpu, gpu, machines)?;
    match current.machine_load_1_mean() {
        Some(load) => profile.with_load_mean(load),
        None => Ok(profile),
    }
}

fn replace<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}

#[cfg(test)]
mod tests {
    use foundation::{DeviceProfile, GeoPoint, ProfileError};

    use super::GeoState;

    #[test]
    fn radius_is_clamped() {
        let state = GeoState::default();
        assert_eq!(state.set_radius(50), 100);
        assert_eq!(state.area().radius_meters(), 100);
        assert_eq!(state.set_radius(25_000), 10_000);
        assert_eq!(state.area().radius_meters(), 10_000);
    }

    #[test]
    fn center_change_keeps_radius() {
        let state = GeoState::default();
        state.set_radius(1_500);
        state.set_center(GeoPoint::new(40.0, -74.0));
        let area = state.area();
        assert_eq!(area.center(), GeoPoint::new(40.0, -74.0));
        assert_eq!(area.radius_meters(), 1_500);
    }

    #[test]
    fn cpu_above_gpu_is_rejected_without_touching_profile() {
        let state = GeoState::default();
        let before = state.profile();
        let err = state.set_cpu_utilization(0.9).unwrap_err();
        assert!(matches!(err, ProfileError::CpuNotBelowGpu { .. }));
        assert_eq!(state.profile(), before);

        state.set_cpu_utilization(0.1).unwrap();
        assert_eq!(state.profile().avg_cpu_utilization(), 0.1);
        assert_eq!(
            state.profile().avg_gpu_utilization(),
            before.avg_gpu_utilization()
        );
    }

    #[test]
    fn load_mean_survives_slider_moves() {
        let profile = DeviceProfile::new(0.2, 0.6, 10)
            .unwrap()
            .with_load_mean(2.0)
            .unwrap();
        let state = GeoState::new(Default::default(), profile);
        state.set_available_machines(20).unwrap();
        assert_eq!(state.profile().machine_load_1_mean(), Some(2.0));
        assert_eq!(state.profile().available_machines(), 20);
    }

    #[test]
    fn identical_write_does_not_notify() {
        let state = GeoState::default();
        let mut rx = state.watch_area();
        rx.borrow_and_update();
        state.set_center(state.area().center());
        assert!(!rx.has_changed().unwrap());
        state.set_radius(900);
        assert!(rx.has_changed().unwrap());

        let mut refresh = state.watch_refresh();
        state.request_refresh();
        assert!(refresh.has_changed().unwrap());
        assert_eq!(*refresh.borrow_and_update(), 1);
    }
}

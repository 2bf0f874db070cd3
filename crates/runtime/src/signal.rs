use serde::Serialize;

/// One independently loading/erroring external value.
///
/// Reloads keep the last good value visible; a failure clears it so that
/// nothing downstream keeps computing with a value for inputs that no longer
/// apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsyncSignal<T> {
    loading: bool,
    value: Option<T>,
    error: Option<String>,
    /// Number of successful resolutions so far.
    resolutions: u64,
}

impl<T> Default for AsyncSignal<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> AsyncSignal<T> {
    pub fn idle() -> Self {
        Self {
            loading: false,
            value: None,
            error: None,
            resolutions: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn resolutions(&self) -> u64 {
        self.resolutions
    }

    /// A request started; the previous value stays visible.
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// A request started and the previous value must not be shown.
    pub fn reset(&mut self) {
        self.loading = true;
        self.value = None;
        self.error = None;
    }

    pub fn resolve(&mut self, value: T) {
        self.loading = false;
        self.value = Some(value);
        self.error = None;
        self.resolutions += 1;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.value = None;
        self.error = Some(message.into());
    }

    /// Back to idle: nothing loading, nothing shown. The resolution count
    /// is kept.
    pub fn clear(&mut self) {
        self.loading = false;
        self.value = None;
        self.error = None;
    }
}

impl<T: Copy> AsyncSignal<T> {
    pub fn get(&self) -> Option<T> {
        self.value
    }
}

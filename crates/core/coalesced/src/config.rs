use inflight_config::ConfigError;

#[derive(Clone, PartialEq, Eq, Debug, Default)]
/// Config values for [`crate::CoalescionService`].
pub struct CoalescionServiceConfig {
    /// How many distinct endpoints may be in flight at once
    ///
    /// Joining a request that is already in flight is always allowed.
    pub max_in_flight: Option<usize>,
}

impl CoalescionServiceConfig {
    /// Load from the `coalescion` section of the global configuration
    pub fn from_settings() -> Result<Self, ConfigError> {
        Ok((&inflight_config::config()?.coalescion).into())
    }
}

impl From<&inflight_config::Coalescion> for CoalescionServiceConfig {
    fn from(settings: &inflight_config::Coalescion) -> Self {
        Self {
            max_in_flight: match settings.max_in_flight {
                0 => None,
                max => Some(max),
            },
        }
    }
}

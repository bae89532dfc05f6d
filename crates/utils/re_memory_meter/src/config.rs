use crate::{BufferPolicy, IdentitySet, TrackerFactory};

/// Environment variable read by [`MeasurementConfig::from_env`].
pub const BUFFER_POLICY_ENV_VAR: &str = "RE_MEMORY_METER_BUFFER_POLICY";

/// How deep measurements are performed.
///
/// Immutable: the `with_` methods return a new configuration.
/// Safe to share between threads.
#[derive(Clone)]
pub struct MeasurementConfig {
    tracker_factory: TrackerFactory,
    buffer_policy: BufferPolicy,
}

static_assertions::assert_impl_all!(MeasurementConfig: Send, Sync);

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            tracker_factory: IdentitySet::factory(),
            buffer_policy: BufferPolicy::default(),
        }
    }
}

impl std::fmt::Debug for MeasurementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            tracker_factory: _,
            buffer_policy,
        } = self;
        f.debug_struct("MeasurementConfig")
            .field("buffer_policy", buffer_policy)
            .finish_non_exhaustive()
    }
}

impl MeasurementConfig {
    /// The default configuration, with the buffer policy taken from
    /// `RE_MEMORY_METER_BUFFER_POLICY` if it is set.
    ///
    /// An unrecognized value is logged and ignored.
    pub fn from_env() -> Self {
        let value = std::env::var(BUFFER_POLICY_ENV_VAR).ok();
        Self::default().with_buffer_policy_setting(value.as_deref())
    }

    /// Apply the value of [`BUFFER_POLICY_ENV_VAR`], if any.
    fn with_buffer_policy_setting(self, value: Option<&str>) -> Self {
        match value.map(str::parse) {
            Some(Ok(policy)) => self.with_buffer_policy(policy),
            Some(Err(err)) => {
                log::warn!("Ignoring {BUFFER_POLICY_ENV_VAR}: {err}");
                self
            }
            None => self,
        }
    }

    /// Use another kind of visited-node tracker for deep measurements.
    pub fn with_tracker_factory(self, tracker_factory: TrackerFactory) -> Self {
        Self {
            tracker_factory,
            ..self
        }
    }

    pub fn with_buffer_policy(self, buffer_policy: BufferPolicy) -> Self {
        Self {
            buffer_policy,
            ..self
        }
    }

    #[inline]
    pub fn tracker_factory(&self) -> &TrackerFactory {
        &self.tracker_factory
    }

    #[inline]
    pub fn buffer_policy(&self) -> BufferPolicy {
        self.buffer_policy
    }
}

#[test]
fn test_with_replaces_one_field() {
    let config = MeasurementConfig::default();
    assert_eq!(config.buffer_policy(), BufferPolicy::IgnoreOverhead);

    let include = config.clone().with_buffer_policy(BufferPolicy::Include);
    assert_eq!(include.buffer_policy(), BufferPolicy::Include);
    assert!(std::sync::Arc::ptr_eq(
        config.tracker_factory(),
        include.tracker_factory()
    ));

    // `config` itself is untouched:
    assert_eq!(config.buffer_policy(), BufferPolicy::IgnoreOverhead);
}

#[test]
fn test_buffer_policy_setting() {
    let policy = |value| {
        MeasurementConfig::default()
            .with_buffer_policy_setting(value)
            .buffer_policy()
    };

    assert_eq!(policy(None), BufferPolicy::IgnoreOverhead);
    assert_eq!(policy(Some("include")), BufferPolicy::Include);
    assert_eq!(policy(Some(" Ignore ")), BufferPolicy::Ignore);

    // Unrecognized values fall back to the default:
    assert_eq!(policy(Some("bogus")), BufferPolicy::IgnoreOverhead);
    assert_eq!(
        MeasurementConfig::default()
            .with_buffer_policy(BufferPolicy::Include)
            .with_buffer_policy_setting(Some("bogus"))
            .buffer_policy(),
        BufferPolicy::Include
    );
}

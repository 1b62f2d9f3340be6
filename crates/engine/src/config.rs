//! Simulation configuration
//!
//! Configuration is read from a TOML file, then environment overrides are
//! applied. Every key is optional:
//!
//! ```toml
//! stagger_ms = 100         # delay between actor starts
//! lock_timeout_ms = 5000   # omit to wait forever for row locks
//! max_actors = 1000
//! log_level = "info"
//!
//! [[seats]]
//! id = 42
//! state = "active"
//! kind = "standard"
//! ```
//!
//! Environment overrides: `SEATLOCK_STAGGER_MS`, `SEATLOCK_LOCK_TIMEOUT_MS`.

use seatlock_core::{Seat, SeatState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default delay between actor starts
pub const DEFAULT_STAGGER_MS: u64 = 100;

/// Default upper bound on actors per run
pub const DEFAULT_MAX_ACTORS: usize = 1000;

/// Environment variable overriding `stagger_ms`
pub const ENV_STAGGER_MS: &str = "SEATLOCK_STAGGER_MS";

/// Environment variable overriding `lock_timeout_ms`
pub const ENV_LOCK_TIMEOUT_MS: &str = "SEATLOCK_LOCK_TIMEOUT_MS";

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Settings for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Delay between actor starts, in milliseconds
    pub stagger_ms: u64,
    /// Bound on row-lock waits, in milliseconds; `None` waits forever
    pub lock_timeout_ms: Option<u64>,
    /// Largest accepted actor count
    pub max_actors: usize,
    /// Log level for binaries that install a subscriber
    pub log_level: String,
    /// Seats to load into a fresh store; empty means the demo fixture
    pub seats: Vec<Seat>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            stagger_ms: DEFAULT_STAGGER_MS,
            lock_timeout_ms: None,
            max_actors: DEFAULT_MAX_ACTORS,
            log_level: "info".to_string(),
            seats: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `SEATLOCK_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    ///
    /// `SEATLOCK_LOCK_TIMEOUT_MS=0` or an empty value clears the timeout.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_STAGGER_MS) {
            self.stagger_ms = parse_millis(ENV_STAGGER_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            self.lock_timeout_ms = if raw.trim().is_empty() {
                None
            } else {
                match parse_millis(ENV_LOCK_TIMEOUT_MS, &raw)? {
                    0 => None,
                    ms => Some(ms),
                }
            };
        }
        self.validate()
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_actors == 0 {
            return Err(ConfigError::Invalid("max_actors must be at least 1".into()));
        }
        if self.lock_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "lock_timeout_ms must be positive; omit it to wait forever".into(),
            ));
        }
        let mut ids: Vec<_> = self.seats.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::Invalid(format!("seat {} listed twice", pair[0])));
        }
        Ok(())
    }

    // ========================================================================
    // Builder-style setters
    // ========================================================================

    /// Set the delay between actor starts
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger_ms = stagger.as_millis() as u64;
        self
    }

    /// Set or clear the row-lock wait bound
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout_ms = timeout.map(|t| (t.as_millis() as u64).max(1));
        self
    }

    /// Set the largest accepted actor count
    pub fn with_max_actors(mut self, max_actors: usize) -> Self {
        self.max_actors = max_actors;
        self
    }

    /// Set the seat fixture
    pub fn with_seats(mut self, seats: impl IntoIterator<Item = Seat>) -> Self {
        self.seats = seats.into_iter().collect();
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Delay between actor starts
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    /// Row-lock wait bound
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Configured seats, or the demo fixture when none are configured
    pub fn seats_or_demo(&self) -> Vec<Seat> {
        if self.seats.is_empty() {
            demo_seats()
        } else {
            self.seats.clone()
        }
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be milliseconds, got '{}'", key, raw)))
}

/// Demo fixture: seats 1..=50, 1..=10 are `vip`, 7 and 13 are inactive
pub fn demo_seats() -> Vec<Seat> {
    (1..=50)
        .map(|id| {
            let kind = if id <= 10 { "vip" } else { "standard" };
            let state = if id == 7 || id == 13 {
                SeatState::Inactive
            } else {
                SeatState::Active
            };
            Seat::new(id, state, kind)
        })
        .collect()
}

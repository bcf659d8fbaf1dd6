//! Conversion context threaded through every value conversion.
//!
//! A context is built once at request entry, either from process defaults,
//! from an authenticated user's preferences, or from the serialized form that
//! travels with background work:
//!
//! ```json
//! {"timezoneId": "Europe/Berlin", "version": 5}
//! ```

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use thiserror::Error;

/// Errors raised while constructing a context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("unsupported API version {0} (supported: {min}..={max})", min = ApiVersion::MIN.get(), max = ApiVersion::LATEST.get())]
    UnsupportedVersion(u32),

    #[error("malformed serialized context: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type ContextResult<T> = Result<T, ContextError>;

/// An API version requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(u32);

impl ApiVersion {
    pub const MIN: ApiVersion = ApiVersion(1);
    pub const LATEST: ApiVersion = ApiVersion(5);

    /// First version that reads and writes datetimes as strict RFC3339.
    pub const STRICT_DATETIME: ApiVersion = ApiVersion(5);

    pub fn new(version: u32) -> ContextResult<Self> {
        if version < Self::MIN.0 || version > Self::LATEST.0 {
            return Err(ContextError::UnsupportedVersion(version));
        }
        Ok(Self(version))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn uses_strict_datetime(self) -> bool {
        self >= Self::STRICT_DATETIME
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Something that knows the timezone an authenticated caller prefers.
pub trait UserTimezone {
    /// IANA identifier, if the user has one configured.
    fn timezone_id(&self) -> Option<&str>;
}

/// Immutable per-request conversion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionContext {
    version: ApiVersion,
    timezone: Tz,
}

impl ConversionContext {
    pub fn new(version: ApiVersion, timezone: Tz) -> Self {
        Self { version, timezone }
    }

    /// Build a context from an IANA timezone identifier.
    pub fn from_timezone_id(version: ApiVersion, timezone_id: &str) -> ContextResult<Self> {
        Ok(Self::new(version, parse_timezone(timezone_id)?))
    }

    /// Context for work that has no caller: the process timezone (`TZ`,
    /// falling back to UTC) and an explicit version.
    pub fn with_process_timezone(version: ApiVersion) -> Self {
        Self::new(version, process_timezone())
    }

    /// Context for an authenticated request. A missing or unrecognised user
    /// timezone falls back to the process timezone.
    pub fn for_user(user: &impl UserTimezone, version: ApiVersion) -> Self {
        let timezone = match user.timezone_id() {
            Some(id) => parse_timezone(id).unwrap_or_else(|_| {
                tracing::warn!(timezone = id, "user timezone not recognised, using process default");
                process_timezone()
            }),
            None => process_timezone(),
        };
        Self::new(version, timezone)
    }

    /// Rebuild a context from its serialized form. A missing version means
    /// the latest supported one.
    pub fn from_serialized(serialized: &str) -> ContextResult<Self> {
        let raw: SerializedContext = serde_json::from_str(serialized)?;
        let version = match raw.version {
            Some(v) => ApiVersion::new(v)?,
            None => ApiVersion::LATEST,
        };
        Self::from_timezone_id(version, &raw.timezone_id)
    }

    pub fn to_serialized(&self) -> String {
        let raw = SerializedContext {
            timezone_id: self.timezone.name().to_string(),
            version: Some(self.version.get()),
        };
        // A struct of a string and an integer always serializes.
        serde_json::to_string(&raw).unwrap_or_default()
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedContext {
    #[serde(rename = "timezoneId")]
    timezone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
}

/// Parse an IANA timezone identifier.
pub fn parse_timezone(id: &str) -> ContextResult<Tz> {
    id.parse::<Tz>()
        .map_err(|_| ContextError::InvalidTimezone(id.to_string()))
}

fn process_timezone() -> Tz {
    env::var("TZ")
        .ok()
        .and_then(|id| id.trim_start_matches(':').parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

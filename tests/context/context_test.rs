//! Tests for conversion context construction and serialization.

use chrono_tz::Tz;
use strata::context::{ApiVersion, ContextError, ConversionContext, UserTimezone};

struct Preferences(Option<&'static str>);

impl UserTimezone for Preferences {
    fn timezone_id(&self) -> Option<&str> {
        self.0
    }
}

#[test]
fn test_missing_version_means_latest() {
    let ctx = ConversionContext::from_serialized(r#"{"timezoneId":"Asia/Tokyo"}"#).unwrap();
    assert_eq!(ctx.version(), ApiVersion::LATEST);
    assert_eq!(ctx.timezone(), Tz::Asia__Tokyo);
}

#[test]
fn test_rejects_bad_serialized_contexts() {
    assert!(matches!(
        ConversionContext::from_serialized(r#"{"timezoneId":"UTC","version":9}"#),
        Err(ContextError::UnsupportedVersion(9))
    ));
    assert!(matches!(
        ConversionContext::from_serialized(r#"{"timezoneId":"Mars/Olympus"}"#),
        Err(ContextError::InvalidTimezone(_))
    ));
    assert!(matches!(
        ConversionContext::from_serialized(r#"{"version":5}"#),
        Err(ContextError::Malformed(_))
    ));
}

#[test]
fn test_user_timezone_is_used() {
    let ctx = ConversionContext::for_user(&Preferences(Some("America/New_York")), ApiVersion::LATEST);
    assert_eq!(ctx.timezone(), Tz::America__New_York);
    assert_eq!(
        ConversionContext::from_serialized(&ctx.to_serialized()).unwrap(),
        ctx
    );
}

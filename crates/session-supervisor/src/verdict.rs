//! Access verdict for an observed profile record.

use chrono::{DateTime, Utc};
use profile_store::ProfileRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

const MSG_DISABLED: &str = "Your account has been disabled by the administrator.";
const MSG_EXPIRED: &str = "Your membership has expired.";
const MSG_FORCED_LOGOUT: &str = "Your session was ended by the administrator. Please sign in again.";
const MSG_RECORD_MISSING: &str = "Your account no longer has access.";

/// Why a session was evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RevocationReason {
    /// The profile record does not exist.
    RecordMissing,
    /// The record is marked disabled.
    Disabled,
    /// The membership expired at `at`.
    Expired { at: DateTime<Utc> },
    /// The password version moved past the one seen at sign-in.
    PasswordVersionBumped { baseline: u64, observed: u64 },
}

impl RevocationReason {
    /// Message shown to the evicted user.
    pub fn user_message(&self) -> &'static str {
        match self {
            RevocationReason::RecordMissing => MSG_RECORD_MISSING,
            RevocationReason::Disabled => MSG_DISABLED,
            RevocationReason::Expired { .. } => MSG_EXPIRED,
            RevocationReason::PasswordVersionBumped { .. } => MSG_FORCED_LOGOUT,
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationReason::RecordMissing => write!(f, "record missing"),
            RevocationReason::Disabled => write!(f, "disabled"),
            RevocationReason::Expired { at } => write!(f, "expired at {}", at.to_rfc3339()),
            RevocationReason::PasswordVersionBumped { baseline, observed } => {
                write!(f, "password version {} > {}", observed, baseline)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Revoked(RevocationReason),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// Decide whether `record` still grants access.
///
/// Checks run in order: missing, disabled, expired, password version. The
/// first failing check is the reason reported.
pub fn evaluate(record: Option<&ProfileRecord>, baseline_version: u64, now: DateTime<Utc>) -> Verdict {
    let Some(record) = record else {
        return Verdict::Revoked(RevocationReason::RecordMissing);
    };

    if record.is_disabled {
        return Verdict::Revoked(RevocationReason::Disabled);
    }

    if let Some(at) = record.expiry_date {
        if now > at {
            return Verdict::Revoked(RevocationReason::Expired { at });
        }
    }

    if record.password_version > baseline_version {
        return Verdict::Revoked(RevocationReason::PasswordVersionBumped {
            baseline: baseline_version,
            observed: record.password_version,
        });
    }

    Verdict::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use profile_store::Role;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn record() -> ProfileRecord {
        ProfileRecord::new("uid-1", "member01@render.ai", Role::Member, now() - Duration::days(30))
    }

    #[test]
    fn test_valid_record() {
        assert_eq!(evaluate(Some(&record()), 1, now()), Verdict::Valid);
    }

    #[test]
    fn test_missing_record() {
        assert_eq!(
            evaluate(None, 1, now()),
            Verdict::Revoked(RevocationReason::RecordMissing)
        );
    }

    #[test]
    fn test_disabled_wins_over_expiry() {
        let mut record = record().with_expiry(Some(now() - Duration::days(1)));
        record.is_disabled = true;
        record.password_version = 9;
        assert_eq!(
            evaluate(Some(&record), 1, now()),
            Verdict::Revoked(RevocationReason::Disabled)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let at = now();
        let record = record().with_expiry(Some(at));
        assert!(evaluate(Some(&record), 1, at).is_valid());
        assert_eq!(
            evaluate(Some(&record), 1, at + Duration::seconds(1)),
            Verdict::Revoked(RevocationReason::Expired { at })
        );
    }

    #[test]
    fn test_future_expiry_is_valid() {
        let record = record().with_expiry(Some(now() + Duration::days(30)));
        assert!(evaluate(Some(&record), 1, now()).is_valid());
    }

    #[test]
    fn test_password_version_against_baseline() {
        let mut record = record();
        record.password_version = 3;
        assert!(evaluate(Some(&record), 3, now()).is_valid());
        assert!(evaluate(Some(&record), 4, now()).is_valid());
        assert_eq!(
            evaluate(Some(&record), 2, now()),
            Verdict::Revoked(RevocationReason::PasswordVersionBumped {
                baseline: 2,
                observed: 3
            })
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            RevocationReason::Disabled.user_message(),
            "Your account has been disabled by the administrator."
        );
        assert_eq!(
            RevocationReason::Expired { at: now() }.user_message(),
            "Your membership has expired."
        );
    }
}

//! Sample emulated services, one per wire style.
//!
//! Each module exposes a `descriptor(&ServerConfig)` constructor returning a
//! fully built [`ServiceDescriptor`](cumulus_core::ServiceDescriptor) whose
//! dispatch capability is an [`ActionTable`](cumulus_core::ActionTable) over
//! the module's in-memory state.
//!
//! - [`ses`]: REST (`/ses/v2/...`)
//! - [`dynamodb`]: JSON 1.0 (`DynamoDB_20120810.*`)
//! - [`secretsmanager`]: JSON 1.1 (`secretsmanager.*`)
//! - [`rds`]: Query (`Action=...`, XML responses)

pub mod dynamodb;
pub mod rds;
pub mod secretsmanager;
pub mod ses;

use chrono::{DateTime, Utc};

/// Seconds since the Unix epoch with millisecond precision, the timestamp
/// format of the JSON protocols.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn epoch_seconds_keeps_milliseconds() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        assert_eq!(epoch_seconds(at), 1_700_000_000.25);
    }
}

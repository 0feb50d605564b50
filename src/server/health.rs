use crate::health::{HealthCheckable, HealthStatus};
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use std::sync::{PoisonError, RwLock};

lazy_static! {
    static ref FIVE_MINUTES: Duration = Duration::minutes(5);
}

#[derive(Default)]
struct UpstreamCalls {
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

/// Tracks whether our upstreams have been answering. One failed request doesn't make
/// us unhealthy for long, the next success or five quiet minutes clear it.
pub struct ServerHealth {
    upstream_calls: RwLock<UpstreamCalls>,
    started_on: DateTime<Utc>,
}

impl ServerHealth {
    pub fn new(started_on: DateTime<Utc>) -> Self {
        Self {
            upstream_calls: RwLock::new(UpstreamCalls::default()),
            started_on,
        }
    }

    pub fn set_upstream_ok(&self) {
        self.set_upstream_ok_at(Utc::now());
    }

    pub fn set_upstream_failed(&self) {
        self.set_upstream_failed_at(Utc::now());
    }

    fn set_upstream_ok_at(&self, at: DateTime<Utc>) {
        self.upstream_calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_success = Some(at);
    }

    fn set_upstream_failed_at(&self, at: DateTime<Utc>) {
        self.upstream_calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_failure = Some(at);
    }

    fn health_status_at(&self, now: DateTime<Utc>) -> HealthStatus {
        let calls = self
            .upstream_calls
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let last_success = calls.last_success.unwrap_or(self.started_on);

        match calls.last_failure {
            Some(last_failure) if last_failure > last_success && now - last_failure < *FIVE_MINUTES => {
                HealthStatus::UnHealthy(Some(format!(
                    "upstream call failed {} seconds ago without a success since",
                    (now - last_failure).num_seconds()
                )))
            }
            _ => HealthStatus::Healthy(Some(format!(
                "up since {}",
                self.started_on.to_rfc3339()
            ))),
        }
    }
}

impl HealthCheckable for ServerHealth {
    fn health_status(&self) -> HealthStatus {
        self.health_status_at(Utc::now())
    }
}

//! Synthetic execution generator for development databases.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use crate::model::{ExecutionStatus, NewExecution, Severity};
use crate::storage::RecordStore;

pub const INTERFACES: [&str; 6] = [
    "SF_EmployeeSync_To_ECP",
    "SF_ManagerSync",
    "SF_TimeOffExport",
    "SF_PayrollExport",
    "SF_3rdParty_RMS",
    "SF_BenefitsSync",
];

const FAILURE_SEVERITIES: [Severity; 3] = [Severity::Medium, Severity::High, Severity::Critical];

const FAILURE_PHRASES: [&str; 8] = [
    "connection reset by upstream endpoint",
    "socket timeout while awaiting response",
    "invalid credentials for target system",
    "payload rejected by schema validation",
    "rate limit exceeded on remote API",
    "duplicate integration key detected",
    "TLS handshake failed",
    "mapping error on required field",
];

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Look-back horizon for generated start times.
const HORIZON_DAYS: i64 = 30;

/// Build one synthetic execution. Severity is LOW unless the run failed.
pub fn generate_one<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> NewExecution {
    let iface = *INTERFACES.choose(rng).unwrap_or(&INTERFACES[0]);
    let status = *ExecutionStatus::ALL
        .choose(rng)
        .unwrap_or(&ExecutionStatus::Success);
    let failed = status == ExecutionStatus::Failed;

    let duration: i64 = rng.gen_range(100..=10_000);
    let back_ms = rng.gen_range(0..Duration::days(HORIZON_DAYS).num_milliseconds());
    let start_time = now - Duration::milliseconds(back_ms);

    let (message, error_details, severity) = if failed {
        let code = rng.gen_range(1..=999);
        let phrase = FAILURE_PHRASES.choose(rng).unwrap_or(&FAILURE_PHRASES[0]);
        let trace = FAILURE_PHRASES.choose(rng).unwrap_or(&FAILURE_PHRASES[0]);
        (
            format!("Error code {code} - {phrase}"),
            Some(json!({
                "code": format!("E{}", rng.gen_range(1..=999)),
                "trace": trace,
            })),
            *FAILURE_SEVERITIES.choose(rng).unwrap_or(&Severity::Medium),
        )
    } else {
        ("OK".to_string(), None, Severity::Low)
    };

    NewExecution {
        interface_name: iface.to_string(),
        integration_key: format!(
            "{}_{}",
            iface.to_lowercase(),
            rng.gen_range(1..=2_000_000)
        ),
        status,
        start_time,
        end_time: Some(start_time + Duration::milliseconds(duration)),
        duration: Some(duration),
        message,
        error_details,
        severity,
        tags: vec!["generated".to_string()],
    }
}

pub fn generate_batch<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    now: DateTime<Utc>,
) -> Vec<NewExecution> {
    (0..n).map(|_| generate_one(rng, now)).collect()
}

/// Insert `count` synthetic executions in batches.
///
/// A failed batch is logged and skipped; the return value is the number of
/// rows actually written.
pub async fn run(store: &dyn RecordStore, count: usize, batch_size: usize) -> usize {
    let batch_size = batch_size.max(1);
    let mut generated = 0;
    let mut inserted = 0;

    tracing::info!(count, batch_size, "Generating synthetic executions");

    while generated < count {
        let n = batch_size.min(count - generated);
        // ThreadRng is not Send; keep it out of scope across the await.
        let batch = generate_batch(&mut rand::thread_rng(), n, Utc::now());
        generated += n;

        match store.insert_many(batch).await {
            Ok(written) => {
                inserted += written;
                tracing::info!(inserted, count, "Seed batch written");
            }
            Err(e) => {
                tracing::error!(error = %e, at = generated, "Seed batch insert failed");
            }
        }
    }

    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use crate::storage::{open_pool, SqliteRecordStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_records_respect_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let now: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
        for r in generate_batch(&mut rng, 500, now) {
            assert!(INTERFACES.contains(&r.interface_name.as_str()));
            assert!(r.integration_key.starts_with(&r.interface_name.to_lowercase()));
            let d = r.duration.unwrap();
            assert!((100..=10_000).contains(&d));
            assert_eq!(r.end_time, Some(r.start_time + Duration::milliseconds(d)));
            assert!(r.start_time <= now);
            assert!(r.start_time >= now - Duration::days(HORIZON_DAYS));
            assert_eq!(r.tags, vec!["generated".to_string()]);

            if r.status == ExecutionStatus::Failed {
                assert_ne!(r.severity, Severity::Low);
                assert!(r.message.starts_with("Error code "));
                assert!(r.error_details.is_some());
            } else {
                assert_eq!(r.severity, Severity::Low);
                assert_eq!(r.message, "OK");
                assert!(r.error_details.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_run_inserts_in_batches() {
        let dir = tempfile::TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("seed.db").to_str().unwrap()).unwrap();
        let store = SqliteRecordStore::new(pool);

        let inserted = run(&store, 25, 10).await;
        assert_eq!(inserted, 25);
        let totals = store.totals(&Filter::default()).await.unwrap();
        assert_eq!(totals.total, 25);
    }
}

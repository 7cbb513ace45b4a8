use chrono::Utc;
use tibber_exporter_core::field::Field;
use tibber_exporter_core::model::sample::TelemetrySample;

use crate::MeasurementStore;

impl MeasurementStore {
    pub fn apply(&self, sample: &TelemetrySample) {
        let mut state = self.state_write();
        let mut skipped = 0usize;

        for field in Field::ALL {
            let value = sample.get(field);
            if self.policy().should_apply(field, value) {
                state.snapshot.readings.set(field, value);
            } else {
                skipped += 1;
            }
        }
        state.snapshot.timestamp = Some(sample.timestamp);
        state.samples_applied += 1;
        state.last_applied_at = Some(Utc::now());
        drop(state);

        tracing::trace!(ts = %sample.timestamp, skipped, "sample applied");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use chrono::{Duration, TimeZone};
    use testkit::{full_sample, sample_with};
    use tibber_exporter_core::policy::{PolicyTable, UpdatePolicy};

    use super::*;

    fn base() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sparse_zero_never_changes_stored_value() {
        let store = MeasurementStore::default();
        store.apply(&sample_with(
            base(),
            &[(Field::CurrentL1, 7.5), (Field::VoltagePhase2, 229.0)],
        ));

        for i in 1..5 {
            store.apply(&sample_with(base() + Duration::seconds(i), &[]));
            let snap = store.read();
            assert_eq!(snap.readings.get(Field::CurrentL1), 7.5);
            assert_eq!(snap.readings.get(Field::VoltagePhase2), 229.0);
        }
    }

    #[test]
    fn sparse_field_never_reported_stays_zero() {
        let store = MeasurementStore::default();
        store.apply(&sample_with(base(), &[(Field::CurrentL1, 0.0)]));
        store.apply(&sample_with(base() + Duration::seconds(1), &[]));
        assert_eq!(store.read().readings.get(Field::CurrentL1), 0.0);
    }

    #[test]
    fn sparse_field_takes_new_nonzero_value() {
        let store = MeasurementStore::default();
        store.apply(&sample_with(base(), &[(Field::VoltagePhase1, 230.0)]));
        store.apply(&sample_with(
            base() + Duration::seconds(1),
            &[(Field::VoltagePhase1, 231.5)],
        ));
        assert_eq!(store.read().readings.get(Field::VoltagePhase1), 231.5);
    }

    #[test]
    fn non_sparse_fields_always_overwrite_including_zero() {
        let store = MeasurementStore::default();
        store.apply(&full_sample(base()));
        store.apply(&sample_with(base() + Duration::seconds(1), &[]));

        let snap = store.read();
        for field in Field::ALL {
            if store.policy().policy(field) == UpdatePolicy::Overwrite {
                assert_eq!(snap.readings.get(field), 0.0, "{field} was not overwritten");
            } else {
                assert_ne!(snap.readings.get(field), 0.0, "{field} was zeroed");
            }
        }
    }

    #[test]
    fn timestamp_always_follows_last_sample() {
        let store = MeasurementStore::default();
        store.apply(&sample_with(base(), &[(Field::CurrentL2, 3.0)]));
        let later = base() + Duration::seconds(42);
        store.apply(&sample_with(later, &[]));
        assert_eq!(store.read().timestamp, Some(later));

        // Arrival order wins, not timestamp order.
        let earlier = base() - Duration::seconds(10);
        store.apply(&sample_with(earlier, &[]));
        assert_eq!(store.read().timestamp, Some(earlier));
        assert_eq!(store.status().samples_applied, 3);
    }

    #[test]
    fn overwrite_all_table_treats_phase_zero_as_reading() {
        let store = MeasurementStore::new(PolicyTable::overwrite_all());
        store.apply(&sample_with(base(), &[(Field::CurrentL1, 5.0)]));
        store.apply(&sample_with(base() + Duration::seconds(1), &[]));
        assert_eq!(store.read().readings.get(Field::CurrentL1), 0.0);
    }

    #[test]
    fn concurrent_readers_never_see_torn_snapshots() {
        let store = MeasurementStore::default();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while !done.load(Ordering::Acquire) {
                        let snap = store.read();
                        let Some(ts) = snap.timestamp else {
                            continue;
                        };
                        let expected = (ts - base()).num_seconds() as f64;
                        for field in Field::ALL {
                            assert_eq!(snap.readings.get(field), expected, "torn read on {field}");
                        }
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for k in 1..=5_000i64 {
            let mut sample = sample_with(base() + Duration::seconds(k), &[]);
            for field in Field::ALL {
                sample.readings.set(field, k as f64);
            }
            store.apply(&sample);
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.status().samples_applied, 5_000);
        assert_eq!(store.read().readings.get(Field::Power), 5_000.0);
    }
}

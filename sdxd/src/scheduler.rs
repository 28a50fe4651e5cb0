// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debounce scheduling for topology-change notifications.
//!
//! Bursts of notifications collapse into a single reconcile pass: the
//! first submitter becomes the "lead" and drives a coalescing loop, later
//! submitters just refresh the pending-snapshot slot and widen the wait
//! window (one unit per notification, capped).  The loop always consumes
//! the freshest snapshot, so intermediate snapshots are never reconciled
//! individually and no accepted notification is lost.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;

use crate::types::TopologySnapshot;

/// The freshest live snapshot waiting to be reconciled.
struct Pending {
    snapshot: TopologySnapshot,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    latest: Option<Pending>,
    last_event: Option<DateTime<Utc>>,
    busy: bool,
    wait: u64,
}

/// Outcome of handing a notification to the debouncer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Submit {
    /// Event timestamp not newer than the last accepted one; dropped.
    Stale,
    /// Accepted; a cycle already in flight will pick it up.
    Coalesced,
    /// Accepted; the caller must now run [`Debouncer::drive`].
    Lead,
}

pub struct Debouncer {
    unit: Duration,
    max_wait: u64,
    state: Mutex<State>,
}

impl Debouncer {
    pub fn new(max_wait: u64, unit: Duration) -> Self {
        Debouncer {
            unit,
            max_wait: max_wait.max(1),
            state: Mutex::new(State::default()),
        }
    }

    /// Record a notification.  Cheap and non-blocking; the stale check and
    /// the busy bookkeeping happen under one short-lived lock.
    pub fn submit(
        &self,
        snapshot: TopologySnapshot,
        timestamp: DateTime<Utc>,
    ) -> Submit {
        let mut st = self.state.lock().unwrap();
        if let Some(last) = st.last_event {
            if timestamp <= last {
                return Submit::Stale;
            }
        }
        st.last_event = Some(timestamp);
        st.latest = Some(Pending {
            snapshot,
            timestamp,
        });
        if st.busy {
            st.wait = (st.wait + 1).min(self.max_wait);
            Submit::Coalesced
        } else {
            st.busy = true;
            st.wait = 1;
            Submit::Lead
        }
    }

    /// Run the coalescing loop until the pending slot drains.  Only the
    /// submitter that received [`Submit::Lead`] may call this.
    pub async fn drive<F, Fut>(&self, mut cycle: F)
    where
        F: FnMut(TopologySnapshot, DateTime<Utc>) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            // Coalescing window: concurrent submissions widen it, one unit
            // each, up to max_wait.
            loop {
                tokio::time::sleep(self.unit).await;
                let mut st = self.state.lock().unwrap();
                st.wait = st.wait.saturating_sub(1);
                if st.wait == 0 {
                    break;
                }
            }

            let pending = self.state.lock().unwrap().latest.take();
            if let Some(p) = pending {
                cycle(p.snapshot, p.timestamp).await;
            }

            let mut st = self.state.lock().unwrap();
            if st.latest.is_some() {
                // a notification arrived while the cycle ran
                st.wait = 1;
                drop(st);
            } else {
                st.busy = false;
                return;
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(base: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
        base + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn test_burst_coalesces_to_one_cycle() {
        let deb = Debouncer::new(5, Duration::from_millis(5));
        let base = Utc::now();

        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 0)),
            Submit::Lead
        );
        for i in 1..4 {
            assert_eq!(
                deb.submit(TopologySnapshot::default(), at(base, i)),
                Submit::Coalesced
            );
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        deb.drive(move |_snap, ts| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(ts);
            }
        })
        .await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        // the cycle saw the newest notification
        assert_eq!(calls[0], at(base, 3));
    }

    #[tokio::test]
    async fn test_stale_and_duplicate_timestamps_are_dropped() {
        let deb = Debouncer::new(5, Duration::from_millis(1));
        let base = Utc::now();

        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 10)),
            Submit::Lead
        );
        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 10)),
            Submit::Stale
        );
        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 5)),
            Submit::Stale
        );
        deb.drive(|_snap, _ts| async {}).await;
        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 9)),
            Submit::Stale
        );
        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 11)),
            Submit::Lead
        );
    }

    #[tokio::test]
    async fn test_notification_during_cycle_triggers_followup() {
        let deb = Arc::new(Debouncer::new(5, Duration::from_millis(2)));
        let base = Utc::now();

        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 0)),
            Submit::Lead
        );

        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let racer = deb.clone();
        let driver = tokio::spawn(async move {
            racer
                .drive(move |_snap, ts| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().unwrap().push(ts);
                        // keep the cycle open long enough for the race
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                })
                .await;
        });

        // land a notification while the first cycle is executing
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            deb.submit(TopologySnapshot::default(), at(base, 1)),
            Submit::Coalesced
        );
        driver.await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(*calls, vec![at(base, 0), at(base, 1)]);
    }
}

//! Daily display cap for the frequency-gated (pop-under) provider.

use adplace_core::types::ProviderId;
use adplace_core::AdResult;
use adplace_store::DailyCounterStore;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed { shown_today: u32 },
    CapReached { shown_today: u32 },
}

impl GateDecision {
    pub fn shown_today(&self) -> u32 {
        match self {
            GateDecision::Allowed { shown_today } | GateDecision::CapReached { shown_today } => {
                *shown_today
            }
        }
    }
}

pub struct FrequencyGate {
    provider: ProviderId,
    /// `None` means uncapped.
    cap: Option<u32>,
    counters: DailyCounterStore,
}

impl FrequencyGate {
    pub fn new(provider: ProviderId, cap: Option<u32>, counters: DailyCounterStore) -> Self {
        Self {
            provider,
            cap,
            counters,
        }
    }

    pub fn check(&self, today: NaiveDate) -> GateDecision {
        let shown_today = self.counters.read(self.provider, today).count;
        match self.cap {
            Some(cap) if shown_today >= cap => GateDecision::CapReached { shown_today },
            _ => GateDecision::Allowed { shown_today },
        }
    }

    /// Count one display for `today`; returns the new total.
    pub fn record(&self, today: NaiveDate) -> AdResult<u32> {
        self.counters.increment(self.provider, today)
    }

    /// Put the counter back to `shown_today` after a recorded display did not happen.
    pub fn release(&self, today: NaiveDate, shown_today: u32) -> AdResult<()> {
        self.counters.set(self.provider, today, shown_today)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use adplace_store::LocalStore;
    use std::sync::Arc;

    fn gate(cap: Option<u32>) -> FrequencyGate {
        FrequencyGate::new(
            ProviderId::PopCash,
            cap,
            DailyCounterStore::new(Arc::new(LocalStore::new())),
        )
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_cap_of_two() {
        let gate = gate(Some(2));
        assert_eq!(gate.check(day(5)), GateDecision::Allowed { shown_today: 0 });
        gate.record(day(5)).unwrap();
        gate.record(day(5)).unwrap();
        assert_eq!(gate.check(day(5)), GateDecision::CapReached { shown_today: 2 });
        // Next day starts fresh
        assert_eq!(gate.check(day(6)), GateDecision::Allowed { shown_today: 0 });
    }

    #[test]
    fn test_zero_cap_never_allows() {
        assert_eq!(
            gate(Some(0)).check(day(5)),
            GateDecision::CapReached { shown_today: 0 }
        );
    }

    #[test]
    fn test_uncapped() {
        let gate = gate(None);
        for _ in 0..10 {
            gate.record(day(5)).unwrap();
        }
        assert_eq!(gate.check(day(5)), GateDecision::Allowed { shown_today: 10 });
    }

    #[test]
    fn test_release_undoes_record() {
        let gate = gate(Some(2));
        gate.record(day(5)).unwrap();
        gate.record(day(5)).unwrap();
        gate.release(day(5), 1).unwrap();
        assert_eq!(gate.check(day(5)), GateDecision::Allowed { shown_today: 1 });
    }
}

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use scopeguard::ScopeGuard;

/// Single-in-flight admission control.
///
/// A frame may only enter the expensive part of the pipeline while no other
/// frame is inside it. Frames arriving while busy are dropped by the caller,
/// the frame already in flight always wins.
#[derive(Debug, Clone, Default)]
pub struct AdmissionGate {
    busy: Arc<AtomicBool>,
}

/// Proof of admission. The gate returns to idle when this is dropped,
/// whatever the exit path: completion, error or unwinding.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the permit is dropped"]
pub struct AdmissionPermit {
    _release: ScopeGuard<Arc<AtomicBool>, fn(Arc<AtomicBool>)>,
}

fn release(busy: Arc<AtomicBool>) {
    busy.store(false, Ordering::Release);
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically switches idle to busy. Returns `None` when a frame is already in flight.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdmissionPermit {
                _release: scopeguard::guard(self.busy.clone(), release as fn(Arc<AtomicBool>)),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_frame_is_refused_while_busy() {
        let gate = AdmissionGate::new();

        let first = gate.try_admit();
        assert!(first.is_some());
        assert!(gate.try_admit().is_none());
        assert!(gate.is_busy());

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.try_admit().is_some());
    }

    #[test]
    fn released_on_error_path() {
        let gate = AdmissionGate::new();

        let failing_stage = |permit: AdmissionPermit| -> Result<(), String> {
            let _permit = permit;
            Err("engine unavailable".into())
        };

        let permit = gate.try_admit().unwrap();
        assert!(failing_stage(permit).is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn released_on_panic() {
        let gate = AdmissionGate::new();
        let permit = gate.try_admit().unwrap();

        let result = std::thread::spawn(move || {
            let _permit = permit;
            panic!("stage exploded");
        })
        .join();

        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn only_one_of_many_racing_threads_is_admitted() {
        let gate = AdmissionGate::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    gate.try_admit()
                })
            })
            .collect();

        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(permits.len(), 1);
        drop(permits);
        assert!(!gate.is_busy());
    }
}

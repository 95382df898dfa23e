use std::time::Instant;

lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

/// Milliseconds elapsed since a process-wide, monotonic epoch.
pub fn now_ms() -> u64 {
    EPOCH.elapsed().as_millis() as u64
}

/// Identifier of the execution context the caller runs on.
pub fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let first = now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(now_ms() >= first + 5);
    }

    #[test]
    fn labels_named_threads() {
        let label = std::thread::Builder::new()
            .name("compute".to_string())
            .spawn(current_thread_label)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(label, "compute");
    }
}

use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Default)]
struct LedgerState {
    seen: HashSet<String>,
    order: Vec<String>,
}

/// Session-scoped record of URLs already handed to the scraper.
///
/// `admit` is an atomic test-and-set over the whole batch, so concurrent
/// callers never both receive the same URL.
#[derive(Default)]
pub struct DedupLedger {
    state: Mutex<LedgerState>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the candidates never admitted before, marking them admitted.
    /// Order is preserved; duplicates inside the batch are admitted once.
    pub fn admit<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        let mut state = self.state.lock();
        let mut admitted = Vec::new();
        for url in candidates {
            let url = url.as_ref().trim();
            if url.is_empty() || state.seen.contains(url) {
                continue;
            }
            state.seen.insert(url.to_string());
            state.order.push(url.to_string());
            admitted.push(url.to_string());
        }
        admitted
    }

    pub fn contains(&self, url: &str) -> bool {
        self.state.lock().seen.contains(url)
    }

    /// Every admitted URL in admission order.
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

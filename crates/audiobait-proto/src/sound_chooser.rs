//! Per-combo stateful resolver of `"random"`, `"same"`, and numeric sound
//! tokens against the current file library.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lives for exactly one combo invocation. `"random"` is drawn from a
/// seedable RNG — seeded with wall-clock nanoseconds in production, with an
/// explicit seed in tests — so the chosen sequence is reproducible.
pub struct SoundChooser {
    entries: Vec<(i64, String)>,
    previous: i64,
    rng: StdRng,
}

impl SoundChooser {
    pub fn new(entries: Vec<(i64, String)>, seed: u64) -> Self {
        Self {
            entries,
            previous: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeds from wall-clock nanoseconds, matching the production policy in
    /// the original scheduler: each burst gets an independently-seeded RNG.
    pub fn new_with_wallclock_seed(entries: Vec<(i64, String)>) -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(entries, seed)
    }

    /// Resolves one sound token. Returns `(0, "")` for any failure mode —
    /// unknown id, `"same"` with no prior choice, or an unrecognised token —
    /// which the caller treats as "skip, no event".
    pub fn choose(&mut self, token: &str) -> (i64, String) {
        match token {
            "random" => self.choose_random(),
            "same" => {
                if self.previous != 0 {
                    if let Some(name) = self.lookup(self.previous) {
                        return (self.previous, name);
                    }
                }
                (0, String::new())
            }
            other => match other.parse::<i64>() {
                Ok(id) => match self.lookup(id) {
                    Some(name) if !name.is_empty() => {
                        self.previous = id;
                        (id, name)
                    }
                    _ => (0, String::new()),
                },
                Err(_) => (0, String::new()),
            },
        }
    }

    fn choose_random(&mut self) -> (i64, String) {
        if self.entries.is_empty() {
            return (0, String::new());
        }
        let idx = self.rng.gen_range(0..self.entries.len());
        let (id, name) = self.entries[idx].clone();
        self.previous = id;
        (id, name)
    }

    fn lookup(&self, id: i64) -> Option<String> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, name)| name.clone())
    }
}

use chrono::Local;
use rand::Rng;

/// Source of the unique suffix appended to each bench directory.
pub trait RunIdSource {
    /// Returns a fresh run id.
    fn next_id(&mut self) -> String;
}

impl<F> RunIdSource for F
where
    F: FnMut() -> String,
{
    fn next_id(&mut self) -> String {
        self()
    }
}

/// Local minute timestamp plus four random hex digits, e.g. `20240131_0915.3fa2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockRunIds;

impl RunIdSource for ClockRunIds {
    fn next_id(&mut self) -> String {
        new_run_id()
    }
}

/// Generates one run id from the local clock and the thread RNG.
pub fn new_run_id() -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M");
    let suffix: u16 = rand::thread_rng().gen();
    format!("{stamp}.{suffix:04x}")
}

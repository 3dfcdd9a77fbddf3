//! Push-based reporting between the installer and whoever drives it.
//!
//! The installer announces step changes and bar updates through a
//! [`ProgressReporter`] and polls a [`CancellationToken`]. Reporters may be
//! called from blocking worker threads, so implementations must be
//! `Send + Sync` and must not assume the thread that created them.

pub use tokio_util::sync::CancellationToken;

/// Relative weight of each modpack step in the overall bar, indexed by the
/// 1-based step number (index 0 is unused). Sums to 100.
pub const STEP_WEIGHTS: [u32; 8] = [0, 22, 11, 11, 11, 6, 33, 6];

/// Which of the two labels a step message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    /// Coarse step heading ("3. Installing Fabric Modloader").
    Step,
    /// Fine-grained sub-action ("Downloading Sodium").
    Detail,
}

/// Which of the two bars a progress update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarTarget {
    Overall,
    Step,
}

pub trait ProgressReporter: Send + Sync {
    fn step(&self, text: &str, target: LabelTarget);

    /// `step` is the 1-based pipeline step the update belongs to, or 0 when
    /// the update is not tied to a step.
    fn progress(&self, total: u64, progress: u64, target: BarTarget, step: usize);

    fn detail(&self, text: &str) {
        self.step(text, LabelTarget::Detail);
    }

    fn step_progress(&self, total: u64, progress: u64, step: usize) {
        self.progress(total, progress, BarTarget::Step, step);
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressReporter for Silent {
    fn step(&self, _text: &str, _target: LabelTarget) {}

    fn progress(&self, _total: u64, _progress: u64, _target: BarTarget, _step: usize) {}
}

/// Overall completion (0..=100) after `step` has finished `fraction` of its
/// work. Steps outside the weight table clamp to the nearest end.
pub fn blended_progress(step: usize, fraction: f64) -> f64 {
    if step == 0 {
        return 0.0;
    }
    if step >= STEP_WEIGHTS.len() {
        return 100.0;
    }
    let done: u32 = STEP_WEIGHTS[..step].iter().sum();
    done as f64 + STEP_WEIGHTS[step] as f64 * fraction.clamp(0.0, 1.0)
}

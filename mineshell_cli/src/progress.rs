use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mineshell_core::progress::{blended_progress, BarTarget, LabelTarget, ProgressReporter};

/// Terminal reporter: a step heading and an overall bar, with a step bar and
/// a detail line below them.
pub struct BarReporter {
    overall: ProgressBar,
    step: ProgressBar,
    detail: ProgressBar,
    /// Whether step updates feed the overall bar through the modpack step
    /// weights.
    blend: bool,
}

impl BarReporter {
    pub fn for_modpack() -> anyhow::Result<Self> {
        BarReporter::new(true)
    }

    pub fn for_modloader() -> anyhow::Result<Self> {
        BarReporter::new(false)
    }

    fn new(blend: bool) -> anyhow::Result<Self> {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(100));
        overall.set_style(
            ProgressStyle::with_template("{msg:32} [{bar:40.cyan/blue}] {pos:>3}%")?
                .progress_chars("#>-"),
        );
        let step = multi.add(ProgressBar::new(100));
        step.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.green/white}] {pos:>3}%")?
                .progress_chars("#>-"),
        );
        let detail = multi.add(ProgressBar::new_spinner());
        detail.set_style(ProgressStyle::with_template("  {wide_msg:.dim}")?);

        Ok(BarReporter {
            overall,
            step,
            detail,
            blend,
        })
    }

    pub fn finish(&self) {
        self.detail.finish_and_clear();
        self.step.finish_and_clear();
        self.overall.finish();
    }

    pub fn abandon(&self) {
        self.detail.finish_and_clear();
        self.step.finish_and_clear();
        self.overall.abandon();
    }
}

fn percent(total: u64, progress: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (progress as f64 / total as f64).clamp(0.0, 1.0)
}

impl ProgressReporter for BarReporter {
    fn step(&self, text: &str, target: LabelTarget) {
        match target {
            LabelTarget::Step => {
                self.overall.set_message(text.to_string());
                self.step.set_position(0);
                self.detail.set_message("");
            }
            LabelTarget::Detail => self.detail.set_message(text.to_string()),
        }
    }

    fn progress(&self, total: u64, progress: u64, target: BarTarget, step: usize) {
        let fraction = percent(total, progress);
        match target {
            BarTarget::Overall => self.overall.set_position((fraction * 100.0) as u64),
            BarTarget::Step => {
                self.step.set_position((fraction * 100.0) as u64);
                if self.blend && step > 0 {
                    self.overall
                        .set_position(blended_progress(step, fraction) as u64);
                }
            }
        }
    }
}

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use takeout_tidy::ProgressReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Terminal progress: a spinner while the total is unknown (scan), a bar
/// once it is (pair, plan, audit, apply).
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn spinner(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn bar(&self, label: &str, total: usize) {
        let pb = ProgressBar::new(total as u64);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
            label
        );
        pb.set_style(
            ProgressStyle::with_template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━╸─")
                .tick_chars(TICK_CHARS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self, summary: String) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        eprintln!("  {} {}", "✓".green(), summary);
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        self.spinner("Scanning files...");
    }

    fn on_scan_progress(&self, files_found: usize) {
        self.with_bar(|pb| pb.set_message(format!("Scanning... {} files found", files_found)));
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar(format!("Scan complete: {} files in {:.2}s", total_files, duration_secs));
    }

    fn on_pair_start(&self, total_media: usize) {
        self.bar("Pairing", total_media);
    }

    fn on_pair_progress(&self, paired: usize) {
        self.with_bar(|pb| pb.set_position(paired as u64));
    }

    fn on_pair_complete(&self, matched: usize, missing: usize, duration_secs: f64) {
        self.finish_bar(format!(
            "Pairing complete: {} matched, {} missing in {:.2}s",
            matched, missing, duration_secs
        ));
    }

    fn on_plan_start(&self, total_sources: usize) {
        self.bar("Planning", total_sources);
    }

    fn on_plan_progress(&self, mapped: usize) {
        self.with_bar(|pb| pb.set_position(mapped as u64));
    }

    fn on_plan_complete(&self, entries: usize, duration_secs: f64) {
        self.finish_bar(format!("Plan complete: {} moves in {:.2}s", entries, duration_secs));
    }

    fn on_audit_start(&self, files_to_hash: usize) {
        self.bar("Hashing", files_to_hash);
    }

    fn on_audit_progress(&self, files_hashed: usize) {
        self.with_bar(|pb| pb.set_position(files_hashed as u64));
    }

    fn on_audit_complete(&self, violations: usize, duration_secs: f64) {
        self.finish_bar(format!(
            "Audit complete: {} violations in {:.2}s",
            violations, duration_secs
        ));
    }

    fn on_apply_start(&self, total_entries: usize) {
        self.bar("Moving", total_entries);
    }

    fn on_apply_progress(&self, processed: usize) {
        self.with_bar(|pb| pb.set_position(processed as u64));
    }

    fn on_apply_complete(&self, moved: usize, duration_secs: f64) {
        self.finish_bar(format!("Apply complete: {} moved in {:.2}s", moved, duration_secs));
    }
}

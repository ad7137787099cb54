/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_pair_start(&self, _total_media: usize) {}
    fn on_pair_progress(&self, _paired: usize) {}
    fn on_pair_complete(&self, _matched: usize, _missing: usize, _duration_secs: f64) {}
    fn on_plan_start(&self, _total_sources: usize) {}
    fn on_plan_progress(&self, _mapped: usize) {}
    fn on_plan_complete(&self, _entries: usize, _duration_secs: f64) {}
    fn on_audit_start(&self, _files_to_hash: usize) {}
    fn on_audit_progress(&self, _files_hashed: usize) {}
    fn on_audit_complete(&self, _violations: usize, _duration_secs: f64) {}
    fn on_apply_start(&self, _total_entries: usize) {}
    fn on_apply_progress(&self, _processed: usize) {}
    fn on_apply_complete(&self, _moved: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

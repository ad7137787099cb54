use crate::error::Error;
use chrono::{DateTime, Utc};
use indicatif::{HumanCount, HumanDuration};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone)]
pub struct StatsTimer {
    start_time: Instant,
}

impl Default for StatsTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTimer {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn finish(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// End-of-run summary, printed as a table and appended to `summary.csv`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_start_time: SystemTime,
    pub command: String,
    pub scan_duration: Duration,
    pub pair_duration: Duration,
    pub plan_duration: Duration,
    pub audit_duration: Duration,
    pub apply_duration: Duration,
    pub media_files: usize,
    pub sidecar_files: usize,
    pub matched: usize,
    pub missing: usize,
    pub orphan_sidecars: usize,
    pub undated: usize,
    pub planned_moves: usize,
    pub merged_clusters: usize,
    pub duplicates_collapsed: usize,
    pub renamed: usize,
    pub conflicting: usize,
    pub audit_violations: usize,
    pub moved: usize,
    pub move_errors: usize,
}

impl RunSummary {
    pub fn new(command: &str) -> Self {
        Self {
            run_start_time: SystemTime::now(),
            command: command.to_string(),
            scan_duration: Duration::ZERO,
            pair_duration: Duration::ZERO,
            plan_duration: Duration::ZERO,
            audit_duration: Duration::ZERO,
            apply_duration: Duration::ZERO,
            media_files: 0,
            sidecar_files: 0,
            matched: 0,
            missing: 0,
            orphan_sidecars: 0,
            undated: 0,
            planned_moves: 0,
            merged_clusters: 0,
            duplicates_collapsed: 0,
            renamed: 0,
            conflicting: 0,
            audit_violations: 0,
            moved: 0,
            move_errors: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StatValue {
    Duration(Duration),
    Count(usize),
    SystemTime(SystemTime),
    Text(String),
}

#[derive(Debug, Clone, Tabled)]
pub struct StatPrintItem {
    #[tabled(skip)]
    pub name: String,
    #[tabled(rename = "Stat")]
    pub human_name: String,
    #[tabled(rename = "Value")]
    pub human_value: String,
    #[tabled(skip)]
    pub raw_string_value: String,
}

impl StatPrintItem {
    pub fn new(name: &str, value: StatValue) -> Self {
        let human_name = name
            .split('_')
            .map(|s| {
                let mut chars = s.chars();
                match chars.next() {
                    None => String::new(),
                    Some(f) => f.to_uppercase().collect::<String>() + chars.as_str(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ");

        let (human_value, raw_string_value) = match value {
            StatValue::Duration(duration) => (
                HumanDuration(duration).to_string(),
                format!("{:.3}", duration.as_secs_f64()),
            ),
            StatValue::Count(count) => (HumanCount(count as u64).to_string(), count.to_string()),
            StatValue::SystemTime(time) => {
                let formatted = DateTime::<Utc>::from(time)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string();
                (formatted.clone(), formatted)
            }
            StatValue::Text(text) => (text.clone(), text),
        };

        Self {
            name: name.to_string(),
            human_name,
            human_value,
            raw_string_value,
        }
    }
}

impl RunSummary {
    pub fn to_print_items(&self) -> Vec<StatPrintItem> {
        vec![
            StatPrintItem::new("run_start_time", StatValue::SystemTime(self.run_start_time)),
            StatPrintItem::new("command", StatValue::Text(self.command.clone())),
            StatPrintItem::new("scan_duration", StatValue::Duration(self.scan_duration)),
            StatPrintItem::new("pair_duration", StatValue::Duration(self.pair_duration)),
            StatPrintItem::new("plan_duration", StatValue::Duration(self.plan_duration)),
            StatPrintItem::new("audit_duration", StatValue::Duration(self.audit_duration)),
            StatPrintItem::new("apply_duration", StatValue::Duration(self.apply_duration)),
            StatPrintItem::new("media_files", StatValue::Count(self.media_files)),
            StatPrintItem::new("sidecar_files", StatValue::Count(self.sidecar_files)),
            StatPrintItem::new("matched", StatValue::Count(self.matched)),
            StatPrintItem::new("missing", StatValue::Count(self.missing)),
            StatPrintItem::new("orphan_sidecars", StatValue::Count(self.orphan_sidecars)),
            StatPrintItem::new("undated", StatValue::Count(self.undated)),
            StatPrintItem::new("planned_moves", StatValue::Count(self.planned_moves)),
            StatPrintItem::new("merged_clusters", StatValue::Count(self.merged_clusters)),
            StatPrintItem::new("duplicates_collapsed", StatValue::Count(self.duplicates_collapsed)),
            StatPrintItem::new("renamed", StatValue::Count(self.renamed)),
            StatPrintItem::new("conflicting", StatValue::Count(self.conflicting)),
            StatPrintItem::new("audit_violations", StatValue::Count(self.audit_violations)),
            StatPrintItem::new("moved", StatValue::Count(self.moved)),
            StatPrintItem::new("move_errors", StatValue::Count(self.move_errors)),
        ]
    }

    pub fn to_table(&self) -> String {
        Table::new(self.to_print_items()).with(Style::psql()).to_string()
    }

    pub fn print(&self) {
        println!("{}", self.to_table());
    }

    /// Append one row to `path`, writing the header row when the file is new.
    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        let file_exists = fs::metadata(path).is_ok();
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let mut wtr = csv::Writer::from_writer(file);

        let items = self.to_print_items();
        if !file_exists {
            wtr.write_record(items.iter().map(|item| &item.name))?;
        }
        wtr.write_record(items.iter().map(|item| &item.raw_string_value))?;
        wtr.flush()?;
        Ok(())
    }
}

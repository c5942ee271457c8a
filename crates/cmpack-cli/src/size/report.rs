use crate::bundler::Asset;
use crate::size::{gzip_size, is_reported, SizeSnapshot};
use crate::ui::{self, format_size, format_size_delta, pad_visible};
use owo_colors::OwoColorize;
use std::path::{Path, MAIN_SEPARATOR};

/// Growth at or above this many gzip bytes is flagged as large.
pub const FIFTY_KILOBYTES: u64 = 1024 * 50;

/// Change of one asset's gzip size against the previous build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDelta {
    /// Same size, or nothing to compare with
    Unchanged,
    Growth(u64),
    LargeGrowth(u64),
    Shrink(u64),
}

impl SizeDelta {
    /// Signed byte difference; zero for [`SizeDelta::Unchanged`].
    pub fn bytes(self) -> i64 {
        match self {
            SizeDelta::Unchanged => 0,
            SizeDelta::Growth(n) | SizeDelta::LargeGrowth(n) => n as i64,
            SizeDelta::Shrink(n) => -(n as i64),
        }
    }

    /// Colored `+2 KB` / `-300 B` marker, `None` when unchanged.
    pub fn label(self) -> Option<String> {
        let text = format_size_delta(self.bytes());
        match self {
            SizeDelta::Unchanged => None,
            SizeDelta::LargeGrowth(_) => Some(text.red().to_string()),
            SizeDelta::Growth(_) => Some(text.yellow().to_string()),
            SizeDelta::Shrink(_) => Some(text.green().to_string()),
        }
    }
}

/// Classify `current` against `previous`. An asset with no previous size
/// gets no marker.
pub fn classify_delta(current: u64, previous: Option<u64>) -> SizeDelta {
    let Some(previous) = previous else {
        return SizeDelta::Unchanged;
    };
    if current >= previous + FIFTY_KILOBYTES {
        SizeDelta::LargeGrowth(current - previous)
    } else if current > previous {
        SizeDelta::Growth(current - previous)
    } else if current < previous {
        SizeDelta::Shrink(previous - current)
    } else {
        SizeDelta::Unchanged
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// Output-relative asset name as reported by the bundler
    pub asset: String,
    /// Display folder: output path joined with the asset's directory
    pub folder: String,
    pub name: String,
    /// Gzip size in bytes
    pub size: u64,
    pub delta: SizeDelta,
}

impl ReportRow {
    /// `1.95 KB` or `1.95 KB (+1 KB)`.
    pub fn size_label(&self) -> String {
        match self.delta.label() {
            Some(delta) => format!("{} ({})", format_size(self.size), delta),
            None => format_size(self.size),
        }
    }
}

/// Gzip sizes of one build, largest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub rows: Vec<ReportRow>,
}

impl BuildReport {
    /// Measure the reported `assets` of a finished build.
    ///
    /// `output_dir` is where the files are read from; `display_dir` is the
    /// folder shown to the user (usually the configured output path).
    pub fn collect(
        output_dir: &Path,
        display_dir: &str,
        assets: &[Asset],
        previous: &SizeSnapshot,
    ) -> std::io::Result<Self> {
        let mut rows = Vec::new();
        for asset in assets.iter().filter(|a| is_reported(&a.name)) {
            let path = output_dir.join(&asset.name);
            let contents = match std::fs::read(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(asset = %asset.name, "reported asset missing on disk");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let size = gzip_size(&contents)?;

            let rel = Path::new(&asset.name);
            let folder = match rel.parent().filter(|p| !p.as_os_str().is_empty()) {
                Some(parent) => Path::new(display_dir).join(parent).display().to_string(),
                None => display_dir.to_string(),
            };
            let name = rel
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| asset.name.clone());

            rows.push(ReportRow {
                asset: asset.name.clone(),
                folder,
                name,
                size,
                delta: classify_delta(size, previous.get(&asset.name)),
            });
        }

        rows.sort_by(|a, b| b.size.cmp(&a.size));
        Ok(Self { rows })
    }

    /// Width of the widest size label, in visible columns.
    pub fn label_width(&self) -> usize {
        self.rows
            .iter()
            .map(|row| console::measure_text_width(&row.size_label()))
            .max()
            .unwrap_or(0)
    }

    /// Rendered lines as `(padded size label, path)`.
    pub fn lines(&self) -> Vec<(String, String)> {
        let width = self.label_width();
        self.rows
            .iter()
            .map(|row| {
                let label = pad_visible(&row.size_label(), width);
                let location = format!(
                    "{}{}",
                    format!("{}{}", row.folder, MAIN_SEPARATOR).dimmed(),
                    row.name.cyan()
                );
                (label, location)
            })
            .collect()
    }

    pub fn print(&self) {
        for (label, location) in self.lines() {
            ui::pack(&label, &location);
        }
    }

    /// Sizes of this build as the baseline for the next one.
    pub fn to_snapshot(&self) -> SizeSnapshot {
        let mut snapshot = SizeSnapshot::default();
        for row in &self.rows {
            snapshot.insert(&row.asset, row.size);
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

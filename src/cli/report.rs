//! Report rendering for the identify and check commands.

use std::fmt;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use crate::core::Identification;
use crate::db::RuleSetStats;

/// Width of the file name column in brief mode.
const BRIEF_NAME_WIDTH: usize = 32;
/// Indentation of property lines.
const PROPERTY_INDENT: usize = 16;

/// One identified file in a JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub identification: Identification,
}

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub files: Vec<FileReport>,
    pub summary: ScanSummary,
}

/// Counters for a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Files read successfully
    pub read: u64,
    /// Files a rule matched
    pub identified: u64,
    /// Files that could not be read
    pub failed: u64,
}

impl ScanSummary {
    pub fn record(&mut self, identification: &Identification) {
        self.read += 1;
        if identification.identified {
            self.identified += 1;
        }
    }

    /// Identified share of the files read, truncated to a whole percent.
    pub fn percent(&self) -> u64 {
        if self.read == 0 {
            0
        } else {
            self.identified * 100 / self.read
        }
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}/{}", self.identified, self.read)?;
        writeln!(f, "{}% identified.", self.percent())?;
        if self.failed > 0 {
            writeln!(f, "{} could not be read.", self.failed.to_string().red())?;
        }
        Ok(())
    }
}

/// Full listing: `>> path` then one indented `key=value` line per property.
pub fn render_human(path: &Path, identification: &Identification) -> String {
    let mut out = format!("\n{} {}\n", ">>".bold(), path.display());
    for (key, value) in &identification.properties {
        out.push_str(&format!("{:indent$}{}={}\n", "", key, value, indent = PROPERTY_INDENT));
    }
    out
}

/// File name padded to a column, then comment, MIME type and title.
pub fn render_brief(path: &Path, identification: &Identification) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut out = format!("{:<width$}", name, width = BRIEF_NAME_WIDTH);
    if !identification.identified {
        return out;
    }
    out.push_str(&identification.comment);
    if let Some(mime) = identification.mime() {
        out.push_str(", ");
        out.push_str(mime);
    }
    if let Some(title) = identification.title() {
        out.push('\n');
        out.push_str(&format!("{:indent$}{}", "", title, indent = PROPERTY_INDENT));
    }
    out
}

pub fn render_stats(source: &str, stats: &RuleSetStats) -> String {
    format!(
        "{} {}\n  top-level rules:    {}\n  continuation rules: {}\n  extra-info rules:   {}",
        "Magic database".bold(),
        source,
        stats.top_level,
        stats.continuation,
        stats.extra_info
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identified(comment: &str, props: &[(&str, &str)]) -> Identification {
        let mut id = Identification {
            identified: true,
            comment: comment.to_string(),
            ..Default::default()
        };
        id.properties.insert("comment".into(), comment.into());
        for (k, v) in props {
            id.properties.insert(k.to_string(), v.to_string());
        }
        id
    }

    #[test]
    fn test_summary_counts_and_percent() {
        let mut summary = ScanSummary::default();
        assert_eq!(summary.percent(), 0);
        summary.record(&identified("A", &[]));
        summary.record(&Identification::unidentified());
        summary.record(&identified("B", &[]));
        assert_eq!(summary.read, 3);
        assert_eq!(summary.identified, 2);
        assert_eq!(summary.percent(), 66);
    }

    #[test]
    fn test_summary_display() {
        colored::control::set_override(false);
        let summary = ScanSummary {
            read: 4,
            identified: 1,
            failed: 0,
        };
        assert_eq!(summary.to_string(), "1/4\n25% identified.\n");
    }

    #[test]
    fn test_human_rendering() {
        colored::control::set_override(false);
        let id = identified("PNG image data ", &[("mime", "image/png")]);
        let out = render_human(Path::new("/data/a.png"), &id);
        assert_eq!(
            out,
            "\n>> /data/a.png\n                comment=PNG image data \n                mime=image/png\n"
        );
    }

    #[test]
    fn test_human_rendering_unidentified() {
        colored::control::set_override(false);
        let out = render_human(Path::new("x.bin"), &Identification::unidentified());
        assert_eq!(out, "\n>> x.bin\n");
    }

    #[test]
    fn test_brief_rendering() {
        let id = identified("MP3 audio ", &[("mime", "audio/mpeg"), ("title", "Song")]);
        let out = render_brief(Path::new("/music/track.mp3"), &id);
        assert_eq!(
            out,
            format!("{:<32}MP3 audio , audio/mpeg\n{}Song", "track.mp3", " ".repeat(16))
        );
        let out = render_brief(Path::new("blob"), &Identification::unidentified());
        assert_eq!(out, format!("{:<32}", "blob"));
    }
}

//! Static description of the stream, loaded from YAML at startup.
//!
//! Every section is optional so a partially filled file still loads; the
//! stream tools report "no data" for sections that are absent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamInfoError {
    #[error("failed to read stream info file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse stream info file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_build: Option<CurrentBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub upcoming_builds: Vec<UpcomingBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_info: Option<ChannelInfo>,
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentBuild {
    pub set_number: String,
    pub name: String,
    pub progress: String,
    pub started_on: String,
}

/// Stream hours per weekday, as free text ("7pm-10pm EST", "No stream").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thursday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<String>,
}

impl Schedule {
    /// Days in calendar order, skipping days the file leaves out.
    pub fn days(&self) -> Vec<(&'static str, &str)> {
        [
            ("monday", &self.monday),
            ("tuesday", &self.tuesday),
            ("wednesday", &self.wednesday),
            ("thursday", &self.thursday),
            ("friday", &self.friday),
            ("saturday", &self.saturday),
            ("sunday", &self.sunday),
        ]
        .into_iter()
        .filter_map(|(day, hours)| hours.as_deref().map(|h| (day, h)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.days().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingBuild {
    pub set_number: String,
    pub name: String,
    pub planned_start: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl StreamInfo {
    pub fn load(path: &Path) -> Result<Self, StreamInfoError> {
        let content = std::fs::read_to_string(path).map_err(|source| StreamInfoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| StreamInfoError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE: &str = include_str!("../stream_info.example.yaml");

    #[test]
    fn example_file_loads_exactly() {
        let info = StreamInfo::parse(EXAMPLE).unwrap();
        assert_eq!(
            info.current_build,
            Some(CurrentBuild {
                set_number: "42115-1".into(),
                name: "Lamborghini Sián FKP 37".into(),
                progress: "50% complete".into(),
                started_on: "2025-04-01".into(),
            })
        );
        let schedule = info.schedule.as_ref().unwrap();
        assert_eq!(schedule.tuesday.as_deref(), Some("7pm-10pm EST"));
        assert_eq!(schedule.days().len(), 7);
        assert_eq!(schedule.days()[0], ("monday", "No stream"));
        assert_eq!(
            info.upcoming_builds[0],
            UpcomingBuild {
                set_number: "75192-1".into(),
                name: "Millennium Falcon".into(),
                planned_start: "April 15, 2025".into(),
            }
        );
        assert_eq!(info.upcoming_builds.len(), 2);
        let channel = info.channel_info.as_ref().unwrap();
        assert_eq!(channel.rules.len(), 3);
        assert_eq!(channel.rules[0], "Be kind and respectful");
        assert_eq!(info.faq.len(), 3);
        assert_eq!(info.faq[1].question, "Do you take build requests?");
    }

    #[test]
    fn serialized_form_reloads_equal() {
        let info = StreamInfo::parse(EXAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&info).unwrap();
        assert_eq!(StreamInfo::parse(&yaml).unwrap(), info);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let info = StreamInfo::parse("current_build:\n  set_number: '10294-1'\n  name: Titanic\n  progress: just started\n  started_on: '2025-05-01'\n").unwrap();
        assert!(info.current_build.is_some());
        assert!(info.schedule.is_none());
        assert!(info.upcoming_builds.is_empty());
        assert!(info.channel_info.is_none());
        assert!(info.faq.is_empty());

        assert_eq!(StreamInfo::parse("").unwrap(), StreamInfo::default());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        let err = StreamInfo::load(&path).unwrap_err();
        assert!(matches!(err, StreamInfoError::Read { .. }));
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn load_reports_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "current_build: [unclosed").unwrap();
        let err = StreamInfo::load(file.path()).unwrap_err();
        assert!(matches!(err, StreamInfoError::Parse { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();
        let info = StreamInfo::load(file.path()).unwrap();
        assert_eq!(info, StreamInfo::parse(EXAMPLE).unwrap());
    }
}

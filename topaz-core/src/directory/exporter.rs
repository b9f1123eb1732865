use super::Directory;
use crate::{CallOptions, ClientError, facade::ResponseStream};
use serde_json::json;
use std::{fmt, str::FromStr};

/// What an export returns. Each option is a bit mask understood by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOption {
    Unknown,
    DataObjects,
    DataRelations,
    Data,
    Stats,
    StatsObjects,
    StatsRelations,
    StatsData,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown export option '{0}'")]
pub struct ParseExportOptionError(String);

impl ExportOption {
    const ALL: [ExportOption; 8] = [
        ExportOption::Unknown,
        ExportOption::DataObjects,
        ExportOption::DataRelations,
        ExportOption::Data,
        ExportOption::Stats,
        ExportOption::StatsObjects,
        ExportOption::StatsRelations,
        ExportOption::StatsData,
    ];

    pub fn bits(self) -> u32 {
        match self {
            ExportOption::Unknown => 0,
            ExportOption::DataObjects => 8,
            ExportOption::DataRelations => 16,
            ExportOption::Data => 24,
            ExportOption::Stats => 64,
            ExportOption::StatsObjects => 72,
            ExportOption::StatsRelations => 80,
            ExportOption::StatsData => 88,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportOption::Unknown => "UNKNOWN",
            ExportOption::DataObjects => "DATA_OBJECTS",
            ExportOption::DataRelations => "DATA_RELATIONS",
            ExportOption::Data => "DATA",
            ExportOption::Stats => "STATS",
            ExportOption::StatsObjects => "STATS_OBJECTS",
            ExportOption::StatsRelations => "STATS_RELATIONS",
            ExportOption::StatsData => "STATS_DATA",
        }
    }
}

impl fmt::Display for ExportOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportOption {
    type Err = ParseExportOptionError;

    /// Accepts `DATA_OBJECTS` as well as the wire spelling `OPTION_DATA_OBJECTS`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let name = upper.strip_prefix("OPTION_").unwrap_or(&upper);

        Self::ALL
            .into_iter()
            .find(|option| option.name() == name)
            .ok_or_else(|| ParseExportOptionError(s.to_string()))
    }
}

impl Directory {
    /// Starts an export. Records are streamed as the server produces them.
    pub async fn export(
        &self,
        option: ExportOption,
        options: CallOptions,
    ) -> Result<ResponseStream, ClientError> {
        self.exporter
            .server_streaming("Export", json!({"options": option.bits()}), options)
            .await
    }
}

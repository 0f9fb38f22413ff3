//! Request/response types for a single capture run.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which date preset the report is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Lifetime,
    Monthly,
}

impl ReportKind {
    /// Token appended to the `date` query parameter.
    pub fn date_preset(self) -> &'static str {
        match self {
            ReportKind::Lifetime => "maximum",
            ReportKind::Monthly => "last_month",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Lifetime => "lifetime",
            ReportKind::Monthly => "monthly",
        }
    }
}

impl FromStr for ReportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lifetime" => Ok(ReportKind::Lifetime),
            "monthly" => Ok(ReportKind::Monthly),
            other => anyhow::bail!("unknown report kind: {other:?}"),
        }
    }
}

/// Calendar month selecting the Drive evidence folder.
///
/// The month-to-folder mapping is a closed table; keeping it on a closed
/// enum means an unknown month is rejected at parse time instead of
/// silently defaulting somewhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Month {
    Enero,
    Febrero,
    Marzo,
    Abril,
    Mayo,
    Junio,
    Julio,
    Agosto,
    Septiembre,
    Octubre,
    Noviembre,
    Diciembre,
}

impl Month {
    /// Drive folder id the month's evidence uploads go into.
    pub fn folder_id(self) -> &'static str {
        match self {
            Month::Enero => "1ua7qdI42NO9D0mKaYLdHxLTPMcs2Kkdg",
            Month::Febrero => "1FdmlLZh8jmNXS9xZImBfuhRLY7InkB9k",
            Month::Marzo => "1xw25By1iaWAKOcudZ1qkVoIAVZc1vJ-q",
            Month::Abril => "1piq_bFaHbbPBSsxL441V02kKufKxUzZ0",
            Month::Mayo => "1jZZ90lez0chKhKdqC3hQYOjxNvObWSCa",
            Month::Junio => "16J4CVlaOxZJq91Xu2cxmLr0l8IZtVpZz",
            Month::Julio => "1qIGgJ5FNeBBtvrfPDzs3FufU0WdEugFt",
            Month::Agosto => "12loY12bI2vmpAipu3OqizCijU9U5telG",
            Month::Septiembre => "1HyNqKFfkTseibsTvevw3qtOVaKFf91-F",
            Month::Octubre => "1iHt79jSS7NZMdNn7i1AqQkdPoXsczYmp",
            Month::Noviembre => "1mhNuACwOhqzJIezUptrB5FU8KpQp1pZJ",
            Month::Diciembre => "1ww3mwjT8mqEjy2vmkZvqbhfMqeO1bpxp",
        }
    }

    pub const ALL: [Month; 12] = [
        Month::Enero,
        Month::Febrero,
        Month::Marzo,
        Month::Abril,
        Month::Mayo,
        Month::Junio,
        Month::Julio,
        Month::Agosto,
        Month::Septiembre,
        Month::Octubre,
        Month::Noviembre,
        Month::Diciembre,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Month::Enero => "ENERO",
            Month::Febrero => "FEBRERO",
            Month::Marzo => "MARZO",
            Month::Abril => "ABRIL",
            Month::Mayo => "MAYO",
            Month::Junio => "JUNIO",
            Month::Julio => "JULIO",
            Month::Agosto => "AGOSTO",
            Month::Septiembre => "SEPTIEMBRE",
            Month::Octubre => "OCTUBRE",
            Month::Noviembre => "NOVIEMBRE",
            Month::Diciembre => "DICIEMBRE",
        }
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown month: {s:?}"))
    }
}

/// Everything the caller supplies for one capture run. Immutable for the
/// lifetime of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub account_id: String,
    pub business_id: String,
    pub ad_set_id: String,
    pub ad_ids: Vec<String>,
    pub report_kind: ReportKind,
    pub month: Month,
    /// Caller-supplied label; also used as the output file name.
    pub label: String,
}

/// Inbound job: a capture request plus run-level options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureJob {
    #[serde(flatten)]
    pub request: CaptureRequest,

    /// One-time code for the automatic login path. When absent, login (if
    /// needed at all) falls back to the manual human-interaction window.
    #[serde(default)]
    pub second_factor: Option<String>,

    /// Delete the persisted session after the run, success or not.
    #[serde(default)]
    pub invalidate_session: bool,
}

/// Row appended to the evidence ledger. Append-only; there is no update or
/// delete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub account_id: String,
    pub ad_set_id: String,
    pub image_url: String,
    pub label: String,
    pub report_kind: ReportKind,
}

impl LedgerRecord {
    /// Cell values in ledger column order.
    pub fn row(&self) -> Vec<String> {
        vec![
            self.account_id.clone(),
            self.ad_set_id.clone(),
            self.image_url.clone(),
            self.label.clone(),
            self.report_kind.as_str().to_string(),
        ]
    }
}

/// The captured image on disk.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    pub file_path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_month_has_a_folder() {
        for month in Month::ALL {
            assert!(!month.folder_id().is_empty());
            // Round-trips through its own name.
            assert_eq!(month.as_str().parse::<Month>().unwrap(), month);
        }
    }

    #[test]
    fn unknown_month_fails_instead_of_defaulting() {
        assert!("JANUARY".parse::<Month>().is_err());
        assert!("enero".parse::<Month>().is_err());
        assert!("".parse::<Month>().is_err());
    }

    #[test]
    fn report_kind_presets() {
        assert_eq!(ReportKind::Lifetime.date_preset(), "maximum");
        assert_eq!(ReportKind::Monthly.date_preset(), "last_month");
    }

    #[test]
    fn job_deserializes_with_flattened_request() {
        let job: CaptureJob = serde_json::from_str(
            r#"{
                "accountId": "915602685684463",
                "businessId": "411498659732220",
                "adSetId": "120217253965030109",
                "adIds": ["120217501294810109"],
                "reportKind": "lifetime",
                "month": "MARZO",
                "label": "BR_FPM-FB_MARZO_1",
                "secondFactor": "123123"
            }"#,
        )
        .unwrap();

        assert_eq!(job.request.month, Month::Marzo);
        assert_eq!(job.second_factor.as_deref(), Some("123123"));
        assert!(!job.invalidate_session);
    }
}

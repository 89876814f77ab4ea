//! Drift report artifacts: an HTML page plus the JSON document.
//!
//! Reports are write-only artifacts. They are produced for people to read
//! and for downstream tooling to parse; nothing in the workflow reads one
//! back, so `load` yields nothing.

use std::path::Path;

use fxops_core::DriftReport;
use tracing::{debug, warn};

use super::{ArtifactError, Materializer, VisualizationType, Visualizations};

pub const REPORT_HTML: &str = "report.html";
pub const REPORT_JSON: &str = "report.json";

pub struct DriftReportMaterializer;

impl Materializer<DriftReport> for DriftReportMaterializer {
    fn name(&self) -> &str {
        "drift_report"
    }

    fn save(&self, report: &DriftReport, uri: &Path) -> Result<(), ArtifactError> {
        report.save_html(&uri.join(REPORT_HTML))?;
        report.save_json(&uri.join(REPORT_JSON))?;
        debug!(uri = %uri.display(), "drift report materialized");
        Ok(())
    }

    fn load(&self, uri: &Path) -> Result<Option<DriftReport>, ArtifactError> {
        warn!(
            uri = %uri.display(),
            "loading drift reports is not supported; returning nothing"
        );
        Ok(None)
    }

    fn save_visualizations(
        &self,
        report: &DriftReport,
        uri: &Path,
    ) -> Result<Visualizations, ArtifactError> {
        let path = uri.join(REPORT_HTML);
        report.save_html(&path)?;
        Ok(Visualizations::from([(path, VisualizationType::Html)]))
    }
}

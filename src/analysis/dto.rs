use crate::narrative::Narrative;

/// Everything the result page needs for one completed analysis.
#[derive(Debug)]
pub struct AnalysisReport {
    /// "CATEGORY - Status", e.g. "BRAIN - Normal".
    pub label: String,
    pub confidence: f32,
    /// Stored filename of the uploaded scan, served under /uploads/.
    pub image_file: String,
    pub narrative: Narrative,
    /// Stored filename of the generated audio, when synthesis succeeded.
    pub audio_file: Option<String>,
}

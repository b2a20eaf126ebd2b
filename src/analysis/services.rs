use bytes::Bytes;
use tracing::{info, instrument};

use crate::inference::Category;
use crate::speech::timestamp;
use crate::state::AppState;
use crate::storage::sanitize_filename;

use super::dto::AnalysisReport;
use super::repo::HistoryRecord;

/// Run the full per-request pipeline: store the upload, classify, explain,
/// voice, record, and hand back the assembled result view.
///
/// Narrative and audio steps degrade instead of failing; only storage,
/// classification, and the history write can abort the request. The history
/// row is written exactly once, after every degradable step has run.
#[instrument(skip(state, data))]
pub async fn analyze_scan(
    state: &AppState,
    user_id: i64,
    category: Category,
    original_name: &str,
    data: Bytes,
) -> anyhow::Result<AnalysisReport> {
    let image_file = format!("{}_{}", timestamp(), sanitize_filename(original_name));
    state.media.save(&image_file, data.clone()).await?;

    let verdict = state.registry.classify(category, &data)?;
    info!(
        status = %verdict.status,
        confidence = verdict.confidence,
        simulated = verdict.simulated,
        "scan classified"
    );

    let narrative = state.narrator.explain(category, &verdict).await;
    let audio_file = state
        .speech
        .synthesize(narrative.text(), state.media.as_ref())
        .await;

    HistoryRecord::insert(&state.db, user_id, category, &verdict).await?;

    Ok(AnalysisReport {
        label: format!("{} - {}", category.as_str().to_uppercase(), verdict.status),
        confidence: verdict.confidence,
        image_file,
        narrative,
        audio_file,
    })
}

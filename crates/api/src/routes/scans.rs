//! Scan endpoint handlers: live admission and offline reconciliation.

use axum::{extract::State, Json};
use chrono::{DateTime, TimeZone, Utc};
use tracing::info;
use validator::Validate;

use domain::models::scan::{
    LiveScanRequest, ScanResponse, SyncBatchRequest, SyncBatchResponse,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::scan::{LiveScanInput, OfflineScanInput};

/// Resolve one live scan.
///
/// POST /api/v1/scans
///
/// Every resolved scan, accepted or rejected, returns 200 with an outcome
/// payload; HTTP errors are reserved for malformed requests and
/// infrastructure failures.
pub async fn live_scan(
    State(state): State<AppState>,
    Json(request): Json<LiveScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    request.validate().map_err(ApiError::from)?;

    let scanned_at = parse_scan_instant(request.scanned_at)?;

    let response = state
        .scans
        .process_live(LiveScanInput {
            token: request.token,
            gate_event_id: request.event_id,
            scanned_by: request.scanned_by,
            scanned_at,
            entry_quantity: request.entry_quantity,
            entered_names: request.entered_names,
        })
        .await?;

    Ok(Json(response))
}

/// Reconcile a batch of scans queued by an offline scanner.
///
/// POST /api/v1/scans/sync
///
/// Safe to retry: items are idempotent by `local_id`.
pub async fn sync_batch(
    State(state): State<AppState>,
    Json(request): Json<SyncBatchRequest>,
) -> Result<Json<SyncBatchResponse>, ApiError> {
    request.validate().map_err(ApiError::from)?;

    if request.scans.len() > state.config.limits.max_sync_batch_size {
        return Err(ApiError::Validation(format!(
            "batch exceeds the maximum of {} scans",
            state.config.limits.max_sync_batch_size
        )));
    }

    // Validate each queued item before touching any of them.
    let mut items = Vec::with_capacity(request.scans.len());
    for (i, item) in request.scans.into_iter().enumerate() {
        item.validate().map_err(|e| {
            let errors: Vec<String> = e
                .field_errors()
                .iter()
                .flat_map(|(field, errors)| {
                    errors.iter().map(move |err| {
                        format!(
                            "scans[{}].{}: {}",
                            i,
                            field,
                            err.message.as_ref().unwrap_or(&"".into())
                        )
                    })
                })
                .collect();
            ApiError::Validation(errors.join(", "))
        })?;

        let scanned_at = parse_scan_instant(item.scanned_at)?;
        items.push(OfflineScanInput {
            local_id: item.local_id,
            token: item.token,
            gate_event_id: item.event_id,
            scanned_by: item.scanned_by,
            scanned_at,
            entry_quantity: item.entry_quantity,
            entered_names: item.entered_names,
        });
    }

    let batch_size = items.len();
    let response = state.scans.reconcile(items).await;

    info!(
        batch_size,
        synced_count = response.synced_count,
        failed_count = response.failed_count,
        "Offline batch reconciled"
    );

    Ok(Json(response))
}

/// Convert a scanner's millisecond timestamp to a DateTime.
fn parse_scan_instant(millis: i64) -> Result<DateTime<Utc>, ApiError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ApiError::Validation("Invalid scanned_at timestamp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_instant() {
        let at = parse_scan_instant(1_750_000_000_000).unwrap();
        assert_eq!(at.timestamp_millis(), 1_750_000_000_000);
    }

    #[test]
    fn test_parse_scan_instant_rejects_out_of_range() {
        assert!(parse_scan_instant(i64::MAX).is_err());
    }
}

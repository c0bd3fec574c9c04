use crate::types::{
    AnchorConfig, AnchorError, AnchorRecord, AnchorRegistry, AnchorReport, AnchorStatus,
};

/// Register the pair every target is expected to confirm for an epoch.
/// Older expectations fall out of the lag window.
pub fn expect(
    cfg: &AnchorConfig,
    reg: &mut AnchorRegistry,
    epoch: u64,
    nav_value: u128,
    commitment: [u8; 32],
) {
    reg.put_expected(epoch, nav_value, commitment);
    reg.bump_epoch(cfg.max_epoch_lag, epoch);
}

/// Accept one target's report. Last write wins per target. A report that
/// disagrees with everyone else still lands; divergence is surfaced by
/// `verify_consistency` and `anchor_status`, never by refusing the write.
pub fn record(
    cfg: &AnchorConfig,
    reg: &mut AnchorRegistry,
    report: &AnchorReport,
) -> Result<(), AnchorError> {
    if !cfg.known_targets.iter().any(|t| t == &report.anchor_id) {
        return Err(AnchorError::UnknownTarget {
            anchor_id: report.anchor_id.clone(),
        });
    }
    if report.epoch.saturating_add(cfg.max_epoch_lag) < reg.latest_epoch() {
        return Err(AnchorError::EpochTooOld {
            epoch: report.epoch,
            latest: reg.latest_epoch(),
        });
    }

    reg.put_record(AnchorRecord {
        anchor_id: report.anchor_id.clone(),
        epoch: report.epoch,
        last_nav: report.nav_value,
        last_commitment: report.commitment,
        last_sync_timestamp: report.timestamp,
    });
    reg.bump_epoch(cfg.max_epoch_lag, report.epoch);
    Ok(())
}

/// True iff no two targets that reported this epoch disagree on the
/// (nav, commitment) pair. Silent targets are excluded, so an epoch with
/// zero or one reports is vacuously consistent.
pub fn verify_consistency(reg: &AnchorRegistry, epoch: u64) -> bool {
    let mut reference: Option<(u128, [u8; 32])> = None;
    for rec in reg.records().filter(|r| r.epoch == epoch) {
        let pair = (rec.last_nav, rec.last_commitment);
        match reference {
            None => reference = Some(pair),
            Some(want) if want != pair => return false,
            Some(_) => {}
        }
    }
    true
}

/// Per-target booleans for one epoch. A target is consistent when it
/// reported the epoch and its pair matches the reference: the registered
/// expectation when one exists, otherwise the first reporter in id order.
pub fn anchor_status(cfg: &AnchorConfig, reg: &AnchorRegistry, epoch: u64) -> Vec<AnchorStatus> {
    let reference = reg.expected_for(epoch).or_else(|| {
        reg.records()
            .find(|r| r.epoch == epoch)
            .map(|r| (r.last_nav, r.last_commitment))
    });

    cfg.known_targets
        .iter()
        .map(|id| {
            let rec = reg.record_of(id).filter(|r| r.epoch == epoch);
            let consistent = match (rec, reference) {
                (Some(r), Some(want)) => (r.last_nav, r.last_commitment) == want,
                _ => false,
            };
            AnchorStatus {
                anchor_id: id.clone(),
                reported: rec.is_some(),
                consistent,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------

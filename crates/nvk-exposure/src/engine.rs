use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    ExposureConfig, ExposureEdge, ExposureError, ExposureGraph, ExposureUpdate, ExposureViolation,
    ViolationType, WEIGHT_SCALE_BPS,
};

/// Validate and apply one slot write.
///
/// In strict mode a self-loop never reaches the graph; everything else is
/// recorded as given and judged later by `detect`. A rejected update leaves
/// the graph untouched.
pub fn update_edge(
    cfg: &ExposureConfig,
    graph: &mut ExposureGraph,
    update: &ExposureUpdate,
) -> Result<(), ExposureError> {
    if update.from_fund.is_empty() || update.to_fund.is_empty() {
        return Err(ExposureError::EmptyFundId);
    }
    if update.slot_index >= cfg.max_slots {
        return Err(ExposureError::SlotOutOfRange {
            slot: update.slot_index,
            max_slots: cfg.max_slots,
        });
    }
    if update.weight_bps > WEIGHT_SCALE_BPS {
        return Err(ExposureError::WeightAboveScale {
            weight_bps: update.weight_bps,
        });
    }
    if cfg.strict_self_loops && update.from_fund == update.to_fund {
        return Err(ExposureError::SelfLoopRejected {
            fund_id: update.from_fund.clone(),
        });
    }

    graph.put(
        cfg.max_slots,
        update.slot_index,
        ExposureEdge {
            from_fund: update.from_fund.clone(),
            to_fund: update.to_fund.clone(),
            exposure_type: update.exposure_type,
            weight_bps: update.weight_bps,
        },
    );
    Ok(())
}

/// Scan the whole graph. The three rules are independent filters, so one
/// edge can surface more than once:
///
/// 1) Self-reference: `to == from`, flagged at any weight including zero.
/// 2) Concentration: weight above `concentration_limit_bps`, cycle
///    membership irrelevant.
/// 3) Circular exposure: cycles found by depth-first walk; a cycle edge is
///    only reported when its weight relative to the origin's total book
///    exceeds `max_exposure_pct_bps`.
///
/// Output order is fund-then-slot for the per-edge rules, then the cycle
/// findings, so repeated scans of the same graph compare equal.
pub fn detect(
    cfg: &ExposureConfig,
    graph: &ExposureGraph,
    max_exposure_pct_bps: u64,
    now: i64,
) -> Vec<ExposureViolation> {
    let mut violations = Vec::new();

    for fund in graph.fund_ids() {
        for (_, edge) in graph.edges_of(fund) {
            if edge.to_fund == edge.from_fund {
                violations.push(ExposureViolation {
                    fund_a: edge.from_fund.clone(),
                    fund_b: edge.to_fund.clone(),
                    exposure_pct_bps: edge.weight_bps,
                    violation_type: ViolationType::SelfReference,
                    timestamp: now,
                });
            }
            if edge.weight_bps > cfg.concentration_limit_bps {
                violations.push(ExposureViolation {
                    fund_a: edge.from_fund.clone(),
                    fund_b: edge.to_fund.clone(),
                    exposure_pct_bps: edge.weight_bps,
                    violation_type: ViolationType::Concentration,
                    timestamp: now,
                });
            }
        }
    }

    for (fund, slot) in cycle_edges(graph) {
        let edge = match graph.edge(&fund, slot) {
            Some(e) => e,
            None => continue,
        };
        let pct = relative_pct_bps(edge.weight_bps, graph.total_weight_bps(&fund));
        if pct > max_exposure_pct_bps {
            violations.push(ExposureViolation {
                fund_a: edge.from_fund.clone(),
                fund_b: edge.to_fund.clone(),
                exposure_pct_bps: pct,
                violation_type: ViolationType::CircularExposure,
                timestamp: now,
            });
        }
    }

    violations
}

/// Edge weight as a share of the origin's total book, in bps.
fn relative_pct_bps(weight_bps: u64, total_bps: u64) -> u64 {
    if total_bps == 0 {
        return 0;
    }
    // weight <= 10_000 so the product stays far inside u64.
    weight_bps * WEIGHT_SCALE_BPS / total_bps
}

const WHITE: u8 = 0;
const GREY: u8 = 1;
const BLACK: u8 = 2;

/// Every edge that sits on some cycle, keyed (fund, slot). Classic
/// three-color walk: a grey target closes a cycle and the path segment
/// from that target onward, plus the closing edge, is the cycle. Each
/// node is expanded once, so the scan is linear in edges.
fn cycle_edges(graph: &ExposureGraph) -> BTreeSet<(String, usize)> {
    let mut color: BTreeMap<String, u8> = BTreeMap::new();
    let mut path: Vec<(String, usize, String)> = Vec::new();
    let mut out = BTreeSet::new();

    let roots: Vec<String> = graph.fund_ids().map(str::to_string).collect();
    for root in roots {
        if color.get(root.as_str()).copied().unwrap_or(WHITE) == WHITE {
            walk(graph, &root, &mut color, &mut path, &mut out);
        }
    }
    out
}

fn walk(
    graph: &ExposureGraph,
    node: &str,
    color: &mut BTreeMap<String, u8>,
    path: &mut Vec<(String, usize, String)>,
    out: &mut BTreeSet<(String, usize)>,
) {
    color.insert(node.to_string(), GREY);

    for (slot, edge) in graph.edges_of(node) {
        // Self-loops are rule 1's finding, not a cycle.
        if edge.to_fund == node {
            continue;
        }
        match color.get(edge.to_fund.as_str()).copied().unwrap_or(WHITE) {
            GREY => {
                if let Some(start) = path.iter().position(|(from, _, _)| *from == edge.to_fund) {
                    for (from, s, _) in &path[start..] {
                        out.insert((from.clone(), *s));
                    }
                }
                out.insert((node.to_string(), slot));
            }
            BLACK => {}
            _ => {
                path.push((node.to_string(), slot, edge.to_fund.clone()));
                walk(graph, &edge.to_fund, color, path, out);
                path.pop();
            }
        }
    }

    color.insert(node.to_string(), BLACK);
}

// ---------------------------------------------------------------------------

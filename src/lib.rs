//! # VCT Leaderboards
//!
//! Deterministic kill/death leaderboards computed from Valorant Champions
//! Tour combat logs.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (kill events, map results, tables)
//! - **views**: Derived view builder producing the canonical relations
//! - **calculate**: Aggregation and partition ranking
//! - **leaderboards**: Leaderboard catalog and run orchestration
//! - **source**: Row sources feeding raw relations (CSV, JSONL, memory)
//! - **storage**: Result sinks (terminal, CSV, JSONL, XLSX, charts, Parquet)
//! - **api**: REST API serving computed leaderboards
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod leaderboards;
pub mod models;
pub mod source;
pub mod storage;
pub mod views;

pub use models::*;

/// Parse a clock-style map duration (`H:MM:SS` or `MM:SS`) into seconds.
///
/// Two colons read as hours:minutes:seconds, one colon as minutes:seconds.
/// Any other shape, a non-numeric part, a seconds (or, with hours,
/// minutes) part of 60 or more, or a total past `u64::MAX` yields `None`.
pub fn parse_clock_duration(s: &str) -> Option<u64> {
    let parts: Vec<&str> = s.trim().split(':').collect();

    let nums = parts
        .iter()
        .map(|p| {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                p.parse::<u64>().ok()
            }
        })
        .collect::<Option<Vec<u64>>>()?;

    match nums.as_slice() {
        [h, m, s] if *m < 60 && *s < 60 => h.checked_mul(3600)?.checked_add(m * 60 + s),
        [m, s] if *s < 60 => m.checked_mul(60)?.checked_add(*s),
        _ => None,
    }
}

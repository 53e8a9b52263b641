//! Result merger: concatenates every per-asset checkpoint into one dataset.
//!
//! Partial checkpoints (interrupted or failed assets) are included as they are;
//! assets without a checkpoint are skipped, and so are unreadable ones, which
//! are left on disk. Output is written atomically.

use anyhow::Result;
use std::path::Path;

use crate::checkpoint::{self, CheckpointStore};
use crate::source::Record;

/// What went into a merged dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub assets: usize,
    pub records: usize,
}

/// Merge the checkpoints of `assets` (or of every asset with a checkpoint when
/// `assets` is None) into `out`, tagging each record with its asset id.
pub fn merge_checkpoints<R: Record>(
    store: &CheckpointStore,
    assets: Option<&[String]>,
    out: &Path,
) -> Result<MergeStats> {
    let mut names: Vec<String> = match assets {
        Some(list) => list.to_vec(),
        None => store.assets()?,
    };
    names.sort();
    names.dedup();

    let mut rows: Vec<R::Tagged> = Vec::new();
    let mut stats = MergeStats::default();
    for asset in &names {
        let Some(cp) = store.read::<R>(asset)? else {
            continue;
        };
        stats.assets += 1;
        stats.records += cp.records.len();
        rows.extend(cp.records.into_iter().map(|r| r.tagged(asset)));
    }

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    checkpoint::write_atomic(out, &rows)?;
    tracing::info!(
        out = %out.display(),
        assets = stats.assets,
        records = stats.records,
        "merged dataset written"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Candle, CandleRow};
    use chrono::{Duration, TimeZone, Utc};

    fn candles(n: usize) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|h| Candle {
                date: t0 + Duration::hours(h as i64),
                price: 1.0,
                volume: 2.0,
                trade_count: 3,
            })
            .collect()
    }

    fn read_rows(path: &Path) -> Vec<CandleRow> {
        csv::Reader::from_path(path)
            .unwrap()
            .deserialize()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn done_and_partial_are_merged_missing_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("raw/tmp/ohlcv"));
        store.flush("X", &candles(10)).unwrap();
        store.flush("Y", &candles(3)).unwrap();
        let out = dir.path().join("raw/ohlcv.csv");

        let assets = vec!["Z".to_string(), "Y".to_string(), "X".to_string()];
        let stats = merge_checkpoints::<Candle>(&store, Some(&assets), &out).unwrap();
        assert_eq!(stats, MergeStats { assets: 2, records: 13 });

        let rows = read_rows(&out);
        assert_eq!(rows.len(), 13);
        assert_eq!(rows.iter().filter(|r| r.asset == "X").count(), 10);
        assert_eq!(rows.iter().filter(|r| r.asset == "Y").count(), 3);
        assert_eq!(rows[0].asset, "X");
    }

    #[test]
    fn discovers_assets_when_not_given() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("tmp"));
        store.flush("B", &candles(1)).unwrap();
        store.flush("A", &candles(2)).unwrap();
        let out = dir.path().join("merged.csv");

        let stats = merge_checkpoints::<Candle>(&store, None, &out).unwrap();
        assert_eq!(stats.records, 3);
        let assets: Vec<String> = read_rows(&out).into_iter().map(|r| r.asset).collect();
        assert_eq!(assets, vec!["A", "A", "B"]);
    }

    #[test]
    fn corrupt_checkpoint_is_skipped_not_moved() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("tmp"));
        store.flush("A", &candles(2)).unwrap();
        std::fs::write(store.path("B"), "date,price\nyesterday,?\n").unwrap();
        let out = dir.path().join("merged.csv");

        let stats = merge_checkpoints::<Candle>(&store, None, &out).unwrap();
        assert_eq!(stats, MergeStats { assets: 1, records: 2 });
        assert!(store.path("B").exists());
        assert_eq!(store.assets().unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn nothing_to_merge_writes_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("none"));
        let out = dir.path().join("out.csv");
        let stats = merge_checkpoints::<Candle>(&store, None, &out).unwrap();
        assert_eq!(stats, MergeStats::default());
        assert!(out.exists());
    }
}

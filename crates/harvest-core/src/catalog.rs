//! Asset catalog reader.
//!
//! The catalog is a CSV produced by the external selection step; one column
//! holds the asset id. Duplicate ids are dropped so each asset gets exactly one
//! task (and therefore at most one worker).

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::error::HarvestError;

/// Read asset ids from `column` of the catalog at `path`, in file order.
pub fn load_assets(path: &Path, column: &str) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(HarvestError::CatalogMissing(path.to_path_buf()).into());
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open catalog: {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("read catalog header: {}", path.display()))?
        .clone();
    let idx = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| HarvestError::CatalogColumnMissing {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut assets = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("read catalog row: {}", path.display()))?;
        let Some(value) = row.get(idx).map(str::trim) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.to_string()) {
            assets.push(value.to_string());
        }
    }
    tracing::debug!(path = %path.display(), assets = assets.len(), "catalog loaded");
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_column_in_order_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cryptomap.csv");
        fs::write(
            &path,
            ",symbol,base_asset,cmc_rank\n0,BTCUSDT,BTC,1\n1,ETHUSDT,ETH,2\n2,BTCUSDT,BTC,1\n3,,,4\n",
        )
        .unwrap();
        let assets = load_assets(&path, "base_asset").unwrap();
        assert_eq!(assets, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn missing_file_is_fatal_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_assets(&dir.path().join("nope.csv"), "base_asset").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarvestError>(),
            Some(HarvestError::CatalogMissing(_))
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.csv");
        fs::write(&path, "symbol\nBTCUSDT\n").unwrap();
        let err = load_assets(&path, "base_asset").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarvestError>(),
            Some(HarvestError::CatalogColumnMissing { .. })
        ));
    }
}

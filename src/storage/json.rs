use crate::error::Error;
use crate::model::{InventoryRecord, Snapshot};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a persisted inventory. Both record shapes are accepted and a leading
/// UTF-8 BOM is skipped. Anything unparseable, or a path listed twice, is
/// `PersistedStateCorrupt`.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, Error> {
    let bytes = fs::read(path)?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let records: Vec<InventoryRecord> =
        serde_json::from_slice(body).map_err(|err| Error::PersistedStateCorrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let snapshot = Snapshot::new(records).map_err(|err| Error::PersistedStateCorrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    debug!("Loaded {} records from '{}'", snapshot.len(), path.display());
    Ok(snapshot)
}

/// Like `load_snapshot`, but a missing file is `None`.
pub fn load_baseline(path: &Path) -> Result<Option<Snapshot>, Error> {
    match load_snapshot(path) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Write pretty-printed JSON, UTF-8 with a BOM, non-ASCII left as is.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(snapshot)?;
    let mut out = Vec::with_capacity(UTF8_BOM.len() + text.len());
    out.extend_from_slice(UTF8_BOM);
    out.extend_from_slice(text.as_bytes());
    fs::write(path, out)?;
    info!("Wrote {} records to '{}'", snapshot.len(), path.display());
    Ok(())
}

//! Data directory scaffolding: visualization assets plus a seed `data.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::history::HistoryRecord;
use crate::error::{QuickieError, reason};
use crate::io::history_store::{HISTORY_FILE_NAME, persist_history};

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const QUICKIE_JS: &str = include_str!("../../assets/quickie.js");
const QUICKIE_CSS: &str = include_str!("../../assets/quickie.css");

/// Static files refreshed on every run.
const STATIC_ASSETS: [(&str, &str); 3] = [
    ("index.html", INDEX_HTML),
    ("quickie.js", QUICKIE_JS),
    ("quickie.css", QUICKIE_CSS),
];

/// Create `data_dir`, refresh the static assets, and seed an empty
/// `data.json` if none exists. Returns the history file path.
///
/// An existing `data.json` is never overwritten.
pub fn prepare_data_dir(data_dir: &Path) -> Result<PathBuf> {
    install(data_dir).map_err(|err| {
        QuickieError::DataDirectory {
            path: data_dir.to_path_buf(),
            reason: reason(&err),
        }
        .into()
    })
}

fn install(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir).with_context(|| format!("create {}", data_dir.display()))?;
    for (name, contents) in STATIC_ASSETS {
        let path = data_dir.join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }

    let history_path = data_dir.join(HISTORY_FILE_NAME);
    if !history_path.exists() {
        debug!(path = %history_path.display(), "seeding empty history");
        persist_history(&history_path, &HistoryRecord::default())?;
    }
    Ok(history_path)
}

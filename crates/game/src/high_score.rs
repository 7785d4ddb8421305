//! Best distance ever driven, kept in a small RON file.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key the score is stored under.
pub const HIGH_SCORE_KEY: &str = "basicRoadsHighScore";

/// Single persisted integer: whole meters of the longest run.
#[derive(Debug)]
pub struct HighScoreStore {
    path: PathBuf,
    best: u64,
}

impl HighScoreStore {
    /// Open the store at `path`. A missing or unreadable file starts from zero.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let best = match read_score(&path) {
            Ok(best) => best,
            Err(e) => {
                log::warn!("Could not load high score from {:?}: {:#}", path, e);
                0
            }
        };
        Self { path, best }
    }

    pub fn best(&self) -> u64 {
        self.best
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a finished run. Writes to disk only when the run beats the best;
    /// returns whether it did.
    pub fn submit(&mut self, distance_m: f32) -> bool {
        if !distance_m.is_finite() || distance_m <= 0.0 {
            return false;
        }
        let score = distance_m.floor() as u64;
        if score <= self.best {
            return false;
        }
        self.best = score;
        log::info!("New best distance: {} m", score);
        if let Err(e) = self.save() {
            log::warn!("Could not save high score to {:?}: {:#}", self.path, e);
        }
        true
    }

    fn save(&self) -> Result<()> {
        let mut scores = BTreeMap::new();
        scores.insert(HIGH_SCORE_KEY.to_string(), self.best);
        let data = ron::ser::to_string_pretty(&scores, ron::ser::PrettyConfig::default())
            .context("serializing high score")?;
        std::fs::write(&self.path, data).with_context(|| format!("writing {:?}", self.path))
    }
}

fn read_score(path: &Path) -> Result<u64> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("reading {:?}", path)),
    };
    let scores: BTreeMap<String, u64> = ron::from_str(&data).context("parsing high score file")?;
    Ok(scores.get(HIGH_SCORE_KEY).copied().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("terrain_drive_{}_{}.ron", name, std::process::id()))
    }

    #[test]
    fn missing_file_starts_at_zero() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let store = HighScoreStore::open(path);
        assert_eq!(store.best(), 0);
    }

    #[test]
    fn only_better_runs_are_kept() {
        let path = temp_path("better");
        let _ = std::fs::remove_file(&path);
        let mut store = HighScoreStore::open(&path);

        assert!(store.submit(120.7));
        assert_eq!(store.best(), 120);
        assert!(!store.submit(80.0));
        assert!(!store.submit(120.9));
        assert_eq!(store.best(), 120);

        let reopened = HighScoreStore::open(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(reopened.best(), 120);
    }

    #[test]
    fn file_is_keyed() {
        let path = temp_path("keyed");
        let _ = std::fs::remove_file(&path);
        let mut store = HighScoreStore::open(&path);
        store.submit(42.0);
        let data = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(data.contains(HIGH_SCORE_KEY));
    }

    #[test]
    fn corrupt_file_reads_as_zero() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{{{").unwrap();
        let store = HighScoreStore::open(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(store.best(), 0);
    }
}

//! JSON persistence for learned data and adversary profiles.
//!
//! Everything lives under one data directory:
//!
//! ```text
//! <data_dir>/
//!   ai_learning/
//!     q_table.json                 live learning data
//!     training_episode_{n}.json    training checkpoints
//!     pretrained_model.json        result of offline training
//!   player_profiles/
//!     {id}_history.json            one file per adversary
//! ```
//!
//! Loads never fail: a missing file yields the default value, a malformed
//! one yields the default value and a warning. Saves write a temporary file
//! next to the target and rename it into place, so a crash mid-write leaves
//! the previous file intact.

use std::fs;
use std::path::{Path, PathBuf};

use evasion_agents::{AdversaryProfile, LearningAgent, LearningData};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

const LEARNING_DIR: &str = "ai_learning";
const PROFILE_DIR: &str = "player_profiles";
const Q_TABLE_FILE: &str = "q_table.json";
const PRETRAINED_FILE: &str = "pretrained_model.json";

/// Errors that can occur when writing persisted data.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be encoded or decoded.
    #[error("JSON error at {}: {source}", path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// File-backed store rooted at a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningStore {
    root: PathBuf,
}

impl LearningStore {
    /// A store rooted at `root`. Nothing is created until the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // -------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------

    /// Live learning data.
    pub fn q_table_path(&self) -> PathBuf {
        self.root.join(LEARNING_DIR).join(Q_TABLE_FILE)
    }

    /// Checkpoint written after training episode `episode`.
    pub fn checkpoint_path(&self, episode: u32) -> PathBuf {
        self.root
            .join(LEARNING_DIR)
            .join(format!("training_episode_{episode}.json"))
    }

    /// Final result of offline training.
    pub fn pretrained_path(&self) -> PathBuf {
        self.root.join(LEARNING_DIR).join(PRETRAINED_FILE)
    }

    /// History of one adversary.
    pub fn profile_path(&self, adversary_id: &str) -> PathBuf {
        self.root
            .join(PROFILE_DIR)
            .join(format!("{}_history.json", sanitize_id(adversary_id)))
    }

    // -------------------------------------------------------------------
    // Learning data
    // -------------------------------------------------------------------

    /// Load the live learning data, or defaults.
    pub fn load_learning(&self) -> LearningData {
        load_or_default(&self.q_table_path())
    }

    /// Load the pretrained model, or defaults.
    pub fn load_pretrained(&self) -> LearningData {
        load_or_default(&self.pretrained_path())
    }

    /// Load the live learning data if present, otherwise the pretrained
    /// model, otherwise defaults.
    pub fn load_best(&self) -> LearningData {
        if self.q_table_path().exists() {
            self.load_learning()
        } else {
            self.load_pretrained()
        }
    }

    /// Save the agent's learning data, pruning first with the configured
    /// on-save chance.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be written. The agent's
    /// in-memory state is unaffected.
    pub fn save_learning(&self, agent: &mut LearningAgent) -> Result<PathBuf, PersistError> {
        agent.maybe_prune_on_save();
        let path = self.q_table_path();
        write_json(&path, &agent.snapshot())?;
        Ok(path)
    }

    /// Save a training checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be written.
    pub fn save_checkpoint(&self, agent: &LearningAgent, episode: u32) -> Result<PathBuf, PersistError> {
        let path = self.checkpoint_path(episode);
        write_json(&path, &agent.snapshot())?;
        Ok(path)
    }

    /// Save the final training result.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be written.
    pub fn save_pretrained(&self, agent: &LearningAgent) -> Result<PathBuf, PersistError> {
        let path = self.pretrained_path();
        write_json(&path, &agent.snapshot())?;
        Ok(path)
    }

    // -------------------------------------------------------------------
    // Adversary profiles
    // -------------------------------------------------------------------

    /// Load an adversary's profile, or a fresh one.
    pub fn load_profile(&self, adversary_id: &str) -> AdversaryProfile {
        let path = self.profile_path(adversary_id);
        read_json(&path).unwrap_or_else(|| AdversaryProfile::new(adversary_id))
    }

    /// Save an adversary's profile.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be written.
    pub fn save_profile(&self, profile: &AdversaryProfile) -> Result<PathBuf, PersistError> {
        let path = self.profile_path(&profile.adversary_id);
        write_json(&path, profile)?;
        Ok(path)
    }
}

/// Serialize `value` to `path` through a temporary sibling file.
///
/// # Errors
///
/// Returns [`PersistError::Json`] if encoding fails and
/// [`PersistError::Io`] if the directory, temporary file or rename fails.
pub fn write_json<T>(path: &Path, value: &T) -> Result<(), PersistError>
where
    T: Serialize + ?Sized,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| PersistError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let body = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).map_err(|source| PersistError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Saved");
    Ok(())
}

/// Read `path`, returning `None` when it is missing or malformed.
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved data, starting fresh");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read saved data, using defaults");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => {
            info!(path = %path.display(), "Loaded saved data");
            Some(value)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed saved data, using defaults");
            None
        }
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    read_json(path).unwrap_or_default()
}

/// Make an adversary id safe to use as a file name.
///
/// Clean ids are used as-is. Any id that had to be altered gets a hash of
/// the raw id appended, so `a/b` and `a_b` land in different files.
fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !cleaned.is_empty() && cleaned == id {
        return cleaned;
    }
    let base = if cleaned.is_empty() { "anonymous" } else { cleaned.as_str() };
    format!("{base}-{:016x}", fnv1a64(id))
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;
    s.bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_agents::LearningConfig;
    use evasion_types::{Action, Location, StateKey};

    use super::*;

    fn agent() -> LearningAgent {
        LearningAgent::new(LearningConfig::default(), 5).unwrap()
    }

    #[test]
    fn missing_file_yields_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let data = store.load_learning();
        assert!(data.q_table.is_empty());
        assert!(data.successful_routes.is_empty());
    }

    #[test]
    fn malformed_file_yields_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let path = store.q_table_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{ not json").unwrap();
        assert!(store.load_learning().q_table.is_empty());
    }

    #[test]
    fn learning_round_trip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let mut agent = agent();
        let state = StateKey::undetected(Location::named("city_center"));
        let action = Action::move_to(Location::named("train_station"));
        agent.q_table_mut().set(&state, action.clone(), 2.5);
        agent.set_exploration_rate(0.3);

        let path = store.save_checkpoint(&agent, 50).unwrap();
        assert!(path.ends_with("ai_learning/training_episode_50.json"));

        let raw = fs::read_to_string(&path).unwrap();
        let data: LearningData = serde_json::from_str(&raw).unwrap();
        assert!((data.q_table.value(&state, &action) - 2.5).abs() < 1e-12);
        assert!((data.exploration_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn save_learning_writes_live_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let mut agent = agent();
        let state = StateKey::undetected(Location::named("park"));
        agent
            .q_table_mut()
            .set(&state, Action::move_to(Location::named("highway_entrance")), 4.0);

        store.save_learning(&mut agent).unwrap();
        assert!(!store.q_table_path().with_extension("json.tmp").exists());
        let loaded = store.load_learning();
        assert_eq!(loaded.q_table.len(), 1);
        assert_eq!(store.load_best().q_table.len(), 1);
    }

    #[test]
    fn load_best_falls_back_to_pretrained() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let mut agent = agent();
        let state = StateKey::undetected(Location::named("port"));
        agent.q_table_mut().set(&state, Action::CreateDecoy, 1.5);
        store.save_pretrained(&agent).unwrap();

        let data = store.load_best();
        assert!((data.q_table.value(&state, &Action::CreateDecoy) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn profiles_round_trip_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());

        let fresh = store.load_profile("alice");
        assert_eq!(fresh.adversary_id, "alice");
        assert_eq!(fresh.games_played, 0);

        let mut profile = AdversaryProfile::new("alice");
        profile.record_detection_success();
        profile.record_camera_placement(Location::named("port"));
        store.save_profile(&profile).unwrap();

        let loaded = store.load_profile("alice");
        assert_eq!(loaded.detection_success, 1);
        assert_eq!(loaded.top_placements(1).first().map(|(_, n)| *n), Some(1));
    }

    #[test]
    fn unwritable_root_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let store = LearningStore::new(&blocker);
        let agent = agent();
        assert!(matches!(
            store.save_pretrained(&agent),
            Err(PersistError::Io { .. })
        ));
    }

    #[test]
    fn ids_are_sanitized() {
        assert!(sanitize_id("../etc/passwd").starts_with("___etc_passwd-"));
        assert!(!sanitize_id("../etc/passwd").contains('/'));
        assert!(sanitize_id("  ").starts_with("anonymous-"));
        assert_ne!(sanitize_id("  "), sanitize_id(""));
        assert_eq!(sanitize_id("player-1_b"), "player-1_b");
    }

    #[test]
    fn altered_ids_do_not_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        assert_ne!(store.profile_path("a/b"), store.profile_path("a_b"));
        assert_ne!(store.profile_path("a b"), store.profile_path("a/b"));
        assert_eq!(sanitize_id("a/b"), sanitize_id("a/b"));

        let mut slashed = AdversaryProfile::new("a/b");
        slashed.record_detection_success();
        store.save_profile(&slashed).unwrap();
        store.save_profile(&AdversaryProfile::new("a_b")).unwrap();

        assert_eq!(store.load_profile("a/b").detection_success, 1);
        assert_eq!(store.load_profile("a_b").detection_success, 0);
    }
}

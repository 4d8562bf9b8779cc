//! Result sinks for completed candidates.

use anyhow::Context;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sl_types::Candidate;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// What gets saved for a completed candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate: Candidate,
    pub artifact: Option<serde_json::Value>,
}

/// Saves completed candidates. A failing save never fails the candidate.
pub trait ResultPersister: Send + Sync {
    fn save(&self, candidate_id: usize, result: &CandidateResult) -> anyhow::Result<()>;
}

/// Keeps results in memory, keyed by candidate id.
#[derive(Debug, Default)]
pub struct InMemoryPersister {
    results: DashMap<usize, CandidateResult>,
}

impl InMemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, candidate_id: usize) -> Option<CandidateResult> {
        self.results.get(&candidate_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// All saved results ordered by candidate id.
    pub fn results(&self) -> Vec<CandidateResult> {
        let mut out: Vec<_> = self.results.iter().map(|r| r.value().clone()).collect();
        out.sort_by_key(|r| r.candidate.id);
        out
    }
}

impl ResultPersister for InMemoryPersister {
    fn save(&self, candidate_id: usize, result: &CandidateResult) -> anyhow::Result<()> {
        self.results.insert(candidate_id, result.clone());
        Ok(())
    }
}

/// Writes one `candidate_<id>.json` file per result.
#[derive(Debug, Clone)]
pub struct JsonFilePersister {
    dir: PathBuf,
}

impl JsonFilePersister {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating result directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, candidate_id: usize) -> PathBuf {
        self.dir.join(format!("candidate_{candidate_id}.json"))
    }

    pub fn load(&self, candidate_id: usize) -> anyhow::Result<CandidateResult> {
        let path = self.path_for(candidate_id);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

impl ResultPersister for JsonFilePersister {
    fn save(&self, candidate_id: usize, result: &CandidateResult) -> anyhow::Result<()> {
        let path = self.path_for(candidate_id);
        let file = fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), result)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

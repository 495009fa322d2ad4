use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardselError};
use crate::selection::sample::SampleParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data root that relative paths resolve against.
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub taily: TailyConfig,
    #[serde(default)]
    pub sample: SampleConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::with_root(root);

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SHARDSEL_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(ShardselError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Defaults rooted at `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("shardsel/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| ShardselError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw).map_err(|err| {
            ShardselError::Config(format!("parse config {}: {err}", path.display()))
        })?;
        Ok(Some(patch))
    }

    /// Apply a TOML fragment on top of the current values.
    pub fn merge_toml(&mut self, raw: &str) -> Result<()> {
        let patch = toml::from_str(raw)
            .map_err(|err| ShardselError::Config(format!("parse config: {err}")))?;
        self.merge_patch(patch);
        self.validate()
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.paths {
            self.paths.merge(patch);
        }
        if let Some(patch) = patch.taily {
            self.taily.merge(patch);
        }
        if let Some(patch) = patch.sample {
            self.sample.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = env("SHARDSEL_INDEX_DIR") {
            self.paths.index_dir = PathBuf::from(value);
        }
        if let Some(value) = env("SHARDSEL_SAMPLE_DIR") {
            self.paths.sample_dir = PathBuf::from(value);
        }
        if let Some(value) = env("SHARDSEL_STATS_DIR") {
            self.paths.stats_dir = PathBuf::from(value);
        }
        if let Some(value) = env("SHARDSEL_LAYOUT_FILE") {
            self.paths.layout_file = PathBuf::from(value);
        }

        if let Some(value) = env_parse::<f64>(&env, "SHARDSEL_BUDGET")? {
            self.taily.budget = value;
        }
        if let Some(value) = env_parse::<f64>(&env, "SHARDSEL_MU")? {
            self.taily.mu = value;
        }
        if let Some(value) = env_parse::<f64>(&env, "SHARDSEL_EPSILON")? {
            self.taily.epsilon = value;
        }

        if let Some(value) = env_parse::<usize>(&env, "SHARDSEL_SAMPLE_LIMIT")? {
            self.sample.limit = value;
        }
        if let Some(value) = env_parse::<usize>(&env, "SHARDSEL_TOP_K")? {
            self.sample.top_k = value;
        }
        if let Some(value) = env_parse::<f64>(&env, "SHARDSEL_RANKS_MIN_SCORE")? {
            self.sample.ranks_min_score = value;
        }
        if let Some(value) = env_parse::<usize>(&env, "SHARDSEL_VOTES_K")? {
            self.sample.votes_k = value;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ShardselError::Config(format!("{name} must be positive, got {value}")))
            }
        };
        positive("taily.mu", self.taily.mu)?;
        positive("taily.epsilon", self.taily.epsilon)?;
        positive("sample.ranks_base", self.sample.ranks_base)?;
        if !(self.taily.budget.is_finite() && self.taily.budget >= 0.0) {
            return Err(ShardselError::Config(format!(
                "taily.budget must be a non-negative number, got {}",
                self.taily.budget
            )));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.paths.index_dir)
    }

    pub fn sample_dir(&self) -> PathBuf {
        self.resolve(&self.paths.sample_dir)
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.resolve(&self.paths.stats_dir)
    }

    pub fn layout_file(&self) -> PathBuf {
        self.resolve(&self.paths.layout_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Full corpus index walked by `rebuild`.
    pub index_dir: PathBuf,
    /// Centralized sample index searched by sample strategies.
    pub sample_dir: PathBuf,
    pub stats_dir: PathBuf,
    pub layout_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("index"),
            sample_dir: PathBuf::from("sample"),
            stats_dir: PathBuf::from("stats"),
            layout_file: PathBuf::from("layout.toml"),
        }
    }
}

impl PathsConfig {
    fn merge(&mut self, patch: PathsPatch) {
        if let Some(value) = patch.index_dir {
            self.index_dir = value;
        }
        if let Some(value) = patch.sample_dir {
            self.sample_dir = value;
        }
        if let Some(value) = patch.stats_dir {
            self.stats_dir = value;
        }
        if let Some(value) = patch.layout_file {
            self.layout_file = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailyConfig {
    /// Retrieval-cost budget `n_c`.
    pub budget: f64,
    /// Dirichlet smoothing used when building statistics.
    pub mu: f64,
    pub epsilon: f64,
}

impl Default for TailyConfig {
    fn default() -> Self {
        Self {
            budget: 50.0,
            mu: 2500.0,
            epsilon: 1e-10,
        }
    }
}

impl TailyConfig {
    fn merge(&mut self, patch: TailyPatch) {
        if let Some(value) = patch.budget {
            self.budget = value;
        }
        if let Some(value) = patch.mu {
            self.mu = value;
        }
        if let Some(value) = patch.epsilon {
            self.epsilon = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Documents fetched from the sample index per query.
    pub limit: usize,
    /// Default shard cut for top-k strategies.
    pub top_k: usize,
    pub crcs_linear_window: f64,
    pub crcs_exp_alpha: f64,
    pub crcs_exp_beta: f64,
    pub ranks_base: f64,
    pub ranks_min_score: f64,
    pub votes_k: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        let params = SampleParams::default();
        Self {
            limit: 100,
            top_k: 10,
            crcs_linear_window: params.crcs_linear_window,
            crcs_exp_alpha: params.crcs_exp_alpha,
            crcs_exp_beta: params.crcs_exp_beta,
            ranks_base: params.ranks_base,
            ranks_min_score: params.ranks_min_score,
            votes_k: params.votes_k,
        }
    }
}

impl SampleConfig {
    pub const fn params(&self) -> SampleParams {
        SampleParams {
            crcs_linear_window: self.crcs_linear_window,
            crcs_exp_alpha: self.crcs_exp_alpha,
            crcs_exp_beta: self.crcs_exp_beta,
            ranks_base: self.ranks_base,
            ranks_min_score: self.ranks_min_score,
            votes_k: self.votes_k,
        }
    }

    fn merge(&mut self, patch: SamplePatch) {
        if let Some(value) = patch.limit {
            self.limit = value;
        }
        if let Some(value) = patch.top_k {
            self.top_k = value;
        }
        if let Some(value) = patch.crcs_linear_window {
            self.crcs_linear_window = value;
        }
        if let Some(value) = patch.crcs_exp_alpha {
            self.crcs_exp_alpha = value;
        }
        if let Some(value) = patch.crcs_exp_beta {
            self.crcs_exp_beta = value;
        }
        if let Some(value) = patch.ranks_base {
            self.ranks_base = value;
        }
        if let Some(value) = patch.ranks_min_score {
            self.ranks_min_score = value;
        }
        if let Some(value) = patch.votes_k {
            self.votes_k = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub paths: Option<PathsPatch>,
    pub taily: Option<TailyPatch>,
    pub sample: Option<SamplePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsPatch {
    pub index_dir: Option<PathBuf>,
    pub sample_dir: Option<PathBuf>,
    pub stats_dir: Option<PathBuf>,
    pub layout_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TailyPatch {
    pub budget: Option<f64>,
    pub mu: Option<f64>,
    pub epsilon: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SamplePatch {
    pub limit: Option<usize>,
    pub top_k: Option<usize>,
    pub crcs_linear_window: Option<f64>,
    pub crcs_exp_alpha: Option<f64>,
    pub crcs_exp_beta: Option<f64>,
    pub ranks_base: Option<f64>,
    pub ranks_min_score: Option<f64>,
    pub votes_k: Option<usize>,
}

fn env_parse<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ShardselError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

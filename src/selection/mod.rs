//! Shard selection: the statistical ranker, the sample strategies, and the
//! façade that dispatches between them.

pub mod engine;
pub mod ranking;
pub mod sample;
pub mod taily;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShardselError;
use crate::selection::sample::{
    CrcsExp, CrcsLinear, RankS, ResourceSelector, SampleParams, Sizes, Votes,
};

pub use engine::{Selection, SelectionEngine, SelectRequest};
pub use ranking::{ShardRanking, ShardScore};
pub use taily::{TailyBranch, TailyRanker};

/// A selection method, addressed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum SelectionMethod {
    Taily,
    CrcsExponential,
    CrcsLinear,
    RankS,
    Votes,
    Sizes,
}

const METHODS: &[(&str, SelectionMethod)] = &[
    ("taily", SelectionMethod::Taily),
    ("crcs-exp", SelectionMethod::CrcsExponential),
    ("crcs-lin", SelectionMethod::CrcsLinear),
    ("ranks", SelectionMethod::RankS),
    ("votes", SelectionMethod::Votes),
    ("sizes", SelectionMethod::Sizes),
];

impl SelectionMethod {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Taily => "taily",
            Self::CrcsExponential => "crcs-exp",
            Self::CrcsLinear => "crcs-lin",
            Self::RankS => "ranks",
            Self::Votes => "votes",
            Self::Sizes => "sizes",
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        METHODS.iter().map(|(_, m)| *m)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        METHODS.iter().map(|(n, _)| *n)
    }

    pub const fn uses_sample(self) -> bool {
        !matches!(self, Self::Taily)
    }

    /// The sample strategy behind this method; `None` for Taily.
    pub fn selector(self, params: &SampleParams) -> Option<Box<dyn ResourceSelector>> {
        let selector: Box<dyn ResourceSelector> = match self {
            Self::Taily => return None,
            Self::CrcsExponential => Box::new(CrcsExp {
                alpha: params.crcs_exp_alpha,
                beta: params.crcs_exp_beta,
            }),
            Self::CrcsLinear => Box::new(CrcsLinear {
                window: params.crcs_linear_window,
            }),
            Self::RankS => Box::new(RankS {
                base: params.ranks_base,
                min_score: params.ranks_min_score,
            }),
            Self::Votes => Box::new(Votes {
                k: params.votes_k,
            }),
            Self::Sizes => Box::new(Sizes),
        };
        Some(selector)
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectionMethod {
    type Err = ShardselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        METHODS
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, method)| *method)
            .ok_or_else(|| ShardselError::UnknownMethod(s.to_string()))
    }
}

impl From<SelectionMethod> for &'static str {
    fn from(method: SelectionMethod) -> Self {
        method.name()
    }
}

impl TryFrom<String> for SelectionMethod {
    type Error = ShardselError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

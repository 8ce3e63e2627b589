use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::rules::RuleError;
use super::state::{CardFace, CardId};

pub const DEFAULT_SETTLE_INTERVAL_MS: u32 = 1000;

/// 页面自带的六种卡面。
pub const DEFAULT_FACES: [&str; 6] = ["tree", "gift", "santa", "cane", "reindeer", "sled"];

/// 卡面数上限：两张一组分配 id，不能溢出 `CardId`。
const MAX_FACES: usize = (CardId::MAX / 2) as usize;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ConfigIssue {
    EmptyFaceSet,
    BlankFace { index: usize },
    DuplicateFace { face: CardFace },
    TooManyFaces { count: usize },
}

/// 牌局配置：卡面集合、错配后的停顿时长，以及可选的随机种子。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    #[serde(default = "default_faces")]
    pub faces: Vec<CardFace>,
    #[serde(default = "default_settle_interval")]
    pub settle_interval_ms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_faces() -> Vec<CardFace> {
    DEFAULT_FACES.iter().copied().map(CardFace::from).collect()
}

fn default_settle_interval() -> u32 {
    DEFAULT_SETTLE_INTERVAL_MS
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            faces: default_faces(),
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL_MS,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn new<I, F>(faces: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<CardFace>,
    {
        Self::default().with_faces(faces)
    }

    pub fn with_faces<I, F>(mut self, faces: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<CardFace>,
    {
        self.faces = faces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_settle_interval(mut self, settle_interval_ms: u32) -> Self {
        self.settle_interval_ms = settle_interval_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn pair_count(&self) -> u32 {
        self.faces.len() as u32
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        validate_faces(&self.faces)
    }
}

/// 卡面集合必须非空、互不相同，且没有空白标识。
pub fn validate_faces(faces: &[CardFace]) -> Result<(), RuleError> {
    if faces.is_empty() {
        return Err(ConfigIssue::EmptyFaceSet.into());
    }
    if faces.len() > MAX_FACES {
        return Err(ConfigIssue::TooManyFaces { count: faces.len() }.into());
    }

    let mut seen = HashSet::new();
    for (index, face) in faces.iter().enumerate() {
        if face.is_blank() {
            return Err(ConfigIssue::BlankFace { index }.into());
        }
        if !seen.insert(face) {
            return Err(ConfigIssue::DuplicateFace { face: face.clone() }.into());
        }
    }
    Ok(())
}

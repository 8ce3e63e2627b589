use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::config::DEFAULT_SETTLE_INTERVAL_MS;

/// 牌局内唯一的卡牌标识，洗牌后继续递增，不会复用。
pub type CardId = u32;

/// 卡牌正面的不透明标识（例如图片资源名），核心逻辑只比较是否相等。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CardFace(String);

impl CardFace {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for CardFace {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CardFace {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 牌堆中的一张卡牌。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub face: CardFace,
    #[serde(default)]
    pub matched: bool,
}

impl Card {
    pub fn new(id: CardId, face: impl Into<CardFace>) -> Self {
        Self {
            id,
            face: face.into(),
            matched: false,
        }
    }
}

/// 当前回合被翻开的卡牌（按 id 引用，而不是按正面）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Selection {
    Empty,
    Single { first: CardId },
    Pair { first: CardId, second: CardId },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Empty
    }
}

impl Selection {
    pub fn is_pair(&self) -> bool {
        matches!(self, Selection::Pair { .. })
    }

    pub fn contains(&self, card_id: CardId) -> bool {
        match *self {
            Selection::Empty => false,
            Selection::Single { first } => first == card_id,
            Selection::Pair { first, second } => first == card_id || second == card_id,
        }
    }

    pub fn ids(&self) -> Vec<CardId> {
        match *self {
            Selection::Empty => Vec::new(),
            Selection::Single { first } => vec![first],
            Selection::Pair { first, second } => vec![first, second],
        }
    }
}

/// 标识一次待执行的错配复位：洗牌纪元 + 发生错配时的回合数。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SettleTicket {
    pub epoch: u64,
    pub round: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IgnoreReason {
    Locked,
    AlreadyMatched,
    AlreadySelected,
    UnknownCard,
    StaleSelection,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        epoch: u64,
        pairs: u32,
    },
    CardRevealed {
        card_id: CardId,
    },
    SelectionIgnored {
        card_id: CardId,
        reason: IgnoreReason,
    },
    PairMatched {
        first: CardId,
        second: CardId,
        face: CardFace,
    },
    PairMismatched {
        first: CardId,
        second: CardId,
        settle: SettleTicket,
        settle_after_ms: u32,
    },
    RoundReset {
        turn_count: u32,
    },
    SettleDiscarded {
        ticket: SettleTicket,
    },
    GameWon {
        turns: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    OddDeckSize { len: usize },
    DuplicateCardId { card_id: CardId },
    FaceCountMismatch { face: CardFace, count: usize },
    CardIdOutOfRange { card_id: CardId, next_card_id: CardId },
    MatchCountMismatch { recorded: u32, actual: u32 },
    HalfMatchedPair { face: CardFace },
    LockMismatch { locked: bool, selected: usize },
    SelectionUnknownCard { card_id: CardId },
    SelectionMatchedCard { card_id: CardId },
    SelectionRepeated { card_id: CardId },
}

/// 呈现层渲染网格时使用的只读视图。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardView {
    pub id: CardId,
    pub face: CardFace,
    pub face_up: bool,
    pub matched: bool,
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    #[serde(default)]
    pub deck: Vec<Card>,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub match_count: u32,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub epoch: u64,
    #[serde(default)]
    pub next_card_id: CardId,
    #[serde(default = "default_settle_interval")]
    pub settle_interval_ms: u32,
}

fn default_settle_interval() -> u32 {
    DEFAULT_SETTLE_INTERVAL_MS
}

impl GameState {
    /// 用已经排好顺序的牌堆开局，计数器清零。
    pub fn from_deck(deck: Vec<Card>, settle_interval_ms: u32) -> Self {
        let next_card_id = deck
            .iter()
            .map(|card| card.id.saturating_add(1))
            .max()
            .unwrap_or(0);
        Self {
            deck,
            selection: Selection::Empty,
            turn_count: 0,
            match_count: 0,
            locked: false,
            epoch: 0,
            next_card_id,
            settle_interval_ms,
        }
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn get_card(&self, card_id: CardId) -> Option<&Card> {
        self.deck.iter().find(|card| card.id == card_id)
    }

    pub fn get_card_mut(&mut self, card_id: CardId) -> Option<&mut Card> {
        self.deck.iter_mut().find(|card| card.id == card_id)
    }

    pub fn total_pairs(&self) -> u32 {
        (self.deck.len() / 2) as u32
    }

    pub fn remaining_pairs(&self) -> u32 {
        self.total_pairs().saturating_sub(self.match_count)
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn match_count(&self) -> u32 {
        self.match_count
    }

    pub fn is_won(&self) -> bool {
        !self.deck.is_empty() && self.match_count == self.total_pairs()
    }

    pub fn is_face_up(&self, card_id: CardId) -> bool {
        self.get_card(card_id)
            .map(|card| card.matched || self.selection.contains(card_id))
            .unwrap_or(false)
    }

    /// 当前待执行复位的票据；只有两张卡被翻开时才存在。
    pub fn pending_settle(&self) -> Option<SettleTicket> {
        if self.locked && self.selection.is_pair() {
            Some(SettleTicket {
                epoch: self.epoch,
                round: self.turn_count,
            })
        } else {
            None
        }
    }

    pub fn board(&self) -> Vec<CardView> {
        self.deck
            .iter()
            .map(|card| CardView {
                id: card.id,
                face: card.face.clone(),
                face_up: card.matched || self.selection.contains(card.id),
                matched: card.matched,
            })
            .collect()
    }

    /// 结束当前回合：清空选择、回合数 +1、解锁。
    pub fn finish_round(&mut self) -> GameEvent {
        self.selection = Selection::Empty;
        self.turn_count = self.turn_count.saturating_add(1);
        self.locked = false;
        GameEvent::RoundReset {
            turn_count: self.turn_count,
        }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.deck.len() % 2 != 0 {
            return Err(IntegrityError::OddDeckSize {
                len: self.deck.len(),
            });
        }

        let mut seen = HashSet::new();
        let mut faces: HashMap<&CardFace, (usize, usize)> = HashMap::new();
        for card in &self.deck {
            if !seen.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
            if card.id >= self.next_card_id {
                return Err(IntegrityError::CardIdOutOfRange {
                    card_id: card.id,
                    next_card_id: self.next_card_id,
                });
            }
            let entry = faces.entry(&card.face).or_insert((0, 0));
            entry.0 += 1;
            if card.matched {
                entry.1 += 1;
            }
        }

        let mut completed = 0u32;
        for (face, (count, matched)) in &faces {
            if *count != 2 {
                return Err(IntegrityError::FaceCountMismatch {
                    face: (*face).clone(),
                    count: *count,
                });
            }
            match matched {
                0 => {}
                2 => completed += 1,
                _ => {
                    return Err(IntegrityError::HalfMatchedPair {
                        face: (*face).clone(),
                    })
                }
            }
        }
        if completed != self.match_count {
            return Err(IntegrityError::MatchCountMismatch {
                recorded: self.match_count,
                actual: completed,
            });
        }

        if self.locked != self.selection.is_pair() {
            return Err(IntegrityError::LockMismatch {
                locked: self.locked,
                selected: self.selection.ids().len(),
            });
        }

        if let Selection::Pair { first, second } = self.selection {
            if first == second {
                return Err(IntegrityError::SelectionRepeated { card_id: first });
            }
        }
        for card_id in self.selection.ids() {
            let card = self
                .get_card(card_id)
                .ok_or(IntegrityError::SelectionUnknownCard { card_id })?;
            if card.matched {
                return Err(IntegrityError::SelectionMatchedCard { card_id });
            }
        }

        Ok(())
    }

    /// 三对牌的固定牌局，方便前端调试或测试。
    pub fn sample() -> Self {
        let deck = vec![
            Card::new(0, "tree"),
            Card::new(1, "gift"),
            Card::new(2, "tree"),
            Card::new(3, "santa"),
            Card::new(4, "gift"),
            Card::new(5, "santa"),
        ];
        GameState::from_deck(deck, DEFAULT_SETTLE_INTERVAL_MS)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            deck: Vec::new(),
            selection: Selection::Empty,
            turn_count: 0,
            match_count: 0,
            locked: false,
            epoch: 0,
            next_card_id: 0,
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL_MS,
        }
    }
}

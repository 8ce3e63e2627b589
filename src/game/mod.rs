//! 翻牌配对游戏核心逻辑（牌堆、选牌状态机、配对判定）。

pub mod config;
pub mod deck;
pub mod rules;
pub mod state;

pub use config::{validate_faces, ConfigIssue, GameConfig, DEFAULT_FACES, DEFAULT_SETTLE_INTERVAL_MS};
pub use deck::DeckBuilder;
pub use rules::{RuleEngine, RuleError, RuleResolution};
pub use state::{
    Card,
    CardFace,
    CardId,
    CardView,
    GameEvent,
    GameState,
    IgnoreReason,
    IntegrityError,
    Selection,
    SettleTicket,
};

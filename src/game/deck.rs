use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::config::{validate_faces, GameConfig};
use super::rules::RuleError;
use super::state::{Card, CardFace, CardId, GameEvent, GameState};

/// 负责生成成对、洗乱的牌堆，并据此开局或重新洗牌。
pub struct DeckBuilder<R: Rng = SmallRng> {
    rng: R,
}

impl DeckBuilder<SmallRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// 配置里带种子时得到可复现的牌序，否则取系统熵。
    pub fn for_config(config: &GameConfig) -> Self {
        match config.seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> DeckBuilder<R> {
    /// 每个卡面复制一次，从 `first_id` 起分配 id，再做 Fisher-Yates 洗牌。
    pub fn build_deck(
        &mut self,
        faces: &[CardFace],
        first_id: CardId,
    ) -> Result<Vec<Card>, RuleError> {
        validate_faces(faces)?;

        let mut next_id = first_id;
        let mut deck = Vec::with_capacity(faces.len() * 2);
        for face in faces.iter().chain(faces.iter()) {
            let id = next_id;
            next_id = next_id
                .checked_add(1)
                .ok_or(RuleError::CardIdsExhausted { next_card_id: first_id })?;
            deck.push(Card::new(id, face.clone()));
        }

        deck.shuffle(&mut self.rng);
        Ok(deck)
    }

    pub fn new_game(&mut self, config: &GameConfig) -> Result<(GameState, GameEvent), RuleError> {
        self.start(config, 0, 0)
    }

    /// 整体替换旧牌局：纪元 +1，id 接着上一局继续分配。
    pub fn reshuffle(
        &mut self,
        previous: &GameState,
        config: &GameConfig,
    ) -> Result<(GameState, GameEvent), RuleError> {
        self.start(
            config,
            previous.epoch.wrapping_add(1),
            previous.next_card_id,
        )
    }

    fn start(
        &mut self,
        config: &GameConfig,
        epoch: u64,
        first_id: CardId,
    ) -> Result<(GameState, GameEvent), RuleError> {
        let deck = self.build_deck(&config.faces, first_id)?;
        let state = GameState::from_deck(deck, config.settle_interval_ms).with_epoch(epoch);
        log::info!(
            "new memory game: epoch {epoch}, {} pairs",
            config.pair_count()
        );
        let event = GameEvent::GameStarted {
            epoch,
            pairs: state.total_pairs(),
        };
        Ok((state, event))
    }
}

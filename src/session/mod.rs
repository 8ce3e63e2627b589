//! 单个玩家会话：持有唯一的 `GameState`，并把错配停顿交给可取消的定时器。

pub mod timer;

pub use timer::{ManualTimer, SettleTimer};

use crate::game::{
    CardId, CardView, DeckBuilder, GameConfig, GameEvent, GameState, RuleEngine, RuleError,
    RuleResolution, SettleTicket,
};

pub struct Session<T: SettleTimer> {
    config: GameConfig,
    state: GameState,
    deck_builder: DeckBuilder,
    timer: T,
}

impl<T: SettleTimer> Session<T> {
    pub fn new(config: GameConfig, timer: T) -> Result<Self, RuleError> {
        config.validate()?;
        let mut deck_builder = DeckBuilder::for_config(&config);
        let (state, _) = deck_builder.new_game(&config)?;
        Ok(Self {
            config,
            state,
            deck_builder,
            timer,
        })
    }

    /// 重新洗牌。先取消挂起的复位，再整体替换状态。
    pub fn new_game(&mut self) -> Result<RuleResolution, RuleError> {
        self.timer.cancel();
        let (state, started) = self.deck_builder.reshuffle(&self.state, &self.config)?;
        self.state = state;
        Ok(self.resolution(vec![started]))
    }

    pub fn select_card(&mut self, card_id: CardId) -> RuleResolution {
        let events = RuleEngine::select_card(&mut self.state, card_id);
        for event in &events {
            if let GameEvent::PairMismatched {
                settle,
                settle_after_ms,
                ..
            } = event
            {
                self.timer.schedule(*settle, *settle_after_ms);
            }
        }
        self.resolution(events)
    }

    /// 定时器到期的入口，不会再回调定时器本身。
    pub fn settle(&mut self, ticket: SettleTicket) -> RuleResolution {
        let events = RuleEngine::settle(&mut self.state, ticket);
        self.resolution(events)
    }

    fn resolution(&self, events: Vec<GameEvent>) -> RuleResolution {
        RuleResolution::new(self.state.clone(), events)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn is_won(&self) -> bool {
        self.state.is_won()
    }

    pub fn turn_count(&self) -> u32 {
        self.state.turn_count()
    }

    pub fn match_count(&self) -> u32 {
        self.state.match_count()
    }

    pub fn remaining_pairs(&self) -> u32 {
        self.state.remaining_pairs()
    }

    pub fn is_face_up(&self, card_id: CardId) -> bool {
        self.state.is_face_up(card_id)
    }

    pub fn board(&self) -> Vec<CardView> {
        self.state.board()
    }
}

impl Session<ManualTimer> {
    /// 推进虚拟时钟，到期时执行复位。
    pub fn advance(&mut self, elapsed_ms: u64) -> Option<RuleResolution> {
        let ticket = self.timer.advance(elapsed_ms)?;
        Some(self.settle(ticket))
    }
}

use serde::{Deserialize, Serialize};

use super::{
    config::ConfigIssue,
    state::{
        CardFace, CardId, GameEvent, GameState, IgnoreReason, IntegrityError, Selection,
        SettleTicket,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    InvalidConfiguration { issue: ConfigIssue },
    CardIdsExhausted { next_card_id: CardId },
    IntegrityViolation { error: IntegrityError },
}

impl From<ConfigIssue> for RuleError {
    fn from(issue: ConfigIssue) -> Self {
        RuleError::InvalidConfiguration { issue }
    }
}

/// 一次状态转换的结果：新状态、事件，以及需要安排的错配复位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle: Option<SettleTicket>,
    pub won: bool,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let settle = state.pending_settle();
        let won = state.is_won();
        Self {
            state,
            events,
            settle,
            won,
        }
    }
}

pub struct RuleEngine;

/// 通过检查后的一次点选：翻开第一张，或凑成一对（同面时带上卡面）。
enum Pick {
    First,
    Second {
        first: CardId,
        shared_face: Option<CardFace>,
    },
}

impl RuleEngine {
    /// 玩家点选一张牌。来自界面的过期或非法点击只记为忽略，不报错，状态保持不变。
    pub fn select_card(state: &mut GameState, card_id: CardId) -> Vec<GameEvent> {
        let pick = match Self::check_pick(state, card_id) {
            Ok(pick) => pick,
            Err(reason) => {
                log::debug!("selection of card {card_id} ignored: {reason:?}");
                return vec![GameEvent::SelectionIgnored { card_id, reason }];
            }
        };

        let mut events = vec![GameEvent::CardRevealed { card_id }];
        match pick {
            Pick::First => {
                state.selection = Selection::Single { first: card_id };
            }
            Pick::Second { first, shared_face } => {
                state.selection = Selection::Pair {
                    first,
                    second: card_id,
                };
                state.locked = true;
                events.extend(Self::evaluate_pair(state, first, card_id, shared_face));
            }
        }
        events
    }

    /// 所有检查都在修改状态之前完成。
    fn check_pick(state: &GameState, card_id: CardId) -> Result<Pick, IgnoreReason> {
        if state.locked {
            return Err(IgnoreReason::Locked);
        }
        let card = state.get_card(card_id).ok_or(IgnoreReason::UnknownCard)?;
        if card.matched {
            return Err(IgnoreReason::AlreadyMatched);
        }

        match state.selection {
            Selection::Empty => Ok(Pick::First),
            Selection::Single { first } if first == card_id => Err(IgnoreReason::AlreadySelected),
            Selection::Single { first } => {
                let first_card = state
                    .get_card(first)
                    .filter(|first_card| !first_card.matched)
                    .ok_or(IgnoreReason::StaleSelection)?;
                let shared_face = (first_card.face == card.face).then(|| card.face.clone());
                Ok(Pick::Second { first, shared_face })
            }
            Selection::Pair { .. } => Err(IgnoreReason::Locked),
        }
    }

    /// 两张牌翻开后立即比较：配对成功当场结算，失败则保持锁定等待复位。
    fn evaluate_pair(
        state: &mut GameState,
        first: CardId,
        second: CardId,
        shared_face: Option<CardFace>,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if let Some(face) = shared_face {
            for card_id in [first, second] {
                if let Some(card) = state.get_card_mut(card_id) {
                    card.matched = true;
                }
            }
            state.match_count = state.match_count.saturating_add(1);
            events.push(GameEvent::PairMatched {
                first,
                second,
                face,
            });
            events.push(state.finish_round());

            if state.is_won() {
                log::info!("memory game won in {} turns", state.turn_count);
                events.push(GameEvent::GameWon {
                    turns: state.turn_count,
                });
            }
        } else {
            let settle = SettleTicket {
                epoch: state.epoch,
                round: state.turn_count,
            };
            events.push(GameEvent::PairMismatched {
                first,
                second,
                settle,
                settle_after_ms: state.settle_interval_ms,
            });
        }
        events
    }

    /// 停顿结束后的复位。票据与当前纪元和回合不符时视为过期，不做任何修改。
    pub fn settle(state: &mut GameState, ticket: SettleTicket) -> Vec<GameEvent> {
        if state.pending_settle() != Some(ticket) {
            log::debug!(
                "discarding stale settle for epoch {} round {}",
                ticket.epoch,
                ticket.round
            );
            return vec![GameEvent::SettleDiscarded { ticket }];
        }
        vec![state.finish_round()]
    }

    pub fn check_victory(state: &GameState) -> bool {
        state.is_won()
    }

    pub fn validate(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Card;
    use proptest::prelude::*;

    /// A1 B1 A2 C1 B2 C2
    fn scenario_state() -> GameState {
        let deck = vec![
            Card::new(1, "A"),
            Card::new(2, "B"),
            Card::new(3, "A"),
            Card::new(4, "C"),
            Card::new(5, "B"),
            Card::new(6, "C"),
        ];
        GameState::from_deck(deck, 1000)
    }

    fn is_matched(state: &GameState, card_id: CardId) -> bool {
        state
            .get_card(card_id)
            .map(|card| card.matched)
            .unwrap_or(false)
    }

    #[test]
    fn concrete_scenario_matches_then_settles_a_mismatch() {
        let mut state = scenario_state();

        RuleEngine::select_card(&mut state, 1);
        assert_eq!(state.selection, Selection::Single { first: 1 });

        let events = RuleEngine::select_card(&mut state, 3);
        assert!(events.contains(&GameEvent::PairMatched {
            first: 1,
            second: 3,
            face: "A".into()
        }));
        assert!(is_matched(&state, 1) && is_matched(&state, 3));
        assert_eq!(state.match_count, 1);
        assert_eq!(state.turn_count, 1);
        assert_eq!(state.selection, Selection::Empty);
        assert!(!state.locked);

        RuleEngine::select_card(&mut state, 2);
        let events = RuleEngine::select_card(&mut state, 4);
        let ticket = SettleTicket { epoch: 0, round: 1 };
        assert!(events.contains(&GameEvent::PairMismatched {
            first: 2,
            second: 4,
            settle: ticket,
            settle_after_ms: 1000
        }));
        assert!(state.locked);
        assert!(state.is_face_up(2) && state.is_face_up(4));
        assert_eq!(state.turn_count, 1, "turn only advances when the pair settles");

        let events = RuleEngine::settle(&mut state, ticket);
        assert_eq!(events, vec![GameEvent::RoundReset { turn_count: 2 }]);
        assert_eq!(state.selection, Selection::Empty);
        assert_eq!(state.turn_count, 2);
        assert!(!state.locked);
        assert_eq!(state.match_count, 1);
        assert!(!is_matched(&state, 2) && !is_matched(&state, 4));
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn locked_state_ignores_further_selections() {
        let mut state = scenario_state();
        RuleEngine::select_card(&mut state, 2);
        RuleEngine::select_card(&mut state, 4);

        let before = state.clone();
        let events = RuleEngine::select_card(&mut state, 6);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 6,
                reason: IgnoreReason::Locked
            }]
        );
        assert_eq!(state, before);
    }

    #[test]
    fn same_card_twice_and_matched_cards_are_no_ops() {
        let mut state = scenario_state();
        RuleEngine::select_card(&mut state, 1);
        let events = RuleEngine::select_card(&mut state, 1);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 1,
                reason: IgnoreReason::AlreadySelected
            }]
        );
        assert_eq!(state.selection, Selection::Single { first: 1 });

        RuleEngine::select_card(&mut state, 3);
        let events = RuleEngine::select_card(&mut state, 3);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 3,
                reason: IgnoreReason::AlreadyMatched
            }]
        );
        assert_eq!(state.selection, Selection::Empty);
        assert_eq!(state.turn_count, 1);

        let events = RuleEngine::select_card(&mut state, 42);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 42,
                reason: IgnoreReason::UnknownCard
            }]
        );
    }

    #[test]
    fn stale_tickets_leave_state_untouched() {
        let mut state = scenario_state();
        RuleEngine::select_card(&mut state, 2);
        RuleEngine::select_card(&mut state, 4);
        let before = state.clone();

        for ticket in [
            SettleTicket { epoch: 1, round: 0 },
            SettleTicket { epoch: 0, round: 3 },
        ] {
            let events = RuleEngine::settle(&mut state, ticket);
            assert_eq!(events, vec![GameEvent::SettleDiscarded { ticket }]);
            assert_eq!(state, before);
        }

        let current = SettleTicket { epoch: 0, round: 0 };
        RuleEngine::settle(&mut state, current);
        assert!(!state.locked);

        let events = RuleEngine::settle(&mut state, current);
        assert_eq!(events, vec![GameEvent::SettleDiscarded { ticket: current }]);
        assert_eq!(state.turn_count, 1, "a settle applies at most once");
    }

    #[test]
    fn winning_requires_every_pair_regardless_of_turns() {
        let mut state = scenario_state();
        for (first, second) in [(1, 3), (2, 5)] {
            RuleEngine::select_card(&mut state, first);
            RuleEngine::select_card(&mut state, second);
            assert!(!RuleEngine::check_victory(&state));
        }

        RuleEngine::select_card(&mut state, 4);
        let events = RuleEngine::select_card(&mut state, 6);
        assert_eq!(events.last(), Some(&GameEvent::GameWon { turns: 3 }));
        assert!(RuleEngine::check_victory(&state));
        assert_eq!(state.match_count, 3);

        let resolution = RuleResolution::new(state, events);
        assert!(resolution.won);
        assert!(resolution.settle.is_none());
    }

    #[test]
    fn validate_wraps_integrity_errors() {
        let mut state = scenario_state();
        state.locked = true;
        assert!(matches!(
            RuleEngine::validate(&state),
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::LockMismatch { .. }
            })
        ));
    }

    #[test]
    fn turn_count_saturates_instead_of_overflowing() {
        let mut state = scenario_state();
        state.turn_count = u32::MAX;
        assert!(RuleEngine::validate(&state).is_ok());

        RuleEngine::select_card(&mut state, 1);
        let events = RuleEngine::select_card(&mut state, 3);
        assert!(events.contains(&GameEvent::RoundReset {
            turn_count: u32::MAX
        }));
        assert_eq!(state.match_count, 1);
        assert!(!state.locked);

        RuleEngine::select_card(&mut state, 2);
        RuleEngine::select_card(&mut state, 4);
        let ticket = state.pending_settle().expect("mismatch should be pending");
        RuleEngine::settle(&mut state, ticket);
        assert_eq!(state.turn_count, u32::MAX);
        assert!(!state.locked);
    }

    #[test]
    fn dangling_sole_selection_is_ignored_without_locking() {
        let mut state = scenario_state();
        state.selection = Selection::Single { first: 99 };
        let before = state.clone();

        let events = RuleEngine::select_card(&mut state, 1);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 1,
                reason: IgnoreReason::StaleSelection
            }]
        );
        assert_eq!(state, before, "an ignored pick must not change the state");
        assert!(!state.locked);
    }

    #[test]
    fn matched_sole_selection_is_stale() {
        let mut state = scenario_state();
        state.deck[1].matched = true;
        state.deck[4].matched = true;
        state.match_count = 1;
        state.selection = Selection::Single { first: 2 };

        let events = RuleEngine::select_card(&mut state, 4);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 4,
                reason: IgnoreReason::StaleSelection
            }]
        );
        assert_eq!(state.selection, Selection::Single { first: 2 });
    }

    #[test]
    fn unlocked_pair_selection_is_treated_as_locked() {
        let mut state = scenario_state();
        state.selection = Selection::Pair {
            first: 2,
            second: 4,
        };
        let before = state.clone();

        let events = RuleEngine::select_card(&mut state, 6);
        assert_eq!(
            events,
            vec![GameEvent::SelectionIgnored {
                card_id: 6,
                reason: IgnoreReason::Locked
            }]
        );
        assert_eq!(state, before);
    }

    proptest! {
        #[test]
        fn turn_count_tracks_completed_comparisons(picks in proptest::collection::vec(1u32..=6, 0..60)) {
            let mut state = scenario_state();
            let mut comparisons = 0u32;
            for card_id in picks {
                if let Some(ticket) = state.pending_settle() {
                    RuleEngine::settle(&mut state, ticket);
                }
                let matched_before = state.match_count;
                let events = RuleEngine::select_card(&mut state, card_id);
                let completed = events.iter().any(|event| matches!(
                    event,
                    GameEvent::PairMatched { .. } | GameEvent::PairMismatched { .. }
                ));
                if completed {
                    comparisons += 1;
                }
                if events.iter().any(|event| matches!(event, GameEvent::PairMismatched { .. })) {
                    prop_assert!(state.locked);
                    prop_assert_eq!(state.match_count, matched_before);
                }
                prop_assert!(state.integrity_check().is_ok());
            }
            if let Some(ticket) = state.pending_settle() {
                RuleEngine::settle(&mut state, ticket);
            }
            prop_assert_eq!(state.turn_count, comparisons);
            prop_assert_eq!(state.is_won(), state.match_count == 3);
        }
    }
}

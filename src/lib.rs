pub mod game;
pub mod session;

use gloo_timers::callback::Timeout;
use serde_wasm_bindgen::{from_value, to_value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use web_sys::js_sys::Function;

pub use game::{
    Card, CardFace, CardId, CardView, ConfigIssue, DeckBuilder, GameConfig, GameEvent, GameState,
    IgnoreReason, IntegrityError, RuleEngine, RuleError, RuleResolution, Selection, SettleTicket,
    DEFAULT_FACES, DEFAULT_SETTLE_INTERVAL_MS,
};
pub use session::{ManualTimer, Session, SettleTimer};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"memory game logger already initialised".into());
    }
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: &RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(resolution).map_err(serde_to_js_error)
}

type SharedSession = Rc<RefCell<Session<BrowserTimer>>>;

/// 基于 `setTimeout` 的停顿定时器。回调只持有会话的弱引用；丢弃 `Timeout` 即取消。
pub struct BrowserTimer {
    session: Weak<RefCell<Session<BrowserTimer>>>,
    pending: Option<Timeout>,
    on_settle: Option<Function>,
}

impl BrowserTimer {
    fn new() -> Self {
        Self {
            session: Weak::new(),
            pending: None,
            on_settle: None,
        }
    }

    fn bind(&mut self, session: &SharedSession) {
        self.session = Rc::downgrade(session);
    }
}

impl SettleTimer for BrowserTimer {
    fn schedule(&mut self, ticket: SettleTicket, delay_ms: u32) {
        let session = self.session.clone();
        let timeout = Timeout::new(delay_ms, move || {
            let Some(shared) = session.upgrade() else {
                return;
            };
            // 先释放借用再回调 JS，回调里可以继续调用 selectCard。
            let (resolution, callback) = {
                let mut game = shared.borrow_mut();
                let resolution = game.settle(ticket);
                (resolution, game.timer().on_settle.clone())
            };
            let Some(callback) = callback else {
                return;
            };
            match make_resolution_json(&resolution) {
                Ok(json) => {
                    if let Err(error) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                        web_sys::console::error_1(&error);
                    }
                }
                Err(error) => web_sys::console::error_1(&error),
            }
        });
        // 已触发的旧句柄在这里被替换；未触发的会随之被清除。
        self.pending = Some(timeout);
    }

    fn cancel(&mut self) {
        if let Some(timeout) = self.pending.take() {
            timeout.cancel();
        }
    }
}

/// 供页面直接持有的有状态游戏对象。
#[wasm_bindgen]
pub struct MemoryGame {
    shared: SharedSession,
}

#[wasm_bindgen]
impl MemoryGame {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<MemoryGame, JsValue> {
        let config = if let Some(json) = config_json {
            serde_json::from_str(&json).map_err(serde_to_js_error)?
        } else {
            GameConfig::default()
        };
        let session = Session::new(config, BrowserTimer::new()).map_err(to_js_error)?;
        let shared = Rc::new(RefCell::new(session));
        shared.borrow_mut().timer_mut().bind(&shared);
        Ok(MemoryGame { shared })
    }

    #[wasm_bindgen(js_name = "stateJson")]
    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.shared.borrow().state()).map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = "boardJson")]
    pub fn board_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.shared.borrow().board()).map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = "newGame")]
    pub fn new_game(&self) -> Result<String, JsValue> {
        let resolution = self.shared.borrow_mut().new_game().map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    #[wasm_bindgen(js_name = "selectCard")]
    pub fn select_card(&self, card_id: CardId) -> Result<String, JsValue> {
        let resolution = self.shared.borrow_mut().select_card(card_id);
        make_resolution_json(&resolution)
    }

    /// 注册停顿结束后的通知，参数为复位结果的 JSON。
    #[wasm_bindgen(js_name = "onSettle")]
    pub fn on_settle(&self, callback: Option<Function>) {
        self.shared.borrow_mut().timer_mut().on_settle = callback;
    }

    #[wasm_bindgen(js_name = "isWon")]
    pub fn is_won(&self) -> bool {
        self.shared.borrow().is_won()
    }

    #[wasm_bindgen(js_name = "turnCount")]
    pub fn turn_count(&self) -> u32 {
        self.shared.borrow().turn_count()
    }

    #[wasm_bindgen(js_name = "matchCount")]
    pub fn match_count(&self) -> u32 {
        self.shared.borrow().match_count()
    }

    #[wasm_bindgen(js_name = "remainingPairs")]
    pub fn remaining_pairs(&self) -> u32 {
        self.shared.borrow().remaining_pairs()
    }

    #[wasm_bindgen(js_name = "isFaceUp")]
    pub fn is_face_up(&self, card_id: CardId) -> bool {
        self.shared.borrow().is_face_up(card_id)
    }
}

/// 返回默认配置（六种卡面、1000ms 停顿）。
#[wasm_bindgen(js_name = "defaultConfig")]
pub fn default_config() -> Result<JsValue, JsValue> {
    to_value(&GameConfig::default()).map_err(JsValue::from)
}

/// 按配置开局，返回与 `reshuffle` 相同形状的结果（状态加 `GameStarted` 事件）。
#[wasm_bindgen(js_name = "newGame")]
pub fn new_game(config: JsValue) -> Result<JsValue, JsValue> {
    let config = config_from_js(config)?;
    let (state, started) = DeckBuilder::for_config(&config)
        .new_game(&config)
        .map_err(to_js_error)?;
    to_value(&RuleResolution::new(state, vec![started])).map_err(JsValue::from)
}

/// 在旧状态基础上重新洗牌；旧状态的待执行复位随之失效。
#[wasm_bindgen(js_name = "reshuffle")]
pub fn reshuffle(state: JsValue, config: JsValue) -> Result<JsValue, JsValue> {
    let previous: GameState = from_value(state).map_err(JsValue::from)?;
    let config = config_from_js(config)?;
    let (state, started) = DeckBuilder::for_config(&config)
        .reshuffle(&previous, &config)
        .map_err(to_js_error)?;
    to_value(&RuleResolution::new(state, vec![started])).map_err(JsValue::from)
}

/// 外部传入的状态先做完整性校验，损坏的状态返回 `IntegrityViolation`。
#[wasm_bindgen(js_name = "selectCard")]
pub fn select_card(state: JsValue, card_id: CardId) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    RuleEngine::validate(&state).map_err(to_js_error)?;
    let events = RuleEngine::select_card(&mut state, card_id);
    to_value(&RuleResolution::new(state, events)).map_err(JsValue::from)
}

/// 停顿结束时由页面调用；过期票据不会修改状态。
#[wasm_bindgen(js_name = "settleRound")]
pub fn settle_round(state: JsValue, ticket: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let ticket: SettleTicket = from_value(ticket).map_err(JsValue::from)?;
    RuleEngine::validate(&state).map_err(to_js_error)?;
    let events = RuleEngine::settle(&mut state, ticket);
    to_value(&RuleResolution::new(state, events)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "isWon")]
pub fn is_won(state: JsValue) -> Result<bool, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    Ok(RuleEngine::check_victory(&state))
}

#[wasm_bindgen(js_name = "turnCount")]
pub fn turn_count(state: JsValue) -> Result<u32, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    Ok(state.turn_count())
}

#[wasm_bindgen(js_name = "matchCount")]
pub fn match_count(state: JsValue) -> Result<u32, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    Ok(state.match_count())
}

#[wasm_bindgen(js_name = "isFaceUp")]
pub fn is_face_up(state: JsValue, card_id: CardId) -> Result<bool, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    Ok(state.is_face_up(card_id))
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    RuleEngine::validate(&state).map_err(to_js_error)
}

fn config_from_js(config: JsValue) -> Result<GameConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        Ok(GameConfig::default())
    } else {
        from_value(config).map_err(JsValue::from)
    }
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}

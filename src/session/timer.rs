use crate::game::SettleTicket;

/// 错配停顿的延时回调。实现方负责在 `delay_ms` 之后把票据交回 `Session::settle`。
pub trait SettleTimer {
    fn schedule(&mut self, ticket: SettleTicket, delay_ms: u32);
    fn cancel(&mut self);
}

/// 由调用方手动推进的虚拟时钟，用于测试和没有事件循环的宿主。
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ms: u64,
    pending: Option<(u64, SettleTicket)>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending(&self) -> Option<SettleTicket> {
        self.pending.map(|(_, ticket)| ticket)
    }

    pub fn due_at(&self) -> Option<u64> {
        self.pending.map(|(due, _)| due)
    }

    /// 推进时钟；到期的票据会被取出并返回。
    pub fn advance(&mut self, elapsed_ms: u64) -> Option<SettleTicket> {
        self.now_ms = self.now_ms.saturating_add(elapsed_ms);
        match self.pending {
            Some((due, ticket)) if due <= self.now_ms => {
                self.pending = None;
                Some(ticket)
            }
            _ => None,
        }
    }
}

impl SettleTimer for ManualTimer {
    fn schedule(&mut self, ticket: SettleTicket, delay_ms: u32) {
        let due = self.now_ms.saturating_add(u64::from(delay_ms));
        self.pending = Some((due, ticket));
    }

    fn cancel(&mut self) {
        self.pending = None;
    }
}

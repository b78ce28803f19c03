/// Traffic counters for one session, across reconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    frames_sent: u64,
    frames_skipped: u64,
    commands_sent: u64,
    dropped_inbound: u64,
    reconnects: u64,
}

impl Stats {
    pub(crate) fn frame_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub(crate) fn frame_skipped(&mut self) {
        self.frames_skipped += 1;
    }

    pub(crate) fn command_sent(&mut self) {
        self.commands_sent += 1;
    }

    pub(crate) fn inbound_dropped(&mut self) {
        self.dropped_inbound += 1;
    }

    pub(crate) fn reconnect_attempted(&mut self) {
        self.reconnects += 1;
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    pub fn dropped_inbound(&self) -> u64 {
        self.dropped_inbound
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }
}

//! Configuration options for PC/SC transport

use std::time::Duration;

use pcsc::{Protocols, Scope as PcscScope, ShareMode as PcscShareMode};

/// Default time a monitor worker waits for a status change
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Resource manager scope of the PC/SC context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Operations run in the user's domain (default)
    #[default]
    User,
    /// Operations run in the terminal's domain
    Terminal,
    /// Operations run in the system's domain
    System,
}

impl From<Scope> for PcscScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::User => Self::User,
            Scope::Terminal => Self::Terminal,
            Scope::System => Self::System,
        }
    }
}

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    #[default]
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Configuration options for PC/SC transport
#[derive(Debug, Clone)]
pub struct PcscConfig {
    /// Scope of the PC/SC context
    pub scope: Scope,

    /// Sharing mode for card connections
    pub share_mode: ShareMode,

    /// Preferred protocols for card communication
    pub protocols: Protocols,

    /// How long a monitor worker blocks in one status-change call
    pub poll_timeout: Duration,

    /// Automatically reconnect if the card is reset
    pub auto_reconnect: bool,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            scope: Scope::User,
            share_mode: ShareMode::Shared,
            protocols: Protocols::ANY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            auto_reconnect: true,
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context scope
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set the monitor poll timeout
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set whether to automatically reconnect
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }
}

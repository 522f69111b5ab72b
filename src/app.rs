//! Terminal-side application state
//!
//! `App` holds only presentation state: the latest snapshot published by the
//! worker, input buffers and the selected log row. Every user intent becomes
//! a [`RuntimeCommand`] queued for the main loop to send.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::Address;

use crate::core::{parse_command, Command, ValidationError};
use crate::domain::{short_address, LogRecord};
use crate::infrastructure::runtime::{RuntimeCommand, RuntimeEvent};
use crate::sync::{StatusLevel, SyncState};

const LOCAL_STATUS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Command,
    Prompt(PromptKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Student name for registration
    Name,
}

#[derive(Debug, Default, Clone)]
pub struct CommandBar {
    pub input: String,
}

/// Status raised by the terminal itself (bad command, worker errors). It
/// shadows the core's status line for a few seconds.
#[derive(Debug, Clone)]
pub struct LocalStatus {
    pub text: String,
    pub level: StatusLevel,
    pub since: Instant,
}

pub struct App {
    pub state: Arc<SyncState>,
    pub endpoint: String,
    pub contract: String,
    pub node: Option<String>,
    pub input_mode: InputMode,
    pub command: CommandBar,
    /// Row in the latest-first log
    pub selected_log: usize,
    pub local_status: Option<LocalStatus>,
    pub help_open: bool,
    pub should_quit: bool,
    outbox: Vec<RuntimeCommand>,
}

impl App {
    pub fn new(endpoint: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            state: Arc::new(SyncState::default()),
            endpoint: endpoint.into(),
            contract: contract.into(),
            node: None,
            input_mode: InputMode::Normal,
            command: CommandBar::default(),
            selected_log: 0,
            local_status: None,
            help_open: false,
            should_quit: false,
            outbox: Vec::new(),
        }
    }

    pub fn apply_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Ready {
                endpoint,
                contract,
                node,
            } => {
                self.endpoint = endpoint;
                self.contract = contract;
                self.node = node;
                // Ask for the wallet as soon as a node answers; `c` retries
                if self.state.is_connected() || self.node.is_none() {
                    return;
                }
                self.connect();
                self.set_status("Connecting wallet…", StatusLevel::Info);
            }
            RuntimeEvent::State(state) => self.apply_state(state),
            RuntimeEvent::Error { message } => self.set_status(message, StatusLevel::Error),
        }
    }

    pub fn apply_state(&mut self, state: Arc<SyncState>) {
        let account_changed = state.active_account != self.state.active_account;
        self.state = state;
        if account_changed {
            self.selected_log = 0;
        }
        let len = self.state.log_latest_first.len();
        if self.selected_log >= len {
            self.selected_log = len.saturating_sub(1);
        }
    }

    /// Commands queued since the last call
    pub fn take_commands(&mut self) -> Vec<RuntimeCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.local_status = Some(LocalStatus {
            text: text.into(),
            level,
            since: Instant::now(),
        });
    }

    /// Local status while fresh, else the core's
    pub fn status_text(&self) -> Option<(&str, StatusLevel)> {
        if let Some(local) = self.local_status.as_ref() {
            return Some((local.text.as_str(), local.level));
        }
        self.state
            .status
            .as_ref()
            .map(|status| (status.text.as_str(), status.level))
    }

    pub fn on_tick(&mut self) {
        if let Some(status) = self.local_status.as_ref() {
            if status.since.elapsed() > LOCAL_STATUS_TTL {
                self.local_status = None;
            }
        }
    }

    pub fn selected_entry(&self) -> Option<&LogRecord> {
        self.state.log_latest_first.get(self.selected_log)
    }

    pub fn select_next(&mut self) {
        let len = self.state.log_latest_first.len();
        if len > 0 && self.selected_log + 1 < len {
            self.selected_log += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected_log = self.selected_log.saturating_sub(1);
    }

    pub fn connect(&mut self) {
        self.local_status = None;
        self.outbox.push(RuntimeCommand::Connect);
    }

    pub fn refresh(&mut self) {
        self.local_status = None;
        self.outbox.push(RuntimeCommand::Refresh);
    }

    /// Open the name prompt; only offered to connected, unregistered accounts
    pub fn begin_register(&mut self) {
        if !self.state.is_connected() {
            self.set_status(ValidationError::NotConnected.to_string(), StatusLevel::Warn);
            return;
        }
        if self.state.is_registered {
            self.set_status(ValidationError::AlreadyRegistered.to_string(), StatusLevel::Warn);
            return;
        }
        self.command.input.clear();
        self.input_mode = InputMode::Prompt(PromptKind::Name);
    }

    /// The register button is enabled only for a non-empty name
    pub fn can_confirm_name(&self) -> bool {
        self.state.can_register(&self.command.input)
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.local_status = None;
        self.outbox.push(RuntimeCommand::Register { name: name.into() });
    }

    pub fn submit_attendance(&mut self) {
        self.local_status = None;
        self.outbox.push(RuntimeCommand::SubmitAttendance);
    }

    pub fn verify_selected(&mut self) {
        let Some(entry) = self.selected_entry() else {
            self.set_status("No log entry selected", StatusLevel::Warn);
            return;
        };
        let log_index = entry.index;
        self.verify(log_index);
    }

    pub fn verify(&mut self, log_index: usize) {
        self.local_status = None;
        self.outbox.push(RuntimeCommand::VerifyAttendance { log_index });
    }

    /// Ask the wallet to activate the next account it reported
    pub fn cycle_account(&mut self) {
        let accounts = &self.state.accounts;
        if accounts.len() < 2 {
            self.set_status("The wallet reported no other account", StatusLevel::Info);
            return;
        }
        let position = self
            .state
            .active_account
            .and_then(|active| accounts.iter().position(|account| *account == active))
            .unwrap_or(0);
        let account = accounts[(position + 1) % accounts.len()];
        self.set_status(
            format!("Switching to {}", short_address(&account)),
            StatusLevel::Info,
        );
        self.outbox.push(RuntimeCommand::SwitchAccount { account });
    }

    pub fn enter_command(&mut self) {
        self.command.input.clear();
        self.input_mode = InputMode::Command;
    }

    pub fn exit_command(&mut self) {
        self.command.input.clear();
        self.input_mode = InputMode::Normal;
    }

    pub fn exit_prompt(&mut self) {
        self.command.input.clear();
        self.input_mode = InputMode::Normal;
    }

    pub fn apply_prompt(&mut self, kind: PromptKind) {
        match kind {
            PromptKind::Name => {
                if !self.can_confirm_name() {
                    self.set_status(ValidationError::EmptyName.to_string(), StatusLevel::Warn);
                    return;
                }
                let name = self.command.input.trim().to_string();
                self.exit_prompt();
                self.register(name);
            }
        }
    }

    pub fn apply_command(&mut self) {
        let input = self.command.input.trim().to_string();
        self.exit_command();
        if input.is_empty() {
            return;
        }

        match parse_command(&input) {
            Command::Connect => self.connect(),
            Command::Account(raw) => match raw.parse::<Address>() {
                Ok(account) => self.outbox.push(RuntimeCommand::SwitchAccount { account }),
                Err(_) => self.set_status(format!("Invalid address: {raw}"), StatusLevel::Warn),
            },
            Command::Register(name) => self.register(name),
            Command::Submit => self.submit_attendance(),
            Command::Verify(index) => self.verify(index),
            Command::Refresh => self.refresh(),
            Command::Quit => self.should_quit = true,
            Command::Unknown(raw) => {
                self.set_status(format!("Unknown command: {raw}"), StatusLevel::Warn)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttendanceStatus, StudentRecord};
    use crate::sync::IdentityStatus;

    fn record(index: usize, byte: u8) -> LogRecord {
        LogRecord {
            index,
            student: Address::repeat_byte(byte),
            timestamp: 1_700_000_000 + index as u64,
            status: AttendanceStatus::OnTime,
            verifiers_count: 0,
            message: String::new(),
        }
    }

    fn connected(log: Vec<LogRecord>) -> Arc<SyncState> {
        let me = Address::repeat_byte(0x01);
        let mut latest = log.clone();
        latest.reverse();
        Arc::new(SyncState {
            identity: IdentityStatus::Active(me),
            accounts: vec![me, Address::repeat_byte(0x02)],
            active_account: Some(me),
            student: Some(StudentRecord::default()),
            log,
            log_latest_first: latest,
            ..SyncState::default()
        })
    }

    fn ready(node: Option<&str>) -> RuntimeEvent {
        RuntimeEvent::Ready {
            endpoint: "http://localhost:8545".into(),
            contract: "0x0".into(),
            node: node.map(str::to_string),
        }
    }

    #[test]
    fn test_ready_node_requests_wallet_once() {
        let mut app = App::new("", "");
        app.apply_event(ready(Some("anvil")));
        assert_eq!(app.take_commands(), vec![RuntimeCommand::Connect]);
        assert_eq!(app.status_text().map(|(text, _)| text), Some("Connecting wallet…"));

        // A declined request is retried by hand
        app.connect();
        assert_eq!(app.take_commands(), vec![RuntimeCommand::Connect]);
    }

    #[test]
    fn test_ready_without_node_does_not_connect() {
        let mut app = App::new("", "");
        app.apply_event(ready(None));
        assert!(app.take_commands().is_empty());

        let mut app = App::new("", "");
        app.apply_state(connected(Vec::new()));
        app.apply_event(ready(Some("anvil")));
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn test_verify_uses_backend_index_of_selected_row() {
        let mut app = App::new("http://localhost:8545", "0x0");
        app.apply_state(connected(vec![record(0, 0xa), record(1, 0xb), record(2, 0xc)]));

        app.select_next();
        app.verify_selected();

        // Row 1 of the latest-first view is backend entry 1
        assert_eq!(
            app.take_commands(),
            vec![RuntimeCommand::VerifyAttendance { log_index: 1 }]
        );
    }

    #[test]
    fn test_selection_clamped_when_log_shrinks() {
        let mut app = App::new("", "");
        app.apply_state(connected(vec![record(0, 0xa), record(1, 0xb), record(2, 0xc)]));
        app.select_next();
        app.select_next();
        app.select_next();
        assert_eq!(app.selected_log, 2);

        app.apply_state(connected(vec![record(0, 0xa)]));
        assert_eq!(app.selected_log, 0);
    }

    #[test]
    fn test_empty_name_prompt_does_not_send() {
        let mut app = App::new("", "");
        app.apply_state(connected(Vec::new()));
        app.begin_register();
        assert_eq!(app.input_mode, InputMode::Prompt(PromptKind::Name));

        app.command.input = "   ".into();
        assert!(!app.can_confirm_name());
        app.apply_prompt(PromptKind::Name);
        assert!(app.take_commands().is_empty());

        app.command.input = " Kim ".into();
        app.apply_prompt(PromptKind::Name);
        assert_eq!(
            app.take_commands(),
            vec![RuntimeCommand::Register { name: "Kim".into() }]
        );
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_register_prompt_requires_connection() {
        let mut app = App::new("", "");
        app.begin_register();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(
            app.status_text().map(|(text, _)| text),
            Some("connect a wallet first")
        );
    }

    #[test]
    fn test_cycle_account_requests_next() {
        let mut app = App::new("", "");
        app.apply_state(connected(Vec::new()));
        app.cycle_account();
        assert_eq!(
            app.take_commands(),
            vec![RuntimeCommand::SwitchAccount {
                account: Address::repeat_byte(0x02)
            }]
        );
    }

    #[test]
    fn test_command_line_maps_to_runtime_commands() {
        let mut app = App::new("", "");
        for input in ["connect", "submit", "verify #4", "refresh"] {
            app.enter_command();
            app.command.input = input.into();
            app.apply_command();
        }
        assert_eq!(
            app.take_commands(),
            vec![
                RuntimeCommand::Connect,
                RuntimeCommand::SubmitAttendance,
                RuntimeCommand::VerifyAttendance { log_index: 4 },
                RuntimeCommand::Refresh,
            ]
        );

        app.enter_command();
        app.command.input = "account nope".into();
        app.apply_command();
        assert!(app.take_commands().is_empty());
        assert_eq!(
            app.status_text().map(|(text, level)| (text, level)),
            Some(("Invalid address: nope", StatusLevel::Warn))
        );
    }
}

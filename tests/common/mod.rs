//! In-memory registry node and wallet for driving the sync core
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy_dyn_abi::DynSolValue;
use alloy_sol_types::SolCall;
use futures::FutureExt;
use tokio::sync::{mpsc, Notify};

use rollcall::domain::{Finalized, LedgerReader, PendingTx, ProviderError, WalletProvider};
use rollcall::infrastructure::ethereum::contract::IAttendanceRegistry::{
    getAttendanceLogCall, getTop3StudentsCall, registerStudentCall, studentsCall,
    submitAttendanceCall, verifyAttendanceCall,
};
use rollcall::sync::{ActionController, SyncOrchestrator};

pub fn contract() -> Address {
    Address::repeat_byte(0xcc)
}

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb2)
}

/// Lets a test hold an operation open and observe that it started
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Student {
    pub name: String,
    pub total_attendance: u64,
    pub total_late_or_absent: u64,
    pub total_checks: u64,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub student: Address,
    pub timestamp: u64,
    pub status: u8,
    pub verifiers: u64,
    pub message: String,
}

#[derive(Default)]
struct LedgerState {
    students: HashMap<Address, Student>,
    leaderboard: Vec<(String, u64)>,
    log: Vec<Entry>,
    fail_reads: Option<String>,
    registration_gates: HashMap<Address, Arc<Gate>>,
}

/// Registry contract state answering `eth_call` with ABI-encoded data
#[derive(Default)]
pub struct ScriptedLedger {
    state: Mutex<LedgerState>,
}

impl ScriptedLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_student(&self, account: Address, name: &str) {
        self.lock().students.insert(
            account,
            Student {
                name: name.to_string(),
                ..Student::default()
            },
        );
    }

    pub fn set_leaderboard(&self, entries: &[(&str, u64)]) {
        self.lock().leaderboard = entries
            .iter()
            .map(|(name, raw)| (name.to_string(), *raw))
            .collect();
    }

    pub fn push_entry(&self, student: Address, status: u8, message: &str) {
        let mut state = self.lock();
        let timestamp = 1_700_000_000 + state.log.len() as u64 * 60;
        state.log.push(Entry {
            student,
            timestamp,
            status,
            verifiers: 0,
            message: message.to_string(),
        });
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    pub fn fail_reads(&self, message: Option<&str>) {
        self.lock().fail_reads = message.map(str::to_string);
    }

    /// Hold the next registration read for `account` until the gate opens
    pub fn gate_registration(&self, account: Address) -> Arc<Gate> {
        let gate = Gate::new();
        self.lock()
            .registration_gates
            .insert(account, Arc::clone(&gate));
        gate
    }

    pub fn clear_gates(&self) {
        self.lock().registration_gates.clear();
    }

    pub fn student(&self, account: Address) -> Student {
        self.lock().students.get(&account).cloned().unwrap_or_default()
    }

    pub fn entry(&self, index: usize) -> Entry {
        self.lock().log[index].clone()
    }

    /// Apply a mined transaction
    fn execute(&self, from: Address, input: &[u8]) -> Result<(), String> {
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| "short input".to_string())?;
        let mut state = self.lock();
        if selector == registerStudentCall::SELECTOR {
            let call = registerStudentCall::abi_decode(input).map_err(|e| e.to_string())?;
            let student = state.students.entry(from).or_default();
            if !student.name.is_empty() {
                return Err("execution reverted: Student already registered".into());
            }
            student.name = call.name;
        } else if selector == submitAttendanceCall::SELECTOR {
            let timestamp = 1_700_000_000 + state.log.len() as u64 * 60;
            state.log.push(Entry {
                student: from,
                timestamp,
                status: 1,
                verifiers: 0,
                message: "Present".into(),
            });
            state.students.entry(from).or_default().total_attendance += 1;
        } else if selector == verifyAttendanceCall::SELECTOR {
            let call = verifyAttendanceCall::abi_decode(input).map_err(|e| e.to_string())?;
            let index: usize = call.logIndex.saturating_to();
            let entry = state
                .log
                .get_mut(index)
                .ok_or_else(|| "execution reverted: Invalid log index".to_string())?;
            entry.verifiers += 1;
            state.students.entry(from).or_default().total_checks += 1;
        } else {
            return Err("execution reverted".into());
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl LedgerReader for ScriptedLedger {
    async fn call(&self, request: TransactionRequest) -> Result<Bytes, ProviderError> {
        let input = request.input.input().cloned().unwrap_or_default();
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ProviderError::Transport("empty calldata".into()))?;

        if let Some(message) = self.lock().fail_reads.clone() {
            return Err(ProviderError::Transport(message));
        }

        let encoded = if selector == studentsCall::SELECTOR {
            let call = studentsCall::abi_decode(&input)
                .map_err(|e| ProviderError::Transport(e.to_string()))?;
            let gate = self.lock().registration_gates.remove(&call.student);
            if let Some(gate) = gate {
                gate.pass().await;
                if let Some(message) = self.lock().fail_reads.clone() {
                    return Err(ProviderError::Transport(message));
                }
            }
            let student = self.student(call.student);
            DynSolValue::Tuple(vec![
                DynSolValue::String(student.name),
                uint(student.total_attendance),
                uint(student.total_late_or_absent),
                uint(student.total_checks),
            ])
            .abi_encode_params()
        } else if selector == getTop3StudentsCall::SELECTOR {
            let board = self.lock().leaderboard.clone();
            DynSolValue::Tuple(vec![
                DynSolValue::Array(
                    board
                        .iter()
                        .map(|(name, _)| DynSolValue::String(name.clone()))
                        .collect(),
                ),
                DynSolValue::Array(board.iter().map(|(_, raw)| uint(*raw)).collect()),
            ])
            .abi_encode_params()
        } else if selector == getAttendanceLogCall::SELECTOR {
            let log = self.lock().log.clone();
            let entries = log
                .into_iter()
                .map(|entry| {
                    DynSolValue::Tuple(vec![
                        DynSolValue::Address(entry.student),
                        uint(entry.timestamp),
                        DynSolValue::Uint(U256::from(entry.status), 8),
                        uint(entry.verifiers),
                        DynSolValue::String(entry.message),
                    ])
                })
                .collect();
            DynSolValue::Tuple(vec![DynSolValue::Array(entries)]).abi_encode_params()
        } else {
            return Err(ProviderError::Rejected("execution reverted".into()));
        };
        Ok(Bytes::from(encoded))
    }

    fn endpoint_name(&self) -> String {
        "scripted".into()
    }
}

fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

/// Wallet that signs for a fixed account list and mines into the ledger
pub struct ScriptedWallet {
    ledger: Arc<ScriptedLedger>,
    accounts: Mutex<Vec<Address>>,
    connect_error: Mutex<Option<ProviderError>>,
    send_error: Mutex<Option<ProviderError>>,
    finalize_gate: Mutex<Option<Arc<Gate>>>,
    notifications: Mutex<Option<mpsc::Sender<Vec<Address>>>>,
    sent: Mutex<Vec<TransactionRequest>>,
    nonce: AtomicU64,
}

impl ScriptedWallet {
    pub fn new(ledger: Arc<ScriptedLedger>, accounts: Vec<Address>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            accounts: Mutex::new(accounts),
            connect_error: Mutex::new(None),
            send_error: Mutex::new(None),
            finalize_gate: Mutex::new(None),
            notifications: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            nonce: AtomicU64::new(0),
        })
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    /// Decline the next `request_accounts` call
    pub fn decline_connection(&self, message: &str) {
        *self.connect_error.lock().unwrap() = Some(ProviderError::Rejected(message.into()));
    }

    pub fn reject_next_send(&self, message: &str) {
        *self.send_error.lock().unwrap() = Some(ProviderError::Rejected(message.into()));
    }

    /// Hold finalization of every following transaction until the gate opens
    pub fn gate_finalization(&self) -> Arc<Gate> {
        let gate = Gate::new();
        *self.finalize_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Push an `accountsChanged` notification to the subscriber
    pub async fn emit(&self, accounts: Vec<Address>) {
        self.set_accounts(accounts.clone());
        let tx = self.notifications.lock().unwrap().clone();
        if let Some(tx) = tx {
            tx.send(accounts).await.unwrap();
        }
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_selectors(&self) -> Vec<[u8; 4]> {
        self.sent()
            .iter()
            .filter_map(|req| req.input.input().and_then(|data| data[..4].try_into().ok()))
            .collect()
    }
}

#[async_trait::async_trait]
impl WalletProvider for ScriptedWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        if let Some(err) = self.connect_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    fn subscribe_accounts(&self) -> mpsc::Receiver<Vec<Address>> {
        let (tx, rx) = mpsc::channel(8);
        *self.notifications.lock().unwrap() = Some(tx);
        rx
    }

    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<PendingTx, ProviderError> {
        if let Some(err) = self.send_error.lock().unwrap().take() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(request.clone());

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = TxHash::with_last_byte(nonce as u8);
        let from = request.from.unwrap_or_default();
        let input = request.input.input().cloned().unwrap_or_default();
        let ledger = Arc::clone(&self.ledger);
        let gate = self.finalize_gate.lock().unwrap().clone();

        let confirmation = async move {
            if let Some(gate) = gate {
                gate.pass().await;
            }
            ledger
                .execute(from, &input)
                .map_err(ProviderError::Rejected)?;
            Ok(Finalized {
                tx_hash,
                block_number: Some(nonce),
            })
        }
        .boxed();
        Ok(PendingTx::new(tx_hash, confirmation))
    }
}

pub struct Harness {
    pub ledger: Arc<ScriptedLedger>,
    pub wallet: Arc<ScriptedWallet>,
    pub sync: SyncOrchestrator,
    pub actions: ActionController,
}

impl Harness {
    pub fn new(accounts: Vec<Address>) -> Self {
        let ledger = ScriptedLedger::new();
        let wallet = ScriptedWallet::new(Arc::clone(&ledger), accounts);
        let sync = SyncOrchestrator::new(
            contract(),
            Arc::clone(&ledger) as Arc<dyn LedgerReader>,
            Some(Arc::clone(&wallet) as Arc<dyn WalletProvider>),
        );
        let actions = ActionController::new(sync.clone());
        Self {
            ledger,
            wallet,
            sync,
            actions,
        }
    }

    pub fn status(&self) -> Option<String> {
        self.sync.state().status.as_ref().map(|s| s.text.clone())
    }
}

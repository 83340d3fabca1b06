//! In-memory venue for tests
//!
//! Implements every collaborator trait against a balance table. Routes
//! carry their own quote, the builder encodes drafts as JSON and `submit`
//! replays the encoded operations on the table, so strategies see their
//! trades reflected in later balance reads.

use async_trait::async_trait;
use num_bigint::BigInt;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::chain::{ChainClient, RouteResolver, TransactionBuilder, WalletFactory};
use crate::error::{Error, Result};
use crate::types::{
    Address, Amount, Asset, BalanceChange, BuiltTransaction, ExecutionStatus, GasCost, Route,
    RouteBundle, SimulationReport, SubmissionResult, TransactionDraft,
};
use crate::wallet::{SecretKey, Wallet};

/// Call counters per collaborator method
#[derive(Debug, Default)]
pub(crate) struct CallCounters {
    resolve: AtomicUsize,
    build: AtomicUsize,
    simulate: AtomicUsize,
    submit: AtomicUsize,
    balance: AtomicUsize,
    generate: AtomicUsize,
}

impl CallCounters {
    pub fn resolve(&self) -> usize {
        self.resolve.load(Ordering::SeqCst)
    }

    pub fn build(&self) -> usize {
        self.build.load(Ordering::SeqCst)
    }

    pub fn simulate(&self) -> usize {
        self.simulate.load(Ordering::SeqCst)
    }

    pub fn submit(&self) -> usize {
        self.submit.load(Ordering::SeqCst)
    }

    pub fn balance(&self) -> usize {
        self.balance.load(Ordering::SeqCst)
    }

    pub fn generate(&self) -> usize {
        self.generate.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct VenueState {
    balances: HashMap<(Address, Asset), Amount>,
    /// Output per unit of input as (numerator, denominator)
    rates: HashMap<(Asset, Asset), (u64, u64)>,
    no_route: HashSet<(Asset, Asset)>,
    empty_route: HashSet<(Asset, Asset)>,
    failing_simulation: HashSet<Asset>,
    rejected_submission: Option<String>,
    /// Successful balance reads left before `balance_failures` kick in
    balance_failures_after: u32,
    balance_failures: u32,
    wallet_addresses: VecDeque<Address>,
    generated: u8,
    gas: GasCost,
    submitted: Vec<Value>,
}

/// Scripted stand-in for the aggregator, builder, full node and key service
pub(crate) struct StubVenue {
    state: Mutex<VenueState>,
    pub calls: CallCounters,
}

impl StubVenue {
    pub fn new() -> Self {
        let state = VenueState {
            gas: GasCost {
                computation_cost: Amount::from(1_000_000u64),
                storage_cost: Amount::from(2_000_000u64),
                storage_rebate: Amount::from(500_000u64),
            },
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            calls: CallCounters::default(),
        }
    }

    pub fn set_balance(&self, address: &Address, asset: &Asset, amount: u64) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert((address.clone(), asset.clone()), Amount::from(amount));
    }

    pub fn balance(&self, address: &Address, asset: &Asset) -> Amount {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&(address.clone(), asset.clone()))
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn set_rate(&self, from: &Asset, to: &Asset, numerator: u64, denominator: u64) {
        self.state
            .lock()
            .unwrap()
            .rates
            .insert((from.clone(), to.clone()), (numerator, denominator));
    }

    /// Aggregator answers with no route at all
    pub fn remove_route(&self, from: &Asset, to: &Asset) {
        self.state
            .lock()
            .unwrap()
            .no_route
            .insert((from.clone(), to.clone()));
    }

    /// Aggregator answers with an empty route list
    pub fn empty_route(&self, from: &Asset, to: &Asset) {
        self.state
            .lock()
            .unwrap()
            .empty_route
            .insert((from.clone(), to.clone()));
    }

    /// Dry runs of swaps selling `asset` report failure
    pub fn fail_simulation_for(&self, asset: &Asset) {
        self.state
            .lock()
            .unwrap()
            .failing_simulation
            .insert(asset.clone());
    }

    /// Every execution reports a failed status
    pub fn reject_submissions(&self, reason: &str) {
        self.state.lock().unwrap().rejected_submission = Some(reason.to_string());
    }

    pub fn fail_next_balance_queries(&self, count: u32) {
        self.fail_balance_queries_after(0, count);
    }

    /// Let `ok` balance reads through, then fail the next `count`
    pub fn fail_balance_queries_after(&self, ok: u32, count: u32) {
        let mut state = self.state.lock().unwrap();
        state.balance_failures_after = ok;
        state.balance_failures = count;
    }

    /// Addresses handed out by `generate` before falling back to fresh ones
    pub fn queue_wallet_addresses(&self, addresses: Vec<Address>) {
        self.state.lock().unwrap().wallet_addresses.extend(addresses);
    }

    pub fn set_gas(&self, computation: u64, storage: u64, rebate: u64) {
        self.state.lock().unwrap().gas = GasCost {
            computation_cost: Amount::from(computation),
            storage_cost: Amount::from(storage),
            storage_rebate: Amount::from(rebate),
        };
    }

    /// Decoded transactions in submission order
    pub fn submitted(&self) -> Vec<Value> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn wallet(address: &str, seed: u8) -> Wallet {
        let secret = SecretKey::from_ed25519_bytes(&[seed; 32]).unwrap();
        Wallet::new(address.parse().unwrap(), secret)
    }

    fn quote(state: &VenueState, from: &Asset, to: &Asset, amount: &Amount) -> Amount {
        let (num, den) = state
            .rates
            .get(&(from.clone(), to.clone()))
            .copied()
            .unwrap_or((1, 1));
        Amount::from(amount.as_biguint() * num / den)
    }
}

fn decode(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

fn amount_field(value: &Value, field: &str) -> Amount {
    serde_json::from_value(value[field].clone()).unwrap()
}

fn asset_field(value: &Value, field: &str) -> Asset {
    value[field].as_str().unwrap().parse().unwrap()
}

fn adjust(balances: &mut HashMap<(Address, Asset), Amount>, key: (Address, Asset), delta: &BigInt) {
    let current = balances.get(&key).cloned().unwrap_or_else(Amount::zero);
    let next = current.to_bigint() + delta;
    let next = next.to_biguint().unwrap_or_default();
    balances.insert(key, Amount::from(next));
}

#[async_trait]
impl RouteResolver for StubVenue {
    async fn resolve_route(
        &self,
        from: &Asset,
        to: &Asset,
        amount: &Amount,
        _by_amount_in: bool,
    ) -> Result<Option<RouteBundle>> {
        self.calls.resolve.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let pair = (from.clone(), to.clone());

        if state.no_route.contains(&pair) {
            return Ok(None);
        }

        let amount_out = Self::quote(&state, from, to, amount);
        let routes = if state.empty_route.contains(&pair) {
            Vec::new()
        } else {
            vec![Route(json!({
                "from": from.to_string(),
                "target": to.to_string(),
                "amount_in": amount.to_string(),
                "amount_out": amount_out.to_string(),
            }))]
        };

        Ok(Some(RouteBundle {
            routes,
            amount_in: amount.clone(),
            amount_out,
        }))
    }
}

#[async_trait]
impl TransactionBuilder for StubVenue {
    async fn build(&self, draft: &TransactionDraft) -> Result<BuiltTransaction> {
        self.calls.build.fetch_add(1, Ordering::SeqCst);
        let encoded = json!({
            "sender": draft.sender().as_str(),
            "gas_budget": draft.gas_budget().to_string(),
            "operations": draft.operations(),
        });
        Ok(BuiltTransaction::new(
            serde_json::to_vec(&encoded)?,
            draft.sender().clone(),
            draft.gas_budget().clone(),
        ))
    }
}

#[async_trait]
impl ChainClient for StubVenue {
    async fn simulate(&self, tx: &BuiltTransaction) -> Result<SimulationReport> {
        self.calls.simulate.fetch_add(1, Ordering::SeqCst);
        let decoded = decode(tx.bytes())?;
        let state = self.state.lock().unwrap();

        let failing = decoded["operations"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|op| op["kind"] == "swap")
            .any(|op| state.failing_simulation.contains(&asset_field(&op["routes"][0], "from")));

        let status = if failing {
            ExecutionStatus::Failure("MoveAbort in router::swap".into())
        } else {
            ExecutionStatus::Success
        };

        Ok(SimulationReport {
            status,
            gas: state.gas.clone(),
        })
    }

    async fn submit(&self, tx: &BuiltTransaction, signer: &Wallet) -> Result<SubmissionResult> {
        let n = self.calls.submit.fetch_add(1, Ordering::SeqCst);
        let decoded = decode(tx.bytes())?;
        let mut state = self.state.lock().unwrap();
        state.submitted.push(decoded.clone());
        let digest = format!("digest-{}", n + 1);

        if let Some(reason) = state.rejected_submission.clone() {
            return Ok(SubmissionResult {
                digest,
                status: ExecutionStatus::Failure(reason),
                balance_changes: Vec::new(),
                gas_used: state.gas.clone(),
            });
        }

        let sender = signer.address.clone();
        let mut changes: Vec<BalanceChange> = Vec::new();
        let mut record = |owner: &Address, asset: Asset, amount: BigInt| {
            changes.push(BalanceChange {
                owner: Some(owner.clone()),
                asset,
                amount,
            });
        };

        for op in decoded["operations"].as_array().into_iter().flatten() {
            match op["kind"].as_str() {
                Some("swap") => {
                    let route = &op["routes"][0];
                    let from = asset_field(route, "from");
                    let to = asset_field(route, "target");
                    let amount_in = amount_field(route, "amount_in").to_bigint();
                    let amount_out = amount_field(route, "amount_out").to_bigint();
                    adjust(&mut state.balances, (sender.clone(), from.clone()), &-amount_in.clone());
                    adjust(&mut state.balances, (sender.clone(), to.clone()), &amount_out);
                    record(&sender, from, -amount_in);
                    record(&sender, to, amount_out);
                }
                Some("transfer") => {
                    let recipient: Address = op["recipient"].as_str().unwrap().parse().unwrap();
                    let asset = asset_field(op, "asset");
                    let amount = amount_field(op, "amount").to_bigint();
                    adjust(&mut state.balances, (sender.clone(), asset.clone()), &-amount.clone());
                    adjust(&mut state.balances, (recipient.clone(), asset.clone()), &amount);
                    record(&sender, asset.clone(), -amount.clone());
                    record(&recipient, asset, amount);
                }
                _ => {}
            }
        }

        let gas = state.gas.clone();
        let fee = -(gas.computation_cost.to_bigint() + gas.storage_cost.to_bigint()
            - gas.storage_rebate.to_bigint());
        adjust(&mut state.balances, (sender.clone(), Asset::sui()), &fee);
        record(&sender, Asset::sui(), fee);

        Ok(SubmissionResult {
            digest,
            status: ExecutionStatus::Success,
            balance_changes: changes,
            gas_used: gas,
        })
    }

    async fn query_balance(&self, address: &Address, asset: &Asset) -> Result<Amount> {
        self.calls.balance.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.balance_failures_after > 0 {
            state.balance_failures_after -= 1;
        } else if state.balance_failures > 0 {
            state.balance_failures -= 1;
            return Err(Error::Transient("connection reset".into()));
        }
        Ok(state
            .balances
            .get(&(address.clone(), asset.clone()))
            .cloned()
            .unwrap_or_else(Amount::zero))
    }

    async fn all_balances(&self, address: &Address) -> Result<Vec<(Asset, Amount)>> {
        let state = self.state.lock().unwrap();
        let mut held: Vec<(Asset, Amount)> = state
            .balances
            .iter()
            .filter(|((owner, _), _)| owner == address)
            .map(|((_, asset), amount)| (asset.clone(), amount.clone()))
            .collect();
        held.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        Ok(held)
    }
}

#[async_trait]
impl WalletFactory for StubVenue {
    async fn generate(&self) -> Result<Wallet> {
        self.calls.generate.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.generated = state.generated.wrapping_add(1);
        let seed = state.generated;
        let address = match state.wallet_addresses.pop_front() {
            Some(address) => address,
            None => format!("0xd15{:04x}", seed).parse()?,
        };
        Ok(Wallet::new(address, SecretKey::from_ed25519_bytes(&[seed; 32])?))
    }

    async fn restore(&self, secret: &SecretKey) -> Result<Wallet> {
        Ok(Wallet::new("0xa11ce".parse()?, secret.clone()))
    }
}

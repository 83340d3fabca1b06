//! Core value types shared by the orchestrator, the cache and the strategies

use lazy_static::lazy_static;
use num_bigint::{BigInt, BigUint};
use num_traits::{ToPrimitive, Zero};
use regex::Regex;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Decimals of the native SUI coin (1 SUI = 10^9 MIST)
pub const SUI_DECIMALS: u32 = 9;

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0[xX]([0-9a-fA-F]{1,64})$").unwrap();
    static ref ASSET_RE: Regex = Regex::new(
        r"^(0[xX][0-9a-fA-F]{1,64})::([A-Za-z_][A-Za-z0-9_]*)::([A-Za-z_][A-Za-z0-9_]*(?:<.+>)?)$"
    )
    .unwrap();
    static ref TYPE_ARG_ADDRESS_RE: Regex = Regex::new(r"0[xX]([0-9a-fA-F]{1,64})::").unwrap();
}

/// 32-byte account address, normalized to `0x` + 64 lowercase hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(64)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> String {
        format!("{}..{}", &self.0[..8], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ADDRESS_RE
            .captures(s.trim())
            .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
        Ok(Self(format!("0x{:0>64}", caps[1].to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fungible coin type: `package::module::Name`, compared structurally
///
/// Every address is normalized, type arguments included, so
/// `0x2::sui::SUI` and the long `0x000..02::sui::SUI` form are the same
/// asset, as are `LP<0x2::sui::SUI>` and its long form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    package: Address,
    module: String,
    name: String,
}

impl Asset {
    /// The native SUI coin
    pub fn sui() -> Self {
        Self {
            package: "0x2".parse().unwrap_or_else(|_| Address::zero()),
            module: "sui".to_string(),
            name: "SUI".to_string(),
        }
    }

    pub fn package(&self) -> &Address {
        &self.package
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Struct name without type arguments, used as a display symbol
    pub fn symbol(&self) -> &str {
        self.name.split('<').next().unwrap_or(&self.name)
    }
}

impl FromStr for Asset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ASSET_RE
            .captures(s.trim())
            .ok_or_else(|| Error::InvalidAsset(s.to_string()))?;
        let name = TYPE_ARG_ADDRESS_RE.replace_all(&caps[3], |c: &regex::Captures| {
            format!("0x{:0>64}::", c[1].to_ascii_lowercase())
        });
        Ok(Self {
            package: caps[1].parse()?,
            module: caps[2].to_string(),
            name: name.chars().filter(|c| !c.is_whitespace()).collect(),
        })
    }
}

impl TryFrom<String> for Asset {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Asset> for String {
    fn from(a: Asset) -> Self {
        a.to_string()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.name)
    }
}

/// Non-negative arbitrary-precision amount in an asset's smallest unit
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    pub fn to_bigint(&self) -> BigInt {
        BigInt::from(self.0.clone())
    }

    /// `self * count`, used for batched swaps
    pub fn times(&self, count: u32) -> Amount {
        Amount(&self.0 * BigUint::from(count))
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 >= other.0 {
            Some(Amount(&self.0 - &other.0))
        } else {
            None
        }
    }

    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        self.checked_sub(other).unwrap_or_default()
    }

    /// Signed change from `before` to `self`
    pub fn delta_since(&self, before: &Amount) -> BigInt {
        self.to_bigint() - before.to_bigint()
    }

    /// Render in whole units, e.g. `1500000000` with 9 decimals is `1.5`
    pub fn display_units(&self, decimals: u32) -> String {
        let scale = BigUint::from(10u32).pow(decimals);
        let whole = &self.0 / &scale;
        let frac = &self.0 % &scale;
        if decimals == 0 || frac.is_zero() {
            return whole.to_string();
        }
        let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<BigUint> for Amount {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAmount(s.to_string()));
        }
        BigUint::from_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidAmount(format!("{}: {}", s, e)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.map(|a| a.0).sum())
    }
}

// Chain JSON carries u64/u128 quantities as decimal strings
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount::from)
                    .map_err(|_| E::custom(format!("negative amount: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Opaque route returned by the aggregator, passed through unmodified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(pub serde_json::Value);

/// Ordered candidate routes for one quote
#[derive(Debug, Clone)]
pub struct RouteBundle {
    pub routes: Vec<Route>,
    pub amount_in: Amount,
    pub amount_out: Amount,
}

impl RouteBundle {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// One operation appended to a draft by the builder
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftOperation {
    Swap {
        routes: Vec<Route>,
        slippage: Decimal,
        by_amount_in: bool,
    },
    Transfer {
        recipient: Address,
        asset: Asset,
        amount: Amount,
    },
}

/// Mutable transaction under construction, owned by one attempt
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    sender: Address,
    gas_budget: Amount,
    operations: Vec<DraftOperation>,
}

impl TransactionDraft {
    pub fn new(sender: Address, gas_budget: Amount) -> Self {
        Self {
            sender,
            gas_budget,
            operations: Vec::new(),
        }
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn gas_budget(&self) -> &Amount {
        &self.gas_budget
    }

    pub fn set_gas_budget(&mut self, budget: Amount) {
        self.gas_budget = budget;
    }

    pub fn push(&mut self, op: DraftOperation) {
        self.operations.push(op);
    }

    pub fn operations(&self) -> &[DraftOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Encoded transaction; its gas budget is fixed at build time
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTransaction {
    bytes: Vec<u8>,
    sender: Address,
    gas_budget: Amount,
}

impl BuiltTransaction {
    pub fn new(bytes: Vec<u8>, sender: Address, gas_budget: Amount) -> Self {
        Self {
            bytes,
            sender,
            gas_budget,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn gas_budget(&self) -> &Amount {
        &self.gas_budget
    }
}

/// Execution status reported by a dry run or an execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// Gas cost components in MIST
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasCost {
    pub computation_cost: Amount,
    pub storage_cost: Amount,
    pub storage_rebate: Amount,
}

impl GasCost {
    /// Sum of all three components, rebate included
    pub fn total(&self) -> Amount {
        [&self.computation_cost, &self.storage_cost, &self.storage_rebate]
            .into_iter()
            .cloned()
            .sum()
    }
}

/// Result of a dry run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub status: ExecutionStatus,
    pub gas: GasCost,
}

/// One balance change reported by an execution
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    pub owner: Option<Address>,
    pub asset: Asset,
    pub amount: BigInt,
}

/// Outcome of executing a signed transaction
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub digest: String,
    pub status: ExecutionStatus,
    pub balance_changes: Vec<BalanceChange>,
    pub gas_used: GasCost,
}

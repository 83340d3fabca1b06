//! Gas budget estimation from dry-run results

use num_bigint::BigUint;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Amount, ExecutionStatus, SimulationReport};

/// Turns a successful dry run into a gas budget
pub struct BudgetEstimator;

impl BudgetEstimator {
    /// `ceil((computation + storage + rebate) * margin)`
    ///
    /// The margin is applied as an exact rational, so no precision is lost
    /// for large costs. Fails with `SimulationFailed` if the dry run did
    /// not succeed.
    pub fn estimate(report: &SimulationReport, margin: Decimal) -> Result<Amount> {
        if let ExecutionStatus::Failure(reason) = &report.status {
            return Err(Error::SimulationFailed(reason.clone()));
        }
        if margin < Decimal::ONE {
            return Err(Error::Config(format!("gas margin {} is below 1", margin)));
        }

        let total = report.gas.total();
        let mantissa = u128::try_from(margin.mantissa())
            .map_err(|_| Error::Internal(format!("negative gas margin {}", margin)))?;
        let denominator = BigUint::from(10u32).pow(margin.scale());

        let scaled = total.as_biguint() * BigUint::from(mantissa);
        let budget = (scaled + &denominator - 1u32) / &denominator;

        debug!("Gas total {} x {} -> budget {}", total, margin, budget);
        Ok(Amount::from(budget))
    }
}

//! Loan comparison: effective APR by Newton-Raphson, total cost, and the
//! opportunity cost of paying from a mortgage offset account instead.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FinanceError;

/// Maximum Newton-Raphson iterations for the APR solver.
pub const MAX_ITERATIONS: usize = 200;
/// Convergence threshold on successive per-period rate estimates.
pub const TOLERANCE: f64 = 1e-12;

/// How often repayments (and the periodic fee) fall due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Weekly,
    Fortnightly,
    #[default]
    Monthly,
    Quarterly,
    Annually,
}

impl PaymentFrequency {
    pub const fn per_year(self) -> u32 {
        match self {
            Self::Weekly => 52,
            Self::Fortnightly => 26,
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Annually => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Weekly => "week",
            Self::Fortnightly => "fortnight",
            Self::Monthly => "month",
            Self::Quarterly => "quarter",
            Self::Annually => "year",
        }
    }
}

/// One lender's terms. The principal is supplied when the option is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoanOption {
    pub name: String,
    pub term_years: u32,
    /// Nominal annual interest rate (%).
    pub interest_rate_pct: f64,
    /// Flat fee added to every repayment ($).
    pub fee_amount: f64,
    pub fee_frequency: PaymentFrequency,
    /// One-off fee paid with the first repayment ($).
    pub establishment_fee: f64,
    pub enabled: bool,
}

impl Default for LoanOption {
    fn default() -> Self {
        Self {
            name: "Loan".to_string(),
            term_years: 5,
            interest_rate_pct: 0.0,
            fee_amount: 0.0,
            fee_frequency: PaymentFrequency::Monthly,
            establishment_fee: 0.0,
            enabled: true,
        }
    }
}

/// Repayment totals for one loan option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoanCost {
    pub payment_per_period: f64,
    pub total_payments: u32,
    pub total_interest: f64,
    pub total_fees: f64,
    /// Interest plus fees.
    pub total_cost: f64,
    pub total_repaid: f64,
}

impl LoanOption {
    pub fn payments_per_year(&self) -> u32 {
        self.fee_frequency.per_year()
    }

    fn total_payments(&self) -> Result<u32, FinanceError> {
        let n = self.term_years * self.payments_per_year();
        if n == 0 {
            return Err(FinanceError::NoPayments {
                term_years: self.term_years,
                payments_per_year: self.payments_per_year(),
            });
        }
        Ok(n)
    }

    /// Principal-and-interest part of each repayment, excluding fees.
    fn base_payment(&self, principal: f64, n: u32) -> f64 {
        if self.interest_rate_pct > 0.0 {
            let r = self.interest_rate_pct / 100.0 / f64::from(self.payments_per_year());
            let growth = (1.0 + r).powi(n as i32);
            principal * r * growth / (growth - 1.0)
        } else {
            principal / f64::from(n)
        }
    }

    /// # Errors
    ///
    /// [`FinanceError::NoPayments`] if the term has no repayments.
    pub fn cost(&self, principal: f64) -> Result<LoanCost, FinanceError> {
        let n = self.total_payments()?;
        let base = self.base_payment(principal, n);
        let total_interest = if self.interest_rate_pct > 0.0 {
            base * f64::from(n) - principal
        } else {
            0.0
        };
        let total_fees = self.fee_amount * f64::from(n) + self.establishment_fee;
        let total_cost = total_interest + total_fees;
        Ok(LoanCost {
            payment_per_period: base + self.fee_amount,
            total_payments: n,
            total_interest,
            total_fees,
            total_cost,
            total_repaid: principal + total_cost,
        })
    }

    /// Effective annual rate (%) implied by the repayment cash flows.
    ///
    /// Solves `principal = Σ payment_i / (1 + r)^i` for the per-period rate
    /// `r`, with the establishment fee added to the first payment, then
    /// annualises as `(1 + r)^payments_per_year − 1`.
    ///
    /// # Errors
    ///
    /// [`FinanceError::NoPayments`] for an empty term, and
    /// [`FinanceError::NonConvergence`] when Newton-Raphson does not settle
    /// within [`MAX_ITERATIONS`] or leaves the valid domain.
    pub fn effective_apr(&self, principal: f64) -> Result<f64, FinanceError> {
        let n = self.total_payments()?;
        if self.interest_rate_pct == 0.0 && self.fee_amount == 0.0 && self.establishment_fee == 0.0 {
            return Ok(0.0);
        }

        let payment = self.base_payment(principal, n) + self.fee_amount;
        let ppy = f64::from(self.payments_per_year());
        let mut r = 0.001 / ppy;

        for iteration in 1..=MAX_ITERATIONS {
            let (npv, dnpv) = npv_and_derivative(principal, payment, self.establishment_fee, n, r);
            if dnpv == 0.0 || !dnpv.is_finite() {
                break;
            }
            let next = r - npv / dnpv;
            if !next.is_finite() || next <= -1.0 {
                break;
            }
            if (next - r).abs() < TOLERANCE {
                debug!(loan = %self.name, iteration, rate = next, "APR solver converged");
                return Ok(((1.0 + next).powf(ppy) - 1.0) * 100.0);
            }
            r = next;
        }

        Err(FinanceError::NonConvergence {
            iterations: MAX_ITERATIONS,
        })
    }
}

/// Net present value of the repayments less the principal, and its
/// derivative with respect to the per-period rate.
fn npv_and_derivative(principal: f64, payment: f64, first_extra: f64, n: u32, r: f64) -> (f64, f64) {
    let mut npv = -principal;
    let mut dnpv = 0.0;
    let mut discount = 1.0;
    for i in 1..=n {
        discount *= 1.0 + r;
        let pay = if i == 1 { payment + first_extra } else { payment };
        npv += pay / discount;
        dnpv -= f64::from(i) * pay / (discount * (1.0 + r));
    }
    (npv, dnpv)
}

/// Extra mortgage interest from drawing `principal` out of an offset account
/// and repaying it linearly over `term_years` (average balance is half).
pub fn offset_cost(principal: f64, term_years: u32, mortgage_rate_pct: f64) -> f64 {
    principal / 2.0 * (mortgage_rate_pct / 100.0) * f64::from(term_years)
}

/// A lender option with its solved APR and cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanEvaluation {
    pub name: String,
    pub fee_frequency: PaymentFrequency,
    /// `None` when the rate could not be solved; see `apr_error`.
    pub effective_apr_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apr_error: Option<String>,
    #[serde(flatten)]
    pub cost: LoanCost,
}

/// The cheapest way to fund the battery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub name: String,
    pub total_cost: f64,
    pub effective_apr_pct: f64,
    pub is_offset: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceComparison {
    pub principal: f64,
    pub mortgage_rate_pct: f64,
    pub options: Vec<LoanEvaluation>,
    pub offset_cost: Option<f64>,
    pub recommended: Option<Recommendation>,
}

/// Evaluates every enabled lender and, if requested, the offset account
/// (over the first lender's term), and recommends the lowest total cost.
///
/// A lender whose APR cannot be solved stays in the comparison with the
/// failure recorded, but is never recommended.
///
/// # Errors
///
/// Propagates [`FinanceError::NoPayments`] from a lender with an empty term.
pub fn compare(
    principal: f64,
    lenders: &[LoanOption],
    mortgage_rate_pct: f64,
    compare_offset: bool,
) -> Result<FinanceComparison, FinanceError> {
    let options = lenders
        .iter()
        .filter(|l| l.enabled)
        .map(|l| {
            let cost = l.cost(principal)?;
            let (effective_apr_pct, apr_error) = match l.effective_apr(principal) {
                Ok(apr) => (Some(apr), None),
                Err(e) => {
                    warn!(loan = %l.name, principal, error = %e, "APR unavailable");
                    (None, Some(e.to_string()))
                }
            };
            Ok(LoanEvaluation {
                name: l.name.clone(),
                fee_frequency: l.fee_frequency,
                effective_apr_pct,
                apr_error,
                cost,
            })
        })
        .collect::<Result<Vec<_>, FinanceError>>()?;

    let offset_term = lenders.iter().find(|l| l.enabled).map(|l| l.term_years);
    let offset_cost = offset_term
        .filter(|_| compare_offset)
        .map(|term| offset_cost(principal, term, mortgage_rate_pct));

    let lender_choices = options.iter().filter_map(|o| {
        o.effective_apr_pct.map(|apr| Recommendation {
            name: o.name.clone(),
            total_cost: o.cost.total_cost,
            effective_apr_pct: apr,
            is_offset: false,
        })
    });
    let offset_choice = offset_cost.map(|cost| Recommendation {
        name: "Mortgage offset".to_string(),
        total_cost: cost,
        effective_apr_pct: mortgage_rate_pct,
        is_offset: true,
    });
    let recommended = lender_choices
        .chain(offset_choice)
        .min_by(|a, b| a.total_cost.total_cmp(&b.total_cost));

    Ok(FinanceComparison {
        principal,
        mortgage_rate_pct,
        options,
        offset_cost,
        recommended,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn flat_fee_loan() -> LoanOption {
        LoanOption {
            name: "Flat fee".to_string(),
            term_years: 5,
            fee_amount: 2.30,
            fee_frequency: PaymentFrequency::Weekly,
            ..LoanOption::default()
        }
    }

    fn bank_loan() -> LoanOption {
        LoanOption {
            name: "Bank".to_string(),
            term_years: 5,
            interest_rate_pct: 7.5,
            establishment_fee: 250.0,
            ..LoanOption::default()
        }
    }

    #[test]
    fn flat_fee_apr_is_positive_and_reproducible() {
        let loan = flat_fee_loan();
        let a = loan.effective_apr(10_000.0).unwrap();
        let b = loan.effective_apr(10_000.0).unwrap();
        assert!(a > 0.0);
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        // $119.60/yr of fees on an average balance near $5,000
        assert!(a > 2.0 && a < 3.0, "apr {a}");
    }

    #[test]
    fn fees_on_nothing_never_converge() {
        assert_eq!(
            flat_fee_loan().effective_apr(0.0),
            Err(FinanceError::NonConvergence {
                iterations: MAX_ITERATIONS
            })
        );
        assert_eq!(
            bank_loan().effective_apr(0.0),
            Err(FinanceError::NonConvergence {
                iterations: MAX_ITERATIONS
            })
        );
    }

    #[test]
    fn free_money_has_zero_apr() {
        let loan = LoanOption::default();
        assert_eq!(loan.effective_apr(10_000.0), Ok(0.0));
    }

    #[test]
    fn plain_amortised_loan_apr_matches_compounded_nominal() {
        let loan = LoanOption {
            establishment_fee: 0.0,
            ..bank_loan()
        };
        let apr = loan.effective_apr(10_000.0).unwrap();
        let expected = ((1.0 + 0.075 / 12.0_f64).powi(12) - 1.0) * 100.0;
        assert_abs_diff_eq!(apr, expected, epsilon = 1e-6);
    }

    #[test]
    fn establishment_fee_raises_apr() {
        let with_fee = bank_loan().effective_apr(10_000.0).unwrap();
        let without = LoanOption {
            establishment_fee: 0.0,
            ..bank_loan()
        }
        .effective_apr(10_000.0)
        .unwrap();
        assert!(with_fee > without);
    }

    #[test]
    fn flat_fee_totals() {
        let cost = flat_fee_loan().cost(10_000.0).unwrap();
        assert_eq!(cost.total_payments, 260);
        assert_abs_diff_eq!(cost.payment_per_period, 10_000.0 / 260.0 + 2.30, epsilon = 1e-9);
        assert_abs_diff_eq!(cost.total_fees, 598.0, epsilon = 1e-9);
        assert_eq!(cost.total_interest, 0.0);
        assert_abs_diff_eq!(cost.total_repaid, 10_598.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_term_is_rejected() {
        let loan = LoanOption {
            term_years: 0,
            ..LoanOption::default()
        };
        assert!(matches!(loan.cost(1.0), Err(FinanceError::NoPayments { .. })));
        assert!(matches!(loan.effective_apr(1.0), Err(FinanceError::NoPayments { .. })));
    }

    #[test]
    fn offset_cost_uses_half_balance() {
        assert_abs_diff_eq!(offset_cost(10_000.0, 5, 6.0), 1500.0, epsilon = 1e-9);
    }

    #[test]
    fn recommends_lowest_total_cost() {
        let cmp = compare(10_000.0, &[flat_fee_loan(), bank_loan()], 6.0, true).unwrap();
        assert_eq!(cmp.options.len(), 2);
        assert_eq!(cmp.offset_cost, Some(1500.0));
        let best = cmp.recommended.unwrap();
        // flat fee: $598 vs offset $1,500 vs bank interest > $2,000
        assert_eq!(best.name, "Flat fee");
        assert!(!best.is_offset);
    }

    #[test]
    fn offset_wins_at_low_mortgage_rate() {
        let cmp = compare(10_000.0, &[flat_fee_loan()], 1.0, true).unwrap();
        let best = cmp.recommended.unwrap();
        assert!(best.is_offset);
        assert_abs_diff_eq!(best.total_cost, 250.0, epsilon = 1e-9);
    }

    #[test]
    fn unsolved_apr_is_kept_but_not_recommended() {
        let cmp = compare(0.0, &[flat_fee_loan(), bank_loan()], 6.0, true).unwrap();
        assert_eq!(cmp.options.len(), 2);
        for o in &cmp.options {
            assert_eq!(o.effective_apr_pct, None);
            assert!(o.apr_error.as_deref().is_some_and(|e| e.contains("did not converge")));
        }
        let best = cmp.recommended.unwrap();
        assert!(best.is_offset);
        assert_eq!(best.total_cost, 0.0);

        let without_offset = compare(0.0, &[flat_fee_loan()], 6.0, false).unwrap();
        assert_eq!(without_offset.options.len(), 1);
        assert_eq!(without_offset.recommended, None);
    }

    #[test]
    fn disabled_lenders_are_skipped() {
        let disabled = LoanOption {
            enabled: false,
            ..bank_loan()
        };
        let cmp = compare(10_000.0, &[disabled], 6.0, true).unwrap();
        assert!(cmp.options.is_empty());
        assert_eq!(cmp.offset_cost, None);
        assert_eq!(cmp.recommended, None);
    }
}

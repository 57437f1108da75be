//! Human-readable report formatting.

use std::fmt;

use crate::analysis::AnalysisReport;
use crate::cost::{BillingReport, CostBreakdown, SavingsReport};
use crate::finance::FinanceComparison;
use crate::tariff::RatePeriod;

fn money(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", -v)
    } else {
        format!("${v:.2}")
    }
}

fn payback(years: Option<f64>) -> String {
    years.map_or_else(|| "never".to_string(), |y| format!("{y:.1} years"))
}

impl fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for period in RatePeriod::ALL {
            if let Some(p) = self.periods.get(&period) {
                writeln!(
                    f,
                    "    {:<9} import {:>9.2} kWh {:>11}   export {:>9.2} kWh {:>11}",
                    period,
                    p.import_kwh,
                    money(p.import_cost),
                    p.export_kwh,
                    money(p.export_credit)
                )?;
            }
        }
        write!(
            f,
            "    Net energy cost: {}  (+ supply {})",
            money(self.net_cost),
            money(self.supply_cost)
        )
    }
}

impl fmt::Display for SavingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Cost Comparison ---")?;
        writeln!(f, "  Without battery:")?;
        writeln!(f, "{}", self.no_battery)?;
        writeln!(f, "  With battery:")?;
        writeln!(f, "{}", self.with_battery)?;
        if self.free_charge_kwh > 0.0 {
            writeln!(
                f,
                "  Free charging:         {:.1} kWh worth {}",
                self.free_charge_kwh,
                money(self.free_charge_value)
            )?;
        }
        write!(
            f,
            "  Savings:               {} ({:.1}%)",
            money(self.savings),
            self.savings_percent
        )
    }
}

impl fmt::Display for BillingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Monthly Billing Reconciliation ---")?;
        writeln!(
            f,
            "  {:<8} {:>4} {:>10} {:>11} {:>11} {:>11} {:>10}",
            "Month", "Days", "Solar kWh", "Billed", "No battery", "Battery", "Savings"
        )?;
        for m in &self.monthly {
            writeln!(
                f,
                "  {:<8} {:>4} {:>10.1} {:>11} {:>11} {:>11} {:>10}",
                m.month.to_string(),
                m.days,
                m.solar_kwh,
                money(m.billed_cost),
                money(m.no_battery_cost),
                money(m.with_battery_cost),
                money(m.savings)
            )?;
        }
        let a = &self.annual;
        writeln!(f, "  Months reconciled:     {}", a.months)?;
        writeln!(f, "  Total savings:         {}", money(a.total_savings))?;
        writeln!(f, "  Annual savings:        {}", money(a.annual_savings))?;
        writeln!(f, "  Net investment:        {}", money(a.net_investment))?;
        write!(f, "  Payback period:        {}", payback(a.payback_years))?;
        if let Some(plain) = &self.annual_without_promotion {
            writeln!(f)?;
            writeln!(f, "  Without promotion:")?;
            writeln!(f, "    Annual savings:      {}", money(plain.annual_savings))?;
            write!(f, "    Payback period:      {}", payback(plain.payback_years))?;
        }
        Ok(())
    }
}

impl fmt::Display for FinanceComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Financing {} ---", money(self.principal))?;
        for o in &self.options {
            writeln!(
                f,
                "  {:<16} APR {:>7}  {} per {} x {}  fees {}  total cost {}",
                o.name,
                o.effective_apr_pct.map_or_else(|| "n/a".to_string(), |apr| format!("{apr:.2}%")),
                money(o.cost.payment_per_period),
                o.fee_frequency.label(),
                o.cost.total_payments,
                money(o.cost.total_fees),
                money(o.cost.total_cost)
            )?;
        }
        if let Some(cost) = self.offset_cost {
            writeln!(
                f,
                "  {:<16} rate {:>5.2}%  forgone interest {}",
                "Mortgage offset",
                self.mortgage_rate_pct,
                money(cost)
            )?;
        }
        match &self.recommended {
            Some(r) => write!(
                f,
                "  Recommended:           {} (total cost {})",
                r.name,
                money(r.total_cost)
            ),
            None => write!(f, "  Recommended:           none (no enabled options)"),
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.battery_spec;
        writeln!(f, "=== Battery Analysis ===")?;
        writeln!(
            f,
            "Battery: {:.1} kWh ({:.2} kWh usable), charge {:.1} kW, discharge {:.1} kW, efficiency {:.0}%",
            b.capacity_kwh,
            b.usable_kwh,
            b.charge_rate_kw,
            b.discharge_rate_kw,
            b.round_trip_efficiency * 100.0
        )?;
        writeln!(f, "Data: {} days, {} readings", self.n_days, self.n_readings)?;

        for s in &self.scenarios {
            writeln!(f)?;
            writeln!(f, "--- {} ---", s.policy)?;
            write!(f, "{}", s.summary)?;
        }
        if let Some(cost) = &self.cost {
            writeln!(f)?;
            writeln!(f, "{cost}")?;
        }
        if let Some(plain) = &self.cost_without_promotion {
            writeln!(
                f,
                "  Without promotion:     {} ({:.1}%)",
                money(plain.savings),
                plain.savings_percent
            )?;
        }
        if let Some(billing) = &self.billing {
            writeln!(f)?;
            writeln!(f, "{billing}")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.finance)
    }
}

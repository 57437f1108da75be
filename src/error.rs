use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Input sequences the simulation engine refuses to fold.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("readings out of order at {at}: previous reading was {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        at: NaiveDateTime,
    },

    #[error("reading at {at} does not belong to the day batch for {date}")]
    OutsideDay { date: NaiveDate, at: NaiveDateTime },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read readings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed readings CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no usable readings in input")]
    Empty,
}

#[derive(Debug, Error, PartialEq)]
pub enum FinanceError {
    #[error("effective rate did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("loan has no repayments (term {term_years} years at {payments_per_year} per year)")]
    NoPayments {
        term_years: u32,
        payments_per_year: u32,
    },
}

/// Failure of a complete analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error(transparent)]
    Finance(#[from] FinanceError),
}

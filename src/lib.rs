//! RFMForge: A Rust CLI application for customer segmentation using RFM analysis
//!
//! This library computes Recency, Frequency and Monetary Value metrics from raw
//! customer transaction data, scores each metric into a 1-6 bucket (population
//! deciles for frequency/monetary, fixed business intervals for recency), and
//! assigns one of twelve named customer segments via an ordered rule list.

pub mod cli;
pub mod data;
pub mod model;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{
    aggregate_transactions, derive_recency, load_segments, load_transactions, write_segments,
    CustomerAggregate, CustomerMetrics, ReportFilter, Transaction,
};
pub use model::{
    classify, recency_score, score_customers, score_values, QuantileCutTable, ScoredCustomer,
    Segment,
};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

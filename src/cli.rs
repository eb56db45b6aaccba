//! Command-line interface definitions and argument parsing

use crate::data::ReportFilter;
use crate::model::Segment;
use clap::Parser;

/// Customer segmentation CLI using RFM quantile scoring on transaction data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the raw transactions CSV file
    #[arg(short, long, default_value = "transaction_data.csv")]
    pub input: String,

    /// Path for the persisted segment table (overwritten on every run)
    #[arg(short, long, default_value = "rfm_segments.csv")]
    pub output: String,

    /// Base PNG path for the report charts (scatter plus one distribution
    /// chart per metric)
    #[arg(long)]
    pub charts: Option<String>,

    /// Skip the pipeline and report on the already-persisted segment table
    #[arg(long)]
    pub report: bool,

    /// Prediction mode: provide raw R,F,M values as comma-separated string.
    /// Example: --predict "45,12,3500.0" for Recency=45 days, Frequency=12,
    /// MonetaryValue=3500.0
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Report filter: keep customers with recency at most this many days
    #[arg(long, default_value_t = 180, value_parser = clap::value_parser!(i64).range(0..=360))]
    pub recency_max: i64,

    /// Report filter: keep customers with at most this many orders
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u64).range(0..=100))]
    pub frequency_max: u64,

    /// Report filter: keep customers with at most this monetary value
    #[arg(long, default_value_t = 25_000, value_parser = clap::value_parser!(u64).range(0..=100_000))]
    pub monetary_max: u64,

    /// Report filter: comma-separated segment names to keep
    /// Example: --segments "Champions,Loyal_Customers"
    #[arg(long, value_delimiter = ',')]
    pub segments: Option<Vec<String>>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse raw RFM values from the predict string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_rfm_values(&self) -> crate::Result<Option<(i64, f64, f64)>> {
        if let Some(ref predict_str) = self.predict {
            let parts: Vec<&str> = predict_str.split(',').collect();
            if parts.len() != 3 {
                anyhow::bail!("Predict values must be in format 'recency,frequency,monetary'");
            }

            let recency: i64 = parts[0]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid recency value: {}", parts[0]))?;
            let frequency: f64 = parts[1]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid frequency value: {}", parts[1]))?;
            let monetary: f64 = parts[2]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid monetary value: {}", parts[2]))?;

            Ok(Some((recency, frequency, monetary)))
        } else {
            Ok(None)
        }
    }

    /// Build the report filter from the bound and segment arguments
    pub fn report_filter(&self) -> crate::Result<ReportFilter> {
        let segments = match &self.segments {
            Some(names) => Some(
                names
                    .iter()
                    .map(|name| name.trim().parse::<Segment>())
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        Ok(ReportFilter {
            recency_max: self.recency_max,
            frequency_max: self.frequency_max,
            monetary_max: self.monetary_max as f64,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> Args {
        Args {
            input: "test.csv".to_string(),
            output: "segments.csv".to_string(),
            charts: None,
            report: false,
            predict: None,
            recency_max: 180,
            frequency_max: 25,
            monetary_max: 25_000,
            segments: None,
            verbose: false,
        }
    }

    #[test]
    fn test_parse_rfm_values() {
        let mut args = default_args();
        args.predict = Some("45,12,3500.0".to_string());

        let result = args.parse_rfm_values().unwrap();
        assert_eq!(result, Some((45, 12.0, 3500.0)));

        args.predict = None;
        let result = args.parse_rfm_values().unwrap();
        assert_eq!(result, None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_rfm_values().is_err());
    }

    #[test]
    fn test_report_filter_segments() {
        let mut args = default_args();
        args.segments = Some(vec!["Champions".to_string(), "Loyal_Customers".to_string()]);

        let filter = args.report_filter().unwrap();
        assert_eq!(
            filter.segments,
            Some(vec![Segment::Champions, Segment::LoyalCustomers])
        );

        args.segments = Some(vec!["Whales".to_string()]);
        assert!(args.report_filter().is_err());
    }
}

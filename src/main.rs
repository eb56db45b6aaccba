//! RFMForge: Customer Segmentation CLI using RFM quantile scoring
//!
//! This is the main entrypoint that orchestrates data loading, scoring,
//! persistence, reporting and prediction.

use anyhow::Result;
use clap::Parser;
use rfmforge::{
    aggregate_transactions, classify, derive_recency, load_segments, load_transactions,
    score_customers, score_values, viz, write_segments, Args, QuantileCutTable,
};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    if args.verbose {
        println!("RFMForge - Customer Segmentation using RFM scoring");
        println!("==================================================\n");
    }

    // Check if in prediction or report mode
    if let Some(rfm_values) = args.parse_rfm_values()? {
        run_prediction_mode(&args, rfm_values)?;
    } else if args.report {
        run_report_mode(&args)?;
    } else {
        run_full_pipeline(&args)?;
    }

    Ok(())
}

/// Run prediction mode for a single set of raw RFM values
fn run_prediction_mode(args: &Args, rfm_values: (i64, f64, f64)) -> Result<()> {
    println!("=== Prediction Mode ===");
    println!(
        "Input RFM values: R={} days, F={}, M={}",
        rfm_values.0, rfm_values.1, rfm_values.2
    );

    let start_time = Instant::now();

    // Load the transaction data and fit the cut table from its population
    if args.verbose {
        println!("\nLoading transaction data from: {}", args.input);
    }
    let transactions = load_transactions(&args.input)?;
    let customers = derive_recency(aggregate_transactions(&transactions));

    if args.verbose {
        println!("Loaded {} customers", customers.len());
        println!("\nFitting decile cut points from the population...");
    }

    let cuts = QuantileCutTable::from_population(&customers)?;
    let (r, f, m) = score_values(&cuts, rfm_values.0, rfm_values.1, rfm_values.2);
    let segment = classify(r, f, m);

    let elapsed = start_time.elapsed();

    println!("\n✓ Scores: R_Quartile={r}, F_Quartile={f}, M_Quartile={m} (RFM class {r}{f}{m})");
    println!("✓ Assigned segment: {segment}");
    println!("  Processing time: {:.2}s", elapsed.as_secs_f64());

    // Show how common that segment is in the training population
    let scored = score_customers(&customers)?;
    let segment_size = scored.iter().filter(|c| c.segment == segment).count();
    let segment_percentage = (segment_size as f64 / scored.len() as f64) * 100.0;
    println!(
        "\nSegment {} in this population: {} customers ({:.1}% of total)",
        segment, segment_size, segment_percentage
    );

    Ok(())
}

/// Run report mode over the already-persisted segment table
fn run_report_mode(args: &Args) -> Result<()> {
    println!("=== Report Mode ===\n");

    if args.verbose {
        println!("Loading segment table from: {}", args.output);
    }
    let customers = load_segments(&args.output)?;
    println!("✓ Segment table loaded: {} customers", customers.len());

    let filter = args.report_filter()?;
    let filtered = filter.apply(customers);
    println!(
        "✓ Filter applied (recency <= {}, frequency <= {}, monetary <= {}): {} customers",
        args.recency_max,
        args.frequency_max,
        args.monetary_max,
        filtered.len()
    );

    viz::print_segment_statistics(&filtered);

    if let Some(ref charts) = args.charts {
        viz::generate_report_charts(&filtered, charts)?;
    }

    Ok(())
}

/// Run the full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Full Segmentation Pipeline ===\n");

    let start_time = Instant::now();

    // Step 1: Load the raw transactions
    if args.verbose {
        println!("Step 1: Loading transaction data");
        println!("  Input file: {}", args.input);
    }

    let load_start = Instant::now();
    let transactions = load_transactions(&args.input)?;
    let load_time = load_start.elapsed();

    println!("✓ Transactions loaded: {} rows", transactions.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_time.as_secs_f64());
    }

    // Step 2: Aggregate per customer and derive recency
    if args.verbose {
        println!("\nStep 2: Aggregating per-customer RFM metrics");
    }

    let customers = derive_recency(aggregate_transactions(&transactions));
    println!("✓ Customers aggregated: {}", customers.len());

    // Step 3: Fit cut points from the full population, score and classify
    if args.verbose {
        println!("\nStep 3: Scoring against population deciles");
    }

    let score_start = Instant::now();
    let scored = score_customers(&customers)?;
    let score_time = score_start.elapsed();

    println!("✓ Customers scored and classified");
    if args.verbose {
        println!("  Scoring time: {:.2}s", score_time.as_secs_f64());
    }

    // Step 4: Persist the segment table
    write_segments(&args.output, &scored)?;
    println!("✓ Segment table written to: {}", args.output);

    // Step 5: Print segment statistics
    viz::print_segment_statistics(&scored);

    // Step 6: Optionally render the report charts over the filtered table
    if let Some(ref charts) = args.charts {
        if args.verbose {
            println!("\nStep 4: Generating report charts");
            println!("  Output base: {charts}");
        }

        let viz_start = Instant::now();
        let filter = args.report_filter()?;
        let filtered = filter.apply(scored);
        viz::generate_report_charts(&filtered, charts)?;
        let viz_time = viz_start.elapsed();

        println!("\n✓ Report charts generated");
        if args.verbose {
            println!("  Chart rendering time: {:.2}s", viz_time.as_secs_f64());
        }
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

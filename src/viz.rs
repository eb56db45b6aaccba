//! Visualization functions using Plotters for segment analysis

use crate::model::{quantile, ScoredCustomer, Segment};
use plotters::prelude::*;

/// Number of bars in the metric distribution histograms
const HISTOGRAM_BINS: usize = 20;

/// Stable color per segment, indexed by declaration order
fn segment_color(segment: Segment) -> PaletteColor<Palette99> {
    let index = Segment::ALL
        .iter()
        .position(|s| *s == segment)
        .unwrap_or(Segment::ALL.len() - 1);
    Palette99::pick(index)
}

/// Create the segment scatter plot: Recency vs Frequency, point size scaled
/// by Monetary Value, one color and legend entry per segment present.
///
/// # Arguments
/// * `customers` - Scored (and usually filtered) segment table
/// * `output_path` - Path to save the PNG plot
/// * `plot_title` - Title for the plot
pub fn create_segment_scatter(
    customers: &[ScoredCustomer],
    output_path: &str,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    if customers.is_empty() {
        anyhow::bail!("no customers left to plot after filtering");
    }
    let title =
        plot_title.unwrap_or("Customer Segments: Recency vs Frequency (sized by Monetary Value)");

    let max_recency = customers.iter().map(|c| c.recency).max().unwrap_or(0) as f64;
    let max_frequency = customers.iter().map(|c| c.frequency).max().unwrap_or(0) as f64;
    let max_monetary = customers
        .iter()
        .map(|c| c.monetary_value)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1.0);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_recency * 1.05 + 1.0, 0.0..max_frequency * 1.05 + 1.0)?;

    chart
        .configure_mesh()
        .x_desc("Recency (days)")
        .y_desc("Frequency (orders)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    // One series per segment so every segment gets its own legend entry
    for segment in Segment::ALL {
        if !customers.iter().any(|c| c.segment == segment) {
            continue;
        }
        let color = segment_color(segment);

        chart
            .draw_series(
                customers
                    .iter()
                    .filter(|c| c.segment == segment)
                    .map(|c| {
                        let radius =
                            2 + (8.0 * (c.monetary_value.max(0.0) / max_monetary)) as i32;
                        Circle::new(
                            (c.recency as f64, c.frequency as f64),
                            radius,
                            color.filled(),
                        )
                    }),
            )?
            .label(segment.as_str())
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart.configure_series_labels().draw()?;

    root.present()?;
    println!("Segment scatter plot saved to: {}", output_path);

    Ok(())
}

/// Create a histogram with a boxplot strip above it for one metric,
/// mirroring the dashboard's histogram + marginal box view.
pub fn create_metric_distribution(
    values: &[f64],
    metric_name: &str,
    output_path: &str,
) -> crate::Result<()> {
    if values.is_empty() {
        anyhow::bail!("no {metric_name} values left to plot after filtering");
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let span = (max - min).max(1e-9);
    let pad = span * 0.05;
    let x_range = (min - pad)..(max + pad);

    // Bin the values for the histogram
    let mut counts = vec![0u64; HISTOGRAM_BINS];
    for &value in values {
        let bin = (((value - min) / span) * HISTOGRAM_BINS as f64) as usize;
        counts[bin.min(HISTOGRAM_BINS - 1)] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let (box_area, hist_area) = root.split_vertically(140);

    // Boxplot strip: whiskers at min/max, box at the quartiles
    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);

    let mut box_chart = ChartBuilder::on(&box_area)
        .caption(format!("{metric_name} Plot"), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(0)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), 0.0..1.0f64)?;

    box_chart.draw_series(std::iter::once(PathElement::new(
        vec![(min, 0.5), (max, 0.5)],
        BLACK.stroke_width(1),
    )))?;
    box_chart.draw_series(std::iter::once(Rectangle::new(
        [(q1, 0.2), (q3, 0.8)],
        BLUE.mix(0.35).filled(),
    )))?;
    box_chart.draw_series(std::iter::once(Rectangle::new(
        [(q1, 0.2), (q3, 0.8)],
        BLUE.stroke_width(1),
    )))?;
    box_chart.draw_series(std::iter::once(PathElement::new(
        vec![(median, 0.2), (median, 0.8)],
        BLACK.stroke_width(2),
    )))?;

    // Histogram below, sharing the x range with the boxplot
    let mut hist_chart = ChartBuilder::on(&hist_area)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0.0..max_count * 1.1)?;

    hist_chart
        .configure_mesh()
        .x_desc(metric_name)
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let bin_width = span / HISTOGRAM_BINS as f64;
    for (bin, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let lo = min + bin as f64 * bin_width;
        hist_chart.draw_series(std::iter::once(Rectangle::new(
            [(lo, 0.0), (lo + bin_width, count as f64)],
            BLUE.mix(0.6).filled(),
        )))?;
    }

    root.present()?;
    println!("{metric_name} distribution chart saved to: {}", output_path);

    Ok(())
}

/// Print the per-segment summary table to the console
pub fn print_segment_statistics(customers: &[ScoredCustomer]) {
    println!("\n=== Segment Statistics ===");
    println!("Total customers: {}", customers.len());
    if customers.is_empty() {
        return;
    }

    let mut rows: Vec<(Segment, Vec<&ScoredCustomer>)> = Segment::ALL
        .iter()
        .map(|&segment| {
            (
                segment,
                customers.iter().filter(|c| c.segment == segment).collect::<Vec<_>>(),
            )
        })
        .filter(|(_, members)| !members.is_empty())
        .collect();
    rows.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    println!("\n  Segment                  | Customers |  Share | Avg Recency | Avg Frequency | Avg Monetary");
    println!("  -------------------------|-----------|--------|-------------|---------------|-------------");
    for (segment, members) in rows {
        let n = members.len() as f64;
        let share = n / customers.len() as f64 * 100.0;
        let avg_recency = members.iter().map(|c| c.recency as f64).sum::<f64>() / n;
        let avg_frequency = members.iter().map(|c| c.frequency as f64).sum::<f64>() / n;
        let avg_monetary = members.iter().map(|c| c.monetary_value).sum::<f64>() / n;
        println!(
            "  {:24} | {:9} | {:5.1}% | {:11.1} | {:13.1} | {:12.2}",
            segment.as_str(),
            members.len(),
            share,
            avg_recency,
            avg_frequency,
            avg_monetary
        );
    }
}

/// Generate the full chart report: one scatter plot plus one distribution
/// chart per metric, derived file names alongside the base path.
pub fn generate_report_charts(
    customers: &[ScoredCustomer],
    base_output_path: &str,
) -> crate::Result<()> {
    create_segment_scatter(customers, base_output_path, None)?;

    let recency: Vec<f64> = customers.iter().map(|c| c.recency as f64).collect();
    let frequency: Vec<f64> = customers.iter().map(|c| c.frequency as f64).collect();
    let monetary: Vec<f64> = customers.iter().map(|c| c.monetary_value).collect();

    create_metric_distribution(
        &recency,
        "Recency",
        &base_output_path.replace(".png", "_recency.png"),
    )?;
    create_metric_distribution(
        &frequency,
        "Frequency",
        &base_output_path.replace(".png", "_frequency.png"),
    )?;
    create_metric_distribution(
        &monetary,
        "Monetary Value",
        &base_output_path.replace(".png", "_monetary.png"),
    )?;

    Ok(())
}

//! RFM scoring model: decile cut points, per-metric scorers and the ordered
//! rule list that maps (R,F,M) score triples to named customer segments.

use crate::data::CustomerMetrics;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The twelve named customer segments, plus `Lost` doubling as the default
/// when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    #[serde(rename = "Loyal_Customers")]
    LoyalCustomers,
    #[serde(rename = "Potential_Loyalists")]
    PotentialLoyalists,
    Promising,
    #[serde(rename = "Recent_Customers")]
    RecentCustomers,
    #[serde(rename = "Customer_Needs_Attention")]
    CustomerNeedsAttention,
    Hibernating,
    #[serde(rename = "At_Risk")]
    AtRisk,
    #[serde(rename = "About_to_Sleep")]
    AboutToSleep,
    Lost,
    #[serde(rename = "Cant_Lose_Them")]
    CantLoseThem,
    #[serde(rename = "High_Value_Sleeping")]
    HighValueSleeping,
}

impl Segment {
    /// All segments in declaration order; also fixes each segment's palette
    /// index for plotting.
    pub const ALL: [Segment; 12] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::PotentialLoyalists,
        Segment::Promising,
        Segment::RecentCustomers,
        Segment::CustomerNeedsAttention,
        Segment::Hibernating,
        Segment::AtRisk,
        Segment::AboutToSleep,
        Segment::Lost,
        Segment::CantLoseThem,
        Segment::HighValueSleeping,
    ];

    /// The exact name used in the persisted CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::LoyalCustomers => "Loyal_Customers",
            Segment::PotentialLoyalists => "Potential_Loyalists",
            Segment::Promising => "Promising",
            Segment::RecentCustomers => "Recent_Customers",
            Segment::CustomerNeedsAttention => "Customer_Needs_Attention",
            Segment::Hibernating => "Hibernating",
            Segment::AtRisk => "At_Risk",
            Segment::AboutToSleep => "About_to_Sleep",
            Segment::Lost => "Lost",
            Segment::CantLoseThem => "Cant_Lose_Them",
            Segment::HighValueSleeping => "High_Value_Sleeping",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Segment::ALL
            .iter()
            .copied()
            .find(|segment| segment.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown customer segment: {s}"))
    }
}

/// A fully scored customer, one row of the persisted segment table.
///
/// Field attributes pin the exact CSV header names so the table round-trips
/// through `csv`/`serde` unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "MonetaryValue")]
    pub monetary_value: f64,
    #[serde(rename = "Frequency")]
    pub frequency: u64,
    #[serde(rename = "Recency")]
    pub recency: i64,
    #[serde(rename = "R_Quartile")]
    pub r_quartile: u8,
    #[serde(rename = "F_Quartile")]
    pub f_quartile: u8,
    #[serde(rename = "M_Quartile")]
    pub m_quartile: u8,
    #[serde(rename = "RFMClass")]
    pub rfm_class: String,
    #[serde(rename = "CustomerSegment")]
    pub segment: Segment,
}

/// Decile cut points for the data-driven metrics, computed once per run from
/// the complete customer population and read-only afterwards.
///
/// `frequency[i]` / `monetary[i]` hold the value at population decile
/// `(i + 1) / 10`, with linear interpolation between order statistics.
#[derive(Debug, Clone)]
pub struct QuantileCutTable {
    frequency: [f64; 9],
    monetary: [f64; 9],
}

impl QuantileCutTable {
    /// Fit decile cut points from the full population.
    ///
    /// Must be called before any per-customer scoring; an empty population
    /// has no deciles and is rejected outright.
    pub fn from_population(customers: &[CustomerMetrics]) -> crate::Result<Self> {
        if customers.is_empty() {
            bail!("cannot compute decile cut points: customer population is empty");
        }

        let mut frequency: Vec<f64> = customers.iter().map(|c| c.frequency as f64).collect();
        let mut monetary: Vec<f64> = customers.iter().map(|c| c.monetary_value).collect();
        frequency.sort_by(|a, b| a.total_cmp(b));
        monetary.sort_by(|a, b| a.total_cmp(b));

        Ok(QuantileCutTable {
            frequency: decile_cuts(&frequency),
            monetary: decile_cuts(&monetary),
        })
    }

    /// Cut point for `frequency` at decile fraction `(index + 1) / 10`.
    pub fn frequency_cut(&self, index: usize) -> f64 {
        self.frequency[index]
    }

    /// Cut point for `monetary value` at decile fraction `(index + 1) / 10`.
    pub fn monetary_cut(&self, index: usize) -> f64 {
        self.monetary[index]
    }

    /// Frequency score in [1,6], 1 = most frequent.
    ///
    /// Note the threshold set differs from the monetary one (0.3 vs 0.2 for
    /// the worst bucket); the asymmetry is part of the scoring scheme.
    pub fn frequency_score(&self, x: f64) -> u8 {
        if x <= self.frequency[2] {
            6
        } else if x <= self.frequency[3] {
            5
        } else if x <= self.frequency[5] {
            4
        } else if x <= self.frequency[7] {
            3
        } else if x <= self.frequency[8] {
            2
        } else {
            1
        }
    }

    /// Monetary score in [1,6], 1 = highest spend.
    pub fn monetary_score(&self, x: f64) -> u8 {
        if x <= self.monetary[1] {
            6
        } else if x <= self.monetary[3] {
            5
        } else if x <= self.monetary[5] {
            4
        } else if x <= self.monetary[7] {
            3
        } else if x <= self.monetary[8] {
            2
        } else {
            1
        }
    }
}

/// Recency score in [1,6] from fixed business intervals (days), 1 = most
/// recent. Not data-driven, unlike the frequency/monetary scorers.
pub fn recency_score(recency_days: i64) -> u8 {
    if recency_days <= 90 {
        1
    } else if recency_days <= 180 {
        2
    } else if recency_days <= 270 {
        3
    } else if recency_days <= 360 {
        4
    } else if recency_days <= 540 {
        5
    } else {
        6
    }
}

/// Value at quantile `q` of an ascending-sorted slice, with linear
/// interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!((0.0..=1.0).contains(&q));
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn decile_cuts(sorted: &[f64]) -> [f64; 9] {
    let mut cuts = [0.0; 9];
    for (i, cut) in cuts.iter_mut().enumerate() {
        *cut = quantile(sorted, (i + 1) as f64 / 10.0);
    }
    cuts
}

/// One classification rule: predicate over (R,F,M) plus the segment it
/// assigns.
type Rule = (fn(u8, u8, u8) -> bool, Segment);

/// The segment decision list, evaluated top to bottom, first match wins.
///
/// Rule order is load-bearing. In particular the Hibernating rule fires for
/// *any* R=3 customer (its condition is `R==3 || (R==4 && F>=5 && M>=5)`,
/// with that exact grouping), so an R=3 customer never reaches the rules
/// below it.
const RULES: [Rule; 12] = [
    (|r, f, m| r == 1 && f == 1 && m == 1, Segment::Champions),
    (|r, f, m| r <= 2 && f <= 2 && m <= 2, Segment::LoyalCustomers),
    (|r, f, m| r <= 2 && f <= 3 && m <= 3, Segment::PotentialLoyalists),
    (|r, f, m| r <= 2 && f <= 4 && m <= 4, Segment::Promising),
    (|r, f, m| r <= 2 && f <= 6 && m <= 6, Segment::RecentCustomers),
    (
        |r, f, m| r == 3 && f <= 3 && m <= 3,
        Segment::CustomerNeedsAttention,
    ),
    (
        |r, f, m| r == 3 || (r == 4 && f >= 5 && m >= 5),
        Segment::Hibernating,
    ),
    (|r, f, m| r == 4 && f <= 3 && m <= 3, Segment::AtRisk),
    (|r, f, m| r == 4 && f >= 3 && m >= 3, Segment::AboutToSleep),
    (|r, f, m| r >= 5 && f >= 3 && m >= 3, Segment::Lost),
    (|r, f, m| r == 5 && f <= 3 && m <= 3, Segment::CantLoseThem),
    (
        |r, f, m| r == 6 && f <= 3 && m <= 3,
        Segment::HighValueSleeping,
    ),
];

/// Assign a segment from an (R,F,M) score triple. Pure function; unmatched
/// triples default to `Lost`.
pub fn classify(r: u8, f: u8, m: u8) -> Segment {
    RULES
        .iter()
        .find(|(rule, _)| rule(r, f, m))
        .map(|(_, segment)| *segment)
        .unwrap_or(Segment::Lost)
}

/// Score raw (recency, frequency, monetary) values against a fitted cut
/// table. Returns the (R,F,M) score triple.
pub fn score_values(cuts: &QuantileCutTable, recency: i64, frequency: f64, monetary: f64) -> (u8, u8, u8) {
    (
        recency_score(recency),
        cuts.frequency_score(frequency),
        cuts.monetary_score(monetary),
    )
}

/// Score and classify the full customer population.
///
/// Two-phase by construction: the decile cut table is fitted from the
/// complete population first, then each customer is scored against the
/// frozen table. Fails on an empty population.
pub fn score_customers(customers: &[CustomerMetrics]) -> crate::Result<Vec<ScoredCustomer>> {
    let cuts = QuantileCutTable::from_population(customers)?;

    Ok(customers
        .iter()
        .map(|c| {
            let (r, f, m) = score_values(&cuts, c.recency, c.frequency as f64, c.monetary_value);
            ScoredCustomer {
                customer_id: c.customer_id.clone(),
                monetary_value: c.monetary_value,
                frequency: c.frequency,
                recency: c.recency,
                r_quartile: r,
                f_quartile: f,
                m_quartile: m,
                rfm_class: format!("{r}{f}{m}"),
                segment: classify(r, f, m),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metrics(customer_id: &str, monetary: f64, frequency: u64, recency: i64) -> CustomerMetrics {
        CustomerMetrics {
            customer_id: customer_id.to_string(),
            monetary_value: monetary,
            frequency,
            last_order_date: NaiveDate::from_ymd_opt(2011, 12, 9).unwrap(),
            recency,
        }
    }

    #[test]
    fn test_recency_score_boundaries() {
        assert_eq!(recency_score(0), 1);
        assert_eq!(recency_score(90), 1);
        assert_eq!(recency_score(91), 2);
        assert_eq!(recency_score(180), 2);
        assert_eq!(recency_score(270), 3);
        assert_eq!(recency_score(360), 4);
        assert_eq!(recency_score(540), 5);
        assert_eq!(recency_score(541), 6);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        // h = 9 * 0.3 = 2.7 -> x[2] + 0.7 * (x[3] - x[2])
        assert!((quantile(&sorted, 0.3) - 3.7).abs() < 1e-12);
        assert!((quantile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&sorted, 1.0) - 10.0).abs() < 1e-12);
        assert!((quantile(&sorted, 0.5) - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_cut_points_monotone() {
        let customers: Vec<CustomerMetrics> = (1..=50)
            .map(|i| metrics(&i.to_string(), (i * i) as f64, i as u64, i as i64))
            .collect();
        let cuts = QuantileCutTable::from_population(&customers).unwrap();

        for i in 1..9 {
            assert!(cuts.frequency_cut(i) >= cuts.frequency_cut(i - 1));
            assert!(cuts.monetary_cut(i) >= cuts.monetary_cut(i - 1));
        }
    }

    #[test]
    fn test_empty_population_rejected() {
        assert!(QuantileCutTable::from_population(&[]).is_err());
        assert!(score_customers(&[]).is_err());
    }

    #[test]
    fn test_degenerate_ties_score_to_better_bucket() {
        // All customers identical: every cut point collapses to the same
        // value, and x <= cut must still resolve in ascending rule order.
        let customers: Vec<CustomerMetrics> =
            (1..=10).map(|i| metrics(&i.to_string(), 100.0, 5, 30)).collect();
        let cuts = QuantileCutTable::from_population(&customers).unwrap();

        assert_eq!(cuts.frequency_score(5.0), 6);
        assert_eq!(cuts.monetary_score(100.0), 6);
        // Anything above the collapsed cuts takes the best bucket.
        assert_eq!(cuts.frequency_score(6.0), 1);
        assert_eq!(cuts.monetary_score(101.0), 1);
    }

    #[test]
    fn test_frequency_monetary_threshold_asymmetry() {
        // Frequencies/monetary 1..=10 give cut(q) = 1 + 9q exactly.
        let customers: Vec<CustomerMetrics> = (1..=10)
            .map(|i| metrics(&i.to_string(), i as f64, i as u64, 30))
            .collect();
        let cuts = QuantileCutTable::from_population(&customers).unwrap();

        // x = 3.0 sits above the 0.2 decile (2.8) but below the 0.3 decile
        // (3.7): worst bucket for frequency, second-worst for monetary.
        assert_eq!(cuts.frequency_score(3.0), 6);
        assert_eq!(cuts.monetary_score(3.0), 5);
    }

    #[test]
    fn test_classify_champions_iff_all_ones() {
        assert_eq!(classify(1, 1, 1), Segment::Champions);
        for (r, f, m) in [(1, 1, 2), (1, 2, 1), (2, 1, 1)] {
            assert_ne!(classify(r, f, m), Segment::Champions);
        }
    }

    #[test]
    fn test_classify_rule_order() {
        assert_eq!(classify(2, 2, 2), Segment::LoyalCustomers);
        assert_eq!(classify(2, 3, 3), Segment::PotentialLoyalists);
        assert_eq!(classify(2, 4, 4), Segment::Promising);
        assert_eq!(classify(2, 6, 6), Segment::RecentCustomers);
        assert_eq!(classify(4, 3, 3), Segment::AtRisk);
        assert_eq!(classify(4, 4, 4), Segment::AboutToSleep);
        assert_eq!(classify(5, 3, 3), Segment::Lost);
        assert_eq!(classify(6, 6, 6), Segment::Lost);
    }

    #[test]
    fn test_r3_never_falls_through() {
        for f in 1..=6u8 {
            for m in 1..=6u8 {
                let segment = classify(3, f, m);
                let expected = if f <= 3 && m <= 3 {
                    Segment::CustomerNeedsAttention
                } else {
                    Segment::Hibernating
                };
                assert_eq!(segment, expected, "R=3 F={f} M={m}");
            }
        }
    }

    #[test]
    fn test_hibernating_precedence_grouping() {
        // R=4 with high F/M matches the Hibernating rule before About_to_Sleep.
        assert_eq!(classify(4, 5, 5), Segment::Hibernating);
        assert_eq!(classify(4, 6, 5), Segment::Hibernating);
        // R=4 with F or M below 5 does not.
        assert_eq!(classify(4, 4, 5), Segment::AboutToSleep);
    }

    #[test]
    fn test_default_is_lost() {
        // R=5 with mixed low/high F,M matches none of the rules.
        assert_eq!(classify(5, 2, 4), Segment::Lost);
        assert_eq!(classify(6, 1, 6), Segment::Lost);
    }

    #[test]
    fn test_score_customers_ranges_and_class_string() {
        let customers: Vec<CustomerMetrics> = (1..=40)
            .map(|i| metrics(&i.to_string(), (i * 10) as f64, i as u64, (i * 15) as i64))
            .collect();
        let scored = score_customers(&customers).unwrap();

        assert_eq!(scored.len(), 40);
        for customer in &scored {
            assert!((1..=6).contains(&customer.r_quartile));
            assert!((1..=6).contains(&customer.f_quartile));
            assert!((1..=6).contains(&customer.m_quartile));
            assert_eq!(
                customer.rfm_class,
                format!(
                    "{}{}{}",
                    customer.r_quartile, customer.f_quartile, customer.m_quartile
                )
            );
            assert_eq!(
                customer.segment,
                classify(customer.r_quartile, customer.f_quartile, customer.m_quartile)
            );
        }
    }

    #[test]
    fn test_top_decile_customer_is_champion() {
        // One customer well above the 0.9 decile on both metrics, recent.
        let mut customers: Vec<CustomerMetrics> = (1..=30)
            .map(|i| metrics(&i.to_string(), (i * 10) as f64, i as u64, 400))
            .collect();
        customers.push(metrics("top", 100_000.0, 500, 45));

        let scored = score_customers(&customers).unwrap();
        let top = scored.iter().find(|c| c.customer_id == "top").unwrap();
        assert_eq!(top.r_quartile, 1);
        assert_eq!(top.f_quartile, 1);
        assert_eq!(top.m_quartile, 1);
        assert_eq!(top.rfm_class, "111");
        assert_eq!(top.segment, Segment::Champions);
    }

    #[test]
    fn test_bottom_customer_is_lost() {
        let mut customers: Vec<CustomerMetrics> = (1..=30)
            .map(|i| metrics(&i.to_string(), (100 + i * 10) as f64, (10 + i) as u64, 30))
            .collect();
        customers.push(metrics("bottom", 1.0, 1, 600));

        let scored = score_customers(&customers).unwrap();
        let bottom = scored.iter().find(|c| c.customer_id == "bottom").unwrap();
        assert_eq!(bottom.r_quartile, 6);
        assert_eq!(bottom.f_quartile, 6);
        assert_eq!(bottom.m_quartile, 6);
        assert_eq!(bottom.segment, Segment::Lost);
    }

    #[test]
    fn test_segment_round_trips_through_str() {
        for segment in Segment::ALL {
            assert_eq!(segment.as_str().parse::<Segment>().unwrap(), segment);
        }
        assert!("Whales".parse::<Segment>().is_err());
    }
}

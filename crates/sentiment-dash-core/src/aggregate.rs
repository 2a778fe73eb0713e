//! Group-by-category aggregation for the sentiment breakdown table.
//!
//! Rows are counted per [`Sentiment`], ordered by count (descending, ties in
//! first-appearance order), and given a percentage of the total rounded to
//! two decimals. Percentages are rounded per group and never renormalized,
//! so a table may sum to 100 ± 0.01 per group.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{Row, Sentiment};

/// One line of the breakdown table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Sentiment,
    pub count: usize,
    pub percentage: f64,
}

/// Set of sentiments to keep before aggregating and charting.
///
/// An empty filter keeps every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentimentFilter {
    allowed: BTreeSet<Sentiment>,
}

impl SentimentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I: IntoIterator<Item = Sentiment>>(sentiments: I) -> Self {
        Self {
            allowed: sentiments.into_iter().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn allows(&self, sentiment: Sentiment) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&sentiment)
    }
}

/// Rows that pass `filter`, in their original order.
pub fn filter_rows<'a>(rows: &'a [Row], filter: &SentimentFilter) -> Vec<&'a Row> {
    rows.iter().filter(|r| filter.allows(r.sentiment)).collect()
}

/// Count rows per category and compute each category's share.
pub fn aggregate<'a, I>(rows: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut counts: Vec<(Sentiment, usize)> = Vec::new();
    for row in rows {
        match counts.iter_mut().find(|(s, _)| *s == row.sentiment) {
            Some((_, n)) => *n += 1,
            None => counts.push((row.sentiment, 1)),
        }
    }

    let total: usize = counts.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return Vec::new();
    }

    // Stable sort keeps first-appearance order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category,
            count,
            percentage: round2(count as f64 / total as f64 * 100.0),
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rows(sentiments: &[Sentiment]) -> Vec<Row> {
        sentiments
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Row::new(
                    format!("r{}", i),
                    *s,
                    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_two_thirds_one_third() {
        use Sentiment::*;
        let table = aggregate(&rows(&[Positive, Positive, Negative]));
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].category, Positive);
        assert_eq!(table[0].count, 2);
        assert!((table[0].percentage - 66.67).abs() < 1e-9);
        assert_eq!(table[1].category, Negative);
        assert_eq!(table[1].count, 1);
        assert!((table[1].percentage - 33.33).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&Vec::<Row>::new()).is_empty());
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        use Sentiment::*;
        let table = aggregate(&rows(&[Neutral, NA, NA, Neutral, Positive]));
        let order: Vec<Sentiment> = table.iter().map(|c| c.category).collect();
        assert_eq!(order, vec![Neutral, NA, Positive]);
    }

    #[test]
    fn test_percentages_sum_within_tolerance() {
        use Sentiment::*;
        let samples: Vec<Vec<Sentiment>> = vec![
            vec![Positive, Negative, Neutral],
            vec![Positive, Positive, Negative, Neutral, NA, NA, NA],
            vec![Positive; 1],
            vec![Positive, Negative, Negative, Neutral, Neutral, Neutral],
        ];
        for sample in samples {
            let table = aggregate(&rows(&sample));
            let sum: f64 = table.iter().map(|c| c.percentage).sum();
            let tolerance = 0.01 * table.len() as f64 + 1e-9;
            assert!((sum - 100.0).abs() <= tolerance, "sum {} for {:?}", sum, sample);
            let count: usize = table.iter().map(|c| c.count).sum();
            assert_eq!(count, sample.len());
        }
    }

    #[test]
    fn test_filter_rows() {
        use Sentiment::*;
        let data = rows(&[Positive, Negative, Neutral, Negative]);
        let filter = SentimentFilter::only([Negative]);
        let kept = filter_rows(&data, &filter);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.sentiment == Negative));

        let table = aggregate(kept);
        assert_eq!(table.len(), 1);
        assert!((table[0].percentage - 100.0).abs() < 1e-9);

        assert_eq!(filter_rows(&data, &SentimentFilter::all()).len(), 4);
    }
}

//! Response rate by score decile.

use propensity_io::Partition;
use serde::{Deserialize, Serialize};

use crate::decile::N_DECILES;

/// Lift statistics for one (partition, decile) bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftRow {
    /// Partition the bucket belongs to.
    pub partition: Partition,
    /// Decile, 1 = highest scores.
    pub decile: u8,
    /// Records in the bucket.
    pub count: usize,
    /// Records with response 1.
    pub responders: usize,
    /// `100 * responders / count`.
    pub response_pct: f64,
    /// Mean score of the bucket.
    pub mean_score: f64,
    /// Share of the partition's responders found in deciles 1 through this one, in percent.
    pub cumulative_capture_pct: f64,
}

/// Build the ten lift rows of one partition from parallel slices.
#[must_use]
pub fn lift_table(partition: Partition, scores: &[f64], deciles: &[u8], resp: &[u8]) -> Vec<LiftRow> {
    let total_responders = resp.iter().filter(|&&r| r == 1).count();
    let mut cumulative = 0usize;
    (1..=N_DECILES)
        .map(|decile| {
            let (mut count, mut responders, mut score_sum) = (0usize, 0usize, 0.0f64);
            for ((&s, &d), &r) in scores.iter().zip(deciles).zip(resp) {
                if d == decile {
                    count += 1;
                    responders += usize::from(r);
                    score_sum += s;
                }
            }
            cumulative += responders;
            LiftRow {
                partition,
                decile,
                count,
                responders,
                response_pct: percent(responders, count),
                mean_score: if count == 0 { 0.0 } else { score_sum / count as f64 },
                cumulative_capture_pct: percent(cumulative, total_responders),
            }
        })
        .collect()
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decile::assign_deciles;

    #[test]
    fn rows_cover_the_partition() {
        let scores: Vec<f64> = (0..40).map(|i| f64::from(i) / 40.0).collect();
        let resp: Vec<u8> = (0..40).map(|i| u8::from(i >= 30)).collect();
        let deciles = assign_deciles(&scores).unwrap();
        let rows = lift_table(Partition::Test, &scores, &deciles, &resp);

        assert_eq!(rows.len(), 10);
        assert_eq!(rows.iter().map(|r| r.count).sum::<usize>(), 40);
        assert_eq!(rows[0].response_pct, 100.0);
        assert_eq!(rows[3].response_pct, 0.0);
        assert!((rows[2].cumulative_capture_pct - 100.0).abs() < 1e-12);
        assert!((rows[0].cumulative_capture_pct - 40.0).abs() < 1e-12);
        assert!(rows.windows(2).all(|w| w[0].mean_score > w[1].mean_score));
    }

    #[test]
    fn no_responders_gives_zero_capture() {
        let scores = vec![0.3; 10];
        let deciles = assign_deciles(&scores).unwrap();
        let rows = lift_table(Partition::Train, &scores, &deciles, &[0; 10]);
        assert!(rows.iter().all(|r| r.cumulative_capture_pct == 0.0));
        assert!(rows.iter().all(|r| r.count == 1));
    }
}

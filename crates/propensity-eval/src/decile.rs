//! Equal-count score buckets.

use crate::EvalError;

/// Number of buckets.
pub const N_DECILES: u8 = 10;

/// Assign each score a decile, 1 = highest scores.
///
/// Scores are ranked in descending order with ties kept in input order,
/// then cut into ten consecutive groups whose sizes differ by at most one:
/// the first `n % 10` groups get the extra row. The result is parallel to
/// `scores`.
///
/// # Errors
///
/// Returns [`EvalError::TooFewScores`] when fewer than 10 scores are given.
pub fn assign_deciles(scores: &[f64]) -> Result<Vec<u8>, EvalError> {
    let n = scores.len();
    if n < usize::from(N_DECILES) {
        return Err(EvalError::TooFewScores { n_scores: n });
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let groups = usize::from(N_DECILES);
    let (base, extra) = (n / groups, n % groups);
    let mut deciles = vec![0u8; n];
    let mut ranked = order.into_iter();
    for (g, decile) in (1..=N_DECILES).enumerate() {
        let size = base + usize::from(g < extra);
        for idx in ranked.by_ref().take(size) {
            deciles[idx] = decile;
        }
    }
    Ok(deciles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(deciles: &[u8]) -> Vec<usize> {
        (1..=N_DECILES)
            .map(|d| deciles.iter().filter(|&&x| x == d).count())
            .collect()
    }

    #[test]
    fn bucket_sizes_differ_by_at_most_one() {
        for n in [10, 11, 19, 157, 253, 1000] {
            let scores: Vec<f64> = (0..n).map(|i| f64::from((i * 37 % 101) as u32)).collect();
            let d = assign_deciles(&scores).unwrap();
            let s = sizes(&d);
            assert_eq!(s.iter().sum::<usize>(), n);
            assert!(s.iter().all(|&k| k == n / 10 || k == n.div_ceil(10)), "{n}: {s:?}");
            // Larger buckets come first.
            assert!(s.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn top_bucket_holds_highest_scores() {
        let scores: Vec<f64> = (0..100).map(|i| f64::from(i) / 100.0).collect();
        let d = assign_deciles(&scores).unwrap();
        assert_eq!(d[99], 1);
        assert_eq!(d[90], 1);
        assert_eq!(d[89], 2);
        assert_eq!(d[0], 10);
    }

    #[test]
    fn ties_keep_input_order() {
        let mut scores = vec![0.5; 10];
        scores.extend([0.1; 10]);
        let d = assign_deciles(&scores).unwrap();
        assert_eq!(&d[..10], &[1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
        assert_eq!(&d[10..], &[6, 6, 7, 7, 8, 8, 9, 9, 10, 10]);
    }

    #[test]
    fn fewer_than_ten_is_an_error() {
        assert!(matches!(
            assign_deciles(&[0.1; 9]),
            Err(EvalError::TooFewScores { n_scores: 9 })
        ));
    }
}

use serde::{Deserialize, Serialize};

/// Aggregate view of a room's ratings, recomputed after every mutation and
/// broadcast to subscribers. `distribution[i]` counts votes of value `i+1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub count: usize,
    pub avg: f64,
    pub distribution: [u32; 5],
}

impl Stats {
    pub fn empty() -> Self {
        Self {
            count: 0,
            avg: 0.0,
            distribution: [0; 5],
        }
    }
}

/// Compute stats over the current rating values.
///
/// Values outside [1,5] cannot enter the map through `submit_rating`, but
/// the aggregator does not trust its input and skips them anyway.
pub fn aggregate<'a, I>(values: I) -> Stats
where
    I: IntoIterator<Item = &'a u8>,
{
    let mut distribution = [0u32; 5];
    let mut sum: u64 = 0;
    let mut count: usize = 0;

    for &value in values {
        if !(1..=5).contains(&value) {
            continue;
        }
        distribution[(value - 1) as usize] += 1;
        sum += u64::from(value);
        count += 1;
    }

    let avg = if count == 0 {
        0.0
    } else {
        (sum as f64 / count as f64 * 100.0).round() / 100.0
    };

    Stats {
        count,
        avg,
        distribution,
    }
}

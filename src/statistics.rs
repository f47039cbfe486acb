use std::time::Duration;

use comfy_table::Table;

/// Bucket floors: 0, then 100µs, 200µs, 500µs and each decade above up to
/// 50 s. The last bucket is open ended.
fn bucket_floors() -> Vec<Duration> {
    let mut floors = vec![Duration::ZERO];
    for exponent in 1..7u32 {
        let base = 10u64.pow(exponent);
        for multiplier in [10, 20, 50] {
            floors.push(Duration::from_micros(base * multiplier));
        }
    }

    floors
}

struct Bucket {
    floor: Duration,
    count: u64,
}

/// Counters owned by the single consumer. Nothing here is shared, so
/// nothing here is locked.
pub struct Statistics {
    pub(crate) request: u64,
    pub(crate) response: u64,
    pub(crate) slow: u64,
    pub(crate) cost: Duration,
    slow_threshold: Duration,
    buckets: Vec<Bucket>,
}

impl Statistics {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            request: 0,
            response: 0,
            slow: 0,
            cost: Duration::ZERO,
            slow_threshold,
            buckets: bucket_floors()
                .into_iter()
                .map(|floor| Bucket { floor, count: 0 })
                .collect(),
        }
    }

    pub fn record_direction(&mut self, request: bool) {
        if request {
            self.request += 1;
        } else {
            self.response += 1;
        }
    }

    ///
    /// Record one matched pair: add the latency to the running total,
    /// count it as slow when it exceeds the threshold and drop it into
    /// its histogram bucket.
    ///
    /// The bucket walk is a linear scan from the top; the array has 19
    /// entries and every latency is at least the zero floor, so it always
    /// lands somewhere.
    ///
    pub fn record_latency(&mut self, latency: Duration) {
        self.cost += latency;

        if self.is_slow(latency) {
            self.slow += 1;
        }

        for bucket in self.buckets.iter_mut().rev() {
            if latency >= bucket.floor {
                bucket.count += 1;
                return;
            }
        }
    }

    /// Slow means strictly above the threshold.
    pub fn is_slow(&self, latency: Duration) -> bool {
        latency > self.slow_threshold
    }

    /// Render the final report: the summary counters and the latency
    /// histogram, one row per interval.
    pub fn render(&self) -> String {
        let mut summary = Table::new();
        summary.set_header(vec!["Item", "Value"]);
        summary.add_row(vec!["Request".to_string(), self.request.to_string()]);
        summary.add_row(vec!["Response".to_string(), self.response.to_string()]);
        summary.add_row(vec!["Slow".to_string(), self.slow.to_string()]);
        summary.add_row(vec!["Cost".to_string(), format!("{:?}", self.cost)]);

        let mut histogram = Table::new();
        histogram.set_header(vec!["Interval", "Count"]);
        for window in self.buckets.windows(2) {
            histogram.add_row(vec![
                format!("{:?} ~ {:?}", window[0].floor, window[1].floor),
                window[0].count.to_string(),
            ]);
        }
        if let Some(last) = self.buckets.last() {
            histogram.add_row(vec![format!("{:?} ~ ", last.floor), last.count.to_string()]);
        }

        format!("Summary Statistics:\n{summary}\nSummary of time-consuming:\n{histogram}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_count(statistics: &Statistics, floor: Duration) -> u64 {
        statistics
            .buckets
            .iter()
            .find(|bucket| bucket.floor == floor)
            .map(|bucket| bucket.count)
            .unwrap()
    }

    #[test]
    fn test_bucket_floors() {
        let floors = bucket_floors();

        assert_eq!(floors.len(), 19);
        assert_eq!(floors[0], Duration::ZERO);
        assert_eq!(floors[1], Duration::from_micros(100));
        assert_eq!(floors[2], Duration::from_micros(200));
        assert_eq!(floors[3], Duration::from_micros(500));
        assert_eq!(floors[18], Duration::from_secs(50));
        assert!(floors.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_four_milliseconds_lands_in_the_two_millisecond_bucket() {
        let mut statistics = Statistics::new(Duration::from_millis(5));
        statistics.record_latency(Duration::from_millis(4));

        assert_eq!(bucket_count(&statistics, Duration::from_millis(2)), 1);
        assert_eq!(statistics.slow, 0);
        assert_eq!(statistics.cost, Duration::from_millis(4));
    }

    #[test]
    fn test_ten_milliseconds_is_slow() {
        let mut statistics = Statistics::new(Duration::from_millis(5));
        statistics.record_latency(Duration::from_millis(10));

        assert_eq!(bucket_count(&statistics, Duration::from_millis(10)), 1);
        assert_eq!(statistics.slow, 1);
    }

    #[test]
    fn test_slow_is_strictly_greater() {
        let statistics = Statistics::new(Duration::from_millis(5));

        assert!(!statistics.is_slow(Duration::from_millis(5)));
        assert!(statistics.is_slow(Duration::from_micros(5001)));
    }

    #[test]
    fn test_bucket_counts_sum_to_observations() {
        let mut statistics = Statistics::new(Duration::from_millis(5));
        for micros in [0, 99, 100, 450, 5_000, 60_000, 2_000_000, 80_000_000] {
            statistics.record_latency(Duration::from_micros(micros));
        }

        let total: u64 = statistics.buckets.iter().map(|bucket| bucket.count).sum();
        assert_eq!(total, 8);

        // The open-ended top bucket caught the 80 s outlier.
        assert_eq!(bucket_count(&statistics, Duration::from_secs(50)), 1);
    }

    #[test]
    fn test_directions_are_counted_separately() {
        let mut statistics = Statistics::new(Duration::from_millis(5));
        statistics.record_direction(true);
        statistics.record_direction(true);
        statistics.record_direction(false);

        assert_eq!(statistics.request, 2);
        assert_eq!(statistics.response, 1);
    }

    #[test]
    fn test_render_mentions_every_section() {
        let mut statistics = Statistics::new(Duration::from_millis(5));
        statistics.record_direction(true);
        statistics.record_latency(Duration::from_millis(4));

        let report = statistics.render();
        assert!(report.contains("Summary Statistics:"));
        assert!(report.contains("Summary of time-consuming:"));
        assert!(report.contains("Request"));
        assert!(report.contains("50s ~ "));
    }
}

//! Process-lifetime download counters.
//!
//! Many track flows update these concurrently, so every counter is atomic.
//! Callers read them through [`DownloadStats::snapshot`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DownloadStats {
    requests_made: AtomicU64,
    successful_downloads: AtomicU64,
    failed_downloads: AtomicU64,
    bytes_downloaded: AtomicU64,
    metadata_embedded: AtomicU64,
    covers_downloaded: AtomicU64,
}

/// Point-in-time copy of [`DownloadStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests_made: u64,
    pub successful_downloads: u64,
    pub failed_downloads: u64,
    pub bytes_downloaded: u64,
    pub metadata_embedded: u64,
    pub covers_downloaded: u64,
}

impl DownloadStats {
    pub fn record_request(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, bytes: u64) {
        self.successful_downloads.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metadata(&self) {
        self.metadata_embedded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cover(&self) {
        self.covers_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_made: self.requests_made.load(Ordering::Relaxed),
            successful_downloads: self.successful_downloads.load(Ordering::Relaxed),
            failed_downloads: self.failed_downloads.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            metadata_embedded: self.metadata_embedded.load(Ordering::Relaxed),
            covers_downloaded: self.covers_downloaded.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "RUN STATISTICS")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Requests made:        {}", self.requests_made)?;
        writeln!(f, "Successful downloads: {}", self.successful_downloads)?;
        writeln!(f, "Failed downloads:     {}", self.failed_downloads)?;
        writeln!(
            f,
            "Data downloaded:      {:.2} MB",
            self.bytes_downloaded as f64 / (1024.0 * 1024.0)
        )?;
        writeln!(f, "Metadata embedded:    {}", self.metadata_embedded)?;
        writeln!(f, "Covers downloaded:    {}", self.covers_downloaded)?;
        write!(f, "{}", "=".repeat(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let stats = DownloadStats::default();
        stats.record_request();
        stats.record_request();
        stats.record_success(1024);
        stats.record_success(2048);
        stats.record_failure();
        stats.record_metadata();
        stats.record_cover();

        let snap = stats.snapshot();
        assert_eq!(snap.requests_made, 2);
        assert_eq!(snap.successful_downloads, 2);
        assert_eq!(snap.bytes_downloaded, 3072);
        assert_eq!(snap.failed_downloads, 1);
        assert_eq!(snap.metadata_embedded, 1);
        assert_eq!(snap.covers_downloaded, 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(DownloadStats::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_request();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().requests_made, 8000);
    }

    #[test]
    fn test_display_contains_megabytes() {
        let snap = StatsSnapshot {
            bytes_downloaded: 3 * 1024 * 1024,
            ..Default::default()
        };
        assert!(snap.to_string().contains("3.00 MB"));
    }
}

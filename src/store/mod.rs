pub mod performance;

pub use performance::{CrawlerStatistics, PerformanceStore, SelectorStat};

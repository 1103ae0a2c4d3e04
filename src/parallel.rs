//! Parallel processing configuration
//!
//! Configures Rayon's global thread pool used by the reductions, the skill
//! computation and chunked Zarr I/O.

use crate::errors::{ArCheckError, Result};
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Use all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Set up the global Rayon thread pool.
    ///
    /// The global pool can be built only once per process; a second call
    /// with an explicit thread count fails with [`ArCheckError::ThreadPool`].
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(0) => Err(ArCheckError::ThreadPool(
                "The number of threads must be at least 1".to_string(),
            )),
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build_global()
                    .map_err(|e| {
                        ArCheckError::ThreadPool(format!(
                            "Failed to initialize thread pool with {} threads: {}",
                            num_threads, e
                        ))
                    })?;
                info!(threads = num_threads, "configured parallel processing");
                Ok(())
            }
            None => {
                debug!(threads = rayon::current_num_threads(), "using default thread pool");
                Ok(())
            }
        }
    }
}

/// Threads available to the skill computation and chunked I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelInfo {
    pub pool_threads: usize,
    pub cpu_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    pub fn print_info(&self) {
        println!(
            "🧵 Rayon pool: {} threads ({} CPU cores, parallelism {})",
            self.pool_threads, self.cpu_cores, self.available_parallelism
        );
        if self.pool_threads > self.available_parallelism {
            println!("   ⚠️  more threads than the system can run in parallel");
        }
    }
}

pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        pool_threads: rayon::current_num_threads(),
        cpu_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism().map_or(1, |p| p.get()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_config() {
        assert_eq!(ParallelConfig::default().num_threads, None);
        assert_eq!(ParallelConfig::with_threads(3).num_threads, Some(3));
        assert!(ParallelConfig::all_cores().num_threads.unwrap() >= 1);
        assert!(ParallelConfig::with_threads(0).setup_global_pool().is_err());
        assert!(ParallelConfig::default().setup_global_pool().is_ok());
    }

    #[test]
    fn test_parallel_info() {
        let info = get_parallel_info();
        assert!(info.pool_threads >= 1);
        assert!(info.cpu_cores >= 1);
    }
}

//! # Event loop configuration.
//!
//! [`Config`] fixes the loop's construction-time knobs: the node name used in
//! log output, whether input handlers run on the worker pool, and the pool
//! size. There is no file-backed layer; embedding applications own their own
//! configuration sources and hand the finished struct to
//! [`EventLoop::new`](crate::EventLoop::new).
//!
//! # Example
//! ```
//! use nodeloop::Config;
//!
//! let mut cfg = Config::default();
//! cfg.node_name = "imu_bridge".into();
//! cfg.workers = 2;
//!
//! assert!(cfg.use_worker_pool);
//! assert_eq!(cfg.workers_clamped(), 2);
//! ```

/// Construction-time configuration for an [`EventLoop`](crate::EventLoop).
#[derive(Clone, Debug)]
pub struct Config {
    /// Node name, used for log output only.
    pub node_name: String,
    /// Dispatch input handlers on the worker pool instead of inline.
    pub use_worker_pool: bool,
    /// Number of pool worker threads (clamped to at least 1 when the pool
    /// is enabled).
    pub workers: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `node_name = "node"`
    /// - `use_worker_pool = true`
    /// - `workers = 4`
    fn default() -> Self {
        Self {
            node_name: "node".to_string(),
            use_worker_pool: true,
            workers: 4,
        }
    }
}

impl Config {
    /// Creates a configuration with the given node name and the defaults
    /// above for everything else.
    pub fn named(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    /// Worker count with the minimum of 1 applied.
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }
}

/*!
 * Core Module
 * Time budgets, worker identity and interruptible synchronization
 */

pub mod budget;
pub mod id;
pub mod sync;

// Re-export for convenience
pub use budget::{TimeBudget, TimeUnit};
pub use id::{WorkerName, WORKER_NAME_PREFIX};

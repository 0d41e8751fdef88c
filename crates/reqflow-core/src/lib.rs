//! # ReqFlow Core
//!
//! Shared building blocks for the ReqFlow crates:
//! - [`error`]: the error taxonomy every crate returns
//! - [`config`]: TOML configuration for workflow policy and storage
//!
//! ## Architecture
//! ```text
//! raw record
//!   → reqflow-validation (rule registry + engine)
//!   → reqflow-workflow (schemas, lifecycle manager)
//!     ├── WorkflowStore port   (persistence)
//!     ├── Notifier port        (reminder delivery)
//!     └── Presenter port       (optional UI feedback)
//! ```

pub mod config;
pub mod error;

pub use config::{ReqflowConfig, StoreConfig, TaskTemplate, WorkflowConfig};
pub use error::{ReqflowError, Result};

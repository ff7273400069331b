//! Log-line recognizers and classifier for managed Minecraft servers.
//!
//! This crate turns one raw line of server output into a typed
//! [`ClassifiedEvent`](mcpm_models::ClassifiedEvent).
//!
//! # Key Concepts
//!
//! - **Pattern**: a named regex that can be searched or fully matched
//! - **PatternSet**: the fixed group of recognizers used for one server,
//!   overridable through [`PatternSetBuilder`]
//! - **classify**: first-match classification with a fixed precedence
//!   (chat > join/leave > server ready > RCON ready > plain log)
//!
//! # Example
//!
//! ```
//! use mcpm_models::{EventKindTag, ServerId};
//! use mcpm_patterns::{classify, PatternSet};
//!
//! let patterns = PatternSet::default();
//! let event = classify(
//!     &ServerId::new("survival"),
//!     "[10:15:00] [Server thread/INFO]: <Steve> hello",
//!     &patterns,
//! )
//! .unwrap();
//!
//! assert_eq!(event.kind_tag(), EventKindTag::Message);
//! assert_eq!(event.player_name(), Some("Steve"));
//! ```

pub mod classifier;
pub mod error;
pub mod patterns;

pub use classifier::{classify, LineClassifier};
pub use error::{ClassifyError, PatternError, Result};
pub use patterns::{Pattern, PatternSet, PatternSetBuilder};

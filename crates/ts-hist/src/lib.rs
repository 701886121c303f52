//! # ts-hist
//!
//! Histogram value type and archive format for tstat.
//!
//! Histograms are plain serde-serializable values with uniform axes (1 to 3
//! dimensions). Archives store nested named folders of histograms in a single
//! JSON file, preserving the nested-directory shape of ROOT analysis output.
//!
//! ## Example
//!
//! ```no_run
//! use ts_hist::Archive;
//!
//! let archive = Archive::open("ttbar/templates.json").unwrap();
//! let h = archive.get("/met").unwrap();
//! println!("bins: {}, entries: {}", h.bin_content.len(), h.entries);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod histogram;

pub use archive::{Archive, Folder};
pub use histogram::{Axis, Histogram};

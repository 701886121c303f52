//! # ts-templates
//!
//! Template/channel aggregation pipeline for tstat.
//!
//! Input histograms ("templates") are loaded from per-sample archives, scaled
//! by cross-section and luminosity, rebinned, and merged into named physics
//! channels (`ttbar`, `stop`, `data`, ...). The composite `mc` channel sums
//! all Monte-Carlo backgrounds and is the object the fraction fit works on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod compare;
pub mod export;
pub mod loader;
pub mod plotinfo;
pub mod sample;
pub mod scales;
pub mod systematics;
pub mod template;

pub use channel::{ChannelDb, MC_CHANNELS};
pub use loader::{ChannelLoader, LoadedPlots};
pub use plotinfo::{PlotInfo, PlotInfoDb};
pub use sample::{SampleDb, SampleInfo, LUMINOSITY};
pub use scales::Scales;
pub use systematics::{SystematicSet, SystematicShift, SystematicsLoader};
pub use template::{ChannelTemplate, InputTemplate};

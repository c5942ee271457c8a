//! Gzip size tracking for build output.
//!
//! Before a build the existing output is measured into a [`SizeSnapshot`];
//! after it the new assets are measured again and compared, producing a
//! [`BuildReport`].

mod report;
mod snapshot;

pub use report::{classify_delta, BuildReport, ReportRow, SizeDelta, FIFTY_KILOBYTES};
pub use snapshot::{gzip_size, is_reported, normalize_key, SizeSnapshot};

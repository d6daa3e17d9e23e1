//! Export module for writing pins to disk
//!
//! This module handles everything that happens to a pin after it is
//! decoded:
//! - Deriving the destination path from board, id and mime type
//! - Streaming the asset from the CDN
//! - Embedding the source link with an external tool
//! - Recording pins whose tagging failed

mod materializer;
mod paths;
mod skip_log;
mod tagger;

pub use materializer::{download_to_file, AssetMaterializer, DownloadError, MaterializeOutcome};
pub use paths::{asset_url, destination_path, extension_for_mime, sanitize_board_title};
pub use skip_log::SkipLog;
pub use tagger::{ExifTool, MetadataTagger, TagError};

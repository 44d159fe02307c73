//! Firmware transfer
//!
//! A transfer walks `Idle -> VersionChecked -> Transferring -> Completed`,
//! dropping to `Aborted` on a declined version mismatch, a handshake the
//! device refuses or a link that stops accepting writes:
//!
//! 1. `GET_VER` and compare with the expected version
//! 2. `START_FIRMWARE`, expect `READY`
//! 3. `FIRMWARE:<line>` per image line, expect `OK`, one retry per line
//! 4. `END_FIRMWARE`, expect `UPDATE_SUCCESS`
//!
//! ```rust,ignore
//! let image = FirmwareImage::from_path("update.hex")?;
//! let uploader = FirmwareUploader::new(protocol, UploadConfig::default());
//! let report = uploader
//!     .run(&image, |_expected, _actual| false, None::<fn(&TransferProgress)>)
//!     .await?;
//! println!("{}", report.summary());
//! ```

mod image;
mod session;
mod uploader;

pub use image::FirmwareImage;
pub use session::{TransferSession, TransferState};
pub use uploader::{FirmwareUploader, TransferProgress, TransferReport, UploadConfig};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a transfer from being attempted at all
#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Cannot read firmware image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Firmware image is empty")]
    EmptyImage,

    #[error("Invalid transfer transition: {from} -> {to}")]
    InvalidTransition {
        from: TransferState,
        to: TransferState,
    },
}

//! mdconvert engine: conversion backend client and effect execution.
mod api;
mod device;
mod engine;
mod filename;
mod persist;
mod poll;
mod preview;
mod types;

pub use api::{ApiSettings, ConversionApi, HttpConversionApi};
pub use device::{
    fingerprint, load_or_create_device_id, load_or_create_with, random_device_id, HostInfo,
    DEVICE_ID_FILENAME,
};
pub use engine::{EngineConfig, EngineHandle};
pub use filename::sanitize_file_name;
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use poll::PollSettings;
pub use preview::{prepare_preview_content, MAX_PREVIEW_CONTENT};
pub use types::{
    ApiError, BatchStatus, EngineEvent, FailureKind, MarkdownPreview, RemoteStatus,
    SubmitReceipt, TaskId, UploadFile, STATE_FAILURE, STATE_SUCCESS,
};

//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities

mod checkpoint;
mod config;

pub use checkpoint::{
    find_latest_checkpoint, list_checkpoints, load_checkpoint, load_checkpoint_meta,
    save_checkpoint, CheckpointMeta,
};
pub use config::{Config, DataConfig, ModelConfig, TrainingConfigFile};

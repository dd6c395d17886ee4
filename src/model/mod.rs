//! Model module containing WGAN architecture components
//!
//! This module provides:
//! - Generator network for creating synthetic images
//! - Critic network for scoring real and generated images
//! - WGAN wrapper combining both networks

mod critic;
mod generator;
mod wgan;

pub use critic::{Critic, CriticConfig};
pub use generator::{Generator, GeneratorConfig};
pub use wgan::{parameter_norm, AdamParams, Wgan};

//! # UI Module
//!
//! This module contains all UI components for the Soundwise tuner.

pub mod cent_meter;
pub mod main_display;

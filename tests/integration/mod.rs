//! Integration test modules for strata

mod expressions;
mod recording;
mod settings;
mod switching;
mod tracks;

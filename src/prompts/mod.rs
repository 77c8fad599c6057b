//! Prompt templates for LLM-based operations.
//!
//! This module provides modular prompt templates for the planning and
//! verification stages of the pipeline.

pub mod criteria;
pub mod validation;

//! Unit tests for tfharness configuration types.
//!
//! This module contains tests organised into:
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Basic type and serialisation tests
//! - [`normalization`] - Post-merge clean-up of blank values
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence tests

mod helpers;

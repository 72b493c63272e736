// ==============================================================================
// lib.rs - Diversity Processor Library
// ==============================================================================
// Description: Library interface for windowed π / d_xy computation over
//              all-sites genotype data
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod aggregator;
pub mod config;
pub mod diversity;
pub mod filter;
pub mod genotype;
pub mod models;
pub mod output;
pub mod parsers;
pub mod populations;
pub mod processor;
pub mod store;
pub mod validator;
pub mod windows;

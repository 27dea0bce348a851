//! outbound - a deliverability-safe cold outbound sending engine
//!
//! This crate provides the send-safety core for B2B cold outreach: candidate
//! address acceptance, pre-send gating (throttle, suppression, rate limits),
//! rotating SMTP dispatch, and bounce-driven adaptive rate control.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

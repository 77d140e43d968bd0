//! GroundLink - phase-aware coordination of aircraft and ground-service
//! simulations.
//!
//! The library tracks the aircraft through its turnaround cycle with a
//! [`phase::PhaseStateMachine`], lets one coordinator per service domain
//! (passengers, doors, ground equipment, fuel, cargo) react to each phase and
//! has a [`orchestrator::ServiceOrchestrator`] request the matching automated
//! ground services.
//!
//! Both simulations are reached through the narrow named-variable traits in
//! [`facade`]; nothing here talks to a simulator directly.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod facade;
pub mod log;
pub mod logging;
pub mod orchestrator;
pub mod phase;
pub mod worker;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

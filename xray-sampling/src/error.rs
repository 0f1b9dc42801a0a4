// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Errors returned when building or shutting down a sampler.
///
/// Failures of the polling loops are never returned; they are logged and the loops keep going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// A polling interval of zero was configured
    InvalidPollingInterval,
    /// The collector endpoint is not an absolute http URI
    InvalidEndpoint(String),
    /// The polling runtime or its thread could not be started
    RuntimeCreation(String),
    /// The mutex protecting the worker handle was poisoned
    HandleMutexPoisoned,
    /// The polling thread panicked
    WorkerPanicked(String),
    /// Shutdown did not complete within the given timeout
    ShutdownTimedOut(std::time::Duration),
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerError::InvalidPollingInterval => {
                write!(f, "polling interval must be greater than zero")
            }
            SamplerError::InvalidEndpoint(endpoint) => {
                write!(f, "invalid sampling endpoint: {endpoint}")
            }
            SamplerError::RuntimeCreation(msg) => {
                write!(f, "failed to start polling runtime: {msg}")
            }
            SamplerError::HandleMutexPoisoned => write!(f, "worker handle mutex poisoned"),
            SamplerError::WorkerPanicked(msg) => write!(f, "polling worker panicked: {msg}"),
            SamplerError::ShutdownTimedOut(timeout) => {
                write!(f, "shutdown timed out after {timeout:?}")
            }
        }
    }
}

impl std::error::Error for SamplerError {}

// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shutdown plumbing of the background polling thread

use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread,
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{error::SamplerError, log::Logger, xray_error};

#[derive(Debug, Default)]
struct ShutdownSignaler {
    shutdown_finished: Mutex<bool>,
    shutdown_condvar: Condvar,
}

impl ShutdownSignaler {
    fn signal_shutdown(&self) {
        let mut finished = self
            .shutdown_finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *finished = true;
        self.shutdown_condvar.notify_all();
    }

    fn wait_for_shutdown(&self, timeout: Duration) -> Result<(), SamplerError> {
        let Ok(finished) = self.shutdown_finished.lock() else {
            return Ok(());
        };
        let Ok((_finished, wait)) =
            self.shutdown_condvar
                .wait_timeout_while(finished, timeout, |f| !*f)
        else {
            return Ok(());
        };
        if wait.timed_out() {
            return Err(SamplerError::ShutdownTimedOut(timeout));
        }
        Ok(())
    }
}

/// Owner side of a worker thread.
///
/// Dropping the handle cancels the worker without waiting for it.
pub(crate) struct WorkerHandle {
    join_handle: Mutex<Option<thread::JoinHandle<()>>>,
    cancel_token: CancellationToken,
    shutdown_finished: Arc<ShutdownSignaler>,
    logger: Arc<dyn Logger>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.trigger_shutdown();
    }
}

impl WorkerHandle {
    /// Runs `work` on a new named thread
    pub(crate) fn spawn<F>(
        name: &str,
        logger: Arc<dyn Logger>,
        work: F,
    ) -> Result<WorkerHandle, SamplerError>
    where
        F: FnOnce(ShutdownReceiver) + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let shutdown_finished = Arc::new(ShutdownSignaler::default());
        let shutdown_receiver = ShutdownReceiver {
            cancel_token: cancel_token.clone(),
            shutdown_finished: shutdown_finished.clone(),
        };
        let join_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || work(shutdown_receiver))
            .map_err(|e| SamplerError::RuntimeCreation(e.to_string()))?;
        Ok(WorkerHandle {
            join_handle: Mutex::new(Some(join_handle)),
            cancel_token,
            shutdown_finished,
            logger,
        })
    }

    pub(crate) fn trigger_shutdown(&self) {
        self.cancel_token.cancel();
    }

    pub(crate) fn is_shutdown_triggered(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Waits for the worker to exit. Returns immediately if it was already joined.
    pub(crate) fn wait_for_shutdown(&self, timeout: Duration) -> Result<(), SamplerError> {
        let Some(handle) = self
            .join_handle
            .lock()
            .map_err(|_| {
                xray_error!(
                    self.logger,
                    "RemoteSampler.wait_for_shutdown: handle mutex poisoned"
                );
                SamplerError::HandleMutexPoisoned
            })?
            .take()
        else {
            return Ok(());
        };
        self.shutdown_finished.wait_for_shutdown(timeout)?;
        handle.join().map_err(|e| {
            let err = if let Some(e) = e.downcast_ref::<&'static str>() {
                e
            } else if let Some(e) = e.downcast_ref::<String>() {
                e
            } else {
                "unknown panic type"
            };
            xray_error!(
                self.logger,
                "RemoteSampler.wait_for_shutdown: Worker panicked: {}",
                err
            );
            SamplerError::WorkerPanicked(err.to_string())
        })?;
        Ok(())
    }
}

/// Worker side of the shutdown signal
///
/// When this struct is dropped, it will signal that the shutdown is finished to the
/// handle
pub(crate) struct ShutdownReceiver {
    cancel_token: CancellationToken,
    shutdown_finished: Arc<ShutdownSignaler>,
}

impl Drop for ShutdownReceiver {
    fn drop(&mut self) {
        self.shutdown_finished.signal_shutdown();
    }
}

impl ShutdownReceiver {
    /// Completes once the handle triggered a shutdown
    pub(crate) async fn cancelled(&self) {
        self.cancel_token.cancelled().await
    }
}

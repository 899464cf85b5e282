//! Sensor session: discovery, open, and close of the one attached sensor

use tracing::{debug, trace, warn};

use crate::error::{KinectError, Result};
use crate::handle::Handle;
use crate::native::{KinectApi, Sensor};

/// The opened default sensor.
///
/// Readers share a session through an `Arc`, so the sensor stays open until
/// the last reader built on it is gone. Not internally synchronized.
pub struct Session<S: Sensor> {
    sensor: Handle<S>,
}

impl<S: Sensor> Session<S> {
    /// Discover the default sensor and open it.
    ///
    /// Fails with [`KinectError::SensorNotFound`] when discovery fails and
    /// [`KinectError::SensorOpenFailed`] when the open call fails. On failure
    /// the discovered sensor reference is released without a close call.
    pub fn open<A>(api: &A) -> Result<Self>
    where
        A: KinectApi<Sensor = S>,
    {
        trace!("Discovering default sensor");
        let sensor = Handle::new(
            api.default_sensor().map_err(|source| KinectError::SensorNotFound { source })?,
        );

        if let Some(raw) = sensor.get() {
            raw.open().map_err(|source| KinectError::SensorOpenFailed { source })?;
        }

        debug!("Sensor opened");
        Ok(Self { sensor })
    }

    /// Non-owning access to the native sensor.
    pub fn sensor(&self) -> Result<&S> {
        self.sensor.get().ok_or(KinectError::HandleReleased { resource: "sensor" })
    }
}

impl<S: Sensor> Drop for Session<S> {
    fn drop(&mut self) {
        if let Some(raw) = self.sensor.get() {
            debug!("Closing sensor");
            if let Err(e) = raw.close() {
                warn!(error = %e, "Sensor close failed during teardown");
            }
        }
    }
}

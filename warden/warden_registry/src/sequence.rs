//! Durable service id sequence.
//!
//! The sequence records the highest id ever handed out or observed. It is
//! persisted before an allocated id is returned, so ids are never reused,
//! not even across restarts or after the service holding the id is deleted.

use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use warden_core::error::{RegistryError, Result};
use warden_core::id::ServiceId;

use crate::atomic::write_atomic;

/// File name of the persisted sequence, inside the registry directory.
pub const SEQUENCE_FILE: &str = ".sequence";

/// A persisted, monotonically increasing id sequence.
#[derive(Debug)]
pub struct IdSequence {
    dir: PathBuf,
    high_water: Mutex<i64>,
}

impl IdSequence {
    /// Open the sequence stored in `dir`.
    ///
    /// `observed` is the highest id found among existing documents; the
    /// sequence resumes after whichever of it and the persisted value is
    /// larger.
    pub fn open(dir: &Path, observed: ServiceId) -> Result<Self> {
        let path = dir.join(SEQUENCE_FILE);
        let persisted = match fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<i64>().map_err(|e| RegistryError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let high_water = persisted.max(observed.value()).max(0);
        debug!(dir = %dir.display(), high_water, "opened id sequence");

        Ok(Self {
            dir: dir.to_path_buf(),
            high_water: Mutex::new(high_water),
        })
    }

    /// Allocate the next id.
    pub fn next(&self) -> Result<ServiceId> {
        let mut high_water = self.high_water.lock();
        let next = high_water
            .checked_add(1)
            .ok_or(RegistryError::SequenceExhausted(ServiceId::new(*high_water)))?;

        self.persist(next)?;
        *high_water = next;
        Ok(ServiceId::new(next))
    }

    /// Record an explicitly chosen id so later allocations exceed it.
    pub fn observe(&self, id: ServiceId) -> Result<()> {
        let mut high_water = self.high_water.lock();
        if id.value() > *high_water {
            self.persist(id.value())?;
            *high_water = id.value();
        }
        Ok(())
    }

    /// The highest id allocated or observed so far.
    pub fn current(&self) -> ServiceId {
        ServiceId::new(*self.high_water.lock())
    }

    fn persist(&self, value: i64) -> Result<()> {
        write_atomic(&self.dir, SEQUENCE_FILE, value.to_string().as_bytes())?;
        Ok(())
    }
}

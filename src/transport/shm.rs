// SysV shared-memory pool shared with the ns-3 scenario.
//
// Pool layout:
//   0   u32  finished flag, set by the simulator when it stops interacting
//   4   u32  memory block key
//   8   u32  version counter, phase = version % 4
//   12  u32  Env record size
//   16  Env record, Act record right after it
//
// Phases: 0 simulator writes Env, 1 Env ready, 2 held by the driver, 3 Act ready.
// The simulator moves 3 -> 0 after reading the Act record.

use super::{Env, RecordLayout, StepSnapshot, Transport};
use crate::error::{ConfigError, TransportError};
use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const FINISHED_OFFSET: usize = 0;
const BLOCK_KEY_OFFSET: usize = 4;
const VERSION_OFFSET: usize = 8;
const ENV_SIZE_OFFSET: usize = 12;
pub const HEADER_SIZE: usize = 16;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

const PHASE_ENV_READY: u32 = 1;
const PHASE_HELD: u32 = 2;

pub struct ShmTransport {
    key: i32,
    id: i32,
    base: *mut u8,
    size: usize,
    layout: RecordLayout,
    next_step: u64,
}

impl ShmTransport {
    pub fn required_size(layout: &RecordLayout) -> usize {
        HEADER_SIZE + layout.env_size() + layout.act_size()
    }

    /// Creates (or reuses) the pool under `key` and resets it.
    pub fn open(key: i32, size: usize, block_key: u32, layout: RecordLayout) -> Result<Self> {
        let needed = Self::required_size(&layout);
        if size < needed {
            return Err(ConfigError::PoolTooSmall { pool: size, needed }.into());
        }

        let id = unsafe { libc::shmget(key as libc::key_t, size, libc::IPC_CREAT | 0o666) };
        if id < 0 {
            return Err(TransportError::SharedMemory {
                op: "shmget",
                key,
                source: std::io::Error::last_os_error(),
            }
            .into());
        }

        let base = attach(id, key, 0)?;
        unsafe { std::ptr::write_bytes(base, 0, size) };

        let transport = Self {
            key,
            id,
            base,
            size,
            layout,
            next_step: 0,
        };
        transport.word(BLOCK_KEY_OFFSET).store(block_key, Ordering::Release);
        transport
            .word(ENV_SIZE_OFFSET)
            .store(layout.env_size() as u32, Ordering::Release);

        info!(
            "Shared memory pool ready: key {}, {} bytes, block {}",
            key, size, block_key
        );
        Ok(transport)
    }

    fn word(&self, offset: usize) -> &AtomicU32 {
        // shmat hands out page-aligned memory, every header word is 4-byte aligned
        unsafe { &*(self.base.add(offset) as *const AtomicU32) }
    }

    fn read_env(&self) -> Result<Env> {
        let mut bytes = vec![0u8; self.layout.env_size()];
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.add(HEADER_SIZE), bytes.as_mut_ptr(), bytes.len());
        }
        Ok(Env::decode(&self.layout, &bytes)?)
    }
}

/// Maps segment `id`. A segment that cannot be mapped is removed again, since nothing
/// else would ever release it.
fn attach(id: i32, key: i32, flags: libc::c_int) -> Result<*mut u8, TransportError> {
    let addr = unsafe { libc::shmat(id, std::ptr::null(), flags) };
    if addr as isize != -1 {
        return Ok(addr as *mut u8);
    }

    let source = std::io::Error::last_os_error();
    if unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) } != 0 {
        warn!("Could not remove unattached segment {}: {}", id, std::io::Error::last_os_error());
    }
    Err(TransportError::SharedMemory { op: "shmat", key, source })
}

impl Transport for ShmTransport {
    fn is_finished(&self) -> bool {
        self.base.is_null() || self.word(FINISHED_OFFSET).load(Ordering::Acquire) != 0
    }

    async fn acquire(&mut self) -> Result<Option<StepSnapshot>> {
        loop {
            if self.base.is_null() {
                return Err(TransportError::Closed.into());
            }

            let version = self.word(VERSION_OFFSET);
            let current = version.load(Ordering::Acquire);
            if current % 4 == PHASE_ENV_READY {
                if version
                    .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let env = self.read_env()?;
                    let snapshot = StepSnapshot::new(self.next_step, env, self.layout.capacity);
                    self.next_step += 1;
                    return Ok(Some(snapshot));
                }
                continue;
            }

            if self.is_finished() {
                debug!("Simulator finished while waiting for step {}", self.next_step);
                return Ok(None);
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn release(&mut self, snapshot: StepSnapshot) -> Result<()> {
        if self.base.is_null() {
            return Err(TransportError::Closed.into());
        }

        let mut bytes = vec![0u8; self.layout.act_size()];
        snapshot.act.encode(&self.layout, &mut bytes)?;
        unsafe {
            let act = self.base.add(HEADER_SIZE + self.layout.env_size());
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), act, bytes.len());
        }

        let version = self.word(VERSION_OFFSET);
        let phase = version.load(Ordering::Acquire) % 4;
        if phase != PHASE_HELD {
            warn!("Releasing step {} in unexpected phase {}", snapshot.step, phase);
        }
        version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.base.is_null() {
            return Ok(());
        }

        let detached = unsafe { libc::shmdt(self.base as *const libc::c_void) };
        self.base = std::ptr::null_mut();
        if detached != 0 {
            return Err(TransportError::SharedMemory {
                op: "shmdt",
                key: self.key,
                source: std::io::Error::last_os_error(),
            }
            .into());
        }

        let removed = unsafe { libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if removed != 0 {
            return Err(TransportError::SharedMemory {
                op: "shmctl",
                key: self.key,
                source: std::io::Error::last_os_error(),
            }
            .into());
        }

        info!("Shared memory pool {} ({} bytes) released", self.key, self.size);
        Ok(())
    }
}

impl Drop for ShmTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Shared memory cleanup failed: {}", e);
        }
    }
}

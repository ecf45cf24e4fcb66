//! Process-wide pdfium binding.
//!
//! pdfium initializes global state when bound and destroys it when the
//! `Pdfium` value drops, and the library itself is not reentrant. One binding
//! is therefore shared by every worker thread, and every call into it runs
//! under the handle's call lock.

use crate::error::{ExtractError, Result};
use std::sync::{Arc, Mutex, MutexGuard};

pub type LibraryBind<T> = fn() -> Result<T>;

enum LibrarySlot<T> {
    Unbound,
    Ready(Arc<T>),
    Failed(String),
}

pub struct SharedLibrary<T> {
    name: &'static str,
    bind: LibraryBind<T>,
    slot: Mutex<LibrarySlot<T>>,
    calls: Mutex<()>,
}

impl<T> SharedLibrary<T> {
    pub const fn new(name: &'static str, bind: LibraryBind<T>) -> Self {
        Self {
            name,
            bind,
            slot: Mutex::new(LibrarySlot::Unbound),
            calls: Mutex::new(()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, LibrarySlot<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the library, binding it on first call. A failed bind is
    /// remembered until `teardown`.
    pub fn get(&self) -> Result<Arc<T>> {
        let mut slot = self.slot();
        match &*slot {
            LibrarySlot::Ready(library) => return Ok(Arc::clone(library)),
            LibrarySlot::Failed(reason) => return Err(ExtractError::RendererUnavailable(reason.clone())),
            LibrarySlot::Unbound => {}
        }

        match (self.bind)() {
            Ok(library) => {
                log::info!("{} bound", self.name);
                let library = Arc::new(library);
                *slot = LibrarySlot::Ready(Arc::clone(&library));
                Ok(library)
            }
            Err(err) => {
                log::warn!("{} unavailable: {err}", self.name);
                let reason = match &err {
                    ExtractError::RendererUnavailable(reason) => reason.clone(),
                    other => other.to_string(),
                };
                *slot = LibrarySlot::Failed(reason);
                Err(err)
            }
        }
    }

    /// Hold while calling into the library, including when dropping any
    /// value that calls into it on drop.
    pub fn lock_calls(&self) -> MutexGuard<'_, ()> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_bound(&self) -> bool {
        matches!(&*self.slot(), LibrarySlot::Ready(_))
    }

    /// Release the shared binding. Documents still open keep it alive until
    /// they finish; the next `get` binds again.
    pub fn teardown(&self) {
        let mut slot = self.slot();
        if !matches!(&*slot, LibrarySlot::Unbound) {
            log::debug!("{} released", self.name);
        }
        *slot = LibrarySlot::Unbound;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

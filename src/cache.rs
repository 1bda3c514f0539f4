use crate::{activate::ViewActivator, compiler::RenderUnit, folder::Signature, log::Error};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// An ordered set of template identifiers naming one logical view: the
/// content template, then any layout and further templates composed
/// around it.
///
/// Two descriptors are cache equivalent exactly when their ordered
/// template sequences and any bound precompiled view id match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Descriptor {
    pub templates: Vec<String>,
    /// Identity of a bound precompiled view, when one applies.
    pub bound_view: Option<String>,
}

impl Descriptor {
    /// Create a new, empty Descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a template name, returning the Descriptor so additional
    /// methods may be chained.
    pub fn add_template<S>(mut self, name: S) -> Self
    where
        S: Into<String>,
    {
        self.templates.push(name.into());
        self
    }
}

/// A compiled artifact held by the cache.
#[derive(Debug)]
pub struct CompiledView {
    pub unit: Arc<dyn RenderUnit>,
    pub activator: Box<dyn ViewActivator>,
    /// Name and signature of every template the artifact was built from,
    /// captured at build time.
    pub dependencies: Vec<(String, Signature)>,
    /// The generated source handed to the host compiler.
    pub source: String,
}

/// Cache of compiled views, keyed by descriptor identity.
///
/// Each descriptor has its own entry lock, so builds of unrelated
/// descriptors run in parallel while at most one build is in flight per
/// descriptor. A failed build caches nothing, leaving the descriptor
/// buildable on the next lookup.
#[derive(Default)]
pub struct ViewCache {
    entries: Mutex<HashMap<Descriptor, Arc<Entry>>>,
}

#[derive(Default)]
struct Entry {
    slot: Mutex<Option<Arc<CompiledView>>>,
}

impl ViewCache {
    /// Create a new, empty ViewCache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached view.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Return the cached view for the descriptor, building it when it is
    /// absent or no longer fresh.
    ///
    /// The freshness check runs outside the entry lock, so a slow check
    /// does not serialize builds of other descriptors behind it.
    ///
    /// # Errors
    ///
    /// Propagates the build error to the caller; nothing is cached.
    pub fn lookup<F, B>(
        &self,
        descriptor: &Descriptor,
        fresh: F,
        build: B,
    ) -> Result<Arc<CompiledView>, Error>
    where
        F: Fn(&CompiledView) -> bool,
        B: FnOnce() -> Result<Arc<CompiledView>, Error>,
    {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            Arc::clone(entries.entry(descriptor.clone()).or_default())
        };

        let snapshot = entry.slot.lock().unwrap().clone();
        match snapshot {
            Some(view) => {
                if fresh(&view) {
                    return Ok(view);
                }

                // Stale: rebuild under the entry lock, unless another
                // caller already replaced the artifact we observed.
                let mut slot = entry.slot.lock().unwrap();
                if let Some(current) = &*slot {
                    if !Arc::ptr_eq(current, &view) {
                        return Ok(Arc::clone(current));
                    }
                }
                *slot = None;
                let built = build()?;
                *slot = Some(Arc::clone(&built));
                Ok(built)
            }
            None => {
                let mut slot = entry.slot.lock().unwrap();
                if let Some(current) = &*slot {
                    // Another caller built the view while we waited.
                    return Ok(Arc::clone(current));
                }
                let built = build()?;
                *slot = Some(Arc::clone(&built));
                Ok(built)
            }
        }
    }
}

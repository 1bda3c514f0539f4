use crate::compiler::{RenderUnit, View};
use std::sync::Arc;

/// Creates an activator for a registered render unit.
pub trait ViewActivatorFactory: Send + Sync {
    fn register(&self, unit: &Arc<dyn RenderUnit>) -> Box<dyn ViewActivator>;
}

/// Activates and releases view instances for one render unit.
///
/// Release must only be called with an instance returned by a matching
/// activate.
pub trait ViewActivator: Send + Sync + std::fmt::Debug {
    fn activate(&self) -> Box<dyn View>;
    fn release(&self, view: Box<dyn View>);
}

/// The default activator: constructs on activate, discards on release.
///
/// The factory contract exists so hosts can pool or otherwise manage
/// instances.
#[derive(Debug, Default)]
pub struct DefaultViewActivator;

impl ViewActivatorFactory for DefaultViewActivator {
    fn register(&self, unit: &Arc<dyn RenderUnit>) -> Box<dyn ViewActivator> {
        Box::new(UnitActivator {
            unit: Arc::clone(unit),
        })
    }
}

#[derive(Debug)]
struct UnitActivator {
    unit: Arc<dyn RenderUnit>,
}

impl ViewActivator for UnitActivator {
    fn activate(&self) -> Box<dyn View> {
        self.unit.instantiate()
    }

    fn release(&self, view: Box<dyn View>) {
        drop(view);
    }
}

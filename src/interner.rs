use std::collections::HashMap;
use std::rc::Rc;

/// A process-wide pool of interned symbol names.
///
/// Repeated symbol names across Dsos (libc trampolines, common C++ helpers)
/// share one allocation. The pool is append-only for the engine's lifetime;
/// it is dropped along with the owning [`crate::context::Context`] once the
/// last Dso handle is released.
#[derive(Debug, Default)]
pub struct NameInterner {
    strings: HashMap<Rc<str>, Rc<str>>,
}

impl NameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Rc<str> {
        if let Some(existing) = self.strings.get(name) {
            return Rc::clone(existing);
        }
        let rc: Rc<str> = Rc::from(name);
        self.strings.insert(Rc::clone(&rc), Rc::clone(&rc));
        rc
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

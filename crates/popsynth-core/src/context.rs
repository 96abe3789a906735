//! Run-wide shared state.
//!
//! A `RunContext` lives for the whole run and is shared by reference with
//! everything the driver builds. It owns the log sink, the console, the
//! per-object error catalog and the evolving-binary handle that the switch
//! observer reads when a notification arrives. Evolution is
//! single-threaded, so interior mutability is `RefCell`/`Cell`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::domain::{LogError, ObjectError};
use crate::logging::{LogFile, LogRecord, LogSink};
use crate::physics::{BinaryStar, EvolutionContext, Notification};

/// Where progress lines go.
pub trait Console {
    fn say(&mut self, line: &str);
}

/// Prints progress lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Receives notifications raised during evolution.
pub trait SwitchObserver {
    fn notify(&self, ctx: &RunContext, notification: &Notification);
}

/// One catalogued problem.
#[derive(Debug)]
struct CatalogEntry {
    object_id: u64,
    error: ObjectError,
}

/// Per-object error catalog. Each kind is recorded once per object and the
/// catalog is cleaned between objects.
#[derive(Debug, Default)]
pub struct ErrorCatalog {
    entries: RefCell<Vec<CatalogEntry>>,
}

impl ErrorCatalog {
    /// Record `error`; returns `false` if that kind was already recorded for
    /// the object.
    pub fn record(&self, object_id: u64, error: ObjectError) -> bool {
        let mut entries = self.entries.borrow_mut();
        let seen = entries
            .iter()
            .any(|e| e.object_id == object_id && e.error.kind() == error.kind());
        if seen {
            return false;
        }
        entries.push(CatalogEntry { object_id, error });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clean(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// The binary currently being evolved. The reference and the flag are only
/// ever changed together.
#[derive(Debug, Default)]
struct EvolvingBinary {
    binary: Weak<BinaryStar>,
    valid: bool,
}

/// Removes the registered observer when dropped.
pub struct ObserverGuard<'a> {
    ctx: &'a RunContext,
}

impl Drop for ObserverGuard<'_> {
    fn drop(&mut self) {
        self.ctx.observer.borrow_mut().take();
    }
}

pub struct RunContext {
    logger: RefCell<Box<dyn LogSink>>,
    console: RefCell<Box<dyn Console>>,
    errors: ErrorCatalog,
    evolving: RefCell<EvolvingBinary>,
    observer: RefCell<Option<Rc<dyn SwitchObserver>>>,
    next_object_id: Cell<u64>,
}

impl RunContext {
    pub fn new(logger: Box<dyn LogSink>, console: Box<dyn Console>) -> Self {
        Self {
            logger: RefCell::new(logger),
            console: RefCell::new(console),
            errors: ErrorCatalog::default(),
            evolving: RefCell::new(EvolvingBinary::default()),
            observer: RefCell::new(None),
            next_object_id: Cell::new(0),
        }
    }

    pub fn errors(&self) -> &ErrorCatalog {
        &self.errors
    }

    /// Run `f` against the log sink.
    pub fn with_logger<T>(&self, f: impl FnOnce(&mut dyn LogSink) -> T) -> T {
        let mut logger = self.logger.borrow_mut();
        f(logger.as_mut())
    }

    pub fn close_standard_file(&self, file: LogFile) -> Result<(), LogError> {
        self.with_logger(|logger| logger.close_standard_file(file))
    }

    /// Emit a progress line.
    pub fn say(&self, line: &str) {
        self.console.borrow_mut().say(line);
    }

    /// Register `observer` until the returned guard is dropped.
    pub fn register_observer(&self, observer: Rc<dyn SwitchObserver>) -> ObserverGuard<'_> {
        *self.observer.borrow_mut() = Some(observer);
        ObserverGuard { ctx: self }
    }

    /// Mark `binary` as the one currently evolving.
    pub fn publish_evolving_binary(&self, binary: &Rc<BinaryStar>) {
        *self.evolving.borrow_mut() = EvolvingBinary {
            binary: Rc::downgrade(binary),
            valid: true,
        };
    }

    /// Clear the evolving-binary handle.
    pub fn reset_evolving_binary(&self) {
        *self.evolving.borrow_mut() = EvolvingBinary::default();
    }

    pub fn evolving_binary_valid(&self) -> bool {
        self.evolving.borrow().valid
    }

    /// The evolving binary, if the handle is valid and the binary is alive.
    pub fn evolving_binary(&self) -> Option<Rc<BinaryStar>> {
        let evolving = self.evolving.borrow();
        if evolving.valid {
            evolving.binary.upgrade()
        } else {
            None
        }
    }
}

impl EvolutionContext for RunContext {
    fn next_object_id(&self) -> u64 {
        let id = self.next_object_id.get();
        self.next_object_id.set(id + 1);
        id
    }

    fn raise(&self, notification: Notification) {
        // Release the borrow before calling out: the observer may log.
        let observer = self.observer.borrow().clone();
        if let Some(observer) = observer {
            observer.notify(self, &notification);
        }
    }

    fn log(&self, file: LogFile, record: LogRecord) {
        let result = self.with_logger(|logger| logger.write(file, &record));
        if let Err(e) = result {
            warn!(file = %file, error = %e, "dropping log record");
        }
    }

    fn report(&self, object_id: u64, error: ObjectError) {
        let message = error.to_string();
        if self.errors.record(object_id, error) {
            warn!(object_id = object_id, error = %message, "object error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryConsole, MemoryLogSink};
    use crate::options::ObjectParameters;
    use crate::physics::{BinaryConfig, StellarType, SwitchEvent};

    fn context() -> RunContext {
        RunContext::new(
            Box::new(MemoryLogSink::new()),
            Box::new(MemoryConsole::new()),
        )
    }

    fn binary(ctx: &RunContext) -> Rc<BinaryStar> {
        let params = ObjectParameters {
            initial_mass_1: Some(20.0),
            initial_mass_2: Some(10.0),
            semi_major_axis: Some(50.0),
            metallicity: 0.0142,
            ..ObjectParameters::default()
        };
        Rc::new(BinaryStar::new(0, 1, &params, &BinaryConfig::default(), ctx).unwrap())
    }

    struct Counter(Cell<usize>);

    impl SwitchObserver for Counter {
        fn notify(&self, _ctx: &RunContext, _notification: &Notification) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_handle_publish_and_reset() {
        let ctx = context();
        assert!(!ctx.evolving_binary_valid());
        assert!(ctx.evolving_binary().is_none());

        let b = binary(&ctx);
        ctx.publish_evolving_binary(&b);
        assert!(ctx.evolving_binary_valid());
        assert!(Rc::ptr_eq(&ctx.evolving_binary().unwrap(), &b));

        ctx.reset_evolving_binary();
        assert!(!ctx.evolving_binary_valid());
        assert!(ctx.evolving_binary().is_none());
    }

    #[test]
    fn test_handle_does_not_keep_binary_alive() {
        let ctx = context();
        let b = binary(&ctx);
        ctx.publish_evolving_binary(&b);
        drop(b);
        assert!(ctx.evolving_binary().is_none());
    }

    #[test]
    fn test_observer_guard_unregisters() {
        let ctx = context();
        let counter = Rc::new(Counter(Cell::new(0)));
        let event = Notification::StellarTypeSwitch(SwitchEvent {
            object_id: 1,
            from: StellarType::MsGt07,
            to: StellarType::HertzsprungGap,
            mass: 10.0,
            age: 20.0,
        });

        {
            let _guard = ctx.register_observer(counter.clone());
            ctx.raise(event);
            ctx.raise(event);
        }
        ctx.raise(event);
        assert_eq!(counter.0.get(), 2);
    }

    #[test]
    fn test_error_catalog_dedupes_per_object_and_cleans() {
        let catalog = ErrorCatalog::default();
        assert!(catalog.record(1, ObjectError::TimeLimitReached(10.0)));
        assert!(!catalog.record(1, ObjectError::TimeLimitReached(11.0)));
        assert!(catalog.record(2, ObjectError::TimeLimitReached(10.0)));
        assert!(catalog.record(1, ObjectError::TimestepLimitReached(5)));
        assert_eq!(catalog.len(), 3);

        catalog.clean();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_object_ids_are_unique() {
        let ctx = context();
        let a = ctx.next_object_id();
        let b = ctx.next_object_id();
        assert_ne!(a, b);
    }
}

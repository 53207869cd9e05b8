//! Process-wide last line of defence: the first fatal occurrence is logged and
//! terminates the process; later ones are ignored.

use std::io::Write;
use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::dispatch::FATAL_LOG_TARGET;

pub const FATAL_EXIT_CODE: i32 = 1;

static FAULT_ISOLATOR: OnceLock<Arc<FaultIsolator>> = OnceLock::new();

type FatalLogger = Box<dyn Fn(&FatalEvent) + Send + Sync>;
type ProcessExit = Box<dyn Fn(i32) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalOrigin {
    Panic,
    TaskFailure,
}

impl FatalOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Panic => "panic",
            Self::TaskFailure => "task_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalEvent {
    pub origin: FatalOrigin,
    pub message: String,
    pub location: Option<String>,
}

impl FatalEvent {
    pub fn task_failure(error: &anyhow::Error) -> Self {
        Self {
            origin: FatalOrigin::TaskFailure,
            message: format!("{error:?}"),
            location: None,
        }
    }

    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            origin: FatalOrigin::Panic,
            message,
            location: info
                .location()
                .map(|location| format!("{}:{}", location.file(), location.line())),
        }
    }

    fn render(&self) -> String {
        match &self.location {
            Some(location) => format!(
                "bench-bot fatal {} at {}: {}",
                self.origin.as_str(),
                location,
                self.message
            ),
            None => format!("bench-bot fatal {}: {}", self.origin.as_str(), self.message),
        }
    }
}

fn log_fatal_event(event: &FatalEvent) {
    tracing::error!(
        target: FATAL_LOG_TARGET,
        origin = event.origin.as_str(),
        location = event.location.as_deref().unwrap_or("unknown"),
        "{}",
        event.message
    );
}

pub struct FaultIsolator {
    terminating: AtomicBool,
    logger: FatalLogger,
    exit: ProcessExit,
}

impl FaultIsolator {
    pub fn new(logger: FatalLogger, exit: ProcessExit) -> Self {
        Self {
            terminating: AtomicBool::new(false),
            logger,
            exit,
        }
    }

    /// Logs through `tracing` and exits the process.
    pub fn for_process() -> Self {
        Self::new(
            Box::new(log_fatal_event),
            Box::new(|code: i32| std::process::exit(code)),
        )
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// Returns true only for the occurrence that claimed termination.
    pub fn handle(&self, event: FatalEvent) -> bool {
        if self
            .terminating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if !self.log_isolated(&event) {
            let _ = writeln!(std::io::stderr(), "{}", event.render());
        }
        (self.exit)(FATAL_EXIT_CODE);
        true
    }

    /// Run the logger on its own thread. A panic raised while the panic hook
    /// is running aborts the process, so the logger must never unwind on the
    /// hook's thread.
    fn log_isolated(&self, event: &FatalEvent) -> bool {
        std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name("bench-bot-fatal-log".to_string())
                .spawn_scoped(scope, || (self.logger)(event))
                .map(|logger| logger.join().is_ok())
                .unwrap_or(false)
        })
    }
}

/// Register the isolator as the panic hook. Only the first call installs;
/// later calls return the already installed instance.
pub fn install_fault_isolator(isolator: FaultIsolator) -> Arc<FaultIsolator> {
    let mut installed = false;
    let active = FAULT_ISOLATOR
        .get_or_init(|| {
            installed = true;
            Arc::new(isolator)
        })
        .clone();
    if installed {
        let hook_isolator = active.clone();
        std::panic::set_hook(Box::new(move |info| {
            hook_isolator.handle(FatalEvent::from_panic(info));
        }));
    }
    active
}

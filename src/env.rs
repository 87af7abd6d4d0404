use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::CancelToken;
use crate::io_adapters::Output;
use crate::registry::Registry;

/// What a running command can see of the interpreter.
///
/// The environment contains:
/// - the shared output sink,
/// - the root registry, for commands that introspect the command tree,
/// - the exit flag a REPL loop checks to know when to terminate,
/// - the cancellation token of the current unit of work.
#[derive(Debug, Clone)]
pub struct Environment {
    output: Output,
    registry: Arc<Registry>,
    exit_requested: Arc<AtomicBool>,
    cancel: CancelToken,
}

impl Environment {
    /// Environment with a fresh exit flag and a token that is never cancelled.
    pub fn new(output: Output, registry: Arc<Registry>) -> Self {
        Self {
            output,
            registry,
            exit_requested: Arc::new(AtomicBool::new(false)),
            cancel: CancelToken::never(),
        }
    }

    /// Share an existing exit flag.
    pub fn with_exit_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.exit_requested = flag;
        self
    }

    pub(crate) fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle to the output sink.
    pub fn output(&self) -> Output {
        self.output.clone()
    }

    /// The root registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Ask the interactive loop to stop after the current command.
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }

    /// Cancellation token of the running command.
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// Whether the running command was interrupted.
    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_flag_is_shared_between_clones() {
        let (output, _) = Output::memory();
        let env = Environment::new(output, Arc::new(Registry::new(true)));
        let other = env.clone();
        assert!(!env.exit_requested());
        other.request_exit();
        assert!(env.exit_requested());
    }

    #[test]
    fn test_external_exit_flag_is_used() {
        let (output, _) = Output::memory();
        let flag = Arc::new(AtomicBool::new(false));
        let env = Environment::new(output, Arc::new(Registry::new(true)))
            .with_exit_flag(Arc::clone(&flag));
        env.request_exit();
        assert!(flag.load(Ordering::SeqCst));
        assert!(!env.is_interrupted());
    }
}

//! Scoped serialization contexts.
//!
//! A context binds a storage backend and a base path for the duration of
//! one document read or write. Field hooks fire deep inside serde's
//! traversal, where no extra parameter can be threaded through, so the
//! active context is kept on a thread-local stack: pushed on enter, popped
//! unconditionally when the guard drops. The stack must be balanced — empty
//! before an outermost operation and empty again after it, on success and
//! on every error path.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cereal_store::Storage;
use tracing::warn;

use crate::error::ContextError;

struct Frame {
    ctx_id: u64,
    storage: Arc<dyn Storage>,
    base_path: String,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A (storage backend, base path) binding, inert until entered.
///
/// One instance may be entered and exited repeatedly, but never re-entered
/// while already on the stack.
pub struct Context {
    id: u64,
    storage: Arc<dyn Storage>,
    base_path: String,
}

impl Context {
    pub fn new(storage: Arc<dyn Storage>, base_path: impl Into<String>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            storage,
            base_path: base_path.into(),
        }
    }

    /// Storage backend this context binds.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Base path this context binds.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Push this context onto the thread's stack, making it active.
    ///
    /// Fails with `ContextError::AlreadyActive` if this instance is already
    /// on the stack. The returned guard pops the frame when dropped, so the
    /// stack stays balanced on every exit path.
    pub fn enter(&self) -> Result<ContextGuard, ContextError> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|frame| frame.ctx_id == self.id) {
                return Err(ContextError::AlreadyActive);
            }
            stack.push(Frame {
                ctx_id: self.id,
                storage: Arc::clone(&self.storage),
                base_path: self.base_path.clone(),
            });
            Ok(ContextGuard {
                ctx_id: self.id,
                exited: false,
            })
        })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Active-context guard; exits the context on drop.
#[must_use = "dropping the guard immediately exits the context"]
pub struct ContextGuard {
    ctx_id: u64,
    exited: bool,
}

impl ContextGuard {
    /// Explicit, order-checked exit.
    ///
    /// Fails with `ContextError::NotOnTop` if this context is not the
    /// topmost frame (incorrect nesting). The frame is still removed when
    /// the guard drops, so even this error cannot leak a frame.
    pub fn exit(mut self) -> Result<(), ContextError> {
        let popped = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last() {
                Some(frame) if frame.ctx_id == self.ctx_id => {
                    stack.pop();
                    true
                }
                _ => false,
            }
        });
        if popped {
            self.exited = true;
            Ok(())
        } else {
            Err(ContextError::NotOnTop)
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last() {
                Some(frame) if frame.ctx_id == self.ctx_id => {
                    stack.pop();
                }
                _ => {
                    warn!(ctx_id = self.ctx_id, "context guard dropped out of order");
                    stack.retain(|frame| frame.ctx_id != self.ctx_id);
                }
            }
        });
    }
}

/// Storage backend of the active (topmost) context.
pub fn current_storage() -> Result<Arc<dyn Storage>, ContextError> {
    STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|frame| Arc::clone(&frame.storage))
            .ok_or(ContextError::NoActiveContext)
    })
}

/// Base path of the active (topmost) context.
pub fn current_base_path() -> Result<String, ContextError> {
    STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|frame| frame.base_path.clone())
            .ok_or(ContextError::NoActiveContext)
    })
}

/// Whether any context is active on this thread.
pub fn context_active() -> bool {
    STACK.with(|stack| !stack.borrow().is_empty())
}

/// Current depth of this thread's context stack.
pub fn stack_depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cereal_store::MemoryStorage;

    fn ctx(base: &str) -> Context {
        Context::new(Arc::new(MemoryStorage::new()), base)
    }

    #[test]
    fn accessors_read_the_top_frame() {
        assert_eq!(current_base_path(), Err(ContextError::NoActiveContext));

        let outer = ctx("outer");
        let guard = outer.enter().unwrap();
        assert_eq!(current_base_path().unwrap(), "outer");

        let inner = ctx("inner");
        let inner_guard = inner.enter().unwrap();
        assert_eq!(current_base_path().unwrap(), "inner");

        inner_guard.exit().unwrap();
        assert_eq!(current_base_path().unwrap(), "outer");
        guard.exit().unwrap();
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn re_entering_active_context_fails() {
        let c = ctx("base");
        let _guard = c.enter().unwrap();
        assert!(matches!(c.enter(), Err(ContextError::AlreadyActive)));
    }

    #[test]
    fn reusable_after_exit() {
        let c = ctx("base");
        let guard = c.enter().unwrap();
        guard.exit().unwrap();
        let guard = c.enter().unwrap();
        guard.exit().unwrap();
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn exiting_non_top_fails_but_does_not_leak() {
        let outer = ctx("outer");
        let inner = ctx("inner");
        let outer_guard = outer.enter().unwrap();
        let inner_guard = inner.enter().unwrap();

        assert_eq!(outer_guard.exit(), Err(ContextError::NotOnTop));
        // The failed exit dropped the outer guard, which removed its frame
        // out of order; only the inner frame remains.
        assert_eq!(stack_depth(), 1);
        assert_eq!(current_base_path().unwrap(), "inner");
        inner_guard.exit().unwrap();
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn drop_exits_unconditionally() {
        let c = ctx("scoped");
        {
            let _guard = c.enter().unwrap();
            assert_eq!(stack_depth(), 1);
        }
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn drop_balances_on_panic() {
        let c = ctx("panicky");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = c.enter().unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(stack_depth(), 0);
    }
}

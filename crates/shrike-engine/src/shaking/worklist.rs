//! Enqueuer worklist

use crate::graph::{FieldId, MethodId, TypeId};
use rustc_hash::FxHashSet;
use shrike_bytecode::InvokeKind;
use std::collections::VecDeque;

/// Why a method became live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveReason {
    /// Named by a keep rule
    KeepRule,
    /// Class initializer of a live class
    ClassInitializer,
    /// Target of an invoke
    Invoke(InvokeKind),
    /// Overrides a virtually invoked method in an instantiated type
    Override,
}

/// A unit of enqueuer work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnqueuerAction {
    /// Mark a class live
    MarkClassLive(TypeId),
    /// Record that instances of a class may exist
    MarkInstantiated(TypeId),
    /// Mark a method definition live
    MarkMethodLive {
        /// The definition
        method: MethodId,
        /// Why
        reason: LiveReason,
    },
    /// Mark a field definition live
    MarkFieldLive(FieldId),
    /// Trace an invoke of `method` from `context`
    TraceInvoke {
        /// Dispatch kind
        kind: InvokeKind,
        /// Invoked reference
        method: MethodId,
        /// Calling method, absent for roots
        context: Option<MethodId>,
    },
    /// Trace a static field read
    TraceStaticFieldRead {
        /// Read reference
        field: FieldId,
        /// Reading method
        context: Option<MethodId>,
    },
    /// Trace a static field write
    TraceStaticFieldWrite {
        /// Written reference
        field: FieldId,
        /// Writing method
        context: Option<MethodId>,
    },
    /// Trace an instance field read
    TraceInstanceFieldRead {
        /// Read reference
        field: FieldId,
        /// Reading method
        context: Option<MethodId>,
    },
    /// Trace an instance field write
    TraceInstanceFieldWrite {
        /// Written reference
        field: FieldId,
        /// Writing method
        context: Option<MethodId>,
    },
}

/// FIFO of pending actions. Each distinct action is accepted at most once
/// per trace.
#[derive(Debug, Default)]
pub struct EnqueuerWorklist {
    queue: VecDeque<EnqueuerAction>,
    seen: FxHashSet<EnqueuerAction>,
}

impl EnqueuerWorklist {
    /// Create an empty worklist
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an action. Returns false if it was already enqueued once.
    pub fn enqueue(&mut self, action: EnqueuerAction) -> bool {
        if !self.seen.insert(action) {
            return false;
        }
        self.queue.push_back(action);
        true
    }

    /// Enqueue a static invoke of `method` from `context`
    pub fn enqueue_trace_invoke_static(&mut self, method: MethodId, context: Option<MethodId>) -> bool {
        self.enqueue(EnqueuerAction::TraceInvoke {
            kind: InvokeKind::Static,
            method,
            context,
        })
    }

    /// Take the oldest pending action
    pub fn poll(&mut self) -> Option<EnqueuerAction> {
        self.queue.pop_front()
    }

    /// Whether no actions are pending
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Number of distinct actions accepted so far
    pub fn accepted(&self) -> usize {
        self.seen.len()
    }
}

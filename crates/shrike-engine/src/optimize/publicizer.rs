//! Class and member publicizer
//!
//! Makes every live program class, field and method public so later passes
//! can move code across class and package boundaries. Private instance
//! methods become public final virtual methods, which is only sound when no
//! method with the same signature exists anywhere in the program; the
//! signatures already in use are collected up front into a
//! [`SignaturePool`].

use super::signature_pool::SignaturePool;
use crate::error::{EngineError, EngineResult};
use crate::graph::{EncodedMethod, ItemFactory, MethodId, Program, TypeId};
use crate::lens::{Change, GraphLens, LensBuilder};
use crate::shaking::{KeepOracle, LiveSet};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics about a publicizer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicizerStats {
    /// Methods inspected during signature collection
    pub scanned_methods: usize,
    /// Distinct signatures found during collection
    pub collected_signatures: usize,
    /// Program classes made public
    pub promoted_classes: usize,
    /// Fields made public
    pub promoted_fields: usize,
    /// Non-private and private static methods made public
    pub promoted_methods: usize,
    /// Private instance methods made public, final and virtual
    pub publicized_methods: usize,
    /// Private instance methods left alone because keep rules pin them
    pub skipped_pinned: usize,
    /// Private instance methods left alone because their signature is taken
    pub skipped_collisions: usize,
}

/// Result of a publicizer run
#[derive(Debug, Clone)]
pub struct PublicizerOutcome {
    /// The previous lens extended with the publicizer's level
    pub lens: GraphLens,
    /// What was done
    pub stats: PublicizerStats,
}

/// The publicizer pass
pub struct Publicizer<'a> {
    keep: &'a dyn KeepOracle,
    live: Option<&'a LiveSet>,
    threads: usize,
    pool: SignaturePool,
    lens: LensBuilder,
    visited: FxHashSet<TypeId>,
    stats: PublicizerStats,
}

impl<'a> Publicizer<'a> {
    /// Create a publicizer using `threads` collection workers
    pub fn new(keep: &'a dyn KeepOracle, threads: usize) -> Self {
        Self {
            keep,
            live: None,
            threads: threads.max(1),
            pool: SignaturePool::new(),
            lens: LensBuilder::new("publicizer"),
            visited: FxHashSet::default(),
            stats: PublicizerStats::default(),
        }
    }

    /// Restrict the pass to entities in `live`
    pub fn with_live_set(mut self, live: &'a LiveSet) -> Self {
        self.live = Some(live);
        self
    }

    /// Run the pass over `program`, extending `previous` with one lens level
    pub fn run(mut self, program: &mut Program, previous: &GraphLens) -> EngineResult<PublicizerOutcome> {
        let _span = tracing::info_span!("publicizer").entered();

        self.check_program_graph(program)?;
        self.collect_signatures(program)?;
        self.stats.collected_signatures = self.pool.len();
        self.publicize_hierarchy(program)?;

        tracing::info!(
            classes = self.stats.promoted_classes,
            methods = self.stats.promoted_methods,
            publicized = self.stats.publicized_methods,
            collisions = self.stats.skipped_collisions,
            pinned = self.stats.skipped_pinned,
            "publicizer finished"
        );

        Ok(PublicizerOutcome {
            lens: self.lens.build(previous),
            stats: self.stats,
        })
    }

    fn is_live_class(&self, ty: TypeId) -> bool {
        self.live.map_or(true, |live| live.is_live_class(ty))
    }

    fn is_live_method(&self, method: MethodId) -> bool {
        self.live.map_or(true, |live| live.is_live_method(method))
    }

    /// Every synthetic program method must have a defined holder
    fn check_program_graph(&self, program: &Program) -> EngineResult<()> {
        let items = program.items();
        for class in program.program_classes() {
            for method in class.methods() {
                let holder = items.method(method.method).holder;
                if method.access.is_synthetic() && program.definition_for(holder).is_none() {
                    return Err(EngineError::broken_graph(format!(
                        "synthetic method {} in {} has no holder definition",
                        items.method_to_string(method.method),
                        items.type_descriptor(class.ty)
                    )));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Phase 1: signature collection
    // ========================================================================

    fn collect_signatures(&mut self, program: &Program) -> EngineResult<()> {
        let _span = tracing::debug_span!("collect_signatures").entered();
        let items = program.items();
        let live = self.live;
        let classes: Vec<_> = program
            .program_classes()
            .filter(|class| self.is_live_class(class.ty))
            .collect();

        let workers = self.threads.min(classes.len()).max(1);
        let next = AtomicUsize::new(0);
        let scanned = Mutex::new(0usize);
        let pool = &self.pool;

        crossbeam::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    let mut local = 0;
                    while let Some(class) = classes.get(next.fetch_add(1, Ordering::Relaxed)) {
                        for method in class.methods() {
                            local += 1;
                            if live.map_or(false, |live| !live.is_live_method(method.method)) {
                                continue;
                            }
                            if !method.access.is_private() || method.access.is_static() {
                                pool.insert(items.signature(method.method));
                            }
                        }
                    }
                    *scanned.lock() += local;
                });
            }
        })
        .map_err(|_| EngineError::WorkerPanicked("signature collection"))?;

        self.stats.scanned_methods = scanned.into_inner();
        tracing::debug!(
            workers,
            signatures = self.pool.len(),
            "collected method signatures"
        );
        Ok(())
    }

    // ========================================================================
    // Phase 2: promotion
    // ========================================================================

    /// Visit all interfaces, then the class tree below the root object type
    fn publicize_hierarchy(&mut self, program: &mut Program) -> EngineResult<()> {
        let hierarchy = program.hierarchy();
        let mut worklist = vec![hierarchy.object_type()];
        worklist.extend(hierarchy.all_interfaces().iter().rev().copied());

        while let Some(ty) = worklist.pop() {
            if !self.visited.insert(ty) {
                continue;
            }
            self.publicize_type(program, ty)?;
            worklist.extend(program.hierarchy().extends_subtypes(ty).iter().rev().copied());
        }
        Ok(())
    }

    fn publicize_type(&mut self, program: &mut Program, ty: TypeId) -> EngineResult<()> {
        if !self.is_live_class(ty) {
            return Ok(());
        }
        let Some((class, items)) = program.definition_and_items_mut(ty) else {
            return Ok(());
        };
        if !class.is_program_class() {
            return Ok(());
        }

        class.access.promote_to_public();
        self.stats.promoted_classes += 1;
        for field in &mut class.fields {
            field.access.promote_to_public();
            self.stats.promoted_fields += 1;
        }

        let is_interface = class.is_interface();
        let mut virtualize = FxHashSet::default();
        for method in class.methods_mut() {
            if self.publicize_method(items, is_interface, method)? {
                virtualize.insert(method.method);
            }
        }
        class.virtualize_methods(&virtualize);
        Ok(())
    }

    /// Relax one method's access. Returns true when the method must move to
    /// the virtual method list.
    fn publicize_method(
        &mut self,
        items: &ItemFactory,
        is_interface: bool,
        method: &mut EncodedMethod,
    ) -> EngineResult<bool> {
        let reference = method.method;
        let access = method.access;
        if access.is_public() || items.is_class_initializer(reference) {
            return Ok(false);
        }
        if !self.is_live_method(reference) {
            return Ok(false);
        }

        if !access.is_private() {
            method.access.unset_protected();
            method.access.set_public();
            self.stats.promoted_methods += 1;
            return Ok(false);
        }

        if items.is_constructor(reference) {
            return Ok(false);
        }

        if access.is_static() {
            method.access.unset_private();
            method.access.set_public();
            self.stats.promoted_methods += 1;
            return Ok(false);
        }

        if self.keep.is_pinned_against_shrinking(reference) {
            tracing::debug!(
                method = %items.method_to_string(reference),
                "private method pinned by keep rules"
            );
            self.stats.skipped_pinned += 1;
            return Ok(false);
        }

        // A public method here would become a new default method or clash
        // with a desugared interface copy.
        if is_interface || access.is_synthetic() {
            return Ok(false);
        }

        let signature = items.signature(reference);
        if !self.pool.insert(signature) {
            // Renaming could resolve the collision, but a name pinned by
            // keep rules never can.
            tracing::debug!(
                method = %items.method_to_string(reference),
                permanent = self.keep.is_pinned_against_renaming(reference),
                "signature already in use"
            );
            self.stats.skipped_collisions += 1;
            return Ok(false);
        }

        self.lens
            .record_method(items, reference, reference, Change::Publicized)?;
        method.publicize();
        self.stats.publicized_methods += 1;
        Ok(true)
    }
}

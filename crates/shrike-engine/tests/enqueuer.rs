//! Integration tests for the enqueuer and its analyses

use parking_lot::Mutex;
use shrike_bytecode::InvokeKind;
use shrike_engine::graph::Label;
use shrike_engine::shaking::{
    ClassInitializerAssertionEnablingAnalysis, EnqueuerContext, ProgramMethod,
};
use shrike_engine::{
    AccessFlags, ClassDef, Code, EncodedField, EncodedMethod, EngineResult, Enqueuer,
    EnqueuerAnalysis, FieldId, MethodId, Program, RootSet, StackInstr, TypeId,
};
use std::sync::Arc;

/// Records the live methods every time a method becomes live
struct SnapshotAnalysis {
    snapshots: Arc<Mutex<Vec<Vec<MethodId>>>>,
    watched: Vec<MethodId>,
}

impl EnqueuerAnalysis for SnapshotAnalysis {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn process_newly_live_method(
        &mut self,
        _method: ProgramMethod<'_>,
        cx: &mut EnqueuerContext<'_>,
    ) -> EngineResult<()> {
        let live = self
            .watched
            .iter()
            .copied()
            .filter(|&m| cx.live.is_live_method(m))
            .collect();
        self.snapshots.lock().push(live);
        Ok(())
    }
}

fn invoke(kind: InvokeKind, method: MethodId) -> StackInstr {
    StackInstr::Invoke { kind, method }
}

/// `Main.main` calls `Shape.area` virtually; `Circle` and `Square` override
/// it but only `Circle` is instantiated.
struct Shapes {
    program: Program,
    main: MethodId,
    shape_area: MethodId,
    circle_area: MethodId,
    square_area: MethodId,
    square: TypeId,
}

fn shapes() -> Shapes {
    let mut program = Program::new();
    let items = program.items_mut();
    let object = items.known().object_type;
    let main_ty = items.create_type("Lapp/Main;");
    let shape = items.create_type("Lapp/Shape;");
    let circle = items.create_type("Lapp/Circle;");
    let square = items.create_type("Lapp/Square;");
    let main = items.parse_method("Lapp/Main;->main()V").unwrap();
    let shape_area = items.parse_method("Lapp/Shape;->area()I").unwrap();
    let circle_area = items.parse_method("Lapp/Circle;->area()I").unwrap();
    let square_area = items.parse_method("Lapp/Square;->area()I").unwrap();
    let circle_init = items.parse_method("Lapp/Circle;-><init>()V").unwrap();

    let main_body = Code::Stack(vec![
        StackInstr::New(circle),
        StackInstr::Dup,
        invoke(InvokeKind::Direct, circle_init),
        invoke(InvokeKind::Virtual, shape_area),
        StackInstr::Pop,
        StackInstr::Return,
    ]);

    program
        .add_class(
            ClassDef::program(main_ty).extends(object).method(
                EncodedMethod::new(main, AccessFlags::PUBLIC | AccessFlags::STATIC)
                    .with_code(main_body),
            ),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(shape)
                .extends(object)
                .with_access(AccessFlags::ABSTRACT)
                .method(EncodedMethod::new(shape_area, AccessFlags::PUBLIC | AccessFlags::ABSTRACT)),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(circle)
                .extends(shape)
                .method(EncodedMethod::new(
                    circle_init,
                    AccessFlags::PUBLIC | AccessFlags::CONSTRUCTOR,
                ))
                .method(EncodedMethod::new(circle_area, AccessFlags::PUBLIC)),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(square)
                .extends(shape)
                .method(EncodedMethod::new(square_area, AccessFlags::PUBLIC)),
        )
        .unwrap();

    Shapes {
        program,
        main,
        shape_area,
        circle_area,
        square_area,
        square,
    }
}

#[test]
fn test_virtual_dispatch_to_instantiated_subtypes() {
    let s = shapes();
    let mut roots = RootSet::new();
    roots.keep_method(s.main);

    let result = Enqueuer::new(&s.program).trace(&roots).unwrap();

    assert!(result.live.is_live_method(s.main));
    assert!(result.live.is_live_method(s.shape_area));
    assert!(result.live.is_live_method(s.circle_area));
    assert!(!result.live.is_live_method(s.square_area));
    assert!(!result.live.is_live_class(s.square));
}

#[test]
fn test_private_method_does_not_hide_inherited_override() {
    // A.foo is abstract, B overrides it, C declares a private foo of the
    // same signature and D extends C. A call through A on a D reaches B.foo.
    let mut program = Program::new();
    let items = program.items_mut();
    let object = items.known().object_type;
    let main_ty = items.create_type("Lapp/Main;");
    let a = items.create_type("Lapp/A;");
    let b = items.create_type("Lapp/B;");
    let c = items.create_type("Lapp/C;");
    let d = items.create_type("Lapp/D;");
    let main = items.parse_method("Lapp/Main;->main()V").unwrap();
    let a_foo = items.parse_method("Lapp/A;->foo()V").unwrap();
    let b_foo = items.parse_method("Lapp/B;->foo()V").unwrap();
    let c_foo = items.parse_method("Lapp/C;->foo()V").unwrap();

    let main_body = Code::Stack(vec![
        StackInstr::New(d),
        invoke(InvokeKind::Virtual, a_foo),
        StackInstr::Return,
    ]);
    program
        .add_class(
            ClassDef::program(main_ty).extends(object).method(
                EncodedMethod::new(main, AccessFlags::PUBLIC | AccessFlags::STATIC)
                    .with_code(main_body),
            ),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(a)
                .extends(object)
                .with_access(AccessFlags::ABSTRACT)
                .method(EncodedMethod::new(a_foo, AccessFlags::PUBLIC | AccessFlags::ABSTRACT)),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(b)
                .extends(a)
                .method(EncodedMethod::new(b_foo, AccessFlags::PUBLIC)),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(c)
                .extends(b)
                .method(EncodedMethod::new(c_foo, AccessFlags::PRIVATE)),
        )
        .unwrap();
    program
        .add_class(ClassDef::program(d).extends(c))
        .unwrap();

    let mut roots = RootSet::new();
    roots.keep_method(main);
    let result = Enqueuer::new(&program).trace(&roots).unwrap();

    assert!(result.live.is_live_method(a_foo));
    assert!(result.live.is_live_method(b_foo));
    assert!(!result.live.is_live_method(c_foo));
    assert!(result.live.is_live_class(d));
}

#[test]
fn test_interface_default_reached_through_superclass() {
    // Base implements Sized without overriding its default; Impl extends
    // Base and is instantiated. Other also implements Sized but is never
    // created, so its override stays dead.
    let mut program = Program::new();
    let items = program.items_mut();
    let object = items.known().object_type;
    let main_ty = items.create_type("Lapp/Main;");
    let sized = items.create_type("Lapp/Sized;");
    let base = items.create_type("Lapp/Base;");
    let concrete = items.create_type("Lapp/Impl;");
    let other = items.create_type("Lapp/Other;");
    let main = items.parse_method("Lapp/Main;->main()V").unwrap();
    let sized_size = items.parse_method("Lapp/Sized;->size()I").unwrap();
    let other_size = items.parse_method("Lapp/Other;->size()I").unwrap();

    let main_body = Code::Stack(vec![
        StackInstr::New(concrete),
        invoke(InvokeKind::Interface, sized_size),
        StackInstr::Pop,
        StackInstr::Return,
    ]);
    program
        .add_class(
            ClassDef::program(main_ty).extends(object).method(
                EncodedMethod::new(main, AccessFlags::PUBLIC | AccessFlags::STATIC)
                    .with_code(main_body),
            ),
        )
        .unwrap();
    program
        .add_class(
            ClassDef::program(sized)
                .with_access(AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
                .method(
                    EncodedMethod::new(sized_size, AccessFlags::PUBLIC)
                        .with_code(Code::Stack(vec![StackInstr::Return])),
                ),
        )
        .unwrap();
    program
        .add_class(ClassDef::program(base).extends(object).implements(sized))
        .unwrap();
    program
        .add_class(ClassDef::program(concrete).extends(base))
        .unwrap();
    program
        .add_class(
            ClassDef::program(other)
                .extends(object)
                .implements(sized)
                .method(EncodedMethod::new(other_size, AccessFlags::PUBLIC)),
        )
        .unwrap();

    let mut roots = RootSet::new();
    roots.keep_method(main);
    let result = Enqueuer::new(&program).trace(&roots).unwrap();

    assert!(result.live.is_live_method(sized_size));
    assert!(result.live.is_live_class(sized));
    assert!(result.live.is_live_class(base));
    assert!(!result.live.is_live_method(other_size));
}

#[test]
fn test_live_set_only_grows() {
    let s = shapes();
    let watched = vec![s.main, s.shape_area, s.circle_area, s.square_area];
    let snapshots = Arc::new(Mutex::new(Vec::new()));

    let mut roots = RootSet::new();
    roots.keep_method(s.main);
    let mut enqueuer = Enqueuer::new(&s.program);
    enqueuer.register_analysis(Box::new(SnapshotAnalysis {
        snapshots: Arc::clone(&snapshots),
        watched: watched.clone(),
    }));
    let result = enqueuer.trace(&roots).unwrap();

    let snapshots = snapshots.lock();
    assert!(snapshots.len() >= 3);
    for pair in snapshots.windows(2) {
        for method in &pair[0] {
            assert!(pair[1].contains(method));
        }
    }
    for method in snapshots.last().unwrap() {
        assert!(result.live.is_live_method(*method));
    }
}

// ============================================================================
// Assertion status
// ============================================================================

struct Assertions {
    program: Program,
    clinit: MethodId,
    handler: MethodId,
    check: MethodId,
}

/// `Foo.<clinit>` stores the assertion status into `status_field`;
/// `Foo.check` reads `read_field`.
fn assertions(status_field: &str, read_field: &str) -> Assertions {
    let mut program = Program::new();
    let items = program.items_mut();
    let known = items.known();
    let foo = items.create_type("Lapp/Foo;");
    let support = items.create_type("Lapp/AssertionSupport;");
    let clinit = items.parse_method("Lapp/Foo;-><clinit>()V").unwrap();
    let check = items.parse_method("Lapp/Foo;->check()V").unwrap();
    let handler = items
        .parse_method("Lapp/AssertionSupport;->onAssertionError()V")
        .unwrap();
    let status: FieldId = items.parse_field(status_field).unwrap();
    let read: FieldId = items.parse_field(read_field).unwrap();

    let clinit_body = Code::Stack(vec![
        invoke(InvokeKind::Virtual, known.desired_assertion_status),
        StackInstr::If { target: Label(0) },
        StackInstr::ConstNumber(1),
        StackInstr::Goto { target: Label(1) },
        StackInstr::ConstNumber(0),
        StackInstr::StaticPut(status),
        StackInstr::Return,
    ]);
    let check_body = Code::Stack(vec![
        StackInstr::StaticGet(read),
        StackInstr::If { target: Label(0) },
        StackInstr::Return,
    ]);

    let mut foo_class = ClassDef::program(foo)
        .extends(known.object_type)
        .field(EncodedField::new(status, AccessFlags::STATIC | AccessFlags::FINAL))
        .method(
            EncodedMethod::new(clinit, AccessFlags::STATIC | AccessFlags::CONSTRUCTOR)
                .with_code(clinit_body),
        )
        .method(
            EncodedMethod::new(check, AccessFlags::PUBLIC | AccessFlags::STATIC)
                .with_code(check_body),
        );
    if read != status {
        foo_class = foo_class.field(EncodedField::new(read, AccessFlags::STATIC));
    }
    program.add_class(foo_class).unwrap();
    program
        .add_class(ClassDef::program(support).extends(known.object_type).method(
            EncodedMethod::new(handler, AccessFlags::PUBLIC | AccessFlags::STATIC),
        ))
        .unwrap();

    Assertions {
        program,
        clinit,
        handler,
        check,
    }
}

fn trace_with_handler(a: &Assertions) -> shrike_engine::EnqueuerResult {
    let mut roots = RootSet::new();
    roots.keep_method(a.check);
    let mut enqueuer = Enqueuer::new(&a.program);
    enqueuer.register_analysis(Box::new(ClassInitializerAssertionEnablingAnalysis::new(
        a.program.items(),
        vec![a.handler],
    )));
    enqueuer.trace(&roots).unwrap()
}

#[test]
fn test_javac_assertion_initializer_is_detected() {
    let a = assertions(
        "Lapp/Foo;->$assertionsDisabled:Z",
        "Lapp/Foo;->$assertionsDisabled:Z",
    );
    let result = trace_with_handler(&a);

    assert!(result.live.is_live_method(a.clinit));
    assert!(result.feedback.is_initializer_enabling_assertions(a.clinit));
    assert!(result.live.is_live_method(a.handler));
}

#[test]
fn test_unrelated_field_is_not_assertion_status() {
    let a = assertions("Lapp/Foo;->debugEnabled:Z", "Lapp/Foo;->debugEnabled:Z");
    let result = trace_with_handler(&a);

    assert!(result.live.is_live_method(a.clinit));
    assert!(!result.feedback.is_initializer_enabling_assertions(a.clinit));
    assert!(!result.live.is_live_method(a.handler));
}

#[test]
fn test_assertion_status_read_keeps_handler_live() {
    let a = assertions("Lapp/Foo;->debugEnabled:Z", "Lapp/Foo;->$assertionsDisabled:Z");
    let result = trace_with_handler(&a);

    assert!(!result.feedback.is_initializer_enabling_assertions(a.clinit));
    assert!(result.live.is_live_method(a.handler));
}

#[test]
fn test_kotlin_assertions_initializer_is_detected() {
    let mut program = Program::new();
    let items = program.items_mut();
    let known = items.known();
    let clinit = items.parse_method("Lkotlin/_Assertions;-><clinit>()V").unwrap();
    let body = Code::Stack(vec![
        StackInstr::ConstClass(known.kotlin_assertions_type),
        invoke(InvokeKind::Virtual, known.desired_assertion_status),
        StackInstr::StaticPut(known.kotlin_assertions_enabled),
        StackInstr::Return,
    ]);
    program
        .add_class(
            ClassDef::program(known.kotlin_assertions_type)
                .extends(known.object_type)
                .field(EncodedField::new(
                    known.kotlin_assertions_enabled,
                    AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
                ))
                .method(
                    EncodedMethod::new(clinit, AccessFlags::STATIC | AccessFlags::CONSTRUCTOR)
                        .with_code(body),
                ),
        )
        .unwrap();

    let mut roots = RootSet::new();
    roots.keep_class(known.kotlin_assertions_type);
    let mut enqueuer = Enqueuer::new(&program);
    enqueuer.register_analysis(Box::new(ClassInitializerAssertionEnablingAnalysis::new(
        program.items(),
        Vec::new(),
    )));
    let result = enqueuer.trace(&roots).unwrap();

    assert!(result.feedback.is_initializer_enabling_assertions(clinit));
}

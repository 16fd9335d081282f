//! Integration tests for the publicizer pass

use shrike_bytecode::InvokeKind;
use shrike_engine::{
    AccessFlags, Change, ClassDef, Code, EncodedMethod, Enqueuer, GraphLens, MethodId, Program,
    Publicizer, RootSet, StackInstr, TypeId,
};

/// Add a program class extending the root object type
fn add_class(program: &mut Program, descriptor: &str, methods: Vec<EncodedMethod>) -> TypeId {
    let items = program.items_mut();
    let object = items.known().object_type;
    let ty = items.create_type(descriptor);
    let mut class = ClassDef::program(ty).extends(object);
    for method in methods {
        class = class.method(method);
    }
    program.add_class(class).unwrap();
    ty
}

fn method(program: &mut Program, text: &str) -> MethodId {
    program.items_mut().parse_method(text).unwrap()
}

fn definition(program: &Program, method: MethodId) -> &EncodedMethod {
    program.method_definition(method).unwrap().1
}

fn run(program: &mut Program, roots: &RootSet) -> shrike_engine::PublicizerOutcome {
    Publicizer::new(roots, 4)
        .run(program, &GraphLens::identity())
        .unwrap()
}

#[test]
fn test_collision_promotes_first_visited_only() {
    let mut program = Program::new();
    let a_f = method(&mut program, "Lapp/A;->f()I");
    let b_f = method(&mut program, "Lapp/B;->f()I");
    let a = add_class(&mut program, "Lapp/A;", vec![EncodedMethod::new(a_f, AccessFlags::PRIVATE)]);
    let b = add_class(&mut program, "Lapp/B;", vec![EncodedMethod::new(b_f, AccessFlags::PRIVATE)]);

    let outcome = run(&mut program, &RootSet::new());

    let winner = definition(&program, a_f);
    assert!(winner.publicized);
    assert!(winner.access.is_public() && winner.access.is_final());
    assert!(!winner.access.is_private());
    let class_a = program.definition_for(a).unwrap();
    assert!(class_a.direct_methods.is_empty());
    assert_eq!(class_a.virtual_methods.len(), 1);

    let loser = definition(&program, b_f);
    assert!(!loser.publicized);
    assert!(loser.access.is_private());
    assert_eq!(program.definition_for(b).unwrap().direct_methods.len(), 1);

    assert_eq!(outcome.stats.publicized_methods, 1);
    assert_eq!(outcome.stats.skipped_collisions, 1);
    assert!(outcome.lens.lookup_method(a_f).changes.contains(Change::Publicized));
    assert!(outcome.lens.lookup_method(b_f).changes.is_empty());
}

#[test]
fn test_collision_winner_follows_program_order() {
    let mut program = Program::new();
    let a_f = method(&mut program, "Lapp/A;->f()I");
    let b_f = method(&mut program, "Lapp/B;->f()I");
    add_class(&mut program, "Lapp/B;", vec![EncodedMethod::new(b_f, AccessFlags::PRIVATE)]);
    add_class(&mut program, "Lapp/A;", vec![EncodedMethod::new(a_f, AccessFlags::PRIVATE)]);

    run(&mut program, &RootSet::new());

    assert!(definition(&program, b_f).publicized);
    assert!(!definition(&program, a_f).publicized);
}

#[test]
fn test_existing_signature_blocks_promotion() {
    let mut program = Program::new();
    let a_f = method(&mut program, "Lapp/A;->f()I");
    let c_f = method(&mut program, "Lapp/C;->f()I");
    add_class(&mut program, "Lapp/A;", vec![EncodedMethod::new(a_f, AccessFlags::PRIVATE)]);
    add_class(&mut program, "Lapp/C;", vec![EncodedMethod::new(c_f, AccessFlags::PUBLIC)]);

    let outcome = run(&mut program, &RootSet::new());

    assert!(definition(&program, a_f).access.is_private());
    assert_eq!(outcome.stats.publicized_methods, 0);
    assert_eq!(outcome.stats.skipped_collisions, 1);
}

#[test]
fn test_pinned_method_is_never_promoted() {
    let mut program = Program::new();
    let a_f = method(&mut program, "Lapp/A;->f()I");
    let b_f = method(&mut program, "Lapp/B;->f()I");
    add_class(&mut program, "Lapp/A;", vec![EncodedMethod::new(a_f, AccessFlags::PRIVATE)]);
    add_class(&mut program, "Lapp/B;", vec![EncodedMethod::new(b_f, AccessFlags::PRIVATE)]);

    let mut roots = RootSet::new();
    roots.keep_method(a_f);
    let outcome = run(&mut program, &roots);

    assert!(definition(&program, a_f).access.is_private());
    assert!(!definition(&program, a_f).publicized);
    // The pinned method never claimed the signature.
    assert!(definition(&program, b_f).publicized);
    assert_eq!(outcome.stats.skipped_pinned, 1);
}

#[test]
fn test_interface_and_synthetic_methods_stay_private() {
    let mut program = Program::new();
    let object = program.items().known().object_type;
    let i_m = method(&mut program, "Lapp/I;->m()V");
    let a_lambda = method(&mut program, "Lapp/A;->lambda$run$0()V");

    let i = program.items_mut().create_type("Lapp/I;");
    program
        .add_class(
            ClassDef::program(i)
                .extends(object)
                .with_access(AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
                .method(EncodedMethod::new(i_m, AccessFlags::PRIVATE)),
        )
        .unwrap();
    add_class(
        &mut program,
        "Lapp/A;",
        vec![EncodedMethod::new(
            a_lambda,
            AccessFlags::PRIVATE | AccessFlags::SYNTHETIC,
        )],
    );

    let outcome = run(&mut program, &RootSet::new());

    assert!(program.definition_for(i).unwrap().access.is_public());
    assert!(program.definition_for(i).unwrap().access.is_interface());
    assert!(definition(&program, i_m).access.is_private());
    assert!(definition(&program, a_lambda).access.is_private());
    assert_eq!(outcome.stats.publicized_methods, 0);
}

#[test]
fn test_each_type_visited_once() {
    let mut program = Program::new();
    let object = program.items().known().object_type;
    let items = program.items_mut();
    let i = items.create_type("Lapp/I;");
    let j = items.create_type("Lapp/J;");
    let a = items.create_type("Lapp/A;");
    for iface in [i, j] {
        program
            .add_class(
                ClassDef::program(iface)
                    .extends(object)
                    .with_access(AccessFlags::INTERFACE | AccessFlags::ABSTRACT),
            )
            .unwrap();
    }
    program
        .add_class(ClassDef::program(a).extends(object).implements(i).implements(j))
        .unwrap();

    let outcome = run(&mut program, &RootSet::new());
    assert_eq!(outcome.stats.promoted_classes, 3);
}

#[test]
fn test_subclasses_below_library_types_are_reached() {
    let mut program = Program::new();
    let items = program.items_mut();
    let object = items.known().object_type;
    let activity = items.create_type("Landroid/app/Activity;");
    let main = items.create_type("Lapp/MainActivity;");
    let helper = items.parse_method("Lapp/MainActivity;->helper()V").unwrap();

    program
        .add_class(ClassDef::library(activity).extends(object))
        .unwrap();
    program
        .add_class(
            ClassDef::program(main)
                .extends(activity)
                .method(EncodedMethod::new(helper, AccessFlags::PRIVATE)),
        )
        .unwrap();

    run(&mut program, &RootSet::new());

    assert!(program.definition_for(main).unwrap().access.is_public());
    assert!(!program.definition_for(activity).unwrap().access.is_public());
    assert!(definition(&program, helper).publicized);
}

#[test]
fn test_live_set_restricts_promotion() {
    let mut program = Program::new();
    let run_m = method(&mut program, "Lapp/A;->run()V");
    let helper = method(&mut program, "Lapp/A;->helper()V");
    let dead = method(&mut program, "Lapp/Dead;->g()V");

    let body = Code::Stack(vec![
        StackInstr::Load { slot: 0 },
        StackInstr::Invoke {
            kind: InvokeKind::Direct,
            method: helper,
        },
        StackInstr::Return,
    ]);
    add_class(
        &mut program,
        "Lapp/A;",
        vec![
            EncodedMethod::new(run_m, AccessFlags::PUBLIC).with_code(body),
            EncodedMethod::new(helper, AccessFlags::PRIVATE),
        ],
    );
    let dead_class = add_class(
        &mut program,
        "Lapp/Dead;",
        vec![EncodedMethod::new(dead, AccessFlags::PRIVATE)],
    );

    let mut roots = RootSet::new();
    roots.keep_method(run_m);
    let live = Enqueuer::new(&program).trace(&roots).unwrap().live;
    assert!(live.is_live_method(helper));
    assert!(!live.is_live_class(dead_class));

    let outcome = Publicizer::new(&roots, 2)
        .with_live_set(&live)
        .run(&mut program, &GraphLens::identity())
        .unwrap();

    assert!(definition(&program, helper).publicized);
    assert!(definition(&program, dead).access.is_private());
    assert!(!program.definition_for(dead_class).unwrap().access.is_public());
    assert_eq!(outcome.stats.publicized_methods, 1);
}

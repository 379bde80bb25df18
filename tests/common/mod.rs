//! Fixture builders shared by the integration tests.
//!
//! Everything is constructed through the public model API, the same shape an external
//! module loader would produce.

#![allow(dead_code)]

use std::path::Path;

use dotshroud::prelude::*;

/// A public `() -> void` method with a trivial body.
pub fn simple_method(name: &str) -> MethodDef {
    let mut method = MethodDef::new(name, "System.Void", Vec::new(), MethodAttributes::PUBLIC);
    method.body = Some(MethodBody {
        locals: Vec::new(),
        instructions: vec![Instruction::new(OpCode::Ret)],
    });
    method
}

/// A public virtual `(params) -> void` method with a trivial body.
pub fn virtual_method(name: &str, params: &[&str], new_slot: bool) -> MethodDef {
    let mut flags =
        MethodAttributes::PUBLIC | MethodAttributes::VIRTUAL | MethodAttributes::HIDE_BY_SIG;
    if new_slot {
        flags |= MethodAttributes::NEW_SLOT;
    }
    let params = params
        .iter()
        .enumerate()
        .map(|(index, ty)| Param::new(&format!("arg{index}"), ty))
        .collect();
    let mut method = MethodDef::new(name, "System.Void", params, flags);
    method.body = Some(MethodBody {
        locals: Vec::new(),
        instructions: vec![Instruction::new(OpCode::Ret)],
    });
    method
}

/// Key of a method on `[scope]namespace.name`.
pub fn method_key(
    scope: &str,
    namespace: &str,
    type_name: &str,
    method: &str,
    params: &[&str],
) -> MethodKey {
    MethodKey::new(
        TypeKey::new(scope, namespace, type_name),
        method,
        ParamSig::new(params, "System.Void"),
    )
}

/// The library module of the dispatch scenario: `Ns.A` with a virtual `Foo(int)` and
/// `Ns.B : A` overriding it.
pub fn dispatch_library() -> ModuleUnit {
    let mut module = ModuleDef::new("Lib");

    let mut a = TypeDef::new("Ns", "A");
    a.flags = TypeAttributes::PUBLIC;
    a.methods
        .push(virtual_method("Foo", &["System.Int32"], true));
    module.types.push(a);

    let mut b = TypeDef::new("Ns", "B");
    b.flags = TypeAttributes::PUBLIC;
    b.base = Some(TypeDefOrRef::Def(0));
    b.methods
        .push(virtual_method("Foo", &["System.Int32"], false));
    module.types.push(b);

    ModuleUnit::new(module, Path::new("Lib.dll"), SkipSet::new())
}

/// The caller module of the dispatch scenario: invokes `A.Foo(int)` and `B.Foo(int)`
/// and carries a `typeof(A)` attribute argument.
pub fn dispatch_caller() -> ModuleUnit {
    let mut module = ModuleDef::new("App");
    let a_ref = module.add_type_ref(TypeRefRow {
        scope: "Lib".to_string(),
        namespace: "Ns".to_string(),
        name: "A".to_string(),
    });
    let b_ref = module.add_type_ref(TypeRefRow {
        scope: "Lib".to_string(),
        namespace: "Ns".to_string(),
        name: "B".to_string(),
    });
    let foo_on_a = module.add_member_ref(MemberRefRow {
        declaring: a_ref,
        name: "Foo".to_string(),
        sig: MemberRefSig::Method(ParamSig::new(&["System.Int32"], "System.Void")),
    });
    let foo_on_b = module.add_member_ref(MemberRefRow {
        declaring: b_ref,
        name: "Foo".to_string(),
        sig: MemberRefSig::Method(ParamSig::new(&["System.Int32"], "System.Void")),
    });

    let mut program = TypeDef::new("App", "Program");
    program.custom_attributes.push(CustomAttribute {
        attribute_type: "App.TargetAttribute".to_string(),
        ctor_args: vec![CaArgument {
            arg_type: "System.Type".to_string(),
            value: CaValue::TypeRef(a_ref),
        }],
        named_args: Vec::new(),
    });
    let mut main = simple_method("Main");
    main.body = Some(MethodBody {
        locals: Vec::new(),
        instructions: vec![
            Instruction::with_operand(OpCode::Callvirt, Operand::MemberRef(foo_on_a)),
            Instruction::with_operand(OpCode::Callvirt, Operand::MemberRef(foo_on_b)),
            Instruction::new(OpCode::Ret),
        ],
    });
    program.methods.push(main);
    module.types.push(program);

    ModuleUnit::new(module, Path::new("App.exe"), SkipSet::new())
}

/// Build the two-module dispatch project with the given settings.
pub fn dispatch_project(settings: Settings) -> Project {
    let mut project = Project::new(settings);
    project.add_module(dispatch_library());
    project.add_module(dispatch_caller());
    project.init().expect("fixture project initializes");
    project
}

/// Settings with string hiding off, for rename-focused tests.
pub fn rename_only_settings() -> Settings {
    Settings {
        hide_strings: false,
        ..Settings::default()
    }
}

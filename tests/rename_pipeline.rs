//! End-to-end rename pipeline scenarios across module boundaries.

mod common;

use std::path::Path;

use common::*;
use dotshroud::prelude::*;

#[test]
fn override_pair_renames_in_lockstep_and_call_sites_follow() {
    let mut obfuscator = Obfuscator::new(dispatch_project(rename_only_settings()));
    obfuscator.run().unwrap();

    let a_foo = method_key("Lib", "Ns", "A", "Foo", &["System.Int32"]);
    let b_foo = method_key("Lib", "Ns", "B", "Foo", &["System.Int32"]);

    let a_status = obfuscator.map().method_status(&a_foo);
    let b_status = obfuscator.map().method_status(&b_foo);
    let new_name = a_status.new_name().expect("A.Foo renames").to_string();
    assert_eq!(a_status, b_status);

    // definitions carry the shared name
    let project = obfuscator.project();
    let lib = project.module(project.handle_of("Lib").unwrap()).module();
    assert_eq!(lib.types[0].methods[0].name, new_name);
    assert_eq!(lib.types[1].methods[0].name, new_name);

    // both call sites in the referencing module were patched to the same name
    let app = project.module(project.handle_of("App").unwrap()).module();
    assert_eq!(app.member_refs[0].name, new_name);
    assert_eq!(app.member_refs[1].name, new_name);

    // references were patched in place, never duplicated
    assert_eq!(app.member_refs.len(), 2);
}

#[test]
fn unresolved_reference_count_drops_to_zero_after_patching() {
    let mut project = dispatch_project(rename_only_settings());
    let app = project.handle_of("App").unwrap();
    assert_eq!(project.module(app).unresolved_refs().len(), 2);
    assert_eq!(project.module(app).unresolved_type_refs().len(), 2);

    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let project = obfuscator.project();
    let app = project.handle_of("App").unwrap();
    assert!(project.module(app).unresolved_refs().is_empty());
    assert!(project.module(app).unresolved_type_refs().is_empty());
}

#[test]
fn typeof_attribute_argument_follows_type_rename() {
    let mut obfuscator = Obfuscator::new(dispatch_project(rename_only_settings()));
    obfuscator.run().unwrap();

    let project = obfuscator.project();
    let app = project.module(project.handle_of("App").unwrap()).module();
    let lib = project.module(project.handle_of("Lib").unwrap()).module();

    // the typeof(A) argument addresses the first type-ref row; after renaming it must
    // agree with A's new identity
    let a = &lib.types[0];
    let row = &app.type_refs[0];
    assert_eq!(
        (row.namespace.as_str(), row.name.as_str()),
        (a.namespace.as_str(), a.name.as_str())
    );
    assert_ne!(row.namespace, "Ns");
}

#[test]
fn external_interface_group_keeps_its_name() {
    let mut module = ModuleDef::new("Lib");
    let disposable = module.add_type_ref(TypeRefRow {
        scope: "mscorlib".to_string(),
        namespace: "System".to_string(),
        name: "IDisposable".to_string(),
    });
    let mut resource = TypeDef::new("Ns", "Resource");
    resource.flags = TypeAttributes::PUBLIC;
    resource.interfaces.push(TypeDefOrRef::Ref(disposable));
    resource.methods.push(virtual_method("Dispose", &[], true));
    module.types.push(resource);

    let mut project = Project::new(rename_only_settings());
    let handle = project.add_module(ModuleUnit::new(
        module,
        Path::new("Lib.dll"),
        SkipSet::new(),
    ));
    project.init().unwrap();

    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let dispose = method_key("Lib", "Ns", "Resource", "Dispose", &[]);
    assert_eq!(
        obfuscator.map().method_status(&dispose),
        ObfuscationStatus::Skipped("external base class or interface".to_string())
    );
    let project = obfuscator.project();
    assert_eq!(
        project.module(handle).module().types[0].methods[0].name,
        "Dispose"
    );
}

#[test]
fn skipping_one_group_member_retracts_the_reserved_name() {
    // A declares Foo(int) (new slot) and a non-virtual Later(int); B : A overrides
    // Foo but a rule filters B.Foo. The group must revert wholesale, and the short
    // name reserved for it must become available again for Later.
    let mut module = ModuleDef::new("Lib");
    let mut a = TypeDef::new("Ns", "A");
    a.flags = TypeAttributes::PUBLIC;
    a.methods
        .push(virtual_method("Foo", &["System.Int32"], true));
    a.methods.push({
        let mut later = MethodDef::new(
            "Later",
            "System.Void",
            vec![Param::new("x", "System.Int32")],
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
        );
        later.body = Some(MethodBody {
            locals: Vec::new(),
            instructions: vec![Instruction::new(OpCode::Ret)],
        });
        later
    });
    module.types.push(a);

    let mut b = TypeDef::new("Ns", "B");
    b.flags = TypeAttributes::PUBLIC;
    b.base = Some(TypeDefOrRef::Def(0));
    b.methods
        .push(virtual_method("Foo", &["System.Int32"], false));
    module.types.push(b);

    let mut skip = SkipSet::new();
    skip.add_method(MemberRule {
        name: NamePattern::Literal("Foo".to_string()),
        declaring: NamePattern::Literal("Ns.B".to_string()),
        visibility: None,
        type_visibility: None,
    });

    let mut project = Project::new(rename_only_settings());
    project.add_module(ModuleUnit::new(module, Path::new("Lib.dll"), skip));
    project.init().unwrap();
    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let a_foo = method_key("Lib", "Ns", "A", "Foo", &["System.Int32"]);
    let b_foo = method_key("Lib", "Ns", "B", "Foo", &["System.Int32"]);
    let later = method_key("Lib", "Ns", "A", "Later", &["System.Int32"]);

    assert_eq!(
        obfuscator.map().method_status(&a_foo),
        ObfuscationStatus::Skipped("filtered".to_string())
    );
    assert_eq!(
        obfuscator.map().method_status(&b_foo),
        ObfuscationStatus::Skipped("filtered".to_string())
    );
    // the retracted reservation is reusable: Later gets the first short name
    assert_eq!(
        obfuscator.map().method_status(&later),
        ObfuscationStatus::Renamed("a".to_string())
    );
}

#[test]
fn renamed_types_get_synthetic_identities() {
    let mut module = ModuleDef::new("Lib");

    let mut generic = TypeDef::new("Ns", "Widget`2");
    generic.flags = TypeAttributes::PUBLIC;
    generic.generic_params.push(GenericParam::default());
    generic.generic_params.push(GenericParam::default());
    module.types.push(generic);

    let mut plain = TypeDef::new("Ns", "Plain");
    plain.flags = TypeAttributes::PUBLIC;
    plain.methods.push({
        let mut lookup = MethodDef::new(
            "get_Resources",
            "System.Resources.ResourceManager",
            Vec::new(),
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        );
        lookup.body = Some(MethodBody {
            locals: Vec::new(),
            instructions: vec![
                Instruction::with_operand(OpCode::Ldstr, Operand::String("Ns.Plain".to_string())),
                Instruction::new(OpCode::Ret),
            ],
        });
        lookup
    });
    plain.nested_types.push(2);
    module.types.push(plain);

    let mut inner = TypeDef::new("", "Inner");
    inner.flags = TypeAttributes::NESTED_PRIVATE;
    inner.declaring_type = Some(1);
    module.types.push(inner);

    module.resources.push(Resource {
        name: "Ns.Plain.resources".to_string(),
        data: vec![1, 2, 3],
    });
    module.resources.push(Resource {
        name: "unrelated.bin".to_string(),
        data: vec![4],
    });

    let mut project = Project::new(rename_only_settings());
    let handle = project.add_module(ModuleUnit::new(
        module,
        Path::new("Lib.dll"),
        SkipSet::new(),
    ));
    project.init().unwrap();
    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let project = obfuscator.project();
    let module = project.module(handle).module();

    // generic types keep their declared arity suffix
    assert_eq!(module.types[0].name, "A`2");
    assert_eq!(module.types[0].namespace, "a");

    // resources follow their type, and the designer lookup literal is patched
    let plain = &module.types[1];
    let plain_full = format!("{}.{}", plain.namespace, plain.name);
    assert_eq!(module.resources[0].name, format!("{plain_full}.resources"));
    let body = plain.methods[0].body.as_ref().unwrap();
    assert_eq!(body.instructions[0].as_ldstr(), Some(plain_full.as_str()));

    // nested types carry no namespace
    assert_eq!(module.types[2].namespace, "");
    assert_ne!(module.types[2].name, "Inner");

    // the unmatched resource is reported, not renamed
    assert_eq!(module.resources[1].name, "unrelated.bin");
    let resource_entries: Vec<_> = obfuscator.map().resources().collect();
    assert!(resource_entries
        .iter()
        .any(|(name, status)| name.as_str() == "unrelated.bin"
            && **status == ObfuscationStatus::Skipped("no clear new name".to_string())));
}

#[test]
fn properties_drop_or_rename_and_skipping_couples_accessors() {
    let mut module = ModuleDef::new("Lib");
    let mut ty = TypeDef::new("Ns", "Holder");
    ty.flags = TypeAttributes::PUBLIC;

    // accessor methods first
    let mut get_kept = simple_method("get_Kept");
    get_kept.flags |= MethodAttributes::SPECIAL_NAME;
    get_kept.semantics = MethodSemantics::Getter;
    get_kept.return_type = "System.Int32".to_string();
    ty.methods.push(get_kept);

    let mut get_plain = simple_method("get_Plain");
    get_plain.flags |= MethodAttributes::SPECIAL_NAME;
    get_plain.semantics = MethodSemantics::Getter;
    get_plain.return_type = "System.Int32".to_string();
    ty.methods.push(get_plain);

    let mut get_filtered = simple_method("get_Filtered");
    get_filtered.flags |= MethodAttributes::SPECIAL_NAME;
    get_filtered.semantics = MethodSemantics::Getter;
    get_filtered.return_type = "System.Int32".to_string();
    ty.methods.push(get_filtered);

    ty.properties.push(PropertyDef {
        name: "Kept".to_string(),
        flags: PropertyAttributes::empty(),
        property_type: "System.Int32".to_string(),
        get_method: Some(0),
        set_method: None,
        custom_attributes: vec![CustomAttribute {
            attribute_type: "Ns.MarkerAttribute".to_string(),
            ctor_args: Vec::new(),
            named_args: Vec::new(),
        }],
    });
    ty.properties.push(PropertyDef {
        name: "Plain".to_string(),
        flags: PropertyAttributes::empty(),
        property_type: "System.Int32".to_string(),
        get_method: Some(1),
        set_method: None,
        custom_attributes: Vec::new(),
    });
    ty.properties.push(PropertyDef {
        name: "Filtered".to_string(),
        flags: PropertyAttributes::empty(),
        property_type: "System.Int32".to_string(),
        get_method: Some(2),
        set_method: None,
        custom_attributes: Vec::new(),
    });
    module.types.push(ty);

    let mut skip = SkipSet::new();
    skip.add_property(MemberRule {
        name: NamePattern::Literal("Filtered".to_string()),
        declaring: NamePattern::Any,
        visibility: None,
        type_visibility: None,
    });

    let mut project = Project::new(rename_only_settings());
    let handle = project.add_module(ModuleUnit::new(module, Path::new("Lib.dll"), skip));
    project.init().unwrap();
    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let holder = TypeKey::new("Lib", "Ns", "Holder");
    let kept = PropertyKey::new(holder.clone(), "System.Int32", "Kept");
    let plain = PropertyKey::new(holder.clone(), "System.Int32", "Plain");
    let filtered = PropertyKey::new(holder.clone(), "System.Int32", "Filtered");

    // attribute-carrying property renamed, attribute-less dropped, filtered skipped
    assert!(obfuscator.map().property_status(&kept).new_name().is_some());
    assert_eq!(
        obfuscator.map().property_status(&plain),
        ObfuscationStatus::Renamed("dropped".to_string())
    );
    assert_eq!(
        obfuscator.map().property_status(&filtered),
        ObfuscationStatus::Skipped("filtered".to_string())
    );

    let project = obfuscator.project();
    let ty = &project.module(handle).module().types[0];
    // the dropped property is gone, the other two remain
    assert_eq!(ty.properties.len(), 2);

    // the filtered property's accessor was force-skipped and keeps its name
    assert_eq!(ty.methods[2].name, "get_Filtered");
    let accessor = MethodKey::new(
        holder.clone(),
        "get_Filtered",
        ParamSig::new(&[], "System.Int32"),
    );
    assert!(obfuscator.map().method_status(&accessor).is_skipped());

    // the other accessors were renamed
    assert_ne!(ty.methods[0].name, "get_Kept");
    assert_ne!(ty.methods[1].name, "get_Plain");
}

#[test]
fn events_without_attributes_are_dropped() {
    let mut module = ModuleDef::new("Lib");
    let mut ty = TypeDef::new("Ns", "Publisher");
    ty.flags = TypeAttributes::PUBLIC;

    let mut add = simple_method("add_Changed");
    add.flags |= MethodAttributes::SPECIAL_NAME;
    add.semantics = MethodSemantics::AddOn;
    ty.methods.push(add);
    let mut remove = simple_method("remove_Changed");
    remove.flags |= MethodAttributes::SPECIAL_NAME;
    remove.semantics = MethodSemantics::RemoveOn;
    ty.methods.push(remove);

    ty.events.push(EventDef {
        name: "Changed".to_string(),
        flags: EventAttributes::empty(),
        event_type: "System.EventHandler".to_string(),
        add_method: Some(0),
        remove_method: Some(1),
        custom_attributes: Vec::new(),
    });
    module.types.push(ty);

    let mut project = Project::new(rename_only_settings());
    let handle = project.add_module(ModuleUnit::new(
        module,
        Path::new("Lib.dll"),
        SkipSet::new(),
    ));
    project.init().unwrap();
    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let key = EventKey::new(
        TypeKey::new("Lib", "Ns", "Publisher"),
        "System.EventHandler",
        "Changed",
    );
    assert_eq!(
        obfuscator.map().event_status(&key),
        ObfuscationStatus::Renamed("dropped".to_string())
    );

    let project = obfuscator.project();
    let ty = &project.module(handle).module().types[0];
    assert!(ty.events.is_empty());
    // accessors themselves were renamed by the method pass
    assert_ne!(ty.methods[0].name, "add_Changed");
    assert_eq!(ty.methods[0].semantics, MethodSemantics::None);
}

#[test]
fn pipeline_is_deterministic_across_runs() {
    let mut first = Obfuscator::new(dispatch_project(rename_only_settings()));
    first.run().unwrap();
    let mut second = Obfuscator::new(dispatch_project(rename_only_settings()));
    second.run().unwrap();

    let names = |o: &Obfuscator| -> Vec<(String, String)> {
        o.map()
            .methods()
            .map(|(k, s)| (k.to_string(), s.to_string()))
            .chain(o.map().types().map(|(k, s)| (k.to_string(), s.to_string())))
            .collect()
    };
    assert_eq!(names(&first), names(&second));
}

#[test]
fn accessors_are_skipped_when_property_renaming_is_off() {
    let settings = Settings {
        rename_properties: false,
        hide_strings: false,
        ..Settings::default()
    };
    let mut module = ModuleDef::new("Lib");
    let mut ty = TypeDef::new("Ns", "Holder");
    ty.flags = TypeAttributes::PUBLIC;
    let mut getter = simple_method("get_Value");
    getter.flags |=
        MethodAttributes::SPECIAL_NAME | MethodAttributes::VIRTUAL | MethodAttributes::NEW_SLOT;
    getter.semantics = MethodSemantics::Getter;
    getter.return_type = "System.Int32".to_string();
    ty.methods.push(getter);
    module.types.push(ty);

    let mut project = Project::new(settings);
    let handle = project.add_module(ModuleUnit::new(
        module,
        Path::new("Lib.dll"),
        SkipSet::new(),
    ));
    project.init().unwrap();
    let mut obfuscator = Obfuscator::new(project);
    obfuscator.run().unwrap();

    let key = MethodKey::new(
        TypeKey::new("Lib", "Ns", "Holder"),
        "get_Value",
        ParamSig::new(&[], "System.Int32"),
    );
    assert_eq!(
        obfuscator.map().method_status(&key),
        ObfuscationStatus::Skipped("skipping properties".to_string())
    );
    let project = obfuscator.project();
    assert_eq!(
        project.module(handle).module().types[0].methods[0].name,
        "get_Value"
    );
}

//! String hiding: literal loads become calls into a synthesized lookup table.
//!
//! For each module, every `ldstr` in an eligible method body is replaced with a call to
//! a per-string accessor on one freshly synthesized type. Identical literals share one
//! accessor and one slice of the shared byte table. The accessor returns the cached
//! decoded string when present, and otherwise calls the shared decode method, which
//! reads the slice out of the runtime byte array, decodes it as UTF-8, and stores it in
//! the per-module string-array cache.
//!
//! At build time the byte table is additionally permuted with a position-dependent mask
//! (`byte[i] ^= i ^ 0xAA`); the synthesized static initializer reverses the mask into
//! the runtime byte array on module load, before any accessor can run.
//!
//! The transform reads skip decisions through the string-hiding policy, never touches a
//! method without a body, and runs exactly once, strictly after renaming — the
//! orchestrator's fixed call order enforces that.

use std::collections::HashMap;

use crate::{
    assembly::{BodyBuilder, Instruction, OpCode, Operand},
    metadata::{
        flags::{FieldAttributes, MethodAttributes, TypeAttributes},
        model::{
            FieldDef, MemberRefRow, MemberRefSig, MethodBody, MethodDef, ModuleDef, Param,
            TypeDef, TypeDefOrRef, TypeRefRow,
        },
        MethodKey, ParamSig, TypeKey,
    },
    project::{ModuleHandle, Project},
    rename::NameMaker,
    Result,
};

/// The XOR mask constant applied on top of the position byte.
pub const MASK: u8 = 0xAA;

/// Well-known framework references the synthesized code calls into.
struct FrameworkRefs {
    object: crate::metadata::model::TypeRefHandle,
    value_type: crate::metadata::model::TypeRefHandle,
    string: crate::metadata::model::TypeRefHandle,
    byte: crate::metadata::model::TypeRefHandle,
    get_utf8: crate::metadata::model::MemberRefHandle,
    get_string: crate::metadata::model::MemberRefHandle,
    initialize_array: crate::metadata::model::MemberRefHandle,
}

impl FrameworkRefs {
    fn add_to(module: &mut ModuleDef) -> Self {
        let object = module.add_type_ref(TypeRefRow {
            scope: "mscorlib".to_string(),
            namespace: "System".to_string(),
            name: "Object".to_string(),
        });
        let value_type = module.add_type_ref(TypeRefRow {
            scope: "mscorlib".to_string(),
            namespace: "System".to_string(),
            name: "ValueType".to_string(),
        });
        let string = module.add_type_ref(TypeRefRow {
            scope: "mscorlib".to_string(),
            namespace: "System".to_string(),
            name: "String".to_string(),
        });
        let byte = module.add_type_ref(TypeRefRow {
            scope: "mscorlib".to_string(),
            namespace: "System".to_string(),
            name: "Byte".to_string(),
        });
        let encoding = module.add_type_ref(TypeRefRow {
            scope: "mscorlib".to_string(),
            namespace: "System.Text".to_string(),
            name: "Encoding".to_string(),
        });
        let runtime_helpers = module.add_type_ref(TypeRefRow {
            scope: "mscorlib".to_string(),
            namespace: "System.Runtime.CompilerServices".to_string(),
            name: "RuntimeHelpers".to_string(),
        });
        let get_utf8 = module.add_member_ref(MemberRefRow {
            declaring: encoding,
            name: "get_UTF8".to_string(),
            sig: MemberRefSig::Method(ParamSig::new(&[], "System.Text.Encoding")),
        });
        let get_string = module.add_member_ref(MemberRefRow {
            declaring: encoding,
            name: "GetString".to_string(),
            sig: MemberRefSig::Method(ParamSig::new(
                &["System.Byte[]", "System.Int32", "System.Int32"],
                "System.String",
            )),
        });
        let initialize_array = module.add_member_ref(MemberRefRow {
            declaring: runtime_helpers,
            name: "InitializeArray".to_string(),
            sig: MemberRefSig::Method(ParamSig::new(
                &["System.Array", "System.RuntimeFieldHandle"],
                "System.Void",
            )),
        });
        FrameworkRefs {
            object,
            value_type,
            string,
            byte,
            get_utf8,
            get_string,
            initialize_array,
        }
    }
}

/// Run the transform over every module of the project.
///
/// # Errors
/// Only body finalization can fail, and only on an internal label bug.
pub fn hide_strings(project: &mut Project) -> Result<()> {
    for handle in project.handles() {
        hide_module_strings(project, handle)?;
    }
    Ok(())
}

/// Indices of the synthesized members on the lookup type (creation order).
const GETTER_METHOD: usize = 0;
const DATA_CONSTANT_FIELD: usize = 0;
const DATA_FIELD: usize = 1;
const STRING_ARRAY_FIELD: usize = 2;

fn hide_module_strings(project: &mut Project, handle: ModuleHandle) -> Result<()> {
    let marked_only = project.settings().marked_only;

    // eligible method sites, gathered before any mutation
    let eligible: Vec<(usize, usize)> = {
        let unit = project.module(handle);
        let module = unit.module();
        let mut out = Vec::new();
        for (type_index, ty) in module.types.iter().enumerate() {
            if ty.is_module_type()
                || !crate::rename::Obfuscator::should_rename_type(ty, marked_only)
            {
                continue;
            }
            let type_key = TypeKey::for_type(module, type_index);
            for (method_index, method) in ty.methods.iter().enumerate() {
                if method.body.is_none() {
                    continue;
                }
                let key = MethodKey::new(type_key.clone(), &method.name, method.param_sig());
                if unit.skip().should_skip_string_hiding(
                    &key,
                    method.flags.is_public(),
                    ty.flags.is_public(),
                ) {
                    continue;
                }
                out.push((type_index, method_index));
            }
        }
        out
    };
    if eligible.is_empty() {
        return Ok(());
    }

    let module = project.module_mut(handle).module_mut();
    let refs = FrameworkRefs::add_to(module);
    let lookup_type_index = module.types.len();
    let struct_type_index = lookup_type_index + 1;
    let struct_full_name = format!("<PrivateImplementationDetails>{{{}}}/\0", module.name);

    let mut lookup_type = TypeDef::new(
        "",
        &format!("<PrivateImplementationDetails>{{{}}}", module.name),
    );
    lookup_type.flags =
        TypeAttributes::BEFORE_FIELD_INIT | TypeAttributes::AUTO_CLASS | TypeAttributes::ANSI_CLASS;
    lookup_type.base = Some(TypeDefOrRef::Ref(refs.object));
    lookup_type.nested_types.push(struct_type_index);

    let mut data_struct = TypeDef::new("", "\0");
    data_struct.flags = TypeAttributes::EXPLICIT_LAYOUT
        | TypeAttributes::ANSI_CLASS
        | TypeAttributes::SEALED
        | TypeAttributes::NESTED_PRIVATE;
    data_struct.base = Some(TypeDefOrRef::Ref(refs.value_type));
    data_struct.declaring_type = Some(lookup_type_index);
    data_struct.packing_size = Some(1);

    lookup_type.fields.push(FieldDef::new(
        "\0",
        &struct_full_name,
        FieldAttributes::HAS_FIELD_RVA | FieldAttributes::PRIVATE | FieldAttributes::STATIC,
    ));
    lookup_type.fields.push(FieldDef::new(
        "\0\0",
        "System.Byte[]",
        FieldAttributes::PRIVATE | FieldAttributes::STATIC,
    ));
    lookup_type.fields.push(FieldDef::new(
        "\0\0\0",
        "System.String[]",
        FieldAttributes::PRIVATE | FieldAttributes::STATIC,
    ));

    lookup_type
        .methods
        .push(build_getter(lookup_type_index, &refs)?);

    // scan eligible bodies, synthesizing one accessor per unique literal
    let mut accessor_by_string: HashMap<String, usize> = HashMap::new();
    let mut data_bytes: Vec<u8> = Vec::new();
    let mut name_index = 0;
    let mut string_index: i32 = 0;

    for (type_index, method_index) in eligible {
        let body = module.types[type_index].methods[method_index]
            .body
            .as_mut()
            .expect("eligibility requires a body");
        for instruction in &mut body.instructions {
            let Some(value) = instruction.as_ldstr().map(str::to_string) else {
                continue;
            };
            let accessor_index = match accessor_by_string.get(&value) {
                Some(&index) => index,
                None => {
                    let method_name = NameMaker::unique_name(name_index);
                    name_index += 1;

                    let start = i32::try_from(data_bytes.len()).unwrap_or(i32::MAX);
                    data_bytes.extend_from_slice(value.as_bytes());
                    let count = i32::try_from(value.len()).unwrap_or(i32::MAX);

                    let accessor = build_accessor(
                        &method_name,
                        lookup_type_index,
                        string_index,
                        start,
                        count,
                    )?;
                    let index = lookup_type.methods.len();
                    lookup_type.methods.push(accessor);
                    accessor_by_string.insert(value, index);
                    string_index += 1;
                    index
                }
            };
            *instruction = Instruction::with_operand(
                OpCode::Call,
                Operand::MethodDef {
                    type_index: lookup_type_index,
                    method_index: accessor_index,
                },
            );
        }
    }

    // the table size is final: mask it and freeze it into the constant field
    data_struct.class_size = Some(u32::try_from(data_bytes.len()).unwrap_or(u32::MAX));
    for (position, byte) in data_bytes.iter_mut().enumerate() {
        *byte ^= (position as u8) ^ MASK;
    }
    lookup_type.fields[DATA_CONSTANT_FIELD].initial_value = Some(data_bytes.clone());

    lookup_type.methods.push(build_cctor(
        lookup_type_index,
        string_index,
        i32::try_from(data_bytes.len()).unwrap_or(i32::MAX),
        &refs,
    )?);

    module.types.push(lookup_type);
    module.types.push(data_struct);
    Ok(())
}

/// The shared decode method: `(index, start, count) -> string`, storing the decoded
/// value into the cache slot before returning it.
fn build_getter(lookup_type_index: usize, refs: &FrameworkRefs) -> Result<MethodDef> {
    let mut builder = BodyBuilder::new();
    builder
        .emit_with(OpCode::Call, Operand::MemberRef(refs.get_utf8))
        .emit_with(
            OpCode::Ldsfld,
            Operand::FieldDef {
                type_index: lookup_type_index,
                field_index: DATA_FIELD,
            },
        )
        .emit(OpCode::Ldarg1)
        .emit(OpCode::Ldarg2)
        .emit_with(OpCode::Callvirt, Operand::MemberRef(refs.get_string))
        .emit(OpCode::Stloc0)
        .emit_with(
            OpCode::Ldsfld,
            Operand::FieldDef {
                type_index: lookup_type_index,
                field_index: STRING_ARRAY_FIELD,
            },
        )
        .emit(OpCode::Ldarg0)
        .emit(OpCode::Ldloc0)
        .emit(OpCode::StelemRef)
        .emit(OpCode::Ldloc0)
        .emit(OpCode::Ret);

    let mut method = MethodDef::new(
        "\0",
        "System.String",
        vec![
            Param::new("", "System.Int32"),
            Param::new("", "System.Int32"),
            Param::new("", "System.Int32"),
        ],
        MethodAttributes::STATIC | MethodAttributes::PRIVATE | MethodAttributes::HIDE_BY_SIG,
    );
    method.body = Some(MethodBody {
        locals: vec!["System.String".to_string()],
        instructions: builder.finish()?,
    });
    Ok(method)
}

/// One per-literal accessor: returns the cached string, or decodes its slice on first
/// call through the shared getter.
fn build_accessor(
    name: &str,
    lookup_type_index: usize,
    string_index: i32,
    start: i32,
    count: i32,
) -> Result<MethodDef> {
    let mut builder = BodyBuilder::new();
    let cached = builder.declare_label();
    builder
        .emit_with(
            OpCode::Ldsfld,
            Operand::FieldDef {
                type_index: lookup_type_index,
                field_index: STRING_ARRAY_FIELD,
            },
        )
        .emit_ldc_i4(string_index)
        .emit(OpCode::LdelemRef)
        .emit(OpCode::Dup)
        .emit_branch(OpCode::BrtrueS, cached)
        .emit(OpCode::Pop)
        .emit_ldc_i4(string_index)
        .emit_ldc_i4(start)
        .emit_ldc_i4(count)
        .emit_with(
            OpCode::Call,
            Operand::MethodDef {
                type_index: lookup_type_index,
                method_index: GETTER_METHOD,
            },
        );
    builder.place_label(cached);
    builder.emit(OpCode::Ret);

    let mut method = MethodDef::new(
        name,
        "System.String",
        Vec::new(),
        MethodAttributes::STATIC | MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
    );
    method.body = Some(MethodBody {
        locals: Vec::new(),
        instructions: builder.finish()?,
    });
    Ok(method)
}

/// The static initializer: allocates the cache array, materializes the runtime byte
/// array from the constant field, and reverses the position mask in place.
fn build_cctor(
    lookup_type_index: usize,
    string_count: i32,
    data_len: i32,
    refs: &FrameworkRefs,
) -> Result<MethodDef> {
    let data_field = Operand::FieldDef {
        type_index: lookup_type_index,
        field_index: DATA_FIELD,
    };
    let string_array_field = Operand::FieldDef {
        type_index: lookup_type_index,
        field_index: STRING_ARRAY_FIELD,
    };

    let mut builder = BodyBuilder::new();
    builder
        .emit_ldc_i4(string_count)
        .emit_with(OpCode::Newarr, Operand::TypeRef(refs.string))
        .emit_with(OpCode::Stsfld, string_array_field.clone())
        .emit_ldc_i4(data_len)
        .emit_with(OpCode::Newarr, Operand::TypeRef(refs.byte))
        .emit(OpCode::Dup)
        .emit_with(
            OpCode::Ldtoken,
            Operand::FieldDef {
                type_index: lookup_type_index,
                field_index: DATA_CONSTANT_FIELD,
            },
        )
        .emit_with(OpCode::Call, Operand::MemberRef(refs.initialize_array))
        .emit_with(OpCode::Stsfld, data_field.clone())
        .emit_ldc_i4(0)
        .emit(OpCode::Stloc0);

    let condition = builder.declare_label();
    let body_top = builder.declare_label();
    builder.emit_branch(OpCode::BrS, condition);

    // data[i] = data[i] ^ i ^ MASK
    builder.place_label(body_top);
    builder
        .emit_with(OpCode::Ldsfld, data_field.clone())
        .emit(OpCode::Ldloc0)
        .emit_with(OpCode::Ldsfld, data_field.clone())
        .emit(OpCode::Ldloc0)
        .emit(OpCode::LdelemU1)
        .emit(OpCode::Ldloc0)
        .emit(OpCode::Xor)
        .emit_ldc_i4(i32::from(MASK))
        .emit(OpCode::Xor)
        .emit(OpCode::ConvU1)
        .emit(OpCode::StelemI1)
        .emit(OpCode::Ldloc0)
        .emit_ldc_i4(1)
        .emit(OpCode::Add)
        .emit(OpCode::Stloc0);

    builder.place_label(condition);
    builder
        .emit(OpCode::Ldloc0)
        .emit_with(OpCode::Ldsfld, data_field)
        .emit(OpCode::Ldlen)
        .emit(OpCode::ConvI4)
        .emit(OpCode::Clt)
        .emit_branch(OpCode::Brtrue, body_top)
        .emit(OpCode::Ret);

    let mut method = MethodDef::new(
        ".cctor",
        "System.Void",
        Vec::new(),
        MethodAttributes::STATIC
            | MethodAttributes::PRIVATE
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME,
    );
    method.body = Some(MethodBody {
        locals: vec!["System.Int32".to_string()],
        instructions: builder.finish()?,
    });
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        project::{ModuleUnit, Project, Settings, skip::SkipSet},
        test::factories::{body_with, method_with_body},
    };
    use std::path::Path;

    fn project_with_literals() -> (Project, ModuleHandle) {
        let mut module = ModuleDef::new("Lib");
        let mut ty = TypeDef::new("Ns", "Widget");
        ty.methods.push(method_with_body(
            "Greet",
            body_with(vec![
                Instruction::with_operand(OpCode::Ldstr, Operand::String("hello".to_string())),
                Instruction::new(OpCode::Pop),
                Instruction::with_operand(OpCode::Ldstr, Operand::String("world".to_string())),
                Instruction::new(OpCode::Pop),
                Instruction::new(OpCode::Ret),
            ]),
        ));
        ty.methods.push(method_with_body(
            "GreetAgain",
            body_with(vec![
                Instruction::with_operand(OpCode::Ldstr, Operand::String("hello".to_string())),
                Instruction::new(OpCode::Pop),
                Instruction::new(OpCode::Ret),
            ]),
        ));
        module.types.push(ty);

        let mut project = Project::new(Settings::default());
        let handle =
            project.add_module(ModuleUnit::new(module, Path::new("Lib.dll"), SkipSet::new()));
        project.init().unwrap();
        (project, handle)
    }

    fn unmask(bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .enumerate()
            .map(|(position, byte)| byte ^ (position as u8) ^ MASK)
            .collect()
    }

    #[test]
    fn test_shared_accessor_per_unique_literal() {
        let (mut project, handle) = project_with_literals();
        hide_strings(&mut project).unwrap();

        let module = project.module(handle).module();
        let lookup = &module.types[1];
        assert!(lookup.name.starts_with("<PrivateImplementationDetails>"));

        // getter + two accessors + cctor
        assert_eq!(lookup.methods.len(), 4);

        // both "hello" sites call the same accessor
        let body = module.types[0].methods[0].body.as_ref().unwrap();
        let again = module.types[0].methods[1].body.as_ref().unwrap();
        assert_eq!(body.instructions[0].opcode, OpCode::Call);
        assert_eq!(body.instructions[0].operand, again.instructions[0].operand);

        // "world" got its own accessor
        assert_ne!(body.instructions[0].operand, body.instructions[2].operand);
    }

    #[test]
    fn test_byte_table_roundtrips_through_mask() {
        let (mut project, handle) = project_with_literals();
        hide_strings(&mut project).unwrap();

        let module = project.module(handle).module();
        let lookup = &module.types[1];
        let masked = lookup.fields[DATA_CONSTANT_FIELD]
            .initial_value
            .as_ref()
            .unwrap();

        assert_eq!(masked.len(), "hello".len() + "world".len());
        assert_eq!(unmask(masked), b"helloworld");

        let data_struct = &module.types[2];
        assert_eq!(data_struct.class_size, Some(masked.len() as u32));
    }

    #[test]
    fn test_methods_without_bodies_are_untouched() {
        let mut module = ModuleDef::new("Lib");
        let mut ty = TypeDef::new("Ns", "Widget");
        ty.methods.push(MethodDef::new(
            "Abstract",
            "System.Void",
            Vec::new(),
            MethodAttributes::PUBLIC | MethodAttributes::VIRTUAL | MethodAttributes::ABSTRACT,
        ));
        module.types.push(ty);

        let mut project = Project::new(Settings::default());
        let handle =
            project.add_module(ModuleUnit::new(module, Path::new("Lib.dll"), SkipSet::new()));
        project.init().unwrap();
        hide_strings(&mut project).unwrap();

        // no literals anywhere: the module gains no lookup type
        assert_eq!(project.module(handle).module().types.len(), 1);
    }
}

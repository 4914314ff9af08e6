//! Static validation and inspection of contract bytecode.
use std::collections::{BTreeMap, BTreeSet};

use walrus::{ExportItem, ImportKind, Module, ValType};

use crate::{types::FunctionSignature, Error};

/// Exports every contract must provide.
const REQUIRED_EXPORTS: &[&str] = &["allocate", "deallocate"];

/// Prefix of the export marking the host interface version.
const INTERFACE_VERSION_PREFIX: &str = "interface_version_";
/// The only supported host interface version marker.
const SUPPORTED_INTERFACE_VERSION: &str = "interface_version_8";

/// Module name of all host imports.
const HOST_MODULE: &str = "env";
/// Host functions a contract may import.
const SUPPORTED_IMPORTS: &[&str] = &[
    "abort",
    "addr_canonicalize",
    "addr_humanize",
    "addr_validate",
    "call_callable_point",
    "db_next",
    "db_read",
    "db_remove",
    "db_scan",
    "db_write",
    "debug",
    "deserialize_json",
    "ed25519_batch_verify",
    "ed25519_verify",
    "query_chain",
    "secp256k1_recover_pubkey",
    "secp256k1_verify",
    "validate_interface",
];

fn parse(code: &[u8]) -> Result<Module, Error> {
    walrus::ModuleConfig::new()
        .generate_producers_section(false)
        .parse(code)
        .map_err(|err| Error::InvalidCode(format!("malformed module: {}", err)))
}

/// Validate the given bytecode against the host interface.
pub(crate) fn validate(code: &[u8], max_code_size: u64) -> Result<(), Error> {
    let size = code.len() as u64;
    if size > max_code_size {
        return Err(Error::CodeTooLarge(size, max_code_size));
    }
    if code.is_empty() {
        return Err(Error::InvalidCode("empty code".to_string()));
    }

    let module = parse(code)?;

    // Verify that all required exports are there.
    let exports: BTreeSet<&str> = module
        .exports
        .iter()
        .map(|export| export.name.as_str())
        .collect();
    for required in REQUIRED_EXPORTS {
        if !exports.contains(required) {
            return Err(Error::InvalidCode(format!(
                "missing required export: {}",
                required
            )));
        }
    }

    // Exactly one supported interface version marker.
    let versions: Vec<_> = exports
        .iter()
        .filter(|export| export.starts_with(INTERFACE_VERSION_PREFIX))
        .collect();
    match versions[..] {
        [] => return Err(Error::InvalidCode("missing interface version".to_string())),
        [version] if *version == SUPPORTED_INTERFACE_VERSION => {}
        [version] => {
            return Err(Error::InvalidCode(format!(
                "unsupported interface version: {}",
                version
            )))
        }
        _ => return Err(Error::InvalidCode("multiple interface versions".to_string())),
    }

    if module.start.is_some() {
        return Err(Error::InvalidCode("start function not allowed".to_string()));
    }
    if module.memories.iter().count() > 1 {
        return Err(Error::InvalidCode("too many memories".to_string()));
    }

    for import in module.imports.iter() {
        if import.module != HOST_MODULE {
            return Err(Error::InvalidCode(format!(
                "import from unknown module: {}",
                import.module
            )));
        }
        if !matches!(import.kind, ImportKind::Function(_)) {
            return Err(Error::InvalidCode(format!(
                "non-function import: {}",
                import.name
            )));
        }
        if !SUPPORTED_IMPORTS.contains(&import.name.as_str()) {
            return Err(Error::InvalidCode(format!(
                "unsupported import: {}.{}",
                HOST_MODULE, import.name
            )));
        }
    }

    Ok(())
}

/// Signatures of all exported functions, ordered by name.
pub(crate) fn exported_functions(code: &[u8]) -> Result<Vec<FunctionSignature>, Error> {
    let module = parse(code)?;

    let mut signatures: Vec<_> = module
        .exports
        .iter()
        .filter_map(|export| match export.item {
            ExportItem::Function(id) => {
                let ty = module.types.get(module.funcs.get(id).ty());
                Some(FunctionSignature {
                    name: export.name.clone(),
                    inputs: ty.params().iter().map(value_type_name).collect(),
                    results: ty.results().iter().map(value_type_name).collect(),
                })
            }
            _ => None,
        })
        .collect();
    signatures.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(signatures)
}

/// Check that the bytecode exports every expected function with a matching signature.
pub(crate) fn check_interface(code: &[u8], expected: &[FunctionSignature]) -> Result<(), Error> {
    let exported: BTreeMap<String, FunctionSignature> = exported_functions(code)?
        .into_iter()
        .map(|signature| (signature.name.clone(), signature))
        .collect();

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    for signature in expected {
        match exported.get(&signature.name) {
            None => missing.push(signature.name.as_str()),
            Some(found) if found != signature => mismatched.push(signature.name.as_str()),
            Some(_) => {}
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        return Ok(());
    }
    Err(Error::IncompatibleInterface(format!(
        "missing: [{}], mismatched: [{}]",
        missing.join(", "),
        mismatched.join(", ")
    )))
}

fn value_type_name(ty: &ValType) -> String {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        ValType::Externref => "externref",
        ValType::Funcref => "funcref",
    }
    .to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn module(body: &str) -> Vec<u8> {
        wat::parse_str(format!("(module {})", body)).unwrap()
    }

    const BASE: &str = r#"
        (memory 1)
        (func (export "allocate") (param i32) (result i32) i32.const 0)
        (func (export "deallocate") (param i32))
        (func (export "interface_version_8"))
    "#;

    #[test]
    fn test_validate_ok() {
        let code = module(&format!(
            r#"(import "env" "db_read" (func (param i32) (result i32))) {}"#,
            BASE
        ));
        validate(&code, 1024 * 1024).expect("valid code should pass");
    }

    #[test]
    fn test_validate_size() {
        let code = module(BASE);
        assert!(matches!(
            validate(&code, 8),
            Err(Error::CodeTooLarge(size, 8)) if size == code.len() as u64
        ));
        assert!(matches!(validate(&[], 8), Err(Error::InvalidCode(_))));
    }

    #[test]
    fn test_validate_rejects() {
        let max = 1024 * 1024;

        // Not a module at all.
        assert!(matches!(
            validate(b"not wasm", max),
            Err(Error::InvalidCode(_))
        ));
        // Missing required export.
        assert!(matches!(
            validate(&module(r#"(func (export "interface_version_8"))"#), max),
            Err(Error::InvalidCode(msg)) if msg.contains("allocate")
        ));
        // Unsupported interface version.
        let code = module(
            r#"
            (func (export "allocate") (param i32) (result i32) i32.const 0)
            (func (export "deallocate") (param i32))
            (func (export "interface_version_7"))
        "#,
        );
        assert!(matches!(
            validate(&code, max),
            Err(Error::InvalidCode(msg)) if msg.contains("interface_version_7")
        ));
        // Multiple interface versions.
        let code = module(&format!(r#"{} (func (export "interface_version_9"))"#, BASE));
        assert!(matches!(validate(&code, max), Err(Error::InvalidCode(_))));
        // Start function.
        let code = module(&format!(r#"{} (func $s) (start $s)"#, BASE));
        assert!(matches!(validate(&code, max), Err(Error::InvalidCode(_))));
        // Foreign import module.
        let code = module(&format!(r#"(import "wasi" "fd_write" (func)) {}"#, BASE));
        assert!(matches!(validate(&code, max), Err(Error::InvalidCode(_))));
        // Unsupported host function.
        let code = module(&format!(r#"(import "env" "launch_missiles" (func)) {}"#, BASE));
        assert!(matches!(
            validate(&code, max),
            Err(Error::InvalidCode(msg)) if msg.contains("launch_missiles")
        ));
    }

    #[test]
    fn test_exported_functions() {
        let code = module(&format!(
            r#"{} (func (export "add") (param i64 i64) (result i64) i64.const 0)"#,
            BASE
        ));
        let exports = exported_functions(&code).unwrap();
        let names: Vec<_> = exports.iter().map(|sig| sig.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["add", "allocate", "deallocate", "interface_version_8"]
        );
        assert_eq!(
            exports[0],
            FunctionSignature {
                name: "add".to_string(),
                inputs: vec!["i64".to_string(), "i64".to_string()],
                results: vec!["i64".to_string()],
            }
        );
    }

    #[test]
    fn test_check_interface() {
        let code = module(&format!(
            r#"{} (func (export "add") (param i64 i64) (result i64) i64.const 0)"#,
            BASE
        ));
        let add = FunctionSignature {
            name: "add".to_string(),
            inputs: vec!["i64".to_string(), "i64".to_string()],
            results: vec!["i64".to_string()],
        };
        check_interface(&code, &[add.clone()]).expect("interface should match");

        let wrong_add = FunctionSignature {
            results: vec![],
            ..add
        };
        let sub = FunctionSignature {
            name: "sub".to_string(),
            inputs: vec![],
            results: vec![],
        };
        match check_interface(&code, &[wrong_add, sub]) {
            Err(Error::IncompatibleInterface(report)) => {
                assert_eq!(report, "missing: [sub], mismatched: [add]")
            }
            other => panic!("expected incompatible interface, got {:?}", other),
        }
    }
}

//! Extension name bookkeeping. Extension payloads are not validated.

use serde_json::{Map, Value};

use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::reader::escape_pointer_segment;
use super::registry::describe;

pub(super) fn validate_extensions(
    root: &Map<String, Value>,
    document: &Document,
    issues: &mut IssueCollector,
) {
    check_declared(root, &document.extensions_used, issues);

    for (position, name) in document.extensions_required.iter().enumerate() {
        if !document.extensions_used.contains(name) {
            issues.record(
                IssueCode::UnusedExtensionRequired,
                format!("/extensionsRequired/{position}"),
                format!("Unused extension '{name}' cannot be required"),
            );
        }
    }

    for (position, name) in document.extensions_used.iter().enumerate() {
        issues.record(
            IssueCode::UnsupportedExtension,
            format!("/extensionsUsed/{position}"),
            format!(
                "Cannot validate an extension as it is not supported by the validator: '{name}'"
            ),
        );
    }
}

/// Walk the tree in document order and check every `extensions` object.
/// `extras` subtrees are application data and are skipped.
fn check_declared(root: &Map<String, Value>, used: &[String], issues: &mut IssueCollector) {
    let mut stack: Vec<(&Value, String)> = Vec::new();
    push_object(&mut stack, root, "", used, issues);

    while let Some((value, pointer)) = stack.pop() {
        match value {
            Value::Object(object) => push_object(&mut stack, object, &pointer, used, issues),
            Value::Array(items) => {
                for (position, item) in items.iter().enumerate().rev() {
                    stack.push((item, format!("{pointer}/{position}")));
                }
            }
            _ => {}
        }
    }
}

fn push_object<'a>(
    stack: &mut Vec<(&'a Value, String)>,
    object: &'a Map<String, Value>,
    pointer: &str,
    used: &[String],
    issues: &mut IssueCollector,
) {
    let mut children = Vec::new();
    for (key, value) in object {
        let child_pointer = format!("{pointer}/{}", escape_pointer_segment(key));
        match key.as_str() {
            "extras" => {}
            "extensions" => match value {
                Value::Object(extensions) => {
                    for name in extensions.keys() {
                        if !used.contains(name) {
                            issues.record(
                                IssueCode::UndeclaredExtension,
                                format!("{child_pointer}/{}", escape_pointer_segment(name)),
                                format!("Extension '{name}' was not declared in extensionsUsed"),
                            );
                        }
                    }
                }
                other => issues.record(
                    IssueCode::TypeMismatch,
                    child_pointer,
                    format!("Type mismatch. {} is not an object", describe(other)),
                ),
            },
            _ => children.push((value, child_pointer)),
        }
    }
    stack.extend(children.into_iter().rev());
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::validate::document::tests::parse_document;

    fn check(value: Value) -> IssueCollector {
        let root = value.as_object().cloned().unwrap_or_default();
        let (document, _, mut issues) = parse_document(value);
        validate_extensions(&root, &document, &mut issues);
        issues
    }

    #[test]
    fn given_undeclared_nested_extension_when_checking_then_it_is_reported_in_document_order() {
        let issues = check(json!({
            "asset": {"version": "2.0"},
            "extensionsUsed": ["KHR_materials_unlit"],
            "materials": [
                {"extensions": {"KHR_materials_unlit": {}}},
                {"extensions": {"EXT_unknown": {}}, "extras": {"extensions": {"IGNORED": {}}}}
            ],
            "nodes": [{"extensions": {"VENDOR_node": {"extensions": {"DEEP": {}}}}}]
        }));

        let reported = issues
            .issues()
            .iter()
            .map(|issue| (issue.code.as_str(), issue.pointer.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>();
        assert_eq!(
            reported,
            vec![
                ("UNDECLARED_EXTENSION", "/materials/1/extensions/EXT_unknown"),
                ("UNDECLARED_EXTENSION", "/nodes/0/extensions/VENDOR_node"),
                ("UNSUPPORTED_EXTENSION", "/extensionsUsed/0"),
            ]
        );
    }

    #[test]
    fn given_required_extension_not_used_when_checking_then_it_is_an_error() {
        let issues = check(json!({
            "asset": {"version": "2.0"},
            "extensionsRequired": ["KHR_draco_mesh_compression"],
            "extensions": []
        }));

        let codes = issues
            .issues()
            .iter()
            .map(|issue| issue.code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["TYPE_MISMATCH", "UNUSED_EXTENSION_REQUIRED"]);
        assert_eq!(issues.num_errors(), 2);
    }
}

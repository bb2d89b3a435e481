//! Generates the constants module consumed by the web front end.
//!
//! The output is a plain script exposing `root.<namespace>`, with one frozen
//! object per parameter group (`PM.topology.chi_eff`) and lookup helpers
//! over the validation map. It is derived from the document alone.

use super::{ExportDocument, ExportError};
use crate::validation::Classification;
use chrono::SecondsFormat;
use serde::Serialize;

/// Names the generated module defines itself; a group may not shadow them.
/// `__proto__` would set the object's prototype instead of adding a key.
pub const RESERVED: &[&str] = &["meta", "validation", "classification", "get", "paths", PROTO];

const PROTO: &str = "__proto__";

#[derive(Serialize)]
struct ValidationEntry<'a> {
    computed: Option<f64>,
    reference: Option<f64>,
    deviation: Option<f64>,
    classification: Classification,
    unit: &'a str,
}

pub fn render(doc: &ExportDocument, namespace: &str) -> Result<String, ExportError> {
    let groups = doc.groups();
    if let Some(group) = groups.keys().find(|g| RESERVED.contains(*g)) {
        return Err(ExportError::ReservedGroup { group: group.to_string() });
    }
    if let Some(path) = doc.parameters.keys().find(|p| p.name() == PROTO) {
        return Err(ExportError::ReservedName { path: path.to_string() });
    }
    let q = |s: &str| serde_json::to_string(s);
    let generated_at = doc.meta.generated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);

    let mut lines: Vec<String> = vec![
        "// @generated from the canonical parameter document. Do not edit.".into(),
        format!("// version {} generated {}", doc.meta.version, generated_at),
        "(function (root) {".into(),
        "  \"use strict\";".into(),
        "  var NS = {};".into(),
        format!("  NS.meta = Object.freeze({{ version: {}, generated_at: {} }});", q(doc.meta.version.as_str())?, q(generated_at.as_str())?),
    ];

    for (group, params) in &groups {
        lines.push(format!("  NS[{}] = Object.freeze({{", q(*group)?));
        for (name, param) in params {
            lines.push(format!("    {}: {},", q(*name)?, serde_json::to_string(&param.value)?));
        }
        lines.push("  });".into());
    }

    lines.push("  var VALIDATION = Object.freeze({".into());
    for (path, record) in &doc.validation {
        let entry = ValidationEntry {
            computed: record.computed,
            reference: record.reference,
            deviation: record.deviation,
            classification: record.classification,
            unit: record.unit.as_str(),
        };
        lines.push(format!("    {}: Object.freeze({}),", q(path.as_str())?, serde_json::to_string(&entry)?));
    }
    lines.push("  });".into());

    lines.extend(
        [
            "  function has(obj, key) { return Object.prototype.hasOwnProperty.call(obj, key); }",
            "  NS.paths = function () { return Object.keys(VALIDATION); };",
            "  NS.validation = function (path) { return has(VALIDATION, path) ? VALIDATION[path] : null; };",
            "  NS.classification = function (path) {",
            "    var record = NS.validation(path);",
        ]
        .map(String::from),
    );
    lines.push(format!("    return record ? record.classification : {};", q(Classification::NoReference.as_str())?));
    lines.extend(
        [
            "  };",
            "  NS.get = function (path) {",
            "    var dot = path.indexOf(\".\");",
            "    if (dot < 0) { return undefined; }",
            "    var group = path.slice(0, dot);",
            "    if (!has(NS, group) || typeof NS[group] !== \"object\") { return undefined; }",
            "    var name = path.slice(dot + 1);",
            "    return has(NS[group], name) ? NS[group][name] : undefined;",
            "  };",
        ]
        .map(String::from),
    );
    lines.push(format!("  root[{}] = Object.freeze(NS);", q(namespace)?));
    lines.push("})(typeof globalThis !== \"undefined\" ? globalThis : this);".into());

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::document::tests::sample_document;
    use crate::store::ParamPath;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exposes_every_parameter_under_its_group() {
        let js = render(&sample_document(), "PM").unwrap();
        assert!(js.contains("  NS[\"topology\"] = Object.freeze({\n    \"chi_eff\": 144,\n    \"n_gen\": 3.0,\n  });"));
        assert!(js.contains("    \"m_h\": 125.1,"));
        assert!(js.contains("root[\"PM\"] = Object.freeze(NS);"));
    }

    #[test]
    fn test_validation_helpers() {
        let js = render(&sample_document(), "PM").unwrap();
        assert!(js.contains("\"higgs.m_h\": Object.freeze({\"computed\":125.1,\"reference\":125.25,"));
        assert!(js.contains("NS.classification = function (path)"));
        assert!(js.contains("return record ? record.classification : \"NO_REFERENCE\";"));
    }

    #[test]
    fn test_is_deterministic_and_namespaced() {
        let doc = sample_document();
        assert_eq!(render(&doc, "PM").unwrap(), render(&doc, "PM").unwrap());
        assert!(render(&doc, "Physics").unwrap().contains("root[\"Physics\"]"));
    }

    #[test]
    fn test_reserved_group_is_rejected() {
        let mut doc = sample_document();
        let param = doc.parameters.values().next().unwrap().clone();
        doc.parameters.insert(ParamPath::parse("validation.count").unwrap(), param);
        assert!(matches!(render(&doc, "PM"), Err(ExportError::ReservedGroup { group }) if group == "validation"));
    }

    #[test]
    fn test_proto_is_never_emitted() {
        let param = sample_document().parameters.values().next().unwrap().clone();

        let mut doc = sample_document();
        doc.parameters.insert(ParamPath::parse("__proto__.chi").unwrap(), param.clone());
        assert!(matches!(render(&doc, "PM"), Err(ExportError::ReservedGroup { group }) if group == "__proto__"));

        let mut doc = sample_document();
        doc.parameters.insert(ParamPath::parse("topology.__proto__").unwrap(), param.clone());
        assert!(matches!(render(&doc, "PM"), Err(ExportError::ReservedName { path }) if path == "topology.__proto__"));

        // Only an exact key is special; a longer name is an ordinary property.
        let mut doc = sample_document();
        doc.parameters.insert(ParamPath::parse("topology.__proto__.b3").unwrap(), param);
        assert!(render(&doc, "PM").unwrap().contains("    \"__proto__.b3\": "));
    }
}

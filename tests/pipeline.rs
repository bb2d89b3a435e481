//! End-to-end runs over a small but realistic module set.

use chrono::{TimeZone, Utc};
use paramgraph_core::compute::FnModule;
use paramgraph_core::config::ExportConfig;
use paramgraph_core::export::{js, json};
use paramgraph_core::{
    BaseInputs, Category, Classification, DisplayField, FormulaDefinition, IssueKind, ModuleDescriptor, ModuleError,
    ModuleOutputs, ParamEntry, ParamPath, ParamValue, Pipeline, PipelineConfig, PipelineError, ReferenceTable,
    ReferenceValue, RegistryView, ResolveError, SimulationModule, StubFallback,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn path(raw: &str) -> ParamPath {
    ParamPath::parse(raw).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig { generated_at: Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()), ..PipelineConfig::default() }
}

fn module<F>(id: &str, reads: &[&str], writes: &[(&str, &str, Category, &str)], run: F) -> FnModule<F>
where
    F: Fn(&RegistryView<'_>) -> Result<ModuleOutputs, ModuleError> + Send + Sync,
{
    let mut builder = ModuleDescriptor::builder(id).reads(reads.iter().copied());
    for (p, unit, category, source) in writes {
        builder = builder.write(p, unit, *category, source);
    }
    FnModule::new(builder.build().unwrap(), run)
}

fn references() -> ReferenceTable {
    let mut refs = ReferenceTable::new();
    refs.insert(path("generations.n_gen_chi"), ReferenceValue::with_uncertainty(3.0, 0.0, "1", "observed families")).unwrap();
    refs.insert(path("generations.n_gen_mirror"), ReferenceValue::with_uncertainty(3.0, 0.0, "1", "observed families")).unwrap();
    refs.insert(path("higgs.m_h"), ReferenceValue::with_uncertainty(125.25, 0.17, "GeV", "PDG 2024")).unwrap();
    refs.insert(path("proton.tau_p"), ReferenceValue::with_tolerance(3.91e34, 20.0, "years", "Super-K bound")).unwrap();
    refs
}

/// Registered deliberately out of dependency order. `tau_scale` lets a test
/// reproduce the classic wrong-unit lifetime.
fn physics(tau_scale: f64) -> Pipeline {
    let mut p = Pipeline::new(config());
    p.seed("topology.chi", ParamEntry::new(72i64, "1", Category::Geometric, "TCS #187 Euler characteristic")).unwrap();
    p.seed("topology.chi_eff", ParamEntry::new(144i64, "1", Category::Geometric, "TCS #187 with mirror sector")).unwrap();
    p.seed("topology.b3", ParamEntry::new(24i64, "1", Category::Geometric, "third Betti number")).unwrap();
    p.seed("higgs.vev", ParamEntry::new(246.22, "GeV", Category::Input, "PDG 2024")).unwrap();

    p.register(module(
        "proton_decay",
        &["higgs.m_h", "gauge.alpha_inv_gut"],
        &[("proton.tau_p", "years", Category::Predicted, "dimension-6 exchange")],
        move |view| {
            let m_h = view.f64("higgs.m_h")?;
            let alpha_inv = view.f64("gauge.alpha_inv_gut")?;
            let tau = 3.9e34 * (m_h / 125.0).powi(4) * (alpha_inv / 24.3).powi(2) * tau_scale;
            Ok(ModuleOutputs::new().with("proton.tau_p", tau))
        },
    ));
    p.register(module(
        "higgs",
        &["gauge.alpha_inv_gut", "higgs.vev"],
        &[("higgs.m_h", "GeV", Category::Predicted, "quartic from gauge coupling")],
        |view| {
            let lambda = 3.1347 / view.f64("gauge.alpha_inv_gut")?;
            if lambda <= 0.0 {
                return Err(ModuleError::domain("negative quartic"));
            }
            Ok(ModuleOutputs::new().with("higgs.m_h", view.f64("higgs.vev")? * (2.0 * lambda).sqrt()))
        },
    ));
    p.register(module(
        "generations_chi",
        &["topology.chi"],
        &[("generations.n_gen_chi", "1", Category::Derived, "n = chi / 24")],
        |view| Ok(ModuleOutputs::new().with("generations.n_gen_chi", view.f64("topology.chi")? / 24.0)),
    ));
    p.register(module(
        "generations_mirror",
        &["topology.chi_eff"],
        &[("generations.n_gen_mirror", "1", Category::Derived, "n = chi_eff / 48, mirror factor 2")],
        |view| Ok(ModuleOutputs::new().with("generations.n_gen_mirror", view.f64("topology.chi_eff")? / 48.0)),
    ));
    p.register(module(
        "gauge",
        &["topology.b3"],
        &[("gauge.alpha_inv_gut", "1", Category::Derived, "b3 + threshold")],
        |view| Ok(ModuleOutputs::new().with("gauge.alpha_inv_gut", view.f64("topology.b3")? + 0.3)),
    ));

    p.references(references());
    p.formula(
        FormulaDefinition::new("n-gen-chi", "n = chi / 24", Category::Derived)
            .inputs(["topology.chi"])
            .outputs(["generations.n_gen_chi"])
            .simulation_file("generations_chi"),
    );
    p.formula(
        FormulaDefinition::new("n-gen-mirror", "n = chi_eff / 48", Category::Derived)
            .inputs(["topology.chi_eff"])
            .outputs(["generations.n_gen_mirror"])
            .simulation_file("generations_mirror"),
    );
    p.formula(
        FormulaDefinition::new("m-h", "m_h = v sqrt(2 lambda)", Category::Predicted)
            .inputs(["gauge.alpha_inv_gut", "higgs.vev"])
            .outputs(["higgs.m_h"])
            .simulation_file("higgs"),
    );
    p.field(DisplayField::literal("sec-generations", true, "Section 2.1"));
    p.field(DisplayField::parameter("m-h-value", false, "higgs.m_h"));
    p
}

#[test]
fn full_run_is_ordered_and_publishable() {
    let outcome = physics(1.0).run().unwrap();
    assert_eq!(outcome.plan.ids, vec!["generations_chi", "generations_mirror", "gauge", "higgs", "proton_decay"]);
    assert!(outcome.is_publishable(), "{}", outcome.report);
    assert_eq!(outcome.snapshot.len(), 9);
}

#[test]
fn every_read_is_available_before_its_module_runs() {
    let outcome = physics(1.0).run().unwrap();
    let mut available: BTreeSet<ParamPath> =
        outcome.snapshot.iter().filter(|p| p.produced_by.is_none()).map(|p| p.path.clone()).collect();
    for record in &outcome.document.modules {
        for read in &record.reads {
            assert!(available.contains(read), "{} read {} before it was written", record.id, read);
        }
        available.extend(record.writes.iter().cloned());
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let pipeline = physics(1.0);
    let first = pipeline.run().unwrap();
    let second = pipeline.run().unwrap();
    assert_eq!(first.artifacts.json, second.artifacts.json);
    assert_eq!(first.artifacts.js, second.artifacts.js);

    let rebuilt = physics(1.0).run().unwrap();
    assert_eq!(first.artifacts, rebuilt.artifacts);
}

#[test]
fn committed_paths_equal_declared_writes() {
    let outcome = physics(1.0).run().unwrap();
    for record in &outcome.document.modules {
        let committed: BTreeSet<&ParamPath> = outcome
            .document
            .parameters
            .iter()
            .filter(|(_, p)| p.produced_by.as_deref() == Some(record.id.as_str()))
            .map(|(path, _)| path)
            .collect();
        let declared: BTreeSet<&ParamPath> = record.writes.iter().collect();
        assert_eq!(committed, declared, "module {}", record.id);
    }
}

#[test]
fn export_round_trips_every_parameter() {
    let outcome = physics(1.0).run().unwrap();
    for param in outcome.snapshot.iter() {
        let exported = &outcome.document.parameters[&param.path];
        assert_eq!(exported.value, param.value);
        assert_eq!(exported.category, param.category);

        let line = format!("    \"{}\": {},", param.path.name(), serde_json::to_string(&param.value).unwrap());
        assert!(outcome.artifacts.js.contains(&line), "missing {line}");
    }

    // The JS module is a pure function of the JSON document.
    let parsed = json::parse(&outcome.artifacts.json).unwrap();
    assert_eq!(parsed, outcome.document);
    assert_eq!(js::render(&parsed, "PM").unwrap(), outcome.artifacts.js);
}

#[test]
fn both_generation_formulas_are_validated_independently() {
    let outcome = physics(1.0).run().unwrap();
    let chi = &outcome.document.validation[&path("generations.n_gen_chi")];
    let mirror = &outcome.document.validation[&path("generations.n_gen_mirror")];
    assert_eq!(chi.classification, Classification::Exact);
    assert_eq!(mirror.classification, Classification::Exact);
    assert_eq!(chi.computed, Some(3.0));
    assert_eq!(mirror.computed, Some(3.0));
}

#[test]
fn outside_bounds_is_reported_but_not_fatal() {
    let outcome = physics(1.0).run().unwrap();
    let m_h = &outcome.document.validation[&path("higgs.m_h")];
    assert_eq!(m_h.classification, Classification::OutsideBounds);
    assert!(m_h.deviation.unwrap() > 1.0);
    assert!(outcome.is_publishable());
}

#[test]
fn suspect_unit_error_blocks_publication() {
    let outcome = physics(1e17).run().unwrap();
    let tau = &outcome.document.validation[&path("proton.tau_p")];
    assert_eq!(tau.classification, Classification::SuspectUnitError);
    assert!(!outcome.is_publishable());
    assert_eq!(outcome.report.count(IssueKind::SuspectUnitError), 1);

    let dir = tempfile::tempdir().unwrap();
    let export = ExportConfig { json_path: Some(dir.path().join("parameters.json")), ..ExportConfig::default() };
    assert!(matches!(outcome.publish(&export), Err(PipelineError::Inconsistent(_))));
    assert!(!dir.path().join("parameters.json").exists());
}

#[test]
fn publish_writes_both_artifacts() {
    let outcome = physics(1.0).run().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let export = ExportConfig {
        namespace: "PM".into(),
        json_path: Some(dir.path().join("data").join("parameters.json")),
        js_path: Some(dir.path().join("js").join("constants.js")),
    };
    let written = outcome.publish(&export).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), outcome.artifacts.json);
    assert_eq!(std::fs::read_to_string(&written[1]).unwrap(), outcome.artifacts.js);
}

#[test]
fn module_error_halts_the_run() {
    let mut p = physics(1.0);
    p.register(module(
        "yukawa",
        &["higgs.m_h"],
        &[("yukawa.y_t", "1", Category::Derived, "top Yukawa")],
        |_| Err(ModuleError::domain("division by degenerate zero")),
    ));
    match p.run().unwrap_err() {
        PipelineError::ModuleExecution { module, source } => {
            assert_eq!(module, "yukawa");
            assert_eq!(source, ModuleError::domain("division by degenerate zero"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn undeclared_read_fails_fast() {
    let mut p = physics(1.0);
    p.register(module(
        "neutrino",
        &["topology.chi"],
        &[("neutrino.theta_12", "deg", Category::Predicted, "mixing")],
        |view| Ok(ModuleOutputs::new().with("neutrino.theta_12", view.f64("higgs.vev")?)),
    ));
    let err = p.run().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModuleExecution { source: ModuleError::UndeclaredRead { ref path, .. }, .. } if path == "higgs.vev"
    ));
}

#[test]
fn write_conflict_is_detected_before_any_module_runs() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut p = Pipeline::new(config());
    p.seed("topology.b3", ParamEntry::new(24i64, "1", Category::Geometric, "Betti")).unwrap();
    for id in ["gauge", "gauge_refit"] {
        let runs = Arc::clone(&runs);
        p.register(module(id, &["topology.b3"], &[("gauge.alpha_inv_gut", "1", Category::Calibrated, "fit")], move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(ModuleOutputs::new().with("gauge.alpha_inv_gut", 24.3))
        }));
    }
    let err = p.run().unwrap_err();
    assert!(matches!(err, PipelineError::Resolve(ResolveError::WriteConflict { .. })));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn unresolved_dependency_names_module_and_path() {
    let mut p = Pipeline::new(config());
    p.register(module("masses", &["higgs.vev"], &[("masses.m_t", "GeV", Category::Predicted, "y_t v / sqrt 2")], |_| {
        Ok(ModuleOutputs::new().with("masses.m_t", 172.5))
    }));
    match p.run().unwrap_err() {
        PipelineError::Resolve(ResolveError::UnresolvedDependency { module, path: missing }) => {
            assert_eq!(module, "masses");
            assert_eq!(missing, path("higgs.vev"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

fn neutrino_fallback() -> StubFallback {
    let descriptor = ModuleDescriptor::builder("neutrino")
        .read("topology.chi")
        .write("neutrino.theta_12", "deg", Category::Predicted, "tri-bimaximal correction")
        .build()
        .unwrap();
    StubFallback::new(descriptor, ModuleOutputs::new().with("neutrino.theta_12", 33.4), "neutrino module not built")
}

#[test]
fn missing_optional_module_commits_tagged_stub() {
    let mut p = physics(1.0);
    p.register_optional(None, neutrino_fallback()).unwrap();
    let outcome = p.run().unwrap();

    let theta = &outcome.document.parameters[&path("neutrino.theta_12")];
    assert_eq!(theta.category, Category::Stub);
    assert!(theta.source.contains("neutrino module not built"));
    assert_eq!(theta.produced_by.as_deref(), Some("neutrino"));

    let record = outcome.document.modules.iter().find(|m| m.id == "neutrino").unwrap();
    assert!(record.stub);
    assert!(outcome.artifacts.json.contains("\"STUB\""));
}

#[test]
fn present_optional_module_runs_normally() {
    let fallback = neutrino_fallback();
    let real: Box<dyn SimulationModule> = Box::new(FnModule::new(fallback.descriptor.clone(), |view: &RegistryView<'_>| {
        let chi = view.f64("topology.chi")?;
        Ok(ModuleOutputs::new().with("neutrino.theta_12", 33.0 + chi / 180.0))
    }));
    let mut p = physics(1.0);
    p.register_optional(Some(real), fallback).unwrap();
    let outcome = p.run().unwrap();

    let theta = &outcome.document.parameters[&path("neutrino.theta_12")];
    assert_eq!(theta.category, Category::Predicted);
    assert!((theta.value.as_f64().unwrap() - 33.4).abs() < 1e-12);
    assert!(!outcome.document.modules.iter().any(|m| m.stub));
}

#[test]
fn optional_module_with_different_writes_is_refused() {
    let descriptor = ModuleDescriptor::builder("neutrino")
        .read("topology.chi")
        .write("neutrino.theta_13", "deg", Category::Predicted, "reactor angle")
        .build()
        .unwrap();
    let real: Box<dyn SimulationModule> = Box::new(FnModule::new(descriptor, |_: &RegistryView<'_>| {
        Ok(ModuleOutputs::new().with("neutrino.theta_13", 8.6))
    }));
    let mut p = physics(1.0);
    let err = p.register_optional(Some(real), neutrino_fallback()).map(|_| ()).unwrap_err();
    assert!(matches!(err, PipelineError::FallbackMismatch { .. }), "{err}");
    assert!(err.to_string().contains("neutrino.theta_13"));

    // Nothing was registered, so the run matches the plain physics set.
    assert!(!p.run().unwrap().document.parameters.keys().any(|k| k.group() == "neutrino"));
}

#[test]
fn formula_crediting_a_stubbed_module_is_not_publishable() {
    let mut p = physics(1.0);
    p.register_optional(None, neutrino_fallback()).unwrap();
    p.formula(
        FormulaDefinition::new("theta-12", "theta_12 = 33.4 deg", Category::Predicted)
            .inputs(["topology.chi"])
            .outputs(["neutrino.theta_12"])
            .simulation_file("neutrino"),
    );
    let outcome = p.run().unwrap();
    let issues: Vec<_> = outcome.report.of_kind(IssueKind::SimulationFileNoOutput).collect();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].location, "formulas.theta-12.simulationFile");
    assert_eq!(outcome.report.len(), 1);
    assert!(!outcome.is_publishable());
}

#[test]
fn dangling_formula_reference_is_reported_once() {
    let mut p = physics(1.0);
    p.formula(FormulaDefinition::new("chi-eff", "chi_eff = 2 chi", Category::Geometric).outputs(["topology.chi_eff_typo"]));
    let outcome = p.run().unwrap();
    assert_eq!(outcome.report.count(IssueKind::DanglingParamRef), 1);
    assert_eq!(outcome.report.len(), 1);
    assert!(!outcome.is_publishable());
}

#[test]
fn structural_field_sourced_from_parameter_is_rejected() {
    let mut p = physics(1.0);
    p.seed("neutrino.theta_12_error", ParamEntry::new(0.75, "deg", Category::Input, "NuFIT 5.2")).unwrap();
    p.field(DisplayField::parameter("sec-neutrino", true, "neutrino.theta_12_error"));
    let outcome = p.run().unwrap();
    let issues: Vec<_> = outcome.report.of_kind(IssueKind::StructuralFieldFromParameter).collect();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].location, "fields.sec-neutrino");
}

#[test]
fn scenarios_run_in_isolation() {
    let pipeline = physics(1.0);
    let scenarios = vec![
        BaseInputs::new(),
        BaseInputs::new().with("topology.chi_eff", ParamEntry::new(96i64, "1", Category::Geometric, "alternative TCS")).unwrap(),
    ];
    let outcomes = pipeline.run_scenarios(&scenarios);
    assert_eq!(outcomes.len(), 2);

    let baseline = outcomes[0].as_ref().unwrap();
    let variant = outcomes[1].as_ref().unwrap();
    let mirror = path("generations.n_gen_mirror");
    assert_eq!(baseline.document.parameters[&mirror].value, ParamValue::Float(3.0));
    assert_eq!(variant.document.parameters[&mirror].value, ParamValue::Float(2.0));
    assert_eq!(variant.document.validation[&mirror].classification, Classification::OutsideBounds);

    // The shared pipeline keeps its own inputs.
    assert_eq!(pipeline.run().unwrap().artifacts, baseline.artifacts);
}

#[test]
fn graph_reports_impact_and_renders_dot() {
    let pipeline = physics(1.0);
    let graph = pipeline.graph();
    let impacted: Vec<&str> = graph.impacted_by(&path("topology.b3")).into_iter().map(|i| graph.module_id(i)).collect();
    assert_eq!(impacted, vec!["proton_decay", "higgs", "gauge"]);
    assert!(graph.to_dot().contains("module:generations_mirror"));
}

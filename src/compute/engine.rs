use super::module::{ModuleDescriptor, ModuleOutputs, OutputDecl, RegistryView, SimulationModule, StubFallback};
use crate::error::PipelineError;
use crate::store::{ParamEntry, ParamValue, Registry};

/// Runs single modules against the registry. The engine is the only code
/// that writes module outputs; modules only propose them.
pub struct Engine;

impl Engine {
    /// Runs `module` on a view restricted to its reads and commits its
    /// outputs. Nothing is committed unless every check passes.
    pub fn execute(module: &dyn SimulationModule, registry: &mut Registry) -> Result<usize, PipelineError> {
        let desc = module.descriptor();
        tracing::debug!(module = %desc.id, "running module");

        let outputs = {
            let view = RegistryView::new(registry, desc);
            module
                .run(&view)
                .map_err(|source| PipelineError::ModuleExecution { module: desc.id.clone(), source })?
        };

        let entries = Self::check_outputs(desc, outputs)?
            .into_iter()
            .map(|(decl, value)| {
                let entry = ParamEntry { value, unit: decl.unit.clone(), category: decl.category, source: decl.source.clone() };
                (decl.path.clone(), entry)
            })
            .collect();
        let written = registry.commit(&desc.id, entries)?;
        tracing::debug!(module = %desc.id, written, "module committed");
        Ok(written)
    }

    /// Commits the declared stand-in values of an absent optional module.
    pub fn apply_stub(stub: &StubFallback, registry: &mut Registry) -> Result<usize, PipelineError> {
        let desc = &stub.descriptor;
        tracing::warn!(module = %desc.id, reason = %stub.reason, "optional module unavailable, committing stub values");

        let entries = Self::check_outputs(desc, stub.values.clone())?
            .into_iter()
            .map(|(decl, value)| (decl.path.clone(), stub.entry(decl, value)))
            .collect();
        Ok(registry.commit(&desc.id, entries)?)
    }

    /// Pairs every declared write with its proposed value. The key set must
    /// equal the declared writes exactly and every number must be finite.
    fn check_outputs(desc: &ModuleDescriptor, outputs: ModuleOutputs) -> Result<Vec<(&OutputDecl, ParamValue)>, PipelineError> {
        let missing: Vec<String> =
            desc.writes.iter().filter(|w| outputs.get(w.path.as_str()).is_none()).map(|w| w.path.to_string()).collect();
        let unexpected: Vec<String> = outputs.keys().filter(|k| desc.write_decl(k).is_none()).map(str::to_string).collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(PipelineError::OutputMismatch { module: desc.id.clone(), missing, unexpected });
        }

        let mut values = outputs.into_inner();
        let mut paired = Vec::with_capacity(desc.writes.len());
        for decl in &desc.writes {
            let Some(value) = values.remove(decl.path.as_str()) else {
                continue;
            };
            if !value.is_finite() {
                return Err(PipelineError::NonFiniteOutput { module: desc.id.clone(), path: decl.path.clone() });
            }
            paired.push((decl, value));
        }
        Ok(paired)
    }
}

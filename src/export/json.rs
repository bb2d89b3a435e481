//! The canonical JSON artifact.
use super::{ExportDocument, ExportError};

/// Pretty-printed, newline-terminated. Maps are ordered, so equal documents
/// render to identical bytes.
pub fn render(doc: &ExportDocument) -> Result<String, ExportError> {
    let mut out = serde_json::to_string_pretty(doc)?;
    out.push('\n');
    Ok(out)
}

pub fn parse(text: &str) -> Result<ExportDocument, ExportError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::document::tests::sample_document;
    use crate::store::{ParamPath, ParamValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_is_deterministic() {
        let doc = sample_document();
        assert_eq!(render(&doc).unwrap(), render(&sample_document()).unwrap());
    }

    #[test]
    fn test_document_survives_json() {
        let doc = sample_document();
        let back = parse(&render(&doc).unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_floats_survive_to_the_last_bit() {
        let m_h = ParamPath::parse("higgs.m_h").unwrap();
        let computed = 246.22 * (2.0f64 * 3.1347 / 24.3).sqrt();
        for x in [computed, 125.06424911700385, 0.1 + 0.2, 1.0 / 3.0, 3.91e34] {
            let mut doc = sample_document();
            doc.parameters.get_mut(&m_h).unwrap().value = ParamValue::Float(x);
            let back = parse(&render(&doc).unwrap()).unwrap();
            assert_eq!(back.parameters[&m_h].value.as_f64().map(f64::to_bits), Some(x.to_bits()));
            assert_eq!(back, doc);
        }
    }

    #[test]
    fn test_schema_field_names() {
        let text = render(&sample_document()).unwrap();
        assert!(text.contains("\"generated_at\": \"2026-01-02T03:04:05Z\""));
        assert!(text.contains("\"producedBy\": \"generations\""));
        assert!(text.contains("\"simulationFile\": \"generations\""));
        assert!(text.contains("\"classification\": \"NO_REFERENCE\""));
        assert!(text.contains("\"category\": \"GEOMETRIC\""));
    }
}

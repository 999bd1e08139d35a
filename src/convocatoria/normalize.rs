use super::{Convocatoria, FieldKind, FIELDS};
use crate::CrawlerError;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::warn;

/// Parses the JSON array returned by an extractor into records.
///
/// Anything other than an array of objects rejects the whole batch.
pub fn normalize_payload(payload: &str) -> Result<Vec<Convocatoria>, CrawlerError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| CrawlerError::MalformedPayload(format!("not valid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(CrawlerError::MalformedPayload(format!(
                "expected a JSON array, got {}",
                kind_of(&other)
            )))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(candidate) => Ok(normalize_candidate(candidate)),
            other => Err(CrawlerError::MalformedPayload(format!(
                "element {} is {}, expected an object",
                i,
                kind_of(other)
            ))),
        })
        .collect()
}

pub fn normalize_candidate(candidate: &Map<String, Value>) -> Convocatoria {
    let mut values = FIELDS.iter().map(|f| {
        let value = candidate.get(f.key).and_then(as_text);
        if let (FieldKind::Date, Some(date)) = (f.kind, value.as_deref()) {
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                warn!("{} is not an ISO date, kept as is: {:?}", f.key, date);
            }
        }
        value
    });
    let mut next = || values.next().flatten();

    Convocatoria {
        name: next(),
        open_date: next(),
        close_date: next(),
        language: next(),
        issuing_country: next(),
        link: next(),
        project_type: next(),
        eligibility: next(),
        benefits: next(),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_record_per_element_in_order() {
        let payload = r#"[
            {"nombre_de_la_convocatoria": "Beca X", "fecha_de_apertura": "2025-05-01"},
            {"nombre_de_la_convocatoria": "Premio Y", "beneficios": "10.000 USD", "extra": "ignored"},
            {}
        ]"#;

        let records = normalize_payload(payload).unwrap();
        assert_eq!(
            records,
            vec![
                Convocatoria {
                    name: Some("Beca X".to_string()),
                    open_date: Some("2025-05-01".to_string()),
                    ..Default::default()
                },
                Convocatoria {
                    name: Some("Premio Y".to_string()),
                    benefits: Some("10.000 USD".to_string()),
                    ..Default::default()
                },
                Convocatoria::default(),
            ]
        );
    }

    #[test]
    fn all_fields_are_read() {
        let payload = r#"[{
            "nombre_de_la_convocatoria": "Convocatoria Innovación",
            "fecha_de_apertura": "2025-01-10",
            "fecha_de_cierre": "2025-03-31",
            "idioma": "Español",
            "pais_que_convoca": "Colombia",
            "enlace_de_la_convocatoria": "https://www.fiducoldex.com.co/convocatoria",
            "tipo_de_proyecto_o_propuesta_que_se_puede_presentar": "Proyectos de innovación",
            "quienes_pueden_participar": "Pymes",
            "beneficios": "Cofinanciación"
        }]"#;

        let records = normalize_payload(payload).unwrap();
        assert_eq!(
            records,
            vec![Convocatoria {
                name: Some("Convocatoria Innovación".to_string()),
                open_date: Some("2025-01-10".to_string()),
                close_date: Some("2025-03-31".to_string()),
                language: Some("Español".to_string()),
                issuing_country: Some("Colombia".to_string()),
                link: Some("https://www.fiducoldex.com.co/convocatoria".to_string()),
                project_type: Some("Proyectos de innovación".to_string()),
                eligibility: Some("Pymes".to_string()),
                benefits: Some("Cofinanciación".to_string()),
            }]
        );
    }

    #[test]
    fn nulls_and_malformed_dates_pass_through() {
        let payload = r#"[{
            "nombre_de_la_convocatoria": null,
            "fecha_de_apertura": "1 de mayo de 2025",
            "fecha_de_cierre": "",
            "idioma": 42
        }]"#;

        let records = normalize_payload(payload).unwrap();
        assert_eq!(
            records,
            vec![Convocatoria {
                open_date: Some("1 de mayo de 2025".to_string()),
                close_date: Some(String::new()),
                language: Some("42".to_string()),
                ..Default::default()
            }]
        );
    }

    #[test]
    fn empty_array_is_empty_batch() {
        assert!(normalize_payload("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        for payload in [
            "not json",
            r#"{"nombre_de_la_convocatoria": "Beca X"}"#,
            r#"[{"nombre_de_la_convocatoria": "Beca X"}, "oops"]"#,
            "null",
            "",
        ] {
            assert!(
                matches!(
                    normalize_payload(payload),
                    Err(CrawlerError::MalformedPayload(_))
                ),
                "payload {:?} should be malformed",
                payload
            );
        }
    }
}

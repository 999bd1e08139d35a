mod data;
mod normalize;

pub use data::{ConvocatoriaData, ConvocatoriaTable};
pub use normalize::{normalize_candidate, normalize_payload};

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Date,
}

/// One column of the convocatoria table and the payload key the model fills it from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Field {
    pub key: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

const fn field(
    key: &'static str,
    column: &'static str,
    kind: FieldKind,
    description: &'static str,
) -> Field {
    Field {
        key,
        column,
        kind,
        description,
    }
}

pub const FIELDS: [Field; 9] = [
    field(
        "nombre_de_la_convocatoria",
        "name",
        FieldKind::Text,
        "Nombre de la convocatoria",
    ),
    field(
        "fecha_de_apertura",
        "open_date",
        FieldKind::Date,
        "Fecha de apertura en formato ISO",
    ),
    field(
        "fecha_de_cierre",
        "close_date",
        FieldKind::Date,
        "Fecha de cierre en formato ISO",
    ),
    field(
        "idioma",
        "language",
        FieldKind::Text,
        "Idioma en el que está la convocatoria",
    ),
    field(
        "pais_que_convoca",
        "issuing_country",
        FieldKind::Text,
        "País que organiza la convocatoria",
    ),
    field(
        "enlace_de_la_convocatoria",
        "link",
        FieldKind::Text,
        "Enlace directo o actual",
    ),
    field(
        "tipo_de_proyecto_o_propuesta_que_se_puede_presentar",
        "project_type",
        FieldKind::Text,
        "Tipo de proyecto aceptado",
    ),
    field(
        "quienes_pueden_participar",
        "eligibility",
        FieldKind::Text,
        "Criterios de elegibilidad",
    ),
    field(
        "beneficios",
        "benefits",
        FieldKind::Text,
        "Beneficios o premios que ofrece la convocatoria",
    ),
];

/// Extraction target handed to an [`crate::Extractor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub title: &'static str,
    pub fields: Vec<Field>,
}

impl SchemaDescription {
    /// JSON Schema of a single record, every property nullable.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for f in &self.fields {
            let mut string = json!({ "type": "string" });
            if f.kind == FieldKind::Date {
                string["format"] = json!("date");
            }
            properties.insert(
                f.key.to_string(),
                json!({
                    "anyOf": [string, { "type": "null" }],
                    "default": null,
                    "description": f.description,
                    "title": title_case(f.key),
                }),
            );
        }

        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
        })
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn schema() -> SchemaDescription {
    SchemaDescription {
        title: "Convocatoria",
        fields: FIELDS.to_vec(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Convocatoria {
    pub name: Option<String>,
    pub open_date: Option<String>,
    pub close_date: Option<String>,
    pub language: Option<String>,
    pub issuing_country: Option<String>,
    pub link: Option<String>,
    pub project_type: Option<String>,
    pub eligibility: Option<String>,
    pub benefits: Option<String>,
}

impl Convocatoria {
    /// Field values in [`FIELDS`] order.
    pub fn values(&self) -> [Option<&str>; 9] {
        [
            self.name.as_deref(),
            self.open_date.as_deref(),
            self.close_date.as_deref(),
            self.language.as_deref(),
            self.issuing_country.as_deref(),
            self.link.as_deref(),
            self.project_type.as_deref(),
            self.eligibility.as_deref(),
            self.benefits.as_deref(),
        ]
    }
}

impl fmt::Display for Convocatoria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = [
            "Name",
            "Open Date",
            "Close Date",
            "Language",
            "Country",
            "Link",
            "Project Type",
            "Eligibility",
            "Benefits",
        ];
        for (label, value) in labels.iter().zip(self.values()) {
            match value {
                Some(v) => writeln!(f, "{:<16}: {}", label, v.replace('\n', "\n  "))?,
                None => writeln!(f, "{:<16}: None", label)?,
            }
        }
        Ok(())
    }
}

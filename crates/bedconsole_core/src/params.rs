use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use engine_logging::engine_debug;
use serde::Serialize;

/// Top-level groups of the parameter document, in wizard order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Bed,
    Lids,
    Particles,
    Packing,
    Export,
    Cfd,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Bed,
        Section::Lids,
        Section::Particles,
        Section::Packing,
        Section::Export,
        Section::Cfd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Bed => "bed",
            Section::Lids => "lids",
            Section::Particles => "particles",
            Section::Packing => "packing",
            Section::Export => "export",
            Section::Cfd => "cfd",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Section::Bed => BED_FIELDS,
            Section::Lids => LID_FIELDS,
            Section::Particles => PARTICLE_FIELDS,
            Section::Packing => PACKING_FIELDS,
            Section::Export => EXPORT_FIELDS,
            Section::Cfd => CFD_FIELDS,
        }
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|spec| spec.name == name)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter section `{0}`")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

/// A single parameter value. Serializes to the plain JSON shape the backend expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Choice(String),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(value) => write!(f, "{value}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Choice(value) => f.write_str(value),
            FieldValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Declared domain of a field: decides both how raw text is coerced and which
/// coerced values are valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDomain {
    Number { min: f64, max: f64 },
    Integer { min: i64, max: i64 },
    Choice(&'static [&'static str]),
    Flag,
    ListOf(&'static [&'static str]),
}

impl FieldDomain {
    /// Parses raw input into a value of this domain's kind. Returns `None` when
    /// the text cannot be read as that kind at all.
    pub fn coerce(&self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        match self {
            FieldDomain::Number { .. } => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(FieldValue::Number),
            FieldDomain::Integer { .. } => raw.parse::<i64>().ok().map(FieldValue::Integer),
            FieldDomain::Choice(_) => {
                if raw.is_empty() {
                    None
                } else {
                    Some(FieldValue::Choice(raw.to_string()))
                }
            }
            FieldDomain::Flag => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Some(FieldValue::Flag(true)),
                "false" | "no" | "0" | "off" => Some(FieldValue::Flag(false)),
                _ => None,
            },
            FieldDomain::ListOf(_) => Some(FieldValue::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(ToOwned::to_owned)
                    .collect(),
            )),
        }
    }

    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        match (self, value) {
            (FieldDomain::Number { min, max }, FieldValue::Number(v)) => {
                if v < min || v > max {
                    Err(format!("{v} is outside [{min}, {max}]"))
                } else {
                    Ok(())
                }
            }
            (FieldDomain::Integer { min, max }, FieldValue::Integer(v)) => {
                if v < min || v > max {
                    Err(format!("{v} is outside [{min}, {max}]"))
                } else {
                    Ok(())
                }
            }
            (FieldDomain::Choice(allowed), FieldValue::Choice(v)) => {
                if allowed.contains(&v.as_str()) {
                    Ok(())
                } else {
                    Err(format!("`{v}` is not one of {}", allowed.join(", ")))
                }
            }
            (FieldDomain::Flag, FieldValue::Flag(_)) => Ok(()),
            (FieldDomain::ListOf(allowed), FieldValue::List(items)) => {
                if items.is_empty() {
                    return Err("at least one entry is required".to_string());
                }
                match items.iter().find(|item| !allowed.contains(&item.as_str())) {
                    Some(bad) => Err(format!("`{bad}` is not one of {}", allowed.join(", "))),
                    None => Ok(()),
                }
            }
            _ => Err(format!("value `{value}` has the wrong kind")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub domain: FieldDomain,
    /// Default as raw text, parsed through the same coercion as user input.
    pub default: &'static str,
}

const fn number(name: &'static str, min: f64, max: f64, default: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        domain: FieldDomain::Number { min, max },
        default,
    }
}

const fn integer(name: &'static str, min: i64, max: i64, default: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        domain: FieldDomain::Integer { min, max },
        default,
    }
}

const fn choice(
    name: &'static str,
    allowed: &'static [&'static str],
    default: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        domain: FieldDomain::Choice(allowed),
        default,
    }
}

const LID_TYPES: &[&str] = &["flat", "hemispherical", "none"];
const EXPORT_FORMATS: &[&str] = &["stl_binary", "stl_ascii", "obj", "blend", "glb", "fbx"];

const BED_FIELDS: &[FieldSpec] = &[
    number("diameter", 0.01, 2.0, "0.05"),
    number("height", 0.01, 5.0, "0.1"),
    number("wall_thickness", 0.0001, 0.1, "0.002"),
    number("clearance", 0.0, 1.0, "0.01"),
    choice("material", &["steel", "glass", "aluminum", "plastic"], "steel"),
    number("roughness", 0.0, 0.01, "0.0"),
];

const LID_FIELDS: &[FieldSpec] = &[
    choice("top_type", LID_TYPES, "flat"),
    choice("bottom_type", LID_TYPES, "flat"),
    number("top_thickness", 0.0001, 0.1, "0.003"),
    number("bottom_thickness", 0.0001, 0.1, "0.003"),
    number("seal_clearance", 0.0, 0.01, "0.001"),
];

const PARTICLE_FIELDS: &[FieldSpec] = &[
    choice("kind", &["sphere", "cube", "cylinder"], "sphere"),
    number("diameter", 0.0001, 0.5, "0.005"),
    integer("count", 1, 10_000, "100"),
    number("target_porosity", 0.1, 0.9, "0.4"),
    number("density", 1.0, 20_000.0, "2500.0"),
    number("mass", 0.0, 1000.0, "0.0"),
    number("restitution", 0.0, 1.0, "0.3"),
    number("friction", 0.0, 1.0, "0.5"),
    number("rolling_friction", 0.0, 1.0, "0.1"),
    number("linear_damping", 0.0, 1.0, "0.1"),
    number("angular_damping", 0.0, 1.0, "0.1"),
    integer("seed", 0, 2_147_483_647, "42"),
];

const PACKING_FIELDS: &[FieldSpec] = &[
    choice("method", &["rigid_body"], "rigid_body"),
    number("gravity", -50.0, 0.0, "-9.81"),
    integer("substeps", 1, 100, "10"),
    integer("iterations", 1, 100, "10"),
    number("damping", 0.0, 1.0, "0.1"),
    number("rest_velocity", 0.0, 1.0, "0.01"),
    number("max_time", 0.1, 60.0, "5.0"),
    number("collision_margin", 0.0, 0.01, "0.001"),
];

const EXPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "formats",
        domain: FieldDomain::ListOf(EXPORT_FORMATS),
        default: "stl_binary,blend",
    },
    choice("units", &["m", "cm", "mm"], "m"),
    number("scale", 0.001, 1000.0, "1.0"),
    choice("wall_mode", &["surface", "solid"], "surface"),
    choice("fluid_mode", &["none", "cavity"], "none"),
    FieldSpec {
        name: "manifold_check",
        domain: FieldDomain::Flag,
        default: "true",
    },
    number("merge_distance", 0.0, 0.1, "0.001"),
];

const CFD_FIELDS: &[FieldSpec] = &[
    choice("solver", &["simpleFoam", "pimpleFoam"], "simpleFoam"),
    choice("regime", &["laminar", "turbulent_rans"], "laminar"),
    choice("turbulence", &["kEpsilon", "kOmegaSST"], "kEpsilon"),
    number("inlet_velocity", 0.0, 10.0, "0.01"),
    number("fluid_density", 0.1, 20_000.0, "1000.0"),
    number("fluid_viscosity", 1e-6, 10.0, "0.001"),
    integer("max_iterations", 1, 100_000, "1000"),
    number("convergence", 1e-12, 1e-2, "1e-6"),
];

pub type SectionValues = BTreeMap<String, FieldValue>;

fn default_section(section: Section) -> SectionValues {
    section
        .fields()
        .iter()
        .filter_map(|spec| {
            spec.domain
                .coerce(spec.default)
                .map(|value| (spec.name.to_string(), value))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{section}.{field}: {reason}")]
pub struct ValidationError {
    pub section: Section,
    pub field: String,
    pub reason: String,
}

/// Immutable parameter snapshot handed to submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDocument {
    bed: SectionValues,
    lids: SectionValues,
    particles: SectionValues,
    packing: SectionValues,
    export: SectionValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    cfd: Option<SectionValues>,
}

impl Default for ParameterDocument {
    fn default() -> Self {
        Self {
            bed: default_section(Section::Bed),
            lids: default_section(Section::Lids),
            particles: default_section(Section::Particles),
            packing: default_section(Section::Packing),
            export: default_section(Section::Export),
            cfd: None,
        }
    }
}

impl ParameterDocument {
    pub fn section(&self, section: Section) -> Option<&SectionValues> {
        match section {
            Section::Bed => Some(&self.bed),
            Section::Lids => Some(&self.lids),
            Section::Particles => Some(&self.particles),
            Section::Packing => Some(&self.packing),
            Section::Export => Some(&self.export),
            Section::Cfd => self.cfd.as_ref(),
        }
    }

    fn section_mut(&mut self, section: Section) -> Option<&mut SectionValues> {
        match section {
            Section::Bed => Some(&mut self.bed),
            Section::Lids => Some(&mut self.lids),
            Section::Particles => Some(&mut self.particles),
            Section::Packing => Some(&mut self.packing),
            Section::Export => Some(&mut self.export),
            Section::Cfd => self.cfd.as_mut(),
        }
    }

    pub fn get(&self, section: Section, field: &str) -> Option<&FieldValue> {
        self.section(section).and_then(|values| values.get(field))
    }

    pub fn cfd(&self) -> Option<&SectionValues> {
        self.cfd.as_ref()
    }

    pub fn has_cfd(&self) -> bool {
        self.cfd.is_some()
    }

    /// Checks every present section against its declared domains.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        for section in Section::ALL {
            let Some(values) = self.section(section) else {
                continue;
            };
            for spec in section.fields() {
                let outcome = match values.get(spec.name) {
                    Some(value) => spec.domain.check(value),
                    None => Err("missing value".to_string()),
                };
                if let Err(reason) = outcome {
                    errors.push(ValidationError {
                        section,
                        field: spec.name.to_string(),
                        reason,
                    });
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Result of a single field edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Applied,
    /// Merged, but outside the declared domain; submission stays blocked until fixed.
    OutOfDomain { reason: String },
    /// Input could not be coerced; the previous value is kept.
    Retained,
}

/// Accumulates edits into the working document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterBuilder {
    document: ParameterDocument,
    // CFD edits survive toggling the section off and on again.
    stashed_cfd: Option<SectionValues>,
}

impl ParameterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, section: Section, field: &str, raw: &str) -> FieldEdit {
        let Some(spec) = section.field(field) else {
            engine_debug!("Ignoring edit of unknown field {}.{}", section, field);
            return FieldEdit::Retained;
        };
        let Some(value) = spec.domain.coerce(raw) else {
            engine_debug!(
                "Keeping previous value of {}.{}: cannot read {:?}",
                section,
                field,
                raw
            );
            return FieldEdit::Retained;
        };
        let Some(values) = self.document.section_mut(section) else {
            engine_debug!("Ignoring edit of {}.{}: section not included", section, field);
            return FieldEdit::Retained;
        };
        let outcome = match spec.domain.check(&value) {
            Ok(()) => FieldEdit::Applied,
            Err(reason) => FieldEdit::OutOfDomain { reason },
        };
        values.insert(spec.name.to_string(), value);
        outcome
    }

    pub fn set_include_cfd(&mut self, include: bool) {
        match (include, self.document.cfd.is_some()) {
            (true, false) => {
                let values = self
                    .stashed_cfd
                    .take()
                    .unwrap_or_else(|| default_section(Section::Cfd));
                self.document.cfd = Some(values);
            }
            (false, true) => {
                self.stashed_cfd = self.document.cfd.take();
            }
            _ => {}
        }
    }

    pub fn include_cfd(&self) -> bool {
        self.document.cfd.is_some()
    }

    pub fn document(&self) -> &ParameterDocument {
        &self.document
    }

    pub fn snapshot(&self) -> ParameterDocument {
        self.document.clone()
    }
}

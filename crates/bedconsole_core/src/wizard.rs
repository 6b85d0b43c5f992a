use crate::{FieldEdit, ParameterBuilder, ParameterDocument, PipelineMode, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ModeSelection,
    Bed,
    Lids,
    Particles,
    Packing,
    Export,
    Cfd,
    Confirmation,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::ModeSelection,
        Step::Bed,
        Step::Lids,
        Step::Particles,
        Step::Packing,
        Step::Export,
        Step::Cfd,
        Step::Confirmation,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Self::ALL.get(index).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::ModeSelection => "choose mode",
            Step::Bed => "bed geometry",
            Step::Lids => "lids",
            Step::Particles => "particles",
            Step::Packing => "packing",
            Step::Export => "export",
            Step::Cfd => "cfd (optional)",
            Step::Confirmation => "confirmation",
        }
    }

    pub fn section(self) -> Option<Section> {
        match self {
            Step::Bed => Some(Section::Bed),
            Step::Lids => Some(Section::Lids),
            Step::Particles => Some(Section::Particles),
            Step::Packing => Some(Section::Packing),
            Step::Export => Some(Section::Export),
            Step::Cfd => Some(Section::Cfd),
            Step::ModeSelection | Step::Confirmation => None,
        }
    }
}

const FIRST_SECTION: usize = Step::Bed as usize;
const OPTIONAL_STEP: usize = Step::Cfd as usize;
const LAST_STEP: usize = Step::Confirmation as usize;

/// Wizard session: current step, chosen mode and the parameters being edited.
///
/// Once a mode is chosen traversal is strictly sequential. The optional CFD
/// step is skipped in both directions unless the user opted into it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Wizard {
    step: usize,
    mode: Option<PipelineMode>,
    builder: ParameterBuilder,
}

impl Wizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn step(&self) -> Step {
        Step::from_index(self.step).unwrap_or(Step::ModeSelection)
    }

    pub fn mode(&self) -> Option<PipelineMode> {
        self.mode
    }

    pub fn include_optional_section(&self) -> bool {
        self.builder.include_cfd()
    }

    pub fn document(&self) -> &ParameterDocument {
        self.builder.document()
    }

    pub fn snapshot(&self) -> ParameterDocument {
        self.builder.snapshot()
    }

    pub fn at_confirmation(&self) -> bool {
        self.step == LAST_STEP
    }

    /// Only accepted on the mode selection step; moves on to the first section.
    pub fn select_mode(&mut self, mode: PipelineMode) -> bool {
        if self.step != 0 {
            return false;
        }
        self.mode = Some(mode);
        self.step = FIRST_SECTION;
        true
    }

    pub fn can_go_next(&self) -> bool {
        self.mode.is_some() && self.step >= FIRST_SECTION && self.step < LAST_STEP
    }

    pub fn can_go_prev(&self) -> bool {
        self.step > FIRST_SECTION
    }

    pub fn next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        let mut target = self.step + 1;
        if target == OPTIONAL_STEP && !self.include_optional_section() {
            target += 1;
        }
        self.step = target;
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.can_go_prev() {
            return false;
        }
        let mut target = self.step - 1;
        if target == OPTIONAL_STEP && !self.include_optional_section() {
            target -= 1;
        }
        self.step = target;
        true
    }

    pub fn set_field(&mut self, section: Section, field: &str, raw: &str) -> FieldEdit {
        self.builder.set_field(section, field, raw)
    }

    pub fn set_include_optional_section(&mut self, include: bool) {
        self.builder.set_include_cfd(include);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

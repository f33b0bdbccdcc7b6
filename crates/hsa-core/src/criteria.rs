use crate::{NumericRange, SearchCriteria};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaField {
    BedroomsMin,
    BedroomsMax,
    BathroomsMin,
    BathroomsMax,
    PriceMin,
    PriceMax,
    SquareFeetMin,
    SquareFeetMax,
}

impl CriteriaField {
    pub const ALL: [CriteriaField; 8] = [
        CriteriaField::BedroomsMin,
        CriteriaField::BedroomsMax,
        CriteriaField::BathroomsMin,
        CriteriaField::BathroomsMax,
        CriteriaField::PriceMin,
        CriteriaField::PriceMax,
        CriteriaField::SquareFeetMin,
        CriteriaField::SquareFeetMax,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CriteriaField::BedroomsMin => "Bedrooms (min)",
            CriteriaField::BedroomsMax => "Bedrooms (max)",
            CriteriaField::BathroomsMin => "Bathrooms (min)",
            CriteriaField::BathroomsMax => "Bathrooms (max)",
            CriteriaField::PriceMin => "Price (min)",
            CriteriaField::PriceMax => "Price (max)",
            CriteriaField::SquareFeetMin => "Square feet (min)",
            CriteriaField::SquareFeetMax => "Square feet (max)",
        }
    }

    pub fn step(self) -> f64 {
        match self {
            CriteriaField::BedroomsMin | CriteriaField::BedroomsMax => 1.0,
            CriteriaField::BathroomsMin | CriteriaField::BathroomsMax => 0.5,
            CriteriaField::PriceMin | CriteriaField::PriceMax => 10_000.0,
            CriteriaField::SquareFeetMin | CriteriaField::SquareFeetMax => 100.0,
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|field| *field == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|field| *field == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn get(self, criteria: &SearchCriteria) -> f64 {
        let (range, is_min) = self.range(criteria);
        if is_min {
            range.min
        } else {
            range.max
        }
    }

    pub fn set(self, criteria: &mut SearchCriteria, value: f64) {
        let is_min = self.is_min();
        let range = self.range_mut(criteria);
        if is_min {
            range.min = value;
        } else {
            range.max = value;
        }
    }

    fn is_min(self) -> bool {
        matches!(
            self,
            CriteriaField::BedroomsMin
                | CriteriaField::BathroomsMin
                | CriteriaField::PriceMin
                | CriteriaField::SquareFeetMin
        )
    }

    fn range(self, criteria: &SearchCriteria) -> (&NumericRange, bool) {
        let range = match self {
            CriteriaField::BedroomsMin | CriteriaField::BedroomsMax => &criteria.bedrooms,
            CriteriaField::BathroomsMin | CriteriaField::BathroomsMax => &criteria.bathrooms,
            CriteriaField::PriceMin | CriteriaField::PriceMax => &criteria.price_range,
            CriteriaField::SquareFeetMin | CriteriaField::SquareFeetMax => &criteria.square_feet,
        };
        (range, self.is_min())
    }

    fn range_mut(self, criteria: &mut SearchCriteria) -> &mut NumericRange {
        match self {
            CriteriaField::BedroomsMin | CriteriaField::BedroomsMax => &mut criteria.bedrooms,
            CriteriaField::BathroomsMin | CriteriaField::BathroomsMax => &mut criteria.bathrooms,
            CriteriaField::PriceMin | CriteriaField::PriceMax => &mut criteria.price_range,
            CriteriaField::SquareFeetMin | CriteriaField::SquareFeetMax => {
                &mut criteria.square_feet
            }
        }
    }
}

/// Local edit buffer for search criteria.
///
/// While editing, the buffer diverges from the synchronized criteria held by the
/// store. A failed save keeps the buffer and records an inline error; incoming
/// stream updates never touch the buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaEditor {
    buffer: Option<SearchCriteria>,
    field: Option<CriteriaField>,
    error: Option<String>,
    saving: bool,
}

impl CriteriaEditor {
    pub fn is_editing(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn buffer(&self) -> Option<&SearchCriteria> {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> Option<&mut SearchCriteria> {
        if self.saving {
            return None;
        }
        self.buffer.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn field(&self) -> Option<CriteriaField> {
        self.field
    }

    pub fn begin(&mut self, synced: &SearchCriteria) {
        if self.saving {
            return;
        }
        self.buffer = Some(synced.clone());
        self.field = Some(CriteriaField::BedroomsMin);
        self.error = None;
    }

    pub fn cancel(&mut self) {
        if self.saving {
            return;
        }
        self.buffer = None;
        self.field = None;
        self.error = None;
    }

    pub fn focus_next(&mut self) {
        if let Some(field) = self.field {
            self.field = Some(field.next());
        }
    }

    pub fn focus_prev(&mut self) {
        if let Some(field) = self.field {
            self.field = Some(field.prev());
        }
    }

    /// Moves the focused field by `steps` increments, never below zero.
    pub fn adjust(&mut self, steps: i32) {
        let Some(field) = self.field else {
            return;
        };
        let Some(buffer) = self.buffer_mut() else {
            return;
        };
        let next = field.get(buffer) + field.step() * f64::from(steps);
        field.set(buffer, next.max(0.0));
    }

    /// Marks a save as in flight and returns the snapshot to submit.
    pub fn start_save(&mut self) -> Option<SearchCriteria> {
        if self.saving {
            return None;
        }
        let snapshot = self.buffer.clone()?;
        self.saving = true;
        self.error = None;
        Some(snapshot)
    }

    /// Save landed: leave edit mode. The caller promotes the submitted snapshot.
    pub fn finish_save(&mut self) {
        self.saving = false;
        self.buffer = None;
        self.field = None;
        self.error = None;
    }

    /// Save failed: the buffer stays so the user can retry or cancel.
    pub fn fail_save(&mut self, message: impl Into<String>) {
        self.saving = false;
        self.error = Some(message.into());
    }
}

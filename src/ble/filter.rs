//! Advertisement filter.
//!
//! A [`Filter`] is an OR of [`FilterGroup`]s; each group combines its
//! criteria with AND or OR.  This expresses filters such as
//! `(name = "Foo*" AND service = "1812") OR (name = "Bar")`.
//!
//! Filters are plain configuration values: built once before scanning,
//! then copied into a scanner.  Builder calls that cannot be honoured log a
//! warning and leave the filter untouched.

use heapless::{String, Vec};

use crate::ble::adv_parser::{to_hex, uuid_to_hex, AdvertisementRecord, HEX_CAPACITY};
use crate::ble::pattern;
use crate::config::{MAX_CRITERIA_PER_GROUP, MAX_FILTER_GROUPS, MAX_PATTERN_LENGTH};
use crate::error::FilterError;

/// Advertisement field a criterion looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CriterionKind {
    /// Matched against the raw name bytes.
    LocalName,
    /// Matched against upper-case hex, on-air byte order.
    ManufacturerData,
    /// Matched against upper-case hex, most significant byte first.
    ServiceUuid,
    /// Matched against upper-case hex, most significant byte first.
    CharacteristicUuid,
}

/// How the criteria of one group are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterOperator {
    #[default]
    And,
    Or,
}

enum FieldValue<'a> {
    Raw(&'a [u8]),
    Hex(String<HEX_CAPACITY>),
}

impl FieldValue<'_> {
    fn as_bytes(&self) -> &[u8] {
        match self {
            FieldValue::Raw(bytes) => bytes,
            FieldValue::Hex(s) => s.as_bytes(),
        }
    }
}

fn field_value<'a>(record: &AdvertisementRecord<'a>, kind: CriterionKind) -> Option<FieldValue<'a>> {
    match kind {
        CriterionKind::LocalName => record.local_name.map(FieldValue::Raw),
        CriterionKind::ManufacturerData => {
            record.manufacturer_data.and_then(to_hex).map(FieldValue::Hex)
        }
        CriterionKind::ServiceUuid => record.service_uuid.and_then(uuid_to_hex).map(FieldValue::Hex),
        CriterionKind::CharacteristicUuid => record
            .characteristic_uuid
            .and_then(uuid_to_hex)
            .map(FieldValue::Hex),
    }
}

/// One typed pattern test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterCriterion {
    kind: CriterionKind,
    pattern: String<MAX_PATTERN_LENGTH>,
    enabled: bool,
}

impl FilterCriterion {
    pub fn new(kind: CriterionKind, pattern: &str) -> Result<Self, FilterError> {
        if !pattern::validate(pattern) {
            return Err(FilterError::InvalidPattern);
        }
        let mut stored = String::new();
        stored
            .push_str(pattern)
            .map_err(|_| FilterError::InvalidPattern)?;
        Ok(Self {
            kind,
            pattern: stored,
            enabled: true,
        })
    }

    pub fn kind(&self) -> CriterionKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// A disabled criterion, or one whose field is absent, never matches.
    pub fn matches(&self, record: &AdvertisementRecord<'_>) -> bool {
        if !self.enabled {
            return false;
        }
        field_value(record, self.kind)
            .map(|value| pattern::matches(value.as_bytes(), &self.pattern))
            .unwrap_or(false)
    }
}

/// Criteria combined with one operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterGroup {
    criteria: Vec<FilterCriterion, MAX_CRITERIA_PER_GROUP>,
    operator: FilterOperator,
    enabled: bool,
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterGroup {
    pub const fn new() -> Self {
        Self {
            criteria: Vec::new(),
            operator: FilterOperator::And,
            enabled: true,
        }
    }

    pub fn criteria(&self) -> &[FilterCriterion] {
        &self.criteria
    }

    pub fn criterion_mut(&mut self, index: usize) -> Option<&mut FilterCriterion> {
        self.criteria.get_mut(index)
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// A disabled or empty group never matches.
    pub fn matches(&self, record: &AdvertisementRecord<'_>) -> bool {
        if !self.enabled || self.criteria.is_empty() {
            return false;
        }
        match self.operator {
            FilterOperator::And => self.criteria.iter().all(|c| c.matches(record)),
            FilterOperator::Or => self.criteria.iter().any(|c| c.matches(record)),
        }
    }
}

/// Disjunction of filter groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    groups: Vec<FilterGroup, MAX_FILTER_GROUPS>,
    current_group: Option<usize>,
    active: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter {
    /// An empty filter: matches every advertisement.
    pub const fn new() -> Self {
        Self {
            groups: Vec::new(),
            current_group: None,
            active: true,
        }
    }

    /// Single-condition filter on the local name.
    pub fn local_name(pattern: &str) -> Result<Self, FilterError> {
        Self::single(CriterionKind::LocalName, pattern)
    }

    /// Single-condition filter on the manufacturer data hex.
    pub fn manufacturer_data(pattern: &str) -> Result<Self, FilterError> {
        Self::single(CriterionKind::ManufacturerData, pattern)
    }

    fn single(kind: CriterionKind, pattern: &str) -> Result<Self, FilterError> {
        let mut filter = Self::new();
        filter.add_group()?;
        filter.add_criterion(kind, pattern)?;
        Ok(filter)
    }

    /// Append a new group and make it current.
    pub fn add_group(&mut self) -> Result<usize, FilterError> {
        let index = self.groups.len();
        if self.groups.push(FilterGroup::new()).is_err() {
            warn!("Maximum number of filter groups reached");
            return Err(FilterError::TooManyGroups);
        }
        self.current_group = Some(index);
        info!("Added filter group {}", index);
        Ok(index)
    }

    /// Append a criterion to the current group.
    pub fn add_criterion(&mut self, kind: CriterionKind, pattern: &str) -> Result<(), FilterError> {
        let criterion = match FilterCriterion::new(kind, pattern) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid pattern syntax");
                return Err(e);
            }
        };
        let Some(index) = self.current_group else {
            warn!("No active group. Call add_group() first");
            return Err(FilterError::NoActiveGroup);
        };
        let group = &mut self.groups[index];
        if group.criteria.push(criterion).is_err() {
            warn!("Maximum criteria per group reached");
            return Err(FilterError::GroupFull);
        }
        info!("Added criterion to group {}", index);
        Ok(())
    }

    /// Set how the current group combines its criteria.
    pub fn set_group_operator(&mut self, operator: FilterOperator) -> Result<(), FilterError> {
        let Some(index) = self.current_group else {
            warn!("No active group");
            return Err(FilterError::NoActiveGroup);
        };
        self.groups[index].operator = operator;
        Ok(())
    }

    pub fn groups(&self) -> &[FilterGroup] {
        &self.groups
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut FilterGroup> {
        self.groups.get_mut(index)
    }

    pub fn set_group_enabled(&mut self, index: usize, enabled: bool) -> Result<(), FilterError> {
        let group = self.groups.get_mut(index).ok_or(FilterError::NoActiveGroup)?;
        group.set_enabled(enabled);
        Ok(())
    }

    /// An inactive filter lets everything through, like an empty one.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// At least one enabled group holds a criterion.
    pub fn is_valid(&self) -> bool {
        self.groups
            .iter()
            .any(|g| g.enabled && !g.criteria.is_empty())
    }

    pub fn matches(&self, record: &AdvertisementRecord<'_>) -> bool {
        if !self.active || self.groups.is_empty() {
            return true;
        }
        self.groups.iter().any(|g| g.matches(record))
    }

    /// Parse and match in one step.
    pub fn matches_raw(&self, data: &[u8]) -> bool {
        self.matches(&AdvertisementRecord::parse(data))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

//! Unified error type for bt-central.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging and `Display` for the `log` facade.

use core::fmt;

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Configuration
    /// A filter builder call was rejected; the filter is unchanged.
    Filter(FilterError),

    // Resources
    /// Every connection slot of the central is occupied.
    NoFreeSlot,

    /// The scanner or central registry has no vacant index.
    RegistryFull,

    /// The deferred-work queue cannot take another owner.
    QueueFull,

    // Lookup
    /// No slot, central or scanner matches the given address / handle / id.
    NotFound,

    // Radio
    /// The radio stack refused the request.
    Stack(StackError),
}

/// Reasons a filter builder call is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterError {
    /// Empty, too long, or containing characters outside `[A-Za-z0-9*?:\- ]`.
    InvalidPattern,
    /// `add_group()` has not been called yet.
    NoActiveGroup,
    /// The current group already holds the maximum number of criteria.
    GroupFull,
    /// The filter already holds the maximum number of groups.
    TooManyGroups,
}

/// Raw error code returned by the radio stack (negative errno style).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackError(pub i32);

// Convenience conversions

impl From<FilterError> for Error {
    fn from(e: FilterError) -> Self {
        Error::Filter(e)
    }
}

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Error::Stack(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Filter(e) => write!(f, "filter rejected: {}", e),
            Error::NoFreeSlot => f.write_str("no free connection slot"),
            Error::RegistryFull => f.write_str("registry full"),
            Error::QueueFull => f.write_str("work queue full"),
            Error::NotFound => f.write_str("not found"),
            Error::Stack(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterError::InvalidPattern => "invalid pattern",
            FilterError::NoActiveGroup => "no active group",
            FilterError::GroupFull => "group full",
            FilterError::TooManyGroups => "too many groups",
        })
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack error {}", self.0)
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

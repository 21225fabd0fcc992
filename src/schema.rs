//! On-demand schema validation seam.
//!
//! Validation is never part of the default parse or serialize path; a
//! caller that wants it supplies an implementation and invokes it
//! explicitly.

use crate::dom::Element;

pub trait SchemaValidator {
    /// Validates an element tree, returning the list of violations.
    fn validate(&self, element: &Element) -> Result<(), Vec<String>>;
}

//! Radio to link binding table
//!
//! The single owner of which radio is tuned to which link. Both directions
//! are indexed so lookups are O(1), and every mutation either fully applies
//! or leaves the table untouched.

use std::collections::HashMap;

use emlsr_types::{LinkId, RadioId};

use crate::error::CoordinatorError;

/// Bidirectional radio <-> link map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    by_radio: HashMap<RadioId, LinkId>,
    by_link: HashMap<LinkId, RadioId>,
}

impl BindingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `radio` to `link`
    ///
    /// Binding a pair that is already bound to each other is a no-op.
    pub fn bind(&mut self, radio: RadioId, link: LinkId) -> Result<(), CoordinatorError> {
        match (self.by_radio.get(&radio), self.by_link.get(&link)) {
            (Some(l), Some(r)) if *l == link && *r == radio => Ok(()),
            (None, None) => {
                self.by_radio.insert(radio, link);
                self.by_link.insert(link, radio);
                Ok(())
            }
            _ => Err(CoordinatorError::AlreadyBound { radio, link }),
        }
    }

    /// Release `radio`, returning the link it was bound to
    pub fn unbind(&mut self, radio: RadioId) -> Option<LinkId> {
        let link = self.by_radio.remove(&radio)?;
        self.by_link.remove(&link);
        Some(link)
    }

    /// Radio currently bound to `link`
    pub fn radio_for(&self, link: LinkId) -> Option<RadioId> {
        self.by_link.get(&link).copied()
    }

    /// Link currently bound to `radio`
    pub fn link_for(&self, radio: RadioId) -> Option<LinkId> {
        self.by_radio.get(&radio).copied()
    }

    /// Number of bound pairs
    pub fn len(&self) -> usize {
        self.by_radio.len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.by_radio.is_empty()
    }

    /// Bound pairs sorted by radio id
    pub fn pairs(&self) -> Vec<(RadioId, LinkId)> {
        let mut pairs: Vec<_> = self.by_radio.iter().map(|(r, l)| (*r, *l)).collect();
        pairs.sort();
        pairs
    }

    /// Check that both indexes describe the same one-to-one relation
    pub fn is_consistent(&self) -> bool {
        self.by_radio.len() == self.by_link.len()
            && self
                .by_radio
                .iter()
                .all(|(radio, link)| self.by_link.get(link) == Some(radio))
    }
}

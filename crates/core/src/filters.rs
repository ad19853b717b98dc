//! Filter values and the filter sidebar model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Filter keys understood by the listing endpoint.
pub mod keys {
    pub const FILE_TYPE: &str = "fileType";
    pub const OWNER_ID: &str = "ownerId";
    pub const CREATED_DATE_FROM: &str = "createdDateFrom";
    pub const CREATED_DATE_TO: &str = "createdDateTo";
    pub const MIN_SIZE: &str = "minSize";
    pub const MAX_SIZE: &str = "maxSize";
    pub const USAGE_LEVEL: &str = "usageLevel";
    pub const INACTIVE_OWNERS: &str = "inactiveOwners";
    pub const SHOW_ORPHANED: &str = "showOrphaned";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Flag(bool),
    Number(i64),
    Text(String),
    Null,
}

impl FilterValue {
    /// Empty text, null and `false` carry no constraint.
    pub fn is_active(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Null => false,
            Self::Flag(b) => *b,
            Self::Number(_) => true,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self { Self::Text(v.to_string()) }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self { Self::Text(v) }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self { Self::Flag(v) }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self { Self::Number(v) }
}

impl From<Option<i64>> for FilterValue {
    fn from(v: Option<i64>) -> Self { v.map(Self::Number).unwrap_or(Self::Null) }
}

pub type Filters = BTreeMap<String, FilterValue>;

/// Keep only active entries.
pub fn normalize_filters(filters: &Filters) -> Filters {
    filters.iter().filter(|(_, v)| v.is_active()).map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Editable state of the filter sidebar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterForm {
    pub search_term: String,
    pub file_type: String,
    pub owner_id: String,
    pub created_date_from: String,
    pub created_date_to: String,
    /// KB; converted to bytes server side.
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    pub usage_level: String,
    pub inactive_owners: bool,
}

impl FilterForm {
    /// Apply a raw input value to the named field. Size fields take an integer
    /// (blank clears them); `inactiveOwners` takes a boolean.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), CoreError> {
        let bad = || CoreError::FilterValue { key: key.to_string(), value: raw.to_string() };
        match key {
            keys::FILE_TYPE => self.file_type = raw.to_string(),
            keys::OWNER_ID => self.owner_id = raw.to_string(),
            keys::CREATED_DATE_FROM => self.created_date_from = raw.to_string(),
            keys::CREATED_DATE_TO => self.created_date_to = raw.to_string(),
            keys::USAGE_LEVEL => self.usage_level = raw.to_string(),
            keys::MIN_SIZE | keys::MAX_SIZE => {
                let v = if raw.trim().is_empty() { None } else { Some(raw.trim().parse::<i64>().map_err(|_| bad())?) };
                if key == keys::MIN_SIZE { self.min_size = v } else { self.max_size = v }
            }
            keys::INACTIVE_OWNERS => {
                self.inactive_owners = match raw.trim() {
                    "" | "false" | "0" | "off" => false,
                    "true" | "1" | "on" => true,
                    _ => return Err(bad()),
                }
            }
            _ => return Err(bad()),
        }
        Ok(())
    }

    /// Every field, active or not.
    pub fn to_filters(&self) -> Filters {
        let mut m = Filters::new();
        m.insert(keys::FILE_TYPE.into(), self.file_type.as_str().into());
        m.insert(keys::OWNER_ID.into(), self.owner_id.as_str().into());
        m.insert(keys::CREATED_DATE_FROM.into(), self.created_date_from.as_str().into());
        m.insert(keys::CREATED_DATE_TO.into(), self.created_date_to.as_str().into());
        m.insert(keys::MIN_SIZE.into(), self.min_size.into());
        m.insert(keys::MAX_SIZE.into(), self.max_size.into());
        m.insert(keys::USAGE_LEVEL.into(), self.usage_level.as_str().into());
        m.insert(keys::INACTIVE_OWNERS.into(), self.inactive_owners.into());
        m
    }

    pub fn active(&self) -> Filters { normalize_filters(&self.to_filters()) }

    pub fn has_active(&self) -> bool { !self.active().is_empty() || !self.search_term.is_empty() }

    pub fn clear(&mut self) { *self = Self::default(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_entries_are_dropped() {
        let mut f = Filters::new();
        f.insert("fileType".into(), "pdf".into());
        f.insert("minSize".into(), FilterValue::Null);
        f.insert("inactiveOwners".into(), false.into());
        let out = normalize_filters(&f);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("fileType"), Some(&FilterValue::Text("pdf".into())));
    }

    #[test]
    fn zero_and_true_stay_active() {
        let mut f = Filters::new();
        f.insert("minSize".into(), 0i64.into());
        f.insert("showOrphaned".into(), true.into());
        f.insert("ownerId".into(), "".into());
        let out = normalize_filters(&f);
        assert_eq!(out.keys().cloned().collect::<Vec<_>>(), vec!["minSize".to_string(), "showOrphaned".to_string()]);
    }

    #[test]
    fn wire_shape_is_plain_json() {
        let v: Filters = serde_json::from_value(serde_json::json!({
            "fileType": "pdf", "minSize": null, "inactiveOwners": false, "maxSize": 500
        }))
        .unwrap();
        assert_eq!(v.get("minSize"), Some(&FilterValue::Null));
        assert_eq!(v.get("maxSize"), Some(&FilterValue::Number(500)));
        let out = serde_json::to_value(normalize_filters(&v)).unwrap();
        assert_eq!(out, serde_json::json!({"fileType": "pdf", "maxSize": 500}));
    }

    #[test]
    fn form_parses_sizes_and_flags() {
        let mut form = FilterForm::default();
        form.set(keys::MIN_SIZE, "120").unwrap();
        form.set(keys::INACTIVE_OWNERS, "true").unwrap();
        form.set(keys::FILE_TYPE, "pdf").unwrap();
        assert!(form.set(keys::MAX_SIZE, "lots").is_err());
        assert!(form.set("colour", "red").is_err());
        let active = form.active();
        assert_eq!(active.len(), 3);
        assert_eq!(active.get(keys::MIN_SIZE), Some(&FilterValue::Number(120)));
        form.set(keys::MIN_SIZE, "").unwrap();
        assert_eq!(form.min_size, None);
    }

    #[test]
    fn form_activity_includes_search() {
        let mut form = FilterForm::default();
        assert!(!form.has_active());
        form.search_term = "invoice".into();
        assert!(form.has_active());
        form.clear();
        assert!(!form.has_active());
        assert_eq!(form.to_filters().len(), 8);
    }
}

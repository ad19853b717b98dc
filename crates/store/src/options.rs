//! Option lists and view rows derived from backend data.

use filex_core::{classify_url, with_placeholder, Connection, LinkTarget, PicklistOption, SortKey, UsageLevel, UserOption, PAGE_SIZE_OPTIONS};
use serde::{Deserialize, Serialize};

pub const ALL_TYPES: &str = "All Types";
pub const ALL_OWNERS: &str = "All Owners";
pub const SELECT_USER: &str = "Select a user...";

pub fn file_type_options(types: &[PicklistOption]) -> Vec<PicklistOption> { with_placeholder(ALL_TYPES, types) }

pub fn owner_options(owners: &[PicklistOption]) -> Vec<PicklistOption> { with_placeholder(ALL_OWNERS, owners) }

pub fn user_options(users: &[UserOption]) -> Vec<PicklistOption> {
    let opts: Vec<PicklistOption> = users.iter().map(|u| PicklistOption::new(u.label.clone(), u.id.clone())).collect();
    with_placeholder(SELECT_USER, &opts)
}

/// "All Files" followed by the four usage buckets.
pub fn usage_level_options() -> Vec<PicklistOption> {
    let levels = [UsageLevel::Orphaned, UsageLevel::LowUsage, UsageLevel::LightlyConnected, UsageLevel::HeavyUsage];
    let opts: Vec<PicklistOption> = levels.iter().map(|l| PicklistOption::new(l.filter_label(), l.as_str())).collect();
    with_placeholder(UsageLevel::Unknown.filter_label(), &opts)
}

pub fn sort_options() -> Vec<PicklistOption> {
    SortKey::ALL.iter().map(|k| PicklistOption::new(k.label(), k.as_str())).collect()
}

pub fn page_size_options() -> Vec<PicklistOption> {
    PAGE_SIZE_OPTIONS.iter().map(|n| PicklistOption::new(n.to_string(), n.to_string())).collect()
}

/// A connection as shown in the connections modal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionView {
    pub connection: Connection,
    pub share_label: String,
    /// `None` when the connection has no URL.
    pub link: Option<LinkTarget>,
}

pub fn connection_views(conns: Vec<Connection>, host: &str) -> Vec<ConnectionView> {
    conns
        .into_iter()
        .map(|c| {
            let link = c.url.as_deref().map(|u| classify_url(u, host));
            ConnectionView { share_label: c.share_type.label().to_string(), link, connection: c }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filex_core::ShareType;

    #[test]
    fn placeholders_lead_each_list() {
        let users = user_options(&[UserOption { id: "005A".into(), label: "Ada".into() }]);
        assert_eq!(users[0], PicklistOption::new(SELECT_USER, ""));
        assert_eq!(users[1], PicklistOption::new("Ada", "005A"));
        assert_eq!(file_type_options(&[])[0].label, ALL_TYPES);
        assert_eq!(owner_options(&[])[0].label, ALL_OWNERS);
        let usage = usage_level_options();
        assert_eq!(usage.len(), 5);
        assert_eq!(usage[0], PicklistOption::new("All Files", ""));
        assert_eq!(usage[1].value, "orphaned");
    }

    #[test]
    fn static_lists() {
        assert_eq!(sort_options().len(), 5);
        assert_eq!(sort_options()[4].value, "CreatedBy.Name");
        assert_eq!(page_size_options().iter().map(|o| o.value.as_str()).collect::<Vec<_>>(), vec!["25", "50", "100"]);
    }

    #[test]
    fn connections_get_labels_and_link_targets() {
        let conn = |url: Option<&str>, st: ShareType| Connection {
            linked_entity_id: "001A".into(),
            entity_name: "Acme".into(),
            entity_type: Some("Account".into()),
            share_type: st,
            visibility: None,
            url: url.map(str::to_string),
        };
        let views = connection_views(
            vec![
                conn(Some("/lightning/r/Account/001A/view"), ShareType::Inferred),
                conn(Some("https://elsewhere.example.com/x"), ShareType::Collaborator),
                conn(None, ShareType::Other("N".into())),
            ],
            "acme.my.salesforce.com",
        );
        assert_eq!(views[0].share_label, "Inferred");
        assert_eq!(views[0].link, Some(LinkTarget::Internal));
        assert_eq!(views[1].link, Some(LinkTarget::External));
        assert_eq!(views[2].share_label, "N");
        assert_eq!(views[2].link, None);
    }
}

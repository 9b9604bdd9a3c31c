//! Which channels are tickets and which authors may steer the assistant.

use std::collections::HashSet;

use {
    otis_common::types::{CategoryId, RoleId},
    otis_config::TicketsConfig,
};

/// True iff the channel sits in one of the configured ticket categories.
///
/// A channel with no category is never a ticket.
#[must_use]
pub fn is_eligible(category: Option<CategoryId>, ticket_categories: &HashSet<CategoryId>) -> bool {
    category.is_some_and(|id| ticket_categories.contains(&id))
}

/// Fixed eligibility configuration, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Eligibility {
    ticket_categories: HashSet<CategoryId>,
    control_roles: HashSet<RoleId>,
}

impl Eligibility {
    pub fn new(
        ticket_categories: impl IntoIterator<Item = CategoryId>,
        control_roles: impl IntoIterator<Item = RoleId>,
    ) -> Self {
        Self {
            ticket_categories: ticket_categories.into_iter().collect(),
            control_roles: control_roles.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &TicketsConfig) -> Self {
        Self::new(
            config.category_ids.iter().copied(),
            config.control_role_ids.iter().copied(),
        )
    }

    #[must_use]
    pub fn is_ticket(&self, category: Option<CategoryId>) -> bool {
        is_eligible(category, &self.ticket_categories)
    }

    /// True when any of the author's roles is an AI-control role.
    #[must_use]
    pub fn is_control(&self, roles: &[RoleId]) -> bool {
        roles.iter().any(|role| self.control_roles.contains(role))
    }
}

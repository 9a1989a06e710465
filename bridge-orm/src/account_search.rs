//! Account search filters.
//!
//! The participant/account search query is the main user of [`QueryBuilder`].
//! These helpers fix the HQL paths and parameter names that search uses, so the
//! DAO only has to pass the search values through.

use std::collections::BTreeSet;

use crate::query_builder::{MembershipFilter, QueryBuilder};

pub const DATA_GROUPS: &str = "elements(acct.dataGroups)";
pub const ROLES: &str = "acct.roles";
pub const STUDY_ID: &str = "enrollment.studyId";
pub const ORG_MEMBERSHIP: &str = "acct.orgMembership";
pub const WITHDRAWN_ON: &str = "withdrawnOn";

/// Account search filters layered on the generic [`QueryBuilder`] helpers.
pub trait AccountSearchFilters {
    /// Requires (`IN`) or excludes (`NOT IN`) every data group in the set.
    fn data_groups(&mut self, data_groups: Option<&BTreeSet<String>>, operator: &str) -> &mut Self;

    /// Administrative accounts are those with at least one role.
    fn admin_only(&mut self, is_admin: Option<bool>) -> &mut Self;

    /// Limits results to participants of `study_id` if the caller can access that study.
    fn enrolled_in_study(&mut self, caller_studies: &BTreeSet<String>, study_id: Option<&str>) -> &mut Self;

    /// Accounts in an organization, or in none with `<none>`.
    fn org_membership(&mut self, org_membership: Option<&str>) -> &mut Self;

    fn enrollment(&mut self, filter: Option<MembershipFilter>) -> &mut Self;
}

impl AccountSearchFilters for QueryBuilder {
    fn data_groups(&mut self, data_groups: Option<&BTreeSet<String>>, operator: &str) -> &mut Self {
        self.filter_by_set(data_groups.into_iter().flatten(), operator, DATA_GROUPS)
    }

    fn admin_only(&mut self, is_admin: Option<bool>) -> &mut Self {
        self.flag_filter(is_admin, ROLES)
    }

    fn enrolled_in_study(&mut self, caller_studies: &BTreeSet<String>, study_id: Option<&str>) -> &mut Self {
        self.restrict_to_allowed(study_id, caller_studies, STUDY_ID, "studies")
    }

    fn org_membership(&mut self, org_membership: Option<&str>) -> &mut Self {
        self.scoped_equality(org_membership, ORG_MEMBERSHIP, "orgId")
    }

    fn enrollment(&mut self, filter: Option<MembershipFilter>) -> &mut Self {
        self.membership_filter(filter, WITHDRAWN_ON)
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CaseId, CaseStatus, CaseType, FlagId, GoodId, GoodsExposure, OrganisationId, PartyId,
};

/// Classification review phase of a good. Some flagging rules only fire
/// once the classification has passed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoodStatus {
    Draft,
    Submitted,
    Query,
    Verified,
}

impl GoodStatus {
    pub const fn is_verified(self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// An assessed good attached to a standard-style case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodOnCase {
    pub id: GoodId,
    /// Control-list entry ratings, e.g. "ML1a".
    pub ratings: BTreeSet<String>,
    pub status: GoodStatus,
    pub flags: BTreeSet<FlagId>,
}

/// A goods-type record on an open-licence style case. Goods types carry
/// no verification phase, so verified-only rules match them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsTypeOnCase {
    pub id: GoodId,
    pub ratings: BTreeSet<String>,
    pub flags: BTreeSet<FlagId>,
}

/// A party (end user, consignee, third party) on a case. Soft-deleted
/// parties stay on the record for audit history but are invisible to
/// rule evaluation and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyOnCase {
    pub id: PartyId,
    pub country: String,
    pub flags: BTreeSet<FlagId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PartyOnCase {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A destination country record on an open-licence style case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryOnCase {
    pub country: String,
    pub flags: BTreeSet<FlagId>,
}

/// The exporting organisation, with its own flag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationOnCase {
    pub id: OrganisationId,
    pub name: String,
    pub flags: BTreeSet<FlagId>,
}

/// Aggregate root for one licence application or query under review.
///
/// Status must only be mutated through the service's guarded
/// `change_status`; everything else on the aggregate is owned data the
/// evaluator and aggregator traverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub reference: String,
    pub case_type: CaseType,
    pub status: CaseStatus,
    pub flags: BTreeSet<FlagId>,
    pub organisation: OrganisationOnCase,
    pub goods: Vec<GoodOnCase>,
    pub goods_types: Vec<GoodsTypeOnCase>,
    pub parties: Vec<PartyOnCase>,
    pub countries: Vec<CountryOnCase>,
}

impl Case {
    pub fn new(
        id: CaseId,
        reference: impl Into<String>,
        case_type: CaseType,
        organisation: OrganisationOnCase,
    ) -> Self {
        Self {
            id,
            reference: reference.into(),
            case_type,
            status: CaseStatus::Draft,
            flags: BTreeSet::new(),
            organisation,
            goods: Vec::new(),
            goods_types: Vec::new(),
            parties: Vec::new(),
            countries: Vec::new(),
        }
    }

    /// Goods reachable for this case's sub-type, as (ratings, verified,
    /// flag set) triples. Goods types report themselves as verified so
    /// the verified-only qualifier never filters them.
    pub(crate) fn exposed_goods_mut(
        &mut self,
    ) -> Vec<(&BTreeSet<String>, bool, &mut BTreeSet<FlagId>)> {
        match self.case_type.sub_type.goods_exposure() {
            GoodsExposure::Direct => self
                .goods
                .iter_mut()
                .map(|good| (&good.ratings, good.status.is_verified(), &mut good.flags))
                .collect(),
            GoodsExposure::GoodsTypes => self
                .goods_types
                .iter_mut()
                .map(|goods_type| (&goods_type.ratings, true, &mut goods_type.flags))
                .collect(),
            GoodsExposure::QueryGood => self
                .goods
                .iter_mut()
                .take(1)
                .map(|good| (&good.ratings, good.status.is_verified(), &mut good.flags))
                .collect(),
            GoodsExposure::None => Vec::new(),
        }
    }

    /// Flag sets of goods reachable for this case's sub-type.
    pub(crate) fn exposed_good_flags(&self) -> Vec<&BTreeSet<FlagId>> {
        match self.case_type.sub_type.goods_exposure() {
            GoodsExposure::Direct => self.goods.iter().map(|good| &good.flags).collect(),
            GoodsExposure::GoodsTypes => self
                .goods_types
                .iter()
                .map(|goods_type| &goods_type.flags)
                .collect(),
            GoodsExposure::QueryGood => {
                self.goods.iter().take(1).map(|good| &good.flags).collect()
            }
            GoodsExposure::None => Vec::new(),
        }
    }

    pub fn active_parties(&self) -> impl Iterator<Item = &PartyOnCase> {
        self.parties.iter().filter(|party| party.is_active())
    }

    pub(crate) fn active_parties_mut(&mut self) -> impl Iterator<Item = &mut PartyOnCase> {
        self.parties.iter_mut().filter(|party| party.is_active())
    }
}

//! Free-shipping policy

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::{CartLine, ItemType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeShippingPolicy {
    /// Total units across all lines that qualify the cart.
    pub min_items: u32,
    /// Whether a single combo line qualifies regardless of unit count.
    pub combo_qualifies: bool,
}

impl Default for FreeShippingPolicy {
    fn default() -> Self { Self { min_items: 2, combo_qualifies: true } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FreeShippingEvaluation {
    pub is_eligible: bool,
    pub remaining_items_for_eligibility: u32,
    pub has_qualifying_combo: bool,
}

impl FreeShippingEvaluation {
    pub fn ineligible(policy: &FreeShippingPolicy) -> Self {
        Self { is_eligible: false, remaining_items_for_eligibility: policy.min_items, has_qualifying_combo: false }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FreeShippingRule {
    policy: FreeShippingPolicy,
}

impl FreeShippingRule {
    pub fn new(policy: FreeShippingPolicy) -> Self { Self { policy } }
    pub fn policy(&self) -> &FreeShippingPolicy { &self.policy }

    pub fn evaluate(&self, lines: &[CartLine]) -> FreeShippingEvaluation {
        if lines.is_empty() { return FreeShippingEvaluation::ineligible(&self.policy); }
        let total: u32 = lines.iter().fold(0u32, |acc, l| acc.saturating_add(l.quantity));
        let has_qualifying_combo = self.policy.combo_qualifies && lines.iter().any(|l| l.item_type() == ItemType::Combo);
        FreeShippingEvaluation {
            is_eligible: total >= self.policy.min_items || has_qualifying_combo,
            remaining_items_for_eligibility: self.policy.min_items.saturating_sub(total),
            has_qualifying_combo,
        }
    }
}

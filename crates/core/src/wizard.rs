//! Campaign wizard value objects: goal, step navigation, and the per-step
//! form state for copy, audience and budget. Each step owns its own plain
//! struct; nothing here is shared across steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Campaign objective chosen in the first wizard step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CampaignGoal {
    Awareness,
    Engagement,
    Conversion,
    Retention,
    Lead,
}

impl CampaignGoal {
    pub const ALL: [CampaignGoal; 5] = [
        CampaignGoal::Awareness,
        CampaignGoal::Engagement,
        CampaignGoal::Conversion,
        CampaignGoal::Retention,
        CampaignGoal::Lead,
    ];

    /// Parse a goal label. Case and surrounding whitespace are ignored.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "awareness" => Some(CampaignGoal::Awareness),
            "engagement" => Some(CampaignGoal::Engagement),
            "conversion" => Some(CampaignGoal::Conversion),
            "retention" => Some(CampaignGoal::Retention),
            "lead" => Some(CampaignGoal::Lead),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignGoal::Awareness => "awareness",
            CampaignGoal::Engagement => "engagement",
            CampaignGoal::Conversion => "conversion",
            CampaignGoal::Retention => "retention",
            CampaignGoal::Lead => "lead",
        }
    }
}

impl fmt::Display for CampaignGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered wizard steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Goal,
    CopyMessaging,
    Audience,
    CreativeAssets,
    BudgetTesting,
}

impl WizardStep {
    pub fn next(self) -> Option<Self> {
        match self {
            WizardStep::Goal => Some(WizardStep::CopyMessaging),
            WizardStep::CopyMessaging => Some(WizardStep::Audience),
            WizardStep::Audience => Some(WizardStep::CreativeAssets),
            WizardStep::CreativeAssets => Some(WizardStep::BudgetTesting),
            WizardStep::BudgetTesting => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            WizardStep::Goal => None,
            WizardStep::CopyMessaging => Some(WizardStep::Goal),
            WizardStep::Audience => Some(WizardStep::CopyMessaging),
            WizardStep::CreativeAssets => Some(WizardStep::Audience),
            WizardStep::BudgetTesting => Some(WizardStep::CreativeAssets),
        }
    }
}

/// Flip `id` in a list-backed toggle set, keeping insertion order.
fn toggle(items: &mut Vec<String>, id: &str) -> bool {
    if let Some(pos) = items.iter().position(|item| item == id) {
        items.remove(pos);
        false
    } else {
        items.push(id.to_string());
        true
    }
}

/// Audience targeting step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudienceSelection {
    pub demographics: Vec<String>,
    pub interests: Vec<String>,
    pub age_min: u8,
    pub age_max: u8,
    pub locations: Vec<String>,
}

impl Default for AudienceSelection {
    fn default() -> Self {
        Self {
            demographics: Vec::new(),
            interests: Vec::new(),
            age_min: 25,
            age_max: 45,
            locations: vec!["United States".to_string()],
        }
    }
}

impl AudienceSelection {
    /// Returns whether the demographic is selected afterwards.
    pub fn toggle_demographic(&mut self, id: &str) -> bool {
        toggle(&mut self.demographics, id)
    }

    pub fn toggle_interest(&mut self, id: &str) -> bool {
        toggle(&mut self.interests, id)
    }

    pub fn toggle_location(&mut self, name: &str) -> bool {
        toggle(&mut self.locations, name)
    }

    /// Set the age bounds. Swapped bounds are normalized.
    pub fn set_age_range(&mut self, a: u8, b: u8) {
        self.age_min = a.min(b);
        self.age_max = a.max(b);
    }
}

/// Copy and messaging step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CopySelection {
    pub tone: String,
    pub selected_copies: Vec<u32>,
}

impl Default for CopySelection {
    fn default() -> Self {
        Self {
            tone: "energetic".to_string(),
            selected_copies: Vec::new(),
        }
    }
}

impl CopySelection {
    pub fn set_tone(&mut self, tone: impl Into<String>) {
        self.tone = tone.into();
    }

    pub fn toggle_copy(&mut self, id: u32) -> bool {
        if let Some(pos) = self.selected_copies.iter().position(|c| *c == id) {
            self.selected_copies.remove(pos);
            false
        } else {
            self.selected_copies.push(id);
            true
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Daily,
    Lifetime,
}

/// Budget and A/B testing step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetPlan {
    pub budget_type: BudgetType,
    pub amount: u64,
    pub duration_days: u32,
    pub tests: Vec<String>,
}

impl Default for BudgetPlan {
    fn default() -> Self {
        Self {
            budget_type: BudgetType::Daily,
            amount: 500,
            duration_days: 14,
            tests: vec!["creative".to_string(), "audience".to_string()],
        }
    }
}

impl BudgetPlan {
    pub fn toggle_test(&mut self, id: &str) -> bool {
        toggle(&mut self.tests, id)
    }

    /// Total campaign spend: daily budgets run for the whole duration,
    /// lifetime budgets are the total.
    pub fn total_spend(&self) -> u64 {
        match self.budget_type {
            BudgetType::Daily => self.amount.saturating_mul(u64::from(self.duration_days)),
            BudgetType::Lifetime => self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_parse() {
        assert_eq!(CampaignGoal::parse("conversion"), Some(CampaignGoal::Conversion));
        assert_eq!(CampaignGoal::parse("  Lead "), Some(CampaignGoal::Lead));
        assert_eq!(CampaignGoal::parse("virality"), None);
        for goal in CampaignGoal::ALL {
            assert_eq!(CampaignGoal::parse(goal.as_str()), Some(goal));
        }
    }

    #[test]
    fn test_step_navigation() {
        let mut step = WizardStep::Goal;
        let mut visited = vec![step];
        while let Some(next) = step.next() {
            step = next;
            visited.push(step);
        }
        assert_eq!(visited.len(), 5);
        assert_eq!(step, WizardStep::BudgetTesting);
        assert_eq!(step.previous(), Some(WizardStep::CreativeAssets));
        assert_eq!(WizardStep::Goal.previous(), None);
    }

    #[test]
    fn test_audience_toggles() {
        let mut audience = AudienceSelection::default();
        assert!(audience.toggle_interest("fitness"));
        assert!(audience.toggle_interest("running"));
        assert!(!audience.toggle_interest("fitness"));
        assert_eq!(audience.interests, vec!["running".to_string()]);

        assert!(!audience.toggle_location("United States"));
        assert!(audience.locations.is_empty());

        audience.set_age_range(50, 30);
        assert_eq!((audience.age_min, audience.age_max), (30, 50));
    }

    #[test]
    fn test_copy_toggles() {
        let mut copy = CopySelection::default();
        assert_eq!(copy.tone, "energetic");
        assert!(copy.toggle_copy(2));
        assert!(!copy.toggle_copy(2));
        assert!(copy.selected_copies.is_empty());
        copy.set_tone("urgent");
        assert_eq!(copy.tone, "urgent");
    }

    #[test]
    fn test_budget_total_spend() {
        let mut plan = BudgetPlan::default();
        assert_eq!(plan.total_spend(), 7_000);

        plan.budget_type = BudgetType::Lifetime;
        plan.amount = 2_500;
        assert_eq!(plan.total_spend(), 2_500);

        assert!(!plan.toggle_test("creative"));
        assert!(plan.toggle_test("messaging"));
        assert_eq!(plan.tests, vec!["audience".to_string(), "messaging".to_string()]);
    }

    #[test]
    fn test_daily_total_spend_saturates() {
        let plan = BudgetPlan {
            amount: u64::MAX / 2,
            duration_days: 30,
            ..BudgetPlan::default()
        };
        assert_eq!(plan.total_spend(), u64::MAX);
    }
}

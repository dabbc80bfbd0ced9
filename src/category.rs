//! The six fixed editorial categories of the digest.
//!
//! Order matters: `Category::ALL` is the display order and also the order in which
//! categories claim items during selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    BigAnnouncements,
    Engineering,
    ProductDevelopment,
    Business,
    UnderTheRadar,
    ForFun,
}

impl Category {
    /// Fixed display order.
    pub const ALL: [Category; 6] = [
        Category::BigAnnouncements,
        Category::Engineering,
        Category::ProductDevelopment,
        Category::Business,
        Category::UnderTheRadar,
        Category::ForFun,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Category::BigAnnouncements => "big-announcements",
            Category::Engineering => "engineering",
            Category::ProductDevelopment => "product-development",
            Category::Business => "business",
            Category::UnderTheRadar => "under-the-radar",
            Category::ForFun => "for-fun",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::BigAnnouncements => "Big Announcements",
            Category::Engineering => "Engineering",
            Category::ProductDevelopment => "Product Development",
            Category::Business => "Business",
            Category::UnderTheRadar => "Under the Radar",
            Category::ForFun => "For Fun",
        }
    }

    /// Short editorial angle used by the summarizer (prompt guidance and fallback copy).
    pub fn lens(self) -> &'static str {
        match self {
            Category::BigAnnouncements => "what changed and who it impacts",
            Category::Engineering => "practical engineering workflow impact",
            Category::ProductDevelopment => "product workflow and shipping velocity impact",
            Category::Business => "business model and monetization impact",
            Category::UnderTheRadar => "why this overlooked signal matters early",
            Category::ForFun => "why this is creative and interesting",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::BigAnnouncements => {
                "Major announcements, launches, policy moves, and high-signal market shifts."
            }
            Category::Engineering => {
                "How engineers use AI in daily workflows: agents, tooling, benchmarks."
            }
            Category::ProductDevelopment => {
                "How product teams ship faster with AI and redesign team workflows."
            }
            Category::Business => "Actionable workflows, playbooks, and implementation patterns.",
            Category::UnderTheRadar => "Small blogs, low-key launches, and overlooked ideas.",
            Category::ForFun => "Creative, weird, and playful AI experiments worth sharing.",
        }
    }

    /// Zero-based position in the display order.
    pub fn position(self) -> usize {
        Category::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or(Category::ALL.len())
    }

    pub fn from_slug(slug: &str) -> Option<Category> {
        let s = slug.trim().to_ascii_lowercase();
        Category::ALL.into_iter().find(|c| c.slug() == s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_slug(s).ok_or_else(|| format!("unknown category `{s}`"))
    }
}

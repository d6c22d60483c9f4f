/// Ordered (category, keywords) table. Order is part of the contract: when a
/// deal's text matches several categories, the earliest entry wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Home & Kitchen",
        &[
            "plate",
            "cup",
            "utensil",
            "cookware",
            "kitchen",
            "appliance",
            "vacuum",
            "fan",
            "light",
            "furniture",
            "paper towels",
        ],
    ),
    (
        "Electronics",
        &[
            "tv", "laptop", "computer", "monitor", "camera", "phone", "tablet", "headphone",
        ],
    ),
    (
        "Health & Beauty",
        &[
            "shampoo",
            "conditioner",
            "vitamin",
            "supplement",
            "medicine",
            "health",
            "beauty",
            "cosmetic",
        ],
    ),
    (
        "Grocery",
        &[
            "food", "snack", "drink", "beverage", "coffee", "tea", "water", "juice", "cereal",
            "candy",
        ],
    ),
    (
        "Clothing",
        &[
            "shirt", "pants", "dress", "shoe", "jacket", "sock", "underwear", "clothing",
            "apparel",
        ],
    ),
    ("Pet Supplies", &["pet", "dog", "cat", "animal", "treat", "toy"]),
    (
        "Office",
        &["paper", "pen", "pencil", "notebook", "office", "stationery"],
    ),
    ("Automotive", &["tire", "car", "auto", "vehicle", "automotive"]),
    (
        "Sports & Outdoors",
        &[
            "sport", "outdoor", "camping", "fishing", "hunting", "exercise", "fitness",
        ],
    ),
    ("Toys & Games", &["toy", "game", "play", "puzzle", "board game"]),
    ("Baby", &["baby", "infant", "diaper", "formula", "stroller"]),
    (
        "Lawn & Garden",
        &["garden", "lawn", "plant", "flower", "seed", "soil"],
    ),
];

const DEFAULT_CATEGORY: &str = "Other";

/// Keyword classifier over a deal's name + details. The table is fixed at
/// construction and handed to callers explicitly; nothing mutates it.
pub struct Classifier {
    table: &'static [(&'static str, &'static [&'static str])],
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            table: CATEGORY_KEYWORDS,
        }
    }

    pub fn classify(&self, name: &str, details: &str) -> &'static str {
        let text = format!("{} {}", name, details).to_lowercase();
        self.table
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
            .map(|(category, _)| *category)
            .unwrap_or(DEFAULT_CATEGORY)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

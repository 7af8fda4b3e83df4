//! Closed intent set and its retrieval bindings.
//!
//! Each intent carries its backend binding (collection, field projection) and
//! result-shape rule as data, looked up once per turn by the dispatcher
//! instead of re-branched in every stage.

use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Recipe,
    IngredientCategory,
    IngredientByName,
}

impl Intent {
    pub const ALL: [Intent; 3] = [
        Intent::Recipe,
        Intent::IngredientCategory,
        Intent::IngredientByName,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Recipe => "recipe",
            Intent::IngredientCategory => "ingredient-category",
            Intent::IngredientByName => "ingredient-by-name",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "recipe" => Some(Intent::Recipe),
            "ingredient-category" => Some(Intent::IngredientCategory),
            "ingredient-by-name" => Some(Intent::IngredientByName),
            _ => None,
        }
    }

    pub fn shape(&self) -> ResultShape {
        match self {
            Intent::Recipe => ResultShape::TitleToInstructions,
            Intent::IngredientCategory | Intent::IngredientByName => {
                ResultShape::NameToNutrition
            }
        }
    }
}

/// How retrieved records fold into the per-turn result map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Recipe title → instructions text.
    TitleToInstructions,
    /// Ingredient name → subset of nutrition fields present on the record.
    NameToNutrition,
}

impl ResultShape {
    /// The record field used as the map key. A record without it is skipped.
    pub fn key_field(&self) -> &'static str {
        match self {
            ResultShape::TitleToInstructions => "TRANSLATEDRECIPENAME",
            ResultShape::NameToNutrition => "NAME",
        }
    }
}

pub const RECIPE_FIELDS: &[&str] = &[
    "TRANSLATEDRECIPENAME",
    "TOTALTIMEINMINS",
    "CUISINE",
    "DIET",
    "TRANSLATEDINGREDIENTS",
    "TRANSLATEDINSTRUCTIONS",
];

pub const NUTRITION_FIELDS: &[&str] = &[
    "NAME",
    "CALORIES",
    "TOTAL_FAT",
    "CHOLESTEROL",
    "SODIUM",
    "VITAMIN_A",
    "VITAMIN_B12",
    "VITAMIN_B6",
    "VITAMIN_C",
    "VITAMIN_D",
    "VITAMIN_E",
    "VITAMIN_K",
    "CALCIUM",
    "IRON",
    "POTASSIUM",
    "PROTEIN",
    "CARBOHYDRATE",
    "CATEGORY",
];

/// One label as presented to the classification service: the few-shot
/// examples belong to the schema, not to the classifier component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSpec {
    pub label: String,
    pub description: String,
    pub examples: Vec<String>,
}

fn label_spec(label: &str, description: &str, examples: &[&str]) -> LabelSpec {
    LabelSpec {
        label: label.to_string(),
        description: description.to_string(),
        examples: examples.iter().map(|e| e.to_string()).collect(),
    }
}

/// The full label schema sent with every classification call.
pub fn label_schema() -> Vec<LabelSpec> {
    vec![
        label_spec(
            Intent::Recipe.label(),
            "Queries about cooking or preparing specific dishes or meals",
            &[
                "How do I bake a chocolate cake?",
                "Give me a recipe for lasagna",
                "What are the steps to make sushi?",
            ],
        ),
        label_spec(
            Intent::IngredientCategory.label(),
            "Queries about classes of food items, their properties, or dietary suitability",
            &[
                "What is a high protein source?",
                "If I am diabetic what foods should I avoid?",
                "Which vegetables are rich in iron?",
            ],
        ),
        label_spec(
            Intent::IngredientByName.label(),
            "Queries about a specific named food item and its nutritional facts",
            &[
                "What are the nutritional facts of oranges per 100g?",
                "How much protein is in paneer?",
            ],
        ),
    ]
}

/// Retrieval binding for one intent: collection handle plus field projection.
#[derive(Debug, Clone)]
pub struct IntentBinding {
    pub collection: String,
    pub fields: &'static [&'static str],
    pub shape: ResultShape,
}

/// Intent → binding table, built once from config so that label, projection,
/// and result shape stay in sync by construction.
#[derive(Debug, Clone)]
pub struct BindingTable {
    recipe: IntentBinding,
    ingredient_category: IntentBinding,
    ingredient_by_name: IntentBinding,
}

impl BindingTable {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            recipe: IntentBinding {
                collection: config.retrieval.recipes_collection.clone(),
                fields: RECIPE_FIELDS,
                shape: ResultShape::TitleToInstructions,
            },
            ingredient_category: IntentBinding {
                collection: config.retrieval.nutrition_collection.clone(),
                fields: NUTRITION_FIELDS,
                shape: ResultShape::NameToNutrition,
            },
            ingredient_by_name: IntentBinding {
                collection: config.retrieval.nutrition_collection.clone(),
                fields: NUTRITION_FIELDS,
                shape: ResultShape::NameToNutrition,
            },
        }
    }

    /// Look up the binding for an intent. `None` means the intent is unbound
    /// (empty collection handle); callers treat that as "no context", the
    /// configuration error itself is reported by `RouterConfig::validate`.
    pub fn get(&self, intent: Intent) -> Option<&IntentBinding> {
        let binding = match intent {
            Intent::Recipe => &self.recipe,
            Intent::IngredientCategory => &self.ingredient_category,
            Intent::IngredientByName => &self.ingredient_by_name,
        };
        if binding.collection.trim().is_empty() {
            None
        } else {
            Some(binding)
        }
    }
}

//! # SousChef Recipes
//!
//! The recipe artifact format: a block of structured markup with a title
//! marker and eight labeled sections, each tagged with a machine-readable
//! `data-recipe` attribute. This crate is the single source of truth for
//! that format — the context assembler's formatting instructions embed
//! [`format_template`], and the parser here consumes exactly what the
//! template describes, so the two cannot drift apart.
//!
//! Parsing is a single pass: content is split once into a section-keyed
//! sequence keyed by the `data-recipe` attribute, and every accessor reads
//! from that scan.

use serde::{Deserialize, Serialize};

/// The marker that identifies recipe content. The most recent assistant
/// message containing this marker is a conversation's "current recipe".
pub const TITLE_MARKER: &str = "<h2 data-recipe=\"title\">";

const ATTR: &str = "data-recipe=\"";

/// Metadata fields carried in the single-line sections of an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeMetadata {
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
    pub prep_time: Option<String>,
    pub servings: Option<String>,
}

/// The list-valued sections of an artifact. Absent sections yield empty
/// lists rather than errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLists {
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub tips: Vec<String>,
}

/// A parsed artifact: the section-keyed view of one assistant message.
#[derive(Debug, Clone)]
pub struct RecipeArtifact {
    /// `(section name, raw section text)` in document order. Each slice
    /// starts at the section's opening tag and runs to the next tag (the
    /// last section runs to end of content).
    sections: Vec<(String, String)>,
}

impl RecipeArtifact {
    /// Scan `content` once into its tagged sections.
    ///
    /// Content without any `data-recipe` attribute parses to an artifact
    /// with no sections; accessors then return `None`/empty.
    pub fn parse(content: &str) -> Self {
        let mut starts: Vec<(usize, String)> = Vec::new();

        let mut from = 0;
        while let Some(rel) = content[from..].find(ATTR) {
            let attr_at = from + rel;
            let name_start = attr_at + ATTR.len();
            let Some(name_len) = content[name_start..].find('"') else {
                break;
            };
            let name = content[name_start..name_start + name_len].to_string();
            // The section starts at the tag's opening '<', not the attribute.
            let tag_start = content[..attr_at].rfind('<').unwrap_or(attr_at);
            starts.push((tag_start, name));
            from = name_start + name_len;
        }

        let mut sections = Vec::with_capacity(starts.len());
        for (i, (start, name)) in starts.iter().enumerate() {
            let end = starts
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(content.len());
            sections.push((name.clone(), content[*start..end].to_string()));
        }

        Self { sections }
    }

    /// Whether the content carried a title marker at all.
    pub fn has_title(&self) -> bool {
        self.section("title").is_some()
    }

    /// The recipe name: the inner text of the title heading, trimmed.
    pub fn title(&self) -> Option<String> {
        let section = self.section("title")?;
        let inner_start = section.find('>')? + 1;
        let rest = &section[inner_start..];
        let inner = match rest.find('<') {
            Some(close) => &rest[..close],
            None => rest.lines().next().unwrap_or(rest),
        };
        let title = inner.trim();
        if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        }
    }

    /// Single-line metadata: the line following each section's heading.
    pub fn metadata(&self) -> RecipeMetadata {
        RecipeMetadata {
            difficulty: self.value_line("difficulty"),
            cuisine: self.value_line("cuisine"),
            prep_time: self.value_line("prep-time"),
            servings: self.value_line("servings"),
        }
    }

    /// List sections: every non-empty, non-markup line between the
    /// section's markers.
    pub fn lists(&self) -> RecipeLists {
        RecipeLists {
            ingredients: self.items("ingredients"),
            instructions: self.items("instructions"),
            tips: self.items("tips"),
        }
    }

    fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    fn value_line(&self, name: &str) -> Option<String> {
        let section = self.section(name)?;
        let value = section.lines().nth(1)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn items(&self, name: &str) -> Vec<String> {
        let Some(section) = self.section(name) else {
            return Vec::new();
        };
        section
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('<'))
            .map(String::from)
            .collect()
    }
}

/// Whether assistant content contains a recipe artifact.
pub fn contains_recipe(content: &str) -> bool {
    content.contains(TITLE_MARKER)
}

/// The canonical eight-section markup skeleton. The context assembler's
/// formatting instructions embed this verbatim, and [`RecipeArtifact`]
/// parses exactly this shape.
pub fn format_template() -> &'static str {
    r#"<h2 data-recipe="title">🍳 [Recipe Name]</h2>

<h3 data-recipe="difficulty">⚡ Difficulty</h3>
[Easy/Medium/Hard]

<h3 data-recipe="cuisine">🌍 Cuisine Type</h3>
[Type of cuisine e.g. Italian, Mexican, Japanese, etc.]

<h3 data-recipe="prep-time">⏲️ Preparation Time</h3>
[Prep time details]

<h3 data-recipe="servings">👥 Servings</h3>
[Number of servings]

<h3 data-recipe="ingredients">📝 Ingredients</h3>
<ul>
[List ingredients with measurements]
</ul>

<h3 data-recipe="instructions">📋 Instructions</h3>
<ol>
[Numbered steps for cooking]
</ol>

<h3 data-recipe="tips">💡 Tips</h3>
<ul>
[Optional cooking tips and variations]
</ul>"#
}

/// Flatten an artifact into the text the recommendation subsystem embeds.
///
/// Absent sections are rendered empty; the field order is fixed so
/// embeddings stay comparable across recipes.
pub fn embedding_text(content: &str) -> String {
    let artifact = RecipeArtifact::parse(content);
    let meta = artifact.metadata();
    let lists = artifact.lists();

    format!(
        "Title: {}\nCuisine: {}\nDifficulty: {}\nIngredients: {}\nInstructions: {}\nTips: {}",
        artifact.title().unwrap_or_default(),
        meta.cuisine.unwrap_or_default(),
        meta.difficulty.unwrap_or_default(),
        lists.ingredients.join(", "),
        lists.instructions.join(" "),
        lists.tips.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe() -> String {
        r#"Here is your recipe!

<h2 data-recipe="title">🍳 Chocolate Chip Cookies</h2>

<h3 data-recipe="difficulty">⚡ Difficulty</h3>
Easy

<h3 data-recipe="cuisine">🌍 Cuisine Type</h3>
American

<h3 data-recipe="prep-time">⏲️ Preparation Time</h3>
25 minutes

<h3 data-recipe="servings">👥 Servings</h3>
24 cookies

<h3 data-recipe="ingredients">📝 Ingredients</h3>
<ul>
2 cups flour
1 cup butter
1 cup chocolate chips
</ul>

<h3 data-recipe="instructions">📋 Instructions</h3>
<ol>
Cream the butter and sugar
Fold in the flour
Bake at 190C for 10 minutes
</ol>

<h3 data-recipe="tips">💡 Tips</h3>
<ul>
Chill the dough for chewier cookies
</ul>"#
            .to_string()
    }

    #[test]
    fn detects_title_marker() {
        assert!(contains_recipe(&sample_recipe()));
        assert!(!contains_recipe("Just a chat message about cooking"));
    }

    #[test]
    fn extracts_title() {
        let artifact = RecipeArtifact::parse(&sample_recipe());
        assert_eq!(artifact.title().as_deref(), Some("🍳 Chocolate Chip Cookies"));
    }

    #[test]
    fn extracts_metadata() {
        let meta = RecipeArtifact::parse(&sample_recipe()).metadata();
        assert_eq!(meta.difficulty.as_deref(), Some("Easy"));
        assert_eq!(meta.cuisine.as_deref(), Some("American"));
        assert_eq!(meta.prep_time.as_deref(), Some("25 minutes"));
        assert_eq!(meta.servings.as_deref(), Some("24 cookies"));
    }

    #[test]
    fn round_trips_lists_verbatim() {
        let lists = RecipeArtifact::parse(&sample_recipe()).lists();
        assert_eq!(
            lists.ingredients,
            vec!["2 cups flour", "1 cup butter", "1 cup chocolate chips"]
        );
        assert_eq!(
            lists.instructions,
            vec![
                "Cream the butter and sugar",
                "Fold in the flour",
                "Bake at 190C for 10 minutes"
            ]
        );
        assert_eq!(lists.tips, vec!["Chill the dough for chewier cookies"]);
    }

    #[test]
    fn absent_sections_yield_empty_values() {
        let content = "<h2 data-recipe=\"title\">🍳 Toast</h2>\nThat's it.";
        let artifact = RecipeArtifact::parse(content);
        assert!(artifact.has_title());
        assert_eq!(artifact.metadata(), RecipeMetadata::default());
        let lists = artifact.lists();
        assert!(lists.ingredients.is_empty());
        assert!(lists.instructions.is_empty());
        assert!(lists.tips.is_empty());
    }

    #[test]
    fn non_recipe_content_parses_to_nothing() {
        let artifact = RecipeArtifact::parse("No markup at all here.");
        assert!(!artifact.has_title());
        assert!(artifact.title().is_none());
    }

    #[test]
    fn tips_section_runs_to_end_of_content() {
        // Tips is the last section; its body has no closing marker after it.
        let lists = RecipeArtifact::parse(&sample_recipe()).lists();
        assert_eq!(lists.tips.len(), 1);
    }

    #[test]
    fn template_parses_with_its_own_scanner() {
        let artifact = RecipeArtifact::parse(format_template());
        assert!(artifact.has_title());
        // All eight sections present, in order.
        let names: Vec<&str> = [
            "title",
            "difficulty",
            "cuisine",
            "prep-time",
            "servings",
            "ingredients",
            "instructions",
            "tips",
        ]
        .to_vec();
        for name in names {
            assert!(
                format_template().contains(&format!("data-recipe=\"{name}\"")),
                "template missing section {name}"
            );
        }
    }

    #[test]
    fn embedding_text_flattens_fixed_field_order() {
        let text = embedding_text(&sample_recipe());
        assert!(text.starts_with("Title: 🍳 Chocolate Chip Cookies"));
        assert!(text.contains("Cuisine: American"));
        assert!(text.contains("Ingredients: 2 cups flour, 1 cup butter"));
        assert!(text.contains("Instructions: Cream the butter and sugar Fold in the flour"));
    }

    #[test]
    fn embedding_text_of_plain_content_is_empty_fields() {
        let text = embedding_text("nothing structured");
        assert!(text.starts_with("Title: \n"));
    }

    #[test]
    fn metadata_types_serialize() {
        let meta = RecipeMetadata {
            difficulty: Some("Easy".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("Easy"));
    }
}

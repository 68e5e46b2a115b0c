//! SS14 game-data extraction
//!
//! Parses reagent and reaction prototypes (YAML lists) plus Fluent locale
//! files from a Space Station 14 checkout and fills the database. Reagent
//! names and descriptions are locale keys; they are resolved here, at
//! extraction time, so planning commands never touch the game tree.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use walkdir::WalkDir;

use serde_yaml::Value;

use crate::calculator::fmt_amount;
use crate::db;
use crate::models::{Reactant, Reaction, Reagent, ReagentEffect};

#[derive(Debug, Deserialize)]
struct ReagentProto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    /// Abstract prototypes are templates other reagents inherit from;
    /// nothing craftable, so they are skipped
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default, rename = "worksOnTheDead")]
    works_on_the_dead: bool,
    /// Metabolism-group name to its effects
    #[serde(default)]
    metabolisms: Option<BTreeMap<String, MetabolismProto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetabolismProto {
    #[serde(default = "default_metabolism_rate")]
    metabolism_rate: f64,
    /// Effects stay raw `Value`s: each carries a `!type:` tag naming the
    /// effect and an open-ended body we only summarize
    #[serde(default)]
    effects: Vec<Value>,
}

// the game's default when a prototype does not override it
fn default_metabolism_rate() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionProto {
    id: String,
    #[serde(default)]
    min_temp: f64,
    #[serde(default)]
    required_mixer_categories: Option<Vec<String>>,
    #[serde(default)]
    reactants: BTreeMap<String, ReactantProto>,
    /// Absent for reactions that only spawn entities or effects
    #[serde(default)]
    products: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct ReactantProto {
    amount: f64,
    #[serde(default)]
    catalyst: bool,
}

/// Find all .yml prototype files under a directory
fn find_yaml_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "yml"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Parse one prototype file into the entries of the wanted `type`.
///
/// SS14 prototype files are YAML lists mixing several prototype kinds and
/// carrying `!type:` tags in fields we do not care about, so each entry is
/// decoded individually; entries of other kinds are ignored and entries of
/// the wanted kind that fail to decode are reported.
fn parse_prototypes<T: serde::de::DeserializeOwned>(
    content: &str,
    kind: &str,
) -> Result<(Vec<T>, usize)> {
    let entries: Vec<serde_yaml::Value> =
        serde_yaml::from_str(content.trim()).context("not a YAML prototype list")?;

    let mut parsed = Vec::new();
    let mut errors = 0;
    for entry in entries {
        let is_kind = entry.get("type").and_then(|t| t.as_str()) == Some(kind);
        if !is_kind {
            continue;
        }
        match serde_yaml::from_value::<T>(entry) {
            Ok(proto) => parsed.push(proto),
            Err(_) => errors += 1,
        }
    }
    Ok((parsed, errors))
}

/// Parse Fluent locale lines (`key = value`) into `out`. Indented
/// attribute lines and comments do not match and are skipped.
fn parse_locale(content: &str, line_re: &Regex, out: &mut HashMap<String, String>) {
    for line in content.lines() {
        if let Some(cap) = line_re.captures(line) {
            out.insert(cap[1].to_string(), cap[2].to_string());
        }
    }
}

/// Load every .ftl file under the locale directory
fn load_locale(locale_dir: &Path) -> Result<HashMap<String, String>> {
    // one compile for the whole tree, not one per file
    let line_re = Regex::new(r"^(\S+)\s+=\s+(.+)$")?;
    let mut locale = HashMap::new();
    for entry in WalkDir::new(locale_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "ftl") {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_locale(&content, &line_re, &mut locale);
        }
    }
    Ok(locale)
}

fn localize(locale: &HashMap<String, String>, key: Option<String>) -> Option<String> {
    // unknown keys fall back to the key itself, never abort
    key.map(|k| locale.get(&k).cloned().unwrap_or(k))
}

/// Split a tagged YAML value into its `!type:` name and body. Untagged
/// values (malformed prototypes) summarize as `Unknown`.
fn tag_and_body(value: &Value) -> (String, &Value) {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let kind = tag.trim_start_matches('!').trim_start_matches("type:");
            (kind.to_string(), &tagged.value)
        }
        other => ("Unknown".to_string(), other),
    }
}

/// Summarize one metabolism group into effect rows for the database
fn effect_rows(
    reagent_id: &str,
    group: &str,
    metabolism: &MetabolismProto,
) -> Vec<ReagentEffect> {
    metabolism
        .effects
        .iter()
        .map(|effect| {
            let (kind, body) = tag_and_body(effect);
            let conditions = body.get("conditions").and_then(Value::as_sequence).map(|seq| {
                seq.iter().map(describe_condition).collect::<Vec<_>>().join(", ")
            });
            ReagentEffect {
                reagent_id: reagent_id.to_string(),
                group: group.to_string(),
                kind,
                rate: metabolism.metabolism_rate,
                probability: body.get("probability").and_then(Value::as_f64).unwrap_or(1.0),
                conditions,
            }
        })
        .collect()
}

/// Render an effect condition. Reagent thresholds (the overwhelmingly
/// common kind, overdose limits included) become amount ranges; anything
/// else keeps its bare type name.
fn describe_condition(condition: &Value) -> String {
    let (kind, body) = tag_and_body(condition);
    if kind == "ReagentThreshold" {
        let min = body.get("min").and_then(Value::as_f64);
        let max = body.get("max").and_then(Value::as_f64);
        let subject = body.get("reagent").and_then(Value::as_str);
        if let Some(range) = threshold_string(min, max, subject) {
            return range;
        }
    }
    kind
}

fn threshold_string(min: Option<f64>, max: Option<f64>, subject: Option<&str>) -> Option<String> {
    let of = subject.map(|s| format!(" of {s}")).unwrap_or_default();
    match (min, max) {
        (Some(min), Some(max)) => Some(format!(
            "between {}u and {}u{}",
            fmt_amount(min),
            fmt_amount(max),
            of
        )),
        (Some(min), None) => Some(format!("at least {}u{}", fmt_amount(min), of)),
        (None, Some(max)) => Some(format!("less than {}u{}", fmt_amount(max), of)),
        (None, None) => None,
    }
}

/// Extract reagents, reactions, and locale strings from a game checkout
/// and populate the database
pub fn extract_to_database(conn: &Connection, game_dir: &Path) -> Result<ExtractStats> {
    let prototypes_dir = game_dir.join("Resources").join("Prototypes");
    if !prototypes_dir.is_dir() {
        bail!(
            "{} has no Resources/Prototypes directory - not an SS14 checkout?",
            game_dir.display()
        );
    }
    let reagents_dir = prototypes_dir.join("Reagents");
    let reactions_dir = prototypes_dir.join("Recipes").join("Reactions");
    let locale_dir = game_dir.join("Resources").join("Locale").join("en-US");

    let mut stats = ExtractStats::default();

    println!("Loading locale strings from {}...", locale_dir.display());
    let locale = load_locale(&locale_dir)?;
    stats.locale_strings = locale.len();

    println!("Scanning {} for reagent prototypes...", reagents_dir.display());
    for filepath in find_yaml_files(&reagents_dir) {
        let content = fs::read_to_string(&filepath)
            .with_context(|| format!("Failed to read {}", filepath.display()))?;

        match parse_prototypes::<ReagentProto>(&content, "reagent") {
            Ok((protos, errors)) => {
                stats.errors += errors;
                for proto in protos {
                    if proto.is_abstract {
                        stats.skipped += 1;
                        continue;
                    }
                    let effects: Vec<ReagentEffect> = proto
                        .metabolisms
                        .iter()
                        .flatten()
                        .flat_map(|(group, metabolism)| effect_rows(&proto.id, group, metabolism))
                        .collect();
                    let reagent = Reagent {
                        id: proto.id,
                        name: localize(&locale, proto.name),
                        desc: localize(&locale, proto.desc),
                        works_on_the_dead: proto.works_on_the_dead,
                    };
                    db::upsert_reagent(conn, &reagent)?;
                    for effect in &effects {
                        db::insert_reagent_effect(conn, effect)?;
                    }
                    stats.effects += effects.len();
                    stats.reagents += 1;
                }
            }
            Err(e) => {
                eprintln!("  Error parsing {}: {}", filepath.display(), e);
                stats.errors += 1;
            }
        }
    }

    println!("Scanning {} for reactions...", reactions_dir.display());
    for filepath in find_yaml_files(&reactions_dir) {
        let content = fs::read_to_string(&filepath)
            .with_context(|| format!("Failed to read {}", filepath.display()))?;

        match parse_prototypes::<ReactionProto>(&content, "reaction") {
            Ok((protos, errors)) => {
                stats.errors += errors;
                for proto in protos {
                    let Some(reaction) = convert_reaction(proto) else {
                        stats.skipped += 1; // produces no reagent
                        continue;
                    };
                    db::upsert_reaction(conn, &reaction)?;
                    stats.reactions += 1;
                }
            }
            Err(e) => {
                eprintln!("  Error parsing {}: {}", filepath.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

fn convert_reaction(proto: ReactionProto) -> Option<Reaction> {
    let products = proto.products.filter(|p| !p.is_empty())?;
    Some(Reaction {
        id: proto.id,
        reactants: proto
            .reactants
            .into_iter()
            .map(|(reagent_id, r)| {
                (
                    reagent_id,
                    Reactant {
                        amount: r.amount,
                        catalyst: r.catalyst,
                    },
                )
            })
            .collect(),
        products,
        mixer_categories: proto.required_mixer_categories.unwrap_or_default(),
        min_temp: proto.min_temp,
    })
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub reagents: usize,
    pub reactions: usize,
    pub effects: usize,
    pub locale_strings: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} reagents, {} reactions, {} effects ({} locale strings). Skipped: {}, Errors: {}",
            self.reagents, self.reactions, self.effects, self.locale_strings, self.skipped,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reagent_prototypes_ignoring_effect_tags() {
        // the color literal contains `"#`, so the fixture needs wider
        // raw-string delimiters
        let yaml = r##"
- type: reagent
  id: Cryptobiolin
  name: reagent-name-cryptobiolin
  group: Medicine
  desc: reagent-desc-cryptobiolin
  physicalDesc: reagent-physical-desc-fizzy
  color: "#081a80"
  metabolisms:
    Medicine:
      effects:
      - !type:GenericStatusEffect
        key: Stutter
        component: ScrambledAccent

- type: reagent
  id: BaseDrink
  abstract: true

- type: metabolismGroup
  id: Medicine
"##;
        let (reagents, errors) = parse_prototypes::<ReagentProto>(yaml, "reagent").unwrap();
        assert_eq!(errors, 0);
        assert_eq!(reagents.len(), 2);
        assert_eq!(reagents[0].id, "Cryptobiolin");
        assert_eq!(reagents[0].name.as_deref(), Some("reagent-name-cryptobiolin"));
        assert!(!reagents[0].is_abstract);
        assert!(!reagents[0].works_on_the_dead);
        assert!(reagents[1].is_abstract);

        let metabolisms = reagents[0].metabolisms.as_ref().unwrap();
        let rows = effect_rows("Cryptobiolin", "Medicine", &metabolisms["Medicine"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "GenericStatusEffect");
        assert_eq!(rows[0].rate, 0.5); // game default, not in the prototype
        assert_eq!(rows[0].probability, 1.0);
        assert_eq!(rows[0].conditions, None);
    }

    #[test]
    fn summarizes_metabolism_effects_with_conditions() {
        let yaml = r#"
- type: reagent
  id: Ethanol
  worksOnTheDead: true
  metabolisms:
    Drink:
      metabolismRate: 1
      effects:
      - !type:Drunk
        boozePower: 2
        probability: 0.5
        conditions:
        - !type:ReagentThreshold
          min: 15
      - !type:HealthChange
        conditions:
        - !type:ReagentThreshold
          min: 3
          max: 30
          reagent: Ethanol
        - !type:OrganType
          type: Slime
        damage:
          types:
            Poison: 1
"#;
        let (reagents, errors) = parse_prototypes::<ReagentProto>(yaml, "reagent").unwrap();
        assert_eq!(errors, 0);
        assert!(reagents[0].works_on_the_dead);

        let metabolisms = reagents[0].metabolisms.as_ref().unwrap();
        let rows = effect_rows("Ethanol", "Drink", &metabolisms["Drink"]);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].kind, "Drunk");
        assert_eq!(rows[0].rate, 1.0);
        assert_eq!(rows[0].probability, 0.5);
        assert_eq!(rows[0].conditions.as_deref(), Some("at least 15u"));

        // threshold ranges render as amounts; other condition kinds keep
        // their type name
        assert_eq!(rows[1].kind, "HealthChange");
        assert_eq!(
            rows[1].conditions.as_deref(),
            Some("between 3u and 30u of Ethanol, OrganType")
        );
    }

    #[test]
    fn parses_reaction_prototypes() {
        let yaml = r#"
- type: reaction
  id: TableSalt
  reactants:
    Chlorine:
      amount: 1
    Sodium:
      amount: 1
  products:
    TableSalt: 2

- type: reaction
  id: Caramel
  minTemp: 453.15
  requiredMixerCategories:
  - Heat
  reactants:
    Sugar:
      amount: 5
    Plasma:
      amount: 1
      catalyst: true
  products:
    Caramel: 5

- type: reaction
  id: ExplosionOnly
  reactants:
    Plasma:
      amount: 1
  effects:
  - !type:ExplosionReactionEffect
    explosionType: Default
"#;
        let (reactions, errors) = parse_prototypes::<ReactionProto>(yaml, "reaction").unwrap();
        assert_eq!(errors, 0);
        assert_eq!(reactions.len(), 3);

        let mut reactions = reactions.into_iter();

        let salt = convert_reaction(reactions.next().unwrap()).unwrap();
        assert_eq!(salt.reactants["Sodium"].amount, 1.0);
        assert_eq!(salt.products["TableSalt"], 2.0);
        assert_eq!(salt.min_temp, 0.0);

        let caramel = convert_reaction(reactions.next().unwrap()).unwrap();
        assert_eq!(caramel.min_temp, 453.15);
        assert_eq!(caramel.mixer_categories, vec!["Heat"]);
        assert!(caramel.reactants["Plasma"].catalyst);

        // reactions without reagent products cannot be planned
        assert!(convert_reaction(reactions.next().unwrap()).is_none());
    }

    #[test]
    fn parses_fluent_locale_lines() {
        let ftl = "\
# reagent names
reagent-name-cryptobiolin = cryptobiolin
reagent-desc-cryptobiolin = Causes confusion and dizziness.
reagent-name-table-salt = table salt
    .attribute = ignored
";
        let line_re = Regex::new(r"^(\S+)\s+=\s+(.+)$").unwrap();
        let mut locale = HashMap::new();
        parse_locale(ftl, &line_re, &mut locale);

        assert_eq!(locale.len(), 3);
        assert_eq!(locale["reagent-name-cryptobiolin"], "cryptobiolin");
        assert_eq!(locale["reagent-name-table-salt"], "table salt");
        assert!(!locale.contains_key(".attribute"));
    }
}

//! Data models for SS14 reagents, reactions, and the production graph

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Reagent {
    pub id: String,
    pub name: Option<String>, // localized at extraction time
    pub desc: Option<String>,
    /// Whether metabolism effects still apply to dead organisms
    pub works_on_the_dead: bool,
}

/// One metabolism effect of a reagent, summarized for inspection.
/// Effects play no part in recipe planning.
#[derive(Debug, Clone, PartialEq)]
pub struct ReagentEffect {
    pub reagent_id: String,
    /// Metabolism group the effect belongs to (Medicine, Poison, ...)
    pub group: String,
    /// Effect type, e.g. `HealthChange` or `GenericStatusEffect`
    pub kind: String,
    /// Units metabolized per tick for the group
    pub rate: f64,
    /// Chance the effect fires on a metabolism tick, 1 = always
    pub probability: f64,
    /// Rendered trigger conditions, `None` when unconditional
    pub conditions: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reactant {
    pub amount: f64,
    pub catalyst: bool,
}

/// A chemical reaction: consumes fixed amounts of reactants, yields
/// fixed amounts of products.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub id: String,
    pub reactants: BTreeMap<String, Reactant>,
    pub products: BTreeMap<String, f64>,
    /// Machine required for the reaction (e.g. centrifuge), if any
    pub mixer_categories: Vec<String>,
    /// Minimum temperature in kelvin; 0 means no heating needed
    pub min_temp: f64,
}

/// One way to obtain a reagent.
#[derive(Debug, Clone)]
pub enum Node {
    /// Must come from a dispenser or otherwise be supplied - no reaction
    /// produces it (or the caller said so)
    Provided(String),

    /// Produced by `reaction`; `sources` maps each reactant to the
    /// alternative nodes that can supply it. Alternative lists are shared
    /// between every node that needs the same reagent.
    Crafted {
        id: String,
        reaction: Rc<Reaction>,
        sources: BTreeMap<String, Rc<Vec<Node>>>,
    },
}

/// Immutable reaction catalog with a reverse index from product to the
/// reactions producing it. Built once per run, read-only afterwards.
#[derive(Debug, Default)]
pub struct Catalog {
    reagents: HashMap<String, Reagent>,
    by_product: HashMap<String, Vec<Rc<Reaction>>>,
}

impl Catalog {
    pub fn new(reagents: Vec<Reagent>, reactions: Vec<Reaction>) -> Self {
        let mut by_product: HashMap<String, Vec<Rc<Reaction>>> = HashMap::new();
        for reaction in reactions {
            let reaction = Rc::new(reaction);
            for product in reaction.products.keys() {
                by_product
                    .entry(product.clone())
                    .or_default()
                    .push(reaction.clone());
            }
        }

        Catalog {
            reagents: reagents.into_iter().map(|r| (r.id.clone(), r)).collect(),
            by_product,
        }
    }

    /// All reactions whose products include `reagent_id` (possibly empty)
    pub fn reactions_for(&self, reagent_id: &str) -> &[Rc<Reaction>] {
        self.by_product
            .get(reagent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn reagent(&self, reagent_id: &str) -> Option<&Reagent> {
        self.reagents.get(reagent_id)
    }

    /// Display name for a reagent, falling back to the raw id when the
    /// reagent is unknown or has no localized name. Presentation only -
    /// resolution never depends on this.
    pub fn display_name(&self, reagent_id: &str) -> String {
        let name = self
            .reagents
            .get(reagent_id)
            .and_then(|r| r.name.as_deref())
            .unwrap_or(reagent_id);
        title_case(name)
    }
}

/// "unstable mutagen" -> "Unstable Mutagen"
pub fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(id: &str, inputs: &[(&str, f64)], outputs: &[(&str, f64)]) -> Reaction {
        Reaction {
            id: id.to_string(),
            reactants: inputs
                .iter()
                .map(|(r, amount)| {
                    (
                        r.to_string(),
                        Reactant {
                            amount: *amount,
                            catalyst: false,
                        },
                    )
                })
                .collect(),
            products: outputs.iter().map(|(p, amount)| (p.to_string(), *amount)).collect(),
            mixer_categories: Vec::new(),
            min_temp: 0.0,
        }
    }

    #[test]
    fn catalog_groups_reactions_by_product() {
        let catalog = Catalog::new(
            vec![],
            vec![
                reaction("r1", &[("A", 1.0)], &[("X", 1.0)]),
                reaction("r2", &[("B", 1.0)], &[("X", 2.0)]),
                reaction("r3", &[("X", 1.0)], &[("Y", 1.0), ("Z", 1.0)]),
            ],
        );

        let for_x: Vec<&str> = catalog.reactions_for("X").iter().map(|r| r.id.as_str()).collect();
        assert_eq!(for_x, vec!["r1", "r2"]);

        // a multi-product reaction is indexed under every product
        assert_eq!(catalog.reactions_for("Y").len(), 1);
        assert_eq!(catalog.reactions_for("Z").len(), 1);
        assert!(catalog.reactions_for("A").is_empty());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let catalog = Catalog::new(
            vec![Reagent {
                id: "TableSalt".to_string(),
                name: Some("table salt".to_string()),
                desc: None,
                works_on_the_dead: false,
            }],
            vec![],
        );

        assert_eq!(catalog.display_name("TableSalt"), "Table Salt");
        assert_eq!(catalog.display_name("Unobtainium"), "Unobtainium");
    }
}

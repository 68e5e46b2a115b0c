//! Recipe resolution and build-plan generation
//!
//! Resolves a target reagent into a graph of alternative production nodes
//! (memoized, so shared sub-recipes are shared, not duplicated), then
//! flattens each alternative into an ordered, deduplicated list of steps:
//! most basic step first, target last.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use thiserror::Error;

use crate::models::{Catalog, Node};

#[derive(Debug, Error, PartialEq)]
pub enum ChainError {
    /// Producing the reagent requires, directly or transitively, the
    /// reagent itself as an input.
    #[error("cyclic recipe: producing '{0}' requires '{0}' itself")]
    CyclicRecipe(String),
}

/// Per-resolution memoization table. `None` marks a reagent whose expansion
/// is still in progress; hitting it means the recipe graph is cyclic.
pub type ResolutionCache = HashMap<String, Option<Rc<Vec<Node>>>>;

/// Resolve a reagent into the list of alternative ways to obtain it.
///
/// Each producing reaction yields one `Crafted` alternative; a reagent
/// with no producing reaction, or one in `provided`, resolves to a single
/// `Provided` terminal. Every reagent is expanded at most once per cache,
/// so the result is a shared graph rather than a duplicated tree.
pub fn resolve(
    catalog: &Catalog,
    reagent_id: &str,
    provided: &HashSet<String>,
    cache: &mut ResolutionCache,
) -> Result<Rc<Vec<Node>>, ChainError> {
    match cache.get(reagent_id) {
        Some(Some(nodes)) => return Ok(nodes.clone()),
        Some(None) => return Err(ChainError::CyclicRecipe(reagent_id.to_string())),
        None => {}
    }

    let reactions = catalog.reactions_for(reagent_id);

    let nodes = if reactions.is_empty() || provided.contains(reagent_id) {
        Rc::new(vec![Node::Provided(reagent_id.to_string())])
    } else {
        // In-progress sentinel, written before recursing: a reagent that
        // reaches itself again finds it and fails instead of diverging.
        cache.insert(reagent_id.to_string(), None);

        let mut alternatives = Vec::with_capacity(reactions.len());
        for reaction in reactions {
            let mut sources = BTreeMap::new();
            for input in reaction.reactants.keys() {
                sources.insert(input.clone(), resolve(catalog, input, provided, cache)?);
            }
            alternatives.push(Node::Crafted {
                id: reagent_id.to_string(),
                reaction: reaction.clone(),
                sources,
            });
        }
        Rc::new(alternatives)
    };

    cache.insert(reagent_id.to_string(), Some(nodes.clone()));
    Ok(nodes)
}

/// Reagents actually produced by some reaction reachable from `node`,
/// including the node's own product.
pub fn crafted_items(node: &Node) -> BTreeSet<String> {
    let mut crafted = BTreeSet::new();
    let mut all = BTreeSet::new();
    collect_items(node, &mut crafted, &mut all);
    crafted
}

/// Every reagent touched by `node`: crafted products plus provided leaves.
pub fn all_items(node: &Node) -> BTreeSet<String> {
    let mut crafted = BTreeSet::new();
    let mut all = BTreeSet::new();
    collect_items(node, &mut crafted, &mut all);
    all
}

fn collect_items(node: &Node, crafted: &mut BTreeSet<String>, all: &mut BTreeSet<String>) {
    match node {
        Node::Provided(id) => {
            all.insert(id.clone());
        }
        Node::Crafted { id, sources, .. } => {
            if !crafted.insert(id.clone()) {
                return; // shared subgraph already walked
            }
            all.insert(id.clone());
            for alternatives in sources.values() {
                for sub in alternatives.iter() {
                    collect_items(sub, crafted, all);
                }
            }
        }
    }
}

/// Maximum depth, in reaction applications, at which each reagent appears
/// below `node`. A reagent reachable along several paths keeps the greatest
/// depth seen, so sorting by depth puts the most basic steps first.
pub fn depths(node: &Node) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    let mut walked = HashMap::new();
    walk_depths(node, 0, &mut map, &mut walked);
    map
}

fn walk_depths(
    node: &Node,
    depth: usize,
    map: &mut HashMap<String, usize>,
    walked: &mut HashMap<(String, String), usize>,
) {
    match node {
        Node::Provided(id) => raise_depth(map, id, depth),
        Node::Crafted { id, reaction, sources } => {
            raise_depth(map, id, depth);

            // A node reached again strictly deeper through a later branch
            // must drag its whole sub-graph down with it, or an input could
            // end up shallower than its consumer and sort after it. Depths
            // only grow, so re-walks terminate on the acyclic graphs that
            // reach this point.
            let key = (id.clone(), reaction.id.clone());
            match walked.get_mut(&key) {
                Some(deepest) if *deepest >= depth => return,
                Some(deepest) => *deepest = depth,
                None => {
                    walked.insert(key, depth);
                }
            }

            // Inputs sit one level below their product; each input's own
            // production step another level below that.
            for input in sources.keys() {
                raise_depth(map, input, depth + 1);
            }
            for alternatives in sources.values() {
                for sub in alternatives.iter() {
                    walk_depths(sub, depth + 2, map, walked);
                }
            }
        }
    }
}

fn raise_depth(map: &mut HashMap<String, usize>, id: &str, depth: usize) {
    match map.get_mut(id) {
        Some(current) => {
            if depth > *current {
                *current = depth;
            }
        }
        None => {
            map.insert(id.to_string(), depth);
        }
    }
}

/// One rendered instruction in a build plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub reagent_id: String,
    pub line: String,
}

/// Flatten one `Crafted` alternative into an ordered step list.
///
/// Post-order walk over crafted nodes only, with a single seen-set shared
/// across all sibling branches so a sub-recipe reachable from several
/// branches is emitted exactly once. Steps are then stable-sorted deepest
/// first, leaving the target's own step last.
pub fn linearize(
    node: &Node,
    crafted: &BTreeSet<String>,
    depth_map: &HashMap<String, usize>,
    catalog: &Catalog,
) -> Vec<Step> {
    let mut seen = HashSet::new();
    let mut steps = Vec::new();
    collect_steps(node, crafted, catalog, &mut seen, &mut steps);
    steps.sort_by_key(|step| Reverse(depth_map.get(&step.reagent_id).copied().unwrap_or(0)));
    steps
}

fn collect_steps(
    node: &Node,
    crafted: &BTreeSet<String>,
    catalog: &Catalog,
    seen: &mut HashSet<String>,
    steps: &mut Vec<Step>,
) {
    let Node::Crafted { id, sources, .. } = node else {
        return;
    };
    if !seen.insert(id.clone()) {
        return;
    }

    for alternatives in sources.values() {
        for sub in alternatives.iter() {
            collect_steps(sub, crafted, catalog, seen, steps);
        }
    }

    steps.push(Step {
        reagent_id: id.clone(),
        line: render_step(node, crafted, catalog),
    });
}

/// Render a single crafted step, e.g.
/// `1 <Sulfur>, 2 Oxygen => 3 Sulfuric Acid [machine: Centrifuge] <min temp: 370K>`.
/// Names in angle brackets are not crafted anywhere in the plan and must
/// be supplied.
pub fn render_step(node: &Node, crafted: &BTreeSet<String>, catalog: &Catalog) -> String {
    let Node::Crafted { id, reaction, .. } = node else {
        return String::new();
    };

    let describe = |reagent_id: &str, amount: f64| {
        let name = catalog.display_name(reagent_id);
        if crafted.contains(reagent_id) {
            format!("{} {}", fmt_amount(amount), name)
        } else {
            format!("{} <{}>", fmt_amount(amount), name)
        }
    };

    let inputs = reaction
        .reactants
        .iter()
        .map(|(reagent_id, reactant)| describe(reagent_id, reactant.amount))
        .collect::<Vec<_>>()
        .join(", ");
    let produced = reaction.products.get(id).copied().unwrap_or(0.0);

    let mut line = format!("{} => {}", inputs, describe(id, produced));
    if !reaction.mixer_categories.is_empty() {
        line.push_str(&format!(" [machine: {}]", reaction.mixer_categories.join(", ")));
    }
    if reaction.min_temp > 0.0 {
        line.push_str(&format!(" <min temp: {}K>", fmt_amount(reaction.min_temp)));
    }
    line
}

/// One complete build plan for a target, corresponding to one alternative
/// reaction producing it.
#[derive(Debug, Clone)]
pub struct RecipePlan {
    pub target: String,
    /// Reagents the plan consumes but never crafts, sorted by id
    pub required: Vec<String>,
    pub steps: Vec<Step>,
}

/// Compute every build plan for `target`. Returns one plan per alternative
/// reaction producing it; empty when no reaction produces the target or it
/// is externally provided.
pub fn build_instructions(
    catalog: &Catalog,
    target: &str,
    provided: &HashSet<String>,
) -> Result<Vec<RecipePlan>, ChainError> {
    let mut cache = ResolutionCache::new();
    let alternatives = resolve(catalog, target, provided, &mut cache)?;

    let mut plans = Vec::new();
    for node in alternatives.iter() {
        if !matches!(node, Node::Crafted { .. }) {
            continue;
        }

        let crafted = crafted_items(node);
        let all = all_items(node);
        let depth_map = depths(node);

        let required = all.difference(&crafted).cloned().collect();
        let steps = linearize(node, &crafted, &depth_map, catalog);

        plans.push(RecipePlan {
            target: target.to_string(),
            required,
            steps,
        });
    }
    Ok(plans)
}

/// Format a quantity without a trailing `.0` (`2`, not `2.0`)
pub fn fmt_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

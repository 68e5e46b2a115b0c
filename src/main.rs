//! SS14 Chemistry Planner
//!
//! A chemistry recipe planner for Space Station 14.

mod calculator;
mod db;
mod extract;
mod models;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::calculator::fmt_amount;
use crate::models::ReagentEffect;

/// Reagents available straight from the chem dispenser or other jugs;
/// recipes never craft these, they are bought or tapped.
const DISPENSER_REAGENTS: &[&str] = &[
    "Aluminium",
    "Carbon",
    "Chlorine",
    "Copper",
    "Ethanol",
    "Fluorine",
    "Hydrogen",
    "Iodine",
    "Iron",
    "Lithium",
    "Mercury",
    "Nitrogen",
    "Oxygen",
    "Phosphorus",
    "Potassium",
    "Radium",
    "Silicon",
    "Sodium",
    "Sugar",
    "Sulfur",
    "Water",
    "Blood",
    "WeldingFuel",
    "Plasma",
];

/// Where a base reagent comes from: chem dispenser page (P/S/D) or
/// another station source. Annotation only.
fn acquisition_source(reagent_id: &str) -> Option<&'static str> {
    match reagent_id {
        "Aluminium" | "Carbon" | "Chlorine" | "Fluorine" | "Iodine" | "Phosphorus" | "Sulfur"
        | "Silicon" | "Oxygen" | "Nitrogen" => Some("P"),
        "Hydrogen" | "Lithium" | "Sodium" | "Potassium" | "Radium" | "Sugar" | "Ethanol" => {
            Some("S")
        }
        "Iron" | "Copper" | "Gold" | "Mercury" | "Silver" => Some("D"),
        "Vestine" => Some("Syndicate"),
        "Omnizine" | "Stellibinin" | "Aloe" => Some("Botany"),
        "Plasma" | "Uranium" => Some("Grind"),
        _ => None,
    }
}

/// One line per metabolism effect, e.g.
/// `Drunk (Drink, 1u/tick): at least 15u (50% chance)`
fn format_effect(effect: &ReagentEffect) -> String {
    let mut line = format!(
        "{} ({}, {}u/tick): {}",
        effect.kind,
        effect.group,
        fmt_amount(effect.rate),
        effect.conditions.as_deref().unwrap_or("always"),
    );
    if effect.probability < 1.0 {
        line.push_str(&format!(
            " ({}% chance)",
            fmt_amount(effect.probability * 100.0)
        ));
    }
    line
}

#[derive(Parser)]
#[command(name = "ss14-chemist")]
#[command(about = "Chemistry recipe planner for Space Station 14")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "ss14_chem.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract reagent and reaction prototypes from a game checkout
    Extract {
        /// Path to the SS14 source tree (the directory containing Resources/)
        game_dir: PathBuf,

        /// Clear existing data before extraction
        #[arg(long)]
        clear: bool,
    },

    /// Print every way to craft a target reagent
    Recipe {
        /// Target reagent id (e.g. "Ephedrine")
        reagent: String,

        /// Treat an additional reagent as externally supplied (repeatable)
        #[arg(short, long)]
        provided: Vec<String>,

        /// Do not assume the chem dispenser reagents are available
        #[arg(long)]
        no_dispenser: bool,
    },

    /// List all reagents in the database
    ListReagents,

    /// List all craftable reagents
    ListProducible,

    /// Show details for a specific reagent
    Reagent {
        /// Reagent id
        id: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without a game checkout)
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Extract { game_dir, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_extracted_data(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &game_dir)?;
            println!("\n{}", stats);
        }

        Commands::Recipe {
            reagent,
            provided,
            no_dispenser,
        } => {
            let catalog = db::load_catalog(&conn)?;

            let mut supplied: HashSet<String> = if no_dispenser {
                HashSet::new()
            } else {
                DISPENSER_REAGENTS.iter().map(|id| id.to_string()).collect()
            };
            supplied.extend(provided);

            let plans = calculator::build_instructions(&catalog, &reagent, &supplied)?;

            if plans.is_empty() {
                println!(
                    "{} is not craftable - supply it directly.",
                    catalog.display_name(&reagent)
                );
            }

            for (i, plan) in plans.iter().enumerate() {
                if plans.len() > 1 {
                    println!("Recipe {} of {}:", i + 1, plans.len());
                }

                let required = plan
                    .required
                    .iter()
                    .map(|id| {
                        let name = catalog.display_name(id);
                        match acquisition_source(id) {
                            Some(source) => format!("{} [{}]", name, source),
                            None => name,
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("required: {}", required);

                for step in &plan.steps {
                    println!("   {}", step.line);
                }
                println!();
            }
        }

        Commands::ListReagents => {
            let reagents = db::list_reagents(&conn)?;
            if reagents.is_empty() {
                println!("No reagents in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!("{:<32} {}", "Id", "Name");
                println!("{}", "-".repeat(52));
                for r in reagents {
                    println!("{:<32} {}", r.id, r.name.as_deref().unwrap_or("-"));
                }
            }
        }

        Commands::ListProducible => {
            let reagents = db::list_producible_reagents(&conn)?;
            if reagents.is_empty() {
                println!("No reactions in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!("Craftable reagents:");
                for r in reagents {
                    println!("  {}", r);
                }
            }
        }

        Commands::Reagent { id } => {
            let catalog = db::load_catalog(&conn)?;
            match catalog.reagent(&id) {
                Some(reagent) => {
                    println!("Reagent: {}", catalog.display_name(&id));
                    println!("  ID: {}", reagent.id);
                    if let Some(desc) = &reagent.desc {
                        println!("  {}", desc);
                    }
                    if reagent.works_on_the_dead {
                        println!("  Works on the dead");
                    }
                }
                None => {
                    println!("Reagent '{}' not found", id);
                }
            }

            let effects = db::get_reagent_effects(&conn, &id)?;
            if !effects.is_empty() {
                println!("  Effects:");
                for effect in effects {
                    println!("    {}", format_effect(&effect));
                }
            }

            let producers = catalog.reactions_for(&id);
            if !producers.is_empty() {
                println!("  Produced by:");
                for reaction in producers {
                    println!("    [{}]", reaction.id);
                    for (reagent_id, reactant) in &reaction.reactants {
                        let catalyst = if reactant.catalyst { " (catalyst)" } else { "" };
                        println!(
                            "      {} x {}{}",
                            fmt_amount(reactant.amount),
                            reagent_id,
                            catalyst
                        );
                    }
                    println!(
                        "      -> {} x {}",
                        fmt_amount(reaction.products.get(&id).copied().unwrap_or(0.0)),
                        id
                    );
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

/// Load a handful of real SS14 reactions for testing without a game checkout
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{Reactant, Reaction, Reagent};
    use std::collections::BTreeMap;

    fn reaction(
        id: &str,
        reactants: &[(&str, f64)],
        products: &[(&str, f64)],
        min_temp: f64,
    ) -> Reaction {
        Reaction {
            id: id.to_string(),
            reactants: reactants
                .iter()
                .map(|(reagent, amount)| {
                    (
                        reagent.to_string(),
                        Reactant {
                            amount: *amount,
                            catalyst: false,
                        },
                    )
                })
                .collect(),
            products: products
                .iter()
                .map(|(reagent, amount)| (reagent.to_string(), *amount))
                .collect::<BTreeMap<_, _>>(),
            mixer_categories: Vec::new(),
            min_temp,
        }
    }

    db::clear_extracted_data(conn)?;

    let reagents = [
        ("Carbon", "carbon", "A black crystalline solid."),
        ("Hydrogen", "hydrogen", "A light, flammable gas."),
        ("Nitrogen", "nitrogen", "An inert-ish gas."),
        ("Chlorine", "chlorine", "A yellow-green gas. Toxic."),
        ("Sodium", "sodium", "A silvery-white alkali metal."),
        ("Sugar", "sugar", "A sweet substance."),
        ("Ethanol", "ethanol", "A simple alcohol."),
        ("WeldingFuel", "welding fuel", "Used to fuel welders."),
        ("Oil", "oil", "Burns in a lovely fashion."),
        ("Ammonia", "ammonia", "A caustic gas."),
        ("Diethylamine", "diethylamine", "A secondary amine."),
        ("Ephedrine", "ephedrine", "A sweaty stimulant."),
        ("TableSalt", "table salt", "Often found in a salt shaker."),
        ("Caramel", "caramel", "Burned sugar."),
    ];
    for (id, name, desc) in reagents {
        db::upsert_reagent(
            conn,
            &Reagent {
                id: id.to_string(),
                name: Some(name.to_string()),
                desc: Some(desc.to_string()),
                works_on_the_dead: false,
            },
        )?;
    }

    // a couple of effects so `reagent` output has something to show
    for (kind, conditions) in [
        ("HealthChange", None),
        ("GenericStatusEffect", Some("at least 30u".to_string())),
    ] {
        db::insert_reagent_effect(
            conn,
            &ReagentEffect {
                reagent_id: "Ephedrine".to_string(),
                group: "Medicine".to_string(),
                kind: kind.to_string(),
                rate: 0.25,
                probability: 1.0,
                conditions,
            },
        )?;
    }

    // Oil: the base of most stimulant chains
    db::upsert_reaction(
        conn,
        &reaction(
            "Oil",
            &[("Carbon", 1.0), ("Hydrogen", 1.0), ("WeldingFuel", 1.0)],
            &[("Oil", 3.0)],
            0.0,
        ),
    )?;

    db::upsert_reaction(
        conn,
        &reaction(
            "Ammonia",
            &[("Hydrogen", 3.0), ("Nitrogen", 1.0)],
            &[("Ammonia", 3.0)],
            0.0,
        ),
    )?;

    db::upsert_reaction(
        conn,
        &reaction(
            "Diethylamine",
            &[("Ammonia", 1.0), ("Ethanol", 1.0)],
            &[("Diethylamine", 2.0)],
            0.0,
        ),
    )?;

    // Multi-level chain: needs Oil and Diethylamine, both crafted
    db::upsert_reaction(
        conn,
        &reaction(
            "Ephedrine",
            &[
                ("Sugar", 1.0),
                ("Oil", 1.0),
                ("Hydrogen", 1.0),
                ("Diethylamine", 1.0),
            ],
            &[("Ephedrine", 4.0)],
            0.0,
        ),
    )?;

    db::upsert_reaction(
        conn,
        &reaction(
            "TableSalt",
            &[("Chlorine", 1.0), ("Sodium", 1.0)],
            &[("TableSalt", 2.0)],
            0.0,
        ),
    )?;

    // Heated reaction
    db::upsert_reaction(
        conn,
        &reaction("Caramel", &[("Sugar", 5.0)], &[("Caramel", 5.0)], 453.15),
    )?;

    println!("Loaded {} sample reagents and 6 reactions", reagents.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_lines_show_rate_conditions_and_chance() {
        let mut effect = ReagentEffect {
            reagent_id: "Ethanol".to_string(),
            group: "Drink".to_string(),
            kind: "Drunk".to_string(),
            rate: 1.0,
            probability: 0.5,
            conditions: Some("at least 15u".to_string()),
        };
        assert_eq!(
            format_effect(&effect),
            "Drunk (Drink, 1u/tick): at least 15u (50% chance)"
        );

        effect.probability = 1.0;
        effect.conditions = None;
        assert_eq!(format_effect(&effect), "Drunk (Drink, 1u/tick): always");
    }
}

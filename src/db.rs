//! Database schema and operations

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{Catalog, Reactant, Reaction, Reagent, ReagentEffect};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Reagent prototypes (names already localized)
        CREATE TABLE IF NOT EXISTS reagents (
            id TEXT PRIMARY KEY,
            name TEXT,
            desc TEXT,
            works_on_the_dead INTEGER NOT NULL DEFAULT 0
        );

        -- Metabolism effects, one row per effect per metabolism group
        CREATE TABLE IF NOT EXISTS reagent_effects (
            reagent_id TEXT,
            metabolism_group TEXT NOT NULL,
            effect TEXT NOT NULL,
            rate REAL NOT NULL,
            probability REAL NOT NULL,
            conditions TEXT
        );

        -- Reaction definitions
        CREATE TABLE IF NOT EXISTS reactions (
            id TEXT PRIMARY KEY,
            min_temp REAL NOT NULL DEFAULT 0,
            mixer_categories TEXT
        );

        -- What a reaction consumes
        CREATE TABLE IF NOT EXISTS reaction_inputs (
            reaction_id TEXT,
            reagent_id TEXT,
            amount REAL NOT NULL,
            catalyst INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (reaction_id, reagent_id)
        );

        -- What a reaction produces
        CREATE TABLE IF NOT EXISTS reaction_outputs (
            reaction_id TEXT,
            reagent_id TEXT,
            amount REAL NOT NULL,
            PRIMARY KEY (reaction_id, reagent_id)
        );

        -- Create indexes for common lookups
        CREATE INDEX IF NOT EXISTS idx_reaction_inputs_reaction ON reaction_inputs(reaction_id);
        CREATE INDEX IF NOT EXISTS idx_reaction_outputs_reaction ON reaction_outputs(reaction_id);
        CREATE INDEX IF NOT EXISTS idx_reaction_outputs_reagent ON reaction_outputs(reagent_id);
        CREATE INDEX IF NOT EXISTS idx_reagent_effects_reagent ON reagent_effects(reagent_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a reagent, dropping any previously stored effects
pub fn upsert_reagent(conn: &Connection, reagent: &Reagent) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO reagents (id, name, desc, works_on_the_dead)
         VALUES (?1, ?2, ?3, ?4)",
        (
            &reagent.id,
            &reagent.name,
            &reagent.desc,
            reagent.works_on_the_dead,
        ),
    )?;
    conn.execute(
        "DELETE FROM reagent_effects WHERE reagent_id = ?1",
        [&reagent.id],
    )?;
    Ok(())
}

pub fn insert_reagent_effect(conn: &Connection, effect: &ReagentEffect) -> Result<()> {
    conn.execute(
        "INSERT INTO reagent_effects
             (reagent_id, metabolism_group, effect, rate, probability, conditions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &effect.reagent_id,
            &effect.group,
            &effect.kind,
            effect.rate,
            effect.probability,
            &effect.conditions,
        ),
    )?;
    Ok(())
}

/// All stored effects of one reagent, in extraction order
pub fn get_reagent_effects(conn: &Connection, reagent_id: &str) -> Result<Vec<ReagentEffect>> {
    let mut stmt = conn.prepare(
        "SELECT reagent_id, metabolism_group, effect, rate, probability, conditions
         FROM reagent_effects WHERE reagent_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map([reagent_id], |row| {
        Ok(ReagentEffect {
            reagent_id: row.get(0)?,
            group: row.get(1)?,
            kind: row.get(2)?,
            rate: row.get(3)?,
            probability: row.get(4)?,
            conditions: row.get(5)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Insert or replace a reaction with all of its inputs and outputs
pub fn upsert_reaction(conn: &Connection, reaction: &Reaction) -> Result<()> {
    let mixer_categories = if reaction.mixer_categories.is_empty() {
        None
    } else {
        Some(reaction.mixer_categories.join(","))
    };

    conn.execute(
        "INSERT OR REPLACE INTO reactions (id, min_temp, mixer_categories) VALUES (?1, ?2, ?3)",
        (&reaction.id, reaction.min_temp, mixer_categories),
    )?;
    conn.execute(
        "DELETE FROM reaction_inputs WHERE reaction_id = ?1",
        [&reaction.id],
    )?;
    conn.execute(
        "DELETE FROM reaction_outputs WHERE reaction_id = ?1",
        [&reaction.id],
    )?;

    for (reagent_id, reactant) in &reaction.reactants {
        conn.execute(
            "INSERT INTO reaction_inputs (reaction_id, reagent_id, amount, catalyst)
             VALUES (?1, ?2, ?3, ?4)",
            (&reaction.id, reagent_id, reactant.amount, reactant.catalyst),
        )?;
    }
    for (reagent_id, amount) in &reaction.products {
        conn.execute(
            "INSERT INTO reaction_outputs (reaction_id, reagent_id, amount)
             VALUES (?1, ?2, ?3)",
            (&reaction.id, reagent_id, amount),
        )?;
    }
    Ok(())
}

/// Clear all extracted data (for re-extraction)
pub fn clear_extracted_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM reaction_outputs;
        DELETE FROM reaction_inputs;
        DELETE FROM reactions;
        DELETE FROM reagent_effects;
        DELETE FROM reagents;
        "#,
    )?;
    Ok(())
}

/// Load the full catalog into memory. The catalog is immutable for the
/// lifetime of a planning command.
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare("SELECT id, name, desc, works_on_the_dead FROM reagents")?;
    let rows = stmt.query_map([], |row| {
        Ok(Reagent {
            id: row.get(0)?,
            name: row.get(1)?,
            desc: row.get(2)?,
            works_on_the_dead: row.get(3)?,
        })
    })?;

    let mut reagents = Vec::new();
    for row in rows {
        reagents.push(row?);
    }

    let mut reactions = Vec::new();
    for (id, min_temp, mixer_categories) in list_reaction_rows(conn)? {
        reactions.push(load_reaction(conn, &id, min_temp, mixer_categories)?);
    }

    Ok(Catalog::new(reagents, reactions))
}

fn list_reaction_rows(conn: &Connection) -> Result<Vec<(String, f64, Option<String>)>> {
    let mut stmt = conn.prepare("SELECT id, min_temp, mixer_categories FROM reactions ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn load_reaction(
    conn: &Connection,
    reaction_id: &str,
    min_temp: f64,
    mixer_categories: Option<String>,
) -> Result<Reaction> {
    let mut stmt = conn.prepare(
        "SELECT reagent_id, amount, catalyst FROM reaction_inputs WHERE reaction_id = ?1",
    )?;
    let rows = stmt.query_map([reaction_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            Reactant {
                amount: row.get(1)?,
                catalyst: row.get(2)?,
            },
        ))
    })?;

    let mut reactants = std::collections::BTreeMap::new();
    for row in rows {
        let (reagent_id, reactant) = row?;
        reactants.insert(reagent_id, reactant);
    }

    let mut stmt = conn.prepare(
        "SELECT reagent_id, amount FROM reaction_outputs WHERE reaction_id = ?1",
    )?;
    let rows = stmt.query_map([reaction_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut products = std::collections::BTreeMap::new();
    for row in rows {
        let (reagent_id, amount) = row?;
        products.insert(reagent_id, amount);
    }

    Ok(Reaction {
        id: reaction_id.to_string(),
        reactants,
        products,
        mixer_categories: mixer_categories
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        min_temp,
    })
}

/// List all reagents in the database
pub fn list_reagents(conn: &Connection) -> Result<Vec<Reagent>> {
    let mut stmt =
        conn.prepare("SELECT id, name, desc, works_on_the_dead FROM reagents ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Reagent {
            id: row.get(0)?,
            name: row.get(1)?,
            desc: row.get(2)?,
            works_on_the_dead: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all distinct reagents that some reaction produces
pub fn list_producible_reagents(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT reagent_id FROM reaction_outputs ORDER BY reagent_id")?;

    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

use log::{debug, error, info, warn};
use serde::Deserialize;
use sqlx::{Acquire, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const DEFAULT_CATALOG: &str = "seed/catalog.json";

#[derive(Deserialize, Debug)]
struct Catalog {
    profiles: Vec<ProfileSeed>,
    species: Vec<SpeciesSeed>,
    #[serde(default)]
    comments: Vec<CommentSeed>,
}

#[derive(Deserialize, Debug)]
struct ProfileSeed {
    id: Uuid,
    display_name: String,
    email: Option<String>,
    biography: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SpeciesSeed {
    scientific_name: String,
    common_name: String,
    kingdom: String,
    total_population: i64,
    #[serde(default)]
    endangered: bool,
    description: Option<String>,
    image: Option<String>,
    author: Uuid,
}

#[derive(Deserialize, Debug)]
struct CommentSeed {
    /// Scientific name of the species the comment belongs to.
    species: String,
    author: Uuid,
    content: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let database_url = std::env::var("DATABASE_URL").map_err(|e| {
        eprintln!("Error: DATABASE_URL environment variable not set or accessible.");
        e
    })?;
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CATALOG.to_string());

    debug!("Reading catalog from {}", path);
    let catalog: Catalog = serde_json::from_str(&std::fs::read_to_string(&path)?)?;

    let pool = PgPool::connect(&database_url).await?;

    for profile in &catalog.profiles {
        create_profile_helper(profile, &pool).await?;
    }

    let mut created: HashMap<&str, i64> = HashMap::new();
    for species in &catalog.species {
        match create_species_helper(species, &pool).await? {
            Some(id) => {
                created.insert(species.scientific_name.as_str(), id);
            }
            None => warn!(
                "Species {} already exists, skipping it and its comments.",
                species.scientific_name
            ),
        }
    }

    let mut comments = 0;
    for comment in &catalog.comments {
        let Some(&species_id) = created.get(comment.species.as_str()) else {
            debug!("No new species {} for comment, skipping.", comment.species);
            continue;
        };
        let Some(content) = non_blank(Some(comment.content.as_str())) else {
            warn!("Blank comment on {}, skipping.", comment.species);
            continue;
        };
        sqlx::query("INSERT INTO comment (species_id, author_id, content) VALUES ($1, $2, $3)")
            .bind(species_id)
            .bind(comment.author)
            .bind(content)
            .execute(&pool)
            .await?;
        comments += 1;
    }

    info!(
        "Seeded {} profiles, {} species and {} comments",
        catalog.profiles.len(),
        created.len(),
        comments
    );
    Ok(())
}

/// Trims seed text. Blank values are stored as NULL, like the app does.
fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|text| !text.is_empty())
}

async fn create_profile_helper(
    profile: &ProfileSeed,
    pool: &PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let inserted = sqlx::query(
        "INSERT INTO profiles (id, display_name, email, biography) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
    )
    .bind(profile.id)
    .bind(&profile.display_name)
    .bind(&profile.email)
    .bind(&profile.biography)
    .execute(pool)
    .await
    .map_err(|e| {
        error!("Failed to create profile {}: {}", profile.display_name, e);
        e
    })?
    .rows_affected();

    if inserted == 0 {
        warn!("Profile {} already exists, skipping creation.", profile.display_name);
    } else {
        info!("Profile {} created successfully", profile.display_name);
    }
    Ok(())
}

/// Inserts a species unless its author already has one with the same
/// scientific name. Returns the new id.
async fn create_species_helper(
    species: &SpeciesSeed,
    pool: &PgPool,
) -> Result<Option<i64>, Box<dyn std::error::Error>> {
    let mut transaction = pool.begin().await?;
    let connection = transaction.acquire().await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM species WHERE scientific_name = $1 AND author = $2")
            .bind(species.scientific_name.trim())
            .bind(species.author)
            .fetch_optional(&mut *connection)
            .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO species (scientific_name, common_name, kingdom, total_population, endangered, description, image, author)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
    )
    .bind(species.scientific_name.trim())
    .bind(species.common_name.trim())
    .bind(&species.kingdom)
    .bind(species.total_population)
    .bind(species.endangered)
    .bind(non_blank(species.description.as_deref()))
    .bind(non_blank(species.image.as_deref()))
    .bind(species.author)
    .fetch_one(&mut *connection)
    .await
    .map_err(|e| {
        error!("Failed to create species {}: {}", species.scientific_name, e);
        e
    })?;

    transaction.commit().await?;
    info!("Species {} created successfully", species.scientific_name);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_becomes_null() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(Some(" \t\n")), None);
        assert_eq!(non_blank(Some("  Red cap ")), Some("Red cap"));
    }

    #[test]
    fn catalog_file_parses() {
        let catalog: Catalog =
            serde_json::from_str(include_str!("../catalog.json")).unwrap();
        assert!(!catalog.profiles.is_empty());
        assert!(catalog
            .comments
            .iter()
            .all(|c| catalog.species.iter().any(|s| s.scientific_name == c.species)));
    }
}

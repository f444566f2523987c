use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use carriertrust_core::{country_from_vat, normalize_vat, UserId};
use carriertrust_server::store::{RecordStore, ReviewQuery, SqliteRepository, StatusFilter};

/// CarrierTrust operator tool
#[derive(Parser, Debug)]
#[command(name = "carriertrust")]
#[command(about = "Operate a CarrierTrust review directory", long_about = None)]
struct Cli {
    /// Directory holding carriertrust.db
    #[arg(long, env = "STATE_DIR", default_value = ".", global = true)]
    state_dir: PathBuf,

    /// Explicit database path (overrides --state-dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grant the admin capability to a user
    GrantAdmin { user_id: String },
    /// Revoke the admin capability from a user
    RevokeAdmin { user_id: String },
    /// List reviews, newest first
    List(ListArgs),
    /// Show the country for a VAT number
    VatCountry { vat: String },
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// pending, published, hidden or all
    #[arg(long, default_value = "pending")]
    status: String,

    /// Maximum number of reviews to print
    #[arg(long, default_value_t = 200)]
    limit: usize,

    /// Only show reviews whose company name, VAT or text contains this
    #[arg(long)]
    search: Option<String>,
}

impl Cli {
    fn database_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| self.state_dir.join("carriertrust.db"))
    }
}

fn open_store(cli: &Cli) -> Result<SqliteRepository> {
    let path = cli.database_path();
    SqliteRepository::new(&path).with_context(|| format!("Failed to open {}", path.display()))
}

async fn run_set_admin(cli: &Cli, user_id: &str, is_admin: bool) -> Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(anyhow!("user id must not be empty"));
    }
    let store = open_store(cli)?;
    store
        .set_admin(&UserId::from(user_id), is_admin)
        .await
        .context("Failed to update admin capability")?;
    println!(
        "{} admin capability for {}",
        if is_admin { "Granted" } else { "Revoked" },
        user_id
    );
    Ok(())
}

async fn run_list(cli: &Cli, args: &ListArgs) -> Result<()> {
    let filter: StatusFilter = args
        .status
        .parse()
        .with_context(|| format!("Invalid --status {:?}", args.status))?;
    let store = open_store(cli)?;
    let mut rows = store
        .list_reviews(&ReviewQuery::with_status(filter).limit(args.limit))
        .await
        .context("Failed to list reviews")?;
    if let Some(term) = &args.search {
        rows.retain(|row| row.matches_term(term));
    }

    if rows.is_empty() {
        println!("No {} reviews.", filter);
        return Ok(());
    }

    for row in rows {
        let review = &row.review;
        println!(
            "{}  {:<9}  {}★  {:<12}  {} ({}, {})",
            review.created_at.format("%Y-%m-%d %H:%M"),
            review.status.as_str(),
            review.rating,
            review.issue.as_str(),
            row.company_name,
            row.company_vat,
            if row.company_country.is_empty() {
                "-"
            } else {
                row.company_country.as_str()
            }
        );
        println!("    id: {}", review.id);
        if let Some(email) = &review.author_email {
            println!("    author: {} <{}>", review.author_id, email);
        } else {
            println!("    author: {}", review.author_id);
        }
        println!("    {}", review.body);
    }
    Ok(())
}

fn run_vat_country(vat: &str) -> Result<()> {
    let normalized = normalize_vat(vat);
    match country_from_vat(vat) {
        Some(country) => println!("{}: {}", normalized, country),
        None => println!("{}: unknown country prefix", normalized),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::GrantAdmin { user_id } => run_set_admin(&cli, user_id, true).await,
        Commands::RevokeAdmin { user_id } => run_set_admin(&cli, user_id, false).await,
        Commands::List(args) => run_list(&cli, args).await,
        Commands::VatCountry { vat } => run_vat_country(vat),
    }
}

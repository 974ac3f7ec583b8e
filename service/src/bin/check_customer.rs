//! Local scoring check for a single customer.
//!
//! Loads the model artifact and the customer store directly (no HTTP), looks
//! the customer up and reports which rule, or the classifier, decided the
//! score.

use anyhow::{bail, Context, Result};
use churn_core::{assess, bypass_reason, normalize_id, BypassReason, ModelContext};
use churn_storage::{CsvCustomerStore, CustomerStore};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const SAMPLE_IDS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "churn-check")]
#[command(about = "Score one customer from the local store", long_about = None)]
struct Cli {
    /// Customer id; read from stdin when omitted
    id: Option<String>,

    /// Model artifact
    #[arg(long, default_value = "models/churn_model.json")]
    model: PathBuf,

    /// Customer store
    #[arg(long, default_value = "base_clientes.csv")]
    database: PathBuf,

    /// Print only the assessment as JSON
    #[arg(long)]
    json: bool,
}

/// Prompt on `prompt` and read one id line from `input`.
///
/// The prompt never goes to stdout, which carries the report or the JSON.
fn read_id<R: BufRead, W: Write>(input: &mut R, prompt: &mut W) -> Result<String> {
    write!(prompt, "ID do cliente: ")?;
    prompt.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = ModelContext::load(&cli.model)
        .with_context(|| format!("Failed to load model from {}", cli.model.display()))?;
    if !ctx.is_loaded() {
        bail!("Model artifact not found at {}", ctx.source().display());
    }

    let store = CsvCustomerStore::new(&cli.database);
    if !store.exists() {
        bail!("Customer store not found at {}", cli.database.display());
    }

    if !cli.json {
        println!("Features do modelo ({}):", ctx.features().len());
        for name in ctx.features() {
            println!("  - {name}");
        }
        println!();
        println!("Colunas da base: {}", store.headers()?.join(", "));
        println!("Coluna de ID: {}", store.id_column()?);
        println!("Exemplos de ID: {}", store.sample_ids(SAMPLE_IDS)?.join(", "));
        println!();
    }

    let id = match cli.id {
        Some(id) => id,
        None => read_id(&mut io::stdin().lock(), &mut io::stderr())?,
    };
    if id.trim().is_empty() {
        bail!("Customer id must not be empty");
    }

    let record = store
        .find(&id)?
        .with_context(|| format!("Cliente {} não encontrado na base", normalize_id(&id)))?;
    let input = record.values(ctx.features());
    let assessment = assess(&ctx, &input)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("Cliente {} (id normalizado: {})", record.id, normalize_id(&id));
    for name in ctx.features() {
        println!("  {name:<30} {}", record.value(name));
    }
    println!();

    match bypass_reason(&input, ctx.features()) {
        Some(BypassReason::ZeroFeatures) => {
            println!("TODAS AS FEATURES ZERADAS");
            println!("MODELO NÃO FOI USADO");
            println!("Churn: BAIXO (0%)");
        }
        Some(BypassReason::LongInactivity) => {
            println!("DAYS_SINCE_LAST >= 366");
            println!("MODELO NÃO FOI USADO");
            println!("Churn: BAIXO (0%)");
        }
        None => {
            println!("MODELO FOI USADO");
            println!("Probabilidade de churn: {:.2}%", assessment.percentual_churn);
            println!("Nível de risco: {}", assessment.nivel_risco.as_str());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_id_prompts_on_given_writer() {
        let mut input = io::Cursor::new(b" 0123 \n".to_vec());
        let mut prompt = Vec::new();
        assert_eq!(read_id(&mut input, &mut prompt).unwrap(), "0123");
        assert_eq!(prompt, b"ID do cliente: ");
    }

    #[test]
    fn test_read_id_empty_input() {
        let mut input = io::Cursor::new(Vec::new());
        let mut prompt = Vec::new();
        assert_eq!(read_id(&mut input, &mut prompt).unwrap(), "");
    }
}

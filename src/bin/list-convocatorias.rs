use clap::Parser;
use convocatoria_crawler::{ConvocatoriaData, CrawlerError, Table};
use std::path::PathBuf;

/// Print the convocatorias stored by previous runs.
#[derive(Debug, Parser)]
struct Cli {
    #[arg(short, long, default_value = "convocatorias.db")]
    database: PathBuf,
}

async fn list_convocatorias(database: PathBuf) -> Result<(), CrawlerError> {
    if !database.is_file() {
        println!("No database at {}", database.display());
        return Ok(());
    }

    let p = ConvocatoriaData::open_existing(&database).await?;
    if !p.convocatorias.is_created().await? {
        println!("No convocatorias stored in {}", database.display());
        return Ok(());
    }

    let stored = p.all().await?;
    for (id, record) in &stored {
        println!("==== #{} ====", id);
        println!("{}", record);
    }
    println!("Total {}", stored.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CrawlerError> {
    let cli = Cli::parse();
    list_convocatorias(cli.database).await
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{domain::EntityKind, store::RecordStore};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/registry.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a staff login, or reset the password of an existing one.
    CreateStaff { username: String, password: String },
    /// Print the number of stored records per entity.
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateStaff { username, password } => {
            let staff_id = storage.create_staff(&username, &password).await?;
            println!("staff {username} ready staff_id={}", staff_id.0);
        }
        Command::Count => {
            for kind in EntityKind::ALL {
                let count = storage.count(kind, None).await?;
                println!("{:<10} {count}", kind.slug());
            }
        }
    }

    Ok(())
}

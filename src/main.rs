use clap::Parser;
use idlink::cli::{run_delete, run_identify, run_list, run_serve, run_show, Cli, Commands};
use idlink::db::Database;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let db = Database::open()?;

    match cli.command {
        Commands::Identify(args) => {
            run_identify(&db, args.email, args.phone)?;
        }
        Commands::List(args) => {
            run_list(&db, args.page, args.limit)?;
        }
        Commands::Show(args) => {
            run_show(&db, args.id)?;
        }
        Commands::Delete(args) => {
            run_delete(&db, args.id)?;
        }
        Commands::Serve(args) => {
            run_serve(&db, args)?;
        }
    }

    Ok(())
}
